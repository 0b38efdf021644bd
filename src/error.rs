use thiserror::Error;

#[derive(Error, Debug)]
pub enum ProfileError
{
   /// Transport failure, missing file or non-success HTTP status.
   #[error("fetch failed: {0}")]
   Fetch(String),

   #[error("malformed track document: {0}")]
   Parse(String),

   #[error("track document contains no points")]
   Empty,

   #[error("{0}")]
   Io(#[from] std::io::Error),

   #[error("render failed: {0}")]
   Render(String),
}

pub type Result<T> = std::result::Result<T, ProfileError>;

#[cfg(test)]
mod tests
{
   use super::*;

   #[test]
   fn test_error_display()
   {
      let err = ProfileError::Fetch("http://example.com/a.gpx: 404 Not Found".to_string());
      assert!(err.to_string().contains("404"));
      assert_eq!(ProfileError::Empty.to_string(), "track document contains no points");
   }

   #[test]
   fn test_io_conversion()
   {
      let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
      let err: ProfileError = io.into();
      assert!(matches!(err, ProfileError::Io(_)));
   }
}
