use std::path::Path;

use futures::future::{BoxFuture, FutureExt};
use log::{info, warn};
use serde::Serialize;

use crate::{error::{ProfileError, Result},
            gpx::{parse_track_points, read_track_document},
            track::Track};

/// Source of raw track documents. Implementations return the document bytes for a source
/// identifier; the await on `fetch` is the only suspension point of a load.
pub trait TrackFetcher: Send + Sync
{
   fn fetch<'a>(&'a self, source: &'a str) -> BoxFuture<'a, Result<Vec<u8>>>;
}

/// Reads local files; an optional `file://` prefix is stripped.
#[derive(Debug, Clone, Copy, Default)]
pub struct FileFetcher;

impl TrackFetcher for FileFetcher
{
   fn fetch<'a>(&'a self, source: &'a str) -> BoxFuture<'a, Result<Vec<u8>>>
   {
      async move
      {
         let path = Path::new(source.strip_prefix("file://").unwrap_or(source));
         if !path.is_file()
         {
            return Err(ProfileError::Fetch(format!("{} is not a file", path.display())));
         }
         std::fs::read(path).map_err(|e| ProfileError::Fetch(format!("{}: {}", path.display(), e)))
      }.boxed()
   }
}

/// Fetches over HTTP(S). No timeout is configured; a hung request stalls only its own source.
#[derive(Debug, Clone, Default)]
pub struct HttpFetcher
{
   client: reqwest::blocking::Client,
}

impl HttpFetcher
{
   pub fn new() -> Self { Self { client: reqwest::blocking::Client::new() } }
}

impl TrackFetcher for HttpFetcher
{
   fn fetch<'a>(&'a self, source: &'a str) -> BoxFuture<'a, Result<Vec<u8>>>
   {
      async move
      {
         let response = self.client.get(source)
                                   .send()
                                   .map_err(|e| ProfileError::Fetch(format!("{source}: {e}")))?;
         let status = response.status();
         if !status.is_success()
         {
            return Err(ProfileError::Fetch(format!("{source}: HTTP {status}")));
         }
         let bytes = response.bytes().map_err(|e| ProfileError::Fetch(format!("{source}: {e}")))?;
         Ok(bytes.to_vec())
      }.boxed()
   }
}

/// Dispatches `http://` and `https://` sources to [`HttpFetcher`], everything else to [`FileFetcher`].
#[derive(Debug, Clone, Default)]
pub struct SourceFetcher
{
   http: HttpFetcher,
   file: FileFetcher,
}

impl SourceFetcher
{
   pub fn new() -> Self { Self { http: HttpFetcher::new(), file: FileFetcher } }
}

pub fn is_remote_source(source: &str) -> bool
{
   let lower = source.trim_start().to_ascii_lowercase();
   lower.starts_with("http://") || lower.starts_with("https://")
}

impl TrackFetcher for SourceFetcher
{
   fn fetch<'a>(&'a self, source: &'a str) -> BoxFuture<'a, Result<Vec<u8>>>
   {
      if is_remote_source(source) { self.http.fetch(source) } else { self.file.fetch(source) }
   }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SourceFailure
{
   pub index:  usize,
   pub source: String,
   pub error:  String,
}

/// Outcome of a batch load: the tracks that loaded, in request order, and the sources that were
/// skipped.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct LoadReport
{
   pub tracks:   Vec<Track>,
   pub failures: Vec<SourceFailure>,
}

impl LoadReport
{
   pub fn into_tracks(self) -> Vec<Track> { self.tracks }
}

/// Parses and aggregates one document. `position` is the source's index in the request list.
pub fn parse_track(bytes: &[u8], position: usize) -> Result<Track>
//----------------------------------------------------------------
{
   let document = read_track_document(bytes)?;
   let points = parse_track_points(&document);
   Track::from_points(document.name, position, points)
}

pub async fn load_track<F: TrackFetcher + ?Sized>(fetcher: &F, position: usize, source: &str) -> Result<Track>
//------------------------------------------------------------------------------------------------------------
{
   let bytes = fetcher.fetch(source).await?;
   parse_track(&bytes, position)
}

/// Loads every source in order. A failing source (fetch, parse or zero points) is logged and
/// skipped; it never aborts the batch.
pub async fn load_tracks<F: TrackFetcher + ?Sized>(fetcher: &F, sources: &[String]) -> LoadReport
//-------------------------------------------------------------------------------------------------
{
   let mut report = LoadReport::default();
   for (index, source) in sources.iter().enumerate()
   {
      match load_track(fetcher, index, source).await
      {
         | Ok(track) =>
         {
            info!("Loaded track {} '{}' from {}: {} points, {:.2} meters", index, track.name, source, track.points.len(), track.total_distance);
            report.tracks.push(track);
         }
         | Err(e) =>
         {
            warn!("Skipping track source {} ({}): {}", index, source, e);
            report.failures.push(SourceFailure { index, source: source.clone(), error: e.to_string() });
         }
      }
   }
   report
}
