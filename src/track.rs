use serde::{Deserialize, Serialize};

use crate::{error::{ProfileError, Result}, gpx::TrackPoint};

/// One loaded track with its summary statistics. Built once from a parsed point sequence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Track
{
   pub name:           String,
   pub points:         Vec<TrackPoint>,
   pub total_distance: f64,
   pub elevation_gain: f64,
   pub min_elevation:  f64,
   pub max_elevation:  f64,
}

impl Track
{
   /// Aggregates `points` into a track. `position` is the 0-based source position, used for the
   /// `Track N` label when the document supplies no (or a blank) name.
   pub fn from_points(name: Option<String>, position: usize, points: Vec<TrackPoint>) -> Result<Track>
   //-------------------------------------------------------------------------------------------------
   {
      let last = points.last().ok_or(ProfileError::Empty)?;
      let total_distance = last.distance;

      let mut min_elevation = f64::INFINITY;
      let mut max_elevation = f64::NEG_INFINITY;
      for point in &points
      {
         min_elevation = min_elevation.min(point.elevation);
         max_elevation = max_elevation.max(point.elevation);
      }

      let elevation_gain = points.windows(2)
                                 .map(|pair| (pair[1].elevation - pair[0].elevation).max(0.0))
                                 .sum();

      let name = match name.map(|n| n.trim().to_string())
      {
         | Some(n) if !n.is_empty() => n,
         | _ => default_track_name(position),
      };

      Ok(Track { name, points, total_distance, elevation_gain, min_elevation, max_elevation })
   }

   pub fn elevation_range(&self) -> f64 { self.max_elevation - self.min_elevation }

   pub fn first_point(&self) -> Option<&TrackPoint> { self.points.first() }
}

pub fn default_track_name(position: usize) -> String { format!("Track {}", position + 1) }
