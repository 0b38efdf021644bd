//! Elevation profiles for GPX tracks: parse one or more track documents, aggregate distance and
//! elevation statistics, and drive an interactive profile chart whose hovered point is reported
//! to a map surface.

pub mod error;
pub mod geodesic;
pub mod gpx;
pub mod loader;
pub mod profile;
pub mod render;
pub mod settings;
pub mod surface;
pub mod track;

pub use error::{ProfileError, Result};
pub use gpx::TrackPoint;
pub use loader::{load_tracks, FileFetcher, HttpFetcher, LoadReport, SourceFetcher, TrackFetcher};
pub use profile::{ChartGeometry, PointerEvent, ProfileController};
pub use surface::{HoverLocation, LocationSink, MapSurfaces};
pub use track::Track;
