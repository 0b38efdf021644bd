use std::path::Path;

use approx::assert_relative_eq;
use futures::executor::block_on;

use gpx_profile::{geodesic,
                  loader::{FileFetcher, load_tracks},
                  profile::{ChartGeometry, PointerEvent, ProfileController},
                  surface::{HoverLocation, LocationSink, MapSurfaces}};

#[derive(Default)]
struct RecordingSink
{
   events: Vec<(String, Option<HoverLocation>)>,
}

impl LocationSink for RecordingSink
{
   fn dispatch(&mut self, target: &str, location: Option<HoverLocation>) { self.events.push((target.to_string(), location)); }
}

fn write_gpx(dir: &Path, file: &str, name: Option<&str>, points: &[(f64, f64, f64)]) -> String
{
   let mut doc = String::from("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<gpx version=\"1.1\" creator=\"test\" xmlns=\"http://www.topografix.com/GPX/1/1\">\n<trk>");
   if let Some(name) = name
   {
      doc.push_str(&format!("<name>{name}</name>"));
   }
   doc.push_str("<trkseg>\n");
   for (lat, lon, ele) in points
   {
      doc.push_str(&format!("  <trkpt lat=\"{lat}\" lon=\"{lon}\"><ele>{ele}</ele></trkpt>\n"));
   }
   doc.push_str("</trkseg></trk></gpx>\n");
   let path = dir.join(file);
   std::fs::write(&path, doc).unwrap();
   path.display().to_string()
}

#[test]
fn test_three_sources_with_failing_second()
{
   let dir = tempfile::tempdir().unwrap();
   let first = write_gpx(dir.path(), "first.gpx", Some("Morning"), &[(46.0, 7.0, 500.0), (46.001, 7.0, 520.0), (46.002, 7.0, 510.0)]);
   let missing = dir.path().join("missing.gpx").display().to_string();
   let third = write_gpx(dir.path(), "third.gpx", None, &[(45.0, 6.0, 100.0), (45.0, 6.01, 140.0)]);

   let mut controller = ProfileController::new(ChartGeometry::default(), "track-map", RecordingSink::default());
   let ticket = controller.begin_load(vec![first, missing.clone(), third]);
   let report = block_on(load_tracks(&FileFetcher, ticket.sources()));
   assert_eq!(report.failures.len(), 1);
   assert_eq!(report.failures[0].index, 1);
   assert_eq!(report.failures[0].source, missing);

   assert!(controller.finish_load(ticket.generation(), report.into_tracks()));
   let tracks = controller.tracks().unwrap();
   assert_eq!(tracks.len(), 2);
   assert_eq!(tracks[0].name, "Morning");
   assert_eq!(tracks[1].name, "Track 3");
   assert_eq!(tracks[0].elevation_gain, 20.0);
   assert_relative_eq!(tracks[0].total_distance, 2.0 * geodesic::distance(46.0, 7.0, 46.001, 7.0), epsilon = 1e-6);
}

#[test]
fn test_scrub_reports_locations_to_map_surface()
{
   let dir = tempfile::tempdir().unwrap();
   let source = write_gpx(dir.path(), "climb.gpx", Some("Climb"), &[(46.0, 7.0, 500.0), (46.01, 7.0, 600.0), (46.02, 7.0, 700.0)]);

   let surfaces = MapSurfaces::new();
   let mut controller = ProfileController::new(ChartGeometry::default(), "side-map", surfaces.clone());
   let ticket = controller.begin_load(vec![source]);
   let report = block_on(load_tracks(&FileFetcher, ticket.sources()));
   assert!(controller.finish_load(ticket.generation(), report.into_tracks()));

   // Registered after the controller was built: still reached because targets resolve per dispatch.
   let surface = surfaces.register("side-map");
   controller.handle(PointerEvent::Enter { rel_x: 0.5 });
   assert_eq!(controller.hover_index(), Some(1));
   assert_eq!(surface.location(), Some(HoverLocation { longitude: 7.0, latitude: 46.01 }));

   let marker = controller.hover_marker().unwrap();
   assert_relative_eq!(marker.left_percent, 50.0, epsilon = 1e-9);
   assert_eq!(marker.elevation, 600.0);

   controller.handle(PointerEvent::Move { rel_x: 1.5 });
   assert_eq!(controller.hover_index(), None);
   assert_eq!(surface.location(), None);

   controller.handle(PointerEvent::TouchStart { rel_x: 0.0 });
   assert_eq!(surface.location(), Some(HoverLocation { longitude: 7.0, latitude: 46.0 }));
   controller.handle(PointerEvent::TouchEnd);
   assert_eq!(surface.location(), None);
}

#[test]
fn test_reload_discards_slower_earlier_load()
{
   let dir = tempfile::tempdir().unwrap();
   let a = write_gpx(dir.path(), "a.gpx", Some("A"), &[(1.0, 1.0, 1.0), (1.001, 1.0, 2.0)]);
   let b = write_gpx(dir.path(), "b.gpx", Some("B"), &[(2.0, 2.0, 5.0)]);

   let mut controller = ProfileController::new(ChartGeometry::default(), "track-map", RecordingSink::default());
   let slow = controller.begin_load(vec![a]);
   let fast = controller.begin_load(vec![b]);

   let fast_report = block_on(load_tracks(&FileFetcher, fast.sources()));
   assert!(controller.finish_load(fast.generation(), fast_report.into_tracks()));
   let slow_report = block_on(load_tracks(&FileFetcher, slow.sources()));
   assert!(!controller.finish_load(slow.generation(), slow_report.into_tracks()));

   let names: Vec<&str> = controller.tracks().unwrap().iter().map(|t| t.name.as_str()).collect();
   assert_eq!(names, vec!["B"]);
}

#[test]
fn test_all_sources_failing_yields_empty_collection()
{
   let dir = tempfile::tempdir().unwrap();
   let empty = dir.path().join("empty.gpx");
   std::fs::write(&empty, "<gpx><trk><trkseg></trkseg></trk></gpx>").unwrap();
   let sources = vec![empty.display().to_string(), dir.path().join("nope.gpx").display().to_string()];

   let mut controller = ProfileController::new(ChartGeometry::default(), "track-map", RecordingSink::default());
   let ticket = controller.begin_load(sources);
   let report = block_on(load_tracks(&FileFetcher, ticket.sources()));
   assert_eq!(report.failures.len(), 2);
   assert!(controller.finish_load(ticket.generation(), report.into_tracks()));

   assert_eq!(controller.tracks().map(|t| t.len()), Some(0));
   assert!(controller.path().is_none());
   controller.handle(PointerEvent::Move { rel_x: 0.5 });
   assert!(controller.sink().events.is_empty());
}
