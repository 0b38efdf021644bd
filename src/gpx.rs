use log::debug;
use quick_xml::{Reader, events::Event};
use serde::{Deserialize, Serialize};

use crate::{error::{ProfileError, Result}, geodesic};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrackPoint
{
   pub longitude: f64,
   pub latitude:  f64,
   pub elevation: f64,
   pub distance:  f64, // Cumulative distance in meters from the first point of the track
}

/// A point as it appears in the document, before numeric coercion.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawPoint
{
   pub lat: Option<String>,
   pub lon: Option<String>,
   pub ele: Option<String>,
}

/// Segment/point tree of a GPX document.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TrackDocument
{
   pub name:     Option<String>,
   pub segments: Vec<Vec<RawPoint>>,
}

impl TrackDocument
{
   pub fn point_count(&self) -> usize { self.segments.iter().map(|s| s.len()).sum() }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Element
{
   Gpx,
   Metadata,
   Track,
   Route,
   Segment,
   Point,
   Elevation,
   Name,
   Other,
}

impl Element
{
   fn from_local_name(name: &[u8]) -> Self
   {
      match name
      {
         | b"gpx" => Element::Gpx,
         | b"metadata" => Element::Metadata,
         | b"trk" => Element::Track,
         | b"rte" => Element::Route,
         | b"trkseg" => Element::Segment,
         | b"trkpt" | b"rtept" => Element::Point,
         | b"ele" => Element::Elevation,
         | b"name" => Element::Name,
         | _ => Element::Other,
      }
   }
}

#[derive(Default)]
struct DocumentBuilder
{
   stack:          Vec<Element>,
   segments:       Vec<Vec<RawPoint>>,
   routes:         Vec<Vec<RawPoint>>,
   segment_open:   bool,
   point:          Option<RawPoint>,
   point_in_route: bool,
   track_name:     Option<String>,
   route_name:     Option<String>,
   metadata_name:  Option<String>,
}

impl DocumentBuilder
{
   fn open(&mut self, element: Element, attributes: quick_xml::events::attributes::Attributes<'_>) -> Result<()>
   //------------------------------------------------------------------------------------------------------
   {
      if self.stack.is_empty() && element != Element::Gpx
      {
         return Err(ProfileError::Parse("missing <gpx> root element".to_string()));
      }
      match element
      {
         | Element::Segment =>
         {
            self.segments.push(Vec::new());
            self.segment_open = true;
         }
         | Element::Route => self.routes.push(Vec::new()),
         | Element::Point =>
         {
            self.point_in_route = self.stack.contains(&Element::Route);
            if !self.point_in_route && !self.segment_open
            {
               self.segments.push(Vec::new());
               self.segment_open = true;
            }
            let mut point = RawPoint::default();
            for attr in attributes.flatten()
            {
               let value = attr.unescape_value().ok().map(|v| v.trim().to_string());
               match attr.key.local_name().as_ref()
               {
                  | b"lat" => point.lat = value,
                  | b"lon" => point.lon = value,
                  | _ => (),
               }
            }
            self.point = Some(point);
         }
         | _ => (),
      }
      self.stack.push(element);
      Ok(())
   }

   fn close(&mut self)
   //-----------------
   {
      match self.stack.pop()
      {
         | Some(Element::Point) =>
         {
            let segments = if self.point_in_route { &mut self.routes } else { &mut self.segments };
            if let Some(point) = self.point.take()
               && let Some(segment) = segments.last_mut()
            {
               segment.push(point);
            }
         }
         | Some(Element::Segment) | Some(Element::Track) => self.segment_open = false,
         | _ => (),
      }
   }

   fn text(&mut self, text: &str)
   //----------------------------
   {
      let text = text.trim();
      if text.is_empty()
      {
         return;
      }
      let n = self.stack.len();
      if n < 2
      {
         return;
      }
      match (self.stack[n - 2], self.stack[n - 1])
      {
         | (Element::Point, Element::Elevation) =>
         {
            if let Some(point) = self.point.as_mut()
            {
               point.ele = Some(text.to_string());
            }
         }
         | (Element::Track, Element::Name) =>
         {
            if self.track_name.is_none()
            {
               self.track_name = Some(text.to_string());
            }
         }
         | (Element::Route, Element::Name) =>
         {
            if self.route_name.is_none()
            {
               self.route_name = Some(text.to_string());
            }
         }
         | (Element::Metadata, Element::Name) =>
         {
            if self.metadata_name.is_none()
            {
               self.metadata_name = Some(text.to_string());
            }
         }
         | _ => (),
      }
   }

   fn finish(self) -> Result<TrackDocument>
   //--------------------------------------
   {
      if !self.stack.is_empty()
      {
         return Err(ProfileError::Parse("unexpected end of document".to_string()));
      }
      // Recorded track points win; routes are read only from documents that carry no track.
      let track_points: usize = self.segments.iter().map(|s| s.len()).sum();
      let route_points: usize = self.routes.iter().map(|s| s.len()).sum();
      let (segments, name) = if track_points == 0 && route_points > 0
      {
         (self.routes, self.route_name.or(self.track_name))
      }
      else
      {
         (self.segments, self.track_name.or(self.route_name))
      };
      Ok(TrackDocument { name: name.or(self.metadata_name), segments })
   }
}

/// Reads the segment/point structure of a GPX document. Track segments are used when the document
/// has any track points, otherwise its routes. Values are kept as raw text; see
/// [`parse_track_points`] for numeric coercion.
pub fn read_track_document(bytes: &[u8]) -> Result<TrackDocument>
//----------------------------------------------------------------
{
   let mut reader = Reader::from_reader(bytes);
   let mut builder = DocumentBuilder::default();
   let mut seen_root = false;
   let mut buf = Vec::new();

   loop
   {
      match reader.read_event_into(&mut buf)
                  .map_err(|e| ProfileError::Parse(format!("at byte {}: {}", reader.buffer_position(), e)))?
      {
         | Event::Start(ref e) =>
         {
            builder.open(Element::from_local_name(e.local_name().as_ref()), e.attributes())?;
            seen_root = true;
         }
         | Event::Empty(ref e) =>
         {
            builder.open(Element::from_local_name(e.local_name().as_ref()), e.attributes())?;
            builder.close();
            seen_root = true;
         }
         | Event::End(_) => builder.close(),
         | Event::Text(ref e) =>
         {
            let text = e.unescape().map_err(|e| ProfileError::Parse(e.to_string()))?;
            builder.text(&text);
         }
         | Event::CData(e) =>
         {
            let inner = e.into_inner();
            builder.text(&String::from_utf8_lossy(&inner));
         }
         | Event::Eof => break,
         | _ => (),
      }
      buf.clear();
   }

   if !seen_root
   {
      return Err(ProfileError::Parse("missing <gpx> root element".to_string()));
   }
   let document = builder.finish()?;
   debug!("Read GPX document: {} segments, {} points", document.segments.len(), document.point_count());
   Ok(document)
}

/// Missing, unparseable or non-finite values become 0.0. This conflates "unknown" with a real
/// zero, which is the accepted behaviour for elevation as well as coordinates.
fn lenient_f64(value: Option<&str>) -> f64
{
   value.and_then(|v| v.trim().parse::<f64>().ok())
        .filter(|v| v.is_finite())
        .unwrap_or(0.0)
}

/// Flattens the document's segments into trackpoints with cumulative distance. The first point of
/// each segment adds no distance, so segment seams are stitched without a jump.
pub fn parse_track_points(document: &TrackDocument) -> Vec<TrackPoint>
//---------------------------------------------------------------------
{
   let mut track_data = Vec::with_capacity(document.point_count());
   let mut cumulative_distance = 0.0;

   for segment in &document.segments
   {
      let mut last_point: Option<(f64, f64)> = None;
      for raw in segment
      {
         let latitude = lenient_f64(raw.lat.as_deref());
         let longitude = lenient_f64(raw.lon.as_deref());
         let elevation = lenient_f64(raw.ele.as_deref());

         if let Some((prev_lat, prev_lon)) = last_point
         {
            cumulative_distance += geodesic::distance(prev_lat, prev_lon, latitude, longitude);
         }

         track_data.push(TrackPoint { longitude, latitude, elevation, distance: cumulative_distance });
         last_point = Some((latitude, longitude));
      }
   }
   track_data
}

#[cfg(test)]
mod tests
{
   use super::*;
   use approx::assert_relative_eq;

   const TWO_SEGMENTS: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<gpx version="1.1" creator="test" xmlns="http://www.topografix.com/GPX/1/1">
  <metadata><name>Metadata Name</name></metadata>
  <trk>
    <name>Ridge Loop</name>
    <trkseg>
      <trkpt lat="46.0000" lon="7.0000"><ele>1000</ele><name>start</name></trkpt>
      <trkpt lat="46.0010" lon="7.0000"><ele>1010</ele></trkpt>
      <trkpt lat="46.0020" lon="7.0010"><ele>1005</ele></trkpt>
    </trkseg>
    <trkseg>
      <trkpt lat="46.0100" lon="7.0100"><ele>1100</ele></trkpt>
      <trkpt lat="46.0110" lon="7.0100"><ele>1120</ele></trkpt>
      <trkpt lat="46.0120" lon="7.0110"><ele>1090</ele></trkpt>
    </trkseg>
  </trk>
</gpx>"#;

   #[test]
   fn test_read_document_structure()
   {
      let document = read_track_document(TWO_SEGMENTS.as_bytes()).unwrap();
      assert_eq!(document.name.as_deref(), Some("Ridge Loop"));
      assert_eq!(document.segments.len(), 2);
      assert_eq!(document.point_count(), 6);
      assert_eq!(document.segments[0][0].lat.as_deref(), Some("46.0000"));
      assert_eq!(document.segments[0][0].ele.as_deref(), Some("1000"));
   }

   #[test]
   fn test_segment_seam_adds_no_distance()
   {
      let document = read_track_document(TWO_SEGMENTS.as_bytes()).unwrap();
      let points = parse_track_points(&document);
      assert_eq!(points.len(), 6);
      assert_eq!(points[0].distance, 0.0);

      let within_first = geodesic::distance(46.0, 7.0, 46.001, 7.0) + geodesic::distance(46.001, 7.0, 46.002, 7.001);
      assert_relative_eq!(points[2].distance, within_first, max_relative = 1e-12);

      // Seam: first point of segment 2 carries the last distance of segment 1.
      assert_eq!(points[3].distance, points[2].distance);

      let within_second = geodesic::distance(46.01, 7.01, 46.011, 7.01) + geodesic::distance(46.011, 7.01, 46.012, 7.011);
      assert_relative_eq!(points[5].distance - points[3].distance, within_second, max_relative = 1e-9);

      for pair in points.windows(2)
      {
         assert!(pair[0].distance <= pair[1].distance);
      }
   }

   #[test]
   fn test_lenient_numeric_fields()
   {
      let gpx = r#"<gpx><trk><trkseg>
         <trkpt lat="45.5"><ele>abc</ele></trkpt>
         <trkpt lon="-122.5"/>
         <trkpt lat="NaN" lon=" 3.25 "><ele> 12.5 </ele></trkpt>
      </trkseg></trk></gpx>"#;
      let points = parse_track_points(&read_track_document(gpx.as_bytes()).unwrap());
      assert_eq!(points.len(), 3);
      assert_eq!((points[0].latitude, points[0].longitude, points[0].elevation), (45.5, 0.0, 0.0));
      assert_eq!((points[1].latitude, points[1].longitude, points[1].elevation), (0.0, -122.5, 0.0));
      assert_eq!((points[2].latitude, points[2].longitude, points[2].elevation), (0.0, 3.25, 12.5));
   }

   #[test]
   fn test_empty_document_yields_no_points()
   {
      let document = read_track_document(br#"<gpx version="1.1"><trk><name>Nothing</name></trk></gpx>"#).unwrap();
      assert!(parse_track_points(&document).is_empty());
      assert_eq!(document.name.as_deref(), Some("Nothing"));
   }

   #[test]
   fn test_metadata_name_fallback_and_routes()
   {
      let gpx = r#"<gpx:gpx xmlns:gpx="http://www.topografix.com/GPX/1/1">
         <gpx:metadata><gpx:name>From Metadata</gpx:name></gpx:metadata>
         <gpx:rte>
            <gpx:rtept lat="1.0" lon="1.0"/>
            <gpx:rtept lat="1.0" lon="1.001"/>
         </gpx:rte>
      </gpx:gpx>"#;
      let document = read_track_document(gpx.as_bytes()).unwrap();
      assert_eq!(document.name.as_deref(), Some("From Metadata"));
      assert_eq!(document.segments.len(), 1);
      assert_eq!(document.point_count(), 2);
   }

   #[test]
   fn test_recorded_track_preferred_over_planned_route()
   {
      let gpx = r#"<gpx version="1.1">
         <rte>
            <name>Planned</name>
            <rtept lat="45.0" lon="7.0"/>
            <rtept lat="45.1" lon="7.0"/>
         </rte>
         <trk>
            <name>Recorded</name>
            <trkseg>
               <trkpt lat="46.0" lon="7.0"><ele>500</ele></trkpt>
               <trkpt lat="46.001" lon="7.0"><ele>520</ele></trkpt>
            </trkseg>
         </trk>
      </gpx>"#;
      let document = read_track_document(gpx.as_bytes()).unwrap();
      assert_eq!(document.name.as_deref(), Some("Recorded"));
      assert_eq!(document.segments.len(), 1);
      assert_eq!(document.point_count(), 2);

      let points = parse_track_points(&document);
      assert_eq!(points[0].elevation, 500.0);
      assert_relative_eq!(points[1].distance, geodesic::distance(46.0, 7.0, 46.001, 7.0), max_relative = 1e-12);
   }

   #[test]
   fn test_route_used_when_track_is_empty()
   {
      let gpx = r#"<gpx><trk><name>Empty</name><trkseg/></trk>
         <rte><name>Planned</name><rtept lat="1" lon="1"/><rtept lat="1" lon="2"/></rte></gpx>"#;
      let document = read_track_document(gpx.as_bytes()).unwrap();
      assert_eq!(document.name.as_deref(), Some("Planned"));
      assert_eq!(document.point_count(), 2);
   }

   #[test]
   fn test_point_outside_segment_opens_implicit_segment()
   {
      let gpx = r#"<gpx><trk><trkpt lat="1" lon="1"/><trkpt lat="1" lon="2"/></trk></gpx>"#;
      let document = read_track_document(gpx.as_bytes()).unwrap();
      assert_eq!(document.segments.len(), 1);
      assert!(parse_track_points(&document)[1].distance > 0.0);
   }

   #[test]
   fn test_malformed_documents()
   {
      assert!(matches!(read_track_document(b"<gpx><trk></trkseg></gpx>"), Err(ProfileError::Parse(_))));
      assert!(matches!(read_track_document(b"<kml><Document/></kml>"), Err(ProfileError::Parse(_))));
      assert!(matches!(read_track_document(b"not a document at all"), Err(ProfileError::Parse(_))));
      assert!(matches!(read_track_document(b"<gpx><trk><trkseg><trkpt lat=\"1\" lon=\"1\">"), Err(ProfileError::Parse(_))));
   }
}
