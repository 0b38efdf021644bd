//! Raster rendering of an elevation profile with `tiny-skia`. One chart unit maps to one pixel, so
//! the image is `geometry.width` by `geometry.total_height()`.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tiny_skia::{Color, FillRule, Paint, PathBuilder, Pixmap, Stroke, Transform};

use crate::{error::{ProfileError, Result},
            gpx::TrackPoint,
            profile::{ChartGeometry, Projection},
            track::Track};

const DISTANCE_TICKS: usize = 5;

/// Gradient (percent) thresholds for colouring: |g| <= flat is flat, g >= extreme is black.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GradientThresholds
{
   pub flat:    f64,
   pub extreme: f64,
}

impl Default for GradientThresholds
{
   fn default() -> Self { Self { flat: 0.5, extreme: 16.0 } }
}

/// Percentage gradient between two consecutive points; zero over (near) zero horizontal distance.
pub fn gradient_percent(p1: &TrackPoint, p2: &TrackPoint) -> f64
//---------------------------------------------------------------
{
   let horizontal = p2.distance - p1.distance;
   if horizontal < 0.1
   {
      return 0.0;
   }
   (p2.elevation - p1.elevation) / horizontal * 100.0
}

/// Downhill shades light to dark blue, flat is green, uphill shades yellow to red and at or above
/// the extreme threshold turns black.
pub fn gradient_color(gradient_pct: f64, thresholds: GradientThresholds) -> Color
//-------------------------------------------------------------------------------
{
   let flat = thresholds.flat.abs();
   let extreme = thresholds.extreme.abs().max(f64::EPSILON);
   if gradient_pct < -flat
   {
      let t = ((-flat - gradient_pct) / extreme).min(1.0);
      Color::from_rgba8((173.0 * (1.0 - t)) as u8, (216.0 * (1.0 - t)) as u8, 255, 255)
   }
   else if gradient_pct > flat
   {
      if gradient_pct >= extreme
      {
         return Color::from_rgba8(0, 0, 0, 255);
      }
      let t = ((gradient_pct - flat) / extreme).min(1.0);
      Color::from_rgba8(255, (255.0 * (1.0 - t)) as u8, 0, 255)
   }
   else
   {
      Color::from_rgba8(0, 200, 0, 255)
   }
}

fn solid(color: Color) -> Paint<'static>
{
   let mut paint = Paint::default();
   paint.set_color(color);
   paint.anti_alias = true;
   paint
}

/// Renders `track` as a gradient-coloured filled profile with distance ticks in the label band and,
/// when `hover` names a point, a marker at that point.
pub fn render_profile(track: &Track, geometry: ChartGeometry, hover: Option<usize>, thresholds: GradientThresholds) -> Result<Pixmap>
//----------------------------------------------------------------------------------------------------------------------------------
{
   let geometry = geometry.or_default();
   let width = geometry.width.ceil() as u32;
   let height = geometry.total_height().ceil() as u32;
   let mut pixmap = Pixmap::new(width, height).ok_or_else(|| ProfileError::Render(format!("cannot allocate {width}x{height} pixmap")))?;
   pixmap.fill(Color::from_rgba8(224, 224, 224, 255));

   let projection = Projection::new(track, geometry);
   let baseline = geometry.plot_height as f32;

   for pair in track.points.windows(2)
   {
      let (x1, y1) = projection.project(&pair[0]);
      let (x2, y2) = projection.project(&pair[1]);
      let (x1, y1, x2, y2) = (x1 as f32, y1 as f32, x2 as f32, y2 as f32);
      let paint = solid(gradient_color(gradient_percent(&pair[0], &pair[1]), thresholds));

      let mut path_builder = PathBuilder::new();
      path_builder.move_to(x1, y1);
      path_builder.line_to(x2, y2);
      path_builder.line_to(x2, baseline);
      path_builder.line_to(x1, baseline);
      path_builder.close();
      if let Some(path) = path_builder.finish()
      {
         pixmap.fill_path(&path, &paint, FillRule::Winding, Transform::identity(), None);
      }

      let mut path_builder = PathBuilder::new();
      path_builder.move_to(x1, y1);
      path_builder.line_to(x2, y2);
      if let Some(path) = path_builder.finish()
      {
         let stroke = Stroke { width: 2.0, ..Default::default() };
         pixmap.stroke_path(&path, &solid(Color::from_rgba8(40, 40, 40, 255)), &stroke, Transform::identity(), None);
      }
   }

   draw_distance_ticks(&mut pixmap, &projection, track.total_distance, baseline);

   if let Some(point) = hover.and_then(|i| track.points.get(i))
   {
      let (x, y) = projection.project(point);
      draw_hover_marker(&mut pixmap, x as f32, y as f32, baseline);
   }
   Ok(pixmap)
}

fn draw_distance_ticks(pixmap: &mut Pixmap, projection: &Projection, total_distance: f64, baseline: f32)
//------------------------------------------------------------------------------------------------------
{
   let paint = solid(Color::from_rgba8(0, 0, 0, 255));
   let stroke = Stroke { width: 2.0, ..Default::default() };
   for i in 0..DISTANCE_TICKS
   {
      let distance = total_distance * i as f64 / (DISTANCE_TICKS - 1) as f64;
      let x = projection.x(distance) as f32;
      let mut path_builder = PathBuilder::new();
      path_builder.move_to(x, baseline);
      path_builder.line_to(x, baseline + 6.0);
      if let Some(path) = path_builder.finish()
      {
         pixmap.stroke_path(&path, &paint, &stroke, Transform::identity(), None);
      }
   }
}

fn draw_hover_marker(pixmap: &mut Pixmap, x: f32, y: f32, baseline: f32)
//-----------------------------------------------------------------------
{
   let mut path_builder = PathBuilder::new();
   path_builder.move_to(x, 0.0);
   path_builder.line_to(x, baseline);
   if let Some(path) = path_builder.finish()
   {
      let stroke = Stroke { width: 1.0, ..Default::default() };
      pixmap.stroke_path(&path, &solid(Color::from_rgba8(90, 90, 90, 255)), &stroke, Transform::identity(), None);
   }

   let mut path_builder = PathBuilder::new();
   path_builder.push_circle(x, y, 5.0);
   if let Some(path) = path_builder.finish()
   {
      pixmap.fill_path(&path, &solid(Color::from_rgba8(255, 100, 100, 255)), FillRule::Winding, Transform::identity(), None);
      let stroke = Stroke { width: 1.5, ..Default::default() };
      pixmap.stroke_path(&path, &solid(Color::from_rgba8(0, 0, 0, 255)), &stroke, Transform::identity(), None);
   }
}

pub fn encode_png(pixmap: &Pixmap) -> Result<Vec<u8>> { pixmap.encode_png().map_err(|e| ProfileError::Render(e.to_string())) }

pub fn save_png(pixmap: &Pixmap, path: &Path) -> Result<()>
//-----------------------------------------------------------
{
   let bytes = encode_png(pixmap)?;
   std::fs::write(path, bytes)?;
   Ok(())
}

#[cfg(test)]
mod tests
{
   use super::*;

   fn hill() -> Track
   {
      let points = [(0.0, 100.0), (500.0, 150.0), (1000.0, 120.0), (1500.0, 120.0)]
         .iter()
         .map(|&(distance, elevation)| TrackPoint { longitude: 7.0, latitude: 46.0, elevation, distance })
         .collect();
      Track::from_points(Some("Hill".to_string()), 0, points).unwrap()
   }

   #[test]
   fn test_gradient_percent()
   {
      let p1 = TrackPoint { longitude: 0.0, latitude: 0.0, elevation: 100.0, distance: 0.0 };
      let p2 = TrackPoint { longitude: 0.0, latitude: 0.0, elevation: 110.0, distance: 200.0 };
      assert_eq!(gradient_percent(&p1, &p2), 5.0);
      assert_eq!(gradient_percent(&p2, &p2), 0.0);
   }

   #[test]
   fn test_gradient_colors()
   {
      let thresholds = GradientThresholds::default();
      assert_eq!(gradient_color(0.2, thresholds), Color::from_rgba8(0, 200, 0, 255));
      assert_eq!(gradient_color(20.0, thresholds), Color::from_rgba8(0, 0, 0, 255));
      let downhill = gradient_color(-5.0, thresholds).to_color_u8();
      assert_eq!(downhill.blue(), 255);
      let uphill = gradient_color(5.0, thresholds).to_color_u8();
      assert_eq!(uphill.red(), 255);
      assert_eq!(uphill.blue(), 0);
   }

   #[test]
   fn test_render_dimensions_and_hover()
   {
      let geometry = ChartGeometry::new(300.0, 100.0, 20.0);
      let plain = render_profile(&hill(), geometry, None, GradientThresholds::default()).unwrap();
      assert_eq!((plain.width(), plain.height()), (300, 120));

      let hovered = render_profile(&hill(), geometry, Some(1), GradientThresholds::default()).unwrap();
      assert_ne!(plain.data(), hovered.data());
      // Out-of-range hover is ignored rather than failing.
      let ignored = render_profile(&hill(), geometry, Some(99), GradientThresholds::default()).unwrap();
      assert_eq!(plain.data(), ignored.data());
   }

   #[test]
   fn test_single_point_renders()
   {
      let track = Track::from_points(None, 0, vec![TrackPoint { longitude: 1.0, latitude: 1.0, elevation: 5.0, distance: 0.0 }]).unwrap();
      assert!(render_profile(&track, ChartGeometry::default(), Some(0), GradientThresholds::default()).is_ok());
   }

   #[test]
   fn test_save_png()
   {
      let pixmap = render_profile(&hill(), ChartGeometry::default(), None, GradientThresholds::default()).unwrap();
      let bytes = encode_png(&pixmap).unwrap();
      assert_eq!(&bytes[..8], b"\x89PNG\r\n\x1a\n");

      let dir = tempfile::tempdir().unwrap();
      let path = dir.path().join("profile.png");
      save_png(&pixmap, &path).unwrap();
      assert!(std::fs::metadata(&path).unwrap().len() > 8);
   }
}
