//! Elevation profile geometry and the pointer-driven interaction controller.
//!
//! The chart lives in a fixed normalised space: x spans `[0, width]` for the selected track's
//! `[0, total_distance]`, y spans `[0, plot_height]` with elevation increasing upward, and a
//! `label_band` below the plot is reserved for axis labels. Consumers scale this space to pixels.

use log::debug;
use serde::{Deserialize, Serialize};

use crate::{gpx::TrackPoint,
            surface::{HoverLocation, LocationSink},
            track::Track};

const DEFAULT_CHART_WIDTH: f64 = 1000.0;
const DEFAULT_PLOT_HEIGHT: f64 = 200.0;
const DEFAULT_LABEL_BAND: f64 = 40.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ChartGeometry
{
   pub width:       f64,
   pub plot_height: f64,
   pub label_band:  f64,
}

impl Default for ChartGeometry
{
   fn default() -> Self
   {
      Self { width: DEFAULT_CHART_WIDTH, plot_height: DEFAULT_PLOT_HEIGHT, label_band: DEFAULT_LABEL_BAND }
   }
}

impl ChartGeometry
{
   pub fn new(width: f64, plot_height: f64, label_band: f64) -> Self { Self { width, plot_height, label_band } }

   pub fn total_height(&self) -> f64 { self.plot_height + self.label_band }

   /// Height over width of the whole chart including the label band.
   pub fn aspect_ratio(&self) -> f64 { self.total_height() / self.width }

   pub fn is_valid(&self) -> bool
   {
      self.width.is_finite() && self.width > 0.0
         && self.plot_height.is_finite() && self.plot_height > 0.0
         && self.label_band.is_finite() && self.label_band >= 0.0
   }

   /// This geometry if valid, otherwise the defaults.
   pub fn or_default(self) -> Self { if self.is_valid() { self } else { Self::default() } }
}

/// Maps a track's distance/elevation onto a [`ChartGeometry`].
#[derive(Debug, Clone, Copy)]
pub struct Projection
{
   geometry:        ChartGeometry,
   distance_range:  f64,
   min_elevation:   f64,
   elevation_range: f64,
}

impl Projection
{
   pub fn new(track: &Track, geometry: ChartGeometry) -> Self
   //--------------------------------------------------------
   {
      // Degenerate ranges (single point, flat track) fall back to 1 so nothing divides by zero.
      let distance_range = if track.total_distance > 0.0 { track.total_distance } else { 1.0 };
      let elevation_range = if track.elevation_range() > 0.0 { track.elevation_range() } else { 1.0 };
      Self { geometry, distance_range, min_elevation: track.min_elevation, elevation_range }
   }

   pub fn x(&self, distance: f64) -> f64 { distance / self.distance_range * self.geometry.width }

   pub fn y(&self, elevation: f64) -> f64
   {
      self.geometry.plot_height - (elevation - self.min_elevation) / self.elevation_range * self.geometry.plot_height
   }

   pub fn project(&self, point: &TrackPoint) -> (f64, f64) { (self.x(point.distance), self.y(point.elevation)) }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PathCommand
{
   MoveTo { x: f64, y: f64 },
   LineTo { x: f64, y: f64 },
   Close,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProfilePath
{
   pub commands: Vec<PathCommand>,
}

impl ProfilePath
{
   /// SVG path data (`M x y L x y ... Z`) in chart coordinates.
   pub fn to_svg(&self) -> String
   //-----------------------------
   {
      self.commands
          .iter()
          .map(|command| match command
          {
             | PathCommand::MoveTo { x, y } => format!("M{:.2} {:.2}", x, y),
             | PathCommand::LineTo { x, y } => format!("L{:.2} {:.2}", x, y),
             | PathCommand::Close => "Z".to_string(),
          })
          .collect::<Vec<_>>()
          .join(" ")
   }
}

/// Profile polyline: a move to the first point then a line to each following point.
pub fn profile_path(track: &Track, geometry: ChartGeometry) -> ProfilePath
//-----------------------------------------------------------------------
{
   let projection = Projection::new(track, geometry);
   let commands = track.points
                       .iter()
                       .enumerate()
                       .map(|(i, point)|
                       {
                          let (x, y) = projection.project(point);
                          if i == 0 { PathCommand::MoveTo { x, y } } else { PathCommand::LineTo { x, y } }
                       })
                       .collect();
   ProfilePath { commands }
}

/// The profile polyline closed along the plot baseline, for filling under the curve.
pub fn profile_area(track: &Track, geometry: ChartGeometry) -> ProfilePath
//-----------------------------------------------------------------------
{
   let projection = Projection::new(track, geometry);
   let mut path = profile_path(track, geometry);
   if let (Some(first), Some(last)) = (track.points.first(), track.points.last())
   {
      path.commands.push(PathCommand::LineTo { x: projection.x(last.distance), y: geometry.plot_height });
      path.commands.push(PathCommand::LineTo { x: projection.x(first.distance), y: geometry.plot_height });
      path.commands.push(PathCommand::Close);
   }
   path
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AxisLabelKind
{
   Distance,
   Elevation,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AxisLabel
{
   pub kind: AxisLabelKind,
   pub x:    f64,
   pub y:    f64,
   pub text: String,
}

/// `distance_ticks` evenly spaced distance labels centred in the label band (at least two: start
/// and end), plus the max and min elevation at the top and bottom of the plot.
pub fn axis_labels(track: &Track, geometry: ChartGeometry, distance_ticks: usize) -> Vec<AxisLabel>
//-------------------------------------------------------------------------------------------------
{
   let projection = Projection::new(track, geometry);
   let ticks = distance_ticks.max(2);
   let label_y = geometry.plot_height + geometry.label_band / 2.0;

   let mut labels: Vec<AxisLabel> = (0..ticks).map(|i|
   {
      let distance = track.total_distance * i as f64 / (ticks - 1) as f64;
      AxisLabel { kind: AxisLabelKind::Distance, x: projection.x(distance), y: label_y, text: format!("{:.1} km", distance / 1000.0) }
   }).collect();

   labels.push(AxisLabel { kind: AxisLabelKind::Elevation, x: 0.0, y: projection.y(track.max_elevation), text: format!("{:.0} m", track.max_elevation) });
   labels.push(AxisLabel { kind: AxisLabelKind::Elevation, x: 0.0, y: geometry.plot_height, text: format!("{:.0} m", track.min_elevation) });
   labels
}

/// Position of the hovered point, both in chart coordinates and as percentages of the chart box
/// (including the label band) so a renderer can place a marker without knowing pixel sizes.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct HoverMarker
{
   pub index:        usize,
   pub x:            f64,
   pub y:            f64,
   pub left_percent: f64,
   pub top_percent:  f64,
   pub distance:     f64,
   pub elevation:    f64,
   pub longitude:    f64,
   pub latitude:     f64,
}

/// Pointer x relative to a box, 0 at the left edge and 1 at the right. A zero-width box gives a
/// non-finite value, which resolves to no hover.
pub fn relative_x(pointer_x: f64, box_left: f64, box_width: f64) -> f64 { (pointer_x - box_left) / box_width }

/// Index of the point whose distance is nearest to `rel_x * total_distance`, or `None` when
/// `rel_x` is outside `[0, 1]`. Ties go to the earliest point.
pub fn nearest_point_index(points: &[TrackPoint], total_distance: f64, rel_x: f64) -> Option<usize>
//-------------------------------------------------------------------------------------------------
{
   if !(0.0..=1.0).contains(&rel_x)
   {
      return None;
   }
   let target_distance = rel_x * total_distance;
   let mut best: Option<(usize, f64)> = None;
   for (i, point) in points.iter().enumerate()
   {
      let delta = (point.distance - target_distance).abs();
      match best
      {
         | Some((_, best_delta)) if delta >= best_delta => (),
         | _ => best = Some((i, delta)),
      }
   }
   best.map(|(i, _)| i)
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PointerEvent
{
   Enter { rel_x: f64 },
   Move { rel_x: f64 },
   Leave,
   TouchStart { rel_x: f64 },
   TouchMove { rel_x: f64 },
   TouchEnd,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct InteractionState
{
   pub selected_track: usize,
   pub hover_index:    Option<usize>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum LoadState
{
   Unloaded,
   Loading { generation: u64, sources: Vec<String> },
   Loaded(Vec<Track>),
}

/// Identifies one load request. Results are applied only for the latest ticket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadTicket
{
   generation: u64,
   sources:    Vec<String>,
}

impl LoadTicket
{
   pub fn generation(&self) -> u64 { self.generation }

   pub fn sources(&self) -> &[String] { &self.sources }
}

/// Owns the profile's interaction state for one mounted chart and reports hover changes to a map
/// surface through a [`LocationSink`].
pub struct ProfileController<S: LocationSink>
//===========================================
{
   geometry:    ChartGeometry,
   target:      String,
   sink:        S,
   state:       LoadState,
   interaction: InteractionState,
   generation:  u64,
}

impl<S: LocationSink> ProfileController<S>
//========================================
{
   pub fn new(geometry: ChartGeometry, target: impl Into<String>, sink: S) -> Self
   {
      Self { geometry: geometry.or_default(),
             target: target.into(),
             sink,
             state: LoadState::Unloaded,
             interaction: InteractionState::default(),
             generation: 0 }
   }

   pub fn geometry(&self) -> ChartGeometry { self.geometry }

   pub fn set_geometry(&mut self, geometry: ChartGeometry) { self.geometry = geometry.or_default(); }

   pub fn target(&self) -> &str { &self.target }

   /// Re-addresses future hover updates. A current hover is cleared on the old target first.
   pub fn set_target(&mut self, target: impl Into<String>)
   //-----------------------------------------------------
   {
      let target = target.into();
      if target != self.target
      {
         self.set_hover(None);
         self.target = target;
      }
   }

   pub fn sink(&self) -> &S { &self.sink }

   pub fn sink_mut(&mut self) -> &mut S { &mut self.sink }

   pub fn state(&self) -> &LoadState { &self.state }

   pub fn interaction(&self) -> InteractionState { self.interaction }

   pub fn hover_index(&self) -> Option<usize> { self.interaction.hover_index }

   pub fn selected_index(&self) -> usize { self.interaction.selected_track }

   pub fn is_loading(&self) -> bool { matches!(self.state, LoadState::Loading { .. }) }

   /// Loaded tracks; `None` until a load has completed, `Some(&[])` when it yielded nothing.
   pub fn tracks(&self) -> Option<&[Track]>
   {
      match &self.state
      {
         | LoadState::Loaded(tracks) => Some(tracks),
         | _ => None,
      }
   }

   pub fn selected_track(&self) -> Option<&Track> { self.tracks().and_then(|t| t.get(self.interaction.selected_track)) }

   /// Starts a load for `sources`. Any earlier, unfinished load becomes stale.
   pub fn begin_load(&mut self, sources: Vec<String>) -> LoadTicket
   //--------------------------------------------------------------
   {
      self.set_hover(None);
      self.generation += 1;
      self.interaction.selected_track = 0;
      self.state = LoadState::Loading { generation: self.generation, sources: sources.clone() };
      debug!("Load {} started for {} sources", self.generation, sources.len());
      LoadTicket { generation: self.generation, sources }
   }

   /// Applies a finished load. Returns `false` (and drops `tracks`) if `generation` is not the
   /// load currently in flight.
   pub fn finish_load(&mut self, generation: u64, tracks: Vec<Track>) -> bool
   //------------------------------------------------------------------------
   {
      match self.state
      {
         | LoadState::Loading { generation: current, .. } if current == generation =>
         {
            debug!("Load {} finished with {} tracks", generation, tracks.len());
            self.state = LoadState::Loaded(tracks);
            self.interaction = InteractionState::default();
            true
         }
         | _ =>
         {
            debug!("Discarding stale load {} (latest is {})", generation, self.generation);
            false
         }
      }
   }

   /// Switches the selected track. Out-of-range indexes are ignored (returns `false`); a change of
   /// track clears the hover since its index belongs to the previous track.
   pub fn select_track(&mut self, index: usize) -> bool
   //--------------------------------------------------
   {
      let count = self.tracks().map_or(0, |t| t.len());
      if index >= count
      {
         return false;
      }
      if index != self.interaction.selected_track
      {
         self.set_hover(None);
         self.interaction.selected_track = index;
      }
      true
   }

   pub fn handle(&mut self, event: PointerEvent)
   //-------------------------------------------
   {
      match event
      {
         | PointerEvent::Enter { rel_x }
         | PointerEvent::Move { rel_x }
         | PointerEvent::TouchStart { rel_x }
         | PointerEvent::TouchMove { rel_x } =>
         {
            let hover = self.selected_track().and_then(|t| nearest_point_index(&t.points, t.total_distance, rel_x));
            self.set_hover(hover);
         }
         | PointerEvent::Leave | PointerEvent::TouchEnd => self.set_hover(None),
      }
   }

   fn set_hover(&mut self, hover: Option<usize>)
   //--------------------------------------------
   {
      if self.interaction.hover_index == hover
      {
         return;
      }
      self.interaction.hover_index = hover;
      let location = hover.and_then(|i| self.selected_track().and_then(|t| t.points.get(i)))
                          .map(|p| HoverLocation { longitude: p.longitude, latitude: p.latitude });
      self.sink.dispatch(&self.target, location);
   }

   pub fn path(&self) -> Option<ProfilePath> { self.selected_track().map(|t| profile_path(t, self.geometry)) }

   pub fn area(&self) -> Option<ProfilePath> { self.selected_track().map(|t| profile_area(t, self.geometry)) }

   pub fn axis_labels(&self, distance_ticks: usize) -> Vec<AxisLabel>
   {
      self.selected_track().map(|t| axis_labels(t, self.geometry, distance_ticks)).unwrap_or_default()
   }

   pub fn hover_marker(&self) -> Option<HoverMarker>
   //-----------------------------------------------
   {
      let track = self.selected_track()?;
      let index = self.interaction.hover_index?;
      let point = track.points.get(index)?;
      let (x, y) = Projection::new(track, self.geometry).project(point);
      Some(HoverMarker { index,
                         x,
                         y,
                         left_percent: x / self.geometry.width * 100.0,
                         top_percent: y / self.geometry.total_height() * 100.0,
                         distance: point.distance,
                         elevation: point.elevation,
                         longitude: point.longitude,
                         latitude: point.latitude })
   }
}
