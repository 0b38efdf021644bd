use std::{collections::VecDeque, time::{Duration, Instant}};

use eframe::egui;
use gpx_profile::{loader::SourceFailure, surface::MapSurface, TrackPoint};
use walkers::{MapMemory, Plugin, Position, Projector, lon_lat};

/// Walkers plugin drawing the selected track and the profile's hovered location, read from the
/// map surface the profile controller dispatches to.
pub struct TrackOverlay
//======================
{
   pub(crate) track:   Vec<Position>,
   pub(crate) surface: MapSurface,
}

impl TrackOverlay
{
   pub fn new(points: &[TrackPoint], surface: MapSurface) -> Self
   {
      Self { track: points.iter().map(|p| lon_lat(p.longitude, p.latitude)).collect(), surface }
   }
}

impl Plugin for TrackOverlay
//==========================
{
   fn run(self: Box<Self>, ui: &mut egui::Ui, _response: &egui::Response, projector: &Projector, _map_memory: &MapMemory)
   //--------------------------------------------------------------------------------------------------------------------
   {
      let painter = ui.painter();
      let line: Vec<egui::Pos2> = self.track.iter().map(|p| projector.project(*p).to_pos2()).collect();
      if line.len() > 1
      {
         painter.add(egui::Shape::line(line, egui::Stroke::new(4.0, egui::Color32::from_rgb(220, 60, 60))));
      }

      if let Some(location) = self.surface.location()
      {
         let screen_pos = projector.project(lon_lat(location.longitude, location.latitude)).to_pos2();
         draw_hover_marker(ui, screen_pos);
      }
   }
}

fn draw_hover_marker(ui: &mut egui::Ui, position: egui::Pos2)
//-----------------------------------------------------------
{
   let painter = ui.painter();
   painter.circle_filled(position, 8.0, egui::Color32::from_rgb(255, 128, 128));
   painter.circle_stroke(position, 8.0, egui::Stroke::new(2.0, egui::Color32::WHITE));
   painter.circle_stroke(position, 11.0, egui::Stroke::new(1.5, egui::Color32::ORANGE));
}

//-----------------------------------------------------------------------------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ToastLevel
{
   Info,
   Warning,
   Error,
}

impl ToastLevel
{
   fn color(&self) -> egui::Color32
   {
      match self
      {
         | ToastLevel::Info => egui::Color32::from_rgb(60, 120, 216),
         | ToastLevel::Warning => egui::Color32::from_rgb(255, 165, 0),
         | ToastLevel::Error => egui::Color32::from_rgb(220, 53, 69),
      }
   }

   fn lifetime(&self) -> Duration
   {
      match self
      {
         | ToastLevel::Info => Duration::from_secs(3),
         | ToastLevel::Warning => Duration::from_secs(6),
         | ToastLevel::Error => Duration::from_secs(10),
      }
   }
}

struct Toast
{
   message:    String,
   level:      ToastLevel,
   expires_at: Instant,
}

const MAX_TOASTS: usize = 4;

/// Load and settings notices shown over the map. Repeated messages refresh the existing toast and
/// only the newest `MAX_TOASTS` are kept.
#[derive(Default)]
pub struct ToastManager
{
   toasts: VecDeque<Toast>,
}

impl ToastManager
{
   pub fn new() -> Self { Self::default() }

   fn push(&mut self, level: ToastLevel, message: String)
   //----------------------------------------------------
   {
      let expires_at = Instant::now() + level.lifetime();
      if let Some(existing) = self.toasts.iter_mut().find(|t| t.level == level && t.message == message)
      {
         existing.expires_at = expires_at;
         return;
      }
      self.toasts.push_back(Toast { message, level, expires_at });
      while self.toasts.len() > MAX_TOASTS
      {
         self.toasts.pop_front();
      }
   }

   pub fn info(&mut self, message: impl Into<String>) { self.push(ToastLevel::Info, message.into()); }

   pub fn warning(&mut self, message: impl Into<String>) { self.push(ToastLevel::Warning, message.into()); }

   pub fn error(&mut self, message: impl Into<String>) { self.push(ToastLevel::Error, message.into()); }

   /// One warning for the sources a load skipped. Each failure is already in the log.
   pub fn skipped_sources(&mut self, failures: &[SourceFailure])
   //-----------------------------------------------------------
   {
      match failures
      {
         | [] => (),
         | [failure] => self.warning(format!("Skipped {}: {}", failure.source, failure.error)),
         | _ => self.warning(format!("Skipped {} sources, see the log for details", failures.len())),
      }
   }

   pub fn len(&self) -> usize { self.toasts.len() }

   pub fn show(&mut self, ctx: &egui::Context)
   //-----------------------------------------
   {
      let now = Instant::now();
      self.toasts.retain(|toast| toast.expires_at > now);
      let Some(next_expiry) = self.toasts.iter().map(|t| t.expires_at).min() else { return };

      let screen_rect = ctx.content_rect();
      let toast_width = 360.0;
      let margin = 16.0;
      let mut y_offset = margin + 40.0;

      for (index, toast) in self.toasts.iter().enumerate()
      {
         let response = egui::Area::new(egui::Id::new("toast").with(index))
            .fixed_pos(egui::pos2(screen_rect.right() - toast_width - margin, screen_rect.top() + y_offset))
            .order(egui::Order::Foreground)
            .show(ctx, |ui|
            {
               egui::Frame::new()
                  .fill(egui::Color32::from_black_alpha(220))
                  .stroke(egui::Stroke::new(2.0, toast.level.color()))
                  .corner_radius(6.0)
                  .inner_margin(10.0)
                  .show(ui, |ui|
                  {
                     ui.set_width(toast_width - 20.0);
                     ui.label(egui::RichText::new(&toast.message).color(egui::Color32::WHITE).size(14.0));
                  });
            });
         y_offset += response.response.rect.height() + 8.0;
      }

      ctx.request_repaint_after(next_expiry.saturating_duration_since(now));
   }
}
