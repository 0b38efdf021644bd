use std::{future::Future, path::PathBuf, sync::{Arc, mpsc::Sender}};

use eframe::egui::{self, Color32, ColorImage, Context, Frame, Pos2, Rect, Vec2};
use log::warn;
use walkers::{Map, lon_lat};

use gpx_profile::{profile::{AxisLabelKind, ChartGeometry, PathCommand, PointerEvent, relative_x},
                  render::render_profile,
                  settings::Settings};

use crate::{SETTINGS, components::TrackOverlay};

use super::ui::{ProfileUI, UiMessage};

const DISTANCE_LABELS: usize = 6;
const DEFAULT_CENTER: (f64, f64) = (0.0, 51.4779);
const MIN_PROFILE_HEIGHT: f32 = 80.0;

impl eframe::App for ProfileUI
//============================
{
   fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame)
   //------------------------------------------------------------------
   {
      set_style(ctx);
      self.process_messages(ctx);

      egui::TopBottomPanel::top("top_panel").min_height(36.0)
      .frame(Frame::new().fill(Color32::from_rgb(169, 157, 133)).inner_margin(6.0))
      .show(ctx, |ui|
      {
         ui.horizontal(|ui|
         {
            if ui.button("  📂 Open  ").on_hover_text("Open one or more GPX files").clicked()
            {
               open_file_dialog(ui.ctx(), self.channel.0.clone());
            }
            if ui.button("  ⚙  ").on_hover_text("Settings").clicked()
            {
               self.open_settings_dialog();
            }
            ui.separator();
            self.track_selector(ui);
         });
      });

      let content = ctx.content_rect();
      let geometry = self.controller.geometry();
      let profile_height = profile_panel_height(content, geometry.aspect_ratio() as f32);
      egui::TopBottomPanel::bottom("profile_panel").exact_height(profile_height)
      .frame(Frame::new().fill(Color32::from_rgb(224, 224, 224)))
      .show(ctx, |ui|
      {
         self.profile_view(ctx, ui);
      });

      egui::CentralPanel::default().frame(Frame::new())
      .show(ctx, |ui|
      {
         if let (Some(tiles), Some(memory)) = (&mut self.tiles, &mut self.map_memory)
         {
            let track = self.controller.selected_track();
            let center = track.and_then(|t| t.first_point())
                              .map(|p| lon_lat(p.longitude, p.latitude))
                              .unwrap_or_else(|| lon_lat(DEFAULT_CENTER.0, DEFAULT_CENTER.1));
            if self.is_new_track
            {
               memory.center_at(center);
               if let Err(e) = memory.set_zoom(13.0)
               {
                  warn!("Failed to set map zoom: {:?}", e);
               }
               self.is_new_track = false;
            }
            let mut map = Map::new(Some(tiles), memory, center);
            if let Some(track) = track
            {
               map = map.with_plugin(TrackOverlay::new(&track.points, self.surface.clone()));
            }
            ui.add(map);
         }
      });

      if self.show_settings_dialog
      {
         self.settings_dialog(ctx);
      }
      self.toast_manager.show(ctx);
   }
}

impl ProfileUI
//============
{
   fn track_selector(&mut self, ui: &mut egui::Ui)
   //---------------------------------------------
   {
      if self.controller.is_loading()
      {
         ui.add(egui::Spinner::new());
         ui.label(egui::RichText::new("Loading tracks...").color(Color32::BLACK));
         return;
      }
      let Some(tracks) = self.controller.tracks()
      else
      {
         ui.label(egui::RichText::new("Open one or more GPX files to see their elevation profile.").color(Color32::BLACK));
         return;
      };
      if tracks.is_empty()
      {
         ui.label(egui::RichText::new("No track could be loaded.").color(Color32::DARK_RED));
         return;
      }

      let mut selected = self.controller.selected_index();
      let names: Vec<String> = tracks.iter().map(|t| t.name.clone()).collect();
      egui::ComboBox::from_id_salt("track_selector")
         .width(260.0)
         .selected_text(names.get(selected).cloned().unwrap_or_default())
         .show_ui(ui, |ui|
         {
            for (i, name) in names.iter().enumerate()
            {
               ui.selectable_value(&mut selected, i, name);
            }
         });

      if let Some(track) = self.controller.selected_track()
      {
         ui.separator();
         ui.label(egui::RichText::new(format!("{:.2} km   ↗ {:.0} m   {:.0} m to {:.0} m   {} points",
                                              track.total_distance / 1000.0,
                                              track.elevation_gain,
                                              track.min_elevation,
                                              track.max_elevation,
                                              track.points.len()))
                  .color(Color32::BLACK));
      }
      self.select_track(selected);
   }

   /// Interactive profile chart: gradient raster from `render_profile`, with the controller's path,
   /// axis labels and hover marker painted over it.
   fn profile_view(&mut self, ctx: &Context, ui: &mut egui::Ui)
   //----------------------------------------------------------
   {
      let (rect, response) = ui.allocate_exact_size(ui.available_size(), egui::Sense::hover());
      self.pointer_events(ctx, rect, &response);

      let geometry = self.controller.geometry();
      let Some(track) = self.controller.selected_track()
      else
      {
         return;
      };

      let raster_size = [geometry.width.ceil() as usize, geometry.total_height().ceil() as usize];
      let key = (self.loaded_generation, self.controller.selected_index(), raster_size);
      if self.texture_key != Some(key)
      {
         match render_profile(track, geometry, None, self.thresholds)
         {
            | Ok(pixmap) =>
            {
               let image = ColorImage::from_rgba_premultiplied([pixmap.width() as usize, pixmap.height() as usize], pixmap.data());
               match &mut self.profile_texture
               {
                  | Some(texture) => texture.set(image, egui::TextureOptions::LINEAR),
                  | None => self.profile_texture = Some(ctx.load_texture("profile_image", image, egui::TextureOptions::LINEAR)),
               }
            }
            | Err(e) => warn!("Error rendering profile: {}", e),
         }
         self.texture_key = Some(key);
      }

      let painter = ui.painter_at(rect);
      if let Some(texture) = &self.profile_texture
      {
         painter.image(texture.id(), rect, Rect::from_min_max(Pos2::ZERO, Pos2::new(1.0, 1.0)), Color32::WHITE);
      }

      let to_screen = |x: f64, y: f64| -> Pos2
      {
         Pos2::new(rect.left() + (x / geometry.width) as f32 * rect.width(),
                   rect.top() + (y / geometry.total_height()) as f32 * rect.height())
      };

      if let Some(path) = self.controller.path()
      {
         let line: Vec<Pos2> = path.commands
                                   .iter()
                                   .filter_map(|c| match c
                                   {
                                      | PathCommand::MoveTo { x, y } | PathCommand::LineTo { x, y } => Some(to_screen(*x, *y)),
                                      | PathCommand::Close => None,
                                   })
                                   .collect();
         if line.len() > 1
         {
            painter.add(egui::Shape::line(line, egui::Stroke::new(2.0, Color32::from_rgb(40, 40, 40))));
         }
      }

      let font = egui::FontId::proportional(13.0);
      for label in self.controller.axis_labels(DISTANCE_LABELS)
      {
         let pos = to_screen(label.x, label.y);
         let (pos, align) = match label.kind
         {
            | AxisLabelKind::Distance => (pos, egui::Align2::CENTER_CENTER),
            | AxisLabelKind::Elevation if label.y <= 0.0 => (pos + Vec2::new(4.0, 2.0), egui::Align2::LEFT_TOP),
            | AxisLabelKind::Elevation => (pos + Vec2::new(4.0, -2.0), egui::Align2::LEFT_BOTTOM),
         };
         painter.text(pos, align, label.text, font.clone(), Color32::BLACK);
      }

      if let Some(marker) = self.controller.hover_marker()
      {
         let pos = to_screen(marker.x, marker.y);
         let baseline = to_screen(marker.x, geometry.plot_height);
         painter.line_segment([Pos2::new(pos.x, rect.top()), baseline], egui::Stroke::new(1.0, Color32::DARK_GRAY));
         painter.circle_filled(pos, 5.0, Color32::from_rgb(255, 100, 100));
         painter.circle_stroke(pos, 5.0, egui::Stroke::new(1.5, Color32::BLACK));
         let align = if marker.left_percent > 80.0 { egui::Align2::RIGHT_BOTTOM } else { egui::Align2::LEFT_BOTTOM };
         let offset = if marker.left_percent > 80.0 { Vec2::new(-8.0, -8.0) } else { Vec2::new(8.0, -8.0) };
         painter.text(pos + offset,
                      align,
                      format!("{:.2} km, {:.0} m", marker.distance / 1000.0, marker.elevation),
                      font,
                      Color32::BLACK);
      }
   }

   /// Translates egui's pointer and touch state over the chart into [`PointerEvent`]s.
   fn pointer_events(&mut self, ctx: &Context, rect: Rect, response: &egui::Response)
   //-------------------------------------------------------------------------------
   {
      let touching = ctx.input(|i| i.any_touches());
      let event = match response.hover_pos()
      {
         | Some(pos) =>
         {
            let rel_x = relative_x(pos.x as f64, rect.left() as f64, rect.width() as f64);
            match (touching, self.touch_active, self.pointer_inside)
            {
               | (true, false, _) => Some(PointerEvent::TouchStart { rel_x }),
               | (true, true, _) => Some(PointerEvent::TouchMove { rel_x }),
               | (false, true, _) => Some(PointerEvent::TouchEnd),
               | (false, false, false) => Some(PointerEvent::Enter { rel_x }),
               | (false, false, true) => Some(PointerEvent::Move { rel_x }),
            }
         }
         | None if self.touch_active => Some(PointerEvent::TouchEnd),
         | None if self.pointer_inside => Some(PointerEvent::Leave),
         | None => None,
      };
      if let Some(event) = event
      {
         self.controller.handle(event);
         match event
         {
            | PointerEvent::TouchStart { .. } | PointerEvent::TouchMove { .. } => self.touch_active = true,
            | PointerEvent::TouchEnd => { self.touch_active = false; self.pointer_inside = false; }
            | PointerEvent::Enter { .. } | PointerEvent::Move { .. } => self.pointer_inside = true,
            | PointerEvent::Leave => self.pointer_inside = false,
         }
      }
   }

   fn open_settings_dialog(&mut self)
   //--------------------------------
   {
      let settings = SETTINGS.get_or_init(|| Arc::new(parking_lot::Mutex::new(Settings::get_settings_or_default())));
      self.temp_settings = settings.lock().clone();
      self.show_settings_dialog = true;
   }

   fn settings_dialog(&mut self, ctx: &Context)
   //------------------------------------------
   {
      let mut is_save = false;
      let mut is_cancel = false;
      egui::Window::new("Settings")
         .collapsible(false)
         .resizable(false)
         .anchor(egui::Align2::CENTER_CENTER, [0.0, 0.0])
         .show(ctx, |ui|
         {
            ui.set_min_width(420.0);
            egui::Grid::new("settings_grid").num_columns(2).spacing([10.0, 10.0]).striped(true).show(ui, |ui|
            {
               ui.label("Map target:");
               ui.add_sized(Vec2::new(240.0, 28.0), egui::TextEdit::singleline(&mut self.temp_settings.map_target))
                 .on_hover_text("Id of the map surface that receives the hovered location");
               ui.end_row();

               ui.label("Chart width:");
               ui.add(egui::DragValue::new(&mut self.temp_settings.chart_width).range(100.0..=4000.0).speed(10.0));
               ui.end_row();

               ui.label("Plot height:");
               ui.add(egui::DragValue::new(&mut self.temp_settings.plot_height).range(20.0..=2000.0).speed(5.0));
               ui.end_row();

               ui.label("Label band:");
               ui.add(egui::DragValue::new(&mut self.temp_settings.label_band).range(0.0..=400.0).speed(1.0));
               ui.end_row();

               ui.label("Flat Gradient (%):");
               ui.add(egui::DragValue::new(&mut self.temp_settings.flat_gradient_percentage).range(0.1..=2.0).speed(0.1).max_decimals(1))
                 .on_hover_text("The gradient considered to be 'flat', e.g if 0.5 then -0.5 to 0.5 is flat");
               ui.end_row();

               ui.label("Extreme Gradient (%):");
               ui.add(egui::DragValue::new(&mut self.temp_settings.extreme_gradient_percentage).range(5.0..=25.0).speed(0.5).max_decimals(1))
                 .on_hover_text("Gradients at or above this are drawn black");
               ui.end_row();
            });
            ui.separator();
            ui.horizontal(|ui|
            {
               is_save = ui.button("Save").clicked();
               is_cancel = ui.button("Cancel").clicked();
            });
         });

      if is_save
      {
         self.apply_settings();
      }
      if is_save || is_cancel
      {
         self.show_settings_dialog = false;
      }
   }

   fn apply_settings(&mut self)
   //--------------------------
   {
      let updated = self.temp_settings.clone();
      let geometry: ChartGeometry = updated.chart_geometry();
      self.controller.set_geometry(geometry);
      self.thresholds = updated.gradient_thresholds();
      let target = updated.map_target.trim().to_string();
      if !target.is_empty() && target != self.controller.target()
      {
         self.surface = self.controller.sink().register(&target);
         self.controller.set_target(target);
      }
      self.texture_key = None;

      let settings = SETTINGS.get_or_init(|| Arc::new(parking_lot::Mutex::new(Settings::get_settings_or_default())));
      let mut settings_lock = settings.lock();
      *settings_lock = updated;
      match settings_lock.write_settings()
      {
         | Ok(_) => self.toast_manager.info("Settings saved"),
         | Err(e) => self.toast_manager.error(format!("Failed to write settings: {}", e)),
      }
   }
}

fn open_file_dialog(ctx: &Context, sender: Sender<UiMessage>)
//-----------------------------------------------------------
{
   let pick_dir: PathBuf;
   {
      let settings = SETTINGS.get_or_init(|| Arc::new(parking_lot::Mutex::new(Settings::get_settings_or_default())));
      pick_dir = settings.lock().get_last_directorybuf();
   }
   let dialog_future = rfd::AsyncFileDialog::new().set_directory(pick_dir).add_filter("GPX", &["gpx", "GPX"]).pick_files();
   let ctxx = ctx.clone();
   execute(async move
   {
      let Some(files) = dialog_future.await
      else
      {
         return;
      };
      if let Some(dir) = files.first().and_then(|f| f.path().parent())
      {
         let settings = SETTINGS.get_or_init(|| Arc::new(parking_lot::Mutex::new(Settings::get_settings_or_default())));
         settings.lock().set_last_directorybuf(dir);
      }
      let sources: Vec<String> = files.iter().map(|f| f.path().display().to_string()).collect();
      if !sources.is_empty()
      {
         let _ = sender.send(UiMessage::SourcesPicked(sources));
         ctxx.request_repaint();
      }
   });
}

/// Profile panel height for the chart aspect, capped at half the window but never below
/// `MIN_PROFILE_HEIGHT`, even when the window is shorter than that.
fn profile_panel_height(content: Rect, aspect: f32) -> f32
//---------------------------------------------------------
{
   let max_height = (content.height() * 0.5).max(MIN_PROFILE_HEIGHT);
   (content.width() * aspect).max(MIN_PROFILE_HEIGHT).min(max_height)
}

pub(crate) fn execute<F: Future<Output = ()> + Send + 'static>(f: F)
{
   std::thread::spawn(move || futures::executor::block_on(f));
}

fn set_style(ctx: &Context)
//--------------------
{
   let mut style: egui::Style = (*ctx.style()).clone();
   style.visuals.window_fill = Color32::from_rgb(30, 30, 30);
   style.text_styles = [(egui::TextStyle::Heading, egui::FontId::new(24.0, egui::FontFamily::Proportional)),
                        (egui::TextStyle::Body, egui::FontId::new(16.0, egui::FontFamily::Proportional)),
                        (egui::TextStyle::Monospace, egui::FontId::new(16.0, egui::FontFamily::Monospace)),
                        (egui::TextStyle::Button, egui::FontId::new(16.0, egui::FontFamily::Proportional)),
                        (egui::TextStyle::Small, egui::FontId::new(12.0, egui::FontFamily::Proportional))].into();
   ctx.set_style(style);
}
