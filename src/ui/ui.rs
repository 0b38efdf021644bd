use std::sync::{Arc, mpsc::{Receiver, Sender, channel}};

use eframe::{CreationContext, egui::{Context, TextureHandle}};
use log::{info, warn};
use walkers::{HttpTiles, MapMemory, sources::OpenStreetMap};

use gpx_profile::{loader::{LoadReport, SourceFetcher, load_tracks},
                  profile::ProfileController,
                  render::GradientThresholds,
                  settings::Settings,
                  surface::{MapSurface, MapSurfaces}};

use crate::{SETTINGS, components::ToastManager};

/// Messages from worker threads back to the UI thread.
pub enum UiMessage
{
   SourcesPicked(Vec<String>),
   Loaded { generation: u64, report: LoadReport },
}

/// What the viewer was started with on the command line.
#[derive(Debug, Clone, Default)]
pub struct StartupParameters
{
   pub sources: Vec<String>,
   pub target:  Option<String>,
   pub select:  Option<usize>,
}

pub struct ProfileUI
//==================
{
   pub(crate) controller:      ProfileController<MapSurfaces>,
   pub(crate) surface:         MapSurface,
   pub(crate) fetcher:         Arc<SourceFetcher>,
   pub(crate) channel:         (Sender<UiMessage>, Receiver<UiMessage>),
   pub(crate) toast_manager:   ToastManager,
   pub(crate) tiles:           Option<HttpTiles>,
   pub(crate) map_memory:      Option<MapMemory>,
   pub(crate) thresholds:      GradientThresholds,
   pub(crate) pending_select:  Option<usize>,
   pub(crate) is_new_track:    bool,
   pub(crate) pointer_inside:  bool,
   pub(crate) touch_active:    bool,
   pub(crate) profile_texture: Option<TextureHandle>,
   pub(crate) texture_key:     Option<(u64, usize, [usize; 2])>,
   pub(crate) loaded_generation: u64,

   pub show_settings_dialog: bool,
   pub(crate) temp_settings: Settings,
}

impl ProfileUI
//============
{
   pub fn new(cc: &CreationContext, startup: StartupParameters) -> Self
   //------------------------------------------------------------------
   {
      let settings = SETTINGS.get_or_init(|| Arc::new(parking_lot::Mutex::new(Settings::get_settings_or_default()))).lock().clone();
      let target = startup.target.unwrap_or_else(|| settings.map_target.clone());
      let surfaces = MapSurfaces::new();
      let surface = surfaces.register(&target);
      let controller = ProfileController::new(settings.chart_geometry(), target, surfaces);

      let mut app = Self
      {
         controller,
         surface,
         fetcher: Arc::new(SourceFetcher::new()),
         channel: channel(),
         toast_manager: ToastManager::new(),
         tiles: Some(HttpTiles::new(OpenStreetMap, cc.egui_ctx.clone())),
         map_memory: Some(MapMemory::default()),
         thresholds: settings.gradient_thresholds(),
         pending_select: startup.select,
         is_new_track: false,
         pointer_inside: false,
         touch_active: false,
         profile_texture: None,
         texture_key: None,
         loaded_generation: 0,
         show_settings_dialog: false,
         temp_settings: settings,
      };
      if !startup.sources.is_empty()
      {
         app.start_load(&cc.egui_ctx, startup.sources);
      }
      app
   }

   /// Starts loading `sources` on a worker thread. The result comes back as [`UiMessage::Loaded`]
   /// and is applied only if no newer load has started meanwhile.
   pub(crate) fn start_load(&mut self, ctx: &Context, sources: Vec<String>)
   //----------------------------------------------------------------------
   {
      info!("Loading {} track sources", sources.len());
      let ticket = self.controller.begin_load(sources);
      let fetcher = self.fetcher.clone();
      let sender = self.channel.0.clone();
      let ctxx = ctx.clone();
      super::frame::execute(async move
      {
         let report = load_tracks(fetcher.as_ref(), ticket.sources()).await;
         let _ = sender.send(UiMessage::Loaded { generation: ticket.generation(), report });
         ctxx.request_repaint();
      });
   }

   /// Drains worker messages. Runs on the UI thread, so state changes stay serialized.
   pub(crate) fn process_messages(&mut self, ctx: &Context)
   //------------------------------------------------------
   {
      while let Ok(message) = self.channel.1.try_recv()
      {
         match message
         {
            | UiMessage::SourcesPicked(sources) =>
            {
               {
                  let settings = SETTINGS.get_or_init(|| Arc::new(parking_lot::Mutex::new(Settings::get_settings_or_default())));
                  let mut settings_lock = settings.lock();
                  settings_lock.sources = sources.clone();
                  if let Err(e) = settings_lock.write_settings()
                  {
                     warn!("Failed to write settings: {}", e);
                  }
               }
               self.start_load(ctx, sources);
            }
            | UiMessage::Loaded { generation, report } => self.apply_report(generation, report),
         }
      }
   }

   fn apply_report(&mut self, generation: u64, report: LoadReport)
   //-------------------------------------------------------------
   {
      let LoadReport { tracks, failures } = report;
      if !self.controller.finish_load(generation, tracks)
      {
         return;
      }
      self.toast_manager.skipped_sources(&failures);
      let count = self.controller.tracks().map_or(0, |t| t.len());
      if count == 0
      {
         self.toast_manager.error("None of the selected sources contained a usable track.");
      }
      else
      {
         self.toast_manager.info(format!("Loaded {} track{}", count, if count == 1 { "" } else { "s" }));
      }
      if let Some(index) = self.pending_select.take()
         && !self.controller.select_track(index)
      {
         self.toast_manager.warning(crate::missing_track_message(index, count));
      }
      self.loaded_generation = generation;
      self.texture_key = None;
      self.is_new_track = true;
      self.pointer_inside = false;
      self.touch_active = false;
   }

   pub(crate) fn select_track(&mut self, index: usize)
   {
      if index != self.controller.selected_index() && self.controller.select_track(index)
      {
         self.is_new_track = true;
      }
   }
}
