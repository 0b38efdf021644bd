use std::{path::PathBuf, process::ExitCode, sync::{Arc, OnceLock}};

use clap::Parser;
use eframe::egui;
use futures::executor::block_on;
use log::{error, info, warn};
use serde::Serialize;

use gpx_profile::{loader::{SourceFailure, SourceFetcher, load_tracks},
                  profile::{PointerEvent, ProfileController},
                  render::{render_profile, save_png},
                  settings::Settings,
                  surface::JsonLinesSink,
                  ProfileError,
                  Track};

mod components;
mod ui;

use crate::ui::{ProfileUI, StartupParameters};

#[derive(Parser, Debug)]
#[command(version, about = "Elevation profiles for GPX tracks", long_about = None)]
struct Args
{
   /// GPX files or http(s) URLs; defaults to the sources opened last
   #[arg()]
   sources: Vec<String>,

   /// Id of the map surface that receives the hovered location
   #[arg(short = 't', long = "target")]
   target: Option<String>,

   /// Index (from 0) of the track to show first
   #[arg(short = 's', long = "select")]
   select: Option<usize>,

   /// Load without opening a window and print track summaries as JSON
   #[arg(long = "headless")]
   headless: bool,

   /// Headless: relative pointer positions (0 to 1) to replay over the profile, e.g. 0.1,0.5,0.9.
   /// Each hover change is printed as a JSON line.
   #[arg(long = "scrub", value_delimiter = ',', allow_hyphen_values = true)]
   scrub: Vec<f64>,

   /// Headless: render the selected profile to a PNG file
   #[arg(long = "png")]
   png: Option<PathBuf>,

   /// Remember the given sources and target in the settings file
   #[arg(long = "save")]
   save: bool,
}

pub(crate) static SETTINGS: OnceLock<Arc<parking_lot::Mutex<Settings>>> = OnceLock::new();

#[derive(Serialize)]
struct TrackSummary<'a>
{
   name:           &'a str,
   points:         usize,
   total_distance: f64,
   elevation_gain: f64,
   min_elevation:  f64,
   max_elevation:  f64,
}

impl<'a> From<&'a Track> for TrackSummary<'a>
{
   fn from(track: &'a Track) -> Self
   {
      Self { name: &track.name,
             points: track.points.len(),
             total_distance: track.total_distance,
             elevation_gain: track.elevation_gain,
             min_elevation: track.min_elevation,
             max_elevation: track.max_elevation }
   }
}

#[derive(Serialize)]
struct LoadSummary<'a>
{
   tracks:   Vec<TrackSummary<'a>>,
   failures: &'a [SourceFailure],
}

/// Message for a `--select` index past the loaded tracks. Indices are 0-based, as on the command line.
pub(crate) fn missing_track_message(index: usize, loaded: usize) -> String
{
   format!("There is no track {} to select (0-based, {} loaded)", index, loaded)
}

fn main() -> ExitCode
{
   env_logger::init();
   let args = Args::parse();
   let settings = SETTINGS.get_or_init(|| Arc::new(parking_lot::Mutex::new(Settings::get_settings_or_default())));

   let sources = if args.sources.is_empty() { settings.lock().sources.clone() } else { args.sources.clone() };
   if args.save
   {
      let mut settings_lock = settings.lock();
      settings_lock.sources = sources.clone();
      if let Some(target) = &args.target
      {
         settings_lock.map_target = target.clone();
      }
      match settings_lock.write_settings()
      {
         | Ok(path) => info!("Saved sources to {}", path.display()),
         | Err(e) => warn!("Failed to write settings: {}", e),
      }
   }

   if args.headless || args.png.is_some() || !args.scrub.is_empty()
   {
      let settings = settings.lock().clone();
      return match run_headless(&args, &settings, sources)
      {
         | Ok(()) => ExitCode::SUCCESS,
         | Err(e) =>
         {
            error!("{}", e);
            eprintln!("{e}");
            ExitCode::FAILURE
         }
      };
   }

   let startup = StartupParameters { sources, target: args.target, select: args.select };
   let options = eframe::NativeOptions { viewport: egui::ViewportBuilder::default().with_inner_size([1200.0, 900.0]),
                                         ..Default::default() };
   let ret = eframe::run_native("GPXProfile",
                                options,
                                Box::new(move |cc| Ok(Box::new(ProfileUI::new(cc, startup)))));
   if let Err(e) = ret
   {
      eprintln!("Error starting user interface: {e}");
      return ExitCode::FAILURE;
   }
   ExitCode::SUCCESS
}

fn run_headless(args: &Args, settings: &Settings, sources: Vec<String>) -> Result<(), ProfileError>
//--------------------------------------------------------------------------------------------------
{
   if sources.is_empty()
   {
      return Err(ProfileError::Fetch("no track sources given".to_string()));
   }
   let target = args.target.clone().unwrap_or_else(|| settings.map_target.clone());
   let mut controller = ProfileController::new(settings.chart_geometry(), target, JsonLinesSink::new(std::io::stdout().lock()));

   let ticket = controller.begin_load(sources);
   let report = block_on(load_tracks(&SourceFetcher::new(), ticket.sources()));
   {
      let summary = LoadSummary { tracks: report.tracks.iter().map(TrackSummary::from).collect(), failures: &report.failures };
      let json = serde_json::to_string_pretty(&summary).map_err(std::io::Error::from)?;
      println!("{json}");
   }
   controller.finish_load(ticket.generation(), report.into_tracks());

   if let Some(index) = args.select
      && !controller.select_track(index)
   {
      warn!("{}", missing_track_message(index, controller.tracks().map_or(0, |t| t.len())));
   }

   for &rel_x in &args.scrub
   {
      controller.handle(PointerEvent::Move { rel_x });
   }
   let hover = controller.hover_index();
   if !args.scrub.is_empty()
   {
      controller.handle(PointerEvent::Leave);
   }

   if let Some(path) = &args.png
   {
      let track = controller.selected_track().ok_or(ProfileError::Empty)?;
      let pixmap = render_profile(track, controller.geometry(), hover, settings.gradient_thresholds())?;
      save_png(&pixmap, path)?;
      info!("Wrote profile of '{}' to {}", track.name, path.display());
   }
   Ok(())
}

#[cfg(test)]
mod tests
{
   use super::*;

   #[test]
   fn test_missing_track_message_uses_zero_based_index()
   {
      assert_eq!(missing_track_message(2, 2), "There is no track 2 to select (0-based, 2 loaded)");
      let args = Args::parse_from(["GPXProfile", "--select", "2", "a.gpx"]);
      assert_eq!(args.select, Some(2));
   }
}
