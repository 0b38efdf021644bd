use std::{env,
          fs::File,
          io::Write,
          path::{Path, PathBuf}};

use log::{info, warn};

use crate::{profile::ChartGeometry, render::GradientThresholds};

pub const PROGRAM: &str = "GPXProfile";
const SETTINGS_FILE: &str = "settings.json";

#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct Settings
{
   last_directory: PathBuf,
   pub map_target: String,
   pub chart_width: f64,
   pub plot_height: f64,
   pub label_band: f64,
   pub flat_gradient_percentage: f64,
   pub extreme_gradient_percentage: f64,
   pub sources: Vec<String>,
}

impl Default for Settings
{
   fn default() -> Self
   //------------------
   {
      let geometry = ChartGeometry::default();
      let gradients = GradientThresholds::default();
      Self
      {
         last_directory: Settings::get_home_dir(),
         map_target: "track-map".to_string(),
         chart_width: geometry.width,
         plot_height: geometry.plot_height,
         label_band: geometry.label_band,
         flat_gradient_percentage: gradients.flat,
         extreme_gradient_percentage: gradients.extreme,
         sources: Vec::new(),
      }
   }
}

impl Settings
//===========
{
   pub fn new() -> Self
   {
      Settings::default()
   }

   /// Chart geometry from the configured sizes; any invalid value falls back to the defaults.
   pub fn chart_geometry(&self) -> ChartGeometry
   //-------------------------------------------
   {
      let geometry = ChartGeometry::new(self.chart_width, self.plot_height, self.label_band);
      if !geometry.is_valid()
      {
         warn!("Invalid chart geometry {:?} in settings, using defaults", geometry);
      }
      geometry.or_default()
   }

   pub fn set_chart_geometry(&mut self, geometry: ChartGeometry)
   {
      self.chart_width = geometry.width;
      self.plot_height = geometry.plot_height;
      self.label_band = geometry.label_band;
   }

   pub fn gradient_thresholds(&self) -> GradientThresholds
   {
      GradientThresholds { flat: self.flat_gradient_percentage, extreme: self.extreme_gradient_percentage }
   }

   /// Settings from the program's config directory, or defaults when missing or unreadable.
   pub fn get_settings_or_default() -> Settings
   //-------------------------------------------
   {
      match Settings::get_settings_path()
      {
         | Ok(path) => Settings::load_from(&path),
         | Err(e) =>
         {
            warn!("Error getting settings path: {}", e);
            Settings::default()
         }
      }
   }

   /// Reads `path`. A missing file gives defaults silently; an unreadable one with a warning.
   pub fn load_from(path: &Path) -> Settings
   //---------------------------------------
   {
      if !path.exists()
      {
         return Settings::default();
      }
      let file = match File::open(path)
      {
         | Ok(f) => f,
         | Err(e) =>
         {
            warn!("Error opening settings file {}: {}", path.display(), e);
            return Settings::default();
         }
      };
      match serde_json::from_reader(file)
      {
         | Ok(s) => s,
         | Err(e) =>
         {
            warn!("Error reading settings {}: {}", path.display(), e);
            Settings::default()
         }
      }
   }

   pub fn save_to(&self, path: &Path) -> Result<(), std::io::Error>
   //---------------------------------------------------------------
   {
      let mut file = File::create(path)?;
      let json = serde_json::to_string_pretty(&self)?;
      file.write_all(json.as_bytes())?;
      info!("Wrote settings to {}", path.display());
      Ok(())
   }

   pub fn write_settings(&self) -> Result<PathBuf, std::io::Error>
   //--------------------------------------------------------------
   {
      let config_file = Settings::get_settings_path()?;
      self.save_to(&config_file)?;
      Ok(config_file)
   }

   pub fn set_last_directorybuf(&mut self, path: &Path) -> bool
   //-----------------------------------------------------------
   {
      if path.is_dir()
      {
         self.last_directory = path.to_path_buf();
         return true;
      }
      warn!("{} is not a directory", path.display());
      false
   }

   pub fn get_last_directorybuf(&self) -> PathBuf
   {
      self.last_directory.clone()
   }

   /// Get OS specific path to the config directory for the program
   pub fn get_config_path() -> Result<PathBuf, std::io::Error>
   //----------------------------------------------------------
   {
      let config_path = match dirs::config_dir()
      {
         | Some(p) => p.join(PROGRAM),
         | None =>
         {
            let mut config_path = Settings::get_home_dir();
            if env::consts::OS == "windows"
            {
               config_path.push("Application Data/Local Settings/");
            }
            else if env::consts::OS != "macos"
            {
               config_path.push(".config/");
            }
            config_path.push(PROGRAM);
            config_path
         }
      };
      if config_path.exists() && !config_path.is_dir()
      {
         return Err(std::io::Error::other(format!("Config path {} exists and is not a directory", config_path.display())));
      }
      if !config_path.exists()
      {
         std::fs::create_dir_all(config_path.as_path())?;
      }
      Ok(config_path)
   }

   /// Get the path to the settings file for the program.
   pub fn get_settings_path() -> Result<PathBuf, std::io::Error>
   {
      Ok(Settings::get_config_path()?.join(SETTINGS_FILE))
   }

   fn get_home_fallbacks() -> PathBuf
   //--------------------------------
   {
      if cfg!(target_os = "windows")
      {
         return PathBuf::from("C:/Users/Public")
      }
      env::temp_dir()
   }

   pub fn get_home_dir() -> PathBuf
   //-------------------------------
   {
      match dirs::home_dir()
      {
         | Some(h) => h,
         | None => Settings::get_home_fallbacks()
      }
   }
}
