use std::fs;
use std::path::{Path, PathBuf};

use directories::{BaseDirs, ProjectDirs};
use inquire::Text;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::codec;
use crate::error::ConfigError;

const DEFAULT_BASE_URL: &str = "http://localhost:5173/invoicegen/";

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct AppSettings {
    /// Page that share links point at.
    pub base_url: String,
    /// Local folder holding the known logo files; `~` allowed.
    pub asset_dir: Option<String>,
    /// Where exported PDFs go; `~` allowed.
    pub output_dir: String,
    /// Folder that may hold an `invoice.typ.tera` overriding the built-in page.
    pub template_dir: Option<String>,
    pub typst_bin: String,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            asset_dir: None,
            output_dir: "~/Documents/Invoices".to_string(),
            template_dir: None,
            typst_bin: "typst".to_string(),
        }
    }
}

impl AppSettings {
    pub fn output_path(&self) -> PathBuf {
        PathBuf::from(expand_home_dir(&self.output_dir))
    }

    pub fn asset_path(&self) -> Option<PathBuf> {
        self.asset_dir.as_deref().map(|d| PathBuf::from(expand_home_dir(d)))
    }

    pub fn template_path(&self) -> Option<PathBuf> {
        self.template_dir.as_deref().map(|d| PathBuf::from(expand_home_dir(d)))
    }
}

pub fn get_config_path() -> PathBuf {
    if let Some(proj_dirs) = ProjectDirs::from("com", "gst-invoice", "app") {
        let config_dir = proj_dirs.config_dir();
        if !config_dir.exists() {
            fs::create_dir_all(config_dir).ok();
        }
        return config_dir.join("settings.toml");
    }
    PathBuf::from("settings.toml")
}

pub fn load_settings_from(path: &Path) -> Result<Option<AppSettings>, ConfigError> {
    if !path.exists() {
        return Ok(None);
    }
    let content = fs::read_to_string(path)?;
    Ok(Some(toml::from_str(&content)?))
}

/// Settings from disk, or defaults when the file is missing or unreadable.
pub fn load_settings() -> AppSettings {
    let path = get_config_path();
    match load_settings_from(&path) {
        Ok(Some(settings)) => {
            debug!("loaded settings from {:?}", path);
            settings
        }
        Ok(None) => AppSettings::default(),
        Err(e) => {
            warn!("ignoring settings at {:?}: {}", path, e);
            AppSettings::default()
        }
    }
}

pub fn save_settings_to(path: &Path, settings: &AppSettings) -> Result<(), ConfigError> {
    let toml_str = toml::to_string_pretty(settings)?;
    fs::write(path, toml_str)?;
    Ok(())
}

pub fn setup_config_wizard() -> Result<AppSettings, ConfigError> {
    println!("\n⚙️  --- Configuration Setup ---");
    let current = load_settings();

    let base_url = loop {
        let input = Text::new("Share link base URL:").with_default(&current.base_url).prompt()?;
        match codec::parse_base(&input) {
            Ok(_) => break input,
            Err(e) => println!("❌ {e}"),
        }
    };

    println!("📂 Opening folder picker for the PDF output folder...");
    let picked_path = rfd::FileDialog::new()
        .set_title("Select Invoice Output Directory")
        .pick_folder();

    let output_dir = match picked_path {
        Some(path) => path.to_string_lossy().to_string(),
        None => {
            println!("❌ No folder selected. Falling back to manual input.");
            Text::new("Output Directory:").with_default(&current.output_dir).prompt()?
        }
    };

    let asset_default = current.asset_dir.clone().unwrap_or_default();
    let asset_input = Text::new("Logo asset folder (Optional, press Enter to skip):")
        .with_default(&asset_default)
        .prompt()?;
    let asset_dir = if asset_input.trim().is_empty() { None } else { Some(asset_input.trim().to_string()) };

    let settings = AppSettings { base_url, output_dir, asset_dir, ..current };

    let path = get_config_path();
    save_settings_to(&path, &settings)?;
    println!("✅ Settings saved.");
    Ok(settings)
}

pub fn expand_home_dir(path: &str) -> String {
    if path.starts_with('~') {
        if let Some(base_dirs) = BaseDirs::new() {
            let home = base_dirs.home_dir().to_string_lossy();
            return path.replacen('~', &home, 1);
        }
    }
    path.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_is_not_an_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        assert!(load_settings_from(&dir.path().join("settings.toml")).expect("ok").is_none());
    }

    #[test]
    fn settings_round_trip_through_toml() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("settings.toml");
        let settings = AppSettings {
            base_url: "https://invoices.example.com/".to_string(),
            asset_dir: Some("/srv/logos".to_string()),
            ..AppSettings::default()
        };
        save_settings_to(&path, &settings).expect("saved");
        assert_eq!(load_settings_from(&path).expect("ok"), Some(settings));
    }

    #[test]
    fn partial_file_fills_in_defaults() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("settings.toml");
        fs::write(&path, "base_url = \"https://x.example.com/\"\n").expect("write");
        let settings = load_settings_from(&path).expect("ok").expect("present");
        assert_eq!(settings.base_url, "https://x.example.com/");
        assert_eq!(settings.typst_bin, "typst");
    }

    #[test]
    fn garbage_is_a_parse_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("settings.toml");
        fs::write(&path, "base_url = [").expect("write");
        assert!(matches!(load_settings_from(&path), Err(ConfigError::Parse(_))));
    }

    #[test]
    fn home_expansion_leaves_plain_paths() {
        assert_eq!(expand_home_dir("/tmp/out"), "/tmp/out");
        assert!(!expand_home_dir("~/out").starts_with('~') || BaseDirs::new().is_none());
    }
}
