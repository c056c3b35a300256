pub mod config;
pub mod process;
pub mod run;
pub mod scan;

use std::path::{Path, PathBuf};

use invscan_core::models::config::ScanMode;
use invscan_core::AppConfig;

/// Invoice grouping on the command line.
#[derive(Clone, Copy, Debug, clap::ValueEnum)]
pub enum ModeArg {
    /// One invoice per sub-folder
    Folders,
    /// One invoice per image
    Files,
}

impl From<ModeArg> for ScanMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Folders => ScanMode::Folders,
            ModeArg::Files => ScanMode::Files,
        }
    }
}

/// `{config_dir}/invscan/config.json`.
pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("invscan")
        .join("config.json")
}

/// The config file a command works on.
pub fn config_file(config_path: Option<&str>) -> PathBuf {
    config_path
        .map(PathBuf::from)
        .unwrap_or_else(default_config_path)
}

/// Configuration as stored in the file, or defaults when there is none.
///
/// An explicitly given path must exist.
pub fn load_file_config(config_path: Option<&str>) -> anyhow::Result<AppConfig> {
    let path = config_file(config_path);
    if config_path.is_some() || path.exists() {
        read_config(&path)
    } else {
        Ok(AppConfig::default())
    }
}

/// File configuration with environment overrides applied.
pub fn load_config(config_path: Option<&str>) -> anyhow::Result<AppConfig> {
    let mut config = load_file_config(config_path)?;
    config.apply_env();
    Ok(config)
}

fn read_config(path: &Path) -> anyhow::Result<AppConfig> {
    AppConfig::from_file(path)
        .map_err(|e| anyhow::anyhow!("Failed to read config {}: {}", path.display(), e))
}
