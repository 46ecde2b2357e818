mod config;
pub mod database;
pub mod migrations;

pub use config::{Config, ProgressSettings, WidgetSettings, MIN_CADENCE_SECS};
pub use database::Database;

use std::path::PathBuf;

/// Returns the data directory, creating it if needed.
///
/// `YEARPROGRESS_HOME` wins when set. Otherwise `~/.config/yearprogress/`,
/// or `~/.config/yearprogress-dev/` when `YEARPROGRESS_ENV=dev`.
///
/// # Errors
/// Returns an error if creating the directory fails.
pub fn data_dir() -> std::io::Result<PathBuf> {
    let dir = match std::env::var_os("YEARPROGRESS_HOME") {
        Some(home) if !home.is_empty() => PathBuf::from(home),
        _ => {
            let base_dir = dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(".config");

            let env = std::env::var("YEARPROGRESS_ENV")
                .unwrap_or_else(|_| "production".to_string());
            if env == "dev" {
                base_dir.join("yearprogress-dev")
            } else {
                base_dir.join("yearprogress")
            }
        }
    };

    std::fs::create_dir_all(&dir)?;
    Ok(dir)
}
