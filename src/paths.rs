use anyhow::{Context, Result};
use std::path::PathBuf;

/// Environment override for the application data directory
pub const DATA_DIR_ENV: &str = "NORMCAP_DATA_DIR";

/// Get the application data directory based on platform
pub fn get_app_data_dir() -> Result<PathBuf> {
    if let Ok(dir) = std::env::var(DATA_DIR_ENV) {
        return Ok(PathBuf::from(dir));
    }

    #[cfg(target_os = "macos")]
    {
        let home = dirs::home_dir()
            .or_else(|| std::env::var("HOME").ok().map(PathBuf::from))
            .context("Failed to get home directory - neither dirs::home_dir() nor HOME env var worked")?;
        Ok(home.join("Library/Application Support/NormCap"))
    }

    #[cfg(target_os = "windows")]
    {
        let app_data = dirs::config_dir().context("Failed to locate the roaming AppData directory")?;
        Ok(app_data.join("NormCap"))
    }

    #[cfg(not(any(target_os = "macos", target_os = "windows")))]
    {
        let config = dirs::config_dir()
            .or_else(|| dirs::home_dir().map(|home| home.join(".config")))
            .context("Failed to get config directory - neither XDG config dir nor home dir available")?;
        Ok(config.join("normcap"))
    }
}

/// Get the path to the logs directory
pub fn get_logs_dir() -> Result<PathBuf> {
    Ok(get_app_data_dir()?.join("logs"))
}

/// Get the path to the config file
pub fn get_config_file() -> Result<PathBuf> {
    Ok(get_app_data_dir()?.join("config.json"))
}

/// Create all necessary directories
pub fn ensure_directories_exist() -> Result<()> {
    let app_dir = get_app_data_dir()?;

    std::fs::create_dir_all(&app_dir).context("Failed to create app data directory")?;
    std::fs::create_dir_all(app_dir.join("logs")).context("Failed to create logs directory")?;

    Ok(())
}
