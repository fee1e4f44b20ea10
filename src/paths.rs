//! Path resolution for sous-vide
//!
//! # Environment Variables
//!
//! - `SOUS_VIDE_CONFIG_DIR` - Override config directory
//! - `SOUS_VIDE_STATE_DIR` - Override state directory (default report location)
//!
//! # Path Resolution Priority
//!
//! For config_dir():
//! 1. `SOUS_VIDE_CONFIG_DIR` environment variable
//! 2. `XDG_CONFIG_HOME/sous-vide` (if set)
//! 3. Platform default:
//!    - Windows: `%APPDATA%\sous-vide`
//!    - macOS/Linux: `~/.config/sous-vide`
//!
//! For state_dir():
//! 1. `SOUS_VIDE_STATE_DIR` environment variable
//! 2. `XDG_STATE_HOME/sous-vide` (if set)
//! 3. Platform default:
//!    - Windows: `%LOCALAPPDATA%\sous-vide`
//!    - macOS/Linux: `~/.local/state/sous-vide`

use anyhow::{Context, Result};
use std::path::PathBuf;

/// Environment variable for config directory override
pub const ENV_CONFIG_DIR: &str = "SOUS_VIDE_CONFIG_DIR";

/// Environment variable for state directory override
pub const ENV_STATE_DIR: &str = "SOUS_VIDE_STATE_DIR";

const APP_DIR: &str = "sous-vide";

/// Name of the config file inside the config directory
pub const CONFIG_FILE: &str = "config.toml";

/// Get the sous-vide config directory path
pub fn config_dir() -> Result<PathBuf> {
    if let Ok(dir) = std::env::var(ENV_CONFIG_DIR) {
        let path = expand(&dir);
        log::debug!(
            "Using config dir from {}: {}",
            ENV_CONFIG_DIR,
            path.display()
        );
        return Ok(path);
    }

    if let Ok(xdg_config) = std::env::var("XDG_CONFIG_HOME") {
        let path = PathBuf::from(xdg_config).join(APP_DIR);
        log::debug!("Using XDG_CONFIG_HOME: {}", path.display());
        return Ok(path);
    }

    #[cfg(windows)]
    {
        if let Some(app_data) = dirs::config_dir() {
            let path = app_data.join(APP_DIR);
            log::debug!("Using Windows config dir: {}", path.display());
            return Ok(path);
        }
    }

    let home = dirs::home_dir().context("Could not determine home directory")?;
    let path = home.join(".config").join(APP_DIR);
    log::debug!("Using default config dir: {}", path.display());
    Ok(path)
}

/// Get the config file path
pub fn config_file() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE))
}

/// Get the sous-vide state directory path
pub fn state_dir() -> Result<PathBuf> {
    if let Ok(dir) = std::env::var(ENV_STATE_DIR) {
        let path = expand(&dir);
        log::debug!("Using state dir from {}: {}", ENV_STATE_DIR, path.display());
        return Ok(path);
    }

    if let Ok(xdg_state) = std::env::var("XDG_STATE_HOME") {
        let path = PathBuf::from(xdg_state).join(APP_DIR);
        log::debug!("Using XDG_STATE_HOME: {}", path.display());
        return Ok(path);
    }

    #[cfg(windows)]
    {
        if let Some(local_app_data) = dirs::data_local_dir() {
            let path = local_app_data.join(APP_DIR);
            log::debug!("Using Windows state dir: {}", path.display());
            return Ok(path);
        }
    }

    let home = dirs::home_dir().context("Could not determine home directory")?;
    let path = home.join(".local").join("state").join(APP_DIR);
    log::debug!("Using default state dir: {}", path.display());
    Ok(path)
}

/// Expand ~ and environment variables in a path string
pub fn expand(path: &str) -> PathBuf {
    let expanded = shellexpand::full(path).unwrap_or(std::borrow::Cow::Borrowed(path));
    PathBuf::from(expanded.as_ref())
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;

    /// Run `f` with a temporary env var
    ///
    /// Each test uses its own variable so parallel tests do not interfere.
    fn with_env_var<F, R>(key: &str, value: &str, f: F) -> R
    where
        F: FnOnce() -> R,
    {
        let original = env::var(key).ok();
        // SAFETY: no other test reads this variable
        unsafe { env::set_var(key, value) };
        let result = f();
        match original {
            // SAFETY: as above
            Some(v) => unsafe { env::set_var(key, v) },
            None => unsafe { env::remove_var(key) },
        }
        result
    }

    #[test]
    fn test_config_dir_env_override() {
        with_env_var(ENV_CONFIG_DIR, "/custom/config/path", || {
            let result = config_dir().unwrap();
            assert_eq!(result, PathBuf::from("/custom/config/path"));
            assert_eq!(
                config_file().unwrap(),
                PathBuf::from("/custom/config/path/config.toml")
            );
        });
    }

    #[test]
    fn test_state_dir_env_override_with_tilde() {
        let home = dirs::home_dir().unwrap();
        with_env_var(ENV_STATE_DIR, "~/reports/sous-vide-tilde-test", || {
            let result = state_dir().unwrap();
            assert_eq!(result, home.join("reports").join("sous-vide-tilde-test"));
        });
    }

    #[test]
    fn test_expand_with_tilde() {
        let result = expand("~/test/path");
        let home = dirs::home_dir().unwrap();
        assert_eq!(result, home.join("test").join("path"));
    }

    #[test]
    fn test_expand_absolute() {
        assert_eq!(expand("/var/cache/chef"), PathBuf::from("/var/cache/chef"));
    }

    #[test]
    fn test_expand_with_env_var() {
        with_env_var("SOUS_VIDE_TEST_VAR", "test_value", || {
            let result = expand("/path/$SOUS_VIDE_TEST_VAR/file");
            assert_eq!(result, PathBuf::from("/path/test_value/file"));
        });
    }

    #[test]
    fn test_expand_unknown_env_var_unchanged() {
        let result = expand("/path/$SOUS_VIDE_NONEXISTENT_12345/file");
        assert_eq!(result, PathBuf::from("/path/$SOUS_VIDE_NONEXISTENT_12345/file"));
    }
}
