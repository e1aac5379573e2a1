//! Config directory resolution
//!
//! # Environment Variables
//!
//! - `DOT_CONFIG_DIR` - Override config directory (e.g., `~/dotfiles/dot`)
//!
//! # Path Resolution Priority
//!
//! 1. `DOT_CONFIG_DIR` environment variable
//! 2. `XDG_CONFIG_HOME/dot` (if set)
//! 3. Platform default:
//!    - Windows: `%APPDATA%\dot`
//!    - macOS/Linux: `~/.config/dot`

use anyhow::{Context, Result};
use std::path::PathBuf;

/// Environment variable for config directory override
pub const ENV_CONFIG_DIR: &str = "DOT_CONFIG_DIR";

const APP_DIR: &str = "dot";

/// Get the dot config directory path
pub fn config_dir() -> Result<PathBuf> {
    if let Ok(dir) = std::env::var(ENV_CONFIG_DIR) {
        let path = expand(&dir);
        log::debug!("config_dir source={ENV_CONFIG_DIR} path={}", path.display());
        return Ok(path);
    }

    if let Ok(xdg_config) = std::env::var("XDG_CONFIG_HOME")
        && !xdg_config.is_empty()
    {
        let path = PathBuf::from(xdg_config).join(APP_DIR);
        log::debug!("config_dir source=XDG_CONFIG_HOME path={}", path.display());
        return Ok(path);
    }

    #[cfg(windows)]
    {
        if let Some(app_data) = dirs::config_dir() {
            let path = app_data.join(APP_DIR);
            log::debug!("config_dir source=platform path={}", path.display());
            return Ok(path);
        }
    }

    let home = dirs::home_dir().context("Could not determine home directory")?;
    let path = home.join(".config").join(APP_DIR);
    log::debug!("config_dir source=default path={}", path.display());
    Ok(path)
}

/// Expand ~ and environment variables in a path string.
///
/// Unknown variables are left as written.
///
/// ```
/// use dot::paths;
///
/// let packages = paths::expand("~/dotfiles");
/// let target = paths::expand("$HOME");
/// ```
pub fn expand(path: &str) -> PathBuf {
    let expanded = shellexpand::full(path).unwrap_or(std::borrow::Cow::Borrowed(path));
    PathBuf::from(expanded.as_ref())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use std::sync::Mutex;

    // Env vars are process-wide; serialize the tests that touch them.
    static ENV_LOCK: Mutex<()> = Mutex::new(());

    fn with_env<F, R>(vars: &[(&str, Option<&str>)], f: F) -> R
    where
        F: FnOnce() -> R,
    {
        let _guard = ENV_LOCK.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        let saved: Vec<(String, Option<String>)> = vars
            .iter()
            .map(|(key, _)| ((*key).to_string(), env::var(key).ok()))
            .collect();
        for (key, value) in vars {
            // SAFETY: guarded by ENV_LOCK
            match value {
                Some(v) => unsafe { env::set_var(key, v) },
                None => unsafe { env::remove_var(key) },
            }
        }
        let result = f();
        for (key, value) in saved {
            // SAFETY: guarded by ENV_LOCK
            match value {
                Some(v) => unsafe { env::set_var(&key, v) },
                None => unsafe { env::remove_var(&key) },
            }
        }
        result
    }

    #[test]
    fn test_config_dir_env_override() {
        with_env(&[(ENV_CONFIG_DIR, Some("/custom/config/path"))], || {
            assert_eq!(config_dir().unwrap(), PathBuf::from("/custom/config/path"));
        });
    }

    #[test]
    fn test_config_dir_env_override_with_tilde() {
        let home = dirs::home_dir().unwrap();
        with_env(&[(ENV_CONFIG_DIR, Some("~/dotfiles/dot"))], || {
            assert_eq!(config_dir().unwrap(), home.join("dotfiles").join("dot"));
        });
    }

    #[test]
    fn test_xdg_config_home() {
        with_env(
            &[
                (ENV_CONFIG_DIR, None),
                ("XDG_CONFIG_HOME", Some("/tmp/xdg-config-test")),
            ],
            || {
                assert_eq!(
                    config_dir().unwrap(),
                    PathBuf::from("/tmp/xdg-config-test/dot")
                );
            },
        );
    }

    #[cfg(unix)]
    #[test]
    fn test_default_config_dir_unix() {
        let home = dirs::home_dir().unwrap();
        with_env(&[(ENV_CONFIG_DIR, None), ("XDG_CONFIG_HOME", None)], || {
            assert_eq!(config_dir().unwrap(), home.join(".config").join("dot"));
        });
    }

    #[test]
    fn test_expand_with_tilde() {
        let home = dirs::home_dir().unwrap();
        assert_eq!(expand("~/test/path"), home.join("test").join("path"));
    }

    #[test]
    fn test_expand_with_env_var() {
        with_env(&[("DOT_TEST_VAR", Some("test_value"))], || {
            assert_eq!(
                expand("/path/$DOT_TEST_VAR/file"),
                PathBuf::from("/path/test_value/file")
            );
        });
    }

    #[test]
    fn test_expand_unknown_env_var_unchanged() {
        let result = expand("/path/$NONEXISTENT_VAR_12345/file");
        assert_eq!(result, PathBuf::from("/path/$NONEXISTENT_VAR_12345/file"));
    }
}
