//! Cross-platform application paths using the `dirs` crate.
//!
//! Layout (config dir):
//!   Windows: %APPDATA%\live-voice-agent\
//!   macOS:   ~/Library/Application Support/live-voice-agent/
//!   Linux:   ~/.config/live-voice-agent/
//!
//! The directory holds `settings.toml` and the default `workflow.toml`
//! tool descriptor file.

use std::path::PathBuf;

/// Holds all resolved application directory/file paths.
#[derive(Debug, Clone)]
pub struct AppPaths {
    /// Directory for `settings.toml` and `workflow.toml`.
    pub config_dir: PathBuf,
    /// Full path to `settings.toml`.
    pub settings_file: PathBuf,
    /// Default location of the tool workflow descriptor file.
    pub workflow_file: PathBuf,
}

impl AppPaths {
    const APP_NAME: &'static str = "live-voice-agent";

    /// Resolves all paths using the `dirs` crate.
    ///
    /// Falls back to the current directory if the platform cannot provide a
    /// standard path.
    pub fn new() -> Self {
        let config_dir = dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(Self::APP_NAME);

        let settings_file = config_dir.join("settings.toml");
        let workflow_file = config_dir.join("workflow.toml");

        Self {
            config_dir,
            settings_file,
            workflow_file,
        }
    }
}

impl Default for AppPaths {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paths_are_non_empty() {
        let paths = AppPaths::new();
        assert!(paths.config_dir.to_str().is_some_and(|s| !s.is_empty()));
        assert!(paths
            .settings_file
            .file_name()
            .is_some_and(|n| n == "settings.toml"));
        assert!(paths
            .workflow_file
            .file_name()
            .is_some_and(|n| n == "workflow.toml"));
    }

    #[test]
    fn files_live_in_config_dir() {
        let paths = AppPaths::new();
        assert_eq!(paths.settings_file.parent(), Some(paths.config_dir.as_path()));
        assert_eq!(paths.workflow_file.parent(), Some(paths.config_dir.as_path()));
    }
}
