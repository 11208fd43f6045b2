//! Sheet configuration loaded from `config.toml`.
//!
//! Loading never fails hard: problems are returned as warnings and the
//! affected settings keep their defaults.

use directories::ProjectDirs;
use gridcalc_engine::engine::{Axis, DEFAULT_DATE_FORMATS};
use serde::Deserialize;
use std::path::{Path, PathBuf};

const MAX_CONFIG_FILE_BYTES: u64 = 1_048_576; // 1 MiB

/// Ranges with more cells than this are tracked as region vertices instead
/// of one dependency edge per cell.
pub const DEFAULT_MAX_DEPENDENCY_CELLS: u64 = 256;

#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Primary axis of each sheet's cell store.
    pub storage_axis: Axis,
    /// Recalculate after every edit (outside paused batches).
    pub auto_calculate: bool,
    pub max_dependency_cells: u64,
    /// chrono formats tried when text is coerced to a date.
    pub date_formats: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            storage_axis: Axis::Column,
            auto_calculate: true,
            max_dependency_cells: DEFAULT_MAX_DEPENDENCY_CELLS,
            date_formats: DEFAULT_DATE_FORMATS.iter().map(|f| f.to_string()).collect(),
        }
    }
}

impl Config {
    pub fn from_toml(content: &str) -> Result<Config, toml::de::Error> {
        toml::from_str(content)
    }

    /// Replace out-of-range settings with defaults, describing each fix.
    fn sanitize(&mut self) -> Vec<String> {
        let mut warnings = Vec::new();
        if self.max_dependency_cells == 0 {
            warnings.push(format!(
                "max_dependency_cells must be positive; using {}",
                DEFAULT_MAX_DEPENDENCY_CELLS
            ));
            self.max_dependency_cells = DEFAULT_MAX_DEPENDENCY_CELLS;
        }
        if self.date_formats.iter().all(|f| f.trim().is_empty()) {
            if !self.date_formats.is_empty() {
                warnings.push("date_formats has no usable entries; using defaults".to_string());
            }
            self.date_formats = Config::default().date_formats;
        }
        warnings
    }
}

/// Load configuration from `config_file`, or from the user config directory
/// when no file is given. Returns the config plus any warnings.
pub fn load_config(config_file: Option<&Path>) -> (Config, Vec<String>) {
    let mut warnings: Vec<String> = Vec::new();
    let path = config_file.map(Path::to_path_buf).or_else(user_config_path);
    let Some(path) = path else {
        return (Config::default(), warnings);
    };

    if !path.exists() {
        if config_file.is_some() {
            warnings.push(format!("Config file not found: {}", path.display()));
        }
        return (Config::default(), warnings);
    }

    let mut config = match std::fs::metadata(&path) {
        Ok(meta) if meta.len() > MAX_CONFIG_FILE_BYTES => {
            warnings.push(format!(
                "Refusing to read {}: file too large ({} bytes, max {})",
                path.display(),
                meta.len(),
                MAX_CONFIG_FILE_BYTES
            ));
            Config::default()
        }
        Ok(_) => match std::fs::read_to_string(&path) {
            Ok(content) => match Config::from_toml(&content) {
                Ok(parsed) => parsed,
                Err(err) => {
                    warnings.push(format!("Failed to parse {}: {}", path.display(), err));
                    Config::default()
                }
            },
            Err(err) => {
                warnings.push(format!("Failed to read {}: {}", path.display(), err));
                Config::default()
            }
        },
        Err(err) => {
            warnings.push(format!(
                "Failed to read metadata for {}: {}",
                path.display(),
                err
            ));
            Config::default()
        }
    };

    warnings.extend(config.sanitize());
    for warning in &warnings {
        log::warn!("{warning}");
    }
    (config, warnings)
}

fn user_config_path() -> Option<PathBuf> {
    let proj = ProjectDirs::from("", "", "gridcalc")?;
    let mut path = proj.config_dir().to_path_buf();
    path.push("config.toml");
    Some(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::io::Write;

    struct TempFile(PathBuf);

    impl Drop for TempFile {
        fn drop(&mut self) {
            let _ = std::fs::remove_file(&self.0);
        }
    }

    fn temp_file(tag: &str, content: &str) -> TempFile {
        let path = std::env::temp_dir().join(format!(
            "gridcalc-config-{}-{}.toml",
            tag,
            std::process::id()
        ));
        let mut f = std::fs::File::create(&path).unwrap();
        f.write_all(content.as_bytes()).unwrap();
        TempFile(path)
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let config = Config::from_toml("storage_axis = \"row\"\nauto_calculate = false\n").unwrap();
        assert_eq!(config.storage_axis, Axis::Row);
        assert!(!config.auto_calculate);
        assert_eq!(config.max_dependency_cells, DEFAULT_MAX_DEPENDENCY_CELLS);
        assert_eq!(config.date_formats, Config::default().date_formats);
    }

    #[test]
    fn test_unknown_key_is_rejected() {
        assert!(Config::from_toml("autocalc = true\n").is_err());
    }

    #[test]
    fn test_load_reports_parse_errors_as_warnings() {
        let file = temp_file("bad", "storage_axis = \"diagonal\"\n");
        let (config, warnings) = load_config(Some(&file.0));
        assert_eq!(config, Config::default());
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].starts_with("Failed to parse"));
    }

    #[test]
    fn test_load_sanitizes_values() {
        let file = temp_file("zero", "max_dependency_cells = 0\ndate_formats = []\n");
        let (config, warnings) = load_config(Some(&file.0));
        assert_eq!(config.max_dependency_cells, DEFAULT_MAX_DEPENDENCY_CELLS);
        assert!(!config.date_formats.is_empty());
        assert_eq!(warnings.len(), 1);
    }

    #[test]
    fn test_missing_explicit_file_warns() {
        let path = std::env::temp_dir().join("gridcalc-config-does-not-exist.toml");
        let (config, warnings) = load_config(Some(&path));
        assert_eq!(config, Config::default());
        assert!(warnings[0].starts_with("Config file not found"));
    }
}
