//! Layered configuration: defaults, then system, user and local TOML files,
//! then environment variables. Command line flags are applied by the caller.

use midisplit::VolumeCurve;
use serde::Serialize;
use std::env;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    FileRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {message}")]
    Parse { path: PathBuf, message: String },
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Config {
    pub split: SplitConfig,
    pub sort: SortConfig,
    pub volume: VolumeConfig,
    pub telemetry: TelemetryConfig,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SplitConfig {
    pub parallel: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SortConfig {
    pub notes: bool,
    pub controllers: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct VolumeConfig {
    pub source: VolumeCurve,
    pub dest: VolumeCurve,
    pub gain_db: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TelemetryConfig {
    pub log_level: String,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }
}

/// Where config values came from.
#[derive(Debug, Clone, Default)]
pub struct ConfigSources {
    /// Config files that were loaded, in order
    pub files: Vec<PathBuf>,
    /// Environment variables that overrode config values
    pub env_overrides: Vec<String>,
}

impl Config {
    /// Load all layers. `config_path` replaces the local `./midisplit.toml`.
    pub fn load_with_sources_from(
        config_path: Option<&Path>,
    ) -> Result<(Self, ConfigSources), ConfigError> {
        let mut sources = ConfigSources::default();
        let mut config = Config::default();

        for path in discover_config_files(config_path) {
            config.apply_file(&path)?;
            sources.files.push(path);
        }

        config.apply_env_overrides(&mut sources, |key| env::var(key).ok());

        Ok((config, sources))
    }

    pub fn apply_file(&mut self, path: &Path) -> Result<(), ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::FileRead {
            path: path.to_path_buf(),
            source: e,
        })?;
        self.apply_toml(&contents, path)
    }

    /// Overlay the keys present in `contents`; absent keys keep their value.
    fn apply_toml(&mut self, contents: &str, path: &Path) -> Result<(), ConfigError> {
        let parse_error = |message: String| ConfigError::Parse {
            path: path.to_path_buf(),
            message,
        };

        let table: toml::Table = contents
            .parse()
            .map_err(|e: toml::de::Error| parse_error(e.to_string()))?;

        if let Some(split) = table.get("split").and_then(|v| v.as_table()) {
            if let Some(v) = split.get("parallel").and_then(|v| v.as_bool()) {
                self.split.parallel = v;
            }
        }

        if let Some(sort) = table.get("sort").and_then(|v| v.as_table()) {
            if let Some(v) = sort.get("notes").and_then(|v| v.as_bool()) {
                self.sort.notes = v;
            }
            if let Some(v) = sort.get("controllers").and_then(|v| v.as_bool()) {
                self.sort.controllers = v;
            }
        }

        if let Some(volume) = table.get("volume").and_then(|v| v.as_table()) {
            if let Some(v) = volume.get("source").and_then(|v| v.as_str()) {
                self.volume.source = v
                    .parse()
                    .map_err(|e: midisplit::Error| parse_error(e.to_string()))?;
            }
            if let Some(v) = volume.get("dest").and_then(|v| v.as_str()) {
                self.volume.dest = v
                    .parse()
                    .map_err(|e: midisplit::Error| parse_error(e.to_string()))?;
            }
            // accept both `gain_db = -6` and `gain_db = -6.0`
            if let Some(v) = volume.get("gain_db") {
                if let Some(gain) = v.as_float().or_else(|| v.as_integer().map(|i| i as f64)) {
                    self.volume.gain_db = gain;
                }
            }
        }

        if let Some(telemetry) = table.get("telemetry").and_then(|v| v.as_table()) {
            if let Some(v) = telemetry.get("log_level").and_then(|v| v.as_str()) {
                self.telemetry.log_level = v.to_string();
            }
        }

        Ok(())
    }

    /// Apply environment overrides, reading variables through `lookup`.
    pub fn apply_env_overrides(
        &mut self,
        sources: &mut ConfigSources,
        lookup: impl Fn(&str) -> Option<String>,
    ) {
        if let Some(v) = lookup("MIDISPLIT_LOG_LEVEL") {
            self.telemetry.log_level = v;
            sources.env_overrides.push("MIDISPLIT_LOG_LEVEL".to_string());
        }
        // Also support RUST_LOG
        if let Some(v) = lookup("RUST_LOG") {
            self.telemetry.log_level = v;
            sources.env_overrides.push("RUST_LOG".to_string());
        }
        if let Some(v) = lookup("MIDISPLIT_PARALLEL") {
            if let Some(parallel) = parse_flag(&v) {
                self.split.parallel = parallel;
                sources.env_overrides.push("MIDISPLIT_PARALLEL".to_string());
            }
        }
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Config files in load order (system, user, local or `cli_path`).
/// The implicit locations are only returned when they exist.
pub fn discover_config_files(cli_path: Option<&Path>) -> Vec<PathBuf> {
    let mut files = Vec::new();

    let system = PathBuf::from("/etc/midisplit/config.toml");
    if system.exists() {
        files.push(system);
    }

    // XDG_CONFIG_HOME or ~/.config
    if let Some(config_dir) = directories::BaseDirs::new().map(|d| d.config_dir().to_path_buf()) {
        let user = config_dir.join("midisplit/config.toml");
        if user.exists() {
            files.push(user);
        }
    }

    // An explicit --config replaces the local override
    if let Some(path) = cli_path {
        files.push(path.to_path_buf());
        return files;
    }

    let local = PathBuf::from("midisplit.toml");
    if local.exists() {
        files.push(local);
    }

    files
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;
    use std::io::Write;

    fn apply(contents: &str) -> Result<Config, ConfigError> {
        let mut config = Config::default();
        config.apply_toml(contents, Path::new("test.toml"))?;
        Ok(config)
    }

    #[test]
    fn defaults() {
        let config = Config::default();
        assert!(!config.split.parallel);
        assert_eq!(config.volume.source, VolumeCurve::Gm);
        assert_eq!(config.telemetry.log_level, "info");
    }

    #[test]
    fn reads_every_section() {
        let config = apply(
            r#"
            [split]
            parallel = true

            [sort]
            notes = true

            [volume]
            source = "winfm"
            dest = "Lin"
            gain_db = -6

            [telemetry]
            log_level = "debug"
            "#,
        )
        .unwrap();

        assert!(config.split.parallel);
        assert!(config.sort.notes && !config.sort.controllers);
        assert_eq!(config.volume.source, VolumeCurve::WinFm);
        assert_eq!(config.volume.dest, VolumeCurve::Lin);
        assert_eq!(config.volume.gain_db, -6.0);
        assert_eq!(config.telemetry.log_level, "debug");
    }

    #[test]
    fn later_files_override_earlier_ones() {
        let mut base = tempfile::NamedTempFile::new().unwrap();
        writeln!(base, "[sort]\nnotes = true\ncontrollers = true").unwrap();
        let mut overlay = tempfile::NamedTempFile::new().unwrap();
        writeln!(overlay, "[sort]\ncontrollers = false").unwrap();

        let mut config = Config::default();
        config.apply_file(base.path()).unwrap();
        config.apply_file(overlay.path()).unwrap();

        assert_eq!(
            config.sort,
            SortConfig {
                notes: true,
                controllers: false,
            }
        );
    }

    #[test]
    fn bad_files_are_reported_with_their_path() {
        let err = apply("[split\nparallel = ").unwrap_err();
        assert!(
            matches!(err, ConfigError::Parse { ref path, .. } if path == Path::new("test.toml"))
        );

        let err = apply("[volume]\nsource = \"loud\"").unwrap_err();
        assert!(err.to_string().contains("loud"));

        let mut config = Config::default();
        let err = config.apply_file(Path::new("/nonexistent/midisplit.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::FileRead { .. }));
    }

    #[test]
    fn environment_overrides() {
        let env: HashMap<&str, &str> = [
            ("MIDISPLIT_LOG_LEVEL", "warn"),
            ("RUST_LOG", "midisplit=trace"),
            ("MIDISPLIT_PARALLEL", "yes"),
        ]
        .into_iter()
        .collect();

        let mut config = Config::default();
        let mut sources = ConfigSources::default();
        config.apply_env_overrides(&mut sources, |key| env.get(key).map(|v| v.to_string()));

        assert!(config.split.parallel);
        assert_eq!(config.telemetry.log_level, "midisplit=trace");
        assert_eq!(
            sources.env_overrides,
            vec!["MIDISPLIT_LOG_LEVEL", "RUST_LOG", "MIDISPLIT_PARALLEL"]
        );
    }

    #[test]
    fn unparseable_flag_is_ignored() {
        let mut config = Config::default();
        let mut sources = ConfigSources::default();
        config.apply_env_overrides(&mut sources, |key| {
            (key == "MIDISPLIT_PARALLEL").then(|| "maybe".to_string())
        });
        assert!(!config.split.parallel);
        assert!(sources.env_overrides.is_empty());
    }

    #[test]
    fn explicit_path_is_loaded_last() {
        let files = discover_config_files(Some(Path::new("custom.toml")));
        assert_eq!(files.last(), Some(&PathBuf::from("custom.toml")));
    }
}
