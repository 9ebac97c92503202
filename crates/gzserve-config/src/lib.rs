//! Configuration management for gzserve.
//!
//! Parses `gzserve.toml` configuration files with serde and provides
//! auto-discovery of config files in parent directories.
//!
//! CLI settings can be applied during load via [`CliSettings`].
//!
//! ## Environment Variable Expansion
//!
//! String configuration values support environment variable expansion:
//!
//! - `${VAR}` - expands to the value of VAR, errors if unset
//! - `${VAR:-default}` - expands to VAR if set, otherwise uses default
//!
//! Expanded fields:
//! - `server.host`
//! - `site.root` (which also expands a leading `~`)
//!
//! ## Example
//!
//! ```toml
//! [server]
//! host = "0.0.0.0"
//! port = 8080
//!
//! [site]
//! root = "public"
//!
//! [[mounts]]
//! prefix = "/static"
//! gzip = true
//! ```

mod expand;

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use serde::Deserialize;

/// CLI settings that override configuration file values.
///
/// All fields are optional. Only non-None values override the loaded config.
#[derive(Debug, Default)]
pub struct CliSettings {
    /// Override server host.
    pub host: Option<String>,
    /// Override server port.
    pub port: Option<u16>,
    /// Override site root directory.
    pub root: Option<PathBuf>,
    /// Override whether the landing page is served at `/`.
    pub index_page: Option<bool>,
}

/// Configuration filename to search for.
const CONFIG_FILENAME: &str = "gzserve.toml";

/// Application configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Server configuration.
    pub server: ServerConfig,
    /// Site configuration (paths are relative strings from TOML).
    site: SiteConfigRaw,
    /// URL prefixes the site is mounted under.
    pub mounts: Vec<MountConfig>,

    /// Resolved site configuration (set after loading).
    #[serde(skip)]
    pub site_resolved: SiteConfig,
    /// Path to the config file (set after loading).
    #[serde(skip)]
    pub config_path: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self::default_with_base(Path::new("."))
    }
}

/// Server configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Server host address.
    pub host: String,
    /// Server port.
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_owned(),
            port: 8080,
        }
    }
}

/// Raw site configuration as parsed from TOML (paths as strings).
#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct SiteConfigRaw {
    root: Option<String>,
    index_page: Option<bool>,
}

/// Resolved site configuration with absolute paths.
#[derive(Debug, Default)]
pub struct SiteConfig {
    /// Directory served as the store root.
    pub root: PathBuf,
    /// Whether `/` shows a landing page linking to each mount.
    pub index_page: bool,
}

/// A URL prefix the site is served under.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct MountConfig {
    /// URL prefix (e.g., "/gzip"), without trailing slash.
    pub prefix: String,
    /// Serve fresh `.gz` siblings to clients that accept gzip.
    #[serde(default)]
    pub gzip: bool,
}

impl MountConfig {
    /// Check that a set of mounts can be routed side by side.
    ///
    /// Prefixes must start with `/`, name at least one segment, have no
    /// trailing slash and be unique.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Validation` describing the first bad prefix.
    pub fn validate_all(mounts: &[Self]) -> Result<(), ConfigError> {
        if mounts.is_empty() {
            return Err(ConfigError::Validation(
                "at least one [[mounts]] entry is required".to_owned(),
            ));
        }

        let mut seen = HashSet::new();
        for mount in mounts {
            let prefix = mount.prefix.as_str();
            if !prefix.starts_with('/') || prefix.len() < 2 {
                return Err(ConfigError::Validation(format!(
                    "mounts.prefix \"{prefix}\" must start with / and name a path segment"
                )));
            }
            if prefix.ends_with('/') {
                return Err(ConfigError::Validation(format!(
                    "mounts.prefix \"{prefix}\" must not end with /"
                )));
            }
            if prefix.contains(['{', '}', '*']) {
                return Err(ConfigError::Validation(format!(
                    "mounts.prefix \"{prefix}\" must not contain route wildcards"
                )));
            }
            if !seen.insert(prefix) {
                return Err(ConfigError::Validation(format!(
                    "mounts.prefix \"{prefix}\" is defined more than once"
                )));
            }
        }

        Ok(())
    }

    /// Default mounts: `/dir` serves raw files, `/gzip` negotiates.
    #[must_use]
    pub fn defaults() -> Vec<Self> {
        vec![
            Self {
                prefix: "/dir".to_owned(),
                gzip: false,
            },
            Self {
                prefix: "/gzip".to_owned(),
                gzip: true,
            },
        ]
    }
}

/// Configuration error.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// File not found.
    #[error("Configuration file not found: {}", .0.display())]
    NotFound(PathBuf),
    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// TOML parsing error.
    #[error("TOML parse error: {0}")]
    Parse(#[from] toml::de::Error),
    /// Validation error.
    #[error("Configuration error: {0}")]
    Validation(String),
    /// Environment variable error during expansion.
    #[error("Environment variable error in {field}: {message}")]
    EnvVar {
        /// Config field path (e.g., "`site.root`").
        field: String,
        /// Error message (e.g., "${`SITE_ROOT`} not set").
        message: String,
    },
}

/// Require a string field to be non-empty.
fn require_non_empty(value: &str, field: &str) -> Result<(), ConfigError> {
    if value.is_empty() {
        return Err(ConfigError::Validation(format!("{field} cannot be empty")));
    }
    Ok(())
}

impl Config {
    /// Load configuration from file with optional CLI settings.
    ///
    /// If `config_path` is provided, loads from that file.
    /// Otherwise, searches for `gzserve.toml` in current directory and parents.
    ///
    /// CLI settings are applied after loading and path resolution, allowing CLI
    /// arguments to take precedence over config file values.
    ///
    /// # Errors
    ///
    /// Returns error if explicit `config_path` doesn't exist or parsing fails.
    pub fn load(
        config_path: Option<&Path>,
        cli_settings: Option<&CliSettings>,
    ) -> Result<Self, ConfigError> {
        let mut config = if let Some(path) = config_path {
            if !path.exists() {
                return Err(ConfigError::NotFound(path.to_path_buf()));
            }
            Self::load_from_file(path)?
        } else if let Some(discovered) = Self::discover_config() {
            Self::load_from_file(&discovered)?
        } else {
            Self::default_with_cwd()
        };

        if let Some(settings) = cli_settings {
            config.apply_cli_settings(settings);
            config.validate()?;
        }

        Ok(config)
    }

    /// Apply CLI settings to the configuration.
    fn apply_cli_settings(&mut self, settings: &CliSettings) {
        if let Some(host) = &settings.host {
            self.server.host.clone_from(host);
        }
        if let Some(port) = settings.port {
            self.server.port = port;
        }
        if let Some(root) = &settings.root {
            self.site_resolved.root.clone_from(root);
        }
        if let Some(index_page) = settings.index_page {
            self.site_resolved.index_page = index_page;
        }
    }

    /// Search for config file in current directory and parents.
    fn discover_config() -> Option<PathBuf> {
        let mut current = std::env::current_dir().ok()?;
        loop {
            let candidate = current.join(CONFIG_FILENAME);
            if candidate.exists() {
                return Some(candidate);
            }
            if !current.pop() {
                return None;
            }
        }
    }

    /// Create default config with paths relative to current working directory.
    fn default_with_cwd() -> Self {
        let cwd = std::env::current_dir().unwrap_or_default();
        Self::default_with_base(&cwd)
    }

    /// Create default config with paths relative to given base directory.
    #[must_use]
    pub fn default_with_base(base: &Path) -> Self {
        Self {
            server: ServerConfig::default(),
            site: SiteConfigRaw::default(),
            mounts: MountConfig::defaults(),
            site_resolved: SiteConfig {
                root: base.to_path_buf(),
                index_page: true,
            },
            config_path: None,
        }
    }

    /// Load configuration from a specific file.
    fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let mut config: Self = toml::from_str(&content)?;

        config.expand_env_vars()?;

        let config_dir = path.parent().unwrap_or(Path::new("."));
        config.resolve_paths(config_dir)?;
        config.config_path = Some(path.to_path_buf());

        config.validate()?;

        Ok(config)
    }

    /// Validate configuration values.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Validation` if any validation fails.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.validate_server()?;
        self.validate_mounts()?;
        Ok(())
    }

    /// Validate server configuration.
    fn validate_server(&self) -> Result<(), ConfigError> {
        require_non_empty(&self.server.host, "server.host")?;

        if self.server.port == 0 {
            return Err(ConfigError::Validation(
                "server.port cannot be 0".to_owned(),
            ));
        }

        Ok(())
    }

    /// Validate mount prefixes.
    fn validate_mounts(&self) -> Result<(), ConfigError> {
        MountConfig::validate_all(&self.mounts)
    }

    /// Expand environment variable references in string fields.
    fn expand_env_vars(&mut self) -> Result<(), ConfigError> {
        self.server.host = expand::expand_str(&self.server.host, "server.host")?;
        Ok(())
    }

    /// Resolve the site root against the config directory.
    ///
    /// The root is expanded first, so `${VAR}` or `~` may turn it absolute.
    fn resolve_paths(&mut self, config_dir: &Path) -> Result<(), ConfigError> {
        let root = match self.site.root.as_deref() {
            Some(root) => expand::expand_path(root, "site.root")?,
            None => PathBuf::from("."),
        };
        self.site_resolved = SiteConfig {
            root: config_dir.join(root),
            index_page: self.site.index_page.unwrap_or(true),
        };
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default_with_base(Path::new("/test"));
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.site_resolved.root, PathBuf::from("/test"));
        assert!(config.site_resolved.index_page);
        assert_eq!(config.mounts, MountConfig::defaults());
    }

    #[test]
    fn test_parse_minimal_config() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.mounts.len(), 2);
    }

    #[test]
    fn test_parse_server_config() {
        let toml = r#"
[server]
host = "0.0.0.0"
port = 9000
"#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.server.port, 9000);
    }

    #[test]
    fn test_parse_mounts() {
        let toml = r#"
[[mounts]]
prefix = "/static"
gzip = true

[[mounts]]
prefix = "/raw"
"#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(
            config.mounts,
            vec![
                MountConfig {
                    prefix: "/static".to_owned(),
                    gzip: true
                },
                MountConfig {
                    prefix: "/raw".to_owned(),
                    gzip: false
                },
            ]
        );
    }

    #[test]
    fn test_resolve_paths() {
        let toml = r#"
[site]
root = "public"
index_page = false
"#;
        let mut config: Config = toml::from_str(toml).unwrap();
        config.resolve_paths(Path::new("/project")).unwrap();

        assert_eq!(config.site_resolved.root, PathBuf::from("/project/public"));
        assert!(!config.site_resolved.index_page);
    }

    #[test]
    fn test_resolve_paths_default_root() {
        let mut config: Config = toml::from_str("").unwrap();
        config.resolve_paths(Path::new("/project")).unwrap();

        assert_eq!(config.site_resolved.root, PathBuf::from("/project/."));
        assert!(config.site_resolved.index_page);
    }

    #[test]
    fn test_load_from_file() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join(CONFIG_FILENAME);
        std::fs::write(
            &path,
            r#"
[server]
port = 3000

[site]
root = "www"
"#,
        )
        .unwrap();

        let config = Config::load(Some(&path), None).unwrap();

        assert_eq!(config.server.port, 3000);
        assert_eq!(config.site_resolved.root, temp_dir.path().join("www"));
        assert_eq!(config.config_path.as_deref(), Some(path.as_path()));
    }

    #[test]
    fn test_load_missing_explicit_file() {
        let err = Config::load(Some(Path::new("/nonexistent/gzserve.toml")), None).unwrap_err();

        assert!(matches!(err, ConfigError::NotFound(_)));
    }

    #[test]
    fn test_load_invalid_toml() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join(CONFIG_FILENAME);
        std::fs::write(&path, "[server\nport = ").unwrap();

        let err = Config::load(Some(&path), None).unwrap_err();

        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_apply_cli_settings() {
        let mut config = Config::default_with_base(Path::new("/test"));
        let settings = CliSettings {
            host: Some("0.0.0.0".to_owned()),
            port: Some(9999),
            root: Some(PathBuf::from("/srv/www")),
            index_page: Some(false),
        };

        config.apply_cli_settings(&settings);

        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.server.port, 9999);
        assert_eq!(config.site_resolved.root, PathBuf::from("/srv/www"));
        assert!(!config.site_resolved.index_page);
    }

    #[test]
    fn test_apply_cli_settings_empty() {
        let mut config = Config::default_with_base(Path::new("/test"));

        config.apply_cli_settings(&CliSettings::default());

        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.site_resolved.root, PathBuf::from("/test"));
    }

    #[test]
    fn test_resolve_paths_expands_site_root() {
        // SAFETY: test runs single-threaded per test function
        unsafe {
            std::env::set_var("GZSERVE_CONFIG_TEST_ROOT", "/srv/site");
        }

        let toml = r#"
[site]
root = "${GZSERVE_CONFIG_TEST_ROOT}"
"#;
        let mut config: Config = toml::from_str(toml).unwrap();
        config.resolve_paths(Path::new("/project")).unwrap();

        assert_eq!(config.site_resolved.root, PathBuf::from("/srv/site"));

        unsafe {
            std::env::remove_var("GZSERVE_CONFIG_TEST_ROOT");
        }
    }

    #[test]
    fn test_validate_default_config_passes() {
        assert!(Config::default_with_base(Path::new("/test")).validate().is_ok());
    }

    #[test]
    fn test_validate_server_host_empty() {
        let mut config = Config::default_with_base(Path::new("/test"));
        config.server.host = String::new();

        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("server.host"));
    }

    #[test]
    fn test_validate_server_port_zero() {
        let mut config = Config::default_with_base(Path::new("/test"));
        config.server.port = 0;

        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("server.port"));
    }

    #[test]
    fn test_validate_mounts_empty() {
        let mut config = Config::default_with_base(Path::new("/test"));
        config.mounts.clear();

        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_mount_prefix_rules() {
        for prefix in ["static", "/", "/static/", "/{id}", "/a/*rest"] {
            let mut config = Config::default_with_base(Path::new("/test"));
            config.mounts = vec![MountConfig {
                prefix: prefix.to_owned(),
                gzip: true,
            }];

            assert!(config.validate().is_err(), "{prefix}");
        }
    }

    #[test]
    fn test_validate_duplicate_mounts() {
        let mut config = Config::default_with_base(Path::new("/test"));
        config.mounts = vec![
            MountConfig {
                prefix: "/a".to_owned(),
                gzip: true,
            },
            MountConfig {
                prefix: "/a".to_owned(),
                gzip: false,
            },
        ];

        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("more than once"));
    }
}
