pub mod error;

pub use error::*;

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Environment variable pointing at a config file
pub const CONFIG_PATH_ENV: &str = "WEBSTACK_CONFIG_PATH";
pub const IMAGE_ENV: &str = "WEBSTACK_IMAGE";
pub const REGION_ENV: &str = "WEBSTACK_REGION";

/// Engine used to realize deployments
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum EngineKind {
    /// Pulumi CLI
    #[default]
    Pulumi,
    /// In-process engine, nothing leaves the machine
    Memory,
}

/// Provider plugin pinned by the driver
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PluginSettings {
    pub name: String,
    pub version: String,
}

impl Default for PluginSettings {
    fn default() -> Self {
        Self {
            name: "aws".to_string(),
            version: "v4.0.0".to_string(),
        }
    }
}

/// Driver settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    /// Logical program name every deployment slot belongs to
    pub project: String,
    pub region: String,
    /// Container image deployed on apply
    pub image: String,
    pub plugin: PluginSettings,
    pub engine: EngineKind,
    /// Where lock files live
    pub state_dir: PathBuf,
    /// Where the rendered engine program is written
    pub work_dir: PathBuf,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            project: "webapp".to_string(),
            region: "us-west-2".to_string(),
            image: "nginx".to_string(),
            plugin: PluginSettings::default(),
            engine: EngineKind::default(),
            state_dir: PathBuf::from(".webstack"),
            work_dir: PathBuf::from(".webstack/program"),
        }
    }
}

impl Settings {
    pub fn from_yaml(content: &str, path: &Path) -> Result<Self> {
        let settings: Settings =
            serde_yaml::from_str(content).map_err(|source| ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            })?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content, path)
    }

    /// Override fields from `WEBSTACK_IMAGE` / `WEBSTACK_REGION`
    pub fn apply_env_overrides(&mut self) -> Result<()> {
        if let Ok(image) = std::env::var(IMAGE_ENV) {
            self.image = image;
        }
        if let Ok(region) = std::env::var(REGION_ENV) {
            self.region = region;
        }
        self.validate()
    }

    fn validate(&self) -> Result<()> {
        let required = [
            ("project", &self.project),
            ("region", &self.region),
            ("plugin.name", &self.plugin.name),
            ("plugin.version", &self.plugin.version),
        ];
        for (key, value) in required {
            if value.trim().is_empty() {
                return Err(ConfigError::InvalidValue {
                    key,
                    reason: "must not be empty".to_string(),
                });
            }
        }
        Ok(())
    }
}

/// Locate the settings file
///
/// Search order:
/// 1. `WEBSTACK_CONFIG_PATH`
/// 2. `./webstack.yaml`
/// 3. `./.webstack/config.yaml`
/// 4. `~/.config/webstack/config.yaml`
pub fn find_config_file() -> Result<Option<PathBuf>> {
    if let Ok(config_path) = std::env::var(CONFIG_PATH_ENV) {
        let path = PathBuf::from(config_path);
        if path.exists() {
            return Ok(Some(path));
        }
        tracing::warn!("{} points at missing file {}", CONFIG_PATH_ENV, path.display());
    }

    let current_dir = std::env::current_dir()?;
    let candidates = [
        current_dir.join("webstack.yaml"),
        current_dir.join(".webstack").join("config.yaml"),
    ];
    if let Some(path) = candidates.into_iter().find(|p| p.exists()) {
        return Ok(Some(path));
    }

    if let Some(config_dir) = dirs::config_dir() {
        let global_config = config_dir.join("webstack").join("config.yaml");
        if global_config.exists() {
            return Ok(Some(global_config));
        }
    }

    Ok(None)
}

/// Load settings from the first config file found, then apply env overrides
pub fn load() -> Result<Settings> {
    let mut settings = match find_config_file()? {
        Some(path) => {
            tracing::debug!("Loading settings from {}", path.display());
            Settings::from_file(&path)?
        }
        None => {
            tracing::debug!("No config file found, using defaults");
            Settings::default()
        }
    };
    settings.apply_env_overrides()?;
    Ok(settings)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::fs;

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let settings = Settings::from_yaml(
            "image: httpd:2.4\nplugin:\n  version: v6.0.0\n",
            Path::new("webstack.yaml"),
        )
        .unwrap();

        assert_eq!(settings.image, "httpd:2.4");
        assert_eq!(settings.plugin.name, "aws");
        assert_eq!(settings.plugin.version, "v6.0.0");
        assert_eq!(settings.region, "us-west-2");
        assert_eq!(settings.engine, EngineKind::Pulumi);
    }

    #[test]
    fn test_engine_kind() {
        let settings = Settings::from_yaml("engine: memory\n", Path::new("x.yaml")).unwrap();
        assert_eq!(settings.engine, EngineKind::Memory);
    }

    #[test]
    fn test_unknown_keys_rejected() {
        let err = Settings::from_yaml("imag: nginx\n", Path::new("webstack.yaml")).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
        assert!(err.to_string().contains("webstack.yaml"));
    }

    #[test]
    fn test_empty_region_rejected() {
        let err = Settings::from_yaml("region: ''\n", Path::new("webstack.yaml")).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { key: "region", .. }));
    }

    #[test]
    #[serial]
    fn test_env_overrides() {
        temp_env::with_vars(
            [(IMAGE_ENV, Some("nginx:1.27")), (REGION_ENV, Some("eu-west-1"))],
            || {
                let mut settings = Settings::default();
                settings.apply_env_overrides().unwrap();
                assert_eq!(settings.image, "nginx:1.27");
                assert_eq!(settings.region, "eu-west-1");
            },
        );
    }

    #[test]
    #[serial]
    fn test_find_config_file_in_current_dir() {
        let temp_dir = tempfile::tempdir().unwrap();
        let original_dir = std::env::current_dir().unwrap();

        fs::write(temp_dir.path().join("webstack.yaml"), "image: httpd\n").unwrap();
        std::env::set_current_dir(&temp_dir).unwrap();

        let found = temp_env::with_var_unset(CONFIG_PATH_ENV, find_config_file);
        let loaded = temp_env::with_vars_unset([CONFIG_PATH_ENV, IMAGE_ENV], load);

        std::env::set_current_dir(original_dir).unwrap();

        assert!(found.unwrap().unwrap().ends_with("webstack.yaml"));
        assert_eq!(loaded.unwrap().image, "httpd");
    }

    #[test]
    #[serial]
    fn test_find_config_file_in_state_dir() {
        let temp_dir = tempfile::tempdir().unwrap();
        let original_dir = std::env::current_dir().unwrap();

        let dir = temp_dir.path().join(".webstack");
        fs::create_dir(&dir).unwrap();
        fs::write(dir.join("config.yaml"), "engine: memory\n").unwrap();
        std::env::set_current_dir(&temp_dir).unwrap();

        let found = temp_env::with_var_unset(CONFIG_PATH_ENV, find_config_file);

        std::env::set_current_dir(original_dir).unwrap();

        assert!(found.unwrap().unwrap().ends_with(".webstack/config.yaml"));
    }

    #[test]
    #[serial]
    fn test_find_config_file_env_var() {
        let temp_dir = tempfile::tempdir().unwrap();
        let config_path = temp_dir.path().join("custom.yaml");
        fs::write(&config_path, "project: shop\n").unwrap();

        temp_env::with_var(CONFIG_PATH_ENV, Some(&config_path), || {
            assert_eq!(find_config_file().unwrap(), Some(config_path.clone()));
            assert_eq!(load().unwrap().project, "shop");
        });
    }
}
