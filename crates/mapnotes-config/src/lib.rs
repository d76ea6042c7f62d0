use mapnotes_engine::{
    BasemapStyle, CategoryPoint, Color, INITIAL_CENTER, INITIAL_ZOOM, LayerRegistry, MarkerStyle,
    Position, StyleCatalog, builtin_registry, category_layer,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {config_path}: {source}")]
    ConfigReadError {
        config_path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config file at {config_path}: {source}")]
    ConfigParseError {
        config_path: PathBuf,
        source: toml::de::Error,
    },

    #[error("Invalid category layer {id:?}: {reason}")]
    InvalidCategoryLayer { id: String, reason: String },
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub map: MapConfig,
    pub styles: StyleOverrides,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub persistence: Option<PersistenceConfig>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub category_layers: Vec<CategoryLayerConfig>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MapConfig {
    pub style: BasemapStyle,
    pub center: Position,
    pub zoom: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,
}

impl Default for MapConfig {
    fn default() -> Self {
        Self {
            style: BasemapStyle::default(),
            center: INITIAL_CENTER,
            zoom: INITIAL_ZOOM,
            access_token: None,
        }
    }
}

/// Replacement URLs for the built-in basemap styles
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StyleOverrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub streets: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub satellite: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dark: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub light: Option<String>,
}

impl StyleOverrides {
    pub fn catalog(&self) -> StyleCatalog {
        let overrides = [
            (BasemapStyle::Streets, &self.streets),
            (BasemapStyle::Satellite, &self.satellite),
            (BasemapStyle::Dark, &self.dark),
            (BasemapStyle::Light, &self.light),
        ];
        overrides
            .into_iter()
            .fold(StyleCatalog::new(), |catalog, (style, url)| match url {
                Some(url) => catalog.with_override(style, url.clone()),
                None => catalog,
            })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersistenceConfig {
    pub url: String,
    pub anon_key: String,
    #[serde(default = "default_table")]
    pub table: String,
    #[serde(default = "default_bucket")]
    pub bucket: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl PersistenceConfig {
    pub fn new(url: impl Into<String>, anon_key: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            anon_key: anon_key.into(),
            table: default_table(),
            bucket: default_bucket(),
            timeout_secs: default_timeout_secs(),
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

fn default_table() -> String {
    "polygons".to_string()
}

fn default_bucket() -> String {
    "polygon-images".to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryLayerConfig {
    pub id: String,
    pub label: String,
    #[serde(default = "default_visible")]
    pub visible: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(default)]
    pub points: Vec<PointConfig>,
}

fn default_visible() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PointConfig {
    pub name: String,
    pub lon: f64,
    pub lat: f64,
}

impl Config {
    pub fn load_from_path<P: AsRef<Path>>(config_path: P) -> Result<Option<Self>, ConfigError> {
        let config_path = config_path.as_ref();
        if !config_path.exists() {
            return Ok(None);
        }

        let content = std::fs::read_to_string(config_path).map_err(|source| {
            ConfigError::ConfigReadError {
                config_path: config_path.to_path_buf(),
                source,
            }
        })?;

        let mut config: Config =
            toml::from_str(&content).map_err(|source| ConfigError::ConfigParseError {
                config_path: config_path.to_path_buf(),
                source,
            })?;

        // Expand shell variables and tilde in the connection settings
        if let Some(persistence) = config.persistence.as_mut() {
            persistence.url = Self::expand(&persistence.url).unwrap_or(persistence.url.clone());
            persistence.anon_key =
                Self::expand(&persistence.anon_key).unwrap_or(persistence.anon_key.clone());
        }

        Ok(Some(config))
    }

    pub fn load() -> Result<Option<Self>, ConfigError> {
        let config_path = Self::config_path();
        Self::load_from_path(&config_path)
    }

    pub fn save_to_path<P: AsRef<Path>>(&self, config_path: P) -> anyhow::Result<()> {
        let config_path = config_path.as_ref();
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(config_path, content)?;
        Ok(())
    }

    pub fn save(&self) -> anyhow::Result<()> {
        let config_path = Self::config_path();
        self.save_to_path(&config_path)
    }

    pub fn config_path() -> PathBuf {
        let config_dir = shellexpand::tilde("~/.config/mapnotes");
        PathBuf::from(config_dir.as_ref()).join("config.toml")
    }

    /// Built-in category layers followed by the configured ones.
    pub fn layer_registry(&self) -> Result<LayerRegistry, ConfigError> {
        let mut registry = builtin_registry();
        for layer in &self.category_layers {
            let invalid = |reason: String| ConfigError::InvalidCategoryLayer {
                id: layer.id.clone(),
                reason,
            };

            let mut marker = MarkerStyle::default();
            if let Some(color) = &layer.color {
                let color = Color::parse(color).map_err(|e| invalid(e.to_string()))?;
                marker.color = color.as_str().to_string();
            }
            let points: Vec<CategoryPoint> = layer
                .points
                .iter()
                .map(|p| CategoryPoint::new(p.name.as_str(), [p.lon, p.lat]))
                .collect();

            registry
                .register(category_layer(
                    &layer.id,
                    &layer.label,
                    layer.visible,
                    &points,
                    marker,
                ))
                .map_err(|e| invalid(e.to_string()))?;
        }
        Ok(registry)
    }

    fn expand(value: &str) -> Option<String> {
        match shellexpand::full(value) {
            Ok(expanded) => Some(expanded.into_owned()),
            Err(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::env;
    use tempfile::TempDir;

    #[test]
    fn test_config_path() {
        let config_path = Config::config_path();
        let path_str = config_path.to_string_lossy();

        assert!(!path_str.starts_with('~'));
        assert!(path_str.ends_with(".config/mapnotes/config.toml"));
    }

    #[test]
    fn test_empty_file_gives_defaults() {
        let config: Config = toml::from_str("").unwrap();

        assert_eq!(config, Config::default());
        assert_eq!(config.map.center, [0.0, 20.0]);
        assert_eq!(config.map.zoom, 2.0);
        assert_eq!(config.map.style, BasemapStyle::Streets);
    }

    #[test]
    fn test_load_config_file_not_found() {
        let temp_dir = TempDir::new().unwrap();
        let non_existent_config = temp_dir.path().join("nonexistent.toml");

        let result = Config::load_from_path(&non_existent_config).unwrap();

        assert!(result.is_none());
    }

    #[test]
    fn test_load_invalid_toml() {
        let temp_dir = TempDir::new().unwrap();
        let config_file = temp_dir.path().join("config.toml");
        std::fs::write(&config_file, "[map\nstyle = ").unwrap();

        let result = Config::load_from_path(&config_file);
        assert!(matches!(result, Err(ConfigError::ConfigParseError { .. })));
    }

    #[test]
    fn test_save_and_load_config() {
        let temp_dir = TempDir::new().unwrap();
        let config_file = temp_dir.path().join("nested/config.toml");
        let config = Config {
            map: MapConfig {
                style: BasemapStyle::Dark,
                ..MapConfig::default()
            },
            persistence: Some(PersistenceConfig::new("https://db.example", "anon")),
            ..Config::default()
        };

        config.save_to_path(&config_file).unwrap();
        let loaded = Config::load_from_path(&config_file).unwrap().unwrap();

        assert_eq!(loaded, config);
    }

    #[test]
    fn test_full_config() {
        let content = r##"
[map]
style = "satellite"
center = [77.2, 28.6]
zoom = 10.0

[styles]
dark = "https://tiles.example/dark.json"

[persistence]
url = "https://db.example"
anon_key = "key"
timeout_secs = 5

[[category_layers]]
id = "pharmacies"
label = "Pharmacies"
color = "#9333EA"
points = [{ name = "Central", lon = 77.21, lat = 28.63 }]
"##;
        let config: Config = toml::from_str(content).unwrap();

        assert_eq!(config.map.style, BasemapStyle::Satellite);
        assert_eq!(
            config.styles.catalog().url(BasemapStyle::Dark),
            "https://tiles.example/dark.json"
        );
        assert_eq!(
            config.styles.catalog().url(BasemapStyle::Light),
            BasemapStyle::Light.default_url()
        );

        let persistence = config.persistence.as_ref().unwrap();
        assert_eq!(persistence.table, "polygons");
        assert_eq!(persistence.bucket, "polygon-images");
        assert_eq!(persistence.timeout(), Duration::from_secs(5));

        let registry = config.layer_registry().unwrap();
        let ids: Vec<_> = registry.iter().map(|l| l.id.as_str()).collect();
        assert_eq!(ids, vec!["hospitals", "police", "shelters", "pharmacies"]);
        let pharmacies = registry.get("pharmacies").unwrap();
        assert!(pharmacies.visible);
        assert_eq!(pharmacies.marker.color, "#9333ea");
        assert_eq!(pharmacies.features.len(), 1);
    }

    #[test]
    fn test_category_layer_clashing_with_builtin() {
        let config = Config {
            category_layers: vec![CategoryLayerConfig {
                id: "hospitals".to_string(),
                label: "More hospitals".to_string(),
                visible: true,
                color: None,
                points: vec![],
            }],
            ..Config::default()
        };

        assert!(matches!(
            config.layer_registry(),
            Err(ConfigError::InvalidCategoryLayer { id, .. }) if id == "hospitals"
        ));
    }

    #[test]
    fn test_category_layer_cannot_take_annotation_ids() {
        let content = r#"
[[category_layers]]
id = "annotations"
label = "Sneaky"
points = [{ name = "X", lon = 0.005, lat = 0.005 }]
"#;
        let config: Config = toml::from_str(content).unwrap();

        match config.layer_registry() {
            Err(ConfigError::InvalidCategoryLayer { id, reason }) => {
                assert_eq!(id, "annotations");
                assert!(reason.contains("reserved"));
            }
            other => panic!("expected a rejected layer, got {other:?}"),
        }
    }

    #[test]
    fn test_category_layer_with_bad_color() {
        let config = Config {
            category_layers: vec![CategoryLayerConfig {
                id: "wells".to_string(),
                label: "Wells".to_string(),
                visible: false,
                color: Some("blue-ish".to_string()),
                points: vec![],
            }],
            ..Config::default()
        };

        assert!(config.layer_registry().is_err());
    }

    #[test]
    fn test_persistence_settings_expand_env_vars() {
        let temp_dir = TempDir::new().unwrap();
        let config_file = temp_dir.path().join("config.toml");
        unsafe {
            env::set_var("MAPNOTES_TEST_DB_URL", "https://project.supabase.co");
        }
        std::fs::write(
            &config_file,
            "[persistence]\nurl = \"$MAPNOTES_TEST_DB_URL\"\nanon_key = \"literal\"\n",
        )
        .unwrap();

        let config = Config::load_from_path(&config_file).unwrap().unwrap();
        let persistence = config.persistence.unwrap();
        assert_eq!(persistence.url, "https://project.supabase.co");
        assert_eq!(persistence.anon_key, "literal");

        unsafe {
            env::remove_var("MAPNOTES_TEST_DB_URL");
        }
    }

    #[test]
    fn test_unset_variable_is_left_as_is() {
        assert_eq!(Config::expand("/plain/value"), Some("/plain/value".to_string()));
        assert_eq!(Config::expand("$MAPNOTES_SURELY_UNSET_VAR"), None);
    }
}
