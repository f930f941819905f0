use chrono::format::{Item, StrftimeItems};
use chrono::Weekday;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

use crate::calendar::{CalendarView, DEFAULT_SLOT_KEY};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),
    #[error("Failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),
    #[error("Failed to serialize config: {0}")]
    SerializeError(#[from] toml::ser::Error),
    #[error("Invalid config value: {0}")]
    InvalidValue(String),
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Config {
    pub storage: StorageConfig,
    pub ui: UiConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StorageConfig {
    pub database: PathBuf,
    pub slot: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UiConfig {
    pub default_view: CalendarView,
    pub first_day_of_week: String,
    pub time_format: String,
    pub date_format: String,
    pub max_events_per_cell: usize,
}

impl UiConfig {
    pub fn week_start(&self) -> Result<Weekday, ConfigError> {
        match self.first_day_of_week.to_ascii_lowercase().as_str() {
            "sunday" => Ok(Weekday::Sun),
            "monday" => Ok(Weekday::Mon),
            other => Err(ConfigError::InvalidValue(format!(
                "first_day_of_week must be Sunday or Monday, got '{}'",
                other
            ))),
        }
    }

    pub fn check_date_format(&self) -> Result<(), ConfigError> {
        if StrftimeItems::new(&self.date_format).any(|item| matches!(item, Item::Error)) {
            return Err(ConfigError::InvalidValue(format!(
                "date_format '{}' is not a valid strftime pattern",
                self.date_format
            )));
        }
        Ok(())
    }

    pub fn twelve_hour(&self) -> bool {
        self.time_format != "24h"
    }
}

impl Config {
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.ui.week_start()?;
        config.ui.check_date_format()?;
        Ok(config)
    }

    pub fn load_or_create() -> Result<Self, ConfigError> {
        Self::load_or_create_at(&Self::config_path())
    }

    pub fn load_or_create_at(config_path: &std::path::Path) -> Result<Self, ConfigError> {
        if config_path.exists() {
            let content = std::fs::read_to_string(config_path)?;
            Self::from_toml(&content)
        } else {
            let config = Self::default();
            config.save_to(config_path)?;
            tracing::info!("Wrote default config to {}", config_path.display());
            Ok(config)
        }
    }

    pub fn config_dir() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("calstore")
    }

    pub fn config_path() -> PathBuf {
        Self::config_dir().join("config.toml")
    }

    pub fn save_to(&self, config_path: &std::path::Path) -> Result<(), ConfigError> {
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(config_path, content)?;

        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        let data_dir = dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("calstore");

        Self {
            storage: StorageConfig {
                database: data_dir.join("calendar.db"),
                slot: DEFAULT_SLOT_KEY.to_string(),
            },
            ui: UiConfig {
                default_view: CalendarView::Month,
                first_day_of_week: "Sunday".to_string(),
                time_format: "12h".to_string(),
                date_format: "%B %-d, %Y".to_string(),
                max_events_per_cell: 2,
            },
        }
    }
}
