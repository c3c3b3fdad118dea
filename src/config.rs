//! Конфигурация конвейера
//!
//! Все пути и пороги передаются в стадии явно, без глобальных значений по умолчанию.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{PipelineError, Result};
use crate::types::RaceVariant;

pub const RAW_DIR_ENV: &str = "RACE_ML_RAW_DIR";
pub const PROCESSED_DIR_ENV: &str = "RACE_ML_PROCESSED_DIR";

/// Допустимый диапазон отклонения от медианы (строгие границы).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviationBounds {
    #[serde(default)]
    pub lower: Option<i64>,
    #[serde(default)]
    pub upper: Option<i64>,
}

impl DeviationBounds {
    pub fn contains(&self, deviation: i64) -> bool {
        self.lower.map_or(true, |lower| deviation > lower)
            && self.upper.map_or(true, |upper| deviation < upper)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    #[serde(default = "default_raw_dir")]
    pub raw_dir: PathBuf,
    #[serde(default = "default_processed_dir")]
    pub processed_dir: PathBuf,
    #[serde(default = "default_year_from")]
    pub year_from: i32,
    #[serde(default = "default_min_laps")]
    pub min_laps_threshold: i64,
    #[serde(default = "default_main_race_bounds")]
    pub main_race_bounds: DeviationBounds,
    #[serde(default = "default_qualifying_bounds")]
    pub qualifying_bounds: DeviationBounds,
    #[serde(default)]
    pub retain_non_finishers: bool,
}

fn default_raw_dir() -> PathBuf {
    PathBuf::from("data/raw")
}

fn default_processed_dir() -> PathBuf {
    PathBuf::from("data/processed")
}

fn default_year_from() -> i32 {
    1981
}

fn default_min_laps() -> i64 {
    10
}

fn default_main_race_bounds() -> DeviationBounds {
    DeviationBounds {
        lower: Some(-110_000),
        upper: Some(612_000),
    }
}

fn default_qualifying_bounds() -> DeviationBounds {
    DeviationBounds {
        lower: None,
        upper: Some(1_000_000),
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            raw_dir: default_raw_dir(),
            processed_dir: default_processed_dir(),
            year_from: default_year_from(),
            min_laps_threshold: default_min_laps(),
            main_race_bounds: default_main_race_bounds(),
            qualifying_bounds: default_qualifying_bounds(),
            retain_non_finishers: false,
        }
    }
}

impl PipelineConfig {
    /// Загрузка из JSON-файла; отсутствующие поля получают значения по умолчанию.
    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|source| PipelineError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = serde_json::from_str(&text)
            .map_err(|e| PipelineError::Config(format!("{}: {}", path.display(), e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Переопределение каталогов из переменных окружения.
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(dir) = std::env::var(RAW_DIR_ENV) {
            self.raw_dir = PathBuf::from(dir);
        }
        if let Ok(dir) = std::env::var(PROCESSED_DIR_ENV) {
            self.processed_dir = PathBuf::from(dir);
        }
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.min_laps_threshold < 1 {
            return Err(PipelineError::Config(format!(
                "min_laps_threshold must be >= 1, got {}",
                self.min_laps_threshold
            )));
        }
        for (name, bounds) in [
            ("main_race_bounds", self.main_race_bounds),
            ("qualifying_bounds", self.qualifying_bounds),
        ] {
            if let (Some(lower), Some(upper)) = (bounds.lower, bounds.upper) {
                if lower >= upper {
                    return Err(PipelineError::Config(format!(
                        "{name}: lower bound {lower} must be below upper bound {upper}"
                    )));
                }
            }
        }
        Ok(())
    }

    /// Границы выбросов для варианта; у статуса фильтра нет.
    pub fn bounds_for(&self, variant: RaceVariant) -> Option<DeviationBounds> {
        match variant {
            RaceVariant::MainRace => Some(self.main_race_bounds),
            RaceVariant::Qualifying => Some(self.qualifying_bounds),
            RaceVariant::Status => None,
        }
    }

    pub fn features_helper_dir(&self) -> PathBuf {
        self.processed_dir.join("features_helper")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bounds_are_strict() {
        let bounds = default_main_race_bounds();
        assert!(!bounds.contains(-110_000));
        assert!(!bounds.contains(612_000));
        assert!(bounds.contains(-109_999));
        assert!(bounds.contains(611_999));
    }

    #[test]
    fn qualifying_has_no_lower_bound() {
        let bounds = default_qualifying_bounds();
        assert!(bounds.contains(-5_000_000));
        assert!(!bounds.contains(1_000_000));
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let config: PipelineConfig = serde_json::from_str(r#"{"min_laps_threshold": 5}"#).unwrap();
        assert_eq!(config.min_laps_threshold, 5);
        assert_eq!(config.year_from, 1981);
        assert_eq!(config.main_race_bounds.upper, Some(612_000));
    }

    #[test]
    fn inverted_bounds_are_rejected() {
        let config = PipelineConfig {
            main_race_bounds: DeviationBounds { lower: Some(10), upper: Some(-10) },
            ..PipelineConfig::default()
        };
        assert!(config.validate().is_err());
    }
}
