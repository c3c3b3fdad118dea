//! Источники сырых таблиц
//!
//! Адаптеры схем приводят разные выгрузки к одним каноническим строкам; конвейер
//! работает только с [`RawTables`].

pub mod jolpica;
pub mod legacy;
pub mod memory;

use std::io::Read;
use std::path::Path;
use std::str::FromStr;

use chrono::NaiveDate;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};
use tracing::{info, warn};

use crate::error::{PipelineError, Result};
use crate::preprocessing::normalization::CountryTable;
use crate::types::{Classification, RaceVariant, RowId, SessionKind};

pub use jolpica::JolpicaTables;
pub use legacy::LegacyTables;
pub use memory::InMemoryTables;

/// Сессия (гонка или сегмент квалификации) вместе с данными этапа.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionRow {
    pub id: Option<RowId>,
    pub kind: SessionKind,
    pub cancelled: bool,
    pub circuit_id: Option<RowId>,
    pub round_date: Option<NaiveDate>,
    pub session_date: Option<NaiveDate>,
}

/// Участие гонщика в сессии.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct EntryRow {
    pub id: Option<RowId>,
    pub session_id: Option<RowId>,
    pub driver_id: Option<RowId>,
    pub constructor_id: Option<RowId>,
    pub grid: Option<i64>,
    pub reported_laps: Option<i64>,
    pub duration_text: Option<String>,
    pub duration_ms: Option<i64>,
    pub classification: Classification,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct LapRow {
    pub entry_id: Option<RowId>,
    pub time_text: Option<String>,
    pub milliseconds: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct DriverRow {
    pub id: Option<RowId>,
    pub reference: Option<String>,
    pub date_of_birth: Option<NaiveDate>,
    pub nationality: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct ConstructorRow {
    pub id: Option<RowId>,
    pub reference: Option<String>,
    pub nationality: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct CircuitRow {
    pub id: Option<RowId>,
    pub reference: Option<String>,
    /// Код страны или её название, в зависимости от схемы
    pub country: Option<String>,
}

/// Как схема хранит национальности.
#[derive(Debug, Clone)]
pub enum NationalityCodes {
    /// Уже alpha-3 коды
    AlreadyCoded,
    /// Демонимы и названия стран, сопоставляются через таблицу стран
    Countries(CountryTable),
}

/// Доступ к каноническим таблицам конкретной схемы.
pub trait RawTables {
    fn schema_name(&self) -> &'static str;
    fn sessions(&self, variant: RaceVariant) -> Vec<SessionRow>;
    fn entries(&self, variant: RaceVariant) -> Vec<EntryRow>;
    fn laps(&self, variant: RaceVariant) -> Vec<LapRow>;
    fn drivers(&self) -> Vec<DriverRow>;
    fn constructors(&self) -> Vec<ConstructorRow>;
    fn circuits(&self) -> Vec<CircuitRow>;
    fn nationality_codes(&self) -> NationalityCodes;
}

/// Поддерживаемые выгрузки.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchemaKind {
    Jolpica,
    Legacy,
}

impl FromStr for SchemaKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "jolpica" | "new" => Ok(SchemaKind::Jolpica),
            "legacy" | "ergast" => Ok(SchemaKind::Legacy),
            other => Err(format!("unknown schema: {other}")),
        }
    }
}

/// Загрузка таблиц выбранной схемы; отсутствие основной таблицы фатально.
pub fn load_tables(schema: SchemaKind, raw_dir: &Path) -> Result<Box<dyn RawTables>> {
    Ok(match schema {
        SchemaKind::Jolpica => Box::new(JolpicaTables::load(raw_dir)?),
        SchemaKind::Legacy => Box::new(LegacyTables::load(raw_dir)?),
    })
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
pub struct WeatherRow {
    #[serde(default, deserialize_with = "opt_date")]
    pub date: Option<NaiveDate>,
    #[serde(default, deserialize_with = "opt_text")]
    pub weather: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
pub struct CircuitTypeRow {
    #[serde(default, deserialize_with = "opt_text")]
    pub circuit: Option<String>,
    #[serde(default, rename = "type", alias = "type_circuit", deserialize_with = "opt_text")]
    pub circuit_type: Option<String>,
}

/// Вспомогательные таблицы, общие для обеих схем.
#[derive(Debug, Clone, Default)]
pub struct AuxiliaryTables {
    pub weather: Option<Vec<WeatherRow>>,
    pub circuit_types: Option<Vec<CircuitTypeRow>>,
}

impl AuxiliaryTables {
    pub fn load(raw_dir: &Path) -> Result<Self> {
        Ok(Self {
            weather: read_table(&raw_dir.join("race_weather.csv"), "race_weather", false)?,
            circuit_types: read_table(&raw_dir.join("circuit_type.csv"), "circuit_type", false)?,
        })
    }
}

/// Чтение CSV в строки `T`; повреждённые строки пропускаются с предупреждением.
pub fn read_table<T: DeserializeOwned>(
    path: &Path,
    table: &'static str,
    required: bool,
) -> Result<Option<Vec<T>>> {
    if !path.exists() {
        if required {
            return Err(PipelineError::MissingTable {
                table,
                path: path.to_path_buf(),
            });
        }
        warn!("Optional table `{}` not found at {}, using defaults", table, path.display());
        return Ok(None);
    }

    let file = std::fs::File::open(path).map_err(|source| PipelineError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let rows = read_rows(file, table).map_err(|source| PipelineError::Csv {
        path: path.to_path_buf(),
        source,
    })?;
    info!("Loaded `{}`: {} rows", table, rows.len());
    Ok(Some(rows))
}

pub fn read_required<T: DeserializeOwned>(dir: &Path, file: &str, table: &'static str) -> Result<Vec<T>> {
    Ok(read_table(&dir.join(file), table, true)?.unwrap_or_default())
}

pub fn read_rows<R: Read, T: DeserializeOwned>(rdr: R, table: &str) -> std::result::Result<Vec<T>, csv::Error> {
    let mut reader = csv::ReaderBuilder::new().flexible(true).from_reader(rdr);
    // заголовки читаются заранее, чтобы ошибка формата файла не терялась среди строк
    reader.headers()?;
    let mut rows = Vec::new();
    let mut skipped = 0usize;
    for result in reader.deserialize::<T>() {
        match result {
            Ok(row) => rows.push(row),
            Err(e) => {
                skipped += 1;
                if skipped <= 5 {
                    warn!("skipping malformed `{}` row: {}", table, e);
                }
            }
        }
    }
    if skipped > 5 {
        warn!("skipped {} malformed `{}` rows in total", skipped, table);
    }
    Ok(rows)
}

// ---------------------------------------------------------------------------
// Нестрогая десериализация: нечисловые ключи и метки пропуска дают None
// ---------------------------------------------------------------------------

fn is_missing(raw: &str) -> bool {
    let raw = raw.trim();
    raw.is_empty() || raw == "\\N" || raw == "/N" || raw.eq_ignore_ascii_case("nan") || raw.eq_ignore_ascii_case("null")
}

pub fn parse_int(raw: &str) -> Option<i64> {
    if is_missing(raw) {
        return None;
    }
    let raw = raw.trim();
    raw.parse::<i64>().ok().or_else(|| {
        // pandas пишет целые как "12.0"
        raw.parse::<f64>()
            .ok()
            .filter(|v| v.is_finite() && v.fract() == 0.0)
            .map(|v| v as i64)
    })
}

pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    if is_missing(raw) {
        return None;
    }
    let raw = raw.trim();
    let day = raw.get(..10).unwrap_or(raw);
    NaiveDate::parse_from_str(day, "%Y-%m-%d").ok()
}

pub fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "t" | "true" | "1" => Some(true),
        "f" | "false" | "0" => Some(false),
        _ => None,
    }
}

pub fn opt_id<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Option<i64>, D::Error> {
    let raw: Option<String> = Option::deserialize(deserializer)?;
    Ok(raw.as_deref().and_then(parse_int))
}

pub fn opt_text<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Option<String>, D::Error> {
    let raw: Option<String> = Option::deserialize(deserializer)?;
    Ok(raw.filter(|v| !is_missing(v)))
}

pub fn opt_date<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Option<NaiveDate>, D::Error> {
    let raw: Option<String> = Option::deserialize(deserializer)?;
    Ok(raw.as_deref().and_then(parse_date))
}

pub fn opt_bool<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Option<bool>, D::Error> {
    let raw: Option<String> = Option::deserialize(deserializer)?;
    Ok(raw.as_deref().and_then(parse_bool))
}
