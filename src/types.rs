/// Типы данных конвейера

use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Числовой идентификатор строки исходной таблицы.
pub type RowId = i64;

/// Вариант обучающей выборки.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RaceVariant {
    MainRace,
    Qualifying,
    Status,
}

impl RaceVariant {
    pub const ALL: [RaceVariant; 3] = [RaceVariant::MainRace, RaceVariant::Qualifying, RaceVariant::Status];

    /// Суффикс файлов справочников (`drivers_<suffix>.csv`).
    pub fn name_suffix(&self) -> &'static str {
        match self {
            RaceVariant::MainRace => "mainrace",
            RaceVariant::Qualifying => "qualifying",
            RaceVariant::Status => "status",
        }
    }

    pub fn output_file_name(&self) -> &'static str {
        match self {
            RaceVariant::MainRace => "cleaned_data_main_race_with_median.csv",
            RaceVariant::Qualifying => "cleaned_data_qualifying_with_median.csv",
            RaceVariant::Status => "cleaned_data_status.csv",
        }
    }

    pub fn accepts(&self, kind: &SessionKind) -> bool {
        match self {
            RaceVariant::MainRace | RaceVariant::Status => matches!(kind, SessionKind::Race),
            RaceVariant::Qualifying => matches!(kind, SessionKind::Qualifying(_)),
        }
    }
}

impl fmt::Display for RaceVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name_suffix())
    }
}

impl FromStr for RaceVariant {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "mainrace" | "main-race" | "main_race" | "race" => Ok(RaceVariant::MainRace),
            "qualifying" => Ok(RaceVariant::Qualifying),
            "status" => Ok(RaceVariant::Status),
            other => Err(format!("unknown variant: {other}")),
        }
    }
}

/// Тип сессии уикенда.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionKind {
    Race,
    /// Сегмент квалификации Q1..Q3
    Qualifying(u8),
    Other(String),
}

impl SessionKind {
    pub fn parse(code: &str) -> Self {
        match code.trim() {
            "R" => SessionKind::Race,
            "Q1" => SessionKind::Qualifying(1),
            "Q2" => SessionKind::Qualifying(2),
            "Q3" => SessionKind::Qualifying(3),
            other => SessionKind::Other(other.to_string()),
        }
    }
}

/// Итог участника: флаг классификации и/или текст статуса.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Classification {
    pub is_classified: Option<bool>,
    pub status: Option<String>,
}

impl Classification {
    pub fn is_recorded(&self) -> bool {
        self.is_classified.is_some() || self.status.is_some()
    }

    /// "Finished" или "+N Lap(s)"; без текста статуса решает флаг классификации.
    pub fn is_finisher(&self) -> bool {
        match &self.status {
            Some(status) => is_finished_status(status),
            None => self.is_classified.unwrap_or(false),
        }
    }
}

pub fn is_finished_status(status: &str) -> bool {
    let status = status.trim();
    status == "Finished" || is_lapped_status(status)
}

/// Статус вида "+1 Lap", "+3 Laps".
pub fn is_lapped_status(status: &str) -> bool {
    let Some(rest) = status.strip_prefix('+') else {
        return false;
    };
    let digits = rest.chars().take_while(|c| c.is_ascii_digit()).count();
    digits > 0 && rest[digits..].starts_with(" Lap")
}

/// Ключ события: порядок полей задаёт канонический порядок групп.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EventKey {
    pub race_year: i32,
    pub date: NaiveDate,
    pub circuit: String,
}

impl EventKey {
    pub fn new(circuit: impl Into<String>, date: NaiveDate) -> Self {
        use chrono::Datelike;
        Self {
            race_year: date.year(),
            date,
            circuit: circuit.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DerivedDateFeatures {
    pub age_at_event_in_days: Option<i64>,
    pub days_since_first_event: Option<i64>,
}

/// Одна строка на пару (гонщик, событие) после агрегации кругов и нормализации.
#[derive(Debug, Clone, PartialEq)]
pub struct ParticipantEventRecord {
    pub event: EventKey,
    pub race_month: u32,
    pub race_day: u32,
    pub driver: String,
    pub constructor: String,
    pub circuit_type: Option<String>,
    pub driver_nationality: Option<String>,
    pub constructor_nationality: Option<String>,
    pub circuit_nationality: Option<String>,
    pub driver_date_of_birth: Option<NaiveDate>,
    pub first_event_date: Option<NaiveDate>,
    pub qualification_position: Option<i64>,
    pub reported_laps: Option<i64>,
    pub lap_row_count: i64,
    pub laps_completed: i64,
    pub reported_duration_ms: Option<i64>,
    pub summed_lap_duration_ms: i64,
    pub min_lap_duration_ms: Option<i64>,
    pub classification: Classification,
    pub rain: u8,
    pub derived: DerivedDateFeatures,
    pub driver_home: u8,
    pub constructor_home: u8,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DurationRecord {
    /// Индекс строки в таблице ParticipantEventRecord
    pub record: usize,
    pub event: EventKey,
    pub race_duration_ms: i64,
    pub laps_completed: i64,
    pub is_classified: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DeviationRecord {
    pub duration: DurationRecord,
    pub max_laps: i64,
    pub final_duration_ms: i64,
    pub median_duration_ms: i64,
    pub deviation_from_median_ms: i64,
    pub final_position: u32,
}

/// Значение признака в выходной таблице.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FeatureValue {
    Int(i64),
    Text(String),
    Missing,
}

impl FeatureValue {
    pub fn opt_int(value: Option<i64>) -> Self {
        value.map_or(FeatureValue::Missing, FeatureValue::Int)
    }

    pub fn opt_text(value: Option<&str>) -> Self {
        value.map_or(FeatureValue::Missing, |v| FeatureValue::Text(v.to_string()))
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            FeatureValue::Int(v) => Some(*v as f64),
            _ => None,
        }
    }
}

impl fmt::Display for FeatureValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FeatureValue::Int(v) => write!(f, "{v}"),
            FeatureValue::Text(v) => f.write_str(v),
            FeatureValue::Missing => Ok(()),
        }
    }
}

/// Плоская строка признаков в каноническом порядке колонок.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct FeatureRow {
    pub values: Vec<(&'static str, FeatureValue)>,
}

impl FeatureRow {
    pub fn push(&mut self, name: &'static str, value: FeatureValue) {
        self.values.push((name, value));
    }

    pub fn get(&self, name: &str) -> Option<&FeatureValue> {
        self.values.iter().find(|(n, _)| *n == name).map(|(_, v)| v)
    }

    pub fn columns(&self) -> Vec<&'static str> {
        self.values.iter().map(|(n, _)| *n).collect()
    }

    pub fn to_json(&self) -> serde_json::Value {
        let map = self
            .values
            .iter()
            .map(|(name, value)| {
                let json = match value {
                    FeatureValue::Int(v) => serde_json::Value::from(*v),
                    FeatureValue::Text(v) => serde_json::Value::from(v.as_str()),
                    FeatureValue::Missing => serde_json::Value::Null,
                };
                (name.to_string(), json)
            })
            .collect();
        serde_json::Value::Object(map)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DriverOption {
    pub driver_ref: String,
    pub driver_nationality: Option<String>,
    pub driver_date_of_birth: Option<NaiveDate>,
    pub first_event_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ConstructorOption {
    pub constructor_ref: String,
    pub constructor_nationality: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CircuitOption {
    pub circuit_ref: String,
    pub circuit_nationality: Option<String>,
    pub circuit_type: Option<String>,
}

/// Справочники допустимых значений для слоя обслуживания.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PickLists {
    pub drivers: Vec<DriverOption>,
    pub constructors: Vec<ConstructorOption>,
    pub circuits: Vec<CircuitOption>,
}

/// Результат одного прогона варианта.
#[derive(Debug, Clone, Default)]
pub struct VariantOutput {
    pub records: Vec<ParticipantEventRecord>,
    pub deviations: Vec<DeviationRecord>,
    pub features: Vec<FeatureRow>,
    pub pick_lists: PickLists,
}
