//! Итоговая форма строк и справочники для обслуживания

use std::collections::BTreeMap;

use chrono::{Datelike, NaiveDate};

use super::status::StatusClassifier;
use crate::types::{
    CircuitOption, ConstructorOption, DerivedDateFeatures, DeviationRecord, DriverOption, FeatureRow,
    FeatureValue, ParticipantEventRecord, PickLists, RaceVariant,
};

pub const MAIN_RACE_FEATURES: [&str; 17] = [
    "driver",
    "constructor",
    "circuit",
    "circuit_type",
    "driver_nationality",
    "constructor_nationality",
    "circuit_nationality",
    "qualification_position",
    "laps",
    "race_year",
    "race_month",
    "race_day",
    "rain",
    "driver_home",
    "constructor_home",
    "age_at_event_in_days",
    "days_since_first_event",
];

pub const QUALIFYING_FEATURES: [&str; 14] = [
    "driver",
    "constructor",
    "circuit",
    "circuit_type",
    "driver_nationality",
    "constructor_nationality",
    "circuit_nationality",
    "race_year",
    "race_month",
    "race_day",
    "driver_home",
    "constructor_home",
    "age_at_event_in_days",
    "days_since_first_event",
];

pub const STATUS_FEATURES: [&str; 16] = [
    "driver",
    "constructor",
    "circuit",
    "circuit_type",
    "driver_nationality",
    "constructor_nationality",
    "circuit_nationality",
    "qualification_position",
    "race_year",
    "race_month",
    "race_day",
    "rain",
    "driver_home",
    "constructor_home",
    "age_at_event_in_days",
    "days_since_first_event",
];

pub fn feature_columns(variant: RaceVariant) -> &'static [&'static str] {
    match variant {
        RaceVariant::MainRace => &MAIN_RACE_FEATURES,
        RaceVariant::Qualifying => &QUALIFYING_FEATURES,
        RaceVariant::Status => &STATUS_FEATURES,
    }
}

pub fn label_columns(variant: RaceVariant) -> &'static [&'static str] {
    match variant {
        RaceVariant::MainRace => &["deviation_from_median_ms", "final_position"],
        RaceVariant::Qualifying => &["deviation_from_median_ms"],
        RaceVariant::Status => &["dnf"],
    }
}

/// Полный заголовок выходной таблицы варианта.
pub fn output_columns(variant: RaceVariant) -> Vec<&'static str> {
    feature_columns(variant)
        .iter()
        .chain(label_columns(variant))
        .copied()
        .collect()
}

/// Входы одной строки признаков; общий построитель для обучения и обслуживания.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureInputs<'a> {
    pub driver: &'a str,
    pub constructor: &'a str,
    pub circuit: &'a str,
    pub circuit_type: Option<&'a str>,
    pub driver_nationality: Option<&'a str>,
    pub constructor_nationality: Option<&'a str>,
    pub circuit_nationality: Option<&'a str>,
    pub event_date: NaiveDate,
    pub derived: DerivedDateFeatures,
    pub driver_home: u8,
    pub constructor_home: u8,
    pub qualification_position: Option<i64>,
    pub laps: Option<i64>,
    pub rain: u8,
}

impl<'a> FeatureInputs<'a> {
    pub fn from_record(record: &'a ParticipantEventRecord) -> Self {
        Self {
            driver: &record.driver,
            constructor: &record.constructor,
            circuit: &record.event.circuit,
            circuit_type: record.circuit_type.as_deref(),
            driver_nationality: record.driver_nationality.as_deref(),
            constructor_nationality: record.constructor_nationality.as_deref(),
            circuit_nationality: record.circuit_nationality.as_deref(),
            event_date: record.event.date,
            derived: record.derived,
            driver_home: record.driver_home,
            constructor_home: record.constructor_home,
            qualification_position: record.qualification_position,
            laps: None,
            rain: record.rain,
        }
    }

    fn value(&self, column: &str) -> FeatureValue {
        match column {
            "driver" => FeatureValue::Text(self.driver.to_string()),
            "constructor" => FeatureValue::Text(self.constructor.to_string()),
            "circuit" => FeatureValue::Text(self.circuit.to_string()),
            "circuit_type" => FeatureValue::opt_text(self.circuit_type),
            "driver_nationality" => FeatureValue::opt_text(self.driver_nationality),
            "constructor_nationality" => FeatureValue::opt_text(self.constructor_nationality),
            "circuit_nationality" => FeatureValue::opt_text(self.circuit_nationality),
            "qualification_position" => FeatureValue::opt_int(self.qualification_position),
            "laps" => FeatureValue::opt_int(self.laps),
            "race_year" => FeatureValue::Int(i64::from(self.event_date.year())),
            "race_month" => FeatureValue::Int(i64::from(self.event_date.month())),
            "race_day" => FeatureValue::Int(i64::from(self.event_date.day())),
            "rain" => FeatureValue::Int(i64::from(self.rain)),
            "driver_home" => FeatureValue::Int(i64::from(self.driver_home)),
            "constructor_home" => FeatureValue::Int(i64::from(self.constructor_home)),
            "age_at_event_in_days" => FeatureValue::opt_int(self.derived.age_at_event_in_days),
            "days_since_first_event" => FeatureValue::opt_int(self.derived.days_since_first_event),
            _ => FeatureValue::Missing,
        }
    }

    /// Строка признаков варианта без метки.
    pub fn row(&self, variant: RaceVariant) -> FeatureRow {
        let mut row = FeatureRow::default();
        for &column in feature_columns(variant) {
            row.push(column, self.value(column));
        }
        row
    }
}

pub struct FeatureProjector {
    variant: RaceVariant,
}

impl FeatureProjector {
    pub fn new(variant: RaceVariant) -> Self {
        Self { variant }
    }

    /// Строки с отклонением (основная гонка, квалификация).
    pub fn project_deviations(&self, deviations: &[DeviationRecord], records: &[ParticipantEventRecord]) -> Vec<FeatureRow> {
        deviations
            .iter()
            .filter_map(|d| {
                let record = records.get(d.duration.record)?;
                let mut inputs = FeatureInputs::from_record(record);
                inputs.laps = Some(d.max_laps);
                let mut row = inputs.row(self.variant);
                row.push("deviation_from_median_ms", FeatureValue::Int(d.deviation_from_median_ms));
                if self.variant == RaceVariant::MainRace {
                    row.push("final_position", FeatureValue::Int(i64::from(d.final_position)));
                }
                Some(row)
            })
            .collect()
    }

    /// Строки статуса с меткой схода.
    pub fn project_status(&self, records: &[ParticipantEventRecord]) -> Vec<FeatureRow> {
        records
            .iter()
            .map(|record| {
                let mut row = FeatureInputs::from_record(record).row(self.variant);
                row.push("dnf", FeatureValue::Int(i64::from(StatusClassifier::dnf(&record.classification))));
                row
            })
            .collect()
    }

    /// Уникальные гонщики, команды и трассы выходной таблицы, отсортированные по ссылке.
    pub fn pick_lists<'r>(records: impl IntoIterator<Item = &'r ParticipantEventRecord>) -> PickLists {
        let mut drivers: BTreeMap<String, DriverOption> = BTreeMap::new();
        let mut constructors: BTreeMap<String, ConstructorOption> = BTreeMap::new();
        let mut circuits: BTreeMap<String, CircuitOption> = BTreeMap::new();

        for record in records {
            drivers.entry(record.driver.clone()).or_insert_with(|| DriverOption {
                driver_ref: record.driver.clone(),
                driver_nationality: record.driver_nationality.clone(),
                driver_date_of_birth: record.driver_date_of_birth,
                first_event_date: record.first_event_date,
            });
            constructors
                .entry(record.constructor.clone())
                .or_insert_with(|| ConstructorOption {
                    constructor_ref: record.constructor.clone(),
                    constructor_nationality: record.constructor_nationality.clone(),
                });
            circuits.entry(record.event.circuit.clone()).or_insert_with(|| CircuitOption {
                circuit_ref: record.event.circuit.clone(),
                circuit_nationality: record.circuit_nationality.clone(),
                circuit_type: record.circuit_type.clone(),
            });
        }

        PickLists {
            drivers: drivers.into_values().collect(),
            constructors: constructors.into_values().collect(),
            circuits: circuits.into_values().collect(),
        }
    }
}
