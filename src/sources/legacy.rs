//! Адаптер старой выгрузки (races/results/qualifying/...)
//!
//! Гонка и квалификация этапа представлены двумя сессиями с общим идентификатором гонки;
//! вариант выбирает, какие строки участия и времена кругов подставлять.

use std::collections::HashMap;
use std::path::Path;

use chrono::NaiveDate;
use serde::Deserialize;
use tracing::info;

use super::{
    opt_date, opt_id, opt_text, read_required, CircuitRow, ConstructorRow, DriverRow, EntryRow, LapRow,
    NationalityCodes, RawTables, SessionRow,
};
use crate::error::Result;
use crate::preprocessing::normalization::{CountryRow, CountryTable};
use crate::types::{Classification, RaceVariant, RowId, SessionKind};

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RaceRecord {
    #[serde(default, rename = "raceId", deserialize_with = "opt_id")]
    pub race_id: Option<RowId>,
    #[serde(default, rename = "circuitId", deserialize_with = "opt_id")]
    pub circuit_id: Option<RowId>,
    #[serde(default, deserialize_with = "opt_date")]
    pub date: Option<NaiveDate>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ResultRecord {
    #[serde(default, rename = "resultId", deserialize_with = "opt_id")]
    pub result_id: Option<RowId>,
    #[serde(default, rename = "raceId", deserialize_with = "opt_id")]
    pub race_id: Option<RowId>,
    #[serde(default, rename = "driverId", deserialize_with = "opt_id")]
    pub driver_id: Option<RowId>,
    #[serde(default, rename = "constructorId", deserialize_with = "opt_id")]
    pub constructor_id: Option<RowId>,
    #[serde(default, deserialize_with = "opt_id")]
    pub grid: Option<i64>,
    #[serde(default, deserialize_with = "opt_id")]
    pub laps: Option<i64>,
    #[serde(default, deserialize_with = "opt_text")]
    pub time: Option<String>,
    #[serde(default, deserialize_with = "opt_id")]
    pub milliseconds: Option<i64>,
    #[serde(default, rename = "statusId", deserialize_with = "opt_id")]
    pub status_id: Option<RowId>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct QualifyingRecord {
    #[serde(default, rename = "qualifyId", deserialize_with = "opt_id")]
    pub qualify_id: Option<RowId>,
    #[serde(default, rename = "raceId", deserialize_with = "opt_id")]
    pub race_id: Option<RowId>,
    #[serde(default, rename = "driverId", deserialize_with = "opt_id")]
    pub driver_id: Option<RowId>,
    #[serde(default, rename = "constructorId", deserialize_with = "opt_id")]
    pub constructor_id: Option<RowId>,
    #[serde(default, deserialize_with = "opt_text")]
    pub q1: Option<String>,
    #[serde(default, deserialize_with = "opt_text")]
    pub q2: Option<String>,
    #[serde(default, deserialize_with = "opt_text")]
    pub q3: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DriverRecord {
    #[serde(default, rename = "driverId", deserialize_with = "opt_id")]
    pub driver_id: Option<RowId>,
    #[serde(default, rename = "driverRef", deserialize_with = "opt_text")]
    pub driver_ref: Option<String>,
    #[serde(default, deserialize_with = "opt_date")]
    pub dob: Option<NaiveDate>,
    #[serde(default, deserialize_with = "opt_text")]
    pub nationality: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConstructorRecord {
    #[serde(default, rename = "constructorId", deserialize_with = "opt_id")]
    pub constructor_id: Option<RowId>,
    #[serde(default, rename = "constructorRef", deserialize_with = "opt_text")]
    pub constructor_ref: Option<String>,
    #[serde(default, deserialize_with = "opt_text")]
    pub nationality: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CircuitRecord {
    #[serde(default, rename = "circuitId", deserialize_with = "opt_id")]
    pub circuit_id: Option<RowId>,
    #[serde(default, rename = "circuitRef", deserialize_with = "opt_text")]
    pub circuit_ref: Option<String>,
    #[serde(default, deserialize_with = "opt_text")]
    pub country: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct StatusRecord {
    #[serde(default, rename = "statusId", deserialize_with = "opt_id")]
    pub status_id: Option<RowId>,
    #[serde(default, deserialize_with = "opt_text")]
    pub status: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LapTimeRecord {
    #[serde(default, rename = "raceId", deserialize_with = "opt_id")]
    pub race_id: Option<RowId>,
    #[serde(default, rename = "driverId", deserialize_with = "opt_id")]
    pub driver_id: Option<RowId>,
    #[serde(default, deserialize_with = "opt_text")]
    pub time: Option<String>,
    #[serde(default, deserialize_with = "opt_id")]
    pub milliseconds: Option<i64>,
}

#[derive(Debug, Clone, Default)]
pub struct LegacyTables {
    pub races: Vec<RaceRecord>,
    pub results: Vec<ResultRecord>,
    pub qualifying: Vec<QualifyingRecord>,
    pub drivers: Vec<DriverRecord>,
    pub constructors: Vec<ConstructorRecord>,
    pub circuits: Vec<CircuitRecord>,
    pub statuses: Vec<StatusRecord>,
    pub lap_times: Vec<LapTimeRecord>,
    pub countries: Vec<CountryRow>,
}

impl LegacyTables {
    pub fn load(raw_dir: &Path) -> Result<Self> {
        let tables = Self {
            races: read_required(raw_dir, "races.csv", "races")?,
            results: read_required(raw_dir, "results.csv", "results")?,
            qualifying: read_required(raw_dir, "qualifying.csv", "qualifying")?,
            drivers: read_required(raw_dir, "drivers.csv", "drivers")?,
            constructors: read_required(raw_dir, "constructors.csv", "constructors")?,
            circuits: read_required(raw_dir, "circuits.csv", "circuits")?,
            statuses: read_required(raw_dir, "status.csv", "status")?,
            lap_times: read_required(raw_dir, "lap_times.csv", "lap_times")?,
            countries: read_required(raw_dir, "countries.csv", "countries")?,
        };
        info!(
            "Loaded legacy dump: {} races, {} results, {} qualifying rows, {} lap times",
            tables.races.len(),
            tables.results.len(),
            tables.qualifying.len(),
            tables.lap_times.len()
        );
        Ok(tables)
    }
}

impl RawTables for LegacyTables {
    fn schema_name(&self) -> &'static str {
        "legacy"
    }

    fn sessions(&self, variant: RaceVariant) -> Vec<SessionRow> {
        let kind = match variant {
            RaceVariant::Qualifying => SessionKind::Qualifying(1),
            RaceVariant::MainRace | RaceVariant::Status => SessionKind::Race,
        };
        self.races
            .iter()
            .map(|race| SessionRow {
                id: race.race_id,
                kind: kind.clone(),
                cancelled: false,
                circuit_id: race.circuit_id,
                round_date: race.date,
                session_date: None,
            })
            .collect()
    }

    fn entries(&self, variant: RaceVariant) -> Vec<EntryRow> {
        if variant == RaceVariant::Qualifying {
            return self
                .qualifying
                .iter()
                .map(|q| EntryRow {
                    id: q.qualify_id,
                    session_id: q.race_id,
                    driver_id: q.driver_id,
                    constructor_id: q.constructor_id,
                    ..EntryRow::default()
                })
                .collect();
        }

        let statuses: HashMap<RowId, &str> = self
            .statuses
            .iter()
            .filter_map(|s| Some((s.status_id?, s.status.as_deref()?)))
            .collect();
        self.results
            .iter()
            .map(|result| EntryRow {
                id: result.result_id,
                session_id: result.race_id,
                driver_id: result.driver_id,
                constructor_id: result.constructor_id,
                grid: result.grid,
                reported_laps: result.laps,
                duration_text: result.time.clone(),
                duration_ms: result.milliseconds,
                classification: Classification {
                    is_classified: None,
                    status: result
                        .status_id
                        .and_then(|id| statuses.get(&id))
                        .map(|s| s.to_string()),
                },
            })
            .collect()
    }

    fn laps(&self, variant: RaceVariant) -> Vec<LapRow> {
        match variant {
            RaceVariant::Status => Vec::new(),
            RaceVariant::Qualifying => self
                .qualifying
                .iter()
                .flat_map(|q| {
                    [&q.q1, &q.q2, &q.q3].into_iter().map(move |time| LapRow {
                        entry_id: q.qualify_id,
                        time_text: time.clone(),
                        milliseconds: None,
                    })
                })
                .collect(),
            RaceVariant::MainRace => {
                // времена кругов ссылаются на (гонка, гонщик), а не на строку результата
                let mut result_ids: HashMap<(RowId, RowId), RowId> = HashMap::new();
                for result in &self.results {
                    if let (Some(race), Some(driver), Some(id)) = (result.race_id, result.driver_id, result.result_id) {
                        result_ids.entry((race, driver)).or_insert(id);
                    }
                }
                self.lap_times
                    .iter()
                    .map(|lap| LapRow {
                        entry_id: lap
                            .race_id
                            .zip(lap.driver_id)
                            .and_then(|key| result_ids.get(&key).copied()),
                        time_text: lap.time.clone(),
                        milliseconds: lap.milliseconds,
                    })
                    .collect()
            }
        }
    }

    fn drivers(&self) -> Vec<DriverRow> {
        self.drivers
            .iter()
            .map(|d| DriverRow {
                id: d.driver_id,
                reference: d.driver_ref.clone(),
                date_of_birth: d.dob,
                nationality: d.nationality.clone(),
            })
            .collect()
    }

    fn constructors(&self) -> Vec<ConstructorRow> {
        self.constructors
            .iter()
            .map(|c| ConstructorRow {
                id: c.constructor_id,
                reference: c.constructor_ref.clone(),
                nationality: c.nationality.clone(),
            })
            .collect()
    }

    fn circuits(&self) -> Vec<CircuitRow> {
        self.circuits
            .iter()
            .map(|c| CircuitRow {
                id: c.circuit_id,
                reference: c.circuit_ref.clone(),
                country: c.country.clone(),
            })
            .collect()
    }

    fn nationality_codes(&self) -> NationalityCodes {
        NationalityCodes::Countries(CountryTable::from_rows(&self.countries))
    }
}
