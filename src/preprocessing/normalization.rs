//! Нормализация схемы: коды национальностей, справочники, производные признаки

use std::collections::{BTreeMap, HashMap};

use chrono::NaiveDate;
use serde::Deserialize;
use tracing::{debug, info};

use super::feature_engineering::FeatureEngineer;
use crate::sources::{opt_text, AuxiliaryTables, NationalityCodes, RawTables};
use crate::types::{ParticipantEventRecord, RowId};

/// Исторические и составные демонимы, сводимые к существующим странам.
pub const NATIONALITY_ALIASES: [(&str, &str); 6] = [
    ("Rhodesian", "Zimbabwean"),
    ("American-Italian", "American"),
    ("Argentine-Italian", "Argentine"),
    ("East German", "German"),
    ("West German", "German"),
    ("Argentinian", "Argentine"),
];

const COUNTRY_SHORT_NAMES: [(&str, &str); 5] = [
    ("United Kingdom of Great Britain and Northern Ireland", "UK"),
    ("United Arab Emirates", "UAE"),
    ("Korea (Republic of)", "Korea"),
    ("Russian Federation", "Russia"),
    ("United States of America", "USA"),
];

const DROPPED_COUNTRIES: [&str; 1] = ["United States Minor Outlying Islands"];

/// Обрезка и замена псевдонимов; пустое значение даёт `None`.
pub fn canonical_nationality(raw: Option<&str>) -> Option<String> {
    let value = raw?.trim();
    if value.is_empty() {
        return None;
    }
    let value = NATIONALITY_ALIASES
        .iter()
        .find(|(alias, _)| *alias == value)
        .map_or(value, |(_, canonical)| *canonical);
    Some(value.to_string())
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CountryRow {
    #[serde(default, deserialize_with = "opt_text")]
    pub alpha_3_code: Option<String>,
    #[serde(default, deserialize_with = "opt_text")]
    pub nationality: Option<String>,
    #[serde(default, deserialize_with = "opt_text")]
    pub en_short_name: Option<String>,
}

/// Сопоставление демонимов и названий стран с alpha-3 кодами.
#[derive(Debug, Clone, Default)]
pub struct CountryTable {
    by_nationality: HashMap<String, String>,
    by_country: HashMap<String, String>,
}

fn first_token(value: Option<&str>) -> String {
    value
        .unwrap_or("")
        .split(',')
        .next()
        .unwrap_or("")
        .trim()
        .to_string()
}

impl CountryTable {
    pub fn from_rows(rows: &[CountryRow]) -> Self {
        let mut table = Self::default();
        for row in rows {
            let Some(code) = row.alpha_3_code.as_deref().map(str::trim).filter(|c| !c.is_empty()) else {
                continue;
            };
            let nationality = first_token(row.nationality.as_deref());
            let short_name = first_token(row.en_short_name.as_deref());
            let short_name = COUNTRY_SHORT_NAMES
                .iter()
                .find(|(long, _)| *long == short_name)
                .map_or(short_name.clone(), |(_, short)| short.to_string());
            if DROPPED_COUNTRIES.contains(&short_name.as_str()) {
                continue;
            }

            // первая строка выигрывает
            if !nationality.is_empty() {
                table.by_nationality.entry(nationality).or_insert_with(|| code.to_string());
            }
            if !short_name.is_empty() {
                table.by_country.entry(short_name).or_insert_with(|| code.to_string());
            }
        }
        table
    }

    pub fn code_for_nationality(&self, demonym: &str) -> Option<String> {
        self.by_nationality.get(demonym.trim()).cloned()
    }

    pub fn code_for_country(&self, country: &str) -> Option<String> {
        self.by_country.get(country.trim()).cloned()
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct DriverRef {
    pub reference: Option<String>,
    pub nationality: Option<String>,
    pub date_of_birth: Option<NaiveDate>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct ConstructorRef {
    pub reference: Option<String>,
    pub nationality: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct CircuitRef {
    pub reference: Option<String>,
    pub nationality: Option<String>,
}

/// Справочники с уже приведёнными кодами национальностей.
#[derive(Debug, Clone, Default)]
pub struct ReferenceTables {
    pub drivers: HashMap<RowId, DriverRef>,
    pub constructors: HashMap<RowId, ConstructorRef>,
    pub circuits: HashMap<RowId, CircuitRef>,
}

pub struct SchemaNormalizer {
    codes: NationalityCodes,
    weather_by_date: HashMap<NaiveDate, String>,
    circuit_types: HashMap<String, String>,
    year_from: i32,
}

impl SchemaNormalizer {
    pub fn new(codes: NationalityCodes, aux: &AuxiliaryTables, year_from: i32) -> Self {
        let mut weather_by_date = HashMap::new();
        for row in aux.weather.iter().flatten() {
            if let (Some(date), Some(weather)) = (row.date, row.weather.as_ref()) {
                weather_by_date.entry(date).or_insert_with(|| weather.clone());
            }
        }
        let mut circuit_types = HashMap::new();
        for row in aux.circuit_types.iter().flatten() {
            if let (Some(circuit), Some(kind)) = (row.circuit.as_deref(), row.circuit_type.as_ref()) {
                circuit_types.entry(circuit.trim().to_string()).or_insert_with(|| kind.clone());
            }
        }
        Self {
            codes,
            weather_by_date,
            circuit_types,
            year_from,
        }
    }

    /// Код гонщика или команды по демониму (или уже готовый код).
    pub fn participant_code(&self, raw: Option<&str>) -> Option<String> {
        let value = canonical_nationality(raw)?;
        match &self.codes {
            NationalityCodes::AlreadyCoded => Some(value),
            NationalityCodes::Countries(table) => table.code_for_nationality(&value),
        }
    }

    /// Код страны трассы по названию (или уже готовый код).
    pub fn circuit_code(&self, raw: Option<&str>) -> Option<String> {
        let value = raw?.trim();
        if value.is_empty() {
            return None;
        }
        match &self.codes {
            NationalityCodes::AlreadyCoded => Some(value.to_string()),
            NationalityCodes::Countries(table) => table.code_for_country(value),
        }
    }

    pub fn reference_tables(&self, tables: &dyn RawTables) -> ReferenceTables {
        let mut refs = ReferenceTables::default();
        for driver in tables.drivers() {
            let Some(id) = driver.id else { continue };
            refs.drivers.entry(id).or_insert_with(|| DriverRef {
                reference: trimmed(driver.reference.as_deref()),
                nationality: self.participant_code(driver.nationality.as_deref()),
                date_of_birth: driver.date_of_birth,
            });
        }
        for constructor in tables.constructors() {
            let Some(id) = constructor.id else { continue };
            refs.constructors.entry(id).or_insert_with(|| ConstructorRef {
                reference: trimmed(constructor.reference.as_deref()),
                nationality: self.participant_code(constructor.nationality.as_deref()),
            });
        }
        for circuit in tables.circuits() {
            let Some(id) = circuit.id else { continue };
            refs.circuits.entry(id).or_insert_with(|| CircuitRef {
                reference: trimmed(circuit.reference.as_deref()),
                nationality: self.circuit_code(circuit.country.as_deref()),
            });
        }
        debug!(
            "Reference tables: {} drivers, {} constructors, {} circuits",
            refs.drivers.len(),
            refs.constructors.len(),
            refs.circuits.len()
        );
        refs
    }

    pub fn rain_on(&self, date: NaiveDate) -> u8 {
        FeatureEngineer::rain_flag(self.weather_by_date.get(&date).map(String::as_str))
    }

    pub fn circuit_type(&self, circuit: &str) -> Option<String> {
        self.circuit_types.get(circuit).cloned()
    }

    /// Первая дата события каждого гонщика по всей загруженной истории.
    pub fn first_event_dates(records: &[ParticipantEventRecord]) -> BTreeMap<String, NaiveDate> {
        let mut first: BTreeMap<String, NaiveDate> = BTreeMap::new();
        for record in records {
            first
                .entry(record.driver.clone())
                .and_modify(|d| *d = (*d).min(record.event.date))
                .or_insert(record.event.date);
        }
        first
    }

    /// Дата первого события, возраст, стаж, флаги дома, дождь, тип трассы; затем фильтр по году.
    pub fn enrich(&self, mut records: Vec<ParticipantEventRecord>) -> Vec<ParticipantEventRecord> {
        let first_dates = Self::first_event_dates(&records);
        for record in &mut records {
            let date = record.event.date;
            record.first_event_date = first_dates.get(&record.driver).copied();
            record.derived =
                FeatureEngineer::date_features(date, record.driver_date_of_birth, record.first_event_date);
            record.driver_home = FeatureEngineer::home_advantage(
                record.driver_nationality.as_deref(),
                record.circuit_nationality.as_deref(),
            );
            record.constructor_home = FeatureEngineer::home_advantage(
                record.constructor_nationality.as_deref(),
                record.circuit_nationality.as_deref(),
            );
            record.rain = self.rain_on(date);
            record.circuit_type = self.circuit_type(&record.event.circuit);
        }

        let before = records.len();
        records.retain(|r| r.event.race_year >= self.year_from);
        info!(
            "Normalized {} participant-event rows ({} before {} dropped)",
            records.len(),
            before - records.len(),
            self.year_from
        );
        records
    }
}

fn trimmed(value: Option<&str>) -> Option<String> {
    value.map(str::trim).filter(|v| !v.is_empty()).map(str::to_string)
}
