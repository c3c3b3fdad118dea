//! Адаптер новой выгрузки (formula_one_* таблицы)
//!
//! Раскрывает цепочку sessionentry → roundentry → teamdriver, чтобы каждая строка участия
//! несла идентификаторы гонщика и команды, а сессия несет трассу и дату этапа.

use std::collections::HashMap;
use std::path::Path;

use chrono::NaiveDate;
use serde::Deserialize;
use tracing::info;

use super::{
    opt_bool, opt_date, opt_id, opt_text, read_required, CircuitRow, ConstructorRow, DriverRow, EntryRow,
    LapRow, NationalityCodes, RawTables, SessionRow,
};
use crate::error::Result;
use crate::types::{Classification, RaceVariant, RowId, SessionKind};

const DUMP_DIR: &str = "jolpica-dump";

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RoundRecord {
    #[serde(default, deserialize_with = "opt_id")]
    pub id: Option<RowId>,
    #[serde(default, deserialize_with = "opt_id")]
    pub circuit_id: Option<RowId>,
    #[serde(default, deserialize_with = "opt_date")]
    pub date: Option<NaiveDate>,
    #[serde(default, deserialize_with = "opt_bool")]
    pub is_cancelled: Option<bool>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SessionRecord {
    #[serde(default, deserialize_with = "opt_id")]
    pub id: Option<RowId>,
    #[serde(default, deserialize_with = "opt_id")]
    pub round_id: Option<RowId>,
    #[serde(default, rename = "type", deserialize_with = "opt_text")]
    pub session_type: Option<String>,
    #[serde(default, deserialize_with = "opt_date")]
    pub date: Option<NaiveDate>,
    #[serde(default, deserialize_with = "opt_bool")]
    pub is_cancelled: Option<bool>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RoundEntryRecord {
    #[serde(default, deserialize_with = "opt_id")]
    pub id: Option<RowId>,
    #[serde(default, deserialize_with = "opt_id")]
    pub round_id: Option<RowId>,
    #[serde(default, deserialize_with = "opt_id")]
    pub team_driver_id: Option<RowId>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SessionEntryRecord {
    #[serde(default, deserialize_with = "opt_id")]
    pub id: Option<RowId>,
    #[serde(default, deserialize_with = "opt_id")]
    pub session_id: Option<RowId>,
    #[serde(default, deserialize_with = "opt_id")]
    pub round_entry_id: Option<RowId>,
    /// Единственный признак финиша в этой выгрузке; `detail` не читается
    #[serde(default, deserialize_with = "opt_bool")]
    pub is_classified: Option<bool>,
    #[serde(default, deserialize_with = "opt_id")]
    pub grid: Option<i64>,
    #[serde(default, deserialize_with = "opt_text")]
    pub time: Option<String>,
    #[serde(default, deserialize_with = "opt_id")]
    pub laps_completed: Option<i64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TeamDriverRecord {
    #[serde(default, deserialize_with = "opt_id")]
    pub id: Option<RowId>,
    #[serde(default, deserialize_with = "opt_id")]
    pub team_id: Option<RowId>,
    #[serde(default, deserialize_with = "opt_id")]
    pub driver_id: Option<RowId>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DriverRecord {
    #[serde(default, deserialize_with = "opt_id")]
    pub id: Option<RowId>,
    #[serde(default, deserialize_with = "opt_text")]
    pub reference: Option<String>,
    #[serde(default, deserialize_with = "opt_text")]
    pub country_code: Option<String>,
    #[serde(default, deserialize_with = "opt_date")]
    pub date_of_birth: Option<NaiveDate>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TeamRecord {
    #[serde(default, deserialize_with = "opt_id")]
    pub id: Option<RowId>,
    #[serde(default, deserialize_with = "opt_text")]
    pub reference: Option<String>,
    #[serde(default, deserialize_with = "opt_text")]
    pub country_code: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CircuitRecord {
    #[serde(default, deserialize_with = "opt_id")]
    pub id: Option<RowId>,
    #[serde(default, deserialize_with = "opt_text")]
    pub reference: Option<String>,
    #[serde(default, deserialize_with = "opt_text")]
    pub country_code: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LapRecord {
    #[serde(default, deserialize_with = "opt_id")]
    pub session_entry_id: Option<RowId>,
    #[serde(default, deserialize_with = "opt_text")]
    pub time: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct JolpicaTables {
    pub rounds: Vec<RoundRecord>,
    pub sessions: Vec<SessionRecord>,
    pub round_entries: Vec<RoundEntryRecord>,
    pub session_entries: Vec<SessionEntryRecord>,
    pub team_drivers: Vec<TeamDriverRecord>,
    pub drivers: Vec<DriverRecord>,
    pub teams: Vec<TeamRecord>,
    pub circuits: Vec<CircuitRecord>,
    pub laps: Vec<LapRecord>,
}

impl JolpicaTables {
    /// Все таблицы обязательны; читаются из `<raw_dir>/jolpica-dump/`.
    pub fn load(raw_dir: &Path) -> Result<Self> {
        let dir = raw_dir.join(DUMP_DIR);
        let tables = Self {
            rounds: read_required(&dir, "formula_one_round.csv", "round")?,
            sessions: read_required(&dir, "formula_one_session.csv", "session")?,
            round_entries: read_required(&dir, "formula_one_roundentry.csv", "roundentry")?,
            session_entries: read_required(&dir, "formula_one_sessionentry.csv", "sessionentry")?,
            team_drivers: read_required(&dir, "formula_one_teamdriver.csv", "teamdriver")?,
            drivers: read_required(&dir, "formula_one_driver.csv", "driver")?,
            teams: read_required(&dir, "formula_one_team.csv", "team")?,
            circuits: read_required(&dir, "formula_one_circuit.csv", "circuit")?,
            laps: read_required(&dir, "formula_one_lap.csv", "lap")?,
        };
        info!(
            "Loaded jolpica dump: {} rounds, {} sessions, {} session entries, {} laps",
            tables.rounds.len(),
            tables.sessions.len(),
            tables.session_entries.len(),
            tables.laps.len()
        );
        Ok(tables)
    }
}

fn index_by<T>(rows: &[T], key: impl Fn(&T) -> Option<RowId>) -> HashMap<RowId, &T> {
    let mut index = HashMap::with_capacity(rows.len());
    for row in rows {
        if let Some(id) = key(row) {
            // при дублях ключа остаётся первая строка
            index.entry(id).or_insert(row);
        }
    }
    index
}

impl RawTables for JolpicaTables {
    fn schema_name(&self) -> &'static str {
        "jolpica"
    }

    fn sessions(&self, _variant: RaceVariant) -> Vec<SessionRow> {
        let rounds = index_by(&self.rounds, |r| r.id);
        self.sessions
            .iter()
            .map(|session| {
                let round = session.round_id.and_then(|id| rounds.get(&id));
                let round_cancelled = round.and_then(|r| r.is_cancelled).unwrap_or(false);
                SessionRow {
                    id: session.id,
                    kind: SessionKind::parse(session.session_type.as_deref().unwrap_or("")),
                    cancelled: round_cancelled || session.is_cancelled.unwrap_or(false),
                    circuit_id: round.and_then(|r| r.circuit_id),
                    round_date: round.and_then(|r| r.date),
                    session_date: session.date,
                }
            })
            .collect()
    }

    fn entries(&self, _variant: RaceVariant) -> Vec<EntryRow> {
        let round_entries = index_by(&self.round_entries, |r| r.id);
        let team_drivers = index_by(&self.team_drivers, |r| r.id);
        self.session_entries
            .iter()
            .map(|entry| {
                let team_driver = entry
                    .round_entry_id
                    .and_then(|id| round_entries.get(&id))
                    .and_then(|re| re.team_driver_id)
                    .and_then(|id| team_drivers.get(&id));
                EntryRow {
                    id: entry.id,
                    session_id: entry.session_id,
                    driver_id: team_driver.and_then(|td| td.driver_id),
                    constructor_id: team_driver.and_then(|td| td.team_id),
                    grid: entry.grid,
                    reported_laps: entry.laps_completed,
                    duration_text: entry.time.clone(),
                    duration_ms: None,
                    classification: Classification {
                        is_classified: entry.is_classified,
                        status: None,
                    },
                }
            })
            .collect()
    }

    fn laps(&self, variant: RaceVariant) -> Vec<LapRow> {
        if variant == RaceVariant::Status {
            return Vec::new();
        }
        self.laps
            .iter()
            .map(|lap| LapRow {
                entry_id: lap.session_entry_id,
                time_text: lap.time.clone(),
                milliseconds: None,
            })
            .collect()
    }

    fn drivers(&self) -> Vec<DriverRow> {
        self.drivers
            .iter()
            .map(|d| DriverRow {
                id: d.id,
                reference: d.reference.clone(),
                date_of_birth: d.date_of_birth,
                nationality: d.country_code.clone(),
            })
            .collect()
    }

    fn constructors(&self) -> Vec<ConstructorRow> {
        self.teams
            .iter()
            .map(|t| ConstructorRow {
                id: t.id,
                reference: t.reference.clone(),
                nationality: t.country_code.clone(),
            })
            .collect()
    }

    fn circuits(&self) -> Vec<CircuitRow> {
        self.circuits
            .iter()
            .map(|c| CircuitRow {
                id: c.id,
                reference: c.reference.clone(),
                country: c.country_code.clone(),
            })
            .collect()
    }

    fn nationality_codes(&self) -> NationalityCodes {
        NationalityCodes::AlreadyCoded
    }
}
