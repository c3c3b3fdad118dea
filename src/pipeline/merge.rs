//! Последовательные левые соединения: сессия → участие → гонщик → команда → трасса → круги

use std::collections::HashMap;

use chrono::{Datelike, NaiveDate};
use tracing::{info, warn};

use crate::preprocessing::duration::parse_duration;
use crate::preprocessing::normalization::ReferenceTables;
use crate::sources::{EntryRow, LapRow, RawTables, SessionRow};
use crate::types::{
    Classification, DerivedDateFeatures, EventKey, ParticipantEventRecord, RaceVariant, RowId,
};

/// Строка широкой таблицы: одна на (участник, событие, круг).
#[derive(Debug, Clone, PartialEq)]
pub struct MergedRow {
    pub event: EventKey,
    pub driver: String,
    pub constructor: String,
    pub driver_nationality: Option<String>,
    pub constructor_nationality: Option<String>,
    pub circuit_nationality: Option<String>,
    pub driver_date_of_birth: Option<NaiveDate>,
    pub qualification_position: Option<i64>,
    pub reported_laps: Option<i64>,
    pub reported_duration_ms: Option<i64>,
    pub classification: Classification,
    /// Есть ли у круга хоть какое-то значение времени
    pub lap_present: bool,
    pub lap_duration_ms: Option<i64>,
}

impl From<MergedRow> for ParticipantEventRecord {
    fn from(row: MergedRow) -> Self {
        let lap_row_count = i64::from(row.lap_present);
        Self {
            race_month: row.event.date.month(),
            race_day: row.event.date.day(),
            event: row.event,
            driver: row.driver,
            constructor: row.constructor,
            circuit_type: None,
            driver_nationality: row.driver_nationality,
            constructor_nationality: row.constructor_nationality,
            circuit_nationality: row.circuit_nationality,
            driver_date_of_birth: row.driver_date_of_birth,
            first_event_date: None,
            qualification_position: row.qualification_position,
            reported_laps: row.reported_laps,
            lap_row_count,
            laps_completed: row.reported_laps.unwrap_or(0).max(lap_row_count),
            reported_duration_ms: row.reported_duration_ms,
            summed_lap_duration_ms: row.lap_duration_ms.unwrap_or(0),
            min_lap_duration_ms: row.lap_duration_ms,
            classification: row.classification,
            rain: 0,
            derived: DerivedDateFeatures::default(),
            driver_home: 0,
            constructor_home: 0,
        }
    }
}

/// Отрицательные миллисекунды считаются отсутствующими.
fn duration_of(milliseconds: Option<i64>, text: Option<&str>) -> Option<i64> {
    milliseconds.filter(|ms| *ms >= 0).or_else(|| text.and_then(parse_duration))
}

#[derive(Debug, Default)]
struct DropCounts {
    session: usize,
    reference: usize,
    unclassified: usize,
    untimed: usize,
}

pub struct RelationalMerger {
    variant: RaceVariant,
}

impl RelationalMerger {
    pub fn new(variant: RaceVariant) -> Self {
        Self { variant }
    }

    fn event_date(&self, session: &SessionRow) -> Option<NaiveDate> {
        match self.variant {
            RaceVariant::Qualifying => session.session_date.or(session.round_date),
            RaceVariant::MainRace | RaceVariant::Status => session.round_date.or(session.session_date),
        }
    }

    pub fn merge(&self, tables: &dyn RawTables, refs: &ReferenceTables) -> Vec<MergedRow> {
        let mut sessions: HashMap<RowId, SessionRow> = HashMap::new();
        for session in tables.sessions(self.variant) {
            if session.cancelled || !self.variant.accepts(&session.kind) {
                continue;
            }
            if let Some(id) = session.id {
                sessions.entry(id).or_insert(session);
            }
        }

        let mut laps_by_entry: HashMap<RowId, Vec<LapRow>> = HashMap::new();
        for lap in tables.laps(self.variant) {
            if let Some(entry_id) = lap.entry_id {
                laps_by_entry.entry(entry_id).or_default().push(lap);
            }
        }

        let mut dropped = DropCounts::default();
        let mut rows = Vec::new();
        for entry in tables.entries(self.variant) {
            let Some(session) = entry.session_id.and_then(|id| sessions.get(&id)) else {
                dropped.session += 1;
                continue;
            };
            let Some(base) = self.base_row(&entry, session, refs) else {
                dropped.reference += 1;
                continue;
            };
            if self.variant != RaceVariant::Qualifying && !base.classification.is_recorded() {
                dropped.unclassified += 1;
                continue;
            }

            let laps = entry.id.and_then(|id| laps_by_entry.get(&id));
            let before = rows.len();
            match laps {
                Some(laps) if !laps.is_empty() => {
                    for lap in laps {
                        let lap_duration_ms = duration_of(lap.milliseconds, lap.time_text.as_deref());
                        if self.variant == RaceVariant::Qualifying && !lap_duration_ms.is_some_and(|ms| ms > 0) {
                            continue;
                        }
                        rows.push(MergedRow {
                            lap_present: lap.time_text.is_some() || lap.milliseconds.is_some(),
                            lap_duration_ms,
                            ..base.clone()
                        });
                    }
                }
                _ if self.variant != RaceVariant::Qualifying => rows.push(base),
                _ => {}
            }
            if self.variant == RaceVariant::Qualifying && rows.len() == before {
                dropped.untimed += 1;
            }
        }

        if dropped.reference > 0 {
            warn!(
                "{}: dropped {} entries without driver, constructor, circuit or date",
                self.variant, dropped.reference
            );
        }
        info!(
            "{} [{}]: merged {} rows ({} outside accepted sessions, {} unclassified, {} without lap time)",
            self.variant,
            tables.schema_name(),
            rows.len(),
            dropped.session,
            dropped.unclassified,
            dropped.untimed
        );
        rows
    }

    fn base_row(&self, entry: &EntryRow, session: &SessionRow, refs: &ReferenceTables) -> Option<MergedRow> {
        let driver = entry.driver_id.and_then(|id| refs.drivers.get(&id));
        let constructor = entry.constructor_id.and_then(|id| refs.constructors.get(&id));
        let circuit = session.circuit_id.and_then(|id| refs.circuits.get(&id));

        let driver_ref = driver.and_then(|d| d.reference.clone())?;
        let constructor_ref = constructor.and_then(|c| c.reference.clone())?;
        let circuit_ref = circuit.and_then(|c| c.reference.clone())?;
        let date = self.event_date(session)?;

        Some(MergedRow {
            event: EventKey::new(circuit_ref, date),
            driver: driver_ref,
            constructor: constructor_ref,
            driver_nationality: driver.and_then(|d| d.nationality.clone()),
            constructor_nationality: constructor.and_then(|c| c.nationality.clone()),
            circuit_nationality: circuit.and_then(|c| c.nationality.clone()),
            driver_date_of_birth: driver.and_then(|d| d.date_of_birth),
            qualification_position: entry.grid,
            reported_laps: entry.reported_laps,
            reported_duration_ms: duration_of(entry.duration_ms, entry.duration_text.as_deref()),
            classification: entry.classification.clone(),
            lap_present: false,
            lap_duration_ms: None,
        })
    }
}
