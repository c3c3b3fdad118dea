//! Выбор итоговой длительности и экстраполяция для отставших на круг

use std::collections::BTreeMap;

use tracing::{debug, info};

use crate::types::{DurationRecord, EventKey, ParticipantEventRecord, RaceVariant};

/// Длительность после сверки: исходная, лидерское число кругов события и итоговая.
#[derive(Debug, Clone, PartialEq)]
pub struct ReconciledRecord {
    pub duration: DurationRecord,
    pub max_laps: i64,
    pub final_duration_ms: i64,
}

pub struct DurationReconciler {
    variant: RaceVariant,
    min_laps_threshold: i64,
}

impl DurationReconciler {
    pub fn new(variant: RaceVariant, min_laps_threshold: i64) -> Self {
        Self {
            variant,
            min_laps_threshold,
        }
    }

    /// Записи с длительностью; индексы ссылаются на входной срез.
    pub fn durations(&self, records: &[ParticipantEventRecord]) -> Vec<DurationRecord> {
        records
            .iter()
            .enumerate()
            .filter_map(|(index, record)| {
                let race_duration_ms = match self.variant {
                    // лучший круг сегментов
                    RaceVariant::Qualifying => record.min_lap_duration_ms.filter(|ms| *ms > 0)?,
                    RaceVariant::MainRace | RaceVariant::Status => {
                        let reported = record.reported_duration_ms.unwrap_or(0);
                        if record.summed_lap_duration_ms != 0 {
                            record.summed_lap_duration_ms
                        } else if reported != 0 {
                            reported
                        } else {
                            return None;
                        }
                    }
                };
                Some(DurationRecord {
                    record: index,
                    event: record.event.clone(),
                    race_duration_ms,
                    laps_completed: record.laps_completed,
                    // у квалификации нет понятия финиша
                    is_classified: self.variant == RaceVariant::Qualifying || record.classification.is_finisher(),
                })
            })
            .collect()
    }

    pub fn reconcile(&self, records: &[ParticipantEventRecord]) -> Vec<ReconciledRecord> {
        let durations = self.durations(records);
        let timed = durations.len();

        let mut max_laps: BTreeMap<EventKey, i64> = BTreeMap::new();
        for d in &durations {
            let entry = max_laps.entry(d.event.clone()).or_insert(d.laps_completed);
            *entry = (*entry).max(d.laps_completed);
        }

        let mut extrapolated = 0usize;
        let reconciled: Vec<ReconciledRecord> = durations
            .into_iter()
            .filter(|d| self.variant == RaceVariant::Qualifying || d.laps_completed >= self.min_laps_threshold)
            .map(|d| {
                let event_max = max_laps.get(&d.event).copied().unwrap_or(d.laps_completed);
                let final_duration_ms = if self.variant == RaceVariant::Qualifying {
                    d.race_duration_ms
                } else {
                    match extrapolate(d.race_duration_ms, d.laps_completed, event_max, d.is_classified) {
                        Some(ms) => {
                            extrapolated += 1;
                            ms
                        }
                        None => d.race_duration_ms,
                    }
                };
                ReconciledRecord {
                    duration: d,
                    max_laps: event_max,
                    final_duration_ms,
                }
            })
            .collect();

        debug!("{}: extrapolated {} lapped finishers", self.variant, extrapolated);
        info!(
            "{}: {} of {} rows have a duration, {} kept after lap threshold",
            self.variant,
            timed,
            records.len(),
            reconciled.len()
        );
        reconciled
    }
}

/// Досчёт до лидерского числа кругов по среднему кругу; `None`, если не требуется.
pub fn extrapolate(race_duration_ms: i64, laps_completed: i64, max_laps: i64, finisher: bool) -> Option<i64> {
    if !finisher || laps_completed <= 0 || laps_completed >= max_laps {
        return None;
    }
    let race = race_duration_ms as f64;
    let projected = race + race / laps_completed as f64 * (max_laps - laps_completed) as f64;
    Some(projected.round_ties_even() as i64)
}
