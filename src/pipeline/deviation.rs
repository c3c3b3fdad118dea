//! Медиана события и отклонение от неё

use std::collections::BTreeMap;

use tracing::{debug, info};

use super::reconcile::ReconciledRecord;
use crate::config::DeviationBounds;
use crate::types::{DeviationRecord, EventKey, ParticipantEventRecord, RaceVariant};

/// Записи одного события с общей медианой.
#[derive(Debug, Clone, PartialEq)]
pub struct EventGroup {
    pub event: EventKey,
    pub records: Vec<ReconciledRecord>,
    pub max_laps: i64,
    pub median_duration_ms: Option<i64>,
}

/// Медиана с округлением до ближайшего чётного при половине.
pub fn median(values: &[i64]) -> Option<i64> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_unstable();
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 1 {
        Some(sorted[mid])
    } else {
        let mean = (sorted[mid - 1] as f64 + sorted[mid] as f64) / 2.0;
        Some(mean.round_ties_even() as i64)
    }
}

pub struct MedianDeviationComputer {
    variant: RaceVariant,
    bounds: Option<DeviationBounds>,
    retain_non_finishers: bool,
}

impl MedianDeviationComputer {
    pub fn new(variant: RaceVariant, bounds: Option<DeviationBounds>, retain_non_finishers: bool) -> Self {
        Self {
            variant,
            bounds,
            retain_non_finishers,
        }
    }

    /// Группировка по событию и медиана по финишировавшим (в квалификации по всем).
    pub fn group(&self, reconciled: Vec<ReconciledRecord>, records: &[ParticipantEventRecord]) -> Vec<EventGroup> {
        let mut groups: BTreeMap<EventKey, Vec<ReconciledRecord>> = BTreeMap::new();
        for r in reconciled {
            groups.entry(r.duration.event.clone()).or_default().push(r);
        }

        groups
            .into_iter()
            .map(|(event, records_in_event)| {
                let finals: Vec<i64> = records_in_event
                    .iter()
                    .filter(|r| self.contributes_to_median(r, records))
                    .map(|r| r.final_duration_ms)
                    .collect();
                let max_laps = records_in_event.iter().map(|r| r.max_laps).max().unwrap_or(0);
                EventGroup {
                    event,
                    median_duration_ms: median(&finals),
                    max_laps,
                    records: records_in_event,
                }
            })
            .collect()
    }

    fn contributes_to_median(&self, r: &ReconciledRecord, records: &[ParticipantEventRecord]) -> bool {
        match self.variant {
            RaceVariant::Qualifying => true,
            RaceVariant::MainRace | RaceVariant::Status => records
                .get(r.duration.record)
                .is_some_and(|record| record.classification.is_finisher()),
        }
    }

    /// Отклонения с фильтром выбросов; у групп без медианы строк нет.
    pub fn compute(&self, reconciled: Vec<ReconciledRecord>, records: &[ParticipantEventRecord]) -> Vec<EventGroup> {
        let mut groups = self.group(reconciled, records);
        let mut outliers = 0usize;
        let mut non_finishers = 0usize;
        let mut without_median = 0usize;

        for group in &mut groups {
            let Some(median) = group.median_duration_ms else {
                without_median += 1;
                debug!("{}: no finisher at {} {}", self.variant, group.event.circuit, group.event.date);
                group.records.clear();
                continue;
            };
            group.records.retain(|r| {
                if let Some(bounds) = self.bounds {
                    if !bounds.contains(r.final_duration_ms - median) {
                        outliers += 1;
                        return false;
                    }
                }
                if self.variant == RaceVariant::MainRace && !self.retain_non_finishers && !r.duration.is_classified {
                    non_finishers += 1;
                    return false;
                }
                true
            });
        }
        groups.retain(|g| !g.records.is_empty());

        info!(
            "{}: {} events with deviations ({} without a finisher), {} outliers and {} non-finishers removed",
            self.variant,
            groups.len(),
            without_median,
            outliers,
            non_finishers
        );
        groups
    }

    /// Плоские строки отклонений; позиция проставляется при ранжировании.
    pub fn deviations(group: &EventGroup) -> Vec<DeviationRecord> {
        let Some(median) = group.median_duration_ms else {
            return Vec::new();
        };
        group
            .records
            .iter()
            .map(|r| DeviationRecord {
                duration: r.duration.clone(),
                max_laps: r.max_laps,
                final_duration_ms: r.final_duration_ms,
                median_duration_ms: median,
                deviation_from_median_ms: r.final_duration_ms - median,
                final_position: 0,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Classification, DerivedDateFeatures, DurationRecord};
    use chrono::NaiveDate;

    fn event() -> EventKey {
        EventKey::new("imola", NaiveDate::from_ymd_opt(2021, 4, 18).unwrap())
    }

    fn participant(status: &str) -> ParticipantEventRecord {
        ParticipantEventRecord {
            event: event(),
            race_month: 4,
            race_day: 18,
            driver: "gasly".to_string(),
            constructor: "alphatauri".to_string(),
            circuit_type: None,
            driver_nationality: None,
            constructor_nationality: None,
            circuit_nationality: None,
            driver_date_of_birth: None,
            first_event_date: None,
            qualification_position: None,
            reported_laps: None,
            lap_row_count: 0,
            laps_completed: 63,
            reported_duration_ms: None,
            summed_lap_duration_ms: 0,
            min_lap_duration_ms: None,
            classification: Classification { is_classified: None, status: Some(status.to_string()) },
            rain: 0,
            derived: DerivedDateFeatures::default(),
            driver_home: 0,
            constructor_home: 0,
        }
    }

    fn reconciled(index: usize, final_ms: i64, finisher: bool) -> ReconciledRecord {
        ReconciledRecord {
            duration: DurationRecord {
                record: index,
                event: event(),
                race_duration_ms: final_ms,
                laps_completed: 63,
                is_classified: finisher,
            },
            max_laps: 63,
            final_duration_ms: final_ms,
        }
    }

    #[test]
    fn median_rounds_half_to_even() {
        assert_eq!(median(&[1, 2]), Some(2));
        assert_eq!(median(&[1, 4]), Some(2));
        assert_eq!(median(&[3, 1, 2]), Some(2));
        assert_eq!(median(&[5_400_000, 5_603_214]), Some(5_501_607));
        assert_eq!(median(&[]), None);
    }

    #[test]
    fn median_ignores_non_finishers() {
        let records = vec![participant("Finished"), participant("Finished"), participant("Gearbox")];
        let computer = MedianDeviationComputer::new(RaceVariant::MainRace, None, true);
        let groups = computer.compute(
            vec![reconciled(0, 100, true), reconciled(1, 200, true), reconciled(2, 10_000, false)],
            &records,
        );
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].median_duration_ms, Some(150));
        let deviations = MedianDeviationComputer::deviations(&groups[0]);
        assert_eq!(deviations.len(), 3);
        for d in &deviations {
            assert_eq!(d.deviation_from_median_ms, d.final_duration_ms - d.median_duration_ms);
        }
    }

    #[test]
    fn groups_without_finishers_are_empty() {
        let records = vec![participant("Accident"), participant("Engine")];
        let computer = MedianDeviationComputer::new(RaceVariant::MainRace, None, true);
        let groups = computer.compute(vec![reconciled(0, 100, false), reconciled(1, 200, false)], &records);
        assert!(groups.is_empty());
    }

    #[test]
    fn outlier_bounds_are_strict_and_finishers_only() {
        let records = vec![participant("Finished"), participant("Finished"), participant("Finished"), participant("Brakes")];
        let bounds = DeviationBounds { lower: Some(-100), upper: Some(100) };
        let computer = MedianDeviationComputer::new(RaceVariant::MainRace, Some(bounds), false);
        // медиана 1000: отклонения -100, 0, +100 и -50 у сошедшего
        let groups = computer.compute(
            vec![
                reconciled(0, 900, true),
                reconciled(1, 1000, true),
                reconciled(2, 1100, true),
                reconciled(3, 950, false),
            ],
            &records,
        );
        let kept = MedianDeviationComputer::deviations(&groups[0]);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].deviation_from_median_ms, 0);
    }
}
