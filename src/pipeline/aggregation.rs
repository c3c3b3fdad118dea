//! Свёртка строк-кругов в одну строку на (участник, событие)

use std::collections::BTreeMap;

use tracing::info;

use super::merge::MergedRow;
use crate::types::{EventKey, ParticipantEventRecord};

type ParticipantKey = (EventKey, String, String);

pub struct LapAggregator;

impl LapAggregator {
    /// Сумма и минимум времён кругов, число кругов; итоговое число кругов не меньше заявленного.
    pub fn aggregate(rows: Vec<MergedRow>) -> Vec<ParticipantEventRecord> {
        let input = rows.len();
        let mut groups: BTreeMap<ParticipantKey, ParticipantEventRecord> = BTreeMap::new();

        for row in rows {
            let key = (row.event.clone(), row.driver.clone(), row.constructor.clone());
            match groups.get_mut(&key) {
                Some(record) => Self::absorb(record, row),
                None => {
                    groups.insert(key, ParticipantEventRecord::from(row));
                }
            }
        }

        let records: Vec<ParticipantEventRecord> = groups
            .into_values()
            .map(|mut record| {
                record.laps_completed = record.reported_laps.unwrap_or(0).max(record.lap_row_count);
                record
            })
            .collect();
        info!("Aggregated {} lap rows into {} participant-event rows", input, records.len());
        records
    }

    fn absorb(record: &mut ParticipantEventRecord, row: MergedRow) {
        if row.lap_present {
            record.lap_row_count += 1;
        }
        if let Some(ms) = row.lap_duration_ms {
            record.summed_lap_duration_ms += ms;
            record.min_lap_duration_ms = Some(record.min_lap_duration_ms.map_or(ms, |min| min.min(ms)));
        }

        // сегменты квалификации приходят отдельными записями участия
        record.reported_laps = match (record.reported_laps, row.reported_laps) {
            (Some(a), Some(b)) => Some(a.max(b)),
            (a, b) => a.or(b),
        };
        if record.reported_duration_ms.is_none() {
            record.reported_duration_ms = row.reported_duration_ms;
        }
        if record.qualification_position.is_none() {
            record.qualification_position = row.qualification_position;
        }
        if !record.classification.is_recorded() {
            record.classification = row.classification;
        }
    }
}
