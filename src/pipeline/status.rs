//! Метка схода (DNF) для варианта статуса

use std::collections::BTreeMap;

use tracing::info;

use super::merge::MergedRow;
use crate::types::{Classification, EventKey, ParticipantEventRecord};

pub struct StatusClassifier;

impl StatusClassifier {
    /// 0 для "Finished" и "+N Lap(s)", иначе 1; без текста решает флаг классификации.
    pub fn dnf(classification: &Classification) -> u8 {
        u8::from(!classification.is_finisher())
    }

    /// Одна строка на (событие, гонщик) прямо из объединённой таблицы, в каноническом порядке.
    pub fn records(rows: Vec<MergedRow>) -> Vec<ParticipantEventRecord> {
        let input = rows.len();
        let mut by_key: BTreeMap<(EventKey, String), ParticipantEventRecord> = BTreeMap::new();
        for row in rows {
            by_key
                .entry((row.event.clone(), row.driver.clone()))
                .or_insert_with(|| ParticipantEventRecord::from(row));
        }
        let records: Vec<ParticipantEventRecord> = by_key.into_values().collect();
        let dnf = records.iter().filter(|r| Self::dnf(&r.classification) == 1).count();
        info!("status: {} rows from {} merged, {} did not finish", records.len(), input, dnf);
        records
    }
}
