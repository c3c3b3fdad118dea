//! Ранг отклонения внутри события

use crate::types::{DeviationRecord, ParticipantEventRecord};

/// Спортивный ранг по возрастанию: 1 + число строго меньших значений.
pub fn competition_ranks(values: &[i64]) -> Vec<u32> {
    let mut sorted = values.to_vec();
    sorted.sort_unstable();
    values
        .iter()
        .map(|v| (sorted.partition_point(|x| x < v) + 1) as u32)
        .collect()
}

pub struct RankAssigner;

impl RankAssigner {
    /// Проставляет `final_position` и упорядочивает строки события по позиции.
    pub fn assign(mut event_rows: Vec<DeviationRecord>, participants: &[ParticipantEventRecord]) -> Vec<DeviationRecord> {
        let deviations: Vec<i64> = event_rows.iter().map(|d| d.deviation_from_median_ms).collect();
        for (row, rank) in event_rows.iter_mut().zip(competition_ranks(&deviations)) {
            row.final_position = rank;
        }
        event_rows.sort_by(|a, b| {
            let key = |d: &DeviationRecord| {
                participants
                    .get(d.duration.record)
                    .map(|p| (p.driver.clone(), p.constructor.clone()))
            };
            a.final_position.cmp(&b.final_position).then_with(|| key(a).cmp(&key(b)))
        });
        event_rows
    }
}
