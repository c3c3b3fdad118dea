//! Производные признаки, общие для пакетной обработки и слоя обслуживания

use chrono::NaiveDate;
use ndarray::{Array1, Array2};

use crate::error::{PipelineError, Result};
use crate::types::{DerivedDateFeatures, FeatureRow, FeatureValue};

/// Значения погоды, считающиеся дождём (после обрезки и перевода в нижний регистр).
pub const RAIN_WEATHER: [&str; 4] = ["rain", "rainy", "changeable", "very changeable"];

pub struct FeatureEngineer;

impl FeatureEngineer {
    /// Возраст в целых днях; порядок дат не важен.
    pub fn age_in_days(event_date: NaiveDate, date_of_birth: Option<NaiveDate>) -> Option<i64> {
        date_of_birth.map(|dob| (event_date - dob).num_days().abs())
    }

    pub fn days_since_first_event(event_date: NaiveDate, first_event_date: Option<NaiveDate>) -> Option<i64> {
        first_event_date.map(|first| (event_date - first).num_days().abs())
    }

    pub fn date_features(
        event_date: NaiveDate,
        date_of_birth: Option<NaiveDate>,
        first_event_date: Option<NaiveDate>,
    ) -> DerivedDateFeatures {
        DerivedDateFeatures {
            age_at_event_in_days: Self::age_in_days(event_date, date_of_birth),
            days_since_first_event: Self::days_since_first_event(event_date, first_event_date),
        }
    }

    /// 1, если оба кода известны и совпадают.
    pub fn home_advantage(participant: Option<&str>, circuit: Option<&str>) -> u8 {
        match (participant, circuit) {
            (Some(p), Some(c)) if p == c => 1,
            _ => 0,
        }
    }

    pub fn rain_flag(weather: Option<&str>) -> u8 {
        let Some(weather) = weather else {
            return 0;
        };
        let weather = weather.trim().to_lowercase();
        u8::from(RAIN_WEATHER.contains(&weather.as_str()))
    }

    /// Числовые колонки таблицы признаков как матрица плюс вектор меток.
    ///
    /// Колонка числовая, если ни в одной строке нет текста. Пропуски становятся NaN.
    pub fn numeric_matrix(
        rows: &[FeatureRow],
        label: &str,
    ) -> Result<(Array2<f64>, Array1<f64>, Vec<&'static str>)> {
        let Some(first) = rows.first() else {
            return Ok((Array2::zeros((0, 0)), Array1::zeros(0), Vec::new()));
        };
        if first.get(label).is_none() {
            return Err(PipelineError::Config(format!("label column `{label}` not found")));
        }

        let columns: Vec<&'static str> = first
            .columns()
            .into_iter()
            .filter(|name| *name != label)
            .filter(|name| {
                rows.iter()
                    .all(|row| !matches!(row.get(name), Some(FeatureValue::Text(_))))
            })
            .collect();

        let mut features = Array2::from_elem((rows.len(), columns.len()), f64::NAN);
        let mut targets = Array1::from_elem(rows.len(), f64::NAN);
        for (i, row) in rows.iter().enumerate() {
            for (j, name) in columns.iter().enumerate() {
                if let Some(value) = row.get(name).and_then(FeatureValue::as_f64) {
                    features[[i, j]] = value;
                }
            }
            if let Some(value) = row.get(label).and_then(FeatureValue::as_f64) {
                targets[i] = value;
            }
        }

        Ok((features, targets, columns))
    }
}
