//! Запись выходных таблиц и справочников в CSV

use std::path::Path;

use serde::Serialize;

use crate::error::{PipelineError, Result};
use crate::pipeline::projection::output_columns;
use crate::sources::read_table;
use crate::types::{FeatureRow, PickLists, RaceVariant};

fn ensure_parent(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|source| PipelineError::Io {
            path: parent.to_path_buf(),
            source,
        })?;
    }
    Ok(())
}

fn csv_error(path: &Path) -> impl Fn(csv::Error) -> PipelineError + '_ {
    move |source| PipelineError::Csv {
        path: path.to_path_buf(),
        source,
    }
}

/// Таблица признаков в порядке колонок варианта; пропуски пишутся пустыми.
pub fn write_features(path: &Path, variant: RaceVariant, rows: &[FeatureRow]) -> Result<()> {
    ensure_parent(path)?;
    let columns = output_columns(variant);
    let mut writer = csv::Writer::from_path(path).map_err(csv_error(path))?;
    writer.write_record(&columns).map_err(csv_error(path))?;
    for row in rows {
        let values: Vec<String> = columns
            .iter()
            .map(|column| row.get(column).map(ToString::to_string).unwrap_or_default())
            .collect();
        writer.write_record(&values).map_err(csv_error(path))?;
    }
    writer.flush().map_err(|source| PipelineError::Io {
        path: path.to_path_buf(),
        source,
    })
}

fn write_records<T: Serialize>(path: &Path, records: &[T]) -> Result<()> {
    ensure_parent(path)?;
    let mut writer = csv::Writer::from_path(path).map_err(csv_error(path))?;
    for record in records {
        writer.serialize(record).map_err(csv_error(path))?;
    }
    writer.flush().map_err(|source| PipelineError::Io {
        path: path.to_path_buf(),
        source,
    })
}

pub fn pick_list_paths(dir: &Path, variant: RaceVariant) -> [std::path::PathBuf; 3] {
    let suffix = variant.name_suffix();
    [
        dir.join(format!("drivers_{suffix}.csv")),
        dir.join(format!("constructors_{suffix}.csv")),
        dir.join(format!("circuits_{suffix}.csv")),
    ]
}

pub fn write_pick_lists(dir: &Path, variant: RaceVariant, lists: &PickLists) -> Result<()> {
    let [drivers, constructors, circuits] = pick_list_paths(dir, variant);
    write_records(&drivers, &lists.drivers)?;
    write_records(&constructors, &lists.constructors)?;
    write_records(&circuits, &lists.circuits)
}

pub fn read_pick_lists(dir: &Path, variant: RaceVariant) -> Result<PickLists> {
    let [drivers, constructors, circuits] = pick_list_paths(dir, variant);
    Ok(PickLists {
        drivers: read_table(&drivers, "drivers", true)?.unwrap_or_default(),
        constructors: read_table(&constructors, "constructors", true)?.unwrap_or_default(),
        circuits: read_table(&circuits, "circuits", true)?.unwrap_or_default(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{CircuitOption, DriverOption, FeatureValue};
    use chrono::NaiveDate;

    #[test]
    fn pick_lists_survive_a_round_trip_with_gaps() {
        let dir = tempfile::tempdir().unwrap();
        let lists = PickLists {
            drivers: vec![DriverOption {
                driver_ref: "alonso".into(),
                driver_nationality: Some("ESP".into()),
                driver_date_of_birth: NaiveDate::from_ymd_opt(1981, 7, 29),
                first_event_date: None,
            }],
            constructors: Vec::new(),
            circuits: vec![CircuitOption {
                circuit_ref: "catalunya".into(),
                circuit_nationality: None,
                circuit_type: Some("Race circuit".into()),
            }],
        };
        write_pick_lists(dir.path(), RaceVariant::Qualifying, &lists).unwrap();
        assert!(dir.path().join("drivers_qualifying.csv").exists());
        let back = read_pick_lists(dir.path(), RaceVariant::Qualifying).unwrap();
        assert_eq!(back, lists);
    }

    #[test]
    fn feature_table_has_variant_header() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("status.csv");
        let mut row = FeatureRow::default();
        row.push("driver", FeatureValue::Text("alonso".into()));
        row.push("dnf", FeatureValue::Int(1));
        write_features(&path, RaceVariant::Status, &[row]).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        let mut lines = text.lines();
        assert_eq!(lines.next().unwrap(), output_columns(RaceVariant::Status).join(","));
        let values: Vec<&str> = lines.next().unwrap().split(',').collect();
        assert_eq!(values.first(), Some(&"alonso"));
        assert_eq!(values.last(), Some(&"1"));
        assert_eq!(values[3], "");
    }
}
