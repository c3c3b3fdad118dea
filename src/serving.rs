//! Построение признаков для запроса прогноза по справочникам варианта

use std::collections::HashMap;
use std::path::Path;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::{PipelineError, Result};
use crate::export::read_pick_lists;
use crate::pipeline::projection::FeatureInputs;
use crate::preprocessing::FeatureEngineer;
use crate::types::{CircuitOption, ConstructorOption, DriverOption, FeatureRow, PickLists, RaceVariant};

/// Запрос: участники, трасса, дата и поля, известные только в момент запроса.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureRequest {
    pub driver: String,
    pub constructor: String,
    pub circuit: String,
    pub race_date: NaiveDate,
    #[serde(default)]
    pub qualification_position: Option<i64>,
    #[serde(default)]
    pub laps: Option<i64>,
    #[serde(default)]
    pub rain: Option<u8>,
}

pub struct FeatureExpander {
    variant: RaceVariant,
    pick_lists: PickLists,
    drivers: HashMap<String, usize>,
    constructors: HashMap<String, usize>,
    circuits: HashMap<String, usize>,
}

fn index_refs<T>(items: &[T], reference: impl Fn(&T) -> &str) -> HashMap<String, usize> {
    let mut index = HashMap::new();
    for (i, item) in items.iter().enumerate() {
        index.entry(reference(item).to_lowercase()).or_insert(i);
    }
    index
}

impl FeatureExpander {
    pub fn new(variant: RaceVariant, pick_lists: PickLists) -> Self {
        Self {
            variant,
            drivers: index_refs(&pick_lists.drivers, |d| d.driver_ref.as_str()),
            constructors: index_refs(&pick_lists.constructors, |c| c.constructor_ref.as_str()),
            circuits: index_refs(&pick_lists.circuits, |c| c.circuit_ref.as_str()),
            pick_lists,
        }
    }

    /// Загрузка справочников `features_helper/*_<variant>.csv`.
    pub fn load(helper_dir: &Path, variant: RaceVariant) -> Result<Self> {
        Ok(Self::new(variant, read_pick_lists(helper_dir, variant)?))
    }

    pub fn variant(&self) -> RaceVariant {
        self.variant
    }

    pub fn pick_lists(&self) -> &PickLists {
        &self.pick_lists
    }

    pub fn driver(&self, reference: &str) -> Result<&DriverOption> {
        lookup(&self.drivers, &self.pick_lists.drivers, "driver", reference)
    }

    pub fn constructor(&self, reference: &str) -> Result<&ConstructorOption> {
        lookup(&self.constructors, &self.pick_lists.constructors, "constructor", reference)
    }

    pub fn circuit(&self, reference: &str) -> Result<&CircuitOption> {
        lookup(&self.circuits, &self.pick_lists.circuits, "circuit", reference)
    }

    /// Строка признаков с теми же колонками, что и при обучении, но без метки.
    pub fn expand(&self, request: &FeatureRequest) -> Result<FeatureRow> {
        let driver = self.driver(&request.driver)?;
        let constructor = self.constructor(&request.constructor)?;
        let circuit = self.circuit(&request.circuit)?;

        let inputs = FeatureInputs {
            driver: &driver.driver_ref,
            constructor: &constructor.constructor_ref,
            circuit: &circuit.circuit_ref,
            circuit_type: circuit.circuit_type.as_deref(),
            driver_nationality: driver.driver_nationality.as_deref(),
            constructor_nationality: constructor.constructor_nationality.as_deref(),
            circuit_nationality: circuit.circuit_nationality.as_deref(),
            event_date: request.race_date,
            derived: FeatureEngineer::date_features(
                request.race_date,
                driver.driver_date_of_birth,
                driver.first_event_date,
            ),
            driver_home: FeatureEngineer::home_advantage(
                driver.driver_nationality.as_deref(),
                circuit.circuit_nationality.as_deref(),
            ),
            constructor_home: FeatureEngineer::home_advantage(
                constructor.constructor_nationality.as_deref(),
                circuit.circuit_nationality.as_deref(),
            ),
            qualification_position: request.qualification_position,
            laps: request.laps,
            rain: request.rain.map_or(0, |r| u8::from(r > 0)),
        };
        Ok(inputs.row(self.variant))
    }
}

fn lookup<'a, T>(
    index: &HashMap<String, usize>,
    items: &'a [T],
    kind: &'static str,
    reference: &str,
) -> Result<&'a T> {
    index
        .get(&reference.trim().to_lowercase())
        .and_then(|&i| items.get(i))
        .ok_or_else(|| PipelineError::UnknownReference {
            kind,
            value: reference.to_string(),
        })
}
