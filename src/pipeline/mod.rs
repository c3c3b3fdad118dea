//! Конвейер нормализации результатов
//!
//! Порядок стадий: соединение → агрегация кругов → нормализация → сверка длительности →
//! медиана и отклонение → ранг → проекция. Вариант статуса после нормализации сразу
//! переходит к метке схода.

pub mod aggregation;
pub mod deviation;
pub mod merge;
pub mod projection;
pub mod ranking;
pub mod reconcile;
pub mod status;

use tracing::info;

use crate::config::PipelineConfig;
use crate::error::Result;
use crate::export;
use crate::preprocessing::normalization::SchemaNormalizer;
use crate::sources::{AuxiliaryTables, RawTables};
use crate::types::{DeviationRecord, RaceVariant, VariantOutput};

pub use aggregation::LapAggregator;
pub use deviation::{EventGroup, MedianDeviationComputer};
pub use merge::{MergedRow, RelationalMerger};
pub use projection::{FeatureInputs, FeatureProjector};
pub use ranking::{competition_ranks, RankAssigner};
pub use reconcile::{DurationReconciler, ReconciledRecord};
pub use status::StatusClassifier;

pub struct Pipeline {
    config: PipelineConfig,
}

impl Pipeline {
    pub fn new(config: PipelineConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn run(&self, variant: RaceVariant, tables: &dyn RawTables, aux: &AuxiliaryTables) -> VariantOutput {
        info!("Building {} dataset from {} tables", variant, tables.schema_name());
        let normalizer = SchemaNormalizer::new(tables.nationality_codes(), aux, self.config.year_from);
        let refs = normalizer.reference_tables(tables);
        let merged = RelationalMerger::new(variant).merge(tables, &refs);
        let projector = FeatureProjector::new(variant);

        if variant == RaceVariant::Status {
            let records = normalizer.enrich(StatusClassifier::records(merged));
            let features = projector.project_status(&records);
            let pick_lists = FeatureProjector::pick_lists(&records);
            info!("{}: {} feature rows", variant, features.len());
            return VariantOutput {
                records,
                deviations: Vec::new(),
                features,
                pick_lists,
            };
        }

        // барьер: медианы считаются только после полной агрегации
        let records = normalizer.enrich(LapAggregator::aggregate(merged));
        let reconciled = DurationReconciler::new(variant, self.config.min_laps_threshold).reconcile(&records);
        let groups = MedianDeviationComputer::new(
            variant,
            self.config.bounds_for(variant),
            self.config.retain_non_finishers,
        )
        .compute(reconciled, &records);

        let deviations: Vec<DeviationRecord> = groups
            .iter()
            .flat_map(|group| RankAssigner::assign(MedianDeviationComputer::deviations(group), &records))
            .collect();
        let features = projector.project_deviations(&deviations, &records);
        let pick_lists = FeatureProjector::pick_lists(deviations.iter().filter_map(|d| records.get(d.duration.record)));
        info!("{}: {} feature rows over {} events", variant, features.len(), groups.len());

        VariantOutput {
            records,
            deviations,
            features,
            pick_lists,
        }
    }

    /// Перезаписывает таблицу варианта и его справочники.
    pub fn persist(&self, variant: RaceVariant, output: &VariantOutput) -> Result<()> {
        let path = self.config.processed_dir.join(variant.output_file_name());
        export::write_features(&path, variant, &output.features)?;
        export::write_pick_lists(&self.config.features_helper_dir(), variant, &output.pick_lists)?;
        info!("{}: wrote {} rows to {}", variant, output.features.len(), path.display());
        Ok(())
    }
}
