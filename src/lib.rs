//! Race outcome ML - конвейер нормализации результатов гонок

pub mod api;
pub mod config;
pub mod error;
pub mod export;
pub mod pipeline;
pub mod preprocessing;
pub mod serving;
pub mod sources;
pub mod types;

pub use config::PipelineConfig;
pub use error::{PipelineError, Result};
pub use pipeline::Pipeline;
pub use preprocessing::parse_duration;
pub use serving::{FeatureExpander, FeatureRequest};
pub use types::*;
