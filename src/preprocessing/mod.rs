/// Модуль предобработки данных

pub mod duration;
pub mod feature_engineering;
pub mod normalization;

pub use duration::parse_duration;
pub use feature_engineering::FeatureEngineer;
pub use normalization::{CountryTable, SchemaNormalizer};
