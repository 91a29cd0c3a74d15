//! Windowed feature computation.
//!
//! - [`FeatureTable`]: retained bars plus derived columns
//! - [`FeatureLogic`]: pluggable, causal derived-column computation
//! - [`FeatureEngine`]: streaming (`update`/`extract`) and bulk
//!   (`compute_bulk`) paths over the same logic
//! - [`SpecFeatureLogic`]: a logic assembled from textual column specs
//!
//! Both engine paths run the same `FeatureLogic::compute` over a table holding
//! the full retained prefix, so with no retention window they agree exactly.

pub mod engine;
pub mod ops;
pub mod spec;
pub mod table;

pub use engine::FeatureEngine;
pub use spec::{FeatureSpec, SpecFeatureLogic};
pub use table::FeatureTable;

use chrono::NaiveDateTime;

use crate::domain::error::BarwiseError;

/// Derived-column logic consumed by [`FeatureEngine`].
///
/// `compute` receives the whole retained table with derived columns removed
/// and must only use causal operations (lags, trailing windows) so that row
/// `i` depends on rows `0..=i` alone.
pub trait FeatureLogic {
    /// Rows needed before the last row's features are meaningful.
    fn min_bars(&self) -> usize;

    /// Columns surfaced in each [`FeatureVector`], in order.
    fn feature_names(&self) -> Vec<String>;

    fn compute(&self, table: &mut FeatureTable) -> Result<(), BarwiseError>;
}

impl<L: FeatureLogic + ?Sized> FeatureLogic for Box<L> {
    fn min_bars(&self) -> usize {
        (**self).min_bars()
    }

    fn feature_names(&self) -> Vec<String> {
        (**self).feature_names()
    }

    fn compute(&self, table: &mut FeatureTable) -> Result<(), BarwiseError> {
        (**self).compute(table)
    }
}

/// Feature values for one row, keyed by column name in logic order.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureVector {
    pub time: NaiveDateTime,
    values: Vec<(String, Option<f64>)>,
}

impl FeatureVector {
    pub fn new(time: NaiveDateTime, values: Vec<(String, Option<f64>)>) -> Self {
        FeatureVector { time, values }
    }

    /// Value of `name`; `None` when the column is absent or has no value yet.
    pub fn get(&self, name: &str) -> Option<f64> {
        self.values
            .iter()
            .find(|(n, _)| n == name)
            .and_then(|(_, v)| *v)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.values.iter().any(|(n, _)| n == name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.values.iter().map(|(n, _)| n.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, Option<f64>)> {
        self.values.iter().map(|(n, v)| (n.as_str(), *v))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}
