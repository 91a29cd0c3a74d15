//! Streaming and bulk feature computation over one [`FeatureLogic`].

use crate::domain::bar::{Bar, RawBar};
use crate::domain::error::BarwiseError;
use crate::ports::bar_source::BarSource;

use super::table::FeatureTable;
use super::{FeatureLogic, FeatureVector};

/// Holds the retained bar table for one logic.
///
/// Every `update` recomputes the logic over the whole retained table. There
/// is no incremental state, which is what keeps the streaming path equal to
/// [`FeatureEngine::compute_bulk`].
#[derive(Debug, Clone)]
pub struct FeatureEngine<L> {
    logic: L,
    window: Option<usize>,
    table: FeatureTable,
    /// Bars accepted since construction or the last reset.
    seen: usize,
}

impl<L: FeatureLogic> FeatureEngine<L> {
    /// `window` caps the retained rows (oldest dropped); `None` keeps all.
    pub fn new(logic: L, window: Option<usize>) -> Result<Self, BarwiseError> {
        let min_bars = logic.min_bars();
        if min_bars == 0 {
            return Err(BarwiseError::UnsupportedConfig {
                reason: "feature logic must need at least one bar".into(),
            });
        }
        if let Some(w) = window {
            if w < min_bars {
                return Err(BarwiseError::UnsupportedConfig {
                    reason: format!(
                        "retention window {} is shorter than the {} bars the features need",
                        w, min_bars
                    ),
                });
            }
        }
        Ok(Self {
            logic,
            window,
            table: FeatureTable::new(),
            seen: 0,
        })
    }

    pub fn logic(&self) -> &L {
        &self.logic
    }

    pub fn window(&self) -> Option<usize> {
        self.window
    }

    pub fn min_bars(&self) -> usize {
        self.logic.min_bars()
    }

    pub fn feature_names(&self) -> Vec<String> {
        self.logic.feature_names()
    }

    /// Rows currently retained.
    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    pub fn table(&self) -> &FeatureTable {
        &self.table
    }

    pub fn reset(&mut self) {
        self.table = FeatureTable::new();
        self.seen = 0;
    }

    /// Append `bar`, apply the retention window and recompute every derived
    /// column. On any error the retained table is unchanged.
    pub fn update(&mut self, bar: &Bar) -> Result<(), BarwiseError> {
        let mut next = self.table.clone();
        next.clear_derived();
        next.push_bar(bar, self.seen)?;
        if let Some(w) = self.window {
            next.retain_last(w);
        }
        self.logic.compute(&mut next)?;
        self.table = next;
        self.seen += 1;
        Ok(())
    }

    /// Feed bars in order, stopping at the first rejected bar.
    pub fn update_bars<'a, I>(&mut self, bars: I) -> Result<(), BarwiseError>
    where
        I: IntoIterator<Item = &'a Bar>,
    {
        for bar in bars {
            self.update(bar)?;
        }
        Ok(())
    }

    pub fn ready(&self) -> bool {
        self.table.len() >= self.logic.min_bars()
    }

    /// Features of the newest row.
    pub fn extract(&self) -> Result<FeatureVector, BarwiseError> {
        if !self.ready() {
            return Err(BarwiseError::NotReady {
                have: self.table.len(),
                need: self.logic.min_bars(),
            });
        }
        self.table
            .vector_at(self.table.len() - 1, &self.logic.feature_names())
    }

    /// Normalize a full-history table, compute the logic once over all of it
    /// and return one vector per row from index `min_bars - 1` on.
    ///
    /// The retention window is ignored and the engine's own table is not
    /// touched.
    pub fn compute_bulk(&self, rows: &[RawBar]) -> Result<Vec<FeatureVector>, BarwiseError> {
        let mut table = FeatureTable::new();
        for (i, raw) in rows.iter().enumerate() {
            let bar = raw.normalize(i)?;
            table.push_bar(&bar, i)?;
        }
        self.logic.compute(&mut table)?;

        let names = self.logic.feature_names();
        let first = self.logic.min_bars() - 1;
        (first..table.len())
            .map(|row| table.vector_at(row, &names))
            .collect()
    }

    /// Drain `source` through [`FeatureEngine::update`], collecting one vector
    /// for every row at which the engine is ready.
    pub fn stream_from_source(
        &mut self,
        source: &mut dyn BarSource,
    ) -> Result<Vec<FeatureVector>, BarwiseError> {
        let mut vectors = Vec::new();
        while let Some(bar) = source.next_bar()? {
            self.update(&bar)?;
            if self.ready() {
                vectors.push(self.extract()?);
            }
        }
        Ok(vectors)
    }
}

impl<L: FeatureLogic + Clone> FeatureEngine<L> {
    /// Run both paths over `rows` on fresh, unwindowed engines and report
    /// the first row or column where they disagree. Returns the number of
    /// vectors compared.
    pub fn verify_equivalence(&self, rows: &[RawBar]) -> Result<usize, BarwiseError> {
        let mut streaming = FeatureEngine::new(self.logic.clone(), None)?;
        let mut streamed = Vec::new();
        for (i, raw) in rows.iter().enumerate() {
            streaming.update(&raw.normalize(i)?)?;
            if streaming.ready() {
                streamed.push(streaming.extract()?);
            }
        }
        let bulk = streaming.compute_bulk(rows)?;

        let offset = self.logic.min_bars() - 1;
        if streamed.len() != bulk.len() {
            return Err(BarwiseError::Divergence {
                row: offset + streamed.len().min(bulk.len()),
                column: "<row count>".into(),
                streaming: Some(streamed.len() as f64),
                bulk: Some(bulk.len() as f64),
            });
        }

        for (i, (s, b)) in streamed.iter().zip(&bulk).enumerate() {
            for ((name, sv), (_, bv)) in s.iter().zip(b.iter()) {
                if !same_value(sv, bv) {
                    return Err(BarwiseError::Divergence {
                        row: offset + i,
                        column: name.to_string(),
                        streaming: sv,
                        bulk: bv,
                    });
                }
            }
        }
        Ok(streamed.len())
    }
}

/// Bitwise comparison so that identical NaNs would still count as equal.
fn same_value(a: Option<f64>, b: Option<f64>) -> bool {
    match (a, b) {
        (Some(x), Some(y)) => x.to_bits() == y.to_bits(),
        (None, None) => true,
        _ => false,
    }
}
