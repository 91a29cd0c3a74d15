//! Price bar representation and input-row normalization.

use chrono::NaiveDateTime;

use super::error::BarwiseError;

/// One OHLC sample with spread and volume. Immutable once built.
#[derive(Debug, Clone, PartialEq)]
pub struct Bar {
    pub time: NaiveDateTime,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub spread: f64,
    pub tick_volume: f64,
    /// `None` means the source does not report real volume, not zero volume.
    pub real_volume: Option<f64>,
}

impl Bar {
    /// Reject bars whose numeric fields are not finite.
    pub fn validate(&self, row: usize) -> Result<(), BarwiseError> {
        let fields = [
            ("open", self.open),
            ("high", self.high),
            ("low", self.low),
            ("close", self.close),
            ("spread", self.spread),
            ("tick_volume", self.tick_volume),
        ];
        for (name, value) in fields {
            if !value.is_finite() {
                return Err(BarwiseError::MalformedInput {
                    row,
                    reason: format!("{name} is not a finite number"),
                });
            }
        }
        if let Some(v) = self.real_volume {
            if !v.is_finite() {
                return Err(BarwiseError::MalformedInput {
                    row,
                    reason: "real_volume is not a finite number".into(),
                });
            }
        }
        Ok(())
    }
}

/// A row as delivered by a data source, before normalization.
///
/// Any field may be missing. [`RawBar::normalize`] fills the optional volume
/// columns with defaults and rejects rows missing a required column.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawBar {
    pub time: Option<NaiveDateTime>,
    pub open: Option<f64>,
    pub high: Option<f64>,
    pub low: Option<f64>,
    pub close: Option<f64>,
    pub spread: Option<f64>,
    pub tick_volume: Option<f64>,
    pub real_volume: Option<f64>,
}

impl RawBar {
    pub fn normalize(&self, row: usize) -> Result<Bar, BarwiseError> {
        let missing = |column: &str| BarwiseError::MalformedInput {
            row,
            reason: format!("missing required column {column}"),
        };

        let bar = Bar {
            time: self.time.ok_or_else(|| missing("time"))?,
            open: self.open.ok_or_else(|| missing("open"))?,
            high: self.high.ok_or_else(|| missing("high"))?,
            low: self.low.ok_or_else(|| missing("low"))?,
            close: self.close.ok_or_else(|| missing("close"))?,
            spread: self.spread.ok_or_else(|| missing("spread"))?,
            tick_volume: self.tick_volume.unwrap_or(0.0),
            real_volume: self.real_volume,
        };
        bar.validate(row)?;
        Ok(bar)
    }
}

impl From<&Bar> for RawBar {
    fn from(bar: &Bar) -> Self {
        RawBar {
            time: Some(bar.time),
            open: Some(bar.open),
            high: Some(bar.high),
            low: Some(bar.low),
            close: Some(bar.close),
            spread: Some(bar.spread),
            tick_volume: Some(bar.tick_volume),
            real_volume: bar.real_volume,
        }
    }
}
