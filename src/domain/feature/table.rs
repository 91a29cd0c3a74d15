//! Column-oriented table of bars plus derived feature columns.

use chrono::NaiveDateTime;

use crate::domain::bar::Bar;
use crate::domain::error::BarwiseError;

use super::FeatureVector;

/// Base columns every table carries, in storage order.
pub const BASE_COLUMNS: [&str; 7] = [
    "open",
    "high",
    "low",
    "close",
    "spread",
    "tick_volume",
    "real_volume",
];

#[derive(Debug, Clone, PartialEq)]
struct Column {
    name: String,
    values: Vec<Option<f64>>,
    derived: bool,
}

/// Ordered rows of bars. Row order mirrors the order bars were pushed.
///
/// Base columns are filled from each [`Bar`]; derived columns are attached
/// by a [`super::FeatureLogic`] through [`FeatureTable::set_column`] and must
/// always have one value per row.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureTable {
    time: Vec<NaiveDateTime>,
    columns: Vec<Column>,
}

impl Default for FeatureTable {
    fn default() -> Self {
        Self::new()
    }
}

impl FeatureTable {
    pub fn new() -> Self {
        let columns = BASE_COLUMNS
            .iter()
            .map(|name| Column {
                name: name.to_string(),
                values: Vec::new(),
                derived: false,
            })
            .collect();
        FeatureTable {
            time: Vec::new(),
            columns,
        }
    }

    /// Build a table from bars, rejecting malformed or out-of-order input.
    pub fn from_bars(bars: &[Bar]) -> Result<Self, BarwiseError> {
        let mut table = FeatureTable::new();
        for (row, bar) in bars.iter().enumerate() {
            table.push_bar(bar, row)?;
        }
        Ok(table)
    }

    pub fn len(&self) -> usize {
        self.time.len()
    }

    pub fn is_empty(&self) -> bool {
        self.time.is_empty()
    }

    pub fn times(&self) -> &[NaiveDateTime] {
        &self.time
    }

    pub fn last_time(&self) -> Option<NaiveDateTime> {
        self.time.last().copied()
    }

    /// Append one bar. `row` is the bar's index in its input stream and is
    /// only used in errors. On error the table is left as it was.
    pub fn push_bar(&mut self, bar: &Bar, row: usize) -> Result<(), BarwiseError> {
        bar.validate(row)?;
        if let Some(previous) = self.last_time() {
            if bar.time <= previous {
                return Err(BarwiseError::OutOfOrder {
                    previous,
                    time: bar.time,
                });
            }
        }

        let base = [
            Some(bar.open),
            Some(bar.high),
            Some(bar.low),
            Some(bar.close),
            Some(bar.spread),
            Some(bar.tick_volume),
            bar.real_volume,
        ];
        self.time.push(bar.time);
        for (column, value) in self.columns.iter_mut().zip(base) {
            column.values.push(value);
        }
        // derived columns are padded so every column stays row-aligned
        for column in self.columns.iter_mut().skip(BASE_COLUMNS.len()) {
            column.values.push(None);
        }
        Ok(())
    }

    /// Keep only the newest `rows` rows.
    pub fn retain_last(&mut self, rows: usize) {
        if self.len() <= rows {
            return;
        }
        let drop = self.len() - rows;
        self.time.drain(..drop);
        for column in &mut self.columns {
            column.values.drain(..drop);
        }
    }

    /// Remove every derived column, leaving only the base columns.
    pub fn clear_derived(&mut self) {
        self.columns.retain(|c| !c.derived);
    }

    pub fn column(&self, name: &str) -> Option<&[Option<f64>]> {
        self.columns
            .iter()
            .find(|c| c.name == name)
            .map(|c| c.values.as_slice())
    }

    /// Like [`FeatureTable::column`] but reports an unknown name as an error.
    pub fn require(&self, name: &str) -> Result<&[Option<f64>], BarwiseError> {
        self.column(name).ok_or_else(|| BarwiseError::UnknownColumn {
            name: name.to_string(),
        })
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    /// Insert or replace a derived column.
    pub fn set_column(
        &mut self,
        name: impl Into<String>,
        values: Vec<Option<f64>>,
    ) -> Result<(), BarwiseError> {
        let name = name.into();
        if values.len() != self.len() {
            return Err(BarwiseError::ColumnLength {
                name,
                expected: self.len(),
                actual: values.len(),
            });
        }
        if BASE_COLUMNS.contains(&name.as_str()) {
            return Err(BarwiseError::UnsupportedConfig {
                reason: format!("derived column may not replace base column {name}"),
            });
        }
        match self.columns.iter_mut().find(|c| c.name == name) {
            Some(column) => column.values = values,
            None => self.columns.push(Column {
                name,
                values,
                derived: true,
            }),
        }
        Ok(())
    }

    /// Collect the named columns at `row` into a feature vector.
    pub fn vector_at(&self, row: usize, names: &[String]) -> Result<FeatureVector, BarwiseError> {
        let time = *self.time.get(row).ok_or(BarwiseError::NotReady {
            have: self.len(),
            need: row + 1,
        })?;
        let mut values = Vec::with_capacity(names.len());
        for name in names {
            let column = self.require(name)?;
            values.push((name.clone(), column[row]));
        }
        Ok(FeatureVector::new(time, values))
    }
}
