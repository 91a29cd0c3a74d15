//! Execution backend port trait.

use crate::domain::bar::Bar;
use crate::domain::error::BarwiseError;
use crate::domain::position::{ExitDecision, OrderSpec, Position};

/// The backend owns positions and account state; the decision loop only reads
/// snapshots and submits requests.
///
/// Each call reflects every request applied before it, so equity read after
/// an exit already includes that exit's realized PnL.
pub trait ExecutionPort {
    fn equity(&self) -> Result<f64, BarwiseError>;

    /// Open positions, all of them when `symbol` is `None`.
    fn positions(&self, symbol: Option<&str>) -> Result<Vec<Position>, BarwiseError>;

    /// First open position for `symbol`, if any.
    fn position(&self, symbol: &str) -> Result<Option<Position>, BarwiseError> {
        Ok(self.positions(Some(symbol))?.into_iter().next())
    }

    /// Submit an entry. `bar` is the bar the decision was taken on.
    fn execute_entry(&mut self, order: &OrderSpec, bar: &Bar) -> Result<(), BarwiseError>;

    fn apply_exit_decision(
        &mut self,
        position: &Position,
        decision: &ExitDecision,
        bar: &Bar,
    ) -> Result<(), BarwiseError>;
}
