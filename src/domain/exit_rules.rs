//! Composable exit rules for open positions.

use crate::domain::bar::Bar;
use crate::domain::position::{ExitDecision, Position, Side};

/// One exit condition. `None` means the rule has nothing to say about this
/// position on this bar.
pub trait ExitRule {
    fn decide(&self, bars: &[Bar], position: &Position) -> Option<ExitDecision>;
}

impl<R: ExitRule + ?Sized> ExitRule for Box<R> {
    fn decide(&self, bars: &[Bar], position: &Position) -> Option<ExitDecision> {
        (**self).decide(bars, position)
    }
}

/// Closes when the last bar's range touches the stop-loss or take-profit.
///
/// When both are touched in the same bar the stop wins.
#[derive(Debug, Clone, Copy, Default)]
pub struct StopTargetExit;

impl ExitRule for StopTargetExit {
    fn decide(&self, bars: &[Bar], position: &Position) -> Option<ExitDecision> {
        let bar = bars.last()?;
        let (adverse, favourable) = match position.side {
            Side::Long => (bar.low, bar.high),
            Side::Short => (bar.high, bar.low),
            Side::Flat => return None,
        };
        if position.should_stop_loss(adverse) {
            Some(ExitDecision::close("stop loss"))
        } else if position.should_take_profit(favourable) {
            Some(ExitDecision::close("take profit"))
        } else {
            None
        }
    }
}

/// Ratchets the stop-loss `pct` percent behind the last close, never loosening it.
#[derive(Debug, Clone, Copy)]
pub struct TrailingStopExit {
    pub pct: f64,
}

impl TrailingStopExit {
    pub fn new(pct: f64) -> Self {
        TrailingStopExit { pct }
    }
}

impl ExitRule for TrailingStopExit {
    fn decide(&self, bars: &[Bar], position: &Position) -> Option<ExitDecision> {
        if self.pct <= 0.0 {
            return None;
        }
        let close = bars.last()?.close;
        let candidate = match position.side {
            Side::Long => close * (1.0 - self.pct / 100.0),
            Side::Short => close * (1.0 + self.pct / 100.0),
            Side::Flat => return None,
        };
        let tighter = match position.side {
            Side::Long => position.sl == 0.0 || candidate > position.sl,
            _ => position.sl == 0.0 || candidate < position.sl,
        };
        tighter.then(|| ExitDecision::update_sl_tp(Some(candidate), None, "trailing stop"))
    }
}
