//! Bar-driven decision loop: exits first, then at most one entry.

use tracing::{debug, info, warn};

use crate::domain::bar::Bar;
use crate::domain::error::BarwiseError;
use crate::domain::strategy::Strategy;
use crate::domain::window::BarWindow;
use crate::ports::bar_source::BarSource;
use crate::ports::execution_port::ExecutionPort;

/// What one call to [`DecisionLoop::on_bar`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    WarmingUp { have: usize, need: usize },
    Evaluated {
        exits_applied: usize,
        entry_submitted: bool,
    },
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub bars: usize,
    pub evaluated: usize,
    pub exits_applied: usize,
    pub entries_submitted: usize,
}

impl RunSummary {
    fn record(&mut self, outcome: StepOutcome) {
        self.bars += 1;
        if let StepOutcome::Evaluated {
            exits_applied,
            entry_submitted,
        } = outcome
        {
            self.evaluated += 1;
            self.exits_applied += exits_applied;
            self.entries_submitted += usize::from(entry_submitted);
        }
    }
}

/// Drives one symbol: buffers bars in a sliding window and, once it is full,
/// asks the strategy for exits on every open position before asking for a
/// single entry.
///
/// The loop keeps no state besides the window. Equity and positions are read
/// from the backend on every bar, and again after exits are applied so the
/// entry decision sees their effect.
pub struct DecisionLoop<S, E> {
    symbol: String,
    window: BarWindow,
    strategy: S,
    execution: E,
}

impl<S: Strategy, E: ExecutionPort> DecisionLoop<S, E> {
    pub fn new(
        symbol: impl Into<String>,
        window_size: usize,
        strategy: S,
        execution: E,
    ) -> Result<Self, BarwiseError> {
        Ok(DecisionLoop {
            symbol: symbol.into(),
            window: BarWindow::new(window_size)?,
            strategy,
            execution,
        })
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn window(&self) -> &BarWindow {
        &self.window
    }

    pub fn strategy(&self) -> &S {
        &self.strategy
    }

    pub fn execution(&self) -> &E {
        &self.execution
    }

    pub fn into_parts(self) -> (S, E) {
        (self.strategy, self.execution)
    }

    /// Process one bar to completion. Any backend or strategy error stops
    /// processing of this bar and is returned; exits already applied stay
    /// applied.
    pub fn on_bar(&mut self, bar: Bar) -> Result<StepOutcome, BarwiseError> {
        if let Some(last) = self.window.last() {
            if bar.time <= last.time {
                return Err(BarwiseError::OutOfOrder {
                    previous: last.time,
                    time: bar.time,
                });
            }
        }
        let current = bar.clone();
        self.window.push(bar);
        if !self.window.is_full() {
            debug!(
                symbol = %self.symbol,
                have = self.window.len(),
                need = self.window.capacity(),
                "warming up"
            );
            return Ok(StepOutcome::WarmingUp {
                have: self.window.len(),
                need: self.window.capacity(),
            });
        }

        let bars = self.window.as_slice();

        let equity = logged(self.execution.equity(), "read equity")?;
        let snapshot = logged(
            self.execution.positions(Some(&self.symbol)),
            "read positions",
        )?;

        let mut exits_applied = 0;
        for position in &snapshot {
            match self.strategy.decide_exit(bars, equity, position)? {
                Some(decision) if !decision.is_hold() => {
                    logged(
                        self.execution
                            .apply_exit_decision(position, &decision, &current),
                        "apply exit",
                    )?;
                    info!(
                        symbol = %self.symbol,
                        id = ?position.id,
                        action = %decision.action,
                        reason = %decision.reason,
                        "exit applied"
                    );
                    exits_applied += 1;
                }
                _ => debug!(symbol = %self.symbol, id = ?position.id, "hold"),
            }
        }

        let equity = logged(self.execution.equity(), "read equity")?;
        let positions = logged(
            self.execution.positions(Some(&self.symbol)),
            "read positions",
        )?;

        let entry_submitted = match self.strategy.decide_entry(bars, equity, &positions)? {
            Some(order) => {
                logged(self.execution.execute_entry(&order, &current), "submit entry")?;
                info!(
                    symbol = %order.symbol,
                    side = %order.side,
                    volume = order.volume,
                    equity,
                    comment = %order.comment,
                    "entry submitted"
                );
                true
            }
            None => false,
        };

        Ok(StepOutcome::Evaluated {
            exits_applied,
            entry_submitted,
        })
    }

    /// Drain `source`, stopping at its end or the first error.
    pub fn run(&mut self, source: &mut dyn BarSource) -> Result<RunSummary, BarwiseError> {
        let mut summary = RunSummary::default();
        while let Some(bar) = source.next_bar()? {
            let outcome = self.on_bar(bar)?;
            summary.record(outcome);
        }
        info!(
            symbol = %self.symbol,
            bars = summary.bars,
            exits = summary.exits_applied,
            entries = summary.entries_submitted,
            "source exhausted"
        );
        Ok(summary)
    }
}

fn logged<T>(result: Result<T, BarwiseError>, what: &str) -> Result<T, BarwiseError> {
    result.inspect_err(|e| warn!(error = %e, "failed to {what}"))
}
