#![allow(dead_code)]

use barwise::domain::bar::Bar;
use barwise::domain::error::BarwiseError;
use barwise::domain::position::{ExitAction, ExitDecision, OrderSpec, Position, Side};
use barwise::domain::strategy::Strategy;
use barwise::ports::bar_source::BarSource;
use barwise::ports::execution_port::ExecutionPort;
use chrono::{NaiveDate, NaiveDateTime};
use std::cell::RefCell;
use std::collections::HashMap;

pub fn ts(i: usize) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 1, 1)
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap()
        + chrono::Duration::hours(i as i64)
}

pub fn make_bar(i: usize, close: f64) -> Bar {
    Bar {
        time: ts(i),
        open: close - 0.25,
        high: close + 1.0,
        low: close - 1.0,
        close,
        spread: 1.5,
        tick_volume: 100.0 + i as f64,
        real_volume: None,
    }
}

pub fn make_bars(closes: &[f64]) -> Vec<Bar> {
    closes
        .iter()
        .enumerate()
        .map(|(i, &c)| make_bar(i, c))
        .collect()
}

/// Oscillating closes that produce regular moving-average crossovers.
pub fn wave_closes(n: usize) -> Vec<f64> {
    (0..n)
        .map(|i| 100.0 + 10.0 * (i as f64 / 4.0).sin())
        .collect()
}

pub fn bars_csv(bars: &[Bar]) -> String {
    let mut out = String::from("time,open,high,low,close,spread,tick_volume,real_volume\n");
    for b in bars {
        out.push_str(&format!(
            "{},{},{},{},{},{},{},\n",
            b.time.format("%Y-%m-%d %H:%M:%S"),
            b.open,
            b.high,
            b.low,
            b.close,
            b.spread,
            b.tick_volume
        ));
    }
    out
}

pub fn open_position(id: u64, side: Side, volume: f64, entry_price: f64) -> Position {
    Position {
        symbol: "EURUSD".into(),
        side,
        volume,
        entry_price,
        sl: 0.0,
        tp: 0.0,
        open_time: ts(0),
        close_price: None,
        close_time: None,
        id: Some(id),
    }
}

/// Bar source that counts how many bars were pulled.
pub struct CountingSource {
    bars: Vec<Bar>,
    pub pulled: usize,
}

impl CountingSource {
    pub fn new(bars: Vec<Bar>) -> Self {
        Self { bars, pulled: 0 }
    }
}

impl BarSource for CountingSource {
    fn next_bar(&mut self) -> Result<Option<Bar>, BarwiseError> {
        let bar = self.bars.get(self.pulled).cloned();
        if bar.is_some() {
            self.pulled += 1;
        }
        Ok(bar)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Equity,
    Positions,
    Exit(u64, ExitAction),
    Entry(f64),
}

/// Backend double that records every call in order.
///
/// Closing a position realizes the PnL registered for its id. `fail_equity_after`
/// makes the n-th and later equity reads fail; `fail_exit_for` makes applying
/// an exit to that id fail. `bar_times` holds the time of the bar handed to
/// each exit or entry.
#[derive(Default)]
pub struct ScriptedBroker {
    pub equity: f64,
    pub positions: Vec<Position>,
    pub pnl_on_close: HashMap<u64, f64>,
    pub fail_equity_after: Option<usize>,
    pub fail_exit_for: Option<u64>,
    pub calls: RefCell<Vec<Call>>,
    pub entries: Vec<OrderSpec>,
    pub bar_times: Vec<NaiveDateTime>,
}

impl ScriptedBroker {
    pub fn new(equity: f64, positions: Vec<Position>) -> Self {
        Self {
            equity,
            positions,
            ..Default::default()
        }
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.borrow().clone()
    }

    fn equity_reads(&self) -> usize {
        self.calls
            .borrow()
            .iter()
            .filter(|c| **c == Call::Equity)
            .count()
    }
}

impl ExecutionPort for ScriptedBroker {
    fn equity(&self) -> Result<f64, BarwiseError> {
        if self
            .fail_equity_after
            .is_some_and(|n| self.equity_reads() >= n)
        {
            return Err(BarwiseError::BackendUnavailable {
                reason: "terminal disconnected".into(),
            });
        }
        self.calls.borrow_mut().push(Call::Equity);
        Ok(self.equity)
    }

    fn positions(&self, symbol: Option<&str>) -> Result<Vec<Position>, BarwiseError> {
        self.calls.borrow_mut().push(Call::Positions);
        Ok(self
            .positions
            .iter()
            .filter(|p| symbol.is_none_or(|s| p.symbol == s))
            .cloned()
            .collect())
    }

    fn execute_entry(&mut self, order: &OrderSpec, bar: &Bar) -> Result<(), BarwiseError> {
        self.bar_times.push(bar.time);
        self.calls.borrow_mut().push(Call::Entry(order.volume));
        self.entries.push(order.clone());
        Ok(())
    }

    fn apply_exit_decision(
        &mut self,
        position: &Position,
        decision: &ExitDecision,
        bar: &Bar,
    ) -> Result<(), BarwiseError> {
        self.bar_times.push(bar.time);
        let id = position.id.unwrap_or_default();
        if self.fail_exit_for == Some(id) {
            return Err(BarwiseError::BackendUnavailable {
                reason: format!("rejected exit for {id}"),
            });
        }
        self.calls.borrow_mut().push(Call::Exit(id, decision.action));
        if decision.action == ExitAction::Close {
            self.equity += self.pnl_on_close.get(&id).copied().unwrap_or(0.0);
            self.positions.retain(|p| p.id != Some(id));
        }
        Ok(())
    }
}

/// Strategy double: exits come from a per-id table; entries commit
/// `entry_fraction` of whatever equity it is shown at the last close.
#[derive(Default)]
pub struct ScriptedStrategy {
    pub exits: HashMap<u64, ExitDecision>,
    pub entry_fraction: Option<f64>,
    pub exit_calls: Vec<u64>,
    pub entry_equity_seen: Vec<f64>,
    pub entry_positions_seen: Vec<usize>,
}

impl ScriptedStrategy {
    pub fn closing(ids: &[u64]) -> Self {
        Self {
            exits: ids
                .iter()
                .map(|&id| (id, ExitDecision::close("scripted")))
                .collect(),
            ..Default::default()
        }
    }

    pub fn with_entry(mut self, fraction: f64) -> Self {
        self.entry_fraction = Some(fraction);
        self
    }
}

impl Strategy for ScriptedStrategy {
    fn decide_entry(
        &mut self,
        bars: &[Bar],
        equity: f64,
        positions: &[Position],
    ) -> Result<Option<OrderSpec>, BarwiseError> {
        self.entry_equity_seen.push(equity);
        self.entry_positions_seen.push(positions.len());
        let (Some(fraction), Some(last)) = (self.entry_fraction, bars.last()) else {
            return Ok(None);
        };
        Ok(Some(OrderSpec {
            symbol: "EURUSD".into(),
            side: Side::Long,
            volume: equity * fraction / last.close,
            entry_price: None,
            sl: 0.0,
            tp: 0.0,
            comment: "scripted".into(),
        }))
    }

    fn decide_exit(
        &mut self,
        _bars: &[Bar],
        _equity: f64,
        position: &Position,
    ) -> Result<Option<ExitDecision>, BarwiseError> {
        let id = position.id.unwrap_or_default();
        self.exit_calls.push(id);
        Ok(self.exits.get(&id).cloned())
    }
}
