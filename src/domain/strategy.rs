//! Strategy trait and the moving-average-cross reference strategy.

use crate::domain::bar::{Bar, RawBar};
use crate::domain::error::BarwiseError;
use crate::domain::exit_rules::ExitRule;
use crate::domain::feature::{FeatureEngine, FeatureSpec, FeatureVector, SpecFeatureLogic};
use crate::domain::position::{ExitDecision, OrderSpec, Position, Side};

/// Numeric judgment for the decision loop.
///
/// `bars` is the full sliding window, oldest first; the last bar is the one
/// being evaluated.
pub trait Strategy {
    fn decide_entry(
        &mut self,
        bars: &[Bar],
        equity: f64,
        positions: &[Position],
    ) -> Result<Option<OrderSpec>, BarwiseError>;

    fn decide_exit(
        &mut self,
        bars: &[Bar],
        equity: f64,
        position: &Position,
    ) -> Result<Option<ExitDecision>, BarwiseError>;
}

impl<S: Strategy + ?Sized> Strategy for Box<S> {
    fn decide_entry(
        &mut self,
        bars: &[Bar],
        equity: f64,
        positions: &[Position],
    ) -> Result<Option<OrderSpec>, BarwiseError> {
        (**self).decide_entry(bars, equity, positions)
    }

    fn decide_exit(
        &mut self,
        bars: &[Bar],
        equity: f64,
        position: &Position,
    ) -> Result<Option<ExitDecision>, BarwiseError> {
        (**self).decide_exit(bars, equity, position)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MaCrossConfig {
    pub symbol: String,
    pub fast_period: usize,
    pub slow_period: usize,
    /// Fraction of equity committed per entry, in (0, 1].
    pub position_size: f64,
    /// Percent distance from entry; 0 disables.
    pub stop_loss_pct: f64,
    pub take_profit_pct: f64,
    pub max_positions: usize,
    pub allow_shorting: bool,
}

impl Default for MaCrossConfig {
    fn default() -> Self {
        MaCrossConfig {
            symbol: String::new(),
            fast_period: 5,
            slow_period: 20,
            position_size: 0.1,
            stop_loss_pct: 0.0,
            take_profit_pct: 0.0,
            max_positions: 1,
            allow_shorting: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Cross {
    Above,
    Below,
}

/// Enters on a fast/slow SMA crossover and exits through its exit rules or
/// on the opposite crossover.
///
/// The averages come from the bulk path of a [`FeatureEngine`] run over the
/// window, so they match whatever the streaming path would produce.
pub struct MaCrossStrategy {
    config: MaCrossConfig,
    engine: FeatureEngine<SpecFeatureLogic>,
    fast_name: String,
    slow_name: String,
    exit_rules: Vec<Box<dyn ExitRule>>,
}

impl MaCrossStrategy {
    pub fn new(config: MaCrossConfig) -> Result<Self, BarwiseError> {
        if config.fast_period == 0 || config.fast_period >= config.slow_period {
            return Err(BarwiseError::UnsupportedConfig {
                reason: format!(
                    "fast period {} must be positive and below slow period {}",
                    config.fast_period, config.slow_period
                ),
            });
        }
        if !(config.position_size > 0.0 && config.position_size <= 1.0) {
            return Err(BarwiseError::UnsupportedConfig {
                reason: format!("position size {} outside (0, 1]", config.position_size),
            });
        }

        let fast = FeatureSpec::Sma(config.fast_period);
        let slow = FeatureSpec::Sma(config.slow_period);
        let fast_name = fast.column_name();
        let slow_name = slow.column_name();
        let engine = FeatureEngine::new(SpecFeatureLogic::new(vec![fast, slow])?, None)?;

        Ok(MaCrossStrategy {
            config,
            engine,
            fast_name,
            slow_name,
            exit_rules: Vec::new(),
        })
    }

    pub fn with_exit_rule(mut self, rule: impl ExitRule + 'static) -> Self {
        self.exit_rules.push(Box::new(rule));
        self
    }

    pub fn config(&self) -> &MaCrossConfig {
        &self.config
    }

    /// Bars needed before a crossover can be detected.
    pub fn min_bars(&self) -> usize {
        self.config.slow_period + 1
    }

    fn crossover(&self, bars: &[Bar]) -> Result<Option<Cross>, BarwiseError> {
        if bars.len() < self.min_bars() {
            return Ok(None);
        }
        let rows: Vec<RawBar> = bars[bars.len() - self.min_bars()..]
            .iter()
            .map(RawBar::from)
            .collect();
        let vectors = self.engine.compute_bulk(&rows)?;
        let [.., prev, curr] = vectors.as_slice() else {
            return Ok(None);
        };

        let read = |v: &FeatureVector| {
            Some((v.get(&self.fast_name)?, v.get(&self.slow_name)?))
        };
        let (Some((prev_fast, prev_slow)), Some((fast, slow))) = (read(prev), read(curr)) else {
            return Ok(None);
        };

        Ok(if prev_fast <= prev_slow && fast > slow {
            Some(Cross::Above)
        } else if prev_fast >= prev_slow && fast < slow {
            Some(Cross::Below)
        } else {
            None
        })
    }

    fn level(&self, side: Side, price: f64, pct: f64, toward_profit: bool) -> f64 {
        if pct <= 0.0 {
            return 0.0;
        }
        let sign = (if toward_profit { 1.0 } else { -1.0 }) * side.direction();
        price * (1.0 + sign * pct / 100.0)
    }
}

impl Strategy for MaCrossStrategy {
    fn decide_entry(
        &mut self,
        bars: &[Bar],
        equity: f64,
        positions: &[Position],
    ) -> Result<Option<OrderSpec>, BarwiseError> {
        if positions.len() >= self.config.max_positions {
            return Ok(None);
        }
        let side = match self.crossover(bars)? {
            Some(Cross::Above) => Side::Long,
            Some(Cross::Below) if self.config.allow_shorting => Side::Short,
            _ => return Ok(None),
        };
        let Some(last) = bars.last() else {
            return Ok(None);
        };

        let price = last.close;
        let volume = equity * self.config.position_size / price;
        if !volume.is_finite() || volume <= 0.0 {
            return Ok(None);
        }

        Ok(Some(OrderSpec {
            symbol: self.config.symbol.clone(),
            side,
            volume,
            entry_price: None,
            sl: self.level(side, price, self.config.stop_loss_pct, false),
            tp: self.level(side, price, self.config.take_profit_pct, true),
            comment: format!(
                "sma{} crossed {} sma{}",
                self.config.fast_period,
                if side == Side::Long { "above" } else { "below" },
                self.config.slow_period
            ),
        }))
    }

    fn decide_exit(
        &mut self,
        bars: &[Bar],
        _equity: f64,
        position: &Position,
    ) -> Result<Option<ExitDecision>, BarwiseError> {
        for rule in &self.exit_rules {
            if let Some(decision) = rule.decide(bars, position) {
                if !decision.is_hold() {
                    return Ok(Some(decision));
                }
            }
        }
        let reversed = matches!(
            (position.side, self.crossover(bars)?),
            (Side::Long, Some(Cross::Below)) | (Side::Short, Some(Cross::Above))
        );
        Ok(reversed.then(|| ExitDecision::close("opposite crossover")))
    }
}
