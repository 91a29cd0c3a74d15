//! Fill simulation: slippage, commissions and realized PnL.

use super::position::Side;

/// Cost model applied by simulated execution backends.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ExecutionConfig {
    pub commission_per_trade: f64,
    pub commission_pct: f64,
    pub slippage_pct: f64,
}

/// Calculate commission: flat_fee + (trade_value * pct / 100).
pub fn calculate_commission(trade_value: f64, config: &ExecutionConfig) -> f64 {
    config.commission_per_trade + (trade_value * config.commission_pct / 100.0)
}

/// Price paid when opening `side`: buys fill higher, sells lower.
pub fn entry_fill_price(side: Side, market_price: f64, slippage_pct: f64) -> f64 {
    market_price * (1.0 + side.direction() * slippage_pct / 100.0)
}

/// Price received when closing `side`: long exits sell lower, short exits
/// buy back higher.
pub fn exit_fill_price(side: Side, market_price: f64, slippage_pct: f64) -> f64 {
    market_price * (1.0 - side.direction() * slippage_pct / 100.0)
}

/// Price PnL of closing `volume` units, before commissions.
pub fn price_pnl(side: Side, volume: f64, entry_price: f64, exit_price: f64) -> f64 {
    side.direction() * volume * (exit_price - entry_price)
}
