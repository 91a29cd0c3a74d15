//! In-memory simulated execution backend.

use tracing::{debug, info};

use crate::domain::bar::Bar;
use crate::domain::error::BarwiseError;
use crate::domain::execution::{
    calculate_commission, entry_fill_price, exit_fill_price, price_pnl, ExecutionConfig,
};
use crate::domain::position::{ClosedTrade, ExitAction, ExitDecision, OrderSpec, Position, Side};
use crate::ports::execution_port::ExecutionPort;

#[derive(Debug, Clone)]
struct OpenPosition {
    position: Position,
    /// Entry commission not yet attributed to a closed trade.
    entry_commission: f64,
}

/// Fills orders against the bar they were decided on.
///
/// Market orders fill at the bar close with slippage, limit orders at their
/// own price. Equity is the realized balance: commissions are charged when
/// paid and price PnL is booked when a position is closed.
#[derive(Debug, Clone)]
pub struct PaperBroker {
    config: ExecutionConfig,
    initial_balance: f64,
    balance: f64,
    open: Vec<OpenPosition>,
    closed: Vec<ClosedTrade>,
    next_id: u64,
}

impl PaperBroker {
    pub fn new(initial_balance: f64, config: ExecutionConfig) -> Self {
        PaperBroker {
            config,
            initial_balance,
            balance: initial_balance,
            open: Vec::new(),
            closed: Vec::new(),
            next_id: 1,
        }
    }

    pub fn initial_balance(&self) -> f64 {
        self.initial_balance
    }

    pub fn balance(&self) -> f64 {
        self.balance
    }

    pub fn closed_trades(&self) -> &[ClosedTrade] {
        &self.closed
    }

    pub fn open_count(&self) -> usize {
        self.open.len()
    }

    /// Balance plus price PnL of every open position at `price`.
    pub fn mark_to_market(&self, price: f64) -> f64 {
        self.balance
            + self
                .open
                .iter()
                .map(|o| o.position.unrealized_pnl(price))
                .sum::<f64>()
    }

    fn find(&self, position: &Position) -> Result<usize, BarwiseError> {
        let id = position.id.ok_or_else(|| BarwiseError::PositionNotFound {
            id: "<unassigned>".into(),
        })?;
        self.open
            .iter()
            .position(|o| o.position.id == Some(id))
            .ok_or(BarwiseError::PositionNotFound { id: id.to_string() })
    }

    /// Close `volume` units of the position at `index`, removing it when
    /// nothing remains.
    fn close_volume(&mut self, index: usize, volume: f64, bar: &Bar, reason: &str) {
        let open = &mut self.open[index];
        let side = open.position.side;
        let exit_price = exit_fill_price(side, bar.close, self.config.slippage_pct);
        let exit_commission = calculate_commission(volume * exit_price, &self.config);
        let share = volume / open.position.volume;
        let entry_commission = open.entry_commission * share;
        let gross = price_pnl(side, volume, open.position.entry_price, exit_price);

        self.balance += gross - exit_commission;
        self.closed.push(ClosedTrade {
            symbol: open.position.symbol.clone(),
            side,
            volume,
            entry_price: open.position.entry_price,
            exit_price,
            open_time: open.position.open_time,
            close_time: bar.time,
            pnl: gross - exit_commission - entry_commission,
            position_id: open.position.id,
        });
        info!(
            symbol = %open.position.symbol,
            side = %side,
            volume,
            price = exit_price,
            pnl = gross - exit_commission - entry_commission,
            reason,
            "closed"
        );

        open.entry_commission -= entry_commission;
        open.position.volume -= volume;
        if open.position.volume <= f64::EPSILON * volume.max(1.0) {
            self.open.remove(index);
        }
    }
}

impl ExecutionPort for PaperBroker {
    fn equity(&self) -> Result<f64, BarwiseError> {
        Ok(self.balance)
    }

    fn positions(&self, symbol: Option<&str>) -> Result<Vec<Position>, BarwiseError> {
        Ok(self
            .open
            .iter()
            .filter(|o| symbol.is_none_or(|s| o.position.symbol == s))
            .map(|o| o.position.clone())
            .collect())
    }

    fn execute_entry(&mut self, order: &OrderSpec, bar: &Bar) -> Result<(), BarwiseError> {
        if order.side == Side::Flat {
            return Err(BarwiseError::InvalidDecision {
                reason: "cannot open a flat position".into(),
            });
        }
        if !order.volume.is_finite() || order.volume <= 0.0 {
            return Err(BarwiseError::InvalidDecision {
                reason: format!("order volume {} must be positive", order.volume),
            });
        }

        let price = match order.entry_price {
            Some(limit) => limit,
            None => entry_fill_price(order.side, bar.close, self.config.slippage_pct),
        };
        let commission = calculate_commission(order.volume * price, &self.config);
        self.balance -= commission;

        let id = self.next_id;
        self.next_id += 1;
        self.open.push(OpenPosition {
            position: Position {
                symbol: order.symbol.clone(),
                side: order.side,
                volume: order.volume,
                entry_price: price,
                sl: order.sl,
                tp: order.tp,
                open_time: bar.time,
                close_price: None,
                close_time: None,
                id: Some(id),
            },
            entry_commission: commission,
        });
        info!(
            symbol = %order.symbol,
            side = %order.side,
            volume = order.volume,
            price,
            id,
            comment = %order.comment,
            "opened"
        );
        Ok(())
    }

    fn apply_exit_decision(
        &mut self,
        position: &Position,
        decision: &ExitDecision,
        bar: &Bar,
    ) -> Result<(), BarwiseError> {
        let index = self.find(position)?;
        match decision.action {
            ExitAction::Hold => {
                debug!(id = ?position.id, "hold");
                Ok(())
            }
            ExitAction::Close => {
                let volume = self.open[index].position.volume;
                self.close_volume(index, volume, bar, &decision.reason);
                Ok(())
            }
            ExitAction::PartialClose => {
                let held = self.open[index].position.volume;
                match decision.close_volume {
                    Some(v) if v.is_finite() && v > 0.0 => {
                        self.close_volume(index, v.min(held), bar, &decision.reason);
                        Ok(())
                    }
                    other => Err(BarwiseError::InvalidDecision {
                        reason: format!("partial close needs a positive volume, got {other:?}"),
                    }),
                }
            }
            ExitAction::UpdateSlTp => {
                if decision.new_sl.is_none() && decision.new_tp.is_none() {
                    return Err(BarwiseError::InvalidDecision {
                        reason: "update_sl_tp without new levels".into(),
                    });
                }
                let open = &mut self.open[index].position;
                if let Some(sl) = decision.new_sl {
                    open.sl = sl;
                }
                if let Some(tp) = decision.new_tp {
                    open.tp = tp;
                }
                info!(
                    id = ?open.id,
                    sl = open.sl,
                    tp = open.tp,
                    reason = %decision.reason,
                    "levels updated"
                );
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use chrono::NaiveDate;

    fn bar(hour: u32, close: f64) -> Bar {
        Bar {
            time: NaiveDate::from_ymd_opt(2024, 1, 1)
                .unwrap()
                .and_hms_opt(hour, 0, 0)
                .unwrap(),
            open: close,
            high: close,
            low: close,
            close,
            spread: 0.0,
            tick_volume: 0.0,
            real_volume: None,
        }
    }

    fn order(side: Side, volume: f64) -> OrderSpec {
        OrderSpec {
            symbol: "EURUSD".into(),
            side,
            volume,
            entry_price: None,
            sl: 0.0,
            tp: 0.0,
            comment: String::new(),
        }
    }

    fn free_broker() -> PaperBroker {
        PaperBroker::new(10_000.0, ExecutionConfig::default())
    }

    #[test]
    fn market_entry_fills_at_close() {
        let mut broker = free_broker();
        broker.execute_entry(&order(Side::Long, 10.0), &bar(0, 100.0)).unwrap();
        let positions = broker.positions(Some("EURUSD")).unwrap();
        assert_eq!(positions.len(), 1);
        assert_eq!(positions[0].entry_price, 100.0);
        assert_eq!(positions[0].id, Some(1));
        assert_eq!(broker.equity().unwrap(), 10_000.0);
    }

    #[test]
    fn limit_entry_fills_at_limit() {
        let mut broker = free_broker();
        let mut o = order(Side::Short, 1.0);
        o.entry_price = Some(105.0);
        broker.execute_entry(&o, &bar(0, 100.0)).unwrap();
        assert_eq!(broker.position("EURUSD").unwrap().unwrap().entry_price, 105.0);
    }

    #[test]
    fn positions_filter_by_symbol() {
        let mut broker = free_broker();
        broker.execute_entry(&order(Side::Long, 1.0), &bar(0, 100.0)).unwrap();
        let mut other = order(Side::Long, 1.0);
        other.symbol = "GBPUSD".into();
        broker.execute_entry(&other, &bar(0, 100.0)).unwrap();
        assert_eq!(broker.positions(None).unwrap().len(), 2);
        assert_eq!(broker.positions(Some("GBPUSD")).unwrap().len(), 1);
        assert!(broker.position("USDJPY").unwrap().is_none());
    }

    #[test]
    fn close_realizes_pnl_into_equity() {
        let mut broker = free_broker();
        broker.execute_entry(&order(Side::Long, 10.0), &bar(0, 100.0)).unwrap();
        let p = broker.position("EURUSD").unwrap().unwrap();
        broker
            .apply_exit_decision(&p, &ExitDecision::close("target"), &bar(1, 150.0))
            .unwrap();
        assert_eq!(broker.equity().unwrap(), 10_500.0);
        assert_eq!(broker.open_count(), 0);
        let trade = &broker.closed_trades()[0];
        assert_eq!(trade.pnl, 500.0);
        assert_eq!(trade.position_id, Some(1));
    }

    #[test]
    fn short_close_with_costs() {
        let config = ExecutionConfig {
            commission_per_trade: 1.0,
            commission_pct: 0.0,
            slippage_pct: 0.0,
        };
        let mut broker = PaperBroker::new(1_000.0, config);
        broker.execute_entry(&order(Side::Short, 2.0), &bar(0, 100.0)).unwrap();
        assert_eq!(broker.equity().unwrap(), 999.0);
        let p = broker.position("EURUSD").unwrap().unwrap();
        broker
            .apply_exit_decision(&p, &ExitDecision::close("x"), &bar(1, 90.0))
            .unwrap();
        // +20 price, -1 exit commission
        assert_relative_eq!(broker.equity().unwrap(), 1_018.0);
        assert_relative_eq!(broker.closed_trades()[0].pnl, 18.0);
    }

    #[test]
    fn partial_close_keeps_remainder() {
        let mut broker = free_broker();
        broker.execute_entry(&order(Side::Long, 10.0), &bar(0, 100.0)).unwrap();
        let p = broker.position("EURUSD").unwrap().unwrap();
        broker
            .apply_exit_decision(&p, &ExitDecision::partial_close(4.0, "scale out"), &bar(1, 110.0))
            .unwrap();
        let remaining = broker.position("EURUSD").unwrap().unwrap();
        assert_relative_eq!(remaining.volume, 6.0);
        assert_relative_eq!(broker.equity().unwrap(), 10_040.0);
    }

    #[test]
    fn partial_close_without_volume_is_invalid() {
        let mut broker = free_broker();
        broker.execute_entry(&order(Side::Long, 10.0), &bar(0, 100.0)).unwrap();
        let p = broker.position("EURUSD").unwrap().unwrap();
        let decision = ExitDecision {
            action: ExitAction::PartialClose,
            ..Default::default()
        };
        let err = broker.apply_exit_decision(&p, &decision, &bar(1, 100.0)).unwrap_err();
        assert!(matches!(err, BarwiseError::InvalidDecision { .. }));
    }

    #[test]
    fn update_sl_tp_sets_levels() {
        let mut broker = free_broker();
        broker.execute_entry(&order(Side::Long, 1.0), &bar(0, 100.0)).unwrap();
        let p = broker.position("EURUSD").unwrap().unwrap();
        broker
            .apply_exit_decision(
                &p,
                &ExitDecision::update_sl_tp(Some(95.0), None, "trail"),
                &bar(1, 100.0),
            )
            .unwrap();
        let updated = broker.position("EURUSD").unwrap().unwrap();
        assert_eq!(updated.sl, 95.0);
        assert_eq!(updated.tp, 0.0);
    }

    #[test]
    fn unknown_position_is_reported() {
        let mut broker = free_broker();
        broker.execute_entry(&order(Side::Long, 1.0), &bar(0, 100.0)).unwrap();
        let mut p = broker.position("EURUSD").unwrap().unwrap();
        p.id = Some(99);
        let err = broker
            .apply_exit_decision(&p, &ExitDecision::close("x"), &bar(1, 100.0))
            .unwrap_err();
        assert!(matches!(err, BarwiseError::PositionNotFound { .. }));
    }

    #[test]
    fn rejects_bad_orders() {
        let mut broker = free_broker();
        assert!(broker.execute_entry(&order(Side::Flat, 1.0), &bar(0, 100.0)).is_err());
        assert!(broker.execute_entry(&order(Side::Long, 0.0), &bar(0, 100.0)).is_err());
        assert_eq!(broker.open_count(), 0);
    }

    #[test]
    fn mark_to_market_includes_open_pnl() {
        let mut broker = free_broker();
        broker.execute_entry(&order(Side::Long, 10.0), &bar(0, 100.0)).unwrap();
        assert_eq!(broker.mark_to_market(101.0), 10_010.0);
        assert_eq!(broker.equity().unwrap(), 10_000.0);
    }
}
