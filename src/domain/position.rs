//! Positions, order proposals and exit decisions.

use chrono::NaiveDateTime;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Side {
    Long,
    Short,
    Flat,
}

impl Side {
    /// +1 for long, -1 for short, 0 for flat.
    pub fn direction(self) -> f64 {
        match self {
            Side::Long => 1.0,
            Side::Short => -1.0,
            Side::Flat => 0.0,
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Long => f.write_str("long"),
            Side::Short => f.write_str("short"),
            Side::Flat => f.write_str("flat"),
        }
    }
}

/// An open (or just closed) position, owned by the execution backend.
///
/// A stop-loss or take-profit of `0.0` means the level is not set.
#[derive(Debug, Clone, PartialEq)]
pub struct Position {
    pub symbol: String,
    pub side: Side,
    pub volume: f64,
    pub entry_price: f64,
    pub sl: f64,
    pub tp: f64,
    pub open_time: NaiveDateTime,
    pub close_price: Option<f64>,
    pub close_time: Option<NaiveDateTime>,
    pub id: Option<u64>,
}

impl Position {
    pub fn is_long(&self) -> bool {
        self.side == Side::Long
    }

    pub fn is_short(&self) -> bool {
        self.side == Side::Short
    }

    pub fn unrealized_pnl(&self, price: f64) -> f64 {
        self.side.direction() * self.volume * (price - self.entry_price)
    }

    pub fn should_stop_loss(&self, price: f64) -> bool {
        if self.sl == 0.0 {
            return false;
        }
        match self.side {
            Side::Long => price <= self.sl,
            Side::Short => price >= self.sl,
            Side::Flat => false,
        }
    }

    pub fn should_take_profit(&self, price: f64) -> bool {
        if self.tp == 0.0 {
            return false;
        }
        match self.side {
            Side::Long => price >= self.tp,
            Side::Short => price <= self.tp,
            Side::Flat => false,
        }
    }
}

/// A proposed new position. `entry_price` of `None` is a market order.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderSpec {
    pub symbol: String,
    pub side: Side,
    pub volume: f64,
    pub entry_price: Option<f64>,
    pub sl: f64,
    pub tp: f64,
    pub comment: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExitAction {
    #[default]
    Hold,
    Close,
    UpdateSlTp,
    PartialClose,
}

impl fmt::Display for ExitAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExitAction::Hold => f.write_str("hold"),
            ExitAction::Close => f.write_str("close"),
            ExitAction::UpdateSlTp => f.write_str("update_sl_tp"),
            ExitAction::PartialClose => f.write_str("partial_close"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct ExitDecision {
    pub action: ExitAction,
    pub new_sl: Option<f64>,
    pub new_tp: Option<f64>,
    pub close_volume: Option<f64>,
    pub reason: String,
}

impl ExitDecision {
    pub fn hold() -> Self {
        ExitDecision::default()
    }

    pub fn close(reason: impl Into<String>) -> Self {
        ExitDecision {
            action: ExitAction::Close,
            reason: reason.into(),
            ..ExitDecision::default()
        }
    }

    pub fn update_sl_tp(
        new_sl: Option<f64>,
        new_tp: Option<f64>,
        reason: impl Into<String>,
    ) -> Self {
        ExitDecision {
            action: ExitAction::UpdateSlTp,
            new_sl,
            new_tp,
            reason: reason.into(),
            ..ExitDecision::default()
        }
    }

    pub fn partial_close(volume: f64, reason: impl Into<String>) -> Self {
        ExitDecision {
            action: ExitAction::PartialClose,
            close_volume: Some(volume),
            reason: reason.into(),
            ..ExitDecision::default()
        }
    }

    pub fn is_hold(&self) -> bool {
        self.action == ExitAction::Hold
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClosedTrade {
    pub symbol: String,
    pub side: Side,
    pub volume: f64,
    pub entry_price: f64,
    pub exit_price: f64,
    pub open_time: NaiveDateTime,
    pub close_time: NaiveDateTime,
    pub pnl: f64,
    pub position_id: Option<u64>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn open_time() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, 15)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
    }

    fn sample_long_position() -> Position {
        Position {
            symbol: "GBPJPY".into(),
            side: Side::Long,
            volume: 100.0,
            entry_price: 50.0,
            sl: 45.0,
            tp: 60.0,
            open_time: open_time(),
            close_price: None,
            close_time: None,
            id: Some(1),
        }
    }

    fn sample_short_position() -> Position {
        Position {
            side: Side::Short,
            entry_price: 100.0,
            sl: 110.0,
            tp: 80.0,
            ..sample_long_position()
        }
    }

    #[test]
    fn side_direction() {
        assert_eq!(Side::Long.direction(), 1.0);
        assert_eq!(Side::Short.direction(), -1.0);
        assert_eq!(Side::Flat.direction(), 0.0);
    }

    #[test]
    fn unrealized_pnl_long_profit() {
        let pos = sample_long_position();
        assert!((pos.unrealized_pnl(55.0) - 500.0).abs() < f64::EPSILON);
    }

    #[test]
    fn unrealized_pnl_short_profit() {
        let pos = sample_short_position();
        assert!((pos.unrealized_pnl(90.0) - 1000.0).abs() < f64::EPSILON);
    }

    #[test]
    fn unrealized_pnl_short_loss() {
        let pos = sample_short_position();
        assert!((pos.unrealized_pnl(110.0) - (-1000.0)).abs() < f64::EPSILON);
    }

    #[test]
    fn stop_loss_long_triggered() {
        let pos = sample_long_position();
        assert!(pos.should_stop_loss(44.0));
        assert!(pos.should_stop_loss(45.0));
        assert!(!pos.should_stop_loss(46.0));
    }

    #[test]
    fn stop_loss_short_triggered() {
        let pos = sample_short_position();
        assert!(pos.should_stop_loss(111.0));
        assert!(pos.should_stop_loss(110.0));
        assert!(!pos.should_stop_loss(109.0));
    }

    #[test]
    fn stop_loss_disabled() {
        let mut pos = sample_long_position();
        pos.sl = 0.0;
        assert!(!pos.should_stop_loss(0.0));
        assert!(!pos.should_stop_loss(1000000.0));
    }

    #[test]
    fn take_profit_both_sides() {
        let long = sample_long_position();
        assert!(long.should_take_profit(60.0));
        assert!(!long.should_take_profit(59.0));

        let short = sample_short_position();
        assert!(short.should_take_profit(80.0));
        assert!(!short.should_take_profit(81.0));
    }

    #[test]
    fn exit_decision_constructors() {
        assert!(ExitDecision::hold().is_hold());

        let close = ExitDecision::close("tp hit");
        assert_eq!(close.action, ExitAction::Close);
        assert_eq!(close.reason, "tp hit");

        let partial = ExitDecision::partial_close(0.5, "scale out");
        assert_eq!(partial.action, ExitAction::PartialClose);
        assert_eq!(partial.close_volume, Some(0.5));

        let update = ExitDecision::update_sl_tp(Some(49.0), None, "trail");
        assert_eq!(update.new_sl, Some(49.0));
        assert_eq!(update.new_tp, None);
    }

    #[test]
    fn exit_action_display() {
        assert_eq!(ExitAction::UpdateSlTp.to_string(), "update_sl_tp");
        assert_eq!(ExitAction::PartialClose.to_string(), "partial_close");
    }
}
