//! Configuration validation and typed settings.
//!
//! Every value is checked before a run starts; the first invalid key is
//! reported.

use std::path::PathBuf;

use crate::domain::error::BarwiseError;
use crate::domain::execution::ExecutionConfig;
use crate::domain::feature::{FeatureLogic, SpecFeatureLogic};
use crate::domain::strategy::MaCrossConfig;
use crate::domain::timeframe::Timeframe;
use crate::ports::config_port::ConfigPort;

pub const DEFAULT_WINDOW_SIZE: usize = 50;
pub const DEFAULT_INITIAL_BALANCE: f64 = 10_000.0;

#[derive(Debug, Clone, PartialEq)]
pub struct FeedSettings {
    pub symbol: String,
    pub timeframe: Timeframe,
    pub data: Option<PathBuf>,
    pub limit: Option<usize>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FeatureSettings {
    pub logic: SpecFeatureLogic,
    pub window: Option<usize>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BrokerSettings {
    pub initial_balance: f64,
    pub execution: ExecutionConfig,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub feed: FeedSettings,
    pub window_size: usize,
    /// Absent when the file has no `[features] columns`.
    pub features: Option<FeatureSettings>,
    pub strategy: MaCrossConfig,
    pub trailing_stop_pct: f64,
    pub broker: BrokerSettings,
}

/// Validate the whole file and build typed settings from it.
pub fn load_settings(config: &dyn ConfigPort) -> Result<Settings, BarwiseError> {
    let feed = load_feed(config)?;
    let window_size = load_window_size(config)?;
    let features = load_features(config)?;
    let (strategy, trailing_stop_pct) = load_strategy(config, &feed.symbol)?;
    let broker = load_broker(config)?;

    if window_size <= strategy.slow_period {
        return Err(invalid(
            "loop",
            "window_size",
            format!(
                "window_size must exceed slow_period ({})",
                strategy.slow_period
            ),
        ));
    }

    Ok(Settings {
        feed,
        window_size,
        features,
        strategy,
        trailing_stop_pct,
        broker,
    })
}

pub fn validate_config(config: &dyn ConfigPort) -> Result<(), BarwiseError> {
    load_settings(config).map(|_| ())
}

fn invalid(section: &str, key: &str, reason: impl Into<String>) -> BarwiseError {
    BarwiseError::ConfigInvalid {
        section: section.to_string(),
        key: key.to_string(),
        reason: reason.into(),
    }
}

fn missing(section: &str, key: &str) -> BarwiseError {
    BarwiseError::ConfigMissing {
        section: section.to_string(),
        key: key.to_string(),
    }
}

fn required_string(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
) -> Result<String, BarwiseError> {
    match config.get_string(section, key) {
        Some(s) if !s.trim().is_empty() => Ok(s.trim().to_string()),
        _ => Err(missing(section, key)),
    }
}

/// A present value that does not parse is an error rather than the default.
/// `inf` and `NaN` parse as floats but are rejected.
fn double(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
    default: f64,
) -> Result<f64, BarwiseError> {
    if let Some(raw) = config.get_string(section, key) {
        match raw.trim().parse::<f64>() {
            Ok(v) if v.is_finite() => {}
            Ok(_) => return Err(invalid(section, key, format!("{raw:?} is not finite"))),
            Err(_) => return Err(invalid(section, key, format!("{raw:?} is not a number"))),
        }
    }
    Ok(config.get_double(section, key, default))
}

fn boolean(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
    default: bool,
) -> Result<bool, BarwiseError> {
    if let Some(raw) = config.get_string(section, key) {
        let known = matches!(
            raw.trim().to_lowercase().as_str(),
            "true" | "yes" | "1" | "false" | "no" | "0"
        );
        if !known {
            return Err(invalid(section, key, format!("{raw:?} is not a boolean")));
        }
    }
    Ok(config.get_bool(section, key, default))
}

fn int(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
    default: i64,
) -> Result<i64, BarwiseError> {
    if let Some(raw) = config.get_string(section, key) {
        if raw.trim().parse::<i64>().is_err() {
            return Err(invalid(section, key, format!("{raw:?} is not an integer")));
        }
    }
    Ok(config.get_int(section, key, default))
}

fn positive_int(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
    default: i64,
) -> Result<usize, BarwiseError> {
    let value = int(config, section, key, default)?;
    if value < 1 {
        return Err(invalid(section, key, format!("{key} must be at least 1")));
    }
    Ok(value as usize)
}

fn optional_positive_int(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
) -> Result<Option<usize>, BarwiseError> {
    match config.get_string(section, key) {
        Some(raw) if !raw.trim().is_empty() => positive_int(config, section, key, 0).map(Some),
        _ => Ok(None),
    }
}

fn non_negative(config: &dyn ConfigPort, section: &str, key: &str) -> Result<f64, BarwiseError> {
    let value = double(config, section, key, 0.0)?;
    if value < 0.0 {
        return Err(invalid(section, key, format!("{key} must be non-negative")));
    }
    Ok(value)
}

fn load_feed(config: &dyn ConfigPort) -> Result<FeedSettings, BarwiseError> {
    let symbol = required_string(config, "feed", "symbol")?;
    let timeframe: Timeframe = required_string(config, "feed", "timeframe")?.parse()?;
    let data = config
        .get_string("feed", "data")
        .filter(|s| !s.trim().is_empty())
        .map(|s| PathBuf::from(s.trim()));
    let limit = optional_positive_int(config, "feed", "limit")?;
    Ok(FeedSettings {
        symbol,
        timeframe,
        data,
        limit,
    })
}

fn load_window_size(config: &dyn ConfigPort) -> Result<usize, BarwiseError> {
    positive_int(config, "loop", "window_size", DEFAULT_WINDOW_SIZE as i64)
}

fn load_features(config: &dyn ConfigPort) -> Result<Option<FeatureSettings>, BarwiseError> {
    let Some(columns) = config
        .get_string("features", "columns")
        .filter(|s| !s.trim().is_empty())
    else {
        return Ok(None);
    };
    let logic = SpecFeatureLogic::parse(&columns)?;
    let window = optional_positive_int(config, "features", "window")?;
    if let Some(w) = window {
        if w < logic.min_bars() {
            return Err(invalid(
                "features",
                "window",
                format!(
                    "window {} is shorter than the {} bars the columns need",
                    w,
                    logic.min_bars()
                ),
            ));
        }
    }
    Ok(Some(FeatureSettings { logic, window }))
}

fn load_strategy(
    config: &dyn ConfigPort,
    symbol: &str,
) -> Result<(MaCrossConfig, f64), BarwiseError> {
    let defaults = MaCrossConfig::default();
    let fast_period = positive_int(config, "strategy", "fast_period", defaults.fast_period as i64)?;
    let slow_period = positive_int(config, "strategy", "slow_period", defaults.slow_period as i64)?;
    if slow_period <= fast_period {
        return Err(invalid(
            "strategy",
            "slow_period",
            "slow_period must be greater than fast_period",
        ));
    }

    let position_size = double(config, "strategy", "position_size", defaults.position_size)?;
    if position_size <= 0.0 || position_size > 1.0 {
        return Err(invalid(
            "strategy",
            "position_size",
            "position_size must be between 0 and 1",
        ));
    }

    let stop_loss_pct = non_negative(config, "strategy", "stop_loss")?;
    let take_profit_pct = non_negative(config, "strategy", "take_profit")?;
    let trailing_stop_pct = non_negative(config, "strategy", "trailing_stop")?;
    let max_positions = positive_int(
        config,
        "strategy",
        "max_positions",
        defaults.max_positions as i64,
    )?;
    let allow_shorting = boolean(config, "strategy", "allow_shorting", defaults.allow_shorting)?;

    Ok((
        MaCrossConfig {
            symbol: symbol.to_string(),
            fast_period,
            slow_period,
            position_size,
            stop_loss_pct,
            take_profit_pct,
            max_positions,
            allow_shorting,
        },
        trailing_stop_pct,
    ))
}

fn load_broker(config: &dyn ConfigPort) -> Result<BrokerSettings, BarwiseError> {
    let initial_balance = double(config, "broker", "initial_balance", DEFAULT_INITIAL_BALANCE)?;
    if initial_balance <= 0.0 {
        return Err(invalid(
            "broker",
            "initial_balance",
            "initial_balance must be positive",
        ));
    }
    Ok(BrokerSettings {
        initial_balance,
        execution: ExecutionConfig {
            commission_per_trade: non_negative(config, "broker", "commission_per_trade")?,
            commission_pct: non_negative(config, "broker", "commission_pct")?,
            slippage_pct: non_negative(config, "broker", "slippage_pct")?,
        },
    })
}
