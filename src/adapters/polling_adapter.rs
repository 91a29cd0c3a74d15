//! Polling bar source over a pluggable rate provider.
//!
//! The feed owns the provider connection: it connects on construction and
//! disconnects once a historical range is exhausted or when dropped.

use chrono::{NaiveDateTime, Utc};
use std::collections::VecDeque;
use std::thread;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::domain::bar::Bar;
use crate::domain::error::BarwiseError;
use crate::domain::timeframe::Timeframe;
use crate::ports::bar_source::BarSource;

/// A terminal or market-data service that serves closed bars by time range.
///
/// Errors are reported as plain strings; the feed maps them to
/// [`BarwiseError::BackendUnavailable`].
pub trait RateProvider {
    fn connect(&mut self) -> Result<(), String>;
    fn disconnect(&mut self);
    /// Bars with `from <= time <= to`, oldest first.
    fn copy_rates_range(
        &mut self,
        symbol: &str,
        timeframe: Timeframe,
        from: NaiveDateTime,
        to: NaiveDateTime,
    ) -> Result<Vec<Bar>, String>;
}

fn unavailable(what: &str, reason: String) -> BarwiseError {
    BarwiseError::BackendUnavailable {
        reason: format!("{what}: {reason}"),
    }
}

/// One-shot historical fetch: connect, copy the range, disconnect.
///
/// An empty result is an error, since a range request that returns nothing
/// usually means the symbol or timeframe is unknown to the provider.
pub fn fetch_range<P: RateProvider>(
    provider: &mut P,
    symbol: &str,
    timeframe: Timeframe,
    from: NaiveDateTime,
    to: NaiveDateTime,
) -> Result<Vec<Bar>, BarwiseError> {
    provider.connect().map_err(|e| unavailable("connect", e))?;
    let result = provider.copy_rates_range(symbol, timeframe, from, to);
    provider.disconnect();

    let bars = result.map_err(|e| unavailable("copy_rates_range", e))?;
    if bars.is_empty() {
        return Err(BarwiseError::BackendUnavailable {
            reason: format!("no data returned for {symbol} {timeframe}"),
        });
    }
    Ok(bars)
}

#[derive(Debug, Clone)]
pub struct PollingConfig {
    pub symbol: String,
    pub timeframe: Timeframe,
    pub start: NaiveDateTime,
    /// `None` selects live mode.
    pub end: Option<NaiveDateTime>,
    pub poll_interval: Duration,
}

/// Historical mode (an `end` is set) replays the initial range and then
/// returns `None`. Live mode replays the initial range as warm-up and then
/// blocks, polling `last_time..now` until a newer bar appears.
pub struct PollingFeed<P: RateProvider> {
    provider: P,
    config: PollingConfig,
    buffer: VecDeque<Bar>,
    last_time: Option<NaiveDateTime>,
    connected: bool,
}

impl<P: RateProvider> PollingFeed<P> {
    pub fn new(mut provider: P, config: PollingConfig) -> Result<Self, BarwiseError> {
        provider.connect().map_err(|e| unavailable("connect", e))?;
        let mut feed = PollingFeed {
            provider,
            config,
            buffer: VecDeque::new(),
            last_time: None,
            connected: true,
        };

        let to = feed.config.end.unwrap_or_else(|| Utc::now().naive_utc());
        let initial = feed
            .provider
            .copy_rates_range(&feed.config.symbol, feed.config.timeframe, feed.config.start, to)
            .map_err(|e| unavailable("copy_rates_range", e))?;
        info!(
            symbol = %feed.config.symbol,
            timeframe = %feed.config.timeframe,
            bars = initial.len(),
            live = feed.is_live(),
            "initial fetch"
        );
        feed.accept(initial);
        Ok(feed)
    }

    pub fn is_live(&self) -> bool {
        self.config.end.is_none()
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    pub fn last_time(&self) -> Option<NaiveDateTime> {
        self.last_time
    }

    /// Buffer bars strictly newer than the last one seen.
    fn accept(&mut self, bars: Vec<Bar>) -> usize {
        let mut added = 0;
        for bar in bars {
            if self.last_time.is_some_and(|last| bar.time <= last) {
                continue;
            }
            self.last_time = Some(bar.time);
            self.buffer.push_back(bar);
            added += 1;
        }
        added
    }

    /// Ask the provider for bars since the last one seen. Returns how many
    /// new bars were buffered.
    pub fn poll(&mut self) -> Result<usize, BarwiseError> {
        let from = self.last_time.unwrap_or(self.config.start);
        let now = Utc::now().naive_utc() + chrono::Duration::seconds(1);
        let bars = self
            .provider
            .copy_rates_range(&self.config.symbol, self.config.timeframe, from, now)
            .map_err(|e| unavailable("copy_rates_range", e))
            .inspect_err(|e| warn!(error = %e, "poll failed"))?;
        let added = self.accept(bars);
        debug!(symbol = %self.config.symbol, added, "polled");
        Ok(added)
    }

    fn release(&mut self) {
        if self.connected {
            self.provider.disconnect();
            self.connected = false;
            debug!(symbol = %self.config.symbol, "disconnected");
        }
    }
}

impl<P: RateProvider> BarSource for PollingFeed<P> {
    fn next_bar(&mut self) -> Result<Option<Bar>, BarwiseError> {
        if let Some(bar) = self.buffer.pop_front() {
            return Ok(Some(bar));
        }
        if !self.is_live() {
            self.release();
            return Ok(None);
        }
        loop {
            if self.poll()? > 0 {
                return Ok(self.buffer.pop_front());
            }
            thread::sleep(self.config.poll_interval);
        }
    }
}

impl<P: RateProvider> Drop for PollingFeed<P> {
    fn drop(&mut self) {
        self.release();
    }
}
