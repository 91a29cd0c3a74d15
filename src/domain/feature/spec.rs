//! Textual feature specs and the logic built from them.
//!
//! Grammar (case-insensitive, comma separated):
//!
//! ```text
//! specs   := spec ("," spec)*
//! spec    := base | func "(" integer ")"
//! base    := open | high | low | close | spread | tick_volume | real_volume
//! func    := sma | ema | lag | stddev | roc | atr | rsi
//! ```

use std::fmt;

use crate::domain::error::{BarwiseError, ParseError};

use super::table::{FeatureTable, BASE_COLUMNS};
use super::{ops, FeatureLogic};

/// Largest period accepted by the parser.
pub const MAX_PERIOD: usize = 100_000;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum FeatureSpec {
    /// One of the table's base columns, passed through unchanged.
    Base(&'static str),
    Sma(usize),
    Ema(usize),
    Lag(usize),
    Stddev(usize),
    Roc(usize),
    Atr(usize),
    Rsi(usize),
}

impl FeatureSpec {
    /// Name of the column this spec produces.
    pub fn column_name(&self) -> String {
        match self {
            FeatureSpec::Base(name) => name.to_string(),
            FeatureSpec::Sma(n) => format!("sma{n}"),
            FeatureSpec::Ema(n) => format!("ema{n}"),
            FeatureSpec::Lag(k) => format!("lag{k}"),
            FeatureSpec::Stddev(n) => format!("stddev{n}"),
            FeatureSpec::Roc(n) => format!("roc{n}"),
            FeatureSpec::Atr(n) => format!("atr{n}"),
            FeatureSpec::Rsi(n) => format!("rsi{n}"),
        }
    }

    /// Rows needed before the first value appears.
    pub fn lookback(&self) -> usize {
        match self {
            FeatureSpec::Base(_) => 1,
            FeatureSpec::Sma(n)
            | FeatureSpec::Ema(n)
            | FeatureSpec::Stddev(n)
            | FeatureSpec::Atr(n) => *n,
            FeatureSpec::Lag(n) | FeatureSpec::Roc(n) | FeatureSpec::Rsi(n) => n.saturating_add(1),
        }
    }

    /// Compute this spec's column over `table`. Operates on closes unless the
    /// spec needs the full bar.
    pub fn compute(&self, table: &FeatureTable) -> Result<Vec<Option<f64>>, BarwiseError> {
        let close = table.require("close")?;
        let values = match self {
            FeatureSpec::Base(name) => table.require(name)?.to_vec(),
            FeatureSpec::Sma(n) => ops::rolling_mean(close, *n),
            FeatureSpec::Ema(n) => ops::ema(close, *n),
            FeatureSpec::Lag(k) => ops::shift(close, *k),
            FeatureSpec::Stddev(n) => ops::rolling_std(close, *n),
            FeatureSpec::Roc(n) => ops::rate_of_change(close, *n),
            FeatureSpec::Atr(n) => {
                ops::atr(table.require("high")?, table.require("low")?, close, *n)
            }
            FeatureSpec::Rsi(n) => ops::rsi(close, *n),
        };
        Ok(values)
    }
}

impl fmt::Display for FeatureSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FeatureSpec::Base(name) => write!(f, "{}", name.to_uppercase()),
            FeatureSpec::Sma(n) => write!(f, "SMA({})", n),
            FeatureSpec::Ema(n) => write!(f, "EMA({})", n),
            FeatureSpec::Lag(k) => write!(f, "LAG({})", k),
            FeatureSpec::Stddev(n) => write!(f, "STDDEV({})", n),
            FeatureSpec::Roc(n) => write!(f, "ROC({})", n),
            FeatureSpec::Atr(n) => write!(f, "ATR({})", n),
            FeatureSpec::Rsi(n) => write!(f, "RSI({})", n),
        }
    }
}

struct Parser<'a> {
    input: &'a str,
    pos: usize,
}

impl<'a> Parser<'a> {
    fn new(input: &'a str) -> Self {
        Self { input, pos: 0 }
    }

    fn peek(&self) -> Option<char> {
        self.input[self.pos..].chars().next()
    }

    fn advance(&mut self) -> Option<char> {
        let ch = self.peek()?;
        self.pos += ch.len_utf8();
        Some(ch)
    }

    fn skip_whitespace(&mut self) {
        while self.peek().is_some_and(char::is_whitespace) {
            self.advance();
        }
    }

    fn error(&self, message: impl Into<String>) -> ParseError {
        ParseError {
            message: message.into(),
            position: self.pos,
        }
    }

    fn found(&self) -> String {
        self.peek()
            .map(|c| format!("'{c}'"))
            .unwrap_or_else(|| "end of input".to_string())
    }

    fn expect_char(&mut self, expected: char) -> Result<(), ParseError> {
        self.skip_whitespace();
        if self.peek() == Some(expected) {
            self.advance();
            Ok(())
        } else {
            Err(self.error(format!("expected '{}', found {}", expected, self.found())))
        }
    }

    fn parse_word(&mut self) -> String {
        let start = self.pos;
        while self.peek().is_some_and(|c| c.is_alphanumeric() || c == '_') {
            self.advance();
        }
        self.input[start..self.pos].to_lowercase()
    }

    fn parse_period(&mut self) -> Result<usize, ParseError> {
        self.skip_whitespace();
        let start = self.pos;
        while self.peek().is_some_and(|c| c.is_ascii_digit()) {
            self.advance();
        }
        let digits = &self.input[start..self.pos];
        if digits.is_empty() {
            return Err(self.error(format!("expected integer, found {}", self.found())));
        }
        match digits.parse::<usize>() {
            Ok(0) => Err(ParseError {
                message: "period must be positive".to_string(),
                position: start,
            }),
            Ok(n) if n <= MAX_PERIOD => Ok(n),
            _ => Err(ParseError {
                message: format!("period {} exceeds the maximum of {}", digits, MAX_PERIOD),
                position: start,
            }),
        }
    }

    fn parse_spec(&mut self) -> Result<FeatureSpec, ParseError> {
        self.skip_whitespace();
        let start = self.pos;
        let word = self.parse_word();
        if word.is_empty() {
            return Err(self.error(format!("expected feature name, found {}", self.found())));
        }

        if let Some(base) = BASE_COLUMNS.iter().copied().find(|c| *c == word) {
            return Ok(FeatureSpec::Base(base));
        }

        let ctor: fn(usize) -> FeatureSpec = match word.as_str() {
            "sma" => FeatureSpec::Sma,
            "ema" => FeatureSpec::Ema,
            "lag" => FeatureSpec::Lag,
            "stddev" => FeatureSpec::Stddev,
            "roc" => FeatureSpec::Roc,
            "atr" => FeatureSpec::Atr,
            "rsi" => FeatureSpec::Rsi,
            _ => {
                return Err(ParseError {
                    message: format!("unknown feature '{}'", word),
                    position: start,
                })
            }
        };

        self.expect_char('(')?;
        let period = self.parse_period()?;
        self.expect_char(')')?;
        Ok(ctor(period))
    }

    fn parse_list(&mut self) -> Result<Vec<FeatureSpec>, ParseError> {
        let mut specs = vec![self.parse_spec()?];
        loop {
            self.skip_whitespace();
            match self.peek() {
                None => return Ok(specs),
                Some(',') => {
                    self.advance();
                    specs.push(self.parse_spec()?);
                }
                Some(_) => {
                    return Err(self.error(format!("expected ',', found {}", self.found())));
                }
            }
        }
    }
}

/// Parse a comma-separated feature list such as `close, sma(21), lag(1)`.
pub fn parse(input: &str) -> Result<Vec<FeatureSpec>, ParseError> {
    Parser::new(input).parse_list()
}

/// [`FeatureLogic`] that computes one column per [`FeatureSpec`].
#[derive(Debug, Clone, PartialEq)]
pub struct SpecFeatureLogic {
    specs: Vec<FeatureSpec>,
}

impl SpecFeatureLogic {
    pub fn new(specs: Vec<FeatureSpec>) -> Result<Self, BarwiseError> {
        if specs.is_empty() {
            return Err(BarwiseError::UnsupportedConfig {
                reason: "feature list is empty".into(),
            });
        }
        for (i, spec) in specs.iter().enumerate() {
            if specs[..i].iter().any(|s| s.column_name() == spec.column_name()) {
                return Err(BarwiseError::UnsupportedConfig {
                    reason: format!("feature {} listed twice", spec),
                });
            }
        }
        Ok(Self { specs })
    }

    pub fn parse(input: &str) -> Result<Self, BarwiseError> {
        Self::new(parse(input)?)
    }

    pub fn specs(&self) -> &[FeatureSpec] {
        &self.specs
    }
}

impl FeatureLogic for SpecFeatureLogic {
    fn min_bars(&self) -> usize {
        self.specs.iter().map(FeatureSpec::lookback).max().unwrap_or(1)
    }

    fn feature_names(&self) -> Vec<String> {
        self.specs.iter().map(FeatureSpec::column_name).collect()
    }

    fn compute(&self, table: &mut FeatureTable) -> Result<(), BarwiseError> {
        for spec in &self.specs {
            if matches!(spec, FeatureSpec::Base(_)) {
                continue;
            }
            let values = spec.compute(table)?;
            table.set_column(spec.column_name(), values)?;
        }
        Ok(())
    }
}
