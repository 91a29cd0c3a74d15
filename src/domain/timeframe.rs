//! Named bar granularities.

use chrono::Duration;
use std::fmt;
use std::str::FromStr;

use super::error::BarwiseError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Timeframe {
    M1,
    M2,
    M3,
    M4,
    M5,
    M6,
    M10,
    M12,
    M15,
    M20,
    M30,
    H1,
    H2,
    H3,
    H4,
    H6,
    H8,
    H12,
    D1,
    W1,
    Mn1,
}

const ALL: [(&str, Timeframe); 21] = [
    ("m1", Timeframe::M1),
    ("m2", Timeframe::M2),
    ("m3", Timeframe::M3),
    ("m4", Timeframe::M4),
    ("m5", Timeframe::M5),
    ("m6", Timeframe::M6),
    ("m10", Timeframe::M10),
    ("m12", Timeframe::M12),
    ("m15", Timeframe::M15),
    ("m20", Timeframe::M20),
    ("m30", Timeframe::M30),
    ("h1", Timeframe::H1),
    ("h2", Timeframe::H2),
    ("h3", Timeframe::H3),
    ("h4", Timeframe::H4),
    ("h6", Timeframe::H6),
    ("h8", Timeframe::H8),
    ("h12", Timeframe::H12),
    ("d1", Timeframe::D1),
    ("w1", Timeframe::W1),
    ("mn1", Timeframe::Mn1),
];

impl Timeframe {
    pub fn name(self) -> &'static str {
        ALL.iter()
            .find(|(_, tf)| *tf == self)
            .map(|(name, _)| *name)
            .unwrap_or("?")
    }

    /// Nominal bar length in minutes; `None` for calendar months.
    pub fn minutes(self) -> Option<i64> {
        let m = match self {
            Timeframe::M1 => 1,
            Timeframe::M2 => 2,
            Timeframe::M3 => 3,
            Timeframe::M4 => 4,
            Timeframe::M5 => 5,
            Timeframe::M6 => 6,
            Timeframe::M10 => 10,
            Timeframe::M12 => 12,
            Timeframe::M15 => 15,
            Timeframe::M20 => 20,
            Timeframe::M30 => 30,
            Timeframe::H1 => 60,
            Timeframe::H2 => 120,
            Timeframe::H3 => 180,
            Timeframe::H4 => 240,
            Timeframe::H6 => 360,
            Timeframe::H8 => 480,
            Timeframe::H12 => 720,
            Timeframe::D1 => 1_440,
            Timeframe::W1 => 10_080,
            Timeframe::Mn1 => return None,
        };
        Some(m)
    }

    pub fn duration(self) -> Option<Duration> {
        self.minutes().map(Duration::minutes)
    }
}

impl FromStr for Timeframe {
    type Err = BarwiseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lowered = s.trim().to_lowercase();
        ALL.iter()
            .find(|(name, _)| *name == lowered)
            .map(|(_, tf)| *tf)
            .ok_or_else(|| BarwiseError::UnsupportedTimeframe {
                name: s.to_string(),
            })
    }
}

impl fmt::Display for Timeframe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
