//! Production origins (independent manufacturing sites / databases)

use crate::Error;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Independent data-source selector.
///
/// The numeric codes are the ones stored in order records and sent by clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Origin {
    Suzhou = 1,
    Mianyang = 2,
}

impl Origin {
    /// All known origins, in code order
    pub const ALL: [Origin; 2] = [Origin::Suzhou, Origin::Mianyang];

    /// Numeric origin code
    pub fn code(self) -> u8 {
        self as u8
    }

    /// Lookup by numeric code
    pub fn from_code(code: u8) -> Option<Self> {
        Self::ALL.into_iter().find(|o| o.code() == code)
    }

    /// Lowercase key used in config files and env var suffixes
    pub fn key(self) -> &'static str {
        match self {
            Origin::Suzhou => "suzhou",
            Origin::Mianyang => "mianyang",
        }
    }

    /// Display label for reports
    pub fn label(self) -> &'static str {
        match self {
            Origin::Suzhou => "苏州",
            Origin::Mianyang => "绵阳",
        }
    }
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl FromStr for Origin {
    type Err = Error;

    /// Accepts the numeric code ("1") or the name ("suzhou", any case)
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if let Ok(code) = trimmed.parse::<u8>() {
            return Origin::from_code(code)
                .ok_or_else(|| Error::InvalidInput(format!("Unknown origin code: {}", code)));
        }

        Origin::ALL
            .into_iter()
            .find(|o| o.key().eq_ignore_ascii_case(trimmed))
            .ok_or_else(|| Error::InvalidInput(format!("Unknown origin: {}", trimmed)))
    }
}
