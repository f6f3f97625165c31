//! # Frequency
//!
//! Canonical recurrence units and the pure functions built on them:
//!
//! - [`normalize`] turns free text into a [`Frequency`], never failing
//! - [`next_due`] advances an anchor timestamp by one recurrence period

pub mod normalizer;
pub mod recurrence;

pub use normalizer::normalize;
pub use recurrence::{add_calendar_months, next_due, next_due_from_raw};

use serde::{Deserialize, Serialize};
use std::fmt;

/// Canonical, closed-set recurrence unit of a schedule
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Frequency {
    Daily,
    Weekly,
    #[default]
    Monthly,
    Quarterly,
    Yearly,
}

impl Frequency {
    pub const ALL: [Frequency; 5] = [
        Self::Daily,
        Self::Weekly,
        Self::Monthly,
        Self::Quarterly,
        Self::Yearly,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Daily => "DAILY",
            Self::Weekly => "WEEKLY",
            Self::Monthly => "MONTHLY",
            Self::Quarterly => "QUARTERLY",
            Self::Yearly => "YEARLY",
        }
    }
}

impl fmt::Display for Frequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

crate::constants::text_column!(Frequency);

/// Strict parse of the canonical spelling. Free text goes through [`normalize`].
impl std::str::FromStr for Frequency {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "DAILY" => Ok(Self::Daily),
            "WEEKLY" => Ok(Self::Weekly),
            "MONTHLY" => Ok(Self::Monthly),
            "QUARTERLY" => Ok(Self::Quarterly),
            "YEARLY" => Ok(Self::Yearly),
            _ => Err(format!("Invalid canonical frequency: {s}")),
        }
    }
}
