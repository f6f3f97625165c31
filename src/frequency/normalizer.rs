//! # Frequency Normalizer
//!
//! Maps human- or vendor-entered recurrence text onto a canonical [`Frequency`].
//!
//! The input is trimmed and lower-cased, then run through an ordered list of
//! matcher rules. The first rule returning `Some` wins; when none match the
//! result is [`Frequency::Monthly`]. Normalization never fails.
//!
//! | Order | Rule | Example |
//! |---|---|---|
//! | 1 | compound vendor pattern | `MonthlyByWeekday\|1\|First_Mon` → MONTHLY |
//! | 2 | numeric magnitude | `6 weeks` → WEEKLY, `6-month` → QUARTERLY |
//! | 3 | monthly weekday qualifier | `monthly on the last friday` → MONTHLY |
//! | 4 | unit substring | `every week` → WEEKLY |

use super::Frequency;
use regex::Regex;
use std::sync::OnceLock;
use tracing::trace;

type Matcher = fn(&str) -> Option<Frequency>;

/// Ordered matcher rules, first match wins
const RULES: &[(&str, Matcher)] = &[
    ("compound_vendor_pattern", compound_vendor_pattern),
    ("numeric_magnitude", numeric_magnitude),
    ("monthly_weekday_qualifier", monthly_weekday_qualifier),
    ("unit_substring", unit_substring),
];

/// Unit keywords, grouped by the frequency they denote, in matching priority
const UNIT_KEYWORDS: &[(Frequency, &[&str])] = &[
    (Frequency::Daily, &["daily", "day"]),
    (Frequency::Weekly, &["weekly", "week"]),
    (Frequency::Monthly, &["monthly", "month"]),
    (Frequency::Quarterly, &["quarterly", "quarter"]),
    (Frequency::Yearly, &["yearly", "year", "annual"]),
];

const WEEKDAYS: [&str; 7] = [
    "monday",
    "tuesday",
    "wednesday",
    "thursday",
    "friday",
    "saturday",
    "sunday",
];

/// Normalize free-text recurrence into a canonical frequency.
///
/// Absent, empty and unrecognized input all resolve to [`Frequency::Monthly`].
pub fn normalize(raw: Option<&str>) -> Frequency {
    let Some(raw) = raw else {
        return Frequency::default();
    };

    let text = raw.trim().to_lowercase();
    if text.is_empty() {
        return Frequency::default();
    }

    RULES
        .iter()
        .find_map(|(rule, matcher)| {
            matcher(&text).inspect(|frequency| {
                trace!(input = %raw, rule = %rule, frequency = %frequency, "Frequency matched");
            })
        })
        .unwrap_or_default()
}

/// Vendor exports embed a base unit plus an ordinal/day qualifier separated by
/// pipes. The qualifier is discarded; the leading segment decides the unit.
fn compound_vendor_pattern(text: &str) -> Option<Frequency> {
    if !text.contains('|') {
        return None;
    }
    let head = text.split('|').next()?;
    leading_unit(head)
}

fn numeric_magnitude(text: &str) -> Option<Frequency> {
    static WEEKS: OnceLock<Regex> = OnceLock::new();
    static MONTHS: OnceLock<Regex> = OnceLock::new();

    let weeks = WEEKS.get_or_init(|| Regex::new(r"\b(\d+)[\s-]*weeks?\b").expect("valid regex"));
    if weeks.is_match(text) {
        return Some(Frequency::Weekly);
    }

    let months = MONTHS.get_or_init(|| Regex::new(r"\b(\d+)[\s-]*months?\b").expect("valid regex"));
    let captures = months.captures(text)?;
    // Digit-only capture, so the only parse failure is overflow
    let count = captures[1].parse::<u64>().unwrap_or(u64::MAX);

    Some(match count {
        12.. => Frequency::Yearly,
        3..=11 => Frequency::Quarterly,
        _ => Frequency::Monthly,
    })
}

fn monthly_weekday_qualifier(text: &str) -> Option<Frequency> {
    if !text.contains("monthly") {
        return None;
    }
    let qualified = text.contains("first")
        || text.contains("last")
        || WEEKDAYS.iter().any(|day| text.contains(day));
    qualified.then_some(Frequency::Monthly)
}

fn unit_substring(text: &str) -> Option<Frequency> {
    UNIT_KEYWORDS
        .iter()
        .find(|(_, keywords)| keywords.iter().any(|keyword| text.contains(keyword)))
        .map(|(frequency, _)| *frequency)
}

/// The unit whose keyword appears earliest in `segment`, so that
/// "monthlybyweekday" reads as monthly rather than daily.
fn leading_unit(segment: &str) -> Option<Frequency> {
    UNIT_KEYWORDS
        .iter()
        .flat_map(|(frequency, keywords)| {
            keywords
                .iter()
                .filter_map(move |keyword| segment.find(keyword).map(|pos| (pos, *frequency)))
        })
        .min_by_key(|(pos, _)| *pos)
        .map(|(_, frequency)| frequency)
}
