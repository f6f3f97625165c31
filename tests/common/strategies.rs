use chrono::{DateTime, TimeZone, Utc};
use proptest::prelude::*;
use proptest::strategy::Just;

/// Spellings that must all normalize to MONTHLY
pub fn monthly_spelling_strategy() -> impl Strategy<Value = String> {
    prop_oneof![
        Just("monthly".to_string()),
        Just("Monthly".to_string()),
        Just("MONTH".to_string()),
        Just("every month".to_string()),
        Just("MonthlyByWeekday|1|First_Mon".to_string()),
        Just("monthly on the last friday".to_string()),
        Just("1 month".to_string()),
    ]
}

/// Surrounding whitespace and random casing applied to a base spelling
pub fn decorated_strategy(base: impl Strategy<Value = String>) -> impl Strategy<Value = String> {
    (base, "[ \t]{0,3}", "[ \t]{0,3}", any::<bool>()).prop_map(|(word, lead, trail, upper)| {
        let word = if upper { word.to_uppercase() } else { word };
        format!("{lead}{word}{trail}")
    })
}

/// Text that contains no frequency keyword, digit, or separator
pub fn unrecognized_strategy() -> impl Strategy<Value = String> {
    "[bcfgjkpvxz ]{0,24}"
}

/// Week counts written the way vendors write them
pub fn week_count_strategy() -> impl Strategy<Value = String> {
    (1u32..=52, any::<bool>(), any::<bool>(), prop_oneof![Just(" "), Just("-")]).prop_map(
        |(n, plural, every, separator)| {
            let unit = if plural { "weeks" } else { "week" };
            let prefix = if every { "every " } else { "" };
            format!("{prefix}{n}{separator}{unit}")
        },
    )
}

/// Any instant between 1990 and 2100 at whole-second precision
pub fn anchor_strategy() -> impl Strategy<Value = DateTime<Utc>> {
    let start = Utc.with_ymd_and_hms(1990, 1, 1, 0, 0, 0).unwrap().timestamp();
    let end = Utc.with_ymd_and_hms(2100, 1, 1, 0, 0, 0).unwrap().timestamp();
    (start..end).prop_map(|secs| Utc.timestamp_opt(secs, 0).unwrap())
}

/// Number of concurrent callers racing on one schedule
pub fn concurrency_strategy() -> impl Strategy<Value = usize> {
    2usize..=12
}
