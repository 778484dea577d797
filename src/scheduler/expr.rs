//! Cron expression parsing.
//!
//! The [`cron`] crate wants a seconds field. Classic five-field expressions
//! (`min hour dom month dow`) get a leading `0`, so `"10,30,50 * * * *"` fires
//! at second zero of minutes 10, 30 and 50. Six/seven-field expressions and
//! `@hourly`-style shortcuts pass through unchanged.

use std::str::FromStr;

use cron::Schedule;

/// Rewrites a five-field expression into the six-field form.
///
/// ```
/// use probevisor::scheduler::normalize;
/// assert_eq!(normalize("* * * * *"), "0 * * * * *");
/// assert_eq!(normalize("*/5 * * * * *"), "*/5 * * * * *");
/// ```
pub fn normalize(expr: &str) -> String {
    let expr = expr.trim();
    if expr.starts_with('@') {
        return expr.to_string();
    }
    let fields: Vec<&str> = expr.split_whitespace().collect();
    if fields.len() == 5 {
        format!("0 {}", fields.join(" "))
    } else {
        fields.join(" ")
    }
}

/// Parses a cron expression, accepting the five-field form.
pub fn parse_schedule(expr: &str) -> Result<Schedule, String> {
    Schedule::from_str(&normalize(expr)).map_err(|e| e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Timelike, Utc};

    #[test]
    fn five_field_fires_on_the_minute() {
        let s = parse_schedule("10,30,50 * * * *").unwrap();
        let from = Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap();
        let next: Vec<_> = s.after(&from).take(3).collect();

        assert_eq!(
            next.iter().map(|t| t.minute()).collect::<Vec<_>>(),
            [10, 30, 50]
        );
        assert!(next.iter().all(|t| t.second() == 0));
    }

    #[test]
    fn hourly_shortcut_is_accepted() {
        assert!(parse_schedule("@hourly").is_ok());
    }

    #[test]
    fn garbage_is_rejected() {
        assert!(parse_schedule("every tuesday").is_err());
        assert!(parse_schedule("61 * * * *").is_err());
    }
}
