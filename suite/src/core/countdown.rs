//! Countdown text parsing and gate decisions.
//!
//! Cooldown displays are free-form ("Resend in 1 min 30 sec", "Resend code
//! (0:45)", "Try again in 12s"). Each [`CountdownPattern`] is a named parser
//! strategy; [`parse_countdown`] tries them in [`CountdownPattern::ORDER`] and
//! the first match wins.

use std::sync::LazyLock;
use std::time::Duration;

use regex::Regex;

/// Named countdown parser strategies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CountdownPattern {
    /// `1 min 30 sec`, `2m 5s`, `1 minute and 4 seconds`.
    MinutesSeconds,
    /// Clock style `1:30`, minutes followed by trailing two-digit seconds.
    MinutesTrailingSeconds,
    /// `45s`, `45 sec`, `45 seconds`.
    BareSeconds,
    /// `2 min`, `3 minutes`.
    BareMinutes,
}

static MINUTES_SECONDS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)(\d+)\s*(?:m|mins?|minutes?)\b[\s,]*(?:and\s+)?(\d+)\s*(?:s|secs?|seconds?)\b",
    )
    .expect("valid minutes+seconds regex")
});
static TRAILING_SECONDS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d+):(\d{2})\b").expect("valid clock regex"));
static BARE_SECONDS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(\d+)\s*(?:s|secs?|seconds?)\b").expect("valid seconds regex")
});
static BARE_MINUTES: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(\d+)\s*(?:m|mins?|minutes?)\b").expect("valid minutes regex")
});

impl CountdownPattern {
    pub const ORDER: [CountdownPattern; 4] = [
        CountdownPattern::MinutesSeconds,
        CountdownPattern::MinutesTrailingSeconds,
        CountdownPattern::BareSeconds,
        CountdownPattern::BareMinutes,
    ];

    /// Try this strategy alone against `text`.
    pub fn parse(self, text: &str) -> Option<Duration> {
        match self {
            CountdownPattern::MinutesSeconds => {
                let caps = MINUTES_SECONDS.captures(text)?;
                minutes_and_seconds(&caps[1], &caps[2])
            }
            CountdownPattern::MinutesTrailingSeconds => {
                let caps = TRAILING_SECONDS.captures(text)?;
                minutes_and_seconds(&caps[1], &caps[2])
            }
            CountdownPattern::BareSeconds => {
                let caps = BARE_SECONDS.captures(text)?;
                Some(Duration::from_secs(caps[1].parse().ok()?))
            }
            CountdownPattern::BareMinutes => {
                let caps = BARE_MINUTES.captures(text)?;
                let minutes: u64 = caps[1].parse().ok()?;
                Some(Duration::from_secs(minutes.checked_mul(60)?))
            }
        }
    }
}

fn minutes_and_seconds(minutes: &str, seconds: &str) -> Option<Duration> {
    let minutes: u64 = minutes.parse().ok()?;
    let seconds: u64 = seconds.parse().ok()?;
    Some(Duration::from_secs(minutes.checked_mul(60)?.checked_add(seconds)?))
}

/// A countdown value read from the live display.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CountdownReading {
    pub remaining: Duration,
    pub pattern: CountdownPattern,
}

/// Parse remaining time from countdown text. First successful strategy wins.
pub fn parse_countdown(text: &str) -> Option<CountdownReading> {
    CountdownPattern::ORDER.into_iter().find_map(|pattern| {
        pattern
            .parse(text)
            .map(|remaining| CountdownReading { remaining, pattern })
    })
}

/// What the gate should do for a sampled countdown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateDecision {
    /// No countdown (absent or zero): check enablement right away.
    Immediate,
    /// Short cooldown: wait this long, then check enablement.
    Wait(Duration),
    /// Cooldown above the ceiling: abort as skipped without waiting.
    Skip(Duration),
}

/// Classify a sampled countdown against the ceiling threshold.
///
/// A remaining time exactly equal to the ceiling is still waited out.
pub fn decide(reading: Option<CountdownReading>, ceiling: Duration) -> GateDecision {
    match reading {
        None => GateDecision::Immediate,
        Some(reading) if reading.remaining.is_zero() => GateDecision::Immediate,
        Some(reading) if reading.remaining > ceiling => GateDecision::Skip(reading.remaining),
        Some(reading) => GateDecision::Wait(reading.remaining),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn secs(text: &str) -> Option<u64> {
        parse_countdown(text).map(|reading| reading.remaining.as_secs())
    }

    #[test]
    fn minutes_and_seconds_win_over_bare_units() {
        let reading = parse_countdown("Resend in 1 min 30 sec").expect("reading");
        assert_eq!(reading.remaining, Duration::from_secs(90));
        assert_eq!(reading.pattern, CountdownPattern::MinutesSeconds);
        assert_eq!(secs("resend in 2m 5s"), Some(125));
        assert_eq!(secs("1 minute and 4 seconds"), Some(64));
    }

    #[test]
    fn clock_style_parses_trailing_seconds() {
        let reading = parse_countdown("Resend code (0:45)").expect("reading");
        assert_eq!(reading.remaining, Duration::from_secs(45));
        assert_eq!(reading.pattern, CountdownPattern::MinutesTrailingSeconds);
        assert_eq!(secs("2:30"), Some(150));
    }

    #[test]
    fn bare_seconds_and_minutes() {
        assert_eq!(secs("Try again in 12s"), Some(12));
        assert_eq!(secs("Resend in 5 seconds"), Some(5));
        let reading = parse_countdown("Resend in 3 minutes").expect("reading");
        assert_eq!(reading.remaining, Duration::from_secs(180));
        assert_eq!(reading.pattern, CountdownPattern::BareMinutes);
    }

    #[test]
    fn text_without_countdown_is_none() {
        assert_eq!(parse_countdown("Resend Code"), None);
        assert_eq!(parse_countdown(""), None);
    }

    #[test]
    fn each_strategy_is_testable_alone() {
        assert_eq!(
            CountdownPattern::BareSeconds.parse("1 min 30 sec"),
            Some(Duration::from_secs(30))
        );
        assert_eq!(CountdownPattern::MinutesSeconds.parse("30 sec"), None);
        assert_eq!(CountdownPattern::MinutesTrailingSeconds.parse("45s"), None);
    }

    #[test]
    fn decide_applies_ceiling() {
        let ceiling = Duration::from_secs(120);
        assert_eq!(decide(None, ceiling), GateDecision::Immediate);
        assert_eq!(
            decide(parse_countdown("0s"), ceiling),
            GateDecision::Immediate
        );
        assert_eq!(
            decide(parse_countdown("150 seconds"), ceiling),
            GateDecision::Skip(Duration::from_secs(150))
        );
        assert_eq!(
            decide(parse_countdown("2:00"), ceiling),
            GateDecision::Wait(Duration::from_secs(120))
        );
        assert_eq!(
            decide(parse_countdown("5s"), ceiling),
            GateDecision::Wait(Duration::from_secs(5))
        );
    }
}
