//! Compact duration strings for log lines

use std::time::Duration;

/// Render `millis` as e.g. `850ms`, `2s340ms` or `15h42m`
///
/// Sub-second parts are dropped from a minute upwards.
pub fn format_duration(millis: u64) -> String {
    let duration = match Duration::from_millis(millis) {
        d if millis >= 60_000 => Duration::from_secs(d.as_secs()),
        d => d,
    };
    humantime::format_duration(duration)
        .to_string()
        .replace(' ', "")
}
