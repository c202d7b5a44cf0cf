use crate::delta::CoverageDeltas;
use crate::{CoverageMap, DeltaEntry, Report};
use regex::Regex;
use std::sync::LazyLock;

const TABLE_HEADER: &str = "| File | Delta | Total |\n| --- | --- | --- |";

/// Shown in the Total column when a labelled file has no head sample.
const MISSING_TOTAL: &str = "n/a";

static FLOAT_PREFIX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[+-]?(Infinity|(\d+\.?\d*|\.\d+)([eE][+-]?\d+)?)")
        .expect("float prefix regex is valid")
});

static DECIMAL_LITERAL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[+-]?(\d+\.?\d*|\.\d+)([eE][+-]?\d+)?$").expect("decimal regex is valid")
});

/// Render the delta table and decide the threshold verdict.
///
/// Rows follow the iteration order of `deltas`. Label rows print the label
/// and raw head total unformatted; numeric rows print the rounded delta with
/// an explicit sign and the rounded head total.
///
/// A threshold without a numeric prefix disables the check. Otherwise a file
/// fails when its rounded delta is negative and not greater than
/// `-abs(limit)`, and one failing file fails the whole report. The limit is
/// the whole threshold text read strictly (see `threshold_limit`), so text
/// like `"2abc"` enables the check but fails every negative delta.
pub fn render(deltas: &CoverageDeltas, head: &CoverageMap, threshold: &str) -> Report {
    let enabled = parse_threshold(threshold).is_some();
    let limit = threshold_limit(threshold);
    let mut passes_threshold = true;
    let mut table = String::from(TABLE_HEADER);

    for (filename, entry) in deltas.iter() {
        let total = head.get(filename);

        let delta = match entry {
            DeltaEntry::Delta(delta) => *delta,
            label => {
                let raw_total = total.map_or(MISSING_TOTAL, |p| p.raw.as_str());
                let label = label.label().unwrap_or_default();
                table.push_str(&format!("\n| {} | {} | {}%", filename, label, raw_total));
                continue;
            }
        };

        let rounded_delta = round_half_up(delta + f64::EPSILON);
        if passes_threshold && enabled && rounded_delta < 0 {
            // NaN limits compare false, so the file fails.
            passes_threshold = rounded_delta as f64 > -limit.abs();
            if !passes_threshold {
                tracing::info!(file = %filename, delta = rounded_delta, "file fails threshold");
            }
        }

        let total = match total.and_then(|p| p.value) {
            Some(value) => round_half_up(value).to_string(),
            None => MISSING_TOTAL.to_string(),
        };
        table.push_str(&format!(
            "\n| {} | {}% | {}%",
            filename,
            format_delta(rounded_delta),
            total
        ));
    }

    Report {
        table,
        passes_threshold,
    }
}

/// Parse the longest leading float of `threshold`, ignoring leading whitespace.
///
/// Returns `None` when there is no numeric prefix, which disables the check.
pub fn parse_threshold(threshold: &str) -> Option<f64> {
    let trimmed = threshold.trim_start();
    let prefix = FLOAT_PREFIX.find(trimmed)?.as_str();
    match prefix.trim_start_matches(['+', '-']) {
        "Infinity" if prefix.starts_with('-') => Some(f64::NEG_INFINITY),
        "Infinity" => Some(f64::INFINITY),
        _ => prefix.parse().ok(),
    }
}

/// Read the whole threshold text as a number, strictly.
///
/// Surrounding whitespace is ignored and empty text is zero. Accepts decimal
/// literals, `Infinity` with an optional sign, and unsigned `0x`/`0o`/`0b`
/// integers. Anything else is NaN.
pub fn threshold_limit(threshold: &str) -> f64 {
    let text = threshold.trim();
    if text.is_empty() {
        return 0.0;
    }

    match text {
        "Infinity" | "+Infinity" => return f64::INFINITY,
        "-Infinity" => return f64::NEG_INFINITY,
        _ => {}
    }

    let radix = match text.get(..2) {
        Some("0x" | "0X") => Some(16),
        Some("0o" | "0O") => Some(8),
        Some("0b" | "0B") => Some(2),
        _ => None,
    };
    if let Some(radix) = radix {
        let digits = &text[2..];
        if digits.is_empty() || !digits.chars().all(|c| c.is_digit(radix)) {
            return f64::NAN;
        }
        return digits
            .chars()
            .filter_map(|c| c.to_digit(radix))
            .fold(0.0, |acc, d| acc * radix as f64 + d as f64);
    }

    if DECIMAL_LITERAL.is_match(text) {
        text.parse().unwrap_or(f64::NAN)
    } else {
        f64::NAN
    }
}

/// Round to the nearest integer, breaking ties toward positive infinity.
pub fn round_half_up(value: f64) -> i64 {
    let floor = value.floor();
    // value - floor is exact; adding 0.5 first would round 0.49999999999999994 up.
    if value - floor >= 0.5 {
        floor as i64 + 1
    } else {
        floor as i64
    }
}

/// Format a rounded delta with an explicit sign. Zero renders as `+0`.
pub fn format_delta(rounded: i64) -> String {
    let text = rounded.to_string();
    if text.starts_with('-') {
        text
    } else {
        format!("+{}", text)
    }
}
