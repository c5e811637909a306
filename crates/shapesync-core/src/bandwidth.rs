// ── Rate parsing ──
//
// Two textual formats feed bandwidth into the merge:
//
// - RouterOS `rate-limit` values: `rx[/tx] [burst...]`, each rate an
//   integer in bits per second with an optional `k`/`M`/`G` suffix.
// - Plan tokens in profile comments: exactly `<down><unit>/<up><unit>`,
//   e.g. `"20m/20m"`. The unit is mandatory.
//
// All results are Mbps rounded to two decimals.

use crate::error::CoreError;
use crate::model::Bandwidth;

/// Round to two decimal places.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Convert a single rate (`"10M"`, `"512k"`, `"2.5G"`) to Mbps.
///
/// Without a unit the value is bits per second.
pub fn rate_to_mbps(raw: &str) -> Result<f64, CoreError> {
    let raw = raw.trim();
    let parse_err = |reason: &str| CoreError::Parse {
        input: raw.to_owned(),
        reason: reason.to_owned(),
    };

    let (number, scale) = match raw.chars().last() {
        Some('k' | 'K') => (&raw[..raw.len() - 1], 0.001),
        Some('m' | 'M') => (&raw[..raw.len() - 1], 1.0),
        Some('g' | 'G') => (&raw[..raw.len() - 1], 1_000.0),
        Some(c) if c.is_ascii_digit() => (raw, 0.000_001),
        Some(_) => return Err(parse_err("unknown rate unit")),
        None => return Err(parse_err("empty rate")),
    };

    let value: f64 = number
        .parse()
        .map_err(|_| parse_err("rate is not a number"))?;
    if !value.is_finite() || value < 0.0 {
        return Err(parse_err("rate must be a non-negative number"));
    }
    Ok(round2(value * scale))
}

/// Parse a RouterOS `rate-limit` into download/upload Mbps.
///
/// Only the first `rx/tx` pair is used; burst settings that follow are
/// ignored. A lone rate applies to both directions. `0` means unlimited in
/// RouterOS, which carries no usable plan rate, so it yields `None`.
pub fn parse_rate_limit(raw: &str) -> Option<Bandwidth> {
    let first = raw.split_whitespace().next()?;
    let (down, up) = first.split_once('/').unwrap_or((first, first));
    let down = rate_to_mbps(down).ok()?;
    let up = rate_to_mbps(up).ok()?;
    if down <= 0.0 || up <= 0.0 {
        return None;
    }
    Some(Bandwidth::new(down, up))
}

/// Parse a `"<down><unit>/<up><unit>"` plan token from a profile comment.
pub fn parse_plan_token(comment: &str) -> Result<Bandwidth, CoreError> {
    let parse_err = |reason: &str| CoreError::Parse {
        input: comment.to_owned(),
        reason: reason.to_owned(),
    };

    let (down, up) = comment
        .trim()
        .split_once('/')
        .ok_or_else(|| parse_err("expected <down>/<up>"))?;
    let (down, up) = (down.trim(), up.trim());

    for part in [down, up] {
        let has_unit = part
            .chars()
            .last()
            .is_some_and(|c| matches!(c.to_ascii_lowercase(), 'k' | 'm' | 'g'));
        let digits = part.get(..part.len().saturating_sub(1)).unwrap_or_default();
        let well_formed = !digits.is_empty()
            && !digits.starts_with('.')
            && !digits.ends_with('.')
            && digits.chars().all(|c| c.is_ascii_digit() || c == '.')
            && digits.matches('.').count() <= 1;
        if !has_unit || !well_formed {
            return Err(parse_err("each side must look like 20m, 512k or 1.5g"));
        }
    }

    Ok(Bandwidth::new(rate_to_mbps(down)?, rate_to_mbps(up)?))
}

/// Render Mbps without a trailing `.0`: `10`, `0.5`, `2500`.
pub fn format_mbps(value: f64) -> String {
    format!("{}", round2(value))
}
