//! Integer-micros money representation.
//!
//! All balances, prices and order amounts are `i64` micros
//! (1 unit = 1_000_000 micros). Decimal strings exist only at the edges:
//! config files, CLI arguments and human-readable messages.

use std::fmt;

/// Scale factor: 1 currency unit = 1_000_000 micros (6 decimal places).
pub const MICROS_PER_UNIT: i64 = 1_000_000;

const MAX_FRACTION_DIGITS: usize = 6;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MoneyParseError {
    Empty,
    /// Contains something other than digits and at most one '.'.
    Malformed(String),
    /// More than six fractional digits.
    TooPrecise(String),
    OutOfRange(String),
}

impl fmt::Display for MoneyParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MoneyParseError::Empty => write!(f, "money: empty amount"),
            MoneyParseError::Malformed(s) => write!(f, "money: malformed amount '{}'", s),
            MoneyParseError::TooPrecise(s) => {
                write!(f, "money: more than 6 decimal places in '{}'", s)
            }
            MoneyParseError::OutOfRange(s) => write!(f, "money: amount out of range '{}'", s),
        }
    }
}

impl std::error::Error for MoneyParseError {}

/// Parse a non-negative decimal string (e.g. `"3.50"`) into micros.
pub fn parse_decimal_micros(raw: &str) -> Result<i64, MoneyParseError> {
    let s = raw.trim();
    if s.is_empty() {
        return Err(MoneyParseError::Empty);
    }

    let (whole, frac) = match s.split_once('.') {
        Some((w, f)) => (w, f),
        None => (s, ""),
    };

    let all_digits = |p: &str| p.chars().all(|c| c.is_ascii_digit());
    if (whole.is_empty() && frac.is_empty()) || !all_digits(whole) || !all_digits(frac) {
        return Err(MoneyParseError::Malformed(s.to_string()));
    }
    if frac.len() > MAX_FRACTION_DIGITS {
        return Err(MoneyParseError::TooPrecise(s.to_string()));
    }

    let whole_units: i64 = if whole.is_empty() {
        0
    } else {
        whole
            .parse()
            .map_err(|_| MoneyParseError::OutOfRange(s.to_string()))?
    };

    let mut frac_padded = frac.to_string();
    while frac_padded.len() < MAX_FRACTION_DIGITS {
        frac_padded.push('0');
    }
    let frac_micros: i64 = frac_padded
        .parse()
        .map_err(|_| MoneyParseError::Malformed(s.to_string()))?;

    whole_units
        .checked_mul(MICROS_PER_UNIT)
        .and_then(|w| w.checked_add(frac_micros))
        .ok_or_else(|| MoneyParseError::OutOfRange(s.to_string()))
}

/// Render micros as a two-decimal string, e.g. `6_000_000 -> "6.00"`.
///
/// Sub-cent remainders are shown in full so nothing is silently dropped.
pub fn format_micros(micros: i64) -> String {
    let sign = if micros < 0 { "-" } else { "" };
    let abs = micros.unsigned_abs();
    let units = abs / MICROS_PER_UNIT as u64;
    let frac = abs % MICROS_PER_UNIT as u64;

    if frac % 10_000 == 0 {
        format!("{}{}.{:02}", sign, units, frac / 10_000)
    } else {
        let digits = format!("{:06}", frac);
        format!("{}{}.{}", sign, units, digits.trim_end_matches('0'))
    }
}
