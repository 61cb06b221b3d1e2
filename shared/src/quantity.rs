//! Exact rendering of raw ledger quantities.
//!
//! Divisible tokens are stored in indivisible base units, 10^8 of which make
//! one whole token. Rendering never goes through floating point so the
//! produced strings are stable.

/// Base units per whole divisible token.
pub const SATOSHI: u64 = 100_000_000;

const FRACTION_DIGITS: usize = 8;

/// Renders `raw` for display, scaling by [`SATOSHI`] when `divisible`.
///
/// The integer part is grouped by thousands with commas; trailing zeros of
/// the fractional part are dropped, and so is the decimal point when nothing
/// is left after it.
pub fn display_quantity(raw: u64, divisible: bool) -> String {
    if !divisible {
        return group_thousands(raw);
    }

    let whole = group_thousands(raw / SATOSHI);
    let fraction = raw % SATOSHI;
    if fraction == 0 {
        return whole;
    }

    let fraction = format!("{fraction:0width$}", width = FRACTION_DIGITS);
    format!("{whole}.{}", fraction.trim_end_matches('0'))
}

/// Whole-token value as a float, for geometry that does not need exactness.
pub fn as_whole_units(raw: u64, divisible: bool) -> f64 {
    if divisible {
        raw as f64 / SATOSHI as f64
    } else {
        raw as f64
    }
}

fn group_thousands(value: u64) -> String {
    let digits = value.to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, digit) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(digit);
    }
    grouped
}
