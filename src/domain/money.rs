use std::fmt;

/// Balances, limits and transaction amounts are integer cents.
/// A limit of 100000 means the balance may go down to -1000.00.
pub type Cents = i64;

/// Format cents as a human-readable decimal string.
/// Example: 100000 -> "1000.00", -150 -> "-1.50"
pub fn format_cents(cents: Cents) -> String {
    let sign = if cents < 0 { "-" } else { "" };
    let abs = cents.unsigned_abs();
    format!("{}{}.{:02}", sign, abs / 100, abs % 100)
}

/// Parse a non-negative decimal string into cents.
/// Example: "10.5" -> 1050, "1000" -> 100000, ".25" -> 25
///
/// Signs are rejected: the direction of a transaction is its kind, never
/// the sign of its amount.
pub fn parse_cents(input: &str) -> Result<Cents, ParseCentsError> {
    let input = input.trim();
    if input.is_empty() || input.starts_with(['-', '+']) {
        return Err(ParseCentsError::InvalidFormat);
    }

    let (units, fraction) = input.split_once('.').unwrap_or((input, ""));

    let units: Cents = if units.is_empty() {
        0
    } else {
        units.parse().map_err(|_| ParseCentsError::InvalidFormat)?
    };

    if !fraction.chars().all(|c| c.is_ascii_digit()) {
        return Err(ParseCentsError::InvalidFormat);
    }
    let fraction_cents: Cents = match fraction.len() {
        0 => 0,
        1 => fraction.parse::<Cents>().map_err(|_| ParseCentsError::InvalidFormat)? * 10,
        2 => fraction.parse().map_err(|_| ParseCentsError::InvalidFormat)?,
        _ => return Err(ParseCentsError::TooPrecise),
    };

    units
        .checked_mul(100)
        .and_then(|c| c.checked_add(fraction_cents))
        .ok_or(ParseCentsError::Overflow)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseCentsError {
    InvalidFormat,
    TooPrecise,
    Overflow,
}

impl fmt::Display for ParseCentsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseCentsError::InvalidFormat => write!(f, "invalid money format"),
            ParseCentsError::TooPrecise => write!(f, "more than two decimal places"),
            ParseCentsError::Overflow => write!(f, "amount is too large"),
        }
    }
}

impl std::error::Error for ParseCentsError {}
