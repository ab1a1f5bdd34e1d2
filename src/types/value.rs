use std::fmt;

use serde::{Deserialize, Serialize};

/// The value of a field reference, normalized for rule matching.
///
/// `Multiple` is produced by checkable and multi-valued fields. An empty
/// `Multiple` is the explicit "nothing checked" indicator, distinct from
/// `Single("")`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolvedValue {
    Single(String),
    Multiple(Vec<String>),
}

impl ResolvedValue {
    /// Iterate over every contained value.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        let slice: &[String] = match self {
            ResolvedValue::Single(v) => std::slice::from_ref(v),
            ResolvedValue::Multiple(values) => values,
        };
        slice.iter().map(String::as_str)
    }
}

impl From<&str> for ResolvedValue {
    fn from(v: &str) -> Self {
        ResolvedValue::Single(v.to_owned())
    }
}

impl From<String> for ResolvedValue {
    fn from(v: String) -> Self {
        ResolvedValue::Single(v)
    }
}

impl From<Vec<&str>> for ResolvedValue {
    fn from(v: Vec<&str>) -> Self {
        ResolvedValue::Multiple(v.into_iter().map(str::to_owned).collect())
    }
}

impl fmt::Display for ResolvedValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResolvedValue::Single(v) => write!(f, "\"{v}\""),
            ResolvedValue::Multiple(values) => write!(f, "[{}]", values.join(", ")),
        }
    }
}

/// Separators and symbol of the form's currency.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CurrencyFormat {
    pub symbol_left: String,
    pub symbol_right: String,
    pub thousand_separator: char,
    pub decimal_separator: char,
    pub decimals: usize,
}

impl CurrencyFormat {
    #[must_use]
    pub fn usd() -> Self {
        Self {
            symbol_left: "$".to_owned(),
            symbol_right: String::new(),
            thousand_separator: ',',
            decimal_separator: '.',
            decimals: 2,
        }
    }

    #[must_use]
    pub fn eur() -> Self {
        Self {
            symbol_left: String::new(),
            symbol_right: "\u{20ac}".to_owned(),
            thousand_separator: '.',
            decimal_separator: ',',
            decimals: 2,
        }
    }
}

impl Default for CurrencyFormat {
    fn default() -> Self {
        Self::usd()
    }
}

/// Number format as stored on a field definition.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NumberFormatKind {
    #[default]
    DecimalDot,
    DecimalComma,
    Currency,
}

/// How a number is written in a field: `9,999.99`, `9.999,99` or a currency.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum NumberFormat {
    #[default]
    DecimalDot,
    DecimalComma,
    Currency(CurrencyFormat),
}

impl NumberFormat {
    #[must_use]
    pub fn from_kind(kind: NumberFormatKind, currency: &CurrencyFormat) -> Self {
        match kind {
            NumberFormatKind::DecimalDot => NumberFormat::DecimalDot,
            NumberFormatKind::DecimalComma => NumberFormat::DecimalComma,
            NumberFormatKind::Currency => NumberFormat::Currency(currency.clone()),
        }
    }

    fn separators(&self) -> (char, char) {
        match self {
            NumberFormat::DecimalDot => (',', '.'),
            NumberFormat::DecimalComma => ('.', ','),
            NumberFormat::Currency(c) => (c.thousand_separator, c.decimal_separator),
        }
    }

    /// Rewrite `text` as a canonical decimal-dot number string, keeping the
    /// digits as written. Returns `None` when `text` is not a valid number in
    /// this format.
    #[must_use]
    pub fn normalize(&self, text: &str) -> Option<String> {
        let mut cleaned: String = text
            .chars()
            .filter(|c| !c.is_whitespace() && *c != '\u{a0}')
            .collect();
        if let NumberFormat::Currency(c) = self {
            for symbol in [&c.symbol_left, &c.symbol_right] {
                if !symbol.is_empty() {
                    cleaned = cleaned.replace(symbol.as_str(), "");
                }
            }
        }
        let (thousands, decimal) = self.separators();
        canonical_number(&cleaned, thousands, decimal)
    }

    /// Parse `text` as a number in this format.
    #[must_use]
    pub fn parse(&self, text: &str) -> Option<f64> {
        self.normalize(text)?.parse::<f64>().ok()
    }

    /// Format a number the way this field displays it.
    #[must_use]
    pub fn format(&self, value: f64, decimals: usize) -> String {
        let plain = format!("{:.*}", decimals, value.abs());
        let (int_part, frac_part) = match plain.split_once('.') {
            Some((i, f)) => (i.to_owned(), Some(f.to_owned())),
            None => (plain, None),
        };
        let (thousands, decimal) = self.separators();
        let mut grouped = String::new();
        for (i, ch) in int_part.chars().enumerate() {
            if i > 0 && (int_part.len() - i) % 3 == 0 {
                grouped.push(thousands);
            }
            grouped.push(ch);
        }
        let sign = if value < 0.0 { "-" } else { "" };
        let mut out = format!("{sign}{grouped}");
        if let Some(frac) = frac_part {
            out.push(decimal);
            out.push_str(&frac);
        }
        match self {
            NumberFormat::Currency(c) => format!("{}{out}{}", c.symbol_left, c.symbol_right),
            _ => out,
        }
    }
}

fn canonical_number(s: &str, thousands: char, decimal: char) -> Option<String> {
    let (negative, body) = match s.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, s),
    };
    let (int_part, frac_part) = match body.split_once(decimal) {
        Some((i, f)) => (i, Some(f)),
        None => (body, None),
    };

    if let Some(frac) = frac_part {
        if frac.is_empty() || !frac.chars().all(|c| c.is_ascii_digit()) {
            return None;
        }
    }

    let mut digits = String::new();
    if int_part.contains(thousands) {
        for (i, group) in int_part.split(thousands).enumerate() {
            let valid_len = if i == 0 {
                (1..=3).contains(&group.len())
            } else {
                group.len() == 3
            };
            if !valid_len || !group.chars().all(|c| c.is_ascii_digit()) {
                return None;
            }
            digits.push_str(group);
        }
    } else {
        if !int_part.chars().all(|c| c.is_ascii_digit()) {
            return None;
        }
        digits.push_str(int_part);
    }

    if digits.is_empty() && frac_part.is_none() {
        return None;
    }
    if digits.is_empty() {
        digits.push('0');
    }

    let mut out = String::with_capacity(digits.len() + 4);
    if negative {
        out.push('-');
    }
    out.push_str(&digits);
    if let Some(frac) = frac_part {
        out.push('.');
        out.push_str(frac);
    }
    Some(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decimal_dot() {
        let f = NumberFormat::DecimalDot;
        assert_eq!(f.normalize("1,234.50").as_deref(), Some("1234.50"));
        assert_eq!(f.parse("-12.5"), Some(-12.5));
        assert_eq!(f.parse(".5"), Some(0.5));
        assert_eq!(f.parse(" 42 "), Some(42.0));
        assert_eq!(f.parse("1,5"), None);
        assert_eq!(f.parse("abc"), None);
        assert_eq!(f.parse(""), None);
        assert_eq!(f.parse("12abc"), None);
    }

    #[test]
    fn decimal_comma() {
        let f = NumberFormat::DecimalComma;
        assert_eq!(f.normalize("1.234,5").as_deref(), Some("1234.5"));
        assert_eq!(f.parse("1,5"), Some(1.5));
        assert_eq!(f.parse("1.234"), Some(1234.0));
        assert_eq!(f.parse("1.23,4"), None);
    }

    #[test]
    fn currency_strips_symbol() {
        let usd = NumberFormat::Currency(CurrencyFormat::usd());
        assert_eq!(usd.parse("$1,000.25"), Some(1000.25));
        assert_eq!(usd.parse("-$5"), Some(-5.0));
        let eur = NumberFormat::Currency(CurrencyFormat::eur());
        assert_eq!(eur.parse("1.000,25 \u{20ac}"), Some(1000.25));
    }

    #[test]
    fn format_groups_thousands() {
        let usd = NumberFormat::Currency(CurrencyFormat::usd());
        assert_eq!(usd.format(1234.5, 2), "$1,234.50");
        assert_eq!(NumberFormat::DecimalComma.format(-1234567.0, 0), "-1.234.567");
        assert_eq!(NumberFormat::DecimalDot.format(12.0, 2), "12.00");
    }

    #[test]
    fn resolved_value_iterates_every_value() {
        let v = ResolvedValue::from(vec!["a", "b"]);
        assert_eq!(v.iter().collect::<Vec<_>>(), vec!["a", "b"]);
    }
}
