/// How a storefront writes numbers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NumberFormat {
    /// `$ 199.999,00`: `.` groups thousands, `,` marks decimals.
    Argentine,
    /// `$1,299.99`: `,` groups thousands, `.` marks decimals.
    Plain,
}

/// First run of digits and separators, starting at a digit.
fn number_token(text: &str) -> Option<&str> {
    let start = text.find(|c: char| c.is_ascii_digit())?;
    let rest = &text[start..];
    let len = rest
        .find(|c: char| !(c.is_ascii_digit() || c == '.' || c == ','))
        .unwrap_or(rest.len());
    Some(&rest[..len])
}

impl NumberFormat {
    /// Parses the first price-shaped token in `text`. Returns `None` when there
    /// is no token or the value is not positive.
    pub fn parse(&self, text: &str) -> Option<f64> {
        let token = number_token(text)?;
        let token = token.trim_end_matches(&['.', ','][..]);
        let normalized = match self {
            NumberFormat::Argentine => token.replace('.', "").replace(',', "."),
            NumberFormat::Plain => token.replace(',', ""),
        };
        normalized
            .parse::<f64>()
            .ok()
            .filter(|v| v.is_finite() && *v > 0.0)
    }
}

/// Strips `.` and `,` and accepts the rest only if it is all digits.
pub fn parse_integer_digits(raw: &str) -> Option<f64> {
    let cleaned: String = raw.chars().filter(|c| *c != '.' && *c != ',').collect();
    if cleaned.is_empty() || !cleaned.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    cleaned.parse::<f64>().ok().filter(|v| *v > 0.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn argentine_thousands_and_decimals() {
        let f = NumberFormat::Argentine;
        assert_eq!(f.parse("$ 199.999"), Some(199_999.0));
        assert_eq!(f.parse("$149.999,00"), Some(149_999.0));
        assert_eq!(f.parse("Precio: $ 1.234,50 ARS"), Some(1234.5));
    }

    #[test]
    fn plain_format_keeps_decimal_point() {
        let f = NumberFormat::Plain;
        assert_eq!(f.parse("$110"), Some(110.0));
        assert_eq!(f.parse("$1,299.99"), Some(1299.99));
        assert_eq!(f.parse("Sale $90.00 $110.00"), Some(90.0));
    }

    #[test]
    fn no_digits_or_zero_is_no_match() {
        assert_eq!(NumberFormat::Plain.parse("Sold out"), None);
        assert_eq!(NumberFormat::Argentine.parse("$ 0"), None);
        assert_eq!(NumberFormat::Plain.parse(""), None);
    }

    #[test]
    fn integer_digits_strip_separators() {
        assert_eq!(parse_integer_digits("199.999"), Some(199_999.0));
        assert_eq!(parse_integer_digits("1,234"), Some(1234.0));
        assert_eq!(parse_integer_digits("12a"), None);
        assert_eq!(parse_integer_digits(".,"), None);
    }
}
