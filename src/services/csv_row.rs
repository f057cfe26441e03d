//! Quote-aware CSV line tokenizer and lenient field coercions
//!
//! The coercions never fail: malformed numeric text degrades to a default
//! so a single bad cell cannot sink a whole row.

/// Split one CSV line into fields.
///
/// A `"` toggles quoting, except `""` inside a quoted section which emits a
/// literal quote. Commas outside quotes end a field. The last field is always
/// emitted, even when empty.
pub fn split_line(line: &str) -> Vec<String> {
    let line = line.strip_suffix('\r').unwrap_or(line);
    let mut fields = Vec::new();
    let mut field = String::new();
    let mut in_quotes = false;
    let mut chars = line.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '"' if in_quotes && chars.peek() == Some(&'"') => {
                field.push('"');
                chars.next();
            }
            '"' => in_quotes = !in_quotes,
            ',' if !in_quotes => fields.push(std::mem::take(&mut field)),
            _ => field.push(c),
        }
    }
    fields.push(field);

    fields
}

/// Currency/decimal text such as `$1,234.50`
pub fn parse_decimal(raw: &str) -> f64 {
    let cleaned: String = raw.chars().filter(|c| *c != '$' && *c != ',').collect();
    finite_or_zero(cleaned.trim().parse().ok())
}

/// Percentage text such as `-0.5%`
pub fn parse_percentage(raw: &str) -> f64 {
    let cleaned = raw.replace('%', "");
    finite_or_zero(cleaned.trim().parse().ok())
}

/// Integer counts such as `1,000,000`
pub fn parse_count(raw: &str) -> i64 {
    let cleaned = raw.replace(',', "");
    cleaned.trim().parse().unwrap_or(0)
}

/// Optional integer such as an IPO year; blank or garbage is `None`
pub fn parse_optional_int(raw: &str) -> Option<i32> {
    raw.trim().parse().ok()
}

pub fn optional_string(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

fn finite_or_zero(value: Option<f64>) -> f64 {
    match value {
        Some(v) if v.is_finite() => v,
        _ => 0.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // ==========================================================================
    // Tokenizer
    // ==========================================================================

    #[test]
    fn test_split_plain_fields() {
        assert_eq!(split_line("AAPL,Apple Inc.,150.00"), vec!["AAPL", "Apple Inc.", "150.00"]);
    }

    #[test]
    fn test_split_quoted_field_with_comma_and_escaped_quote() {
        assert_eq!(split_line(r#""a,b""c""#), vec![r#"a,b"c"#]);
    }

    #[test]
    fn test_split_quoted_field_between_plain_fields() {
        let fields = split_line(r#"BRK.A,"Berkshire Hathaway, Inc.",$600000"#);
        assert_eq!(fields, vec!["BRK.A", "Berkshire Hathaway, Inc.", "$600000"]);
    }

    #[test]
    fn test_split_keeps_trailing_empty_fields() {
        assert_eq!(split_line("a,b,"), vec!["a", "b", ""]);
        assert_eq!(split_line("a,,"), vec!["a", "", ""]);
    }

    #[test]
    fn test_split_empty_line_yields_one_empty_field() {
        assert_eq!(split_line(""), vec![""]);
    }

    #[test]
    fn test_split_strips_carriage_return() {
        assert_eq!(split_line("a,b\r"), vec!["a", "b"]);
    }

    #[test]
    fn test_split_quote_toggles_mid_field() {
        // Quotes toggle state wherever they appear, not only at field start
        assert_eq!(split_line(r#"ab"c,d"e,f"#), vec!["abc,de", "f"]);
    }

    #[test]
    fn test_split_empty_quoted_field() {
        assert_eq!(split_line(r#""",x"#), vec!["", "x"]);
    }

    #[test]
    fn test_split_unterminated_quote_swallows_rest() {
        assert_eq!(split_line(r#"a,"b,c"#), vec!["a", "b,c"]);
    }

    // ==========================================================================
    // Coercions
    // ==========================================================================

    #[test]
    fn test_parse_decimal_strips_currency_and_grouping() {
        assert_eq!(parse_decimal("$1,234.50"), 1234.5);
        assert_eq!(parse_decimal("  150.00 "), 150.0);
        assert_eq!(parse_decimal("-1.25"), -1.25);
    }

    #[test]
    fn test_parse_decimal_malformed_is_zero() {
        for raw in ["N/A", "", "--", "   ", "NaN", "inf"] {
            assert_eq!(parse_decimal(raw), 0.0, "input {:?}", raw);
        }
    }

    #[test]
    fn test_parse_percentage() {
        assert_eq!(parse_percentage("0.5%"), 0.5);
        assert_eq!(parse_percentage(" -2.75 % "), -2.75);
        assert_eq!(parse_percentage("N/A"), 0.0);
        assert_eq!(parse_percentage(""), 0.0);
    }

    #[test]
    fn test_parse_count() {
        assert_eq!(parse_count("1,000,000"), 1_000_000);
        assert_eq!(parse_count(" 500 "), 500);
        assert_eq!(parse_count("--"), 0);
        assert_eq!(parse_count("12.5"), 0);
    }

    #[test]
    fn test_parse_optional_int() {
        assert_eq!(parse_optional_int(" 1980 "), Some(1980));
        assert_eq!(parse_optional_int(""), None);
        assert_eq!(parse_optional_int("N/A"), None);
    }

    #[test]
    fn test_optional_string() {
        assert_eq!(optional_string("  USA "), Some("USA".to_string()));
        assert_eq!(optional_string("   "), None);
    }
}
