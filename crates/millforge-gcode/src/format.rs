//! Number formatting for G-code words.

/// Format `value` rounded to `precision` fractional digits with trailing
/// zeros and a trailing decimal point removed. Negative zero prints as `0`.
pub fn format_number(value: f64, precision: usize) -> String {
    let mut s = format!("{:.prec$}", value, prec = precision);
    if s.contains('.') {
        let trimmed = s.trim_end_matches('0').trim_end_matches('.').len();
        s.truncate(trimmed);
    }
    if s == "-0" {
        s = "0".to_string();
    }
    s
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trailing_zeros_stripped() {
        assert_eq!(format_number(1.2, 3), "1.2");
        assert_eq!(format_number(10.0, 3), "10");
        assert_eq!(format_number(100.0, 0), "100");
        assert_eq!(format_number(-2.5, 4), "-2.5");
    }

    #[test]
    fn test_rounding() {
        assert_eq!(format_number(3.14159, 3), "3.142");
        assert_eq!(format_number(3.14159, 4), "3.1416");
        assert_eq!(format_number(0.99996, 4), "1");
    }

    #[test]
    fn test_negative_zero() {
        assert_eq!(format_number(-0.0, 3), "0");
        assert_eq!(format_number(-0.0001, 3), "0");
    }
}
