//! Number <-> text conversions following the player's formatting rules.

/// Renders a double the way scripts observe it: integers without a
/// fraction, everything else with up to 15 significant digits and an
/// exponent outside `1e-5..1e15`.
pub fn format_number(value: f64) -> String {
    if value.is_nan() {
        return String::from("NaN");
    }
    if value.is_infinite() {
        return String::from(if value > 0.0 { "Infinity" } else { "-Infinity" });
    }
    if value == 0.0 {
        return String::from("0");
    }
    if value.fract() == 0.0 && value.abs() < 1e15 {
        return format!("{}", value as i64);
    }

    let formatted = format!("{:.14e}", value.abs());
    let (mantissa, exponent) = formatted.split_once('e').unwrap_or((&formatted, "0"));
    let exponent: i32 = exponent.parse().unwrap_or(0);
    let mut digits: String = mantissa.chars().filter(char::is_ascii_digit).collect();
    while digits.len() > 1 && digits.ends_with('0') {
        digits.pop();
    }

    let mut out = String::new();
    if value < 0.0 {
        out.push('-');
    }
    if !(-5..15).contains(&exponent) {
        out.push_str(&digits[..1]);
        if digits.len() > 1 {
            out.push('.');
            out.push_str(&digits[1..]);
        }
        out.push('e');
        out.push(if exponent < 0 { '-' } else { '+' });
        out.push_str(&exponent.abs().to_string());
    } else if exponent < 0 {
        out.push_str("0.");
        for _ in 0..(-exponent - 1) {
            out.push('0');
        }
        out.push_str(&digits);
    } else {
        let int_len = exponent as usize + 1;
        if digits.len() <= int_len {
            out.push_str(&digits);
            for _ in digits.len()..int_len {
                out.push('0');
            }
        } else {
            out.push_str(&digits[..int_len]);
            out.push('.');
            out.push_str(&digits[int_len..]);
        }
    }
    out
}

/// Parses a whole string as a number. Anything that is not entirely a
/// numeric literal is `NaN`.
pub fn parse_number(text: &str, version: u8) -> f64 {
    let text = text.trim();
    if text.is_empty() {
        return if version < 5 { 0.0 } else { f64::NAN };
    }
    if let Some(hex) = text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        return match u32::from_str_radix(hex, 16) {
            Ok(n) => n as i32 as f64,
            Err(_) => f64::NAN,
        };
    }
    if !text
        .bytes()
        .all(|b| b.is_ascii_digit() || matches!(b, b'+' | b'-' | b'.' | b'e' | b'E'))
    {
        return f64::NAN;
    }
    text.parse::<f64>().unwrap_or(f64::NAN)
}

/// Parses the longest numeric prefix, as `parseFloat` does.
pub fn parse_float_prefix(text: &str) -> f64 {
    let text = text.trim_start();
    let bytes = text.as_bytes();
    let mut end = 0;
    let mut best = None;
    let mut seen_digit = false;
    let mut seen_dot = false;
    let mut seen_exp = false;
    while end < bytes.len() {
        let b = bytes[end];
        match b {
            b'0'..=b'9' => seen_digit = true,
            b'+' | b'-' if end == 0 || matches!(bytes[end - 1], b'e' | b'E') => {}
            b'.' if !seen_dot && !seen_exp => seen_dot = true,
            b'e' | b'E' if seen_digit && !seen_exp => seen_exp = true,
            _ => break,
        }
        end += 1;
        if seen_digit {
            if let Ok(n) = text[..end].parse::<f64>() {
                best = Some(n);
            }
        }
    }
    best.unwrap_or(f64::NAN)
}

/// Parses an integer prefix in `radix`, as `parseInt` does.
pub fn parse_int_prefix(text: &str, radix: Option<u32>) -> f64 {
    let text = text.trim_start();
    let (negative, rest) = match text.as_bytes().first() {
        Some(b'-') => (true, &text[1..]),
        Some(b'+') => (false, &text[1..]),
        _ => (false, text),
    };
    let (radix, rest) = match radix {
        Some(r) if !(2..=36).contains(&r) => return f64::NAN,
        Some(16) | None
            if rest.starts_with("0x") || rest.starts_with("0X") =>
        {
            (16, &rest[2..])
        }
        Some(r) => (r, rest),
        None => (10, rest),
    };
    let mut value = 0.0f64;
    let mut any = false;
    for c in rest.chars() {
        let Some(d) = c.to_digit(radix) else {
            break;
        };
        value = value * radix as f64 + d as f64;
        any = true;
    }
    if !any {
        return f64::NAN;
    }
    if negative { -value } else { value }
}

/// ECMAScript `ToInt32`: truncate, then wrap modulo 2^32.
pub fn to_int32(value: f64) -> i32 {
    if !value.is_finite() {
        return 0;
    }
    value.trunc().rem_euclid(4_294_967_296.0) as u32 as i32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_like_the_player() {
        assert_eq!(format_number(30.0), "30");
        assert_eq!(format_number(-2.5), "-2.5");
        assert_eq!(format_number(0.1 + 0.2), "0.3");
        assert_eq!(format_number(1e21), "1e+21");
        assert_eq!(format_number(1.5e-7), "1.5e-7");
        assert_eq!(format_number(0.001), "0.001");
        assert_eq!(format_number(123456.789), "123456.789");
        assert_eq!(format_number(f64::NAN), "NaN");
        assert_eq!(format_number(f64::NEG_INFINITY), "-Infinity");
        assert_eq!(format_number(1e15), "1e+15");
    }

    #[test]
    fn parses_whole_strings_only() {
        assert_eq!(parse_number(" 42 ", 7), 42.0);
        assert_eq!(parse_number("0x1A", 7), 26.0);
        assert_eq!(parse_number("1e3", 7), 1000.0);
        assert!(parse_number("12px", 7).is_nan());
        assert!(parse_number("inf", 7).is_nan());
        assert!(parse_number("", 7).is_nan());
        assert_eq!(parse_number("", 4), 0.0);
    }

    #[test]
    fn prefix_parsers() {
        assert_eq!(parse_float_prefix("3.5px"), 3.5);
        assert_eq!(parse_float_prefix("  -1e2x"), -100.0);
        assert!(parse_float_prefix("abc").is_nan());
        assert_eq!(parse_int_prefix("42abc", None), 42.0);
        assert_eq!(parse_int_prefix("-0x10", None), -16.0);
        assert_eq!(parse_int_prefix("ff", Some(16)), 255.0);
        assert!(parse_int_prefix("z", Some(10)).is_nan());
    }

    #[test]
    fn int32_wraps() {
        assert_eq!(to_int32(4294967297.0), 1);
        assert_eq!(to_int32(-1.9), -1);
        assert_eq!(to_int32(2147483648.0), i32::MIN);
        assert_eq!(to_int32(f64::NAN), 0);
    }
}
