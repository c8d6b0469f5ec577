//! Textual forms of scalar values
//!
//! The VM uses one canonical float text form everywhere: the hexadecimal
//! float notation (`0x1.8000000000000p+1` for `3.0`). WRITE renders it and
//! both the program loader and READ parse it back. Decimal float text is
//! still accepted on input.
//!
//! String escapes (`\DDD`, three decimal digits) are stored verbatim and only
//! decoded when a string is written out.

/// Render a float in the canonical hexadecimal form.
///
/// Normal numbers use a leading `1.` and 13 hex digits of mantissa,
/// subnormals a leading `0.` with exponent `-1022`. Zero is `0x0.0p+0`.
pub fn format_float(value: f64) -> String {
    if value.is_nan() {
        return "nan".to_string();
    }
    if value.is_infinite() {
        return if value > 0.0 { "inf" } else { "-inf" }.to_string();
    }

    let sign = if value.is_sign_negative() { "-" } else { "" };
    if value == 0.0 {
        return format!("{}0x0.0p+0", sign);
    }

    let bits = value.to_bits();
    let biased = ((bits >> 52) & 0x7ff) as i32;
    let mantissa = bits & 0x000f_ffff_ffff_ffff;
    let (lead, exponent) = if biased == 0 {
        (0, -1022)
    } else {
        (1, biased - 1023)
    };
    let exp_sign = if exponent < 0 { '-' } else { '+' };

    format!(
        "{}0x{}.{:013x}p{}{}",
        sign,
        lead,
        mantissa,
        exp_sign,
        exponent.abs()
    )
}

/// Parse float text: hexadecimal float (`0x1.8p+1`, `-0x3p-2`) or decimal.
pub fn parse_float(text: &str) -> Option<f64> {
    let text = text.trim();
    let (negative, body) = split_sign(text);
    if body.is_empty() || body.starts_with(['+', '-']) {
        return None;
    }

    let magnitude = match body
        .strip_prefix("0x")
        .or_else(|| body.strip_prefix("0X"))
    {
        Some(hex) => parse_hex_float(hex)?,
        None => body.parse::<f64>().ok()?,
    };

    Some(if negative { -magnitude } else { magnitude })
}

/// Parse integer text: decimal, `0x` hexadecimal or `0o` octal, optional sign.
pub fn parse_int(text: &str) -> Option<i64> {
    let text = text.trim();
    let (negative, body) = split_sign(text);
    if body.is_empty() || body.starts_with(['+', '-']) {
        return None;
    }

    let magnitude = if let Some(hex) = body.strip_prefix("0x").or_else(|| body.strip_prefix("0X")) {
        u64::from_str_radix(hex, 16).ok()?
    } else if let Some(oct) = body.strip_prefix("0o").or_else(|| body.strip_prefix("0O")) {
        u64::from_str_radix(oct, 8).ok()?
    } else {
        if !body.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        body.parse::<u64>().ok()?
    };

    let signed = if negative {
        -(magnitude as i128)
    } else {
        magnitude as i128
    };
    i64::try_from(signed).ok()
}

/// Decode `\DDD` escapes into the character with that decimal code point.
///
/// A backslash that does not start a valid escape is dropped.
pub fn decode_escapes(text: &str) -> String {
    if !text.contains('\\') {
        return text.to_string();
    }

    let chars: Vec<char> = text.chars().collect();
    let mut out = String::with_capacity(text.len());
    let mut i = 0;

    while i < chars.len() {
        if chars[i] != '\\' {
            out.push(chars[i]);
            i += 1;
            continue;
        }

        if let Some(decoded) = chars.get(i + 1..i + 4).and_then(escape_code) {
            out.push(decoded);
            i += 4;
        } else {
            i += 1;
        }
    }

    out
}

fn escape_code(digits: &[char]) -> Option<char> {
    if !digits.iter().all(|c| c.is_ascii_digit()) {
        return None;
    }
    let code = digits
        .iter()
        .fold(0u32, |acc, c| acc * 10 + c.to_digit(10).unwrap_or(0));
    char::from_u32(code)
}

fn split_sign(text: &str) -> (bool, &str) {
    if let Some(rest) = text.strip_prefix('-') {
        (true, rest)
    } else if let Some(rest) = text.strip_prefix('+') {
        (false, rest)
    } else {
        (false, text)
    }
}

fn parse_hex_float(text: &str) -> Option<f64> {
    let (digits, exponent) = match text.find(['p', 'P']) {
        Some(pos) => (&text[..pos], text[pos + 1..].parse::<i64>().ok()?),
        None => (text, 0),
    };
    let (int_part, frac_part) = digits.split_once('.').unwrap_or((digits, ""));
    if int_part.is_empty() && frac_part.is_empty() {
        return None;
    }

    // Keep at most ~60 significant bits; the rest only shifts the exponent.
    // A dropped non-zero digit sets the sticky low bit so rounding to f64
    // still sees it.
    const LIMIT: u64 = 1 << 59;
    let mut mantissa: u64 = 0;
    let mut exponent = exponent;

    for c in int_part.chars() {
        let digit = u64::from(c.to_digit(16)?);
        if mantissa < LIMIT {
            mantissa = mantissa * 16 + digit;
        } else {
            exponent += 4;
            if digit != 0 {
                mantissa |= 1;
            }
        }
    }
    for c in frac_part.chars() {
        let digit = u64::from(c.to_digit(16)?);
        if mantissa < LIMIT {
            mantissa = mantissa * 16 + digit;
            exponent -= 4;
        } else if digit != 0 {
            mantissa |= 1;
        }
    }

    Some(scale_by_pow2(mantissa as f64, exponent))
}

fn scale_by_pow2(mut value: f64, mut exponent: i64) -> f64 {
    while exponent != 0 && value != 0.0 && value.is_finite() {
        let step = exponent.clamp(-1000, 1000);
        let factor = 2f64.powi(step.unsigned_abs() as i32);
        if step > 0 {
            value *= factor;
        } else {
            value /= factor;
        }
        exponent -= step;
    }
    value
}
