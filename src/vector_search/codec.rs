//! Vector literal codec
//!
//! Converts embeddings to and from the textual literal accepted by the
//! store's vector type: `[v0,v1,...,vn]`. Values are written with nine
//! significant digits in plain decimal notation, which is enough for an
//! `f32` to survive the round trip unchanged.

use crate::vector_search::error::{DecodeError, EncodingError};

/// Significant digits written per component.
pub const SIGNIFICANT_DIGITS: usize = 9;

/// Encode an embedding as a vector literal.
///
/// Fails on the first NaN or infinite component; such values are never
/// replaced or dropped.
pub fn encode(vector: &[f32]) -> Result<String, EncodingError> {
    let mut literal = String::with_capacity(vector.len() * 12 + 2);
    literal.push('[');

    for (index, &value) in vector.iter().enumerate() {
        if !value.is_finite() {
            return Err(EncodingError::NonFinite { index, value });
        }
        if index > 0 {
            literal.push(',');
        }
        push_component(&mut literal, value);
    }

    literal.push(']');
    Ok(literal)
}

/// Decode a vector literal, returning `None` when there is no usable vector.
///
/// Blank input, `[]`, and any component that does not parse all produce
/// `None`; a partial vector is never returned.
pub fn decode(literal: &str) -> Option<Vec<f32>> {
    try_decode(literal).ok()
}

/// Decode a vector literal, reporting why decoding failed.
pub fn try_decode(literal: &str) -> Result<Vec<f32>, DecodeError> {
    let trimmed = literal.trim();
    let inner = trimmed
        .trim_start_matches('[')
        .trim_end_matches(']')
        .trim();

    if inner.is_empty() {
        return Err(DecodeError::Empty);
    }

    inner
        .split(',')
        .enumerate()
        .map(|(index, token)| parse_component(index, token))
        .collect()
}

fn parse_component(index: usize, token: &str) -> Result<f32, DecodeError> {
    let token = token.trim();
    match token.parse::<f32>() {
        Ok(value) if value.is_finite() => Ok(value),
        _ => Err(DecodeError::InvalidComponent {
            index,
            token: token.to_string(),
        }),
    }
}

/// Append one finite component in plain decimal notation.
///
/// Scientific formatting is used only to obtain correctly rounded digits
/// and the decimal exponent; the digits are then laid out without an
/// exponent and trailing fractional zeros are removed.
fn push_component(out: &mut String, value: f32) {
    if value == 0.0 {
        out.push('0');
        return;
    }

    let scientific = format!("{:.*e}", SIGNIFICANT_DIGITS - 1, value.abs());
    let (mantissa, exponent) = match scientific.split_once('e') {
        Some(parts) => parts,
        None => (scientific.as_str(), "0"),
    };
    let exponent: i32 = exponent.parse().unwrap_or(0);
    let digits: String = mantissa.chars().filter(|c| c.is_ascii_digit()).collect();

    if value.is_sign_negative() {
        out.push('-');
    }

    let mut plain = String::with_capacity(digits.len() + 8);
    if exponent < 0 {
        plain.push_str("0.");
        for _ in 0..(-exponent - 1) {
            plain.push('0');
        }
        plain.push_str(&digits);
    } else {
        let integer_len = exponent as usize + 1;
        if integer_len >= digits.len() {
            plain.push_str(&digits);
            for _ in digits.len()..integer_len {
                plain.push('0');
            }
        } else {
            plain.push_str(&digits[..integer_len]);
            plain.push('.');
            plain.push_str(&digits[integer_len..]);
        }
    }

    if plain.contains('.') {
        let kept = plain.trim_end_matches('0').trim_end_matches('.').len();
        plain.truncate(kept);
    }

    out.push_str(&plain);
}
