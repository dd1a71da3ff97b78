//! Punycode variant used for identifiers in Swift manglings.
//!
//! This follows [RFC 3492](https://www.rfc-editor.org/rfc/rfc3492) with two
//! differences that keep the output inside the mangling alphabet:
//!
//! * `_` is the delimiter instead of `-`.
//! * digits are `a-z` followed by `A-J` instead of `a-z` followed by `0-9`,
//!   as mangled identifiers are case-sensitive and can't start with a digit.
//!
//! Encoding can optionally fold ASCII characters that aren't valid in a
//! symbol (anything besides `[A-Za-z0-9_$]`) into `0xD800 + c`. Such values
//! are not valid `char`s, which is why code points are handled as `u32`.

const BASE: u32 = 36;
const TMIN: u32 = 1;
const TMAX: u32 = 26;
const SKEW: u32 = 38;
const DAMP: u32 = 700;
const INITIAL_BIAS: u32 = 72;
const INITIAL_N: u32 = 128;

const DELIMITER: u32 = b'_' as u32;

/// Start of the range non-symbol ASCII characters are folded into.
const MAPPED_BASE: u32 = 0xD800;
const MAPPED_END: u32 = 0xD880;

/// Encode `text` so it can be embedded in a mangled name.
///
/// Returns `None` if `text` can't be represented, which only happens for
/// arithmetic overflow on absurdly long inputs.
pub fn encode(text: &str, map_non_symbol_chars: bool) -> Option<String> {
    let input: Vec<u32> = text
        .chars()
        .map(|c| {
            let c = c as u32;
            if c < 0x80 && map_non_symbol_chars && !is_valid_symbol_char(c as u8) {
                c + MAPPED_BASE
            } else {
                c
            }
        })
        .collect();

    let encoded = encode_code_points(&input)?;

    // every digit and the delimiter are ascii
    Some(encoded.into_iter().map(|c| c as u8 as char).collect())
}

/// Decode a punycode payload taken from a mangled identifier.
pub fn decode(encoded: &str) -> Option<String> {
    let input: Vec<u32> = encoded.chars().map(|c| c as u32).collect();
    let decoded = decode_code_points(&input)?;

    decoded
        .into_iter()
        .map(|c| {
            if (MAPPED_BASE..MAPPED_END).contains(&c) {
                char::from_u32(c - MAPPED_BASE)
            } else {
                char::from_u32(c)
            }
        })
        .collect()
}

/// Whether the byte can appear in a mangled symbol unescaped.
#[inline]
pub fn is_valid_symbol_char(c: u8) -> bool {
    c.is_ascii_alphanumeric() || c == b'_' || c == b'$'
}

/// Whether `ident` has characters which require it to be punycoded.
#[inline]
pub fn needs_encoding(ident: &str) -> bool {
    !ident.bytes().all(is_valid_symbol_char)
}

fn digit_value(digit: u32) -> u32 {
    if digit < 26 {
        b'a' as u32 + digit
    } else {
        b'A' as u32 + digit - 26
    }
}

fn digit_index(value: u32) -> Option<u32> {
    match value {
        0x61..=0x7a => Some(value - b'a' as u32),
        0x41..=0x4a => Some(value - b'A' as u32 + 26),
        _ => None,
    }
}

fn is_valid_unicode_scalar(c: u32) -> bool {
    // the range 0xD800..0xD880 is used for non-symbol ascii characters
    c < MAPPED_END || (0xE000..=0x1FFFFF).contains(&c)
}

fn threshold(k: u32, bias: u32) -> u32 {
    if k <= bias {
        TMIN
    } else if k >= bias + TMAX {
        TMAX
    } else {
        k - bias
    }
}

// section 6.1: bias adaptation function
fn adapt(mut delta: u32, numpoints: u32, firsttime: bool) -> u32 {
    delta /= if firsttime { DAMP } else { 2 };
    delta += delta / numpoints;

    let mut k = 0;
    while delta > ((BASE - TMIN) * TMAX) / 2 {
        delta /= BASE - TMIN;
        k += BASE;
    }

    k + (((BASE - TMIN + 1) * delta) / (delta + SKEW))
}

// section 6.2: decoding procedure
fn decode_code_points(input: &[u32]) -> Option<Vec<u32>> {
    let mut output = Vec::with_capacity(input.len());

    let mut n = INITIAL_N;
    let mut i: u32 = 0;
    let mut bias = INITIAL_BIAS;

    // consume all code points before the last delimiter and copy them
    let mut remainder = input;
    if let Some(last) = input.iter().rposition(|&c| c == DELIMITER) {
        for &c in &input[..last] {
            if c > 0x7f {
                return None;
            }
            output.push(c);
        }
        remainder = &input[last + 1..];
    }

    let mut remainder = remainder.iter();
    while remainder.len() > 0 {
        let oldi = i;
        let mut w: u32 = 1;
        let mut k = BASE;

        loop {
            let digit = digit_index(*remainder.next()?)?;

            i = i.checked_add(digit.checked_mul(w)?)?;
            let t = threshold(k, bias);
            if digit < t {
                break;
            }

            w = w.checked_mul(BASE - t)?;
            k = k.checked_add(BASE)?;
        }

        let len = output.len() as u32 + 1;
        bias = adapt(i - oldi, len, oldi == 0);
        n = n.checked_add(i / len)?;
        i %= len;

        // basic code points must come before the delimiter
        if n < 0x80 {
            return None;
        }

        output.insert(i as usize, n);
        i += 1;
    }

    Some(output)
}

// section 6.3: encoding procedure
fn encode_code_points(input: &[u32]) -> Option<Vec<u32>> {
    let mut output = Vec::with_capacity(input.len());

    let mut n = INITIAL_N;
    let mut delta: u32 = 0;
    let mut bias = INITIAL_BIAS;

    // copy the basic code points in order
    let mut h: u32 = 0;
    for &c in input {
        if !is_valid_unicode_scalar(c) {
            return None;
        }

        if c < 0x80 {
            h += 1;
            output.push(c);
        }
    }

    // followed by a delimiter if there were any
    let b = h;
    if b > 0 {
        output.push(DELIMITER);
    }

    while (h as usize) < input.len() {
        // the minimum code point >= n in the input
        let m = input.iter().copied().filter(|&c| c >= n).min()?;

        delta = delta.checked_add((m - n).checked_mul(h + 1)?)?;
        n = m;

        for &c in input {
            if c < n {
                delta = delta.checked_add(1)?;
            }

            if c == n {
                let mut q = delta;
                let mut k = BASE;
                loop {
                    let t = threshold(k, bias);
                    if q < t {
                        break;
                    }

                    output.push(digit_value(t + ((q - t) % (BASE - t))));
                    q = (q - t) / (BASE - t);
                    k += BASE;
                }

                output.push(digit_value(q));
                bias = adapt(delta, h + 1, h == b);
                delta = 0;
                h += 1;
            }
        }

        delta = delta.checked_add(1)?;
        n += 1;
    }

    Some(output)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mapping_non_symbol_chars() {
        assert_eq!(encode("a+!", true).as_deref(), Some("a_neEgDa"));
        assert_eq!(decode("a_neEgDa").as_deref(), Some("a+!"));
    }

    #[test]
    fn multi_script() {
        let input = "Привіт! 这样啊！那吃鱼吧。鱼可是你伯母的拿手菜 😄 الى اللقاء";
        let encoded = "rAaCbrFamDjrDlmbaaABawabaGetHAGgrAsegzarHEdnlagzGDrCmBgosdBGzeomosxosCeqEGdgfvdIdfcxEicaHBCADcsaadnGECJJabDIEe";

        assert_eq!(encode(input, true).as_deref(), Some(encoded));
        assert_eq!(decode(encoded).as_deref(), Some(input));
    }

    #[test]
    fn round_trip() {
        for input in ["", "abc", "ü", "a b", "€uro", "__$$__", "日本語", "\u{7f}x"] {
            let encoded = encode(input, true).unwrap();
            assert!(encoded.bytes().all(is_valid_symbol_char), "{encoded}");
            assert_eq!(decode(&encoded).as_deref(), Some(input));
        }
    }

    #[test]
    fn basic_code_points_unmapped() {
        assert_eq!(encode("a+!", false).as_deref(), Some("a+!_"));
    }

    #[test]
    fn invalid_payloads() {
        // '0' is not a punycode digit
        assert_eq!(decode("0"), None);
        // missing continuation digits
        assert_eq!(decode("z"), None);
        // non-basic code point before the delimiter
        assert_eq!(decode("ü_a"), None);
    }
}
