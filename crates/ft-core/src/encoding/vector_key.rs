//! Deterministic vector and token keys.
//!
//! Keys are hashes, not bijections. Two different contexts can collide and
//! share one accumulator; the model tolerates this as a rare misprediction
//! and nothing downstream assumes keys are unique.
//!
//! One known collision class: in the digit hash a `0` value contributes no
//! digits, so for vectors of three or more values `[0, 5, 7]`, `[5, 0, 7]`
//! and `[5, 7, 0]` share a key.
//!
//! Layout by vector length:
//! - 1 value: the value itself
//! - 2 values: `(v1 << 32) | ((v0 * 37) & 0xffff_ffff)`
//! - longer: a 64-bit polynomial hash over the decimal digits of each value

use ft_common::VectorId;

const PRIME: i64 = 59;
const PRIME2: i64 = 37;
const PRIME_START: i32 = 17;
const PRIME_BASE: i64 = 1_125_899_906_842_597;

/// Stand-in for a dependent tier a number set does not read.
pub const PLACEHOLDER: i32 = 1975;

/// Token id of an empty or missing element (the hash of `" "`).
pub const EMPTY_VECT: i32 = 1035;

/// Incremental encoding start state.
pub const NO_KEY: VectorId = -1;

/// Encodes a whole vector.
pub fn encode(values: &[i32]) -> VectorId {
    match values {
        [] => 0,
        [v] => *v as i64,
        [v0, v1] => pair(*v0, *v1),
        _ => values.iter().fold(0, |cur, &v| fold_digits(cur, v)),
    }
}

/// Feeds one value into a running key for a vector of `len` values.
///
/// Start from [`NO_KEY`]; after `len` calls the result equals
/// `encode` of the same values.
pub fn encode_incremental(len: usize, value: i32, cur: VectorId) -> VectorId {
    match len {
        1 => value as i64,
        2 if cur == NO_KEY => low_half(value),
        2 => ((value as i64) << 32) | cur,
        _ => fold_digits(if cur == NO_KEY { 0 } else { cur }, value),
    }
}

/// Key of the values at `subset` offsets within a stored full vector.
///
/// Offsets beyond the stored vector read as [`EMPTY_VECT`]. When the subset
/// is the whole stored vector but `full` disagrees on width, the key is 0.
pub fn encode_subset(stored: &[i32], full: &[usize], subset: &[usize]) -> VectorId {
    if stored.len() == subset.len() {
        if stored.len() != full.len() {
            return 0;
        }
        return encode(stored);
    }
    let at = |off: usize| stored.get(off).copied().unwrap_or(EMPTY_VECT);
    match subset {
        [] => 0,
        [a] => at(*a) as i64,
        [a, b] => pair(at(*a), at(*b)),
        _ => subset.iter().fold(0, |cur, &off| fold_digits(cur, at(off))),
    }
}

/// Order-insensitive pair key.
pub fn encode_pair_sorted(a: i32, b: i32) -> VectorId {
    if a <= b {
        pair(a, b)
    } else {
        pair(b, a)
    }
}

fn pair(v0: i32, v1: i32) -> VectorId {
    ((v1 as i64) << 32) | low_half(v0)
}

fn low_half(v: i32) -> VectorId {
    ((v as i64).wrapping_mul(PRIME2)) & 0xffff_ffff
}

fn fold_digits(cur: i64, value: i32) -> i64 {
    let mut cur = if cur == 0 { PRIME_BASE } else { cur };
    let mut num = value as i64;
    if num < 0 {
        cur = cur.wrapping_mul(PRIME).wrapping_add(b'-' as i64);
        num = -num;
    }
    while num > 0 {
        cur = cur.wrapping_mul(PRIME).wrapping_add(num % 10 + b'0' as i64);
        num /= 10;
    }
    cur
}

/// Token id for a string, over its UTF-16 code units.
///
/// Two-unit tokens use a separate mix so short tokens spread apart.
pub fn string_vid(token: &str) -> i32 {
    let units: Vec<u16> = token.encode_utf16().collect();
    match units.as_slice() {
        [] => EMPTY_VECT,
        [c0, c1] => {
            let mut res = mix(PRIME_START, *c0);
            res = mix(res, b'~' as u16);
            res = mix(res, b' ' as u16);
            mix(res, *c1)
        }
        _ => units.iter().fold(PRIME_START, |acc, &u| mix(acc, u)),
    }
}

/// Token id for a space-joined token list.
pub fn str_list_vid<S: AsRef<str>>(tokens: &[S]) -> i32 {
    if tokens.is_empty() {
        return EMPTY_VECT;
    }
    let mut result = PRIME_START;
    for (i, token) in tokens.iter().enumerate() {
        result = token
            .as_ref()
            .encode_utf16()
            .fold(result, |acc, u| mix(acc, u));
        if i + 1 != tokens.len() {
            result = mix(result, b' ' as u16);
        }
    }
    result
}

fn mix(acc: i32, unit: u16) -> i32 {
    acc.wrapping_mul(PRIME as i32).wrapping_add(unit as i32)
}

/// Turns raw frame elements into per-position ids.
pub trait TokenEncoder: Send + Sync {
    fn token_vid(&self, token: &str) -> i32;

    /// Id for an absent element.
    fn empty_vid(&self) -> i32 {
        EMPTY_VECT
    }

    fn int_vid(&self, value: i64) -> i32 {
        // narrowing keeps the low bits, matching the wire ids of stored models
        value as i32
    }

    fn bool_vid(&self, value: bool) -> i32 {
        value as i32
    }
}

/// String hashing with [`string_vid`].
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultTokenEncoder;

impl TokenEncoder for DefaultTokenEncoder {
    fn token_vid(&self, token: &str) -> i32 {
        string_vid(token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_vectors() {
        assert_eq!(encode(&[42]), 42);
        assert_eq!(encode(&[-3]), -3);
        assert_eq!(encode(&[2, 5]), (5i64 << 32) | 74);
    }

    #[test]
    fn test_pair_masks_negative_low_half() {
        let key = encode(&[-1, 1]);
        assert_eq!(key >> 32, 1);
        assert_eq!(key & 0xffff_ffff, (-37i64) & 0xffff_ffff);
    }

    #[test]
    fn test_zero_values_collide_in_digit_fold() {
        let key = encode(&[0, 5, 7]);
        assert_eq!(encode(&[5, 0, 7]), key);
        assert_eq!(encode(&[5, 7, 0]), key);
        assert_ne!(encode(&[5, 7, 1]), key);
    }

    #[test]
    fn test_long_vector_digit_fold() {
        // one digit per value: cur = 59 * cur + ('0' + d)
        let expected = [1i64, 2, 3].iter().fold(PRIME_BASE, |cur, d| {
            cur.wrapping_mul(59).wrapping_add(48 + d)
        });
        assert_eq!(encode(&[1, 2, 3]), expected);
        assert_ne!(encode(&[1, 2, 3]), encode(&[3, 2, 1]));
        assert_ne!(encode(&[1, 2, 3]), encode(&[-1, 2, 3]));
    }

    #[test]
    fn test_incremental_matches_whole() {
        for values in [vec![7], vec![7, -9], vec![1, 22, 333, -4444]] {
            let key = values
                .iter()
                .fold(NO_KEY, |cur, &v| encode_incremental(values.len(), v, cur));
            assert_eq!(key, encode(&values), "{values:?}");
        }
    }

    #[test]
    fn test_subset_reads_stored_positions() {
        let stored = [10, 20, 30, 40];
        let full = [0, 1, 2, 3];
        assert_eq!(encode_subset(&stored, &full, &[2]), 30);
        assert_eq!(encode_subset(&stored, &full, &[1, 3]), encode(&[20, 40]));
        assert_eq!(encode_subset(&stored, &full, &[0, 1, 3]), encode(&[10, 20, 40]));
        assert_eq!(encode_subset(&stored, &full, &full), encode(&stored));
        assert_eq!(encode_subset(&stored, &full, &[9]), EMPTY_VECT as i64);
        assert_eq!(encode_subset(&stored, &[0, 1], &full), 0);
    }

    #[test]
    fn test_pair_sorted_is_symmetric() {
        assert_eq!(encode_pair_sorted(4, 9), encode_pair_sorted(9, 4));
        assert_eq!(encode_pair_sorted(4, 9), encode(&[4, 9]));
    }

    #[test]
    fn test_string_vids() {
        assert_eq!(string_vid(""), EMPTY_VECT);
        assert_eq!(string_vid(" "), EMPTY_VECT);
        assert_eq!(string_vid("a"), 17 * 59 + 97);
        let two = ((((17 * 59 + 'o' as i32) * 59 + '~' as i32) * 59) + ' ' as i32) * 59 + 'k' as i32;
        assert_eq!(string_vid("ok"), two);
        assert_ne!(string_vid("ok"), string_vid("ko"));
    }

    #[test]
    fn test_str_list_vid_joins_with_space() {
        assert_eq!(str_list_vid::<&str>(&[]), EMPTY_VECT);
        assert_eq!(str_list_vid(&["abc", "de"]), string_vid("abc de"));
    }

    #[test]
    fn test_default_encoder() {
        let enc = DefaultTokenEncoder;
        assert_eq!(enc.token_vid("the"), string_vid("the"));
        assert_eq!(enc.int_vid(5), 5);
        assert_eq!(enc.bool_vid(true), 1);
        assert_eq!(enc.empty_vid(), EMPTY_VECT);
    }
}
