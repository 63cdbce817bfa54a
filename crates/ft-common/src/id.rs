//! Identifier types for vector sets, number sets and trained models.
//!
//! Vector ids and value ids stay plain `i64` aliases: they are hash outputs
//! and arithmetic on them (negation for boolean complements, swapping in
//! reverse training) is part of the model. Ids that index into storage get
//! newtypes.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::num::NonZeroU32;

/// Encoded context key for one number set over one frame.
///
/// Negative sentinels: `-1` means "no key", `-2` means the frame had an empty
/// element where empties are disallowed.
pub type VectorId = i64;

/// Encoded target value.
pub type ValueId = i64;

/// 1-based handle into the vector set store.
///
/// Zero is not a valid id, so `Option<VectSetId>` is the "not tracked" state
/// and costs no extra space.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VectSetId(NonZeroU32);

impl VectSetId {
    /// Wrap a 1-based id. Returns `None` for zero.
    pub fn new(id: u32) -> Option<Self> {
        NonZeroU32::new(id).map(VectSetId)
    }

    /// Id for the slot at a 0-based store index.
    pub fn from_index(index: usize) -> Option<Self> {
        u32::try_from(index)
            .ok()
            .and_then(|i| i.checked_add(1))
            .and_then(Self::new)
    }

    /// The 1-based id.
    pub fn get(self) -> u32 {
        self.0.get()
    }

    /// The 0-based store index.
    pub fn index(self) -> usize {
        (self.0.get() - 1) as usize
    }
}

impl fmt::Display for VectSetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Position of a number set in a window's catalog, or in a model's set list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SetNumber(pub usize);

impl fmt::Display for SetNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<usize> for SetNumber {
    fn from(n: usize) -> Self {
        SetNumber(n)
    }
}

/// Model ID for tracking training runs.
///
/// Format: `ft-YYYYMMDD-HHMMSS-XXXX`
/// Example: `ft-20261019-143022-a7xq`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ModelId(pub String);

impl ModelId {
    /// Generate a new model ID.
    pub fn new() -> Self {
        let now = chrono::Utc::now();
        ModelId(format!(
            "ft-{}-{}-{}",
            now.format("%Y%m%d"),
            now.format("%H%M%S"),
            generate_base32_suffix()
        ))
    }

    /// Parse an existing model ID string.
    pub fn parse(s: &str) -> Option<Self> {
        if s.len() != 23 || !s.starts_with("ft-") {
            return None;
        }
        let bytes = s.as_bytes();
        if bytes.get(11) != Some(&b'-') || bytes.get(18) != Some(&b'-') {
            return None;
        }
        if !s[3..11].chars().all(|c| c.is_ascii_digit())
            || !s[12..18].chars().all(|c| c.is_ascii_digit())
        {
            return None;
        }
        if !s[19..23].chars().all(|c| matches!(c, 'a'..='z' | '2'..='7')) {
            return None;
        }
        Some(ModelId(s.to_string()))
    }
}

impl Default for ModelId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ModelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

fn generate_base32_suffix() -> String {
    let uuid = uuid::Uuid::new_v4();
    let bytes = uuid.as_bytes();
    let mut value = ((bytes[0] as u32) << 16) | ((bytes[1] as u32) << 8) | (bytes[2] as u32);
    value &= 0x000F_FFFF;
    let alphabet = b"abcdefghijklmnopqrstuvwxyz234567";
    let mut out = String::with_capacity(4);
    for shift in [15_u32, 10, 5, 0] {
        let idx = ((value >> shift) & 0x1F) as usize;
        out.push(alphabet[idx] as char);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vect_set_id_rejects_zero() {
        assert!(VectSetId::new(0).is_none());
        let id = VectSetId::new(7).unwrap();
        assert_eq!(id.get(), 7);
        assert_eq!(id.index(), 6);
    }

    #[test]
    fn test_vect_set_id_from_index() {
        assert_eq!(VectSetId::from_index(0).map(VectSetId::get), Some(1));
        assert_eq!(VectSetId::from_index(41).map(VectSetId::get), Some(42));
    }

    #[test]
    fn test_option_vect_set_id_is_niche_packed() {
        assert_eq!(
            std::mem::size_of::<Option<VectSetId>>(),
            std::mem::size_of::<u32>()
        );
    }

    #[test]
    fn test_model_id_format() {
        let mid = ModelId::new();
        assert!(mid.0.starts_with("ft-"));
        assert_eq!(mid.0.len(), 23);
        assert!(ModelId::parse(&mid.0).is_some());
    }

    #[test]
    fn test_model_id_parse_rejects_garbage() {
        assert!(ModelId::parse("pt-20260115-143022-a7xq").is_none());
        assert!(ModelId::parse("ft-2026011x-143022-a7xq").is_none());
        assert!(ModelId::parse("ft-short").is_none());
    }
}
