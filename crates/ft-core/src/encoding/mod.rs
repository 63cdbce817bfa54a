//! Vector key encoding: per-position values and tokens to integer ids.

pub mod vector_key;

pub use vector_key::{
    encode, encode_incremental, encode_pair_sorted, encode_subset, str_list_vid, string_vid,
    DefaultTokenEncoder, TokenEncoder, EMPTY_VECT, NO_KEY, PLACEHOLDER,
};
