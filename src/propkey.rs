//! Property key
//!
//! A uniform representation of a property identifier as either a 32-bit
//! array index or an interned-string id, packed into a 64-bit word with a
//! high type bit. Any string that parses as a canonical array index (a
//! non-negative integer in `[0, 2^32-1)` with no leading zeros, no sign, no
//! fraction — `"0"` itself is the sole exception to the no-leading-zero
//! rule) is automatically converted to index form at construction.
//!
//! Ported structurally from `original_source/runtime/property_key.hh`
//! (`EsPropertyKey`'s `IS_STRING` flag bit and `from_str` canonicalization),
//! generalized to this spec's explicit 32-bit/32-bit split (spec §3).

use crate::strpool::StrId;

const IS_STRING_BIT: u64 = 1 << 63;

/// Packed property key: `index` (unsigned 32-bit array index) or `string`
/// (interned-string id). Equality is bitwise.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct PropKey(u64);

impl std::fmt::Debug for PropKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_index() {
            write!(f, "PropKey::Index({})", self.as_index())
        } else {
            write!(f, "PropKey::String({:?})", self.as_string())
        }
    }
}

impl PropKey {
    pub fn from_u32(i: u32) -> PropKey {
        PropKey(i as u64)
    }

    pub fn from_str_id(id: StrId) -> PropKey {
        PropKey(IS_STRING_BIT | id.0 as u64)
    }

    /// Attempts index conversion first (parsing `s` as a canonical `u32`
    /// with no leading zeros except for `"0"` itself, no sign, no
    /// fraction). On success the key is an index; otherwise it is a string
    /// key over the interned id returned by `intern`.
    pub fn from_str(s: &str, intern: impl FnOnce(&str) -> StrId) -> PropKey {
        if let Some(i) = canonical_array_index(s) {
            PropKey::from_u32(i)
        } else {
            PropKey::from_str_id(intern(s))
        }
    }

    pub fn is_index(&self) -> bool {
        self.0 & IS_STRING_BIT == 0
    }

    pub fn is_string(&self) -> bool {
        !self.is_index()
    }

    pub fn as_index(&self) -> u32 {
        debug_assert!(self.is_index());
        self.0 as u32
    }

    pub fn as_string(&self) -> StrId {
        debug_assert!(self.is_string());
        StrId((self.0 & !IS_STRING_BIT) as u32)
    }

    /// Renders an index key back to its canonical decimal form, or looks
    /// up a string key's interned text via `lookup`.
    pub fn to_string(&self, lookup: impl FnOnce(StrId) -> String) -> String {
        if self.is_index() {
            self.as_index().to_string()
        } else {
            lookup(self.as_string())
        }
    }
}

/// Parses `s` as a canonical array index: digits only, no leading `+`/`-`,
/// no leading zero unless the whole string is exactly `"0"`, value `< 2^32 - 1`
/// (the maximum array index per ES5 §15.4, which reserves `2^32 - 1` for
/// `length`).
fn canonical_array_index(s: &str) -> Option<u32> {
    if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    if s.len() > 1 && s.as_bytes()[0] == b'0' {
        return None;
    }
    let n: u64 = s.parse().ok()?;
    if n >= u32::MAX as u64 {
        return None;
    }
    Some(n as u32)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonical_indices_parse() {
        assert_eq!(canonical_array_index("0"), Some(0));
        assert_eq!(canonical_array_index("42"), Some(42));
        assert_eq!(canonical_array_index("4294967294"), Some(u32::MAX - 1));
    }

    #[test]
    fn non_canonical_strings_reject() {
        assert_eq!(canonical_array_index(""), None);
        assert_eq!(canonical_array_index("01"), None);
        assert_eq!(canonical_array_index("-1"), None);
        assert_eq!(canonical_array_index("1.5"), None);
        assert_eq!(canonical_array_index("4294967295"), None); // reserved for length
        assert_eq!(canonical_array_index("abc"), None);
    }

    #[test]
    fn from_str_prefers_index_form() {
        let key = PropKey::from_str("10", |_| StrId(999));
        assert!(key.is_index());
        assert_eq!(key.as_index(), 10);
    }

    #[test]
    fn from_str_falls_back_to_string_form() {
        let key = PropKey::from_str("foo", |s| {
            assert_eq!(s, "foo");
            StrId(7)
        });
        assert!(key.is_string());
        assert_eq!(key.as_string(), StrId(7));
    }

    #[test]
    fn equality_is_bitwise() {
        let a = PropKey::from_u32(5);
        let b = PropKey::from_str_id(StrId(5));
        assert_ne!(a, b); // same numeric payload, different tag bit
    }
}
