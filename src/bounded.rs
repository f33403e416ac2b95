//! Length-capped strings for the flat device record

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::ops::Deref;

/// A UTF-8 string holding at most `N - 1` bytes.
///
/// The cap matches a C buffer of `N` bytes with room for the terminating
/// NUL, so the value can always be copied into such a buffer unchanged.
/// Longer input is truncated on a character boundary.
#[derive(Clone, Default, PartialEq, Eq, Hash)]
pub struct BoundedString<const N: usize> {
    value: String,
}

impl<const N: usize> BoundedString<N> {
    /// Maximum number of bytes held
    pub const CAPACITY: usize = if N == 0 { 0 } else { N - 1 };

    /// Create a bounded string, truncating if needed
    pub fn new(s: &str) -> Self {
        let (value, _) = Self::truncate(s);
        Self {
            value: value.to_string(),
        }
    }

    /// Create a bounded string, reporting whether input was cut
    pub fn new_checked(s: &str) -> (Self, bool) {
        let (value, truncated) = Self::truncate(s);
        (
            Self {
                value: value.to_string(),
            },
            truncated,
        )
    }

    fn truncate(s: &str) -> (&str, bool) {
        if s.len() <= Self::CAPACITY {
            return (s, false);
        }
        let mut end = Self::CAPACITY;
        while !s.is_char_boundary(end) {
            end -= 1;
        }
        (&s[..end], true)
    }

    /// Borrow the contents
    pub fn as_str(&self) -> &str {
        &self.value
    }

    /// Copy into a NUL-terminated byte buffer of the same capacity
    pub fn copy_to_buffer(&self, buf: &mut [u8; N]) {
        buf.fill(0);
        let bytes = self.value.as_bytes();
        buf[..bytes.len()].copy_from_slice(bytes);
    }
}

impl<const N: usize> Deref for BoundedString<N> {
    type Target = str;

    fn deref(&self) -> &str {
        &self.value
    }
}

impl<const N: usize> From<&str> for BoundedString<N> {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl<const N: usize> fmt::Display for BoundedString<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.value)
    }
}

impl<const N: usize> fmt::Debug for BoundedString<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&self.value, f)
    }
}

impl<const N: usize> Serialize for BoundedString<N> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.value)
    }
}

impl<'de, const N: usize> Deserialize<'de> for BoundedString<N> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Ok(Self::new(&s))
    }
}
