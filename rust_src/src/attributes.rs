//! Fixed-length binary attribute patterns for cognitive diagnosis models.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use crate::error::{CatError, Result};

/// Largest supported number of attributes.
pub const MAX_ATTRIBUTES: usize = 32;

/// A mastery pattern over `K` attributes.
///
/// Attribute `i` is stored as bit `i`, so [`Attributes::as_int`] weights it by
/// `2^i`. The string form lists attributes left to right, attribute 0 first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Attributes {
    bits: u32,
    len: u8,
}

impl Attributes {
    /// All-zero pattern of length `len`.
    pub fn new(len: usize) -> Result<Self> {
        if len == 0 || len > MAX_ATTRIBUTES {
            return Err(CatError::InvalidPattern(format!(
                "attribute count must be in 1..={MAX_ATTRIBUTES}, got {len}"
            )));
        }
        Ok(Self {
            bits: 0,
            len: len as u8,
        })
    }

    /// Pattern of length `len` whose integer encoding is `value`.
    pub fn from_int(len: usize, value: u32) -> Result<Self> {
        let mut attrs = Self::new(len)?;
        if len < MAX_ATTRIBUTES && value >> len != 0 {
            return Err(CatError::InvalidPattern(format!(
                "value {value} does not fit in {len} attributes"
            )));
        }
        attrs.bits = value;
        Ok(attrs)
    }

    /// Every pattern of length `len`, in increasing integer order.
    pub fn all(len: usize) -> Result<impl Iterator<Item = Attributes>> {
        Self::new(len)?;
        let count: u64 = 1u64 << len;
        Ok((0..count).map(move |v| Attributes {
            bits: v as u32,
            len: len as u8,
        }))
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len as usize
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn get(&self, index: usize) -> Result<bool> {
        self.check_index(index)?;
        Ok(self.bits & (1 << index) != 0)
    }

    pub fn set(&mut self, index: usize, value: bool) -> Result<()> {
        self.check_index(index)?;
        if value {
            self.bits |= 1 << index;
        } else {
            self.bits &= !(1 << index);
        }
        Ok(())
    }

    /// Unchecked read for callers that already validated `index`.
    #[inline]
    pub(crate) fn bit(&self, index: usize) -> bool {
        self.bits & (1 << index) != 0
    }

    #[inline]
    pub fn as_int(&self) -> u32 {
        self.bits
    }

    pub fn as_string(&self) -> String {
        (0..self.len())
            .map(|i| if self.bit(i) { '1' } else { '0' })
            .collect()
    }

    /// Number of positions at which two equal-length patterns differ.
    pub fn hamming(&self, other: &Attributes) -> u32 {
        (self.bits ^ other.bits).count_ones()
    }

    fn check_index(&self, index: usize) -> Result<()> {
        if index >= self.len() {
            Err(CatError::IndexOutOfRange {
                index,
                len: self.len(),
            })
        } else {
            Ok(())
        }
    }
}

impl Ord for Attributes {
    fn cmp(&self, other: &Self) -> Ordering {
        self.bits
            .cmp(&other.bits)
            .then_with(|| self.len.cmp(&other.len))
    }
}

impl PartialOrd for Attributes {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl FromStr for Attributes {
    type Err = CatError;

    /// Parses `0`/`1` characters; whitespace is ignored.
    fn from_str(s: &str) -> Result<Self> {
        let digits: Vec<char> = s.chars().filter(|c| !c.is_whitespace()).collect();
        let mut attrs = Self::new(digits.len())?;
        for (i, c) in digits.into_iter().enumerate() {
            match c {
                '0' => {}
                '1' => attrs.bits |= 1 << i,
                other => {
                    return Err(CatError::InvalidPattern(format!(
                        "unexpected character {other:?} in {s:?}"
                    )))
                }
            }
        }
        Ok(attrs)
    }
}

impl fmt::Display for Attributes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.as_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn string_form_lists_attribute_zero_first() {
        let a: Attributes = "100".parse().unwrap();
        assert_eq!(a.as_int(), 1);
        assert!(a.get(0).unwrap());
        assert!(!a.get(2).unwrap());
        assert_eq!(a.to_string(), "100");

        let b: Attributes = "0 0 1 1".parse().unwrap();
        assert_eq!(b.len(), 4);
        assert_eq!(b.as_int(), 12);
    }

    #[test]
    fn rejects_bad_patterns() {
        assert!("".parse::<Attributes>().is_err());
        assert!("012".parse::<Attributes>().is_err());
        assert!(Attributes::new(33).is_err());
        assert!(Attributes::from_int(3, 8).is_err());
        let mut a = Attributes::new(3).unwrap();
        assert!(matches!(
            a.set(3, true),
            Err(CatError::IndexOutOfRange { index: 3, len: 3 })
        ));
    }

    #[test]
    fn enumerates_every_pattern_in_order() {
        let all: Vec<_> = Attributes::all(3).unwrap().collect();
        assert_eq!(all.len(), 8);
        for (i, a) in all.iter().enumerate() {
            assert_eq!(a.as_int(), i as u32);
        }
        assert!(all.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn full_width_patterns_are_supported() {
        let a = Attributes::from_int(32, u32::MAX).unwrap();
        assert_eq!(a.as_string(), "1".repeat(32));
        assert_eq!(a.as_string().parse::<Attributes>().unwrap(), a);
    }

    #[test]
    fn set_and_hamming() {
        let mut a = Attributes::new(4).unwrap();
        a.set(1, true).unwrap();
        a.set(3, true).unwrap();
        assert_eq!(a.as_string(), "0101");
        a.set(3, false).unwrap();
        let b: Attributes = "1100".parse().unwrap();
        assert_eq!(a.hamming(&b), 1);
    }
}
