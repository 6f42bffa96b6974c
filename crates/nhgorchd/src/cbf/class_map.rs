//! Forwarding class to member index map.

use crate::error::{NhgError, Result};
use std::collections::BTreeMap;
use std::fmt;

/// Highest forwarding class value.
pub const MAX_FORWARDING_CLASS: u8 = 63;

/// Validated `fc:index` map of a class-based group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassMap(BTreeMap<u8, u8>);

impl ClassMap {
    /// Parses a `class_map` field such as `0:0,1:0,4:1` for a group with
    /// `member_count` members.
    ///
    /// Every forwarding class appears at most once and is in
    /// `0..=MAX_FORWARDING_CLASS`; every index names an existing member.
    /// Several classes may share a member.
    pub fn parse(text: &str, member_count: usize) -> Result<Self> {
        let text = text.trim();
        if text.is_empty() {
            return Err(NhgError::class_map("empty class map"));
        }

        let mut map = BTreeMap::new();
        for pair in text.split(',') {
            let (fc, index) = pair
                .split_once(':')
                .ok_or_else(|| NhgError::class_map(format!("'{}' is not fc:index", pair)))?;

            let fc: u8 = fc
                .trim()
                .parse()
                .map_err(|_| NhgError::class_map(format!("invalid forwarding class '{}'", fc)))?;
            if fc > MAX_FORWARDING_CLASS {
                return Err(NhgError::class_map(format!(
                    "forwarding class {} out of range 0-{}",
                    fc, MAX_FORWARDING_CLASS
                )));
            }

            let index: u8 = index
                .trim()
                .parse()
                .map_err(|_| NhgError::class_map(format!("invalid member index '{}'", index)))?;
            if usize::from(index) >= member_count {
                return Err(NhgError::class_map(format!(
                    "member index {} out of range for {} members",
                    index, member_count
                )));
            }

            if map.insert(fc, index).is_some() {
                return Err(NhgError::class_map(format!(
                    "forwarding class {} mapped twice",
                    fc
                )));
            }
        }

        Ok(Self(map))
    }

    pub fn as_map(&self) -> &BTreeMap<u8, u8> {
        &self.0
    }

    /// Member index traffic of `fc` is sent to.
    pub fn member_for(&self, fc: u8) -> Option<u8> {
        self.0.get(&fc).copied()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for ClassMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, (fc, index)) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            write!(f, "{}:{}", fc, index)?;
        }
        Ok(())
    }
}
