//! MPLS label and label stack types.

use crate::ParseError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A 20-bit MPLS label value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub struct MplsLabel(u32);

impl MplsLabel {
    /// Largest encodable label value.
    pub const MAX: u32 = 0xF_FFFF;

    /// Creates a label, rejecting values wider than 20 bits.
    pub fn new(value: u32) -> Result<Self, ParseError> {
        if value > Self::MAX {
            return Err(ParseError::InvalidMplsLabel(value.to_string()));
        }
        Ok(MplsLabel(value))
    }

    pub const fn value(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for MplsLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for MplsLabel {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let value: u32 = s
            .trim()
            .parse()
            .map_err(|_| ParseError::InvalidMplsLabel(s.to_string()))?;
        MplsLabel::new(value)
    }
}

impl TryFrom<u32> for MplsLabel {
    type Error = ParseError;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        MplsLabel::new(value)
    }
}

impl From<MplsLabel> for u32 {
    fn from(label: MplsLabel) -> Self {
        label.0
    }
}

/// An ordered stack of MPLS labels, outermost first.
///
/// Text form is `/`-separated (`100/200`); the empty stack renders as
/// an empty string.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct LabelStack(Vec<MplsLabel>);

impl LabelStack {
    pub fn new(labels: Vec<MplsLabel>) -> Self {
        LabelStack(labels)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn labels(&self) -> &[MplsLabel] {
        &self.0
    }
}

impl fmt::Display for LabelStack {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, label) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str("/")?;
            }
            write!(f, "{}", label)?;
        }
        Ok(())
    }
}

impl FromStr for LabelStack {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.trim().is_empty() {
            return Ok(LabelStack::default());
        }
        s.split('/')
            .map(|part| {
                part.parse::<MplsLabel>()
                    .map_err(|_| ParseError::InvalidLabelStack(s.to_string()))
            })
            .collect::<Result<Vec<_>, _>>()
            .map(LabelStack)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_label_range() {
        assert_eq!(MplsLabel::new(16).unwrap().value(), 16);
        assert!(MplsLabel::new(MplsLabel::MAX).is_ok());
        assert!(MplsLabel::new(MplsLabel::MAX + 1).is_err());
        assert!("abc".parse::<MplsLabel>().is_err());
    }

    #[test]
    fn test_label_stack_parse_and_display() {
        let stack: LabelStack = "100/200".parse().unwrap();
        assert_eq!(stack.len(), 2);
        assert_eq!(stack.labels()[0].value(), 100);
        assert_eq!(stack.to_string(), "100/200");
    }

    #[test]
    fn test_empty_label_stack() {
        let stack: LabelStack = "".parse().unwrap();
        assert!(stack.is_empty());
        assert_eq!(stack.to_string(), "");
    }

    #[test]
    fn test_label_stack_rejects_bad_label() {
        assert!(matches!(
            "1/x".parse::<LabelStack>(),
            Err(ParseError::InvalidLabelStack(_))
        ));
        assert!("1//2".parse::<LabelStack>().is_err());
    }
}
