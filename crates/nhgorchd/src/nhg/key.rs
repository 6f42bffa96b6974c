//! Order-independent identity of a route-owned group.

use super::RequestedMember;
use crate::nexthop::NextHopKey;
use std::collections::BTreeMap;
use std::fmt;

/// Normalized member set of an inline next-hop list.
///
/// Two routes whose inline lists contain the same next hops with the same
/// weights, in any order, produce equal keys and share one group.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NextHopGroupKey {
    members: BTreeMap<NextHopKey, u32>,
}

impl NextHopGroupKey {
    pub fn from_members(members: &[RequestedMember]) -> Self {
        Self {
            members: members
                .iter()
                .map(|m| (m.key.clone(), m.weight))
                .collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn contains(&self, key: &NextHopKey) -> bool {
        self.members.contains_key(key)
    }
}

impl fmt::Display for NextHopGroupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, (key, weight)) in self.members.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            write!(f, "{}", key)?;
            if *weight != 1 {
                write!(f, "*{}", weight)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nhg::parse_members;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_key_ignores_order() {
        let a = parse_members(Some("10.0.0.1,10.0.0.3"), Some("Ethernet0,Ethernet4"), None).unwrap();
        let b = parse_members(Some("10.0.0.3,10.0.0.1"), Some("Ethernet4,Ethernet0"), None).unwrap();
        assert_eq!(
            NextHopGroupKey::from_members(&a),
            NextHopGroupKey::from_members(&b)
        );
    }

    #[test]
    fn test_weights_are_part_of_identity() {
        let a = parse_members(Some("10.0.0.1,10.0.0.3"), Some("Ethernet0,Ethernet4"), None).unwrap();
        let b = parse_members(
            Some("10.0.0.1,10.0.0.3"),
            Some("Ethernet0,Ethernet4"),
            Some("1,2"),
        )
        .unwrap();
        let key_b = NextHopGroupKey::from_members(&b);
        assert_ne!(NextHopGroupKey::from_members(&a), key_b);
        assert_eq!(key_b.to_string(), "10.0.0.1@Ethernet0,10.0.0.3@Ethernet4*2");
        assert_eq!(key_b.len(), 2);
    }
}
