//! Next-hop key.

use crate::error::NhgError;
use sonic_sai::NextHopSpec;
use sonic_types::{IpAddress, LabelStack};
use std::fmt;
use std::str::FromStr;

/// Identity of a single next hop: IP address, egress interface alias and
/// an optional MPLS label stack.
///
/// Text form is `[labels+]ip@alias`, e.g. `100/200+10.0.0.1@Ethernet0`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NextHopKey {
    ip: IpAddress,
    alias: String,
    labels: LabelStack,
}

impl NextHopKey {
    /// Creates an unlabeled next-hop key.
    pub fn new(ip: IpAddress, alias: impl Into<String>) -> Self {
        Self {
            ip,
            alias: alias.into(),
            labels: LabelStack::default(),
        }
    }

    pub fn with_labels(mut self, labels: LabelStack) -> Self {
        self.labels = labels;
        self
    }

    pub fn ip(&self) -> IpAddress {
        self.ip
    }

    pub fn alias(&self) -> &str {
        &self.alias
    }

    pub fn labels(&self) -> &LabelStack {
        &self.labels
    }

    /// Returns true if the next hop pushes MPLS labels.
    pub fn is_labeled(&self) -> bool {
        !self.labels.is_empty()
    }

    /// The unlabeled next hop this key resolves through.
    pub fn ip_next_hop(&self) -> NextHopKey {
        NextHopKey::new(self.ip, self.alias.clone())
    }

    /// SAI attributes used to create a labeled next hop.
    pub fn to_spec(&self) -> NextHopSpec {
        NextHopSpec {
            ip: self.ip,
            alias: self.alias.clone(),
            labels: self.labels.clone(),
        }
    }
}

impl fmt::Display for NextHopKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_labeled() {
            write!(f, "{}+", self.labels)?;
        }
        write!(f, "{}@{}", self.ip, self.alias)
    }
}

impl FromStr for NextHopKey {
    type Err = NhgError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (labels, rest) = match s.split_once('+') {
            Some((labels, rest)) => (
                labels
                    .parse::<LabelStack>()
                    .map_err(|e| NhgError::malformed(e.to_string()))?,
                rest,
            ),
            None => (LabelStack::default(), s),
        };

        let (ip, alias) = rest
            .rsplit_once('@')
            .ok_or_else(|| NhgError::malformed(format!("next hop '{}' has no interface", s)))?;
        if alias.is_empty() {
            return Err(NhgError::malformed(format!("next hop '{}' has no interface", s)));
        }
        let ip = ip
            .parse::<IpAddress>()
            .map_err(|e| NhgError::malformed(e.to_string()))?;

        Ok(NextHopKey::new(ip, alias).with_labels(labels))
    }
}
