//! Replay of recorded intents against the in-memory switch.
//!
//! A replay file holds one JSON object per line. Table entries and link
//! events use the [`Intent`] encoding; neighbor lines carry
//! `"reachable": true|false` instead of a next-hop handle, and the replayer
//! registers the IP next hop on the virtual switch.

use crate::daemon::Intent;
use crate::reactor::{LinkEvent, NeighborEvent};
use log::debug;
use serde::Deserialize;
use sonic_orch_common::Operation;
use sonic_sai::{NextHopOid, NextHopSpec, VirtualSwitch};
use sonic_types::{IpAddress, LabelStack};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ReplayError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("line {line}: {source}")]
    Parse {
        line: usize,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ReplayLine {
    Table {
        table: String,
        key: String,
        op: Operation,
        #[serde(default)]
        fields: BTreeMap<String, String>,
    },
    Link {
        alias: String,
        up: bool,
    },
    Neighbor {
        ip: IpAddress,
        alias: String,
        reachable: bool,
    },
}

/// Turns replay lines into intents, standing in for the neighbor subsystem.
pub struct Replayer {
    switch: Arc<VirtualSwitch>,
    next_hops: BTreeMap<(IpAddress, String), NextHopOid>,
}

impl Replayer {
    pub fn new(switch: Arc<VirtualSwitch>) -> Self {
        Self {
            switch,
            next_hops: BTreeMap::new(),
        }
    }

    /// Parses every line of `path`. Blank lines and lines starting with `#`
    /// are skipped.
    pub fn load(&mut self, path: impl AsRef<Path>) -> Result<Vec<Intent>, ReplayError> {
        let content = fs::read_to_string(path)?;
        self.parse(&content)
    }

    pub fn parse(&mut self, content: &str) -> Result<Vec<Intent>, ReplayError> {
        let mut intents = Vec::new();
        for (index, line) in content.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let parsed: ReplayLine =
                serde_json::from_str(line).map_err(|source| ReplayError::Parse {
                    line: index + 1,
                    source,
                })?;
            intents.push(self.to_intent(parsed));
        }
        debug!("Replayer: parsed {} intents", intents.len());
        Ok(intents)
    }

    fn to_intent(&mut self, line: ReplayLine) -> Intent {
        match line {
            ReplayLine::Table {
                table,
                key,
                op,
                fields,
            } => Intent::Table {
                table,
                key,
                op,
                fields,
            },
            ReplayLine::Link { alias, up } => Intent::Link(LinkEvent { alias, up }),
            ReplayLine::Neighbor {
                ip,
                alias,
                reachable,
            } => {
                let next_hop = reachable.then(|| self.next_hop(ip, &alias).as_raw());
                Intent::Neighbor(NeighborEvent {
                    ip,
                    alias,
                    next_hop,
                })
            }
        }
    }

    /// IP next hop of a neighbor, registered once per (ip, alias).
    fn next_hop(&mut self, ip: IpAddress, alias: &str) -> NextHopOid {
        let switch = &self.switch;
        *self
            .next_hops
            .entry((ip, alias.to_string()))
            .or_insert_with(|| {
                switch.register_next_hop(NextHopSpec {
                    ip,
                    alias: alias.to_string(),
                    labels: LabelStack::default(),
                })
            })
    }
}
