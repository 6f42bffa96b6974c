//! NhgDaemon: event loop feeding an NhgSyncOrch.

use crate::audit::{AuditCategory, AuditOutcome, AuditRecord};
use crate::audit_log;
use crate::config::NhgOrchConfig;
use crate::orch::{NhgStats, NhgSyncOrch};
use crate::reactor::{LinkEvent, NeighborEvent};
use log::{debug, info};
use serde::{Deserialize, Serialize};
use sonic_orch_common::{KeyOpFieldsValues, Operation, Orch};
use std::collections::BTreeMap;
use std::time::Duration;
use tokio::sync::mpsc;

/// One unit of input for the daemon.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Intent {
    /// Decoded table entry
    Table {
        table: String,
        key: String,
        op: Operation,
        #[serde(default)]
        fields: BTreeMap<String, String>,
    },
    Link(LinkEvent),
    Neighbor(NeighborEvent),
}

impl Intent {
    pub fn set(table: &str, key: &str, fields: &[(&str, &str)]) -> Self {
        Intent::Table {
            table: table.to_string(),
            key: key.to_string(),
            op: Operation::Set,
            fields: fields
                .iter()
                .map(|(f, v)| (f.to_string(), v.to_string()))
                .collect(),
        }
    }

    pub fn del(table: &str, key: &str) -> Self {
        Intent::Table {
            table: table.to_string(),
            key: key.to_string(),
            op: Operation::Del,
            fields: BTreeMap::new(),
        }
    }
}

/// Owns the orchestrator and applies intents in arrival order.
pub struct NhgDaemon {
    orch: NhgSyncOrch,
    receiver: mpsc::Receiver<Intent>,
    heartbeat: Duration,
    received: u64,
}

impl NhgDaemon {
    /// Creates the daemon and the sender side of its intent channel.
    pub fn new(config: &NhgOrchConfig, orch: NhgSyncOrch) -> (Self, mpsc::Sender<Intent>) {
        let (sender, receiver) = mpsc::channel(config.daemon.channel_capacity);
        let daemon = Self {
            orch,
            receiver,
            heartbeat: config.heartbeat_interval(),
            received: 0,
        };
        (daemon, sender)
    }

    pub fn orch(&self) -> &NhgSyncOrch {
        &self.orch
    }

    /// Applies one intent. Queued table entries are processed before a
    /// reachability event so that events see every earlier intent.
    pub async fn apply(&mut self, intent: Intent) {
        self.received += 1;
        match intent {
            Intent::Table {
                table,
                key,
                op,
                fields,
            } => {
                let entry = KeyOpFieldsValues::new(key, op, fields.into_iter().collect());
                self.orch.add_entries(&table, vec![entry]);
            }
            Intent::Link(event) => {
                self.drain().await;
                self.orch.on_link_event(&event);
            }
            Intent::Neighbor(event) => {
                self.drain().await;
                self.orch.on_neighbor_event(&event);
            }
        }
    }

    async fn drain(&mut self) {
        if self.orch.has_pending_tasks() {
            debug!("NhgDaemon: processing tasks for {}", self.orch.name());
            self.orch.do_task().await;
        }
    }

    /// Runs until every sender is dropped, then returns the final counters.
    pub async fn run(mut self) -> NhgStats {
        info!("NhgDaemon: starting event loop");
        audit_log!(AuditRecord::new(
            AuditCategory::SystemLifecycle,
            "NhgDaemon",
            "event_loop_started"
        )
        .with_outcome(AuditOutcome::Success)
        .with_details(serde_json::json!({
            "heartbeat_interval_ms": self.heartbeat.as_millis() as u64,
            "capacity": self.orch.capacity().max(),
        })));

        let mut heartbeat = tokio::time::interval(self.heartbeat);
        heartbeat.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                intent = self.receiver.recv() => match intent {
                    Some(intent) => {
                        self.apply(intent).await;
                        if self.receiver.is_empty() {
                            self.drain().await;
                        }
                    }
                    None => break,
                },
                _ = heartbeat.tick() => {
                    self.drain().await;
                    self.orch.on_heartbeat();
                }
            }
        }

        self.drain().await;
        let stats = self.orch.stats();
        info!(
            "NhgDaemon: event loop stopped after {} intents ({} groups, {} routes)",
            self.received, stats.groups, stats.routes
        );
        audit_log!(AuditRecord::new(
            AuditCategory::SystemLifecycle,
            "NhgDaemon",
            "event_loop_stopped"
        )
        .with_outcome(AuditOutcome::Success)
        .with_details(serde_json::json!({ "intents": self.received })));
        stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nhg::{GroupId, GroupStatus};
    use crate::orch::{NEXT_HOP_GROUP_TABLE, ROUTE_TABLE};
    use pretty_assertions::assert_eq;
    use sonic_sai::{NextHopSpec, VirtualSwitch};
    use sonic_types::LabelStack;
    use std::sync::Arc;

    #[test]
    fn test_intent_json() {
        let intent: Intent = serde_json::from_str(
            r#"{"type":"table","table":"ROUTE_TABLE","key":"2.2.2.0/24","op":"SET","fields":{"nexthop_group":"nhg1"}}"#,
        )
        .unwrap();
        assert_eq!(
            intent,
            Intent::set(ROUTE_TABLE, "2.2.2.0/24", &[("nexthop_group", "nhg1")])
        );

        let intent: Intent =
            serde_json::from_str(r#"{"type":"link","alias":"Ethernet0","up":false}"#).unwrap();
        assert_eq!(
            intent,
            Intent::Link(LinkEvent {
                alias: "Ethernet0".to_string(),
                up: false
            })
        );
    }

    #[tokio::test]
    async fn test_run_applies_intents_in_order() {
        let switch = Arc::new(VirtualSwitch::new(4));
        let config = NhgOrchConfig::default();
        let orch = NhgSyncOrch::new(switch.clone(), &config);
        let (daemon, sender) = NhgDaemon::new(&config, orch);
        let handle = tokio::spawn(daemon.run());

        for (ip, alias) in [("10.0.0.1", "Ethernet0"), ("10.0.0.3", "Ethernet4")] {
            let oid = switch.register_next_hop(NextHopSpec {
                ip: ip.parse().unwrap(),
                alias: alias.to_string(),
                labels: LabelStack::default(),
            });
            sender
                .send(Intent::Neighbor(NeighborEvent {
                    ip: ip.parse().unwrap(),
                    alias: alias.to_string(),
                    next_hop: Some(oid.as_raw()),
                }))
                .await
                .unwrap();
        }
        sender
            .send(Intent::set(
                ROUTE_TABLE,
                "2.2.2.0/24",
                &[("nexthop_group", "nhg1")],
            ))
            .await
            .unwrap();
        sender
            .send(Intent::set(
                NEXT_HOP_GROUP_TABLE,
                "nhg1",
                &[("nexthop", "10.0.0.1,10.0.0.3"), ("ifname", "Ethernet0,Ethernet4")],
            ))
            .await
            .unwrap();
        drop(sender);

        let stats = handle.await.unwrap();
        assert_eq!(stats.routes, 1);
        assert_eq!(stats.synced_groups, 1);
        assert_eq!(switch.route_count(), 1);
    }

    #[tokio::test]
    async fn test_apply_processes_tables_before_events() {
        let switch = Arc::new(VirtualSwitch::new(4));
        let config = NhgOrchConfig::default();
        let (mut daemon, _sender) = NhgDaemon::new(&config, NhgSyncOrch::new(switch.clone(), &config));

        daemon
            .apply(Intent::set(
                NEXT_HOP_GROUP_TABLE,
                "nhg1",
                &[("nexthop", "10.0.0.1"), ("ifname", "Ethernet0")],
            ))
            .await;
        let oid = switch.register_next_hop(NextHopSpec {
            ip: "10.0.0.1".parse().unwrap(),
            alias: "Ethernet0".to_string(),
            labels: LabelStack::default(),
        });
        daemon
            .apply(Intent::Neighbor(NeighborEvent {
                ip: "10.0.0.1".parse().unwrap(),
                alias: "Ethernet0".to_string(),
                next_hop: Some(oid.as_raw()),
            }))
            .await;

        assert_eq!(
            daemon.orch().group_state(&GroupId::Named("nhg1".to_string())),
            Some(GroupStatus::SingleNh)
        );
    }
}
