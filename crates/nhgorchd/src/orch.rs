//! NhgSyncOrch: the single writer of next-hop group state.

use crate::audit::{AuditCategory, AuditOutcome, AuditRecord};
use crate::audit_log;
use crate::cbf::ClassBasedGroupManager;
use crate::config::NhgOrchConfig;
use crate::error::{NhgError, Result};
use crate::nexthop::NextHopResolver;
use crate::nhg::{
    parse_members, CapacityPool, ForwardingHandle, GroupId, GroupStatus, HandleChange,
    NextHopGroupStore,
};
use crate::reactor::{LinkEvent, MembershipReactor, NeighborEvent};
use crate::route::{RouteBinder, RouteKey, RouteTarget};
use async_trait::async_trait;
use log::{debug, error, info, warn};
use serde::Serialize;
use sonic_orch_common::{
    Constraint, Consumer, ConsumerConfig, KeyOpFieldsValues, Operation, Orch, RetryCache,
    TaskStatus,
};
use sonic_sai::NextHopGroupApi;
use std::sync::Arc;

pub const NEXT_HOP_GROUP_TABLE: &str = "NEXT_HOP_GROUP_TABLE";
pub const CLASS_BASED_NEXT_HOP_GROUP_TABLE: &str = "CLASS_BASED_NEXT_HOP_GROUP_TABLE";
pub const ROUTE_TABLE: &str = "ROUTE_TABLE";
pub const LABEL_ROUTE_TABLE: &str = "LABEL_ROUTE_TABLE";

/// Tables in processing order: groups before the things that reference them.
const TABLES: [&str; 4] = [
    NEXT_HOP_GROUP_TABLE,
    CLASS_BASED_NEXT_HOP_GROUP_TABLE,
    ROUTE_TABLE,
    LABEL_ROUTE_TABLE,
];

/// Constraint satisfied once a named or class-based group exists.
const GROUP_CREATED: &str = "GROUP_CREATED";
/// Constraint satisfied once a group has no referrer left.
const GROUP_RELEASED: &str = "GROUP_RELEASED";

/// Upper bound on drain passes per `process_pending` call.
const MAX_ROUNDS: usize = 16;

/// Intent outcome counters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IntentStats {
    pub applied: u64,
    /// Parked until a group appears or loses its referrers
    pub deferred: u64,
    pub dropped: u64,
    pub failed: u64,
}

/// Snapshot of every counter of the engine.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct NhgStats {
    pub groups: usize,
    pub synced_groups: usize,
    pub pending_groups: usize,
    pub capacity: usize,
    pub groups_created: u64,
    pub groups_removed: u64,
    pub promotions: u64,
    pub pending_enqueued: u64,
    pub rejected_deletes: u64,
    pub rejected_resizes: u64,
    pub hardware_failures: u64,
    pub routes: usize,
    pub routes_programmed: u64,
    pub routes_withdrawn: u64,
    pub route_programming_failures: u64,
    pub labeled_next_hops_created: u64,
    pub labeled_next_hops_removed: u64,
    pub link_events: u64,
    pub neighbor_events: u64,
    pub intents: IntentStats,
}

/// Next-hop group synchronization orchestrator.
///
/// Owns the resolver, the group table, the route bindings and the
/// class-based group manager, plus one coalescing consumer per input table.
/// Table intents and reachability events are applied one at a time; after
/// each, handle changes are pushed to referrers, retired hardware objects
/// are removed and freed capacity is handed to pending groups.
pub struct NhgSyncOrch {
    resolver: NextHopResolver,
    store: NextHopGroupStore,
    binder: RouteBinder,
    cbf: ClassBasedGroupManager,
    reactor: MembershipReactor,
    consumers: Vec<Consumer>,
    retry: RetryCache<(String, String), KeyOpFieldsValues>,
    /// Set when the last settle could not remove every retired group
    unflushed: bool,
    stats: IntentStats,
}

impl NhgSyncOrch {
    pub fn new(sai: Arc<dyn NextHopGroupApi>, config: &NhgOrchConfig) -> Self {
        let reported = match sai.max_next_hop_groups() {
            Ok(max) => Some(max),
            Err(e) => {
                warn!("NhgSyncOrch: switch did not report group capacity: {}", e);
                None
            }
        };
        let capacity = config.effective_capacity(reported);
        info!(
            "NhgSyncOrch: next-hop group capacity {} (reported {:?}, configured {})",
            capacity, reported, config.capacity.max_nhg_count
        );

        let consumers = TABLES
            .iter()
            .enumerate()
            .map(|(priority, table)| {
                Consumer::new(
                    ConsumerConfig::new(*table)
                        .with_priority(priority as i32)
                        .with_batch_size(config.daemon.batch_size),
                )
            })
            .collect();

        Self {
            resolver: NextHopResolver::new(sai.clone()),
            store: NextHopGroupStore::new(sai.clone(), capacity),
            binder: RouteBinder::new(sai),
            cbf: ClassBasedGroupManager::new(),
            reactor: MembershipReactor::new(),
            consumers,
            retry: RetryCache::new(),
            unflushed: false,
            stats: IntentStats::default(),
        }
    }

    /// Queues table intents. A newer intent for a key supersedes one parked
    /// in the retry cache.
    pub fn add_entries(&mut self, table: &str, entries: Vec<KeyOpFieldsValues>) {
        let Some(consumer) = self.consumers.iter_mut().find(|c| c.table_name() == table) else {
            warn!(
                "NhgSyncOrch: dropping {} entries for unknown table {}",
                entries.len(),
                table
            );
            return;
        };
        for entry in &entries {
            if self
                .retry
                .remove(&(table.to_string(), entry.key.clone()))
                .is_some()
            {
                debug!(
                    "NhgSyncOrch: {} {} supersedes a parked intent",
                    table, entry.key
                );
            }
        }
        consumer.add_to_sync(entries);
    }

    pub fn on_link_event(&mut self, event: &LinkEvent) {
        let changes = self
            .reactor
            .on_link_event(event, &mut self.resolver, &mut self.store);
        self.settle(changes);
    }

    pub fn on_neighbor_event(&mut self, event: &NeighborEvent) {
        let changes = self
            .reactor
            .on_neighbor_event(event, &mut self.resolver, &mut self.store);
        self.settle(changes);
    }

    /// Retries promotion of pending groups and removal of retired hardware
    /// groups the switch refused earlier.
    pub fn on_heartbeat(&mut self) {
        if self.store.pool().pending_len() > 0 || self.store.has_retired() {
            self.settle(Vec::new());
        }
    }

    /// Applies queued intents table by table until nothing is left to do.
    pub fn process_pending(&mut self) {
        for _ in 0..MAX_ROUNDS {
            if !self.has_pending() {
                return;
            }
            for index in 0..self.consumers.len() {
                let table = self.consumers[index].table_name().to_string();
                for entry in self.consumers[index].drain() {
                    self.apply_entry(&table, entry);
                }
            }
        }
        if self.has_pending() {
            debug!("NhgSyncOrch: work left after {} rounds", MAX_ROUNDS);
        }
    }

    pub fn has_pending(&self) -> bool {
        self.consumers.iter().any(Consumer::has_pending)
    }

    /// Applies one intent and decides its fate.
    pub fn apply_entry(&mut self, table: &str, entry: KeyOpFieldsValues) -> TaskStatus {
        let result = match table {
            NEXT_HOP_GROUP_TABLE => self.apply_group(&entry),
            CLASS_BASED_NEXT_HOP_GROUP_TABLE => self.apply_class_based(&entry),
            ROUTE_TABLE | LABEL_ROUTE_TABLE => self.apply_route(table, &entry),
            _ => Err(NhgError::malformed(format!("unknown table {}", table))),
        };

        let (changes, status) = match result {
            Ok(changes) => {
                self.stats.applied += 1;
                (changes, TaskStatus::Success)
            }
            Err(e) => {
                let status = e.to_status();
                self.park_or_drop(table, entry, &e, status);
                (Vec::new(), status)
            }
        };
        self.settle(changes);
        status
    }

    fn park_or_drop(
        &mut self,
        table: &str,
        entry: KeyOpFieldsValues,
        err: &NhgError,
        status: TaskStatus,
    ) {
        let constraints: Vec<Constraint> = match err {
            NhgError::UnresolvedReference { missing } => missing
                .iter()
                .map(|name| Constraint::new(GROUP_CREATED, name.as_str()))
                .collect(),
            NhgError::ReferencedDelete { group, .. } | NhgError::ReferencedResize { group, .. } => {
                vec![Constraint::new(GROUP_RELEASED, group.as_str())]
            }
            _ => Vec::new(),
        };

        match status {
            TaskStatus::WaitingForDependency | TaskStatus::NeedRetry
                if !constraints.is_empty() =>
            {
                self.stats.deferred += 1;
                info!(
                    "NhgSyncOrch: parking {} {} {}: {}",
                    table, entry.op, entry.key, err
                );
                self.retry
                    .add((table.to_string(), entry.key.clone()), entry, constraints);
            }
            TaskStatus::Failed => {
                self.stats.failed += 1;
                error!(
                    "NhgSyncOrch: failed to apply {} {} {}: {}",
                    table, entry.op, entry.key, err
                );
                audit_log!(AuditRecord::new(
                    AuditCategory::ErrorCondition,
                    "NhgSyncOrch",
                    "apply_intent"
                )
                .with_outcome(AuditOutcome::Failure)
                .with_object_id(entry.key.clone())
                .with_object_type(table)
                .with_error(err.to_string()));
            }
            _ => {
                self.stats.dropped += 1;
                warn!(
                    "NhgSyncOrch: dropping {} {} {}: {}",
                    table, entry.op, entry.key, err
                );
            }
        }
    }

    fn apply_group(&mut self, entry: &KeyOpFieldsValues) -> Result<Vec<HandleChange>> {
        let id = GroupId::Named(entry.key.clone());
        match entry.op {
            Operation::Set => {
                let requested = parse_members(
                    entry.get_field("nexthop"),
                    entry.get_field("ifname"),
                    entry.get_field("weight"),
                )?;
                self.store
                    .configure_named(&entry.key, requested, &mut self.resolver)
            }
            Operation::Del => {
                if !self.store.contains(&id) {
                    debug!("NhgSyncOrch: group {} already gone", id);
                    return Ok(Vec::new());
                }
                self.store.remove(&id, &mut self.resolver)?;
                Ok(Vec::new())
            }
        }
    }

    fn apply_class_based(&mut self, entry: &KeyOpFieldsValues) -> Result<Vec<HandleChange>> {
        match entry.op {
            Operation::Set => self.cbf.configure(
                &mut self.store,
                &mut self.resolver,
                &entry.key,
                entry.get_field("members"),
                entry.get_field("class_map"),
            ),
            Operation::Del => {
                if !self.store.contains(&GroupId::ClassBased(entry.key.clone())) {
                    debug!("NhgSyncOrch: class-based group {} already gone", entry.key);
                    return Ok(Vec::new());
                }
                self.cbf
                    .remove(&mut self.store, &mut self.resolver, &entry.key)?;
                Ok(Vec::new())
            }
        }
    }

    fn apply_route(&mut self, table: &str, entry: &KeyOpFieldsValues) -> Result<Vec<HandleChange>> {
        let key = if table == LABEL_ROUTE_TABLE {
            RouteKey::parse_label(&entry.key)?
        } else {
            RouteKey::parse_prefix(&entry.key)?
        };
        match entry.op {
            Operation::Set => {
                let target = RouteTarget::from_fields(entry)?;
                self.binder
                    .bind(key, target, &mut self.store, &mut self.resolver)?;
            }
            Operation::Del => {
                self.binder
                    .unbind(&key, &mut self.store, &mut self.resolver)?;
            }
        }
        Ok(Vec::new())
    }

    /// Pushes handle changes to referrers, removes what is no longer used
    /// and promotes pending groups into freed slots, until nothing moves.
    fn settle(&mut self, mut changes: Vec<HandleChange>) {
        if self.unflushed {
            self.binder.resync(&self.store);
            self.cbf.resync(&mut self.store);
        }
        loop {
            self.propagate(&changes);
            self.store.flush_retired();
            self.resolver.flush_retired();
            changes = self.store.promote(&self.resolver);
            if changes.is_empty() {
                break;
            }
        }
        // A refused removal means a referrer still points at the group
        self.unflushed = self.store.has_retired();
        if self.unflushed {
            warn!("NhgSyncOrch: retired hardware groups left, retrying on heartbeat");
        }
        self.wake_dependents();
    }

    fn propagate(&mut self, changes: &[HandleChange]) {
        for change in changes {
            self.binder.on_handle_change(change);
            if let GroupId::Named(name) = &change.id {
                self.cbf
                    .on_member_handle_change(&mut self.store, name, change.handle);
            }
        }
    }

    /// Hands parked intents whose dependency is now met back to their
    /// consumer.
    fn wake_dependents(&mut self) {
        let ready: Vec<Constraint> = self
            .retry
            .waiting_constraints()
            .into_iter()
            .filter(|c| match c.table.as_str() {
                GROUP_CREATED => self.group_exists(&c.key),
                GROUP_RELEASED => !self.group_referenced(&c.key),
                _ => false,
            })
            .collect();

        for constraint in ready {
            for key in self.retry.satisfy(&constraint) {
                let Some(entry) = self.retry.remove(&key) else {
                    continue;
                };
                debug!(
                    "NhgSyncOrch: {} satisfied, retrying {} {}",
                    constraint, key.0, key.1
                );
                if let Some(consumer) = self.consumers.iter_mut().find(|c| c.table_name() == key.0)
                {
                    consumer.retry(entry);
                }
            }
        }
    }

    fn group_exists(&self, name: &str) -> bool {
        self.store.contains(&GroupId::Named(name.to_string()))
            || self.store.contains(&GroupId::ClassBased(name.to_string()))
    }

    fn group_referenced(&self, name: &str) -> bool {
        [
            GroupId::Named(name.to_string()),
            GroupId::ClassBased(name.to_string()),
        ]
        .iter()
        .any(|id| self.store.ref_count(id).is_some_and(|count| count > 0))
    }

    /// Handle a route's forwarding entry is programmed with.
    pub fn route_handle(&self, key: &RouteKey) -> Option<ForwardingHandle> {
        self.binder.route_handle(key)
    }

    pub fn route_group(&self, key: &RouteKey) -> Option<&GroupId> {
        self.binder.route_group(key)
    }

    pub fn group_state(&self, id: &GroupId) -> Option<GroupStatus> {
        self.store.status(id)
    }

    pub fn group_handle(&self, id: &GroupId) -> Option<ForwardingHandle> {
        self.store.handle(id)
    }

    pub fn ref_count(&self, id: &GroupId) -> Option<u32> {
        self.store.ref_count(id)
    }

    pub fn capacity(&self) -> &CapacityPool {
        self.store.pool()
    }

    pub fn store(&self) -> &NextHopGroupStore {
        &self.store
    }

    pub fn resolver(&self) -> &NextHopResolver {
        &self.resolver
    }

    /// Number of intents parked on a dependency.
    pub fn parked_count(&self) -> usize {
        self.retry.len()
    }

    pub fn is_parked(&self, table: &str, key: &str) -> bool {
        self.retry.contains(&(table.to_string(), key.to_string()))
    }

    pub fn stats(&self) -> NhgStats {
        let store = self.store.stats();
        let binder = self.binder.stats();
        let resolver = self.resolver.stats();
        let reactor = self.reactor.stats();
        let pool = self.store.pool();

        NhgStats {
            groups: self.store.len(),
            synced_groups: pool.synced(),
            pending_groups: pool.pending_len(),
            capacity: pool.max(),
            groups_created: store.groups_created,
            groups_removed: store.groups_removed,
            promotions: store.promotions,
            pending_enqueued: store.pending_enqueued,
            rejected_deletes: store.rejected_deletes,
            rejected_resizes: store.rejected_resizes,
            hardware_failures: store.hardware_failures,
            routes: self.binder.len(),
            routes_programmed: binder.routes_programmed,
            routes_withdrawn: binder.routes_withdrawn,
            route_programming_failures: binder.programming_failures,
            labeled_next_hops_created: resolver.labeled_created,
            labeled_next_hops_removed: resolver.labeled_removed,
            link_events: reactor.link_events,
            neighbor_events: reactor.neighbor_events,
            intents: self.stats.clone(),
        }
    }

    /// Queued and parked intents, groups and routes, one line each.
    pub fn dump(&self) -> Vec<String> {
        let mut lines = self.dump_pending_tasks();
        for entry in self.store.iter() {
            lines.push(format!(
                "group {}: {} handle={} refs={}",
                entry.id,
                entry.state.status(),
                entry
                    .handle()
                    .map(|h| h.to_string())
                    .unwrap_or_else(|| "-".to_string()),
                entry.ref_count
            ));
        }
        for (key, group) in self.binder.routes() {
            lines.push(format!("route {} -> {}", key, group));
        }
        lines
    }
}

#[async_trait]
impl Orch for NhgSyncOrch {
    fn name(&self) -> &str {
        "NhgSyncOrch"
    }

    async fn do_task(&mut self) {
        self.process_pending();
    }

    fn priority(&self) -> i32 {
        20
    }

    fn has_pending_tasks(&self) -> bool {
        self.has_pending()
    }

    fn dump_pending_tasks(&self) -> Vec<String> {
        let mut lines: Vec<String> = self
            .consumers
            .iter()
            .flat_map(|c| {
                c.dump()
                    .into_iter()
                    .map(move |line| format!("{} {}", c.table_name(), line))
            })
            .collect();
        lines.extend(
            self.retry
                .values()
                .map(|e| format!("parked {} {} {:?}", e.op, e.key, e.fvs)),
        );
        lines
    }
}
