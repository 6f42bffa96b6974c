//! Class-based group configuration and member tracking.

use super::ClassMap;
use crate::error::{NhgError, Result};
use crate::nexthop::NextHopResolver;
use crate::nhg::{ForwardingHandle, GroupId, GroupKind, HandleChange, NextHopGroupStore};
use log::{debug, warn};
use std::collections::{BTreeMap, BTreeSet};

/// Applies CLASS_BASED_NEXT_HOP_GROUP_TABLE entries.
///
/// Each class-based group holds one reference on every member group. The
/// manager keeps the reverse index (member group to the class-based groups
/// using it) so that a member's handle change reaches every position that
/// points at it.
#[derive(Debug, Default)]
pub struct ClassBasedGroupManager {
    dependents: BTreeMap<String, BTreeSet<String>>,
}

impl ClassBasedGroupManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Class-based groups that use `member`.
    pub fn dependents(&self, member: &str) -> impl Iterator<Item = &String> {
        self.dependents.get(member).into_iter().flatten()
    }

    /// Creates or updates class-based group `name`.
    ///
    /// Everything is validated before any reference or hardware change; a
    /// rejected configuration leaves the previous one in place.
    pub fn configure(
        &mut self,
        store: &mut NextHopGroupStore,
        resolver: &mut NextHopResolver,
        name: &str,
        members: Option<&str>,
        class_map: Option<&str>,
    ) -> Result<Vec<HandleChange>> {
        if store.contains(&GroupId::Named(name.to_string())) {
            return Err(NhgError::malformed(format!(
                "{} is already a next hop group",
                name
            )));
        }
        let members = parse_member_names(members)?;
        let class_map = ClassMap::parse(class_map.unwrap_or_default(), members.len())?;

        let mut missing = Vec::new();
        for member in &members {
            if store.contains(&GroupId::ClassBased(member.clone())) {
                return Err(NhgError::malformed(format!(
                    "member {} of {} is a class-based group",
                    member, name
                )));
            }
            if !store.contains(&GroupId::Named(member.clone())) {
                missing.push(member.clone());
            }
        }
        if !missing.is_empty() {
            debug!(
                "ClassBasedGroupManager: {} waits for member groups {:?}",
                name, missing
            );
            return Err(NhgError::UnresolvedReference { missing });
        }

        let id = GroupId::ClassBased(name.to_string());
        let old_members: Vec<String> = match store.get(&id).map(|e| &e.kind) {
            Some(GroupKind::ClassBased { members, .. }) => members.clone(),
            _ => Vec::new(),
        };
        let added: Vec<&String> = members.iter().filter(|m| !old_members.contains(m)).collect();
        let removed: Vec<&String> = old_members.iter().filter(|m| !members.contains(m)).collect();

        for member in &added {
            store.acquire(&GroupId::Named((*member).clone()))?;
        }

        let handles: Vec<Option<ForwardingHandle>> = members
            .iter()
            .map(|m| store.handle(&GroupId::Named(m.clone())))
            .collect();
        let result = if store.contains(&id) {
            store.update_class_based(name, members.clone(), class_map, handles)
        } else {
            store.insert_class_based(name, members.clone(), class_map, handles)
        };

        let changes = match result {
            Ok(changes) => changes,
            Err(e) => {
                for member in &added {
                    release_member(store, resolver, member);
                }
                return Err(e);
            }
        };

        for member in &removed {
            release_member(store, resolver, member);
            if let Some(users) = self.dependents.get_mut(*member) {
                users.remove(name);
                if users.is_empty() {
                    self.dependents.remove(*member);
                }
            }
        }
        for member in &members {
            self.dependents
                .entry(member.clone())
                .or_default()
                .insert(name.to_string());
        }

        Ok(changes)
    }

    /// Deletes class-based group `name` unless something still references it.
    pub fn remove(
        &mut self,
        store: &mut NextHopGroupStore,
        resolver: &mut NextHopResolver,
        name: &str,
    ) -> Result<()> {
        let entry = store.remove(&GroupId::ClassBased(name.to_string()), resolver)?;

        if let GroupKind::ClassBased { members, .. } = entry.kind {
            for member in &members {
                release_member(store, resolver, member);
                if let Some(users) = self.dependents.get_mut(member) {
                    users.remove(name);
                    if users.is_empty() {
                        self.dependents.remove(member);
                    }
                }
            }
        }
        Ok(())
    }

    /// Repoints positions left behind by a failed member repoint.
    pub fn resync(&self, store: &mut NextHopGroupStore) {
        for member in self.dependents.keys() {
            let handle = store.handle(&GroupId::Named(member.clone()));
            self.on_member_handle_change(store, member, handle);
        }
    }

    /// Repoints every position that uses member group `member`.
    pub fn on_member_handle_change(
        &self,
        store: &mut NextHopGroupStore,
        member: &str,
        handle: Option<ForwardingHandle>,
    ) {
        for name in self.dependents(member) {
            let id = GroupId::ClassBased(name.clone());
            let positions: Vec<usize> = match store.get(&id).map(|e| &e.kind) {
                Some(GroupKind::ClassBased { members, .. }) => members
                    .iter()
                    .enumerate()
                    .filter(|(_, m)| m.as_str() == member)
                    .map(|(position, _)| position)
                    .collect(),
                _ => continue,
            };
            for position in positions {
                if let Err(e) = store.set_class_based_member_handle(&id, position, handle) {
                    warn!(
                        "ClassBasedGroupManager: failed to repoint {} position {} to {:?}: {}",
                        id, position, handle, e
                    );
                }
            }
        }
    }
}

fn parse_member_names(field: Option<&str>) -> Result<Vec<String>> {
    let field = field
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| NhgError::malformed("missing members field"))?;

    let mut names: Vec<String> = Vec::new();
    for name in field.split(',').map(str::trim) {
        if name.is_empty() {
            return Err(NhgError::malformed("empty member name"));
        }
        if names.iter().any(|n| n == name) {
            return Err(NhgError::malformed(format!("duplicate member {}", name)));
        }
        names.push(name.to_string());
    }
    Ok(names)
}

fn release_member(store: &mut NextHopGroupStore, resolver: &mut NextHopResolver, member: &str) {
    let id = GroupId::Named(member.to_string());
    if let Err(e) = store.release(&id, resolver) {
        warn!("ClassBasedGroupManager: failed to release {}: {}", id, e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nhg::{parse_members, GroupStatus};
    use pretty_assertions::assert_eq;
    use sonic_sai::{NextHopSpec, VirtualSwitch};
    use sonic_types::LabelStack;
    use std::sync::Arc;

    struct Fixture {
        switch: Arc<VirtualSwitch>,
        resolver: NextHopResolver,
        store: NextHopGroupStore,
        manager: ClassBasedGroupManager,
    }

    fn setup() -> Fixture {
        let switch = Arc::new(VirtualSwitch::new(8));
        let mut resolver = NextHopResolver::new(switch.clone());
        let mut store = NextHopGroupStore::new(switch.clone(), 8);
        for (name, ip, alias) in [
            ("nhg1", "10.0.0.1", "Ethernet0"),
            ("nhg2", "10.0.0.3", "Ethernet4"),
            ("nhg3", "10.0.0.5", "Ethernet8"),
        ] {
            let oid = switch.register_next_hop(NextHopSpec {
                ip: ip.parse().unwrap(),
                alias: alias.to_string(),
                labels: LabelStack::default(),
            });
            resolver.on_neighbor(ip.parse().unwrap(), alias, Some(oid));
            let members = parse_members(Some(ip), Some(alias), None).unwrap();
            store.configure_named(name, members, &mut resolver).unwrap();
        }
        Fixture {
            switch,
            resolver,
            store,
            manager: ClassBasedGroupManager::new(),
        }
    }

    fn named(name: &str) -> GroupId {
        GroupId::Named(name.to_string())
    }

    #[test]
    fn test_configure_references_members() {
        let mut f = setup();
        f.manager
            .configure(&mut f.store, &mut f.resolver, "cbf1", Some("nhg1,nhg2"), Some("0:0,1:1"))
            .unwrap();

        let id = GroupId::ClassBased("cbf1".to_string());
        assert_eq!(f.store.status(&id), Some(GroupStatus::Synced));
        assert_eq!(f.store.ref_count(&named("nhg1")), Some(1));
        assert_eq!(f.store.ref_count(&named("nhg2")), Some(1));
        assert_eq!(f.manager.dependents("nhg1").count(), 1);
        assert_eq!(f.switch.member_count(), 2);
    }

    #[test]
    fn test_missing_member_is_unresolved() {
        let mut f = setup();
        let err = f
            .manager
            .configure(&mut f.store, &mut f.resolver, "cbf1", Some("nhg1,nhg9"), Some("0:0,1:1"))
            .unwrap_err();
        assert_eq!(
            err,
            NhgError::UnresolvedReference {
                missing: vec!["nhg9".to_string()]
            }
        );
        assert_eq!(f.store.ref_count(&named("nhg1")), Some(0));
    }

    #[test]
    fn test_invalid_configuration_keeps_previous() {
        let mut f = setup();
        f.manager
            .configure(&mut f.store, &mut f.resolver, "cbf1", Some("nhg1,nhg2"), Some("0:0,1:1"))
            .unwrap();

        for (members, class_map) in [
            (Some("nhg1,nhg1"), Some("0:0")),
            (Some(""), Some("0:0")),
            (Some("nhg1,nhg3"), Some("0:0,0:1")),
            (Some("nhg1,nhg3"), Some("64:0")),
            (Some("nhg1,nhg3"), Some("0:2")),
            (Some("nhg1,nhg3"), None),
        ] {
            assert!(f
                .manager
                .configure(&mut f.store, &mut f.resolver, "cbf1", members, class_map)
                .is_err());
        }

        let id = GroupId::ClassBased("cbf1".to_string());
        let Some(GroupKind::ClassBased { members, .. }) = f.store.get(&id).map(|e| e.kind.clone())
        else {
            panic!("expected a class-based group");
        };
        assert_eq!(members, vec!["nhg1".to_string(), "nhg2".to_string()]);
        assert_eq!(f.store.ref_count(&named("nhg3")), Some(0));
    }

    #[test]
    fn test_member_change_only_touches_affected_positions() {
        let mut f = setup();
        f.manager
            .configure(&mut f.store, &mut f.resolver, "cbf1", Some("nhg1,nhg2"), Some("0:0,1:1"))
            .unwrap();
        let id = GroupId::ClassBased("cbf1".to_string());
        let Some(ForwardingHandle::Group(oid)) = f.store.handle(&id) else {
            panic!("expected a hardware group");
        };
        let first = f.switch.group_members(oid)[0];

        f.manager
            .configure(&mut f.store, &mut f.resolver, "cbf1", Some("nhg1,nhg3"), Some("0:0,1:1"))
            .unwrap();

        let members = f.switch.group_members(oid);
        assert_eq!(members.len(), 2);
        assert_eq!(members[0], first);
        assert_eq!(f.store.ref_count(&named("nhg2")), Some(0));
        assert_eq!(f.store.ref_count(&named("nhg3")), Some(1));
        assert_eq!(f.manager.dependents("nhg2").count(), 0);
    }

    #[test]
    fn test_class_based_member_rejected() {
        let mut f = setup();
        f.manager
            .configure(&mut f.store, &mut f.resolver, "cbf1", Some("nhg1"), Some("0:0"))
            .unwrap();
        let err = f
            .manager
            .configure(&mut f.store, &mut f.resolver, "cbf2", Some("cbf1"), Some("0:0"))
            .unwrap_err();
        assert!(matches!(err, NhgError::MalformedIntent(_)));
    }

    #[test]
    fn test_name_taken_by_either_kind_rejected() {
        let mut f = setup();
        let err = f
            .manager
            .configure(&mut f.store, &mut f.resolver, "nhg1", Some("nhg2,nhg3"), Some("0:0,1:1"))
            .unwrap_err();
        assert!(matches!(err, NhgError::MalformedIntent(_)));
        assert!(!f.store.contains(&GroupId::ClassBased("nhg1".to_string())));
        assert_eq!(f.store.ref_count(&named("nhg2")), Some(0));

        f.manager
            .configure(&mut f.store, &mut f.resolver, "cbf1", Some("nhg2"), Some("0:0"))
            .unwrap();
        let members = parse_members(Some("10.0.0.1"), Some("Ethernet0"), None).unwrap();
        let err = f
            .store
            .configure_named("cbf1", members, &mut f.resolver)
            .unwrap_err();
        assert!(matches!(err, NhgError::MalformedIntent(_)));
        assert!(!f.store.contains(&named("cbf1")));
    }

    #[test]
    fn test_remove_releases_members() {
        let mut f = setup();
        f.manager
            .configure(&mut f.store, &mut f.resolver, "cbf1", Some("nhg1,nhg2"), Some("0:0,1:1"))
            .unwrap();
        f.manager
            .remove(&mut f.store, &mut f.resolver, "cbf1")
            .unwrap();
        f.store.flush_retired();

        assert_eq!(f.store.ref_count(&named("nhg1")), Some(0));
        assert_eq!(f.switch.group_count(), 0);
        assert_eq!(f.manager.dependents("nhg1").count(), 0);
    }

    #[test]
    fn test_member_handle_change_propagates() {
        let mut f = setup();
        f.manager
            .configure(&mut f.store, &mut f.resolver, "cbf1", Some("nhg1"), Some("0:0"))
            .unwrap();
        assert_eq!(f.switch.member_count(), 1);

        f.manager.on_member_handle_change(&mut f.store, "nhg1", None);
        assert_eq!(f.switch.member_count(), 0);
    }
}
