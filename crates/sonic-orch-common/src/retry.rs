//! Retry cache for task dependency tracking.
//!
//! The retry cache holds intents that cannot be applied until something
//! else happens (a group gets created, a group loses its last referrer)
//! and hands them back once every constraint they wait on is satisfied.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::hash::Hash;
use std::str::FromStr;

/// A constraint representing a dependency on another table/key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Constraint {
    /// The table or event class containing the dependency
    pub table: String,
    /// The key within the table
    pub key: String,
}

impl Constraint {
    /// Creates a new constraint.
    pub fn new(table: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            key: key.into(),
        }
    }
}

impl FromStr for Constraint {
    type Err = String;

    /// Parses a "table:key" string.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.split_once(':')
            .map(|(table, key)| Self::new(table, key))
            .ok_or_else(|| format!("constraint '{}' is not table:key", s))
    }
}

impl std::fmt::Display for Constraint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.table, self.key)
    }
}

/// Entry in the retry cache.
#[derive(Debug, Clone)]
struct RetryEntry<T> {
    data: T,
    constraints: HashSet<Constraint>,
}

impl<T> RetryEntry<T> {
    fn is_ready(&self) -> bool {
        self.constraints.is_empty()
    }
}

/// Cache for tasks waiting on dependencies.
///
/// Adding a task under a key that is already cached replaces the older task
/// together with its constraints.
#[derive(Debug)]
pub struct RetryCache<K, T> {
    entries: HashMap<K, RetryEntry<T>>,
    /// Reverse index: constraint -> keys waiting on it
    waiters: BTreeMap<Constraint, HashSet<K>>,
}

impl<K, T> RetryCache<K, T>
where
    K: Eq + Hash + Clone,
{
    /// Creates a new empty retry cache.
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
            waiters: BTreeMap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Adds a task with its constraints, replacing any task cached under
    /// the same key.
    pub fn add(&mut self, key: K, data: T, constraints: impl IntoIterator<Item = Constraint>) {
        self.remove(&key);

        let entry = RetryEntry {
            data,
            constraints: constraints.into_iter().collect(),
        };
        for constraint in &entry.constraints {
            self.waiters
                .entry(constraint.clone())
                .or_default()
                .insert(key.clone());
        }

        self.entries.insert(key, entry);
    }

    /// Removes a task from the cache.
    pub fn remove(&mut self, key: &K) -> Option<T> {
        let entry = self.entries.remove(key)?;
        for constraint in &entry.constraints {
            if let Some(waiters) = self.waiters.get_mut(constraint) {
                waiters.remove(key);
                if waiters.is_empty() {
                    self.waiters.remove(constraint);
                }
            }
        }
        Some(entry.data)
    }

    /// Notifies the cache that a constraint has been satisfied.
    ///
    /// Returns the keys of tasks that are now ready to retry.
    pub fn satisfy(&mut self, constraint: &Constraint) -> Vec<K> {
        let mut ready = Vec::new();

        if let Some(waiting_keys) = self.waiters.remove(constraint) {
            for key in waiting_keys {
                if let Some(entry) = self.entries.get_mut(&key) {
                    entry.constraints.remove(constraint);
                    if entry.is_ready() {
                        ready.push(key);
                    }
                }
            }
        }

        ready
    }

    /// Removes and returns all tasks with no outstanding constraint.
    pub fn drain_ready(&mut self) -> Vec<(K, T)> {
        let ready_keys: Vec<K> = self
            .entries
            .iter()
            .filter(|(_, e)| e.is_ready())
            .map(|(k, _)| k.clone())
            .collect();

        ready_keys
            .into_iter()
            .filter_map(|k| self.remove(&k).map(|data| (k, data)))
            .collect()
    }

    pub fn contains(&self, key: &K) -> bool {
        self.entries.contains_key(key)
    }

    /// Returns the constraints for a given key.
    pub fn constraints(&self, key: &K) -> Option<&HashSet<Constraint>> {
        self.entries.get(key).map(|e| &e.constraints)
    }

    /// Returns every constraint some task is waiting on, in order.
    pub fn waiting_constraints(&self) -> BTreeSet<Constraint> {
        self.waiters.keys().cloned().collect()
    }

    /// Iterates over cached tasks in no particular order.
    pub fn values(&self) -> impl Iterator<Item = &T> {
        self.entries.values().map(|e| &e.data)
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.waiters.clear();
    }
}

impl<K, T> Default for RetryCache<K, T>
where
    K: Eq + Hash + Clone,
{
    fn default() -> Self {
        Self::new()
    }
}
