//! Per-table intent queue with latest-intent-wins coalescing.

use std::collections::{HashMap, VecDeque};

use serde::{Deserialize, Serialize};

/// Operation type of a table intent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Operation {
    /// Set operation (add or update)
    Set,
    /// Delete operation
    Del,
}

impl Operation {
    /// Returns true if this is a Set operation.
    pub fn is_set(&self) -> bool {
        matches!(self, Operation::Set)
    }

    /// Returns true if this is a Del operation.
    pub fn is_del(&self) -> bool {
        matches!(self, Operation::Del)
    }
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Operation::Set => f.write_str("SET"),
            Operation::Del => f.write_str("DEL"),
        }
    }
}

/// A field-value pair of a table entry.
pub type FieldValue = (String, String);

/// Key, operation, and field-values tuple.
///
/// This is the fundamental unit of data consumed from a table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyOpFieldsValues {
    /// The key (e.g., "nhg1", "10.0.0.0/24")
    pub key: String,
    /// The operation (Set or Del)
    pub op: Operation,
    /// Field-value pairs (empty for Del operations)
    #[serde(default)]
    pub fvs: Vec<FieldValue>,
}

impl KeyOpFieldsValues {
    /// Creates a new entry.
    pub fn new(key: impl Into<String>, op: Operation, fvs: Vec<FieldValue>) -> Self {
        Self {
            key: key.into(),
            op,
            fvs,
        }
    }

    /// Creates a Set entry.
    pub fn set(key: impl Into<String>, fvs: Vec<FieldValue>) -> Self {
        Self::new(key, Operation::Set, fvs)
    }

    /// Creates a Set entry from borrowed field pairs.
    pub fn set_fields(key: impl Into<String>, fvs: &[(&str, &str)]) -> Self {
        Self::set(
            key,
            fvs.iter()
                .map(|(f, v)| (f.to_string(), v.to_string()))
                .collect(),
        )
    }

    /// Creates a Del entry.
    pub fn del(key: impl Into<String>) -> Self {
        Self::new(key, Operation::Del, vec![])
    }

    /// Returns the value for a field, if present.
    pub fn get_field(&self, field: &str) -> Option<&str> {
        self.fvs
            .iter()
            .find(|(f, _)| f == field)
            .map(|(_, v)| v.as_str())
    }

    /// Returns true if this entry has the given field.
    pub fn has_field(&self, field: &str) -> bool {
        self.fvs.iter().any(|(f, _)| f == field)
    }
}

/// Configuration for a Consumer.
#[derive(Debug, Clone)]
pub struct ConsumerConfig {
    /// Table name (e.g., "ROUTE_TABLE", "NEXT_HOP_GROUP_TABLE")
    pub table_name: String,
    /// Priority (lower = higher priority)
    pub priority: i32,
    /// Maximum entries returned by one drain
    pub batch_size: usize,
}

impl ConsumerConfig {
    /// Creates a new consumer config.
    pub fn new(table_name: impl Into<String>) -> Self {
        Self {
            table_name: table_name.into(),
            priority: 0,
            batch_size: 128,
        }
    }

    /// Sets the priority.
    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    /// Sets the batch size.
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }
}

/// Consumer of table intents.
///
/// Holds at most one pending intent per key. Keys are drained in the order
/// they first became pending.
///
/// # Coalescing
///
/// A newer intent for a key that is still queued replaces the queued one
/// entirely:
/// - SET after SET: the newer field set wins (fields are not merged)
/// - DEL after SET: the SET is cancelled
/// - SET after DEL: the DEL is cancelled
///
/// The queued position of the key is kept.
#[derive(Debug)]
pub struct Consumer {
    config: ConsumerConfig,
    order: VecDeque<String>,
    pending: HashMap<String, KeyOpFieldsValues>,
}

impl Consumer {
    /// Creates a new consumer with the given configuration.
    pub fn new(config: ConsumerConfig) -> Self {
        Self {
            config,
            order: VecDeque::new(),
            pending: HashMap::new(),
        }
    }

    /// Returns the table name.
    pub fn table_name(&self) -> &str {
        &self.config.table_name
    }

    /// Returns the priority.
    pub fn priority(&self) -> i32 {
        self.config.priority
    }

    /// Returns true if there are pending entries.
    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }

    /// Returns the number of pending entries.
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Returns true if an intent for `key` is queued.
    pub fn is_pending(&self, key: &str) -> bool {
        self.pending.contains_key(key)
    }

    /// Adds entries to the queue, coalescing per key.
    pub fn add_to_sync(&mut self, entries: Vec<KeyOpFieldsValues>) {
        for entry in entries {
            self.add_single_entry(entry);
        }
    }

    fn add_single_entry(&mut self, entry: KeyOpFieldsValues) {
        match self.pending.get_mut(&entry.key) {
            Some(queued) => *queued = entry,
            None => {
                self.order.push_back(entry.key.clone());
                self.pending.insert(entry.key.clone(), entry);
            }
        }
    }

    /// Drains up to `batch_size` pending entries in queue order.
    pub fn drain(&mut self) -> Vec<KeyOpFieldsValues> {
        let mut result = Vec::with_capacity(self.config.batch_size.min(self.pending.len()));

        while result.len() < self.config.batch_size {
            let Some(key) = self.order.pop_front() else {
                break;
            };
            if let Some(entry) = self.pending.remove(&key) {
                result.push(entry);
            }
        }

        result
    }

    /// Peeks at pending entries in queue order without removing them.
    pub fn peek(&self) -> impl Iterator<Item = &KeyOpFieldsValues> {
        self.order.iter().filter_map(|key| self.pending.get(key))
    }

    /// Puts an entry back at the front of the queue.
    ///
    /// Ignored when a newer intent for the same key is already queued.
    pub fn retry(&mut self, entry: KeyOpFieldsValues) {
        if self.pending.contains_key(&entry.key) {
            return;
        }
        self.order.push_front(entry.key.clone());
        self.pending.insert(entry.key.clone(), entry);
    }

    /// Clears all pending entries.
    pub fn clear(&mut self) {
        self.order.clear();
        self.pending.clear();
    }

    /// Dumps pending entries for debugging.
    pub fn dump(&self) -> Vec<String> {
        self.peek()
            .map(|e| format!("{}: {} {:?}", e.key, e.op, e.fvs))
            .collect()
    }
}
