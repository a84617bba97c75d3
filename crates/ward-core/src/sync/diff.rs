//! Snapshot reconciliation for resources without an incremental feed.
//!
//! Given the cached snapshot and a freshly fetched server snapshot, produce
//! the minimal set of deltas that transforms one into the other: unchanged
//! records produce nothing, changed records one update, records the server
//! dropped one delete, and new server records one insert.

use std::collections::HashMap;

use crate::models::{Form, Location};

/// A record with a stable server-assigned identity.
pub trait Keyed {
    fn key(&self) -> &str;
}

impl Keyed for Location {
    fn key(&self) -> &str {
        &self.uuid
    }
}

impl Keyed for Form {
    fn key(&self) -> &str {
        &self.uuid
    }
}

/// One scheduled reconciliation operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Delta<T> {
    Insert(T),
    Update(T),
    Delete(String),
}

/// Diff the cached snapshot against the server snapshot.
///
/// Equality is whole-record (`PartialEq` over the same fields that get
/// written), so local-only bookkeeping must not appear in the compared types.
/// Deletes surface in local order, inserts in server order.
pub fn diff_snapshots<T: Keyed + PartialEq>(local: Vec<T>, server: Vec<T>) -> Vec<Delta<T>> {
    let order: Vec<String> = server.iter().map(|r| r.key().to_string()).collect();
    let mut index: HashMap<String, T> = server
        .into_iter()
        .map(|r| (r.key().to_string(), r))
        .collect();

    let mut deltas = Vec::new();
    for cached in local {
        match index.remove(cached.key()) {
            Some(fetched) if fetched == cached => {} // unchanged
            Some(fetched) => deltas.push(Delta::Update(fetched)),
            None => deltas.push(Delta::Delete(cached.key().to_string())),
        }
    }
    for key in order {
        if let Some(fetched) = index.remove(&key) {
            deltas.push(Delta::Insert(fetched));
        }
    }
    deltas
}
