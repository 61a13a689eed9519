//! In-memory backends for tests and single-process deployments.
//!
//! [`InMemoryDocumentStore`] keeps documents in a `BTreeMap` behind a
//! `RwLock`, so scans come out in path order for free. Every write holds the
//! write lock for the whole row operation, merge included, which gives the
//! same per-row atomicity the SQL backend gets from single statements.

use std::collections::BTreeMap;
use std::ops::Bound;
use std::sync::{Mutex, RwLock};

use async_trait::async_trait;
use chrono::Utc;
use serde_json::{Map, Value};

use crate::document::{ShortLink, StoredDocument};
use crate::error::{StoreError, StoreResult};
use crate::pattern::LikePattern;
use crate::traits::{DocumentBackend, LinkBackend};

fn poisoned<E: std::fmt::Display>(e: E) -> StoreError {
    StoreError::Unavailable(format!("lock poisoned: {e}"))
}

/// An in-memory implementation of [`DocumentBackend`].
#[derive(Debug, Default)]
pub struct InMemoryDocumentStore {
    rows: RwLock<BTreeMap<String, StoredDocument>>,
}

impl InMemoryDocumentStore {
    /// Create a new empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored documents. Counts through a poisoned lock, since
    /// the map itself is never left half-written.
    pub fn len(&self) -> usize {
        match self.rows.read() {
            Ok(rows) => rows.len(),
            Err(poisoned) => poisoned.into_inner().len(),
        }
    }

    /// Returns `true` if nothing is stored.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Apply `update` to an existing row, or insert the value `create`
    /// produces, all under one write lock.
    fn write_row(
        &self,
        path: &str,
        update: impl FnOnce(&mut Value),
        create: impl FnOnce() -> Value,
    ) -> StoreResult<StoredDocument> {
        let mut rows = self.rows.write().map_err(poisoned)?;
        match rows.get_mut(path) {
            Some(existing) => {
                update(&mut existing.data);
                existing.updated_at = Utc::now();
                Ok(existing.clone())
            }
            None => {
                let fresh = StoredDocument::new(path, create());
                rows.insert(path.to_string(), fresh.clone());
                Ok(fresh)
            }
        }
    }
}

#[async_trait]
impl DocumentBackend for InMemoryDocumentStore {
    async fn fetch(&self, path: &str) -> StoreResult<Option<StoredDocument>> {
        let rows = self.rows.read().map_err(poisoned)?;
        Ok(rows.get(path).cloned())
    }

    async fn upsert(&self, path: &str, data: &Value) -> StoreResult<StoredDocument> {
        self.write_row(path, |current| *current = data.clone(), || data.clone())
    }

    async fn merge_upsert(&self, path: &str, partial: &Value) -> StoreResult<StoredDocument> {
        self.write_row(
            path,
            |current| pathstore_merge::merge_into(current, partial),
            || pathstore_merge::merge(&Value::Object(Map::new()), partial),
        )
    }

    async fn scan(
        &self,
        pattern: &str,
        after: Option<&str>,
        limit: usize,
    ) -> StoreResult<Vec<StoredDocument>> {
        let matcher = LikePattern::new(pattern);
        let rows = self.rows.read().map_err(poisoned)?;
        let lower = match after {
            Some(key) => Bound::Excluded(key),
            None => Bound::Unbounded,
        };
        Ok(rows
            .range::<str, _>((lower, Bound::Unbounded))
            .filter(|(path, _)| matcher.matches(path))
            .take(limit)
            .map(|(_, row)| row.clone())
            .collect())
    }
}

#[derive(Debug)]
struct LinkTable {
    next_id: i64,
    rows: BTreeMap<i64, ShortLink>,
}

/// An in-memory implementation of [`LinkBackend`]. Ids are assigned from 1.
#[derive(Debug)]
pub struct InMemoryLinkStore {
    table: Mutex<LinkTable>,
}

impl InMemoryLinkStore {
    pub fn new() -> Self {
        Self {
            table: Mutex::new(LinkTable {
                next_id: 1,
                rows: BTreeMap::new(),
            }),
        }
    }
}

impl Default for InMemoryLinkStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LinkBackend for InMemoryLinkStore {
    async fn insert(&self, url: &str, short_id: Option<i64>) -> StoreResult<ShortLink> {
        let mut table = self.table.lock().map_err(poisoned)?;
        let id = match short_id {
            Some(id) if table.rows.contains_key(&id) => {
                return Err(StoreError::Conflict(format!("short id {id} already in use")));
            }
            Some(id) => id,
            None => {
                while table.rows.contains_key(&table.next_id) {
                    table.next_id += 1;
                }
                let id = table.next_id;
                table.next_id += 1;
                id
            }
        };
        let link = ShortLink {
            short_id: id,
            url: url.to_string(),
            created_at: Utc::now(),
            access_count: 0,
            last_accessed: None,
        };
        table.rows.insert(id, link.clone());
        Ok(link)
    }

    async fn touch(&self, short_id: i64) -> StoreResult<Option<ShortLink>> {
        let mut table = self.table.lock().map_err(poisoned)?;
        Ok(table.rows.get_mut(&short_id).map(|link| {
            link.access_count += 1;
            link.last_accessed = Some(Utc::now());
            link.clone()
        }))
    }

    async fn get(&self, short_id: i64) -> StoreResult<Option<ShortLink>> {
        let table = self.table.lock().map_err(poisoned)?;
        Ok(table.rows.get(&short_id).cloned())
    }
}
