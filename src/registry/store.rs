//! Authoritative in-memory table of backend status.
//!
//! # Responsibilities
//! - Register each configured service exactly once
//! - Apply success/failure transitions atomically per service
//! - Hand out owned copies for routing decisions and admin endpoints
//!
//! # Design Decisions
//! - DashMap shards the table; a transition holds one shard lock for a
//!   single in-place update, so readers never wait on network I/O
//! - Snapshots are ordered by name for stable JSON output

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use thiserror::Error;

use crate::registry::endpoint::ServiceEndpoint;
use crate::registry::record::{ServiceRecord, ServiceStatus};

/// Registry misuse.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("service {0:?} is already registered")]
    DuplicateService(String),

    #[error("service {0:?} is not registered")]
    UnknownService(String),
}

/// Thread-safe registry of service records keyed by name.
#[derive(Debug, Default)]
pub struct ServiceRegistry {
    records: DashMap<String, ServiceRecord>,
}

impl ServiceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a new record in the `Starting` state.
    pub fn register(&self, endpoint: ServiceEndpoint) -> Result<(), RegistryError> {
        match self.records.entry(endpoint.name.clone()) {
            Entry::Occupied(_) => Err(RegistryError::DuplicateService(endpoint.name)),
            Entry::Vacant(slot) => {
                tracing::debug!(service = %endpoint.name, required = endpoint.required, "Service registered");
                slot.insert(ServiceRecord::new(Arc::new(endpoint)));
                Ok(())
            }
        }
    }

    /// Mark a service healthy. Returns the record as it was left.
    pub fn record_success(&self, name: &str, at: DateTime<Utc>) -> Result<ServiceRecord, RegistryError> {
        let mut record = self
            .records
            .get_mut(name)
            .ok_or_else(|| RegistryError::UnknownService(name.to_string()))?;
        record.apply_success(at);
        Ok(record.value().clone())
    }

    /// Count a failed check and demote the service. Returns the record as it
    /// was left.
    pub fn record_failure(
        &self,
        name: &str,
        at: DateTime<Utc>,
        threshold: u32,
    ) -> Result<ServiceRecord, RegistryError> {
        let mut record = self
            .records
            .get_mut(name)
            .ok_or_else(|| RegistryError::UnknownService(name.to_string()))?;
        record.apply_failure(at, threshold);
        Ok(record.value().clone())
    }

    /// Copy of a single record.
    pub fn get(&self, name: &str) -> Option<ServiceRecord> {
        self.records.get(name).map(|r| r.value().clone())
    }

    pub fn status(&self, name: &str) -> Option<ServiceStatus> {
        self.records.get(name).map(|r| r.status)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.records.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Registered service names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.records.iter().map(|r| r.key().clone()).collect();
        names.sort();
        names
    }

    /// Immutable copy of every record.
    pub fn snapshot(&self) -> RegistrySnapshot {
        let records = self
            .records
            .iter()
            .map(|r| (r.key().clone(), r.value().clone()))
            .collect();
        RegistrySnapshot { records }
    }
}

/// Point-in-time copy of the registry.
#[derive(Debug, Clone, Default)]
pub struct RegistrySnapshot {
    records: BTreeMap<String, ServiceRecord>,
}

impl RegistrySnapshot {
    pub fn get(&self, name: &str) -> Option<&ServiceRecord> {
        self.records.get(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ServiceRecord> {
        self.records.values()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn count(&self, status: ServiceStatus) -> usize {
        self.records.values().filter(|r| r.status == status).count()
    }
}
