//! Append-only violation store
//!
//! Storage is in-memory, per-tenant, and append-only: `record` never
//! overwrites an existing entry and there is no delete path. Signing and
//! verification are delegated to [`crate::signing::SigningService`]; this
//! module only owns ordering and filtering.

use crate::error::{EngineError, Result};
use crate::rule::Severity;
use crate::signing::SigningService;
use crate::violation::Violation;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use parking_lot::Mutex;
use std::sync::Arc;

#[derive(Debug, Clone, Default)]
pub struct ViolationFilter {
    pub rule_id: Option<String>,
    pub severity: Option<Severity>,
    pub since: Option<DateTime<Utc>>,
    pub limit: Option<usize>,
}

pub struct ViolationStore {
    signer: SigningService,
    by_tenant: DashMap<String, Arc<Mutex<Vec<Violation>>>>,
}

impl ViolationStore {
    pub fn new(signer: SigningService) -> Self {
        Self {
            signer,
            by_tenant: DashMap::new(),
        }
    }

    fn bucket(&self, tenant_id: &str) -> Arc<Mutex<Vec<Violation>>> {
        self.by_tenant
            .entry(tenant_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(Vec::new())))
            .clone()
    }

    /// Signs and appends a violation. The caller supplies everything except
    /// the signature, which this store computes so no caller can forge one.
    pub fn record(&self, mut violation: Violation) -> Result<Violation> {
        violation.signature = self.signer.sign(&violation);
        let bucket = self.bucket(&violation.tenant_id);
        bucket.lock().push(violation.clone());
        Ok(violation)
    }

    pub fn get(&self, tenant_id: &str, violation_id: &str) -> Result<Violation> {
        let bucket = self.bucket(tenant_id);
        bucket
            .lock()
            .iter()
            .find(|v| v.id == violation_id)
            .cloned()
            .ok_or_else(|| EngineError::NotFound(format!("violation {violation_id} not found")))
    }

    /// Newest-first, with ties broken by `id` so pagination over
    /// same-timestamp violations stays stable.
    pub fn query(&self, tenant_id: &str, filter: &ViolationFilter) -> Vec<Violation> {
        let bucket = self.bucket(tenant_id);
        let mut results: Vec<Violation> = bucket
            .lock()
            .iter()
            .filter(|v| match &filter.rule_id {
                Some(id) => &v.rule_id == id,
                None => true,
            })
            .filter(|v| match filter.severity {
                Some(s) => v.severity == s,
                None => true,
            })
            .filter(|v| match filter.since {
                Some(since) => v.created_at >= since,
                None => true,
            })
            .cloned()
            .collect();
        results.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        if let Some(limit) = filter.limit {
            results.truncate(limit);
        }
        results
    }

    /// Re-derives each stored violation's signature and compares it against
    /// what is on record, surfacing any that fail.
    pub fn verify_all(&self, tenant_id: &str) -> Vec<String> {
        let bucket = self.bucket(tenant_id);
        bucket
            .lock()
            .iter()
            .filter(|v| !self.signer.verify(v))
            .map(|v| v.id.clone())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::{BTreeMap, BTreeSet};

    fn signer() -> SigningService {
        SigningService::new("0123456789abcdef0123456789abcdef").unwrap()
    }

    fn make_violation(id: &str, rule_id: &str, severity: Severity) -> Violation {
        Violation {
            id: id.to_string(),
            tenant_id: "tenant-a".to_string(),
            rule_id: rule_id.to_string(),
            rule_name: "rule".to_string(),
            severity,
            message: "violation".to_string(),
            trace_ids: BTreeSet::from(["t1".to_string()]),
            span_refs: vec![],
            created_at: Utc::now(),
            signature: String::new(),
            metadata: BTreeMap::new(),
        }
    }

    #[test]
    fn record_then_get_round_trips() {
        let store = ViolationStore::new(signer());
        let recorded = store.record(make_violation("v1", "r1", Severity::High)).unwrap();
        assert!(!recorded.signature.is_empty());
        let fetched = store.get("tenant-a", "v1").unwrap();
        assert_eq!(fetched.signature, recorded.signature);
    }

    #[test]
    fn query_filters_by_rule_id() {
        let store = ViolationStore::new(signer());
        store.record(make_violation("v1", "r1", Severity::High)).unwrap();
        store.record(make_violation("v2", "r2", Severity::High)).unwrap();
        let results = store.query(
            "tenant-a",
            &ViolationFilter {
                rule_id: Some("r1".to_string()),
                ..Default::default()
            },
        );
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].id, "v1");
    }

    #[test]
    fn query_filters_by_severity() {
        let store = ViolationStore::new(signer());
        store.record(make_violation("v1", "r1", Severity::Low)).unwrap();
        store.record(make_violation("v2", "r1", Severity::Critical)).unwrap();
        let results = store.query(
            "tenant-a",
            &ViolationFilter {
                severity: Some(Severity::Critical),
                ..Default::default()
            },
        );
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].id, "v2");
    }

    #[test]
    fn query_respects_limit() {
        let store = ViolationStore::new(signer());
        for i in 0..5 {
            store
                .record(make_violation(&format!("v{i}"), "r1", Severity::Low))
                .unwrap();
        }
        let results = store.query(
            "tenant-a",
            &ViolationFilter {
                limit: Some(2),
                ..Default::default()
            },
        );
        assert_eq!(results.len(), 2);
    }

    #[test]
    fn verify_all_detects_tampering() {
        let store = ViolationStore::new(signer());
        store.record(make_violation("v1", "r1", Severity::High)).unwrap();
        assert!(store.verify_all("tenant-a").is_empty());

        let bucket = store.bucket("tenant-a");
        bucket.lock()[0].message = "tampered".to_string();
        assert_eq!(store.verify_all("tenant-a"), vec!["v1".to_string()]);
    }

    #[test]
    fn tenants_are_isolated() {
        let store = ViolationStore::new(signer());
        store.record(make_violation("v1", "r1", Severity::High)).unwrap();
        assert!(store.query("tenant-b", &ViolationFilter::default()).is_empty());
        assert!(store.get("tenant-b", "v1").is_err());
    }
}
