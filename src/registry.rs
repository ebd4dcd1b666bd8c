//! Rule registry and compile cache
//!
//! Rules are stored per tenant; mutation of a tenant's rule set is
//! serialized through a [`parking_lot::Mutex`] so two concurrent `register`
//! calls for the same tenant cannot race, while unrelated tenants never
//! contend (`DashMap` shards by tenant_id, following the per-tenant
//! isolation the assembler and store also enforce).

use crate::dsl::{self, Ast};
use crate::error::{EngineError, Result};
use crate::rule::{Rule, Severity};
use dashmap::DashMap;
use lru::LruCache;
use parking_lot::Mutex;
use sha2::{Digest, Sha256};
use std::num::NonZeroUsize;
use std::sync::Arc;

/// A rule whose expression has been parsed into an [`Ast`], ready for the
/// interpreter. Cheap to clone: the AST is behind an `Arc`.
#[derive(Debug, Clone)]
pub struct CompiledRule {
    pub rule_id: String,
    pub fingerprint: String,
    pub ast: Arc<Ast>,
    pub severity: Severity,
    pub name: String,
    pub description: Option<String>,
}

/// Stable content hash of a rule's normalized source, used as the compile
/// cache key so two rules (or the same rule re-saved) with textually
/// equivalent expressions share one compiled entry.
pub fn fingerprint(expression: &str) -> String {
    let normalized: String = expression.split_whitespace().collect::<Vec<_>>().join(" ");
    let mut hasher = Sha256::new();
    hasher.update(normalized.as_bytes());
    hex::encode(hasher.finalize())
}

struct TenantRules {
    rules: Vec<Rule>,
}

/// Holds every tenant's rule set plus a shared, fingerprint-keyed compile
/// cache bounded by `cache_capacity` entries (LRU eviction).
pub struct RuleRegistry {
    tenants: DashMap<String, Arc<Mutex<TenantRules>>>,
    cache: Mutex<LruCache<String, Arc<Ast>>>,
}

impl RuleRegistry {
    pub fn new(cache_capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(cache_capacity.max(1)).unwrap();
        Self {
            tenants: DashMap::new(),
            cache: Mutex::new(LruCache::new(capacity)),
        }
    }

    fn tenant_bucket(&self, tenant_id: &str) -> Arc<Mutex<TenantRules>> {
        self.tenants
            .entry(tenant_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(TenantRules { rules: Vec::new() })))
            .clone()
    }

    /// Compiles a rule expression, consulting the cache before invoking the
    /// parser.
    fn compile(&self, expression: &str) -> Result<(String, Arc<Ast>)> {
        let fp = fingerprint(expression);
        if let Some(ast) = self.cache.lock().get(&fp) {
            return Ok((fp, ast.clone()));
        }
        let ast = Arc::new(dsl::parse(expression)?);
        self.cache.lock().put(fp.clone(), ast.clone());
        Ok((fp, ast))
    }

    /// Validates and compiles a rule without storing it (used by the
    /// `validate` public contract).
    pub fn validate_expression(&self, expression: &str) -> Result<()> {
        self.compile(expression).map(|_| ())
    }

    /// Registers a rule, assigning it a fresh unique id first if it was
    /// created without one.
    pub fn register(&self, mut rule: Rule) -> Result<CompiledRule> {
        if rule.id.is_empty() {
            rule.id = format!("rule-{}", uuid::Uuid::new_v4().simple());
        }
        rule.validate()?;
        let (fingerprint, ast) = self.compile(&rule.expression)?;
        let bucket = self.tenant_bucket(&rule.tenant_id);
        let mut guard = bucket.lock();
        if guard.rules.iter().any(|r| r.id == rule.id) {
            return Err(EngineError::Validation(format!(
                "rule {} already exists for tenant {}",
                rule.id, rule.tenant_id
            )));
        }
        let compiled = CompiledRule {
            rule_id: rule.id.clone(),
            fingerprint,
            ast,
            severity: rule.severity,
            name: rule.name.clone(),
            description: rule.description.clone(),
        };
        guard.rules.push(rule);
        Ok(compiled)
    }

    pub fn update(&self, tenant_id: &str, rule: Rule) -> Result<CompiledRule> {
        rule.validate()?;
        let (fingerprint, ast) = self.compile(&rule.expression)?;
        let bucket = self.tenant_bucket(tenant_id);
        let mut guard = bucket.lock();
        let slot = guard
            .rules
            .iter_mut()
            .find(|r| r.id == rule.id)
            .ok_or_else(|| EngineError::NotFound(format!("rule {} not found", rule.id)))?;
        *slot = rule.clone();
        Ok(CompiledRule {
            rule_id: rule.id,
            fingerprint,
            ast,
            severity: rule.severity,
            name: rule.name,
            description: rule.description,
        })
    }

    /// Removes a rule from the registry. Does not tombstone violations
    /// already recorded against it: violations are an immutable historical
    /// record independent of a rule's later deletion.
    pub fn delete(&self, tenant_id: &str, rule_id: &str) -> Result<()> {
        let bucket = self.tenant_bucket(tenant_id);
        let mut guard = bucket.lock();
        let before = guard.rules.len();
        guard.rules.retain(|r| r.id != rule_id);
        if guard.rules.len() == before {
            return Err(EngineError::NotFound(format!("rule {rule_id} not found")));
        }
        Ok(())
    }

    pub fn get(&self, tenant_id: &str, rule_id: &str) -> Result<Rule> {
        let bucket = self.tenant_bucket(tenant_id);
        let guard = bucket.lock();
        guard
            .rules
            .iter()
            .find(|r| r.id == rule_id)
            .cloned()
            .ok_or_else(|| EngineError::NotFound(format!("rule {rule_id} not found")))
    }

    pub fn list(&self, tenant_id: &str) -> Vec<Rule> {
        let bucket = self.tenant_bucket(tenant_id);
        bucket.lock().rules.clone()
    }

    /// Compiles and returns every enabled rule for a tenant, for the
    /// assembler to hand to the interpreter.
    pub fn compiled_rules(&self, tenant_id: &str) -> Result<Vec<CompiledRule>> {
        let rules = self.list(tenant_id);
        rules
            .into_iter()
            .filter(|r| r.enabled)
            .map(|r| {
                let (fingerprint, ast) = self.compile(&r.expression)?;
                Ok(CompiledRule {
                    rule_id: r.id,
                    fingerprint,
                    ast,
                    severity: r.severity,
                    name: r.name,
                    description: r.description,
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use std::collections::BTreeMap;

    fn make_rule(id: &str, expr: &str) -> Rule {
        let now = Utc::now();
        Rule {
            id: id.to_string(),
            tenant_id: "tenant-a".to_string(),
            name: id.to_string(),
            description: None,
            severity: Severity::Medium,
            expression: expr.to_string(),
            enabled: true,
            created_at: now,
            updated_at: now,
            metadata: BTreeMap::new(),
        }
    }

    #[test]
    fn fingerprint_ignores_whitespace_differences() {
        assert_eq!(
            fingerprint("trace.has(x)   and  trace.has(y)"),
            fingerprint("trace.has(x) and trace.has(y)")
        );
    }

    #[test]
    fn register_and_list_round_trips() {
        let registry = RuleRegistry::new(16);
        registry
            .register(make_rule("r1", r#"span.status == "ERROR""#))
            .unwrap();
        let rules = registry.list("tenant-a");
        assert_eq!(rules.len(), 1);
        assert_eq!(rules[0].id, "r1");
    }

    #[test]
    fn register_rejects_duplicate_id() {
        let registry = RuleRegistry::new(16);
        registry.register(make_rule("r1", "true")).unwrap();
        let err = registry.register(make_rule("r1", "true")).unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Validation);
    }

    #[test]
    fn register_rejects_invalid_expression() {
        let registry = RuleRegistry::new(16);
        let err = registry.register(make_rule("r1", "and and")).unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Parse);
    }

    #[test]
    fn delete_does_not_error_on_second_lookup_after_removal() {
        let registry = RuleRegistry::new(16);
        registry.register(make_rule("r1", "true")).unwrap();
        registry.delete("tenant-a", "r1").unwrap();
        assert!(registry.get("tenant-a", "r1").is_err());
    }

    #[test]
    fn delete_missing_rule_is_not_found() {
        let registry = RuleRegistry::new(16);
        let err = registry.delete("tenant-a", "missing").unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::NotFound);
    }

    #[test]
    fn tenants_are_isolated() {
        let registry = RuleRegistry::new(16);
        registry.register(make_rule("r1", "true")).unwrap();
        assert!(registry.list("tenant-b").is_empty());
        assert!(registry.get("tenant-b", "r1").is_err());
    }

    #[test]
    fn register_assigns_fresh_id_when_absent() {
        let registry = RuleRegistry::new(16);
        let mut rule = make_rule("r1", "true");
        rule.id = String::new();
        let compiled = registry.register(rule).unwrap();
        assert!(!compiled.rule_id.is_empty());
        let rules = registry.list("tenant-a");
        assert_eq!(rules.len(), 1);
        assert_eq!(rules[0].id, compiled.rule_id);
    }

    #[test]
    fn compiled_rules_skips_disabled() {
        let registry = RuleRegistry::new(16);
        let mut rule = make_rule("r1", "true");
        rule.enabled = false;
        registry.register(rule).unwrap();
        assert!(registry.compiled_rules("tenant-a").unwrap().is_empty());
    }
}
