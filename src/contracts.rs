//! Public contract facade
//!
//! `Contracts` is the single entry point embedders and the CLI binary talk
//! to; it owns the registry, store, and assembler and exposes them as one
//! cohesive API so callers never construct those pieces themselves.

use crate::assembler::{IngestReport, TraceAssembler};
use crate::config::EngineConfig;
use crate::error::Result;
use crate::registry::RuleRegistry;
use crate::rule::Rule;
use crate::signing::SigningService;
use crate::span::Span;
use crate::store::{ViolationFilter, ViolationStore};
use crate::violation::Violation;
use std::sync::Arc;

pub struct Contracts {
    registry: Arc<RuleRegistry>,
    store: Arc<ViolationStore>,
    assembler: TraceAssembler,
}

impl Contracts {
    pub fn new(config: EngineConfig, signer: SigningService) -> Self {
        let registry = Arc::new(RuleRegistry::new(config.compile_cache_capacity));
        let store = Arc::new(ViolationStore::new(signer));
        let assembler = TraceAssembler::new(config, registry.clone(), store.clone());
        Self {
            registry,
            store,
            assembler,
        }
    }

    /// Registers a rule, returning its id (the caller's own, or a fresh one
    /// if the rule was created without one).
    pub fn register_rule(&self, rule: Rule) -> Result<String> {
        self.registry.register(rule).map(|c| c.rule_id)
    }

    pub fn update_rule(&self, tenant_id: &str, rule: Rule) -> Result<()> {
        self.registry.update(tenant_id, rule).map(|_| ())
    }

    pub fn delete_rule(&self, tenant_id: &str, rule_id: &str) -> Result<()> {
        self.registry.delete(tenant_id, rule_id)
    }

    pub fn get_rule(&self, tenant_id: &str, rule_id: &str) -> Result<Rule> {
        self.registry.get(tenant_id, rule_id)
    }

    pub fn list_rules(&self, tenant_id: &str) -> Vec<Rule> {
        self.registry.list(tenant_id)
    }

    /// Direct registry access for callers (e.g. the CLI's `import`
    /// subcommand) that need registry operations `Contracts` doesn't wrap
    /// one-to-one, such as bulk import.
    pub fn registry(&self) -> &RuleRegistry {
        &self.registry
    }

    /// Validates DSL source without registering a rule.
    pub fn validate(&self, expression: &str) -> Result<()> {
        self.registry.validate_expression(expression)
    }

    pub fn ingest_span(&self, span: Span) -> Result<()> {
        self.assembler.ingest(span)
    }

    pub fn ingest_spans(&self, spans: Vec<Span>) -> IngestReport {
        self.assembler.ingest_batch(spans)
    }

    pub fn query_violations(&self, tenant_id: &str, filter: &ViolationFilter) -> Vec<Violation> {
        self.store.query(tenant_id, filter)
    }

    pub fn get_violation(&self, tenant_id: &str, violation_id: &str) -> Result<Violation> {
        self.store.get(tenant_id, violation_id)
    }

    pub fn verify_violations(&self, tenant_id: &str) -> Vec<String> {
        self.store.verify_all(tenant_id)
    }

    pub fn sweep_quiescent_traces(&self) -> Result<usize> {
        self.assembler.sweep_quiescent()
    }
}
