//! Trace assembler: buffers spans per trace and dispatches them for rule
//! evaluation once a trace goes quiet.
//!
//! Ingestion is the hot path and only ever touches the buffer for its own
//! `(tenant_id, trace_id)` key before returning; evaluation happens on a
//! fixed pool of worker threads fed through a bounded `crossbeam` channel so
//! a burst of traffic cannot grow unbounded memory, following a
//! hot-path/cold-path split similar to a sidecar ring buffer.

use crate::config::EngineConfig;
use crate::error::{EngineError, Result};
use crate::interpreter::Interpreter;
use crate::registry::RuleRegistry;
use crate::span::{Span, Trace};
use crate::store::ViolationStore;
use crate::violation::Violation;
use chrono::Utc;
use crossbeam::channel::{self, Receiver, Sender, TrySendError};
use dashmap::DashMap;
use parking_lot::Mutex;
use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Default)]
pub struct IngestReport {
    pub total: usize,
    pub ingested: usize,
    pub failed: Vec<IngestFailure>,
}

#[derive(Debug, Clone)]
pub struct IngestFailure {
    pub offset: usize,
    pub reason: String,
}

struct TraceBuffer {
    tenant_id: String,
    trace_id: String,
    spans: Vec<Span>,
    last_seen: Instant,
    truncated: bool,
}

impl TraceBuffer {
    /// A root span (no parent) whose status has left `UNSET` means the trace
    /// is logically complete and should flush without waiting out the
    /// quiescence window.
    fn has_terminal_root(&self) -> bool {
        self.spans
            .iter()
            .any(|s| s.parent_span_id.is_none() && s.status != crate::span::SpanStatus::Unset)
    }
}

type BufferKey = (String, String);

struct FlushJob {
    key: BufferKey,
    spans: Vec<Span>,
}

/// Buffers spans per `(tenant_id, trace_id)` and evaluates compiled rules
/// against each trace once it flushes.
pub struct TraceAssembler {
    buffers: DashMap<BufferKey, Mutex<TraceBuffer>>,
    config: EngineConfig,
    tx: Sender<FlushJob>,
    workers: Vec<JoinHandle<()>>,
    shutdown: Arc<AtomicBool>,
}

impl TraceAssembler {
    pub fn new(config: EngineConfig, registry: Arc<RuleRegistry>, store: Arc<ViolationStore>) -> Self {
        let (tx, rx): (Sender<FlushJob>, Receiver<FlushJob>) =
            channel::bounded(config.ingest_queue_capacity);
        let shutdown = Arc::new(AtomicBool::new(false));

        let workers = (0..config.worker_count.max(1))
            .map(|id| {
                let rx = rx.clone();
                let registry = registry.clone();
                let store = store.clone();
                let shutdown = shutdown.clone();
                thread::Builder::new()
                    .name(format!("rule-engine-worker-{id}"))
                    .spawn(move || worker_loop(rx, registry, store, shutdown))
                    .expect("failed to spawn worker thread")
            })
            .collect();

        Self {
            buffers: DashMap::new(),
            config,
            tx,
            workers,
            shutdown,
        }
    }

    /// Ingests one span, buffering it under its trace until a flush trigger
    /// fires.
    pub fn ingest(&self, span: Span) -> Result<()> {
        span.validate()?;
        let key = (span.tenant_id.clone(), span.trace_id.clone());
        let entry = self
            .buffers
            .entry(key.clone())
            .or_insert_with(|| {
                Mutex::new(TraceBuffer {
                    tenant_id: span.tenant_id.clone(),
                    trace_id: span.trace_id.clone(),
                    spans: Vec::new(),
                    last_seen: Instant::now(),
                    truncated: false,
                })
            });

        let should_flush = {
            let mut buffer = entry.lock();
            if buffer.spans.len() < self.config.max_spans_per_trace {
                buffer.spans.push(span);
            } else {
                buffer.truncated = true;
            }
            buffer.last_seen = Instant::now();
            buffer.has_terminal_root() || buffer.spans.len() >= self.config.max_spans_per_trace
        };

        if should_flush {
            self.flush_key(&key)?;
        }
        Ok(())
    }

    pub fn ingest_batch(&self, spans: Vec<Span>) -> IngestReport {
        let total = spans.len();
        let mut report = IngestReport {
            total,
            ..Default::default()
        };
        for (offset, span) in spans.into_iter().enumerate() {
            match self.ingest(span) {
                Ok(()) => report.ingested += 1,
                Err(e) => report.failed.push(IngestFailure {
                    offset,
                    reason: e.to_string(),
                }),
            }
        }
        report
    }

    /// Forces any trace whose buffer has gone quiet past the configured
    /// timeout to flush. Intended to be called periodically from a reaper
    /// thread or test harness; the assembler does not spawn one itself so
    /// callers control the cadence.
    pub fn sweep_quiescent(&self) -> Result<usize> {
        let timeout = self.config.quiescence_timeout();
        let expired: Vec<BufferKey> = self
            .buffers
            .iter()
            .filter(|entry| entry.value().lock().last_seen.elapsed() >= timeout)
            .map(|entry| entry.key().clone())
            .collect();
        for key in &expired {
            self.flush_key(key)?;
        }
        Ok(expired.len())
    }

    fn flush_key(&self, key: &BufferKey) -> Result<()> {
        let Some((_, buffer)) = self.buffers.remove(key) else {
            return Ok(());
        };
        let buffer = buffer.into_inner();
        let job = FlushJob {
            key: key.clone(),
            spans: buffer.spans,
        };
        self.tx.try_send(job).map_err(|e| match e {
            TrySendError::Full(_) => {
                EngineError::Overloaded("evaluation queue is full".to_string())
            }
            TrySendError::Disconnected(_) => EngineError::ShuttingDown,
        })
    }

    /// Stops accepting new flush jobs and waits for the worker pool to drain
    /// the queue.
    pub fn shutdown(mut self) {
        self.shutdown.store(true, Ordering::SeqCst);
        for worker in self.workers.drain(..) {
            let _ = worker.join();
        }
    }
}

fn worker_loop(
    rx: Receiver<FlushJob>,
    registry: Arc<RuleRegistry>,
    store: Arc<ViolationStore>,
    shutdown: Arc<AtomicBool>,
) {
    loop {
        match rx.recv_timeout(Duration::from_millis(100)) {
            Ok(job) => evaluate_and_record(&job, &registry, &store),
            Err(channel::RecvTimeoutError::Timeout) => {
                if shutdown.load(Ordering::SeqCst) {
                    break;
                }
            }
            Err(channel::RecvTimeoutError::Disconnected) => break,
        }
    }
}

fn evaluate_and_record(job: &FlushJob, registry: &RuleRegistry, store: &ViolationStore) {
    let (tenant_id, trace_id) = &job.key;
    let Some(trace) = Trace::from_spans(&job.spans) else {
        return;
    };
    let rules = match registry.compiled_rules(tenant_id) {
        Ok(rules) => rules,
        Err(e) => {
            tracing::warn!(tenant_id, error = %e, "failed to load compiled rules");
            return;
        }
    };
    for rule in rules {
        match Interpreter::evaluate(&rule.ast, &trace) {
            Ok(true) => {
                let violation = Violation {
                    id: uuid::Uuid::new_v4().to_string(),
                    tenant_id: tenant_id.clone(),
                    rule_id: rule.rule_id.clone(),
                    rule_name: rule.name.clone(),
                    severity: rule.severity,
                    message: format!("rule '{}' matched trace {trace_id}", rule.name),
                    trace_ids: BTreeSet::from([trace_id.clone()]),
                    span_refs: trace
                        .spans
                        .iter()
                        .map(|s| crate::violation::SpanRef {
                            trace_id: trace_id.clone(),
                            span_id: s.span_id.clone(),
                            service_name: s.service_name.clone(),
                        })
                        .collect(),
                    created_at: Utc::now(),
                    signature: String::new(),
                    metadata: Default::default(),
                };
                if let Err(e) = store.record(violation) {
                    tracing::warn!(tenant_id, rule_id = %rule.rule_id, error = %e, "failed to record violation");
                }
            }
            Ok(false) => {}
            Err(e) => {
                tracing::warn!(tenant_id, rule_id = %rule.rule_id, error = %e, "rule evaluation failed");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rule::{Rule, Severity};
    use crate::signing::SigningService;
    use crate::span::SpanKind;
    use std::collections::BTreeMap;
    use std::thread::sleep;

    fn make_span(id: &str, trace: &str, op: &str, parent: Option<&str>, status: crate::span::SpanStatus) -> Span {
        Span {
            span_id: id.to_string(),
            trace_id: trace.to_string(),
            parent_span_id: parent.map(|p| p.to_string()),
            operation_name: op.to_string(),
            service_name: "svc".to_string(),
            status,
            kind: SpanKind::Internal,
            start: 0,
            end: 100,
            duration_ns: 100,
            attributes: BTreeMap::new(),
            tenant_id: "tenant-a".to_string(),
        }
    }

    fn make_assembler(config: EngineConfig) -> (TraceAssembler, Arc<RuleRegistry>, Arc<ViolationStore>) {
        let registry = Arc::new(RuleRegistry::new(config.compile_cache_capacity));
        let store = Arc::new(ViolationStore::new(
            SigningService::new("0123456789abcdef0123456789abcdef").unwrap(),
        ));
        let assembler = TraceAssembler::new(config, registry.clone(), store.clone());
        (assembler, registry, store)
    }

    fn register_rule(registry: &RuleRegistry, expr: &str) {
        let now = Utc::now();
        registry
            .register(Rule {
                id: "r1".to_string(),
                tenant_id: "tenant-a".to_string(),
                name: "test-rule".to_string(),
                description: None,
                severity: Severity::High,
                expression: expr.to_string(),
                enabled: true,
                created_at: now,
                updated_at: now,
                metadata: BTreeMap::new(),
            })
            .unwrap();
    }

    #[test]
    fn root_span_with_terminal_status_flushes_immediately() {
        let (assembler, registry, store) = make_assembler(EngineConfig::default());
        register_rule(&registry, r#"span.status == "ERROR""#);

        assembler
            .ingest(make_span(
                "root",
                "t1",
                "op",
                None,
                crate::span::SpanStatus::Error,
            ))
            .unwrap();

        sleep(Duration::from_millis(200));
        let violations = store.query("tenant-a", &Default::default());
        assert_eq!(violations.len(), 1);
        assembler.shutdown();
    }

    #[test]
    fn quiescence_sweep_flushes_idle_trace() {
        let mut config = EngineConfig::default();
        config.quiescence_timeout_secs = 0;
        let (assembler, registry, store) = make_assembler(config);
        register_rule(&registry, "trace.has(slow.op)");

        assembler
            .ingest(make_span(
                "s1",
                "t1",
                "slow.op",
                None,
                crate::span::SpanStatus::Unset,
            ))
            .unwrap();
        assembler.sweep_quiescent().unwrap();

        sleep(Duration::from_millis(200));
        let violations = store.query("tenant-a", &Default::default());
        assert_eq!(violations.len(), 1);
        assembler.shutdown();
    }

    #[test]
    fn ingest_batch_reports_per_item_failures() {
        let (assembler, _registry, _store) = make_assembler(EngineConfig::default());
        let mut bad_span = make_span("s1", "t1", "op", None, crate::span::SpanStatus::Unset);
        bad_span.span_id = String::new();
        let good_span = make_span("s2", "t1", "op", Some("s1"), crate::span::SpanStatus::Unset);

        let report = assembler.ingest_batch(vec![bad_span, good_span]);
        assert_eq!(report.total, 2);
        assert_eq!(report.ingested, 1);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].offset, 0);
        assembler.shutdown();
    }

    #[test]
    fn reaching_span_cap_flushes_the_buffered_trace() {
        let mut config = EngineConfig::default();
        config.max_spans_per_trace = 2;
        let (assembler, registry, store) = make_assembler(config);
        register_rule(&registry, "trace.count(op) >= 2");

        for i in 0..2 {
            assembler
                .ingest(make_span(
                    &format!("s{i}"),
                    "t1",
                    "op",
                    Some("root"),
                    crate::span::SpanStatus::Unset,
                ))
                .unwrap();
        }
        sleep(Duration::from_millis(200));
        let violations = store.query("tenant-a", &Default::default());
        assert_eq!(violations.len(), 1);
        assembler.shutdown();
    }
}
