//! Styled rendering as a decorator over the deterministic renderer
//!
//! The deterministic Mermaid output is always produced first and is the
//! result of record whenever the collaborator is disabled, unavailable,
//! slow, or returns markup that fails the structural check. Repeated
//! failures open a circuit breaker so a degraded collaborator stops
//! costing a timeout per diagram.

use std::sync::Mutex;
use std::time::{Duration, Instant};

use archgraph_core::policy::AiPolicy;
use archgraph_core::{Diagnostic, DiagnosticCode};
use archgraph_diagram::{mermaid, DiagramModel, DiagramType};

use crate::styler::DiagramStyler;

/// Circuit breaker over consecutive collaborator failures.
pub struct CircuitBreaker {
    failure_threshold: u32,
    cooldown: Duration,
    state: Mutex<BreakerState>,
}

struct BreakerState {
    consecutive_failures: u32,
    opened_at: Option<Instant>,
}

impl CircuitBreaker {
    pub fn new(failure_threshold: u32, cooldown: Duration) -> Self {
        CircuitBreaker {
            failure_threshold: failure_threshold.max(1),
            cooldown,
            state: Mutex::new(BreakerState {
                consecutive_failures: 0,
                opened_at: None,
            }),
        }
    }

    /// Whether a request may go out. An open circuit closes again after
    /// its cooldown elapses.
    pub fn allows_request(&self) -> bool {
        let mut state = self.state.lock().expect("breaker lock poisoned");
        match state.opened_at {
            None => true,
            Some(opened) if opened.elapsed() >= self.cooldown => {
                state.opened_at = None;
                state.consecutive_failures = 0;
                true
            }
            Some(_) => false,
        }
    }

    pub fn record_success(&self) {
        let mut state = self.state.lock().expect("breaker lock poisoned");
        state.consecutive_failures = 0;
        state.opened_at = None;
    }

    pub fn record_failure(&self) {
        let mut state = self.state.lock().expect("breaker lock poisoned");
        state.consecutive_failures += 1;
        if state.consecutive_failures >= self.failure_threshold && state.opened_at.is_none() {
            tracing::warn!(
                failures = state.consecutive_failures,
                "AI styling circuit opened"
            );
            state.opened_at = Some(Instant::now());
        }
    }

    pub fn is_open(&self) -> bool {
        !self.allows_request()
    }
}

/// Outcome of one render, carrying which path produced the markup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenderPath {
    Deterministic,
    Styled,
}

pub struct StyledRenderer {
    styler: Option<Box<dyn DiagramStyler>>,
    policy: AiPolicy,
    breaker: CircuitBreaker,
}

impl StyledRenderer {
    pub fn new(styler: Option<Box<dyn DiagramStyler>>, policy: AiPolicy) -> Self {
        let breaker = CircuitBreaker::new(policy.failure_threshold, policy.cooldown());
        StyledRenderer {
            styler,
            policy,
            breaker,
        }
    }

    /// Deterministic-only renderer.
    pub fn deterministic(policy: AiPolicy) -> Self {
        Self::new(None, policy)
    }

    /// Render the model. Never fails: every collaborator problem
    /// degrades to the deterministic markup plus a
    /// `RenderingUnavailable` diagnostic.
    pub async fn render(
        &self,
        model: &DiagramModel,
        diagram_type: DiagramType,
        diagnostics: &mut Vec<Diagnostic>,
    ) -> (String, RenderPath) {
        let deterministic = mermaid::render(model, diagram_type);

        let Some(styler) = self.styler.as_deref() else {
            return (deterministic, RenderPath::Deterministic);
        };
        if !self.policy.enabled {
            return (deterministic, RenderPath::Deterministic);
        }
        if !self.breaker.allows_request() {
            diagnostics.push(Diagnostic::new(
                DiagnosticCode::RenderingUnavailable,
                "AI styling circuit open, deterministic rendering used",
            ));
            return (deterministic, RenderPath::Deterministic);
        }

        let styled = tokio::time::timeout(
            self.policy.timeout(),
            styler.style(model, diagram_type, &deterministic),
        )
        .await;

        match styled {
            Ok(Ok(markup)) if mermaid::looks_valid(&markup) => {
                self.breaker.record_success();
                (markup, RenderPath::Styled)
            }
            Ok(Ok(_)) => {
                self.breaker.record_failure();
                diagnostics.push(Diagnostic::new(
                    DiagnosticCode::RenderingUnavailable,
                    format!("{} returned invalid markup, falling back", styler.name()),
                ));
                (deterministic, RenderPath::Deterministic)
            }
            Ok(Err(e)) => {
                self.breaker.record_failure();
                diagnostics.push(Diagnostic::new(
                    DiagnosticCode::RenderingUnavailable,
                    format!("{} failed: {e}, falling back", styler.name()),
                ));
                (deterministic, RenderPath::Deterministic)
            }
            Err(_) => {
                self.breaker.record_failure();
                diagnostics.push(Diagnostic::new(
                    DiagnosticCode::RenderingUnavailable,
                    format!(
                        "{} timed out after {} ms, falling back",
                        styler.name(),
                        self.policy.timeout_ms
                    ),
                ));
                (deterministic, RenderPath::Deterministic)
            }
        }
    }
}
