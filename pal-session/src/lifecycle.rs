//! Request lifecycle and the chat session that owns it.
//!
//! A [`ChatSession`] is the single owner of the conversation state: history,
//! lifecycle state and citation disclosures. It is created once by the
//! composition root and shared by reference with whatever drives it.
//!
//! # Lifecycle
//!
//! ```text
//!            SendRequested              ResponseReceived
//!   Idle ─────────────────▶ Pending ─────────────────▶ Succeeded
//!    ▲                         │                           │
//!    │                         │ ResponseFailed            │ Settled
//!    │        Settled          ▼                           │
//!    └──────────────────── Failed ◀────────────────────────┘ (to Idle)
//! ```
//!
//! At most one exchange is in flight. A `send` issued while another is
//! pending does nothing.
//!
//! Execution is single-threaded and cooperative: the backend call is the only
//! suspension point, and state is never borrowed across it.

use std::cell::RefCell;
use std::fmt;
use std::time::Instant;

use pal_common::logging::generate_trace_id;
use pal_common::util::preview;
use pal_common::SessionConfig;
use tracing::Instrument;

use crate::backend::{Backend, BackendError, FailureKind};
use crate::disclosure::{DisclosureId, DisclosureState, SourceDisclosure};
use crate::history::{HistorySnapshot, SessionHistory};
use crate::normalize::normalize;
use crate::types::{ChatRequest, ChatResponse, Turn};

/// Text shown to the user for every failed exchange.
pub const GENERIC_FAILURE_MESSAGE: &str = "Sorry, I encountered an error. Please try again.";

// ============================================================================
// State machine
// ============================================================================

/// Where the session is in its request lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LifecycleState {
    #[default]
    Idle,
    Pending,
    Succeeded,
    Failed,
}

/// Named transitions of the lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleEvent {
    SendRequested,
    ResponseReceived,
    ResponseFailed,
    Settled,
}

impl LifecycleState {
    /// Next state for `event`, or `None` if the transition is not allowed.
    pub const fn on(self, event: LifecycleEvent) -> Option<Self> {
        match (self, event) {
            (Self::Idle, LifecycleEvent::SendRequested) => Some(Self::Pending),
            (Self::Pending, LifecycleEvent::ResponseReceived) => Some(Self::Succeeded),
            (Self::Pending, LifecycleEvent::ResponseFailed) => Some(Self::Failed),
            (Self::Succeeded | Self::Failed, LifecycleEvent::Settled) => Some(Self::Idle),
            _ => None,
        }
    }

    pub const fn is_pending(self) -> bool {
        matches!(self, Self::Pending)
    }
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Pending => "pending",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
        };
        f.write_str(name)
    }
}

// ============================================================================
// Outcomes and observer
// ============================================================================

/// User-facing failure signal. Not retryable; the user resubmits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FailureNotice {
    /// Diagnostic category, for logs only.
    pub kind: FailureKind,
    pub message: &'static str,
}

impl FailureNotice {
    pub const fn new(kind: FailureKind) -> Self {
        Self {
            kind,
            message: GENERIC_FAILURE_MESSAGE,
        }
    }
}

/// Why a `send` did nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    AlreadyPending,
    EmptyQuery,
}

/// Result of one `send`.
#[derive(Debug, Clone, PartialEq)]
pub enum SendOutcome {
    Skipped(SkipReason),
    Answered(Turn),
    Failed(FailureNotice),
}

/// Rendering collaborator notified as the session changes.
///
/// Per `send`: `Idle→Pending`, the user turn, then either
/// `Pending→Succeeded`, the assistant turn, `Succeeded→Idle`
/// or `Pending→Failed`, the failure notice, `Failed→Idle`.
pub trait SessionObserver {
    fn on_state_changed(&self, _from: LifecycleState, _to: LifecycleState) {}
    fn on_user_turn(&self, _turn: &Turn) {}
    fn on_assistant_turn(&self, _turn: &Turn) {}
    fn on_failure(&self, _notice: &FailureNotice) {}
}

/// Observer that ignores everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl SessionObserver for NoopObserver {}

// ============================================================================
// Session
// ============================================================================

#[derive(Debug, Default)]
struct SessionState {
    history: SessionHistory,
    lifecycle: LifecycleState,
    disclosures: SourceDisclosure,
}

/// One conversation with the answering service.
pub struct ChatSession<B> {
    backend: B,
    state: RefCell<SessionState>,
    observer: Box<dyn SessionObserver>,
}

impl<B: Backend> ChatSession<B> {
    /// Session with the default history capacity.
    pub fn new(backend: B) -> Self {
        Self::with_history(backend, SessionHistory::new())
    }

    /// Session sized from configuration.
    pub fn from_config(backend: B, config: &SessionConfig) -> Self {
        Self::with_history(backend, SessionHistory::with_capacity(config.history_capacity))
    }

    fn with_history(backend: B, history: SessionHistory) -> Self {
        Self {
            backend,
            state: RefCell::new(SessionState {
                history,
                ..SessionState::default()
            }),
            observer: Box::new(NoopObserver),
        }
    }

    /// Attach the rendering collaborator.
    pub fn with_observer(mut self, observer: impl SessionObserver + 'static) -> Self {
        self.observer = Box::new(observer);
        self
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn state(&self) -> LifecycleState {
        self.state.borrow().lifecycle
    }

    pub fn is_pending(&self) -> bool {
        self.state().is_pending()
    }

    /// Copy of the current history.
    pub fn history(&self) -> HistorySnapshot {
        self.state.borrow().history.snapshot()
    }

    pub fn history_len(&self) -> usize {
        self.state.borrow().history.len()
    }

    pub fn disclosure_state(&self, id: DisclosureId) -> Option<DisclosureState> {
        self.state.borrow().disclosures.state(id)
    }

    /// Flip the citation list of one answer. Unknown ids are ignored.
    pub fn toggle_sources(&self, id: DisclosureId) -> Option<DisclosureState> {
        self.state.borrow_mut().disclosures.toggle(id)
    }

    /// Ask a question.
    ///
    /// The user turn is recorded and reported before the backend is called.
    /// The outcome is reported to the observer exactly once, and the session
    /// is back to `Idle` when this returns, whatever happened.
    pub async fn send(&self, query: &str) -> SendOutcome {
        let query = query.trim();
        if query.is_empty() {
            tracing::debug!("Ignoring empty query");
            return SendOutcome::Skipped(SkipReason::EmptyQuery);
        }

        let trace_id = generate_trace_id();
        let span = tracing::info_span!("chat_exchange", trace_id = %trace_id);

        let Some(request) = span.in_scope(|| self.begin(query)) else {
            return SendOutcome::Skipped(SkipReason::AlreadyPending);
        };

        let started = Instant::now();
        let result = self.backend.chat(&request).instrument(span.clone()).await;

        span.in_scope(|| match result {
            Ok(response) => self.succeed(response, started),
            Err(error) => self.fail(&error, started),
        })
    }

    /// Guard, snapshot, optimistic user turn. `None` when already pending.
    fn begin(&self, query: &str) -> Option<ChatRequest> {
        let (from, snapshot, user_turn) = {
            let mut state = self.state.borrow_mut();
            let from = state.lifecycle;
            let Some(to) = from.on(LifecycleEvent::SendRequested) else {
                tracing::debug!(
                    query = %preview(query),
                    state = %from,
                    "Request already in flight, ignoring send"
                );
                return None;
            };
            state.lifecycle = to;

            let snapshot = state.history.snapshot();
            let user_turn = Turn::user(query);
            state.history.append(user_turn.clone());
            (from, snapshot, user_turn)
        };

        tracing::info!(
            query = %preview(query),
            history_len = snapshot.len(),
            "Sending query"
        );
        self.notify_transition(from, LifecycleState::Pending);
        self.observer.on_user_turn(&user_turn);

        Some(ChatRequest {
            query: query.to_string(),
            conversation_history: snapshot.to_wire(),
        })
    }

    fn succeed(&self, response: ChatResponse, started: Instant) -> SendOutcome {
        self.transition(LifecycleEvent::ResponseReceived);

        let content = normalize(&response.answer);
        let turn = {
            let mut state = self.state.borrow_mut();
            let disclosure =
                (!response.sources.is_empty()).then(|| state.disclosures.create());
            let turn = Turn::assistant(
                content,
                response.sources,
                response.rephrased_query,
                disclosure,
            );
            state.history.append(turn.clone());
            turn
        };

        tracing::info!(
            sources = turn.sources.len(),
            rephrased = turn.rephrased_query.is_some(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Answer received"
        );
        self.observer.on_assistant_turn(&turn);
        self.transition(LifecycleEvent::Settled);

        SendOutcome::Answered(turn)
    }

    fn fail(&self, error: &BackendError, started: Instant) -> SendOutcome {
        self.transition(LifecycleEvent::ResponseFailed);

        tracing::warn!(
            kind = %error.kind(),
            error = %error,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Chat exchange failed"
        );
        let notice = FailureNotice::new(error.kind());
        self.observer.on_failure(&notice);
        self.transition(LifecycleEvent::Settled);

        SendOutcome::Failed(notice)
    }

    fn transition(&self, event: LifecycleEvent) {
        let change = {
            let mut state = self.state.borrow_mut();
            let from = state.lifecycle;
            from.on(event).map(|to| {
                state.lifecycle = to;
                (from, to)
            })
        };

        match change {
            Some((from, to)) => self.notify_transition(from, to),
            None => tracing::warn!(?event, state = %self.state(), "Invalid lifecycle transition"),
        }
    }

    fn notify_transition(&self, from: LifecycleState, to: LifecycleState) {
        tracing::debug!(%from, %to, "Lifecycle transition");
        self.observer.on_state_changed(from, to);
    }
}

impl<B> fmt::Debug for ChatSession<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.borrow();
        f.debug_struct("ChatSession")
            .field("lifecycle", &state.lifecycle)
            .field("history_len", &state.history.len())
            .field("disclosures", &state.disclosures.len())
            .finish()
    }
}
