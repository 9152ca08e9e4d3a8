//! PolicyPal Session - client-side conversation engine for the PolicyPal assistant.
//!
//! Owns everything between a typed question and a rendered answer:
//! - Bounded conversation history with frozen snapshots
//! - Request lifecycle with a single-flight guard
//! - Markdown normalization of answers
//! - Per-answer citation disclosure state
//! - The HTTP contract of the answering service
//!
//! ## Example
//!
//! ```ignore
//! use pal_session::{ChatSession, HttpBackend, SendOutcome};
//!
//! let session = ChatSession::new(HttpBackend::new("http://localhost:8000")?);
//!
//! if let SendOutcome::Answered(turn) = session.send("What is the refund policy?").await {
//!     println!("{}", turn.content);
//! }
//! ```

pub mod backend;
pub mod disclosure;
pub mod history;
pub mod lifecycle;
pub mod normalize;
pub mod types;

pub use backend::{probe_health, Backend, BackendError, FailureKind, HttpBackend};
pub use disclosure::{DisclosureId, DisclosureState, SourceDisclosure};
pub use history::{HistorySnapshot, SessionHistory, HISTORY_CAPACITY};
pub use lifecycle::{
    ChatSession, FailureNotice, LifecycleEvent, LifecycleState, NoopObserver, SendOutcome,
    SessionObserver, SkipReason, GENERIC_FAILURE_MESSAGE,
};
pub use normalize::normalize;
pub use types::{sources_label, ChatRequest, ChatResponse, HistoryEntry, Role, SourceRef, Turn};
