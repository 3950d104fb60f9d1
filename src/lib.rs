//! Deterministic session-history, frame-navigation and DOM event dispatch for
//! browser emulation tests.
//!
//! A [`Session`] owns one top-level browsing context and everything hanging off
//! it: nested frame contexts, their independent session histories, the loaded
//! documents, registered listeners and the task queue used for asynchronous
//! deliveries such as `postMessage` and `hashchange`. Scripted surfaces
//! (`history.go`, `addEventListener`, `attachEvent`, `frames[name]`, ...) are
//! exposed as methods taking explicit [`ContextId`] / [`EventTarget`] handles.

use thiserror::Error;

mod config;
mod context;
mod dispatch;
mod document;
mod dom;
mod event;
mod frames;
mod history;
mod loader;
mod messaging;
mod navigation;
mod runtime_state;
mod session;

pub use config::{BrowserFamily, SessionConfig, TraceConfig};
pub use context::{BrowsingContext, ContextId, ContextTree};
pub use dispatch::DispatchOutcome;
pub use document::{Document, DocumentId};
pub use dom::{Dom, NodeId};
pub use event::{
    Callback, Event, EventDetail, EventInit, EventPhase, EventTarget, HandlerReturn,
    HashChangeData, KeyInit, ListenerResult, MessageData, MouseInit, NodeRef, ScriptError,
};
pub use history::{HistoryTraversal, NavigationEntry, SessionHistory};
pub use loader::{LoadError, LoadedPage, MockLoader, ResourceLoader};
pub use navigation::{NavigationCause, NavigationOutcome, NavigationRecord};
pub use runtime_state::{AmbientEvent, ListenerKind, ReportedError};
pub use session::Session;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// Raised synchronously at the sender, e.g. for an unparseable
    /// `postMessage` target origin.
    #[error("syntax error: {0}")]
    Syntax(String),
    #[error("invalid url {input:?}: {source}")]
    InvalidUrl {
        input: String,
        #[source]
        source: url::ParseError,
    },
    #[error("unknown browsing context: {0}")]
    UnknownContext(ContextId),
    #[error("unknown document: {0}")]
    UnknownDocument(DocumentId),
    #[error("node not found: {0}")]
    NodeNotFound(String),
    #[error("hierarchy request error: {0}")]
    Hierarchy(String),
    #[error("not supported: {0}")]
    NotSupported(String),
    #[error("task step limit exceeded after {0} tasks")]
    TaskLimitExceeded(usize),
    #[error("invalid configuration: {0}")]
    Config(String),
}

impl Error {
    pub(crate) fn invalid_url(input: &str, source: url::ParseError) -> Self {
        Self::InvalidUrl {
            input: input.to_string(),
            source,
        }
    }
}
