use std::collections::HashMap;
use std::fmt;

use tracing::trace;
use url::Url;

use crate::config::SessionConfig;
use crate::context::{BrowsingContext, ContextId, ContextTree};
use crate::document::{Document, DocumentId, DocumentStore};
use crate::event::{EventTarget, NodeRef};
use crate::loader::ResourceLoader;
use crate::navigation::NavigationRecord;
use crate::runtime_state::{
    AmbientEvent, ListenerStore, ReportedError, TaskQueue, TraceState,
};
use crate::{Error, Result};

/// One top-level browsing session.
pub struct Session {
    pub(crate) config: SessionConfig,
    pub(crate) contexts: ContextTree,
    pub(crate) documents: DocumentStore,
    pub(crate) listeners: ListenerStore,
    pub(crate) frame_bindings: HashMap<NodeRef, ContextId>,
    pub(crate) tasks: TaskQueue,
    pub(crate) ambient_events: HashMap<ContextId, Vec<AmbientEvent>>,
    pub(crate) script_errors: Vec<ReportedError>,
    pub(crate) navigations: Vec<NavigationRecord>,
    pub(crate) trace_state: TraceState,
    pub(crate) loader: Box<dyn ResourceLoader>,
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("config", &self.config)
            .field("contexts", &self.contexts.len())
            .field("documents", &self.documents.len())
            .field("pending_tasks", &self.tasks.len())
            .finish()
    }
}

impl Session {
    /// Creates the top-level context and loads `config.initial_url` into it.
    pub fn new(config: SessionConfig, loader: impl ResourceLoader + 'static) -> Result<Self> {
        config.validate()?;
        let initial_url = Url::parse(&config.initial_url)
            .map_err(|err| Error::invalid_url(&config.initial_url, err))?;
        let trace_state = TraceState::from_config(&config.trace);
        let mut session = Self {
            config,
            contexts: ContextTree::new(),
            documents: DocumentStore::default(),
            listeners: ListenerStore::default(),
            frame_bindings: HashMap::new(),
            tasks: TaskQueue::default(),
            ambient_events: HashMap::new(),
            script_errors: Vec::new(),
            navigations: Vec::new(),
            trace_state,
            loader: Box::new(loader),
        };
        let top = session.contexts.root();
        session.run_turn(|this| this.load_initial_document(top, initial_url))?;
        // The initial load is not part of the navigation log.
        session.navigations.clear();
        Ok(session)
    }

    /// Default configuration, starting at `url`.
    pub fn open(url: &str, loader: impl ResourceLoader + 'static) -> Result<Self> {
        Self::new(SessionConfig::default().with_initial_url(url), loader)
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// The top-level window.
    pub fn top(&self) -> ContextId {
        self.contexts.root()
    }

    pub fn contexts(&self) -> &ContextTree {
        &self.contexts
    }

    pub fn context(&self, id: ContextId) -> Option<&BrowsingContext> {
        self.contexts.get(id)
    }

    pub fn document(&self, id: DocumentId) -> Option<&Document> {
        self.documents.get(id)
    }

    pub fn current_document(&self, context: ContextId) -> Result<DocumentId> {
        let ctx = self.contexts.require(context)?;
        ctx.current_document()
            .ok_or_else(|| Error::NodeNotFound(format!("{context} has no document")))
    }

    pub fn location(&self, context: ContextId) -> Result<Url> {
        let document = self.current_document(context)?;
        self.documents
            .get(document)
            .map(|doc| doc.url().clone())
            .ok_or(Error::UnknownDocument(document))
    }

    pub fn title(&self, context: ContextId) -> Result<String> {
        let document = self.current_document(context)?;
        self.documents
            .get(document)
            .map(|doc| doc.title().to_string())
            .ok_or(Error::UnknownDocument(document))
    }

    /// `document.getElementById` on the context's current document.
    pub fn element_by_id(&self, context: ContextId, id: &str) -> Result<NodeRef> {
        let document = self.current_document(context)?;
        let doc = self
            .documents
            .get(document)
            .ok_or(Error::UnknownDocument(document))?;
        doc.dom()
            .by_id(id)
            .map(|node| NodeRef::new(document, node))
            .ok_or_else(|| Error::NodeNotFound(format!("#{id} in {context}")))
    }

    pub fn take_script_errors(&mut self) -> Vec<ReportedError> {
        std::mem::take(&mut self.script_errors)
    }

    pub fn take_navigations(&mut self) -> Vec<NavigationRecord> {
        std::mem::take(&mut self.navigations)
    }

    pub fn enable_trace(&mut self, enabled: bool) {
        self.trace_state.enabled = enabled;
    }

    pub fn set_trace_events(&mut self, enabled: bool) {
        self.trace_state.events = enabled;
    }

    pub fn set_trace_navigation(&mut self, enabled: bool) {
        self.trace_state.navigation = enabled;
    }

    pub fn set_trace_log_limit(&mut self, max_entries: usize) -> Result<()> {
        if max_entries == 0 {
            return Err(Error::Config(
                "set_trace_log_limit requires at least 1 entry".into(),
            ));
        }
        self.trace_state.log_limit = max_entries;
        while self.trace_state.logs.len() > self.trace_state.log_limit {
            self.trace_state.logs.pop_front();
        }
        Ok(())
    }

    pub fn take_trace_logs(&mut self) -> Vec<String> {
        self.trace_state.logs.drain(..).collect()
    }

    /// Runs a block of top-level script as a single turn. Messages and
    /// `hashchange` events queued inside it are delivered only after `script`
    /// returns, as if every statement in it had run before the event loop
    /// got control back.
    pub fn run_script<T>(&mut self, script: impl FnOnce(&mut Session) -> Result<T>) -> Result<T> {
        self.run_turn(script)
    }

    /// Runs `run` as one host turn. When the outermost turn completes, queued
    /// tasks are drained if the configuration asks for it.
    pub(crate) fn run_turn<T>(&mut self, run: impl FnOnce(&mut Self) -> Result<T>) -> Result<T> {
        self.tasks.turn_depth += 1;
        let result = run(self);
        self.tasks.turn_depth -= 1;
        let value = result?;
        if self.tasks.turn_depth == 0 && self.config.auto_drain_tasks {
            self.drain_tasks()?;
        }
        Ok(value)
    }

    pub(crate) fn trace_event_line(&mut self, line: String) {
        if self.trace_state.enabled && self.trace_state.events {
            self.trace_line(line);
        }
    }

    pub(crate) fn trace_navigation_line(&mut self, line: String) {
        if self.trace_state.enabled && self.trace_state.navigation {
            self.trace_line(line);
        }
    }

    fn trace_line(&mut self, line: String) {
        trace!(target: "browser_session::trace", "{line}");
        if self.trace_state.logs.len() >= self.trace_state.log_limit {
            self.trace_state.logs.pop_front();
        }
        self.trace_state.logs.push_back(line);
    }

    /// `a#next`, `window(context#1)`, `#document`.
    pub(crate) fn target_label(&self, target: EventTarget) -> String {
        match target {
            EventTarget::Window(context) => format!("window({context})"),
            EventTarget::Node(node) => {
                let Some(doc) = self.documents.get(node.document) else {
                    return format!("{}:{}", node.document, node.node.0);
                };
                let dom = doc.dom();
                if dom.is_document(node.node) {
                    return "#document".to_string();
                }
                match (dom.tag_name(node.node), dom.attr(node.node, "id")) {
                    (Some(tag), Some(id)) => format!("{tag}#{id}"),
                    (Some(tag), None) => tag.to_string(),
                    (None, _) => "#text".to_string(),
                }
            }
        }
    }

    /// The browsing context whose window is the root of `target`'s path.
    pub(crate) fn target_context(&self, target: EventTarget) -> Option<ContextId> {
        match target {
            EventTarget::Window(context) => Some(context),
            EventTarget::Node(node) => self.documents.get(node.document).map(Document::context),
        }
    }
}
