use std::collections::VecDeque;
use std::fmt;

use crate::document::DocumentId;
use crate::event::NodeRef;
use crate::history::SessionHistory;
use crate::{Error, Result};

/// Stable identity of a window or frame. Equal ids mean the same
/// `WindowProxy` from a script's point of view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContextId(pub(crate) usize);

impl fmt::Display for ContextId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "context#{}", self.0)
    }
}

#[derive(Debug, Clone)]
pub struct BrowsingContext {
    id: ContextId,
    name: Option<String>,
    parent: Option<ContextId>,
    children: Vec<ContextId>,
    history: SessionHistory,
    current_document: Option<DocumentId>,
    frame_element: Option<NodeRef>,
    detached: bool,
    pub(crate) initial_about_blank: bool,
}

impl BrowsingContext {
    fn new(id: ContextId, name: Option<&str>, parent: Option<ContextId>) -> Self {
        Self {
            id,
            name: name.filter(|name| !name.is_empty()).map(str::to_string),
            parent,
            children: Vec::new(),
            history: SessionHistory::new(),
            current_document: None,
            frame_element: None,
            detached: false,
            initial_about_blank: false,
        }
    }

    pub fn id(&self) -> ContextId {
        self.id
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Non-owning back-reference; `None` for the top-level context and for
    /// detached frames.
    pub fn parent(&self) -> Option<ContextId> {
        self.parent
    }

    pub fn children(&self) -> &[ContextId] {
        &self.children
    }

    pub fn history(&self) -> &SessionHistory {
        &self.history
    }

    pub(crate) fn history_mut(&mut self) -> &mut SessionHistory {
        &mut self.history
    }

    pub fn current_document(&self) -> Option<DocumentId> {
        self.current_document
    }

    pub(crate) fn set_current_document(&mut self, document: DocumentId) {
        self.current_document = Some(document);
    }

    /// The `<iframe>`/`<frame>` element this context was created for. Kept
    /// after detachment as last-known state.
    pub fn frame_element(&self) -> Option<NodeRef> {
        self.frame_element
    }

    pub(crate) fn set_frame_element(&mut self, element: NodeRef) {
        self.frame_element = Some(element);
    }

    pub fn is_detached(&self) -> bool {
        self.detached
    }
}

/// The window/frame hierarchy rooted at one top-level context.
///
/// Contexts live in an arena indexed by [`ContextId`]; children are owned by
/// position in the arena and parents are plain ids, so the tree holds no
/// reference cycles. Contexts are never freed, which keeps detached frames
/// valid for scripts that still hold them.
#[derive(Debug, Clone)]
pub struct ContextTree {
    contexts: Vec<BrowsingContext>,
    root: ContextId,
}

impl Default for ContextTree {
    fn default() -> Self {
        Self::new()
    }
}

impl ContextTree {
    pub fn new() -> Self {
        let root = ContextId(0);
        Self {
            contexts: vec![BrowsingContext::new(root, None, None)],
            root,
        }
    }

    pub fn root(&self) -> ContextId {
        self.root
    }

    pub fn get(&self, id: ContextId) -> Option<&BrowsingContext> {
        self.contexts.get(id.0)
    }

    pub(crate) fn get_mut(&mut self, id: ContextId) -> Option<&mut BrowsingContext> {
        self.contexts.get_mut(id.0)
    }

    pub(crate) fn require(&self, id: ContextId) -> Result<&BrowsingContext> {
        self.get(id).ok_or(Error::UnknownContext(id))
    }

    pub(crate) fn require_mut(&mut self, id: ContextId) -> Result<&mut BrowsingContext> {
        self.get_mut(id).ok_or(Error::UnknownContext(id))
    }

    pub fn len(&self) -> usize {
        self.contexts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.contexts.is_empty()
    }

    /// Inserts a new context as the last child of `parent`, with its own
    /// empty history.
    pub fn create_child(&mut self, parent: ContextId, name: Option<&str>) -> Result<ContextId> {
        self.require(parent)?;
        let id = ContextId(self.contexts.len());
        self.contexts
            .push(BrowsingContext::new(id, name, Some(parent)));
        self.contexts[parent.0].children.push(id);
        Ok(id)
    }

    pub fn set_name(&mut self, id: ContextId, name: Option<&str>) -> Result<()> {
        let context = self.require_mut(id)?;
        context.name = name.filter(|name| !name.is_empty()).map(str::to_string);
        Ok(())
    }

    /// Breadth-first over the descendants of `from`, siblings before
    /// grandchildren, first match wins.
    pub fn resolve_by_name(&self, from: ContextId, name: &str) -> Option<ContextId> {
        self.descendants(from)
            .into_iter()
            .find(|id| self.get(*id).and_then(BrowsingContext::name) == Some(name))
    }

    /// Breadth-first, excluding `from`.
    pub fn descendants(&self, from: ContextId) -> Vec<ContextId> {
        let mut out = Vec::new();
        let Some(start) = self.get(from) else {
            return out;
        };
        let mut queue: VecDeque<ContextId> = start.children.iter().copied().collect();
        while let Some(id) = queue.pop_front() {
            out.push(id);
            if let Some(context) = self.get(id) {
                queue.extend(context.children.iter().copied());
            }
        }
        out
    }

    /// Unlinks `id` from its parent. The context and its own subtree stay
    /// readable; returns `false` when it was already detached.
    pub fn detach(&mut self, id: ContextId) -> Result<bool> {
        let context = self.require(id)?;
        if context.detached || id == self.root {
            return Ok(false);
        }
        if let Some(parent) = context.parent {
            if let Some(parent_context) = self.get_mut(parent) {
                parent_context.children.retain(|child| *child != id);
            }
        }
        let context = self.require_mut(id)?;
        context.parent = None;
        context.detached = true;
        Ok(true)
    }

    /// Whether `id` is still reachable from the root.
    pub fn is_attached(&self, id: ContextId) -> bool {
        let mut cursor = Some(id);
        while let Some(current) = cursor {
            if current == self.root {
                return true;
            }
            cursor = self.get(current).and_then(BrowsingContext::parent);
        }
        false
    }

    /// `window.top`; `None` once the context has been cut off from the root.
    pub fn top(&self, id: ContextId) -> Option<ContextId> {
        self.is_attached(id).then_some(self.root)
    }

    pub fn depth(&self, id: ContextId) -> usize {
        let mut depth = 0;
        let mut cursor = self.get(id).and_then(BrowsingContext::parent);
        while let Some(current) = cursor {
            depth += 1;
            cursor = self.get(current).and_then(BrowsingContext::parent);
        }
        depth
    }
}
