use tracing::{debug, warn};

use crate::context::ContextId;
use crate::document::DocumentId;
use crate::event::NodeRef;
use crate::navigation::NavigationCause;
use crate::session::Session;
use crate::{Error, Result};

const FRAME_TAGS: [&str; 2] = ["iframe", "frame"];

impl Session {
    /// `window.frames`, in document order of the owning elements.
    pub fn frames(&self, context: ContextId) -> Result<Vec<ContextId>> {
        Ok(self.contexts.require(context)?.children().to_vec())
    }

    /// `window.frames[name]`: breadth-first over the descendants of
    /// `context`.
    pub fn frame_by_name(&self, context: ContextId, name: &str) -> Option<ContextId> {
        self.contexts.resolve_by_name(context, name)
    }

    /// `window.frames[index]`.
    pub fn frame_at(&self, context: ContextId, index: usize) -> Option<ContextId> {
        self.contexts
            .get(context)
            .and_then(|ctx| ctx.children().get(index).copied())
    }

    /// `iframe.contentWindow`. The same id comes back for as long as the
    /// element stays in its document, whatever the frame navigates to.
    pub fn content_window(&self, element: NodeRef) -> Option<ContextId> {
        self.frame_bindings.get(&element).copied()
    }

    /// `iframe.contentDocument`.
    pub fn content_document(&self, element: NodeRef) -> Option<DocumentId> {
        let context = self.content_window(element)?;
        self.contexts.get(context)?.current_document()
    }

    /// `window.parent`: the context itself at the top, `None` once detached.
    pub fn parent_context(&self, context: ContextId) -> Option<ContextId> {
        let ctx = self.contexts.get(context)?;
        if context == self.contexts.root() {
            return Some(context);
        }
        if ctx.is_detached() {
            return None;
        }
        ctx.parent()
    }

    /// `window.top`.
    pub fn top_context(&self, context: ContextId) -> Option<ContextId> {
        self.contexts.top(context)
    }

    /// `window.frameElement`; last-known value for detached frames.
    pub fn frame_element(&self, context: ContextId) -> Option<NodeRef> {
        self.contexts.get(context)?.frame_element()
    }

    /// `parent.appendChild(document.createElement(tag))`, with attributes.
    /// A frame element appended to a live document gets its browsing context
    /// immediately.
    pub fn append_element(
        &mut self,
        parent: NodeRef,
        tag: &str,
        attrs: &[(&str, &str)],
    ) -> Result<NodeRef> {
        let (node, context, connected) = {
            let doc = self
                .documents
                .get_mut(parent.document)
                .ok_or(Error::UnknownDocument(parent.document))?;
            let node = doc.dom_mut().create_element(parent.node, tag, attrs)?;
            (node, doc.context(), doc.dom().is_connected(node))
        };
        let element = NodeRef::new(parent.document, node);
        let is_frame = FRAME_TAGS.iter().any(|frame| tag.eq_ignore_ascii_case(frame));
        if is_frame && connected && self.is_active_document(parent.document) {
            self.run_turn(|this| this.attach_frame(context, element))?;
        }
        Ok(element)
    }

    /// `node.parentNode.removeChild(node)`. Frames inside the removed
    /// subtree lose their browsing contexts.
    pub fn remove_node(&mut self, node: NodeRef) -> Result<()> {
        let removed = {
            let doc = self
                .documents
                .get_mut(node.document)
                .ok_or(Error::UnknownDocument(node.document))?;
            let dom = doc.dom_mut();
            let parent = dom.parent(node.node).ok_or_else(|| {
                Error::NodeNotFound(format!("node {} has no parent", node.node.0))
            })?;
            dom.remove_child(parent, node.node)?;
            dom.subtree(node.node)
        };
        for removed_node in removed {
            let element = NodeRef::new(node.document, removed_node);
            if let Some(context) = self.frame_bindings.get(&element).copied() {
                self.detach_frame_context(context)?;
            }
        }
        Ok(())
    }

    /// `element.setAttribute(name, value)`. Setting `src` on a bound frame
    /// navigates it; `name` renames its context.
    pub fn set_attribute(&mut self, element: NodeRef, name: &str, value: &str) -> Result<()> {
        self.documents
            .get_mut(element.document)
            .ok_or(Error::UnknownDocument(element.document))?
            .dom_mut()
            .set_attr(element.node, name, value)?;
        let Some(context) = self.content_window(element) else {
            return Ok(());
        };
        if name.eq_ignore_ascii_case("name") {
            self.contexts.set_name(context, Some(value))?;
        } else if name.eq_ignore_ascii_case("src") {
            let base = self.document_url(element.document)?;
            let source = if value.is_empty() { "about:blank" } else { value };
            let url = base.join(source).map_err(|err| Error::invalid_url(source, err))?;
            self.run_turn(|this| {
                this.commit_navigation(context, url, NavigationCause::FrameSrcChange)
            })?;
        }
        Ok(())
    }

    /// Creates child contexts for the frame elements of `document`, in
    /// document order.
    pub(crate) fn bootstrap_frames(&mut self, context: ContextId, document: DocumentId) -> Result<()> {
        let elements = self
            .documents
            .get(document)
            .ok_or(Error::UnknownDocument(document))?
            .dom()
            .elements_by_tag(&FRAME_TAGS);
        for node in elements {
            self.attach_frame(context, NodeRef::new(document, node))?;
        }
        Ok(())
    }

    fn attach_frame(&mut self, parent: ContextId, element: NodeRef) -> Result<Option<ContextId>> {
        if let Some(existing) = self.content_window(element) {
            return Ok(Some(existing));
        }
        let depth = self.contexts.depth(parent) + 1;
        if depth > self.config.max_frame_depth {
            warn!(%parent, depth, "frame nesting limit reached; frame left empty");
            self.trace_navigation_line(format!("[frame] skipped depth={depth} parent={parent}"));
            return Ok(None);
        }
        let (name, src) = {
            let dom = self
                .documents
                .get(element.document)
                .ok_or(Error::UnknownDocument(element.document))?
                .dom();
            (
                dom.attr(element.node, "name").map(str::to_string),
                dom.attr(element.node, "src")
                    .map(str::trim)
                    .filter(|src| !src.is_empty())
                    .map(str::to_string),
            )
        };

        let child = self.contexts.create_child(parent, name.as_deref())?;
        self.contexts.require_mut(child)?.set_frame_element(element);
        self.frame_bindings.insert(element, child);
        self.trace_navigation_line(format!("[frame] attach {child} parent={parent}"));
        debug!(%child, %parent, name = name.as_deref().unwrap_or(""), "frame attached");

        self.install_initial_blank(child, src.is_none())?;
        if let Some(src) = src {
            let base = self.document_url(element.document)?;
            match base.join(&src) {
                Ok(url) => {
                    self.commit_navigation(child, url, NavigationCause::FrameSrcChange)?;
                }
                Err(err) => debug!(%src, error = %err, "frame src is not a valid url"),
            }
        }
        Ok(Some(child))
    }

    pub(crate) fn detach_child_contexts(&mut self, context: ContextId) -> Result<()> {
        let children = self.contexts.require(context)?.children().to_vec();
        for child in children {
            self.detach_frame_context(child)?;
        }
        Ok(())
    }

    fn detach_frame_context(&mut self, context: ContextId) -> Result<()> {
        if let Some(element) = self.contexts.require(context)?.frame_element() {
            if self.frame_bindings.get(&element) == Some(&context) {
                self.frame_bindings.remove(&element);
            }
        }
        if self.contexts.detach(context)? {
            self.trace_navigation_line(format!("[frame] detach {context}"));
            debug!(%context, "frame detached");
        }
        Ok(())
    }
}
