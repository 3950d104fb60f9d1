use tracing::{debug, warn};
use url::{Origin, Url};

use crate::context::ContextId;
use crate::dispatch::DispatchOutcome;
use crate::document::DocumentId;
use crate::dom::{Dom, NodeId};
use crate::event::{EventDetail, EventInit, EventTarget, KeyInit, MouseInit, NodeRef};
use crate::history::{NavigationEntry, SessionHistory};
use crate::loader::{LoadError, LoadedPage};
use crate::runtime_state::TaskKind;
use crate::session::Session;
use crate::{Error, Result};

const USER_ACTION_STACK: usize = 32 * 1024 * 1024;

/// Why a navigation was requested.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NavigationCause {
    LinkClick { source: NodeRef },
    FormSubmit { form: NodeRef },
    /// `location.href = url`, `location.assign(url)`.
    ScriptAssignment,
    /// `location.replace(url)`.
    ScriptReplace,
    FrameSrcChange,
    /// `history.go(delta)`; `delta == 0` reloads.
    HistoryTraversal { delta: i64 },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NavigationOutcome {
    Committed { index: usize, length: usize },
    /// A `click`/`submit` listener cancelled the default action.
    Cancelled,
    /// The loader failed; history and the current document are untouched.
    Failed(LoadError),
    /// Nothing to do: out-of-range traversal, `javascript:` URL, detached
    /// context.
    Ignored,
}

impl NavigationOutcome {
    pub fn is_committed(&self) -> bool {
        matches!(self, Self::Committed { .. })
    }
}

/// One committed navigation, as kept in the session's navigation log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NavigationRecord {
    pub context: ContextId,
    pub cause: NavigationCause,
    pub from: Option<Url>,
    pub to: Url,
}

/// Same document, different fragment: no fetch, just a new entry.
pub(crate) fn is_fragment_navigation(from: &Url, to: &Url) -> bool {
    let mut from_base = from.clone();
    let mut to_base = to.clone();
    from_base.set_fragment(None);
    to_base.set_fragment(None);
    from_base == to_base && to.fragment().is_some()
}

enum Activation {
    Link { anchor: NodeId },
    Submit { form: NodeId },
}

fn activation_for(dom: &Dom, node: NodeId) -> Option<Activation> {
    if let Some(anchor) = dom.closest(node, &["a", "area"]) {
        if dom.has_attr(anchor, "href") {
            return Some(Activation::Link { anchor });
        }
    }
    let button = dom.closest(node, &["button", "input"])?;
    let kind = dom
        .attr(button, "type")
        .unwrap_or(if dom.tag_name(button) == Some("button") { "submit" } else { "text" });
    if !kind.eq_ignore_ascii_case("submit") && !kind.eq_ignore_ascii_case("image") {
        return None;
    }
    if dom.has_attr(button, "disabled") {
        return None;
    }
    let form = dom.closest(button, &["form"])?;
    Some(Activation::Submit { form })
}

/// Named, enabled controls of `form` in document order.
fn form_data(dom: &Dom, form: NodeId) -> Vec<(String, String)> {
    dom.subtree(form)
        .into_iter()
        .skip(1)
        .filter_map(|control| {
            let tag = dom.tag_name(control)?;
            if !matches!(tag, "input" | "select" | "textarea") {
                return None;
            }
            let name = dom.attr(control, "name").filter(|name| !name.is_empty())?;
            if dom.has_attr(control, "disabled") {
                return None;
            }
            let kind = dom.attr(control, "type").unwrap_or("text").to_ascii_lowercase();
            match kind.as_str() {
                "submit" | "button" | "reset" | "image" | "file" => return None,
                "checkbox" | "radio" if !dom.has_attr(control, "checked") => return None,
                _ => {}
            }
            let default = if matches!(kind.as_str(), "checkbox" | "radio") {
                "on"
            } else {
                ""
            };
            let value = dom.attr(control, "value").unwrap_or(default);
            Some((name.to_string(), value.to_string()))
        })
        .collect()
}

impl Session {
    /// Entry point for every navigation. `url` is resolved against the
    /// source element's document for link clicks and form submissions,
    /// otherwise against the context's current URL. Ignored for history
    /// traversals.
    pub fn request_navigation(
        &mut self,
        context: ContextId,
        url: &str,
        cause: NavigationCause,
    ) -> Result<NavigationOutcome> {
        self.run_turn(|this| this.request_navigation_in_turn(context, url, cause))
    }

    fn request_navigation_in_turn(
        &mut self,
        context: ContextId,
        url: &str,
        cause: NavigationCause,
    ) -> Result<NavigationOutcome> {
        self.contexts.require(context)?;
        let base = match &cause {
            NavigationCause::HistoryTraversal { delta } => return self.traverse(context, *delta),
            NavigationCause::LinkClick { source } => {
                let outcome = self.dispatch_trusted((*source).into(), EventInit::for_type("click"))?;
                if outcome.cancelled {
                    return Ok(self.navigation_cancelled(context, "click"));
                }
                self.document_url(source.document)?
            }
            NavigationCause::FormSubmit { form } => {
                let outcome = self.dispatch_trusted((*form).into(), EventInit::for_type("submit"))?;
                if outcome.cancelled {
                    return Ok(self.navigation_cancelled(context, "submit"));
                }
                self.document_url(form.document)?
            }
            _ => self.location(context)?,
        };
        let target = base.join(url).map_err(|err| Error::invalid_url(url, err))?;
        self.commit_navigation(context, target, cause)
    }

    /// `location.href = url`.
    pub fn set_location(&mut self, context: ContextId, url: &str) -> Result<NavigationOutcome> {
        self.request_navigation(context, url, NavigationCause::ScriptAssignment)
    }

    /// `location.replace(url)`.
    pub fn replace_location(&mut self, context: ContextId, url: &str) -> Result<NavigationOutcome> {
        self.request_navigation(context, url, NavigationCause::ScriptReplace)
    }

    pub fn reload(&mut self, context: ContextId) -> Result<NavigationOutcome> {
        self.run_turn(|this| this.reload_in_turn(context))
    }

    pub fn history(&self, context: ContextId) -> Result<&SessionHistory> {
        Ok(self.contexts.require(context)?.history())
    }

    /// `history.length`.
    pub fn history_length(&self, context: ContextId) -> Result<usize> {
        Ok(self.history(context)?.len())
    }

    pub fn history_index(&self, context: ContextId) -> Result<usize> {
        Ok(self.history(context)?.index())
    }

    /// `None` outside `[0, length)`.
    pub fn history_item(&self, context: ContextId, index: usize) -> Result<Option<&NavigationEntry>> {
        Ok(self.history(context)?.item(index))
    }

    /// `history.go(delta)`. Returns `false` when the call was a no-op.
    pub fn history_go(&mut self, context: ContextId, delta: i64) -> Result<bool> {
        let outcome = self.request_navigation(
            context,
            "",
            NavigationCause::HistoryTraversal { delta },
        )?;
        Ok(outcome.is_committed())
    }

    pub fn history_back(&mut self, context: ContextId) -> Result<bool> {
        self.history_go(context, -1)
    }

    pub fn history_forward(&mut self, context: ContextId) -> Result<bool> {
        self.history_go(context, 1)
    }

    /// A user click: `mousedown`, `mouseup`, then `click` followed by the
    /// activation behaviour of the nearest link or submit button.
    pub fn click(&mut self, node: NodeRef) -> Result<DispatchOutcome> {
        self.click_with(node, MouseInit::default())
    }

    pub fn click_with(&mut self, node: NodeRef, mouse: MouseInit) -> Result<DispatchOutcome> {
        self.ensure_target(node.into())?;
        stacker::grow(USER_ACTION_STACK, || {
            self.run_turn(|this| {
                let detail = EventDetail::Mouse(mouse);
                this.dispatch_trusted(
                    node.into(),
                    EventInit::for_type("mousedown").detail(detail.clone()),
                )?;
                this.dispatch_trusted(
                    node.into(),
                    EventInit::for_type("mouseup").detail(detail.clone()),
                )?;
                this.activate_click(node, EventInit::for_type("click").detail(detail), true)
            })
        })
    }

    /// `keydown`, `keypress` (skipped when `keydown` was cancelled), `keyup`.
    /// Returns the `keydown` outcome.
    pub fn press_key(&mut self, node: NodeRef, key: KeyInit) -> Result<DispatchOutcome> {
        self.ensure_target(node.into())?;
        stacker::grow(USER_ACTION_STACK, || {
            self.run_turn(|this| {
                let detail = EventDetail::Key(key);
                let down = this.dispatch_trusted(
                    node.into(),
                    EventInit::for_type("keydown").detail(detail.clone()),
                )?;
                if !down.cancelled {
                    this.dispatch_trusted(
                        node.into(),
                        EventInit::for_type("keypress").detail(detail.clone()),
                    )?;
                }
                this.dispatch_trusted(node.into(), EventInit::for_type("keyup").detail(detail))?;
                Ok(down)
            })
        })
    }

    /// `form.requestSubmit()`: fires `submit`, then navigates unless it was
    /// cancelled.
    pub fn submit(&mut self, form: NodeRef) -> Result<NavigationOutcome> {
        self.run_turn(|this| this.submit_in_turn(form))
    }

    /// `document.open(); document.write(...); document.close()`: a fresh empty
    /// document at the same URL in the same context, replacing the current
    /// entry.
    pub fn replace_document(&mut self, context: ContextId, title: &str) -> Result<DocumentId> {
        self.replace_document_with(context, title, |_, _| {})
    }

    pub fn replace_document_with<F>(
        &mut self,
        context: ContextId,
        title: &str,
        build: F,
    ) -> Result<DocumentId>
    where
        F: FnOnce(&mut Dom, NodeId),
    {
        self.run_turn(|this| {
            let previous = this.current_document(context)?;
            let (url, origin) = {
                let doc = this
                    .documents
                    .get(previous)
                    .ok_or(Error::UnknownDocument(previous))?;
                (doc.url().clone(), doc.origin().clone())
            };
            let mut dom = Dom::blank();
            if let Some(body) = dom.body() {
                build(&mut dom, body);
            }
            let document = this
                .documents
                .insert(url.clone(), title.to_string(), Some(origin), dom, context);
            let discarded = this.commit_entry(
                context,
                NavigationEntry::new(url, document, title),
                true,
                "write",
            )?;
            this.install_document(context, document, true)?;
            this.collect_documents(context, discarded, Some(previous));
            Ok(document)
        })
    }

    pub(crate) fn activate_click(
        &mut self,
        node: NodeRef,
        init: EventInit,
        trusted: bool,
    ) -> Result<DispatchOutcome> {
        let outcome = self.dispatch_with(node.into(), init, trusted)?;
        if outcome.cancelled || !self.is_active_document(node.document) {
            return Ok(outcome);
        }
        let activation = {
            let doc = self
                .documents
                .get(node.document)
                .ok_or(Error::UnknownDocument(node.document))?;
            activation_for(doc.dom(), node.node)
        };
        match activation {
            Some(Activation::Link { anchor }) => {
                self.follow_hyperlink(node, anchor)?;
            }
            Some(Activation::Submit { form }) => {
                self.submit_in_turn(NodeRef::new(node.document, form))?;
            }
            None => {}
        }
        Ok(outcome)
    }

    fn follow_hyperlink(&mut self, source: NodeRef, anchor: NodeId) -> Result<NavigationOutcome> {
        let (base, source_context, href, target) = {
            let doc = self
                .documents
                .get(source.document)
                .ok_or(Error::UnknownDocument(source.document))?;
            let dom = doc.dom();
            (
                doc.url().clone(),
                doc.context(),
                dom.attr(anchor, "href").unwrap_or_default().to_string(),
                dom.attr(anchor, "target").map(str::to_string),
            )
        };
        let context = self.resolve_target_context(source_context, target.as_deref());
        match base.join(&href) {
            Ok(url) => self.commit_navigation(context, url, NavigationCause::LinkClick { source }),
            Err(err) => {
                debug!(href = %href, error = %err, "ignoring unparseable link");
                Ok(NavigationOutcome::Ignored)
            }
        }
    }

    fn submit_in_turn(&mut self, form: NodeRef) -> Result<NavigationOutcome> {
        let is_form = self
            .documents
            .get(form.document)
            .ok_or(Error::UnknownDocument(form.document))?
            .dom()
            .tag_name(form.node)
            == Some("form");
        if !is_form {
            return Err(Error::NodeNotFound(format!(
                "submit target {} in {} is not a <form>",
                form.node.0, form.document
            )));
        }
        let outcome = self.dispatch_trusted(form.into(), EventInit::for_type("submit"))?;
        if outcome.cancelled {
            let context = self
                .documents
                .get(form.document)
                .map_or(self.top(), |doc| doc.context());
            return Ok(self.navigation_cancelled(context, "submit"));
        }
        let (source_context, url, target) = {
            let doc = self
                .documents
                .get(form.document)
                .ok_or(Error::UnknownDocument(form.document))?;
            let dom = doc.dom();
            let action = dom.attr(form.node, "action").unwrap_or_default();
            let mut url = doc
                .url()
                .join(action)
                .map_err(|err| Error::invalid_url(action, err))?;
            let method = dom.attr(form.node, "method").unwrap_or("get");
            if method.eq_ignore_ascii_case("get") {
                url.query_pairs_mut()
                    .clear()
                    .extend_pairs(form_data(dom, form.node));
            }
            (
                doc.context(),
                url,
                dom.attr(form.node, "target").map(str::to_string),
            )
        };
        let context = self.resolve_target_context(source_context, target.as_deref());
        self.commit_navigation(context, url, NavigationCause::FormSubmit { form })
    }

    /// `_self`, `_parent`, `_top` or a context name searched from the top.
    /// `_blank` and unknown names stay in `source`.
    pub(crate) fn resolve_target_context(&self, source: ContextId, target: Option<&str>) -> ContextId {
        let Some(name) = target.map(str::trim).filter(|name| !name.is_empty()) else {
            return source;
        };
        if name.eq_ignore_ascii_case("_self") || name.eq_ignore_ascii_case("_blank") {
            return source;
        }
        if name.eq_ignore_ascii_case("_parent") {
            return self
                .contexts
                .get(source)
                .and_then(|ctx| ctx.parent())
                .unwrap_or(source);
        }
        let top = self.contexts.top(source).unwrap_or(source);
        if name.eq_ignore_ascii_case("_top") {
            return top;
        }
        if self.contexts.get(top).and_then(|ctx| ctx.name()) == Some(name) {
            return top;
        }
        self.contexts.resolve_by_name(top, name).unwrap_or(source)
    }

    pub(crate) fn commit_navigation(
        &mut self,
        context: ContextId,
        url: Url,
        cause: NavigationCause,
    ) -> Result<NavigationOutcome> {
        let (attached, initial_about_blank) = {
            let ctx = self.contexts.require(context)?;
            (self.contexts.is_attached(context), ctx.initial_about_blank)
        };
        if !attached {
            debug!(%context, %url, "navigation in detached context ignored");
            return Ok(NavigationOutcome::Ignored);
        }
        if url.scheme() == "javascript" {
            return Ok(NavigationOutcome::Ignored);
        }
        let replace = matches!(cause, NavigationCause::ScriptReplace) || initial_about_blank;
        let current = self.location(context).ok();
        if let Some(current) = &current {
            if is_fragment_navigation(current, &url) {
                return self.navigate_to_fragment(context, current.clone(), url, cause, replace);
            }
        }
        // Reloading the current URL does not grow the history.
        let replace = replace || current.as_ref() == Some(&url);
        self.load_and_commit(context, url, cause, replace)
    }

    fn navigate_to_fragment(
        &mut self,
        context: ContextId,
        from: Url,
        to: Url,
        cause: NavigationCause,
        replace: bool,
    ) -> Result<NavigationOutcome> {
        let document = self.current_document(context)?;
        let title = self.title(context)?;
        let unchanged = from == to;
        let discarded = self.commit_entry(
            context,
            NavigationEntry::new(to.clone(), document, title),
            replace || unchanged,
            "fragment",
        )?;
        self.collect_documents(context, discarded, None);
        if let Some(doc) = self.documents.get_mut(document) {
            doc.set_url(to.clone());
        }
        if !unchanged {
            self.tasks.push(
                context,
                TaskKind::HashChange {
                    old_url: from.to_string(),
                    new_url: to.to_string(),
                },
            );
        }
        self.record_navigation(context, cause, Some(from), to);
        Ok(self.committed(context))
    }

    fn load_and_commit(
        &mut self,
        context: ContextId,
        url: Url,
        cause: NavigationCause,
        replace: bool,
    ) -> Result<NavigationOutcome> {
        let page = if url.scheme() == "about" {
            LoadedPage::blank(url.clone())
        } else {
            match self.loader.load(&url) {
                Ok(page) => page,
                Err(err) => {
                    warn!(%context, %url, error = %err, "navigation failed");
                    self.trace_navigation_line(format!("[nav] failed {url} error={err}"));
                    return Ok(NavigationOutcome::Failed(err));
                }
            }
        };
        let from = self.location(context).ok();
        let previous = self.contexts.require(context)?.current_document();
        let origin = (page.url.scheme() == "about")
            .then(|| self.inherited_origin(context))
            .flatten();
        let final_url = page.url.clone();
        let document = self
            .documents
            .insert(page.url, page.title.clone(), origin, page.dom, context);
        let discarded = self.commit_entry(
            context,
            NavigationEntry::new(final_url.clone(), document, page.title),
            replace,
            if replace { "replace" } else { "push" },
        )?;
        self.record_navigation(context, cause, from, final_url);
        self.install_document(context, document, true)?;
        self.collect_documents(context, discarded, previous);
        Ok(self.committed(context))
    }

    fn reload_in_turn(&mut self, context: ContextId) -> Result<NavigationOutcome> {
        if !self.contexts.is_attached(context) {
            return Ok(NavigationOutcome::Ignored);
        }
        let url = self.location(context)?;
        self.load_and_commit(
            context,
            url,
            NavigationCause::HistoryTraversal { delta: 0 },
            true,
        )
    }

    fn traverse(&mut self, context: ContextId, delta: i64) -> Result<NavigationOutcome> {
        if !self.contexts.is_attached(context) {
            return Ok(NavigationOutcome::Ignored);
        }
        if delta == 0 {
            return self.reload_in_turn(context);
        }
        let ctx = self.contexts.require_mut(context)?;
        let Some(step) = ctx.history_mut().go(delta) else {
            self.trace_navigation_line(format!("[nav] go delta={delta} ignored"));
            return Ok(NavigationOutcome::Ignored);
        };
        let history = ctx.history();
        let (Some(from), Some(to)) = (
            history.item(step.from).cloned(),
            history.item(step.to).cloned(),
        ) else {
            return Ok(NavigationOutcome::Ignored);
        };
        let (index, length) = (history.index(), history.len());
        self.trace_navigation_line(format!(
            "[nav] traverse {} index={index} length={length}",
            to.url()
        ));
        debug!(%context, delta, index, length, "history traversal");

        self.documents
            .get_mut(to.document())
            .ok_or(Error::UnknownDocument(to.document()))?
            .set_url(to.url().clone());
        if from.document() == to.document() {
            if from.url() != to.url() {
                self.tasks.push(
                    context,
                    TaskKind::HashChange {
                        old_url: from.url().to_string(),
                        new_url: to.url().to_string(),
                    },
                );
            }
        } else {
            self.install_document(context, to.document(), true)?;
        }
        self.record_navigation(
            context,
            NavigationCause::HistoryTraversal { delta },
            Some(from.url().clone()),
            to.url().clone(),
        );
        Ok(NavigationOutcome::Committed { index, length })
    }

    /// Pushes or replaces `entry` and returns the entries that fell out of
    /// the history.
    fn commit_entry(
        &mut self,
        context: ContextId,
        entry: NavigationEntry,
        replace: bool,
        verb: &str,
    ) -> Result<Vec<NavigationEntry>> {
        let url = entry.url().clone();
        let ctx = self.contexts.require_mut(context)?;
        ctx.initial_about_blank = false;
        let history = ctx.history_mut();
        let discarded = if replace {
            history.replace(entry).into_iter().collect()
        } else {
            history.push(entry)
        };
        let (index, length) = (history.index(), history.len());
        self.trace_navigation_line(format!("[nav] {verb} {url} index={index} length={length}"));
        debug!(%context, %url, verb, index, length, "history entry committed");
        Ok(discarded)
    }

    /// Creates and installs the initial `about:blank` document of a fresh
    /// context. The next navigation replaces it instead of pushing.
    pub(crate) fn install_initial_blank(&mut self, context: ContextId, fire_load: bool) -> Result<()> {
        let url = Url::parse("about:blank").map_err(|err| Error::invalid_url("about:blank", err))?;
        let origin = self.inherited_origin(context);
        let page = LoadedPage::blank(url.clone());
        let document = self
            .documents
            .insert(url.clone(), page.title, origin, page.dom, context);
        self.commit_entry(context, NavigationEntry::new(url, document, ""), true, "initial")?;
        self.contexts.require_mut(context)?.initial_about_blank = true;
        self.install_document(context, document, fire_load)
    }

    pub(crate) fn load_initial_document(&mut self, context: ContextId, url: Url) -> Result<()> {
        if url.scheme() == "about" {
            return self.install_initial_blank(context, true);
        }
        match self.load_and_commit(context, url.clone(), NavigationCause::ScriptAssignment, true)? {
            NavigationOutcome::Failed(err) => {
                warn!(%url, error = %err, "initial load failed; starting at about:blank");
                self.install_initial_blank(context, true)
            }
            _ => Ok(()),
        }
    }

    /// Makes `document` the context's current one: child contexts of the
    /// outgoing document are detached, frames of the new one are created,
    /// then `load` fires on the window and the owning frame element.
    pub(crate) fn install_document(
        &mut self,
        context: ContextId,
        document: DocumentId,
        fire_load: bool,
    ) -> Result<()> {
        let previous = self.contexts.require(context)?.current_document();
        if previous != Some(document) {
            self.detach_child_contexts(context)?;
        }
        self.contexts
            .require_mut(context)?
            .set_current_document(document);
        self.bootstrap_frames(context, document)?;
        if fire_load {
            self.dispatch_trusted(EventTarget::Window(context), EventInit::for_type("load"))?;
            let frame_element = self
                .contexts
                .get(context)
                .and_then(|ctx| ctx.frame_element())
                .filter(|element| self.frame_bindings.get(element) == Some(&context));
            if let Some(element) = frame_element {
                self.dispatch_trusted(element.into(), EventInit::for_type("load"))?;
            }
        }
        Ok(())
    }

    /// Drops documents that neither the history nor the context still
    /// reference, together with their listeners.
    fn collect_documents(
        &mut self,
        context: ContextId,
        discarded: Vec<NavigationEntry>,
        previous: Option<DocumentId>,
    ) {
        let Some(ctx) = self.contexts.get(context) else {
            return;
        };
        let mut candidates: Vec<DocumentId> =
            discarded.iter().map(NavigationEntry::document).collect();
        candidates.extend(previous);
        candidates.sort();
        candidates.dedup();
        let unreferenced: Vec<DocumentId> = candidates
            .into_iter()
            .filter(|doc| !ctx.history().references(*doc) && ctx.current_document() != Some(*doc))
            .collect();
        if unreferenced.is_empty() {
            return;
        }
        for document in &unreferenced {
            self.documents.remove(*document);
        }
        self.listeners.retain_targets(|target| match target {
            EventTarget::Node(node) => !unreferenced.contains(&node.document),
            EventTarget::Window(_) => true,
        });
        self.frame_bindings
            .retain(|element, _| !unreferenced.contains(&element.document));
        debug!(%context, collected = unreferenced.len(), "documents collected");
    }

    fn record_navigation(
        &mut self,
        context: ContextId,
        cause: NavigationCause,
        from: Option<Url>,
        to: Url,
    ) {
        self.navigations.push(NavigationRecord {
            context,
            cause,
            from,
            to,
        });
    }

    fn navigation_cancelled(&mut self, context: ContextId, event_type: &str) -> NavigationOutcome {
        self.trace_navigation_line(format!("[nav] cancelled by {event_type} in {context}"));
        NavigationOutcome::Cancelled
    }

    fn committed(&self, context: ContextId) -> NavigationOutcome {
        let history = self.contexts.get(context).map(|ctx| ctx.history());
        NavigationOutcome::Committed {
            index: history.map_or(0, SessionHistory::index),
            length: history.map_or(0, SessionHistory::len),
        }
    }

    pub(crate) fn document_url(&self, document: DocumentId) -> Result<Url> {
        self.documents
            .get(document)
            .map(|doc| doc.url().clone())
            .ok_or(Error::UnknownDocument(document))
    }

    pub(crate) fn is_active_document(&self, document: DocumentId) -> bool {
        self.documents.get(document).is_some_and(|doc| {
            self.contexts
                .get(doc.context())
                .and_then(|ctx| ctx.current_document())
                == Some(document)
        })
    }

    /// `about:blank` in a frame takes the origin of the parent's document.
    fn inherited_origin(&self, context: ContextId) -> Option<Origin> {
        let parent = self.contexts.get(context)?.parent()?;
        let document = self.contexts.get(parent)?.current_document()?;
        self.documents.get(document).map(|doc| doc.origin().clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn url(raw: &str) -> Url {
        Url::parse(raw).expect("valid url")
    }

    #[test]
    fn fragment_navigation_needs_a_fragment_on_the_target() {
        let page = url("http://app.local/b.html");
        assert!(is_fragment_navigation(&page, &url("http://app.local/b.html#x")));
        assert!(is_fragment_navigation(
            &url("http://app.local/b.html#x"),
            &url("http://app.local/b.html#y")
        ));
        assert!(!is_fragment_navigation(&url("http://app.local/b.html#x"), &page));
        assert!(!is_fragment_navigation(&page, &url("http://app.local/b.html?q#x")));
    }

    #[test]
    fn form_data_skips_unchecked_and_unnamed_controls() -> Result<()> {
        let mut dom = Dom::blank();
        let body = dom.body().expect("body");
        let form = dom.create_element(body, "form", &[])?;
        dom.create_element(form, "input", &[("name", "q"), ("value", "rust")])?;
        dom.create_element(form, "input", &[("value", "anonymous")])?;
        dom.create_element(form, "input", &[("type", "checkbox"), ("name", "a")])?;
        dom.create_element(form, "input", &[("type", "checkbox"), ("name", "b"), ("checked", "")])?;
        dom.create_element(form, "input", &[("type", "submit"), ("name", "go")])?;
        assert_eq!(
            form_data(&dom, form),
            vec![
                ("q".to_string(), "rust".to_string()),
                ("b".to_string(), "on".to_string())
            ]
        );
        Ok(())
    }

    #[test]
    fn activation_finds_enclosing_link_or_submit_button() -> Result<()> {
        let mut dom = Dom::blank();
        let body = dom.body().expect("body");
        let anchor = dom.create_element(body, "a", &[("href", "next.html")])?;
        let inner = dom.create_element(anchor, "span", &[])?;
        let form = dom.create_element(body, "form", &[])?;
        let button = dom.create_element(form, "button", &[])?;
        let plain = dom.create_element(form, "input", &[("type", "text")])?;

        assert!(matches!(
            activation_for(&dom, inner),
            Some(Activation::Link { anchor: found }) if found == anchor
        ));
        assert!(matches!(
            activation_for(&dom, button),
            Some(Activation::Submit { form: found }) if found == form
        ));
        assert!(activation_for(&dom, plain).is_none());
        Ok(())
    }
}
