use tracing::{debug, warn};

use crate::event::{Callback, Event, EventInit, EventPhase, EventTarget, NodeRef};
use crate::context::ContextId;
use crate::runtime_state::{AmbientEvent, ListenerKind, ReportedError};
use crate::session::Session;
use crate::{Error, Result};

const STACK_RED_ZONE: usize = 64 * 1024;
const STACK_GROWTH: usize = 4 * 1024 * 1024;

/// What the caller of a dispatch learns once every phase has run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DispatchOutcome {
    /// `defaultPrevented || (cancelable && returnValue === false)`.
    pub cancelled: bool,
    pub default_prevented: bool,
    pub legacy_return_value: bool,
    pub propagation_stopped: bool,
    pub listeners_invoked: usize,
}

impl DispatchOutcome {
    fn from_event(event: &Event, listeners_invoked: usize) -> Self {
        Self {
            cancelled: event.is_cancelled(),
            default_prevented: event.default_prevented,
            legacy_return_value: event.legacy_return_value,
            propagation_stopped: event.propagation_stopped,
            listeners_invoked,
        }
    }
}

fn legacy_event_type(on_type: &str) -> Result<&str> {
    on_type
        .strip_prefix("on")
        .filter(|event_type| !event_type.is_empty())
        .ok_or_else(|| Error::Syntax(format!("legacy event name must start with 'on': {on_type:?}")))
}

impl Session {
    /// `target.addEventListener(type, callback, capture)`.
    pub fn add_event_listener(
        &mut self,
        target: impl Into<EventTarget>,
        event_type: &str,
        callback: Callback,
        capture: bool,
    ) -> Result<()> {
        let target = target.into();
        self.ensure_target(target)?;
        self.listeners.add(
            target,
            event_type,
            ListenerKind::EventListener,
            capture,
            callback,
        );
        Ok(())
    }

    /// Returns whether a matching registration was found.
    pub fn remove_event_listener(
        &mut self,
        target: impl Into<EventTarget>,
        event_type: &str,
        callback: &Callback,
        capture: bool,
    ) -> Result<bool> {
        let target = target.into();
        self.ensure_target(target)?;
        Ok(self.listeners.remove(
            target,
            event_type,
            ListenerKind::EventListener,
            capture,
            callback,
        ))
    }

    /// `target.on<type> = handler`; `None` clears the slot.
    pub fn set_event_handler(
        &mut self,
        target: impl Into<EventTarget>,
        event_type: &str,
        handler: Option<Callback>,
    ) -> Result<()> {
        let target = target.into();
        self.ensure_target(target)?;
        self.listeners.set_property(target, event_type, handler);
        Ok(())
    }

    pub fn event_handler(&self, target: impl Into<EventTarget>, event_type: &str) -> Option<Callback> {
        self.listeners.property(target.into(), event_type)
    }

    /// Legacy `target.attachEvent('on' + type, callback)`. Always answers
    /// `true`, like the original API.
    pub fn attach_event(
        &mut self,
        target: impl Into<EventTarget>,
        on_type: &str,
        callback: Callback,
    ) -> Result<bool> {
        self.require_legacy("attachEvent")?;
        let target = target.into();
        self.ensure_target(target)?;
        let event_type = legacy_event_type(on_type)?;
        self.listeners
            .add(target, event_type, ListenerKind::Attached, false, callback);
        Ok(true)
    }

    pub fn detach_event(
        &mut self,
        target: impl Into<EventTarget>,
        on_type: &str,
        callback: &Callback,
    ) -> Result<bool> {
        self.require_legacy("detachEvent")?;
        let target = target.into();
        self.ensure_target(target)?;
        let event_type = legacy_event_type(on_type)?;
        Ok(self
            .listeners
            .remove(target, event_type, ListenerKind::Attached, false, callback))
    }

    /// Legacy `target.fireEvent('on' + type)`. Uses the built-in traits of the
    /// type and returns `false` when the event was cancelled.
    pub fn fire_event(&mut self, target: impl Into<EventTarget>, on_type: &str) -> Result<bool> {
        self.require_legacy("fireEvent")?;
        let event_type = legacy_event_type(on_type)?;
        let outcome = self.dispatch_with(target.into(), EventInit::for_type(event_type), false)?;
        Ok(!outcome.cancelled)
    }

    /// `target.dispatchEvent(event)`. The event is untrusted; an uncancelled
    /// `click` still runs the activation behaviour of links and submit buttons.
    pub fn dispatch_event(
        &mut self,
        target: impl Into<EventTarget>,
        init: EventInit,
    ) -> Result<DispatchOutcome> {
        match target.into() {
            EventTarget::Node(node) if init.event_type == "click" => {
                self.run_turn(|this| this.activate_click(node, init, false))
            }
            target => self.dispatch_with(target, init, false),
        }
    }

    /// Legacy `window.event` for `context`, while one of its listeners runs.
    pub fn window_event(&self, context: ContextId) -> Option<&AmbientEvent> {
        self.ambient_events.get(&context).and_then(|stack| stack.last())
    }

    pub fn listener_count(&self, target: impl Into<EventTarget>, event_type: &str) -> usize {
        self.listeners.count(target.into(), event_type)
    }

    pub(crate) fn dispatch_trusted(
        &mut self,
        target: EventTarget,
        init: EventInit,
    ) -> Result<DispatchOutcome> {
        self.dispatch_with(target, init, true)
    }

    pub(crate) fn dispatch_with(
        &mut self,
        target: EventTarget,
        init: EventInit,
        trusted: bool,
    ) -> Result<DispatchOutcome> {
        self.ensure_target(target)?;
        let event = Event::new(init, target, trusted);
        self.run_turn(|this| {
            stacker::maybe_grow(STACK_RED_ZONE, STACK_GROWTH, || this.dispatch_prepared(event))
        })
    }

    fn dispatch_prepared(&mut self, mut event: Event) -> Result<DispatchOutcome> {
        let target = event.target;
        // Taken once; tree mutations made by listeners do not change the walk.
        let path = self.propagation_path(target);
        let ancestors = &path[..path.len().saturating_sub(1)];
        let mut invoked = 0;

        if event.bubbles {
            for current in ancestors {
                event.phase = EventPhase::Capturing;
                invoked += self.invoke_listeners(*current, &mut event, Some(true));
                if event.propagation_stopped {
                    return Ok(self.finish_dispatch(event, invoked, "propagation_stopped"));
                }
            }
        }

        event.phase = EventPhase::AtTarget;
        invoked += self.invoke_listeners(target, &mut event, None);
        if event.propagation_stopped {
            return Ok(self.finish_dispatch(event, invoked, "propagation_stopped"));
        }

        if event.bubbles {
            for current in ancestors.iter().rev() {
                event.phase = EventPhase::Bubbling;
                invoked += self.invoke_listeners(*current, &mut event, Some(false));
                if event.propagation_stopped {
                    return Ok(self.finish_dispatch(event, invoked, "propagation_stopped"));
                }
            }
        }

        Ok(self.finish_dispatch(event, invoked, "completed"))
    }

    /// Root first: window, document, ..., target. Detached nodes and
    /// documents no longer shown by their context have no window link.
    fn propagation_path(&self, target: EventTarget) -> Vec<EventTarget> {
        let EventTarget::Node(node) = target else {
            return vec![target];
        };
        let Some(document) = self.documents.get(node.document) else {
            return vec![target];
        };
        let dom = document.dom();
        let mut path = Vec::new();
        let mut cursor = Some(node.node);
        while let Some(current) = cursor {
            path.push(EventTarget::Node(NodeRef::new(node.document, current)));
            cursor = dom.parent(current);
        }
        let context = document.context();
        let showing = self
            .contexts
            .get(context)
            .and_then(|ctx| ctx.current_document())
            == Some(node.document);
        if showing && dom.is_connected(node.node) {
            path.push(EventTarget::Window(context));
        }
        path.reverse();
        path
    }

    /// Runs the listeners registered on `current`. `capture` filters by the
    /// registration flag; `None` runs all of them (the at-target phase).
    fn invoke_listeners(
        &mut self,
        current: EventTarget,
        event: &mut Event,
        capture: Option<bool>,
    ) -> usize {
        let listeners = self.listeners.get(current, &event.event_type);
        let mut invoked = 0;
        for listener in listeners {
            if capture.is_some_and(|capture| capture != listener.capture) {
                continue;
            }
            if !self
                .listeners
                .contains(current, &event.event_type, listener.id)
            {
                continue;
            }
            event.current_target = Some(current);
            if self.trace_state.enabled {
                let target_label = self.target_label(event.target);
                let current_label = self.target_label(current);
                self.trace_event_line(format!(
                    "[event] {} target={} current={} phase={} default_prevented={}",
                    event.event_type,
                    target_label,
                    current_label,
                    event.phase.label(),
                    event.default_prevented
                ));
            }

            let ambient_context = self.push_ambient_event(event);
            let result = listener.callback.call(self, event);
            if let Some(context) = ambient_context {
                self.pop_ambient_event(context);
            }
            invoked += 1;

            match result {
                Ok(value) => {
                    if listener.kind.honors_return_value() && value.is_false() {
                        event.legacy_return_value = false;
                    }
                }
                Err(error) => {
                    warn!(
                        event_type = %event.event_type,
                        error = %error,
                        "listener threw; continuing dispatch"
                    );
                    self.script_errors.push(ReportedError {
                        event_type: event.event_type.clone(),
                        target: event.target,
                        current_target: Some(current),
                        error,
                    });
                }
            }

            if event.immediate_propagation_stopped {
                break;
            }
        }
        invoked
    }

    fn push_ambient_event(&mut self, event: &Event) -> Option<ContextId> {
        if !self.config.family.exposes_window_event() {
            return None;
        }
        let context = self.target_context(event.target)?;
        self.ambient_events
            .entry(context)
            .or_default()
            .push(AmbientEvent {
                event_type: event.event_type.clone(),
                target: event.target,
                current_target: event.current_target,
                phase: event.phase,
            });
        Some(context)
    }

    fn pop_ambient_event(&mut self, context: ContextId) {
        if let Some(stack) = self.ambient_events.get_mut(&context) {
            stack.pop();
            if stack.is_empty() {
                self.ambient_events.remove(&context);
            }
        }
    }

    fn finish_dispatch(&mut self, mut event: Event, invoked: usize, outcome: &str) -> DispatchOutcome {
        event.phase = EventPhase::None;
        event.current_target = None;
        let result = DispatchOutcome::from_event(&event, invoked);
        if self.trace_state.enabled {
            let target_label = self.target_label(event.target);
            self.trace_event_line(format!(
                "[event] done {} target={} outcome={} cancelled={}",
                event.event_type, target_label, outcome, result.cancelled
            ));
        }
        debug!(
            event_type = %event.event_type,
            outcome,
            cancelled = result.cancelled,
            listeners = invoked,
            "dispatch finished"
        );
        result
    }

    fn require_legacy(&self, api: &str) -> Result<()> {
        if self.config.family.supports_legacy_events() {
            Ok(())
        } else {
            Err(Error::NotSupported(format!(
                "{api} is only available in the legacy browser family"
            )))
        }
    }

    pub(crate) fn ensure_target(&self, target: EventTarget) -> Result<()> {
        match target {
            EventTarget::Window(context) => self.contexts.require(context).map(|_| ()),
            EventTarget::Node(node) => {
                let document = self
                    .documents
                    .get(node.document)
                    .ok_or(Error::UnknownDocument(node.document))?;
                if document.dom().contains(node.node) {
                    Ok(())
                } else {
                    Err(Error::NodeNotFound(format!(
                        "node {} is not part of {}",
                        node.node.0, node.document
                    )))
                }
            }
        }
    }
}
