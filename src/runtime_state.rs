use std::collections::{HashMap, VecDeque};

use url::Origin;

use crate::config::TraceConfig;
use crate::context::ContextId;
use crate::event::{Callback, EventPhase, EventTarget, ScriptError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub(crate) struct ListenerId(u64);

/// How a listener was registered. All three share one registration shape and
/// differ only in how their return value is read after invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListenerKind {
    /// `addEventListener`; the return value is ignored.
    EventListener,
    /// Legacy `attachEvent('on' + type, ...)`.
    Attached,
    /// `on<type>` property or attribute handler.
    Property,
}

impl ListenerKind {
    pub fn honors_return_value(self) -> bool {
        !matches!(self, Self::EventListener)
    }
}

#[derive(Debug, Clone)]
pub(crate) struct Listener {
    pub(crate) id: ListenerId,
    pub(crate) kind: ListenerKind,
    pub(crate) capture: bool,
    pub(crate) callback: Callback,
}

#[derive(Debug, Default)]
pub(crate) struct ListenerStore {
    map: HashMap<EventTarget, HashMap<String, Vec<Listener>>>,
    next_id: u64,
}

impl ListenerStore {
    fn allocate_id(&mut self) -> ListenerId {
        let id = ListenerId(self.next_id);
        self.next_id = self.next_id.saturating_add(1);
        id
    }

    /// Appends a registration. A modern listener re-registered with the same
    /// callback and capture flag is ignored and yields `None`.
    pub(crate) fn add(
        &mut self,
        target: EventTarget,
        event_type: &str,
        kind: ListenerKind,
        capture: bool,
        callback: Callback,
    ) -> Option<ListenerId> {
        let id = self.allocate_id();
        let listeners = self
            .map
            .entry(target)
            .or_default()
            .entry(event_type.to_string())
            .or_default();

        if kind == ListenerKind::EventListener
            && listeners.iter().any(|existing| {
                existing.kind == kind
                    && existing.capture == capture
                    && existing.callback.same_as(&callback)
            })
        {
            return None;
        }

        listeners.push(Listener {
            id,
            kind,
            capture,
            callback,
        });
        Some(id)
    }

    pub(crate) fn remove(
        &mut self,
        target: EventTarget,
        event_type: &str,
        kind: ListenerKind,
        capture: bool,
        callback: &Callback,
    ) -> bool {
        let Some(events) = self.map.get_mut(&target) else {
            return false;
        };
        let Some(listeners) = events.get_mut(event_type) else {
            return false;
        };

        let Some(pos) = listeners.iter().position(|listener| {
            listener.kind == kind && listener.capture == capture && listener.callback.same_as(callback)
        }) else {
            return false;
        };
        listeners.remove(pos);
        if listeners.is_empty() {
            events.remove(event_type);
        }
        if events.is_empty() {
            self.map.remove(&target);
        }
        true
    }

    /// Sets or clears the single `on<type>` slot. Re-assignment keeps the
    /// slot's original position in the registration order.
    pub(crate) fn set_property(
        &mut self,
        target: EventTarget,
        event_type: &str,
        callback: Option<Callback>,
    ) {
        let existing = self
            .map
            .get_mut(&target)
            .and_then(|events| events.get_mut(event_type))
            .and_then(|listeners| {
                listeners
                    .iter()
                    .position(|listener| listener.kind == ListenerKind::Property)
                    .map(|pos| (listeners, pos))
            });

        match (existing, callback) {
            (Some((listeners, pos)), Some(callback)) => {
                listeners[pos].callback = callback;
            }
            (Some((listeners, pos)), None) => {
                listeners.remove(pos);
            }
            (None, Some(callback)) => {
                self.add(target, event_type, ListenerKind::Property, false, callback);
            }
            (None, None) => {}
        }
    }

    pub(crate) fn property(&self, target: EventTarget, event_type: &str) -> Option<Callback> {
        self.map
            .get(&target)
            .and_then(|events| events.get(event_type))
            .and_then(|listeners| {
                listeners
                    .iter()
                    .find(|listener| listener.kind == ListenerKind::Property)
                    .map(|listener| listener.callback.clone())
            })
    }

    /// Snapshot of every registration for `target`/`event_type`, in
    /// registration order.
    pub(crate) fn get(&self, target: EventTarget, event_type: &str) -> Vec<Listener> {
        self.map
            .get(&target)
            .and_then(|events| events.get(event_type))
            .cloned()
            .unwrap_or_default()
    }

    pub(crate) fn contains(&self, target: EventTarget, event_type: &str, id: ListenerId) -> bool {
        self.map
            .get(&target)
            .and_then(|events| events.get(event_type))
            .is_some_and(|listeners| listeners.iter().any(|listener| listener.id == id))
    }

    pub(crate) fn retain_targets(&mut self, mut keep: impl FnMut(&EventTarget) -> bool) {
        self.map.retain(|target, _| keep(target));
    }

    pub(crate) fn count(&self, target: EventTarget, event_type: &str) -> usize {
        self.map
            .get(&target)
            .and_then(|events| events.get(event_type))
            .map_or(0, Vec::len)
    }
}

/// Snapshot of the event currently being handled in one context, exposed as
/// the legacy `window.event`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AmbientEvent {
    pub event_type: String,
    pub target: EventTarget,
    pub current_target: Option<EventTarget>,
    pub phase: EventPhase,
}

/// A listener exception surfaced through the host error channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportedError {
    pub event_type: String,
    pub target: EventTarget,
    pub current_target: Option<EventTarget>,
    pub error: ScriptError,
}

#[derive(Debug)]
pub(crate) struct TraceState {
    pub(crate) enabled: bool,
    pub(crate) events: bool,
    pub(crate) navigation: bool,
    pub(crate) logs: VecDeque<String>,
    pub(crate) log_limit: usize,
}

impl TraceState {
    pub(crate) fn from_config(config: &TraceConfig) -> Self {
        Self {
            enabled: config.enabled,
            events: config.events,
            navigation: config.navigation,
            logs: VecDeque::new(),
            log_limit: config.log_limit,
        }
    }
}

#[derive(Debug, Clone)]
pub(crate) enum TaskKind {
    Message {
        source: ContextId,
        data: serde_json::Value,
        target_origin: Option<Origin>,
        source_origin: String,
    },
    HashChange {
        old_url: String,
        new_url: String,
    },
}

#[derive(Debug, Clone)]
pub(crate) struct QueuedTask {
    pub(crate) order: u64,
    pub(crate) context: ContextId,
    pub(crate) kind: TaskKind,
}

/// One FIFO per browsing context. Tasks run in global enqueue order, which
/// keeps every sender→target pair in send order.
#[derive(Debug, Default)]
pub(crate) struct TaskQueue {
    queues: HashMap<ContextId, VecDeque<QueuedTask>>,
    next_order: u64,
    pub(crate) turn_depth: usize,
}

impl TaskQueue {
    pub(crate) fn push(&mut self, context: ContextId, kind: TaskKind) {
        let order = self.next_order;
        self.next_order = self.next_order.saturating_add(1);
        self.queues
            .entry(context)
            .or_default()
            .push_back(QueuedTask {
                order,
                context,
                kind,
            });
    }

    pub(crate) fn pop_next(&mut self) -> Option<QueuedTask> {
        let context = self
            .queues
            .iter()
            .filter_map(|(context, queue)| queue.front().map(|task| (task.order, *context)))
            .min()
            .map(|(_, context)| context)?;
        let queue = self.queues.get_mut(&context)?;
        let task = queue.pop_front();
        if queue.is_empty() {
            self.queues.remove(&context);
        }
        task
    }

    pub(crate) fn len(&self) -> usize {
        self.queues.values().map(VecDeque::len).sum()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.queues.is_empty()
    }

    pub(crate) fn len_for(&self, context: ContextId) -> usize {
        self.queues.get(&context).map_or(0, VecDeque::len)
    }
}
