use std::fmt;
use std::rc::Rc;

use thiserror::Error;

use crate::context::ContextId;
use crate::document::DocumentId;
use crate::dom::NodeId;
use crate::session::Session;

/// A node inside a specific document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeRef {
    pub document: DocumentId,
    pub node: NodeId,
}

impl NodeRef {
    pub fn new(document: DocumentId, node: NodeId) -> Self {
        Self { document, node }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EventTarget {
    Window(ContextId),
    Node(NodeRef),
}

impl From<ContextId> for EventTarget {
    fn from(context: ContextId) -> Self {
        Self::Window(context)
    }
}

impl From<NodeRef> for EventTarget {
    fn from(node: NodeRef) -> Self {
        Self::Node(node)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventPhase {
    None,
    Capturing,
    AtTarget,
    Bubbling,
}

impl EventPhase {
    /// `Event.eventPhase` numbering.
    pub fn as_u16(self) -> u16 {
        match self {
            Self::None => 0,
            Self::Capturing => 1,
            Self::AtTarget => 2,
            Self::Bubbling => 3,
        }
    }

    pub(crate) fn label(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Capturing => "capture",
            Self::AtTarget => "target",
            Self::Bubbling => "bubble",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MouseInit {
    pub client_x: i32,
    pub client_y: i32,
    pub button: i16,
    pub ctrl_key: bool,
    pub shift_key: bool,
    pub alt_key: bool,
    pub meta_key: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeyInit {
    pub key: String,
    pub code: String,
    pub ctrl_key: bool,
    pub shift_key: bool,
    pub alt_key: bool,
    pub meta_key: bool,
    pub repeat: bool,
}

impl KeyInit {
    pub fn new(key: &str) -> Self {
        Self {
            key: key.to_string(),
            ..Self::default()
        }
    }
}

/// Fields of a `message` event.
#[derive(Debug, Clone, PartialEq)]
pub struct MessageData {
    pub data: serde_json::Value,
    pub origin: String,
    pub source: Option<ContextId>,
    pub last_event_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HashChangeData {
    pub old_url: String,
    pub new_url: String,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub enum EventDetail {
    #[default]
    None,
    Mouse(MouseInit),
    Key(KeyInit),
    Message(MessageData),
    HashChange(HashChangeData),
}

/// Construction parameters, the equivalent of `new Event(type, init)`.
#[derive(Debug, Clone, PartialEq)]
pub struct EventInit {
    pub event_type: String,
    pub bubbles: bool,
    pub cancelable: bool,
    pub detail: EventDetail,
}

impl EventInit {
    /// Script-constructed event: neither bubbling nor cancelable unless asked.
    pub fn new(event_type: &str) -> Self {
        Self {
            event_type: event_type.to_string(),
            bubbles: false,
            cancelable: false,
            detail: EventDetail::None,
        }
    }

    /// Event carrying the built-in bubbles/cancelable traits of its type.
    pub fn for_type(event_type: &str) -> Self {
        let (bubbles, cancelable) = default_event_traits(event_type);
        Self {
            event_type: event_type.to_string(),
            bubbles,
            cancelable,
            detail: EventDetail::None,
        }
    }

    pub fn bubbles(mut self, bubbles: bool) -> Self {
        self.bubbles = bubbles;
        self
    }

    pub fn cancelable(mut self, cancelable: bool) -> Self {
        self.cancelable = cancelable;
        self
    }

    pub fn detail(mut self, detail: EventDetail) -> Self {
        self.detail = detail;
        self
    }
}

/// Bubbles/cancelable flags of the event types the engine fires itself.
pub(crate) fn default_event_traits(event_type: &str) -> (bool, bool) {
    match event_type {
        "click" | "dblclick" | "mousedown" | "mouseup" | "mouseover" | "mouseout"
        | "mousemove" | "contextmenu" | "wheel" | "keydown" | "keypress" | "keyup"
        | "submit" | "reset" => (true, true),
        "input" | "change" | "focusin" | "focusout" | "select" => (true, false),
        "beforeunload" => (false, true),
        _ => (false, false),
    }
}

/// The per-dispatch event record handed to every listener.
#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    pub(crate) event_type: String,
    pub(crate) target: EventTarget,
    pub(crate) current_target: Option<EventTarget>,
    pub(crate) phase: EventPhase,
    pub(crate) bubbles: bool,
    pub(crate) cancelable: bool,
    pub(crate) is_trusted: bool,
    pub(crate) default_prevented: bool,
    pub(crate) propagation_stopped: bool,
    pub(crate) immediate_propagation_stopped: bool,
    pub(crate) legacy_return_value: bool,
    pub(crate) detail: EventDetail,
}

impl Event {
    pub(crate) fn new(init: EventInit, target: EventTarget, is_trusted: bool) -> Self {
        Self {
            event_type: init.event_type,
            target,
            current_target: None,
            phase: EventPhase::None,
            bubbles: init.bubbles,
            cancelable: init.cancelable,
            is_trusted,
            default_prevented: false,
            propagation_stopped: false,
            immediate_propagation_stopped: false,
            legacy_return_value: true,
            detail: init.detail,
        }
    }

    pub fn event_type(&self) -> &str {
        &self.event_type
    }

    pub fn target(&self) -> EventTarget {
        self.target
    }

    /// Legacy alias of `target`.
    pub fn src_element(&self) -> EventTarget {
        self.target
    }

    pub fn current_target(&self) -> Option<EventTarget> {
        self.current_target
    }

    pub fn phase(&self) -> EventPhase {
        self.phase
    }

    pub fn bubbles(&self) -> bool {
        self.bubbles
    }

    pub fn cancelable(&self) -> bool {
        self.cancelable
    }

    pub fn is_trusted(&self) -> bool {
        self.is_trusted
    }

    pub fn default_prevented(&self) -> bool {
        self.default_prevented
    }

    pub fn propagation_stopped(&self) -> bool {
        self.propagation_stopped
    }

    /// No effect on non-cancelable events.
    pub fn prevent_default(&mut self) {
        if self.cancelable {
            self.default_prevented = true;
        }
    }

    pub fn stop_propagation(&mut self) {
        self.propagation_stopped = true;
    }

    pub fn stop_immediate_propagation(&mut self) {
        self.propagation_stopped = true;
        self.immediate_propagation_stopped = true;
    }

    /// Legacy `event.cancelBubble = true`.
    pub fn set_cancel_bubble(&mut self, cancel: bool) {
        if cancel {
            self.propagation_stopped = true;
        }
    }

    pub fn return_value(&self) -> bool {
        self.legacy_return_value
    }

    /// Legacy `event.returnValue = value`. Only `false` has an effect; a
    /// cancellation is never undone.
    pub fn set_return_value(&mut self, value: bool) {
        if !value {
            self.legacy_return_value = false;
        }
    }

    /// `defaultPrevented || (cancelable && returnValue === false)`.
    pub fn is_cancelled(&self) -> bool {
        self.default_prevented || (self.cancelable && !self.legacy_return_value)
    }

    pub fn detail(&self) -> &EventDetail {
        &self.detail
    }

    pub fn message(&self) -> Option<&MessageData> {
        match &self.detail {
            EventDetail::Message(message) => Some(message),
            _ => None,
        }
    }

    pub fn hash_change(&self) -> Option<&HashChangeData> {
        match &self.detail {
            EventDetail::HashChange(change) => Some(change),
            _ => None,
        }
    }

    pub fn mouse(&self) -> Option<&MouseInit> {
        match &self.detail {
            EventDetail::Mouse(mouse) => Some(mouse),
            _ => None,
        }
    }

    pub fn key(&self) -> Option<&KeyInit> {
        match &self.detail {
            EventDetail::Key(key) => Some(key),
            _ => None,
        }
    }
}

/// What a listener body evaluated to.
#[derive(Debug, Clone, PartialEq)]
pub enum HandlerReturn {
    Undefined,
    Bool(bool),
    Other(String),
}

impl HandlerReturn {
    /// Only an exact `false` counts, not falsy values.
    pub fn is_false(&self) -> bool {
        matches!(self, Self::Bool(false))
    }
}

impl From<()> for HandlerReturn {
    fn from(_: ()) -> Self {
        Self::Undefined
    }
}

impl From<bool> for HandlerReturn {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

/// An exception thrown by a listener.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct ScriptError {
    message: String,
}

impl ScriptError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

pub type ListenerResult = std::result::Result<HandlerReturn, ScriptError>;

type CallbackFn = dyn Fn(&mut Session, &mut Event) -> ListenerResult;

/// An opaque invocable supplied by the script host. Two callbacks are the
/// same listener only if they are clones of one `Callback`.
#[derive(Clone)]
pub struct Callback(Rc<CallbackFn>);

impl Callback {
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&mut Session, &mut Event) -> ListenerResult + 'static,
    {
        Self(Rc::new(f))
    }

    pub fn same_as(&self, other: &Callback) -> bool {
        std::ptr::addr_eq(Rc::as_ptr(&self.0), Rc::as_ptr(&other.0))
    }

    pub(crate) fn call(&self, session: &mut Session, event: &mut Event) -> ListenerResult {
        (self.0)(session, event)
    }
}

impl fmt::Debug for Callback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Callback({:p})", Rc::as_ptr(&self.0).cast::<()>())
    }
}
