use tracing::debug;
use url::{Origin, Url};

use crate::context::ContextId;
use crate::event::{EventDetail, EventInit, EventTarget, HashChangeData, MessageData};
use crate::runtime_state::{QueuedTask, TaskKind};
use crate::session::Session;
use crate::{Error, Result};

/// `None` stands for `*`.
fn parse_target_origin(target_origin: &str, sender: &Origin) -> Result<Option<Origin>> {
    match target_origin {
        "*" => Ok(None),
        "/" => Ok(Some(sender.clone())),
        other => Url::parse(other)
            .map(|url| Some(url.origin()))
            .map_err(|err| Error::Syntax(format!("invalid target origin {other:?}: {err}"))),
    }
}

impl Session {
    /// `target.postMessage(data, targetOrigin)` sent from a script running in
    /// `source`. Delivery is queued and happens after the current turn; a
    /// target origin that does not match the receiver's document at delivery
    /// time drops the message silently.
    pub fn post_message(
        &mut self,
        source: ContextId,
        target: ContextId,
        data: serde_json::Value,
        target_origin: &str,
    ) -> Result<()> {
        self.contexts.require(target)?;
        let sender = self.context_origin(source)?;
        let expected = parse_target_origin(target_origin, &sender)?;
        let source_origin = sender.ascii_serialization();
        self.run_turn(|this| {
            this.trace_event_line(format!(
                "[message] queue {source} -> {target} target_origin={target_origin}"
            ));
            this.tasks.push(
                target,
                TaskKind::Message {
                    source,
                    data,
                    target_origin: expected,
                    source_origin,
                },
            );
            Ok(())
        })
    }

    /// Runs queued tasks in enqueue order until the queue is empty. Returns
    /// how many ran.
    pub fn run_pending_tasks(&mut self) -> Result<usize> {
        self.drain_tasks()
    }

    pub fn pending_task_count(&self) -> usize {
        self.tasks.len()
    }

    pub fn pending_tasks_for(&self, context: ContextId) -> usize {
        self.tasks.len_for(context)
    }

    pub(crate) fn drain_tasks(&mut self) -> Result<usize> {
        let mut ran = 0;
        while !self.tasks.is_empty() {
            if ran >= self.config.task_step_limit {
                return Err(Error::TaskLimitExceeded(ran));
            }
            let Some(task) = self.tasks.pop_next() else {
                break;
            };
            self.tasks.turn_depth += 1;
            let result = self.run_task(task);
            self.tasks.turn_depth -= 1;
            result?;
            ran += 1;
        }
        Ok(ran)
    }

    fn run_task(&mut self, task: QueuedTask) -> Result<()> {
        let context = task.context;
        if !self.contexts.is_attached(context) {
            debug!(%context, "dropping task for detached context");
            return Ok(());
        }
        match task.kind {
            TaskKind::Message {
                source,
                data,
                target_origin,
                source_origin,
            } => {
                let Ok(receiver) = self.context_origin(context) else {
                    return Ok(());
                };
                if let Some(expected) = target_origin {
                    if expected != receiver {
                        self.trace_event_line(format!(
                            "[message] drop {source} -> {context} origin mismatch receiver={}",
                            receiver.ascii_serialization()
                        ));
                        debug!(%source, %context, "message dropped: target origin mismatch");
                        return Ok(());
                    }
                }
                let detail = EventDetail::Message(MessageData {
                    data,
                    origin: source_origin,
                    source: Some(source),
                    last_event_id: String::new(),
                });
                self.dispatch_trusted(
                    EventTarget::Window(context),
                    EventInit::for_type("message").detail(detail),
                )?;
            }
            TaskKind::HashChange { old_url, new_url } => {
                let detail = EventDetail::HashChange(HashChangeData { old_url, new_url });
                self.dispatch_trusted(
                    EventTarget::Window(context),
                    EventInit::for_type("hashchange").detail(detail),
                )?;
            }
        }
        Ok(())
    }

    fn context_origin(&self, context: ContextId) -> Result<Origin> {
        let document = self.current_document(context)?;
        self.documents
            .get(document)
            .map(|doc| doc.origin().clone())
            .ok_or(Error::UnknownDocument(document))
    }
}
