//! Request-scoped state shared by every node during one pass.

use crate::collections::ValueMap;
use crate::event::{ComponentEvent, QueuedEvent};
use crate::{NodeId, Phase, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Severity {
    Info,
    Warn,
    Error,
    Fatal,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    pub client_id: Option<String>,
    pub severity: Severity,
    pub summary: String,
}

/// Notifications published around a dynamic-data node's validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SystemEvent {
    PreValidate(NodeId),
    PostValidate(NodeId),
}

/// Submitted parameters, exposed variables, messages and event queues of
/// one request.
#[derive(Debug, Default)]
pub struct RequestContext {
    params: ValueMap,
    vars: ValueMap,
    messages: Vec<Message>,
    render_response: bool,
    component_stack: Vec<NodeId>,
    system_events: Vec<SystemEvent>,
    emitted: Vec<ComponentEvent>,
    queue: Vec<QueuedEvent>,
}

impl RequestContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_param(mut self, name: impl Into<String>, value: Value) -> Self {
        self.set_param(name, value);
        self
    }

    pub fn set_param(&mut self, name: impl Into<String>, value: Value) {
        self.params.insert(name.into(), value);
    }

    /// Raw value submitted under `client_id`.
    pub fn param(&self, client_id: &str) -> Option<&Value> {
        self.params.get(client_id)
    }

    pub fn var(&self, name: &str) -> Option<&Value> {
        self.vars.get(name)
    }

    pub fn set_var(&mut self, name: impl Into<String>, value: Value) {
        self.vars.insert(name.into(), value);
    }

    pub fn remove_var(&mut self, name: &str) -> Option<Value> {
        self.vars.remove(name)
    }

    pub fn add_message(
        &mut self,
        client_id: Option<&str>,
        severity: Severity,
        summary: impl Into<String>,
    ) {
        self.messages.push(Message {
            client_id: client_id.map(str::to_owned),
            severity,
            summary: summary.into(),
        });
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn maximum_severity(&self) -> Option<Severity> {
        self.messages.iter().map(|message| message.severity).max()
    }

    /// True once a message of severity [`Severity::Error`] or worse exists.
    pub fn has_errors(&self) -> bool {
        self.maximum_severity()
            .is_some_and(|severity| severity >= Severity::Error)
    }

    /// Skips the remaining input phases and goes straight to rendering.
    pub fn render_response(&mut self) {
        self.render_response = true;
    }

    pub fn is_render_response(&self) -> bool {
        self.render_response
    }

    pub fn push_component(&mut self, node: NodeId) {
        self.component_stack.push(node);
    }

    pub fn pop_component(&mut self) -> Option<NodeId> {
        self.component_stack.pop()
    }

    pub fn current_component(&self) -> Option<NodeId> {
        self.component_stack.last().copied()
    }

    pub fn component_stack(&self) -> &[NodeId] {
        &self.component_stack
    }

    pub fn publish(&mut self, event: SystemEvent) {
        self.system_events.push(event);
    }

    pub fn system_events(&self) -> &[SystemEvent] {
        &self.system_events
    }

    /// Records an event raised by a component while it runs a phase. The
    /// lifecycle queues it as soon as the component returns.
    pub fn emit(&mut self, event: ComponentEvent) {
        self.emitted.push(event);
    }

    pub(crate) fn take_emitted(&mut self) -> Vec<ComponentEvent> {
        std::mem::take(&mut self.emitted)
    }

    pub fn enqueue(&mut self, event: QueuedEvent) {
        self.queue.push(event);
    }

    pub fn queued(&self) -> &[QueuedEvent] {
        &self.queue
    }

    /// Removes and returns the queued events targeted at `phase`, keeping
    /// queue order. Events for other phases stay queued.
    pub fn take_events(&mut self, phase: Phase) -> Vec<QueuedEvent> {
        let (matching, rest): (Vec<_>, Vec<_>) = std::mem::take(&mut self.queue)
            .into_iter()
            .partition(|event| event.phase() == phase);
        self.queue = rest;
        matching
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn errors_start_at_error_severity() {
        let mut request = RequestContext::new();
        assert!(!request.has_errors());
        request.add_message(None, Severity::Warn, "careful");
        assert!(!request.has_errors());
        request.add_message(Some("form:name"), Severity::Error, "required");
        assert!(request.has_errors());
        assert_eq!(request.maximum_severity(), Some(Severity::Error));
        assert_eq!(request.messages()[1].client_id.as_deref(), Some("form:name"));
    }

    #[test]
    fn vars_can_be_set_and_removed() {
        let mut request = RequestContext::new().with_param("t:a:name", json!("X"));
        request.set_var("row", json!({"id": 1}));
        assert_eq!(request.var("row"), Some(&json!({"id": 1})));
        assert_eq!(request.remove_var("row"), Some(json!({"id": 1})));
        assert!(request.var("row").is_none());
        assert_eq!(request.param("t:a:name"), Some(&json!("X")));
    }

    #[test]
    fn take_events_filters_by_phase() {
        let mut request = RequestContext::new();
        request.enqueue(QueuedEvent::Component(ComponentEvent::new(1, "a")));
        request.enqueue(QueuedEvent::Component(
            ComponentEvent::new(2, "b").with_phase(Phase::ApplyInput),
        ));
        request.enqueue(QueuedEvent::Component(ComponentEvent::new(3, "c")));

        let invoke = request.take_events(Phase::InvokeApplication);
        let sources: Vec<_> = invoke.iter().map(QueuedEvent::source).collect();
        assert_eq!(sources, vec![1, 3]);
        assert_eq!(request.queued().len(), 1);
    }

    #[test]
    fn component_stack_is_lifo() {
        let mut request = RequestContext::new();
        request.push_component(4);
        request.push_component(9);
        assert_eq!(request.current_component(), Some(9));
        assert_eq!(request.pop_component(), Some(9));
        assert_eq!(request.component_stack(), &[4]);
    }
}
