//! Events and row-aware event relay.
//!
//! An event raised inside a repeated template is meaningless without the
//! row it was raised for. When queued, every dynamic-data ancestor of the
//! source wraps it in a [`RowEvent`] carrying the row bound at that moment;
//! dispatch re-binds that row before the original event is delivered.

use crate::dynamic::DynamicData;
use crate::lifecycle::{settle, ContextGuard, Lifecycle, RowGuard};
use crate::row::KeyedItem;
use crate::{NodeId, Phase, TreeError, Value};

#[derive(Debug, Clone, PartialEq)]
pub struct ComponentEvent {
    pub source: NodeId,
    pub name: String,
    pub payload: Value,
    pub phase: Phase,
}

impl ComponentEvent {
    /// Event delivered during [`Phase::InvokeApplication`] with no payload.
    pub fn new(source: NodeId, name: impl Into<String>) -> Self {
        Self {
            source,
            name: name.into(),
            payload: Value::Null,
            phase: Phase::InvokeApplication,
        }
    }

    pub fn with_payload(mut self, payload: Value) -> Self {
        self.payload = payload;
        self
    }

    pub fn with_phase(mut self, phase: Phase) -> Self {
        self.phase = phase;
        self
    }
}

/// Envelope pairing an event with the row its dynamic-data node had bound
/// when the event was queued.
#[derive(Debug, Clone, PartialEq)]
pub struct RowEvent {
    pub source: NodeId,
    pub original: Box<QueuedEvent>,
    pub row: Option<KeyedItem>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum QueuedEvent {
    Component(ComponentEvent),
    Row(RowEvent),
}

impl QueuedEvent {
    pub fn source(&self) -> NodeId {
        match self {
            QueuedEvent::Component(event) => event.source,
            QueuedEvent::Row(envelope) => envelope.source,
        }
    }

    /// The component event at the centre of any envelopes.
    pub fn origin(&self) -> &ComponentEvent {
        let mut current = self;
        loop {
            match current {
                QueuedEvent::Component(event) => return event,
                QueuedEvent::Row(envelope) => current = &envelope.original,
            }
        }
    }

    pub fn phase(&self) -> Phase {
        self.origin().phase
    }
}

impl<'a> Lifecycle<'a> {
    /// Wraps `event` once per dynamic-data ancestor (innermost first) and
    /// queues the result on the request.
    pub fn queue_event(&mut self, event: ComponentEvent) -> Result<(), TreeError> {
        let mut cursor = Some(event.source);
        let mut queued = QueuedEvent::Component(event);
        while let Some(node) = cursor {
            if let Ok(data) = self.tree.component::<DynamicData>(node) {
                queued = QueuedEvent::Row(RowEvent {
                    source: node,
                    original: Box::new(queued),
                    row: data.row().cloned(),
                });
            }
            cursor = self.tree.parent(node)?;
        }

        log::debug!(
            "queued {:?} from node {} for {}",
            queued.origin().name,
            queued.origin().source,
            queued.phase()
        );
        self.request.enqueue(queued);
        Ok(())
    }

    /// Queues whatever components emitted on the request since the last call.
    pub(crate) fn flush_emitted(&mut self) -> Result<(), TreeError> {
        for event in self.request.take_emitted() {
            self.queue_event(event)?;
        }
        Ok(())
    }

    pub fn broadcast(&mut self, event: &QueuedEvent) -> Result<(), TreeError> {
        match event {
            QueuedEvent::Component(event) => {
                let request = &mut *self.request;
                self.tree
                    .component_dyn_mut(event.source)?
                    .broadcast(event, request)?;
                self.flush_emitted()
            }
            QueuedEvent::Row(envelope) => self.relay(envelope),
        }
    }

    fn relay(&mut self, envelope: &RowEvent) -> Result<(), TreeError> {
        let origin = envelope.original.source();
        log::debug!(
            "relaying event from node {origin} through node {} row {:?}",
            envelope.source,
            envelope.row.as_ref().map(KeyedItem::key)
        );

        let mut rows = RowGuard::enter(self, envelope.source, envelope.row.clone())?;
        let result = rows.broadcast_in_context(origin, &envelope.original);
        let restored = rows.release();
        settle(result, restored)
    }

    fn broadcast_in_context(
        &mut self,
        origin: NodeId,
        event: &QueuedEvent,
    ) -> Result<(), TreeError> {
        let composite = if self.tree.component_dyn(origin)?.is_composite() {
            None
        } else {
            self.tree.composite_parent(origin)?
        };

        let mut scope = ContextGuard::new(self);
        if let Some(parent) = composite {
            scope.push(parent);
        }
        scope.push(origin);
        scope.broadcast(event)
    }

    /// Dispatches, in queue order, the queued events targeted at `phase`,
    /// including any queued for `phase` by listeners along the way.
    /// Returns how many were delivered. On failure the undelivered events
    /// go back on the queue.
    pub fn broadcast_events(&mut self, phase: Phase) -> Result<usize, TreeError> {
        let mut delivered = 0;
        loop {
            let batch = self.request.take_events(phase);
            if batch.is_empty() {
                break;
            }
            let mut pending = batch.into_iter();
            while let Some(event) = pending.next() {
                if let Err(err) = self.broadcast(&event) {
                    for rest in pending {
                        self.request.enqueue(rest);
                    }
                    return Err(err);
                }
                delivered += 1;
            }
        }
        if delivered > 0 {
            log::debug!("{phase}: delivered {delivered} event(s)");
        }
        Ok(delivered)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn origin_unwraps_every_envelope() {
        let inner = ComponentEvent::new(5, "action").with_payload(json!(1));
        let wrapped = QueuedEvent::Row(RowEvent {
            source: 2,
            original: Box::new(QueuedEvent::Row(RowEvent {
                source: 4,
                original: Box::new(QueuedEvent::Component(inner.clone())),
                row: None,
            })),
            row: Some(KeyedItem::new("a", json!("A"))),
        });

        assert_eq!(wrapped.source(), 2);
        assert_eq!(wrapped.origin(), &inner);
        assert_eq!(wrapped.phase(), Phase::InvokeApplication);
    }

    #[test]
    fn builder_sets_phase_and_payload() {
        let event = ComponentEvent::new(1, "change")
            .with_phase(Phase::Validate)
            .with_payload(json!({"old": 1}));
        assert_eq!(event.phase, Phase::Validate);
        assert_eq!(event.payload["old"], json!(1));
    }
}
