//! Standard components: a plain container, an editable input field and a
//! command that raises an action event when submitted.

use std::fmt;

use crate::event::ComponentEvent;
use crate::request::{RequestContext, Severity};
use crate::tree::{Component, EditableValue};
use crate::{NodeId, Phase, TreeError, Value};

pub const ACTION_EVENT: &str = "action";
pub const VALUE_CHANGE_EVENT: &str = "valueChange";

type Listener = Box<dyn FnMut(&ComponentEvent, &mut RequestContext) -> Result<(), TreeError>>;
type ModelUpdate = Box<dyn FnMut(&Value, &mut RequestContext) -> Result<(), String>>;
type Validator = Box<dyn Fn(&Value) -> Result<(), String>>;

#[derive(Debug, Default, Clone, Copy)]
pub struct Container {
    naming_scope: bool,
    composite: bool,
}

impl Container {
    pub fn new() -> Self {
        Self::default()
    }

    /// A container that prefixes descendant client ids, like a form.
    pub fn naming_scope() -> Self {
        Self {
            naming_scope: true,
            composite: false,
        }
    }

    pub fn composite() -> Self {
        Self {
            naming_scope: false,
            composite: true,
        }
    }
}

impl Component for Container {
    fn kind(&self) -> &'static str {
        "Container"
    }

    fn is_naming_scope(&self) -> bool {
        self.naming_scope
    }

    fn is_composite(&self) -> bool {
        self.composite
    }
}

/// Text-like input. Decodes the submitted parameter, validates it into a
/// local value and pushes that value to the model.
pub struct InputField {
    value: Option<Value>,
    submitted: Option<Value>,
    valid: bool,
    local_value_set: bool,
    required: bool,
    validator: Option<Validator>,
    on_update: Option<ModelUpdate>,
    on_change: Option<Listener>,
}

impl Default for InputField {
    fn default() -> Self {
        Self::new()
    }
}

impl InputField {
    pub fn new() -> Self {
        Self {
            value: None,
            submitted: None,
            valid: true,
            local_value_set: false,
            required: false,
            validator: None,
            on_update: None,
            on_change: None,
        }
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn with_validator(
        mut self,
        validator: impl Fn(&Value) -> Result<(), String> + 'static,
    ) -> Self {
        self.validator = Some(Box::new(validator));
        self
    }

    /// Receives the converted value during the update-model phase.
    pub fn on_update(
        mut self,
        update: impl FnMut(&Value, &mut RequestContext) -> Result<(), String> + 'static,
    ) -> Self {
        self.on_update = Some(Box::new(update));
        self
    }

    /// Receives value-change events, broadcast after validation.
    pub fn on_change(
        mut self,
        listener: impl FnMut(&ComponentEvent, &mut RequestContext) -> Result<(), TreeError>
            + 'static,
    ) -> Self {
        self.on_change = Some(Box::new(listener));
        self
    }

    fn is_empty(value: &Value) -> bool {
        match value {
            Value::Null => true,
            Value::String(text) => text.is_empty(),
            _ => false,
        }
    }

    fn reject(&mut self, client_id: &str, request: &mut RequestContext, summary: String) {
        log::debug!("{client_id}: {summary}");
        self.valid = false;
        request.add_message(Some(client_id), Severity::Error, summary);
    }
}

impl fmt::Debug for InputField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InputField")
            .field("value", &self.value)
            .field("submitted", &self.submitted)
            .field("valid", &self.valid)
            .field("local_value_set", &self.local_value_set)
            .field("required", &self.required)
            .finish_non_exhaustive()
    }
}

impl EditableValue for InputField {
    fn local_value(&self) -> Option<&Value> {
        self.value.as_ref()
    }

    fn set_value(&mut self, value: Option<Value>) {
        self.value = value;
    }

    fn submitted_value(&self) -> Option<&Value> {
        self.submitted.as_ref()
    }

    fn set_submitted_value(&mut self, value: Option<Value>) {
        self.submitted = value;
    }

    fn is_valid(&self) -> bool {
        self.valid
    }

    fn set_valid(&mut self, valid: bool) {
        self.valid = valid;
    }

    fn is_local_value_set(&self) -> bool {
        self.local_value_set
    }

    fn set_local_value_set(&mut self, set: bool) {
        self.local_value_set = set;
    }
}

impl Component for InputField {
    fn kind(&self) -> &'static str {
        "InputField"
    }

    fn editable(&self) -> Option<&dyn EditableValue> {
        Some(self)
    }

    fn editable_mut(&mut self) -> Option<&mut dyn EditableValue> {
        Some(self)
    }

    fn decode(
        &mut self,
        node: NodeId,
        client_id: &str,
        request: &mut RequestContext,
    ) -> Result<(), TreeError> {
        let Some(param) = request.param(client_id) else {
            return Ok(());
        };
        if param.is_object() || param.is_array() {
            return Err(TreeError::InputDecode {
                node,
                message: format!("{client_id} expects a scalar value"),
            });
        }
        self.submitted = Some(param.clone());
        Ok(())
    }

    fn validate(
        &mut self,
        node: NodeId,
        client_id: &str,
        request: &mut RequestContext,
    ) -> Result<(), TreeError> {
        let Some(submitted) = self.submitted.clone() else {
            return Ok(());
        };

        if self.required && Self::is_empty(&submitted) {
            self.reject(client_id, request, "value is required".to_owned());
            return Ok(());
        }
        if let Some(validator) = &self.validator {
            if let Err(summary) = validator(&submitted) {
                self.reject(client_id, request, summary);
                return Ok(());
            }
        }

        let previous = self.value.replace(submitted.clone());
        self.submitted = None;
        self.local_value_set = true;
        self.valid = true;

        if previous.as_ref() != Some(&submitted) {
            let payload = serde_json::json!({ "old": previous, "new": submitted });
            request.emit(
                ComponentEvent::new(node, VALUE_CHANGE_EVENT)
                    .with_phase(Phase::Validate)
                    .with_payload(payload),
            );
        }
        Ok(())
    }

    fn update_model(
        &mut self,
        _node: NodeId,
        client_id: &str,
        request: &mut RequestContext,
    ) -> Result<(), TreeError> {
        if !self.valid || !self.local_value_set {
            return Ok(());
        }
        let Some(value) = self.value.clone() else {
            return Ok(());
        };

        if let Some(update) = self.on_update.as_mut() {
            if let Err(summary) = update(&value, request) {
                self.reject(client_id, request, summary);
                return Ok(());
            }
        }
        self.value = None;
        self.local_value_set = false;
        Ok(())
    }

    fn broadcast(
        &mut self,
        event: &ComponentEvent,
        request: &mut RequestContext,
    ) -> Result<(), TreeError> {
        match self.on_change.as_mut() {
            Some(listener) if event.name == VALUE_CHANGE_EVENT => listener(event, request),
            _ => Ok(()),
        }
    }
}

/// Button-like component. Submitting its client id as a parameter raises
/// an action event.
pub struct Command {
    immediate: bool,
    listener: Option<Listener>,
}

impl Default for Command {
    fn default() -> Self {
        Self::new()
    }
}

impl Command {
    pub fn new() -> Self {
        Self {
            immediate: false,
            listener: None,
        }
    }

    /// Delivers the action right after apply-input instead of at invoke
    /// application.
    pub fn immediate(mut self) -> Self {
        self.immediate = true;
        self
    }

    pub fn on_action(
        mut self,
        listener: impl FnMut(&ComponentEvent, &mut RequestContext) -> Result<(), TreeError>
            + 'static,
    ) -> Self {
        self.listener = Some(Box::new(listener));
        self
    }
}

impl fmt::Debug for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Command")
            .field("immediate", &self.immediate)
            .field("listener", &self.listener.is_some())
            .finish()
    }
}

impl Component for Command {
    fn kind(&self) -> &'static str {
        "Command"
    }

    fn decode(
        &mut self,
        node: NodeId,
        client_id: &str,
        request: &mut RequestContext,
    ) -> Result<(), TreeError> {
        if request.param(client_id).is_none() {
            return Ok(());
        }
        let phase = if self.immediate {
            Phase::ApplyInput
        } else {
            Phase::InvokeApplication
        };
        request.emit(ComponentEvent::new(node, ACTION_EVENT).with_phase(phase));
        Ok(())
    }

    fn broadcast(
        &mut self,
        event: &ComponentEvent,
        request: &mut RequestContext,
    ) -> Result<(), TreeError> {
        match self.listener.as_mut() {
            Some(listener) if event.name == ACTION_EVENT => listener(event, request),
            _ => Ok(()),
        }
    }
}
