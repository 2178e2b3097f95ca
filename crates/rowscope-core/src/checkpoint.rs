//! Per-row field state checkpoints.
//!
//! A template field exists once in the tree but represents one input per row.
//! Its editable state is copied into a [`FieldStateSnapshot`] whenever the
//! owning node leaves a row and copied back when the node enters that row
//! again. Snapshots are keyed by the field's client id, which already embeds
//! the row key, so the store partitions by row without tracking rows itself.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::tree::EditableValue;
use crate::Value;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldStateSnapshot {
    pub value: Option<Value>,
    pub submitted_value: Option<Value>,
    pub valid: bool,
    pub local_value_set: bool,
    pub label: Option<Value>,
}

impl Default for FieldStateSnapshot {
    fn default() -> Self {
        Self {
            value: None,
            submitted_value: None,
            valid: true,
            local_value_set: false,
            label: None,
        }
    }
}

impl FieldStateSnapshot {
    pub fn capture(field: &dyn EditableValue, label: Option<Value>) -> Self {
        Self {
            value: field.local_value().cloned(),
            submitted_value: field.submitted_value().cloned(),
            valid: field.is_valid(),
            local_value_set: field.is_local_value_set(),
            label,
        }
    }

    /// Writes the editable part back onto `field`. The label lives in the
    /// node's attributes and is applied by the caller.
    pub fn apply_to(&self, field: &mut dyn EditableValue) {
        field.set_value(self.value.clone());
        field.set_valid(self.valid);
        field.set_submitted_value(self.submitted_value.clone());
        field.set_local_value_set(self.local_value_set);
    }
}

/// Snapshots owned by one dynamic-data node, keyed by field client id.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CheckpointStore {
    entries: IndexMap<String, FieldStateSnapshot>,
}

impl CheckpointStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, client_id: &str) -> Option<&FieldStateSnapshot> {
        self.entries.get(client_id)
    }

    /// Overwrites whatever was recorded for `client_id`.
    pub fn save(&mut self, client_id: String, snapshot: FieldStateSnapshot) {
        self.entries.insert(client_id, snapshot);
    }

    /// Marks every recorded field valid again. Values, submitted values and
    /// labels are kept.
    pub fn reset_validity(&mut self) {
        for snapshot in self.entries.values_mut() {
            snapshot.valid = true;
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FieldStateSnapshot)> {
        self.entries
            .iter()
            .map(|(client_id, snapshot)| (client_id.as_str(), snapshot))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[derive(Default)]
    struct Field {
        value: Option<Value>,
        submitted: Option<Value>,
        valid: bool,
        local_value_set: bool,
    }

    impl EditableValue for Field {
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

    #[test]
    fn capture_then_apply_reproduces_field() {
        let field = Field {
            value: Some(json!("X")),
            submitted: Some(json!("raw")),
            valid: false,
            local_value_set: true,
        };
        let snapshot = FieldStateSnapshot::capture(&field, Some(json!("Name")));
        assert_eq!(snapshot.label, Some(json!("Name")));

        let mut target = Field::default();
        snapshot.apply_to(&mut target);
        assert_eq!(target.value, Some(json!("X")));
        assert_eq!(target.submitted, Some(json!("raw")));
        assert!(!target.valid);
        assert!(target.local_value_set);
    }

    #[test]
    fn default_snapshot_is_clean() {
        let snapshot = FieldStateSnapshot::default();
        assert!(snapshot.valid);
        assert!(!snapshot.local_value_set);
        assert!(snapshot.value.is_none() && snapshot.submitted_value.is_none());
    }

    #[test]
    fn reset_validity_keeps_other_fields() {
        let mut store = CheckpointStore::new();
        let stale = FieldStateSnapshot {
            value: Some(json!(3)),
            submitted_value: Some(json!("3x")),
            valid: false,
            local_value_set: true,
            label: None,
        };
        store.save("form:t:b:qty".into(), stale.clone());
        store.reset_validity();

        let reset = store.get("form:t:b:qty").expect("snapshot kept");
        assert!(reset.valid);
        assert_eq!(reset.value, stale.value);
        assert_eq!(reset.submitted_value, stale.submitted_value);
        assert!(reset.local_value_set);
    }

    #[test]
    fn save_overwrites_previous_snapshot() {
        let mut store = CheckpointStore::new();
        store.save("t:a:f".into(), FieldStateSnapshot::default());
        let updated = FieldStateSnapshot {
            value: Some(json!("new")),
            ..FieldStateSnapshot::default()
        };
        store.save("t:a:f".into(), updated.clone());
        assert_eq!(store.len(), 1);
        assert_eq!(store.get("t:a:f"), Some(&updated));
    }
}
