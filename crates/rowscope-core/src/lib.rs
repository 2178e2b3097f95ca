#![doc = r"Row-context switching and per-row field state for repeating component trees."]

pub mod checkpoint;
pub mod collections;
pub mod components;
pub mod dynamic;
pub mod error;
pub mod event;
pub mod lifecycle;
pub mod request;
pub mod row;
pub mod traversal;
pub mod tree;

pub use checkpoint::{CheckpointStore, FieldStateSnapshot};
pub use components::{Command, Container, InputField};
pub use dynamic::{DynamicData, DynamicDataState};
pub use error::TreeError;
pub use event::{ComponentEvent, QueuedEvent, RowEvent};
pub use lifecycle::{ContextGuard, Lifecycle, RowGuard};
pub use request::{Message, RequestContext, Severity, SystemEvent};
pub use row::{KeyedItem, RowSource, VecSource};
pub use traversal::{InvokeCallback, VisitCallback, VisitContext, VisitResult};
pub use tree::{AsAny, Component, ComponentTree, EditableValue, UniqueIdVendor};

/// Opaque datum carried by rows, fields and events.
pub use serde_json::Value;

use serde::{Deserialize, Serialize};
use std::fmt;

pub type NodeId = usize;

pub const DEFAULT_SEPARATOR: char = ':';
pub const UNIQUE_ID_PREFIX: &str = "j_id";

/// Steps of one request lifecycle. Only the three input-processing phases
/// can be driven through [`Lifecycle::process`].
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Phase {
    RestoreState,
    ApplyInput,
    Validate,
    UpdateModel,
    InvokeApplication,
    Render,
}

impl Phase {
    #[inline]
    pub fn is_processable(self) -> bool {
        matches!(self, Phase::ApplyInput | Phase::Validate | Phase::UpdateModel)
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::RestoreState => "restore-state",
            Phase::ApplyInput => "apply-input",
            Phase::Validate => "validate",
            Phase::UpdateModel => "update-model",
            Phase::InvokeApplication => "invoke-application",
            Phase::Render => "render",
        };
        f.write_str(name)
    }
}
