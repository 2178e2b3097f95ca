//! The repeating component.
//!
//! [`DynamicData`] owns the row binding, the per-row checkpoint store and
//! the counter for generated descendant ids. Row switching itself is driven
//! by [`Lifecycle`](crate::Lifecycle) because it needs the whole tree.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::checkpoint::CheckpointStore;
use crate::request::RequestContext;
use crate::row::{KeyedItem, RowSource};
use crate::tree::{Component, UniqueIdVendor};
use crate::{NodeId, TreeError, UNIQUE_ID_PREFIX};

type Decoder = Box<dyn FnMut(NodeId, &str, &mut RequestContext) -> Result<(), TreeError>>;

pub struct DynamicData {
    source: Box<dyn RowSource>,
    var: Option<String>,
    var_container_id: Option<String>,
    row: Option<KeyedItem>,
    saved: CheckpointStore,
    last_id: u64,
    decoder: Option<Decoder>,
}

/// State of a [`DynamicData`] node that outlives one request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DynamicDataState {
    pub id: Option<String>,
    pub saved: CheckpointStore,
    pub last_id: u64,
    pub var: Option<String>,
    pub var_container_id: Option<String>,
}

impl DynamicData {
    pub fn new(source: impl RowSource + 'static) -> Self {
        Self {
            source: Box::new(source),
            var: None,
            var_container_id: None,
            row: None,
            saved: CheckpointStore::new(),
            last_id: 0,
            decoder: None,
        }
    }

    /// Request variable that receives the bound row's value.
    pub fn with_var(mut self, var: impl Into<String>) -> Self {
        self.var = Some(var.into());
        self
    }

    /// Request variable that receives the container client id.
    pub fn with_var_container_id(mut self, name: impl Into<String>) -> Self {
        self.var_container_id = Some(name.into());
        self
    }

    /// Installs the node's own decode step, run after its rows were decoded.
    pub fn with_decoder(
        mut self,
        decoder: impl FnMut(NodeId, &str, &mut RequestContext) -> Result<(), TreeError> + 'static,
    ) -> Self {
        self.decoder = Some(Box::new(decoder));
        self
    }

    pub fn var(&self) -> Option<&str> {
        self.var.as_deref()
    }

    pub fn set_var(&mut self, var: Option<String>) {
        self.var = var;
    }

    pub fn var_container_id(&self) -> Option<&str> {
        self.var_container_id.as_deref()
    }

    pub fn set_var_container_id(&mut self, name: Option<String>) {
        self.var_container_id = name;
    }

    pub fn row(&self) -> Option<&KeyedItem> {
        self.row.as_ref()
    }

    pub(crate) fn set_row(&mut self, row: Option<KeyedItem>) {
        self.row = row;
    }

    pub fn source(&self) -> &dyn RowSource {
        self.source.as_ref()
    }

    pub fn set_source(&mut self, source: impl RowSource + 'static) {
        self.source = Box::new(source);
    }

    pub fn store(&self) -> &CheckpointStore {
        &self.saved
    }

    pub(crate) fn store_mut(&mut self) -> &mut CheckpointStore {
        &mut self.saved
    }

    pub fn last_id(&self) -> u64 {
        self.last_id
    }

    pub(crate) fn export_state(&self, id: Option<String>) -> DynamicDataState {
        DynamicDataState {
            id,
            saved: self.saved.clone(),
            last_id: self.last_id,
            var: self.var.clone(),
            var_container_id: self.var_container_id.clone(),
        }
    }

    /// Replaces the durable state and returns the id to assign to the node.
    /// The row binding is transient and starts out empty.
    pub(crate) fn import_state(&mut self, state: DynamicDataState) -> Option<String> {
        self.saved = state.saved;
        self.last_id = state.last_id;
        self.var = state.var;
        self.var_container_id = state.var_container_id;
        self.row = None;
        state.id
    }
}

impl fmt::Debug for DynamicData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DynamicData")
            .field("var", &self.var)
            .field("var_container_id", &self.var_container_id)
            .field("row", &self.row)
            .field("saved", &self.saved)
            .field("last_id", &self.last_id)
            .finish()
    }
}

impl UniqueIdVendor for DynamicData {
    fn create_unique_id(&mut self, seed: Option<&str>) -> String {
        self.last_id += 1;
        match seed {
            Some(seed) => format!("{UNIQUE_ID_PREFIX}{seed}"),
            None => format!("{UNIQUE_ID_PREFIX}{}", self.last_id),
        }
    }
}

impl Component for DynamicData {
    fn id_vendor(&mut self) -> Option<&mut dyn UniqueIdVendor> {
        Some(self)
    }

    fn is_naming_scope(&self) -> bool {
        true
    }

    fn row_key(&self) -> Option<&str> {
        self.row.as_ref().map(KeyedItem::key)
    }

    fn decode(
        &mut self,
        node: NodeId,
        client_id: &str,
        request: &mut RequestContext,
    ) -> Result<(), TreeError> {
        match self.decoder.as_mut() {
            Some(decoder) => decoder(node, client_id, request),
            None => Ok(()),
        }
    }
}
