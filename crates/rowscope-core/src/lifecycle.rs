//! Row context switching.
//!
//! [`Lifecycle`] pairs a component tree with the request being processed and
//! is the single entry point for every operation that has to see a
//! dynamic-data node bound to a particular row. Binding a row first copies
//! the editable state of the template sub-tree into the node's checkpoint
//! store under the outgoing row's client ids, then loads the incoming row's
//! snapshots back into the same template nodes.
//!
//! Bindings are scoped with [`RowGuard`]: whatever row was bound before a
//! traversal is bound again when the guard is released or dropped, including
//! on early returns and unwinding.

use std::ops::{Deref, DerefMut};

use crate::checkpoint::FieldStateSnapshot;
use crate::dynamic::{DynamicData, DynamicDataState};
use crate::request::RequestContext;
use crate::row::KeyedItem;
use crate::tree::{ComponentTree, UniqueIdVendor};
use crate::{NodeId, TreeError, Value};

const LABEL: &str = "label";

pub struct Lifecycle<'a> {
    pub(crate) tree: &'a mut ComponentTree,
    pub(crate) request: &'a mut RequestContext,
}

impl<'a> Lifecycle<'a> {
    pub fn new(tree: &'a mut ComponentTree, request: &'a mut RequestContext) -> Self {
        Self { tree, request }
    }

    pub fn tree(&self) -> &ComponentTree {
        self.tree
    }

    pub fn tree_mut(&mut self) -> &mut ComponentTree {
        self.tree
    }

    pub fn request(&self) -> &RequestContext {
        self.request
    }

    pub fn request_mut(&mut self) -> &mut RequestContext {
        self.request
    }

    pub fn client_id(&mut self, node: NodeId) -> Result<String, TreeError> {
        self.tree.client_id(node)
    }

    pub fn container_client_id(&mut self, node: NodeId) -> Result<String, TreeError> {
        self.tree.container_client_id(node)
    }

    pub(crate) fn dynamic(&self, node: NodeId) -> Result<&DynamicData, TreeError> {
        self.tree.component::<DynamicData>(node)
    }

    pub(crate) fn dynamic_mut(&mut self, node: NodeId) -> Result<&mut DynamicData, TreeError> {
        self.tree.component_mut::<DynamicData>(node)
    }

    pub fn current_row(&self, node: NodeId) -> Result<Option<KeyedItem>, TreeError> {
        Ok(self.dynamic(node)?.row().cloned())
    }

    pub fn lookup(&self, node: NodeId, key: &str) -> Result<Option<KeyedItem>, TreeError> {
        Ok(self.dynamic(node)?.source().lookup(key))
    }

    pub fn row_keys(&self, node: NodeId) -> Result<Vec<String>, TreeError> {
        Ok(self.dynamic(node)?.source().keys())
    }

    /// Switches `node` to `row`, checkpointing the outgoing row's fields and
    /// restoring the incoming row's.
    pub fn bind(&mut self, node: NodeId, row: Option<KeyedItem>) -> Result<(), TreeError> {
        if self.dynamic(node)?.row().is_some() {
            self.save_descendant_state(node)?;
        }

        log::trace!("node {node}: bind row {:?}", row.as_ref().map(KeyedItem::key));
        let bound = row.is_some();
        self.dynamic_mut(node)?.set_row(row);
        self.expose_vars(node)?;

        if bound {
            self.restore_descendant_state(node)
        } else {
            self.reset_descendant_ids(node)
        }
    }

    /// Binds the row stored under `key`. Unknown keys leave the node unbound.
    pub fn bind_key(&mut self, node: NodeId, key: &str) -> Result<(), TreeError> {
        let row = self.lookup(node, key)?;
        if row.is_none() {
            log::debug!("node {node}: no row for key {key:?}");
        }
        self.bind(node, row)
    }

    pub fn unbind(&mut self, node: NodeId) -> Result<(), TreeError> {
        self.bind(node, None)
    }

    /// Runs `body` with `row` bound and rebinds the previous row afterwards,
    /// whether or not `body` succeeded.
    pub fn with_row<R>(
        &mut self,
        node: NodeId,
        row: Option<KeyedItem>,
        body: impl FnOnce(&mut Lifecycle<'a>) -> Result<R, TreeError>,
    ) -> Result<R, TreeError> {
        let mut guard = RowGuard::enter(self, node, row)?;
        let result = body(&mut *guard);
        let restored = guard.release();
        settle(result, restored)
    }

    pub fn create_unique_id(
        &mut self,
        node: NodeId,
        seed: Option<&str>,
    ) -> Result<String, TreeError> {
        Ok(self.dynamic_mut(node)?.create_unique_id(seed))
    }

    pub fn save_state(&self, node: NodeId) -> Result<DynamicDataState, TreeError> {
        let id = self.tree.id(node)?.map(str::to_owned);
        Ok(self.dynamic(node)?.export_state(id))
    }

    pub fn restore_state(
        &mut self,
        node: NodeId,
        state: DynamicDataState,
    ) -> Result<(), TreeError> {
        let id = self.dynamic_mut(node)?.import_state(state);
        self.tree.set_id(node, id)?;
        self.reset_descendant_ids(node)
    }

    fn save_descendant_state(&mut self, node: NodeId) -> Result<(), TreeError> {
        for child in self.tree.children(node)? {
            self.save_subtree(node, child)?;
        }
        Ok(())
    }

    fn save_subtree(&mut self, owner: NodeId, node: NodeId) -> Result<(), TreeError> {
        self.tree.reset_client_id(node)?;

        let label = self.tree.attribute(node, LABEL)?.cloned();
        let captured = self
            .tree
            .component_dyn(node)?
            .editable()
            .map(|field| FieldStateSnapshot::capture(field, label));
        if let Some(snapshot) = captured {
            let client_id = self.tree.client_id(node)?;
            self.dynamic_mut(owner)?.store_mut().save(client_id, snapshot);
        }

        for child in self.tree.children(node)? {
            self.save_subtree(owner, child)?;
        }
        for facet in self.tree.facets(node)? {
            self.save_subtree(owner, facet)?;
        }
        Ok(())
    }

    fn restore_descendant_state(&mut self, node: NodeId) -> Result<(), TreeError> {
        for child in self.tree.children(node)? {
            self.restore_subtree(node, child)?;
        }
        Ok(())
    }

    fn restore_subtree(&mut self, owner: NodeId, node: NodeId) -> Result<(), TreeError> {
        self.tree.reset_client_id(node)?;

        // Nothing recorded yet: the template keeps whatever it holds.
        let editable = self.tree.component_dyn(node)?.editable().is_some();
        if editable && !self.dynamic(owner)?.store().is_empty() {
            let client_id = self.tree.client_id(node)?;
            let snapshot = self
                .dynamic(owner)?
                .store()
                .get(&client_id)
                .cloned()
                .unwrap_or_default();
            if let Some(field) = self.tree.component_dyn_mut(node)?.editable_mut() {
                snapshot.apply_to(field);
            }
            if let Some(label) = snapshot.label {
                self.tree.set_attribute(node, LABEL, label)?;
            }
        }

        for child in self.tree.children(node)? {
            self.restore_subtree(owner, child)?;
        }
        for facet in self.tree.facets(node)? {
            self.restore_subtree(owner, facet)?;
        }
        Ok(())
    }

    fn reset_descendant_ids(&mut self, node: NodeId) -> Result<(), TreeError> {
        for child in self.tree.children(node)? {
            self.reset_subtree_ids(child)?;
        }
        Ok(())
    }

    fn reset_subtree_ids(&mut self, node: NodeId) -> Result<(), TreeError> {
        self.tree.reset_client_id(node)?;
        for child in self.tree.children(node)? {
            self.reset_subtree_ids(child)?;
        }
        for facet in self.tree.facets(node)? {
            self.reset_subtree_ids(facet)?;
        }
        Ok(())
    }

    fn expose_vars(&mut self, node: NodeId) -> Result<(), TreeError> {
        let data = self.dynamic(node)?;
        let var = data.var().map(str::to_owned);
        let var_container_id = data.var_container_id().map(str::to_owned);
        let value = data.row().map(|row| row.value().clone());

        if let Some(var) = var {
            match value {
                Some(value) => self.request.set_var(var, value),
                None => {
                    self.request.remove_var(&var);
                }
            }
        }

        if let Some(name) = var_container_id {
            let container_id = self.tree.container_client_id(node)?;
            self.request.set_var(name, Value::String(container_id));
        }
        Ok(())
    }
}

/// Combines a traversal result with the outcome of restoring the row that
/// was bound before it. The traversal's own error takes precedence.
pub(crate) fn settle<T>(
    result: Result<T, TreeError>,
    restored: Result<(), TreeError>,
) -> Result<T, TreeError> {
    match (result, restored) {
        (Ok(value), Ok(())) => Ok(value),
        (Ok(_), Err(err)) | (Err(err), Ok(())) => Err(err),
        (Err(err), Err(restore_err)) => {
            log::warn!("row restore failed while propagating {err}: {restore_err}");
            Err(err)
        }
    }
}

/// Keeps a row bound for the lifetime of the guard.
pub struct RowGuard<'s, 'a> {
    lifecycle: &'s mut Lifecycle<'a>,
    node: NodeId,
    previous: Option<Option<KeyedItem>>,
}

impl<'s, 'a> RowGuard<'s, 'a> {
    pub fn enter(
        lifecycle: &'s mut Lifecycle<'a>,
        node: NodeId,
        row: Option<KeyedItem>,
    ) -> Result<Self, TreeError> {
        let previous = lifecycle.current_row(node)?;
        let mut guard = Self {
            lifecycle,
            node,
            previous: Some(previous),
        };
        guard.lifecycle.bind(node, row)?;
        Ok(guard)
    }

    /// Rebinds the previous row and reports whether that worked.
    pub fn release(mut self) -> Result<(), TreeError> {
        match self.previous.take() {
            Some(previous) => self.lifecycle.bind(self.node, previous),
            None => Ok(()),
        }
    }
}

impl<'s, 'a> Deref for RowGuard<'s, 'a> {
    type Target = Lifecycle<'a>;

    fn deref(&self) -> &Lifecycle<'a> {
        &*self.lifecycle
    }
}

impl<'s, 'a> DerefMut for RowGuard<'s, 'a> {
    fn deref_mut(&mut self) -> &mut Lifecycle<'a> {
        &mut *self.lifecycle
    }
}

impl Drop for RowGuard<'_, '_> {
    fn drop(&mut self) {
        if let Some(previous) = self.previous.take() {
            if let Err(err) = self.lifecycle.bind(self.node, previous) {
                log::warn!("node {}: failed to restore row: {err}", self.node);
            }
        }
    }
}

/// Keeps nodes pushed on the request's component stack for the lifetime of
/// the guard; pops them in reverse order on drop.
pub struct ContextGuard<'s, 'a> {
    lifecycle: &'s mut Lifecycle<'a>,
    pushed: usize,
}

impl<'s, 'a> ContextGuard<'s, 'a> {
    pub fn new(lifecycle: &'s mut Lifecycle<'a>) -> Self {
        Self {
            lifecycle,
            pushed: 0,
        }
    }

    pub fn enter(lifecycle: &'s mut Lifecycle<'a>, node: NodeId) -> Self {
        let mut guard = Self::new(lifecycle);
        guard.push(node);
        guard
    }

    pub fn push(&mut self, node: NodeId) {
        self.lifecycle.request.push_component(node);
        self.pushed += 1;
    }
}

impl<'s, 'a> Deref for ContextGuard<'s, 'a> {
    type Target = Lifecycle<'a>;

    fn deref(&self) -> &Lifecycle<'a> {
        &*self.lifecycle
    }
}

impl<'s, 'a> DerefMut for ContextGuard<'s, 'a> {
    fn deref_mut(&mut self) -> &mut Lifecycle<'a> {
        &mut *self.lifecycle
    }
}

impl Drop for ContextGuard<'_, '_> {
    fn drop(&mut self) {
        for _ in 0..self.pushed {
            self.lifecycle.request.pop_component();
        }
    }
}

#[cfg(test)]
#[path = "tests/lifecycle_tests.rs"]
mod tests;
