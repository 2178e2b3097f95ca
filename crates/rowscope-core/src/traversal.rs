//! Phase processing, tree visits and targeted invocation.
//!
//! Every entry point that reaches into a dynamic-data node clears its row,
//! walks facets unbound, then binds each row in source order before walking
//! the template children. The row bound on entry is bound again on exit.

use crate::collections::ClientIdSet;
use crate::dynamic::DynamicData;
use crate::lifecycle::{settle, ContextGuard, Lifecycle, RowGuard};
use crate::request::SystemEvent;
use crate::{NodeId, Phase, TreeError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VisitResult {
    /// Continue into the node's descendants.
    Accept,
    /// Skip the node's descendants.
    Reject,
    /// Stop the whole visit.
    Complete,
}

pub type VisitCallback<'c> =
    dyn FnMut(&mut Lifecycle<'_>, NodeId) -> anyhow::Result<VisitResult> + 'c;

pub type InvokeCallback<'c> = dyn FnMut(&mut Lifecycle<'_>, NodeId) -> anyhow::Result<()> + 'c;

/// Which nodes a visit reaches.
#[derive(Debug, Clone, Default)]
pub struct VisitContext {
    pending: Option<ClientIdSet>,
    visited: usize,
}

impl VisitContext {
    /// Visits every rendered node.
    pub fn full() -> Self {
        Self::default()
    }

    /// Visits only the nodes with the given client ids and completes once
    /// all of them were seen.
    pub fn partial<I, S>(targets: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            pending: Some(targets.into_iter().map(Into::into).collect()),
            visited: 0,
        }
    }

    pub fn is_full(&self) -> bool {
        self.pending.is_none()
    }

    pub fn is_complete(&self) -> bool {
        self.pending.as_ref().is_some_and(|pending| pending.is_empty())
    }

    /// Number of callback invocations so far.
    pub fn visited(&self) -> usize {
        self.visited
    }

    pub fn pending(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self
            .pending
            .iter()
            .flatten()
            .map(String::as_str)
            .collect();
        ids.sort_unstable();
        ids
    }

    fn is_target(&self, client_id: &str) -> bool {
        match &self.pending {
            Some(pending) => pending.contains(client_id),
            None => true,
        }
    }

    fn mark_visited(&mut self, client_id: &str) {
        self.visited += 1;
        if let Some(pending) = self.pending.as_mut() {
            pending.remove(client_id);
        }
    }

    fn has_pending_with_prefix(&self, prefix: &str) -> bool {
        match &self.pending {
            Some(pending) => pending.iter().any(|id| id.starts_with(prefix)),
            None => true,
        }
    }
}

impl<'a> Lifecycle<'a> {
    /// Runs one input-processing phase over the subtree rooted at `node`.
    pub fn process(&mut self, node: NodeId, phase: Phase) -> Result<(), TreeError> {
        if !phase.is_processable() {
            return Err(TreeError::InvalidPhase(phase));
        }
        if !self.tree.is_rendered(node)? {
            return Ok(());
        }

        if self.tree.is::<DynamicData>(node) {
            self.process_dynamic(node, phase)
        } else {
            self.process_generic(node, phase)
        }
    }

    /// Drives a whole postback: the three input phases with their queued
    /// events, then the application events. Stops early once a phase asked
    /// for render-response.
    pub fn execute(&mut self, root: NodeId) -> Result<(), TreeError> {
        for phase in [Phase::ApplyInput, Phase::Validate, Phase::UpdateModel] {
            self.process(root, phase)?;
            self.broadcast_events(phase)?;
            if self.request.is_render_response() {
                log::debug!("{phase}: render response requested, skipping to render");
                return Ok(());
            }
        }
        self.broadcast_events(Phase::InvokeApplication)?;
        Ok(())
    }

    fn process_generic(&mut self, node: NodeId, phase: Phase) -> Result<(), TreeError> {
        let mut scope = ContextGuard::enter(self, node);
        for facet in scope.tree.facets(node)? {
            scope.process(facet, phase)?;
        }
        for child in scope.tree.children(node)? {
            scope.process(child, phase)?;
        }
        scope.run_phase(node, phase)
    }

    fn process_dynamic(&mut self, node: NodeId, phase: Phase) -> Result<(), TreeError> {
        log::debug!("{phase}: dynamic node {node}");
        let mut rows = RowGuard::enter(self, node, None)?;
        let result = rows.process_rows(node, phase);
        let restored = rows.release();
        settle(result, restored)
    }

    fn process_rows(&mut self, node: NodeId, phase: Phase) -> Result<(), TreeError> {
        let mut scope = ContextGuard::enter(self, node);

        match phase {
            Phase::ApplyInput if !scope.request.has_errors() => {
                scope.dynamic_mut(node)?.store_mut().reset_validity();
            }
            Phase::Validate => scope.request.publish(SystemEvent::PreValidate(node)),
            _ => {}
        }

        for facet in scope.tree.facets(node)? {
            scope.process(facet, phase)?;
        }

        for key in scope.row_keys(node)? {
            let Some(row) = scope.lookup(node, &key)? else {
                log::debug!("node {node}: skipping unresolved row {key:?}");
                continue;
            };
            scope.bind(node, Some(row))?;
            for child in scope.tree.children(node)? {
                scope.process(child, phase)?;
            }
        }

        match phase {
            Phase::ApplyInput => {
                scope.unbind(node)?;
                scope.run_phase(node, phase)
            }
            Phase::Validate => {
                scope.request.publish(SystemEvent::PostValidate(node));
                Ok(())
            }
            _ => Ok(()),
        }
    }

    /// Runs the component's own operation for `phase` and queues the events
    /// it emitted while its row is still bound.
    fn run_phase(&mut self, node: NodeId, phase: Phase) -> Result<(), TreeError> {
        let client_id = self.tree.client_id(node)?;
        let request = &mut *self.request;
        let component = self.tree.component_dyn_mut(node)?;
        let outcome = match phase {
            Phase::ApplyInput => component.decode(node, &client_id, request),
            Phase::Validate => component.validate(node, &client_id, request),
            Phase::UpdateModel => component.update_model(node, &client_id, request),
            other => Err(TreeError::InvalidPhase(other)),
        };
        let invalid = component.editable().is_some_and(|field| !field.is_valid());

        match phase {
            Phase::ApplyInput if outcome.is_err() => self.request.render_response(),
            Phase::Validate | Phase::UpdateModel if invalid => self.request.render_response(),
            _ => {}
        }

        self.flush_emitted()?;
        outcome
    }

    /// Visits the subtree rooted at `node`. Returns `true` once the visit
    /// completed and the caller should stop.
    pub fn visit_tree(
        &mut self,
        ctx: &mut VisitContext,
        node: NodeId,
        callback: &mut VisitCallback<'_>,
    ) -> Result<bool, TreeError> {
        if !self.tree.is_rendered(node)? || ctx.is_complete() {
            return Ok(false);
        }

        if self.tree.is::<DynamicData>(node) {
            let mut rows = RowGuard::enter(self, node, None)?;
            let result = rows.visit_dynamic(ctx, node, callback);
            let restored = rows.release();
            return settle(result, restored);
        }

        let mut scope = ContextGuard::enter(self, node);
        match scope.visit_node(ctx, node, callback)? {
            VisitResult::Complete => return Ok(true),
            VisitResult::Reject => return Ok(false),
            VisitResult::Accept => {}
        }
        if !scope.has_pending_under(ctx, node)? {
            return Ok(false);
        }

        for facet in scope.tree.facets(node)? {
            if scope.visit_tree(ctx, facet, callback)? {
                return Ok(true);
            }
        }
        for child in scope.tree.children(node)? {
            if scope.visit_tree(ctx, child, callback)? {
                return Ok(true);
            }
        }
        Ok(false)
    }

    fn visit_dynamic(
        &mut self,
        ctx: &mut VisitContext,
        node: NodeId,
        callback: &mut VisitCallback<'_>,
    ) -> Result<bool, TreeError> {
        let mut scope = ContextGuard::enter(self, node);
        match scope.visit_node(ctx, node, callback)? {
            VisitResult::Complete => return Ok(true),
            VisitResult::Reject => return Ok(false),
            VisitResult::Accept => {}
        }
        if !scope.has_pending_under(ctx, node)? {
            return Ok(false);
        }

        for facet in scope.tree.facets(node)? {
            if scope.visit_tree(ctx, facet, callback)? {
                return Ok(true);
            }
        }

        for key in scope.row_keys(node)? {
            let Some(row) = scope.lookup(node, &key)? else {
                continue;
            };
            scope.bind(node, Some(row))?;
            if !scope.has_pending_under(ctx, node)? {
                continue;
            }
            for child in scope.tree.children(node)? {
                if scope.visit_tree(ctx, child, callback)? {
                    return Ok(true);
                }
            }
        }
        Ok(false)
    }

    fn visit_node(
        &mut self,
        ctx: &mut VisitContext,
        node: NodeId,
        callback: &mut VisitCallback<'_>,
    ) -> Result<VisitResult, TreeError> {
        let client_id = self.tree.client_id(node)?;
        if !ctx.is_target(&client_id) {
            return Ok(VisitResult::Accept);
        }

        let result = callback(self, node).map_err(TreeError::from_callback)?;
        ctx.mark_visited(&client_id);
        if ctx.is_complete() {
            return Ok(VisitResult::Complete);
        }
        Ok(result)
    }

    /// Whether a pending target can live below `node`. Only naming scopes
    /// prefix their descendants, so anything else is always entered.
    fn has_pending_under(&mut self, ctx: &VisitContext, node: NodeId) -> Result<bool, TreeError> {
        if ctx.is_full() {
            return Ok(true);
        }
        if !self.tree.component_dyn(node)?.is_naming_scope() {
            return Ok(!ctx.is_complete());
        }
        let prefix = format!(
            "{}{}",
            self.tree.container_client_id(node)?,
            self.tree.separator()
        );
        Ok(ctx.has_pending_with_prefix(&prefix))
    }

    /// Finds the node whose client id is `target` below `node` and runs
    /// `callback` on it with the owning rows bound. Returns whether the
    /// target was found.
    pub fn invoke_on(
        &mut self,
        node: NodeId,
        target: &str,
        callback: &mut InvokeCallback<'_>,
    ) -> Result<bool, TreeError> {
        if self.tree.is::<DynamicData>(node) {
            let mut rows = RowGuard::enter(self, node, None)?;
            let result = rows.invoke_on_dynamic(node, target, callback);
            let restored = rows.release();
            return settle(result, restored);
        }

        if self.tree.client_id(node)? == target {
            let mut scope = ContextGuard::enter(self, node);
            callback(&mut *scope, node).map_err(TreeError::from_callback)?;
            return Ok(true);
        }

        if self.tree.component_dyn(node)?.is_naming_scope() {
            let prefix = format!(
                "{}{}",
                self.tree.container_client_id(node)?,
                self.tree.separator()
            );
            if !target.starts_with(&prefix) {
                return Ok(false);
            }
        }

        for facet in self.tree.facets(node)? {
            if self.invoke_on(facet, target, callback)? {
                return Ok(true);
            }
        }
        for child in self.tree.children(node)? {
            if self.invoke_on(child, target, callback)? {
                return Ok(true);
            }
        }
        Ok(false)
    }

    fn invoke_on_dynamic(
        &mut self,
        node: NodeId,
        target: &str,
        callback: &mut InvokeCallback<'_>,
    ) -> Result<bool, TreeError> {
        if self.tree.client_id(node)? == target {
            let mut scope = ContextGuard::enter(self, node);
            callback(&mut *scope, node).map_err(TreeError::from_callback)?;
            return Ok(true);
        }

        for facet in self.tree.facets(node)? {
            if self.tree.client_id(facet)? == target {
                callback(self, facet).map_err(TreeError::from_callback)?;
                return Ok(true);
            }
        }

        let client_id = self.tree.client_id(node)?;
        let separator = self.tree.separator();
        for key in self.row_keys(node)? {
            let prefix = format!("{client_id}{separator}{key}{separator}");
            if !target.starts_with(&prefix) {
                continue;
            }
            let Some(row) = self.lookup(node, &key)? else {
                continue;
            };
            self.bind(node, Some(row))?;
            for child in self.tree.children(node)? {
                if self.invoke_on(child, target, callback)? {
                    return Ok(true);
                }
            }
        }
        Ok(false)
    }
}

#[cfg(test)]
#[path = "tests/traversal_tests.rs"]
mod tests;
