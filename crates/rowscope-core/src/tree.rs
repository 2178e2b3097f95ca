//! Arena-backed component tree.
//!
//! Nodes live in a flat arena addressed by [`NodeId`]. Each entry carries the
//! host bookkeeping every component gets for free: parent link, ordered
//! children, named facets, attributes, the rendered flag and the identity
//! pair (explicit id plus cached client id). Behaviour is supplied by the
//! boxed [`Component`].

use std::any::Any;

use indexmap::IndexMap;

use crate::event::ComponentEvent;
use crate::request::RequestContext;
use crate::{NodeId, TreeError, Value, DEFAULT_SEPARATOR, UNIQUE_ID_PREFIX};

pub trait AsAny {
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<T: Any> AsAny for T {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// Editable state of an input-like component.
pub trait EditableValue {
    fn local_value(&self) -> Option<&Value>;
    fn set_value(&mut self, value: Option<Value>);
    fn submitted_value(&self) -> Option<&Value>;
    fn set_submitted_value(&mut self, value: Option<Value>);
    fn is_valid(&self) -> bool;
    fn set_valid(&mut self, valid: bool);
    fn is_local_value_set(&self) -> bool;
    fn set_local_value_set(&mut self, set: bool);
}

/// Hands out ids to descendants that were created without one.
pub trait UniqueIdVendor {
    fn create_unique_id(&mut self, seed: Option<&str>) -> String;
}

pub trait Component: AsAny {
    fn kind(&self) -> &'static str {
        std::any::type_name::<Self>()
    }

    fn editable(&self) -> Option<&dyn EditableValue> {
        None
    }

    fn editable_mut(&mut self) -> Option<&mut dyn EditableValue> {
        None
    }

    fn id_vendor(&mut self) -> Option<&mut dyn UniqueIdVendor> {
        None
    }

    /// Naming scopes prefix the client ids of their descendants.
    fn is_naming_scope(&self) -> bool {
        false
    }

    /// Key of the row currently bound, for components that repeat their
    /// children. Appended to the container client id.
    fn row_key(&self) -> Option<&str> {
        None
    }

    fn is_composite(&self) -> bool {
        false
    }

    fn decode(
        &mut self,
        _node: NodeId,
        _client_id: &str,
        _request: &mut RequestContext,
    ) -> Result<(), TreeError> {
        Ok(())
    }

    fn validate(
        &mut self,
        _node: NodeId,
        _client_id: &str,
        _request: &mut RequestContext,
    ) -> Result<(), TreeError> {
        Ok(())
    }

    fn update_model(
        &mut self,
        _node: NodeId,
        _client_id: &str,
        _request: &mut RequestContext,
    ) -> Result<(), TreeError> {
        Ok(())
    }

    fn broadcast(
        &mut self,
        _event: &ComponentEvent,
        _request: &mut RequestContext,
    ) -> Result<(), TreeError> {
        Ok(())
    }
}

struct NodeEntry {
    component: Box<dyn Component>,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    facets: IndexMap<String, NodeId>,
    attributes: IndexMap<String, Value>,
    id: Option<String>,
    client_id: Option<String>,
    rendered: bool,
}

impl NodeEntry {
    fn new(component: Box<dyn Component>) -> Self {
        Self {
            component,
            parent: None,
            children: Vec::new(),
            facets: IndexMap::new(),
            attributes: IndexMap::new(),
            id: None,
            client_id: None,
            rendered: true,
        }
    }
}

pub struct ComponentTree {
    nodes: Vec<NodeEntry>,
    root: Option<NodeId>,
    root_last_id: u64,
    separator: char,
}

impl Default for ComponentTree {
    fn default() -> Self {
        Self::new()
    }
}

impl ComponentTree {
    pub fn new() -> Self {
        Self {
            nodes: Vec::new(),
            root: None,
            root_last_id: 0,
            separator: DEFAULT_SEPARATOR,
        }
    }

    pub fn with_separator(mut self, separator: char) -> Self {
        self.separator = separator;
        self
    }

    #[inline]
    pub fn separator(&self) -> char {
        self.separator
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn create<C: Component + 'static>(&mut self, component: C) -> NodeId {
        self.create_boxed(Box::new(component))
    }

    pub fn create_boxed(&mut self, component: Box<dyn Component>) -> NodeId {
        let id = self.nodes.len();
        self.nodes.push(NodeEntry::new(component));
        id
    }

    pub fn set_root(&mut self, node: NodeId) -> Result<(), TreeError> {
        self.entry(node)?;
        self.root = Some(node);
        Ok(())
    }

    pub fn root(&self) -> Option<NodeId> {
        self.root
    }

    /// Creates `component` with the explicit `id` and appends it to `parent`.
    pub fn add_child<C: Component + 'static>(
        &mut self,
        parent: NodeId,
        id: &str,
        component: C,
    ) -> Result<NodeId, TreeError> {
        let node = self.create(component);
        self.set_id(node, Some(id.to_owned()))?;
        self.append_child(parent, node)?;
        Ok(node)
    }

    /// Creates `component` with the explicit `id` and installs it as facet
    /// `name` of `parent`.
    pub fn add_facet<C: Component + 'static>(
        &mut self,
        parent: NodeId,
        name: &str,
        id: &str,
        component: C,
    ) -> Result<NodeId, TreeError> {
        let node = self.create(component);
        self.set_id(node, Some(id.to_owned()))?;
        self.set_facet(parent, name, node)?;
        Ok(node)
    }

    pub fn append_child(&mut self, parent: NodeId, child: NodeId) -> Result<(), TreeError> {
        self.entry(parent)?;
        self.detach(child)?;
        self.entry_mut(child)?.parent = Some(parent);
        self.entry_mut(parent)?.children.push(child);
        Ok(())
    }

    pub fn set_facet(
        &mut self,
        parent: NodeId,
        name: &str,
        child: NodeId,
    ) -> Result<(), TreeError> {
        self.entry(parent)?;
        self.detach(child)?;
        self.entry_mut(child)?.parent = Some(parent);
        let previous = self
            .entry_mut(parent)?
            .facets
            .insert(name.to_owned(), child);
        if let Some(previous) = previous.filter(|previous| *previous != child) {
            self.entry_mut(previous)?.parent = None;
        }
        Ok(())
    }

    fn detach(&mut self, child: NodeId) -> Result<(), TreeError> {
        let Some(parent) = self.entry(child)?.parent else {
            return Ok(());
        };
        let entry = self.entry_mut(parent)?;
        entry.children.retain(|candidate| *candidate != child);
        entry.facets.retain(|_, candidate| *candidate != child);
        self.entry_mut(child)?.parent = None;
        Ok(())
    }

    pub fn parent(&self, node: NodeId) -> Result<Option<NodeId>, TreeError> {
        Ok(self.entry(node)?.parent)
    }

    pub fn children(&self, node: NodeId) -> Result<Vec<NodeId>, TreeError> {
        Ok(self.entry(node)?.children.clone())
    }

    /// Facet nodes in insertion order.
    pub fn facets(&self, node: NodeId) -> Result<Vec<NodeId>, TreeError> {
        Ok(self.entry(node)?.facets.values().copied().collect())
    }

    pub fn facet(&self, node: NodeId, name: &str) -> Result<Option<NodeId>, TreeError> {
        Ok(self.entry(node)?.facets.get(name).copied())
    }

    pub fn attribute(&self, node: NodeId, name: &str) -> Result<Option<&Value>, TreeError> {
        Ok(self.entry(node)?.attributes.get(name))
    }

    pub fn set_attribute(
        &mut self,
        node: NodeId,
        name: &str,
        value: Value,
    ) -> Result<(), TreeError> {
        self.entry_mut(node)?
            .attributes
            .insert(name.to_owned(), value);
        Ok(())
    }

    pub fn is_rendered(&self, node: NodeId) -> Result<bool, TreeError> {
        Ok(self.entry(node)?.rendered)
    }

    pub fn set_rendered(&mut self, node: NodeId, rendered: bool) -> Result<(), TreeError> {
        self.entry_mut(node)?.rendered = rendered;
        Ok(())
    }

    pub fn component_dyn(&self, node: NodeId) -> Result<&dyn Component, TreeError> {
        Ok(self.entry(node)?.component.as_ref())
    }

    pub fn component_dyn_mut(&mut self, node: NodeId) -> Result<&mut dyn Component, TreeError> {
        Ok(self.entry_mut(node)?.component.as_mut())
    }

    pub fn component<C: Component + 'static>(&self, node: NodeId) -> Result<&C, TreeError> {
        let component: &dyn Component = self.entry(node)?.component.as_ref();
        component
            .as_any()
            .downcast_ref::<C>()
            .ok_or(TreeError::TypeMismatch {
                id: node,
                expected: std::any::type_name::<C>(),
            })
    }

    pub fn component_mut<C: Component + 'static>(
        &mut self,
        node: NodeId,
    ) -> Result<&mut C, TreeError> {
        let component: &mut dyn Component = self.entry_mut(node)?.component.as_mut();
        component
            .as_any_mut()
            .downcast_mut::<C>()
            .ok_or(TreeError::TypeMismatch {
                id: node,
                expected: std::any::type_name::<C>(),
            })
    }

    pub fn with_component<C: Component + 'static, R>(
        &mut self,
        node: NodeId,
        f: impl FnOnce(&mut C) -> R,
    ) -> Result<R, TreeError> {
        self.component_mut::<C>(node).map(f)
    }

    pub fn is<C: Component + 'static>(&self, node: NodeId) -> bool {
        self.component::<C>(node).is_ok()
    }

    pub fn id(&self, node: NodeId) -> Result<Option<&str>, TreeError> {
        Ok(self.entry(node)?.id.as_deref())
    }

    /// Assigns the explicit id and drops the cached client id.
    pub fn set_id(&mut self, node: NodeId, id: Option<String>) -> Result<(), TreeError> {
        let entry = self.entry_mut(node)?;
        entry.id = id;
        entry.client_id = None;
        Ok(())
    }

    /// Re-asserts the current id so the next [`client_id`](Self::client_id)
    /// call recomputes against the active row.
    pub fn reset_client_id(&mut self, node: NodeId) -> Result<(), TreeError> {
        self.entry_mut(node)?.client_id = None;
        Ok(())
    }

    pub fn client_id(&mut self, node: NodeId) -> Result<String, TreeError> {
        if let Some(cached) = &self.entry(node)?.client_id {
            return Ok(cached.clone());
        }

        let id = match self.entry(node)?.id.clone() {
            Some(id) => id,
            None => {
                let generated = self.generate_id(node)?;
                self.entry_mut(node)?.id = Some(generated.clone());
                generated
            }
        };

        let client_id = match self.nearest_ancestor(node, |c| c.is_naming_scope())? {
            Some(scope) => {
                let prefix = self.container_client_id(scope)?;
                format!("{prefix}{}{id}", self.separator)
            }
            None => id,
        };

        self.entry_mut(node)?.client_id = Some(client_id.clone());
        Ok(client_id)
    }

    /// Client id used as prefix by descendants: the node's own client id,
    /// followed by the bound row key when there is one.
    pub fn container_client_id(&mut self, node: NodeId) -> Result<String, TreeError> {
        let client_id = self.client_id(node)?;
        match self.entry(node)?.component.row_key() {
            Some(key) => Ok(format!("{client_id}{}{key}", self.separator)),
            None => Ok(client_id),
        }
    }

    pub fn composite_parent(&self, node: NodeId) -> Result<Option<NodeId>, TreeError> {
        self.nearest_ancestor(node, |c| c.is_composite())
    }

    fn nearest_ancestor(
        &self,
        node: NodeId,
        predicate: impl Fn(&dyn Component) -> bool,
    ) -> Result<Option<NodeId>, TreeError> {
        let mut cursor = self.entry(node)?.parent;
        while let Some(ancestor) = cursor {
            let entry = self.entry(ancestor)?;
            if predicate(entry.component.as_ref()) {
                return Ok(Some(ancestor));
            }
            cursor = entry.parent;
        }
        Ok(None)
    }

    fn generate_id(&mut self, node: NodeId) -> Result<String, TreeError> {
        let mut cursor = self.entry(node)?.parent;
        while let Some(ancestor) = cursor {
            let entry = self.entry_mut(ancestor)?;
            let parent = entry.parent;
            if let Some(vendor) = entry.component.id_vendor() {
                return Ok(vendor.create_unique_id(None));
            }
            cursor = parent;
        }
        if self.root.is_some() {
            self.root_last_id += 1;
            return Ok(format!("{UNIQUE_ID_PREFIX}{}", self.root_last_id));
        }
        Err(TreeError::IdentityResolution { node })
    }

    fn entry(&self, id: NodeId) -> Result<&NodeEntry, TreeError> {
        self.nodes.get(id).ok_or(TreeError::Missing { id })
    }

    fn entry_mut(&mut self, id: NodeId) -> Result<&mut NodeEntry, TreeError> {
        self.nodes.get_mut(id).ok_or(TreeError::Missing { id })
    }

    pub fn dump_tree(&self, root: Option<NodeId>) -> String {
        let mut output = String::new();
        if let Some(root_id) = root {
            self.dump_node(&mut output, root_id, 0, None);
        } else {
            output.push_str("(no root)\n");
        }
        output
    }

    fn dump_node(&self, output: &mut String, id: NodeId, depth: usize, facet: Option<&str>) {
        let indent = "  ".repeat(depth);
        let Some(entry) = self.nodes.get(id) else {
            output.push_str(&format!("{}[{}] (missing)\n", indent, id));
            return;
        };
        let label = entry.id.as_deref().unwrap_or("-");
        match facet {
            Some(name) => output.push_str(&format!(
                "{}[{}] {} #{} (facet {})\n",
                indent,
                id,
                entry.component.kind(),
                label,
                name
            )),
            None => output.push_str(&format!(
                "{}[{}] {} #{}\n",
                indent,
                id,
                entry.component.kind(),
                label
            )),
        }
        for (name, facet_id) in &entry.facets {
            self.dump_node(output, *facet_id, depth + 1, Some(name));
        }
        for child_id in &entry.children {
            self.dump_node(output, *child_id, depth + 1, None);
        }
    }
}
