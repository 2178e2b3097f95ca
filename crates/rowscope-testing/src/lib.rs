//! Fixtures and harness for rowscope
//!
//! [`TableFixture`] builds the tree most scenarios need:
//!
//! ```text
//! root
//! └─ form            (naming scope)
//!    └─ table        (dynamic data, var "row", var_container_id "rowId")
//!       ├─ name      (required input)
//!       └─ act       (command)
//! ```
//!
//! Listeners record into shared logs so tests can check which row was bound
//! when a model update or an action ran.

use std::cell::RefCell;
use std::rc::Rc;

use rowscope_core::{
    Command, ComponentTree, Container, DynamicData, InputField, Lifecycle, NodeId,
    RequestContext, TreeError, Value, VecSource,
};

pub mod prelude {
    pub use crate::{postback, ActionRecord, TableFixture, UpdateRecord};
}

/// One model update: the `row` variable at the time and the pushed value.
#[derive(Debug, Clone, PartialEq)]
pub struct UpdateRecord {
    pub row: Option<Value>,
    pub value: Value,
}

/// One delivered action: the `row` and `rowId` variables at delivery time.
#[derive(Debug, Clone, PartialEq)]
pub struct ActionRecord {
    pub row: Option<Value>,
    pub container_id: Option<Value>,
}

pub struct TableFixture {
    pub tree: ComponentTree,
    pub root: NodeId,
    pub form: NodeId,
    pub table: NodeId,
    pub name: NodeId,
    pub act: NodeId,
    updates: Rc<RefCell<Vec<UpdateRecord>>>,
    actions: Rc<RefCell<Vec<ActionRecord>>>,
}

impl TableFixture {
    pub fn new<K, I>(rows: I) -> Self
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, Value)>,
    {
        Self::build(rows.into_iter().collect()).expect("fixture tree")
    }

    /// Rows keyed by `keys`, each carrying its key as value.
    pub fn with_keys(keys: &[&str]) -> Self {
        Self::new(keys.iter().map(|key| (*key, Value::from(*key))))
    }

    fn build(source: VecSource) -> Result<Self, TreeError> {
        let updates = Rc::new(RefCell::new(Vec::new()));
        let actions = Rc::new(RefCell::new(Vec::new()));

        let mut tree = ComponentTree::new();
        let root = tree.create(Container::new());
        tree.set_root(root)?;
        let form = tree.add_child(root, "form", Container::naming_scope())?;
        let table = tree.add_child(
            form,
            "table",
            DynamicData::new(source)
                .with_var("row")
                .with_var_container_id("rowId"),
        )?;

        let update_log = Rc::clone(&updates);
        let name = tree.add_child(
            table,
            "name",
            InputField::new().required().on_update(move |value, request| {
                update_log.borrow_mut().push(UpdateRecord {
                    row: request.var("row").cloned(),
                    value: value.clone(),
                });
                Ok(())
            }),
        )?;

        let action_log = Rc::clone(&actions);
        let act = tree.add_child(
            table,
            "act",
            Command::new().on_action(move |_, request| {
                action_log.borrow_mut().push(ActionRecord {
                    row: request.var("row").cloned(),
                    container_id: request.var("rowId").cloned(),
                });
                Ok(())
            }),
        )?;

        Ok(Self {
            tree,
            root,
            form,
            table,
            name,
            act,
            updates,
            actions,
        })
    }

    pub fn lifecycle<'a>(&'a mut self, request: &'a mut RequestContext) -> Lifecycle<'a> {
        Lifecycle::new(&mut self.tree, request)
    }

    pub fn name_id(key: &str) -> String {
        format!("form:table:{key}:name")
    }

    pub fn act_id(key: &str) -> String {
        format!("form:table:{key}:act")
    }

    pub fn input(&self) -> &InputField {
        self.tree
            .component::<InputField>(self.name)
            .expect("name is an input field")
    }

    pub fn table(&self) -> &DynamicData {
        self.tree
            .component::<DynamicData>(self.table)
            .expect("table is dynamic data")
    }

    pub fn bound_key(&self) -> Option<String> {
        self.table().row().map(|row| row.key.clone())
    }

    pub fn updates(&self) -> Vec<UpdateRecord> {
        self.updates.borrow().clone()
    }

    pub fn actions(&self) -> Vec<ActionRecord> {
        self.actions.borrow().clone()
    }
}

/// A request carrying the given submitted parameters.
pub fn postback<'p>(params: impl IntoIterator<Item = (&'p str, Value)>) -> RequestContext {
    params
        .into_iter()
        .fold(RequestContext::new(), |request, (name, value)| {
            request.with_param(name, value)
        })
}
