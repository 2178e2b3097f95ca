use super::*;
use crate::components::{Container, InputField};
use crate::row::VecSource;
use crate::tree::EditableValue;
use serde_json::json;
use std::panic::{catch_unwind, AssertUnwindSafe};

struct Table {
    tree: ComponentTree,
    table: NodeId,
    name: NodeId,
}

fn table(keys: &[&str]) -> Table {
    let mut tree = ComponentTree::new();
    let root = tree.create(Container::new());
    tree.set_root(root).expect("root");
    let form = tree
        .add_child(root, "form", Container::naming_scope())
        .expect("form");
    let source: VecSource = keys
        .iter()
        .map(|key| (*key, json!({ "id": key })))
        .collect();
    let table = tree
        .add_child(
            form,
            "table",
            DynamicData::new(source)
                .with_var("row")
                .with_var_container_id("rowId"),
        )
        .expect("table");
    let name = tree.add_child(table, "name", InputField::new()).expect("name");
    Table { tree, table, name }
}

fn field<'t>(lifecycle: &'t Lifecycle<'_>, node: NodeId) -> &'t InputField {
    lifecycle
        .tree()
        .component::<InputField>(node)
        .expect("input field")
}

fn type_into(lifecycle: &mut Lifecycle<'_>, node: NodeId, text: &str) {
    lifecycle
        .tree_mut()
        .component_mut::<InputField>(node)
        .expect("input field")
        .set_submitted_value(Some(json!(text)));
}

fn row(key: &str) -> Option<KeyedItem> {
    Some(KeyedItem::new(key, json!({ "id": key })))
}

#[test]
fn bound_row_key_lands_in_client_ids() {
    let mut fx = table(&["7"]);
    let mut request = RequestContext::new();
    let mut lifecycle = Lifecycle::new(&mut fx.tree, &mut request);

    lifecycle.bind_key(fx.table, "7").expect("bind");
    assert_eq!(lifecycle.container_client_id(fx.table).expect("container"), "form:table:7");
    assert_eq!(lifecycle.client_id(fx.name).expect("name"), "form:table:7:name");
    assert_eq!(lifecycle.client_id(fx.table).expect("table"), "form:table");
    assert_eq!(lifecycle.request().var("row"), Some(&json!({ "id": "7" })));
    assert_eq!(lifecycle.request().var("rowId"), Some(&json!("form:table:7")));
}

#[test]
fn unbinding_removes_row_var_and_refreshes_ids() {
    let mut fx = table(&["a"]);
    let mut request = RequestContext::new();
    let mut lifecycle = Lifecycle::new(&mut fx.tree, &mut request);

    lifecycle.bind_key(fx.table, "a").expect("bind");
    assert_eq!(lifecycle.client_id(fx.name).expect("bound"), "form:table:a:name");

    lifecycle.unbind(fx.table).expect("unbind");
    assert_eq!(lifecycle.client_id(fx.name).expect("unbound"), "form:table:name");
    assert!(lifecycle.request().var("row").is_none());
    assert_eq!(lifecycle.request().var("rowId"), Some(&json!("form:table")));
    assert!(lifecycle.current_row(fx.table).expect("row").is_none());
}

#[test]
fn each_row_gets_its_own_field_state_back() {
    let mut fx = table(&["a", "b"]);
    let mut request = RequestContext::new();
    let mut lifecycle = Lifecycle::new(&mut fx.tree, &mut request);

    lifecycle.bind_key(fx.table, "a").expect("bind a");
    type_into(&mut lifecycle, fx.name, "X");

    lifecycle.bind_key(fx.table, "b").expect("bind b");
    assert!(
        field(&lifecycle, fx.name).submitted_value().is_none(),
        "row b starts from defaults"
    );
    type_into(&mut lifecycle, fx.name, "Y");

    lifecycle.bind_key(fx.table, "a").expect("back to a");
    assert_eq!(field(&lifecycle, fx.name).submitted_value(), Some(&json!("X")));

    lifecycle.bind_key(fx.table, "b").expect("back to b");
    assert_eq!(field(&lifecycle, fx.name).submitted_value(), Some(&json!("Y")));

    let store = lifecycle.dynamic(fx.table).expect("table").store();
    assert_eq!(store.len(), 2);
    assert!(store.get("form:table:a:name").is_some());
}

#[test]
fn rebinding_the_same_row_changes_nothing() {
    let mut fx = table(&["a"]);
    let mut request = RequestContext::new();
    let mut lifecycle = Lifecycle::new(&mut fx.tree, &mut request);

    lifecycle.bind_key(fx.table, "a").expect("bind");
    type_into(&mut lifecycle, fx.name, "X");
    lifecycle
        .tree_mut()
        .component_mut::<InputField>(fx.name)
        .expect("field")
        .set_valid(false);

    lifecycle.bind_key(fx.table, "a").expect("rebind");
    lifecycle.bind_key(fx.table, "a").expect("rebind again");
    let input = field(&lifecycle, fx.name);
    assert_eq!(input.submitted_value(), Some(&json!("X")));
    assert!(!input.is_valid());
}

#[test]
fn empty_store_leaves_template_values_alone() {
    let mut fx = table(&["a"]);
    fx.tree
        .component_mut::<InputField>(fx.name)
        .expect("field")
        .set_value(Some(json!("template")));
    let mut request = RequestContext::new();
    let mut lifecycle = Lifecycle::new(&mut fx.tree, &mut request);

    lifecycle.bind_key(fx.table, "a").expect("bind");
    assert_eq!(field(&lifecycle, fx.name).local_value(), Some(&json!("template")));
    assert_eq!(lifecycle.client_id(fx.name).expect("id"), "form:table:a:name");
}

#[test]
fn labels_are_restored_only_when_recorded() {
    let mut fx = table(&["a", "b"]);
    let mut request = RequestContext::new();
    let mut lifecycle = Lifecycle::new(&mut fx.tree, &mut request);

    lifecycle.bind_key(fx.table, "a").expect("bind a");
    lifecycle
        .tree_mut()
        .set_attribute(fx.name, "label", json!("Name of a"))
        .expect("label");

    lifecycle.bind_key(fx.table, "b").expect("bind b");
    assert_eq!(
        lifecycle.tree().attribute(fx.name, "label").expect("attr"),
        Some(&json!("Name of a")),
        "no snapshot for b yet, label untouched"
    );
    lifecycle
        .tree_mut()
        .set_attribute(fx.name, "label", json!("Name of b"))
        .expect("label");

    lifecycle.bind_key(fx.table, "a").expect("back to a");
    assert_eq!(
        lifecycle.tree().attribute(fx.name, "label").expect("attr"),
        Some(&json!("Name of a"))
    );
}

#[test]
fn unknown_key_binds_nothing() {
    let mut fx = table(&["a"]);
    let mut request = RequestContext::new();
    let mut lifecycle = Lifecycle::new(&mut fx.tree, &mut request);

    lifecycle.bind_key(fx.table, "zzz").expect("unknown key is not an error");
    assert!(lifecycle.current_row(fx.table).expect("row").is_none());
}

#[test]
fn with_row_restores_previous_row_after_failure() {
    let mut fx = table(&["a", "b"]);
    let mut request = RequestContext::new();
    let mut lifecycle = Lifecycle::new(&mut fx.tree, &mut request);
    lifecycle.bind_key(fx.table, "a").expect("bind");

    let table = fx.table;
    let err = lifecycle
        .with_row(table, row("b"), |inner| {
            assert_eq!(inner.current_row(table)?.as_ref().map(KeyedItem::key), Some("b"));
            Err::<(), _>(TreeError::InvalidPhase(crate::Phase::Render))
        })
        .expect_err("body fails");
    assert!(matches!(err, TreeError::InvalidPhase(_)));

    let current = lifecycle.current_row(fx.table).expect("row");
    assert_eq!(current.as_ref().map(KeyedItem::key), Some("a"));
    assert_eq!(lifecycle.request().var("rowId"), Some(&json!("form:table:a")));
}

#[test]
fn with_row_returns_body_value() {
    let mut fx = table(&["a"]);
    let mut request = RequestContext::new();
    let mut lifecycle = Lifecycle::new(&mut fx.tree, &mut request);

    let name = fx.name;
    let id = lifecycle
        .with_row(fx.table, row("a"), |inner| inner.client_id(name))
        .expect("body");
    assert_eq!(id, "form:table:a:name");
    assert!(lifecycle.current_row(fx.table).expect("row").is_none());
}

#[test]
fn row_guard_restores_during_unwinding() {
    let mut fx = table(&["a", "b"]);
    let mut request = RequestContext::new();
    let mut lifecycle = Lifecycle::new(&mut fx.tree, &mut request);
    lifecycle.bind_key(fx.table, "a").expect("bind");

    let table = fx.table;
    let outcome = catch_unwind(AssertUnwindSafe(|| {
        let guard = RowGuard::enter(&mut lifecycle, table, row("b")).expect("enter");
        assert_eq!(
            guard.current_row(table).expect("row").as_ref().map(KeyedItem::key),
            Some("b")
        );
        panic!("callback blew up");
    }));
    assert!(outcome.is_err());

    let current = lifecycle.current_row(fx.table).expect("row");
    assert_eq!(current.as_ref().map(KeyedItem::key), Some("a"));
}

#[test]
fn context_guard_pops_what_it_pushed() {
    let mut fx = table(&["a"]);
    let mut request = RequestContext::new();
    request.push_component(99);
    let mut lifecycle = Lifecycle::new(&mut fx.tree, &mut request);

    {
        let mut scope = ContextGuard::enter(&mut lifecycle, 1);
        scope.push(2);
        assert_eq!(scope.request().component_stack(), &[99, 1, 2]);
    }
    assert_eq!(lifecycle.request().component_stack(), &[99]);
}

#[test]
fn generated_descendant_ids_come_from_the_table() {
    let mut fx = table(&["a"]);
    let anonymous = fx.tree.create(InputField::new());
    fx.tree.append_child(fx.table, anonymous).expect("append");
    let mut request = RequestContext::new();
    let mut lifecycle = Lifecycle::new(&mut fx.tree, &mut request);

    lifecycle.bind_key(fx.table, "a").expect("bind");
    assert_eq!(lifecycle.client_id(anonymous).expect("id"), "form:table:a:j_id1");
    assert_eq!(lifecycle.create_unique_id(fx.table, Some("x")).expect("seeded"), "j_idx");
    assert_eq!(lifecycle.dynamic(fx.table).expect("table").last_id(), 2);
}

#[test]
fn persisted_state_restores_into_a_fresh_tree() {
    let mut fx = table(&["a", "b"]);
    let mut request = RequestContext::new();
    let state = {
        let mut lifecycle = Lifecycle::new(&mut fx.tree, &mut request);
        lifecycle.bind_key(fx.table, "a").expect("bind a");
        type_into(&mut lifecycle, fx.name, "kept");
        lifecycle.unbind(fx.table).expect("unbind");
        lifecycle.save_state(fx.table).expect("save")
    };
    assert_eq!(state.id.as_deref(), Some("table"));
    let encoded = serde_json::to_value(&state).expect("encode");

    let mut fresh = table(&["a", "b"]);
    let mut request = RequestContext::new();
    let mut lifecycle = Lifecycle::new(&mut fresh.tree, &mut request);
    let decoded: DynamicDataState = serde_json::from_value(encoded).expect("decode");
    lifecycle.restore_state(fresh.table, decoded).expect("restore");

    lifecycle.bind_key(fresh.table, "a").expect("bind a");
    assert_eq!(field(&lifecycle, fresh.name).submitted_value(), Some(&json!("kept")));
}
