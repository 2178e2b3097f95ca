use rowscope_core::{
    DynamicDataState, Lifecycle, RequestContext, Severity, VisitContext, VisitResult,
};
use rowscope_testing::{postback, TableFixture};
use serde_json::json;

const ROWS: &[&str] = &["ada", "brian", "grace"];

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    log::info!("one template row (name input + action) repeated over {} rows", ROWS.len());

    let mut fixture = TableFixture::with_keys(ROWS);
    let root = fixture.root;
    let table = fixture.table;

    let mut request = RequestContext::new();
    render(&mut fixture.lifecycle(&mut request), root)?;

    log::info!("postback 1: brian submits an empty name");
    let mut first = postback([
        (TableFixture::name_id("ada").as_str(), json!("Ada Lovelace")),
        (TableFixture::name_id("brian").as_str(), json!("")),
    ]);
    fixture.lifecycle(&mut first).execute(root)?;
    report(&first);

    let persisted = {
        let mut request = RequestContext::new();
        let state = fixture.lifecycle(&mut request).save_state(table)?;
        serde_json::to_string_pretty(&state)?
    };
    log::info!("persisted table state:\n{persisted}");

    log::info!("postback 2 on a rebuilt tree: brian fixed, grace clicks");
    let mut next = TableFixture::with_keys(ROWS);
    let (next_root, next_table) = (next.root, next.table);
    let state: DynamicDataState = serde_json::from_str(&persisted)?;
    let mut second = postback([
        (TableFixture::name_id("brian").as_str(), json!("Brian Kernighan")),
        (TableFixture::act_id("grace").as_str(), json!("clicked")),
    ]);
    {
        let mut lifecycle = next.lifecycle(&mut second);
        lifecycle.restore_state(next_table, state)?;
        lifecycle.execute(next_root)?;
    }
    report(&second);

    for update in next.updates() {
        log::info!("model update in row {:?}: {}", update.row, update.value);
    }
    for action in next.actions() {
        log::info!("action delivered in row {:?} ({:?})", action.row, action.container_id);
    }
    Ok(())
}

/// Walks every row the way a renderer would and logs the ids it sees.
fn render(lifecycle: &mut Lifecycle<'_>, root: usize) -> anyhow::Result<()> {
    let mut ids = Vec::new();
    lifecycle.visit_tree(&mut VisitContext::full(), root, &mut |inner, node| {
        ids.push(inner.client_id(node)?);
        Ok(VisitResult::Accept)
    })?;
    log::info!("rendered client ids: {}", ids.join(", "));
    Ok(())
}

fn report(request: &RequestContext) {
    if request.is_render_response() {
        log::warn!("render response requested");
    }
    for message in request.messages() {
        let target = message.client_id.as_deref().unwrap_or("-");
        if message.severity >= Severity::Error {
            log::error!("{target}: {}", message.summary);
        } else {
            log::info!("{target}: {}", message.summary);
        }
    }
}
