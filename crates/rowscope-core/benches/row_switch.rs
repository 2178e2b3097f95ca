use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use rowscope_core::{Phase, RequestContext, Value};
use rowscope_testing::{postback, TableFixture};

const ROW_COUNTS: &[usize] = &[16, 64, 256];

fn keys(rows: usize) -> Vec<String> {
    (0..rows).map(|row| format!("r{row}")).collect()
}

fn fixture(rows: usize) -> TableFixture {
    TableFixture::new(keys(rows).into_iter().map(|key| {
        let value = Value::from(key.clone());
        (key, value)
    }))
}

fn bench_bind_cycle(c: &mut Criterion) {
    let mut group = c.benchmark_group("bind_cycle");
    for &rows in ROW_COUNTS {
        group.bench_with_input(BenchmarkId::from_parameter(rows), &rows, |b, &rows| {
            let mut fixture = fixture(rows);
            let table = fixture.table;
            let keys = keys(rows);
            let mut request = RequestContext::new();
            b.iter(|| {
                let mut lifecycle = fixture.lifecycle(&mut request);
                for key in &keys {
                    lifecycle.bind_key(table, key).expect("bind");
                }
                lifecycle.unbind(table).expect("unbind");
                black_box(lifecycle.request().var("rowId").cloned());
            });
        });
    }
    group.finish();
}

fn bench_apply_input(c: &mut Criterion) {
    let mut group = c.benchmark_group("apply_input");
    for &rows in ROW_COUNTS {
        group.bench_with_input(BenchmarkId::from_parameter(rows), &rows, |b, &rows| {
            let mut fixture = fixture(rows);
            let root = fixture.root;
            let names: Vec<String> = keys(rows)
                .iter()
                .map(|key| TableFixture::name_id(key))
                .collect();
            b.iter(|| {
                let mut request = postback(
                    names
                        .iter()
                        .map(|name| (name.as_str(), Value::from("value"))),
                );
                fixture
                    .lifecycle(&mut request)
                    .process(root, Phase::ApplyInput)
                    .expect("apply input");
                black_box(request.is_render_response());
            });
        });
    }
    group.finish();
}

criterion_group!(benches, bench_bind_cycle, bench_apply_input);
criterion_main!(benches);
