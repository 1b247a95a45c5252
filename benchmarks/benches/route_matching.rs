use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use std::hint::black_box;

use switchyard_core::dispatch::Reply;
use switchyard_core::protocol::RequestMethod;
use switchyard_core::routing::{RouteDescriptor, RouteTable};

/// A table with `controllers` controllers of five routes each
fn table(controllers: usize) -> RouteTable {
    let mut routes = RouteTable::new();
    for c in 0..controllers {
        let base = format!("service{}", c);
        let patterns = [
            format!("{}/list", base),
            format!("{}/{{id}}", base),
            format!("{}/{{id}}/items/{{itemId}}", base),
            format!("{}/admin/stats", base),
            format!("{}/files/**", base),
        ];
        for pattern in patterns {
            let route = RouteDescriptor::get(&pattern, |_args| async { Ok(Reply::empty()) });
            if let Err(e) = routes.register(route) {
                panic!("benchmark route rejected: {}", e);
            }
        }
    }
    routes
}

fn benchmark_match_route(c: &mut Criterion) {
    let mut group = c.benchmark_group("match_route");
    group.throughput(Throughput::Elements(1));

    for controllers in [1, 10, 100] {
        let routes = table(controllers);
        let last = controllers - 1;

        let literal = format!("service{}/list", last);
        group.bench_with_input(BenchmarkId::new("literal", controllers), &literal, |b, path| {
            b.iter(|| black_box(routes.match_route(black_box(path), RequestMethod::Get).is_ok()))
        });

        let variables = format!("service{}/42/items/sword", last);
        group.bench_with_input(BenchmarkId::new("variables", controllers), &variables, |b, path| {
            b.iter(|| black_box(routes.match_route(black_box(path), RequestMethod::Get).is_ok()))
        });

        let catch_all = format!("service{}/files/a/b/c.txt", last);
        group.bench_with_input(BenchmarkId::new("catch_all", controllers), &catch_all, |b, path| {
            b.iter(|| black_box(routes.match_route(black_box(path), RequestMethod::Get).is_ok()))
        });

        group.bench_with_input(BenchmarkId::new("miss", controllers), &"nowhere/at/all", |b, path| {
            b.iter(|| black_box(routes.match_route(black_box(path), RequestMethod::Get).is_err()))
        });
    }

    group.finish();
}

fn benchmark_extract_path_variables(c: &mut Criterion) {
    c.bench_function("extract_path_variables", |b| {
        b.iter(|| {
            RouteTable::extract_path_variables(
                black_box("player/17/items/sword"),
                black_box("player/{playerId}/items/{itemId}"),
            )
        })
    });
}

criterion_group!(benches, benchmark_match_route, benchmark_extract_path_variables);
criterion_main!(benches);
