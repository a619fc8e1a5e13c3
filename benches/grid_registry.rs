//! Benchmark for the container grid registry
//!
//! Covers node registration, lookups, the group-by-node scan and contended
//! first-writer-wins registration.

use container_grid::{ContainerGrid, ContainerGridGroups, ContainerGroup, ContainerNode};
use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use std::sync::Arc;

fn bench_add_node(c: &mut Criterion) {
    let mut group = c.benchmark_group("grid_registry");
    group.throughput(Throughput::Elements(1));

    group.bench_function("add_single_node", |b| {
        let grid: ContainerGrid = ContainerGrid::new();
        let mut counter = 0u64;

        b.iter(|| {
            counter += 1;
            let node = ContainerNode::new(format!("node-{}", counter));
            let _ = grid.add_node(black_box(node));
        });
    });

    group.bench_function("add_remove_node", |b| {
        let grid: ContainerGrid = ContainerGrid::new();

        b.iter(|| {
            let _ = grid.add_node(ContainerNode::new("node-cycle"));
            let _ = grid.remove_node(black_box("node-cycle"));
        });
    });

    group.finish();
}

fn bench_get_node(c: &mut Criterion) {
    let mut group = c.benchmark_group("grid_registry");
    group.throughput(Throughput::Elements(1));

    // Pre-register nodes
    let grid: ContainerGrid = ContainerGrid::new();
    for i in 0..1000 {
        let _ = grid.add_node(ContainerNode::new(format!("node-{:04}", i)));
    }

    group.bench_function("get_node", |b| {
        let mut counter = 0u64;
        b.iter(|| {
            counter += 1;
            let node_id = format!("node-{:04}", counter % 1000);
            black_box(grid.get_node(black_box(node_id)));
        });
    });

    group.finish();
}

fn bench_group_by_node(c: &mut Criterion) {
    let mut group = c.benchmark_group("grid_groups");
    group.throughput(Throughput::Elements(1));

    // 100 groups of 10 nodes
    let groups: ContainerGridGroups = ContainerGridGroups::new();
    for g in 0..100 {
        let group_id = format!("group-{:03}", g);
        let _ = groups.add_group(ContainerGroup::new(group_id.as_str()));
        for n in 0..10 {
            let node_id = format!("node-{:03}-{}", g, n);
            let _ = groups.add_node(ContainerNode::new(node_id.as_str()));
            let _ = groups.add_node_to_group(group_id.as_str(), node_id.as_str());
        }
    }

    group.bench_function("group_by_node", |b| {
        let mut counter = 0u64;
        b.iter(|| {
            counter += 1;
            let node_id = format!("node-{:03}-{}", counter % 100, counter % 10);
            black_box(groups.group_by_node(black_box(node_id)));
        });
    });

    group.finish();
}

fn bench_concurrent_add(c: &mut Criterion) {
    let mut group = c.benchmark_group("grid_registry");
    group.throughput(Throughput::Elements(100));

    let rt = tokio::runtime::Runtime::new().unwrap();

    group.bench_function("concurrent_100_adds_same_id", |b| {
        b.iter(|| {
            let grid: Arc<ContainerGrid> = Arc::new(ContainerGrid::new());
            rt.block_on(async {
                let mut handles = Vec::new();
                for _ in 0..100 {
                    let grid = grid.clone();
                    handles.push(tokio::spawn(async move {
                        grid.add_node(ContainerNode::new("contended")).unwrap_or(false)
                    }));
                }
                for handle in handles {
                    let _ = handle.await;
                }
            });
        });
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_add_node,
    bench_get_node,
    bench_group_by_node,
    bench_concurrent_add,
);
criterion_main!(benches);
