use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use project_migrator::hierarchy::{HierarchyBuilder, HierarchyNode, OrphanPolicy};

/// Outline cycling through five levels, with a malformed jump every 50 rows
fn outline(size: usize) -> Vec<HierarchyNode> {
    (0..size)
        .map(|i| {
            let depth = if i % 50 == 49 { 7 } else { (i % 5) as u32 };
            HierarchyNode::new(format!("T{i}"), depth, i as u64)
        })
        .collect()
}

fn benchmark_build_plan(c: &mut Criterion) {
    let mut group = c.benchmark_group("build_plan");
    for size in [100usize, 1_000, 10_000] {
        let nodes = outline(size);
        group.bench_with_input(BenchmarkId::new("reattach_to_root", size), &nodes, |b, nodes| {
            let builder = HierarchyBuilder::new(OrphanPolicy::ReattachToRoot);
            b.iter(|| builder.build_plan(black_box(nodes.clone())))
        });
        group.bench_with_input(BenchmarkId::new("attach_to_nearest", size), &nodes, |b, nodes| {
            let builder = HierarchyBuilder::new(OrphanPolicy::AttachToNearestAncestor);
            b.iter(|| builder.build_plan(black_box(nodes.clone())))
        });
    }
    group.finish();
}

criterion_group!(benches, benchmark_build_plan);
criterion_main!(benches);
