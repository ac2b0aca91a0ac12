//! Benchmarks for mesh-volume operations.
//!
//! Run with: cargo bench -p mesh-volume
//!
//! To compare against baseline:
//! 1. First run: cargo bench -p mesh-volume -- --save-baseline main
//! 2. After changes: cargo bench -p mesh-volume -- --baseline main

use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use mesh_types::{OpenFront, box_row_boundary};
use mesh_volume::{
    LocalMesher, MeshingParams, PassConfig, PassInput, RuleSet, SubdomainController, VolumeMesher,
    delaunay_fill,
};

const ROW_LENGTHS: [usize; 3] = [1, 4, 8];

// =============================================================================
// Local Mesher
// =============================================================================

fn bench_local_pass(c: &mut Criterion) {
    let mut group = c.benchmark_group("local_pass");
    let rules = RuleSet::standard();

    for n in ROW_LENGTHS {
        let mesh = box_row_boundary(n);
        let input = PassInput::for_domain(&mesh, 1);
        group.bench_with_input(BenchmarkId::new("tetrahedral", n), &mesh, |b, mesh| {
            b.iter(|| {
                let mut mesh = mesh.clone();
                LocalMesher::new(&rules.tetrahedral).run(
                    black_box(&mut mesh),
                    black_box(&input),
                    &PassConfig::default(),
                )
            });
        });
    }

    group.finish();
}

// =============================================================================
// Delaunay Fallback
// =============================================================================

fn bench_delaunay(c: &mut Criterion) {
    let mut group = c.benchmark_group("delaunay_fill");

    for n in ROW_LENGTHS {
        let mesh = box_row_boundary(n);
        group.bench_with_input(BenchmarkId::new("row", n), &mesh, |b, mesh| {
            b.iter(|| {
                let mut mesh = mesh.clone();
                let front = OpenFront::compute(&mesh, 1);
                let bounds = mesh.domain_bounds(1);
                delaunay_fill(black_box(&mut mesh), front.faces(), &bounds)
            });
        });
    }

    group.finish();
}

// =============================================================================
// Full Pipeline
// =============================================================================

fn bench_pipeline(c: &mut Criterion) {
    let mut group = c.benchmark_group("volume_mesher");
    group.sample_size(20);
    let rules = RuleSet::standard();

    for n in ROW_LENGTHS {
        let mesh = box_row_boundary(n);

        group.bench_with_input(BenchmarkId::new("controller", n), &mesh, |b, mesh| {
            let params = MeshingParams::fast();
            b.iter(|| {
                let mut mesh = mesh.clone();
                let controller = SubdomainController::new(&rules, &params);
                for k in 1..=mesh.domain_count() {
                    let _ = controller.mesh_subdomain(black_box(&mut mesh), k);
                }
                mesh
            });
        });

        group.bench_with_input(BenchmarkId::new("full_run", n), &mesh, |b, mesh| {
            b.iter(|| {
                let mut mesh = mesh.clone();
                let _ = VolumeMesher::new(&rules, MeshingParams::default()).run(black_box(&mut mesh));
                mesh
            });
        });
    }

    group.finish();
}

// =============================================================================
// Criterion Setup
// =============================================================================

criterion_group!(benches, bench_local_pass, bench_delaunay, bench_pipeline);
criterion_main!(benches);
