use criterion::{Criterion, criterion_group, criterion_main};

use color_loom::grid::Grid;
use color_loom::grid_solve::{Effort, SolveOptions, solve};

const CLASSIC: &str =
    "530070000600195000098000060800060003400803001700020006060000280000419005000080079";
const DIABOLICAL: &str =
    "800000000003600000070090200050007000000045700000100030001000068008500010090000400";

fn criterion_benchmark(c: &mut Criterion) {
    let base = Grid::new();

    c.bench_function("classic_full_solve", |b| {
        b.iter(|| {
            let mut grid = std::hint::black_box(&base).clone();
            grid.populate(CLASSIC).unwrap();
            grid.plain_solve().unwrap()
        });
    });

    let sweeps_only = SolveOptions {
        max_effort: Effort::Contradictions,
        ..Default::default()
    };
    c.bench_function("diabolical_sweeps", |b| {
        b.iter(|| {
            let mut grid = std::hint::black_box(&base).clone();
            grid.populate(DIABOLICAL).unwrap();
            solve(&mut grid, &sweeps_only).unwrap()
        });
    });

    c.bench_function("seed_base_grid", |b| {
        b.iter(|| std::hint::black_box(Grid::new()));
    });
}

criterion_group!(name=benches;
     config = Criterion::default().sample_size(30);
     targets = criterion_benchmark);
criterion_main!(benches);
