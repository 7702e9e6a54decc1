//! Criterion benchmarks for the neighbourhood searches.
//!
//! Uses a synthetic graph coloring problem (ring plus chords, soft cost on
//! color sums) to measure engine overhead independent of any domain.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use std::sync::Arc;
use u_localsearch::model::{Assignment, Model};
use u_localsearch::registry::Registry;
use u_localsearch::solver::Solver;
use u_localsearch::Properties;

// ===========================================================================
// Ring coloring: adjacent vertices must differ, lower colors are cheaper
// ===========================================================================

struct RingColoring {
    neighbours: Vec<Vec<usize>>,
    colors: Vec<u16>,
}

impl RingColoring {
    fn new(n: usize, nr_colors: u16) -> Self {
        let neighbours = (0..n)
            .map(|v| {
                let mut adj = vec![(v + 1) % n, (v + n - 1) % n];
                if n > 8 {
                    adj.push((v + n / 2) % n);
                }
                adj
            })
            .collect();
        Self {
            neighbours,
            colors: (0..nr_colors).collect(),
        }
    }
}

impl Model for RingColoring {
    type Value = u16;

    fn nr_variables(&self) -> usize {
        self.neighbours.len()
    }

    fn values(&self, _variable: usize) -> &[u16] {
        &self.colors
    }

    fn total_value(&self, a: &Assignment<u16>) -> f64 {
        a.assigned().map(|(_, c)| f64::from(*c)).sum()
    }

    fn conflicts(&self, a: &Assignment<u16>, variable: usize, value: &u16) -> Vec<usize> {
        self.neighbours[variable]
            .iter()
            .copied()
            .filter(|n| a.value(*n) == Some(value))
            .collect()
    }
}

fn props(class: &str) -> Properties {
    Properties::new()
        .with("Neighbour.Class", class)
        .with("General.Seed", "42")
        .with("Termination.MaxIters", "2000")
        .with("Termination.TimeOut", "5")
        .with("HillClimber.MaxIdle", "500")
        .with("Search.GreatDeluge", "false")
}

fn bench_simple_search(c: &mut Criterion) {
    let mut group = c.benchmark_group("simple_search_ring");
    group.sample_size(10);
    let registry = Registry::with_defaults();

    for n in [50, 200] {
        let model = Arc::new(RingColoring::new(n, 5));
        let props = props("SimpleSearch");
        group.bench_with_input(BenchmarkId::from_parameter(n), &model, |b, m| {
            b.iter(|| {
                let solver = Solver::from_properties(Arc::clone(m), &props, &registry).unwrap();
                black_box(solver.run().unwrap())
            });
        });
    }
    group.finish();
}

fn bench_hill_climber(c: &mut Criterion) {
    let mut group = c.benchmark_group("hill_climber_ring");
    group.sample_size(10);
    let registry = Registry::with_defaults();

    for n in [50, 200] {
        let model = Arc::new(RingColoring::new(n, 5));
        let props = props("HillClimber");
        let construct = props.clone().with("Neighbour.Class", "Construction");
        group.bench_with_input(BenchmarkId::from_parameter(n), &model, |b, m| {
            b.iter(|| {
                let start = Solver::from_properties(Arc::clone(m), &construct, &registry)
                    .unwrap()
                    .run()
                    .unwrap();
                let mut solver = Solver::from_properties(Arc::clone(m), &props, &registry).unwrap();
                if let Some(initial) = start.best {
                    solver = solver.with_initial(initial);
                }
                black_box(solver.run().unwrap())
            });
        });
    }
    group.finish();
}

criterion_group!(benches, bench_simple_search, bench_hill_climber);
criterion_main!(benches);
