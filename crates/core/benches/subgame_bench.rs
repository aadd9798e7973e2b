//! Benchmark of a depth-1 subgame solve with the zero evaluator.

use std::sync::Arc;

use criterion::{Criterion, criterion_group, criterion_main};
use toss_solver_core::game::Game;
use toss_solver_core::net::{ValueNet, ZeroNet};
use toss_solver_core::probability::initial_beliefs;
use toss_solver_core::solver::{SubgameSolvingParams, build_solver};

fn bench_depth_one_solve(c: &mut Criterion) {
    let game = Game::new();
    let net: Arc<dyn ValueNet> = Arc::new(ZeroNet::new(game.num_hands()));

    let mut group = c.benchmark_group("subgame");
    group.sample_size(10);
    for use_cfr in [false, true] {
        let name = if use_cfr { "cfr" } else { "fp" };
        let params = SubgameSolvingParams {
            num_iters: 10,
            max_depth: 1,
            linear_update: true,
            use_cfr,
            ..SubgameSolvingParams::default()
        };
        group.bench_function(name, |b| {
            b.iter(|| {
                let mut solver = build_solver(
                    &game,
                    &game.initial_state(),
                    initial_beliefs(&game),
                    &params,
                    Some(net.clone()),
                )
                .unwrap();
                solver.multistep().unwrap();
            });
        });
    }
    group.finish();
}

criterion_group!(benches, bench_depth_one_solve);
criterion_main!(benches);
