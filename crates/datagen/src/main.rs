//! Benchmark and training-data generator.
//!
//! Spawns a pool of self-play workers against a trained value network and
//! reports replay throughput once per cycle. Training data accumulates in
//! the prioritized replay buffer for an external training loop to consume.

mod workers;

use std::error::Error;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use candle_core::Device;
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};

use toss_solver_core::Game;
use toss_solver_core::net::ValueNet;
use toss_solver_core::query::query_size;
use toss_solver_core::recursive::RecursiveSolvingParams;
use toss_solver_core::solver::SubgameSolvingParams;
use toss_solver_core::tree::unroll_tree;
use toss_solver_net::{BufferedValueNet, CounterfactualValueNet, ModelLocker, PrioritizedReplay};

use crate::workers::WorkerPool;

/// Replay-buffer constants matching the training host.
const REPLAY_CAPACITY: usize = 1 << 20;
const PRIORITY_EXPONENT: f64 = 1.0;
const IMPORTANCE_EXPONENT: f64 = 0.4;

/// Hidden width of the value network artifact.
const HIDDEN_DIM: usize = 1024;

/// Seconds per reporting cycle.
const CYCLE_SECS: u64 = 10;

#[derive(Parser)]
#[command(name = "toss-solver-datagen")]
#[command(about = "Generate value-network training data by recursive subgame solving")]
struct Cli {
    /// Solver iterations per subgame
    #[arg(long = "fp_iters", default_value_t = 1024)]
    fp_iters: usize,
    /// Depth bound of each subgame
    #[arg(long = "mdp_depth", default_value_t = 2)]
    mdp_depth: usize,
    /// Number of self-play worker threads
    #[arg(long = "num_threads", default_value_t = 10)]
    num_threads: usize,
    /// Evaluator replicas per device
    #[arg(long = "per_gpu", default_value_t = 1)]
    per_gpu: usize,
    /// Reporting cycles before shutdown
    #[arg(long = "num_cycles", default_value_t = 6)]
    num_cycles: usize,
    /// Device to evaluate on, e.g. "cpu" or "cuda:1"
    #[arg(long, default_value = "cuda:1")]
    device: String,
    /// Path to the value-network safetensors artifact
    #[arg(long)]
    net: PathBuf,
}

fn parse_device(spec: &str) -> Result<Device, Box<dyn Error>> {
    if spec == "cpu" {
        return Ok(Device::Cpu);
    }
    if let Some(ordinal) = spec.strip_prefix("cuda:") {
        return Ok(Device::new_cuda(ordinal.parse()?)?);
    }
    Err(format!("unsupported device {spec:?}").into())
}

#[allow(clippy::cast_precision_loss)]
fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();
    if cli.mdp_depth == 0 {
        return Err("mdp_depth must be positive".into());
    }

    let game = Game::new();
    println!("game: {} hands, {} actions", game.num_hands(), game.num_actions());
    {
        let subgame = unroll_tree(&game, &game.initial_state(), cli.mdp_depth);
        println!("subgame of depth {} has {} nodes", cli.mdp_depth, subgame.len());
    }

    let device = parse_device(&cli.device)?;
    let replicas = (0..cli.per_gpu)
        .map(|_| {
            CounterfactualValueNet::load(
                &cli.net,
                query_size(&game),
                game.num_hands(),
                HIDDEN_DIM,
                &device,
            )
        })
        .collect::<Result<Vec<_>, _>>()?;
    let locker = Arc::new(ModelLocker::new(replicas));
    let replay = Arc::new(PrioritizedReplay::new(
        REPLAY_CAPACITY,
        PRIORITY_EXPONENT,
        IMPORTANCE_EXPONENT,
    ));
    let value_net: Arc<dyn ValueNet> =
        Arc::new(BufferedValueNet::new(locker, replay.clone()));

    let params = RecursiveSolvingParams {
        subgame_params: SubgameSolvingParams {
            num_iters: cli.fp_iters,
            max_depth: cli.mdp_depth,
            linear_update: true,
            optimistic: false,
            ..SubgameSolvingParams::default()
        },
        ..RecursiveSolvingParams::default()
    };

    println!("starting {} workers", cli.num_threads);
    let pool = WorkerPool::spawn(cli.num_threads, params, value_net);

    let progress = ProgressBar::new(cli.num_cycles as u64);
    progress.set_style(ProgressStyle::with_template(
        "{bar:30} {pos}/{len} cycles {msg}",
    )?);
    let start = Instant::now();
    for _ in 0..cli.num_cycles {
        std::thread::sleep(Duration::from_secs(CYCLE_SECS));
        let secs = start.elapsed().as_secs_f64();
        let added = replay.num_added();
        progress.set_message(format!(
            "items={added} per_second={:.1}",
            added as f64 / secs
        ));
        progress.inc(1);
    }
    progress.finish();

    pool.terminate();
    pool.join();
    println!(
        "done: {} examples in {:.1}s",
        replay.num_added(),
        start.elapsed().as_secs_f64()
    );
    Ok(())
}
