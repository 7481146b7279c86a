mod files;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use gridworld_env::agent::{MaskedAgent, TabularModel};
use gridworld_rs::{
    generate_demos, render_text, Dataset, ExpertPolicy, GridConfig, GridWorld, Policy, RecoveringController,
    Signature,
};
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::files::{load_config, load_trajectories, save_trajectories};

#[derive(Parser, Debug)]
#[command(name = "gridworld-demo", about = "Gridworld pick-up tasks: demos, rollouts, frames")]
struct Cli {
    /// JSON file with grid settings (size, max_steps, seed)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[arg(long, global = true)]
    seed: Option<u64>,
    #[arg(long, global = true)]
    size: Option<usize>,
    #[arg(long, global = true)]
    max_steps: Option<u32>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Record oracle episodes to a trajectory file
    Generate {
        #[arg(long, default_value_t = 200)]
        episodes: usize,
        #[arg(long, default_value = "data/demo_trajectories.json")]
        output: PathBuf,
    },
    /// Drive one episode with an action source and oracle recovery
    Rollout {
        #[arg(long, value_enum, default_value_t = PolicyArg::Learned)]
        policy: PolicyArg,
        #[arg(long)]
        instruction: Option<String>,
        #[arg(long, default_value_t = 25)]
        steps: usize,
        /// Train the learned policy from this file instead of fresh demos
        #[arg(long)]
        demos: Option<PathBuf>,
        #[arg(long, default_value_t = 200)]
        demo_episodes: usize,
    },
    /// Print the text frame after a reset
    Render {
        #[arg(long)]
        instruction: Option<String>,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum PolicyArg {
    Expert,
    Learned,
}

impl Cli {
    fn grid_config(&self) -> Result<GridConfig> {
        let mut cfg = load_config(self.config.as_deref())?;
        if let Some(seed) = self.seed {
            cfg.seed = seed;
        }
        if let Some(size) = self.size {
            cfg.size = size;
        }
        if let Some(max_steps) = self.max_steps {
            cfg.max_steps = max_steps;
        }
        cfg.validate()?;
        Ok(cfg)
    }
}

fn learned_policy(cfg: &GridConfig, demos: Option<&PathBuf>, episodes: usize) -> Result<MaskedAgent<TabularModel>> {
    let trajectories = match demos {
        Some(path) => load_trajectories(path)?,
        None => {
            let mut demo_world = GridWorld::new(cfg.clone())?;
            generate_demos(&mut demo_world, episodes)?
        }
    };
    let dataset = Dataset::from_trajectories(&trajectories);
    let model = TabularModel::train(&dataset);
    info!(episodes = trajectories.len(), samples = dataset.len(), keys = model.num_keys(), "trained tabular policy");
    Ok(MaskedAgent::new(model))
}

fn describe(sig: &Signature) -> String {
    format!("({},{}) {}", sig.agent_pos.0, sig.agent_pos.1, sig.holding.as_deref().unwrap_or("-"))
}

fn rollout(cfg: GridConfig, policy: Box<dyn Policy>, instruction: Option<&str>, steps: usize) -> Result<()> {
    let mut world = GridWorld::new(cfg)?;
    let mut obs = world.reset(instruction);
    println!("{}\n", render_text(&obs));

    let mut controller = RecoveringController::new(policy);
    let mut total = 0.0;
    for t in 0..steps {
        let before = Signature::from(&obs);
        let step = controller.step(&mut world, &obs)?;
        let after = Signature::from(&step.outcome.observation);
        total += step.outcome.reward;
        let recovery = match step.recovery {
            Some(reason) => format!(" recovery={reason:?} proposed={}", step.proposed),
            None => String::new(),
        };
        println!(
            "t={t:>2} action={:<5} {} -> {} reward={:.2} changed={}{recovery}",
            step.action.name(),
            describe(&before),
            describe(&after),
            step.outcome.reward,
            before != after,
        );
        let done = step.outcome.done;
        let success = step.outcome.info.success;
        obs = step.outcome.observation;
        if done {
            println!("\n{}", render_text(&obs));
            println!("done: success={success} steps={} total_reward={total:.2}", world.step_count());
            return Ok(());
        }
    }
    println!("\nstopped after {steps} control steps; total_reward={total:.2}");
    Ok(())
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();
    let cli = Cli::parse();
    let cfg = cli.grid_config().context("grid config")?;

    match &cli.command {
        Command::Generate { episodes, output } => {
            let mut world = GridWorld::new(cfg)?;
            let demos = generate_demos(&mut world, *episodes)?;
            save_trajectories(output, &demos)?;
            let steps: usize = demos.iter().map(Vec::len).sum();
            info!(episodes = demos.len(), steps, output = %output.display(), "saved demonstrations");
        }
        Command::Rollout { policy, instruction, steps, demos, demo_episodes } => {
            let source: Box<dyn Policy> = match policy {
                PolicyArg::Expert => Box::new(ExpertPolicy),
                PolicyArg::Learned => Box::new(learned_policy(&cfg, demos.as_ref(), *demo_episodes)?),
            };
            rollout(cfg, source, instruction.as_deref(), *steps)?;
        }
        Command::Render { instruction } => {
            let mut world = GridWorld::new(cfg)?;
            println!("{}", render_text(&world.reset(instruction.as_deref())));
        }
    }
    Ok(())
}
