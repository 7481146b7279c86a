//! Gridworld pick-up episodes hosted as `vla_core` sessions.
//!
//! Tools (first call of each step is used):
//! - `reset` `{instruction?}`: start a new episode
//! - `interact` `{action}` or `{actions: [...]}`: apply actions by name or id
//! - `agent` `{}`: one control-loop step with the configured action source

pub mod agent;

use async_trait::async_trait;
use gridworld_rs::{
    generate_demos, render_text, Action, Dataset, ExpertPolicy, GridConfig, GridError, GridWorld,
    Policy, RecoveringController, RecoveryReason, StepOutcome,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value as Json};
use std::sync::Arc;
use tracing::info;
use vla_core::{
    make_snapshot, register_environment_with_config, EngineError, Environment, Observation,
    ReproducibleEngine, Snapshot, ToolCall,
};

use crate::agent::{MaskedAgent, TabularModel};

pub const ENV_NAME: &str = "GridWorld";

/// Upper bound on demonstration episodes trained at session creation.
pub const MAX_DEMO_EPISODES: usize = 500;

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum PolicyKind {
    /// Oracle policy; never needs recovery.
    Expert,
    /// Masked tabular model trained on expert demonstrations.
    #[default]
    Learned,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub size: usize,
    pub max_steps: u32,
    pub seed: u64,
    /// Instruction used by `initialize`; synthesized when absent.
    pub instruction: Option<String>,
    pub policy: PolicyKind,
    /// Expert episodes used to train the learned policy.
    pub demo_episodes: usize,
}

impl Default for Config {
    fn default() -> Self {
        let grid = GridConfig::default();
        Self {
            size: grid.size,
            max_steps: grid.max_steps,
            seed: grid.seed,
            instruction: None,
            policy: PolicyKind::default(),
            demo_episodes: 200,
        }
    }
}

impl Config {
    pub fn grid(&self) -> GridConfig {
        GridConfig { size: self.size, max_steps: self.max_steps, seed: self.seed }
    }

    pub fn validate(&self) -> Result<(), EngineError> {
        self.grid().validate().map_err(map_grid_err)?;
        if self.demo_episodes > MAX_DEMO_EPISODES {
            return Err(EngineError::Validation(format!(
                "demo_episodes must be at most {MAX_DEMO_EPISODES}, got {}",
                self.demo_episodes
            )));
        }
        Ok(())
    }
}

type ActionSource = Box<dyn Policy + Send + Sync>;

fn map_grid_err(err: GridError) -> EngineError {
    EngineError::Validation(err.to_string())
}

/// Build the configured action source. The learned policy is trained on demos
/// from an independent world with the same grid settings.
pub fn build_policy(cfg: &Config) -> Result<ActionSource, GridError> {
    match cfg.policy {
        PolicyKind::Expert => Ok(Box::new(ExpertPolicy)),
        PolicyKind::Learned => {
            let mut demo_world = GridWorld::new(cfg.grid())?;
            let demos = generate_demos(&mut demo_world, cfg.demo_episodes)?;
            let model = TabularModel::train(&Dataset::from_trajectories(&demos));
            info!(episodes = cfg.demo_episodes, keys = model.num_keys(), "trained tabular policy");
            Ok(Box::new(MaskedAgent::new(model)))
        }
    }
}

fn blank_to_none(s: Option<&str>) -> Option<&str> {
    s.map(str::trim).filter(|s| !s.is_empty())
}

fn action_from_json(v: &Json) -> Result<Action, EngineError> {
    if let Some(name) = v.as_str() {
        return Action::from_name(name).map_err(map_grid_err);
    }
    if let Some(idx) = v.as_i64() {
        return Action::try_from(idx).map_err(map_grid_err);
    }
    Err(EngineError::Validation(format!("action must be a name or an integer, got {v}")))
}

pub struct GridWorldEnvironment {
    config: Config,
    world: GridWorld,
    controller: RecoveringController<ActionSource>,
    current: gridworld_rs::Observation,
    reward_last: f64,
    total_reward: f64,
    success: bool,
    truncated: bool,
    last_action: Option<Action>,
    last_proposed: Option<Action>,
    last_recovery: Option<RecoveryReason>,
}

impl GridWorldEnvironment {
    pub fn new(config: Config) -> Result<Self, EngineError> {
        config.validate()?;
        let mut world = GridWorld::new(config.grid()).map_err(map_grid_err)?;
        let policy = build_policy(&config).map_err(map_grid_err)?;
        let current = world.reset(config.instruction.as_deref());
        Ok(Self {
            config,
            world,
            controller: RecoveringController::new(policy),
            current,
            reward_last: 0.0,
            total_reward: 0.0,
            success: false,
            truncated: false,
            last_action: None,
            last_proposed: None,
            last_recovery: None,
        })
    }

    fn is_done(&self) -> bool {
        self.success || self.truncated
    }

    fn reset_episode(&mut self, instruction: Option<&str>) {
        self.current = self.world.reset(blank_to_none(instruction));
        self.controller.reset();
        self.reward_last = 0.0;
        self.total_reward = 0.0;
        self.success = false;
        self.truncated = false;
        self.last_action = None;
        self.last_proposed = None;
        self.last_recovery = None;
        info!(instruction = %self.current.instruction, agent_pos = ?self.current.agent_pos, "gridworld episode reset");
    }

    fn record(&mut self, outcome: StepOutcome) {
        self.reward_last = outcome.reward;
        self.total_reward += outcome.reward;
        self.success |= outcome.info.success;
        self.truncated |= outcome.info.truncated;
        self.current = outcome.observation;
    }

    fn ensure_running(&self) -> Result<(), EngineError> {
        if self.is_done() {
            return Err(EngineError::Validation("episode is over; reset first".into()));
        }
        Ok(())
    }

    fn apply_manual(&mut self, action: Action) -> Result<(), EngineError> {
        let out = self.world.step(action).map_err(map_grid_err)?;
        self.last_action = Some(action);
        self.last_proposed = Some(action);
        self.last_recovery = None;
        self.record(out);
        Ok(())
    }

    fn apply_agent(&mut self) -> Result<(), EngineError> {
        let step = self
            .controller
            .step(&mut self.world, &self.current)
            .map_err(map_grid_err)?;
        self.last_action = Some(step.action);
        self.last_proposed = Some(step.proposed);
        self.last_recovery = step.recovery;
        self.record(step.outcome);
        Ok(())
    }

    fn snapshot_obs(&self, event: &str) -> Observation {
        let obs = &self.current;
        let objects: Vec<Json> = obs
            .objects
            .iter()
            .map(|o| json!({"color": o.color, "pos": [o.pos.0, o.pos.1]}))
            .collect();
        let data = json!({
            "instruction": obs.instruction,
            "agent_pos": [obs.agent_pos.0, obs.agent_pos.1],
            "objects": objects,
            "holding": obs.holding,
            "size": obs.size,
            "board_text": render_text(obs),
            "step_count": self.world.step_count(),
            "max_steps": self.world.max_steps(),
            "reward_last": self.reward_last,
            "total_reward": self.total_reward,
            "last_action": self.last_action.map(i64::from),
            "last_action_name": self.last_action.map(Action::name),
            "proposed_action": self.last_proposed.map(i64::from),
            "recovery": self.last_recovery,
            "recoveries": self.controller.recoveries(),
            "event": event,
        });
        Observation { terminated: self.success, truncated: self.truncated, data }
    }
}

impl ReproducibleEngine for GridWorldEnvironment {
    fn serialize_engine(&self) -> Result<Json, EngineError> {
        let mut data = serde_json::to_value(&self.world)
            .map_err(|e| EngineError::Internal(format!("serialize world: {e}")))?;
        data["total_reward"] = json!(self.total_reward);
        data["policy"] = json!(self.config.policy);
        Ok(data)
    }

    fn engine_name(&self) -> String {
        "gridworld".into()
    }
}

#[async_trait]
impl Environment for GridWorldEnvironment {
    async fn initialize(&mut self) -> Result<Observation, EngineError> {
        let instruction = self.config.instruction.clone();
        self.reset_episode(instruction.as_deref());
        Ok(self.snapshot_obs("initialize"))
    }

    async fn step(&mut self, tool_calls: Vec<ToolCall>) -> Result<Observation, EngineError> {
        let call = tool_calls
            .first()
            .ok_or_else(|| EngineError::Validation("no tool_calls".into()))?;
        let args = &call.args;
        match call.tool.as_str() {
            "reset" => {
                let instruction = args.get("instruction").and_then(|v| v.as_str());
                self.reset_episode(instruction);
                Ok(self.snapshot_obs("reset"))
            }
            "interact" => {
                self.ensure_running()?;
                if let Some(v) = args.get("action") {
                    let action = action_from_json(v)?;
                    self.apply_manual(action)?;
                } else if let Some(arr) = args.get("actions").and_then(|v| v.as_array()) {
                    // Validate the whole batch before touching the world
                    let actions = arr.iter().map(action_from_json).collect::<Result<Vec<_>, _>>()?;
                    for action in actions {
                        self.apply_manual(action)?;
                        if self.is_done() {
                            break;
                        }
                    }
                } else {
                    return Err(EngineError::Validation("missing 'action' or 'actions'".into()));
                }
                Ok(self.snapshot_obs("step"))
            }
            "agent" => {
                self.ensure_running()?;
                self.apply_agent()?;
                Ok(self.snapshot_obs("agent"))
            }
            other => Err(EngineError::Validation(format!("unknown tool: {other}"))),
        }
    }

    async fn checkpoint(&self) -> Result<Snapshot, EngineError> {
        make_snapshot(self, 1)
    }

    async fn terminate(&mut self) -> Result<Observation, EngineError> {
        self.truncated = true;
        Ok(self.snapshot_obs("terminate"))
    }
}

/// Registration helper so callers can create sessions via the core registry.
pub fn register_default_env() {
    register_environment_with_config(
        ENV_NAME,
        Arc::new(|cfg| {
            let cfg: Config = match cfg {
                Some(v) => serde_json::from_value(v).map_err(|e| EngineError::Validation(format!("bad config: {e}")))?,
                None => Config::default(),
            };
            Ok(Box::new(GridWorldEnvironment::new(cfg)?) as Box<dyn Environment>)
        }),
    );
}
