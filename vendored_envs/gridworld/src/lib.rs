//! Pure gridworld logic crate (no session traits).
//! - Colored objects on a square grid, one agent, a pick-up instruction
//! - `reset`/`step` state machine with reward and termination rules
//! - Oracle policy and a control loop that falls back to it on oscillation or stall
//! - Text rendering, expert demonstrations and dataset flattening

mod engine;
mod expert;
mod instruction;
mod policy;
mod recovery;
mod render;
mod trajectory;
mod types;

pub use engine::{GridWorld, DROP_REWARD, PALETTE, PICK_REWARD, SUCCESS_REWARD};
pub use expert::{expert_action, ExpertPolicy, FALLBACK_ACTION};
pub use instruction::{parse_target, synthesize_instruction};
pub use policy::Policy;
pub use recovery::{
    ControlStep, RecoveringController, RecoveryReason, Signature, SignatureHistory,
    HISTORY_CAPACITY,
};
pub use render::render_text;
pub use trajectory::{
    generate_demos, run_expert_episode, Dataset, Sample, Trajectory, TrajectoryStep,
    PICK_OVERSAMPLE,
};
pub use types::{
    Action, GridConfig, GridError, Object, Observation, Pos, StepInfo, StepOutcome, MAX_GRID_SIZE,
};
