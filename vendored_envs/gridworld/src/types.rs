use serde::{Deserialize, Serialize};

/// Grid cell as `(row, col)`.
pub type Pos = (usize, usize);

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum GridError {
    #[error("invalid action index {0} (expected 0..=5)")]
    InvalidAction(i64),
    #[error("invalid action name '{0}'")]
    InvalidActionName(String),
    #[error("step called before reset")]
    NotReset,
    #[error("invalid config: {0}")]
    InvalidConfig(String),
    #[error("invalid layout: {0}")]
    InvalidLayout(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "i64", try_from = "i64")]
#[repr(u8)]
pub enum Action {
    Up = 0,
    Down = 1,
    Left = 2,
    Right = 3,
    Pick = 4,
    Drop = 5,
}

impl Action {
    pub const ALL: [Action; 6] = [
        Action::Up,
        Action::Down,
        Action::Left,
        Action::Right,
        Action::Pick,
        Action::Drop,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    /// Row/column displacement for movement actions; `None` for PICK and DROP.
    pub fn delta(self) -> Option<(i64, i64)> {
        match self {
            Action::Up => Some((-1, 0)),
            Action::Down => Some((1, 0)),
            Action::Left => Some((0, -1)),
            Action::Right => Some((0, 1)),
            Action::Pick | Action::Drop => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Action::Up => "up",
            Action::Down => "down",
            Action::Left => "left",
            Action::Right => "right",
            Action::Pick => "pick",
            Action::Drop => "drop",
        }
    }

    pub fn from_name(name: &str) -> Result<Self, GridError> {
        Ok(match name.trim().to_ascii_lowercase().as_str() {
            "up" | "move_up" => Action::Up,
            "down" | "move_down" => Action::Down,
            "left" | "move_left" => Action::Left,
            "right" | "move_right" => Action::Right,
            "pick" | "pickup" => Action::Pick,
            "drop" => Action::Drop,
            _ => return Err(GridError::InvalidActionName(name.to_string())),
        })
    }
}

impl TryFrom<i64> for Action {
    type Error = GridError;
    fn try_from(v: i64) -> Result<Self, Self::Error> {
        Ok(match v {
            0 => Action::Up,
            1 => Action::Down,
            2 => Action::Left,
            3 => Action::Right,
            4 => Action::Pick,
            5 => Action::Drop,
            _ => return Err(GridError::InvalidAction(v)),
        })
    }
}

impl From<Action> for i64 {
    fn from(a: Action) -> i64 {
        a as i64
    }
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.name().to_ascii_uppercase())
    }
}

/// A colored block. The world's held slot refers to one by index; observations carry copies.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Object {
    pub color: String,
    pub pos: Pos,
}

fn default_size() -> usize {
    GridConfig::default().size
}

/// External snapshot of the world. Owns all of its data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Observation {
    pub instruction: String,
    pub agent_pos: Pos,
    pub objects: Vec<Object>,
    pub holding: Option<String>,
    /// Grid side length, carried so consumers never infer it from coordinates.
    #[serde(default = "default_size")]
    pub size: usize,
}

impl Observation {
    pub fn object_at(&self, pos: Pos) -> Option<&Object> {
        self.objects.iter().find(|o| o.pos == pos)
    }

    pub fn find_object(&self, color: &str) -> Option<&Object> {
        self.objects.iter().find(|o| o.color == color)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepInfo {
    pub step: u32,
    pub holding: Option<String>,
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub truncated: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepOutcome {
    pub observation: Observation,
    pub reward: f64,
    pub done: bool,
    pub info: StepInfo,
}

/// Largest accepted grid side; observation and render cost grow with its square.
pub const MAX_GRID_SIZE: usize = 64;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GridConfig {
    pub size: usize,
    pub max_steps: u32,
    pub seed: u64,
}

impl Default for GridConfig {
    fn default() -> Self {
        Self { size: 7, max_steps: 50, seed: 0 }
    }
}

impl GridConfig {
    pub fn validate(&self) -> Result<(), GridError> {
        if self.size < 5 {
            return Err(GridError::InvalidConfig(format!("size must be at least 5, got {}", self.size)));
        }
        if self.size > MAX_GRID_SIZE {
            return Err(GridError::InvalidConfig(format!(
                "size must be at most {MAX_GRID_SIZE}, got {}",
                self.size
            )));
        }
        if self.max_steps == 0 {
            return Err(GridError::InvalidConfig("max_steps must be positive".into()));
        }
        Ok(())
    }
}
