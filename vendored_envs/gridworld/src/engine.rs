use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;
use tracing::debug;

use crate::instruction::{parse_target, synthesize_instruction};
use crate::types::{
    Action, GridConfig, GridError, Object, Observation, Pos, StepInfo, StepOutcome,
};

/// One object of each color is placed on every reset.
pub const PALETTE: [&str; 3] = ["red", "blue", "green"];

pub const PICK_REWARD: f64 = 0.1;
pub const DROP_REWARD: f64 = 0.05;
pub const SUCCESS_REWARD: f64 = 1.0;

#[derive(Debug, Clone, Serialize)]
pub struct GridWorld {
    config: GridConfig,
    #[serde(skip)]
    rng: StdRng,
    agent_pos: Pos,
    objects: Vec<Object>,
    /// Index into `objects`; the held object's `pos` tracks `agent_pos`.
    held: Option<usize>,
    step_count: u32,
    instruction: String,
    #[serde(skip)]
    ready: bool,
}

impl GridWorld {
    /// Build an unset world. `reset` must be called before `step`.
    pub fn new(config: GridConfig) -> Result<Self, GridError> {
        config.validate()?;
        Ok(Self {
            rng: StdRng::seed_from_u64(config.seed),
            config,
            agent_pos: (0, 0),
            objects: Vec::new(),
            held: None,
            step_count: 0,
            instruction: String::new(),
            ready: false,
        })
    }

    /// Build an already-reset world from explicit positions.
    pub fn from_layout(
        config: GridConfig,
        agent_pos: Pos,
        objects: &[(&str, Pos)],
        instruction: &str,
    ) -> Result<Self, GridError> {
        let mut world = Self::new(config)?;
        let size = world.config.size;
        let in_bounds = |(r, c): Pos| r < size && c < size;
        if !in_bounds(agent_pos) {
            return Err(GridError::InvalidLayout(format!("agent at {agent_pos:?} is outside the grid")));
        }
        for (i, (color, pos)) in objects.iter().enumerate() {
            if !in_bounds(*pos) {
                return Err(GridError::InvalidLayout(format!("{color} at {pos:?} is outside the grid")));
            }
            if objects[..i].iter().any(|(c, _)| c == color) {
                return Err(GridError::InvalidLayout(format!("duplicate color {color}")));
            }
            if objects[..i].iter().any(|(_, p)| p == pos) {
                return Err(GridError::InvalidLayout(format!("two objects at {pos:?}")));
            }
        }
        world.agent_pos = agent_pos;
        world.objects = objects
            .iter()
            .map(|(color, pos)| Object { color: color.to_string(), pos: *pos })
            .collect();
        world.instruction = instruction.to_string();
        world.ready = true;
        Ok(world)
    }

    pub fn reset(&mut self, instruction: Option<&str>) -> Observation {
        self.step_count = 0;
        self.held = None;

        // Interior start keeps every movement direction meaningful.
        let hi = self.config.size - 1;
        self.agent_pos = (self.rng.gen_range(1..hi), self.rng.gen_range(1..hi));

        self.objects.clear();
        for color in PALETTE {
            let pos = self.sample_free_cell();
            self.objects.push(Object { color: color.to_string(), pos });
        }

        self.instruction = match instruction {
            Some(s) => s.to_string(),
            None => {
                let color = PALETTE[self.rng.gen_range(0..PALETTE.len())];
                synthesize_instruction(color)
            }
        };
        self.ready = true;

        debug!(agent_pos = ?self.agent_pos, instruction = %self.instruction, "episode reset");
        self.observation()
    }

    pub fn step_index(&mut self, action: i64) -> Result<StepOutcome, GridError> {
        let action = Action::try_from(action)?;
        self.step(action)
    }

    pub fn step(&mut self, action: Action) -> Result<StepOutcome, GridError> {
        if !self.ready {
            return Err(GridError::NotReset);
        }
        self.step_count += 1;
        let mut reward = 0.0;

        match action {
            Action::Up | Action::Down | Action::Left | Action::Right => self.move_agent(action),
            Action::Pick => {
                if self.pick() {
                    reward += PICK_REWARD;
                }
            }
            Action::Drop => {
                if self.drop_held() {
                    reward += DROP_REWARD;
                }
            }
        }

        let success = match (parse_target(&self.instruction), self.held_color()) {
            (Some(target), Some(held)) => target == held,
            _ => false,
        };
        if success {
            reward += SUCCESS_REWARD;
        }
        let truncated = self.step_count >= self.config.max_steps;
        let done = success || truncated;

        let info = StepInfo {
            step: self.step_count,
            holding: self.held_color().map(str::to_string),
            success,
            truncated,
        };
        Ok(StepOutcome { observation: self.observation(), reward, done, info })
    }

    /// Copy the world into an observation that shares nothing with it.
    pub fn observation(&self) -> Observation {
        Observation {
            instruction: self.instruction.clone(),
            agent_pos: self.agent_pos,
            objects: self.objects.clone(),
            holding: self.held_color().map(str::to_string),
            size: self.config.size,
        }
    }

    fn move_agent(&mut self, action: Action) {
        let Some((dr, dc)) = action.delta() else { return };
        let hi = self.config.size as i64 - 1;
        let (r, c) = self.agent_pos;
        let r = (r as i64 + dr).clamp(0, hi) as usize;
        let c = (c as i64 + dc).clamp(0, hi) as usize;
        self.agent_pos = (r, c);
        if let Some(i) = self.held {
            self.objects[i].pos = self.agent_pos;
        }
    }

    fn pick(&mut self) -> bool {
        if self.held.is_some() {
            return false;
        }
        match self.objects.iter().position(|o| o.pos == self.agent_pos) {
            Some(i) => {
                self.held = Some(i);
                true
            }
            None => false,
        }
    }

    fn drop_held(&mut self) -> bool {
        match self.held.take() {
            Some(i) => {
                self.objects[i].pos = self.agent_pos;
                true
            }
            None => false,
        }
    }

    /// Rejection sampling; at most `PALETTE.len() + 1` of at least 25 cells are ever taken.
    fn sample_free_cell(&mut self) -> Pos {
        let size = self.config.size;
        loop {
            let p = (self.rng.gen_range(0..size), self.rng.gen_range(0..size));
            if p != self.agent_pos && !self.objects.iter().any(|o| o.pos == p) {
                return p;
            }
        }
    }

    pub fn config(&self) -> &GridConfig { &self.config }
    pub fn size(&self) -> usize { self.config.size }
    pub fn max_steps(&self) -> u32 { self.config.max_steps }
    pub fn agent_pos(&self) -> Pos { self.agent_pos }
    pub fn objects(&self) -> &[Object] { &self.objects }
    pub fn step_count(&self) -> u32 { self.step_count }
    pub fn instruction(&self) -> &str { &self.instruction }

    pub fn held(&self) -> Option<&Object> {
        self.held.map(|i| &self.objects[i])
    }

    pub fn held_color(&self) -> Option<&str> {
        self.held().map(|o| o.color.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn world(seed: u64) -> GridWorld {
        GridWorld::new(GridConfig { seed, ..Default::default() }).unwrap()
    }

    #[test]
    fn step_before_reset_is_rejected() {
        let mut w = world(0);
        assert_eq!(w.step(Action::Up).unwrap_err(), GridError::NotReset);
    }

    #[test]
    fn reset_places_agent_inside_and_objects_apart() {
        for seed in 0..50 {
            let mut w = world(seed);
            let obs = w.reset(None);
            let (r, c) = obs.agent_pos;
            assert!((1..6).contains(&r) && (1..6).contains(&c));
            assert_eq!(obs.objects.len(), PALETTE.len());
            let mut cells: Vec<Pos> = obs.objects.iter().map(|o| o.pos).collect();
            cells.push(obs.agent_pos);
            cells.sort();
            cells.dedup();
            assert_eq!(cells.len(), PALETTE.len() + 1, "seed {seed}: overlapping placement");
            let target = parse_target(&obs.instruction).expect("synthesized instruction parses");
            assert!(PALETTE.contains(&target.as_str()));
        }
    }

    #[test]
    fn reset_keeps_given_instruction_verbatim() {
        let mut w = world(3);
        let obs = w.reset(Some("Go North!"));
        assert_eq!(obs.instruction, "Go North!");
        assert_eq!(w.step_count(), 0);
        assert!(w.held().is_none());
    }

    #[test]
    fn same_seed_same_episode() {
        let mut a = world(42);
        let mut b = world(42);
        for _ in 0..5 {
            assert_eq!(a.reset(None), b.reset(None));
        }
    }

    #[test]
    fn observation_is_idempotent_and_detached() {
        let mut w = GridWorld::from_layout(
            GridConfig::default(),
            (2, 2),
            &[("red", (2, 2))],
            "pick up the red block",
        )
        .unwrap();
        let before = w.observation();
        assert_eq!(before, w.observation());
        w.step(Action::Pick).unwrap();
        w.step(Action::Down).unwrap();
        assert_eq!(before.agent_pos, (2, 2));
        assert_eq!(before.objects[0].pos, (2, 2));
        assert_eq!(before.holding, None);
    }

    #[test]
    fn layout_validation() {
        let cfg = GridConfig::default();
        assert!(GridWorld::from_layout(cfg.clone(), (7, 0), &[], "").is_err());
        assert!(GridWorld::from_layout(cfg.clone(), (0, 0), &[("red", (1, 1)), ("red", (2, 2))], "").is_err());
        assert!(GridWorld::from_layout(cfg.clone(), (0, 0), &[("red", (1, 1)), ("blue", (1, 1))], "").is_err());
        assert!(GridWorld::from_layout(cfg, (0, 0), &[("red", (1, 1)), ("blue", (1, 2))], "").is_ok());
    }

    #[test]
    fn invalid_index_is_fatal_and_does_not_advance() {
        let mut w = world(0);
        w.reset(None);
        assert_eq!(w.step_index(6).unwrap_err(), GridError::InvalidAction(6));
        assert_eq!(w.step_count(), 0);
        assert!(w.step_index(4).is_ok());
        assert_eq!(w.step_count(), 1);
    }

    #[test]
    fn largest_grid_resets_quickly_and_stays_in_bounds() {
        use crate::types::MAX_GRID_SIZE;
        let mut w = GridWorld::new(GridConfig { size: MAX_GRID_SIZE, seed: 8, ..Default::default() }).unwrap();
        for _ in 0..20 {
            let obs = w.reset(None);
            assert_eq!(obs.size, MAX_GRID_SIZE);
            assert!(obs.objects.iter().all(|o| o.pos.0 < MAX_GRID_SIZE && o.pos.1 < MAX_GRID_SIZE));
            assert!(obs.object_at(obs.agent_pos).is_none());
        }
    }
}
