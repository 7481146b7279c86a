use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use gridworld_rs::{GridConfig, Trajectory};

/// Read a `GridConfig` from a JSON file, or use defaults when no path is given.
pub fn load_config(path: Option<&Path>) -> Result<GridConfig> {
    let Some(path) = path else {
        return Ok(GridConfig::default());
    };
    let text = fs::read_to_string(path).with_context(|| format!("read config {}", path.display()))?;
    let cfg: GridConfig = serde_json::from_str(&text).with_context(|| format!("parse config {}", path.display()))?;
    Ok(cfg)
}

pub fn save_trajectories(path: &Path, episodes: &[Trajectory]) -> Result<()> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        fs::create_dir_all(dir).with_context(|| format!("create {}", dir.display()))?;
    }
    let json = serde_json::to_string(episodes).context("encode trajectories")?;
    fs::write(path, json).with_context(|| format!("write {}", path.display()))
}

pub fn load_trajectories(path: &Path) -> Result<Vec<Trajectory>> {
    let text = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("parse trajectories {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use gridworld_rs::{generate_demos, GridWorld};
    use std::path::PathBuf;

    fn scratch(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("gridworld-demo-{}-{name}", std::process::id()))
    }

    #[test]
    fn trajectories_survive_a_file_round() {
        let mut world = GridWorld::new(GridConfig::default()).unwrap();
        let demos = generate_demos(&mut world, 2).unwrap();
        let path = scratch("nested").join("demos.json");
        save_trajectories(&path, &demos).unwrap();
        assert_eq!(load_trajectories(&path).unwrap(), demos);
        fs::remove_dir_all(path.parent().unwrap()).ok();
    }

    #[test]
    fn missing_config_path_uses_defaults() {
        assert_eq!(load_config(None).unwrap(), GridConfig::default());
    }

    #[test]
    fn partial_config_file_fills_defaults() {
        let path = scratch("cfg.json");
        fs::write(&path, r#"{"size": 9}"#).unwrap();
        let cfg = load_config(Some(&path)).unwrap();
        assert_eq!(cfg.size, 9);
        assert_eq!(cfg.max_steps, 50);
        fs::remove_file(&path).ok();
    }

    #[test]
    fn unreadable_trajectories_report_the_path() {
        let err = load_trajectories(Path::new("/nonexistent/demos.json")).unwrap_err();
        assert!(format!("{err:#}").contains("/nonexistent/demos.json"));
    }
}
