//! Agent configuration stored as TOML (default `stepwise.toml`).

use std::fs;
use std::path::Path;

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};

use crate::core::classifier::StrategyToggles;

/// Agent configuration (TOML).
///
/// Missing fields default to conservative values: approval required, three
/// retries, every strategy enabled.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct AgentConfig {
    /// Ask before running any command that passes verification.
    pub require_approval: bool,

    /// Approve every command without asking. Overrides `require_approval`;
    /// verifier warnings are still logged.
    pub auto_approve: bool,

    /// Attempts per command (first run plus retries).
    pub max_retries: u32,

    /// Wall-clock limit for a single shell command.
    pub command_timeout_secs: u64,

    /// Truncate captured stdout/stderr beyond this many bytes.
    pub output_limit_bytes: usize,

    /// Extra model turns the assistant may take after executing tagged commands.
    pub max_followups: u32,

    /// Upper bound on steps accepted from a model-generated plan.
    pub max_plan_steps: usize,

    pub strategy: StrategyConfig,
    pub react: ReactConfig,
    pub history: HistoryConfig,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct StrategyConfig {
    pub use_cot: bool,
    pub use_react: bool,
    pub use_planning: bool,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ReactConfig {
    pub max_iterations: u32,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct HistoryConfig {
    /// Executor history is halved once it grows past this many entries.
    pub cap: usize,
    /// Bytes of command output kept per executor history entry.
    pub record_output_bytes: usize,
    /// Bytes of result text kept per session execution record.
    pub result_bytes: usize,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            require_approval: true,
            auto_approve: false,
            max_retries: 3,
            command_timeout_secs: 300,
            output_limit_bytes: 100_000,
            max_followups: 5,
            max_plan_steps: 10,
            strategy: StrategyConfig::default(),
            react: ReactConfig::default(),
            history: HistoryConfig::default(),
        }
    }
}

impl Default for StrategyConfig {
    fn default() -> Self {
        Self {
            use_cot: true,
            use_react: true,
            use_planning: true,
        }
    }
}

impl Default for ReactConfig {
    fn default() -> Self {
        Self { max_iterations: 10 }
    }
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            cap: 100,
            record_output_bytes: 200,
            result_bytes: 500,
        }
    }
}

impl From<StrategyConfig> for StrategyToggles {
    fn from(cfg: StrategyConfig) -> Self {
        Self {
            use_planning: cfg.use_planning,
            use_react: cfg.use_react,
            use_cot: cfg.use_cot,
        }
    }
}

impl AgentConfig {
    pub fn validate(&self) -> Result<()> {
        if self.max_retries == 0 {
            return Err(anyhow!("max_retries must be > 0"));
        }
        if self.command_timeout_secs == 0 {
            return Err(anyhow!("command_timeout_secs must be > 0"));
        }
        if self.output_limit_bytes == 0 {
            return Err(anyhow!("output_limit_bytes must be > 0"));
        }
        if self.max_plan_steps == 0 {
            return Err(anyhow!("max_plan_steps must be > 0"));
        }
        if self.react.max_iterations == 0 {
            return Err(anyhow!("react.max_iterations must be > 0"));
        }
        if self.history.cap < 2 {
            return Err(anyhow!("history.cap must be >= 2"));
        }
        Ok(())
    }

    pub fn toggles(&self) -> StrategyToggles {
        self.strategy.into()
    }
}

/// Load config from a TOML file.
///
/// If the file is missing, returns `AgentConfig::default()`.
pub fn load_config(path: &Path) -> Result<AgentConfig> {
    if !path.exists() {
        let cfg = AgentConfig::default();
        cfg.validate()?;
        return Ok(cfg);
    }
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let cfg: AgentConfig =
        toml::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
    cfg.validate()
        .with_context(|| format!("validate {}", path.display()))?;
    Ok(cfg)
}

/// Atomically write config to disk (temp file + rename).
pub fn write_config(path: &Path, cfg: &AgentConfig) -> Result<()> {
    cfg.validate()?;
    let mut buf = toml::to_string_pretty(cfg).context("serialize config toml")?;
    buf.push('\n');
    write_atomic(path, &buf)
}

/// Write `contents` next to `path` and rename it into place.
pub(crate) fn write_atomic(path: &Path, contents: &str) -> Result<()> {
    let parent = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or(Path::new("."));
    fs::create_dir_all(parent).with_context(|| format!("create directory {}", parent.display()))?;
    let mut tmp_name = path
        .file_name()
        .with_context(|| format!("path missing file name {}", path.display()))?
        .to_os_string();
    tmp_name.push(".tmp");
    let tmp_path = parent.join(tmp_name);
    fs::write(&tmp_path, contents).with_context(|| format!("write temp {}", tmp_path.display()))?;
    fs::rename(&tmp_path, path).with_context(|| format!("replace {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_missing_returns_default() {
        let temp = tempfile::tempdir().expect("tempdir");
        let cfg = load_config(&temp.path().join("missing.toml")).expect("load");
        assert_eq!(cfg, AgentConfig::default());
        assert!(cfg.require_approval);
        assert!(!cfg.auto_approve);
    }

    #[test]
    fn write_then_load_round_trips() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("nested").join("stepwise.toml");
        let cfg = AgentConfig {
            auto_approve: true,
            max_retries: 1,
            ..AgentConfig::default()
        };
        write_config(&path, &cfg).expect("write");
        assert_eq!(load_config(&path).expect("load"), cfg);
    }

    #[test]
    fn partial_file_fills_defaults() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("stepwise.toml");
        fs::write(&path, "max_retries = 5\n[strategy]\nuse_react = false\n").expect("write");
        let cfg = load_config(&path).expect("load");
        assert_eq!(cfg.max_retries, 5);
        assert!(!cfg.strategy.use_react);
        assert!(cfg.strategy.use_planning);
        assert_eq!(cfg.react.max_iterations, 10);
    }

    #[test]
    fn zero_retries_is_rejected() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("stepwise.toml");
        fs::write(&path, "max_retries = 0\n").expect("write");
        let err = load_config(&path).unwrap_err();
        assert!(format!("{err:#}").contains("max_retries"));
    }
}
