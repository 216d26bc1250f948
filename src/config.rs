use std::path::Path;

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::machine::{
    DEFAULT_CYCLES_PER_UPDATE, DEFAULT_STEP_BUDGET, DEFAULT_STEP_OVER_LIMIT, RunSettings,
};
use crate::undo::DEFAULT_UNDO_CAPACITY;
use crate::vice::protocol::DEFAULT_PORT;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DebuggerConfig {
    #[serde(default = "default_undo_capacity")]
    pub undo_capacity: usize,
    #[serde(default = "default_cycles_per_update")]
    pub cycles_per_update: u64,
    #[serde(default = "default_step_budget")]
    pub step_over_budget: u64,
    #[serde(default = "default_step_over_limit")]
    pub step_over_limit: u64,
    #[serde(default = "default_step_budget")]
    pub run_budget: u64,
    #[serde(default = "default_vice_host")]
    pub vice_host: String,
    #[serde(default = "default_vice_port")]
    pub vice_port: u16,
    #[serde(default = "default_true")]
    pub accept_vice_symbols: bool,
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_undo_capacity() -> usize {
    DEFAULT_UNDO_CAPACITY
}

fn default_cycles_per_update() -> u64 {
    DEFAULT_CYCLES_PER_UPDATE
}

fn default_step_budget() -> u64 {
    DEFAULT_STEP_BUDGET
}

fn default_step_over_limit() -> u64 {
    DEFAULT_STEP_OVER_LIMIT
}

fn default_vice_host() -> String {
    "127.0.0.1".to_string()
}

fn default_vice_port() -> u16 {
    DEFAULT_PORT
}

fn default_true() -> bool {
    true
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for DebuggerConfig {
    fn default() -> Self {
        Self {
            undo_capacity: DEFAULT_UNDO_CAPACITY,
            cycles_per_update: DEFAULT_CYCLES_PER_UPDATE,
            step_over_budget: DEFAULT_STEP_BUDGET,
            step_over_limit: DEFAULT_STEP_OVER_LIMIT,
            run_budget: DEFAULT_STEP_BUDGET,
            vice_host: default_vice_host(),
            vice_port: DEFAULT_PORT,
            accept_vice_symbols: true,
            log_level: default_log_level(),
        }
    }
}

impl DebuggerConfig {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let data = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        let config = serde_json::from_str(&data)
            .with_context(|| format!("Invalid config {}", path.display()))?;
        Ok(config)
    }

    /// Loads `path` if given, falling back to defaults when it is missing.
    pub fn load_or_default(path: Option<&Path>) -> anyhow::Result<Self> {
        match path {
            Some(path) if path.exists() => Self::load(path),
            Some(path) => {
                log::warn!("Config {} not found, using defaults", path.display());
                Ok(Self::default())
            }
            None => Ok(Self::default()),
        }
    }

    pub fn run_settings(&self) -> RunSettings {
        RunSettings {
            undo_capacity: self.undo_capacity,
            cycles_per_update: self.cycles_per_update.max(1),
            step_over_budget: self.step_over_budget,
            step_over_limit: self.step_over_limit.max(1),
            run_budget: self.run_budget,
        }
    }

    pub fn vice_address(&self) -> String {
        format!("{}:{}", self.vice_host, self.vice_port)
    }

    pub fn level_filter(&self) -> log::LevelFilter {
        self.log_level.parse().unwrap_or(log::LevelFilter::Info)
    }
}
