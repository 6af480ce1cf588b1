//! Autosave configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AutosaveConfig {
    /// Run the background debouncer. Disabled sessions save only when asked.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Quiet period after the last edit before an autosave, in milliseconds
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,

    /// Optional periodic autosave, in milliseconds
    #[serde(default)]
    pub interval_ms: Option<u64>,

    /// Capacity of the lifecycle event channel
    #[serde(default = "default_event_capacity")]
    pub event_capacity: usize,
}

fn default_true() -> bool { true }
fn default_debounce_ms() -> u64 { 2000 }
fn default_event_capacity() -> usize { 64 }

impl Default for AutosaveConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            debounce_ms: default_debounce_ms(),
            interval_ms: None,
            event_capacity: default_event_capacity(),
        }
    }
}

impl AutosaveConfig {
    /// No background task; saves happen on explicit calls only
    pub fn manual() -> Self {
        Self {
            enabled: false,
            ..Default::default()
        }
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn interval(&self) -> Option<Duration> {
        self.interval_ms
            .filter(|ms| *ms > 0)
            .map(Duration::from_millis)
    }
}
