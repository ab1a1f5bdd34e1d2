use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Tunables of a client session. Every field has a default, so a partial
/// JSON object is a valid configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Delay between the last keystroke in a text input and re-evaluation.
    pub keystroke_debounce_ms: u64,
    /// Delay between a settled batch and recalculation of computed fields.
    pub recalc_debounce_ms: u64,
    /// Whether show/hide transitions outside the init pass are animated.
    pub animate: bool,
    /// How many times recalculated values may re-trigger conditional logic
    /// before the session stops following the cascade.
    pub max_cascade_depth: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            keystroke_debounce_ms: 300,
            recalc_debounce_ms: 50,
            animate: true,
            max_cascade_depth: 8,
        }
    }
}

impl EngineConfig {
    /// # Errors
    ///
    /// Returns [`FormLogicError::Json`](crate::FormLogicError::Json) if the
    /// text is not a valid configuration object.
    pub fn from_json(json: &str) -> Result<Self, crate::FormLogicError> {
        Ok(serde_json::from_str(json)?)
    }

    #[must_use]
    pub fn keystroke_debounce(&self) -> Duration {
        Duration::from_millis(self.keystroke_debounce_ms)
    }

    #[must_use]
    pub fn recalc_debounce(&self) -> Duration {
        Duration::from_millis(self.recalc_debounce_ms)
    }

    #[must_use]
    pub fn without_animation(mut self) -> Self {
        self.animate = false;
        self
    }
}
