use anyhow::Context;

use crate::foundation::error::FrameResult;

/// Default number of owning containers per class constructed before the leak warning fires.
pub const DEFAULT_LEAK_WARNING_THRESHOLD: u32 = 250;

/// How single-channel float textures are read back to the CPU.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReadbackMode {
    /// Ask the rendering context whether it can read a single float channel.
    #[default]
    Auto,
    /// Always read one float channel per pixel.
    SingleChannel,
    /// Always read four float channels and keep the first.
    FourChannel,
}

/// Runtime configuration shared by every container built against one [`crate::RenderHandle`].
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RenderConfig {
    /// Countdown start for the per-class leak heuristic. Zero disables the warning.
    pub leak_warning_threshold: u32,
    /// Read-back strategy for mask textures.
    pub mask_readback: ReadbackMode,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            leak_warning_threshold: DEFAULT_LEAK_WARNING_THRESHOLD,
            mask_readback: ReadbackMode::Auto,
        }
    }
}

impl RenderConfig {
    /// Parse a configuration from JSON. Missing fields take their defaults.
    pub fn from_json_str(s: &str) -> FrameResult<Self> {
        let cfg = serde_json::from_str(s).context("parse render config json")?;
        Ok(cfg)
    }

    /// Serialize to pretty JSON.
    pub fn to_json_string(&self) -> FrameResult<String> {
        let s = serde_json::to_string_pretty(self).context("serialize render config json")?;
        Ok(s)
    }
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/config.rs"]
mod tests;
