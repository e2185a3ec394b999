use serde::{Deserialize, Serialize};

use crate::error::{FeedbackError, FeedbackResult};
use crate::params::EffectParameters;

/// Name of the blend program shipped with every device.
pub const DEFAULT_BLEND_PROGRAM: &str = "feedback";

/// How each frame is composited with the delay buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CompositeStrategy {
    /// Blend source with the transformed delay buffer into a temporary target,
    /// which then becomes the delay buffer. Trails compound indefinitely.
    #[default]
    RecursiveEcho,
    /// Copy the source into the delay buffer and pass it through unchanged.
    DoubleBlit,
    /// Pre-record the feedback draw once and replay it at an insertion point.
    CommandList,
}

impl std::fmt::Display for CompositeStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CompositeStrategy::RecursiveEcho => write!(f, "recursive_echo"),
            CompositeStrategy::DoubleBlit => write!(f, "double_blit"),
            CompositeStrategy::CommandList => write!(f, "command_list"),
        }
    }
}

/// Point in the camera pipeline a recorded command is registered against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum InsertionPoint {
    BeforeForwardAlpha,
    #[default]
    BeforeImageEffects,
}

impl std::fmt::Display for InsertionPoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InsertionPoint::BeforeForwardAlpha => write!(f, "before_forward_alpha"),
            InsertionPoint::BeforeImageEffects => write!(f, "before_image_effects"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    /// GPU when an adapter is available, CPU otherwise.
    #[default]
    Auto,
    Cpu,
    Gpu,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct EffectSettings {
    pub strategy: CompositeStrategy,
    /// Blend program to resolve on the device.
    pub program: String,
    /// Weight of the feedback sample against the source, baked into the program.
    pub persistence: f32,
    pub insertion_point: InsertionPoint,
}

impl Default for EffectSettings {
    fn default() -> Self {
        Self {
            strategy: CompositeStrategy::default(),
            program: DEFAULT_BLEND_PROGRAM.to_string(),
            persistence: 0.5,
            insertion_point: InsertionPoint::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct RenderSettings {
    pub backend: BackendKind,
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize, Serialize)]
pub struct FeedbackConfig {
    #[serde(default)]
    pub effect: EffectSettings,
    #[serde(default)]
    pub parameters: EffectParameters,
    #[serde(default)]
    pub render: RenderSettings,
}

impl FeedbackConfig {
    /// Parse a config from TOML. Out-of-range parameters are clamped with a warning.
    pub fn from_toml(contents: &str) -> FeedbackResult<Self> {
        let mut config: FeedbackConfig =
            toml::from_str(contents).map_err(|e| FeedbackError::Config(e.to_string()))?;
        if let Err(e) = config.parameters.validate() {
            tracing::warn!("{}; clamping parameters into range", e);
            config.parameters = config.parameters.clamped();
        }
        if !(0.0..=1.0).contains(&config.effect.persistence) {
            return Err(FeedbackError::Config(format!(
                "persistence must be within [0, 1], got {}",
                config.effect.persistence
            )));
        }
        if config.effect.program.trim().is_empty() {
            return Err(FeedbackError::Config("program name is empty".into()));
        }
        Ok(config)
    }

    pub fn to_toml(&self) -> FeedbackResult<String> {
        toml::to_string_pretty(self).map_err(|e| FeedbackError::Config(e.to_string()))
    }

    pub fn load_from_file(path: &std::path::Path) -> FeedbackResult<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml(&contents)
    }

    pub fn save_to_file(&self, path: &std::path::Path) -> FeedbackResult<()> {
        std::fs::write(path, self.to_toml()?)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Color;

    #[test]
    fn test_empty_config_is_default() {
        let config = FeedbackConfig::from_toml("").unwrap();
        assert_eq!(config, FeedbackConfig::default());
        assert_eq!(config.effect.strategy, CompositeStrategy::RecursiveEcho);
        assert_eq!(config.effect.program, "feedback");
        assert_eq!(config.render.backend, BackendKind::Auto);
    }

    #[test]
    fn test_full_config() {
        let config = FeedbackConfig::from_toml(
            r##"
[effect]
strategy = "command_list"
program = "feedback"
persistence = 0.8
insertion_point = "before_forward_alpha"

[parameters]
color = "#FF8000"
offset_x = 0.25
rotation_degrees = -2.0
scale = 1.01
jaggies = true

[render]
backend = "cpu"
"##,
        )
        .unwrap();
        assert_eq!(config.effect.strategy, CompositeStrategy::CommandList);
        assert_eq!(config.effect.insertion_point, InsertionPoint::BeforeForwardAlpha);
        assert_eq!(config.effect.persistence, 0.8);
        assert_eq!(config.parameters.color.to_rgba8(), [255, 128, 0, 255]);
        assert_eq!(config.parameters.offset_x, 0.25);
        assert_eq!(config.parameters.offset_y, 0.0);
        assert!(config.parameters.jaggies);
        assert_eq!(config.render.backend, BackendKind::Cpu);
    }

    #[test]
    fn test_out_of_range_parameters_are_clamped() {
        let config = FeedbackConfig::from_toml("[parameters]\nscale = 3.0\noffset_y = -4.0").unwrap();
        assert_eq!(config.parameters.scale, 1.05);
        assert_eq!(config.parameters.offset_y, -1.0);
    }

    #[test]
    fn test_rejects_bad_persistence_and_program() {
        assert!(FeedbackConfig::from_toml("[effect]\npersistence = 1.5").is_err());
        assert!(FeedbackConfig::from_toml("[effect]\nprogram = \"  \"").is_err());
        assert!(FeedbackConfig::from_toml("[effect]\nstrategy = \"sideways\"").is_err());
    }

    #[test]
    fn test_toml_round_trip_keeps_strategy_and_color() {
        let mut config = FeedbackConfig::default();
        config.effect.strategy = CompositeStrategy::DoubleBlit;
        config.parameters.color = Color::rgb(0.0, 1.0, 0.0);
        let text = config.to_toml().unwrap();
        assert!(text.contains("double_blit"));
        assert!(text.contains("#00FF00"));
        let back = FeedbackConfig::from_toml(&text).unwrap();
        assert_eq!(back.effect.strategy, CompositeStrategy::DoubleBlit);
        assert_eq!(back.parameters.color, config.parameters.color);
    }
}
