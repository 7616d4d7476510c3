//! Renderer configuration.

use serde::{Deserialize, Serialize};

/// Configuration options for a [`Renderer`](crate::rendering::Renderer).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RendererConfig {
    pub environment: EnvironmentConfig,
    /// Log statistics for every rendered frame at debug level.
    pub debug: bool,
    /// Log the smoothed frame rate once per second.
    pub show_fps: bool,
    /// Scale the drawing buffer by the pixel ratio of the canvas.
    pub hidpi: bool,
    pub antialias: bool,
    pub fullscreen: bool,
}

/// What is drawn behind the models.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnvironmentConfig {
    pub clear_color: [f32; 4],
    pub skybox: Option<SkyboxConfig>,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkyboxConfig {
    /// ID of the cube texture to sample.
    pub texture_id: u32,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            environment: EnvironmentConfig::default(),
            debug: false,
            show_fps: false,
            hidpi: true,
            antialias: true,
            fullscreen: false,
        }
    }
}

impl Default for EnvironmentConfig {
    fn default() -> Self {
        Self {
            clear_color: [0.0, 0.0, 0.0, 1.0],
            skybox: None,
        }
    }
}
