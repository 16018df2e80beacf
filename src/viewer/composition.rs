use crate::export::EXPORT_FILE_NAME;
use serde::{Deserialize, Serialize};

pub const DEFAULT_MODEL: &str = "sample/olympia.glb";
pub const DEFAULT_DECODER_PATH: &str = "https://www.gstatic.com/draco/versioned/decoders/1.5.7/";

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraSettings {
    pub position: [f32; 3],
    pub target: [f32; 3],
    /// Vertical field of view in degrees.
    pub fov: f32,
    pub near: f32,
    pub far: f32,
}

impl Default for CameraSettings {
    fn default() -> Self {
        Self {
            position: [-8.0, 3.0, 8.0],
            target: [0.0, 0.0, 0.0],
            fov: 75.0,
            near: 0.1,
            far: 1000.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AmbientLight {
    pub intensity: f32,
}

impl Default for AmbientLight {
    fn default() -> Self {
        Self { intensity: 0.5 }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DirectionalLight {
    pub position: [f32; 3],
    pub intensity: f32,
}

impl Default for DirectionalLight {
    fn default() -> Self {
        Self {
            position: [0.0, 0.0, 5.0],
            intensity: 1.0,
        }
    }
}

/// Static scene setup: camera, lights, controls, overlay and asset locations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SceneComposition {
    pub camera: CameraSettings,
    pub ambient_light: AmbientLight,
    pub directional_light: DirectionalLight,
    pub orbit_controls: bool,
    pub stats: bool,
    pub model: String,
    pub decoder_path: String,
    pub export_file_name: String,
}

impl Default for SceneComposition {
    fn default() -> Self {
        Self {
            camera: CameraSettings::default(),
            ambient_light: AmbientLight::default(),
            directional_light: DirectionalLight::default(),
            orbit_controls: true,
            stats: true,
            model: DEFAULT_MODEL.to_string(),
            decoder_path: DEFAULT_DECODER_PATH.to_string(),
            export_file_name: EXPORT_FILE_NAME.to_string(),
        }
    }
}
