// Copyright (c) 2019-present Dmitry Stepanov and Fyrox Engine contributors.
//
// Permission is hereby granted, free of charge, to any person obtaining a copy
// of this software and associated documentation files (the "Software"), to deal
// in the Software without restriction, including without limitation the rights
// to use, copy, modify, merge, publish, distribute, sublicense, and/or sell
// copies of the Software, and to permit persons to whom the Software is
// furnished to do so, subject to the following conditions:
//
// The above copyright notice and this permission notice shall be included in all
// copies or substantial portions of the Software.
//
// THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND, EXPRESS OR
// IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY,
// FITNESS FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT. IN NO EVENT SHALL THE
// AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM, DAMAGES OR OTHER
// LIABILITY, WHETHER IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING FROM,
// OUT OF OR IN CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER DEALINGS IN THE
// SOFTWARE.

use crate::{
    core::color::Color,
    renderer::technique::{simple, DeferredTechniqueKind, LightLimits},
};
use ron::ser::PrettyConfig;
use serde::{Deserialize, Serialize};
use std::{fs::File, path::Path};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("Settings file I/O failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("Unable to serialize settings: {0}")]
    Ron(#[from] ron::Error),
    #[error("Unable to parse settings: {0}")]
    Parse(#[from] ron::error::SpannedError),
}

/// Everything that affects how a frame is rendered, but not what is rendered. Missing fields
/// are filled with defaults when loading.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RendererSettings {
    pub deferred_technique: DeferredTechniqueKind,
    /// Draw a wireframe cube around every point light.
    pub debug_draw_lights: bool,
    pub background_color: Color,
    /// Depth testing and depth clearing in the geometry pass.
    pub depth_test: bool,
    pub max_point_lights: usize,
    pub max_directional_lights: usize,
}

impl Default for RendererSettings {
    fn default() -> Self {
        Self {
            deferred_technique: DeferredTechniqueKind::LightVolume,
            debug_draw_lights: false,
            background_color: Color::BLACK,
            depth_test: true,
            max_point_lights: simple::MAX_POINT_LIGHTS,
            max_directional_lights: simple::MAX_DIRECTIONAL_LIGHTS,
        }
    }
}

impl RendererSettings {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, SettingsError> {
        let file = File::open(path)?;
        Ok(ron::de::from_reader(file)?)
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), SettingsError> {
        let file = File::create(path)?;
        ron::ser::to_writer_pretty(file, self, PrettyConfig::default())?;
        Ok(())
    }

    /// Light caps of the simple technique, clamped to the sizes of its shader arrays.
    pub fn light_limits(&self) -> LightLimits {
        LightLimits {
            point: self.max_point_lights.min(simple::MAX_POINT_LIGHTS),
            directional: self
                .max_directional_lights
                .min(simple::MAX_DIRECTIONAL_LIGHTS),
        }
    }
}

#[cfg(test)]
mod test {
    use super::{RendererSettings, SettingsError};
    use crate::{
        core::color::Color,
        renderer::technique::{simple, DeferredTechniqueKind},
    };

    #[test]
    fn test_save_load() {
        let path = std::env::temp_dir().join(format!(
            "umbra_renderer_settings_{}.ron",
            std::process::id()
        ));
        let settings = RendererSettings {
            deferred_technique: DeferredTechniqueKind::Simple,
            debug_draw_lights: true,
            background_color: Color::opaque(10, 20, 30),
            depth_test: false,
            max_point_lights: 12,
            max_directional_lights: 2,
        };
        settings.save(&path).unwrap();
        let loaded = RendererSettings::load(&path);
        let _ = std::fs::remove_file(&path);
        assert_eq!(loaded.unwrap(), settings);
    }

    #[test]
    fn test_missing_fields_use_defaults() {
        let settings: RendererSettings =
            ron::from_str("(deferred_technique: LightVolumeInstanced)").unwrap();
        assert_eq!(
            settings.deferred_technique,
            DeferredTechniqueKind::LightVolumeInstanced
        );
        assert!(settings.depth_test);
        assert_eq!(settings.max_point_lights, simple::MAX_POINT_LIGHTS);
    }

    #[test]
    fn test_limits_are_clamped() {
        let settings = RendererSettings {
            max_point_lights: 10_000,
            max_directional_lights: 3,
            ..Default::default()
        };
        let limits = settings.light_limits();
        assert_eq!(limits.point, simple::MAX_POINT_LIGHTS);
        assert_eq!(limits.directional, 3);
    }

    #[test]
    fn test_missing_file() {
        assert!(matches!(
            RendererSettings::load("definitely/not/here/settings.ron"),
            Err(SettingsError::Io(_))
        ));
    }
}
