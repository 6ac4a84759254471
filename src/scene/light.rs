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

//! Point and directional lights.
//!
//! Light colors are stored in linear space as floating point triples, so they can exceed one
//! for bright sources. Every light pushes itself into a shader through a set of uniform
//! locations resolved once per program, see [`PointLightUniforms`] and
//! [`DirectionalLightUniforms`].

use crate::{
    core::algebra::{Matrix4, Point3, Vector3},
    graphics::gpu_program::{GpuProgram, GpuProgramBinding, UniformLocation},
};
use serde::{Deserialize, Serialize};

/// Colors shared by every kind of light.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LightColors {
    pub ambient: Vector3<f32>,
    pub diffuse: Vector3<f32>,
    pub specular: Vector3<f32>,
}

impl Default for LightColors {
    fn default() -> Self {
        Self {
            ambient: Vector3::repeat(0.05),
            diffuse: Vector3::repeat(1.0),
            specular: Vector3::repeat(1.0),
        }
    }
}

impl LightColors {
    /// Creates a set of colors derived from a single base color: ambient is a small fraction of
    /// it, diffuse is the color itself and specular is white.
    pub fn from_base(color: Vector3<f32>) -> Self {
        Self {
            ambient: color * 0.05,
            diffuse: color,
            specular: Vector3::repeat(1.0),
        }
    }
}

#[derive(Clone, Debug, Default)]
struct LightColorUniforms {
    ambient: Option<UniformLocation>,
    diffuse: Option<UniformLocation>,
    specular: Option<UniformLocation>,
}

impl LightColorUniforms {
    fn new(program: &dyn GpuProgram, prefix: &str) -> Self {
        Self {
            ambient: program.uniform_location_opt(&format!("{prefix}.ambient")),
            diffuse: program.uniform_location_opt(&format!("{prefix}.diffuse")),
            specular: program.uniform_location_opt(&format!("{prefix}.specular")),
        }
    }

    fn apply(&self, colors: &LightColors, binding: &mut GpuProgramBinding) {
        if let Some(location) = self.ambient.as_ref() {
            binding.set_vector3(location, &colors.ambient);
        }
        if let Some(location) = self.diffuse.as_ref() {
            binding.set_vector3(location, &colors.diffuse);
        }
        if let Some(location) = self.specular.as_ref() {
            binding.set_vector3(location, &colors.specular);
        }
    }
}

/// Uniform locations of a `PointLight` structure instance in a program, for example
/// `pointLights[3]` or `pointLight`. Members that were optimized out by the shader compiler are
/// skipped silently.
#[derive(Clone, Debug, Default)]
pub struct PointLightUniforms {
    colors: LightColorUniforms,
    position: Option<UniformLocation>,
    radius: Option<UniformLocation>,
}

impl PointLightUniforms {
    pub fn new(program: &dyn GpuProgram, prefix: &str) -> Self {
        Self {
            colors: LightColorUniforms::new(program, prefix),
            position: program.uniform_location_opt(&format!("{prefix}.position")),
            radius: program.uniform_location_opt(&format!("{prefix}.radius")),
        }
    }
}

/// Uniform locations of a `DirectionalLight` structure instance in a program.
#[derive(Clone, Debug, Default)]
pub struct DirectionalLightUniforms {
    colors: LightColorUniforms,
    direction: Option<UniformLocation>,
}

impl DirectionalLightUniforms {
    pub fn new(program: &dyn GpuProgram, prefix: &str) -> Self {
        Self {
            colors: LightColorUniforms::new(program, prefix),
            direction: program.uniform_location_opt(&format!("{prefix}.direction")),
        }
    }
}

/// Omnidirectional light with limited range.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PointLight {
    pub position: Vector3<f32>,
    pub colors: LightColors,
    /// Distance at which the contribution of the light reaches zero.
    pub radius: f32,
}

impl Default for PointLight {
    fn default() -> Self {
        Self {
            position: Vector3::default(),
            colors: Default::default(),
            radius: 5.0,
        }
    }
}

impl PointLight {
    pub fn new(position: Vector3<f32>, colors: LightColors, radius: f32) -> Self {
        Self {
            position,
            colors,
            radius,
        }
    }

    /// Transform of the light volume. The volume mesh is a cube spanning `[-1; 1]` on every
    /// axis, so the scaled cube encloses the whole sphere of influence.
    pub fn volume_model_matrix(&self) -> Matrix4<f32> {
        Matrix4::new_translation(&self.position) * Matrix4::new_scaling(self.radius)
    }

    /// Writes the colors, the view-space position and the radius of the light.
    pub fn apply_uniforms(
        &self,
        uniforms: &PointLightUniforms,
        binding: &mut GpuProgramBinding,
        view: &Matrix4<f32>,
    ) {
        uniforms.colors.apply(&self.colors, binding);
        if let Some(location) = uniforms.position.as_ref() {
            let position = view.transform_point(&Point3::from(self.position)).coords;
            binding.set_vector3(location, &position);
        }
        if let Some(location) = uniforms.radius.as_ref() {
            binding.set_f32(location, self.radius);
        }
    }
}

/// Light that affects the whole scene from a single direction, like the sun.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DirectionalLight {
    /// World-space direction in which the light travels.
    pub direction: Vector3<f32>,
    pub colors: LightColors,
}

impl Default for DirectionalLight {
    fn default() -> Self {
        Self {
            direction: Vector3::new(0.0, -1.0, 0.0),
            colors: Default::default(),
        }
    }
}

impl DirectionalLight {
    pub fn new(direction: Vector3<f32>, colors: LightColors) -> Self {
        Self { direction, colors }
    }

    /// View-space direction towards the light, this is what the lighting model expects.
    pub fn view_space_direction(&self, view: &Matrix4<f32>) -> Vector3<f32> {
        (-view.transform_vector(&self.direction))
            .try_normalize(f32::EPSILON)
            .unwrap_or_else(Vector3::z)
    }

    pub fn apply_uniforms(
        &self,
        uniforms: &DirectionalLightUniforms,
        binding: &mut GpuProgramBinding,
        view: &Matrix4<f32>,
    ) {
        uniforms.colors.apply(&self.colors, binding);
        if let Some(location) = uniforms.direction.as_ref() {
            binding.set_vector3(location, &self.view_space_direction(view));
        }
    }
}

#[cfg(test)]
mod test {
    use super::{DirectionalLight, LightColors, PointLight};
    use crate::core::algebra::{Matrix4, Point3, Vector3};

    #[test]
    fn test_volume_matrix_encloses_radius() {
        let light = PointLight::new(Vector3::new(1.0, 2.0, 3.0), LightColors::default(), 5.0);
        let matrix = light.volume_model_matrix();

        let corner = matrix.transform_point(&Point3::new(1.0, 1.0, 1.0));
        assert_eq!(corner, Point3::new(6.0, 7.0, 8.0));

        let center = matrix.transform_point(&Point3::origin());
        assert_eq!(center.coords, light.position);
    }

    #[test]
    fn test_directional_light_points_towards_source() {
        let light = DirectionalLight::new(Vector3::new(0.0, -2.0, 0.0), LightColors::default());
        let direction = light.view_space_direction(&Matrix4::identity());
        assert!((direction - Vector3::new(0.0, 1.0, 0.0)).norm() < 1e-6);
    }
}
