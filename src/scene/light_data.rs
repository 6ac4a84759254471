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

//! Columnar per-light attributes for instanced light rendering.
//!
//! Every column is computed on first access from the current point lights of a scene and is
//! tagged with the scene generation it was built from. The scene bumps its generation on every
//! change of its point light collection, so a stale column is rebuilt on the next access.

use crate::{core::algebra::Vector3, scene::light::PointLight};

/// Identifies one of the cached columns.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum LightColumn {
    Position,
    Radius,
    Ambient,
    Diffuse,
    Specular,
}

#[derive(Debug)]
struct Column<T> {
    generation: Option<u64>,
    values: Vec<T>,
}

impl<T> Default for Column<T> {
    fn default() -> Self {
        Self {
            generation: None,
            values: Vec::new(),
        }
    }
}

impl<T> Column<T> {
    fn get_or_compute<F>(&mut self, generation: u64, lights: &[PointLight], func: F) -> &[T]
    where
        F: FnMut(&PointLight) -> T,
    {
        if self.generation != Some(generation) {
            self.values.clear();
            self.values.extend(lights.iter().map(func));
            self.generation = Some(generation);
        }
        &self.values
    }
}

/// Cache storage, owned by a scene. Use [`crate::scene::Scene::light_data`] to access it.
#[derive(Debug, Default)]
pub struct LightData {
    positions: Column<Vector3<f32>>,
    radii: Column<f32>,
    ambient: Column<Vector3<f32>>,
    diffuse: Column<Vector3<f32>>,
    specular: Column<Vector3<f32>>,
}

impl LightData {
    /// Returns the scene generation the column was computed from, `None` if it was never
    /// computed.
    pub fn cached_generation(&self, column: LightColumn) -> Option<u64> {
        match column {
            LightColumn::Position => self.positions.generation,
            LightColumn::Radius => self.radii.generation,
            LightColumn::Ambient => self.ambient.generation,
            LightColumn::Diffuse => self.diffuse.generation,
            LightColumn::Specular => self.specular.generation,
        }
    }
}

/// Scene-bound view of [`LightData`], produced by [`crate::scene::Scene::light_data`].
pub struct LightColumns<'a> {
    pub(crate) data: &'a mut LightData,
    pub(crate) lights: &'a [PointLight],
    pub(crate) generation: u64,
}

impl LightColumns<'_> {
    pub fn len(&self) -> usize {
        self.lights.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lights.is_empty()
    }

    /// World-space positions.
    pub fn positions(&mut self) -> &[Vector3<f32>] {
        self.data
            .positions
            .get_or_compute(self.generation, self.lights, |l| l.position)
    }

    pub fn radii(&mut self) -> &[f32] {
        self.data
            .radii
            .get_or_compute(self.generation, self.lights, |l| l.radius)
    }

    pub fn ambient_colors(&mut self) -> &[Vector3<f32>] {
        self.data
            .ambient
            .get_or_compute(self.generation, self.lights, |l| l.colors.ambient)
    }

    pub fn diffuse_colors(&mut self) -> &[Vector3<f32>] {
        self.data
            .diffuse
            .get_or_compute(self.generation, self.lights, |l| l.colors.diffuse)
    }

    pub fn specular_colors(&mut self) -> &[Vector3<f32>] {
        self.data
            .specular
            .get_or_compute(self.generation, self.lights, |l| l.colors.specular)
    }
}

#[cfg(test)]
mod test {
    use super::LightColumn;
    use crate::{
        core::algebra::Vector3,
        scene::{
            light::{LightColors, PointLight},
            Scene,
        },
    };

    fn light(x: f32, radius: f32) -> PointLight {
        PointLight::new(Vector3::new(x, 0.0, 0.0), LightColors::default(), radius)
    }

    #[test]
    fn test_columns_are_lazy() {
        let mut scene = Scene::new();
        scene.add_point_light(light(1.0, 2.0));

        assert_eq!(scene.light_data_cache().cached_generation(LightColumn::Radius), None);
        assert_eq!(scene.light_data().radii(), &[2.0]);

        let generation = scene.generation();
        let cache = scene.light_data_cache();
        assert_eq!(cache.cached_generation(LightColumn::Radius), Some(generation));
        // Only accessed columns are computed.
        assert_eq!(cache.cached_generation(LightColumn::Position), None);
    }

    #[test]
    fn test_columns_follow_scene_changes() {
        let mut scene = Scene::new();
        scene.add_point_light(light(1.0, 2.0));
        assert_eq!(scene.light_data().positions(), &[Vector3::new(1.0, 0.0, 0.0)]);

        scene.add_point_light(light(3.0, 4.0));
        assert_eq!(
            scene.light_data().positions(),
            &[Vector3::new(1.0, 0.0, 0.0), Vector3::new(3.0, 0.0, 0.0)]
        );

        scene.point_lights_mut()[0].radius = 10.0;
        assert_eq!(scene.light_data().radii(), &[10.0, 4.0]);

        scene.remove_point_light(0);
        let mut columns = scene.light_data();
        assert_eq!(columns.len(), 1);
        assert_eq!(columns.radii(), &[4.0]);
        assert_eq!(columns.positions(), &[Vector3::new(3.0, 0.0, 0.0)]);
    }

    #[test]
    fn test_unchanged_scene_keeps_cache() {
        let mut scene = Scene::new();
        scene.add_point_light(light(1.0, 2.0));
        scene.light_data().diffuse_colors();
        let generation = scene.generation();

        // Directional lights are not part of the columns.
        scene.add_directional_light(Default::default());
        scene.light_data().diffuse_colors();
        assert_eq!(scene.generation(), generation);
        assert_eq!(
            scene.light_data_cache().cached_generation(LightColumn::Diffuse),
            Some(generation)
        );
    }
}
