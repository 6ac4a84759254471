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

//! Scene is the input of the renderer: a list of renderable objects plus point and directional
//! lights.

pub mod camera;
pub mod light;
pub mod light_data;
pub mod object;
pub mod surface;

use crate::scene::{
    light::{DirectionalLight, PointLight},
    light_data::{LightColumns, LightData},
    object::Renderable,
};

#[derive(Default)]
pub struct Scene {
    objects: Vec<Box<dyn Renderable>>,
    point_lights: Vec<PointLight>,
    directional_lights: Vec<DirectionalLight>,
    // Incremented on every change of the point light collection.
    generation: u64,
    light_data: LightData,
}

impl Scene {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_object<R: Renderable + 'static>(&mut self, object: R) {
        self.objects.push(Box::new(object));
    }

    pub fn objects(&self) -> &[Box<dyn Renderable>] {
        &self.objects
    }

    pub fn objects_mut(&mut self) -> &mut [Box<dyn Renderable>] {
        &mut self.objects
    }

    /// Adds a new point light and returns its index.
    pub fn add_point_light(&mut self, light: PointLight) -> usize {
        self.point_lights.push(light);
        self.generation += 1;
        self.point_lights.len() - 1
    }

    pub fn remove_point_light(&mut self, index: usize) -> Option<PointLight> {
        if index < self.point_lights.len() {
            self.generation += 1;
            Some(self.point_lights.remove(index))
        } else {
            None
        }
    }

    pub fn clear_point_lights(&mut self) {
        self.point_lights.clear();
        self.generation += 1;
    }

    pub fn point_lights(&self) -> &[PointLight] {
        &self.point_lights
    }

    /// Gives mutable access to the point lights. Cached light data is considered stale after
    /// this call.
    pub fn point_lights_mut(&mut self) -> &mut [PointLight] {
        self.generation += 1;
        &mut self.point_lights
    }

    pub fn add_directional_light(&mut self, light: DirectionalLight) -> usize {
        self.directional_lights.push(light);
        self.directional_lights.len() - 1
    }

    pub fn remove_directional_light(&mut self, index: usize) -> Option<DirectionalLight> {
        (index < self.directional_lights.len()).then(|| self.directional_lights.remove(index))
    }

    pub fn directional_lights(&self) -> &[DirectionalLight] {
        &self.directional_lights
    }

    pub fn directional_lights_mut(&mut self) -> &mut [DirectionalLight] {
        &mut self.directional_lights
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Columnar view of the point lights, see [`LightColumns`].
    pub fn light_data(&mut self) -> LightColumns<'_> {
        LightColumns {
            data: &mut self.light_data,
            lights: &self.point_lights,
            generation: self.generation,
        }
    }

    pub fn light_data_cache(&self) -> &LightData {
        &self.light_data
    }
}
