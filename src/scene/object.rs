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

//! Objects that write themselves into the G-buffer.

use crate::{
    core::{
        algebra::{Matrix3, Matrix4},
        color::Color,
        math::Rect,
    },
    graphics::{
        error::FrameworkError,
        framebuffer::{FrameBuffer, ResourceBinding},
        geometry_buffer::GeometryBuffer,
        gpu_program::{GpuProgram, UniformLocation},
        gpu_texture::GpuTexture,
        server::GraphicsServer,
        stats::RenderPassStatistics,
        DrawParameters, ElementRange,
    },
    scene::surface::SurfaceData,
};
use std::{cell::RefCell, rc::Rc};

/// Anything that can be drawn in the geometry pass. The renderer calls [`Self::set_uniforms`]
/// and then [`Self::render`] for every object, in order.
pub trait Renderable {
    fn set_uniforms(&mut self, view: &Matrix4<f32>, projection: &Matrix4<f32>);

    /// Draws the object into the G-buffer framebuffer. The renderer decides on the depth and
    /// culling state through `params`.
    fn render(
        &self,
        target: &mut dyn FrameBuffer,
        viewport: Rect<i32>,
        params: &DrawParameters,
    ) -> Result<RenderPassStatistics, FrameworkError>;
}

/// Program of the geometry pass. It writes view-space position with specular strength, normal
/// with roughness and the diffuse color into the three targets of the G-buffer.
pub struct ObjectShader {
    pub program: Box<dyn GpuProgram>,
    pub world_view_projection: UniformLocation,
    pub world_view: UniformLocation,
    pub normal_matrix: UniformLocation,
    pub diffuse_color: UniformLocation,
    pub diffuse_texture: UniformLocation,
    pub use_diffuse_texture: UniformLocation,
    pub specular_strength: UniformLocation,
    pub roughness: UniformLocation,
}

impl ObjectShader {
    pub fn new(server: &dyn GraphicsServer) -> Result<Rc<Self>, FrameworkError> {
        let fragment_source = include_str!("../renderer/shaders/gbuffer_fs.glsl");
        let vertex_source = include_str!("../renderer/shaders/gbuffer_vs.glsl");
        let program = server.create_program("GBufferShader", vertex_source, fragment_source)?;
        Ok(Rc::new(Self {
            world_view_projection: program.uniform_location("worldViewProjection")?,
            world_view: program.uniform_location("worldView")?,
            normal_matrix: program.uniform_location("normalMatrix")?,
            diffuse_color: program.uniform_location("diffuseColor")?,
            diffuse_texture: program.uniform_location("diffuseTexture")?,
            use_diffuse_texture: program.uniform_location("useDiffuseTexture")?,
            specular_strength: program.uniform_location("specularStrength")?,
            roughness: program.uniform_location("roughness")?,
            program,
        }))
    }
}

#[derive(Clone)]
pub struct Material {
    pub diffuse: Color,
    /// Multiplied with `diffuse` when set.
    pub diffuse_texture: Option<Rc<RefCell<dyn GpuTexture>>>,
    pub specular_strength: f32,
    /// Zero is a mirror-like highlight, one is a wide dull highlight.
    pub roughness: f32,
}

impl Default for Material {
    fn default() -> Self {
        Self {
            diffuse: Color::WHITE,
            diffuse_texture: None,
            specular_strength: 0.5,
            roughness: 0.5,
        }
    }
}

impl Material {
    pub fn with_diffuse(mut self, diffuse: Color) -> Self {
        self.diffuse = diffuse;
        self
    }

    pub fn with_diffuse_texture(mut self, texture: Rc<RefCell<dyn GpuTexture>>) -> Self {
        self.diffuse_texture = Some(texture);
        self
    }

    pub fn with_specular_strength(mut self, specular_strength: f32) -> Self {
        self.specular_strength = specular_strength;
        self
    }

    pub fn with_roughness(mut self, roughness: f32) -> Self {
        self.roughness = roughness;
        self
    }
}

/// Triangle mesh with a single material.
pub struct MeshObject {
    geometry: Box<dyn GeometryBuffer>,
    shader: Rc<ObjectShader>,
    pub material: Material,
    pub transform: Matrix4<f32>,
    world_view: Matrix4<f32>,
    world_view_projection: Matrix4<f32>,
}

impl MeshObject {
    pub fn new(
        server: &dyn GraphicsServer,
        shader: Rc<ObjectShader>,
        surface: &SurfaceData,
        material: Material,
    ) -> Result<Self, FrameworkError> {
        Ok(Self {
            geometry: surface.create_geometry_buffer(server)?,
            shader,
            material,
            transform: Matrix4::identity(),
            world_view: Matrix4::identity(),
            world_view_projection: Matrix4::identity(),
        })
    }

    pub fn with_transform(mut self, transform: Matrix4<f32>) -> Self {
        self.transform = transform;
        self
    }

    pub fn world_view_projection(&self) -> &Matrix4<f32> {
        &self.world_view_projection
    }
}

impl Renderable for MeshObject {
    fn set_uniforms(&mut self, view: &Matrix4<f32>, projection: &Matrix4<f32>) {
        self.world_view = view * self.transform;
        self.world_view_projection = projection * self.world_view;
    }

    fn render(
        &self,
        target: &mut dyn FrameBuffer,
        viewport: Rect<i32>,
        params: &DrawParameters,
    ) -> Result<RenderPassStatistics, FrameworkError> {
        let shader = &*self.shader;
        let linear: Matrix3<f32> = self.world_view.fixed_view::<3, 3>(0, 0).into_owned();
        let normal_matrix = linear
            .try_inverse()
            .map(|m| m.transpose())
            .unwrap_or(linear);

        let mut resources = Vec::new();
        if let Some(texture) = self.material.diffuse_texture.as_ref() {
            resources.push(ResourceBinding::texture(texture, &shader.diffuse_texture));
        }

        let mut statistics = RenderPassStatistics::default();
        statistics += target.draw(
            &*self.geometry,
            viewport,
            &*shader.program,
            params,
            &resources,
            ElementRange::Full,
            &mut |binding| {
                binding
                    .set_matrix4(&shader.world_view_projection, &self.world_view_projection)
                    .set_matrix4(&shader.world_view, &self.world_view)
                    .set_matrix3(&shader.normal_matrix, &normal_matrix)
                    .set_color(&shader.diffuse_color, &self.material.diffuse)
                    .set_bool(
                        &shader.use_diffuse_texture,
                        self.material.diffuse_texture.is_some(),
                    )
                    .set_f32(&shader.specular_strength, self.material.specular_strength)
                    .set_f32(&shader.roughness, self.material.roughness);
            },
        )?;
        Ok(statistics)
    }
}
