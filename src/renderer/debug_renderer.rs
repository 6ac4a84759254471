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

//! Wireframe overlay for light volumes. It is drawn after the deferred pass on top of the lit
//! image and depth tested against the scene.

use crate::{
    core::{algebra::Matrix4, math::Rect},
    graphics::{
        error::FrameworkError,
        framebuffer::FrameBuffer,
        geometry_buffer::{
            AttributeDefinition, AttributeKind, BufferUsage, ElementsDescriptor, GeometryBuffer,
            GeometryBufferDescriptor, VertexBufferData, VertexBufferDescriptor,
        },
        gpu_program::{GpuProgram, UniformLocation},
        server::GraphicsServer,
        stats::RenderPassStatistics,
        CompareFunc, DrawParameters, ElementRange,
    },
    scene::{light::PointLight, surface::make_line_cube},
};

pub(crate) struct DebugShader {
    program: Box<dyn GpuProgram>,
    mvp: UniformLocation,
    color: UniformLocation,
}

impl DebugShader {
    fn new(server: &dyn GraphicsServer) -> Result<Self, FrameworkError> {
        let fragment_source = include_str!("shaders/debug_fs.glsl");
        let vertex_source = include_str!("shaders/debug_vs.glsl");
        let program = server.create_program("DebugShader", vertex_source, fragment_source)?;
        Ok(Self {
            mvp: program.uniform_location("mvp")?,
            color: program.uniform_location("color")?,
            program,
        })
    }
}

pub struct DebugRenderer {
    shader: DebugShader,
    line_cube: Box<dyn GeometryBuffer>,
}

impl DebugRenderer {
    pub fn new(server: &dyn GraphicsServer) -> Result<Self, FrameworkError> {
        let (corners, edges) = make_line_cube();
        let line_cube = server.create_geometry_buffer(GeometryBufferDescriptor {
            elements: ElementsDescriptor::Lines(&edges),
            buffers: &[VertexBufferDescriptor {
                usage: BufferUsage::StaticDraw,
                attributes: &[AttributeDefinition {
                    location: 0,
                    kind: AttributeKind::Float3,
                    normalized: false,
                    divisor: 0,
                }],
                data: VertexBufferData::new(Some(&corners)),
            }],
            usage: BufferUsage::StaticDraw,
        })?;

        Ok(Self {
            shader: DebugShader::new(server)?,
            line_cube,
        })
    }

    /// Draws the bounding cube of every point light in its diffuse color.
    pub fn draw_point_lights(
        &self,
        framebuffer: &mut dyn FrameBuffer,
        viewport: Rect<i32>,
        view_projection: &Matrix4<f32>,
        lights: &[PointLight],
    ) -> Result<RenderPassStatistics, FrameworkError> {
        let mut statistics = RenderPassStatistics::default();

        let params = DrawParameters {
            cull_face: None,
            depth_write: false,
            depth_test: Some(CompareFunc::LessOrEqual),
            ..Default::default()
        };

        for light in lights {
            let mvp = view_projection * light.volume_model_matrix();
            statistics += framebuffer.draw(
                &*self.line_cube,
                viewport,
                &*self.shader.program,
                &params,
                &[],
                ElementRange::Full,
                &mut |binding| {
                    binding
                        .set_matrix4(&self.shader.mvp, &mvp)
                        .set_vector3(&self.shader.color, &light.colors.diffuse);
                },
            )?;
        }

        Ok(statistics)
    }
}

#[cfg(test)]
mod test {
    use super::DebugRenderer;
    use crate::{
        core::{
            algebra::{Matrix4, Vector3},
            math::Resolution,
        },
        graphics::{
            gpu_program::UniformValue, headless::HeadlessGraphicsServer, server::GraphicsServer,
            CompareFunc, ElementKind,
        },
        scene::light::{LightColors, PointLight},
    };

    #[test]
    fn test_one_wireframe_per_light() {
        let server = HeadlessGraphicsServer::new((16, 16));
        let renderer = DebugRenderer::new(&*server).unwrap();
        let mut back_buffer = server.back_buffer();
        let lights = [
            PointLight::new(
                Vector3::new(1.0, 2.0, 3.0),
                LightColors::from_base(Vector3::new(1.0, 0.0, 0.0)),
                2.0,
            ),
            PointLight::default(),
        ];

        server.clear_commands();
        renderer
            .draw_point_lights(
                &mut *back_buffer,
                Resolution::new(16, 16).viewport(),
                &Matrix4::identity(),
                &lights,
            )
            .unwrap();

        let draws = server.draws();
        assert_eq!(draws.len(), 2);
        for (draw, light) in draws.iter().zip(lights.iter()) {
            assert_eq!(draw.element_kind, ElementKind::Line);
            assert_eq!(draw.params.depth_test, Some(CompareFunc::LessOrEqual));
            assert!(!draw.params.depth_write);
            assert_eq!(
                draw.uniform("mvp"),
                Some(UniformValue::Matrix4(light.volume_model_matrix()))
            );
            assert_eq!(
                draw.uniform("color"),
                Some(UniformValue::Vector3(light.colors.diffuse))
            );
        }
    }
}
