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
    core::log::Log,
    graphics::{
        error::FrameworkError,
        geometry_buffer::GeometryBuffer,
        gpu_program::{GpuProgram, UniformLocation},
        server::GraphicsServer,
        stats::RenderPassStatistics,
        BlendParameters, DrawParameters, ElementRange,
    },
    renderer::{
        technique::{
            compose_fragment_source, DeferredPassContext, DeferredShadingTechnique,
            DeferredTechniqueKind, GBufferSamplers,
        },
        utils::make_fullscreen_quad,
    },
    scene::light::{DirectionalLightUniforms, PointLightUniforms},
};

/// Size of the point light array in the shader.
pub const MAX_POINT_LIGHTS: usize = 64;
/// Size of the directional light array in the shader.
pub const MAX_DIRECTIONAL_LIGHTS: usize = 8;

const POINT_LIGHT_OVERFLOW: usize = 0x5150_0001;
const DIRECTIONAL_LIGHT_OVERFLOW: usize = 0x5150_0002;

struct SimpleShader {
    program: Box<dyn GpuProgram>,
    samplers: GBufferSamplers,
    point_lights: Vec<PointLightUniforms>,
    point_light_count: UniformLocation,
    directional_lights: Vec<DirectionalLightUniforms>,
    directional_light_count: UniformLocation,
}

impl SimpleShader {
    fn new(server: &dyn GraphicsServer) -> Result<Self, FrameworkError> {
        let fragment_source = compose_fragment_source(include_str!("../shaders/simple_fs.glsl"));
        let vertex_source = include_str!("../shaders/fullscreen_vs.glsl");
        let program =
            server.create_program("SimpleDeferredShading", vertex_source, &fragment_source)?;
        Ok(Self {
            samplers: GBufferSamplers::new(&*program)?,
            point_lights: (0..MAX_POINT_LIGHTS)
                .map(|i| PointLightUniforms::new(&*program, &format!("pointLights[{i}]")))
                .collect(),
            point_light_count: program.uniform_location("pointLightCount")?,
            directional_lights: (0..MAX_DIRECTIONAL_LIGHTS)
                .map(|i| {
                    DirectionalLightUniforms::new(&*program, &format!("directionalLights[{i}]"))
                })
                .collect(),
            directional_light_count: program.uniform_location("directionalLightCount")?,
            program,
        })
    }
}

/// Shades every pixel against every light in a single full-screen pass. Lights beyond the
/// array sizes of the shader are dropped with a warning.
pub struct SimpleTechnique {
    shader: SimpleShader,
    quad: Box<dyn GeometryBuffer>,
}

impl SimpleTechnique {
    pub fn new(server: &dyn GraphicsServer) -> Result<Self, FrameworkError> {
        Ok(Self {
            shader: SimpleShader::new(server)?,
            quad: make_fullscreen_quad(server)?,
        })
    }
}

fn clamp_light_count(available: usize, limit: usize, max: usize, id: usize, kind: &str) -> usize {
    let limit = limit.min(max);
    if available > limit {
        Log::warn_once(
            id,
            format!(
                "Simple deferred shading supports at most {limit} {kind} lights, \
                {available} are in the scene. Extra lights are ignored."
            ),
        );
    }
    available.min(limit)
}

impl DeferredShadingTechnique for SimpleTechnique {
    fn kind(&self) -> DeferredTechniqueKind {
        DeferredTechniqueKind::Simple
    }

    fn do_deferred_pass(
        &mut self,
        ctx: DeferredPassContext,
    ) -> Result<RenderPassStatistics, FrameworkError> {
        let mut statistics = RenderPassStatistics::default();
        let viewport = ctx.resolution.viewport();
        let view = ctx.view;

        ctx.output
            .clear(viewport, Some(ctx.clear_color), None, None);

        let point_lights = ctx.scene.point_lights();
        let point_count = clamp_light_count(
            point_lights.len(),
            ctx.light_limits.point,
            MAX_POINT_LIGHTS,
            POINT_LIGHT_OVERFLOW,
            "point",
        );
        let point_lights = &point_lights[..point_count];

        let directional_lights = ctx.scene.directional_lights();
        let directional_count = clamp_light_count(
            directional_lights.len(),
            ctx.light_limits.directional,
            MAX_DIRECTIONAL_LIGHTS,
            DIRECTIONAL_LIGHT_OVERFLOW,
            "directional",
        );
        let directional_lights = &directional_lights[..directional_count];

        let shader = &self.shader;
        statistics += ctx.output.draw(
            &*self.quad,
            viewport,
            &*shader.program,
            &DrawParameters {
                blend: Some(BlendParameters::additive()),
                ..DrawParameters::full_screen()
            },
            &shader.samplers.bindings(ctx.gbuffer),
            ElementRange::Full,
            &mut |binding| {
                binding
                    .set_i32(&shader.point_light_count, point_lights.len() as i32)
                    .set_i32(
                        &shader.directional_light_count,
                        directional_lights.len() as i32,
                    );
                for (light, uniforms) in point_lights.iter().zip(shader.point_lights.iter()) {
                    light.apply_uniforms(uniforms, binding, &view);
                }
                for (light, uniforms) in directional_lights
                    .iter()
                    .zip(shader.directional_lights.iter())
                {
                    light.apply_uniforms(uniforms, binding, &view);
                }
            },
        )?;

        Ok(statistics)
    }

    fn blits_gbuffer_depth(&self) -> bool {
        false
    }
}

#[cfg(test)]
mod test {
    use super::{MAX_DIRECTIONAL_LIGHTS, MAX_POINT_LIGHTS};
    use crate::{
        core::{algebra::Vector3, math::Resolution},
        graphics::{
            gpu_program::UniformValue,
            headless::{DrawCommand, RecordedCommand},
        },
        renderer::technique::{
            test::{draws, run_pass},
            DeferredTechniqueKind, LightLimits,
        },
        scene::{
            light::{DirectionalLight, LightColors, PointLight},
            Scene,
        },
    };

    fn scene(points: usize, directionals: usize) -> Scene {
        let mut scene = Scene::new();
        for i in 0..points {
            scene.add_point_light(PointLight::new(
                Vector3::new(0.0, i as f32, 0.0),
                LightColors::default(),
                1.0 + i as f32,
            ));
        }
        for _ in 0..directionals {
            scene.add_directional_light(DirectionalLight::default());
        }
        scene
    }

    fn single_draw(commands: &[RecordedCommand]) -> DrawCommand {
        let draws = draws(commands);
        assert_eq!(draws.len(), 1);
        draws[0].clone()
    }

    #[test]
    fn test_count_uniform_equals_submitted_lights() {
        for count in [0, 1, 2, 17, MAX_POINT_LIGHTS - 1, MAX_POINT_LIGHTS] {
            let mut scene = scene(count, 1);
            let commands = run_pass(
                DeferredTechniqueKind::Simple,
                &mut scene,
                Resolution::new(32, 32),
                LightLimits::default(),
            );
            let draw = single_draw(&commands);

            assert_eq!(
                draw.uniform("pointLightCount"),
                Some(UniformValue::Integer(count as i32))
            );
            assert_eq!(
                draw.uniform("directionalLightCount"),
                Some(UniformValue::Integer(1))
            );
            if count > 0 {
                assert_eq!(
                    draw.uniform(&format!("pointLights[{}].radius", count - 1)),
                    Some(UniformValue::Float(count as f32))
                );
            }
            // Nothing is written past the last light.
            if count < MAX_POINT_LIGHTS {
                assert_eq!(draw.uniform(&format!("pointLights[{count}].radius")), None);
            }
        }
    }

    #[test]
    fn test_overflow_is_clamped() {
        let mut scene = scene(MAX_POINT_LIGHTS + 6, MAX_DIRECTIONAL_LIGHTS + 2);
        let commands = run_pass(
            DeferredTechniqueKind::Simple,
            &mut scene,
            Resolution::new(32, 32),
            LightLimits::default(),
        );
        let draw = single_draw(&commands);
        assert_eq!(
            draw.uniform("pointLightCount"),
            Some(UniformValue::Integer(MAX_POINT_LIGHTS as i32))
        );
        assert_eq!(
            draw.uniform("directionalLightCount"),
            Some(UniformValue::Integer(MAX_DIRECTIONAL_LIGHTS as i32))
        );
    }

    #[test]
    fn test_custom_limits() {
        let mut scene = scene(20, 4);
        let commands = run_pass(
            DeferredTechniqueKind::Simple,
            &mut scene,
            Resolution::new(32, 32),
            LightLimits {
                point: 10,
                directional: 1000,
            },
        );
        let draw = single_draw(&commands);
        assert_eq!(
            draw.uniform("pointLightCount"),
            Some(UniformValue::Integer(10))
        );
        assert_eq!(draw.uniform("pointLights[10].radius"), None);
        assert_eq!(
            draw.uniform("directionalLightCount"),
            Some(UniformValue::Integer(4))
        );
    }

    #[test]
    fn test_full_screen_state() {
        let mut scene = scene(1, 0);
        let commands = run_pass(
            DeferredTechniqueKind::Simple,
            &mut scene,
            Resolution::new(32, 32),
            LightLimits::default(),
        );
        let draw = single_draw(&commands);
        assert_eq!(draw.params.depth_test, None);
        assert!(!draw.params.depth_write);
        assert_eq!(draw.params.stencil_test, None);
        assert_eq!(draw.statistics.triangles, 2);
    }
}
