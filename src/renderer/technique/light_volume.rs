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

//! Light volume technique. Every point light is approximated by a cube that encloses its sphere
//! of influence, and shading is restricted to pixels covered by such cubes.
//!
//! Rendering consists of two phases over all point lights:
//!
//! 1. Stencil phase. The stencil is reset to 128 once, then the cubes are drawn without color
//! writes and without culling. A back face that fails the depth test increments the stencil
//! value, a front face that fails the depth test decrements it. Pixels whose surface lies inside
//! some volume end up above 128. The stencil is not reset between lights, so a pixel marked by
//! one light is shaded by the others as well. Such pixels receive nothing from lights they are
//! outside of, because the attenuation window reaches zero at the radius.
//! 2. Shading phase. The cubes are drawn again with front faces culled and reversed depth test,
//! so the back faces drive the shading even when the camera is inside a volume. Only pixels
//! marked in the stencil are shaded, contributions are summed by additive blending.
//!
//! Directional lights affect every pixel and are drawn as full-screen quads.

use crate::{
    core::{algebra::Matrix4, math::Rect},
    graphics::{
        error::FrameworkError,
        framebuffer::{BlitMask, FrameBuffer},
        geometry_buffer::GeometryBuffer,
        gpu_program::{GpuProgram, UniformLocation},
        server::GraphicsServer,
        state::StateGuard,
        stats::RenderPassStatistics,
        BlendParameters, ColorMask, CompareFunc, CullFace, DrawParameters, ElementRange,
        StencilAction, StencilFunc, StencilOp,
    },
    renderer::{
        gbuffer::GBuffer,
        technique::{
            compose_fragment_source, DeferredPassContext, DeferredShadingTechnique,
            DeferredTechniqueKind, GBufferSamplers,
        },
        utils::{make_fullscreen_quad, make_unit_cube},
    },
    scene::light::{DirectionalLight, DirectionalLightUniforms, PointLightUniforms},
};

/// Value the stencil buffer is reset to before the stencil phase.
pub const STENCIL_REFERENCE: u32 = 128;

pub(crate) fn stencil_phase_parameters() -> DrawParameters {
    DrawParameters {
        cull_face: None,
        color_write: ColorMask::all(false),
        depth_write: false,
        stencil_test: Some(StencilFunc {
            func: CompareFunc::Always,
            ref_value: STENCIL_REFERENCE,
            mask: 0xFF,
        }),
        depth_test: Some(CompareFunc::LessOrEqual),
        blend: None,
        stencil_op: StencilOp {
            zfail: StencilAction::Decr,
            ..Default::default()
        },
        back_stencil_op: Some(StencilOp {
            zfail: StencilAction::Incr,
            ..Default::default()
        }),
        scissor_box: None,
    }
}

pub(crate) fn shading_phase_parameters() -> DrawParameters {
    DrawParameters {
        cull_face: Some(CullFace::Front),
        color_write: Default::default(),
        depth_write: false,
        // Passes where the stored value is strictly greater than the reference.
        stencil_test: Some(StencilFunc {
            func: CompareFunc::Less,
            ref_value: STENCIL_REFERENCE,
            mask: 0xFF,
        }),
        depth_test: Some(CompareFunc::GreaterOrEqual),
        blend: Some(BlendParameters::additive()),
        stencil_op: StencilOp::read_only(),
        back_stencil_op: None,
        scissor_box: None,
    }
}

/// Copies the scene depth into the output, clears its color and resets the stencil.
pub(crate) fn prepare_output(ctx: &mut DeferredPassContext) -> Result<(), FrameworkError> {
    ctx.gbuffer
        .blit(BlitMask::DEPTH, &*ctx.output, ctx.resolution)?;
    ctx.output.clear(
        ctx.resolution.viewport(),
        Some(ctx.clear_color),
        None,
        Some(STENCIL_REFERENCE as i32),
    );
    Ok(())
}

struct DirectionalLightShader {
    program: Box<dyn GpuProgram>,
    samplers: GBufferSamplers,
    light: DirectionalLightUniforms,
}

impl DirectionalLightShader {
    fn new(server: &dyn GraphicsServer) -> Result<Self, FrameworkError> {
        let fragment_source =
            compose_fragment_source(include_str!("../shaders/directional_light_fs.glsl"));
        let vertex_source = include_str!("../shaders/fullscreen_vs.glsl");
        let program = server.create_program("DirectionalLight", vertex_source, &fragment_source)?;
        Ok(Self {
            samplers: GBufferSamplers::new(&*program)?,
            light: DirectionalLightUniforms::new(&*program, "directionalLight"),
            program,
        })
    }
}

/// Full-screen additive pass per directional light, shared by both volume techniques.
pub(crate) struct DirectionalLightPass {
    shader: DirectionalLightShader,
    quad: Box<dyn GeometryBuffer>,
}

impl DirectionalLightPass {
    pub fn new(server: &dyn GraphicsServer) -> Result<Self, FrameworkError> {
        Ok(Self {
            shader: DirectionalLightShader::new(server)?,
            quad: make_fullscreen_quad(server)?,
        })
    }

    pub fn render(
        &self,
        output: &mut dyn FrameBuffer,
        gbuffer: &GBuffer,
        lights: &[DirectionalLight],
        view: &Matrix4<f32>,
        viewport: Rect<i32>,
    ) -> Result<RenderPassStatistics, FrameworkError> {
        let mut statistics = RenderPassStatistics::default();
        let shader = &self.shader;
        let params = DrawParameters {
            blend: Some(BlendParameters::additive()),
            ..DrawParameters::full_screen()
        };
        let bindings = shader.samplers.bindings(gbuffer);
        for light in lights {
            statistics += output.draw(
                &*self.quad,
                viewport,
                &*shader.program,
                &params,
                &bindings,
                ElementRange::Full,
                &mut |binding| light.apply_uniforms(&shader.light, binding, view),
            )?;
        }
        Ok(statistics)
    }
}

struct StencilShader {
    program: Box<dyn GpuProgram>,
    world_view_projection: UniformLocation,
}

impl StencilShader {
    fn new(server: &dyn GraphicsServer) -> Result<Self, FrameworkError> {
        let fragment_source = include_str!("../shaders/stencil_fs.glsl");
        let vertex_source = include_str!("../shaders/volume_vs.glsl");
        let program = server.create_program("LightVolumeStencil", vertex_source, fragment_source)?;
        Ok(Self {
            world_view_projection: program.uniform_location("worldViewProjection")?,
            program,
        })
    }
}

struct PointLightShader {
    program: Box<dyn GpuProgram>,
    samplers: GBufferSamplers,
    world_view_projection: UniformLocation,
    screen_size: UniformLocation,
    light: PointLightUniforms,
}

impl PointLightShader {
    fn new(server: &dyn GraphicsServer) -> Result<Self, FrameworkError> {
        let fragment_source =
            compose_fragment_source(include_str!("../shaders/point_light_fs.glsl"));
        let vertex_source = include_str!("../shaders/volume_vs.glsl");
        let program = server.create_program("LightVolumeShading", vertex_source, &fragment_source)?;
        Ok(Self {
            samplers: GBufferSamplers::new(&*program)?,
            world_view_projection: program.uniform_location("worldViewProjection")?,
            screen_size: program.uniform_location("screenSize")?,
            light: PointLightUniforms::new(&*program, "pointLight"),
            program,
        })
    }
}

pub struct LightVolumeTechnique {
    stencil_shader: StencilShader,
    point_light_shader: PointLightShader,
    directional: DirectionalLightPass,
    cube: Box<dyn GeometryBuffer>,
}

impl LightVolumeTechnique {
    pub fn new(server: &dyn GraphicsServer) -> Result<Self, FrameworkError> {
        Ok(Self {
            stencil_shader: StencilShader::new(server)?,
            point_light_shader: PointLightShader::new(server)?,
            directional: DirectionalLightPass::new(server)?,
            cube: make_unit_cube(server)?,
        })
    }
}

impl DeferredShadingTechnique for LightVolumeTechnique {
    fn kind(&self) -> DeferredTechniqueKind {
        DeferredTechniqueKind::LightVolume
    }

    fn do_deferred_pass(
        &mut self,
        mut ctx: DeferredPassContext,
    ) -> Result<RenderPassStatistics, FrameworkError> {
        let mut statistics = RenderPassStatistics::default();
        let viewport = ctx.resolution.viewport();
        let view = ctx.view;
        let view_projection = ctx.projection * ctx.view;
        let screen_size = ctx.resolution.as_vec2();

        prepare_output(&mut ctx)?;

        {
            let _guard = StateGuard::new(ctx.server);

            let shader = &self.stencil_shader;
            let params = stencil_phase_parameters();
            for light in ctx.scene.point_lights() {
                let mvp = view_projection * light.volume_model_matrix();
                statistics += ctx.output.draw(
                    &*self.cube,
                    viewport,
                    &*shader.program,
                    &params,
                    &[],
                    ElementRange::Full,
                    &mut |binding| {
                        binding.set_matrix4(&shader.world_view_projection, &mvp);
                    },
                )?;
            }

            let shader = &self.point_light_shader;
            let params = shading_phase_parameters();
            let bindings = shader.samplers.bindings(ctx.gbuffer);
            for light in ctx.scene.point_lights() {
                let mvp = view_projection * light.volume_model_matrix();
                statistics += ctx.output.draw(
                    &*self.cube,
                    viewport,
                    &*shader.program,
                    &params,
                    &bindings,
                    ElementRange::Full,
                    &mut |binding| {
                        binding
                            .set_matrix4(&shader.world_view_projection, &mvp)
                            .set_vector2(&shader.screen_size, &screen_size);
                        light.apply_uniforms(&shader.light, binding, &view);
                    },
                )?;
            }
        }

        statistics += self.directional.render(
            ctx.output,
            ctx.gbuffer,
            ctx.scene.directional_lights(),
            &view,
            viewport,
        )?;

        Ok(statistics)
    }

    fn blits_gbuffer_depth(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod test {
    use super::STENCIL_REFERENCE;
    use crate::{
        core::{
            algebra::{Matrix4, Point3, Vector2, Vector3},
            color::Color,
            math::Resolution,
        },
        graphics::{
            framebuffer::BlitMask,
            gpu_program::UniformValue,
            headless::{HeadlessGraphicsServer, RecordedCommand, BACK_BUFFER_ID},
            server::GraphicsServer,
            ColorMask, CompareFunc, CullFace, StencilAction,
        },
        renderer::{
            gbuffer::GBuffer,
            technique::{
                create_technique,
                test::{camera, draws, run_pass},
                DeferredPassContext, DeferredTechniqueKind, LightLimits,
            },
        },
        scene::{
            camera::Camera,
            light::{DirectionalLight, LightColors, PointLight},
            Scene,
        },
    };

    /// Normalized device coordinate bounds of the `[-1; 1]` cube transformed by the matrix.
    fn ndc_bounds(mvp: &Matrix4<f32>) -> (Vector2<f32>, Vector2<f32>) {
        let mut min = Vector2::repeat(f32::MAX);
        let mut max = Vector2::repeat(f32::MIN);
        for i in 0..8 {
            let coord = |bit: i32| if i & bit != 0 { 1.0 } else { -1.0 };
            let clip = mvp * Point3::new(coord(1), coord(2), coord(4)).to_homogeneous();
            assert!(clip.w > 0.0);
            let ndc = clip.xy() / clip.w;
            min = min.inf(&ndc);
            max = max.sup(&ndc);
        }
        (min, max)
    }

    fn scene_with_light(radius: f32) -> Scene {
        let mut scene = Scene::new();
        scene.add_point_light(PointLight::new(
            Vector3::default(),
            LightColors::default(),
            radius,
        ));
        scene
    }

    #[test]
    fn test_phases_state() {
        let mut scene = scene_with_light(5.0);
        let commands = run_pass(
            DeferredTechniqueKind::LightVolume,
            &mut scene,
            Resolution::new(800, 600),
            LightLimits::default(),
        );

        // Depth comes first, then the color and stencil reset.
        assert!(matches!(
            commands[0],
            RecordedCommand::Blit {
                dest: BACK_BUFFER_ID,
                mask: BlitMask::DEPTH,
                ..
            }
        ));
        assert!(matches!(
            commands[1],
            RecordedCommand::Clear {
                color: Some(_),
                depth: None,
                stencil: Some(128),
                ..
            }
        ));

        let draws = draws(&commands);
        assert_eq!(draws.len(), 2);

        let stencil = &draws[0];
        assert_eq!(stencil.params.color_write, ColorMask::all(false));
        assert_eq!(stencil.params.cull_face, None);
        assert!(!stencil.params.depth_write);
        assert_eq!(stencil.params.depth_test, Some(CompareFunc::LessOrEqual));
        assert_eq!(stencil.params.stencil_op.zfail, StencilAction::Decr);
        assert_eq!(stencil.params.stencil_op.zpass, StencilAction::Keep);
        assert_eq!(
            stencil.params.back_stencil_op.map(|op| op.zfail),
            Some(StencilAction::Incr)
        );
        assert_eq!(stencil.state.front_stencil_op().zfail, StencilAction::Decr);
        assert_eq!(stencil.state.back_stencil_op().zfail, StencilAction::Incr);

        let shading = &draws[1];
        let stencil_func = shading.params.stencil_test.unwrap();
        assert_eq!(stencil_func.func, CompareFunc::Less);
        assert_eq!(stencil_func.ref_value, STENCIL_REFERENCE);
        assert!(stencil_func.func.passes(STENCIL_REFERENCE, STENCIL_REFERENCE + 1));
        assert!(!stencil_func.func.passes(STENCIL_REFERENCE, STENCIL_REFERENCE));
        assert_eq!(shading.params.cull_face, Some(CullFace::Front));
        assert_eq!(shading.params.depth_test, Some(CompareFunc::GreaterOrEqual));
        assert!(!shading.params.depth_write);
        assert_eq!(shading.params.stencil_op.write_mask, 0);
        assert_eq!(
            shading.uniform("screenSize"),
            Some(UniformValue::Vector2(Vector2::new(800.0, 600.0)))
        );
    }

    #[test]
    fn test_light_at_origin_footprint() {
        let resolution = Resolution::new(800, 600);
        let camera = camera(resolution);
        let view_projection = camera.view_projection_matrix();

        for radius in [5.0, 1.0] {
            let mut scene = scene_with_light(radius);
            let expected = view_projection * scene.point_lights()[0].volume_model_matrix();
            let commands = run_pass(
                DeferredTechniqueKind::LightVolume,
                &mut scene,
                resolution,
                LightLimits::default(),
            );

            for draw in draws(&commands) {
                assert_eq!(
                    draw.uniform("worldViewProjection"),
                    Some(UniformValue::Matrix4(expected))
                );
            }

            // The footprint is centred on the viewport.
            let (min, max) = ndc_bounds(&expected);
            assert!((min + max).norm() < 1e-4);
            assert!(min.x < 0.0 && min.y < 0.0);

            if radius == 1.0 {
                // Small volume leaves pixels outside of the footprint untouched.
                assert!(max.x < 1.0 && max.y < 1.0);
            } else {
                // Near face of the large volume is closer than the frustum edges.
                assert!(max.x >= 1.0 && max.y >= 1.0);
            }
        }
    }

    #[test]
    fn test_state_is_restored() {
        let resolution = Resolution::new(64, 64);
        let server = HeadlessGraphicsServer::new((64, 64));
        let gbuffer = GBuffer::new(&*server, resolution).unwrap();
        let mut technique = create_technique(&*server, DeferredTechniqueKind::LightVolume).unwrap();
        let mut output = server.back_buffer();
        let mut scene = scene_with_light(2.0);
        scene.add_directional_light(DirectionalLight::default());
        let camera = camera(resolution);

        let before = server.capture_state();
        technique
            .do_deferred_pass(DeferredPassContext {
                server: &*server,
                gbuffer: &gbuffer,
                output: &mut *output,
                scene: &mut scene,
                view: camera.view_matrix(),
                projection: camera.projection_matrix(),
                resolution,
                clear_color: Color::BLACK,
                light_limits: LightLimits::default(),
            })
            .unwrap();

        // The volume phases are restored by the guard, the directional pass runs after it.
        let draws = server.draws();
        assert_eq!(draws.len(), 3);
        assert_eq!(draws[2].program, "DirectionalLight");
        assert_eq!(draws[2].params.depth_test, None);
        assert_eq!(draws[1].state.depth_func(), CompareFunc::GreaterOrEqual);
        assert_eq!(draws[1].state.cull_face(), CullFace::Front);
        assert_eq!(draws[2].state.depth_func(), before.depth_func());
        assert!(!draws[2].state.culling());
        assert_eq!(server.capture_state().cull_face(), before.cull_face());
    }

    #[test]
    fn test_multiple_lights_draw_per_light() {
        let mut scene = Scene::new();
        for i in 0..5 {
            scene.add_point_light(PointLight::new(
                Vector3::new(i as f32, 0.0, 0.0),
                LightColors::default(),
                1.0,
            ));
        }
        let commands = run_pass(
            DeferredTechniqueKind::LightVolume,
            &mut scene,
            Resolution::new(64, 64),
            LightLimits::default(),
        );
        let draws = draws(&commands);
        assert_eq!(draws.len(), 10);
        // All stencil draws come before all shading draws.
        assert!(draws[..5].iter().all(|d| d.program == "LightVolumeStencil"));
        assert!(draws[5..].iter().all(|d| d.program == "LightVolumeShading"));
        assert_eq!(
            draws[9].uniform("pointLight.radius"),
            Some(UniformValue::Float(1.0))
        );
    }
}
