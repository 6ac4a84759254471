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

//! Deferred renderer. A frame consists of the following passes:
//!
//! 1. Geometry pass. Every object of the scene writes its surface attributes into the G-buffer.
//! 2. Deferred pass. The active [`technique::DeferredShadingTechnique`] resolves lighting from
//! the G-buffer into the output framebuffer.
//! 3. Debug pass (optional). Bounding volumes of point lights are drawn as wireframes.
//! 4. Post-processing (optional). If a post-processing chain is attached, the passes above
//! render into an intermediate framebuffer, and the chain writes the final image into the back
//! buffer.

pub mod debug_renderer;
pub mod gbuffer;
pub mod postprocessing;
pub mod settings;
pub mod technique;
pub mod utils;

use crate::{
    core::{color::Color, log::Log, math::Resolution},
    graphics::{
        error::FrameworkError,
        framebuffer::{Attachment, BlitMask, FrameBuffer},
        gpu_texture::PixelKind,
        server::{GraphicsServer, SharedGraphicsServer},
        stats::RenderPassStatistics,
        CompareFunc, CullFace, DrawParameters,
    },
    renderer::{
        debug_renderer::DebugRenderer,
        gbuffer::GBuffer,
        postprocessing::{GroupedPostprocessingStep, PostprocessingStep},
        settings::RendererSettings,
        technique::{
            create_technique, DeferredPassContext, DeferredShadingTechnique, DeferredTechniqueKind,
        },
    },
    scene::{camera::Camera, Scene},
};

/// Color target and depth-stencil buffer that receive the lit image when post-processing is
/// enabled.
fn make_intermediate_frame_buffer(
    server: &dyn GraphicsServer,
    resolution: Resolution,
    postprocessing: Option<&GroupedPostprocessingStep>,
) -> Result<Option<Box<dyn FrameBuffer>>, FrameworkError> {
    if postprocessing.map_or(true, |chain| chain.is_empty()) {
        return Ok(None);
    }

    let width = resolution.width as usize;
    let height = resolution.height as usize;
    let depth = server.create_2d_render_target(PixelKind::D24S8, width, height)?;
    let color = server.create_2d_render_target(PixelKind::RGBA16F, width, height)?;
    Ok(Some(server.create_frame_buffer(
        Some(Attachment::depth_stencil(depth)),
        vec![Attachment::color(color)],
    )?))
}

fn geometry_pass_parameters(depth_test: bool) -> DrawParameters {
    DrawParameters {
        cull_face: Some(CullFace::Back),
        color_write: Default::default(),
        depth_write: depth_test,
        stencil_test: None,
        depth_test: depth_test.then_some(CompareFunc::Less),
        blend: None,
        stencil_op: Default::default(),
        back_stencil_op: None,
        scissor_box: None,
    }
}

pub struct Renderer {
    server: SharedGraphicsServer,
    resolution: Resolution,
    camera: Box<dyn Camera>,
    gbuffer: GBuffer,
    /// Every technique, in the order they are cycled through.
    techniques: Vec<Box<dyn DeferredShadingTechnique>>,
    technique_index: usize,
    back_buffer: Box<dyn FrameBuffer>,
    intermediate: Option<Box<dyn FrameBuffer>>,
    postprocessing: Option<GroupedPostprocessingStep>,
    debug_renderer: DebugRenderer,
    settings: RendererSettings,
    statistics: RenderPassStatistics,
}

impl Renderer {
    /// Creates a renderer with default settings. Fails if any shader fails to compile or any
    /// framebuffer is incomplete.
    pub fn new(
        server: SharedGraphicsServer,
        resolution: Resolution,
        mut camera: Box<dyn Camera>,
        mut postprocessing: Option<GroupedPostprocessingStep>,
    ) -> Result<Self, FrameworkError> {
        let settings = RendererSettings::default();

        let techniques = DeferredTechniqueKind::CYCLE
            .iter()
            .map(|kind| create_technique(&*server, *kind))
            .collect::<Result<Vec<_>, _>>()?;

        camera.resolution_changed(resolution);
        if let Some(chain) = postprocessing.as_mut() {
            chain.resolution_changed(&*server, resolution)?;
        }

        Ok(Self {
            gbuffer: GBuffer::new(&*server, resolution)?,
            intermediate: make_intermediate_frame_buffer(
                &*server,
                resolution,
                postprocessing.as_ref(),
            )?,
            back_buffer: server.back_buffer(),
            debug_renderer: DebugRenderer::new(&*server)?,
            technique_index: settings.deferred_technique.cycle_index(),
            techniques,
            postprocessing,
            settings,
            camera,
            resolution,
            server,
            statistics: Default::default(),
        })
    }

    /// Renders one frame of the scene into the back buffer.
    pub fn render_scene(
        &mut self,
        scene: &mut Scene,
    ) -> Result<RenderPassStatistics, FrameworkError> {
        let server = &*self.server;
        server.invalidate_resource_bindings_cache();

        let mut statistics = RenderPassStatistics::default();
        let resolution = self.resolution;
        let viewport = resolution.viewport();
        let view = self.camera.view_matrix();
        let projection = self.camera.projection_matrix();

        let depth_test = self.settings.depth_test;
        let gbuffer_framebuffer = self.gbuffer.framebuffer_mut();
        gbuffer_framebuffer.clear(
            viewport,
            Some(Color::TRANSPARENT),
            depth_test.then_some(1.0),
            Some(0),
        );
        let params = geometry_pass_parameters(depth_test);
        for object in scene.objects_mut() {
            object.set_uniforms(&view, &projection);
            statistics += object.render(gbuffer_framebuffer, viewport, &params)?;
        }

        {
            let output: &mut dyn FrameBuffer = match self.intermediate.as_mut() {
                Some(intermediate) => &mut **intermediate,
                None => &mut *self.back_buffer,
            };

            let technique = &mut self.techniques[self.technique_index];
            let blits_depth = technique.blits_gbuffer_depth();
            statistics += technique.do_deferred_pass(DeferredPassContext {
                server,
                gbuffer: &self.gbuffer,
                output: &mut *output,
                scene: &mut *scene,
                view,
                projection,
                resolution,
                clear_color: self.settings.background_color,
                light_limits: self.settings.light_limits(),
            })?;

            if self.settings.debug_draw_lights {
                if !blits_depth {
                    self.gbuffer.blit(BlitMask::DEPTH, &*output, resolution)?;
                }
                statistics += self.debug_renderer.draw_point_lights(
                    output,
                    viewport,
                    &(projection * view),
                    scene.point_lights(),
                )?;
            }
        }

        if let (Some(chain), Some(intermediate)) =
            (self.postprocessing.as_mut(), self.intermediate.as_ref())
        {
            let input = intermediate.color_attachments()[0].texture.clone();
            statistics += chain.execute(
                server,
                &self.gbuffer,
                &input,
                &mut *self.back_buffer,
                viewport,
            )?;
        }

        self.statistics = statistics;

        Ok(statistics)
    }

    /// Renders the scene and presents the back buffer.
    pub fn render_and_swap_buffers(
        &mut self,
        scene: &mut Scene,
    ) -> Result<RenderPassStatistics, FrameworkError> {
        let statistics = self.render_scene(scene)?;
        self.server.swap_buffers()?;
        Ok(statistics)
    }

    /// Reallocates every resolution-dependent resource. Must be called whenever the size of the
    /// window changes.
    pub fn resolution_changed(&mut self, resolution: Resolution) -> Result<(), FrameworkError> {
        let server = &*self.server;
        server.set_frame_size((resolution.width, resolution.height));

        self.gbuffer = GBuffer::new(server, resolution)?;
        self.intermediate =
            make_intermediate_frame_buffer(server, resolution, self.postprocessing.as_ref())?;
        self.camera.resolution_changed(resolution);
        if let Some(chain) = self.postprocessing.as_mut() {
            chain.resolution_changed(server, resolution)?;
        }
        self.resolution = resolution;

        Ok(())
    }

    /// Color of pixels not lit by anything.
    pub fn set_background_color(&mut self, color: Color) {
        self.settings.background_color = color;
    }

    pub fn set_debug_draw_lights(&mut self, enabled: bool) {
        self.settings.debug_draw_lights = enabled;
    }

    pub fn set_depth_test_enabled(&mut self, enabled: bool) {
        self.settings.depth_test = enabled;
    }

    /// Switches to the next deferred shading technique and returns it.
    pub fn debug_cycle_deferred_technique(&mut self) -> DeferredTechniqueKind {
        self.technique_index = (self.technique_index + 1) % self.techniques.len();
        let kind = self.techniques[self.technique_index].kind();
        self.settings.deferred_technique = kind;
        Log::info(format!(
            "Deferred shading technique is switched to {}.",
            kind.as_ref()
        ));
        kind
    }

    pub fn technique_kind(&self) -> DeferredTechniqueKind {
        self.techniques[self.technique_index].kind()
    }

    pub fn settings(&self) -> &RendererSettings {
        &self.settings
    }

    pub fn set_settings(&mut self, settings: RendererSettings) {
        if settings.deferred_technique != self.technique_kind() {
            Log::info(format!(
                "Deferred shading technique is switched to {}.",
                settings.deferred_technique.as_ref()
            ));
        }
        self.technique_index = settings.deferred_technique.cycle_index();
        self.settings = settings;
    }

    pub fn camera(&self) -> &dyn Camera {
        &*self.camera
    }

    pub fn camera_mut(&mut self) -> &mut dyn Camera {
        &mut *self.camera
    }

    /// Replaces the camera. The camera is notified about the current resolution.
    pub fn set_camera(&mut self, mut camera: Box<dyn Camera>) {
        camera.resolution_changed(self.resolution);
        self.camera = camera;
    }

    pub fn resolution(&self) -> Resolution {
        self.resolution
    }

    pub fn gbuffer(&self) -> &GBuffer {
        &self.gbuffer
    }

    /// Statistics of the last rendered frame.
    pub fn statistics(&self) -> RenderPassStatistics {
        self.statistics
    }

    pub fn graphics_server(&self) -> &SharedGraphicsServer {
        &self.server
    }
}

#[cfg(test)]
mod test {
    use super::Renderer;
    use crate::{
        core::{
            algebra::{Matrix4, Vector3},
            color::Color,
            math::Resolution,
        },
        graphics::{
            framebuffer::BlitMask,
            gpu_texture::GpuTextureKind,
            headless::{texture_id, HeadlessGraphicsServer, RecordedCommand, BACK_BUFFER_ID},
            server::SharedGraphicsServer,
            CompareFunc,
        },
        renderer::{
            gbuffer::{GBuffer, GBufferTarget},
            postprocessing::{GroupedPostprocessingStep, SimplePostprocessingStep, StepDescriptor},
            settings::RendererSettings,
            technique::DeferredTechniqueKind,
        },
        scene::{
            camera::PerspectiveCamera,
            light::{LightColors, PointLight},
            object::{Material, MeshObject, ObjectShader},
            surface::SurfaceData,
            Scene,
        },
    };
    use std::rc::Rc;

    fn renderer(
        resolution: Resolution,
        postprocessing: bool,
    ) -> (Rc<HeadlessGraphicsServer>, Renderer) {
        let server = HeadlessGraphicsServer::new((resolution.width, resolution.height));
        let chain = postprocessing.then(|| {
            let mut chain = GroupedPostprocessingStep::new(Vec::new());
            chain.append(
                SimplePostprocessingStep::new(&*server, &[StepDescriptor::gamma_correction()])
                    .unwrap(),
            );
            chain
        });
        let camera = PerspectiveCamera::new(resolution, Default::default())
            .with_position(Vector3::new(0.0, 0.0, 10.0));
        let shared: SharedGraphicsServer = server.clone();
        let renderer = Renderer::new(shared, resolution, Box::new(camera), chain).unwrap();
        (server, renderer)
    }

    fn scene(server: &HeadlessGraphicsServer) -> Scene {
        let mut scene = Scene::new();
        let shader = ObjectShader::new(server).unwrap();
        scene.add_object(
            MeshObject::new(
                server,
                shader,
                &SurfaceData::make_cube(Matrix4::identity()),
                Material::default(),
            )
            .unwrap(),
        );
        scene.add_point_light(PointLight::new(
            Vector3::new(0.0, 2.0, 0.0),
            LightColors::default(),
            4.0,
        ));
        scene
    }

    #[test]
    fn test_cycle_returns_to_start() {
        let (_, mut renderer) = renderer(Resolution::new(32, 32), false);
        let start = renderer.technique_kind();
        assert_eq!(start, DeferredTechniqueKind::LightVolume);
        assert_eq!(
            renderer.debug_cycle_deferred_technique(),
            DeferredTechniqueKind::LightVolumeInstanced
        );
        assert_eq!(
            renderer.debug_cycle_deferred_technique(),
            DeferredTechniqueKind::Simple
        );
        assert_eq!(renderer.debug_cycle_deferred_technique(), start);
        assert_eq!(renderer.settings().deferred_technique, start);
    }

    #[test]
    fn test_resolution_change_is_idempotent() {
        let (_, mut renderer) = renderer(Resolution::new(32, 32), true);
        let resolution = Resolution::new(100, 50);
        renderer.resolution_changed(resolution).unwrap();
        let first = GBufferTarget::ALL.map(|t| renderer.gbuffer().target(t).borrow().pixel_kind());
        renderer.resolution_changed(resolution).unwrap();
        let second = GBufferTarget::ALL.map(|t| renderer.gbuffer().target(t).borrow().pixel_kind());

        assert_eq!(first, second);
        assert_eq!(renderer.resolution(), resolution);
        for i in 0..GBuffer::TARGET_COUNT {
            assert_eq!(
                renderer.gbuffer().color_target(i).borrow().kind(),
                GpuTextureKind::Rectangle {
                    width: 100,
                    height: 50
                }
            );
        }
    }

    #[test]
    fn test_every_technique_renders_empty_scene() {
        let (server, mut renderer) = renderer(Resolution::new(16, 16), false);
        renderer.set_background_color(Color::opaque(1, 2, 3));
        let mut scene = Scene::new();
        for _ in 0..3 {
            server.clear_commands();
            renderer.render_scene(&mut scene).unwrap();
            assert!(server.commands().iter().any(|c| matches!(
                c,
                RecordedCommand::Clear {
                    framebuffer: BACK_BUFFER_ID,
                    color: Some(color),
                    ..
                } if *color == Color::opaque(1, 2, 3)
            )));
            renderer.debug_cycle_deferred_technique();
        }
    }

    #[test]
    fn test_geometry_pass() {
        let (server, mut renderer) = renderer(Resolution::new(16, 16), false);
        let mut scene = scene(&server);
        server.clear_commands();
        let statistics = renderer.render_scene(&mut scene).unwrap();

        let commands = server.take_commands();
        assert!(matches!(
            commands[0],
            RecordedCommand::Clear {
                color: Some(Color::TRANSPARENT),
                depth: Some(_),
                stencil: Some(0),
                ..
            }
        ));
        let draws = commands.iter().filter_map(|c| c.as_draw()).collect::<Vec<_>>();
        assert_eq!(draws[0].program, "GBufferShader");
        assert_eq!(draws[0].params.depth_test, Some(CompareFunc::Less));
        assert!(statistics.draw_calls >= 3);
        assert_eq!(renderer.statistics(), statistics);

        renderer.set_depth_test_enabled(false);
        server.clear_commands();
        renderer.render_scene(&mut scene).unwrap();
        let commands = server.take_commands();
        assert!(matches!(commands[0], RecordedCommand::Clear { depth: None, .. }));
        assert_eq!(commands[1].as_draw().unwrap().params.depth_test, None);
    }

    #[test]
    fn test_postprocessing_reads_lit_image() {
        let (server, mut renderer) = renderer(Resolution::new(16, 16), true);
        let mut scene = scene(&server);
        server.clear_commands();
        renderer.render_scene(&mut scene).unwrap();

        let draws = server.draws();
        let last = draws.last().unwrap();
        assert_eq!(last.program, "SimplePostprocessing");
        assert_eq!(last.framebuffer, BACK_BUFFER_ID);
        // Lighting went into the intermediate framebuffer, not into the back buffer.
        let lighting = draws
            .iter()
            .find(|d| d.program == "LightVolumeShading")
            .unwrap();
        assert_ne!(lighting.framebuffer, BACK_BUFFER_ID);
        assert!(last.texture("frameBufferTexture").is_some());
        assert_ne!(
            last.texture("frameBufferTexture"),
            texture_id(renderer.gbuffer().target(GBufferTarget::Diffuse))
        );
    }

    #[test]
    fn test_debug_draw_blits_depth_for_simple_technique() {
        let (server, mut renderer) = renderer(Resolution::new(16, 16), false);
        let mut scene = scene(&server);
        renderer.set_settings(RendererSettings {
            deferred_technique: DeferredTechniqueKind::Simple,
            debug_draw_lights: true,
            ..Default::default()
        });
        assert_eq!(renderer.technique_kind(), DeferredTechniqueKind::Simple);

        server.clear_commands();
        renderer.render_scene(&mut scene).unwrap();
        let commands = server.take_commands();
        let blit = commands
            .iter()
            .position(|c| matches!(c, RecordedCommand::Blit { mask: BlitMask::DEPTH, .. }))
            .unwrap();
        let debug = commands
            .iter()
            .position(|c| c.as_draw().is_some_and(|d| d.program == "DebugShader"))
            .unwrap();
        assert!(blit < debug);
    }

    #[test]
    fn test_swap_buffers() {
        let (server, mut renderer) = renderer(Resolution::new(8, 8), false);
        renderer.render_and_swap_buffers(&mut Scene::new()).unwrap();
        assert!(matches!(
            server.commands().last(),
            Some(RecordedCommand::SwapBuffers)
        ));
    }
}
