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
    core::{
        log::{Log, MessageKind},
        math::Rect,
    },
    error::FrameworkError,
    framebuffer::{Attachment, FrameBuffer},
    geometry_buffer::{GeometryBuffer, GeometryBufferDescriptor},
    gl::{
        check_gl_error, framebuffer::GlFrameBuffer, geometry_buffer::GlGeometryBuffer,
        program::GlProgram, texture::GlTexture, ToGlConstant,
    },
    gpu_program::GpuProgram,
    gpu_texture::{GpuTexture, GpuTextureDescriptor},
    server::GraphicsServer,
    state::{PipelineState, StateChange},
    stats::PipelineStatistics,
    ColorMask, DrawParameters, PolygonFace, PolygonFillMode,
};
use glow::HasContext;
use glutin::{
    config::ConfigTemplateBuilder,
    context::{
        ContextApi, ContextAttributesBuilder, GlProfile, NotCurrentGlContext,
        PossiblyCurrentContext, Version,
    },
    display::{GetGlDisplay, GlDisplay},
    surface::{GlSurface, Surface, SwapInterval, WindowSurface},
};
use glutin_winit::{DisplayBuilder, GlWindow};
use raw_window_handle::HasRawWindowHandle;
use std::{
    any::Any,
    cell::RefCell,
    ffi::CString,
    num::NonZeroU32,
    rc::{Rc, Weak},
};
use winit::{
    event_loop::EventLoopWindowTarget,
    window::{Window, WindowBuilder},
};

const TEXTURE_UNIT_COUNT: usize = 32;

#[derive(Default)]
struct TextureUnitsStorage {
    active_unit: u32,
    units: [Option<glow::Texture>; TEXTURE_UNIT_COUNT],
}

pub(crate) struct InnerState {
    pub(crate) pipeline: PipelineState,

    polygon_face: PolygonFace,
    polygon_fill_mode: PolygonFillMode,

    framebuffer: Option<glow::Framebuffer>,
    program: Option<glow::Program>,
    vao: Option<glow::VertexArray>,
    texture_units_storage: TextureUnitsStorage,

    gl_context: PossiblyCurrentContext,
    gl_surface: Surface<WindowSurface>,
}

impl InnerState {
    fn new(gl_context: PossiblyCurrentContext, gl_surface: Surface<WindowSurface>) -> Self {
        Self {
            pipeline: Default::default(),
            polygon_face: Default::default(),
            polygon_fill_mode: Default::default(),
            framebuffer: None,
            program: None,
            vao: None,
            texture_units_storage: Default::default(),
            gl_context,
            gl_surface,
        }
    }
}

/// Issues a single state change to the context. The caller is responsible for keeping
/// [`PipelineState`] in sync, all changes come from it.
fn issue_state_change(gl: &glow::Context, change: StateChange) {
    fn toggle(gl: &glow::Context, capability: u32, enabled: bool) {
        unsafe {
            if enabled {
                gl.enable(capability)
            } else {
                gl.disable(capability)
            }
        }
    }

    unsafe {
        match change {
            StateChange::Blend(blend) => toggle(gl, glow::BLEND, blend),
            StateChange::BlendFunc(func) => gl.blend_func_separate(
                func.sfactor.into_gl(),
                func.dfactor.into_gl(),
                func.alpha_sfactor.into_gl(),
                func.alpha_dfactor.into_gl(),
            ),
            StateChange::BlendEquation(equation) => {
                gl.blend_equation_separate(equation.rgb.into_gl(), equation.alpha.into_gl())
            }
            StateChange::DepthTest(depth_test) => toggle(gl, glow::DEPTH_TEST, depth_test),
            StateChange::DepthFunc(func) => gl.depth_func(func.into_gl()),
            StateChange::DepthWrite(depth_write) => gl.depth_mask(depth_write),
            StateChange::ColorWrite(mask) => {
                gl.color_mask(mask.red, mask.green, mask.blue, mask.alpha)
            }
            StateChange::StencilTest(stencil_test) => {
                toggle(gl, glow::STENCIL_TEST, stencil_test)
            }
            StateChange::StencilFunc(func) => {
                gl.stencil_func(func.func.into_gl(), func.ref_value as i32, func.mask)
            }
            StateChange::StencilOp { face, op } => {
                gl.stencil_op_separate(
                    face.into_gl(),
                    op.fail.into_gl(),
                    op.zfail.into_gl(),
                    op.zpass.into_gl(),
                );
                gl.stencil_mask_separate(face.into_gl(), op.write_mask);
            }
            StateChange::Culling(culling) => toggle(gl, glow::CULL_FACE, culling),
            StateChange::CullFace(face) => gl.cull_face(face.into_gl()),
            StateChange::ScissorTest(scissor_test) => {
                toggle(gl, glow::SCISSOR_TEST, scissor_test)
            }
            StateChange::ScissorBox(scissor_box) => gl.scissor(
                scissor_box.x,
                scissor_box.y,
                scissor_box.width,
                scissor_box.height,
            ),
            StateChange::Viewport(viewport) => {
                gl.viewport(viewport.x(), viewport.y(), viewport.w(), viewport.h())
            }
        }
    }
}

pub struct GlGraphicsServer {
    pub gl: glow::Context,
    pub(crate) state: RefCell<InnerState>,
    this: RefCell<Option<Weak<GlGraphicsServer>>>,
}

impl GlGraphicsServer {
    /// Creates a window together with an OpenGL 3.3 core context attached to it.
    #[allow(clippy::new_ret_no_self)]
    pub fn new(
        vsync: bool,
        window_target: &EventLoopWindowTarget<()>,
        window_builder: WindowBuilder,
    ) -> Result<(Window, Rc<Self>), FrameworkError> {
        let template = ConfigTemplateBuilder::new()
            .prefer_hardware_accelerated(Some(true))
            .with_stencil_size(8)
            .with_depth_size(24);

        let (opt_window, gl_config) = DisplayBuilder::new()
            .with_window_builder(Some(window_builder))
            .build(window_target, template, |mut configs| {
                configs
                    .next()
                    .expect("the display must expose at least one matching config")
            })?;

        let window = opt_window
            .ok_or_else(|| FrameworkError::Custom("unable to create a window".to_owned()))?;

        let raw_window_handle = window.raw_window_handle();

        let gl_display = gl_config.display();

        let context_attributes = ContextAttributesBuilder::new()
            .with_debug(cfg!(debug_assertions))
            .with_profile(GlProfile::Core)
            .with_context_api(ContextApi::OpenGl(Some(Version::new(3, 3))))
            .build(Some(raw_window_handle));

        let (gl_context, gl_surface, mut context) = unsafe {
            let attrs = window.build_surface_attributes(Default::default());

            let gl_surface = gl_display.create_window_surface(&gl_config, &attrs)?;

            let gl_context = gl_display
                .create_context(&gl_config, &context_attributes)?
                .make_current(&gl_surface)?;

            if vsync {
                if let Some(interval) = NonZeroU32::new(1) {
                    Log::verify(
                        gl_surface.set_swap_interval(&gl_context, SwapInterval::Wait(interval)),
                    );
                }
            }

            let context = glow::Context::from_loader_function(|s| match CString::new(s) {
                Ok(name) => gl_display.get_proc_address(&name),
                Err(_) => std::ptr::null(),
            });

            (gl_context, gl_surface, context)
        };

        let size = window.inner_size();
        gl_surface.resize(
            &gl_context,
            NonZeroU32::new(size.width).unwrap_or(NonZeroU32::MIN),
            NonZeroU32::new(size.height).unwrap_or(NonZeroU32::MIN),
        );

        Log::info(format!(
            "OpenGL context created: {}",
            unsafe { context.get_parameter_string(glow::VERSION) }
        ));

        unsafe {
            if cfg!(debug_assertions) && context.supported_extensions().contains("GL_KHR_debug") {
                context.debug_message_callback(|_source, msg_type, id, severity, message| {
                    let message_kind = if severity == glow::DEBUG_SEVERITY_HIGH {
                        MessageKind::Error
                    } else if severity == glow::DEBUG_SEVERITY_MEDIUM
                        || severity == glow::DEBUG_SEVERITY_LOW
                    {
                        MessageKind::Warning
                    } else {
                        // Notifications are spam.
                        return;
                    };

                    let msg_type = match msg_type {
                        glow::DEBUG_TYPE_ERROR => "Error",
                        glow::DEBUG_TYPE_DEPRECATED_BEHAVIOR => "Deprecated behavior",
                        glow::DEBUG_TYPE_UNDEFINED_BEHAVIOR => "Undefined behavior",
                        glow::DEBUG_TYPE_PORTABILITY => "Portability",
                        glow::DEBUG_TYPE_PERFORMANCE => "Performance",
                        _ => "Other",
                    };

                    Log::writeln(
                        message_kind,
                        format!("OpenGL message ({msg_type}, id {id}): {message}"),
                    );
                });
            }

            // The mirror starts from the documented initial state of a context, enforce it.
            context.depth_func(glow::LESS);
        }

        let server = Rc::new(Self {
            gl: context,
            state: RefCell::new(InnerState::new(gl_context, gl_surface)),
            this: Default::default(),
        });

        *server.this.borrow_mut() = Some(Rc::downgrade(&server));

        Ok((window, server))
    }

    pub fn weak(&self) -> Weak<Self> {
        self.this.borrow().clone().unwrap_or_default()
    }

    pub(crate) fn set_framebuffer(&self, framebuffer: Option<glow::Framebuffer>) {
        let mut state = self.state.borrow_mut();
        if state.framebuffer != framebuffer {
            state.framebuffer = framebuffer;
            state.pipeline.statistics_mut().framebuffer_binding_changes += 1;

            unsafe { self.gl.bind_framebuffer(glow::FRAMEBUFFER, framebuffer) }
        }
    }

    /// Restores `GL_FRAMEBUFFER` binding from the cache after separate read/draw bindings.
    pub(crate) fn rebind_framebuffer(&self) {
        let state = self.state.borrow();
        unsafe { self.gl.bind_framebuffer(glow::FRAMEBUFFER, state.framebuffer) }
    }

    pub(crate) fn set_viewport(&self, viewport: Rect<i32>) {
        let mut state = self.state.borrow_mut();
        if let Some(change) = state.pipeline.set_viewport(viewport) {
            issue_state_change(&self.gl, change);
        }
    }

    pub(crate) fn set_program(&self, program: Option<glow::Program>) {
        let mut state = self.state.borrow_mut();
        if state.program != program {
            state.program = program;
            state.pipeline.statistics_mut().program_binding_changes += 1;

            unsafe {
                self.gl.use_program(program);
            }
        }
    }

    pub(crate) fn set_texture(&self, unit_index: u32, texture: Option<glow::Texture>) {
        let mut state = self.state.borrow_mut();
        let state = &mut *state;
        let storage = &mut state.texture_units_storage;
        let Some(unit) = storage.units.get_mut(unit_index as usize) else {
            Log::err(format!("Texture unit {unit_index} is out of range"));
            return;
        };
        if *unit != texture {
            *unit = texture;
            unsafe {
                if storage.active_unit != unit_index {
                    storage.active_unit = unit_index;
                    self.gl.active_texture(glow::TEXTURE0 + unit_index);
                }
                self.gl.bind_texture(glow::TEXTURE_2D, texture);
            }
            state.pipeline.statistics_mut().texture_binding_changes += 1;
        }
    }

    pub(crate) fn set_vertex_array_object(&self, vao: Option<glow::VertexArray>) {
        let mut state = self.state.borrow_mut();
        if state.vao != vao {
            state.vao = vao;
            state.pipeline.statistics_mut().vao_binding_changes += 1;

            unsafe {
                self.gl.bind_vertex_array(vao);
            }
        }
    }

    pub(crate) fn apply_draw_parameters(&self, draw_params: &DrawParameters) {
        let mut state = self.state.borrow_mut();
        state
            .pipeline
            .apply_draw_parameters(draw_params, &mut |change| {
                issue_state_change(&self.gl, change)
            });
    }

    /// Unmasks every buffer and disables scissor test, so a clear affects the whole viewport of
    /// every attachment.
    pub(crate) fn prepare_for_clear(&self) {
        let mut state = self.state.borrow_mut();
        let pipeline = &mut state.pipeline;
        let emit = |change: Option<StateChange>| {
            if let Some(change) = change {
                issue_state_change(&self.gl, change)
            }
        };
        emit(pipeline.set_scissor_test(false));
        emit(pipeline.set_color_write(ColorMask::all(true)));
        emit(pipeline.set_depth_write(true));
        pipeline.set_stencil_write_mask(0xFFFF_FFFF, &mut |change| {
            issue_state_change(&self.gl, change)
        });
    }
}

impl GraphicsServer for GlGraphicsServer {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn create_texture(
        &self,
        desc: GpuTextureDescriptor,
    ) -> Result<Rc<RefCell<dyn GpuTexture>>, FrameworkError> {
        Ok(Rc::new(RefCell::new(GlTexture::new(self, desc)?)))
    }

    fn create_frame_buffer(
        &self,
        depth_attachment: Option<Attachment>,
        color_attachments: Vec<Attachment>,
    ) -> Result<Box<dyn FrameBuffer>, FrameworkError> {
        Ok(Box::new(GlFrameBuffer::new(
            self,
            depth_attachment,
            color_attachments,
        )?))
    }

    fn back_buffer(&self) -> Box<dyn FrameBuffer> {
        Box::new(GlFrameBuffer::backbuffer(self))
    }

    fn create_program(
        &self,
        name: &str,
        vertex_source: &str,
        fragment_source: &str,
    ) -> Result<Box<dyn GpuProgram>, FrameworkError> {
        Ok(Box::new(GlProgram::from_source(
            self,
            name,
            vertex_source,
            fragment_source,
        )?))
    }

    fn create_geometry_buffer(
        &self,
        desc: GeometryBufferDescriptor,
    ) -> Result<Box<dyn GeometryBuffer>, FrameworkError> {
        let buffer = GlGeometryBuffer::new(self, desc)?;
        check_gl_error(&self.gl, "create_geometry_buffer");
        Ok(Box::new(buffer))
    }

    fn invalidate_resource_bindings_cache(&self) {
        let mut state = self.state.borrow_mut();

        unsafe {
            for (unit_index, unit) in state.texture_units_storage.units.iter().enumerate() {
                if unit.is_some() {
                    self.gl.active_texture(glow::TEXTURE0 + unit_index as u32);
                    self.gl.bind_texture(glow::TEXTURE_2D, None);
                }
            }
            self.gl.active_texture(glow::TEXTURE0);
            self.gl.use_program(None);
        }
        state.texture_units_storage = Default::default();
        state.program = None;
        *state.pipeline.statistics_mut() = Default::default();
    }

    fn pipeline_statistics(&self) -> PipelineStatistics {
        self.state.borrow().pipeline.statistics()
    }

    fn capture_state(&self) -> PipelineState {
        self.state.borrow().pipeline.clone()
    }

    fn restore_state(&self, saved: &PipelineState) {
        let mut state = self.state.borrow_mut();
        state
            .pipeline
            .transition_to(saved, &mut |change| issue_state_change(&self.gl, change));
    }

    fn set_polygon_fill_mode(&self, polygon_face: PolygonFace, polygon_fill_mode: PolygonFillMode) {
        let mut state = self.state.borrow_mut();
        if state.polygon_fill_mode != polygon_fill_mode || state.polygon_face != polygon_face {
            state.polygon_fill_mode = polygon_fill_mode;
            state.polygon_face = polygon_face;

            unsafe {
                self.gl
                    .polygon_mode(polygon_face.into_gl(), polygon_fill_mode.into_gl())
            }
        }
    }

    fn swap_buffers(&self) -> Result<(), FrameworkError> {
        check_gl_error(&self.gl, "frame");
        let state = self.state.borrow();
        Ok(state.gl_surface.swap_buffers(&state.gl_context)?)
    }

    fn set_frame_size(&self, new_size: (u32, u32)) {
        let state = self.state.borrow();
        state.gl_surface.resize(
            &state.gl_context,
            NonZeroU32::new(new_size.0).unwrap_or(NonZeroU32::MIN),
            NonZeroU32::new(new_size.1).unwrap_or(NonZeroU32::MIN),
        );
    }
}
