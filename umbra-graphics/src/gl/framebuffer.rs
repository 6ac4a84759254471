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
    core::{color::Color, math::Rect},
    error::FrameworkError,
    framebuffer::{
        validate_attachments, validate_blit, Attachment, AttachmentKind, BlitMask, FrameBuffer,
        ResourceBinding,
    },
    geometry_buffer::{DrawCallStatistics, GeometryBuffer},
    gl::{
        geometry_buffer::GlGeometryBuffer, program::GlProgram, server::GlGraphicsServer,
        texture::GlTexture,
    },
    gpu_program::{GpuProgram, GpuProgramBinding},
    DrawParameters, ElementRange,
};
use glow::HasContext;
use std::{any::Any, rc::Weak};

pub struct GlFrameBuffer {
    state: Weak<GlGraphicsServer>,
    fbo: Option<glow::Framebuffer>,
    depth_attachment: Option<Attachment>,
    color_attachments: Vec<Attachment>,
    draw_buffers: Vec<usize>,
}

fn gl_texture(attachment: &Attachment) -> Result<glow::Texture, FrameworkError> {
    attachment
        .texture
        .borrow()
        .as_any()
        .downcast_ref::<GlTexture>()
        .map(|t| t.id())
        .ok_or_else(|| FrameworkError::Custom("attachment must be an OpenGL texture".to_owned()))
}

fn status_name(status: u32) -> String {
    match status {
        glow::FRAMEBUFFER_INCOMPLETE_ATTACHMENT => "FRAMEBUFFER_INCOMPLETE_ATTACHMENT".to_owned(),
        glow::FRAMEBUFFER_INCOMPLETE_MISSING_ATTACHMENT => {
            "FRAMEBUFFER_INCOMPLETE_MISSING_ATTACHMENT".to_owned()
        }
        glow::FRAMEBUFFER_INCOMPLETE_DRAW_BUFFER => "FRAMEBUFFER_INCOMPLETE_DRAW_BUFFER".to_owned(),
        glow::FRAMEBUFFER_INCOMPLETE_READ_BUFFER => "FRAMEBUFFER_INCOMPLETE_READ_BUFFER".to_owned(),
        glow::FRAMEBUFFER_UNSUPPORTED => "FRAMEBUFFER_UNSUPPORTED".to_owned(),
        glow::FRAMEBUFFER_INCOMPLETE_MULTISAMPLE => "FRAMEBUFFER_INCOMPLETE_MULTISAMPLE".to_owned(),
        other => format!("0x{other:X}"),
    }
}

fn blit_mask_to_gl(mask: BlitMask) -> u32 {
    let mut gl_mask = 0;
    if mask.contains(BlitMask::COLOR) {
        gl_mask |= glow::COLOR_BUFFER_BIT;
    }
    if mask.contains(BlitMask::DEPTH) {
        gl_mask |= glow::DEPTH_BUFFER_BIT;
    }
    if mask.contains(BlitMask::STENCIL) {
        gl_mask |= glow::STENCIL_BUFFER_BIT;
    }
    gl_mask
}

impl GlFrameBuffer {
    pub fn new(
        server: &GlGraphicsServer,
        depth_attachment: Option<Attachment>,
        color_attachments: Vec<Attachment>,
    ) -> Result<Self, FrameworkError> {
        validate_attachments(depth_attachment.as_ref(), &color_attachments)?;

        unsafe {
            let fbo = server.gl.create_framebuffer()?;

            server.set_framebuffer(Some(fbo));

            let result = (|| {
                if let Some(depth_attachment) = depth_attachment.as_ref() {
                    let depth_attachment_kind = match depth_attachment.kind {
                        AttachmentKind::DepthStencil => glow::DEPTH_STENCIL_ATTACHMENT,
                        _ => glow::DEPTH_ATTACHMENT,
                    };
                    server.gl.framebuffer_texture_2d(
                        glow::FRAMEBUFFER,
                        depth_attachment_kind,
                        glow::TEXTURE_2D,
                        Some(gl_texture(depth_attachment)?),
                        0,
                    );
                }

                for (i, color_attachment) in color_attachments.iter().enumerate() {
                    server.gl.framebuffer_texture_2d(
                        glow::FRAMEBUFFER,
                        glow::COLOR_ATTACHMENT0 + i as u32,
                        glow::TEXTURE_2D,
                        Some(gl_texture(color_attachment)?),
                        0,
                    );
                }

                let color_buffers = (0..color_attachments.len())
                    .map(|i| glow::COLOR_ATTACHMENT0 + i as u32)
                    .collect::<Vec<_>>();
                if color_buffers.is_empty() {
                    server.gl.draw_buffers(&[glow::NONE]);
                    server.gl.read_buffer(glow::NONE);
                } else {
                    server.gl.draw_buffers(&color_buffers);
                }

                let status = server.gl.check_framebuffer_status(glow::FRAMEBUFFER);
                if status != glow::FRAMEBUFFER_COMPLETE {
                    return Err(FrameworkError::FailedToConstructFBO(status_name(status)));
                }

                Ok(())
            })();

            server.set_framebuffer(None);

            if let Err(err) = result {
                server.gl.delete_framebuffer(fbo);
                return Err(err);
            }

            Ok(Self {
                state: server.weak(),
                fbo: Some(fbo),
                draw_buffers: (0..color_attachments.len()).collect(),
                depth_attachment,
                color_attachments,
            })
        }
    }

    pub fn backbuffer(server: &GlGraphicsServer) -> Self {
        Self {
            state: server.weak(),
            fbo: None,
            depth_attachment: None,
            color_attachments: Default::default(),
            draw_buffers: vec![0],
        }
    }

    /// None is possible only for back buffer.
    pub fn id(&self) -> Option<glow::Framebuffer> {
        self.fbo
    }

    fn server(&self) -> Result<std::rc::Rc<GlGraphicsServer>, FrameworkError> {
        self.state
            .upgrade()
            .ok_or_else(|| FrameworkError::Custom("graphics server is gone".to_owned()))
    }
}

impl FrameBuffer for GlFrameBuffer {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }

    fn is_back_buffer(&self) -> bool {
        self.fbo.is_none()
    }

    fn color_attachments(&self) -> &[Attachment] {
        &self.color_attachments
    }

    fn depth_attachment(&self) -> Option<&Attachment> {
        self.depth_attachment.as_ref()
    }

    fn set_draw_buffers(&mut self, buffers: &[usize]) -> Result<(), FrameworkError> {
        if let Some(invalid) = buffers.iter().find(|b| **b >= self.color_attachments.len()) {
            return Err(FrameworkError::Custom(format!(
                "draw buffer {invalid} is out of {} color attachments",
                self.color_attachments.len()
            )));
        }
        if self.fbo.is_none() {
            return Ok(());
        }

        let server = self.server()?;
        server.set_framebuffer(self.fbo);
        let gl_buffers = buffers
            .iter()
            .map(|b| glow::COLOR_ATTACHMENT0 + *b as u32)
            .collect::<Vec<_>>();
        unsafe {
            server.gl.draw_buffers(&gl_buffers);
        }
        self.draw_buffers = buffers.to_vec();
        Ok(())
    }

    fn draw_buffers(&self) -> &[usize] {
        &self.draw_buffers
    }

    fn clear(
        &mut self,
        viewport: Rect<i32>,
        color: Option<Color>,
        depth: Option<f32>,
        stencil: Option<i32>,
    ) {
        let Some(server) = self.state.upgrade() else {
            return;
        };

        server.prepare_for_clear();
        server.set_viewport(viewport);
        server.set_framebuffer(self.id());

        unsafe {
            // Special route for default buffer.
            if self.fbo.is_none() {
                let mut mask = 0;

                if let Some(color) = color {
                    let rgba = color.as_frgba();
                    server.gl.clear_color(rgba.x, rgba.y, rgba.z, rgba.w);
                    mask |= glow::COLOR_BUFFER_BIT;
                }
                if let Some(depth) = depth {
                    server.gl.clear_depth_f32(depth);
                    mask |= glow::DEPTH_BUFFER_BIT;
                }
                if let Some(stencil) = stencil {
                    server.gl.clear_stencil(stencil);
                    mask |= glow::STENCIL_BUFFER_BIT;
                }

                if mask != 0 {
                    server.gl.clear(mask);
                }
                return;
            }

            if let Some(depth_stencil) = self.depth_attachment.as_ref() {
                match (depth_stencil.kind, depth, stencil) {
                    (AttachmentKind::DepthStencil, Some(depth), Some(stencil)) => {
                        server
                            .gl
                            .clear_buffer_depth_stencil(glow::DEPTH_STENCIL, 0, depth, stencil);
                    }
                    (_, Some(depth), _) => {
                        server.gl.clear_buffer_f32_slice(glow::DEPTH, 0, &[depth]);
                    }
                    (AttachmentKind::DepthStencil, None, Some(stencil)) => {
                        server.gl.clear_buffer_i32_slice(glow::STENCIL, 0, &[stencil]);
                    }
                    _ => (),
                }
            }

            if let Some(color) = color {
                let rgba = color.as_frgba();
                for draw_buffer in 0..self.draw_buffers.len() {
                    server.gl.clear_buffer_f32_slice(
                        glow::COLOR,
                        draw_buffer as u32,
                        &[rgba.x, rgba.y, rgba.z, rgba.w],
                    );
                }
            }
        }
    }

    fn blit_to(
        &self,
        dest: &dyn FrameBuffer,
        src: Rect<i32>,
        dst: Rect<i32>,
        mask: BlitMask,
    ) -> Result<(), FrameworkError> {
        validate_blit(src, dst, mask)?;

        let dest = dest
            .as_any()
            .downcast_ref::<GlFrameBuffer>()
            .ok_or_else(|| FrameworkError::Custom("blit target must be OpenGL".to_owned()))?;
        let server = self.server()?;

        server.prepare_for_clear();

        unsafe {
            server.gl.bind_framebuffer(glow::READ_FRAMEBUFFER, self.fbo);
            server.gl.bind_framebuffer(glow::DRAW_FRAMEBUFFER, dest.fbo);
            server.gl.blit_framebuffer(
                src.x(),
                src.y(),
                src.x() + src.w(),
                src.y() + src.h(),
                dst.x(),
                dst.y(),
                dst.x() + dst.w(),
                dst.y() + dst.h(),
                blit_mask_to_gl(mask),
                glow::NEAREST,
            );
        }

        server.rebind_framebuffer();

        Ok(())
    }

    fn draw(
        &mut self,
        geometry: &dyn GeometryBuffer,
        viewport: Rect<i32>,
        program: &dyn GpuProgram,
        params: &DrawParameters,
        resources: &[ResourceBinding],
        element_range: ElementRange,
        apply_uniforms: &mut dyn FnMut(&mut GpuProgramBinding),
    ) -> Result<DrawCallStatistics, FrameworkError> {
        let server = self.server()?;

        pre_draw(
            self.id(),
            &server,
            viewport,
            program,
            params,
            resources,
            apply_uniforms,
        )?;

        gl_geometry(geometry)?.draw(&server, element_range)
    }

    fn draw_instances(
        &mut self,
        count: usize,
        geometry: &dyn GeometryBuffer,
        viewport: Rect<i32>,
        program: &dyn GpuProgram,
        params: &DrawParameters,
        resources: &[ResourceBinding],
        apply_uniforms: &mut dyn FnMut(&mut GpuProgramBinding),
    ) -> Result<DrawCallStatistics, FrameworkError> {
        let server = self.server()?;

        let geometry = gl_geometry(geometry)?;
        geometry.validate_instances(count)?;

        pre_draw(
            self.id(),
            &server,
            viewport,
            program,
            params,
            resources,
            apply_uniforms,
        )?;

        geometry.draw_instances(&server, count)
    }
}

fn gl_geometry(geometry: &dyn GeometryBuffer) -> Result<&GlGeometryBuffer, FrameworkError> {
    geometry
        .as_any()
        .downcast_ref::<GlGeometryBuffer>()
        .ok_or_else(|| FrameworkError::Custom("geometry must be an OpenGL buffer".to_owned()))
}

fn pre_draw(
    fbo: Option<glow::Framebuffer>,
    server: &GlGraphicsServer,
    viewport: Rect<i32>,
    program: &dyn GpuProgram,
    params: &DrawParameters,
    resources: &[ResourceBinding],
    apply_uniforms: &mut dyn FnMut(&mut GpuProgramBinding),
) -> Result<(), FrameworkError> {
    let gl_program = program
        .as_any()
        .downcast_ref::<GlProgram>()
        .ok_or_else(|| FrameworkError::Custom("program must be an OpenGL program".to_owned()))?;

    server.set_framebuffer(fbo);
    server.set_viewport(viewport);
    server.apply_draw_parameters(params);
    server.set_program(Some(gl_program.id));

    let mut program_binding = GpuProgramBinding::new(program, gl_program);

    for (texture_unit, binding) in resources.iter().enumerate() {
        match binding {
            ResourceBinding::Texture {
                texture,
                shader_location,
            } => {
                let texture = texture.borrow();
                let texture = texture
                    .as_any()
                    .downcast_ref::<GlTexture>()
                    .ok_or_else(|| {
                        FrameworkError::Custom("texture must be an OpenGL texture".to_owned())
                    })?;
                program_binding.set_i32(shader_location, texture_unit as i32);
                texture.bind(server, texture_unit as u32);
            }
        }
    }

    apply_uniforms(&mut program_binding);

    Ok(())
}

impl Drop for GlFrameBuffer {
    fn drop(&mut self) {
        if let Some(state) = self.state.upgrade() {
            unsafe {
                if let Some(id) = self.fbo {
                    state.gl.delete_framebuffer(id);
                }
            }
        }
    }
}
