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
    geometry_buffer::{DrawCallStatistics, GeometryBuffer},
    gpu_program::{GpuProgram, GpuProgramBinding, UniformLocation},
    gpu_texture::GpuTexture,
    DrawParameters, ElementRange,
};
use bitflags::bitflags;
use std::{any::Any, cell::RefCell, rc::Rc};

#[derive(Copy, Clone, PartialOrd, PartialEq, Hash, Debug, Eq)]
pub enum AttachmentKind {
    Color,
    DepthStencil,
    Depth,
}

#[derive(Clone)]
pub struct Attachment {
    pub kind: AttachmentKind,
    pub texture: Rc<RefCell<dyn GpuTexture>>,
}

impl Attachment {
    pub fn color(texture: Rc<RefCell<dyn GpuTexture>>) -> Self {
        Self {
            kind: AttachmentKind::Color,
            texture,
        }
    }

    pub fn depth_stencil(texture: Rc<RefCell<dyn GpuTexture>>) -> Self {
        Self {
            kind: AttachmentKind::DepthStencil,
            texture,
        }
    }
}

pub enum ResourceBinding {
    Texture {
        texture: Rc<RefCell<dyn GpuTexture>>,
        shader_location: UniformLocation,
    },
}

impl ResourceBinding {
    pub fn texture(
        texture: &Rc<RefCell<dyn GpuTexture>>,
        shader_location: &UniformLocation,
    ) -> Self {
        Self::Texture {
            texture: texture.clone(),
            shader_location: shader_location.clone(),
        }
    }
}

bitflags! {
    /// Set of buffers copied by [`FrameBuffer::blit_to`].
    #[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
    pub struct BlitMask: u32 {
        const COLOR = 0b0001;
        const DEPTH = 0b0010;
        const STENCIL = 0b0100;
    }
}

pub trait FrameBuffer: Any {
    fn as_any(&self) -> &dyn Any;

    fn as_any_mut(&mut self) -> &mut dyn Any;

    /// Returns `true` for the default framebuffer of a window.
    fn is_back_buffer(&self) -> bool;

    fn color_attachments(&self) -> &[Attachment];

    fn depth_attachment(&self) -> Option<&Attachment>;

    /// Selects which color attachments receive fragment shader outputs. Output `i` of a shader
    /// goes to the attachment `buffers[i]`.
    fn set_draw_buffers(&mut self, buffers: &[usize]) -> Result<(), FrameworkError>;

    fn draw_buffers(&self) -> &[usize];

    fn clear(
        &mut self,
        viewport: Rect<i32>,
        color: Option<Color>,
        depth: Option<f32>,
        stencil: Option<i32>,
    );

    /// Copies a region of this framebuffer into `dest`. Depth and stencil can only be copied
    /// between regions of the same size.
    fn blit_to(
        &self,
        dest: &dyn FrameBuffer,
        src: Rect<i32>,
        dst: Rect<i32>,
        mask: BlitMask,
    ) -> Result<(), FrameworkError>;

    #[allow(clippy::too_many_arguments)]
    fn draw(
        &mut self,
        geometry: &dyn GeometryBuffer,
        viewport: Rect<i32>,
        program: &dyn GpuProgram,
        params: &DrawParameters,
        resources: &[ResourceBinding],
        element_range: ElementRange,
        apply_uniforms: &mut dyn FnMut(&mut GpuProgramBinding),
    ) -> Result<DrawCallStatistics, FrameworkError>;

    #[allow(clippy::too_many_arguments)]
    fn draw_instances(
        &mut self,
        count: usize,
        geometry: &dyn GeometryBuffer,
        viewport: Rect<i32>,
        program: &dyn GpuProgram,
        params: &DrawParameters,
        resources: &[ResourceBinding],
        apply_uniforms: &mut dyn FnMut(&mut GpuProgramBinding),
    ) -> Result<DrawCallStatistics, FrameworkError>;
}

/// Checks the blit request the same way the graphics API does.
pub fn validate_blit(
    src: Rect<i32>,
    dst: Rect<i32>,
    mask: BlitMask,
) -> Result<(), FrameworkError> {
    if mask.intersects(BlitMask::DEPTH | BlitMask::STENCIL) && src.size != dst.size {
        return Err(FrameworkError::Custom(format!(
            "depth/stencil blit requires equal regions, got {}x{} and {}x{}",
            src.w(),
            src.h(),
            dst.w(),
            dst.h()
        )));
    }
    Ok(())
}

/// Performs the completeness checks every backend does before creating a framebuffer: there
/// must be at least one attachment, attachment kinds must match their slots and their pixel
/// formats, and every attachment must have the same size.
pub fn validate_attachments(
    depth_attachment: Option<&Attachment>,
    color_attachments: &[Attachment],
) -> Result<(), FrameworkError> {
    if depth_attachment.is_none() && color_attachments.is_empty() {
        return Err(FrameworkError::FailedToConstructFBO(
            "FRAMEBUFFER_INCOMPLETE_MISSING_ATTACHMENT".to_owned(),
        ));
    }

    if let Some(depth) = depth_attachment {
        let pixel_kind = depth.texture.borrow().pixel_kind();
        let matches = match depth.kind {
            AttachmentKind::Color => false,
            AttachmentKind::DepthStencil => pixel_kind.has_stencil(),
            AttachmentKind::Depth => pixel_kind.is_depth(),
        };
        if !matches {
            return Err(FrameworkError::FailedToConstructFBO(format!(
                "FRAMEBUFFER_INCOMPLETE_ATTACHMENT: {:?} attachment can't use {:?} pixels",
                depth.kind, pixel_kind
            )));
        }
    }

    for (index, color) in color_attachments.iter().enumerate() {
        let pixel_kind = color.texture.borrow().pixel_kind();
        if color.kind != AttachmentKind::Color || pixel_kind.is_depth() {
            return Err(FrameworkError::FailedToConstructFBO(format!(
                "FRAMEBUFFER_INCOMPLETE_ATTACHMENT: color attachment {index} is {:?} with {:?} \
                pixels",
                color.kind, pixel_kind
            )));
        }
    }

    let mut sizes = depth_attachment
        .into_iter()
        .chain(color_attachments.iter())
        .map(|a| a.texture.borrow().kind());
    if let Some(first) = sizes.next() {
        if let Some(other) = sizes.find(|kind| *kind != first) {
            return Err(FrameworkError::FailedToConstructFBO(format!(
                "FRAMEBUFFER_INCOMPLETE_DIMENSIONS: {}x{} and {}x{}",
                first.width(),
                first.height(),
                other.width(),
                other.height()
            )));
        }
    }

    Ok(())
}
