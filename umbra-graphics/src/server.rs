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

//! Graphics server is an abstraction layer over a graphics API. Everything the renderer does on
//! the GPU goes through it, so the same render paths run on a real OpenGL context and on the
//! recording [`crate::headless`] backend.

use crate::{
    error::FrameworkError,
    framebuffer::{Attachment, FrameBuffer},
    geometry_buffer::{GeometryBuffer, GeometryBufferDescriptor},
    gpu_program::GpuProgram,
    gpu_texture::{
        GpuTexture, GpuTextureDescriptor, GpuTextureKind, MagnificationFilter, MinificationFilter,
        PixelKind, WrapMode,
    },
    state::PipelineState,
    stats::PipelineStatistics,
    PolygonFace, PolygonFillMode,
};
use std::{any::Any, cell::RefCell, rc::Rc};

/// A shared reference to a graphics server.
pub type SharedGraphicsServer = Rc<dyn GraphicsServer>;

pub trait GraphicsServer: Any {
    fn as_any(&self) -> &dyn Any;

    /// Creates a new GPU texture using the given descriptor.
    fn create_texture(
        &self,
        desc: GpuTextureDescriptor,
    ) -> Result<Rc<RefCell<dyn GpuTexture>>, FrameworkError>;

    /// Creates a new frame buffer using the given depth and color attachments. Every attachment
    /// must have the same size, and the framebuffer must be complete, otherwise
    /// [`FrameworkError::FailedToConstructFBO`] is returned.
    fn create_frame_buffer(
        &self,
        depth_attachment: Option<Attachment>,
        color_attachments: Vec<Attachment>,
    ) -> Result<Box<dyn FrameBuffer>, FrameworkError>;

    /// Creates a frame buffer that is "connected" to the final image that will be displayed on
    /// screen.
    fn back_buffer(&self) -> Box<dyn FrameBuffer>;

    /// Creates a new named GPU program using a pair of vertex and fragment shaders. The name is
    /// used in error messages.
    fn create_program(
        &self,
        name: &str,
        vertex_source: &str,
        fragment_source: &str,
    ) -> Result<Box<dyn GpuProgram>, FrameworkError>;

    fn create_geometry_buffer(
        &self,
        desc: GeometryBufferDescriptor,
    ) -> Result<Box<dyn GeometryBuffer>, FrameworkError>;

    /// Forgets every cached resource binding, so the next draw rebinds everything.
    fn invalidate_resource_bindings_cache(&self);

    /// Returns statistics accumulated since the last [`Self::invalidate_resource_bindings_cache`].
    fn pipeline_statistics(&self) -> PipelineStatistics;

    /// Returns a snapshot of the current fixed-function state.
    fn capture_state(&self) -> PipelineState;

    /// Brings the context back to a previously captured state.
    fn restore_state(&self, state: &PipelineState);

    fn set_polygon_fill_mode(&self, polygon_face: PolygonFace, polygon_fill_mode: PolygonFillMode);

    /// Presents the back buffer.
    fn swap_buffers(&self) -> Result<(), FrameworkError>;

    /// Notifies the server that the window surface has changed its size.
    fn set_frame_size(&self, new_size: (u32, u32));

    /// A shortcut for [`Self::create_texture`], that creates a rectangular render target with
    /// nearest filtering and edge clamping.
    fn create_2d_render_target(
        &self,
        pixel_kind: PixelKind,
        width: usize,
        height: usize,
    ) -> Result<Rc<RefCell<dyn GpuTexture>>, FrameworkError> {
        self.create_texture(GpuTextureDescriptor {
            kind: GpuTextureKind::Rectangle { width, height },
            pixel_kind,
            min_filter: MinificationFilter::Nearest,
            mag_filter: MagnificationFilter::Nearest,
            s_wrap_mode: WrapMode::ClampToEdge,
            t_wrap_mode: WrapMode::ClampToEdge,
            data: None,
        })
    }
}
