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

//! GBuffer Layout:
//!
//! RT0: RGBA16F - View-space position (xyz) + specular strength (w)
//! RT1: RGBA16F - View-space normal (xyz) + roughness (w)
//! RT2: RGB8 - Diffuse color (xyz)
//! Depth: D24S8 - Scene depth, stencil is used by light volumes
//!
//! A zero-length normal marks pixels that were not covered by any object.

use crate::{
    core::{log::Log, math::Resolution},
    graphics::{
        error::FrameworkError,
        framebuffer::{Attachment, BlitMask, FrameBuffer},
        gpu_texture::{GpuTexture, PixelKind},
        server::GraphicsServer,
    },
};
use std::{cell::RefCell, rc::Rc};

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum GBufferTarget {
    PositionSpecular = 0,
    NormalRoughness = 1,
    Diffuse = 2,
}

impl GBufferTarget {
    pub const ALL: [Self; 3] = [
        Self::PositionSpecular,
        Self::NormalRoughness,
        Self::Diffuse,
    ];

    pub fn pixel_kind(self) -> PixelKind {
        match self {
            Self::PositionSpecular | Self::NormalRoughness => PixelKind::RGBA16F,
            Self::Diffuse => PixelKind::RGB8,
        }
    }
}

pub struct GBuffer {
    framebuffer: Box<dyn FrameBuffer>,
    depth: Rc<RefCell<dyn GpuTexture>>,
    resolution: Resolution,
}

impl GBuffer {
    pub const TARGET_COUNT: usize = GBufferTarget::ALL.len();

    /// Allocates every target at the given resolution. Fails if the graphics server rejects the
    /// framebuffer.
    pub fn new(server: &dyn GraphicsServer, resolution: Resolution) -> Result<Self, FrameworkError> {
        let width = resolution.width as usize;
        let height = resolution.height as usize;

        let depth = server.create_2d_render_target(PixelKind::D24S8, width, height)?;
        let mut color_attachments = Vec::with_capacity(Self::TARGET_COUNT);
        for target in GBufferTarget::ALL {
            color_attachments.push(Attachment::color(server.create_2d_render_target(
                target.pixel_kind(),
                width,
                height,
            )?));
        }

        let mut framebuffer = server.create_frame_buffer(
            Some(Attachment::depth_stencil(depth.clone())),
            color_attachments,
        )?;
        framebuffer.set_draw_buffers(&Self::buffers())?;

        Log::info(format!(
            "G-buffer is created with {}x{} resolution.",
            resolution.width, resolution.height
        ));

        Ok(Self {
            framebuffer,
            depth,
            resolution,
        })
    }

    /// Ordered list of color attachments that receive geometry pass outputs.
    pub fn buffers() -> [usize; 3] {
        GBufferTarget::ALL.map(|target| target as usize)
    }

    /// Returns the color target with the given index. Index 0 is the main target.
    ///
    /// # Panics
    ///
    /// Panics if the index is out of bounds.
    pub fn color_target(&self, index: usize) -> &Rc<RefCell<dyn GpuTexture>> {
        assert!(
            index < Self::TARGET_COUNT,
            "G-buffer target index {index} is out of bounds"
        );
        &self.framebuffer.color_attachments()[index].texture
    }

    pub fn target(&self, target: GBufferTarget) -> &Rc<RefCell<dyn GpuTexture>> {
        self.color_target(target as usize)
    }

    pub fn depth(&self) -> &Rc<RefCell<dyn GpuTexture>> {
        &self.depth
    }

    pub fn resolution(&self) -> Resolution {
        self.resolution
    }

    pub fn framebuffer(&self) -> &dyn FrameBuffer {
        &*self.framebuffer
    }

    pub fn framebuffer_mut(&mut self) -> &mut dyn FrameBuffer {
        &mut *self.framebuffer
    }

    /// Copies the requested buffers into a framebuffer with the given resolution. Depth and
    /// stencil require equal resolutions.
    pub fn blit(
        &self,
        mask: BlitMask,
        destination: &dyn FrameBuffer,
        resolution: Resolution,
    ) -> Result<(), FrameworkError> {
        self.framebuffer.blit_to(
            destination,
            self.resolution.viewport(),
            resolution.viewport(),
            mask,
        )
    }
}

#[cfg(test)]
mod test {
    use super::{GBuffer, GBufferTarget};
    use crate::{
        core::math::Resolution,
        graphics::{
            framebuffer::BlitMask,
            gpu_texture::{GpuTextureKind, PixelKind},
            headless::{HeadlessGraphicsServer, RecordedCommand},
            server::GraphicsServer,
        },
    };

    #[test]
    fn test_target_sizes_match_resolution() {
        let server = HeadlessGraphicsServer::new((1, 1));
        for (width, height) in [(1, 1), (800, 600), (1920, 1080), (3, 7)] {
            let gbuffer = GBuffer::new(&*server, Resolution::new(width, height)).unwrap();
            for i in 0..GBuffer::TARGET_COUNT {
                let target = gbuffer.color_target(i).borrow();
                assert_eq!(
                    target.kind(),
                    GpuTextureKind::Rectangle {
                        width: width as usize,
                        height: height as usize
                    }
                );
            }
            assert_eq!(gbuffer.depth().borrow().pixel_kind(), PixelKind::D24S8);
        }
    }

    #[test]
    fn test_target_formats() {
        let server = HeadlessGraphicsServer::new((1, 1));
        let gbuffer = GBuffer::new(&*server, Resolution::new(4, 4)).unwrap();
        for target in GBufferTarget::ALL {
            assert_eq!(
                gbuffer.target(target).borrow().pixel_kind(),
                target.pixel_kind()
            );
        }
        assert_eq!(gbuffer.framebuffer().draw_buffers(), &GBuffer::buffers());
        assert!(server
            .commands()
            .iter()
            .any(|c| matches!(c, RecordedCommand::SetDrawBuffers { buffers, .. } if buffers == &[0, 1, 2])));
    }

    #[test]
    #[should_panic]
    fn test_out_of_range_target() {
        let server = HeadlessGraphicsServer::new((1, 1));
        let gbuffer = GBuffer::new(&*server, Resolution::new(4, 4)).unwrap();
        gbuffer.color_target(GBuffer::TARGET_COUNT);
    }

    #[test]
    fn test_depth_blit() {
        let server = HeadlessGraphicsServer::new((8, 8));
        let gbuffer = GBuffer::new(&*server, Resolution::new(8, 8)).unwrap();
        let back_buffer = server.back_buffer();
        gbuffer
            .blit(BlitMask::DEPTH, &*back_buffer, Resolution::new(8, 8))
            .unwrap();
        assert!(gbuffer
            .blit(BlitMask::DEPTH, &*back_buffer, Resolution::new(4, 8))
            .is_err());
    }
}
