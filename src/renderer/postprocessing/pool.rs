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
    core::{log::Log, math::Resolution},
    graphics::{
        error::FrameworkError,
        framebuffer::{Attachment, FrameBuffer},
        gpu_texture::PixelKind,
        server::GraphicsServer,
    },
};
use std::{cell::RefCell, rc::Rc};

pub type PooledFrameBuffer = Rc<RefCell<Box<dyn FrameBuffer>>>;

/// Set of color-only framebuffers of the same size. A framebuffer is free when the pool holds
/// the only reference to it.
pub struct FrameBufferPool {
    resolution: Resolution,
    items: Vec<PooledFrameBuffer>,
}

impl FrameBufferPool {
    pub fn new(resolution: Resolution) -> Self {
        Self {
            resolution,
            items: Default::default(),
        }
    }

    /// Returns a free framebuffer or allocates a new one. The framebuffer stays taken until
    /// every returned handle is dropped.
    pub fn next(&mut self, server: &dyn GraphicsServer) -> Result<PooledFrameBuffer, FrameworkError> {
        if let Some(free) = self.items.iter().find(|item| Rc::strong_count(item) == 1) {
            return Ok(free.clone());
        }

        let texture = server.create_2d_render_target(
            PixelKind::RGBA16F,
            self.resolution.width as usize,
            self.resolution.height as usize,
        )?;
        let framebuffer = Rc::new(RefCell::new(
            server.create_frame_buffer(None, vec![Attachment::color(texture)])?,
        ));
        self.items.push(framebuffer.clone());

        Log::info(format!(
            "Post-processing pool has grown to {} framebuffers of {}x{}.",
            self.items.len(),
            self.resolution.width,
            self.resolution.height
        ));

        Ok(framebuffer)
    }

    /// Amount of framebuffers that are referenced outside of the pool.
    pub fn in_use(&self) -> usize {
        self.items
            .iter()
            .filter(|item| Rc::strong_count(item) > 1)
            .count()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn resolution(&self) -> Resolution {
        self.resolution
    }

    /// Forgets every framebuffer. New ones are allocated lazily with the given size.
    pub fn reset(&mut self, resolution: Resolution) {
        self.items.clear();
        self.resolution = resolution;
    }
}

#[cfg(test)]
mod test {
    use super::FrameBufferPool;
    use crate::{
        core::math::Resolution,
        graphics::{gpu_texture::GpuTextureKind, headless::HeadlessGraphicsServer},
    };

    #[test]
    fn test_reuse_when_released() {
        let server = HeadlessGraphicsServer::new((1, 1));
        let mut pool = FrameBufferPool::new(Resolution::new(16, 8));

        let a = pool.next(&*server).unwrap();
        let b = pool.next(&*server).unwrap();
        assert_eq!(pool.len(), 2);
        assert_eq!(pool.in_use(), 2);

        drop(a);
        assert_eq!(pool.in_use(), 1);
        let c = pool.next(&*server).unwrap();
        assert_eq!(pool.len(), 2);
        assert_eq!(pool.in_use(), 2);

        drop(b);
        drop(c);
        assert_eq!(pool.in_use(), 0);
    }

    #[test]
    fn test_size_follows_resolution() {
        let server = HeadlessGraphicsServer::new((1, 1));
        let mut pool = FrameBufferPool::new(Resolution::new(16, 8));
        drop(pool.next(&*server).unwrap());

        pool.reset(Resolution::new(32, 32));
        assert!(pool.is_empty());

        let framebuffer = pool.next(&*server).unwrap();
        let framebuffer = framebuffer.borrow();
        assert_eq!(
            framebuffer.color_attachments()[0].texture.borrow().kind(),
            GpuTextureKind::Rectangle {
                width: 32,
                height: 32
            }
        );
        assert!(framebuffer.depth_attachment().is_none());
    }
}
