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

//! Full-screen passes applied to the lit image before it reaches the destination framebuffer.
//!
//! A step reads one texture and writes one framebuffer. Steps are chained by
//! [`grouped::GroupedPostprocessingStep`], which ping-pongs between pooled intermediate
//! framebuffers and lets the last step write straight into the destination.

pub mod grouped;
pub mod pool;
pub mod simple;

use crate::{
    core::math::{Rect, Resolution},
    graphics::{
        error::FrameworkError, framebuffer::FrameBuffer, gpu_texture::GpuTexture,
        server::GraphicsServer, stats::RenderPassStatistics,
    },
    renderer::gbuffer::GBuffer,
};
use std::{cell::RefCell, rc::Rc};

pub use grouped::GroupedPostprocessingStep;
pub use simple::{SimplePostprocessingStep, StepDescriptor};

pub trait PostprocessingStep {
    /// Reads `input` and writes the processed image into `output`. The G-buffer is available
    /// for steps that need depth or normals.
    fn execute(
        &mut self,
        server: &dyn GraphicsServer,
        gbuffer: &GBuffer,
        input: &Rc<RefCell<dyn GpuTexture>>,
        output: &mut dyn FrameBuffer,
        viewport: Rect<i32>,
    ) -> Result<RenderPassStatistics, FrameworkError>;

    /// Called when the size of the rendered image changes.
    fn resolution_changed(
        &mut self,
        _server: &dyn GraphicsServer,
        _resolution: Resolution,
    ) -> Result<(), FrameworkError> {
        Ok(())
    }
}
