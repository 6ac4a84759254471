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
        log::Log,
        math::{Rect, Resolution},
    },
    graphics::{
        error::FrameworkError, framebuffer::FrameBuffer, gpu_texture::GpuTexture,
        server::GraphicsServer, stats::RenderPassStatistics,
    },
    renderer::{
        gbuffer::GBuffer,
        postprocessing::{
            pool::{FrameBufferPool, PooledFrameBuffer},
            PostprocessingStep,
        },
    },
};
use std::{cell::RefCell, rc::Rc};

/// Runs a sequence of steps one after another. Every step except the last one writes into an
/// intermediate framebuffer from the pool, the last one writes into the destination.
pub struct GroupedPostprocessingStep {
    steps: Vec<Box<dyn PostprocessingStep>>,
    pool: FrameBufferPool,
}

impl GroupedPostprocessingStep {
    pub fn new(steps: Vec<Box<dyn PostprocessingStep>>) -> Self {
        Self {
            steps,
            pool: FrameBufferPool::new(Resolution::default()),
        }
    }

    pub fn append<S: PostprocessingStep + 'static>(&mut self, step: S) {
        self.steps.push(Box::new(step));
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn pool(&self) -> &FrameBufferPool {
        &self.pool
    }

    /// Drops intermediate framebuffers if their size differs from the given one.
    pub fn setup_pool(&mut self, resolution: Resolution) {
        if self.pool.resolution() != resolution {
            Log::info(format!(
                "Post-processing framebuffers are reallocated for {}x{}.",
                resolution.width, resolution.height
            ));
            self.pool.reset(resolution);
        }
    }
}

impl PostprocessingStep for GroupedPostprocessingStep {
    fn execute(
        &mut self,
        server: &dyn GraphicsServer,
        gbuffer: &GBuffer,
        input: &Rc<RefCell<dyn GpuTexture>>,
        output: &mut dyn FrameBuffer,
        viewport: Rect<i32>,
    ) -> Result<RenderPassStatistics, FrameworkError> {
        let mut statistics = RenderPassStatistics::default();

        if self.steps.len() > 1 {
            self.setup_pool(Resolution::new(viewport.w() as u32, viewport.h() as u32));
        }

        let Some((last, intermediate)) = self.steps.split_last_mut() else {
            return Ok(statistics);
        };

        let mut source = input.clone();
        // Holds the framebuffer the current source belongs to, so the pool can't hand it out
        // as the next target.
        let mut source_owner: Option<PooledFrameBuffer> = None;
        for step in intermediate {
            let target = self.pool.next(server)?;
            statistics += step.execute(
                server,
                gbuffer,
                &source,
                &mut **target.borrow_mut(),
                viewport,
            )?;
            source = target.borrow().color_attachments()[0].texture.clone();
            source_owner = Some(target);
        }

        statistics += last.execute(server, gbuffer, &source, output, viewport)?;

        drop(source_owner);

        Ok(statistics)
    }

    fn resolution_changed(
        &mut self,
        server: &dyn GraphicsServer,
        resolution: Resolution,
    ) -> Result<(), FrameworkError> {
        self.setup_pool(resolution);
        for step in self.steps.iter_mut() {
            step.resolution_changed(server, resolution)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::GroupedPostprocessingStep;
    use crate::{
        core::math::{Rect, Resolution},
        graphics::{
            error::FrameworkError,
            framebuffer::{Attachment, FrameBuffer},
            gpu_texture::{GpuTexture, PixelKind},
            headless::{texture_id, HeadlessGraphicsServer},
            server::GraphicsServer,
            stats::RenderPassStatistics,
        },
        renderer::{gbuffer::GBuffer, postprocessing::PostprocessingStep},
    };
    use std::{cell::RefCell, rc::Rc};

    /// Texture ids of the input and of the written color attachment, per executed step.
    type ProbeLog = Rc<RefCell<Vec<(Option<usize>, Option<usize>)>>>;

    struct Probe {
        log: ProbeLog,
    }

    impl PostprocessingStep for Probe {
        fn execute(
            &mut self,
            _server: &dyn GraphicsServer,
            _gbuffer: &GBuffer,
            input: &Rc<RefCell<dyn GpuTexture>>,
            output: &mut dyn FrameBuffer,
            _viewport: Rect<i32>,
        ) -> Result<RenderPassStatistics, FrameworkError> {
            let written = output
                .color_attachments()
                .first()
                .and_then(|a| texture_id(&a.texture));
            self.log.borrow_mut().push((texture_id(input), written));
            Ok(Default::default())
        }
    }

    fn probe_chain(count: usize) -> (GroupedPostprocessingStep, ProbeLog) {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut chain = GroupedPostprocessingStep::new(Vec::new());
        for _ in 0..count {
            chain.append(Probe { log: log.clone() });
        }
        (chain, log)
    }

    #[test]
    fn test_ping_pong_and_last_step_writes_output() {
        let resolution = Resolution::new(32, 16);
        let server = HeadlessGraphicsServer::new((32, 16));
        let gbuffer = GBuffer::new(&*server, resolution).unwrap();
        let input = server
            .create_2d_render_target(PixelKind::RGBA16F, 32, 16)
            .unwrap();
        let output_texture = server
            .create_2d_render_target(PixelKind::RGBA8, 32, 16)
            .unwrap();
        let mut output = server
            .create_frame_buffer(None, vec![Attachment::color(output_texture.clone())])
            .unwrap();

        let (mut chain, log) = probe_chain(4);
        chain
            .execute(
                &*server,
                &gbuffer,
                &input,
                &mut *output,
                resolution.viewport(),
            )
            .unwrap();

        let log = log.borrow();
        assert_eq!(log.len(), 4);
        // Each step reads what the previous one wrote.
        assert_eq!(log[0].0, texture_id(&input));
        for pair in log.windows(2) {
            assert_eq!(pair[1].0, pair[0].1);
        }
        // Two intermediate framebuffers are enough for any chain length.
        assert_eq!(chain.pool().len(), 2);
        assert_eq!(chain.pool().in_use(), 0);
        assert_ne!(log[0].1, log[1].1);
        assert_eq!(log[0].1, log[2].1);
        assert_eq!(log[3].1, texture_id(&output_texture));
    }

    #[test]
    fn test_single_step_skips_pool() {
        let resolution = Resolution::new(8, 8);
        let server = HeadlessGraphicsServer::new((8, 8));
        let gbuffer = GBuffer::new(&*server, resolution).unwrap();
        let input = server
            .create_2d_render_target(PixelKind::RGBA16F, 8, 8)
            .unwrap();
        let mut output = server.back_buffer();

        let (mut chain, log) = probe_chain(1);
        chain
            .execute(&*server, &gbuffer, &input, &mut *output, resolution.viewport())
            .unwrap();
        assert_eq!(log.borrow().len(), 1);
        assert!(chain.pool().is_empty());

        let (mut empty, _) = probe_chain(0);
        assert!(empty.is_empty());
        empty
            .execute(&*server, &gbuffer, &input, &mut *output, resolution.viewport())
            .unwrap();
    }

    #[test]
    fn test_resolution_change_resets_pool() {
        let server = HeadlessGraphicsServer::new((8, 8));
        let (mut chain, _) = probe_chain(3);
        chain
            .resolution_changed(&*server, Resolution::new(64, 32))
            .unwrap();
        assert_eq!(chain.pool().resolution(), Resolution::new(64, 32));
    }
}
