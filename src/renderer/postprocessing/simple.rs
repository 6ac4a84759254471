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
    graphics::{
        error::FrameworkError,
        framebuffer::{FrameBuffer, ResourceBinding},
        geometry_buffer::GeometryBuffer,
        gpu_program::{GpuProgram, UniformLocation},
        gpu_texture::GpuTexture,
        server::GraphicsServer,
        stats::RenderPassStatistics,
        DrawParameters, ElementRange,
    },
    renderer::{gbuffer::GBuffer, postprocessing::PostprocessingStep, utils::make_fullscreen_quad},
};
use std::{cell::RefCell, rc::Rc};

const SKELETON: &str = include_str!("../shaders/postprocessing/skeleton_fs.glsl");
const STEPS_MARKER: &str = "// PP_DO_STEPS";

/// A GLSL function `vec4 NAME(vec4 color, sampler2D frameBuffer)` that transforms the color of
/// a single pixel.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StepDescriptor {
    name: String,
    source: String,
}

impl StepDescriptor {
    /// Fails with [`FrameworkError::FaultyShaderSource`] if the name is not an identifier or the
    /// source does not mention it.
    pub fn new<N, S>(name: N, source: S) -> Result<Self, FrameworkError>
    where
        N: Into<String>,
        S: Into<String>,
    {
        let name = name.into();
        let source = source.into();
        let is_identifier = name
            .chars()
            .next()
            .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
            && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
        if !is_identifier || !source.contains(&name) {
            return Err(FrameworkError::FaultyShaderSource);
        }
        Ok(Self { name, source })
    }

    fn builtin(name: &str, source: &str) -> Self {
        Self {
            name: name.to_string(),
            source: source.to_string(),
        }
    }

    pub fn gamma_correction() -> Self {
        Self::builtin(
            "gamma_correction",
            include_str!("../shaders/postprocessing/gamma_correction.glsl"),
        )
    }

    pub fn reinhard_tone_mapping() -> Self {
        Self::builtin(
            "reinhard_tone_mapping",
            include_str!("../shaders/postprocessing/reinhard_tone_mapping.glsl"),
        )
    }

    pub fn grayscale() -> Self {
        Self::builtin(
            "grayscale",
            include_str!("../shaders/postprocessing/grayscale.glsl"),
        )
    }

    pub fn invert() -> Self {
        Self::builtin("invert", include_str!("../shaders/postprocessing/invert.glsl"))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn source(&self) -> &str {
        &self.source
    }
}

/// Builds a fragment shader that applies the steps in order. Every function is declared once,
/// even if it is applied several times.
fn fuse_steps(steps: &[StepDescriptor]) -> String {
    let mut source = String::new();
    let mut declared: Vec<&str> = Vec::new();
    for step in steps {
        if !declared.contains(&step.name.as_str()) {
            declared.push(&step.name);
            source.push_str(&step.source);
            source.push('\n');
        }
    }

    let mut calls = String::new();
    for step in steps {
        calls.push_str(&format!("color = {}(color, frameBufferTexture);\n    ", step.name));
    }
    source.push_str(&SKELETON.replacen(STEPS_MARKER, &calls, 1));
    source
}

/// Applies a fixed list of per-pixel functions to the input in a single full-screen pass.
pub struct SimplePostprocessingStep {
    program: Box<dyn GpuProgram>,
    frame_buffer_texture: UniformLocation,
    quad: Box<dyn GeometryBuffer>,
    fragment_source: String,
}

impl SimplePostprocessingStep {
    pub fn new(
        server: &dyn GraphicsServer,
        steps: &[StepDescriptor],
    ) -> Result<Self, FrameworkError> {
        let fragment_source = fuse_steps(steps);
        let vertex_source = include_str!("../shaders/fullscreen_vs.glsl");
        let program =
            server.create_program("SimplePostprocessing", vertex_source, &fragment_source)?;
        Ok(Self {
            frame_buffer_texture: program.uniform_location("frameBufferTexture")?,
            program,
            quad: make_fullscreen_quad(server)?,
            fragment_source,
        })
    }

    pub fn fragment_source(&self) -> &str {
        &self.fragment_source
    }
}

impl PostprocessingStep for SimplePostprocessingStep {
    fn execute(
        &mut self,
        _server: &dyn GraphicsServer,
        _gbuffer: &GBuffer,
        input: &Rc<RefCell<dyn GpuTexture>>,
        output: &mut dyn FrameBuffer,
        viewport: Rect<i32>,
    ) -> Result<RenderPassStatistics, FrameworkError> {
        let mut statistics = RenderPassStatistics::default();

        output.clear(viewport, Some(Color::BLACK), None, None);

        statistics += output.draw(
            &*self.quad,
            viewport,
            &*self.program,
            &DrawParameters::full_screen(),
            &[ResourceBinding::texture(input, &self.frame_buffer_texture)],
            ElementRange::Full,
            &mut |_| {},
        )?;

        Ok(statistics)
    }
}

#[cfg(test)]
mod test {
    use super::{SimplePostprocessingStep, StepDescriptor, STEPS_MARKER};
    use crate::{
        core::math::Resolution,
        graphics::{
            error::FrameworkError,
            gpu_texture::PixelKind,
            headless::{texture_id, HeadlessGraphicsServer, RecordedCommand},
            server::GraphicsServer,
        },
        renderer::{gbuffer::GBuffer, postprocessing::PostprocessingStep},
    };

    #[test]
    fn test_descriptor_validation() {
        assert!(StepDescriptor::new(
            "darken",
            "vec4 darken(vec4 color, sampler2D frameBuffer) { return color * 0.5; }"
        )
        .is_ok());
        assert!(matches!(
            StepDescriptor::new("darken", "vec4 lighten(vec4 c, sampler2D f) { return c; }"),
            Err(FrameworkError::FaultyShaderSource)
        ));
        assert!(StepDescriptor::new("2x", "2x").is_err());
        assert!(StepDescriptor::new("", "").is_err());
    }

    #[test]
    fn test_steps_are_fused_in_order() {
        let server = HeadlessGraphicsServer::new((1, 1));
        let step = SimplePostprocessingStep::new(
            &*server,
            &[
                StepDescriptor::reinhard_tone_mapping(),
                StepDescriptor::invert(),
                StepDescriptor::gamma_correction(),
                StepDescriptor::invert(),
            ],
        )
        .unwrap();

        let source = step.fragment_source();
        assert!(!source.contains(STEPS_MARKER));
        assert_eq!(source.matches("vec4 invert(").count(), 1);
        let calls = source
            .lines()
            .filter_map(|line| line.trim().strip_prefix("color = "))
            .map(|call| call.split('(').next().unwrap_or_default())
            .collect::<Vec<_>>();
        assert_eq!(
            calls,
            ["reinhard_tone_mapping", "invert", "gamma_correction", "invert"]
        );
        // Steps run between the fetch and the write of the result.
        let fetch = source.find("texture(frameBufferTexture, texCoord)").unwrap();
        let first_call = source.find("color = reinhard_tone_mapping").unwrap();
        let write = source.find("FragColor = color").unwrap();
        assert!(fetch < first_call && first_call < write);
    }

    #[test]
    fn test_execute_clears_and_samples_input() {
        let resolution = Resolution::new(8, 8);
        let server = HeadlessGraphicsServer::new((8, 8));
        let gbuffer = GBuffer::new(&*server, resolution).unwrap();
        let input = server
            .create_2d_render_target(PixelKind::RGBA16F, 8, 8)
            .unwrap();
        let mut output = server.back_buffer();
        let mut step =
            SimplePostprocessingStep::new(&*server, &[StepDescriptor::grayscale()]).unwrap();

        server.clear_commands();
        step.execute(&*server, &gbuffer, &input, &mut *output, resolution.viewport())
            .unwrap();

        let commands = server.take_commands();
        assert!(matches!(
            commands[0],
            RecordedCommand::Clear { color: Some(_), .. }
        ));
        let draw = commands[1].as_draw().unwrap();
        assert_eq!(draw.params.depth_test, None);
        assert_eq!(draw.texture("frameBufferTexture"), texture_id(&input));
    }
}
