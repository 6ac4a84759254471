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

//! Deferred shading techniques resolve lighting from the G-buffer into an output framebuffer.
//!
//! Three interchangeable implementations exist:
//!
//! - [`simple::SimpleTechnique`] - one full-screen pass with every light uploaded into uniform
//! arrays. Cost is `pixels * lights`.
//! - [`light_volume::LightVolumeTechnique`] - point lights are rasterized as bounding cubes,
//! stencil masking restricts shading to pixels near the lights.
//! - [`light_volume_instanced::LightVolumeInstancedTechnique`] - same as above, but every phase
//! is a single instanced draw call fed by per-instance light attributes.
//!
//! Every technique clears the output color first and accumulates light contributions with
//! additive blending, and every technique uses the same lighting code in its fragment shaders.

pub mod light_volume;
pub mod light_volume_instanced;
pub mod simple;

use crate::{
    core::{algebra::Matrix4, color::Color, math::Resolution},
    graphics::{
        error::FrameworkError,
        framebuffer::{FrameBuffer, ResourceBinding},
        gpu_program::{GpuProgram, UniformLocation},
        server::GraphicsServer,
        stats::RenderPassStatistics,
    },
    renderer::{
        gbuffer::{GBuffer, GBufferTarget},
        technique::{
            light_volume::LightVolumeTechnique,
            light_volume_instanced::LightVolumeInstancedTechnique, simple::SimpleTechnique,
        },
    },
    scene::Scene,
};
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, EnumString, VariantNames};

/// Lighting model shared by all techniques. It declares the G-buffer samplers, the light
/// structures and the shading functions.
pub const LIGHTING_CHUNK: &str = include_str!("../shaders/lighting.glsl");

/// Prepends the shared lighting chunk to a fragment shader body.
pub fn compose_fragment_source(body: &str) -> String {
    let mut source = String::with_capacity(LIGHTING_CHUNK.len() + body.len() + 1);
    source.push_str(LIGHTING_CHUNK);
    source.push('\n');
    source.push_str(body);
    source
}

#[derive(
    Copy,
    Clone,
    Debug,
    Default,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    AsRefStr,
    EnumString,
    VariantNames,
)]
pub enum DeferredTechniqueKind {
    Simple,
    #[default]
    LightVolume,
    LightVolumeInstanced,
}

impl DeferredTechniqueKind {
    /// Order in which techniques are cycled through by the renderer.
    pub const CYCLE: [Self; 3] = [
        Self::LightVolume,
        Self::LightVolumeInstanced,
        Self::Simple,
    ];

    pub fn cycle_index(self) -> usize {
        match self {
            Self::LightVolume => 0,
            Self::LightVolumeInstanced => 1,
            Self::Simple => 2,
        }
    }

    pub fn from_cycle_index(index: usize) -> Self {
        Self::CYCLE[index % Self::CYCLE.len()]
    }
}

/// Upper bounds of the light arrays used by [`SimpleTechnique`]. Values above the shader array
/// sizes are clamped.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct LightLimits {
    pub point: usize,
    pub directional: usize,
}

impl Default for LightLimits {
    fn default() -> Self {
        Self {
            point: simple::MAX_POINT_LIGHTS,
            directional: simple::MAX_DIRECTIONAL_LIGHTS,
        }
    }
}

pub struct DeferredPassContext<'a> {
    pub server: &'a dyn GraphicsServer,
    pub gbuffer: &'a GBuffer,
    pub output: &'a mut dyn FrameBuffer,
    pub scene: &'a mut Scene,
    pub view: Matrix4<f32>,
    pub projection: Matrix4<f32>,
    pub resolution: Resolution,
    /// Color the output is cleared to before the light accumulation.
    pub clear_color: Color,
    pub light_limits: LightLimits,
}

pub trait DeferredShadingTechnique {
    fn kind(&self) -> DeferredTechniqueKind;

    /// Reads the G-buffer and the scene lights and accumulates the lighting into the output.
    fn do_deferred_pass(
        &mut self,
        ctx: DeferredPassContext,
    ) -> Result<RenderPassStatistics, FrameworkError>;

    /// Whether the deferred pass copies the G-buffer depth into the output framebuffer.
    fn blits_gbuffer_depth(&self) -> bool;
}

pub fn create_technique(
    server: &dyn GraphicsServer,
    kind: DeferredTechniqueKind,
) -> Result<Box<dyn DeferredShadingTechnique>, FrameworkError> {
    Ok(match kind {
        DeferredTechniqueKind::Simple => Box::new(SimpleTechnique::new(server)?),
        DeferredTechniqueKind::LightVolume => Box::new(LightVolumeTechnique::new(server)?),
        DeferredTechniqueKind::LightVolumeInstanced => {
            Box::new(LightVolumeInstancedTechnique::new(server)?)
        }
    })
}

/// Sampler locations of the G-buffer targets, declared by [`LIGHTING_CHUNK`].
pub(crate) struct GBufferSamplers {
    position_specular: UniformLocation,
    normal_roughness: UniformLocation,
    diffuse: UniformLocation,
}

impl GBufferSamplers {
    pub fn new(program: &dyn GpuProgram) -> Result<Self, FrameworkError> {
        Ok(Self {
            position_specular: program.uniform_location("positionSpecularTexture")?,
            normal_roughness: program.uniform_location("normalRoughnessTexture")?,
            diffuse: program.uniform_location("diffuseTexture")?,
        })
    }

    pub fn bindings(&self, gbuffer: &GBuffer) -> [ResourceBinding; 3] {
        [
            ResourceBinding::texture(
                gbuffer.target(GBufferTarget::PositionSpecular),
                &self.position_specular,
            ),
            ResourceBinding::texture(
                gbuffer.target(GBufferTarget::NormalRoughness),
                &self.normal_roughness,
            ),
            ResourceBinding::texture(gbuffer.target(GBufferTarget::Diffuse), &self.diffuse),
        ]
    }
}

#[cfg(test)]
pub(crate) mod test {
    use super::{
        compose_fragment_source, create_technique, DeferredPassContext, DeferredTechniqueKind,
        LightLimits, LIGHTING_CHUNK,
    };
    use crate::{
        core::{algebra::Vector3, color::Color, math::Resolution},
        graphics::{
            headless::{DrawCommand, HeadlessGraphicsServer, RecordedCommand, BACK_BUFFER_ID},
            server::GraphicsServer,
            BlendParameters,
        },
        renderer::gbuffer::GBuffer,
        scene::{
            camera::{Camera, PerspectiveCamera},
            light::{DirectionalLight, LightColors, PointLight},
            Scene,
        },
    };
    use std::str::FromStr;

    pub fn camera(resolution: Resolution) -> PerspectiveCamera {
        PerspectiveCamera::new(resolution, Default::default())
            .with_position(Vector3::new(0.0, 0.0, 10.0))
    }

    /// Runs a deferred pass of the given technique into the back buffer of a fresh headless
    /// server and returns everything it recorded.
    pub fn run_pass(
        kind: DeferredTechniqueKind,
        scene: &mut Scene,
        resolution: Resolution,
        light_limits: LightLimits,
    ) -> Vec<RecordedCommand> {
        let server = HeadlessGraphicsServer::new((resolution.width, resolution.height));
        let gbuffer = GBuffer::new(&*server, resolution).unwrap();
        let mut technique = create_technique(&*server, kind).unwrap();
        let mut output = server.back_buffer();
        let camera = camera(resolution);
        server.clear_commands();
        technique
            .do_deferred_pass(DeferredPassContext {
                server: &*server,
                gbuffer: &gbuffer,
                output: &mut *output,
                scene,
                view: camera.view_matrix(),
                projection: camera.projection_matrix(),
                resolution,
                clear_color: Color::BLACK,
                light_limits,
            })
            .unwrap();
        server.take_commands()
    }

    pub fn draws(commands: &[RecordedCommand]) -> Vec<&DrawCommand> {
        commands.iter().filter_map(|c| c.as_draw()).collect()
    }

    fn scene_with_lights(points: usize, directionals: usize) -> Scene {
        let mut scene = Scene::new();
        for i in 0..points {
            scene.add_point_light(PointLight::new(
                Vector3::new(i as f32, 0.0, 0.0),
                LightColors::default(),
                2.0,
            ));
        }
        for _ in 0..directionals {
            scene.add_directional_light(DirectionalLight::default());
        }
        scene
    }

    #[test]
    fn test_cycle_order() {
        let mut kind = DeferredTechniqueKind::default();
        assert_eq!(kind, DeferredTechniqueKind::LightVolume);
        let mut visited = Vec::new();
        for _ in 0..3 {
            kind = DeferredTechniqueKind::from_cycle_index(kind.cycle_index() + 1);
            visited.push(kind);
        }
        assert_eq!(
            visited,
            [
                DeferredTechniqueKind::LightVolumeInstanced,
                DeferredTechniqueKind::Simple,
                DeferredTechniqueKind::LightVolume
            ]
        );
        assert_eq!(
            DeferredTechniqueKind::from_str("Simple").unwrap(),
            DeferredTechniqueKind::Simple
        );
    }

    #[test]
    fn test_fragment_sources_share_lighting() {
        let source = compose_fragment_source("void main() {}");
        assert!(source.starts_with(LIGHTING_CHUNK));
        assert!(source.ends_with("void main() {}"));
    }

    #[test]
    fn test_all_techniques_clear_and_accumulate() {
        for kind in DeferredTechniqueKind::CYCLE {
            let mut scene = scene_with_lights(2, 1);
            let commands = run_pass(
                kind,
                &mut scene,
                Resolution::new(64, 64),
                LightLimits::default(),
            );

            let first_color_clear = commands.iter().position(|c| {
                matches!(
                    c,
                    RecordedCommand::Clear {
                        framebuffer: BACK_BUFFER_ID,
                        color: Some(Color::BLACK),
                        depth: None,
                        ..
                    }
                )
            });
            let first_draw = commands.iter().position(|c| c.as_draw().is_some());
            assert!(first_color_clear.unwrap() < first_draw.unwrap(), "{kind:?}");

            // Every draw that writes color accumulates additively.
            for draw in draws(&commands) {
                if draw.params.color_write.red {
                    assert_eq!(draw.params.blend, Some(BlendParameters::additive()), "{kind:?}");
                    assert!(draw.textures.len() == 3, "{kind:?}");
                }
            }
        }
    }

    #[test]
    fn test_zero_lights_still_clear() {
        for kind in DeferredTechniqueKind::CYCLE {
            let mut scene = Scene::new();
            let commands = run_pass(
                kind,
                &mut scene,
                Resolution::new(16, 16),
                LightLimits::default(),
            );
            assert!(commands.iter().any(|c| matches!(
                c,
                RecordedCommand::Clear {
                    color: Some(_),
                    ..
                }
            )));
            for draw in draws(&commands) {
                match draw.instances {
                    Some(instances) => assert_eq!(instances, 0),
                    // The full-screen pass of the simple technique still runs, with empty loops.
                    None => assert_eq!(kind, DeferredTechniqueKind::Simple),
                }
            }
        }
    }
}
