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

//! Instanced variant of the light volume technique. Light attributes are uploaded into
//! per-instance vertex buffers once per frame, so each phase is a single draw call regardless of
//! the amount of point lights.

use crate::{
    core::algebra::{Matrix4, Vector3},
    graphics::{
        error::FrameworkError,
        geometry_buffer::{
            AttributeDefinition, AttributeKind, BufferUsage, ElementsDescriptor, GeometryBuffer,
            GeometryBufferDescriptor, VertexBufferData, VertexBufferDescriptor,
        },
        gpu_program::{GpuProgram, UniformLocation},
        server::GraphicsServer,
        state::StateGuard,
        stats::RenderPassStatistics,
    },
    renderer::technique::{
        compose_fragment_source,
        light_volume::{
            prepare_output, shading_phase_parameters, stencil_phase_parameters,
            DirectionalLightPass,
        },
        DeferredPassContext, DeferredShadingTechnique, DeferredTechniqueKind, GBufferSamplers,
    },
    scene::surface::{SurfaceData, Vertex},
};

const POSITION_BUFFER: usize = 1;
const RADIUS_BUFFER: usize = 2;
const AMBIENT_BUFFER: usize = 3;
const DIFFUSE_BUFFER: usize = 4;
const SPECULAR_BUFFER: usize = 5;

const fn instance_attribute(location: u32, kind: AttributeKind) -> [AttributeDefinition; 1] {
    [AttributeDefinition {
        location,
        kind,
        normalized: false,
        divisor: 1,
    }]
}

const POSITION_ATTRIBUTE: [AttributeDefinition; 1] = instance_attribute(3, AttributeKind::Float3);
const RADIUS_ATTRIBUTE: [AttributeDefinition; 1] = instance_attribute(4, AttributeKind::Float);
const AMBIENT_ATTRIBUTE: [AttributeDefinition; 1] = instance_attribute(5, AttributeKind::Float3);
const DIFFUSE_ATTRIBUTE: [AttributeDefinition; 1] = instance_attribute(6, AttributeKind::Float3);
const SPECULAR_ATTRIBUTE: [AttributeDefinition; 1] = instance_attribute(7, AttributeKind::Float3);

fn instance_buffer<T: bytemuck::Pod>(
    attributes: &'static [AttributeDefinition],
) -> VertexBufferDescriptor<'static> {
    VertexBufferDescriptor {
        usage: BufferUsage::DynamicDraw,
        attributes,
        data: VertexBufferData::new::<T>(None),
    }
}

/// Unit cube in the first buffer, light attributes in the rest.
fn make_instanced_volume(
    server: &dyn GraphicsServer,
) -> Result<Box<dyn GeometryBuffer>, FrameworkError> {
    let cube = SurfaceData::make_cube(Matrix4::identity());
    server.create_geometry_buffer(GeometryBufferDescriptor {
        elements: ElementsDescriptor::Triangles(&cube.triangles),
        buffers: &[
            VertexBufferDescriptor {
                usage: BufferUsage::StaticDraw,
                attributes: &Vertex::ATTRIBUTES,
                data: VertexBufferData::new(Some(&cube.vertices)),
            },
            instance_buffer::<Vector3<f32>>(&POSITION_ATTRIBUTE),
            instance_buffer::<f32>(&RADIUS_ATTRIBUTE),
            instance_buffer::<Vector3<f32>>(&AMBIENT_ATTRIBUTE),
            instance_buffer::<Vector3<f32>>(&DIFFUSE_ATTRIBUTE),
            instance_buffer::<Vector3<f32>>(&SPECULAR_ATTRIBUTE),
        ],
        usage: BufferUsage::StaticDraw,
    })
}

struct InstancedStencilShader {
    program: Box<dyn GpuProgram>,
    // Only feeds varyings the stencil fragment shader ignores, so it may be optimized out.
    view: Option<UniformLocation>,
    view_projection: UniformLocation,
}

impl InstancedStencilShader {
    fn new(server: &dyn GraphicsServer) -> Result<Self, FrameworkError> {
        let fragment_source = include_str!("../shaders/stencil_fs.glsl");
        let vertex_source = include_str!("../shaders/instanced_volume_vs.glsl");
        let program =
            server.create_program("InstancedLightVolumeStencil", vertex_source, fragment_source)?;
        Ok(Self {
            view: program.uniform_location_opt("view"),
            view_projection: program.uniform_location("viewProjection")?,
            program,
        })
    }
}

struct InstancedPointLightShader {
    program: Box<dyn GpuProgram>,
    samplers: GBufferSamplers,
    view: UniformLocation,
    view_projection: UniformLocation,
    screen_size: UniformLocation,
}

impl InstancedPointLightShader {
    fn new(server: &dyn GraphicsServer) -> Result<Self, FrameworkError> {
        let fragment_source =
            compose_fragment_source(include_str!("../shaders/instanced_point_light_fs.glsl"));
        let vertex_source = include_str!("../shaders/instanced_volume_vs.glsl");
        let program = server.create_program(
            "InstancedLightVolumeShading",
            vertex_source,
            &fragment_source,
        )?;
        Ok(Self {
            samplers: GBufferSamplers::new(&*program)?,
            view: program.uniform_location("view")?,
            view_projection: program.uniform_location("viewProjection")?,
            screen_size: program.uniform_location("screenSize")?,
            program,
        })
    }
}

pub struct LightVolumeInstancedTechnique {
    stencil_shader: InstancedStencilShader,
    point_light_shader: InstancedPointLightShader,
    directional: DirectionalLightPass,
    volume: Box<dyn GeometryBuffer>,
}

impl LightVolumeInstancedTechnique {
    pub fn new(server: &dyn GraphicsServer) -> Result<Self, FrameworkError> {
        Ok(Self {
            stencil_shader: InstancedStencilShader::new(server)?,
            point_light_shader: InstancedPointLightShader::new(server)?,
            directional: DirectionalLightPass::new(server)?,
            volume: make_instanced_volume(server)?,
        })
    }

    /// Uploads the light columns of the scene and returns the amount of instances.
    fn upload_instances(&mut self, ctx: &mut DeferredPassContext) -> Result<usize, FrameworkError> {
        let mut columns = ctx.scene.light_data();
        let volume = &mut *self.volume;
        volume.set_buffer_data_of_type(POSITION_BUFFER, columns.positions())?;
        volume.set_buffer_data_of_type(RADIUS_BUFFER, columns.radii())?;
        volume.set_buffer_data_of_type(AMBIENT_BUFFER, columns.ambient_colors())?;
        volume.set_buffer_data_of_type(DIFFUSE_BUFFER, columns.diffuse_colors())?;
        volume.set_buffer_data_of_type(SPECULAR_BUFFER, columns.specular_colors())?;
        Ok(columns.len())
    }
}

impl DeferredShadingTechnique for LightVolumeInstancedTechnique {
    fn kind(&self) -> DeferredTechniqueKind {
        DeferredTechniqueKind::LightVolumeInstanced
    }

    fn do_deferred_pass(
        &mut self,
        mut ctx: DeferredPassContext,
    ) -> Result<RenderPassStatistics, FrameworkError> {
        let mut statistics = RenderPassStatistics::default();
        let viewport = ctx.resolution.viewport();
        let view = ctx.view;
        let view_projection = ctx.projection * ctx.view;
        let screen_size = ctx.resolution.as_vec2();

        let instance_count = self.upload_instances(&mut ctx)?;

        prepare_output(&mut ctx)?;

        if instance_count > 0 {
            let _guard = StateGuard::new(ctx.server);

            let shader = &self.stencil_shader;
            statistics += ctx.output.draw_instances(
                instance_count,
                &*self.volume,
                viewport,
                &*shader.program,
                &stencil_phase_parameters(),
                &[],
                &mut |binding| {
                    binding.set_matrix4(&shader.view_projection, &view_projection);
                    if let Some(location) = shader.view.as_ref() {
                        binding.set_matrix4(location, &view);
                    }
                },
            )?;

            let shader = &self.point_light_shader;
            statistics += ctx.output.draw_instances(
                instance_count,
                &*self.volume,
                viewport,
                &*shader.program,
                &shading_phase_parameters(),
                &shader.samplers.bindings(ctx.gbuffer),
                &mut |binding| {
                    binding
                        .set_matrix4(&shader.view, &view)
                        .set_matrix4(&shader.view_projection, &view_projection)
                        .set_vector2(&shader.screen_size, &screen_size);
                },
            )?;
        }

        statistics += self.directional.render(
            ctx.output,
            ctx.gbuffer,
            ctx.scene.directional_lights(),
            &view,
            viewport,
        )?;

        Ok(statistics)
    }

    fn blits_gbuffer_depth(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod test {
    use super::{
        AMBIENT_BUFFER, DIFFUSE_BUFFER, POSITION_BUFFER, RADIUS_BUFFER, SPECULAR_BUFFER,
    };
    use crate::{
        core::{algebra::Vector3, math::Resolution},
        graphics::{gpu_program::UniformValue, headless::RecordedCommand},
        renderer::technique::{
            test::{camera, draws, run_pass},
            DeferredTechniqueKind, LightLimits,
        },
        scene::{
            camera::Camera,
            light::{LightColors, PointLight},
            Scene,
        },
    };

    fn scene(count: usize) -> Scene {
        let mut scene = Scene::new();
        for i in 0..count {
            scene.add_point_light(PointLight::new(
                Vector3::new(i as f32, 0.0, 0.0),
                LightColors::default(),
                1.0,
            ));
        }
        scene
    }

    #[test]
    fn test_instances_match_light_count() {
        let mut scene = scene(7);
        let resolution = Resolution::new(64, 64);
        let commands = run_pass(
            DeferredTechniqueKind::LightVolumeInstanced,
            &mut scene,
            resolution,
            LightLimits::default(),
        );

        let mut uploaded = commands
            .iter()
            .filter_map(|c| match c {
                RecordedCommand::UploadBuffer { buffer, items, .. } => Some((*buffer, *items)),
                _ => None,
            })
            .collect::<Vec<_>>();
        uploaded.sort();
        assert_eq!(
            uploaded,
            [
                (POSITION_BUFFER, 7),
                (RADIUS_BUFFER, 7),
                (AMBIENT_BUFFER, 7),
                (DIFFUSE_BUFFER, 7),
                (SPECULAR_BUFFER, 7)
            ]
        );

        let draws = draws(&commands);
        assert_eq!(draws.len(), 2);
        assert_eq!(draws[0].program, "InstancedLightVolumeStencil");
        assert_eq!(draws[1].program, "InstancedLightVolumeShading");
        for draw in &draws {
            assert_eq!(draw.instances, Some(7));
            assert_eq!(draw.statistics.triangles, 7 * 12);
        }

        let camera = camera(resolution);
        assert_eq!(
            draws[1].uniform("viewProjection"),
            Some(UniformValue::Matrix4(camera.view_projection_matrix()))
        );
        assert_eq!(
            draws[1].uniform("view"),
            Some(UniformValue::Matrix4(camera.view_matrix()))
        );
    }

    #[test]
    fn test_phases_match_light_volume() {
        let mut instanced_scene = scene(3);
        let instanced = run_pass(
            DeferredTechniqueKind::LightVolumeInstanced,
            &mut instanced_scene,
            Resolution::new(32, 32),
            LightLimits::default(),
        );
        let mut regular_scene = scene(3);
        let regular = run_pass(
            DeferredTechniqueKind::LightVolume,
            &mut regular_scene,
            Resolution::new(32, 32),
            LightLimits::default(),
        );
        let instanced = draws(&instanced);
        let regular = draws(&regular);
        assert_eq!(instanced[0].params, regular[0].params);
        assert_eq!(instanced[1].params, regular[3].params);
    }

    #[test]
    fn test_reupload_after_light_removal() {
        let mut scene = scene(4);
        run_pass(
            DeferredTechniqueKind::LightVolumeInstanced,
            &mut scene,
            Resolution::new(16, 16),
            LightLimits::default(),
        );
        scene.remove_point_light(0);
        let commands = run_pass(
            DeferredTechniqueKind::LightVolumeInstanced,
            &mut scene,
            Resolution::new(16, 16),
            LightLimits::default(),
        );
        assert!(draws(&commands).iter().all(|d| d.instances == Some(3)));
    }
}
