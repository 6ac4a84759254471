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

//! Randomly placed cubes lit by a bunch of colored point lights and one directional light.
//!
//! Controls:
//! - B - switch to the next deferred shading technique
//! - L - toggle drawing of light volumes
//! - G - toggle gamma correction (recreates the renderer)
//! - Arrows - rotate the camera

use rand::Rng;
use std::rc::Rc;
use umbra::{
    core::{
        algebra::{Matrix4, Vector3},
        color::Color,
        log::Log,
        math::Resolution,
    },
    graphics::{
        error::FrameworkError,
        gl::server::GlGraphicsServer,
        server::{GraphicsServer, SharedGraphicsServer},
    },
    renderer::{
        postprocessing::{GroupedPostprocessingStep, SimplePostprocessingStep, StepDescriptor},
        Renderer,
    },
    scene::{
        camera::{PerspectiveCamera, PerspectiveCameraConfig},
        light::{DirectionalLight, LightColors, PointLight},
        object::{Material, MeshObject, ObjectShader},
        surface::SurfaceData,
        Scene,
    },
};
use winit::{
    dpi::LogicalSize,
    event::{ElementState, Event, KeyEvent, WindowEvent},
    event_loop::EventLoop,
    keyboard::{KeyCode, PhysicalKey},
    window::WindowBuilder,
};

const CUBE_COUNT: usize = 40;
const LIGHT_COUNT: usize = 48;

fn make_scene(server: &dyn GraphicsServer) -> Result<Scene, FrameworkError> {
    let mut rng = rand::thread_rng();
    let mut scene = Scene::new();
    let shader = ObjectShader::new(server)?;

    scene.add_object(
        MeshObject::new(
            server,
            shader.clone(),
            &SurfaceData::make_plane(Matrix4::new_nonuniform_scaling(&Vector3::new(
                30.0, 1.0, 30.0,
            ))),
            Material::default().with_roughness(0.8),
        )?
        .with_transform(Matrix4::new_translation(&Vector3::new(0.0, -1.0, 0.0))),
    );

    for _ in 0..CUBE_COUNT {
        let position = Vector3::new(
            rng.gen_range(-20.0..20.0),
            rng.gen_range(0.0..3.0),
            rng.gen_range(-20.0..20.0),
        );
        let material = Material::default()
            .with_diffuse(Color::opaque(rng.gen(), rng.gen(), rng.gen()))
            .with_specular_strength(rng.gen_range(0.1..1.0))
            .with_roughness(rng.gen_range(0.1..1.0));
        scene.add_object(
            MeshObject::new(
                server,
                shader.clone(),
                &SurfaceData::make_cube(Matrix4::identity()),
                material,
            )?
            .with_transform(Matrix4::new_translation(&position)),
        );
    }

    for _ in 0..LIGHT_COUNT {
        let color = Vector3::new(rng.gen(), rng.gen(), rng.gen());
        scene.add_point_light(PointLight::new(
            Vector3::new(
                rng.gen_range(-20.0..20.0),
                rng.gen_range(0.5..4.0),
                rng.gen_range(-20.0..20.0),
            ),
            LightColors::from_base(color),
            rng.gen_range(2.0..6.0),
        ));
    }

    scene.add_directional_light(DirectionalLight {
        direction: Vector3::new(-0.3, -1.0, -0.2),
        colors: LightColors::from_base(Vector3::repeat(0.15)),
    });

    Ok(scene)
}

fn make_renderer(
    server: &Rc<GlGraphicsServer>,
    resolution: Resolution,
    gamma_correction: bool,
) -> Result<Renderer, FrameworkError> {
    let postprocessing = if gamma_correction {
        let mut chain = GroupedPostprocessingStep::new(Vec::new());
        chain.append(SimplePostprocessingStep::new(
            &**server,
            &[
                StepDescriptor::reinhard_tone_mapping(),
                StepDescriptor::gamma_correction(),
            ],
        )?);
        Some(chain)
    } else {
        None
    };

    let camera = PerspectiveCamera::new(resolution, PerspectiveCameraConfig::default())
        .with_position(Vector3::new(0.0, 8.0, 30.0));
    let shared: SharedGraphicsServer = server.clone();
    let mut renderer = Renderer::new(shared, resolution, Box::new(camera), postprocessing)?;
    renderer.set_background_color(Color::opaque(20, 20, 30));
    Ok(renderer)
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let event_loop = EventLoop::new()?;
    let window_builder = WindowBuilder::new()
        .with_title("Deferred shading")
        .with_inner_size(LogicalSize::new(1280.0, 720.0));
    let (window, server) = GlGraphicsServer::new(true, &event_loop, window_builder)?;

    let size = window.inner_size();
    let mut resolution = Resolution::new(size.width, size.height);
    let mut gamma_correction = true;
    let mut renderer = make_renderer(&server, resolution, gamma_correction)?;
    let mut scene = make_scene(&*server)?;
    let mut camera_yaw = 0.0f32;
    let mut camera_pitch = -0.25f32;

    event_loop.run(move |event, window_target| match event {
        Event::WindowEvent { event, .. } => match event {
            WindowEvent::CloseRequested => window_target.exit(),
            WindowEvent::Resized(size) => {
                resolution = Resolution::new(size.width, size.height);
                Log::verify(renderer.resolution_changed(resolution));
            }
            WindowEvent::KeyboardInput {
                event:
                    KeyEvent {
                        physical_key: PhysicalKey::Code(code),
                        state: ElementState::Pressed,
                        ..
                    },
                ..
            } => match code {
                KeyCode::KeyB => {
                    renderer.debug_cycle_deferred_technique();
                }
                KeyCode::KeyL => {
                    let enabled = !renderer.settings().debug_draw_lights;
                    renderer.set_debug_draw_lights(enabled);
                }
                KeyCode::KeyG => {
                    gamma_correction = !gamma_correction;
                    let settings = renderer.settings().clone();
                    match make_renderer(&server, resolution, gamma_correction) {
                        Ok(new_renderer) => {
                            renderer = new_renderer;
                            renderer.set_settings(settings);
                        }
                        Err(e) => Log::err(format!("Unable to recreate renderer: {e}")),
                    }
                }
                KeyCode::ArrowLeft => camera_yaw += 0.05,
                KeyCode::ArrowRight => camera_yaw -= 0.05,
                KeyCode::ArrowUp => camera_pitch += 0.05,
                KeyCode::ArrowDown => camera_pitch -= 0.05,
                KeyCode::Escape => window_target.exit(),
                _ => (),
            },
            WindowEvent::RedrawRequested => {
                let mut camera = PerspectiveCamera::new(resolution, Default::default())
                    .with_position(Vector3::new(0.0, 8.0, 30.0));
                camera.set_yaw(camera_yaw);
                camera.set_pitch(camera_pitch);
                renderer.set_camera(Box::new(camera));

                for (i, light) in scene.point_lights_mut().iter_mut().enumerate() {
                    let angle = 0.01 * if i % 2 == 0 { 1.0 } else { -1.0 };
                    let rotation = Matrix4::new_rotation(Vector3::y() * angle);
                    light.position = rotation.transform_vector(&light.position);
                }

                Log::verify(renderer.render_and_swap_buffers(&mut scene));
            }
            _ => (),
        },
        Event::AboutToWait => window.request_redraw(),
        _ => (),
    })?;

    Ok(())
}
