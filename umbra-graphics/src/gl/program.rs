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
    core::log::{Log, MessageKind},
    error::FrameworkError,
    gl::server::GlGraphicsServer,
    gpu_program::{GpuProgram, UniformLocation, UniformSink, UniformValue},
};
use fxhash::FxHashMap;
use glow::HasContext;
use std::{any::Any, cell::RefCell, marker::PhantomData, rc::Weak};

unsafe fn create_shader(
    server: &GlGraphicsServer,
    name: String,
    actual_type: u32,
    source: &str,
) -> Result<glow::Shader, FrameworkError> {
    let merged_source = prepare_source_code(source);

    let shader = server.gl.create_shader(actual_type)?;
    server.gl.shader_source(shader, &merged_source);
    server.gl.compile_shader(shader);

    let status = server.gl.get_shader_compile_status(shader);
    let compilation_message = server.gl.get_shader_info_log(shader);

    if !status {
        Log::writeln(
            MessageKind::Error,
            format!("Failed to compile {} shader: {}", name, compilation_message),
        );
        server.gl.delete_shader(shader);
        Err(FrameworkError::ShaderCompilationFailed {
            shader_name: name,
            error_message: compilation_message,
        })
    } else {
        let msg = if compilation_message.trim().is_empty() {
            format!("Shader {} compiled successfully!", name)
        } else {
            format!(
                "Shader {} compiled successfully!\nAdditional info: {}",
                name, compilation_message
            )
        };

        Log::writeln(MessageKind::Information, msg);

        Ok(shader)
    }
}

fn prepare_source_code(code: &str) -> String {
    let mut full_source_code = "#version 330 core\n".to_owned();
    full_source_code += code;
    full_source_code
}

pub struct GlProgram {
    state: Weak<GlGraphicsServer>,
    name: String,
    pub id: glow::Program,
    // Force compiler to not implement Send and Sync, because OpenGL is not thread-safe.
    thread_mark: PhantomData<*const u8>,
    uniform_names: RefCell<FxHashMap<String, Option<usize>>>,
    uniform_locations: RefCell<Vec<glow::UniformLocation>>,
}

impl GlProgram {
    pub fn from_source(
        server: &GlGraphicsServer,
        name: &str,
        vertex_source: &str,
        fragment_source: &str,
    ) -> Result<GlProgram, FrameworkError> {
        unsafe {
            let vertex_shader = create_shader(
                server,
                format!("{}_VertexShader", name),
                glow::VERTEX_SHADER,
                vertex_source,
            )?;
            let fragment_shader = match create_shader(
                server,
                format!("{}_FragmentShader", name),
                glow::FRAGMENT_SHADER,
                fragment_source,
            ) {
                Ok(shader) => shader,
                Err(err) => {
                    server.gl.delete_shader(vertex_shader);
                    return Err(err);
                }
            };
            let program = server.gl.create_program()?;
            server.gl.attach_shader(program, vertex_shader);
            server.gl.delete_shader(vertex_shader);
            server.gl.attach_shader(program, fragment_shader);
            server.gl.delete_shader(fragment_shader);
            server.gl.link_program(program);
            let status = server.gl.get_program_link_status(program);
            let link_message = server.gl.get_program_info_log(program);

            if !status {
                Log::writeln(
                    MessageKind::Error,
                    format!("Failed to link {} shader: {}", name, link_message),
                );
                server.gl.delete_program(program);
                Err(FrameworkError::ShaderLinkingFailed {
                    shader_name: name.to_owned(),
                    error_message: link_message,
                })
            } else {
                let msg = if link_message.trim().is_empty() {
                    format!("Shader {} linked successfully!", name)
                } else {
                    format!(
                        "Shader {} linked successfully!\nAdditional info: {}",
                        name, link_message
                    )
                };

                Log::writeln(MessageKind::Information, msg);

                Ok(Self {
                    state: server.weak(),
                    name: name.to_owned(),
                    id: program,
                    thread_mark: PhantomData,
                    uniform_names: Default::default(),
                    uniform_locations: Default::default(),
                })
            }
        }
    }
}

impl GpuProgram for GlProgram {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn uniform_location_opt(&self, name: &str) -> Option<UniformLocation> {
        let mut names = self.uniform_names.borrow_mut();
        if let Some(cached) = names.get(name) {
            return cached.map(UniformLocation::new);
        }

        let server = self.state.upgrade()?;
        let index = unsafe { server.gl.get_uniform_location(self.id, name) }.map(|location| {
            let mut locations = self.uniform_locations.borrow_mut();
            locations.push(location);
            locations.len() - 1
        });
        names.insert(name.to_owned(), index);
        index.map(UniformLocation::new)
    }
}

impl UniformSink for GlProgram {
    fn set_uniform(&self, location: &UniformLocation, value: UniformValue) {
        let Some(server) = self.state.upgrade() else {
            return;
        };
        let locations = self.uniform_locations.borrow();
        let Some(gl_location) = locations.get(location.id) else {
            Log::warn(format!(
                "Uniform location {} does not belong to program {}",
                location.id, self.name
            ));
            return;
        };
        let gl_location = Some(gl_location);

        server.set_program(Some(self.id));

        unsafe {
            match value {
                UniformValue::Bool(value) => server.gl.uniform_1_i32(
                    gl_location,
                    if value { glow::TRUE } else { glow::FALSE } as i32,
                ),
                UniformValue::Integer(value) => server.gl.uniform_1_i32(gl_location, value),
                UniformValue::Float(value) => server.gl.uniform_1_f32(gl_location, value),
                UniformValue::Vector2(value) => {
                    server.gl.uniform_2_f32(gl_location, value.x, value.y)
                }
                UniformValue::Vector3(value) => {
                    server
                        .gl
                        .uniform_3_f32(gl_location, value.x, value.y, value.z)
                }
                UniformValue::Vector4(value) => {
                    server
                        .gl
                        .uniform_4_f32(gl_location, value.x, value.y, value.z, value.w)
                }
                UniformValue::Matrix3(value) => {
                    server
                        .gl
                        .uniform_matrix_3_f32_slice(gl_location, false, value.as_slice())
                }
                UniformValue::Matrix4(value) => {
                    server
                        .gl
                        .uniform_matrix_4_f32_slice(gl_location, false, value.as_slice())
                }
            }
        }
    }
}

impl Drop for GlProgram {
    fn drop(&mut self) {
        if let Some(state) = self.state.upgrade() {
            unsafe {
                state.gl.delete_program(self.id);
            }
        }
    }
}
