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
        algebra::{Matrix3, Matrix4, Vector2, Vector3, Vector4},
        color::Color,
    },
    error::FrameworkError,
};
use std::{any::Any, marker::PhantomData};

/// Backend-agnostic handle of a uniform inside a particular program. The handle is only valid
/// for the program that produced it.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct UniformLocation {
    pub id: usize,
    // Force compiler to not implement Send and Sync, because OpenGL is not thread-safe.
    pub thread_mark: PhantomData<*const u8>,
}

impl UniformLocation {
    pub fn new(id: usize) -> Self {
        Self {
            id,
            thread_mark: PhantomData,
        }
    }
}

pub trait GpuProgram: Any {
    fn as_any(&self) -> &dyn Any;

    fn name(&self) -> &str;

    /// Looks up a uniform that may be legitimately absent (unused uniforms are stripped by the
    /// shader compiler).
    fn uniform_location_opt(&self, name: &str) -> Option<UniformLocation>;

    /// Looks up a uniform that must be present.
    fn uniform_location(&self, name: &str) -> Result<UniformLocation, FrameworkError> {
        self.uniform_location_opt(name)
            .ok_or_else(|| FrameworkError::UnableToFindShaderUniform(name.to_owned()))
    }
}

#[derive(Copy, Clone, Debug, PartialEq)]
pub enum UniformValue {
    Bool(bool),
    Integer(i32),
    Float(f32),
    Vector2(Vector2<f32>),
    Vector3(Vector3<f32>),
    Vector4(Vector4<f32>),
    Matrix3(Matrix3<f32>),
    Matrix4(Matrix4<f32>),
}

/// Receives uniform values for the currently bound program.
pub trait UniformSink {
    fn set_uniform(&self, location: &UniformLocation, value: UniformValue);
}

/// Active program of a draw call. Passed to the `apply_uniforms` callback of every draw.
pub struct GpuProgramBinding<'a> {
    program: &'a dyn GpuProgram,
    sink: &'a dyn UniformSink,
}

impl<'a> GpuProgramBinding<'a> {
    pub fn new(program: &'a dyn GpuProgram, sink: &'a dyn UniformSink) -> Self {
        Self { program, sink }
    }

    pub fn program(&self) -> &'a dyn GpuProgram {
        self.program
    }

    #[inline]
    pub fn set_bool(&mut self, location: &UniformLocation, value: bool) -> &mut Self {
        self.sink.set_uniform(location, UniformValue::Bool(value));
        self
    }

    #[inline]
    pub fn set_i32(&mut self, location: &UniformLocation, value: i32) -> &mut Self {
        self.sink.set_uniform(location, UniformValue::Integer(value));
        self
    }

    #[inline]
    pub fn set_f32(&mut self, location: &UniformLocation, value: f32) -> &mut Self {
        self.sink.set_uniform(location, UniformValue::Float(value));
        self
    }

    #[inline]
    pub fn set_vector2(&mut self, location: &UniformLocation, value: &Vector2<f32>) -> &mut Self {
        self.sink.set_uniform(location, UniformValue::Vector2(*value));
        self
    }

    #[inline]
    pub fn set_vector3(&mut self, location: &UniformLocation, value: &Vector3<f32>) -> &mut Self {
        self.sink.set_uniform(location, UniformValue::Vector3(*value));
        self
    }

    #[inline]
    pub fn set_vector4(&mut self, location: &UniformLocation, value: &Vector4<f32>) -> &mut Self {
        self.sink.set_uniform(location, UniformValue::Vector4(*value));
        self
    }

    /// Uploads the color as a normalized RGBA vector.
    #[inline]
    pub fn set_color(&mut self, location: &UniformLocation, value: &Color) -> &mut Self {
        self.sink
            .set_uniform(location, UniformValue::Vector4(value.as_frgba()));
        self
    }

    #[inline]
    pub fn set_matrix3(&mut self, location: &UniformLocation, value: &Matrix3<f32>) -> &mut Self {
        self.sink.set_uniform(location, UniformValue::Matrix3(*value));
        self
    }

    #[inline]
    pub fn set_matrix4(&mut self, location: &UniformLocation, value: &Matrix4<f32>) -> &mut Self {
        self.sink.set_uniform(location, UniformValue::Matrix4(*value));
        self
    }
}
