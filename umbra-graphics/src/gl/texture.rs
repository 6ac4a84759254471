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
    error::FrameworkError,
    gl::{server::GlGraphicsServer, ToGlConstant},
    gpu_texture::{
        GpuTexture, GpuTextureDescriptor, GpuTextureKind, MagnificationFilter, MinificationFilter,
        PixelKind, WrapMode,
    },
};
use glow::HasContext;
use std::{any::Any, marker::PhantomData, rc::Weak};

impl ToGlConstant for MinificationFilter {
    fn into_gl(self) -> u32 {
        match self {
            Self::Nearest => glow::NEAREST,
            Self::Linear => glow::LINEAR,
            Self::LinearMipMapLinear => glow::LINEAR_MIPMAP_LINEAR,
        }
    }
}

impl ToGlConstant for MagnificationFilter {
    fn into_gl(self) -> u32 {
        match self {
            Self::Nearest => glow::NEAREST,
            Self::Linear => glow::LINEAR,
        }
    }
}

impl ToGlConstant for WrapMode {
    fn into_gl(self) -> u32 {
        match self {
            Self::Repeat => glow::REPEAT,
            Self::ClampToEdge => glow::CLAMP_TO_EDGE,
            Self::MirroredRepeat => glow::MIRRORED_REPEAT,
        }
    }
}

pub struct PixelDescriptor {
    pub data_type: u32,
    pub format: u32,
    pub internal_format: u32,
}

impl PixelKind {
    pub(crate) fn pixel_descriptor(self) -> PixelDescriptor {
        let (data_type, format, internal_format) = match self {
            PixelKind::R8 => (glow::UNSIGNED_BYTE, glow::RED, glow::R8),
            PixelKind::RGB8 => (glow::UNSIGNED_BYTE, glow::RGB, glow::RGB8),
            PixelKind::RGBA8 => (glow::UNSIGNED_BYTE, glow::RGBA, glow::RGBA8),
            PixelKind::SRGBA8 => (glow::UNSIGNED_BYTE, glow::RGBA, glow::SRGB8_ALPHA8),
            PixelKind::RGB16F => (glow::HALF_FLOAT, glow::RGB, glow::RGB16F),
            PixelKind::RGBA16F => (glow::HALF_FLOAT, glow::RGBA, glow::RGBA16F),
            PixelKind::RGB32F => (glow::FLOAT, glow::RGB, glow::RGB32F),
            PixelKind::RGBA32F => (glow::FLOAT, glow::RGBA, glow::RGBA32F),
            PixelKind::D32F => (glow::FLOAT, glow::DEPTH_COMPONENT, glow::DEPTH_COMPONENT32F),
            PixelKind::D24S8 => (
                glow::UNSIGNED_INT_24_8,
                glow::DEPTH_STENCIL,
                glow::DEPTH24_STENCIL8,
            ),
        };
        PixelDescriptor {
            data_type,
            format,
            internal_format,
        }
    }
}

pub struct GlTexture {
    state: Weak<GlGraphicsServer>,
    texture: glow::Texture,
    kind: GpuTextureKind,
    pixel_kind: PixelKind,
    // Force compiler to not implement Send and Sync, because OpenGL is not thread-safe.
    thread_mark: PhantomData<*const u8>,
}

impl GlTexture {
    /// Creates a new GPU texture of the given kind and format. `data` can be `None` when the
    /// texture is used as a render target.
    pub fn new(
        server: &GlGraphicsServer,
        desc: GpuTextureDescriptor,
    ) -> Result<Self, FrameworkError> {
        desc.validate()?;

        let GpuTextureKind::Rectangle { width, height } = desc.kind;
        let PixelDescriptor {
            data_type,
            format,
            internal_format,
        } = desc.pixel_kind.pixel_descriptor();

        unsafe {
            let texture = server.gl.create_texture()?;

            server.set_texture(0, Some(texture));

            server
                .gl
                .pixel_store_i32(glow::UNPACK_ALIGNMENT, desc.pixel_kind.unpack_alignment());

            server.gl.tex_image_2d(
                glow::TEXTURE_2D,
                0,
                internal_format as i32,
                width as i32,
                height as i32,
                0,
                format,
                data_type,
                desc.data,
            );

            server.gl.tex_parameter_i32(
                glow::TEXTURE_2D,
                glow::TEXTURE_MIN_FILTER,
                desc.min_filter.into_gl() as i32,
            );
            server.gl.tex_parameter_i32(
                glow::TEXTURE_2D,
                glow::TEXTURE_MAG_FILTER,
                desc.mag_filter.into_gl() as i32,
            );
            server.gl.tex_parameter_i32(
                glow::TEXTURE_2D,
                glow::TEXTURE_WRAP_S,
                desc.s_wrap_mode.into_gl() as i32,
            );
            server.gl.tex_parameter_i32(
                glow::TEXTURE_2D,
                glow::TEXTURE_WRAP_T,
                desc.t_wrap_mode.into_gl() as i32,
            );
            if desc.min_filter == MinificationFilter::LinearMipMapLinear {
                server.gl.generate_mipmap(glow::TEXTURE_2D);
            } else {
                server
                    .gl
                    .tex_parameter_i32(glow::TEXTURE_2D, glow::TEXTURE_MAX_LEVEL, 0);
            }

            server.set_texture(0, None);

            Ok(Self {
                state: server.weak(),
                texture,
                kind: desc.kind,
                pixel_kind: desc.pixel_kind,
                thread_mark: PhantomData,
            })
        }
    }

    pub fn bind(&self, server: &GlGraphicsServer, unit: u32) {
        server.set_texture(unit, Some(self.texture));
    }

    pub fn id(&self) -> glow::Texture {
        self.texture
    }
}

impl Drop for GlTexture {
    fn drop(&mut self) {
        if let Some(state) = self.state.upgrade() {
            unsafe {
                state.gl.delete_texture(self.texture);
            }
        }
    }
}

impl GpuTexture for GlTexture {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }

    fn kind(&self) -> GpuTextureKind {
        self.kind
    }

    fn pixel_kind(&self) -> PixelKind {
        self.pixel_kind
    }
}
