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

use crate::error::FrameworkError;
use std::any::Any;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum GpuTextureKind {
    Rectangle { width: usize, height: usize },
}

impl GpuTextureKind {
    pub fn width(self) -> usize {
        match self {
            Self::Rectangle { width, .. } => width,
        }
    }

    pub fn height(self) -> usize {
        match self {
            Self::Rectangle { height, .. } => height,
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum PixelKind {
    R8,
    RGB8,
    RGBA8,
    SRGBA8,
    RGB16F,
    RGBA16F,
    RGB32F,
    RGBA32F,
    D32F,
    D24S8,
}

pub enum PixelElementKind {
    Float,
    NormalizedUnsignedInteger,
}

impl PixelKind {
    pub fn element_kind(self) -> PixelElementKind {
        match self {
            Self::RGB16F | Self::RGBA16F | Self::RGB32F | Self::RGBA32F | Self::D32F => {
                PixelElementKind::Float
            }
            Self::R8 | Self::RGB8 | Self::RGBA8 | Self::SRGBA8 | Self::D24S8 => {
                PixelElementKind::NormalizedUnsignedInteger
            }
        }
    }

    /// Size of a single pixel in bytes as it is expected in the texture data.
    pub fn size_in_bytes(self) -> usize {
        match self {
            Self::R8 => 1,
            Self::RGB8 => 3,
            Self::RGBA8 | Self::SRGBA8 | Self::D24S8 | Self::D32F => 4,
            Self::RGB16F => 6,
            Self::RGBA16F => 8,
            Self::RGB32F => 12,
            Self::RGBA32F => 16,
        }
    }

    pub fn unpack_alignment(self) -> i32 {
        match self {
            Self::R8 | Self::RGB8 => 1,
            Self::RGB16F => 2,
            Self::RGBA8
            | Self::SRGBA8
            | Self::RGBA16F
            | Self::RGB32F
            | Self::RGBA32F
            | Self::D32F
            | Self::D24S8 => 4,
        }
    }

    pub fn is_depth(self) -> bool {
        matches!(self, Self::D32F | Self::D24S8)
    }

    pub fn has_stencil(self) -> bool {
        matches!(self, Self::D24S8)
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Default)]
pub enum MinificationFilter {
    #[default]
    Nearest,
    Linear,
    LinearMipMapLinear,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Default)]
pub enum MagnificationFilter {
    #[default]
    Nearest,
    Linear,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Default)]
pub enum WrapMode {
    Repeat,
    #[default]
    ClampToEdge,
    MirroredRepeat,
}

pub struct GpuTextureDescriptor<'a> {
    pub kind: GpuTextureKind,
    pub pixel_kind: PixelKind,
    pub min_filter: MinificationFilter,
    pub mag_filter: MagnificationFilter,
    pub s_wrap_mode: WrapMode,
    pub t_wrap_mode: WrapMode,
    pub data: Option<&'a [u8]>,
}

impl Default for GpuTextureDescriptor<'_> {
    fn default() -> Self {
        Self {
            kind: GpuTextureKind::Rectangle {
                width: 1,
                height: 1,
            },
            pixel_kind: PixelKind::RGBA8,
            min_filter: Default::default(),
            mag_filter: Default::default(),
            s_wrap_mode: Default::default(),
            t_wrap_mode: Default::default(),
            data: None,
        }
    }
}

impl GpuTextureDescriptor<'_> {
    /// Checks that the data, if any, covers the whole texture.
    pub fn validate(&self) -> Result<(), FrameworkError> {
        if let Some(data) = self.data {
            let expected_data_size =
                self.kind.width() * self.kind.height() * self.pixel_kind.size_in_bytes();
            if data.len() < expected_data_size {
                return Err(FrameworkError::InvalidTextureData {
                    expected_data_size,
                    actual_data_size: data.len(),
                });
            }
        }
        Ok(())
    }
}

pub trait GpuTexture: Any {
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
    fn kind(&self) -> GpuTextureKind;
    fn pixel_kind(&self) -> PixelKind;
}

#[cfg(test)]
mod test {
    use super::{GpuTextureDescriptor, GpuTextureKind, PixelKind};
    use crate::error::FrameworkError;

    #[test]
    fn test_insufficient_texture_data_is_rejected() {
        let data = [0u8; 11];
        let desc = GpuTextureDescriptor {
            kind: GpuTextureKind::Rectangle {
                width: 2,
                height: 2,
            },
            pixel_kind: PixelKind::RGB8,
            data: Some(&data),
            ..Default::default()
        };
        assert!(matches!(
            desc.validate(),
            Err(FrameworkError::InvalidTextureData {
                expected_data_size: 12,
                actual_data_size: 11
            })
        ));
    }
}
