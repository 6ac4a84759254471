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

//! Graphics API abstraction used by the umbra renderer. The [`server::GraphicsServer`] trait is
//! implemented by an OpenGL backend ([`gl`]) and by a recording backend without GPU access
//! ([`headless`]) which is used to test render paths.

pub use umbra_core as core;

use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, EnumString, VariantNames};

pub mod error;
pub mod framebuffer;
pub mod geometry_buffer;
#[cfg(not(target_arch = "wasm32"))]
pub mod gl;
pub mod gpu_program;
pub mod gpu_texture;
pub mod headless;
pub mod server;
pub mod state;
pub mod stats;

#[derive(
    Copy,
    Clone,
    PartialOrd,
    PartialEq,
    Eq,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Debug,
    AsRefStr,
    EnumString,
    VariantNames,
)]
pub enum CompareFunc {
    /// Never passes.
    Never,

    /// Passes if the incoming value is less than the stored value.
    Less,

    /// Passes if the incoming value is equal to the stored value.
    Equal,

    /// Passes if the incoming value is less than or equal to the stored value.
    LessOrEqual,

    /// Passes if the incoming value is greater than the stored value.
    Greater,

    /// Passes if the incoming value is not equal to the stored value.
    NotEqual,

    /// Passes if the incoming value is greater than or equal to the stored value.
    GreaterOrEqual,

    /// Always passes.
    Always,
}

impl Default for CompareFunc {
    fn default() -> Self {
        Self::LessOrEqual
    }
}

impl CompareFunc {
    /// Evaluates the function the same way the depth and stencil units do: `incoming` is
    /// compared against `stored`.
    pub fn passes<T: PartialOrd>(self, incoming: T, stored: T) -> bool {
        match self {
            CompareFunc::Never => false,
            CompareFunc::Less => incoming < stored,
            CompareFunc::Equal => incoming == stored,
            CompareFunc::LessOrEqual => incoming <= stored,
            CompareFunc::Greater => incoming > stored,
            CompareFunc::NotEqual => incoming != stored,
            CompareFunc::GreaterOrEqual => incoming >= stored,
            CompareFunc::Always => true,
        }
    }
}

#[derive(Copy, Clone, Hash, PartialOrd, PartialEq, Eq, Ord, Serialize, Deserialize, Debug)]
pub enum BlendFactor {
    Zero,
    One,
    SrcColor,
    OneMinusSrcColor,
    DstColor,
    OneMinusDstColor,
    SrcAlpha,
    OneMinusSrcAlpha,
    DstAlpha,
    OneMinusDstAlpha,
    ConstantColor,
    OneMinusConstantColor,
    ConstantAlpha,
    OneMinusConstantAlpha,
    SrcAlphaSaturate,
}

impl Default for BlendFactor {
    fn default() -> Self {
        Self::Zero
    }
}

#[derive(Copy, Clone, Hash, PartialOrd, PartialEq, Eq, Ord, Serialize, Deserialize, Debug)]
pub enum BlendMode {
    Add,
    Subtract,
    ReverseSubtract,
    Min,
    Max,
}

impl Default for BlendMode {
    fn default() -> Self {
        Self::Add
    }
}

#[derive(
    Copy, Clone, Default, PartialOrd, PartialEq, Ord, Eq, Hash, Serialize, Deserialize, Debug,
)]
pub struct BlendEquation {
    pub rgb: BlendMode,
    pub alpha: BlendMode,
}

#[derive(Copy, Clone, PartialOrd, PartialEq, Ord, Eq, Hash, Serialize, Deserialize, Debug)]
pub struct BlendFunc {
    pub sfactor: BlendFactor,
    pub dfactor: BlendFactor,
    pub alpha_sfactor: BlendFactor,
    pub alpha_dfactor: BlendFactor,
}

impl BlendFunc {
    pub fn new(sfactor: BlendFactor, dfactor: BlendFactor) -> Self {
        Self {
            sfactor,
            dfactor,
            alpha_sfactor: sfactor,
            alpha_dfactor: dfactor,
        }
    }
}

impl Default for BlendFunc {
    fn default() -> Self {
        Self::new(BlendFactor::One, BlendFactor::Zero)
    }
}

#[derive(Serialize, Deserialize, Default, Debug, PartialEq, Clone, Copy, Eq, Hash)]
pub struct BlendParameters {
    pub func: BlendFunc,
    pub equation: BlendEquation,
}

impl BlendParameters {
    /// `src + dst` accumulation, used to sum light contributions.
    pub fn additive() -> Self {
        Self {
            func: BlendFunc::new(BlendFactor::One, BlendFactor::One),
            equation: Default::default(),
        }
    }
}

#[derive(Copy, Clone, PartialOrd, PartialEq, Hash, Debug, Serialize, Deserialize, Eq)]
pub struct ColorMask {
    pub red: bool,
    pub green: bool,
    pub blue: bool,
    pub alpha: bool,
}

impl Default for ColorMask {
    fn default() -> Self {
        Self::all(true)
    }
}

impl ColorMask {
    pub fn all(value: bool) -> Self {
        Self {
            red: value,
            green: value,
            blue: value,
            alpha: value,
        }
    }
}

#[derive(Copy, Clone, PartialOrd, PartialEq, Hash, Debug, Serialize, Deserialize, Eq, Default)]
pub enum PolygonFace {
    Front,
    Back,
    #[default]
    FrontAndBack,
}

#[derive(Copy, Clone, PartialOrd, PartialEq, Hash, Debug, Serialize, Deserialize, Eq, Default)]
pub enum PolygonFillMode {
    Point,
    Line,
    #[default]
    Fill,
}

#[derive(Copy, Clone, PartialOrd, PartialEq, Hash, Debug, Serialize, Deserialize, Eq)]
pub struct StencilFunc {
    pub func: CompareFunc,
    pub ref_value: u32,
    pub mask: u32,
}

impl Default for StencilFunc {
    fn default() -> Self {
        Self {
            func: CompareFunc::Always,
            ref_value: 0,
            mask: 0xFFFF_FFFF,
        }
    }
}

#[derive(Copy, Clone, PartialOrd, PartialEq, Hash, Debug, Serialize, Deserialize, Eq, Default)]
pub enum StencilAction {
    /// Keeps the current value.
    #[default]
    Keep,

    /// Sets the stencil buffer value to 0.
    Zero,

    /// Sets the stencil buffer value to ref value.
    Replace,

    /// Increments the current stencil buffer value.
    /// Clamps to the maximum representable unsigned value.
    Incr,

    /// Increments the current stencil buffer value.
    /// Wraps stencil buffer value to zero when incrementing the maximum representable
    /// unsigned value.
    IncrWrap,

    /// Decrements the current stencil buffer value.
    /// Clamps to 0.
    Decr,

    /// Decrements the current stencil buffer value.
    /// Wraps stencil buffer value to the maximum representable unsigned value when
    /// decrementing a stencil buffer value of zero.
    DecrWrap,

    /// Bitwise inverts the current stencil buffer value.
    Invert,
}

#[derive(Copy, Clone, PartialOrd, PartialEq, Hash, Debug, Serialize, Deserialize, Eq)]
pub struct StencilOp {
    pub fail: StencilAction,
    pub zfail: StencilAction,
    pub zpass: StencilAction,
    pub write_mask: u32,
}

impl Default for StencilOp {
    fn default() -> Self {
        Self {
            fail: Default::default(),
            zfail: Default::default(),
            zpass: Default::default(),
            write_mask: 0xFFFF_FFFF,
        }
    }
}

impl StencilOp {
    /// Keeps every value and masks out all writes.
    pub fn read_only() -> Self {
        Self {
            write_mask: 0,
            ..Default::default()
        }
    }
}

#[derive(Copy, Clone, PartialOrd, PartialEq, Hash, Debug, Serialize, Deserialize, Eq, Default)]
pub enum CullFace {
    #[default]
    Back,
    Front,
}

#[derive(Serialize, Deserialize, Default, Debug, PartialEq, Clone, Copy, Eq, Hash)]
pub struct ScissorBox {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

/// Complete description of the fixed-function state of a single draw call. Every draw applies
/// all of it, so no state leaks from one draw to another.
#[derive(Serialize, Deserialize, Debug, PartialEq, Clone, Eq)]
pub struct DrawParameters {
    pub cull_face: Option<CullFace>,
    pub color_write: ColorMask,
    pub depth_write: bool,
    pub stencil_test: Option<StencilFunc>,
    pub depth_test: Option<CompareFunc>,
    pub blend: Option<BlendParameters>,
    /// Stencil operations for front faces, or for both faces when `back_stencil_op` is `None`.
    pub stencil_op: StencilOp,
    pub back_stencil_op: Option<StencilOp>,
    pub scissor_box: Option<ScissorBox>,
}

impl Default for DrawParameters {
    fn default() -> Self {
        Self {
            cull_face: Some(CullFace::Back),
            color_write: Default::default(),
            depth_write: true,
            stencil_test: None,
            depth_test: Some(CompareFunc::Less),
            blend: None,
            stencil_op: Default::default(),
            back_stencil_op: None,
            scissor_box: None,
        }
    }
}

impl DrawParameters {
    /// State for full-screen passes: no culling, no depth, no stencil, no blending.
    pub fn full_screen() -> Self {
        Self {
            cull_face: None,
            depth_write: false,
            depth_test: None,
            ..Default::default()
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Default)]
pub enum ElementRange {
    #[default]
    Full,
    Specific {
        offset: usize,
        count: usize,
    },
}

#[derive(Copy, Clone, PartialEq, Eq, Debug, Hash)]
pub enum ElementKind {
    Triangle,
    Line,
    Point,
}

impl ElementKind {
    pub fn index_per_element(self) -> usize {
        match self {
            ElementKind::Triangle => 3,
            ElementKind::Line => 2,
            ElementKind::Point => 1,
        }
    }
}

#[cfg(test)]
mod test {
    use crate::CompareFunc;

    #[test]
    fn test_compare_func_semantics() {
        // Stencil reference 128 against stored values, as used by light volume masking.
        assert!(CompareFunc::Less.passes(128, 129));
        assert!(!CompareFunc::Less.passes(128, 128));
        assert!(!CompareFunc::Less.passes(128, 127));
        assert!(CompareFunc::GreaterOrEqual.passes(0.5, 0.5));
        assert!(!CompareFunc::Never.passes(1, 1));
        assert!(CompareFunc::Always.passes(1, 0));
    }
}
