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

//! 32-bit RGBA color.

use crate::algebra::{Vector3, Vector4};
use std::ops::{Add, AddAssign, Sub, SubAssign};

/// An 8-bit-per-channel color. Conversions to floating point are linear, no gamma is applied.
#[derive(Copy, Clone, Debug, PartialOrd, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(C)]
pub struct Color {
    // Do not change order! OpenGL requires this order!
    /// Red channel.
    pub r: u8,
    /// Green channel.
    pub g: u8,
    /// Blue channel.
    pub b: u8,
    /// Alpha channel.
    pub a: u8,
}

impl Default for Color {
    #[inline]
    fn default() -> Self {
        Self::WHITE
    }
}

impl From<Vector3<f32>> for Color {
    fn from(v: Vector3<f32>) -> Self {
        Self {
            r: (v.x.clamp(0.0, 1.0) * 255.0) as u8,
            g: (v.y.clamp(0.0, 1.0) * 255.0) as u8,
            b: (v.z.clamp(0.0, 1.0) * 255.0) as u8,
            a: 255,
        }
    }
}

impl From<Vector4<f32>> for Color {
    fn from(v: Vector4<f32>) -> Self {
        Self {
            r: (v.x.clamp(0.0, 1.0) * 255.0) as u8,
            g: (v.y.clamp(0.0, 1.0) * 255.0) as u8,
            b: (v.z.clamp(0.0, 1.0) * 255.0) as u8,
            a: (v.w.clamp(0.0, 1.0) * 255.0) as u8,
        }
    }
}

#[allow(missing_docs)]
impl Color {
    pub const WHITE: Self = Self::opaque(255, 255, 255);
    pub const BLACK: Self = Self::opaque(0, 0, 0);
    pub const RED: Self = Self::opaque(255, 0, 0);
    pub const GREEN: Self = Self::opaque(0, 255, 0);
    pub const BLUE: Self = Self::opaque(0, 0, 255);
    pub const TRANSPARENT: Self = Self::from_rgba(0, 0, 0, 0);
    pub const ORANGE: Self = Self::opaque(255, 69, 0);

    #[inline]
    pub const fn opaque(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 255 }
    }

    #[inline]
    pub const fn from_rgba(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    /// Builds a color from normalized floating point channels, clamping each one to `[0; 1]`.
    #[inline]
    pub fn from_frgba(r: f32, g: f32, b: f32, a: f32) -> Self {
        Self::from(Vector4::new(r, g, b, a))
    }

    #[inline]
    pub fn as_frgba(self) -> Vector4<f32> {
        Vector4::new(
            f32::from(self.r) / 255.0,
            f32::from(self.g) / 255.0,
            f32::from(self.b) / 255.0,
            f32::from(self.a) / 255.0,
        )
    }

    #[inline]
    pub fn as_frgb(self) -> Vector3<f32> {
        Vector3::new(
            f32::from(self.r) / 255.0,
            f32::from(self.g) / 255.0,
            f32::from(self.b) / 255.0,
        )
    }

    #[inline]
    pub fn to_opaque(self) -> Self {
        self.with_new_alpha(255)
    }

    #[inline]
    pub fn with_new_alpha(self, a: u8) -> Self {
        Self { a, ..self }
    }

    /// Scales RGB channels by the given factor, alpha stays untouched.
    #[must_use]
    #[inline]
    pub fn scaled(self, k: f32) -> Self {
        let mut v = self.as_frgb() * k;
        v.apply(|c| *c = c.clamp(0.0, 1.0));
        Self::from(v).with_new_alpha(self.a)
    }

    #[inline]
    pub fn lerp(self, other: Self, t: f32) -> Self {
        let dr = (t * (i32::from(other.r) - i32::from(self.r)) as f32) as i32;
        let dg = (t * (i32::from(other.g) - i32::from(self.g)) as f32) as i32;
        let db = (t * (i32::from(other.b) - i32::from(self.b)) as f32) as i32;
        let da = (t * (i32::from(other.a) - i32::from(self.a)) as f32) as i32;

        Self {
            r: (i32::from(self.r) + dr) as u8,
            g: (i32::from(self.g) + dg) as u8,
            b: (i32::from(self.b) + db) as u8,
            a: (i32::from(self.a) + da) as u8,
        }
    }
}

impl Add for Color {
    type Output = Self;

    fn add(self, rhs: Self) -> Self::Output {
        Self {
            r: self.r.saturating_add(rhs.r),
            g: self.g.saturating_add(rhs.g),
            b: self.b.saturating_add(rhs.b),
            a: self.a.saturating_add(rhs.a),
        }
    }
}

impl AddAssign for Color {
    fn add_assign(&mut self, rhs: Self) {
        *self = *self + rhs;
    }
}

impl Sub for Color {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self::Output {
        Self {
            r: self.r.saturating_sub(rhs.r),
            g: self.g.saturating_sub(rhs.g),
            b: self.b.saturating_sub(rhs.b),
            a: self.a.saturating_sub(rhs.a),
        }
    }
}

impl SubAssign for Color {
    fn sub_assign(&mut self, rhs: Self) {
        *self = *self - rhs;
    }
}

#[cfg(test)]
mod test {
    use crate::{algebra::Vector3, color::Color};

    #[test]
    fn test_float_conversion() {
        assert_eq!(Color::opaque(255, 0, 255).as_frgb(), Vector3::new(1.0, 0.0, 1.0));
        assert_eq!(Color::from(Vector3::new(2.0, -1.0, 1.0)), Color::opaque(255, 0, 255));
        assert_eq!(Color::from_frgba(0.0, 0.0, 0.0, 0.0), Color::TRANSPARENT);
    }

    #[test]
    fn test_scaled_keeps_alpha() {
        let c = Color::from_rgba(200, 100, 50, 17).scaled(0.5);
        assert_eq!(c.a, 17);
        assert!((i32::from(c.r) - 100).abs() <= 1);
        assert!((i32::from(c.g) - 50).abs() <= 1);
        assert_eq!(Color::WHITE.scaled(4.0), Color::WHITE);
    }

    #[test]
    fn test_saturating_ops() {
        assert_eq!(Color::opaque(200, 0, 0) + Color::opaque(100, 0, 0), Color::opaque(255, 0, 0));
        assert_eq!(Color::BLACK - Color::WHITE, Color::TRANSPARENT);
    }
}
