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

//! Small math helpers that nalgebra does not provide out of the box.

use crate::algebra::{Scalar, Vector2};
use crate::num_traits::{NumAssign, Zero};
use bytemuck::{Pod, Zeroable};
use std::fmt::Debug;

/// Axis-aligned rectangle defined by its top-left corner and size.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Rect<T>
where
    T: Debug + Scalar,
{
    /// Position of the top-left corner.
    pub position: Vector2<T>,
    /// Width and height of the rectangle.
    pub size: Vector2<T>,
}

impl<T> Default for Rect<T>
where
    T: NumAssign + Scalar + PartialOrd + Copy,
{
    fn default() -> Self {
        Self {
            position: Vector2::new(Zero::zero(), Zero::zero()),
            size: Vector2::new(Zero::zero(), Zero::zero()),
        }
    }
}

impl<T> Rect<T>
where
    T: NumAssign + Scalar + PartialOrd + Copy,
{
    /// Creates a new rectangle from its corner and size.
    #[inline]
    pub fn new(x: T, y: T, w: T, h: T) -> Self {
        Self {
            position: Vector2::new(x, y),
            size: Vector2::new(w, h),
        }
    }

    /// Checks whether the point lies inside the rectangle, borders are inclusive.
    #[inline]
    pub fn contains(&self, pt: Vector2<T>) -> bool {
        pt.x >= self.position.x
            && pt.x <= self.position.x + self.size.x
            && pt.y >= self.position.y
            && pt.y <= self.position.y + self.size.y
    }

    /// Checks whether the other rectangle lies completely inside this one.
    #[inline]
    pub fn contains_rect(&self, other: &Self) -> bool {
        other.position.x >= self.position.x
            && other.position.y >= self.position.y
            && other.position.x + other.size.x <= self.position.x + self.size.x
            && other.position.y + other.size.y <= self.position.y + self.size.y
    }

    #[inline]
    #[allow(missing_docs)]
    pub fn x(&self) -> T {
        self.position.x
    }

    #[inline]
    #[allow(missing_docs)]
    pub fn y(&self) -> T {
        self.position.y
    }

    #[inline]
    #[allow(missing_docs)]
    pub fn w(&self) -> T {
        self.size.x
    }

    #[inline]
    #[allow(missing_docs)]
    pub fn h(&self) -> T {
        self.size.y
    }
}

/// Size of a render target in pixels.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Resolution {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl Default for Resolution {
    fn default() -> Self {
        Self::new(1, 1)
    }
}

impl Resolution {
    /// Creates a new resolution. Zero dimensions are promoted to one pixel, a render target
    /// can't be empty.
    #[inline]
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width: width.max(1),
            height: height.max(1),
        }
    }

    /// Width divided by height.
    #[inline]
    pub fn aspect_ratio(&self) -> f32 {
        self.width as f32 / self.height as f32
    }

    /// Full-target viewport rectangle.
    #[inline]
    pub fn viewport(&self) -> Rect<i32> {
        Rect::new(0, 0, self.width as i32, self.height as i32)
    }

    /// Size as a floating point vector, handy for `screenResolution`-like uniforms.
    #[inline]
    pub fn as_vec2(&self) -> Vector2<f32> {
        Vector2::new(self.width as f32, self.height as f32)
    }
}

/// Three indices of a triangle in a vertex buffer.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Default, Pod, Zeroable)]
#[repr(transparent)]
pub struct TriangleDefinition(pub [u32; 3]);

#[cfg(test)]
mod test {
    use super::{Rect, Resolution};
    use crate::algebra::Vector2;

    #[test]
    fn test_rect_contains() {
        let rect = Rect::new(0, 0, 800, 600);
        assert!(rect.contains(Vector2::new(400, 300)));
        assert!(!rect.contains(Vector2::new(-1, 300)));
        assert!(rect.contains_rect(&Rect::new(10, 10, 100, 100)));
        assert!(!rect.contains_rect(&Rect::new(790, 10, 100, 100)));
    }

    #[test]
    fn test_resolution_is_never_empty() {
        let r = Resolution::new(0, 0);
        assert_eq!(r, Resolution::new(1, 1));
        assert_eq!(Resolution::new(800, 600).viewport(), Rect::new(0, 0, 800, 600));
        assert!((Resolution::new(800, 600).aspect_ratio() - 4.0 / 3.0).abs() < f32::EPSILON);
    }
}
