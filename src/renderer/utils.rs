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
    core::algebra::Matrix4,
    graphics::{error::FrameworkError, geometry_buffer::GeometryBuffer, server::GraphicsServer},
    scene::surface::SurfaceData,
};

/// Quad covering the whole clip space, see [`SurfaceData::make_fullscreen_quad`].
pub fn make_fullscreen_quad(
    server: &dyn GraphicsServer,
) -> Result<Box<dyn GeometryBuffer>, FrameworkError> {
    SurfaceData::make_fullscreen_quad().create_geometry_buffer(server)
}

/// Cube spanning `[-1; 1]`, used as a bounding volume of point lights.
pub fn make_unit_cube(
    server: &dyn GraphicsServer,
) -> Result<Box<dyn GeometryBuffer>, FrameworkError> {
    SurfaceData::make_cube(Matrix4::identity()).create_geometry_buffer(server)
}
