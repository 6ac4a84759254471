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

//! CPU-side triangle meshes and procedural shapes.

use crate::{
    core::{
        algebra::{Matrix4, Point3, Vector2, Vector3},
        math::TriangleDefinition,
    },
    graphics::{
        error::FrameworkError,
        geometry_buffer::{
            AttributeDefinition, AttributeKind, BufferUsage, ElementsDescriptor, GeometryBuffer,
            GeometryBufferDescriptor, VertexBufferData, VertexBufferDescriptor,
        },
        server::GraphicsServer,
    },
};
use bytemuck::{Pod, Zeroable};

/// Vertex layout of every mesh. Attribute locations are fixed: position is `0`, normal is `1`,
/// texture coordinates are `2`.
#[derive(Copy, Clone, Debug, PartialEq, Default, Pod, Zeroable)]
#[repr(C)]
pub struct Vertex {
    pub position: Vector3<f32>,
    pub normal: Vector3<f32>,
    pub tex_coord: Vector2<f32>,
}

impl Vertex {
    pub const ATTRIBUTES: [AttributeDefinition; 3] = [
        AttributeDefinition {
            location: 0,
            kind: AttributeKind::Float3,
            normalized: false,
            divisor: 0,
        },
        AttributeDefinition {
            location: 1,
            kind: AttributeKind::Float3,
            normalized: false,
            divisor: 0,
        },
        AttributeDefinition {
            location: 2,
            kind: AttributeKind::Float2,
            normalized: false,
            divisor: 0,
        },
    ];
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct SurfaceData {
    pub vertices: Vec<Vertex>,
    pub triangles: Vec<TriangleDefinition>,
}

impl SurfaceData {
    pub fn new(vertices: Vec<Vertex>, triangles: Vec<TriangleDefinition>) -> Self {
        Self {
            vertices,
            triangles,
        }
    }

    /// Appends a quad with corners `center ± u ± v`. Triangles are counter-clockwise when looking
    /// against `u × v`, which is also the normal of the quad.
    fn push_quad(&mut self, center: Vector3<f32>, u: Vector3<f32>, v: Vector3<f32>) {
        let normal = u.cross(&v).normalize();
        let base = self.vertices.len() as u32;
        for (du, dv, tex_coord) in [
            (-1.0, -1.0, Vector2::new(0.0, 0.0)),
            (1.0, -1.0, Vector2::new(1.0, 0.0)),
            (1.0, 1.0, Vector2::new(1.0, 1.0)),
            (-1.0, 1.0, Vector2::new(0.0, 1.0)),
        ] {
            self.vertices.push(Vertex {
                position: center + u * du + v * dv,
                normal,
                tex_coord,
            });
        }
        self.triangles
            .push(TriangleDefinition([base, base + 1, base + 2]));
        self.triangles
            .push(TriangleDefinition([base, base + 2, base + 3]));
    }

    /// Cube spanning `[-1; 1]` on every axis with outward facing triangles, transformed by the
    /// given matrix.
    pub fn make_cube(transform: Matrix4<f32>) -> Self {
        let mut data = Self::default();
        let x = Vector3::x();
        let y = Vector3::y();
        let z = Vector3::z();
        for (u, v) in [(y, z), (z, y), (z, x), (x, z), (x, y), (y, x)] {
            data.push_quad(u.cross(&v), u, v);
        }
        data.transform_geometry(&transform);
        data
    }

    /// Horizontal plane spanning `[-1; 1]` on X and Z, facing +Y.
    pub fn make_plane(transform: Matrix4<f32>) -> Self {
        let mut data = Self::default();
        data.push_quad(Vector3::default(), Vector3::z(), Vector3::x());
        data.transform_geometry(&transform);
        data
    }

    /// Quad covering the whole clip space at z = 0, texture coordinates cover the unit square.
    pub fn make_fullscreen_quad() -> Self {
        let mut data = Self::default();
        data.push_quad(Vector3::default(), Vector3::x(), Vector3::y());
        data
    }

    pub fn transform_geometry(&mut self, transform: &Matrix4<f32>) {
        let linear = transform.fixed_view::<3, 3>(0, 0).into_owned();
        let normal_matrix = linear
            .try_inverse()
            .map(|m| m.transpose())
            .unwrap_or(linear);
        for vertex in self.vertices.iter_mut() {
            vertex.position = transform
                .transform_point(&Point3::from(vertex.position))
                .coords;
            vertex.normal = (normal_matrix * vertex.normal)
                .try_normalize(f32::EPSILON)
                .unwrap_or(vertex.normal);
        }
    }

    /// Uploads the surface to GPU.
    pub fn create_geometry_buffer(
        &self,
        server: &dyn GraphicsServer,
    ) -> Result<Box<dyn GeometryBuffer>, FrameworkError> {
        server.create_geometry_buffer(GeometryBufferDescriptor {
            elements: ElementsDescriptor::Triangles(&self.triangles),
            buffers: &[VertexBufferDescriptor {
                usage: BufferUsage::StaticDraw,
                attributes: &Vertex::ATTRIBUTES,
                data: VertexBufferData::new(Some(&self.vertices)),
            }],
            usage: BufferUsage::StaticDraw,
        })
    }
}

/// Twelve edges of the `[-1; 1]` cube as line segments, used for wireframe debug drawing.
pub fn make_line_cube() -> (Vec<Vector3<f32>>, Vec<[u32; 2]>) {
    let mut corners = Vec::with_capacity(8);
    for i in 0..8u32 {
        let coord = |bit: u32| if i & bit != 0 { 1.0 } else { -1.0 };
        corners.push(Vector3::new(coord(1), coord(2), coord(4)));
    }
    let mut edges = Vec::with_capacity(12);
    for i in 0..8u32 {
        for bit in [1, 2, 4] {
            if i & bit == 0 {
                edges.push([i, i | bit]);
            }
        }
    }
    (corners, edges)
}

#[cfg(test)]
mod test {
    use super::{make_line_cube, SurfaceData};
    use crate::core::algebra::{Matrix4, Vector3};

    #[test]
    fn test_cube_faces_outwards() {
        let cube = SurfaceData::make_cube(Matrix4::identity());
        assert_eq!(cube.vertices.len(), 24);
        assert_eq!(cube.triangles.len(), 12);

        for triangle in cube.triangles.iter() {
            let [a, b, c] = triangle.0.map(|i| cube.vertices[i as usize].position);
            let winding_normal = (b - a).cross(&(c - a));
            let centroid = (a + b + c) / 3.0;
            assert!(winding_normal.dot(&centroid) > 0.0);
        }

        for vertex in cube.vertices.iter() {
            assert_eq!(vertex.position.abs().max(), 1.0);
        }
    }

    #[test]
    fn test_transformed_plane() {
        let plane = SurfaceData::make_plane(Matrix4::new_nonuniform_scaling(&Vector3::new(
            10.0, 1.0, 10.0,
        )));
        for vertex in plane.vertices.iter() {
            assert_eq!(vertex.normal, Vector3::y());
            assert_eq!(vertex.position.x.abs(), 10.0);
        }
    }

    #[test]
    fn test_line_cube() {
        let (corners, edges) = make_line_cube();
        assert_eq!(corners.len(), 8);
        assert_eq!(edges.len(), 12);
        for [a, b] in edges {
            // Every edge changes exactly one coordinate.
            let delta = corners[a as usize] - corners[b as usize];
            assert_eq!(delta.iter().filter(|c| **c != 0.0).count(), 1);
        }
    }
}
