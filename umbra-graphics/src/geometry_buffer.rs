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
    core::{array_as_u8_slice, math::TriangleDefinition},
    error::FrameworkError,
    ElementKind, ElementRange,
};
use bytemuck::Pod;
use std::{any::Any, mem::size_of};

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum AttributeKind {
    Float,
    Float2,
    Float3,
    Float4,

    UnsignedByte4,

    UnsignedInt,
}

impl AttributeKind {
    pub fn size_bytes(self) -> usize {
        match self {
            AttributeKind::Float => size_of::<f32>(),
            AttributeKind::Float2 => size_of::<f32>() * 2,
            AttributeKind::Float3 => size_of::<f32>() * 3,
            AttributeKind::Float4 => size_of::<f32>() * 4,
            AttributeKind::UnsignedByte4 => size_of::<u8>() * 4,
            AttributeKind::UnsignedInt => size_of::<u32>(),
        }
    }

    pub fn length(self) -> usize {
        match self {
            AttributeKind::Float | AttributeKind::UnsignedInt => 1,
            AttributeKind::Float2 => 2,
            AttributeKind::Float3 => 3,
            AttributeKind::Float4 | AttributeKind::UnsignedByte4 => 4,
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct AttributeDefinition {
    pub location: u32,
    pub kind: AttributeKind,
    pub normalized: bool,
    /// Zero means per-vertex data, one means the attribute advances once per instance.
    pub divisor: u32,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Default)]
pub enum BufferUsage {
    #[default]
    StaticDraw,
    DynamicDraw,
    StreamDraw,
}

#[derive(Copy, Clone)]
pub struct VertexBufferData<'a> {
    pub element_size: usize,
    pub bytes: Option<&'a [u8]>,
}

impl<'a> VertexBufferData<'a> {
    pub fn new<T: Pod>(vertices: Option<&'a [T]>) -> Self {
        Self {
            element_size: size_of::<T>(),
            bytes: vertices.map(|v| array_as_u8_slice(v)),
        }
    }
}

pub struct VertexBufferDescriptor<'a> {
    pub usage: BufferUsage,
    pub attributes: &'a [AttributeDefinition],
    pub data: VertexBufferData<'a>,
}

impl VertexBufferDescriptor<'_> {
    /// Checks that attributes fit into a single vertex.
    pub fn validate(&self) -> Result<(), FrameworkError> {
        let attributes_size = self
            .attributes
            .iter()
            .map(|a| a.kind.size_bytes())
            .sum::<usize>();
        if attributes_size > self.data.element_size {
            return Err(FrameworkError::InvalidAttributeDescriptor);
        }
        Ok(())
    }

    pub fn is_per_instance(&self) -> bool {
        self.attributes.iter().any(|a| a.divisor > 0)
    }
}

pub enum ElementsDescriptor<'a> {
    Triangles(&'a [TriangleDefinition]),
    Lines(&'a [[u32; 2]]),
    Points(&'a [u32]),
}

impl ElementsDescriptor<'_> {
    pub fn element_kind(&self) -> ElementKind {
        match self {
            ElementsDescriptor::Triangles(_) => ElementKind::Triangle,
            ElementsDescriptor::Lines(_) => ElementKind::Line,
            ElementsDescriptor::Points(_) => ElementKind::Point,
        }
    }

    pub fn element_count(&self) -> usize {
        match self {
            ElementsDescriptor::Triangles(v) => v.len(),
            ElementsDescriptor::Lines(v) => v.len(),
            ElementsDescriptor::Points(v) => v.len(),
        }
    }

    pub fn bytes(&self) -> &[u8] {
        match self {
            ElementsDescriptor::Triangles(v) => array_as_u8_slice(v),
            ElementsDescriptor::Lines(v) => array_as_u8_slice(v),
            ElementsDescriptor::Points(v) => array_as_u8_slice(v),
        }
    }
}

pub struct GeometryBufferDescriptor<'a> {
    pub elements: ElementsDescriptor<'a>,
    pub buffers: &'a [VertexBufferDescriptor<'a>],
    pub usage: BufferUsage,
}

#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct DrawCallStatistics {
    pub triangles: usize,
}

/// Converts an element range into `(first index, index count)` pair, checking it against the
/// amount of elements in a buffer.
pub fn resolve_element_range(
    element_range: ElementRange,
    element_count: usize,
    element_kind: ElementKind,
) -> Result<(usize, usize), FrameworkError> {
    let (offset, count) = match element_range {
        ElementRange::Full => (0, element_count),
        ElementRange::Specific { offset, count } => (offset, count),
    };

    let last_element_index = offset + count;

    if last_element_index > element_count {
        Err(FrameworkError::InvalidElementRange {
            start: offset,
            end: last_element_index,
            total: element_count,
        })
    } else {
        let index_per_element = element_kind.index_per_element();
        Ok((offset * index_per_element, count * index_per_element))
    }
}

pub trait GeometryBuffer: Any {
    fn as_any(&self) -> &dyn Any;

    fn element_kind(&self) -> ElementKind;

    fn element_count(&self) -> usize;

    fn buffer_count(&self) -> usize;

    /// Amount of items in the given vertex buffer.
    fn buffer_item_count(&self, buffer: usize) -> usize;

    /// Replaces the contents of a vertex buffer. `element_size` must match the size the buffer
    /// was created with.
    fn set_buffer_data(
        &mut self,
        buffer: usize,
        element_size: usize,
        data: &[u8],
    ) -> Result<(), FrameworkError>;

    /// Checks that every per-instance buffer has at least `instance_count` items.
    fn validate_instances(&self, instance_count: usize) -> Result<(), FrameworkError>;
}

impl dyn GeometryBuffer {
    pub fn set_buffer_data_of_type<T: Pod>(
        &mut self,
        buffer: usize,
        data: &[T],
    ) -> Result<(), FrameworkError> {
        self.set_buffer_data(buffer, size_of::<T>(), array_as_u8_slice(data))
    }
}

#[cfg(test)]
mod test {
    use super::resolve_element_range;
    use crate::{error::FrameworkError, ElementKind, ElementRange};

    #[test]
    fn test_element_range() {
        assert_eq!(
            resolve_element_range(ElementRange::Full, 12, ElementKind::Triangle).unwrap(),
            (0, 36)
        );
        assert_eq!(
            resolve_element_range(
                ElementRange::Specific {
                    offset: 2,
                    count: 3
                },
                12,
                ElementKind::Line
            )
            .unwrap(),
            (4, 6)
        );
        assert!(matches!(
            resolve_element_range(
                ElementRange::Specific {
                    offset: 10,
                    count: 3
                },
                12,
                ElementKind::Triangle
            ),
            Err(FrameworkError::InvalidElementRange {
                start: 10,
                end: 13,
                total: 12
            })
        ));
    }
}
