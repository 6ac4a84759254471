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
    geometry_buffer::{
        resolve_element_range, AttributeKind, BufferUsage, DrawCallStatistics, GeometryBuffer,
        GeometryBufferDescriptor, VertexBufferDescriptor,
    },
    gl::server::GlGraphicsServer,
    ElementKind, ElementRange,
};
use glow::HasContext;
use std::{any::Any, marker::PhantomData, mem::size_of, rc::Weak};

impl AttributeKind {
    fn gl_type(self) -> u32 {
        match self {
            AttributeKind::Float
            | AttributeKind::Float2
            | AttributeKind::Float3
            | AttributeKind::Float4 => glow::FLOAT,
            AttributeKind::UnsignedByte4 => glow::UNSIGNED_BYTE,
            AttributeKind::UnsignedInt => glow::UNSIGNED_INT,
        }
    }
}

impl BufferUsage {
    fn gl_usage(self) -> u32 {
        match self {
            BufferUsage::StaticDraw => glow::STATIC_DRAW,
            BufferUsage::DynamicDraw => glow::DYNAMIC_DRAW,
            BufferUsage::StreamDraw => glow::STREAM_DRAW,
        }
    }
}

struct NativeBuffer {
    state: Weak<GlGraphicsServer>,
    id: glow::Buffer,
    usage: BufferUsage,
    element_size: usize,
    size_bytes: usize,
    per_instance: bool,
    // Force compiler to not implement Send and Sync, because OpenGL is not thread-safe.
    thread_mark: PhantomData<*const u8>,
}

impl NativeBuffer {
    fn item_count(&self) -> usize {
        if self.element_size == 0 {
            0
        } else {
            self.size_bytes / self.element_size
        }
    }
}

impl Drop for NativeBuffer {
    fn drop(&mut self) {
        if let Some(state) = self.state.upgrade() {
            unsafe {
                state.gl.delete_buffer(self.id);
            }
        }
    }
}

pub struct GlGeometryBuffer {
    state: Weak<GlGraphicsServer>,
    vertex_array_object: glow::VertexArray,
    buffers: Vec<NativeBuffer>,
    element_buffer_object: glow::Buffer,
    element_count: usize,
    element_kind: ElementKind,
    // Force compiler to not implement Send and Sync, because OpenGL is not thread-safe.
    thread_mark: PhantomData<*const u8>,
}

fn create_buffer(
    server: &GlGraphicsServer,
    desc: &VertexBufferDescriptor,
) -> Result<NativeBuffer, FrameworkError> {
    desc.validate()?;

    let vbo = unsafe { server.gl.create_buffer()? };

    unsafe {
        server.gl.bind_buffer(glow::ARRAY_BUFFER, Some(vbo));
    }
    server.state.borrow_mut().pipeline.statistics_mut().vbo_binding_changes += 1;

    let size_bytes = desc.data.bytes.map_or(0, |bytes| bytes.len());
    if let Some(bytes) = desc.data.bytes {
        if !bytes.is_empty() {
            unsafe {
                server
                    .gl
                    .buffer_data_u8_slice(glow::ARRAY_BUFFER, bytes, desc.usage.gl_usage());
            }
        }
    }

    let native_buffer = NativeBuffer {
        state: server.weak(),
        id: vbo,
        usage: desc.usage,
        element_size: desc.data.element_size,
        size_bytes,
        per_instance: desc.is_per_instance(),
        thread_mark: PhantomData,
    };

    let mut offset = 0usize;
    for definition in desc.attributes {
        unsafe {
            server.gl.vertex_attrib_pointer_f32(
                definition.location,
                definition.kind.length() as i32,
                definition.kind.gl_type(),
                definition.normalized,
                desc.data.element_size as i32,
                offset as i32,
            );
            server
                .gl
                .vertex_attrib_divisor(definition.location, definition.divisor);
            server.gl.enable_vertex_attrib_array(definition.location);
        }
        offset += definition.kind.size_bytes();
    }

    Ok(native_buffer)
}

impl GlGeometryBuffer {
    pub fn new(
        server: &GlGraphicsServer,
        desc: GeometryBufferDescriptor,
    ) -> Result<Self, FrameworkError> {
        let vao = unsafe { server.gl.create_vertex_array()? };
        let ebo = unsafe { server.gl.create_buffer()? };

        server.set_vertex_array_object(Some(vao));

        let mut buffers = Vec::with_capacity(desc.buffers.len());
        for buffer in desc.buffers {
            buffers.push(create_buffer(server, buffer)?);
        }

        // Element buffer binding is a part of the vertex array object state.
        unsafe {
            server.gl.bind_buffer(glow::ELEMENT_ARRAY_BUFFER, Some(ebo));
            server.gl.buffer_data_u8_slice(
                glow::ELEMENT_ARRAY_BUFFER,
                desc.elements.bytes(),
                desc.usage.gl_usage(),
            );
        }

        server.set_vertex_array_object(None);

        Ok(Self {
            state: server.weak(),
            vertex_array_object: vao,
            buffers,
            element_buffer_object: ebo,
            element_count: desc.elements.element_count(),
            element_kind: desc.elements.element_kind(),
            thread_mark: PhantomData,
        })
    }

    fn mode(&self) -> u32 {
        match self.element_kind {
            ElementKind::Triangle => glow::TRIANGLES,
            ElementKind::Line => glow::LINES,
            ElementKind::Point => glow::POINTS,
        }
    }

    pub(crate) fn draw(
        &self,
        server: &GlGraphicsServer,
        element_range: ElementRange,
    ) -> Result<DrawCallStatistics, FrameworkError> {
        let (start_index, index_count) =
            resolve_element_range(element_range, self.element_count, self.element_kind)?;

        server.set_vertex_array_object(Some(self.vertex_array_object));

        if index_count > 0 {
            unsafe {
                server.gl.draw_elements(
                    self.mode(),
                    index_count as i32,
                    glow::UNSIGNED_INT,
                    (start_index * size_of::<u32>()) as i32,
                );
            }
        }

        Ok(DrawCallStatistics {
            triangles: index_count / self.element_kind.index_per_element(),
        })
    }

    pub(crate) fn draw_instances(
        &self,
        server: &GlGraphicsServer,
        count: usize,
    ) -> Result<DrawCallStatistics, FrameworkError> {
        self.validate_instances(count)?;

        server.set_vertex_array_object(Some(self.vertex_array_object));

        let index_count = self.element_count * self.element_kind.index_per_element();
        if index_count > 0 && count > 0 {
            unsafe {
                server.gl.draw_elements_instanced(
                    self.mode(),
                    index_count as i32,
                    glow::UNSIGNED_INT,
                    0,
                    count as i32,
                )
            }
        }

        Ok(DrawCallStatistics {
            triangles: self.element_count * count,
        })
    }
}

impl GeometryBuffer for GlGeometryBuffer {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn element_kind(&self) -> ElementKind {
        self.element_kind
    }

    fn element_count(&self) -> usize {
        self.element_count
    }

    fn buffer_count(&self) -> usize {
        self.buffers.len()
    }

    fn buffer_item_count(&self, buffer: usize) -> usize {
        self.buffers.get(buffer).map_or(0, |b| b.item_count())
    }

    fn set_buffer_data(
        &mut self,
        buffer: usize,
        element_size: usize,
        data: &[u8],
    ) -> Result<(), FrameworkError> {
        let server = self
            .state
            .upgrade()
            .ok_or_else(|| FrameworkError::Custom("graphics server is gone".to_owned()))?;

        let buffer_count = self.buffers.len();
        let buffer = self.buffers.get_mut(buffer).ok_or_else(|| {
            FrameworkError::Custom(format!(
                "vertex buffer {buffer} does not exist, geometry has {buffer_count} buffers"
            ))
        })?;

        if buffer.element_size != element_size {
            return Err(FrameworkError::InvalidAttributeDescriptor);
        }

        unsafe {
            server.gl.bind_buffer(glow::ARRAY_BUFFER, Some(buffer.id));
            if buffer.size_bytes < data.len() || data.is_empty() {
                server
                    .gl
                    .buffer_data_u8_slice(glow::ARRAY_BUFFER, data, buffer.usage.gl_usage());
            } else {
                server.gl.buffer_sub_data_u8_slice(glow::ARRAY_BUFFER, 0, data);
            }
        }
        server.state.borrow_mut().pipeline.statistics_mut().vbo_binding_changes += 1;

        buffer.size_bytes = data.len();

        Ok(())
    }

    fn validate_instances(&self, instance_count: usize) -> Result<(), FrameworkError> {
        for (index, buffer) in self.buffers.iter().enumerate() {
            if buffer.per_instance && buffer.item_count() < instance_count {
                return Err(FrameworkError::InvalidInstanceBuffer {
                    index,
                    available: buffer.item_count(),
                    requested: instance_count,
                });
            }
        }
        Ok(())
    }
}

impl Drop for GlGeometryBuffer {
    fn drop(&mut self) {
        if let Some(state) = self.state.upgrade() {
            unsafe {
                self.buffers.clear();

                state.gl.delete_buffer(self.element_buffer_object);
                state.gl.delete_vertex_array(self.vertex_array_object);
            }
        }
    }
}
