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

//! Graphics server without GPU access. It validates resources the way a driver would and records
//! every command it receives, so render paths can be checked frame by frame in plain unit tests.
//!
//! Programs are "compiled" by reading uniform declarations out of the GLSL source, including
//! arrays of structures, so uniform lookups behave like on a real context: a name that is not
//! declared has no location.

use crate::{
    core::{color::Color, fxhash::FxHashMap, math::Rect},
    error::FrameworkError,
    framebuffer::{
        validate_attachments, validate_blit, Attachment, BlitMask, FrameBuffer, ResourceBinding,
    },
    geometry_buffer::{
        resolve_element_range, DrawCallStatistics, GeometryBuffer, GeometryBufferDescriptor,
    },
    gpu_program::{GpuProgram, GpuProgramBinding, UniformLocation, UniformSink, UniformValue},
    gpu_texture::{GpuTexture, GpuTextureDescriptor, GpuTextureKind, PixelKind},
    server::GraphicsServer,
    state::PipelineState,
    stats::PipelineStatistics,
    DrawParameters, ElementKind, ElementRange, PolygonFace, PolygonFillMode,
};
use std::{
    any::Any,
    cell::{Cell, Ref, RefCell},
    rc::{Rc, Weak},
};

/// Identifier of the back buffer in recorded commands.
pub const BACK_BUFFER_ID: usize = 0;

#[derive(Clone, Debug, PartialEq)]
pub struct DrawCommand {
    pub framebuffer: usize,
    pub program: String,
    pub geometry: usize,
    pub element_kind: ElementKind,
    pub element_range: ElementRange,
    /// `Some` for instanced draws.
    pub instances: Option<usize>,
    pub params: DrawParameters,
    /// Pipeline state at the moment of the draw.
    pub state: PipelineState,
    pub polygon_fill_mode: PolygonFillMode,
    pub viewport: Rect<i32>,
    /// Uniform values in the order they were set.
    pub uniforms: Vec<(String, UniformValue)>,
    /// Sampler name and texture id pairs.
    pub textures: Vec<(String, usize)>,
    pub statistics: DrawCallStatistics,
}

impl DrawCommand {
    /// Returns the last value set to the uniform with the given name.
    pub fn uniform(&self, name: &str) -> Option<UniformValue> {
        self.uniforms
            .iter()
            .rev()
            .find(|(n, _)| n == name)
            .map(|(_, v)| *v)
    }

    pub fn texture(&self, sampler: &str) -> Option<usize> {
        self.textures
            .iter()
            .find(|(n, _)| n == sampler)
            .map(|(_, id)| *id)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum RecordedCommand {
    Clear {
        framebuffer: usize,
        viewport: Rect<i32>,
        color: Option<Color>,
        depth: Option<f32>,
        stencil: Option<i32>,
    },
    Draw(Box<DrawCommand>),
    Blit {
        source: usize,
        dest: usize,
        src: Rect<i32>,
        dst: Rect<i32>,
        mask: BlitMask,
    },
    SetDrawBuffers {
        framebuffer: usize,
        buffers: Vec<usize>,
    },
    UploadBuffer {
        geometry: usize,
        buffer: usize,
        items: usize,
    },
    SwapBuffers,
}

impl RecordedCommand {
    pub fn as_draw(&self) -> Option<&DrawCommand> {
        match self {
            RecordedCommand::Draw(draw) => Some(draw),
            _ => None,
        }
    }
}

struct InnerState {
    pipeline: PipelineState,
    polygon_fill_mode: PolygonFillMode,
    commands: Vec<RecordedCommand>,
    frame_size: (u32, u32),
}

pub struct HeadlessGraphicsServer {
    state: RefCell<InnerState>,
    next_id: Cell<usize>,
    this: RefCell<Weak<HeadlessGraphicsServer>>,
}

impl HeadlessGraphicsServer {
    pub fn new(frame_size: (u32, u32)) -> Rc<Self> {
        let server = Rc::new(Self {
            state: RefCell::new(InnerState {
                pipeline: Default::default(),
                polygon_fill_mode: Default::default(),
                commands: Default::default(),
                frame_size,
            }),
            // Zero is reserved for the back buffer.
            next_id: Cell::new(BACK_BUFFER_ID + 1),
            this: Default::default(),
        });
        *server.this.borrow_mut() = Rc::downgrade(&server);
        server
    }

    fn weak(&self) -> Weak<Self> {
        self.this.borrow().clone()
    }

    fn make_id(&self) -> usize {
        let id = self.next_id.get();
        self.next_id.set(id + 1);
        id
    }

    fn record(&self, command: RecordedCommand) {
        self.state.borrow_mut().commands.push(command);
    }

    pub fn commands(&self) -> Ref<Vec<RecordedCommand>> {
        Ref::map(self.state.borrow(), |s| &s.commands)
    }

    pub fn take_commands(&self) -> Vec<RecordedCommand> {
        std::mem::take(&mut self.state.borrow_mut().commands)
    }

    pub fn clear_commands(&self) {
        self.state.borrow_mut().commands.clear();
    }

    /// Recorded draw calls in submission order.
    pub fn draws(&self) -> Vec<DrawCommand> {
        self.state
            .borrow()
            .commands
            .iter()
            .filter_map(|c| c.as_draw().cloned())
            .collect()
    }

    pub fn frame_size(&self) -> (u32, u32) {
        self.state.borrow().frame_size
    }
}

impl GraphicsServer for HeadlessGraphicsServer {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn create_texture(
        &self,
        desc: GpuTextureDescriptor,
    ) -> Result<Rc<RefCell<dyn GpuTexture>>, FrameworkError> {
        desc.validate()?;
        Ok(Rc::new(RefCell::new(HeadlessTexture {
            id: self.make_id(),
            kind: desc.kind,
            pixel_kind: desc.pixel_kind,
        })))
    }

    fn create_frame_buffer(
        &self,
        depth_attachment: Option<Attachment>,
        color_attachments: Vec<Attachment>,
    ) -> Result<Box<dyn FrameBuffer>, FrameworkError> {
        validate_attachments(depth_attachment.as_ref(), &color_attachments)?;
        Ok(Box::new(HeadlessFrameBuffer {
            server: self.weak(),
            id: self.make_id(),
            draw_buffers: (0..color_attachments.len()).collect(),
            depth_attachment,
            color_attachments,
        }))
    }

    fn back_buffer(&self) -> Box<dyn FrameBuffer> {
        Box::new(HeadlessFrameBuffer {
            server: self.weak(),
            id: BACK_BUFFER_ID,
            depth_attachment: None,
            color_attachments: Default::default(),
            draw_buffers: vec![0],
        })
    }

    fn create_program(
        &self,
        name: &str,
        vertex_source: &str,
        fragment_source: &str,
    ) -> Result<Box<dyn GpuProgram>, FrameworkError> {
        for (suffix, source) in [
            ("VertexShader", vertex_source),
            ("FragmentShader", fragment_source),
        ] {
            if !strip_comments(source).contains("void main") {
                return Err(FrameworkError::ShaderCompilationFailed {
                    shader_name: format!("{name}_{suffix}"),
                    error_message: "entry point `void main()` is not defined".to_owned(),
                });
            }
        }

        let mut uniforms = parse_uniforms(vertex_source);
        for uniform in parse_uniforms(fragment_source) {
            if !uniforms.contains(&uniform) {
                uniforms.push(uniform);
            }
        }

        Ok(Box::new(HeadlessProgram {
            name: name.to_owned(),
            uniforms,
        }))
    }

    fn create_geometry_buffer(
        &self,
        desc: GeometryBufferDescriptor,
    ) -> Result<Box<dyn GeometryBuffer>, FrameworkError> {
        let mut buffers = Vec::with_capacity(desc.buffers.len());
        for buffer in desc.buffers {
            buffer.validate()?;
            let element_size = buffer.data.element_size;
            buffers.push(HeadlessVertexBuffer {
                element_size,
                items: buffer
                    .data
                    .bytes
                    .map_or(0, |b| if element_size == 0 { 0 } else { b.len() / element_size }),
                per_instance: buffer.is_per_instance(),
            });
        }
        Ok(Box::new(HeadlessGeometryBuffer {
            server: self.weak(),
            id: self.make_id(),
            element_kind: desc.elements.element_kind(),
            element_count: desc.elements.element_count(),
            buffers,
        }))
    }

    fn invalidate_resource_bindings_cache(&self) {
        *self.state.borrow_mut().pipeline.statistics_mut() = Default::default();
    }

    fn pipeline_statistics(&self) -> PipelineStatistics {
        self.state.borrow().pipeline.statistics()
    }

    fn capture_state(&self) -> PipelineState {
        self.state.borrow().pipeline.clone()
    }

    fn restore_state(&self, saved: &PipelineState) {
        self.state
            .borrow_mut()
            .pipeline
            .transition_to(saved, &mut |_| ());
    }

    fn set_polygon_fill_mode(&self, _polygon_face: PolygonFace, polygon_fill_mode: PolygonFillMode) {
        self.state.borrow_mut().polygon_fill_mode = polygon_fill_mode;
    }

    fn swap_buffers(&self) -> Result<(), FrameworkError> {
        self.record(RecordedCommand::SwapBuffers);
        Ok(())
    }

    fn set_frame_size(&self, new_size: (u32, u32)) {
        self.state.borrow_mut().frame_size = new_size;
    }
}

pub struct HeadlessTexture {
    id: usize,
    kind: GpuTextureKind,
    pixel_kind: PixelKind,
}

impl HeadlessTexture {
    pub fn id(&self) -> usize {
        self.id
    }
}

impl GpuTexture for HeadlessTexture {
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

/// Returns the id of a texture created by [`HeadlessGraphicsServer`].
pub fn texture_id(texture: &Rc<RefCell<dyn GpuTexture>>) -> Option<usize> {
    texture
        .borrow()
        .as_any()
        .downcast_ref::<HeadlessTexture>()
        .map(|t| t.id)
}

pub struct HeadlessProgram {
    name: String,
    uniforms: Vec<String>,
}

impl HeadlessProgram {
    /// Every uniform name the program accepts, with arrays and structures expanded.
    pub fn uniforms(&self) -> &[String] {
        &self.uniforms
    }
}

impl GpuProgram for HeadlessProgram {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn uniform_location_opt(&self, name: &str) -> Option<UniformLocation> {
        self.uniforms
            .iter()
            .position(|u| u == name)
            .map(UniformLocation::new)
    }
}

struct RecordingSink<'a> {
    program: &'a HeadlessProgram,
    values: RefCell<Vec<(String, UniformValue)>>,
}

impl UniformSink for RecordingSink<'_> {
    fn set_uniform(&self, location: &UniformLocation, value: UniformValue) {
        if let Some(name) = self.program.uniforms.get(location.id) {
            self.values.borrow_mut().push((name.clone(), value));
        }
    }
}

pub struct HeadlessFrameBuffer {
    server: Weak<HeadlessGraphicsServer>,
    id: usize,
    depth_attachment: Option<Attachment>,
    color_attachments: Vec<Attachment>,
    draw_buffers: Vec<usize>,
}

impl HeadlessFrameBuffer {
    pub fn id(&self) -> usize {
        self.id
    }

    fn server(&self) -> Result<Rc<HeadlessGraphicsServer>, FrameworkError> {
        self.server
            .upgrade()
            .ok_or_else(|| FrameworkError::Custom("graphics server is gone".to_owned()))
    }

    #[allow(clippy::too_many_arguments)]
    fn record_draw(
        &self,
        instances: Option<usize>,
        geometry: &dyn GeometryBuffer,
        viewport: Rect<i32>,
        program: &dyn GpuProgram,
        params: &DrawParameters,
        resources: &[ResourceBinding],
        element_range: ElementRange,
        apply_uniforms: &mut dyn FnMut(&mut GpuProgramBinding),
    ) -> Result<DrawCallStatistics, FrameworkError> {
        let server = self.server()?;

        let headless_program = program
            .as_any()
            .downcast_ref::<HeadlessProgram>()
            .ok_or_else(|| FrameworkError::Custom("program must be headless".to_owned()))?;
        let headless_geometry = geometry
            .as_any()
            .downcast_ref::<HeadlessGeometryBuffer>()
            .ok_or_else(|| FrameworkError::Custom("geometry must be headless".to_owned()))?;

        let statistics = match instances {
            Some(count) => {
                geometry.validate_instances(count)?;
                DrawCallStatistics {
                    triangles: geometry.element_count() * count,
                }
            }
            None => {
                let (_, index_count) = resolve_element_range(
                    element_range,
                    geometry.element_count(),
                    geometry.element_kind(),
                )?;
                DrawCallStatistics {
                    triangles: index_count / geometry.element_kind().index_per_element(),
                }
            }
        };

        let mut textures = Vec::new();
        for resource in resources {
            match resource {
                ResourceBinding::Texture {
                    texture,
                    shader_location,
                } => {
                    let name = headless_program
                        .uniforms
                        .get(shader_location.id)
                        .cloned()
                        .ok_or_else(|| {
                            FrameworkError::UnableToFindShaderUniform(format!(
                                "#{}",
                                shader_location.id
                            ))
                        })?;
                    let id = texture_id(texture).ok_or_else(|| {
                        FrameworkError::Custom("texture must be headless".to_owned())
                    })?;
                    textures.push((name, id));
                }
            }
        }

        let sink = RecordingSink {
            program: headless_program,
            values: Default::default(),
        };
        apply_uniforms(&mut GpuProgramBinding::new(program, &sink));

        let mut state = server.state.borrow_mut();
        let _ = state.pipeline.set_viewport(viewport);
        state.pipeline.apply_draw_parameters(params, &mut |_| ());
        let command = DrawCommand {
            framebuffer: self.id,
            program: headless_program.name.clone(),
            geometry: headless_geometry.id,
            element_kind: geometry.element_kind(),
            element_range,
            instances,
            params: params.clone(),
            state: state.pipeline.clone(),
            polygon_fill_mode: state.polygon_fill_mode,
            viewport,
            uniforms: sink.values.into_inner(),
            textures,
            statistics,
        };
        state.commands.push(RecordedCommand::Draw(Box::new(command)));

        Ok(statistics)
    }
}

impl FrameBuffer for HeadlessFrameBuffer {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }

    fn is_back_buffer(&self) -> bool {
        self.id == BACK_BUFFER_ID
    }

    fn color_attachments(&self) -> &[Attachment] {
        &self.color_attachments
    }

    fn depth_attachment(&self) -> Option<&Attachment> {
        self.depth_attachment.as_ref()
    }

    fn set_draw_buffers(&mut self, buffers: &[usize]) -> Result<(), FrameworkError> {
        if let Some(invalid) = buffers.iter().find(|b| **b >= self.color_attachments.len()) {
            return Err(FrameworkError::Custom(format!(
                "draw buffer {invalid} is out of {} color attachments",
                self.color_attachments.len()
            )));
        }
        self.draw_buffers = buffers.to_vec();
        self.server()?.record(RecordedCommand::SetDrawBuffers {
            framebuffer: self.id,
            buffers: buffers.to_vec(),
        });
        Ok(())
    }

    fn draw_buffers(&self) -> &[usize] {
        &self.draw_buffers
    }

    fn clear(
        &mut self,
        viewport: Rect<i32>,
        color: Option<Color>,
        depth: Option<f32>,
        stencil: Option<i32>,
    ) {
        if let Some(server) = self.server.upgrade() {
            let mut state = server.state.borrow_mut();
            let _ = state.pipeline.set_viewport(viewport);
            let _ = state.pipeline.set_scissor_test(false);
            state.commands.push(RecordedCommand::Clear {
                framebuffer: self.id,
                viewport,
                color,
                depth,
                stencil,
            });
        }
    }

    fn blit_to(
        &self,
        dest: &dyn FrameBuffer,
        src: Rect<i32>,
        dst: Rect<i32>,
        mask: BlitMask,
    ) -> Result<(), FrameworkError> {
        validate_blit(src, dst, mask)?;
        let dest = dest
            .as_any()
            .downcast_ref::<HeadlessFrameBuffer>()
            .ok_or_else(|| FrameworkError::Custom("blit target must be headless".to_owned()))?;
        if mask.contains(BlitMask::STENCIL) {
            let has_stencil = |fb: &HeadlessFrameBuffer| {
                fb.is_back_buffer()
                    || fb
                        .depth_attachment
                        .as_ref()
                        .is_some_and(|a| a.texture.borrow().pixel_kind().has_stencil())
            };
            if !has_stencil(self) || !has_stencil(dest) {
                return Err(FrameworkError::Custom(
                    "stencil blit requires stencil buffers on both sides".to_owned(),
                ));
            }
        }
        self.server()?.record(RecordedCommand::Blit {
            source: self.id,
            dest: dest.id,
            src,
            dst,
            mask,
        });
        Ok(())
    }

    fn draw(
        &mut self,
        geometry: &dyn GeometryBuffer,
        viewport: Rect<i32>,
        program: &dyn GpuProgram,
        params: &DrawParameters,
        resources: &[ResourceBinding],
        element_range: ElementRange,
        apply_uniforms: &mut dyn FnMut(&mut GpuProgramBinding),
    ) -> Result<DrawCallStatistics, FrameworkError> {
        self.record_draw(
            None,
            geometry,
            viewport,
            program,
            params,
            resources,
            element_range,
            apply_uniforms,
        )
    }

    fn draw_instances(
        &mut self,
        count: usize,
        geometry: &dyn GeometryBuffer,
        viewport: Rect<i32>,
        program: &dyn GpuProgram,
        params: &DrawParameters,
        resources: &[ResourceBinding],
        apply_uniforms: &mut dyn FnMut(&mut GpuProgramBinding),
    ) -> Result<DrawCallStatistics, FrameworkError> {
        self.record_draw(
            Some(count),
            geometry,
            viewport,
            program,
            params,
            resources,
            ElementRange::Full,
            apply_uniforms,
        )
    }
}

struct HeadlessVertexBuffer {
    element_size: usize,
    items: usize,
    per_instance: bool,
}

pub struct HeadlessGeometryBuffer {
    server: Weak<HeadlessGraphicsServer>,
    id: usize,
    element_kind: ElementKind,
    element_count: usize,
    buffers: Vec<HeadlessVertexBuffer>,
}

impl GeometryBuffer for HeadlessGeometryBuffer {
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
        self.buffers.get(buffer).map_or(0, |b| b.items)
    }

    fn set_buffer_data(
        &mut self,
        buffer: usize,
        element_size: usize,
        data: &[u8],
    ) -> Result<(), FrameworkError> {
        let buffer_count = self.buffers.len();
        let vertex_buffer = self.buffers.get_mut(buffer).ok_or_else(|| {
            FrameworkError::Custom(format!(
                "vertex buffer {buffer} does not exist, geometry has {buffer_count} buffers"
            ))
        })?;
        if vertex_buffer.element_size != element_size || data.len() % element_size != 0 {
            return Err(FrameworkError::InvalidAttributeDescriptor);
        }
        vertex_buffer.items = data.len() / element_size;
        if let Some(server) = self.server.upgrade() {
            server.record(RecordedCommand::UploadBuffer {
                geometry: self.id,
                buffer,
                items: vertex_buffer.items,
            });
        }
        Ok(())
    }

    fn validate_instances(&self, instance_count: usize) -> Result<(), FrameworkError> {
        for (index, buffer) in self.buffers.iter().enumerate() {
            if buffer.per_instance && buffer.items < instance_count {
                return Err(FrameworkError::InvalidInstanceBuffer {
                    index,
                    available: buffer.items,
                    requested: instance_count,
                });
            }
        }
        Ok(())
    }
}

fn strip_comments(source: &str) -> String {
    let mut result = String::with_capacity(source.len());
    let mut rest = source;
    loop {
        let line = rest.find("//");
        let block = rest.find("/*");
        match (line, block) {
            (Some(l), b) if b.map_or(true, |b| l < b) => {
                result.push_str(&rest[..l]);
                rest = rest[l..].find('\n').map_or("", |end| &rest[l + end..]);
            }
            (_, Some(b)) => {
                result.push_str(&rest[..b]);
                rest = rest[b + 2..].find("*/").map_or("", |end| &rest[b + 2 + end + 2..]);
                result.push(' ');
            }
            _ => {
                result.push_str(rest);
                break;
            }
        }
    }
    result
}

struct Declaration {
    ty: String,
    name: String,
    array_len: Option<usize>,
}

fn parse_declaration(text: &str, defines: &FxHashMap<String, String>) -> Option<Declaration> {
    let tokens = text
        .split_whitespace()
        .filter(|t| !matches!(*t, "lowp" | "mediump" | "highp" | "flat"))
        .collect::<Vec<_>>();
    let [ty, declarator] = tokens.as_slice() else {
        return None;
    };
    let (name, array_len) = match declarator.split_once('[') {
        Some((name, len)) => {
            let len = len.trim_end_matches(']').trim();
            let len = defines.get(len).map_or(len, |v| v.as_str());
            (name, Some(len.parse().ok()?))
        }
        None => (*declarator, None),
    };
    Some(Declaration {
        ty: ty.to_string(),
        name: name.to_string(),
        array_len,
    })
}

fn expand_uniform(
    prefix: &str,
    ty: &str,
    array_len: Option<usize>,
    structs: &FxHashMap<String, Vec<Declaration>>,
    out: &mut Vec<String>,
) {
    let mut expand_single = |name: String| match structs.get(ty) {
        Some(fields) => {
            for field in fields {
                expand_uniform(
                    &format!("{name}.{}", field.name),
                    &field.ty,
                    field.array_len,
                    structs,
                    out,
                );
            }
        }
        None => out.push(name),
    };

    match array_len {
        Some(len) => {
            if !structs.contains_key(ty) {
                // Base name of a plain array refers to its first element.
                expand_single(prefix.to_owned());
            }
            for i in 0..len {
                expand_single(format!("{prefix}[{i}]"));
            }
        }
        None => expand_single(prefix.to_owned()),
    }
}

/// Extracts every uniform name accepted by a shader: `#define` constants are substituted into
/// array sizes, arrays and structures are expanded to their elements and fields.
pub fn parse_uniforms(source: &str) -> Vec<String> {
    let source = strip_comments(source);

    let mut defines = FxHashMap::default();
    let mut code = String::with_capacity(source.len());
    for line in source.lines() {
        let trimmed = line.trim_start();
        if let Some(define) = trimmed.strip_prefix("#define") {
            let mut parts = define.split_whitespace();
            if let (Some(name), Some(value)) = (parts.next(), parts.next()) {
                defines.insert(name.to_owned(), value.to_owned());
            }
        } else if !trimmed.starts_with('#') {
            code.push_str(line);
            code.push('\n');
        }
    }

    let mut structs = FxHashMap::default();
    let mut rest = code.as_str();
    let mut without_structs = String::with_capacity(code.len());
    while let Some(start) = find_keyword(rest, "struct") {
        without_structs.push_str(&rest[..start]);
        let after = &rest[start + "struct".len()..];
        let (Some(open), Some(close)) = (after.find('{'), after.find('}')) else {
            rest = after;
            continue;
        };
        let name = after[..open].trim().to_owned();
        let fields = after[open + 1..close]
            .split(';')
            .filter_map(|f| parse_declaration(f, &defines))
            .collect::<Vec<_>>();
        structs.insert(name, fields);
        rest = &after[close + 1..];
    }
    without_structs.push_str(rest);

    let mut uniforms = Vec::new();
    for statement in without_structs.split(';') {
        let statement = statement
            .rsplit(|c| c == '{' || c == '}')
            .next()
            .unwrap_or(statement)
            .trim();
        if let Some(declaration) = statement.strip_prefix("uniform") {
            if let Some(Declaration {
                ty,
                name,
                array_len,
            }) = parse_declaration(declaration, &defines)
            {
                expand_uniform(&name, &ty, array_len, &structs, &mut uniforms);
            }
        }
    }
    uniforms
}

fn find_keyword(text: &str, keyword: &str) -> Option<usize> {
    let is_ident = |c: char| c.is_alphanumeric() || c == '_';
    let mut offset = 0;
    while let Some(pos) = text[offset..].find(keyword) {
        let start = offset + pos;
        let end = start + keyword.len();
        let before_ok = text[..start].chars().next_back().map_or(true, |c| !is_ident(c));
        let after_ok = text[end..].chars().next().map_or(true, |c| !is_ident(c));
        if before_ok && after_ok {
            return Some(start);
        }
        offset = end;
    }
    None
}

#[cfg(test)]
mod test {
    use super::{parse_uniforms, HeadlessGraphicsServer, RecordedCommand};
    use crate::{
        core::{math::TriangleDefinition, math::Rect},
        error::FrameworkError,
        framebuffer::{Attachment, BlitMask},
        geometry_buffer::{
            AttributeDefinition, AttributeKind, BufferUsage, ElementsDescriptor,
            GeometryBufferDescriptor, VertexBufferData, VertexBufferDescriptor,
        },
        gpu_program::UniformValue,
        gpu_texture::PixelKind,
        server::GraphicsServer,
        CompareFunc, DrawParameters, ElementRange,
    };

    const FRAGMENT: &str = r#"
        #define MAX_LIGHTS 2
        struct Light {
            vec3 position; // view space
            float radius;
        };
        uniform sampler2D diffuseTexture;
        uniform Light lights[MAX_LIGHTS];
        uniform int lightCount;
        /* uniform float commentedOut; */
        out vec4 color;
        void main() { color = vec4(1.0); }
    "#;

    #[test]
    fn test_parse_struct_arrays() {
        let uniforms = parse_uniforms(FRAGMENT);
        assert_eq!(
            uniforms,
            vec![
                "diffuseTexture",
                "lights[0].position",
                "lights[0].radius",
                "lights[1].position",
                "lights[1].radius",
                "lightCount",
            ]
        );
    }

    #[test]
    fn test_missing_entry_point_fails_compilation() {
        let server = HeadlessGraphicsServer::new((4, 4));
        let result = server.create_program("Broken", "void main() {}", "out vec4 c;");
        assert!(matches!(
            result,
            Err(FrameworkError::ShaderCompilationFailed { shader_name, .. })
                if shader_name == "Broken_FragmentShader"
        ));
    }

    #[test]
    fn test_incomplete_framebuffers_are_rejected() {
        let server = HeadlessGraphicsServer::new((4, 4));
        let a = server
            .create_2d_render_target(PixelKind::RGBA8, 4, 4)
            .unwrap();
        let b = server
            .create_2d_render_target(PixelKind::RGBA8, 8, 4)
            .unwrap();
        let depth = server
            .create_2d_render_target(PixelKind::D24S8, 4, 4)
            .unwrap();

        assert!(matches!(
            server.create_frame_buffer(None, vec![Attachment::color(a.clone()), Attachment::color(b)]),
            Err(FrameworkError::FailedToConstructFBO(_))
        ));
        assert!(matches!(
            server.create_frame_buffer(None, vec![]),
            Err(FrameworkError::FailedToConstructFBO(_))
        ));
        assert!(matches!(
            server.create_frame_buffer(Some(Attachment::color(depth.clone())), vec![]),
            Err(FrameworkError::FailedToConstructFBO(_))
        ));
        assert!(server
            .create_frame_buffer(Some(Attachment::depth_stencil(depth)), vec![Attachment::color(a)])
            .is_ok());
    }

    #[test]
    fn test_draw_is_recorded_with_state_and_uniforms() {
        let server = HeadlessGraphicsServer::new((4, 4));
        let program = server
            .create_program("Test", "void main() {}", FRAGMENT)
            .unwrap();
        let vertices = [[0.0f32, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]];
        let geometry = server
            .create_geometry_buffer(GeometryBufferDescriptor {
                elements: ElementsDescriptor::Triangles(&[TriangleDefinition([0, 1, 2])]),
                buffers: &[VertexBufferDescriptor {
                    usage: BufferUsage::StaticDraw,
                    attributes: &[AttributeDefinition {
                        location: 0,
                        kind: AttributeKind::Float3,
                        normalized: false,
                        divisor: 0,
                    }],
                    data: VertexBufferData::new(Some(&vertices)),
                }],
                usage: BufferUsage::StaticDraw,
            })
            .unwrap();

        let radius = program.uniform_location("lights[1].radius").unwrap();
        assert!(program.uniform_location_opt("lights[2].radius").is_none());

        let mut back_buffer = server.back_buffer();
        let stats = back_buffer
            .draw(
                &*geometry,
                Rect::new(0, 0, 4, 4),
                &*program,
                &DrawParameters {
                    depth_test: Some(CompareFunc::GreaterOrEqual),
                    ..Default::default()
                },
                &[],
                ElementRange::Full,
                &mut |binding| {
                    binding.set_f32(&radius, 2.5);
                },
            )
            .unwrap();
        assert_eq!(stats.triangles, 1);

        let draws = server.draws();
        assert_eq!(draws.len(), 1);
        assert_eq!(
            draws[0].uniform("lights[1].radius"),
            Some(UniformValue::Float(2.5))
        );
        assert_eq!(draws[0].state.depth_func(), CompareFunc::GreaterOrEqual);
        assert!(draws[0].state.depth_test());

        let out_of_range = back_buffer.draw(
            &*geometry,
            Rect::new(0, 0, 4, 4),
            &*program,
            &Default::default(),
            &[],
            ElementRange::Specific {
                offset: 0,
                count: 2,
            },
            &mut |_| {},
        );
        assert!(matches!(
            out_of_range,
            Err(FrameworkError::InvalidElementRange { .. })
        ));
    }

    #[test]
    fn test_depth_blit_requires_equal_regions() {
        let server = HeadlessGraphicsServer::new((4, 4));
        let depth = server
            .create_2d_render_target(PixelKind::D24S8, 4, 4)
            .unwrap();
        let fb = server
            .create_frame_buffer(Some(Attachment::depth_stencil(depth)), vec![])
            .unwrap();
        let back_buffer = server.back_buffer();
        assert!(fb
            .blit_to(
                &*back_buffer,
                Rect::new(0, 0, 4, 4),
                Rect::new(0, 0, 2, 2),
                BlitMask::DEPTH
            )
            .is_err());
        fb.blit_to(
            &*back_buffer,
            Rect::new(0, 0, 4, 4),
            Rect::new(0, 0, 4, 4),
            BlitMask::DEPTH | BlitMask::STENCIL,
        )
        .unwrap();
        assert!(matches!(
            server.commands().last(),
            Some(RecordedCommand::Blit { dest: 0, .. })
        ));
    }
}
