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

//! Explicit mirror of the fixed-function state of a graphics context.
//!
//! Every backend owns one [`PipelineState`] and routes each state mutation through it. A setter
//! returns the [`StateChange`] that must reach the graphics API, or `None` when the context is
//! already in the requested state. All command issuance is single-threaded and strictly
//! ordered, so the mirror never diverges from the real context.

use crate::{
    core::math::Rect, server::GraphicsServer, stats::PipelineStatistics, BlendEquation,
    BlendFunc, ColorMask, CompareFunc, CullFace, DrawParameters, PolygonFace, ScissorBox,
    StencilFunc, StencilOp,
};

/// A single state mutation that has to be issued to the graphics API.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum StateChange {
    Blend(bool),
    BlendFunc(BlendFunc),
    BlendEquation(BlendEquation),
    DepthTest(bool),
    DepthFunc(CompareFunc),
    DepthWrite(bool),
    ColorWrite(ColorMask),
    StencilTest(bool),
    StencilFunc(StencilFunc),
    StencilOp { face: PolygonFace, op: StencilOp },
    Culling(bool),
    CullFace(CullFace),
    ScissorTest(bool),
    ScissorBox(ScissorBox),
    Viewport(Rect<i32>),
}

#[derive(Clone, Debug, PartialEq)]
pub struct PipelineState {
    blend: bool,
    blend_func: BlendFunc,
    blend_equation: BlendEquation,

    depth_test: bool,
    depth_write: bool,
    depth_func: CompareFunc,

    color_write: ColorMask,

    stencil_test: bool,
    stencil_func: StencilFunc,
    front_stencil_op: StencilOp,
    back_stencil_op: StencilOp,

    culling: bool,
    cull_face: CullFace,

    scissor_test: bool,
    scissor_box: ScissorBox,

    viewport: Rect<i32>,

    frame_statistics: PipelineStatistics,
}

impl Default for PipelineState {
    /// Initial state of a freshly created OpenGL context.
    fn default() -> Self {
        Self {
            blend: false,
            blend_func: Default::default(),
            blend_equation: Default::default(),
            depth_test: false,
            depth_write: true,
            depth_func: CompareFunc::Less,
            color_write: Default::default(),
            stencil_test: false,
            stencil_func: Default::default(),
            front_stencil_op: Default::default(),
            back_stencil_op: Default::default(),
            culling: false,
            cull_face: CullFace::Back,
            scissor_test: false,
            scissor_box: Default::default(),
            viewport: Rect::new(0, 0, 1, 1),
            frame_statistics: Default::default(),
        }
    }
}

macro_rules! define_setter {
    ($name:ident, $field:ident, $ty:ty, $change:ident) => {
        pub fn $name(&mut self, value: $ty) -> Option<StateChange> {
            if self.$field != value {
                self.$field = value;
                self.frame_statistics.capability_changes += 1;
                Some(StateChange::$change(value))
            } else {
                None
            }
        }
    };
}

impl PipelineState {
    define_setter!(set_depth_test, depth_test, bool, DepthTest);
    define_setter!(set_depth_write, depth_write, bool, DepthWrite);
    define_setter!(set_depth_func, depth_func, CompareFunc, DepthFunc);
    define_setter!(set_color_write, color_write, ColorMask, ColorWrite);
    define_setter!(set_stencil_test, stencil_test, bool, StencilTest);
    define_setter!(set_stencil_func, stencil_func, StencilFunc, StencilFunc);
    define_setter!(set_culling, culling, bool, Culling);
    define_setter!(set_cull_face, cull_face, CullFace, CullFace);
    define_setter!(set_scissor_test, scissor_test, bool, ScissorTest);
    define_setter!(set_scissor_box, scissor_box, ScissorBox, ScissorBox);
    define_setter!(set_viewport, viewport, Rect<i32>, Viewport);

    pub fn set_blend(&mut self, blend: bool) -> Option<StateChange> {
        if self.blend != blend {
            self.blend = blend;
            self.frame_statistics.blend_state_changes += 1;
            Some(StateChange::Blend(blend))
        } else {
            None
        }
    }

    pub fn set_blend_func(&mut self, func: BlendFunc) -> Option<StateChange> {
        if self.blend_func != func {
            self.blend_func = func;
            self.frame_statistics.blend_state_changes += 1;
            Some(StateChange::BlendFunc(func))
        } else {
            None
        }
    }

    pub fn set_blend_equation(&mut self, equation: BlendEquation) -> Option<StateChange> {
        if self.blend_equation != equation {
            self.blend_equation = equation;
            self.frame_statistics.blend_state_changes += 1;
            Some(StateChange::BlendEquation(equation))
        } else {
            None
        }
    }

    /// Sets stencil operations for both faces or for one of them. Emits a single change if both
    /// faces end up identical, otherwise one change per differing face.
    pub fn set_stencil_op(
        &mut self,
        face: PolygonFace,
        op: StencilOp,
        changes: &mut dyn FnMut(StateChange),
    ) {
        let front = matches!(face, PolygonFace::Front | PolygonFace::FrontAndBack)
            && self.front_stencil_op != op;
        let back = matches!(face, PolygonFace::Back | PolygonFace::FrontAndBack)
            && self.back_stencil_op != op;

        match (front, back) {
            (true, true) => {
                self.front_stencil_op = op;
                self.back_stencil_op = op;
                self.frame_statistics.capability_changes += 1;
                changes(StateChange::StencilOp {
                    face: PolygonFace::FrontAndBack,
                    op,
                });
            }
            (true, false) => {
                self.front_stencil_op = op;
                self.frame_statistics.capability_changes += 1;
                changes(StateChange::StencilOp {
                    face: PolygonFace::Front,
                    op,
                });
            }
            (false, true) => {
                self.back_stencil_op = op;
                self.frame_statistics.capability_changes += 1;
                changes(StateChange::StencilOp {
                    face: PolygonFace::Back,
                    op,
                });
            }
            (false, false) => (),
        }
    }

    /// Changes only the stencil write mask of both faces, stencil actions are kept. Used before
    /// clearing stencil attachments.
    pub fn set_stencil_write_mask(&mut self, mask: u32, changes: &mut dyn FnMut(StateChange)) {
        let front = StencilOp {
            write_mask: mask,
            ..self.front_stencil_op
        };
        let back = StencilOp {
            write_mask: mask,
            ..self.back_stencil_op
        };
        if front == back {
            self.set_stencil_op(PolygonFace::FrontAndBack, front, changes);
        } else {
            self.set_stencil_op(PolygonFace::Front, front, changes);
            self.set_stencil_op(PolygonFace::Back, back, changes);
        }
    }

    /// Brings the state to the one described by the draw parameters and reports every actual
    /// change through `changes`.
    pub fn apply_draw_parameters(
        &mut self,
        draw_params: &DrawParameters,
        changes: &mut dyn FnMut(StateChange),
    ) {
        let DrawParameters {
            cull_face,
            color_write,
            depth_write,
            stencil_test,
            depth_test,
            blend,
            stencil_op,
            back_stencil_op,
            scissor_box,
        } = draw_params;

        let mut emit = |change: Option<StateChange>| {
            if let Some(change) = change {
                changes(change)
            }
        };

        if let Some(blend_params) = blend {
            emit(self.set_blend_func(blend_params.func));
            emit(self.set_blend_equation(blend_params.equation));
            emit(self.set_blend(true));
        } else {
            emit(self.set_blend(false));
        }

        if let Some(depth_func) = depth_test {
            emit(self.set_depth_func(*depth_func));
            emit(self.set_depth_test(true));
        } else {
            emit(self.set_depth_test(false));
        }
        emit(self.set_depth_write(*depth_write));

        emit(self.set_color_write(*color_write));

        if let Some(stencil_func) = stencil_test {
            emit(self.set_stencil_test(true));
            emit(self.set_stencil_func(*stencil_func));
        } else {
            emit(self.set_stencil_test(false));
        }

        match back_stencil_op {
            Some(back) => {
                self.set_stencil_op(PolygonFace::Front, *stencil_op, &mut |c| emit(Some(c)));
                self.set_stencil_op(PolygonFace::Back, *back, &mut |c| emit(Some(c)));
            }
            None => {
                self.set_stencil_op(PolygonFace::FrontAndBack, *stencil_op, &mut |c| {
                    emit(Some(c))
                });
            }
        }

        if let Some(cull_face) = cull_face {
            emit(self.set_cull_face(*cull_face));
            emit(self.set_culling(true));
        } else {
            emit(self.set_culling(false));
        }

        if let Some(scissor_box) = scissor_box {
            emit(self.set_scissor_test(true));
            emit(self.set_scissor_box(*scissor_box));
        } else {
            emit(self.set_scissor_test(false));
        }
    }

    /// Brings the state to `target`, reporting every actual change. Statistics of `self` are
    /// kept.
    pub fn transition_to(&mut self, target: &PipelineState, changes: &mut dyn FnMut(StateChange)) {
        let mut emit = |change: Option<StateChange>| {
            if let Some(change) = change {
                changes(change)
            }
        };

        emit(self.set_blend_func(target.blend_func));
        emit(self.set_blend_equation(target.blend_equation));
        emit(self.set_blend(target.blend));
        emit(self.set_depth_func(target.depth_func));
        emit(self.set_depth_test(target.depth_test));
        emit(self.set_depth_write(target.depth_write));
        emit(self.set_color_write(target.color_write));
        emit(self.set_stencil_func(target.stencil_func));
        emit(self.set_stencil_test(target.stencil_test));
        self.set_stencil_op(PolygonFace::Front, target.front_stencil_op, &mut |c| {
            emit(Some(c))
        });
        self.set_stencil_op(PolygonFace::Back, target.back_stencil_op, &mut |c| {
            emit(Some(c))
        });
        emit(self.set_cull_face(target.cull_face));
        emit(self.set_culling(target.culling));
        emit(self.set_scissor_box(target.scissor_box));
        emit(self.set_scissor_test(target.scissor_test));
        emit(self.set_viewport(target.viewport));
    }

    /// Checks whether both states describe the same context configuration, statistics are
    /// ignored.
    pub fn same_configuration(&self, other: &PipelineState) -> bool {
        let mut a = self.clone();
        a.frame_statistics = other.frame_statistics;
        &a == other
    }

    pub fn blend(&self) -> bool {
        self.blend
    }

    pub fn depth_test(&self) -> bool {
        self.depth_test
    }

    pub fn depth_func(&self) -> CompareFunc {
        self.depth_func
    }

    pub fn depth_write(&self) -> bool {
        self.depth_write
    }

    pub fn stencil_test(&self) -> bool {
        self.stencil_test
    }

    pub fn stencil_func(&self) -> StencilFunc {
        self.stencil_func
    }

    pub fn front_stencil_op(&self) -> StencilOp {
        self.front_stencil_op
    }

    pub fn back_stencil_op(&self) -> StencilOp {
        self.back_stencil_op
    }

    pub fn blend_func(&self) -> BlendFunc {
        self.blend_func
    }

    pub fn color_write(&self) -> ColorMask {
        self.color_write
    }

    pub fn culling(&self) -> bool {
        self.culling
    }

    pub fn cull_face(&self) -> CullFace {
        self.cull_face
    }

    pub fn viewport(&self) -> Rect<i32> {
        self.viewport
    }

    pub fn statistics(&self) -> PipelineStatistics {
        self.frame_statistics
    }

    pub fn statistics_mut(&mut self) -> &mut PipelineStatistics {
        &mut self.frame_statistics
    }
}

/// Captures the pipeline state on creation and restores it when dropped, on every exit path.
///
/// ```ignore
/// {
///     let _guard = StateGuard::new(server);
///     // Any amount of draws with arbitrary parameters.
/// }
/// // Culling, depth function, blending and the rest are back to what they were.
/// ```
pub struct StateGuard<'a> {
    server: &'a dyn GraphicsServer,
    saved: PipelineState,
}

impl<'a> StateGuard<'a> {
    pub fn new(server: &'a dyn GraphicsServer) -> Self {
        Self {
            server,
            saved: server.capture_state(),
        }
    }
}

impl Drop for StateGuard<'_> {
    fn drop(&mut self) {
        self.server.restore_state(&self.saved);
    }
}

#[cfg(test)]
mod test {
    use super::{PipelineState, StateChange};
    use crate::{
        BlendParameters, CompareFunc, CullFace, DrawParameters, PolygonFace, StencilAction,
        StencilOp,
    };

    fn collect(state: &mut PipelineState, params: &DrawParameters) -> Vec<StateChange> {
        let mut changes = Vec::new();
        state.apply_draw_parameters(params, &mut |c| changes.push(c));
        changes
    }

    #[test]
    fn test_redundant_changes_are_skipped() {
        let mut state = PipelineState::default();
        let params = DrawParameters::default();
        assert!(!collect(&mut state, &params).is_empty());
        let stats = state.statistics();
        assert!(collect(&mut state, &params).is_empty());
        assert_eq!(state.statistics(), stats);
    }

    #[test]
    fn test_separate_stencil_ops() {
        let mut state = PipelineState::default();
        let params = DrawParameters {
            stencil_op: StencilOp {
                zfail: StencilAction::Decr,
                ..Default::default()
            },
            back_stencil_op: Some(StencilOp {
                zfail: StencilAction::Incr,
                ..Default::default()
            }),
            ..Default::default()
        };
        let changes = collect(&mut state, &params);
        assert!(changes.contains(&StateChange::StencilOp {
            face: PolygonFace::Front,
            op: params.stencil_op
        }));
        assert!(changes.contains(&StateChange::StencilOp {
            face: PolygonFace::Back,
            op: params.back_stencil_op.unwrap()
        }));
    }

    #[test]
    fn test_transition_restores_configuration() {
        let mut state = PipelineState::default();
        collect(&mut state, &DrawParameters::default());
        let saved = state.clone();

        collect(
            &mut state,
            &DrawParameters {
                cull_face: Some(CullFace::Front),
                depth_write: false,
                depth_test: Some(CompareFunc::GreaterOrEqual),
                blend: Some(BlendParameters::additive()),
                ..Default::default()
            },
        );
        assert_eq!(state.cull_face(), CullFace::Front);
        assert!(state.blend());

        let mut changes = Vec::new();
        state.transition_to(&saved, &mut |c| changes.push(c));
        assert!(changes.contains(&StateChange::CullFace(CullFace::Back)));
        assert!(changes.contains(&StateChange::DepthFunc(CompareFunc::Less)));
        assert!(changes.contains(&StateChange::Blend(false)));
        assert!(state.same_configuration(&saved));
    }
}
