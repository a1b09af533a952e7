//! Shader context.
//!
//! Owns a linked program, its binding table and the seqno-to-location
//! handle table, and drives the dependency-filtered uniform updates. The
//! context is a state machine; once it turns [`ContextState::Invalid`] it
//! stays that way and every update call short-circuits.

use glam::DMat4;

use crate::binding::BindingTable;
use crate::classify;
use crate::device::{Device, ProgramHandle, StageHandle};
use crate::error::BindError;
use crate::provider::RenderStateProvider;
use crate::reflect::ProgramReflection;
use crate::types::{
    to_param_array, ComposeFn, MatrixPiece, MatrixSource, PtrData, ShaderStage, StateChange,
};

/// Source text for one stage of a program.
#[derive(Debug, Clone)]
pub struct StageSource {
    pub stage: ShaderStage,
    pub source: String,
}

impl StageSource {
    pub fn new(stage: ShaderStage, source: &str) -> Self {
        Self {
            stage,
            source: source.to_string(),
        }
    }
}

/// Lifecycle of a shader context. A context only exists once [`build`]
/// has created its program object, so construction starts at `Compiling`.
///
/// [`build`]: ShaderContext::build
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextState {
    /// Stages are being compiled and attached.
    Compiling,
    /// The program linked and the binding table is built.
    Linked,
    /// The program is the active one on the device.
    Bound,
    /// The program was active and has been deactivated.
    Unbound,
    /// A fatal update error occurred. Terminal.
    Invalid,
}

/// A linked program together with everything needed to feed it.
#[derive(Debug)]
pub struct ShaderContext {
    state: ContextState,
    program: Option<ProgramHandle>,
    stages: Vec<StageHandle>,
    pub(crate) table: BindingTable,
    pub(crate) locations: Vec<i32>,
    /// Units below this were claimed by render-state stages during the last
    /// texture bind; named samplers are packed above it.
    pub(crate) stage_offset: u32,
}

impl ShaderContext {
    /// Compile, link and classify a program.
    ///
    /// On any compile or link failure every device object created so far is
    /// deleted before the error is returned.
    pub fn build(
        device: &dyn Device,
        sources: &[StageSource],
        reflection: &dyn ProgramReflection,
    ) -> Result<Self, BindError> {
        let program = device.create_program()?;
        let mut ctx = Self {
            state: ContextState::Compiling,
            program: Some(program),
            stages: Vec::with_capacity(sources.len()),
            table: BindingTable::default(),
            locations: Vec::new(),
            stage_offset: 0,
        };

        for source in sources {
            match device.compile_stage(source.stage, &source.source) {
                Ok(handle) => ctx.stages.push(handle),
                Err(err) => {
                    log::error!("{err}");
                    ctx.release_resources(device);
                    return Err(err);
                }
            }
        }

        for stage in &ctx.stages {
            device.attach_stage(program, *stage);
        }
        if let Err(err) = device.link_program(program) {
            log::error!("{err}");
            ctx.release_resources(device);
            return Err(err);
        }

        let classified = classify::build_table(reflection);
        ctx.table = classified.table;
        ctx.locations = classified.locations;
        ctx.state = ContextState::Linked;
        Ok(ctx)
    }

    pub fn state(&self) -> ContextState {
        self.state
    }

    /// Whether the context can still service bind and update calls.
    pub fn is_valid(&self) -> bool {
        self.state != ContextState::Invalid
    }

    pub fn table(&self) -> &BindingTable {
        &self.table
    }

    /// Whether the standard fixed-function vertex arrays must accompany this
    /// program's own streams.
    pub fn uses_fixed_function_arrays(&self) -> bool {
        self.table.uses_fixed_function_arrays
    }

    pub(crate) fn location(&self, seqno: u32) -> i32 {
        self.locations[seqno as usize]
    }

    /// Activate the program and issue the initial round of uniforms.
    ///
    /// With `reissue` every parameter is written regardless of what changed;
    /// otherwise only the bind-time categories are.
    pub fn bind(
        &mut self,
        device: &dyn Device,
        state: &dyn RenderStateProvider,
        reissue: bool,
    ) -> Result<(), BindError> {
        match self.state {
            ContextState::Invalid => return Err(BindError::ContextInvalid),
            ContextState::Compiling => return Err(BindError::NotLinked),
            ContextState::Linked | ContextState::Bound | ContextState::Unbound => {}
        }
        let program = self.program.ok_or(BindError::NotLinked)?;
        device.use_program(program);
        self.state = ContextState::Bound;
        let changed = if reissue {
            StateChange::all()
        } else {
            StateChange::GENERAL
        };
        self.issue_parameters(device, state, changed)
    }

    /// Deactivate the program. Safe to call in any state.
    pub fn unbind(&mut self, device: &dyn Device) {
        if self.state == ContextState::Bound {
            device.clear_program();
            self.state = ContextState::Unbound;
        }
    }

    /// Write every uniform whose dependency mask intersects `changed`.
    ///
    /// The program must be active: uniform writes without it are undefined
    /// at the driver level, so anything but the `Bound` state is rejected.
    /// Pointer-array parameters have a hard contract: a missing or short
    /// input buffer invalidates the context and releases its device objects.
    /// Matrix and vector inputs that cannot be resolved are skipped for the
    /// frame instead.
    pub fn issue_parameters(
        &mut self,
        device: &dyn Device,
        state: &dyn RenderStateProvider,
        changed: StateChange,
    ) -> Result<(), BindError> {
        match self.state {
            ContextState::Invalid => return Err(BindError::ContextInvalid),
            ContextState::Bound => {}
            _ => return Err(BindError::NotBound),
        }
        if changed.is_empty() {
            return Ok(());
        }

        let mut failure = None;
        for spec in &self.table.pointers {
            if !spec.deps.intersects(changed) {
                continue;
            }
            let Some(data) = state.named_buffer(&spec.input) else {
                failure = Some(BindError::MissingInput {
                    name: spec.input.clone(),
                });
                break;
            };
            let required = spec.required_len();
            if data.len() < required {
                failure = Some(BindError::InputSizeMismatch {
                    name: spec.input.clone(),
                    expected: required,
                    actual: data.len(),
                });
                break;
            }
            let location = self.location(spec.seqno);
            match data {
                PtrData::Float32(values) => {
                    device.uniform_float_array(location, spec.cardinality, &values[..required]);
                }
                PtrData::Float64(values) => {
                    device.uniform_double_array(location, spec.cardinality, &values[..required]);
                }
            }
        }
        if let Some(err) = failure {
            log::error!("{err}");
            self.state = ContextState::Invalid;
            self.release_resources(device);
            return Err(err);
        }

        for spec in &self.table.matrices {
            if !spec.total_deps().intersects(changed) {
                continue;
            }
            let Some(first) = fetch_source(state, &spec.sources[0]) else {
                log::debug!("matrix operand unresolved, skipping parameter {}", spec.seqno);
                continue;
            };
            let combined = match spec.func {
                ComposeFn::First => first,
                ComposeFn::Compose => {
                    let Some(second) = fetch_source(state, &spec.sources[1]) else {
                        log::debug!(
                            "matrix operand unresolved, skipping parameter {}",
                            spec.seqno
                        );
                        continue;
                    };
                    // sources[0] applies first.
                    second * first
                }
            };
            let data = to_param_array(&combined);
            upload_piece(device, self.location(spec.seqno), spec.piece, &data);
        }

        for spec in &self.table.vectors {
            if !spec.deps.intersects(changed) {
                continue;
            }
            let Some(value) = state.named_vector(&spec.input) else {
                log::debug!("input '{}' unresolved, skipping", spec.input);
                continue;
            };
            let floats = value.as_vec4().to_array();
            device.uniform_floats(
                self.location(spec.seqno),
                &floats[..spec.cardinality as usize],
            );
        }

        Ok(())
    }

    /// Mark the context unusable. Every later update call returns
    /// [`BindError::ContextInvalid`].
    pub fn invalidate(&mut self) {
        self.state = ContextState::Invalid;
    }

    /// Delete the program and stage objects. Idempotent; the context state
    /// is preserved so an invalid context stays invalid.
    pub fn release_resources(&mut self, device: &dyn Device) {
        if let Some(program) = self.program.take() {
            for stage in &self.stages {
                device.detach_stage(program, *stage);
            }
            device.delete_program(program);
        }
        for stage in self.stages.drain(..) {
            device.delete_stage(stage);
        }
    }
}

// Contexts appear in Result payloads and error logs.
static_assertions::assert_impl_all!(ShaderContext: std::fmt::Debug);

fn fetch_source(state: &dyn RenderStateProvider, source: &MatrixSource) -> Option<DMat4> {
    match source {
        MatrixSource::Identity => Some(DMat4::IDENTITY),
        MatrixSource::Transform { from, to } => state.transform(from, to),
        MatrixSource::NamedMatrix(name) => state.named_matrix(name),
    }
}

/// Write the narrowest upload the piece allows. Rows of the parameter array
/// are contiguous; columns are gathered with stride four.
fn upload_piece(device: &dyn Device, location: i32, piece: MatrixPiece, data: &[f32; 16]) {
    match piece {
        MatrixPiece::Whole => device.uniform_matrix(location, false, data),
        MatrixPiece::Transpose => device.uniform_matrix(location, true, data),
        MatrixPiece::Row0 => device.uniform_floats(location, &data[0..4]),
        MatrixPiece::Row1 => device.uniform_floats(location, &data[4..8]),
        MatrixPiece::Row2 => device.uniform_floats(location, &data[8..12]),
        MatrixPiece::Row3 => device.uniform_floats(location, &data[12..16]),
        MatrixPiece::Col0 | MatrixPiece::Col1 | MatrixPiece::Col2 | MatrixPiece::Col3 => {
            let c = match piece {
                MatrixPiece::Col0 => 0,
                MatrixPiece::Col1 => 1,
                MatrixPiece::Col2 => 2,
                _ => 3,
            };
            let column = [data[c], data[c + 4], data[c + 8], data[c + 12]];
            device.uniform_floats(location, &column);
        }
        MatrixPiece::Row3x1 => device.uniform_floats(location, &data[12..13]),
        MatrixPiece::Row3x2 => device.uniform_floats(location, &data[12..14]),
        MatrixPiece::Row3x3 => device.uniform_floats(location, &data[12..15]),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::{DeviceCall, RecordingDevice};
    use crate::provider::StaticState;
    use crate::reflect::StaticReflection;
    use crate::types::{ParamType, Space};
    use glam::DVec4;

    fn vertex_only(source: &str) -> Vec<StageSource> {
        vec![StageSource::new(ShaderStage::Vertex, source)]
    }

    fn translation(x: f64, y: f64, z: f64) -> DMat4 {
        DMat4::from_translation(glam::DVec3::new(x, y, z))
    }

    #[test]
    fn test_build_happy_path() {
        let device = RecordingDevice::new();
        let refl = StaticReflection::new().with_uniform("tint", ParamType::Vec4, 1);
        let ctx = ShaderContext::build(&device, &vertex_only("void main() {}"), &refl).unwrap();
        assert_eq!(ctx.state(), ContextState::Linked);
        assert_eq!(ctx.table().vectors.len(), 1);
    }

    #[test]
    fn test_compile_failure_cleans_up() {
        let device = RecordingDevice::new();
        device.fail_compile(ShaderStage::Vertex, "bad token");
        let refl = StaticReflection::new();
        let err = ShaderContext::build(&device, &vertex_only("broken"), &refl).unwrap_err();
        assert!(matches!(err, BindError::StageCompile { .. }));
        let calls = device.take_calls();
        assert!(calls.iter().any(|c| matches!(c, DeviceCall::DeleteProgram(_))));
    }

    #[test]
    fn test_link_failure_cleans_up() {
        let device = RecordingDevice::new();
        device.fail_link("unresolved symbol");
        let refl = StaticReflection::new();
        let err = ShaderContext::build(&device, &vertex_only("void main() {}"), &refl).unwrap_err();
        assert!(matches!(err, BindError::Link { .. }));
        let calls = device.take_calls();
        assert!(calls.iter().any(|c| matches!(c, DeviceCall::DeleteStage(_))));
        assert!(calls.iter().any(|c| matches!(c, DeviceCall::DeleteProgram(_))));
    }

    #[test]
    fn test_bind_issues_general_parameters() {
        let device = RecordingDevice::new();
        let refl = StaticReflection::new().with_uniform("trans_model_to_view", ParamType::Mat4, 1);
        let mut ctx = ShaderContext::build(&device, &vertex_only("void main() {}"), &refl).unwrap();

        let state =
            StaticState::new().with_transform(Space::Model, Space::View, translation(1.0, 2.0, 3.0));
        device.take_calls();
        ctx.bind(&device, &state, false).unwrap();
        assert_eq!(ctx.state(), ContextState::Bound);

        let calls = device.take_calls();
        assert!(matches!(calls[0], DeviceCall::UseProgram(_)));
        let uploads: Vec<_> = calls
            .iter()
            .filter(|c| matches!(c, DeviceCall::UniformMatrix(..)))
            .collect();
        assert_eq!(uploads.len(), 1);
    }

    #[test]
    fn test_dependency_filtering() {
        let device = RecordingDevice::new();
        let refl = StaticReflection::new()
            .with_uniform("trans_model_to_view", ParamType::Mat4, 1)
            .with_uniform("tint", ParamType::Vec4, 1);
        let mut ctx = ShaderContext::build(&device, &vertex_only("void main() {}"), &refl).unwrap();
        let state = StaticState::new()
            .with_transform(Space::Model, Space::View, translation(1.0, 0.0, 0.0))
            .with_vector("tint", DVec4::ONE);
        ctx.bind(&device, &state, true).unwrap();
        device.take_calls();

        // Only the transform depends on TRANSFORM.
        ctx.issue_parameters(&device, &state, StateChange::TRANSFORM)
            .unwrap();
        let calls = device.take_calls();
        assert_eq!(calls.len(), 1);
        assert!(matches!(calls[0], DeviceCall::UniformMatrix(..)));

        // Only the named input depends on SHADER_INPUTS.
        ctx.issue_parameters(&device, &state, StateChange::SHADER_INPUTS)
            .unwrap();
        let calls = device.take_calls();
        assert_eq!(calls.len(), 1);
        assert!(matches!(calls[0], DeviceCall::UniformFloats(..)));

        // An empty change set writes nothing.
        ctx.issue_parameters(&device, &state, StateChange::empty())
            .unwrap();
        assert!(device.take_calls().is_empty());
    }

    #[test]
    fn test_matrix_upload_layout() {
        let device = RecordingDevice::new();
        let refl = StaticReflection::new().with_uniform("trans_model_to_view", ParamType::Mat4, 1);
        let mut ctx = ShaderContext::build(&device, &vertex_only("void main() {}"), &refl).unwrap();
        let state =
            StaticState::new().with_transform(Space::Model, Space::View, translation(5.0, 6.0, 7.0));
        ctx.bind(&device, &state, false).unwrap();
        let upload = device
            .take_calls()
            .into_iter()
            .find_map(|c| match c {
                DeviceCall::UniformMatrix(_, transpose, data) => Some((transpose, data)),
                _ => None,
            })
            .unwrap();
        assert!(!upload.0);
        // The parameter array carries the translation in row 3.
        assert_eq!(&upload.1[..4], &[1.0, 0.0, 0.0, 0.0]);
        assert_eq!(&upload.1[12..16], &[5.0, 6.0, 7.0, 1.0]);
    }

    #[test]
    fn test_position_shorthand_extracts_translation() {
        let device = RecordingDevice::new();
        let refl = StaticReflection::new().with_uniform("wspos_light", ParamType::Vec4, 1);
        let mut ctx = ShaderContext::build(&device, &vertex_only("void main() {}"), &refl).unwrap();
        let state = StaticState::new().with_transform(
            Space::Node("light".to_string()),
            Space::World,
            translation(2.0, 4.0, 8.0),
        );
        ctx.bind(&device, &state, true).unwrap();
        let floats = device
            .take_calls()
            .into_iter()
            .find_map(|c| match c {
                DeviceCall::UniformFloats(_, v) => Some(v),
                _ => None,
            })
            .unwrap();
        // wspos compiles to row 3, which is the node's world-space position.
        assert_eq!(floats, vec![2.0, 4.0, 8.0, 1.0]);
    }

    #[test]
    fn test_missing_matrix_input_skips_frame() {
        let device = RecordingDevice::new();
        let refl = StaticReflection::new().with_uniform("trans_model_to_clip", ParamType::Mat4, 1);
        let mut ctx = ShaderContext::build(&device, &vertex_only("void main() {}"), &refl).unwrap();
        let state = StaticState::new();
        ctx.bind(&device, &state, true).unwrap();
        assert_eq!(ctx.state(), ContextState::Bound);
        let uploads = device
            .take_calls()
            .into_iter()
            .filter(|c| matches!(c, DeviceCall::UniformMatrix(..)))
            .count();
        assert_eq!(uploads, 0);
    }

    #[test]
    fn test_missing_pointer_input_invalidates() {
        let device = RecordingDevice::new();
        let refl = StaticReflection::new().with_uniform("weights", ParamType::Float, 8);
        let mut ctx = ShaderContext::build(&device, &vertex_only("void main() {}"), &refl).unwrap();
        let state = StaticState::new();
        let err = ctx.bind(&device, &state, true).unwrap_err();
        assert!(matches!(err, BindError::MissingInput { .. }));
        assert_eq!(ctx.state(), ContextState::Invalid);
        assert!(device
            .take_calls()
            .iter()
            .any(|c| matches!(c, DeviceCall::DeleteProgram(_))));

        // Everything after invalidation short-circuits.
        assert!(matches!(
            ctx.bind(&device, &state, false),
            Err(BindError::ContextInvalid)
        ));
    }

    #[test]
    fn test_short_pointer_buffer_invalidates() {
        let device = RecordingDevice::new();
        let refl = StaticReflection::new().with_uniform("weights", ParamType::Vec2, 4);
        let mut ctx = ShaderContext::build(&device, &vertex_only("void main() {}"), &refl).unwrap();
        let state =
            StaticState::new().with_buffer("weights", PtrData::Float32(vec![1.0, 2.0, 3.0]));
        let err = ctx.bind(&device, &state, true).unwrap_err();
        match err {
            BindError::InputSizeMismatch {
                expected, actual, ..
            } => {
                assert_eq!(expected, 8);
                assert_eq!(actual, 3);
            }
            other => panic!("unexpected error {other:?}"),
        }
        assert_eq!(ctx.state(), ContextState::Invalid);
    }

    #[test]
    fn test_oversized_pointer_buffer_is_truncated() {
        let device = RecordingDevice::new();
        let refl = StaticReflection::new().with_uniform("weights", ParamType::Float, 2);
        let mut ctx = ShaderContext::build(&device, &vertex_only("void main() {}"), &refl).unwrap();
        let state = StaticState::new()
            .with_buffer("weights", PtrData::Float32(vec![1.0, 2.0, 3.0, 4.0]));
        ctx.bind(&device, &state, true).unwrap();
        let upload = device
            .take_calls()
            .into_iter()
            .find_map(|c| match c {
                DeviceCall::UniformFloatArray(_, card, v) => Some((card, v)),
                _ => None,
            })
            .unwrap();
        assert_eq!(upload.0, 1);
        assert_eq!(upload.1, vec![1.0, 2.0]);
    }

    #[test]
    fn test_double_precision_buffer_uses_double_path() {
        let device = RecordingDevice::new();
        let refl = StaticReflection::new().with_uniform("samples", ParamType::Vec4, 2);
        let mut ctx = ShaderContext::build(&device, &vertex_only("void main() {}"), &refl).unwrap();
        let state = StaticState::new()
            .with_buffer("samples", PtrData::Float64(vec![0.5; 8]));
        ctx.bind(&device, &state, true).unwrap();
        assert!(device
            .take_calls()
            .iter()
            .any(|c| matches!(c, DeviceCall::UniformDoubleArray(_, 4, _))));
    }

    #[test]
    fn test_issue_requires_active_program() {
        let device = RecordingDevice::new();
        let refl = StaticReflection::new().with_uniform("tint", ParamType::Vec4, 1);
        let mut ctx = ShaderContext::build(&device, &vertex_only("void main() {}"), &refl).unwrap();
        let state = StaticState::new().with_vector("tint", DVec4::ONE);
        device.take_calls();

        // Linked but never bound: no program is active on the device.
        assert!(matches!(
            ctx.issue_parameters(&device, &state, StateChange::all()),
            Err(BindError::NotBound)
        ));
        assert!(device.take_calls().is_empty());

        ctx.bind(&device, &state, true).unwrap();
        ctx.unbind(&device);
        device.take_calls();
        assert!(matches!(
            ctx.issue_parameters(&device, &state, StateChange::all()),
            Err(BindError::NotBound)
        ));
        assert!(device.take_calls().is_empty());
    }

    #[test]
    fn test_unbind_is_idempotent() {
        let device = RecordingDevice::new();
        let refl = StaticReflection::new();
        let mut ctx = ShaderContext::build(&device, &vertex_only("void main() {}"), &refl).unwrap();
        let state = StaticState::new();
        ctx.bind(&device, &state, false).unwrap();
        device.take_calls();
        ctx.unbind(&device);
        ctx.unbind(&device);
        assert_eq!(
            device.take_calls(),
            vec![DeviceCall::ClearProgram]
        );
        assert_eq!(ctx.state(), ContextState::Unbound);
    }

    #[test]
    fn test_release_is_idempotent() {
        let device = RecordingDevice::new();
        let refl = StaticReflection::new();
        let mut ctx = ShaderContext::build(&device, &vertex_only("void main() {}"), &refl).unwrap();
        ctx.release_resources(&device);
        let first = device.take_calls();
        assert!(first.iter().any(|c| matches!(c, DeviceCall::DeleteProgram(_))));
        ctx.release_resources(&device);
        assert!(device.take_calls().is_empty());
    }

    #[test]
    fn test_scale_transform_upload() {
        let device = RecordingDevice::new();
        let refl =
            StaticReflection::new().with_uniform("trans_model_to_clip", ParamType::Mat4, 1);
        let mut ctx = ShaderContext::build(&device, &vertex_only("void main() {}"), &refl).unwrap();
        let scale = DMat4::from_scale(glam::DVec3::splat(2.0));
        let state = StaticState::new().with_transform(Space::Model, Space::Clip, scale);
        ctx.bind(&device, &state, true).unwrap();
        let upload = device
            .take_calls()
            .into_iter()
            .find_map(|c| match c {
                DeviceCall::UniformMatrix(_, _, data) => Some(data),
                _ => None,
            })
            .unwrap();
        assert_eq!(upload[0], 2.0);
        assert_eq!(upload[5], 2.0);
        assert_eq!(upload[10], 2.0);
        assert_eq!(upload[15], 1.0);
    }
}
