//! Graphics device abstraction.
//!
//! The engine never talks to a driver directly. Everything it does to a
//! program object or the numeric pipeline goes through [`Device`], so a real
//! backend and the [`RecordingDevice`] test double are interchangeable.

use std::cell::RefCell;

use crate::error::BindError;
use crate::types::{ShaderStage, TextureRef, VertexColumn};

/// Opaque handle to a compiled shader stage object.
pub type StageHandle = u64;

/// Opaque handle to a linked program object.
pub type ProgramHandle = u64;

/// Driver-facing operations the binding engine needs.
///
/// Uniform writes take the native location, not the sequence number; the
/// context owns the seqno-to-location table.
pub trait Device {
    fn create_program(&self) -> Result<ProgramHandle, BindError>;
    fn compile_stage(&self, stage: ShaderStage, source: &str) -> Result<StageHandle, BindError>;
    fn attach_stage(&self, program: ProgramHandle, stage: StageHandle);
    fn detach_stage(&self, program: ProgramHandle, stage: StageHandle);
    fn link_program(&self, program: ProgramHandle) -> Result<(), BindError>;
    fn delete_stage(&self, stage: StageHandle);
    fn delete_program(&self, program: ProgramHandle);

    fn use_program(&self, program: ProgramHandle);
    fn clear_program(&self);

    /// Write 1 to 4 float components to a uniform.
    fn uniform_floats(&self, location: i32, values: &[f32]);
    /// Write an array uniform of `cardinality`-component float elements.
    fn uniform_float_array(&self, location: i32, cardinality: u8, values: &[f32]);
    /// Same, for double-precision inputs.
    fn uniform_double_array(&self, location: i32, cardinality: u8, values: &[f64]);
    /// Write a full 4x4 matrix from its flattened parameter array.
    fn uniform_matrix(&self, location: i32, transpose: bool, values: &[f32; 16]);
    /// Write a single integer, used for sampler unit assignments.
    fn uniform_int(&self, location: i32, value: i32);

    fn enable_attribute(&self, location: i32, column: &VertexColumn);
    fn disable_attribute(&self, location: i32);
    fn bind_texture(&self, unit: u32, texture: &TextureRef);
    fn unbind_texture_unit(&self, unit: u32);
}

/// One observable device call, as logged by [`RecordingDevice`].
#[derive(Debug, Clone, PartialEq)]
pub enum DeviceCall {
    CreateProgram(ProgramHandle),
    CompileStage(ShaderStage, StageHandle),
    AttachStage(ProgramHandle, StageHandle),
    DetachStage(ProgramHandle, StageHandle),
    LinkProgram(ProgramHandle),
    DeleteStage(StageHandle),
    DeleteProgram(ProgramHandle),
    UseProgram(ProgramHandle),
    ClearProgram,
    UniformFloats(i32, Vec<f32>),
    UniformFloatArray(i32, u8, Vec<f32>),
    UniformDoubleArray(i32, u8, Vec<f64>),
    UniformMatrix(i32, bool, [f32; 16]),
    UniformInt(i32, i32),
    EnableAttribute(i32, String),
    DisableAttribute(i32),
    BindTexture(u32, TextureRef),
    UnbindTextureUnit(u32),
}

/// Test double that records every call and can be told to fail program
/// construction steps.
#[derive(Debug, Default)]
pub struct RecordingDevice {
    calls: RefCell<Vec<DeviceCall>>,
    next_handle: RefCell<u64>,
    fail_compile: RefCell<Option<(ShaderStage, String)>>,
    fail_link: RefCell<Option<String>>,
}

impl RecordingDevice {
    pub fn new() -> Self {
        Self {
            next_handle: RefCell::new(1),
            ..Self::default()
        }
    }

    /// Make the next compilation of `stage` fail with the given info log.
    pub fn fail_compile(&self, stage: ShaderStage, info_log: &str) {
        *self.fail_compile.borrow_mut() = Some((stage, info_log.to_string()));
    }

    /// Make the next link fail with the given info log.
    pub fn fail_link(&self, info_log: &str) {
        *self.fail_link.borrow_mut() = Some(info_log.to_string());
    }

    /// Drain the call log.
    pub fn take_calls(&self) -> Vec<DeviceCall> {
        std::mem::take(&mut self.calls.borrow_mut())
    }

    /// Snapshot the call log without draining it.
    pub fn calls(&self) -> Vec<DeviceCall> {
        self.calls.borrow().clone()
    }

    fn record(&self, call: DeviceCall) {
        self.calls.borrow_mut().push(call);
    }

    fn alloc_handle(&self) -> u64 {
        let mut next = self.next_handle.borrow_mut();
        let handle = *next;
        *next += 1;
        handle
    }
}

impl Device for RecordingDevice {
    fn create_program(&self) -> Result<ProgramHandle, BindError> {
        let handle = self.alloc_handle();
        self.record(DeviceCall::CreateProgram(handle));
        Ok(handle)
    }

    fn compile_stage(&self, stage: ShaderStage, _source: &str) -> Result<StageHandle, BindError> {
        let failing = {
            let mut slot = self.fail_compile.borrow_mut();
            match &*slot {
                Some((failing_stage, _)) if *failing_stage == stage => slot.take(),
                _ => None,
            }
        };
        if let Some((_, info_log)) = failing {
            return Err(BindError::StageCompile {
                stage,
                log: info_log,
            });
        }
        let handle = self.alloc_handle();
        self.record(DeviceCall::CompileStage(stage, handle));
        Ok(handle)
    }

    fn attach_stage(&self, program: ProgramHandle, stage: StageHandle) {
        self.record(DeviceCall::AttachStage(program, stage));
    }

    fn detach_stage(&self, program: ProgramHandle, stage: StageHandle) {
        self.record(DeviceCall::DetachStage(program, stage));
    }

    fn link_program(&self, program: ProgramHandle) -> Result<(), BindError> {
        if let Some(info_log) = self.fail_link.borrow_mut().take() {
            return Err(BindError::Link { log: info_log });
        }
        self.record(DeviceCall::LinkProgram(program));
        Ok(())
    }

    fn delete_stage(&self, stage: StageHandle) {
        self.record(DeviceCall::DeleteStage(stage));
    }

    fn delete_program(&self, program: ProgramHandle) {
        self.record(DeviceCall::DeleteProgram(program));
    }

    fn use_program(&self, program: ProgramHandle) {
        self.record(DeviceCall::UseProgram(program));
    }

    fn clear_program(&self) {
        self.record(DeviceCall::ClearProgram);
    }

    fn uniform_floats(&self, location: i32, values: &[f32]) {
        self.record(DeviceCall::UniformFloats(location, values.to_vec()));
    }

    fn uniform_float_array(&self, location: i32, cardinality: u8, values: &[f32]) {
        self.record(DeviceCall::UniformFloatArray(
            location,
            cardinality,
            values.to_vec(),
        ));
    }

    fn uniform_double_array(&self, location: i32, cardinality: u8, values: &[f64]) {
        self.record(DeviceCall::UniformDoubleArray(
            location,
            cardinality,
            values.to_vec(),
        ));
    }

    fn uniform_matrix(&self, location: i32, transpose: bool, values: &[f32; 16]) {
        self.record(DeviceCall::UniformMatrix(location, transpose, *values));
    }

    fn uniform_int(&self, location: i32, value: i32) {
        self.record(DeviceCall::UniformInt(location, value));
    }

    fn enable_attribute(&self, location: i32, column: &VertexColumn) {
        // Log the column shape rather than the raw bytes.
        self.record(DeviceCall::EnableAttribute(
            location,
            format!(
                "{}x{:?}+{}:{}",
                column.num_components, column.numeric, column.start, column.stride
            ),
        ));
    }

    fn disable_attribute(&self, location: i32) {
        self.record(DeviceCall::DisableAttribute(location));
    }

    fn bind_texture(&self, unit: u32, texture: &TextureRef) {
        self.record(DeviceCall::BindTexture(unit, *texture));
    }

    fn unbind_texture_unit(&self, unit: u32) {
        self.record(DeviceCall::UnbindTextureUnit(unit));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_handles_are_unique() {
        let device = RecordingDevice::new();
        let p = device.create_program().unwrap();
        let s = device.compile_stage(ShaderStage::Vertex, "void main() {}").unwrap();
        assert_ne!(p, s);
    }

    #[test]
    fn test_injected_compile_failure_is_one_shot() {
        let device = RecordingDevice::new();
        device.fail_compile(ShaderStage::Fragment, "syntax error");
        let err = device
            .compile_stage(ShaderStage::Fragment, "broken")
            .unwrap_err();
        assert!(matches!(err, BindError::StageCompile { .. }));
        assert!(device
            .compile_stage(ShaderStage::Fragment, "fixed")
            .is_ok());
    }

    #[test]
    fn test_call_log_order() {
        let device = RecordingDevice::new();
        device.uniform_int(3, 1);
        device.uniform_floats(5, &[1.0, 2.0]);
        assert_eq!(
            device.take_calls(),
            vec![
                DeviceCall::UniformInt(3, 1),
                DeviceCall::UniformFloats(5, vec![1.0, 2.0]),
            ]
        );
        assert!(device.take_calls().is_empty());
    }
}
