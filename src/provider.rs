//! State providers.
//!
//! The update engine pulls everything it needs through these traits, so the
//! same binding table works against a live scene graph or the in-memory
//! [`StaticState`] used in tests and tooling.

use std::collections::HashMap;

use glam::{DMat4, DVec4};

use crate::types::{PtrData, Space, TextureRef, VertexColumn};

/// Source of transforms and named numeric inputs for uniform updates.
pub trait RenderStateProvider {
    /// The matrix mapping `from` coordinates into `to` coordinates.
    /// `None` means the transform cannot be resolved this frame.
    fn transform(&self, from: &Space, to: &Space) -> Option<DMat4>;

    /// A whole 4x4 matrix supplied directly as a named input.
    fn named_matrix(&self, name: &str) -> Option<DMat4>;

    /// A scalar or vector input, padded to four components.
    fn named_vector(&self, name: &str) -> Option<DVec4>;

    /// A numeric array input for pointer-array parameters.
    fn named_buffer(&self, name: &str) -> Option<&PtrData>;
}

/// Source of texture state for sampler updates.
pub trait TextureStateProvider {
    /// Number of texture stages the fixed-function side of the frame is
    /// already using. Named samplers are packed after these.
    fn active_stage_count(&self) -> u32;

    /// The texture bound to a render-state stage.
    fn texture_at_stage(&self, stage: u32) -> Option<TextureRef>;

    /// A texture supplied directly as a named input.
    fn named_texture(&self, name: &str) -> Option<TextureRef>;

    /// A texture derived from another by a suffix convention, such as a
    /// matching shadow map. `None` when no such relation exists.
    fn related_texture(&self, base: &TextureRef, suffix: &str) -> Option<TextureRef>;

    /// The texcoord column name a render-state stage reads from.
    fn texcoord_column(&self, stage: u32) -> Option<String>;
}

/// Source of vertex data for attribute binding.
pub trait GeometryProvider {
    /// Look up a vertex column by name.
    fn column(&self, name: &str) -> Option<&VertexColumn>;

    /// Make sure the column's backing store is resident. Returning `false`
    /// aborts stream binding for this draw without erroring.
    fn prepare_column(&self, _column: &VertexColumn, _force: bool) -> bool {
        true
    }
}

/// In-memory provider over plain hash maps. Implements all three provider
/// traits, which keeps single-provider call sites simple in tests.
#[derive(Debug, Default)]
pub struct StaticState {
    transforms: HashMap<(Space, Space), DMat4>,
    matrices: HashMap<String, DMat4>,
    vectors: HashMap<String, DVec4>,
    buffers: HashMap<String, PtrData>,
    stage_textures: HashMap<u32, TextureRef>,
    named_textures: HashMap<String, TextureRef>,
    related_textures: HashMap<(u64, String), TextureRef>,
    texcoord_columns: HashMap<u32, String>,
    columns: HashMap<String, VertexColumn>,
    active_stages: u32,
}

impl StaticState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_transform(mut self, from: Space, to: Space, matrix: DMat4) -> Self {
        self.transforms.insert((from, to), matrix);
        self
    }

    pub fn with_matrix(mut self, name: &str, matrix: DMat4) -> Self {
        self.matrices.insert(name.to_string(), matrix);
        self
    }

    pub fn with_vector(mut self, name: &str, value: DVec4) -> Self {
        self.vectors.insert(name.to_string(), value);
        self
    }

    pub fn with_buffer(mut self, name: &str, data: PtrData) -> Self {
        self.buffers.insert(name.to_string(), data);
        self
    }

    pub fn with_stage_texture(mut self, stage: u32, texture: TextureRef) -> Self {
        self.stage_textures.insert(stage, texture);
        self.active_stages = self.active_stages.max(stage + 1);
        self
    }

    pub fn with_named_texture(mut self, name: &str, texture: TextureRef) -> Self {
        self.named_textures.insert(name.to_string(), texture);
        self
    }

    pub fn with_related_texture(
        mut self,
        base: &TextureRef,
        suffix: &str,
        texture: TextureRef,
    ) -> Self {
        self.related_textures
            .insert((base.id, suffix.to_string()), texture);
        self
    }

    pub fn with_texcoord_column(mut self, stage: u32, column: &str) -> Self {
        self.texcoord_columns.insert(stage, column.to_string());
        self
    }

    pub fn with_column(mut self, name: &str, column: VertexColumn) -> Self {
        self.columns.insert(name.to_string(), column);
        self
    }

    /// Replace an input in place, for tests that mutate state between frames.
    pub fn set_vector(&mut self, name: &str, value: DVec4) {
        self.vectors.insert(name.to_string(), value);
    }

    pub fn set_transform(&mut self, from: Space, to: Space, matrix: DMat4) {
        self.transforms.insert((from, to), matrix);
    }

    pub fn remove_buffer(&mut self, name: &str) {
        self.buffers.remove(name);
    }
}

impl RenderStateProvider for StaticState {
    fn transform(&self, from: &Space, to: &Space) -> Option<DMat4> {
        if from == to {
            return Some(DMat4::IDENTITY);
        }
        self.transforms.get(&(from.clone(), to.clone())).copied()
    }

    fn named_matrix(&self, name: &str) -> Option<DMat4> {
        self.matrices.get(name).copied()
    }

    fn named_vector(&self, name: &str) -> Option<DVec4> {
        self.vectors.get(name).copied()
    }

    fn named_buffer(&self, name: &str) -> Option<&PtrData> {
        self.buffers.get(name)
    }
}

impl TextureStateProvider for StaticState {
    fn active_stage_count(&self) -> u32 {
        self.active_stages
    }

    fn texture_at_stage(&self, stage: u32) -> Option<TextureRef> {
        self.stage_textures.get(&stage).copied()
    }

    fn named_texture(&self, name: &str) -> Option<TextureRef> {
        self.named_textures.get(name).copied()
    }

    fn related_texture(&self, base: &TextureRef, suffix: &str) -> Option<TextureRef> {
        self.related_textures
            .get(&(base.id, suffix.to_string()))
            .copied()
    }

    fn texcoord_column(&self, stage: u32) -> Option<String> {
        self.texcoord_columns.get(&stage).cloned()
    }
}

impl GeometryProvider for StaticState {
    fn column(&self, name: &str) -> Option<&VertexColumn> {
        self.columns.get(name)
    }
}
