//! Vertex stream and texture binding.
//!
//! The per-draw half of the context: attribute arrays are re-pointed at the
//! current geometry's columns and samplers at the current texture state.
//! Both operations take the previously bound context so stale enables from
//! a different program never leak into this draw.

use crate::binding::{ColumnSemantic, VertexStreamBinding};
use crate::context::{ContextState, ShaderContext};
use crate::device::Device;
use crate::error::BindError;
use crate::provider::{GeometryProvider, TextureStateProvider};

impl ShaderContext {
    /// Point every attribute slot at its column in the current geometry.
    ///
    /// Returns `Ok(false)` when a column's backing store could not be made
    /// resident, in which case the draw must be skipped. Columns the
    /// geometry simply lacks are left disabled without error.
    pub fn update_vertex_streams(
        &mut self,
        prev: Option<&mut ShaderContext>,
        device: &dyn Device,
        geometry: &dyn GeometryProvider,
        textures: &dyn TextureStateProvider,
        force: bool,
    ) -> Result<bool, BindError> {
        // The previous context is torn down even when this one cannot be
        // brought up, so its enables never leak into the draw.
        if let Some(prev) = prev {
            prev.disable_vertex_streams(device);
        }
        if self.state() == ContextState::Invalid {
            return Err(BindError::ContextInvalid);
        }

        for spec in &self.table.streams {
            let name = resolve_column_name(spec, textures);
            let Some(column) = geometry.column(&name) else {
                log::debug!("geometry has no column '{name}', leaving attribute disabled");
                continue;
            };
            if !geometry.prepare_column(column, force) {
                return Ok(false);
            }
            device.enable_attribute(self.location(spec.seqno), column);
        }
        Ok(true)
    }

    /// Disable every attribute slot this program uses. Safe in any state.
    pub fn disable_vertex_streams(&mut self, device: &dyn Device) {
        for spec in &self.table.streams {
            device.disable_attribute(self.location(spec.seqno));
        }
    }

    /// Bind every sampler's texture and write its unit assignment.
    ///
    /// Named samplers are packed after the units claimed by the frame's
    /// render-state stages; that offset is recorded so a later disable
    /// releases the same units. Unresolvable or wrong-kind textures leave
    /// their unit untouched for this draw.
    pub fn update_texture_bindings(
        &mut self,
        prev: Option<&mut ShaderContext>,
        device: &dyn Device,
        textures: &dyn TextureStateProvider,
    ) -> Result<(), BindError> {
        if let Some(prev) = prev {
            prev.disable_texture_bindings(device);
        }
        if self.state() == ContextState::Invalid {
            return Err(BindError::ContextInvalid);
        }
        self.stage_offset = textures.active_stage_count();

        for spec in &self.table.textures {
            let (unit, resolved) = match &spec.input {
                Some(name) => (spec.stage + self.stage_offset, textures.named_texture(name)),
                None => (spec.stage, textures.texture_at_stage(spec.stage)),
            };
            let Some(texture) = resolved else {
                log::debug!("no texture for sampler {}, skipping", spec.seqno);
                continue;
            };
            let texture = match &spec.suffix {
                Some(suffix) => match textures.related_texture(&texture, suffix) {
                    Some(related) => related,
                    None => {
                        log::debug!("no '{suffix}' texture related to sampler {}", spec.seqno);
                        continue;
                    }
                },
                None => texture,
            };
            if texture.kind != spec.desired_kind {
                log::warn!(
                    "sampler {} expects {:?} but the texture is {:?}, skipping",
                    spec.seqno,
                    spec.desired_kind,
                    texture.kind
                );
                continue;
            }
            device.bind_texture(unit, &texture);
            device.uniform_int(self.location(spec.seqno), unit as i32);
        }
        Ok(())
    }

    /// Unbind every texture unit this program claimed. Safe in any state.
    pub fn disable_texture_bindings(&mut self, device: &dyn Device) {
        for spec in &self.table.textures {
            let unit = match spec.input {
                Some(_) => spec.stage + self.stage_offset,
                None => spec.stage,
            };
            device.unbind_texture_unit(unit);
        }
        self.stage_offset = 0;
    }
}

/// The geometry column a stream binding reads from.
///
/// Texcoord slots take the name of the render-state stage's coordinate set;
/// tangent and binormal slots for a named set read the `<base>.<set>`
/// column, and fall back to the plain base column for the default set.
fn resolve_column_name(spec: &VertexStreamBinding, textures: &dyn TextureStateProvider) -> String {
    let base = spec.column.column_name();
    let Some(uv) = spec.append_uv else {
        return base.to_string();
    };
    let set_name = textures
        .texcoord_column(uv)
        .unwrap_or_else(|| "texcoord".to_string());
    if spec.column == ColumnSemantic::TexCoord {
        set_name
    } else if set_name == "texcoord" {
        base.to_string()
    } else {
        format!("{base}.{set_name}")
    }
}
