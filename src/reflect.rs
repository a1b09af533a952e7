//! Reflection inputs: the parameters a linked program exposes.
//!
//! Reflection data is produced once, when a program is linked, and is
//! immutable afterwards. The binding engine consumes it through the
//! [`ProgramReflection`] trait so that any driver layer (or a test fixture)
//! can supply it.

use std::collections::HashMap;

use crate::types::ParamType;

/// One active uniform reported by the driver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReflectedUniform {
    /// The uniform's name as it appears in the shader source.
    pub name: String,
    /// Reflected type tag.
    pub type_tag: ParamType,
    /// Declared array size; 1 for non-array uniforms.
    pub array_size: u32,
}

/// One active vertex attribute reported by the driver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReflectedAttribute {
    /// The attribute's name as it appears in the shader source.
    pub name: String,
    /// Reflected type tag.
    pub type_tag: ParamType,
}

/// Runtime query interface over a compiled and linked program.
pub trait ProgramReflection {
    /// All active uniforms, in reflection order.
    fn active_uniforms(&self) -> Vec<ReflectedUniform>;

    /// All active vertex attributes, in reflection order.
    fn active_attributes(&self) -> Vec<ReflectedAttribute>;

    /// Resolve a uniform name to its native location, or -1 if unresolved.
    fn uniform_location(&self, name: &str) -> i32;

    /// Resolve an attribute name to its native location, or -1 if unresolved.
    fn attribute_location(&self, name: &str) -> i32;
}

/// Reflection backed by in-memory tables.
///
/// Useful for tests and for drivers that snapshot reflection data up front.
/// Locations default to dense assignment in insertion order unless overridden.
#[derive(Debug, Clone, Default)]
pub struct StaticReflection {
    uniforms: Vec<ReflectedUniform>,
    attributes: Vec<ReflectedAttribute>,
    locations: HashMap<String, i32>,
    next_location: i32,
}

impl StaticReflection {
    /// Create an empty reflection table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a uniform with an automatically assigned location.
    pub fn with_uniform(mut self, name: &str, type_tag: ParamType, array_size: u32) -> Self {
        self.locations.insert(name.to_string(), self.next_location);
        self.next_location += 1;
        self.uniforms.push(ReflectedUniform {
            name: name.to_string(),
            type_tag,
            array_size,
        });
        self
    }

    /// Add an attribute with an automatically assigned location.
    pub fn with_attribute(mut self, name: &str, type_tag: ParamType) -> Self {
        self.locations.insert(name.to_string(), self.next_location);
        self.next_location += 1;
        self.attributes.push(ReflectedAttribute {
            name: name.to_string(),
            type_tag,
        });
        self
    }

    /// Add an attribute the driver refuses to assign a location to.
    pub fn with_unlocated_attribute(mut self, name: &str, type_tag: ParamType) -> Self {
        self.locations.insert(name.to_string(), -1);
        self.attributes.push(ReflectedAttribute {
            name: name.to_string(),
            type_tag,
        });
        self
    }
}

impl ProgramReflection for StaticReflection {
    fn active_uniforms(&self) -> Vec<ReflectedUniform> {
        self.uniforms.clone()
    }

    fn active_attributes(&self) -> Vec<ReflectedAttribute> {
        self.attributes.clone()
    }

    fn uniform_location(&self, name: &str) -> i32 {
        self.locations.get(name).copied().unwrap_or(-1)
    }

    fn attribute_location(&self, name: &str) -> i32 {
        self.locations.get(name).copied().unwrap_or(-1)
    }
}
