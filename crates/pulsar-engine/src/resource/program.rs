use std::collections::HashMap;

use crate::device::{Device, ProgramId};
use crate::shader::{self, AttributeInfo, ProgramInterface, ShaderError, UniformLocation};

/// A name that a program was expected to expose but does not.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LookupError {
    #[error("program has no vertex attribute named `{0}`")]
    Attribute(String),

    #[error("program has no uniform named `{0}`")]
    Uniform(String),
}

/// A linked program on the device plus a cache of name lookups.
#[derive(Debug)]
pub struct ShaderProgram {
    id: ProgramId,
    interface: ProgramInterface,
    attribute_cache: HashMap<String, Option<u32>>,
    uniform_cache: HashMap<String, Option<UniformLocation>>,
}

impl ShaderProgram {
    /// Compiles and links both stages, then creates the program on `dev`.
    ///
    /// Nothing is created on the device if either stage fails to compile or
    /// the stages do not link.
    pub fn new(
        dev: &mut impl Device,
        vertex_src: &str,
        fragment_src: &str,
    ) -> Result<Self, ShaderError> {
        let linked = shader::link(vertex_src, fragment_src)?;
        let id = dev.create_program(&linked);
        log::debug!("program {} created", id.raw());
        Ok(Self {
            id,
            interface: linked.interface,
            attribute_cache: HashMap::new(),
            uniform_cache: HashMap::new(),
        })
    }

    pub fn id(&self) -> ProgramId {
        self.id
    }

    pub fn interface(&self) -> &ProgramInterface {
        &self.interface
    }

    pub fn attributes(&self) -> &[AttributeInfo] {
        &self.interface.attributes
    }

    /// Location of the named vertex attribute, or `None` if the vertex stage
    /// does not declare it.
    pub fn attribute_location(&mut self, name: &str) -> Option<u32> {
        if let Some(hit) = self.attribute_cache.get(name) {
            return *hit;
        }
        let found = self.interface.attribute(name).map(|a| a.location);
        self.attribute_cache.insert(name.to_owned(), found);
        found
    }

    /// Location of the named uniform, or `None` if neither stage declares it.
    pub fn uniform_location(&mut self, name: &str) -> Option<UniformLocation> {
        if let Some(hit) = self.uniform_cache.get(name) {
            return *hit;
        }
        let found = self.interface.uniform(name);
        self.uniform_cache.insert(name.to_owned(), found);
        found
    }

    pub fn require_attribute(&mut self, name: &str) -> Result<u32, LookupError> {
        self.attribute_location(name)
            .ok_or_else(|| LookupError::Attribute(name.to_owned()))
    }

    pub fn require_uniform(&mut self, name: &str) -> Result<UniformLocation, LookupError> {
        self.uniform_location(name)
            .ok_or_else(|| LookupError::Uniform(name.to_owned()))
    }

    pub fn bind(&self, dev: &mut impl Device) {
        dev.use_program(self.id);
    }

    pub fn release(self, dev: &mut impl Device) {
        dev.delete_program(self.id);
    }

    #[cfg(test)]
    pub(crate) fn cached_lookups(&self) -> usize {
        self.attribute_cache.len() + self.uniform_cache.len()
    }
}
