//! Shader programs and their pre-built pipeline states.
//!
//! Creating a [`Program`] compiles its root signature once and then one
//! pipeline per [`PipelineConfig`], so picking state while drawing never
//! compiles anything.

use std::collections::HashMap;

use crate::{
    backend::{PipelineFactory, PipelineId, RootSignatureId},
    error::{Error, Result},
};

use super::{NUM_PIPELINE_CONFIGS, PipelineConfig};

/// Handle of a program registered with a draw context.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ProgramId(pub u32);

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ShaderSource {
    pub code: String,
    pub entry_point: String,
}

impl ShaderSource {
    pub fn new(code: impl Into<String>, entry_point: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            entry_point: entry_point.into(),
        }
    }
}

/// A vertex and a fragment shader plus a label for diagnostics.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProgramDesc {
    pub label: String,
    pub vertex: ShaderSource,
    pub fragment: ShaderSource,
}

impl ProgramDesc {
    pub fn new(label: impl Into<String>, vertex: ShaderSource, fragment: ShaderSource) -> Self {
        Self {
            label: label.into(),
            vertex,
            fragment,
        }
    }

    /// Rejects programs a backend could not possibly compile.
    pub fn validate(&self) -> Result<()> {
        for (stage, shader) in [("vertex", &self.vertex), ("fragment", &self.fragment)] {
            let problem = if shader.code.trim().is_empty() {
                "source is empty"
            } else if shader.entry_point.trim().is_empty() {
                "entry point is empty"
            } else {
                continue;
            };
            return Err(Error::ProgramCompile {
                label: self.label.clone(),
                details: format!("{stage} shader {problem}"),
            });
        }
        Ok(())
    }
}

#[derive(Debug)]
pub struct Program {
    pub id: ProgramId,
    pub label: String,
    pub root_signature: RootSignatureId,
    /// Keyed by [`PipelineConfig::mask`].
    pub pipelines: HashMap<u32, PipelineId>,
}

impl Program {
    /// Compiles the program and all of its pipeline states. On failure every
    /// object created so far is destroyed again.
    pub fn create(factory: &mut dyn PipelineFactory, id: ProgramId, desc: &ProgramDesc) -> Result<Self> {
        desc.validate()?;
        let root_signature = factory.create_root_signature(desc)?;

        let mut pipelines = HashMap::with_capacity(NUM_PIPELINE_CONFIGS);
        for config in PipelineConfig::all() {
            match factory.create_pipeline(root_signature, desc, config) {
                Ok(pipeline) => {
                    pipelines.insert(config.mask(), pipeline);
                }
                Err(err) => {
                    log::error!("Pipeline {config:?} of program '{}' failed: {err}", desc.label);
                    for pipeline in pipelines.into_values() {
                        factory.destroy_pipeline(pipeline);
                    }
                    factory.destroy_root_signature(root_signature);
                    return Err(Error::PipelineCreate {
                        label: desc.label.clone(),
                        config,
                        details: err.to_string(),
                    });
                }
            }
        }
        log::debug!(
            "Created program '{}' with {} pipelines",
            desc.label,
            pipelines.len()
        );

        Ok(Self {
            id,
            label: desc.label.clone(),
            root_signature,
            pipelines,
        })
    }

    pub fn pipeline(&self, config: PipelineConfig) -> Option<PipelineId> {
        self.pipelines.get(&config.mask()).copied()
    }

    pub fn destroy(self, factory: &mut dyn PipelineFactory) {
        for pipeline in self.pipelines.into_values() {
            factory.destroy_pipeline(pipeline);
        }
        factory.destroy_root_signature(self.root_signature);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_missing_entry_point() {
        let desc = ProgramDesc::new(
            "lines",
            ShaderSource::new("fn vs() {}", "vs"),
            ShaderSource::new("fn fs() {}", " "),
        );
        let err = desc.validate().unwrap_err();
        assert_eq!(err.code(), -5);
        assert!(err.to_string().contains("fragment"));
    }
}
