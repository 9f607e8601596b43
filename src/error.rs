//! Error types shared by the scene graph, the glTF importer and the draw context.
//!
//! Every fallible operation in the crate returns [`Result`]. The variants map
//! one-to-one onto the failure kinds a caller has to tell apart: backend
//! allocation failures, bad arguments, malformed or unsupported glTF input and
//! program/pipeline creation failures. [`Error::code`] exposes the stable
//! negative codes used by callers that only deal in integers.

use crate::pipelines::PipelineConfig;

/// Fieldless discriminant of an [`Error`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    ResourceCreate,
    InvalidArgument,
    ImportParse,
    ImportFormat,
    ProgramCompile,
    PipelineCreate,
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The backend failed to allocate or initialise a resource.
    #[error("failed to create {what}: {details}")]
    ResourceCreate { what: &'static str, details: String },
    /// A size, format or handle passed in was not acceptable.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    /// The glTF container, its JSON or one of its payloads could not be read.
    #[error("failed to parse glTF: {0}")]
    ImportParse(String),
    /// The glTF parsed fine but uses a layout this crate does not accept.
    #[error("unsupported glTF data: {0}")]
    ImportFormat(String),
    /// A shader of a program was empty, lacked an entry point or failed to compile.
    #[error("failed to compile program '{label}': {details}")]
    ProgramCompile { label: String, details: String },
    /// One of the pre-built pipeline states of a program failed.
    #[error("failed to create pipeline {config:?} of program '{label}': {details}")]
    PipelineCreate {
        label: String,
        config: PipelineConfig,
        details: String,
    },
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::ResourceCreate { .. } => ErrorKind::ResourceCreate,
            Error::InvalidArgument(_) => ErrorKind::InvalidArgument,
            Error::ImportParse(_) => ErrorKind::ImportParse,
            Error::ImportFormat(_) => ErrorKind::ImportFormat,
            Error::ProgramCompile { .. } => ErrorKind::ProgramCompile,
            Error::PipelineCreate { .. } => ErrorKind::PipelineCreate,
        }
    }

    /// Stable negative code for this error.
    pub fn code(&self) -> i32 {
        match self.kind() {
            ErrorKind::ResourceCreate => -1,
            ErrorKind::InvalidArgument => -2,
            ErrorKind::ImportParse => -3,
            ErrorKind::ImportFormat => -4,
            ErrorKind::ProgramCompile => -5,
            ErrorKind::PipelineCreate => -6,
        }
    }

    pub(crate) fn resource(what: &'static str, details: impl Into<String>) -> Self {
        Error::ResourceCreate {
            what,
            details: details.into(),
        }
    }

    pub(crate) fn invalid(details: impl Into<String>) -> Self {
        Error::InvalidArgument(details.into())
    }

    pub(crate) fn format(details: impl Into<String>) -> Self {
        Error::ImportFormat(details.into())
    }

    pub(crate) fn parse(details: impl Into<String>) -> Self {
        Error::ImportParse(details.into())
    }
}

impl From<gltf::Error> for Error {
    fn from(err: gltf::Error) -> Self {
        Error::ImportParse(err.to_string())
    }
}

impl From<image::ImageError> for Error {
    fn from(err: image::ImageError) -> Self {
        Error::ImportParse(format!("image payload could not be decoded: {err}"))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
