//! Shading error types.

use thiserror::Error;

use crate::driver::{BufferClass, DriverError};
use crate::types::TextureKind;

/// Errors that can occur while loading or binding a shader catalog.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ShadingError {
    /// No resource of the requested category has this name.
    #[error("unknown {category} '{name}'")]
    UnknownResource {
        category: &'static str,
        name: String,
    },
    /// Caller-supplied data does not match the declared size.
    #[error("size mismatch for '{name}': expected {expected} bytes, got {actual}")]
    SizeMismatch {
        name: String,
        expected: u64,
        actual: u64,
    },
    /// A buffer of the wrong class was handed to a structured buffer slot.
    #[error("buffer '{name}' expects a {expected:?} buffer, got {actual:?}")]
    BufferClassMismatch {
        name: String,
        expected: BufferClass,
        actual: BufferClass,
    },
    /// A texture of the wrong kind was handed to a sampler or image slot.
    #[error("texture slot '{name}' expects {expected:?}, got {actual:?}")]
    TextureKindMismatch {
        name: String,
        expected: TextureKind,
        actual: TextureKind,
    },
    /// The driver does not know the program.
    #[error("program '{0}' not found")]
    ProgramNotFound(String),
    /// The program failed to compile or link.
    #[error("program '{program}' failed to link: {log}")]
    LinkFailed { program: String, log: String },
    /// The catalog was never loaded or its load failed.
    #[error("shader catalog is not valid")]
    InvalidCatalog,
    /// The structured buffer has no backing buffer yet.
    #[error("buffer '{0}' has not been allocated")]
    BufferNotAllocated(String),
    /// Atomic counter names could not be matched to counter blocks.
    #[error("program '{program}': {names} atomic counter bindings for {blocks} counter blocks")]
    AtomicCounterMismatch {
        program: String,
        names: usize,
        blocks: usize,
    },
    /// The driver backing a program or buffer has been dropped.
    #[error("graphics driver is gone")]
    DriverLost,
    /// Any other driver failure, including exhaustion.
    #[error(transparent)]
    Driver(#[from] DriverError),
}

impl ShadingError {
    /// Map a compile failure to the load-level error.
    pub(crate) fn from_compile(error: DriverError) -> Self {
        match error {
            DriverError::ProgramNotFound(name) => Self::ProgramNotFound(name),
            DriverError::LinkFailed { program, log } => Self::LinkFailed { program, log },
            other => Self::Driver(other),
        }
    }

    pub(crate) fn unknown(category: &'static str, name: &str) -> Self {
        Self::UnknownResource {
            category,
            name: name.to_string(),
        }
    }

    /// Returns `true` for failures that leave the catalog invalid.
    pub fn is_load_failure(&self) -> bool {
        matches!(
            self,
            Self::ProgramNotFound(_) | Self::LinkFailed { .. } | Self::AtomicCounterMismatch { .. }
        )
    }
}

pub type ShadingResult<T> = Result<T, ShadingError>;
