//! Graphics driver abstraction.
//!
//! The binding layer never talks to a graphics API directly. Everything it
//! needs from the driver, program compilation and linking, resource interface
//! queries, uniform uploads and buffer object primitives, goes through the
//! [`Driver`] trait.
//!
//! # Available Drivers
//!
//! - `headless` (default feature): in-memory driver for tests and tools
//!
//! # Conventions
//!
//! Driver calls follow the "current object" model of GL-family APIs:
//! [`Driver::use_program`] makes a program current and subsequent
//! [`Driver::set_uniform`] calls target it.

#[cfg(feature = "headless")]
pub mod headless;

use thiserror::Error;

use crate::types::{TypeCode, UniformUpload};

#[cfg(feature = "headless")]
pub use headless::{HeadlessDriver, HeadlessLimits, ProgramDeclaration};

/// Errors reported by a driver.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DriverError {
    #[error("program '{0}' not found")]
    ProgramNotFound(String),
    #[error("program '{program}' failed to link: {log}")]
    LinkFailed { program: String, log: String },
    #[error("out of GPU memory")]
    OutOfMemory,
    #[error("invalid {kind} handle {id}")]
    InvalidHandle { kind: &'static str, id: u32 },
    #[error("range {offset}..{end} is outside of buffer of size {size}")]
    OutOfRange { offset: u64, end: u64, size: u64 },
    #[error("no program is in use")]
    NoActiveProgram,
    #[error("invalid value: {0}")]
    InvalidValue(String),
}

pub type DriverResult<T> = Result<T, DriverError>;

/// Opaque driver handle of a linked program.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ProgramId(pub u32);

/// Opaque driver handle of a buffer object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BufferId(pub u32);

/// Pipeline a program was linked for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProgramKind {
    /// Vertex/fragment (and optional geometry/tessellation) stages.
    Graphics,
    /// A single compute stage.
    Compute,
}

/// Class of a buffer object, which also selects its binding target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum BufferClass {
    /// Shader storage buffer.
    Storage,
    /// Atomic counter buffer.
    AtomicCounter,
}

/// Structured-resource interfaces a program can be queried for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BlockInterface {
    ShaderStorage,
    AtomicCounter,
}

impl BlockInterface {
    /// Buffer class that backs blocks of this interface.
    pub fn buffer_class(self) -> BufferClass {
        match self {
            Self::ShaderStorage => BufferClass::Storage,
            Self::AtomicCounter => BufferClass::AtomicCounter,
        }
    }
}

/// Result of a successful compile and link.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LinkedProgram {
    pub id: ProgramId,
    pub kind: ProgramKind,
}

/// One active entry of a program's uniform interface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UniformRecord {
    /// Resource index, also used as the upload location.
    pub index: u32,
    pub name: String,
    pub type_code: TypeCode,
    /// Declared element count; greater than one for arrays.
    pub array_size: u32,
    /// Buffer binding of an atomic counter, `None` for every other uniform.
    pub atomic_binding: Option<u32>,
}

/// One active member of a structured block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VariableRecord {
    pub offset: u32,
    pub type_code: TypeCode,
    pub array_size: u32,
    pub array_stride: u32,
}

impl VariableRecord {
    /// A non-array member at `offset`.
    pub fn new(offset: u32, type_code: TypeCode) -> Self {
        Self {
            offset,
            type_code,
            array_size: 1,
            array_stride: 0,
        }
    }

    /// Turn the member into an array of `size` elements spaced `stride` bytes apart.
    pub fn with_array(mut self, size: u32, stride: u32) -> Self {
        self.array_size = size;
        self.array_stride = stride;
        self
    }
}

/// One active block of a structured-resource interface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockRecord {
    pub index: u32,
    /// Block name. Drivers do not report names for atomic-counter blocks.
    pub name: Option<String>,
    pub binding: u32,
    /// Members in declaration order.
    pub variables: Vec<VariableRecord>,
}

/// Interface a graphics driver provides to the binding layer.
///
/// Implementations use interior mutability; all calls take `&self` and are
/// expected to happen on the thread owning the graphics context.
pub trait Driver: Send + Sync + 'static {
    /// Get the driver name.
    fn name(&self) -> &'static str;

    /// Compile and link all stages of the named program.
    fn compile_program(&self, name: &str) -> DriverResult<LinkedProgram>;

    /// Release a linked program.
    fn delete_program(&self, program: ProgramId);

    /// Make a program current for subsequent uniform uploads.
    fn use_program(&self, program: ProgramId) -> DriverResult<()>;

    /// Enumerate the active uniforms, samplers, images and atomic counters.
    fn active_uniforms(&self, program: ProgramId) -> DriverResult<Vec<UniformRecord>>;

    /// Enumerate the active blocks of a structured-resource interface.
    fn active_blocks(
        &self,
        program: ProgramId,
        interface: BlockInterface,
    ) -> DriverResult<Vec<BlockRecord>>;

    /// Upload `count` elements to a uniform location of the current program.
    fn set_uniform(
        &self,
        location: u32,
        upload: UniformUpload,
        count: u32,
        data: &[u8],
    ) -> DriverResult<()>;

    /// Allocate an empty buffer object.
    fn create_buffer(&self, class: BufferClass) -> DriverResult<BufferId>;

    /// Release a buffer object.
    fn destroy_buffer(&self, buffer: BufferId);

    /// Replace the whole contents of a buffer.
    fn buffer_data(&self, buffer: BufferId, data: &[u8]) -> DriverResult<()>;

    /// Reallocate a buffer with `size` bytes of unspecified content.
    fn resize_buffer(&self, buffer: BufferId, size: u64) -> DriverResult<()>;

    /// Current allocation size in bytes.
    fn buffer_size(&self, buffer: BufferId) -> DriverResult<u64>;

    /// Copy `dst.len()` bytes starting at `offset` into `dst`.
    ///
    /// The range must lie within the buffer.
    fn read_buffer(&self, buffer: BufferId, offset: u64, dst: &mut [u8]) -> DriverResult<()>;

    /// Bind a buffer to an indexed binding point of its class.
    fn bind_buffer_base(&self, class: BufferClass, binding: u32, buffer: BufferId)
    -> DriverResult<()>;
}
