//! # RedLilium Shading
//!
//! Shader reflection and resource binding for RedLilium.
//!
//! ## Overview
//!
//! This crate provides:
//! - [`ProgramCache`] - Name-keyed registry of shared, hot-reloadable programs
//! - [`ShaderCatalog`] - Reflected resource interface of a program with
//!   name-keyed uniform, buffer and texture binding
//! - [`GpuBuffer`] - Storage and atomic-counter buffer objects
//! - [`Driver`] - Trait for graphics driver implementations
//! - [`HeadlessDriver`] - In-memory driver for tests and tools
//!
//! ## Example
//!
//! ```
//! # #[cfg(feature = "headless")] {
//! use std::sync::Arc;
//! use redlilium_shading::driver::{HeadlessDriver, ProgramDeclaration};
//! use redlilium_shading::types::TypeCode;
//! use redlilium_shading::{ProgramCache, ShaderCatalog, StaticCamera};
//!
//! let driver = Arc::new(HeadlessDriver::new());
//! driver.declare_program(
//!     "lit",
//!     ProgramDeclaration::graphics()
//!         .with_uniform("projectionViewModelMatrix", TypeCode::FLOAT_MAT4, 1)
//!         .with_uniform("roughness", TypeCode::FLOAT, 1),
//! );
//!
//! let cache = ProgramCache::new(driver);
//! let catalog = ShaderCatalog::from_program(&cache, "lit");
//! catalog.set_uniform("roughness", &0.5f32).unwrap();
//! catalog.bind(Some(&StaticCamera::default()), None).unwrap();
//! # }
//! ```

pub mod buffer;
pub mod cache;
pub mod camera;
pub mod catalog;
pub mod driver;
pub mod error;
pub mod program;
pub mod texture;
pub mod types;

// Re-export main types for convenience
pub use buffer::GpuBuffer;
pub use cache::ProgramCache;
pub use camera::{Camera, CameraMatrices, MatrixUniformNames, StaticCamera};
pub use catalog::{
    BufferVariable, CatalogOptions, CatalogState, ShaderCatalog, SkipReason, SkippedResource,
    StructuredBuffer, UniformEntry,
};
pub use driver::{BufferClass, Driver, DriverError, ProgramKind};
#[cfg(feature = "headless")]
pub use driver::{HeadlessDriver, HeadlessLimits, ProgramDeclaration};
pub use error::{ShadingError, ShadingResult};
pub use program::Program;
pub use texture::{Texture, TextureBinding};
pub use types::{TextureKind, TypeCatalog, TypeCode, TypeDescriptor};

/// Shading library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Initialize the shading subsystem.
pub fn init() {
    log::info!("RedLilium Shading v{} initialized", VERSION);
}
