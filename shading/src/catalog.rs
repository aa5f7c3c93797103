//! Shader resource catalog.
//!
//! A [`ShaderCatalog`] reflects a linked program once at load time and indexes
//! its resource interface by name:
//!
//! - plain value uniforms, with their location, type and element count
//! - samplers and images, as texture slots
//! - structured buffers (storage and atomic-counter blocks), with their binding
//!   point, member layout and a lazily allocated backing [`GpuBuffer`]
//!
//! # Example
//!
//! ```
//! # #[cfg(feature = "headless")] {
//! use std::sync::Arc;
//! use redlilium_shading::driver::{HeadlessDriver, ProgramDeclaration, VariableRecord};
//! use redlilium_shading::types::TypeCode;
//! use redlilium_shading::{ProgramCache, ShaderCatalog};
//!
//! let driver = Arc::new(HeadlessDriver::new());
//! driver.declare_program(
//!     "particles",
//!     ProgramDeclaration::compute()
//!         .with_uniform("dt", TypeCode::FLOAT, 1)
//!         .with_storage_block("Particles", 0, [VariableRecord::new(0, TypeCode::FLOAT_VEC4)]),
//! );
//! let cache = ProgramCache::new(driver);
//!
//! let mut catalog = ShaderCatalog::new();
//! catalog.load(&cache, "particles").unwrap();
//! catalog.set_uniform("dt", &0.016f32).unwrap();
//! catalog.set_buffer_data("Particles", &[0.0f32; 8]).unwrap();
//! catalog.bind(None, None).unwrap();
//! # }
//! ```

use std::collections::BTreeMap;
use std::sync::Arc;

use bytemuck::Pod;
use glam::Mat4;

use crate::buffer::GpuBuffer;
use crate::cache::ProgramCache;
use crate::camera::{Camera, CameraMatrices, MatrixUniformNames};
use crate::driver::{BlockInterface, BufferClass, Driver, DriverError, VariableRecord};
use crate::error::{ShadingError, ShadingResult};
use crate::program::Program;
use crate::texture::{Texture, TextureBinding};
use crate::types::{TypeCatalog, TypeClass, TypeCode, TypeDescriptor};

/// Catalog configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CatalogOptions {
    /// Uniform names camera matrices are uploaded to on bind.
    pub matrix_names: MatrixUniformNames,
}

/// Lifecycle state of a catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CatalogState {
    /// Nothing has been loaded yet.
    Unloaded,
    /// The program linked and was reflected.
    Valid,
    /// The last load or refresh failed.
    Invalid,
}

/// A plain value uniform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UniformEntry {
    pub name: String,
    /// Upload location.
    pub location: u32,
    pub descriptor: TypeDescriptor,
    /// Element count; greater than one for arrays.
    pub count: u32,
}

impl UniformEntry {
    /// Exact number of bytes a caller must supply.
    pub fn byte_size(&self) -> u64 {
        self.count as u64 * self.descriptor.byte_size as u64
    }
}

/// A member variable of a structured buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferVariable {
    pub offset: u32,
    pub descriptor: TypeDescriptor,
    pub count: u32,
    pub array_stride: u32,
}

/// A storage or atomic-counter block and its backing buffer.
#[derive(Debug, Clone)]
pub struct StructuredBuffer {
    class: BufferClass,
    binding: u32,
    variables: Vec<BufferVariable>,
    buffer: Option<Arc<GpuBuffer>>,
}

impl StructuredBuffer {
    pub fn class(&self) -> BufferClass {
        self.class
    }

    pub fn binding(&self) -> u32 {
        self.binding
    }

    /// Active members in declaration order.
    pub fn variables(&self) -> &[BufferVariable] {
        &self.variables
    }

    /// Backing buffer, if one has been allocated or assigned.
    pub fn buffer(&self) -> Option<&Arc<GpuBuffer>> {
        self.buffer.as_ref()
    }

    /// Run `fill` on the backing buffer, allocating one if needed.
    ///
    /// A newly allocated buffer is kept only when `fill` succeeds.
    fn fill_backing(
        &mut self,
        driver: &Arc<dyn Driver>,
        fill: impl FnOnce(&GpuBuffer) -> ShadingResult<()>,
    ) -> ShadingResult<Arc<GpuBuffer>> {
        let buffer = match &self.buffer {
            Some(buffer) => buffer.clone(),
            None => Arc::new(GpuBuffer::create(driver, self.class)?),
        };
        fill(&buffer)?;
        self.buffer = Some(buffer.clone());
        Ok(buffer)
    }
}

/// Why a resource was left out of the catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// Uniform with a type code the catalog does not know.
    UnknownType(TypeCode),
    /// Atomic counter reported without a buffer binding.
    MissingCounterBinding,
    /// Storage block reported without a name. `name` is empty.
    UnnamedBlock { index: u32 },
    /// Block member with a type code the catalog does not know. `name` is
    /// the block's.
    UnknownMemberType { offset: u32, type_code: TypeCode },
}

/// A resource skipped during reflection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedResource {
    pub name: String,
    pub reason: SkipReason,
}

#[derive(Debug, Default)]
struct Reflection {
    uniforms: BTreeMap<String, UniformEntry>,
    samplers: BTreeMap<String, TextureBinding>,
    images: BTreeMap<String, TextureBinding>,
    buffers: BTreeMap<String, StructuredBuffer>,
    skipped: Vec<SkippedResource>,
}

struct DeferredCounter {
    index: u32,
    binding: u32,
    name: String,
}

impl Reflection {
    fn build(program: &Program) -> ShadingResult<Self> {
        let linked = program.linked()?;
        let driver = program.driver().ok_or(ShadingError::DriverLost)?;
        let mut reflection = Self::default();
        let mut counters = Vec::new();

        for record in driver.active_uniforms(linked.id)? {
            match TypeCatalog::classify(record.type_code) {
                Some(TypeClass::AtomicCounter) => match record.atomic_binding {
                    Some(binding) => counters.push(DeferredCounter {
                        index: record.index,
                        binding,
                        name: record.name,
                    }),
                    None => {
                        log::warn!(
                            "Atomic counter '{}' in '{}' has no buffer binding, skipping",
                            record.name,
                            program.name()
                        );
                        reflection.skip(record.name, SkipReason::MissingCounterBinding);
                    }
                },
                Some(TypeClass::Value(descriptor)) => {
                    reflection.uniforms.insert(
                        record.name.clone(),
                        UniformEntry {
                            name: record.name,
                            location: record.index,
                            descriptor,
                            count: record.array_size.max(1),
                        },
                    );
                }
                Some(TypeClass::Sampler(kind)) => {
                    reflection
                        .samplers
                        .insert(record.name, TextureBinding::new(kind));
                }
                Some(TypeClass::Image(kind)) => {
                    reflection
                        .images
                        .insert(record.name, TextureBinding::new(kind));
                }
                None => {
                    log::warn!(
                        "Unknown type {} of uniform '{}' in '{}', skipping",
                        record.type_code,
                        record.name,
                        program.name()
                    );
                    reflection.skip(record.name, SkipReason::UnknownType(record.type_code));
                }
            }
        }

        counters.sort_by_key(|c| (c.binding, c.index));
        reflection.reflect_storage_blocks(driver.as_ref(), program)?;
        reflection.reflect_counter_blocks(driver.as_ref(), program, counters)?;

        log::debug!(
            "Reflected '{}': {} uniforms, {} samplers, {} images, {} buffers, {} skipped",
            program.name(),
            reflection.uniforms.len(),
            reflection.samplers.len(),
            reflection.images.len(),
            reflection.buffers.len(),
            reflection.skipped.len()
        );
        Ok(reflection)
    }

    fn skip(&mut self, name: String, reason: SkipReason) {
        self.skipped.push(SkippedResource { name, reason });
    }

    fn reflect_storage_blocks(&mut self, driver: &dyn Driver, program: &Program) -> ShadingResult<()> {
        let id = program.linked()?.id;
        for block in driver.active_blocks(id, BlockInterface::ShaderStorage)? {
            let Some(name) = block.name else {
                log::warn!(
                    "Storage block {} in '{}' has no name, skipping",
                    block.index,
                    program.name()
                );
                self.skip(String::new(), SkipReason::UnnamedBlock { index: block.index });
                continue;
            };
            let buffer = self.structured_buffer(
                BlockInterface::ShaderStorage,
                block.binding,
                &block.variables,
                &name,
            );
            self.buffers.insert(name, buffer);
        }
        Ok(())
    }

    /// Counter blocks carry no name; each is named after the first counter
    /// sharing its binding.
    fn reflect_counter_blocks(
        &mut self,
        driver: &dyn Driver,
        program: &Program,
        counters: Vec<DeferredCounter>,
    ) -> ShadingResult<()> {
        let id = program.linked()?.id;
        let mut blocks = driver.active_blocks(id, BlockInterface::AtomicCounter)?;
        blocks.sort_by_key(|b| b.binding);

        let mut names: Vec<DeferredCounter> = Vec::with_capacity(counters.len());
        for counter in counters {
            match names.last() {
                Some(last) if last.binding == counter.binding => {
                    log::debug!(
                        "Atomic counter '{}' shares binding {} with '{}'",
                        counter.name,
                        counter.binding,
                        last.name
                    );
                }
                _ => names.push(counter),
            }
        }

        let matches = names.len() == blocks.len()
            && names.iter().zip(&blocks).all(|(n, b)| n.binding == b.binding);
        if !matches {
            log::error!(
                "Program '{}' has {} atomic counter bindings but {} counter blocks",
                program.name(),
                names.len(),
                blocks.len()
            );
            return Err(ShadingError::AtomicCounterMismatch {
                program: program.name().to_string(),
                names: names.len(),
                blocks: blocks.len(),
            });
        }

        for (counter, block) in names.into_iter().zip(blocks) {
            let buffer = self.structured_buffer(
                BlockInterface::AtomicCounter,
                block.binding,
                &block.variables,
                &counter.name,
            );
            self.buffers.insert(counter.name, buffer);
        }
        Ok(())
    }

    fn structured_buffer(
        &mut self,
        interface: BlockInterface,
        binding: u32,
        variables: &[VariableRecord],
        name: &str,
    ) -> StructuredBuffer {
        let mut members = Vec::with_capacity(variables.len());
        for v in variables {
            match TypeCatalog::member(v.type_code) {
                Some(descriptor) => members.push(BufferVariable {
                    offset: v.offset,
                    descriptor,
                    count: v.array_size,
                    array_stride: v.array_stride,
                }),
                None => {
                    log::warn!(
                        "Unknown type {} of member at offset {} in '{}', skipping",
                        v.type_code,
                        v.offset,
                        name
                    );
                    self.skip(
                        name.to_string(),
                        SkipReason::UnknownMemberType {
                            offset: v.offset,
                            type_code: v.type_code,
                        },
                    );
                }
            }
        }
        StructuredBuffer {
            class: interface.buffer_class(),
            binding,
            variables: members,
            buffer: None,
        }
    }
}

/// Name-keyed index of a program's resources.
///
/// All setters report failure through [`ShadingResult`]; an invalid or
/// unloaded catalog fails every call without issuing driver calls.
#[derive(Debug)]
pub struct ShaderCatalog {
    options: CatalogOptions,
    state: CatalogState,
    program: Option<Arc<Program>>,
    generation: u64,
    reflection: Reflection,
}

impl Default for ShaderCatalog {
    fn default() -> Self {
        Self::new()
    }
}

impl ShaderCatalog {
    /// Create an unloaded catalog with default options.
    pub fn new() -> Self {
        Self::with_options(CatalogOptions::default())
    }

    /// Create an unloaded catalog.
    pub fn with_options(options: CatalogOptions) -> Self {
        Self {
            options,
            state: CatalogState::Unloaded,
            program: None,
            generation: 0,
            reflection: Reflection::default(),
        }
    }

    /// Create a catalog and load `name` into it.
    ///
    /// The returned catalog is invalid if the load failed.
    pub fn from_program(cache: &ProgramCache, name: &str) -> Self {
        let mut catalog = Self::new();
        if let Err(e) = catalog.load(cache, name) {
            log::debug!("Catalog for '{}' left invalid: {}", name, e);
        }
        catalog
    }

    /// Load and reflect a program, replacing any previous contents.
    pub fn load(&mut self, cache: &ProgramCache, name: &str) -> ShadingResult<()> {
        let program = cache.load_program(name);
        self.program = Some(program.clone());
        self.reflection = Reflection::default();
        self.apply(&program, Reflection::build(&program))
    }

    fn apply(&mut self, program: &Program, reflection: ShadingResult<Reflection>) -> ShadingResult<()> {
        self.generation = program.generation();
        match reflection {
            Ok(reflection) => {
                self.reflection = reflection;
                self.state = CatalogState::Valid;
                Ok(())
            }
            Err(e) => {
                log::error!("Failed to load shader catalog '{}': {}", program.name(), e);
                self.reflection = Reflection::default();
                self.state = CatalogState::Invalid;
                Err(e)
            }
        }
    }

    /// Returns `true` if the program was rebuilt since it was reflected.
    pub fn is_stale(&self) -> bool {
        self.program
            .as_ref()
            .is_some_and(|p| p.generation() != self.generation)
    }

    /// Reflect the program again after a reload.
    ///
    /// Backing buffers and textures are kept for resources whose name and
    /// class are unchanged.
    pub fn refresh(&mut self) -> ShadingResult<()> {
        let program = self.program.clone().ok_or(ShadingError::InvalidCatalog)?;
        let mut previous = std::mem::take(&mut self.reflection);
        let mut reflection = Reflection::build(&program);

        if let Ok(fresh) = &mut reflection {
            for (name, buffer) in &mut fresh.buffers {
                if let Some(old) = previous.buffers.remove(name) {
                    if old.class == buffer.class {
                        buffer.buffer = old.buffer;
                    }
                }
            }
            for (fresh_slots, old_slots) in [
                (&mut fresh.samplers, &mut previous.samplers),
                (&mut fresh.images, &mut previous.images),
            ] {
                for (name, slot) in fresh_slots.iter_mut() {
                    let texture = old_slots.remove(name).and_then(|old| old.texture().cloned());
                    if let Some(texture) = texture {
                        if texture.kind() == slot.kind() {
                            slot.set(texture);
                        }
                    }
                }
            }
        }
        self.apply(&program, reflection)
    }

    pub fn state(&self) -> CatalogState {
        self.state
    }

    pub fn is_valid(&self) -> bool {
        self.state == CatalogState::Valid
    }

    /// Get the program this catalog was loaded from.
    pub fn program(&self) -> Option<&Arc<Program>> {
        self.program.as_ref()
    }

    pub fn options(&self) -> &CatalogOptions {
        &self.options
    }

    fn live(&self) -> ShadingResult<(&Arc<Program>, Arc<dyn Driver>)> {
        match (&self.program, self.state) {
            (Some(program), CatalogState::Valid) => {
                let driver = program.driver().ok_or(ShadingError::DriverLost)?;
                Ok((program, driver))
            }
            _ => Err(ShadingError::InvalidCatalog),
        }
    }

    // --- Lookups ---

    pub fn has_uniform(&self, name: &str) -> bool {
        self.reflection.uniforms.contains_key(name)
    }

    pub fn uniform(&self, name: &str) -> Option<&UniformEntry> {
        self.reflection.uniforms.get(name)
    }

    pub fn sampler(&self, name: &str) -> Option<&TextureBinding> {
        self.reflection.samplers.get(name)
    }

    pub fn image(&self, name: &str) -> Option<&TextureBinding> {
        self.reflection.images.get(name)
    }

    pub fn buffer_layout(&self, name: &str) -> Option<&StructuredBuffer> {
        self.reflection.buffers.get(name)
    }

    /// Uniforms in name order.
    pub fn uniforms(&self) -> impl Iterator<Item = &UniformEntry> {
        self.reflection.uniforms.values()
    }

    pub fn samplers(&self) -> impl Iterator<Item = (&str, &TextureBinding)> {
        self.reflection.samplers.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn images(&self) -> impl Iterator<Item = (&str, &TextureBinding)> {
        self.reflection.images.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Structured buffers in name order.
    pub fn buffers(&self) -> impl Iterator<Item = (&str, &StructuredBuffer)> {
        self.reflection.buffers.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Resources skipped during reflection.
    pub fn skipped_resources(&self) -> &[SkippedResource] {
        &self.reflection.skipped
    }

    // --- Uniforms ---

    /// Upload a single value. The value's size must match the declared size.
    pub fn set_uniform<T: Pod>(&self, name: &str, value: &T) -> ShadingResult<()> {
        self.set_uniform_bytes(name, bytemuck::bytes_of(value))
    }

    /// Upload an array of values. The slice's byte size must match the declared size.
    pub fn set_uniform_slice<T: Pod>(&self, name: &str, values: &[T]) -> ShadingResult<()> {
        self.set_uniform_bytes(name, bytemuck::cast_slice(values))
    }

    /// Upload raw bytes to a uniform.
    pub fn set_uniform_bytes(&self, name: &str, data: &[u8]) -> ShadingResult<()> {
        let (program, driver) = self.live()?;
        let entry = self
            .reflection
            .uniforms
            .get(name)
            .ok_or_else(|| ShadingError::unknown("uniform", name))?;
        if data.len() as u64 != entry.byte_size() {
            log::warn!(
                "Uniform '{}' expects {} bytes, got {}",
                name,
                entry.byte_size(),
                data.len()
            );
            return Err(ShadingError::SizeMismatch {
                name: name.to_string(),
                expected: entry.byte_size(),
                actual: data.len() as u64,
            });
        }
        program.activate()?;
        upload(driver.as_ref(), entry, data)
    }

    // --- Structured buffers ---

    /// Replace the contents of a structured buffer and bind it.
    ///
    /// The backing buffer is allocated on first use.
    pub fn set_buffer_data<T: Pod>(&mut self, name: &str, data: &[T]) -> ShadingResult<()> {
        self.set_buffer_bytes(name, bytemuck::cast_slice(data))
    }

    /// Byte-level variant of [`ShaderCatalog::set_buffer_data`].
    pub fn set_buffer_bytes(&mut self, name: &str, data: &[u8]) -> ShadingResult<()> {
        let (_, driver) = self.live()?;
        let entry = self
            .reflection
            .buffers
            .get_mut(name)
            .ok_or_else(|| ShadingError::unknown("buffer", name))?;
        let buffer = entry.fill_backing(&driver, |buffer| buffer.write_bytes(data))?;
        driver.bind_buffer_base(entry.class, entry.binding, buffer.id())?;
        Ok(())
    }

    /// Reallocate a structured buffer to `size` bytes and bind it.
    ///
    /// Used to pre-allocate buffers filled on the GPU.
    pub fn set_buffer_size(&mut self, name: &str, size: u64) -> ShadingResult<()> {
        let (_, driver) = self.live()?;
        let entry = self
            .reflection
            .buffers
            .get_mut(name)
            .ok_or_else(|| ShadingError::unknown("buffer", name))?;
        let buffer = entry.fill_backing(&driver, |buffer| buffer.resize(size))?;
        driver.bind_buffer_base(entry.class, entry.binding, buffer.id())?;
        Ok(())
    }

    fn allocated(&self, name: &str) -> ShadingResult<&Arc<GpuBuffer>> {
        self.live()?;
        let entry = self
            .reflection
            .buffers
            .get(name)
            .ok_or_else(|| ShadingError::unknown("buffer", name))?;
        entry
            .buffer
            .as_ref()
            .ok_or_else(|| ShadingError::BufferNotAllocated(name.to_string()))
    }

    /// Read a structured buffer starting at element `start_index`.
    ///
    /// Returns the number of bytes copied; see [`GpuBuffer::read`].
    pub fn get_buffer_data<T: Pod>(
        &self,
        name: &str,
        out: &mut [T],
        start_index: usize,
    ) -> ShadingResult<u64> {
        // Offsets past the addressable range read nothing.
        let byte_offset = start_index
            .checked_mul(std::mem::size_of::<T>())
            .map_or(u64::MAX, |bytes| bytes as u64);
        self.get_buffer_data_at_byte(name, out, byte_offset)
    }

    /// Read a structured buffer starting at `byte_offset`.
    pub fn get_buffer_data_at_byte<T: Pod>(
        &self,
        name: &str,
        out: &mut [T],
        byte_offset: u64,
    ) -> ShadingResult<u64> {
        self.allocated(name)?.read(out, byte_offset)
    }

    /// Size of a structured buffer in bytes; zero if not allocated yet.
    pub fn buffer_size(&self, name: &str) -> ShadingResult<u64> {
        match self.allocated(name) {
            Ok(buffer) => buffer.size(),
            Err(ShadingError::BufferNotAllocated(_)) => Ok(0),
            Err(e) => Err(e),
        }
    }

    /// Replace the backing buffer of a structured buffer, or clear it with `None`.
    ///
    /// The buffer is bound on the next [`ShaderCatalog::bind`].
    pub fn set_buffer(&mut self, name: &str, buffer: Option<Arc<GpuBuffer>>) -> ShadingResult<()> {
        self.live()?;
        let entry = self
            .reflection
            .buffers
            .get_mut(name)
            .ok_or_else(|| ShadingError::unknown("buffer", name))?;
        if let Some(buffer) = &buffer {
            if buffer.class() != entry.class {
                return Err(ShadingError::BufferClassMismatch {
                    name: name.to_string(),
                    expected: entry.class,
                    actual: buffer.class(),
                });
            }
        }
        entry.buffer = buffer;
        Ok(())
    }

    /// Get the backing buffer of a structured buffer to share it.
    pub fn buffer(&self, name: &str) -> Option<Arc<GpuBuffer>> {
        self.reflection.buffers.get(name)?.buffer.clone()
    }

    // --- Textures ---

    /// Assign a texture to a sampler or image slot.
    pub fn set_texture(&mut self, name: &str, texture: Arc<Texture>) -> ShadingResult<()> {
        self.live()?;
        let slot = match self.reflection.samplers.get_mut(name) {
            Some(slot) => slot,
            None => self
                .reflection
                .images
                .get_mut(name)
                .ok_or_else(|| ShadingError::unknown("texture slot", name))?,
        };
        if slot.kind() != texture.kind() {
            return Err(ShadingError::TextureKindMismatch {
                name: name.to_string(),
                expected: slot.kind(),
                actual: texture.kind(),
            });
        }
        slot.set(texture);
        Ok(())
    }

    // --- Binding ---

    /// Make the program current before a draw or dispatch.
    ///
    /// With a camera, the matrix uniforms named in [`CatalogOptions`] are
    /// uploaded first; `model` defaults to identity. Every allocated
    /// structured buffer is then bound to its binding point.
    pub fn bind(&self, camera: Option<&dyn Camera>, model: Option<&Mat4>) -> ShadingResult<()> {
        let (program, driver) = self.live()?;
        program.activate()?;

        if let Some(camera) = camera {
            let model = model.copied().unwrap_or(Mat4::IDENTITY);
            let matrices = CameraMatrices::new(camera, model);
            for (name, bytes) in matrices.named(&self.options.matrix_names) {
                let Some(entry) = self.reflection.uniforms.get(name) else {
                    continue;
                };
                if entry.byte_size() != bytes.len() as u64 {
                    log::warn!(
                        "Matrix uniform '{}' is {} bytes, expected {}, skipping",
                        name,
                        entry.byte_size(),
                        bytes.len()
                    );
                    continue;
                }
                upload(driver.as_ref(), entry, &bytes)?;
            }
        }

        for (name, entry) in &self.reflection.buffers {
            match &entry.buffer {
                Some(buffer) => driver.bind_buffer_base(entry.class, entry.binding, buffer.id())?,
                None => log::trace!("Buffer '{}' not allocated, not binding", name),
            }
        }
        Ok(())
    }
}

fn upload(driver: &dyn Driver, entry: &UniformEntry, data: &[u8]) -> ShadingResult<()> {
    let upload = entry.descriptor.upload().ok_or_else(|| {
        DriverError::InvalidValue(format!(
            "no upload call for type {} of '{}'",
            entry.descriptor.code, entry.name
        ))
    })?;
    log::trace!("Uploading uniform '{}' ({:?})", entry.name, upload);
    driver.set_uniform(entry.location, upload, entry.count, data)?;
    Ok(())
}
