//! Headless in-memory driver.
//!
//! This driver performs no GPU work. Programs are declared up front with a
//! [`ProgramDeclaration`] describing their resource interface, buffers are plain
//! byte vectors, and every uniform upload is recorded. It backs the test suite
//! and tools that need the binding layer without a graphics context.
//!
//! # Example
//!
//! ```
//! use redlilium_shading::driver::{HeadlessDriver, ProgramDeclaration};
//! use redlilium_shading::types::TypeCode;
//!
//! let driver = HeadlessDriver::new();
//! driver.declare_program(
//!     "tint",
//!     ProgramDeclaration::graphics().with_uniform("color", TypeCode::FLOAT_VEC4, 1),
//! );
//! ```

use std::collections::{BTreeMap, HashMap};

use parking_lot::Mutex;

use super::{
    BlockInterface, BlockRecord, BufferClass, BufferId, Driver, DriverError, DriverResult,
    LinkedProgram, ProgramId, ProgramKind, UniformRecord, VariableRecord,
};
use crate::types::{TypeCode, UniformUpload};

/// Resource limits of the headless driver.
///
/// Exceeding a limit reports [`DriverError::OutOfMemory`], which is how driver
/// exhaustion is exercised without real hardware.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HeadlessLimits {
    /// Maximum number of live buffer objects.
    pub max_buffers: usize,
    /// Maximum size of a single buffer in bytes.
    pub max_buffer_size: u64,
}

impl Default for HeadlessLimits {
    fn default() -> Self {
        Self {
            max_buffers: usize::MAX,
            max_buffer_size: 1 << 30, // 1 GB
        }
    }
}

#[derive(Debug, Clone)]
enum DeclaredUniform {
    Value {
        name: String,
        type_code: TypeCode,
        array_size: u32,
    },
    Counter {
        name: String,
        binding: u32,
        offset: u32,
    },
}

#[derive(Debug, Clone)]
struct DeclaredBlock {
    name: Option<String>,
    binding: u32,
    variables: Vec<VariableRecord>,
}

/// Resource interface a headless program reports once linked.
#[derive(Debug, Clone)]
pub struct ProgramDeclaration {
    kind: ProgramKind,
    uniforms: Vec<DeclaredUniform>,
    storage_blocks: Vec<DeclaredBlock>,
    unnamed_counter_blocks: Vec<u32>,
    link_error: Option<String>,
}

impl ProgramDeclaration {
    fn new(kind: ProgramKind) -> Self {
        Self {
            kind,
            uniforms: Vec::new(),
            storage_blocks: Vec::new(),
            unnamed_counter_blocks: Vec::new(),
            link_error: None,
        }
    }

    /// Declare a graphics program.
    pub fn graphics() -> Self {
        Self::new(ProgramKind::Graphics)
    }

    /// Declare a compute program.
    pub fn compute() -> Self {
        Self::new(ProgramKind::Compute)
    }

    /// Add a uniform, sampler or image. The type code is reported verbatim.
    pub fn with_uniform(mut self, name: impl Into<String>, type_code: TypeCode, array_size: u32) -> Self {
        self.uniforms.push(DeclaredUniform::Value {
            name: name.into(),
            type_code,
            array_size,
        });
        self
    }

    /// Add a shader storage block.
    pub fn with_storage_block(
        mut self,
        name: impl Into<String>,
        binding: u32,
        variables: impl IntoIterator<Item = VariableRecord>,
    ) -> Self {
        self.storage_blocks.push(DeclaredBlock {
            name: Some(name.into()),
            binding,
            variables: variables.into_iter().collect(),
        });
        self
    }

    /// Add a shader storage block whose name the driver does not report.
    pub fn with_unnamed_storage_block(
        mut self,
        binding: u32,
        variables: impl IntoIterator<Item = VariableRecord>,
    ) -> Self {
        self.storage_blocks.push(DeclaredBlock {
            name: None,
            binding,
            variables: variables.into_iter().collect(),
        });
        self
    }

    /// Add an atomic counter. Counters sharing a binding share one counter block.
    pub fn with_atomic_counter(mut self, name: impl Into<String>, binding: u32, offset: u32) -> Self {
        self.uniforms.push(DeclaredUniform::Counter {
            name: name.into(),
            binding,
            offset,
        });
        self
    }

    /// Add an atomic-counter block that no named counter refers to.
    pub fn with_unnamed_counter_block(mut self, binding: u32) -> Self {
        self.unnamed_counter_blocks.push(binding);
        self
    }

    /// Make linking fail with the given log.
    pub fn with_link_error(mut self, log: impl Into<String>) -> Self {
        self.link_error = Some(log.into());
        self
    }

    fn uniform_records(&self) -> Vec<UniformRecord> {
        self.uniforms
            .iter()
            .enumerate()
            .map(|(index, uniform)| match uniform {
                DeclaredUniform::Value {
                    name,
                    type_code,
                    array_size,
                } => UniformRecord {
                    index: index as u32,
                    name: name.clone(),
                    type_code: *type_code,
                    array_size: *array_size,
                    atomic_binding: None,
                },
                DeclaredUniform::Counter { name, binding, .. } => UniformRecord {
                    index: index as u32,
                    name: name.clone(),
                    type_code: TypeCode::UNSIGNED_INT_ATOMIC_COUNTER,
                    array_size: 1,
                    atomic_binding: Some(*binding),
                },
            })
            .collect()
    }

    fn block_records(&self, interface: BlockInterface) -> Vec<BlockRecord> {
        match interface {
            BlockInterface::ShaderStorage => self
                .storage_blocks
                .iter()
                .enumerate()
                .map(|(index, block)| BlockRecord {
                    index: index as u32,
                    name: block.name.clone(),
                    binding: block.binding,
                    variables: block.variables.clone(),
                })
                .collect(),
            BlockInterface::AtomicCounter => {
                // Counter blocks are reported in ascending binding order.
                let mut blocks: BTreeMap<u32, Vec<VariableRecord>> = BTreeMap::new();
                for uniform in &self.uniforms {
                    if let DeclaredUniform::Counter {
                        binding, offset, ..
                    } = uniform
                    {
                        blocks.entry(*binding).or_default().push(VariableRecord::new(
                            *offset,
                            TypeCode::UNSIGNED_INT_ATOMIC_COUNTER,
                        ));
                    }
                }
                for binding in &self.unnamed_counter_blocks {
                    blocks.entry(*binding).or_default().push(VariableRecord::new(
                        0,
                        TypeCode::UNSIGNED_INT_ATOMIC_COUNTER,
                    ));
                }
                blocks
                    .into_iter()
                    .enumerate()
                    .map(|(index, (binding, variables))| BlockRecord {
                        index: index as u32,
                        name: None,
                        binding,
                        variables,
                    })
                    .collect()
            }
        }
    }
}

/// A uniform value recorded by the headless driver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadedUniform {
    pub upload: UniformUpload,
    pub count: u32,
    pub data: Vec<u8>,
}

#[derive(Debug)]
struct HeadlessBuffer {
    class: BufferClass,
    data: Vec<u8>,
}

#[derive(Debug, Default)]
struct HeadlessState {
    declarations: HashMap<String, ProgramDeclaration>,
    programs: HashMap<ProgramId, ProgramDeclaration>,
    compile_counts: HashMap<String, u32>,
    next_program: u32,
    current_program: Option<ProgramId>,
    uniforms: HashMap<(ProgramId, u32), UploadedUniform>,
    upload_count: u64,
    buffers: HashMap<BufferId, HeadlessBuffer>,
    next_buffer: u32,
    bindings: HashMap<(BufferClass, u32), BufferId>,
    calls: u64,
}

impl HeadlessState {
    fn buffer(&self, id: BufferId) -> DriverResult<&HeadlessBuffer> {
        self.buffers.get(&id).ok_or(DriverError::InvalidHandle {
            kind: "buffer",
            id: id.0,
        })
    }

    fn buffer_mut(&mut self, id: BufferId) -> DriverResult<&mut HeadlessBuffer> {
        self.buffers.get_mut(&id).ok_or(DriverError::InvalidHandle {
            kind: "buffer",
            id: id.0,
        })
    }

    fn program(&self, id: ProgramId) -> DriverResult<&ProgramDeclaration> {
        self.programs.get(&id).ok_or(DriverError::InvalidHandle {
            kind: "program",
            id: id.0,
        })
    }
}

/// In-memory driver.
#[derive(Debug, Default)]
pub struct HeadlessDriver {
    limits: HeadlessLimits,
    state: Mutex<HeadlessState>,
}

impl HeadlessDriver {
    /// Create a headless driver with default limits.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a headless driver with the given limits.
    pub fn with_limits(limits: HeadlessLimits) -> Self {
        Self {
            limits,
            state: Mutex::new(HeadlessState::default()),
        }
    }

    /// Get the configured limits.
    pub fn limits(&self) -> &HeadlessLimits {
        &self.limits
    }

    /// Declare (or redeclare) the interface the named program links to.
    ///
    /// Already linked programs keep the interface they were compiled with.
    pub fn declare_program(&self, name: impl Into<String>, declaration: ProgramDeclaration) {
        self.state.lock().declarations.insert(name.into(), declaration);
    }

    /// Forget a program declaration, so later compiles report it as missing.
    pub fn remove_program(&self, name: &str) -> bool {
        self.state.lock().declarations.remove(name).is_some()
    }

    /// Number of compile attempts for the named program.
    pub fn compile_count(&self, name: &str) -> u32 {
        self.state
            .lock()
            .compile_counts
            .get(name)
            .copied()
            .unwrap_or(0)
    }

    /// Program currently in use.
    pub fn current_program(&self) -> Option<ProgramId> {
        self.state.lock().current_program
    }

    /// Last value uploaded to a uniform location of a program.
    pub fn uploaded_uniform(&self, program: ProgramId, location: u32) -> Option<UploadedUniform> {
        self.state.lock().uniforms.get(&(program, location)).cloned()
    }

    /// Total number of accepted uniform uploads.
    pub fn upload_count(&self) -> u64 {
        self.state.lock().upload_count
    }

    /// Total number of driver calls made through the [`Driver`] trait.
    pub fn call_count(&self) -> u64 {
        self.state.lock().calls
    }

    /// Buffer bound to a binding point, if any.
    pub fn bound_buffer(&self, class: BufferClass, binding: u32) -> Option<BufferId> {
        self.state.lock().bindings.get(&(class, binding)).copied()
    }

    /// Copy of a buffer's contents.
    pub fn buffer_contents(&self, buffer: BufferId) -> Option<Vec<u8>> {
        self.state
            .lock()
            .buffers
            .get(&buffer)
            .map(|buffer| buffer.data.clone())
    }

    /// Number of live buffer objects.
    pub fn live_buffers(&self) -> usize {
        self.state.lock().buffers.len()
    }

    /// Number of live linked programs.
    pub fn live_programs(&self) -> usize {
        self.state.lock().programs.len()
    }

    fn check_size(&self, size: u64) -> DriverResult<()> {
        if size > self.limits.max_buffer_size {
            log::error!(
                "HeadlessDriver: buffer size {} exceeds maximum {}",
                size,
                self.limits.max_buffer_size
            );
            return Err(DriverError::OutOfMemory);
        }
        Ok(())
    }
}

impl Driver for HeadlessDriver {
    fn name(&self) -> &'static str {
        "Headless"
    }

    fn compile_program(&self, name: &str) -> DriverResult<LinkedProgram> {
        let mut state = self.state.lock();
        state.calls += 1;
        *state.compile_counts.entry(name.to_string()).or_default() += 1;

        let declaration = state
            .declarations
            .get(name)
            .cloned()
            .ok_or_else(|| DriverError::ProgramNotFound(name.to_string()))?;
        if let Some(log) = &declaration.link_error {
            return Err(DriverError::LinkFailed {
                program: name.to_string(),
                log: log.clone(),
            });
        }

        state.next_program += 1;
        let id = ProgramId(state.next_program);
        let kind = declaration.kind;
        state.programs.insert(id, declaration);
        log::trace!("HeadlessDriver: linked program '{}' as {:?}", name, id);
        Ok(LinkedProgram { id, kind })
    }

    fn delete_program(&self, program: ProgramId) {
        let mut state = self.state.lock();
        state.calls += 1;
        state.programs.remove(&program);
        state.uniforms.retain(|(owner, _), _| *owner != program);
        if state.current_program == Some(program) {
            state.current_program = None;
        }
        log::trace!("HeadlessDriver: deleted program {:?}", program);
    }

    fn use_program(&self, program: ProgramId) -> DriverResult<()> {
        let mut state = self.state.lock();
        state.calls += 1;
        state.program(program)?;
        state.current_program = Some(program);
        Ok(())
    }

    fn active_uniforms(&self, program: ProgramId) -> DriverResult<Vec<UniformRecord>> {
        let mut state = self.state.lock();
        state.calls += 1;
        Ok(state.program(program)?.uniform_records())
    }

    fn active_blocks(
        &self,
        program: ProgramId,
        interface: BlockInterface,
    ) -> DriverResult<Vec<BlockRecord>> {
        let mut state = self.state.lock();
        state.calls += 1;
        Ok(state.program(program)?.block_records(interface))
    }

    fn set_uniform(
        &self,
        location: u32,
        upload: UniformUpload,
        count: u32,
        data: &[u8],
    ) -> DriverResult<()> {
        let mut state = self.state.lock();
        state.calls += 1;
        let program = state.current_program.ok_or(DriverError::NoActiveProgram)?;
        if location as usize >= state.program(program)?.uniforms.len() {
            return Err(DriverError::InvalidHandle {
                kind: "uniform location",
                id: location,
            });
        }
        let expected = upload.element_size() as usize * count as usize;
        if data.len() != expected {
            return Err(DriverError::InvalidValue(format!(
                "{:?} x{} expects {} bytes, got {}",
                upload,
                count,
                expected,
                data.len()
            )));
        }

        log::trace!(
            "HeadlessDriver: set_uniform program={:?} location={} {:?} x{}",
            program,
            location,
            upload,
            count
        );
        state.uniforms.insert(
            (program, location),
            UploadedUniform {
                upload,
                count,
                data: data.to_vec(),
            },
        );
        state.upload_count += 1;
        Ok(())
    }

    fn create_buffer(&self, class: BufferClass) -> DriverResult<BufferId> {
        let mut state = self.state.lock();
        state.calls += 1;
        if state.buffers.len() >= self.limits.max_buffers {
            log::error!(
                "HeadlessDriver: buffer limit of {} reached",
                self.limits.max_buffers
            );
            return Err(DriverError::OutOfMemory);
        }
        state.next_buffer += 1;
        let id = BufferId(state.next_buffer);
        state.buffers.insert(
            id,
            HeadlessBuffer {
                class,
                data: Vec::new(),
            },
        );
        log::trace!("HeadlessDriver: created {:?} buffer {:?}", class, id);
        Ok(id)
    }

    fn destroy_buffer(&self, buffer: BufferId) {
        let mut state = self.state.lock();
        state.calls += 1;
        state.buffers.remove(&buffer);
        state.bindings.retain(|_, bound| *bound != buffer);
        log::trace!("HeadlessDriver: destroyed buffer {:?}", buffer);
    }

    fn buffer_data(&self, buffer: BufferId, data: &[u8]) -> DriverResult<()> {
        self.check_size(data.len() as u64)?;
        let mut state = self.state.lock();
        state.calls += 1;
        let target = state.buffer_mut(buffer)?;
        target.data.clear();
        target.data.extend_from_slice(data);
        log::trace!(
            "HeadlessDriver: buffer_data {:?} len={}",
            buffer,
            data.len()
        );
        Ok(())
    }

    fn resize_buffer(&self, buffer: BufferId, size: u64) -> DriverResult<()> {
        self.check_size(size)?;
        let mut state = self.state.lock();
        state.calls += 1;
        let target = state.buffer_mut(buffer)?;
        target.data = vec![0u8; size as usize];
        log::trace!("HeadlessDriver: resize_buffer {:?} size={}", buffer, size);
        Ok(())
    }

    fn buffer_size(&self, buffer: BufferId) -> DriverResult<u64> {
        let mut state = self.state.lock();
        state.calls += 1;
        Ok(state.buffer(buffer)?.data.len() as u64)
    }

    fn read_buffer(&self, buffer: BufferId, offset: u64, dst: &mut [u8]) -> DriverResult<()> {
        let mut state = self.state.lock();
        state.calls += 1;
        let source = &state.buffer(buffer)?.data;
        let size = source.len() as u64;
        let end = offset + dst.len() as u64;
        if end > size {
            return Err(DriverError::OutOfRange { offset, end, size });
        }
        dst.copy_from_slice(&source[offset as usize..end as usize]);
        log::trace!(
            "HeadlessDriver: read_buffer {:?} offset={} size={}",
            buffer,
            offset,
            dst.len()
        );
        Ok(())
    }

    fn bind_buffer_base(
        &self,
        class: BufferClass,
        binding: u32,
        buffer: BufferId,
    ) -> DriverResult<()> {
        let mut state = self.state.lock();
        state.calls += 1;
        let target_class = state.buffer(buffer)?.class;
        if target_class != class {
            return Err(DriverError::InvalidValue(format!(
                "{:?} buffer {:?} cannot bind as {:?}",
                target_class, buffer, class
            )));
        }
        state.bindings.insert((class, binding), buffer);
        log::trace!(
            "HeadlessDriver: bound {:?} buffer {:?} at {}",
            class,
            buffer,
            binding
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn driver_with(name: &str, declaration: ProgramDeclaration) -> HeadlessDriver {
        let driver = HeadlessDriver::new();
        driver.declare_program(name, declaration);
        driver
    }

    #[test]
    fn test_driver_name() {
        assert_eq!(HeadlessDriver::new().name(), "Headless");
    }

    #[test]
    fn test_compile_unknown_program() {
        let driver = HeadlessDriver::new();
        assert_eq!(
            driver.compile_program("missing"),
            Err(DriverError::ProgramNotFound("missing".to_string()))
        );
        assert_eq!(driver.compile_count("missing"), 1);
    }

    #[test]
    fn test_compile_link_error() {
        let driver = driver_with("broken", ProgramDeclaration::graphics().with_link_error("oops"));
        assert!(matches!(
            driver.compile_program("broken"),
            Err(DriverError::LinkFailed { .. })
        ));
        assert_eq!(driver.live_programs(), 0);
    }

    #[test]
    fn test_program_ids_are_not_reused() {
        let driver = driver_with("p", ProgramDeclaration::compute());
        let first = driver.compile_program("p").unwrap();
        driver.delete_program(first.id);
        let second = driver.compile_program("p").unwrap();
        assert_ne!(first.id, second.id);
        assert_eq!(second.kind, ProgramKind::Compute);
        assert_eq!(driver.compile_count("p"), 2);
    }

    #[test]
    fn test_uniform_records_keep_declaration_order() {
        let driver = driver_with(
            "p",
            ProgramDeclaration::graphics()
                .with_uniform("a", TypeCode::FLOAT, 1)
                .with_atomic_counter("hits", 2, 0)
                .with_uniform("b", TypeCode::INT, 3),
        );
        let program = driver.compile_program("p").unwrap().id;
        let records = driver.active_uniforms(program).unwrap();
        let names: Vec<_> = records.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, ["a", "hits", "b"]);
        assert_eq!(records[1].atomic_binding, Some(2));
        assert_eq!(records[2].index, 2);
        assert_eq!(records[2].array_size, 3);
    }

    #[test]
    fn test_counter_blocks_grouped_by_binding() {
        let driver = driver_with(
            "p",
            ProgramDeclaration::compute()
                .with_atomic_counter("late", 3, 0)
                .with_atomic_counter("early", 1, 0)
                .with_atomic_counter("early_b", 1, 4),
        );
        let program = driver.compile_program("p").unwrap().id;
        let blocks = driver
            .active_blocks(program, BlockInterface::AtomicCounter)
            .unwrap();
        assert_eq!(blocks.len(), 2);
        assert_eq!(blocks[0].binding, 1);
        assert_eq!(blocks[0].variables.len(), 2);
        assert_eq!(blocks[1].binding, 3);
        assert!(blocks.iter().all(|b| b.name.is_none()));
    }

    #[test]
    fn test_set_uniform_requires_current_program() {
        let driver = driver_with(
            "p",
            ProgramDeclaration::graphics().with_uniform("f", TypeCode::FLOAT, 1),
        );
        let program = driver.compile_program("p").unwrap().id;
        let data = 1.0f32.to_ne_bytes();
        assert_eq!(
            driver.set_uniform(0, UniformUpload::Float(1), 1, &data),
            Err(DriverError::NoActiveProgram)
        );
        driver.use_program(program).unwrap();
        driver
            .set_uniform(0, UniformUpload::Float(1), 1, &data)
            .unwrap();
        let uploaded = driver.uploaded_uniform(program, 0).unwrap();
        assert_eq!(uploaded.data, data);
        assert_eq!(driver.upload_count(), 1);
    }

    #[test]
    fn test_set_uniform_rejects_wrong_length() {
        let driver = driver_with(
            "p",
            ProgramDeclaration::graphics().with_uniform("v", TypeCode::FLOAT_VEC3, 1),
        );
        let program = driver.compile_program("p").unwrap().id;
        driver.use_program(program).unwrap();
        let result = driver.set_uniform(0, UniformUpload::Float(3), 1, &[0u8; 8]);
        assert!(matches!(result, Err(DriverError::InvalidValue(_))));
        assert_eq!(driver.upload_count(), 0);
    }

    #[test]
    fn test_buffer_lifecycle() {
        let driver = HeadlessDriver::new();
        let buffer = driver.create_buffer(BufferClass::Storage).unwrap();
        assert_eq!(driver.buffer_size(buffer).unwrap(), 0);

        driver.buffer_data(buffer, &[1, 2, 3, 4]).unwrap();
        let mut out = [0u8; 2];
        driver.read_buffer(buffer, 2, &mut out).unwrap();
        assert_eq!(out, [3, 4]);

        driver.resize_buffer(buffer, 16).unwrap();
        assert_eq!(driver.buffer_size(buffer).unwrap(), 16);

        driver.destroy_buffer(buffer);
        assert_eq!(driver.live_buffers(), 0);
        assert!(driver.buffer_size(buffer).is_err());
    }

    #[test]
    fn test_read_out_of_range() {
        let driver = HeadlessDriver::new();
        let buffer = driver.create_buffer(BufferClass::Storage).unwrap();
        driver.buffer_data(buffer, &[0; 4]).unwrap();
        let mut out = [0u8; 4];
        assert_eq!(
            driver.read_buffer(buffer, 2, &mut out),
            Err(DriverError::OutOfRange {
                offset: 2,
                end: 6,
                size: 4
            })
        );
    }

    #[test]
    fn test_limits() {
        let driver = HeadlessDriver::with_limits(HeadlessLimits {
            max_buffers: 1,
            max_buffer_size: 8,
        });
        let buffer = driver.create_buffer(BufferClass::Storage).unwrap();
        assert_eq!(
            driver.create_buffer(BufferClass::Storage),
            Err(DriverError::OutOfMemory)
        );
        assert_eq!(driver.resize_buffer(buffer, 9), Err(DriverError::OutOfMemory));
        assert!(driver.resize_buffer(buffer, 8).is_ok());
    }

    #[test]
    fn test_bind_checks_class() {
        let driver = HeadlessDriver::new();
        let buffer = driver.create_buffer(BufferClass::AtomicCounter).unwrap();
        assert!(driver
            .bind_buffer_base(BufferClass::Storage, 0, buffer)
            .is_err());
        driver
            .bind_buffer_base(BufferClass::AtomicCounter, 0, buffer)
            .unwrap();
        assert_eq!(
            driver.bound_buffer(BufferClass::AtomicCounter, 0),
            Some(buffer)
        );

        driver.destroy_buffer(buffer);
        assert_eq!(driver.bound_buffer(BufferClass::AtomicCounter, 0), None);
    }
}
