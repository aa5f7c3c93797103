//! Common utilities for shading integration tests.

#![allow(dead_code)]

use std::sync::Arc;

use redlilium_shading::driver::{HeadlessDriver, HeadlessLimits, ProgramDeclaration, VariableRecord};
use redlilium_shading::types::TypeCode;
use redlilium_shading::ProgramCache;

/// Route `log` output through the test harness.
pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// A headless driver and a cache compiling through it.
pub struct Fixture {
    pub driver: Arc<HeadlessDriver>,
    pub cache: ProgramCache,
}

impl Fixture {
    pub fn new() -> Self {
        Self::with_limits(HeadlessLimits::default())
    }

    pub fn with_limits(limits: HeadlessLimits) -> Self {
        init_logging();
        let driver = Arc::new(HeadlessDriver::with_limits(limits));
        let cache = ProgramCache::new(driver.clone());
        Self { driver, cache }
    }

    pub fn declare(self, name: &str, declaration: ProgramDeclaration) -> Self {
        self.driver.declare_program(name, declaration);
        self
    }
}

// ============================================================================
// Program declarations
// ============================================================================

/// A `vec3[4]` uniform and a storage block with two float members.
pub fn offsets_program() -> ProgramDeclaration {
    ProgramDeclaration::graphics()
        .with_uniform("offsets", TypeCode::FLOAT_VEC3, 4)
        .with_storage_block(
            "block",
            0,
            [
                VariableRecord::new(0, TypeCode::FLOAT),
                VariableRecord::new(4, TypeCode::FLOAT),
            ],
        )
}

/// A forward-lit material program using every resource category.
pub fn lit_program() -> ProgramDeclaration {
    ProgramDeclaration::graphics()
        .with_uniform("modelMatrix", TypeCode::FLOAT_MAT4, 1)
        .with_uniform("normalModelMatrix", TypeCode::FLOAT_MAT3, 1)
        .with_uniform("viewMatrix", TypeCode::FLOAT_MAT4, 1)
        .with_uniform("viewModelMatrix", TypeCode::FLOAT_MAT4, 1)
        .with_uniform("normalViewModelMatrix", TypeCode::FLOAT_MAT3, 1)
        .with_uniform("projectionMatrix", TypeCode::FLOAT_MAT4, 1)
        .with_uniform("projectionViewModelMatrix", TypeCode::FLOAT_MAT4, 1)
        .with_uniform("baseColor", TypeCode::FLOAT_VEC4, 1)
        .with_uniform("albedoMap", TypeCode::SAMPLER_2D, 1)
        .with_uniform("environment", TypeCode::SAMPLER_CUBE, 1)
        .with_uniform("lightCount", TypeCode::UNSIGNED_INT, 1)
        .with_storage_block(
            "Lights",
            3,
            [VariableRecord::new(0, TypeCode::FLOAT_VEC4).with_array(16, 16)],
        )
}

/// A compute program with an output image, a storage block and two counters.
pub fn cull_program() -> ProgramDeclaration {
    ProgramDeclaration::compute()
        .with_uniform("instanceCount", TypeCode::UNSIGNED_INT, 1)
        .with_uniform("hiZ", TypeCode::IMAGE_2D, 1)
        .with_atomic_counter("visible", 1, 0)
        .with_atomic_counter("culled", 0, 0)
        .with_storage_block(
            "Instances",
            2,
            [
                VariableRecord::new(0, TypeCode::FLOAT_MAT4).with_array(0, 64),
            ],
        )
}
