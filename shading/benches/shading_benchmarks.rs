use std::sync::Arc;

use criterion::{Criterion, black_box, criterion_group, criterion_main};
use glam::{Mat4, Vec3};

use redlilium_shading::driver::{HeadlessDriver, ProgramDeclaration, VariableRecord};
use redlilium_shading::types::TypeCode;
use redlilium_shading::{ProgramCache, ShaderCatalog, StaticCamera};

fn material_program() -> ProgramDeclaration {
    let mut declaration = ProgramDeclaration::graphics()
        .with_uniform("modelMatrix", TypeCode::FLOAT_MAT4, 1)
        .with_uniform("normalModelMatrix", TypeCode::FLOAT_MAT3, 1)
        .with_uniform("projectionViewModelMatrix", TypeCode::FLOAT_MAT4, 1)
        .with_atomic_counter("fragments", 0, 0);
    for i in 0..32 {
        declaration = declaration.with_uniform(format!("param_{i}"), TypeCode::FLOAT_VEC4, 1);
    }
    for i in 0..4 {
        declaration = declaration.with_storage_block(
            format!("Block{i}"),
            i + 1,
            [VariableRecord::new(0, TypeCode::FLOAT_VEC4).with_array(0, 16)],
        );
    }
    declaration
}

fn setup() -> ProgramCache {
    let _ = env_logger::builder().is_test(true).try_init();
    let driver = Arc::new(HeadlessDriver::new());
    driver.declare_program("material", material_program());
    ProgramCache::new(driver)
}

// ---------------------------------------------------------------------------
// Reflection
// ---------------------------------------------------------------------------

fn bench_reflect(c: &mut Criterion) {
    let cache = setup();
    let program = cache.load_program("material");

    c.bench_function("catalog_reflect_41_resources", |b| {
        b.iter(|| {
            let catalog = ShaderCatalog::from_program(&cache, "material");
            black_box(&catalog);
        });
    });
    drop(program);
}

// ---------------------------------------------------------------------------
// Uniform upload
// ---------------------------------------------------------------------------

fn bench_set_uniform(c: &mut Criterion) {
    let cache = setup();
    let catalog = ShaderCatalog::from_program(&cache, "material");
    let value = [0.25f32, 0.5, 0.75, 1.0];

    c.bench_function("catalog_set_uniform_vec4", |b| {
        b.iter(|| catalog.set_uniform(black_box("param_17"), black_box(&value)));
    });
}

fn bench_bind_with_camera(c: &mut Criterion) {
    let cache = setup();
    let mut catalog = ShaderCatalog::from_program(&cache, "material");
    for i in 0..4 {
        let _ = catalog.set_buffer_size(&format!("Block{i}"), 256);
    }
    let camera = StaticCamera::new(
        Mat4::look_at_rh(Vec3::new(0.0, 2.0, 5.0), Vec3::ZERO, Vec3::Y),
        Mat4::perspective_rh(1.0, 1.5, 0.1, 100.0),
    );
    let model = Mat4::from_rotation_y(0.5);

    c.bench_function("catalog_bind_with_camera", |b| {
        b.iter(|| catalog.bind(Some(&camera), Some(black_box(&model))));
    });
}

// ---------------------------------------------------------------------------
// Buffers
// ---------------------------------------------------------------------------

fn bench_buffer_round_trip(c: &mut Criterion) {
    let cache = setup();
    let mut catalog = ShaderCatalog::from_program(&cache, "material");
    let data = vec![1.0f32; 4096];
    let mut out = vec![0.0f32; 4096];

    c.bench_function("catalog_buffer_round_trip_16kb", |b| {
        b.iter(|| {
            let _ = catalog.set_buffer_data("Block0", black_box(data.as_slice()));
            black_box(catalog.get_buffer_data("Block0", &mut out[..], 0))
        });
    });
}

criterion_group!(
    benches,
    bench_reflect,
    bench_set_uniform,
    bench_bind_with_camera,
    bench_buffer_round_trip,
);
criterion_main!(benches);
