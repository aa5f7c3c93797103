//! Driver type codes and the static type catalog.
//!
//! The driver reports every shader variable with a numeric type code. The
//! [`TypeCatalog`] maps those codes to a [`TypeClass`]: a plain value type with
//! a known byte size, a sampler, an image, or an atomic counter. Value types
//! carry a [`TypeDescriptor`] which the binding layer uses to validate the size
//! of caller-supplied data and to pick the upload call.
//!
//! Codes use the OpenGL numeric values so that a GL-family driver can pass its
//! enums through unchanged.

use std::fmt;

/// Numeric type code reported by the driver for a shader variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TypeCode(pub u32);

impl TypeCode {
    pub const FLOAT: Self = Self(0x1406);
    pub const FLOAT_VEC2: Self = Self(0x8B50);
    pub const FLOAT_VEC3: Self = Self(0x8B51);
    pub const FLOAT_VEC4: Self = Self(0x8B52);
    pub const DOUBLE: Self = Self(0x140A);
    pub const DOUBLE_VEC2: Self = Self(0x8FFC);
    pub const DOUBLE_VEC3: Self = Self(0x8FFD);
    pub const DOUBLE_VEC4: Self = Self(0x8FFE);
    pub const INT: Self = Self(0x1404);
    pub const INT_VEC2: Self = Self(0x8B53);
    pub const INT_VEC3: Self = Self(0x8B54);
    pub const INT_VEC4: Self = Self(0x8B55);
    pub const UNSIGNED_INT: Self = Self(0x1405);
    pub const UNSIGNED_INT_VEC2: Self = Self(0x8DC6);
    pub const UNSIGNED_INT_VEC3: Self = Self(0x8DC7);
    pub const UNSIGNED_INT_VEC4: Self = Self(0x8DC8);
    pub const BOOL: Self = Self(0x8B56);
    pub const BOOL_VEC2: Self = Self(0x8B57);
    pub const BOOL_VEC3: Self = Self(0x8B58);
    pub const BOOL_VEC4: Self = Self(0x8B59);
    pub const FLOAT_MAT2: Self = Self(0x8B5A);
    pub const FLOAT_MAT3: Self = Self(0x8B5B);
    pub const FLOAT_MAT4: Self = Self(0x8B5C);
    pub const FLOAT_MAT2X3: Self = Self(0x8B65);
    pub const FLOAT_MAT2X4: Self = Self(0x8B66);
    pub const FLOAT_MAT3X2: Self = Self(0x8B67);
    pub const FLOAT_MAT3X4: Self = Self(0x8B68);
    pub const FLOAT_MAT4X2: Self = Self(0x8B69);
    pub const FLOAT_MAT4X3: Self = Self(0x8B6A);
    pub const DOUBLE_MAT2: Self = Self(0x8F46);
    pub const DOUBLE_MAT3: Self = Self(0x8F47);
    pub const DOUBLE_MAT4: Self = Self(0x8F48);
    pub const DOUBLE_MAT2X3: Self = Self(0x8F49);
    pub const DOUBLE_MAT2X4: Self = Self(0x8F4A);
    pub const DOUBLE_MAT3X2: Self = Self(0x8F4B);
    pub const DOUBLE_MAT3X4: Self = Self(0x8F4C);
    pub const DOUBLE_MAT4X2: Self = Self(0x8F4D);
    pub const DOUBLE_MAT4X3: Self = Self(0x8F4E);
    pub const SAMPLER_2D: Self = Self(0x8B5E);
    pub const SAMPLER_3D: Self = Self(0x8B5F);
    pub const SAMPLER_CUBE: Self = Self(0x8B60);
    pub const IMAGE_2D: Self = Self(0x904D);
    pub const IMAGE_3D: Self = Self(0x904E);
    pub const IMAGE_CUBE: Self = Self(0x9050);
    pub const UNSIGNED_INT_ATOMIC_COUNTER: Self = Self(0x92DB);
}

impl fmt::Display for TypeCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:04X}", self.0)
    }
}

/// Scalar component type of a value type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScalarKind {
    Float,
    Double,
    Int,
    Uint,
    /// Booleans occupy four bytes per component on the CPU side.
    Bool,
}

impl ScalarKind {
    /// Size of one component in bytes.
    pub const fn byte_size(self) -> u32 {
        match self {
            Self::Double => 8,
            Self::Float | Self::Int | Self::Uint | Self::Bool => 4,
        }
    }
}

/// Dimensionality of a value type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Shape {
    Scalar,
    Vector(u8),
    Matrix { columns: u8, rows: u8 },
}

impl Shape {
    /// Number of scalar components.
    pub const fn components(self) -> u32 {
        match self {
            Self::Scalar => 1,
            Self::Vector(n) => n as u32,
            Self::Matrix { columns, rows } => columns as u32 * rows as u32,
        }
    }
}

/// Semantic description of a plain value type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TypeDescriptor {
    /// Driver code this descriptor was built for.
    pub code: TypeCode,
    /// Component type.
    pub scalar: ScalarKind,
    /// Scalar, vector or matrix.
    pub shape: Shape,
    /// Tightly packed size of one element in bytes.
    pub byte_size: u32,
}

impl TypeDescriptor {
    const fn new(code: TypeCode, scalar: ScalarKind, shape: Shape) -> Self {
        Self {
            code,
            scalar,
            shape,
            byte_size: shape.components() * scalar.byte_size(),
        }
    }

    /// Descriptor used for members of atomic-counter buffers.
    pub const ATOMIC_COUNTER: Self = Self::new(
        TypeCode::UNSIGNED_INT_ATOMIC_COUNTER,
        ScalarKind::Uint,
        Shape::Scalar,
    );

    /// Select the driver upload call for this type.
    ///
    /// Booleans are uploaded through the integer path. Returns `None` for
    /// combinations the driver has no upload call for (integer matrices).
    pub fn upload(&self) -> Option<UniformUpload> {
        let upload = match (self.scalar, self.shape) {
            (ScalarKind::Float, Shape::Scalar) => UniformUpload::Float(1),
            (ScalarKind::Float, Shape::Vector(n)) => UniformUpload::Float(n),
            (ScalarKind::Double, Shape::Scalar) => UniformUpload::Double(1),
            (ScalarKind::Double, Shape::Vector(n)) => UniformUpload::Double(n),
            (ScalarKind::Int | ScalarKind::Bool, Shape::Scalar) => UniformUpload::Int(1),
            (ScalarKind::Int | ScalarKind::Bool, Shape::Vector(n)) => UniformUpload::Int(n),
            (ScalarKind::Uint, Shape::Scalar) => UniformUpload::Uint(1),
            (ScalarKind::Uint, Shape::Vector(n)) => UniformUpload::Uint(n),
            (ScalarKind::Float, Shape::Matrix { columns, rows }) => {
                UniformUpload::FloatMatrix { columns, rows }
            }
            (ScalarKind::Double, Shape::Matrix { columns, rows }) => {
                UniformUpload::DoubleMatrix { columns, rows }
            }
            (ScalarKind::Int | ScalarKind::Uint | ScalarKind::Bool, Shape::Matrix { .. }) => {
                return None;
            }
        };
        Some(upload)
    }
}

/// Driver upload call selected for a uniform.
///
/// Vector variants carry the component count (1 to 4).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UniformUpload {
    Float(u8),
    Double(u8),
    Int(u8),
    Uint(u8),
    FloatMatrix { columns: u8, rows: u8 },
    DoubleMatrix { columns: u8, rows: u8 },
}

impl UniformUpload {
    /// Bytes consumed per uniform element by this upload call.
    pub fn element_size(self) -> u32 {
        match self {
            Self::Float(n) | Self::Int(n) | Self::Uint(n) => 4 * n as u32,
            Self::Double(n) => 8 * n as u32,
            Self::FloatMatrix { columns, rows } => 4 * columns as u32 * rows as u32,
            Self::DoubleMatrix { columns, rows } => 8 * columns as u32 * rows as u32,
        }
    }
}

/// Kind of texture a sampler or image slot expects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextureKind {
    Image2d,
    Image3d,
    Cubemap,
}

/// Classification of a driver type code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeClass {
    /// Plain value uniform or buffer member.
    Value(TypeDescriptor),
    /// Combined texture sampler.
    Sampler(TextureKind),
    /// Storage image.
    Image(TextureKind),
    /// Atomic counter; lives in an atomic-counter buffer.
    AtomicCounter,
}

use ScalarKind::{Bool, Double, Float, Int, Uint};

const fn vector(n: u8) -> Shape {
    Shape::Vector(n)
}

const fn matrix(columns: u8, rows: u8) -> Shape {
    Shape::Matrix { columns, rows }
}

const VALUE_TYPES: &[TypeDescriptor] = &[
    TypeDescriptor::new(TypeCode::FLOAT, Float, Shape::Scalar),
    TypeDescriptor::new(TypeCode::FLOAT_VEC2, Float, vector(2)),
    TypeDescriptor::new(TypeCode::FLOAT_VEC3, Float, vector(3)),
    TypeDescriptor::new(TypeCode::FLOAT_VEC4, Float, vector(4)),
    TypeDescriptor::new(TypeCode::DOUBLE, Double, Shape::Scalar),
    TypeDescriptor::new(TypeCode::DOUBLE_VEC2, Double, vector(2)),
    TypeDescriptor::new(TypeCode::DOUBLE_VEC3, Double, vector(3)),
    TypeDescriptor::new(TypeCode::DOUBLE_VEC4, Double, vector(4)),
    TypeDescriptor::new(TypeCode::INT, Int, Shape::Scalar),
    TypeDescriptor::new(TypeCode::INT_VEC2, Int, vector(2)),
    TypeDescriptor::new(TypeCode::INT_VEC3, Int, vector(3)),
    TypeDescriptor::new(TypeCode::INT_VEC4, Int, vector(4)),
    TypeDescriptor::new(TypeCode::UNSIGNED_INT, Uint, Shape::Scalar),
    TypeDescriptor::new(TypeCode::UNSIGNED_INT_VEC2, Uint, vector(2)),
    TypeDescriptor::new(TypeCode::UNSIGNED_INT_VEC3, Uint, vector(3)),
    TypeDescriptor::new(TypeCode::UNSIGNED_INT_VEC4, Uint, vector(4)),
    TypeDescriptor::new(TypeCode::BOOL, Bool, Shape::Scalar),
    TypeDescriptor::new(TypeCode::BOOL_VEC2, Bool, vector(2)),
    TypeDescriptor::new(TypeCode::BOOL_VEC3, Bool, vector(3)),
    TypeDescriptor::new(TypeCode::BOOL_VEC4, Bool, vector(4)),
    TypeDescriptor::new(TypeCode::FLOAT_MAT2, Float, matrix(2, 2)),
    TypeDescriptor::new(TypeCode::FLOAT_MAT3, Float, matrix(3, 3)),
    TypeDescriptor::new(TypeCode::FLOAT_MAT4, Float, matrix(4, 4)),
    TypeDescriptor::new(TypeCode::FLOAT_MAT2X3, Float, matrix(2, 3)),
    TypeDescriptor::new(TypeCode::FLOAT_MAT2X4, Float, matrix(2, 4)),
    TypeDescriptor::new(TypeCode::FLOAT_MAT3X2, Float, matrix(3, 2)),
    TypeDescriptor::new(TypeCode::FLOAT_MAT3X4, Float, matrix(3, 4)),
    TypeDescriptor::new(TypeCode::FLOAT_MAT4X2, Float, matrix(4, 2)),
    TypeDescriptor::new(TypeCode::FLOAT_MAT4X3, Float, matrix(4, 3)),
    TypeDescriptor::new(TypeCode::DOUBLE_MAT2, Double, matrix(2, 2)),
    TypeDescriptor::new(TypeCode::DOUBLE_MAT3, Double, matrix(3, 3)),
    TypeDescriptor::new(TypeCode::DOUBLE_MAT4, Double, matrix(4, 4)),
    TypeDescriptor::new(TypeCode::DOUBLE_MAT2X3, Double, matrix(2, 3)),
    TypeDescriptor::new(TypeCode::DOUBLE_MAT2X4, Double, matrix(2, 4)),
    TypeDescriptor::new(TypeCode::DOUBLE_MAT3X2, Double, matrix(3, 2)),
    TypeDescriptor::new(TypeCode::DOUBLE_MAT3X4, Double, matrix(3, 4)),
    TypeDescriptor::new(TypeCode::DOUBLE_MAT4X2, Double, matrix(4, 2)),
    TypeDescriptor::new(TypeCode::DOUBLE_MAT4X3, Double, matrix(4, 3)),
];

const SAMPLER_TYPES: &[(TypeCode, TextureKind)] = &[
    (TypeCode::SAMPLER_2D, TextureKind::Image2d),
    (TypeCode::SAMPLER_3D, TextureKind::Image3d),
    (TypeCode::SAMPLER_CUBE, TextureKind::Cubemap),
];

const IMAGE_TYPES: &[(TypeCode, TextureKind)] = &[
    (TypeCode::IMAGE_2D, TextureKind::Image2d),
    (TypeCode::IMAGE_3D, TextureKind::Image3d),
    (TypeCode::IMAGE_CUBE, TextureKind::Cubemap),
];

/// Process-wide, immutable mapping from driver type codes to type classes.
pub struct TypeCatalog;

impl TypeCatalog {
    /// Classify a driver type code. Returns `None` for unrecognized codes.
    pub fn classify(code: TypeCode) -> Option<TypeClass> {
        if code == TypeCode::UNSIGNED_INT_ATOMIC_COUNTER {
            return Some(TypeClass::AtomicCounter);
        }
        if let Some(descriptor) = Self::value(code) {
            return Some(TypeClass::Value(descriptor));
        }
        if let Some(&(_, kind)) = SAMPLER_TYPES.iter().find(|(c, _)| *c == code) {
            return Some(TypeClass::Sampler(kind));
        }
        IMAGE_TYPES
            .iter()
            .find(|(c, _)| *c == code)
            .map(|&(_, kind)| TypeClass::Image(kind))
    }

    /// Look up the descriptor of a plain value type.
    pub fn value(code: TypeCode) -> Option<TypeDescriptor> {
        VALUE_TYPES.iter().find(|d| d.code == code).copied()
    }

    /// Descriptor for a member of a structured buffer.
    ///
    /// Atomic counters are accepted here since they are the members of
    /// atomic-counter buffers.
    pub fn member(code: TypeCode) -> Option<TypeDescriptor> {
        if code == TypeCode::UNSIGNED_INT_ATOMIC_COUNTER {
            Some(TypeDescriptor::ATOMIC_COUNTER)
        } else {
            Self::value(code)
        }
    }

    /// All value types known to the catalog.
    pub fn value_types() -> impl Iterator<Item = &'static TypeDescriptor> {
        VALUE_TYPES.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_value_sizes() {
        let size = |code| TypeCatalog::value(code).unwrap().byte_size;
        assert_eq!(size(TypeCode::FLOAT), 4);
        assert_eq!(size(TypeCode::FLOAT_VEC3), 12);
        assert_eq!(size(TypeCode::DOUBLE_VEC2), 16);
        assert_eq!(size(TypeCode::BOOL_VEC2), 8);
        assert_eq!(size(TypeCode::FLOAT_MAT3), 36);
        assert_eq!(size(TypeCode::FLOAT_MAT4), 64);
        assert_eq!(size(TypeCode::FLOAT_MAT2X3), 24);
        assert_eq!(size(TypeCode::DOUBLE_MAT3X4), 96);
    }

    #[test]
    fn test_codes_are_unique() {
        let mut seen = HashSet::new();
        for descriptor in TypeCatalog::value_types() {
            assert!(seen.insert(descriptor.code), "duplicate {}", descriptor.code);
        }
        for (code, _) in SAMPLER_TYPES.iter().chain(IMAGE_TYPES) {
            assert!(seen.insert(*code), "duplicate {code}");
        }
        assert!(!seen.contains(&TypeCode::UNSIGNED_INT_ATOMIC_COUNTER));
    }

    #[test]
    fn test_classify() {
        assert!(matches!(
            TypeCatalog::classify(TypeCode::FLOAT_VEC4),
            Some(TypeClass::Value(_))
        ));
        assert_eq!(
            TypeCatalog::classify(TypeCode::SAMPLER_CUBE),
            Some(TypeClass::Sampler(TextureKind::Cubemap))
        );
        assert_eq!(
            TypeCatalog::classify(TypeCode::IMAGE_3D),
            Some(TypeClass::Image(TextureKind::Image3d))
        );
        assert_eq!(
            TypeCatalog::classify(TypeCode::UNSIGNED_INT_ATOMIC_COUNTER),
            Some(TypeClass::AtomicCounter)
        );
        assert_eq!(TypeCatalog::classify(TypeCode(0xDEAD)), None);
    }

    #[test]
    fn test_member_accepts_atomic_counter() {
        assert_eq!(
            TypeCatalog::member(TypeCode::UNSIGNED_INT_ATOMIC_COUNTER),
            Some(TypeDescriptor::ATOMIC_COUNTER)
        );
        assert_eq!(TypeCatalog::value(TypeCode::UNSIGNED_INT_ATOMIC_COUNTER), None);
        assert_eq!(TypeCatalog::member(TypeCode::SAMPLER_2D), None);
    }

    #[test]
    fn test_every_value_type_has_upload() {
        for descriptor in TypeCatalog::value_types() {
            assert!(descriptor.upload().is_some(), "{:?}", descriptor);
        }
    }

    #[test]
    fn test_upload_selection() {
        let upload = |code| TypeCatalog::value(code).unwrap().upload().unwrap();
        assert_eq!(upload(TypeCode::BOOL_VEC3), UniformUpload::Int(3));
        assert_eq!(upload(TypeCode::UNSIGNED_INT), UniformUpload::Uint(1));
        assert_eq!(
            upload(TypeCode::FLOAT_MAT4X3),
            UniformUpload::FloatMatrix {
                columns: 4,
                rows: 3
            }
        );
        assert_eq!(upload(TypeCode::DOUBLE_VEC4), UniformUpload::Double(4));
    }

    #[test]
    fn test_upload_element_size_matches_descriptor() {
        for descriptor in TypeCatalog::value_types() {
            let upload = descriptor.upload().unwrap();
            assert_eq!(upload.element_size(), descriptor.byte_size, "{:?}", descriptor);
        }
    }

    #[test]
    fn test_type_code_display() {
        assert_eq!(TypeCode::FLOAT_VEC3.to_string(), "0x8B51");
        assert_eq!(TypeCode::FLOAT.to_string(), "0x1406");
    }
}
