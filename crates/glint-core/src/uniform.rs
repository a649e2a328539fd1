//! Type-checked, dirty-tracked uniform slots.
//!
//! A [`Uniform`] is created once per active uniform during program
//! introspection and lives exactly as long as its program. The concrete
//! device upload operation is resolved a single time at construction from
//! the device-reported type, via a tag-indexed table — per-frame updates pay
//! no type dispatch.

use glam::{Mat2, Mat3, Mat4, Vec2, Vec3, Vec4};
use num_derive::FromPrimitive;
use num_traits::FromPrimitive;

use crate::device::{Device, RawProgram, UniformInfo};
use crate::error::{Error, Result};

/// Device-reported GLSL type enumerants with a direct value-kind match.
///
/// Discriminants are the wire values reported by program introspection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromPrimitive)]
#[repr(u32)]
enum GlslType {
    Float = 0x1406,
    Double = 0x140A,
    Int = 0x1404,
    UnsignedInt = 0x1405,
    UnsignedInt64 = 0x140F,
    FloatVec2 = 0x8B50,
    FloatVec3 = 0x8B51,
    FloatVec4 = 0x8B52,
    FloatMat2 = 0x8B5A,
    FloatMat3 = 0x8B5B,
    FloatMat4 = 0x8B5C,
}

/// The closed set of value kinds a uniform can hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(usize)]
pub enum UniformKind {
    F32,
    F64,
    I32,
    U32,
    /// 64-bit unsigned handle. Also the fallback for device types with no
    /// direct numeric/vector/matrix match (samplers, images), so bindless
    /// handles can be passed uniformly.
    U64,
    Vec2,
    Vec3,
    Vec4,
    Mat2,
    Mat3,
    Mat4,
}

impl UniformKind {
    /// Resolve a device-reported type code. Unmatched codes default to
    /// [`UniformKind::U64`].
    pub fn from_type_code(code: u32) -> Self {
        match GlslType::from_u32(code) {
            Some(GlslType::Float) => UniformKind::F32,
            Some(GlslType::Double) => UniformKind::F64,
            Some(GlslType::Int) => UniformKind::I32,
            Some(GlslType::UnsignedInt) => UniformKind::U32,
            Some(GlslType::UnsignedInt64) | None => UniformKind::U64,
            Some(GlslType::FloatVec2) => UniformKind::Vec2,
            Some(GlslType::FloatVec3) => UniformKind::Vec3,
            Some(GlslType::FloatVec4) => UniformKind::Vec4,
            Some(GlslType::FloatMat2) => UniformKind::Mat2,
            Some(GlslType::FloatMat3) => UniformKind::Mat3,
            Some(GlslType::FloatMat4) => UniformKind::Mat4,
        }
    }

    /// The device zero-initializes every uniform, and a freshly
    /// introspected slot starts clean. Seeding anything other than that
    /// zero state would make the first assignment of the seeded value a
    /// silent no-op that never reaches the device.
    fn default_value(self) -> UniformValue {
        match self {
            UniformKind::F32 => UniformValue::F32(0.0),
            UniformKind::F64 => UniformValue::F64(0.0),
            UniformKind::I32 => UniformValue::I32(0),
            UniformKind::U32 => UniformValue::U32(0),
            UniformKind::U64 => UniformValue::U64(0),
            UniformKind::Vec2 => UniformValue::Vec2(Vec2::ZERO),
            UniformKind::Vec3 => UniformValue::Vec3(Vec3::ZERO),
            UniformKind::Vec4 => UniformValue::Vec4(Vec4::ZERO),
            UniformKind::Mat2 => UniformValue::Mat2(Mat2::ZERO),
            UniformKind::Mat3 => UniformValue::Mat3(Mat3::ZERO),
            UniformKind::Mat4 => UniformValue::Mat4(Mat4::ZERO),
        }
    }
}

/// A uniform value of one of the supported kinds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum UniformValue {
    F32(f32),
    F64(f64),
    I32(i32),
    U32(u32),
    U64(u64),
    Vec2(Vec2),
    Vec3(Vec3),
    Vec4(Vec4),
    Mat2(Mat2),
    Mat3(Mat3),
    Mat4(Mat4),
}

impl UniformValue {
    pub fn kind(&self) -> UniformKind {
        match self {
            UniformValue::F32(_) => UniformKind::F32,
            UniformValue::F64(_) => UniformKind::F64,
            UniformValue::I32(_) => UniformKind::I32,
            UniformValue::U32(_) => UniformKind::U32,
            UniformValue::U64(_) => UniformKind::U64,
            UniformValue::Vec2(_) => UniformKind::Vec2,
            UniformValue::Vec3(_) => UniformKind::Vec3,
            UniformValue::Vec4(_) => UniformKind::Vec4,
            UniformValue::Mat2(_) => UniformKind::Mat2,
            UniformValue::Mat3(_) => UniformKind::Mat3,
            UniformValue::Mat4(_) => UniformKind::Mat4,
        }
    }
}

macro_rules! impl_from_value {
    ($($variant:ident($ty:ty)),* $(,)?) => {
        $(impl From<$ty> for UniformValue {
            fn from(v: $ty) -> Self {
                UniformValue::$variant(v)
            }
        })*
    };
}

impl_from_value!(
    F32(f32),
    F64(f64),
    I32(i32),
    U32(u32),
    U64(u64),
    Vec2(Vec2),
    Vec3(Vec3),
    Vec4(Vec4),
    Mat2(Mat2),
    Mat3(Mat3),
    Mat4(Mat4),
);

type UploadOp = fn(&dyn Device, RawProgram, i32, &UniformValue);

/// Upload operations indexed by `UniformKind` discriminant. Resolved once
/// per uniform at construction; the stored entry never changes afterwards.
const UPLOAD_OPS: [UploadOp; 11] = [
    |d, p, l, v| match v {
        UniformValue::F32(x) => d.uniform_f32(p, l, *x),
        _ => unreachable!(),
    },
    |d, p, l, v| match v {
        UniformValue::F64(x) => d.uniform_f64(p, l, *x),
        _ => unreachable!(),
    },
    |d, p, l, v| match v {
        UniformValue::I32(x) => d.uniform_i32(p, l, *x),
        _ => unreachable!(),
    },
    |d, p, l, v| match v {
        UniformValue::U32(x) => d.uniform_u32(p, l, *x),
        _ => unreachable!(),
    },
    |d, p, l, v| match v {
        UniformValue::U64(x) => d.uniform_u64(p, l, *x),
        _ => unreachable!(),
    },
    |d, p, l, v| match v {
        UniformValue::Vec2(x) => d.uniform_vec2(p, l, *x),
        _ => unreachable!(),
    },
    |d, p, l, v| match v {
        UniformValue::Vec3(x) => d.uniform_vec3(p, l, *x),
        _ => unreachable!(),
    },
    |d, p, l, v| match v {
        UniformValue::Vec4(x) => d.uniform_vec4(p, l, *x),
        _ => unreachable!(),
    },
    |d, p, l, v| match v {
        UniformValue::Mat2(x) => d.uniform_mat2(p, l, x),
        _ => unreachable!(),
    },
    |d, p, l, v| match v {
        UniformValue::Mat3(x) => d.uniform_mat3(p, l, x),
        _ => unreachable!(),
    },
    |d, p, l, v| match v {
        UniformValue::Mat4(x) => d.uniform_mat4(p, l, x),
        _ => unreachable!(),
    },
];

/// One active uniform of a linked program.
pub struct Uniform {
    name: String,
    program: RawProgram,
    location: i32,
    kind: UniformKind,
    value: UniformValue,
    dirty: bool,
    op: UploadOp,
}

impl Uniform {
    pub(crate) fn from_info(info: UniformInfo, program: RawProgram) -> Self {
        let kind = UniformKind::from_type_code(info.type_code);
        Self {
            name: info.name,
            program,
            location: info.location,
            kind,
            value: kind.default_value(),
            dirty: false,
            op: UPLOAD_OPS[kind as usize],
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> UniformKind {
        self.kind
    }

    pub fn location(&self) -> i32 {
        self.location
    }

    /// The most recently assigned value.
    pub fn value(&self) -> UniformValue {
        self.value
    }

    /// Assign a new value. Fails with [`Error::TypeMismatch`] unless the
    /// value's kind equals this uniform's kind — no implicit numeric
    /// coercion. Assigning a value equal to the current one does not mark
    /// the uniform dirty.
    pub fn set(&mut self, value: impl Into<UniformValue>) -> Result<()> {
        let value = value.into();
        if value.kind() != self.kind {
            return Err(Error::TypeMismatch {
                name: self.name.clone(),
                expected: self.kind,
                provided: value.kind(),
            });
        }
        if value != self.value {
            self.value = value;
            self.dirty = true;
        }
        Ok(())
    }

    /// Push the value to the device if it changed since the last push, then
    /// clear the dirty flag.
    pub(crate) fn push(&mut self, device: &dyn Device) {
        if self.dirty {
            (self.op)(device, self.program, self.location, &self.value);
            self.dirty = false;
        }
    }
}
