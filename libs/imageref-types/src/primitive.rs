//! Reflected descriptors for the handful of bitwise-serializable primitive
//! kinds this crate's sample types need as fields or array items.

use imageref_core::type_model::{TypeDescriptor, TypeId, TypeKind};

pub struct Primitive {
    kind: TypeKind,
    size: usize,
    align: usize,
    type_id: TypeId,
    name: &'static str,
}

impl TypeDescriptor for Primitive {
    fn kind(&self) -> TypeKind {
        self.kind
    }
    fn size(&self) -> usize {
        self.size
    }
    fn align(&self) -> usize {
        self.align
    }
    fn type_id(&self) -> TypeId {
        self.type_id
    }
    fn name(&self) -> &'static str {
        self.name
    }
}

macro_rules! primitive {
    ($ident:ident, $ty:ty, $kind:expr, $id:expr, $name:expr) => {
        pub static $ident: Primitive = Primitive {
            kind: $kind,
            size: std::mem::size_of::<$ty>(),
            align: std::mem::align_of::<$ty>(),
            type_id: $id,
            name: $name,
        };
    };
}

primitive!(U8_TYPE, u8, TypeKind::Integer, 1, "u8");
primitive!(U32_TYPE, u32, TypeKind::Integer, 2, "u32");
primitive!(U64_TYPE, u64, TypeKind::Integer, 3, "u64");
primitive!(I32_TYPE, i32, TypeKind::Integer, 4, "i32");
primitive!(F32_TYPE, f32, TypeKind::Float, 5, "f32");
primitive!(BOOL_TYPE, bool, TypeKind::Bool, 6, "bool");
