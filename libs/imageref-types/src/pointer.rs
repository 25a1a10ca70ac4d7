//! Declares a reflected `Kind::Pointer` type for a given pointee type.
//! Physically, a pointer field is just a raw `*mut T` (or `*const T`) in the
//! owning struct; the core's visitor reads/writes it as a plain `usize`, so
//! no accessor beyond the pointee type itself is needed.

#[macro_export]
macro_rules! declare_pointer_type {
    ($static_name:ident, $desc_struct:ident, $pointee_type:expr, $type_id:expr, $name:literal) => {
        pub struct $desc_struct;

        impl imageref_core::type_model::TypeDescriptor for $desc_struct {
            fn kind(&self) -> imageref_core::type_model::TypeKind {
                imageref_core::type_model::TypeKind::Pointer
            }
            fn size(&self) -> usize {
                std::mem::size_of::<*mut ()>()
            }
            fn align(&self) -> usize {
                std::mem::align_of::<*mut ()>()
            }
            fn type_id(&self) -> imageref_core::type_model::TypeId {
                $type_id
            }
            fn name(&self) -> &'static str {
                $name
            }
            fn as_pointer(&self) -> Option<&dyn imageref_core::type_model::PointerLayout> {
                Some(self)
            }
        }

        impl imageref_core::type_model::PointerLayout for $desc_struct {
            fn pointee_type(&self) -> &'static dyn imageref_core::type_model::TypeDescriptor {
                $pointee_type
            }
        }

        pub static $static_name: $desc_struct = $desc_struct;
    };
}
