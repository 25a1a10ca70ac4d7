//! A minimal `TypeRegistry`: a process-wide, build-once-never-mutated table
//! from [`TypeId`] to its reflected descriptor. This is the concrete
//! implementation of the external type-registry collaborator the core crate
//! assumes exists (see its concurrency notes): built once via `once_cell`
//! and never mutated afterward, so it can be shared across threads with no
//! locking.

use std::collections::HashMap;

use imageref_core::type_model::{TypeDescriptor, TypeId};
use once_cell::sync::Lazy;

pub struct TypeRegistry {
    by_id: HashMap<TypeId, &'static dyn TypeDescriptor>,
}

impl TypeRegistry {
    pub fn get(&self, type_id: TypeId) -> Option<&'static dyn TypeDescriptor> {
        self.by_id.get(&type_id).copied()
    }
}

unsafe impl Sync for TypeRegistry {}

impl imageref_core::type_model::TypeRegistry for TypeRegistry {
    fn resolve(&self, type_id: TypeId) -> Option<&'static dyn TypeDescriptor> {
        self.get(type_id)
    }
}

fn build() -> TypeRegistry {
    let mut by_id: HashMap<TypeId, &'static dyn TypeDescriptor> = HashMap::new();
    for ty in crate::sample::ALL_TYPES {
        by_id.insert(ty.type_id(), *ty);
    }
    by_id.insert(crate::strings::IMG_STRING_TYPE.type_id(), &crate::strings::IMG_STRING_TYPE);
    by_id.insert(crate::asset_id::ASSET_ID_TYPE.type_id(), &crate::asset_id::ASSET_ID_TYPE);
    by_id.insert(crate::asset_id::CLASS_ID_TYPE.type_id(), &crate::asset_id::CLASS_ID_TYPE);
    log::info!("type registry built with {} types", by_id.len());
    TypeRegistry { by_id }
}

pub static REGISTRY: Lazy<TypeRegistry> = Lazy::new(build);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_registered_sample_types() {
        for ty in crate::sample::ALL_TYPES {
            assert!(REGISTRY.get(ty.type_id()).is_some());
        }
    }
}
