//! Asset and class-id handle types. Both are resolved by id across
//! save/load rather than copied verbatim: an asset id is a length-prefixed
//! UTF-8 name (an index into an external asset table, keyed by name rather
//! than by process-local pointer), a class id is a pointer to a registered
//! type, and neither is meaningful outside the process/asset-table that
//! produced it.

use imageref_core::type_model::{AssetIdLayout, ClassIdLayout, TypeDescriptor, TypeId, TypeKind};

/// A resolved handle to an external asset, named rather than indexed so it
/// survives being written out and read back by a different process. An
/// empty string means "no asset".
#[repr(transparent)]
#[derive(Clone, Debug, Default)]
pub struct AssetId(pub String);

pub struct AssetIdType;
pub static ASSET_ID_TYPE: AssetIdType = AssetIdType;

impl TypeDescriptor for AssetIdType {
    fn kind(&self) -> TypeKind {
        TypeKind::AssetId
    }
    fn size(&self) -> usize {
        std::mem::size_of::<AssetId>()
    }
    fn align(&self) -> usize {
        std::mem::align_of::<AssetId>()
    }
    fn type_id(&self) -> TypeId {
        101
    }
    fn name(&self) -> &'static str {
        "AssetId"
    }
    fn as_asset_id(&self) -> Option<&dyn AssetIdLayout> {
        Some(self)
    }
}

impl AssetIdLayout for AssetIdType {
    unsafe fn get_asset_id(&self, slot: *const u8) -> String {
        (*(slot as *const AssetId)).0.clone()
    }

    unsafe fn set_asset_id(&self, slot: *mut u8, asset_id: String) {
        (*(slot as *mut AssetId)).0 = asset_id;
    }
}

/// A resolved handle to a registered type, serialized as a [`TypeId`].
#[repr(transparent)]
#[derive(Copy, Clone, Debug, Default)]
pub struct ClassId(pub TypeId);

pub struct ClassIdType;
pub static CLASS_ID_TYPE: ClassIdType = ClassIdType;

impl TypeDescriptor for ClassIdType {
    fn kind(&self) -> TypeKind {
        TypeKind::ClassId
    }
    fn size(&self) -> usize {
        std::mem::size_of::<ClassId>()
    }
    fn align(&self) -> usize {
        std::mem::align_of::<ClassId>()
    }
    fn type_id(&self) -> TypeId {
        102
    }
    fn name(&self) -> &'static str {
        "ClassId"
    }
    fn as_class_id(&self) -> Option<&dyn ClassIdLayout> {
        Some(self)
    }
}

impl ClassIdLayout for ClassIdType {
    unsafe fn get_type_id(&self, slot: *const u8) -> TypeId {
        (*(slot as *const ClassId)).0
    }

    unsafe fn set_type_id(&self, slot: *mut u8, type_id: TypeId) {
        (*(slot as *mut ClassId)).0 = type_id;
    }
}
