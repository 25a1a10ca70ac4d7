// Interface consumed from the reflection/type-registry subsystem. The registry
// itself lives outside this crate (see `imageref-types` for a concrete one);
// everything here is the contract the core walks and serializes against.

/// Stable 32-bit identifier for a registered type, written into TypeFix
/// records and the image header's root type-id field.
pub type TypeId = u32;

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum TypeKind {
    Void,
    Integer,
    Float,
    Bool,
    Enum,
    Flags,
    String,
    Class,
    Pointer,
    AssetId,
    ClassId,
    UserData,
    Blob,
    Array,
}

impl TypeKind {
    /// POD kinds that never own external memory and can be copied verbatim.
    pub fn is_bitwise_serializable(self) -> bool {
        matches!(
            self,
            TypeKind::Integer | TypeKind::Float | TypeKind::Bool | TypeKind::Enum | TypeKind::Flags
        )
    }
}

bitflags::bitflags! {
    pub struct FieldFlags: u32 {
        const NONE = 0;
        /// Excludes the field from reflection-driven serialization (text and binary alike).
        const NO_SERIALIZE = 1 << 0;
    }
}

/// One reflected field of a `Class` type.
pub struct FieldInfo {
    pub name: &'static str,
    pub field_type: &'static dyn TypeDescriptor,
    pub offset: usize,
    pub flags: FieldFlags,
}

/// A runtime type descriptor, as produced by the (external) reflection system.
pub trait TypeDescriptor: Sync {
    fn kind(&self) -> TypeKind;
    fn size(&self) -> usize;
    fn align(&self) -> usize;
    fn type_id(&self) -> TypeId;
    fn name(&self) -> &'static str;

    fn as_class(&self) -> Option<&dyn ClassLayout> {
        None
    }
    fn as_array(&self) -> Option<&dyn ArrayLayout> {
        None
    }
    fn as_pointer(&self) -> Option<&dyn PointerLayout> {
        None
    }
    fn as_byte_buffer(&self) -> Option<&dyn ByteBufferLayout> {
        None
    }
    fn as_class_id(&self) -> Option<&dyn ClassIdLayout> {
        None
    }
    fn as_asset_id(&self) -> Option<&dyn AssetIdLayout> {
        None
    }
    fn as_clump(&self) -> Option<&dyn ClumpLayout> {
        None
    }
}

/// Extra accessors for `Kind::Class`: an ordered field list.
pub trait ClassLayout: TypeDescriptor {
    fn fields(&self) -> &'static [FieldInfo];
}

/// Extra accessors for `Kind::Pointer`: the pointee type.
pub trait PointerLayout: TypeDescriptor {
    fn pointee_type(&self) -> &'static dyn TypeDescriptor;
}

/// Extra accessors for `Kind::Array`.
///
/// All methods are `unsafe`: `array` must point at a live, correctly aligned
/// instance of this array type for the duration of the call. This mirrors
/// the raw-pointer accessor interface the source's `mxArray` exposes
/// (`Generic_Get_Count`, `Get_Array_Pointer_Address`, ...).
pub trait ArrayLayout: TypeDescriptor {
    fn item_type(&self) -> &'static dyn TypeDescriptor;

    /// False for in-place (embedded) arrays, which contribute no chunk of their own.
    fn is_dynamic(&self) -> bool;

    unsafe fn get_count(&self, array: *const u8) -> usize;
    unsafe fn set_count(&self, array: *mut u8, count: usize);

    unsafe fn get_capacity(&self, array: *const u8) -> usize;
    unsafe fn set_capacity(&self, array: *mut u8, capacity: usize);

    /// Address of the backing store, i.e. the pointee of the array's data pointer.
    unsafe fn get_data_ptr(&self, array: *const u8) -> *const u8;

    /// Address *of* the data-pointer slot itself (the thing a PointerFix relocates).
    unsafe fn get_data_ptr_address(&self, array: *const u8) -> *const u8;

    /// Marks the array as not owning its backing store, called after in-place load.
    unsafe fn set_dont_free_memory(&self, array: *mut u8);
}

/// Shared shape for `Kind::String` and `Kind::Blob`: a pointer to a heap
/// buffer plus a length, with no other structure. Strings additionally
/// guarantee a trailing NUL is *not* counted in `get_len`; blobs carry no
/// such guarantee, but neither kind needs the distinction at this layer.
pub trait ByteBufferLayout: TypeDescriptor {
    unsafe fn get_len(&self, object: *const u8) -> usize;
    unsafe fn get_data_ptr(&self, object: *const u8) -> *const u8;
    unsafe fn get_data_ptr_address(&self, object: *const u8) -> *const u8;
    unsafe fn set_dont_free_memory(&self, object: *mut u8);
}

/// Extra accessors for `Kind::ClassId`: a slot that, in memory, holds a
/// resolved handle to a registered type and must round-trip through a
/// `TypeId` across save/load rather than being copied verbatim.
pub trait ClassIdLayout: TypeDescriptor {
    unsafe fn get_type_id(&self, slot: *const u8) -> TypeId;
    unsafe fn set_type_id(&self, slot: *mut u8, type_id: TypeId);
}

/// Extra accessors for `Kind::AssetId`: a slot holding a handle to an
/// external asset, resolved by a length-prefixed UTF-8 name rather than
/// copied verbatim.
pub trait AssetIdLayout: TypeDescriptor {
    unsafe fn get_asset_id(&self, slot: *const u8) -> String;
    unsafe fn set_asset_id(&self, slot: *mut u8, asset_id: String);
}

/// External type registry: resolves a stable type id back to its runtime
/// descriptor. Implemented by the embedder -- see `imageref-types::registry`
/// for the reference implementation -- and consulted only when applying a
/// `Kind::ClassId` fixup at load time.
pub trait TypeRegistry: Sync {
    fn resolve(&self, type_id: TypeId) -> Option<&'static dyn TypeDescriptor>;
}

/// A "Clump": a heterogeneous container holding a list of typed, homogeneous
/// sub-lists. Each sub-list's header is itself array-shaped (count/capacity/
/// data pointer), so its reflected type implements [`ArrayLayout`]; only the
/// list-of-lists structure itself needs a dedicated accessor.
pub trait ClumpLayout: TypeDescriptor {
    unsafe fn list_count(&self, clump: *const u8) -> usize;

    /// Address of the `index`-th list header, and that header's own
    /// reflected (array-shaped) type.
    unsafe fn list_at(&self, clump: *const u8, index: usize) -> (*const u8, &'static dyn TypeDescriptor);
}
