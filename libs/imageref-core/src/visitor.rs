//! Tagged-kind dispatch over an object graph, in the spirit of the source's
//! `Walker2::Visit` / `AVisitor2` pair but expressed as a single free function
//! plus a `Visit` trait, rather than a virtual base class -- per the design
//! notes, the virtual-hierarchy visitor in the original was an implementation
//! artifact of its host language, not a requirement of the algorithm.

use crate::type_model::{ClassLayout, TypeDescriptor, TypeKind};

/// Where a visited value lives, plus which chunk currently owns it.
///
/// `chunk_index`/`chunk_base` identify the chunk the address was gathered
/// into and that chunk's base address, so a visitor can compute
/// `address - chunk_base` to get a fixup's offset without maintaining any
/// of its own mutable traversal state.
#[derive(Copy, Clone, Debug)]
pub struct Context {
    pub address: *const u8,
    pub chunk_index: usize,
    pub chunk_base: usize,
}

impl Context {
    pub fn root(address: *const u8, chunk_index: usize) -> Context {
        Context {
            address,
            chunk_index,
            chunk_base: address as usize,
        }
    }

    pub fn offset_in_chunk(&self) -> u32 {
        (self.address as usize - self.chunk_base) as u32
    }

    fn with_address(self, address: *const u8) -> Context {
        Context { address, ..self }
    }

    fn in_chunk(self, chunk_index: usize, chunk_base: usize) -> Context {
        Context {
            chunk_index,
            chunk_base,
            ..self
        }
    }
}

/// What `visit_array` asks the walker to do about the array's own elements.
pub enum ArrayRecursion {
    /// Don't recurse (bitwise-serializable item type, or nothing to visit).
    Stop,
    /// Recurse using the array field's own chunk (embedded/fixed arrays).
    SameChunk,
    /// Recurse treating the array's backing store as the given chunk
    /// (dynamic arrays, whose elements were gathered into their own chunk).
    NewChunk(usize),
}

/// Callbacks for each `TypeKind`. Every method has a default no-op so a
/// visitor only needs to implement the kinds it cares about. Bitwise-
/// serializable primitives (`Integer`, `Float`, `Bool`, `Enum`, `Flags`) are
/// intentionally not given individual callbacks -- no visitor in this crate
/// needs to inspect their bits, only copy them.
pub trait Visit {
    fn visit_string(&mut self, _ty: &dyn TypeDescriptor, _ctx: Context) {}
    fn visit_pointer(&mut self, _ty: &dyn TypeDescriptor, _ctx: Context) {}
    fn visit_class_id(&mut self, _ty: &dyn TypeDescriptor, _ctx: Context) {}
    fn visit_asset_id(&mut self, _ty: &dyn TypeDescriptor, _ctx: Context) {}
    fn visit_user_data(&mut self, _ty: &dyn TypeDescriptor, _ctx: Context) {}
    fn visit_blob(&mut self, _ty: &dyn TypeDescriptor, _ctx: Context) {}

    fn visit_array(&mut self, _ty: &dyn TypeDescriptor, _ctx: Context) -> ArrayRecursion {
        ArrayRecursion::SameChunk
    }

    fn visit_class(&mut self, _ty: &dyn TypeDescriptor, _ctx: Context) {}
}

/// Walks `ty`'s reflected shape starting at `ctx`, invoking `visitor`'s
/// callbacks bottom-up through nested classes and arrays.
///
/// # Safety
/// `ctx.address` must point at a live, correctly aligned instance of `ty` for
/// the duration of the call.
pub unsafe fn walk(visitor: &mut dyn Visit, ty: &'static dyn TypeDescriptor, ctx: Context) {
    match ty.kind() {
        TypeKind::Void
        | TypeKind::Integer
        | TypeKind::Float
        | TypeKind::Bool
        | TypeKind::Enum
        | TypeKind::Flags => {}

        TypeKind::String => visitor.visit_string(ty, ctx),
        TypeKind::Pointer => visitor.visit_pointer(ty, ctx),
        TypeKind::ClassId => visitor.visit_class_id(ty, ctx),
        TypeKind::AssetId => visitor.visit_asset_id(ty, ctx),
        TypeKind::UserData => visitor.visit_user_data(ty, ctx),
        TypeKind::Blob => visitor.visit_blob(ty, ctx),

        TypeKind::Array => {
            let array = ty
                .as_array()
                .expect("Kind::Array type must implement ArrayLayout");
            let item_type = array.item_type();
            let recursion = visitor.visit_array(ty, ctx);
            let element_ctx = match recursion {
                ArrayRecursion::Stop => None,
                ArrayRecursion::SameChunk => Some(ctx),
                ArrayRecursion::NewChunk(chunk_index) => {
                    let data = array.get_data_ptr(ctx.address);
                    if data.is_null() {
                        None
                    } else {
                        Some(ctx.in_chunk(chunk_index, data as usize))
                    }
                }
            };
            if let Some(element_ctx) = element_ctx {
                if !item_type.kind().is_bitwise_serializable() {
                    walk_array_elements(visitor, array, item_type, ctx, element_ctx);
                }
            }
        }

        TypeKind::Class => {
            visitor.visit_class(ty, ctx);
            let class = ty
                .as_class()
                .expect("Kind::Class type must implement ClassLayout");
            walk_class_fields(visitor, class, ctx);
        }
    }
}

unsafe fn walk_class_fields(visitor: &mut dyn Visit, class: &dyn ClassLayout, ctx: Context) {
    for field in class.fields() {
        if field.flags.contains(crate::type_model::FieldFlags::NO_SERIALIZE) {
            continue;
        }
        let field_addr = ctx.address.add(field.offset);
        walk(visitor, field.field_type, ctx.with_address(field_addr));
    }
}

/// Recurses over an array's populated elements.
///
/// Iterates `count`, not `capacity`: slots between `count` and `capacity`
/// are reserved but uninitialized, and walking them would read garbage
/// memory looking for fixups that were never written. This mirrors every
/// reflection-driven visitor in the source that recurses into array
/// contents -- both the JSON encoder's `Visit_Array` and the pointer-id
/// resolution visitor read `Generic_Get_Count`, never `Generic_Get_Capacity`,
/// for the iteration bound. `Generic_Get_Capacity` is used only to size the
/// array's own backing-store chunk, which happens in the `Kind::Array`
/// callback itself, not here.
unsafe fn walk_array_elements(
    visitor: &mut dyn Visit,
    array: &dyn crate::type_model::ArrayLayout,
    item_type: &'static dyn TypeDescriptor,
    field_ctx: Context,
    element_ctx: Context,
) {
    let data = array.get_data_ptr(field_ctx.address);
    if data.is_null() {
        return;
    }
    let count = array.get_count(field_ctx.address);
    let item_size = item_type.size();
    for i in 0..count {
        let elem_addr = data.add(i * item_size);
        walk(visitor, item_type, element_ctx.with_address(elem_addr));
    }
}
