//! The gathering visitor: walks a live object graph recording one chunk per
//! owned sub-object plus pointer/type/asset fixup sites. Grounded on
//! `LIPInfoGatherer` in the source (its `Visit_Pointer`, `Visit_TypeId`,
//! `Visit_Array`, `Visit_String` callbacks).

use crate::chunk_graph::ChunkGraph;
use crate::type_model::TypeDescriptor;
use crate::visitor::{self, ArrayRecursion, Context, Visit};

/// Alignment for a string chunk's backing storage. Distinct from a blob's
/// plain byte-alignment-1 snapshot: a string chunk carries a synthesized
/// trailing NUL the live buffer doesn't have, so it gets its own alignment
/// rather than reusing `MINIMUM_ALIGNMENT`.
pub const STRING_ALIGNMENT: usize = 4;

pub(crate) struct Gatherer {
    pub graph: ChunkGraph,
}

impl Gatherer {
    pub fn new() -> Gatherer {
        Gatherer {
            graph: ChunkGraph::new(),
        }
    }

    /// Walks `ty` at `address`, treating it as the root of chunk
    /// `chunk_index` (offsets computed from `address` itself).
    ///
    /// # Safety
    /// `address` must point at a live, correctly aligned instance of `ty`.
    pub unsafe fn walk_into_chunk(
        &mut self,
        chunk_index: usize,
        ty: &'static dyn TypeDescriptor,
        address: *const u8,
    ) {
        visitor::walk(self, ty, Context::root(address, chunk_index));
    }

    /// Walks `ty` at `address`, treating `chunk_base` (rather than `address`
    /// itself) as the chunk's offset-zero point. Used when several values
    /// (e.g. a list's elements) share one chunk whose base is the start of
    /// the backing store, not any individual element's own address.
    ///
    /// # Safety
    /// `address` must point at a live, correctly aligned instance of `ty`,
    /// and must lie within the `chunk_index` chunk's byte range starting at
    /// `chunk_base`.
    pub unsafe fn walk_into_chunk_at(
        &mut self,
        chunk_index: usize,
        ty: &'static dyn TypeDescriptor,
        address: *const u8,
        chunk_base: usize,
    ) {
        visitor::walk(
            self,
            ty,
            Context {
                address,
                chunk_index,
                chunk_base,
            },
        );
    }

    /// Records a chunk for `data` with no live source address to dedup
    /// against (a list's element storage, addressed by its own start
    /// instead of an owner's pointer slot).
    pub fn add_chunk(&mut self, source_address: usize, data: Vec<u8>, align: usize) -> usize {
        self.graph.add_chunk(source_address, data, align)
    }

    pub fn add_pointer(&mut self, chunk_index: usize, offset_in_chunk: u32, target_address: usize) {
        self.graph.add_pointer(chunk_index, offset_in_chunk, target_address)
    }

    /// Snapshots `size` bytes starting at `address` into an owned buffer,
    /// for callers (e.g. the clump serializer) that build up chunks outside
    /// the ordinary field-by-field walk.
    ///
    /// # Safety
    /// `address` must be valid to read for `size` bytes.
    pub unsafe fn snapshot(address: *const u8, size: usize) -> Vec<u8> {
        std::slice::from_raw_parts(address, size).to_vec()
    }

    /// Gathers a chunk for the sub-object at `address` (an owned buffer
    /// reached through a pointer, array backing store, or string buffer)
    /// unless one has already been recorded for that address -- this is
    /// what makes cyclic and aliased pointer graphs terminate: a shared
    /// target is only ever walked once.
    unsafe fn gather_owned(&mut self, address: *const u8, size: usize, align: usize) -> usize {
        let data = std::slice::from_raw_parts(address, size).to_vec();
        self.graph.add_chunk(address as usize, data, align)
    }

    /// Like [`Self::gather_owned`], but for a string's backing storage:
    /// snapshots `len` bytes and appends a synthesized trailing NUL, so the
    /// chunk written to disk is always `len + 1` bytes.
    unsafe fn gather_owned_string(&mut self, address: *const u8, len: usize) -> usize {
        let mut data = std::slice::from_raw_parts(address, len).to_vec();
        data.push(0);
        self.graph.add_chunk(address as usize, data, STRING_ALIGNMENT)
    }
}

impl Visit for Gatherer {
    fn visit_pointer(&mut self, ty: &dyn TypeDescriptor, ctx: Context) {
        let target = unsafe { *(ctx.address as *const usize) };
        if target == 0 {
            return;
        }
        self.graph
            .add_pointer(ctx.chunk_index, ctx.offset_in_chunk(), target);

        let pointee_ty = ty
            .as_pointer()
            .expect("Kind::Pointer type must implement PointerLayout")
            .pointee_type();

        if self.graph.contains_address(target) {
            return;
        }
        let target_ptr = target as *const u8;
        let chunk_index =
            unsafe { self.gather_owned(target_ptr, pointee_ty.size(), pointee_ty.align()) };
        unsafe {
            self.walk_into_chunk(chunk_index, pointee_ty, target_ptr);
        }
    }

    fn visit_class_id(&mut self, ty: &dyn TypeDescriptor, ctx: Context) {
        let layout = ty
            .as_class_id()
            .expect("Kind::ClassId type must implement ClassIdLayout");
        let type_id = unsafe { layout.get_type_id(ctx.address) };
        self.graph
            .add_type_ref(ctx.chunk_index, ctx.offset_in_chunk(), type_id);
    }

    fn visit_asset_id(&mut self, ty: &dyn TypeDescriptor, ctx: Context) {
        let layout = ty
            .as_asset_id()
            .expect("Kind::AssetId type must implement AssetIdLayout");
        let asset_id = unsafe { layout.get_asset_id(ctx.address) };
        self.graph
            .add_asset_ref(ctx.chunk_index, ctx.offset_in_chunk(), asset_id);
    }

    fn visit_string(&mut self, ty: &dyn TypeDescriptor, ctx: Context) {
        self.visit_byte_buffer(ty, ctx, true);
    }

    fn visit_blob(&mut self, ty: &dyn TypeDescriptor, ctx: Context) {
        self.visit_byte_buffer(ty, ctx, false);
    }

    fn visit_array(&mut self, ty: &dyn TypeDescriptor, ctx: Context) -> ArrayRecursion {
        let array = ty
            .as_array()
            .expect("Kind::Array type must implement ArrayLayout");
        if !array.is_dynamic() {
            return ArrayRecursion::SameChunk;
        }
        let capacity = unsafe { array.get_capacity(ctx.address) };
        if capacity == 0 {
            // Empty dynamic array: no backing-store chunk, no pointer fixup.
            return ArrayRecursion::Stop;
        }
        let data_ptr = unsafe { array.get_data_ptr(ctx.address) };
        if data_ptr.is_null() {
            return ArrayRecursion::Stop;
        }
        let slot_addr = unsafe { array.get_data_ptr_address(ctx.address) };
        let slot_offset = (slot_addr as usize - ctx.chunk_base) as u32;
        self.graph
            .add_pointer(ctx.chunk_index, slot_offset, data_ptr as usize);

        if self.graph.contains_address(data_ptr as usize) {
            return ArrayRecursion::NewChunk(
                self.graph
                    .chunk_index_for_address(data_ptr as usize)
                    .expect("just checked contains_address"),
            );
        }
        let item_size = array.item_type().size();
        let chunk_index = unsafe {
            self.gather_owned(data_ptr, capacity * item_size, array.item_type().align())
        };
        ArrayRecursion::NewChunk(chunk_index)
    }

    fn visit_class(&mut self, _ty: &dyn TypeDescriptor, _ctx: Context) {}
}

impl Gatherer {
    fn visit_byte_buffer(&mut self, ty: &dyn TypeDescriptor, ctx: Context, is_string: bool) {
        let buf = ty
            .as_byte_buffer()
            .expect("Kind::String/Kind::Blob must implement ByteBufferLayout");
        let len = unsafe { buf.get_len(ctx.address) };
        if len == 0 {
            return;
        }
        let data_ptr = unsafe { buf.get_data_ptr(ctx.address) };
        if data_ptr.is_null() {
            return;
        }
        let slot_addr = unsafe { buf.get_data_ptr_address(ctx.address) };
        let slot_offset = (slot_addr as usize - ctx.chunk_base) as u32;
        self.graph
            .add_pointer(ctx.chunk_index, slot_offset, data_ptr as usize);

        if !self.graph.contains_address(data_ptr as usize) {
            unsafe {
                if is_string {
                    self.gather_owned_string(data_ptr, len);
                } else {
                    self.gather_owned(data_ptr, len, 1);
                }
            }
        }
    }
}
