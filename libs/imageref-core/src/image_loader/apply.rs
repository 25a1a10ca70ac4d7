//! Applies a read fixup-table triple against a payload buffer. Grounded on
//! the source's `ReadAndApplyFixups`: pointer fixups write a relocated
//! address directly into their slot; type and asset fixups are collected
//! into lookup tables and handed to a second, visitor-driven pass once the
//! object graph is pointer-valid and can be walked safely.

use std::collections::{HashMap, HashSet};
use std::io::Cursor;

use byteorder::{LittleEndian, ReadBytesExt};

use crate::error::{ImageError, Result};
use crate::type_model::{TypeDescriptor, TypeRegistry};
use crate::visitor::{self, ArrayRecursion, Context, Visit};

/// Applies every fixup in `fixups_data` against `object_data`, then walks the
/// now-valid object rooted at `object_data`'s start to resolve type ids
/// through `registry`, install asset ids, and mark every array/string as
/// externally-allocated (borrowed from `object_data`, never to be freed by
/// ordinary drop glue).
///
/// # Safety
/// `object_data` must hold a byte-for-byte copy of a payload produced by this
/// crate's writer for an object of type `ty`.
pub(crate) unsafe fn apply_fixups(
    object_data: &mut [u8],
    fixups_data: &[u8],
    ty: &'static dyn TypeDescriptor,
    registry: &dyn TypeRegistry,
) -> Result<()> {
    let mut cursor = Cursor::new(fixups_data);
    let base = object_data.as_ptr() as usize;

    let pointer_count = read_u32(&mut cursor)?;
    for _ in 0..pointer_count {
        let slot_offset = read_u32(&mut cursor)? as usize;
        let target_offset = read_u32(&mut cursor)? as usize;
        let slot_end = slot_offset
            .checked_add(std::mem::size_of::<usize>())
            .ok_or(ImageError::BadPointer {
                offset: slot_offset as u32,
            })?;
        if slot_end > object_data.len() || target_offset > object_data.len() {
            return Err(ImageError::BadPointer {
                offset: slot_offset as u32,
            });
        }
        let resolved = (base + target_offset).to_ne_bytes();
        object_data[slot_offset..slot_end].copy_from_slice(&resolved);
    }

    let type_count = read_u32(&mut cursor)?;
    let mut type_fixups = HashMap::with_capacity(type_count as usize);
    for _ in 0..type_count {
        let offset = read_u32(&mut cursor)?;
        let type_id = read_u32(&mut cursor)?;
        type_fixups.insert(offset, type_id);
    }

    let asset_count = read_u32(&mut cursor)?;
    let mut asset_fixups = HashMap::with_capacity(asset_count as usize);
    for _ in 0..asset_count {
        let offset = read_u32(&mut cursor)?;
        let len = read_u32(&mut cursor)? as usize;
        let mut bytes = vec![0u8; len];
        std::io::Read::read_exact(&mut cursor, &mut bytes)
            .map_err(ImageError::FailedToReadStream)?;
        let asset_id = String::from_utf8(bytes).map_err(|e| {
            ImageError::FailedToReadStream(std::io::Error::new(std::io::ErrorKind::InvalidData, e))
        })?;
        asset_fixups.insert(offset, asset_id);
    }

    let mut applier = FixApplier {
        buffer_base: base,
        registry,
        type_fixups,
        asset_fixups,
        visited: HashSet::new(),
        error: None,
    };
    let root_ctx = Context {
        address: object_data.as_ptr(),
        chunk_index: 0,
        chunk_base: base,
    };
    visitor::walk(&mut applier, ty, root_ctx);
    if let Some(err) = applier.error {
        return Err(err);
    }
    Ok(())
}

fn read_u32(cursor: &mut Cursor<&[u8]>) -> Result<u32> {
    cursor
        .read_u32::<LittleEndian>()
        .map_err(ImageError::FailedToReadStream)
}

struct FixApplier<'a> {
    buffer_base: usize,
    registry: &'a dyn TypeRegistry,
    type_fixups: HashMap<u32, crate::type_model::TypeId>,
    asset_fixups: HashMap<u32, String>,
    visited: HashSet<usize>,
    /// First error encountered while walking. `Visit` methods can't return a
    /// `Result` (the generic `walk` doesn't thread one through), so a failed
    /// lookup is recorded here and checked once the walk completes.
    error: Option<ImageError>,
}

impl<'a> Visit for FixApplier<'a> {
    fn visit_pointer(&mut self, ty: &dyn TypeDescriptor, ctx: Context) {
        if self.error.is_some() {
            return;
        }
        let target = unsafe { *(ctx.address as *const usize) };
        if target == 0 || !self.visited.insert(target) {
            return;
        }
        let pointee_ty = ty
            .as_pointer()
            .expect("Kind::Pointer type must implement PointerLayout")
            .pointee_type();
        let pointee_ctx = Context {
            address: target as *const u8,
            chunk_index: 0,
            chunk_base: self.buffer_base,
        };
        unsafe {
            visitor::walk(self, pointee_ty, pointee_ctx);
        }
    }

    fn visit_class_id(&mut self, ty: &dyn TypeDescriptor, ctx: Context) {
        if self.error.is_some() {
            return;
        }
        if let Some(&type_id) = self.type_fixups.get(&ctx.offset_in_chunk()) {
            if self.registry.resolve(type_id).is_none() {
                self.error = Some(ImageError::UnknownType(type_id));
                return;
            }
            let layout = ty
                .as_class_id()
                .expect("Kind::ClassId type must implement ClassIdLayout");
            unsafe {
                layout.set_type_id(ctx.address as *mut u8, type_id);
            }
        }
    }

    fn visit_asset_id(&mut self, ty: &dyn TypeDescriptor, ctx: Context) {
        if let Some(asset_id) = self.asset_fixups.get(&ctx.offset_in_chunk()) {
            let layout = ty
                .as_asset_id()
                .expect("Kind::AssetId type must implement AssetIdLayout");
            unsafe {
                layout.set_asset_id(ctx.address as *mut u8, asset_id.clone());
            }
        }
    }

    fn visit_string(&mut self, ty: &dyn TypeDescriptor, ctx: Context) {
        let buf = ty
            .as_byte_buffer()
            .expect("Kind::String must implement ByteBufferLayout");
        unsafe {
            if buf.get_len(ctx.address) > 0 {
                buf.set_dont_free_memory(ctx.address as *mut u8);
            }
        }
    }

    fn visit_blob(&mut self, ty: &dyn TypeDescriptor, ctx: Context) {
        self.visit_string(ty, ctx);
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
            return ArrayRecursion::Stop;
        }
        unsafe {
            array.set_dont_free_memory(ctx.address as *mut u8);
        }
        ArrayRecursion::SameChunk
    }
}
