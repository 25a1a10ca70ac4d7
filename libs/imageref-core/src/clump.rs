//! Clump support: an extension of the ordinary save/load path for a
//! container holding a list of typed, homogeneous sub-lists. Grounded on
//! §4.3 of this crate's own design -- after the clump header is gathered
//! like any other class, the list-of-lists is walked by hand: each list
//! contributes a chunk for its header and, if non-empty, a chunk for its
//! element storage, with every element then visited with its own element
//! type.

use std::io::{Read, Write};

use zerocopy::AsBytes;

use crate::error::{ImageError, Result};
use crate::gather::Gatherer;
use crate::image_header::ImageHeader;
use crate::image_loader::apply::apply_fixups;
use crate::type_model::{TypeDescriptor, TypeRegistry};

/// Serializes a clump the same way [`crate::image_writer::save_image`]
/// serializes an ordinary object, plus walking its list-of-lists.
///
/// # Safety
/// `clump` must point at a live, correctly aligned instance of `ty`, and
/// `ty` must implement [`crate::type_model::ClumpLayout`].
pub unsafe fn save_clump<W: Write>(
    clump: *const u8,
    ty: &'static dyn TypeDescriptor,
    out: &mut W,
) -> Result<()> {
    let clump_layout = ty
        .as_clump()
        .expect("clump type must implement ClumpLayout");

    let mut gatherer = Gatherer::new();
    let root_chunk = gatherer.add_chunk(clump as usize, Gatherer::snapshot(clump, ty.size()), ty.align());
    gatherer.walk_into_chunk(root_chunk, ty, clump);

    let count = clump_layout.list_count(clump);
    log::trace!("save_clump: {} lists", count);
    for i in 0..count {
        let (header_addr, header_ty) = clump_layout.list_at(clump, i);
        let header_chunk = gatherer.add_chunk(
            header_addr as usize,
            Gatherer::snapshot(header_addr, header_ty.size()),
            header_ty.align(),
        );

        let array = header_ty
            .as_array()
            .expect("clump list header must implement ArrayLayout");
        let item_type = array.item_type();
        let elem_count = array.get_count(header_addr);
        if elem_count == 0 {
            continue;
        }
        let data_ptr = array.get_data_ptr(header_addr);
        if data_ptr.is_null() {
            continue;
        }
        let slot_addr = array.get_data_ptr_address(header_addr);
        let slot_offset = (slot_addr as usize - header_addr as usize) as u32;

        let storage_chunk = gatherer.add_chunk(
            data_ptr as usize,
            Gatherer::snapshot(data_ptr, elem_count * item_type.size()),
            item_type.align(),
        );
        gatherer.add_pointer(header_chunk, slot_offset, data_ptr as usize);

        let item_size = item_type.size();
        for e in 0..elem_count {
            let elem_addr = data_ptr.add(e * item_size);
            gatherer.walk_into_chunk_at(storage_chunk, item_type, elem_addr, data_ptr as usize);
        }
    }

    let payload_size = gatherer.graph.resolve_offsets();
    let header = ImageHeader::new(ty.type_id(), payload_size);
    out.write_all(header.as_bytes())
        .map_err(ImageError::FailedToWriteStream)?;
    gatherer.graph.write(out)?;
    Ok(())
}

/// Loads a clump previously written by [`save_clump`] into a pre-sized
/// caller-provided `buffer`, mirroring the source's `LoadClumpImage`
/// (`AStreamReader&, UINT32 _payload, void *_buffer`): the header is read
/// and validated by the caller before this is invoked, so only the payload
/// size is needed here. Standard fixup application runs first (pointers,
/// type ids, asset ids, array/string borrowed-marking); the clump's own
/// lists then have their ephemeral allocator re-initialized and every owned
/// allocation marked external, mirroring the source's post-load clump
/// re-initialization step.
pub fn load_clump<R: Read>(
    ty: &'static dyn TypeDescriptor,
    stream: &mut R,
    payload_size: u32,
    buffer: &mut [u8],
    registry: &dyn TypeRegistry,
) -> Result<()> {
    let payload_size = payload_size as usize;
    if buffer.len() < payload_size {
        return Err(ImageError::BufferTooSmall {
            available: buffer.len(),
            required: payload_size,
        });
    }
    stream
        .read_exact(&mut buffer[..payload_size])
        .map_err(ImageError::FailedToReadStream)?;
    let mut fixups_data = Vec::new();
    stream
        .read_to_end(&mut fixups_data)
        .map_err(ImageError::FailedToReadStream)?;

    let (object_data, _rest) = buffer.split_at_mut(payload_size);
    unsafe {
        apply_fixups(object_data, &fixups_data, ty, registry)?;
    }

    let clump_layout = ty
        .as_clump()
        .expect("clump type must implement ClumpLayout");
    let clump_addr = object_data.as_ptr();
    unsafe {
        let count = clump_layout.list_count(clump_addr);
        for i in 0..count {
            let (header_addr, header_ty) = clump_layout.list_at(clump_addr, i);
            let array = header_ty
                .as_array()
                .expect("clump list header must implement ArrayLayout");
            if array.get_capacity(header_addr) > 0 {
                array.set_dont_free_memory(header_addr as *mut u8);
            }
        }
    }
    Ok(())
}
