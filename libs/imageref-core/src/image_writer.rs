//! Top-level save entry point. Grounded on the source's `SaveImage`: gather
//! chunks/fixups by walking the object with the gathering visitor, resolve
//! offsets, write the header, then write the payload and fixup tables.

use std::io::Write;

use zerocopy::AsBytes;

use crate::error::{ImageError, Result};
use crate::gather::Gatherer;
use crate::image_header::ImageHeader;
use crate::type_model::TypeDescriptor;

/// Serializes `object` (an instance of `ty`) into a relocatable image
/// written to `out`.
///
/// # Safety
/// `object` must point at a live, correctly aligned instance of `ty`.
pub unsafe fn save_image<W: Write>(
    object: *const u8,
    ty: &'static dyn TypeDescriptor,
    out: &mut W,
) -> Result<()> {
    let mut gatherer = Gatherer::new();
    let root_chunk = gatherer.graph.add_chunk(
        object as usize,
        std::slice::from_raw_parts(object, ty.size()).to_vec(),
        ty.align(),
    );
    gatherer.walk_into_chunk(root_chunk, ty, object);

    let payload_size = gatherer.graph.resolve_offsets();
    let header = ImageHeader::new(ty.type_id(), payload_size);

    out.write_all(header.as_bytes())
        .map_err(ImageError::FailedToWriteStream)?;
    gatherer.graph.write(out)?;
    Ok(())
}
