//! Load entry points. Grounded on the source's `LoadImage` (copy-load) and
//! its two `LoadInPlace` overloads (one for an already fully-populated
//! buffer, e.g. an mmap; one that reads the remainder of a stream into a
//! caller-provided buffer first). All three funnel into the same
//! `ReadAndApplyFixups`-equivalent fixup application.

use std::io::Read;
use std::mem::size_of;

use zerocopy::FromBytes;

use crate::error::{ImageError, Result};
use crate::image_header::ImageHeader;
use crate::session::Session;
use crate::type_model::{TypeDescriptor, TypeRegistry};

pub(crate) mod apply;

fn validate(ty: &dyn TypeDescriptor, header: &ImageHeader) -> Result<()> {
    if header.magic != crate::image_header::MAGIC {
        return Err(ImageError::FailedToReadStream(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            "bad image magic",
        )));
    }
    if header.session != Session::current() {
        return Err(ImageError::SessionMismatch {
            image: header.session.as_u64(),
            process: Session::current().as_u64(),
        });
    }
    if header.root_type_id != ty.type_id() {
        return Err(ImageError::ObjectOfWrongType {
            expected: ty.type_id(),
            found: header.root_type_id,
        });
    }
    Ok(())
}

fn validate_size_and_alignment(ty: &dyn TypeDescriptor, available: usize, address: usize) -> Result<()> {
    if available < ty.size() {
        return Err(ImageError::BufferTooSmall {
            available,
            required: ty.size(),
        });
    }
    if address % ty.align() != 0 {
        return Err(ImageError::InvalidAlignment {
            address,
            required: ty.align(),
        });
    }
    Ok(())
}

fn read_header<R: Read>(stream: &mut R) -> Result<ImageHeader> {
    let mut bytes = [0u8; size_of::<ImageHeader>()];
    stream
        .read_exact(&mut bytes)
        .map_err(ImageError::FailedToReadStream)?;
    ImageHeader::read_from(&bytes[..]).ok_or_else(|| {
        ImageError::FailedToReadStream(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            "truncated image header",
        ))
    })
}

/// Copy-loads an image from `stream`: allocates a fresh buffer, reads the
/// payload and fixup tables, applies fixups, and returns the buffer with a
/// fully relocated object at its start.
pub fn load_image<R: Read>(
    ty: &'static dyn TypeDescriptor,
    stream: &mut R,
    registry: &dyn TypeRegistry,
) -> Result<Vec<u8>> {
    let header = read_header(stream)?;
    validate(ty, &header)?;

    let mut buffer = vec![0u8; header.payload_size as usize];
    stream
        .read_exact(&mut buffer)
        .map_err(ImageError::FailedToReadStream)?;
    validate_size_and_alignment(ty, buffer.len(), buffer.as_ptr() as usize)?;

    let mut fixups_data = Vec::new();
    stream
        .read_to_end(&mut fixups_data)
        .map_err(ImageError::FailedToReadStream)?;

    unsafe {
        apply::apply_fixups(&mut buffer, &fixups_data, ty, registry)?;
    }
    log::info!(
        "loaded image (copy): {} bytes, root type {:?}",
        buffer.len(),
        ty.type_id()
    );
    Ok(buffer)
}

/// In-place load over a buffer that already holds the full payload *and*
/// fixup tables back to back (e.g. the tail of an mmap'd file past the
/// header). Relocates pointers directly inside `buffer` and returns a
/// pointer to the root object at its start.
///
/// # Safety
/// `buffer` must remain valid and exclusively borrowed for as long as the
/// returned pointer (and anything reachable from it) is used.
pub unsafe fn load_in_place(
    ty: &'static dyn TypeDescriptor,
    header: &ImageHeader,
    buffer: &mut [u8],
    registry: &dyn TypeRegistry,
) -> Result<*mut u8> {
    validate(ty, header)?;
    let payload_size = header.payload_size as usize;
    if buffer.len() < payload_size {
        return Err(ImageError::BufferTooSmall {
            available: buffer.len(),
            required: payload_size,
        });
    }
    validate_size_and_alignment(ty, payload_size, buffer.as_ptr() as usize)?;

    let (object_data, fixups_data) = buffer.split_at_mut(payload_size);
    apply::apply_fixups(object_data, fixups_data, ty, registry)?;
    log::info!(
        "loaded image (in-place): {} bytes, root type {:?}",
        payload_size,
        ty.type_id()
    );
    Ok(object_data.as_mut_ptr())
}

/// In-place load where the header has already been read off `stream` and
/// `buffer` is a caller-provided region (at least `header.payload_size` plus
/// fixup-table bytes) to read the remainder of the stream into before
/// relocating. A thin convenience wrapper around [`load_in_place`] for
/// callers that have a stream rather than an already-populated mapping.
///
/// # Safety
/// Same requirements as [`load_in_place`].
pub unsafe fn load_in_place_from_stream<R: Read>(
    ty: &'static dyn TypeDescriptor,
    header: &ImageHeader,
    buffer: &mut [u8],
    stream: &mut R,
    registry: &dyn TypeRegistry,
) -> Result<*mut u8> {
    stream
        .read_exact(buffer)
        .map_err(ImageError::FailedToReadStream)?;
    load_in_place(ty, header, buffer, registry)
}
