//! On-disk header, written once at the start of every image and read back
//! before any fixup is trusted. Laid out with `zerocopy` so it can be
//! overlaid directly on a read or mmap'd buffer rather than parsed
//! byte-by-byte.

use zerocopy::{AsBytes, FromBytes};

use crate::session::Session;
use crate::type_model::TypeId;

pub const MAGIC: [u8; 4] = *b"IMGR";

#[derive(Copy, Clone, Debug, AsBytes, FromBytes)]
#[repr(C)]
pub struct ImageHeader {
    pub magic: [u8; 4],
    _pad: [u8; 4],
    pub session: Session,
    pub root_type_id: TypeId,
    pub payload_size: u32,
}

impl ImageHeader {
    pub fn new(root_type_id: TypeId, payload_size: u32) -> ImageHeader {
        ImageHeader {
            magic: MAGIC,
            _pad: [0; 4],
            session: Session::current(),
            root_type_id,
            payload_size,
        }
    }
}
