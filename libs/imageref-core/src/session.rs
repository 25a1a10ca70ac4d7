//! Session fingerprint: gates image/process compatibility without attempting
//! cross-machine portability (no endianness or pointer-width conversion, no
//! schema versioning -- an image built on one process layout is only ever
//! loaded by another process with an identical fingerprint).

use once_cell::sync::Lazy;

/// Bumped whenever the on-disk chunk/fixup-table layout changes in a way
/// that is not otherwise observable from pointer width or endianness alone.
const LAYOUT_CONSTANT: u16 = 1;

/// Fingerprint written into every `ImageHeader` and checked on load.
///
/// Deliberately opaque: callers never construct one by hand, they only ever
/// compare `Session::current()` against whatever a loaded image carries.
#[derive(Copy, Clone, Eq, PartialEq, Debug, zerocopy::AsBytes, zerocopy::FromBytes)]
#[repr(C)]
pub struct Session(u64);

impl Session {
    pub fn as_u64(self) -> u64 {
        self.0
    }

    pub fn current() -> Session {
        *CURRENT
    }

    fn compute() -> Session {
        let pointer_width = std::mem::size_of::<usize>() as u64;
        let endianness: u64 = if cfg!(target_endian = "little") { 0 } else { 1 };
        let build_id = BUILD_ID;
        let fingerprint = (build_id << 24)
            ^ (pointer_width << 16)
            ^ (endianness << 8)
            ^ LAYOUT_CONSTANT as u64;
        Session(fingerprint)
    }
}

/// Stand-in for a real build-id (e.g. a hash of the binary or a linker-supplied
/// symbol). A constant here is sufficient for this process's own lifetime,
/// which is the only lifetime a session fingerprint needs to span.
const BUILD_ID: u64 = 0x494d_4752; // "IMGR"

static CURRENT: Lazy<Session> = Lazy::new(Session::compute);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn current_is_stable_within_process() {
        assert_eq!(Session::current(), Session::current());
    }

    #[test]
    fn compute_matches_current() {
        assert_eq!(Session::compute(), Session::current());
    }
}
