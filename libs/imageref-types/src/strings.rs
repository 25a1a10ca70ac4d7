//! Owned string storage with the same borrowed/owned flag shape as
//! [`crate::dynarray::DynArray`].

use imageref_core::type_model::{ByteBufferLayout, TypeDescriptor, TypeId, TypeKind};

#[repr(C)]
pub struct ImgString {
    data: *mut u8,
    len: u32,
    owns_memory: bool,
}

impl ImgString {
    pub fn new() -> ImgString {
        ImgString {
            data: std::ptr::null_mut(),
            len: 0,
            owns_memory: false,
        }
    }

    pub fn from_string(s: String) -> ImgString {
        let mut bytes = s.into_bytes();
        let len = bytes.len() as u32;
        let data = bytes.as_mut_ptr();
        std::mem::forget(bytes);
        ImgString {
            data,
            len,
            owns_memory: true,
        }
    }

    pub fn as_str(&self) -> &str {
        if self.data.is_null() || self.len == 0 {
            return "";
        }
        let bytes = unsafe { std::slice::from_raw_parts(self.data, self.len as usize) };
        std::str::from_utf8(bytes).unwrap_or("")
    }
}

impl Default for ImgString {
    fn default() -> Self {
        ImgString::new()
    }
}

impl Drop for ImgString {
    fn drop(&mut self) {
        if self.owns_memory && !self.data.is_null() {
            unsafe {
                drop(Vec::from_raw_parts(self.data, self.len as usize, self.len as usize));
            }
        }
    }
}

pub struct ImgStringType;

pub static IMG_STRING_TYPE: ImgStringType = ImgStringType;

impl TypeDescriptor for ImgStringType {
    fn kind(&self) -> TypeKind {
        TypeKind::String
    }
    fn size(&self) -> usize {
        std::mem::size_of::<ImgString>()
    }
    fn align(&self) -> usize {
        std::mem::align_of::<ImgString>()
    }
    fn type_id(&self) -> TypeId {
        100
    }
    fn name(&self) -> &'static str {
        "ImgString"
    }
    fn as_byte_buffer(&self) -> Option<&dyn ByteBufferLayout> {
        Some(self)
    }
}

impl ByteBufferLayout for ImgStringType {
    unsafe fn get_len(&self, object: *const u8) -> usize {
        (*(object as *const ImgString)).len as usize
    }

    unsafe fn get_data_ptr(&self, object: *const u8) -> *const u8 {
        (*(object as *const ImgString)).data as *const u8
    }

    unsafe fn get_data_ptr_address(&self, object: *const u8) -> *const u8 {
        std::ptr::addr_of!((*(object as *const ImgString)).data) as *const u8
    }

    unsafe fn set_dont_free_memory(&self, object: *mut u8) {
        (*(object as *mut ImgString)).owns_memory = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_string_roundtrips() {
        let s = ImgString::from_string("hello".to_string());
        assert_eq!(s.as_str(), "hello");
    }

    #[test]
    fn empty_string_has_null_data() {
        let s = ImgString::new();
        assert_eq!(s.as_str(), "");
    }
}
