//! A generic owned dynamic array with an explicit storage-mode flag.
//!
//! The source marks externally-allocated arrays with a post-load pass that
//! walks the object and flips a "don't free" bit (`SetDontFreeMemory`). Here
//! that bit is simply a field (`owns_memory`) the loader sets directly via
//! [`imageref_core::type_model::ArrayLayout::set_dont_free_memory`] -- no
//! separate compile-time distinction is needed because ordinary `Drop`
//! already only runs the free when the flag says to.

use std::marker::PhantomData;

/// Dynamic array with count/capacity/data-pointer layout, matching the
/// shape the source's `mxArray` descriptor expects to find at a `Kind::Array`
/// field's address.
#[repr(C)]
pub struct DynArray<T> {
    data: *mut T,
    len: u32,
    cap: u32,
    owns_memory: bool,
    _marker: PhantomData<T>,
}

impl<T> DynArray<T> {
    pub fn new() -> DynArray<T> {
        DynArray {
            data: std::ptr::null_mut(),
            len: 0,
            cap: 0,
            owns_memory: false,
            _marker: PhantomData,
        }
    }

    pub fn from_vec(mut v: Vec<T>) -> DynArray<T> {
        let len = v.len() as u32;
        let cap = v.capacity() as u32;
        let data = v.as_mut_ptr();
        std::mem::forget(v);
        DynArray {
            data,
            len,
            cap,
            owns_memory: true,
            _marker: PhantomData,
        }
    }

    pub fn as_slice(&self) -> &[T] {
        if self.data.is_null() {
            return &[];
        }
        unsafe { std::slice::from_raw_parts(self.data, self.len as usize) }
    }

    pub fn len(&self) -> usize {
        self.len as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

impl<T> Default for DynArray<T> {
    fn default() -> Self {
        DynArray::new()
    }
}

impl<T> Drop for DynArray<T> {
    fn drop(&mut self) {
        if self.owns_memory && !self.data.is_null() {
            unsafe {
                drop(Vec::from_raw_parts(self.data, self.len as usize, self.cap as usize));
            }
        }
    }
}

/// Implements [`imageref_core::type_model::TypeDescriptor`] and
/// [`imageref_core::type_model::ArrayLayout`] for a concrete `DynArray<$item>`
/// instantiation. One of these is declared per array shape a reflected class
/// actually uses, the same way the source's reflection macros emit one
/// `mxArray` descriptor per concrete array field type.
#[macro_export]
macro_rules! declare_array_type {
    ($static_name:ident, $desc_struct:ident, $item:ty, $item_type:expr, $type_id:expr, $name:literal) => {
        pub struct $desc_struct;

        impl imageref_core::type_model::TypeDescriptor for $desc_struct {
            fn kind(&self) -> imageref_core::type_model::TypeKind {
                imageref_core::type_model::TypeKind::Array
            }
            fn size(&self) -> usize {
                std::mem::size_of::<$crate::dynarray::DynArray<$item>>()
            }
            fn align(&self) -> usize {
                std::mem::align_of::<$crate::dynarray::DynArray<$item>>()
            }
            fn type_id(&self) -> imageref_core::type_model::TypeId {
                $type_id
            }
            fn name(&self) -> &'static str {
                $name
            }
            fn as_array(&self) -> Option<&dyn imageref_core::type_model::ArrayLayout> {
                Some(self)
            }
        }

        impl imageref_core::type_model::ArrayLayout for $desc_struct {
            fn item_type(&self) -> &'static dyn imageref_core::type_model::TypeDescriptor {
                $item_type
            }

            fn is_dynamic(&self) -> bool {
                true
            }

            unsafe fn get_count(&self, array: *const u8) -> usize {
                (*(array as *const $crate::dynarray::DynArray<$item>)).len as usize
            }

            unsafe fn set_count(&self, array: *mut u8, count: usize) {
                (*(array as *mut $crate::dynarray::DynArray<$item>)).len = count as u32;
            }

            unsafe fn get_capacity(&self, array: *const u8) -> usize {
                (*(array as *const $crate::dynarray::DynArray<$item>)).cap as usize
            }

            unsafe fn set_capacity(&self, array: *mut u8, capacity: usize) {
                (*(array as *mut $crate::dynarray::DynArray<$item>)).cap = capacity as u32;
            }

            unsafe fn get_data_ptr(&self, array: *const u8) -> *const u8 {
                (*(array as *const $crate::dynarray::DynArray<$item>)).data as *const u8
            }

            unsafe fn get_data_ptr_address(&self, array: *const u8) -> *const u8 {
                std::ptr::addr_of!((*(array as *const $crate::dynarray::DynArray<$item>)).data) as *const u8
            }

            unsafe fn set_dont_free_memory(&self, array: *mut u8) {
                (*(array as *mut $crate::dynarray::DynArray<$item>)).owns_memory = false;
            }
        }

        pub static $static_name: $desc_struct = $desc_struct;
    };
}
