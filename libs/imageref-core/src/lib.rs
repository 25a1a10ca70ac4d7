//! Reflection-driven binary serialization: produces a relocatable in-memory
//! image of an object graph, loadable either by copying a payload into a
//! fresh allocation or by relocating pointers in place over an existing
//! buffer (e.g. an mmap).
//!
//! This crate owns the image format, the chunk/fixup bookkeeping, and the
//! generic visitor walk. It does not own reflection itself: callers supply
//! `&'static dyn TypeDescriptor` implementations (see [`type_model`]) the
//! same way the source's reflection macros produced an `mxClassLayout` for
//! this crate's ancestor to walk.

pub mod chunk_graph;
pub mod clump;
pub mod error;
mod gather;
pub mod image_header;
pub mod image_loader;
pub mod image_writer;
pub mod offset_resolver;
pub mod session;
pub mod type_model;
pub mod visitor;

pub use error::{ImageError, Result};
pub use image_header::ImageHeader;
pub use image_loader::{load_image, load_in_place, load_in_place_from_stream};
pub use image_writer::save_image;
pub use session::Session;
