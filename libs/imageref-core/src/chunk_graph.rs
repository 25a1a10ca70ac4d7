//! Gathers the set of chunks, pointer/type/asset fixups that make up a
//! relocatable image, assigns each chunk a file offset, and writes the whole
//! thing out. Grounded on the source's `LIPInfoGatherer::AddChunk` /
//! `AddPointer` / `ResolveChunkOffsets` / `WriteChunksAndFixUpTables`: a
//! flat list of (offset, target) fixups applied against a byte buffer.

use std::collections::BTreeMap;
use std::io::Write;

use byteorder::{LittleEndian, WriteBytesExt};

use crate::error::{ImageError, Result};
use crate::offset_resolver::{self, OBJECT_BLOB_ALIGNMENT};

/// Byte written into alignment padding in debug builds, so a hex dump shows
/// at a glance which bytes are real payload and which are filler -- the
/// source's `MCHAR4('P','A','D','N')` carve-out, shrunk to one repeated
/// byte since this format pads at byte granularity rather than in four-byte
/// words. Release builds pad with zero, matching the source's "content
/// doesn't matter" note for non-debug builds.
#[cfg(debug_assertions)]
const PADDING_MARKER: u8 = 0xAD;
#[cfg(not(debug_assertions))]
const PADDING_MARKER: u8 = 0;

/// One owned sub-object (or the root object) and its serialized bytes.
pub struct Chunk {
    /// Address of the live object this chunk was gathered from. Used both to
    /// dedup chunks for cyclic/aliased graphs and to resolve pointers that
    /// target this chunk. Zero for chunks with no meaningful live address
    /// (there are none today, but nothing here assumes non-zero).
    source_address: usize,
    data: Vec<u8>,
    alignment: usize,
    offset: u32,
}

struct PointerFixSite {
    chunk_index: usize,
    offset_in_chunk: u32,
    target_address: usize,
}

struct TypeFixSite {
    chunk_index: usize,
    offset_in_chunk: u32,
    type_id: crate::type_model::TypeId,
}

struct AssetFixSite {
    chunk_index: usize,
    offset_in_chunk: u32,
    asset_id: String,
}

/// Smallest alignment any chunk is allowed to request. Mirrors the source's
/// `largest(_alignment, MINIMUM_ALIGNMENT)` clamp in `LIPInfoGatherer::AddChunk`
/// -- callers (e.g. a single `u8` field) may ask for alignment 1, but the
/// platform's natural minimum is never relaxed below this.
const MINIMUM_ALIGNMENT: usize = 4;

#[derive(Default)]
pub struct ChunkGraph {
    chunks: Vec<Chunk>,
    by_address: BTreeMap<usize, usize>,
    pointers: Vec<PointerFixSite>,
    type_fixes: Vec<TypeFixSite>,
    asset_fixes: Vec<AssetFixSite>,
    resolved_size: Option<u32>,
}

impl ChunkGraph {
    pub fn new() -> ChunkGraph {
        ChunkGraph::default()
    }

    /// Adds a chunk gathered from `source_address`, or returns the index of
    /// an already-added chunk at that address. Mirrors `AddChunk`'s
    /// short-circuit for shared/aliased sub-objects: the caller (the
    /// gathering visitor) must look the chunk up by address before deciding
    /// whether it still needs to walk that object's fields.
    pub fn add_chunk(&mut self, source_address: usize, data: Vec<u8>, alignment: usize) -> usize {
        if source_address != 0 {
            if let Some(&existing) = self.by_address.get(&source_address) {
                return existing;
            }
        }
        let alignment = alignment.max(MINIMUM_ALIGNMENT);
        let index = self.chunks.len();
        log::trace!(
            "add_chunk: index={} address={:#x} size={} align={}",
            index,
            source_address,
            data.len(),
            alignment
        );
        self.chunks.push(Chunk {
            source_address,
            data,
            alignment,
            offset: 0,
        });
        if source_address != 0 {
            self.by_address.insert(source_address, index);
        }
        self.resolved_size = None;
        index
    }

    /// True if a chunk already exists for `source_address` -- lets a
    /// gathering visitor skip re-walking a shared object's fields.
    pub fn contains_address(&self, source_address: usize) -> bool {
        source_address != 0 && self.by_address.contains_key(&source_address)
    }

    pub fn chunk_index_for_address(&self, source_address: usize) -> Option<usize> {
        self.by_address.get(&source_address).copied()
    }

    pub fn add_pointer(&mut self, chunk_index: usize, offset_in_chunk: u32, target_address: usize) {
        log::trace!(
            "add_pointer: chunk={} offset={} target={:#x}",
            chunk_index,
            offset_in_chunk,
            target_address
        );
        self.pointers.push(PointerFixSite {
            chunk_index,
            offset_in_chunk,
            target_address,
        });
    }

    pub fn add_type_ref(
        &mut self,
        chunk_index: usize,
        offset_in_chunk: u32,
        type_id: crate::type_model::TypeId,
    ) {
        self.type_fixes.push(TypeFixSite {
            chunk_index,
            offset_in_chunk,
            type_id,
        });
    }

    pub fn add_asset_ref(&mut self, chunk_index: usize, offset_in_chunk: u32, asset_id: String) {
        self.asset_fixes.push(AssetFixSite {
            chunk_index,
            offset_in_chunk,
            asset_id,
        });
    }

    /// Assigns each chunk a file offset, in add order, respecting each
    /// chunk's own alignment, then pads the whole payload up to
    /// `OBJECT_BLOB_ALIGNMENT`. Returns the total payload size in bytes.
    /// The arithmetic itself lives in [`crate::offset_resolver`]; this just
    /// feeds it this graph's chunks and writes the results back.
    pub fn resolve_offsets(&mut self) -> u32 {
        let sizes_and_alignments: Vec<(usize, usize)> =
            self.chunks.iter().map(|c| (c.data.len(), c.alignment)).collect();
        let (offsets, total) = offset_resolver::resolve(&sizes_and_alignments);
        for (chunk, offset) in self.chunks.iter_mut().zip(offsets) {
            chunk.offset = offset;
        }
        self.resolved_size = Some(total);
        total
    }

    /// Finds the chunk whose byte range contains `address`, and the byte
    /// offset of `address` within it. Used to resolve pointer targets that
    /// may point into the middle of a chunk (a field of a sub-object), not
    /// just at its start.
    fn find_chunk_containing(&self, address: usize) -> Option<(usize, usize)> {
        if address == 0 {
            return None;
        }
        let (&base, &index) = self.by_address.range(..=address).next_back()?;
        let chunk = &self.chunks[index];
        let within = address - base;
        let in_range = within < chunk.data.len() || (within == 0 && chunk.data.is_empty());
        in_range.then_some((index, within))
    }

    /// Writes padding + chunk data, then the pointer/type/asset fixup
    /// tables, each prefixed by a `u32` record count. Call only after
    /// `resolve_offsets`.
    pub fn write<W: Write>(&self, out: &mut W) -> Result<()> {
        let total = self
            .resolved_size
            .expect("resolve_offsets must run before write");

        let mut written: u32 = 0;
        for chunk in &self.chunks {
            let pad = chunk.offset - written;
            if pad > 0 {
                out.write_all(&vec![PADDING_MARKER; pad as usize])
                    .map_err(ImageError::FailedToWriteStream)?;
                written += pad;
            }
            out.write_all(&chunk.data)
                .map_err(ImageError::FailedToWriteStream)?;
            written += chunk.data.len() as u32;
        }
        if total > written {
            out.write_all(&vec![PADDING_MARKER; (total - written) as usize])
                .map_err(ImageError::FailedToWriteStream)?;
        }

        out.write_u32::<LittleEndian>(self.pointers.len() as u32)
            .map_err(ImageError::FailedToWriteStream)?;
        for fix in &self.pointers {
            let slot_offset = self.chunks[fix.chunk_index].offset + fix.offset_in_chunk;
            let (target_index, within) = self
                .find_chunk_containing(fix.target_address)
                .ok_or(ImageError::BadPointer { offset: slot_offset })?;
            let target_offset = self.chunks[target_index].offset + within as u32;
            out.write_u32::<LittleEndian>(slot_offset)
                .map_err(ImageError::FailedToWriteStream)?;
            out.write_u32::<LittleEndian>(target_offset)
                .map_err(ImageError::FailedToWriteStream)?;
        }

        out.write_u32::<LittleEndian>(self.type_fixes.len() as u32)
            .map_err(ImageError::FailedToWriteStream)?;
        for fix in &self.type_fixes {
            let slot_offset = self.chunks[fix.chunk_index].offset + fix.offset_in_chunk;
            out.write_u32::<LittleEndian>(slot_offset)
                .map_err(ImageError::FailedToWriteStream)?;
            out.write_u32::<LittleEndian>(fix.type_id)
                .map_err(ImageError::FailedToWriteStream)?;
        }

        out.write_u32::<LittleEndian>(self.asset_fixes.len() as u32)
            .map_err(ImageError::FailedToWriteStream)?;
        for fix in &self.asset_fixes {
            let slot_offset = self.chunks[fix.chunk_index].offset + fix.offset_in_chunk;
            let bytes = fix.asset_id.as_bytes();
            out.write_u32::<LittleEndian>(slot_offset)
                .map_err(ImageError::FailedToWriteStream)?;
            out.write_u32::<LittleEndian>(bytes.len() as u32)
                .map_err(ImageError::FailedToWriteStream)?;
            out.write_all(bytes).map_err(ImageError::FailedToWriteStream)?;
        }

        log::info!(
            "wrote image: {} bytes, {} chunks, {} pointer fixups, {} type fixups, {} asset fixups",
            total,
            self.chunks.len(),
            self.pointers.len(),
            self.type_fixes.len(),
            self.asset_fixes.len()
        );
        Ok(())
    }

    pub fn chunk_offset(&self, chunk_index: usize) -> u32 {
        self.chunks[chunk_index].offset
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dedups_chunks_by_address() {
        let mut graph = ChunkGraph::new();
        let a = graph.add_chunk(0x1000, vec![1, 2, 3], 4);
        let b = graph.add_chunk(0x1000, vec![9, 9, 9], 4);
        assert_eq!(a, b);
        assert_eq!(graph.chunks.len(), 1);
    }

    #[test]
    fn resolve_offsets_respects_alignment_and_pads_total() {
        let mut graph = ChunkGraph::new();
        graph.add_chunk(0x1, vec![0u8; 3], 1);
        graph.add_chunk(0x2, vec![0u8; 4], 8);
        let total = graph.resolve_offsets();
        assert_eq!(graph.chunk_offset(0), 0);
        assert_eq!(graph.chunk_offset(1), 8);
        assert_eq!(total % OBJECT_BLOB_ALIGNMENT as u32, 0);
        assert!(total >= 12);
    }

    #[test]
    fn write_roundtrips_a_simple_pointer_fixup() {
        let mut graph = ChunkGraph::new();
        let root = graph.add_chunk(0x10, vec![0u8; 8], 8);
        let target = graph.add_chunk(0x20, vec![7u8; 4], 4);
        let _ = target;
        graph.add_pointer(root, 0, 0x20);
        graph.resolve_offsets();
        let mut buf = Vec::new();
        graph.write(&mut buf).unwrap();
        assert!(!buf.is_empty());
    }

    #[test]
    fn write_fails_on_dangling_pointer() {
        let mut graph = ChunkGraph::new();
        let root = graph.add_chunk(0x10, vec![0u8; 8], 8);
        graph.add_pointer(root, 0, 0xdead_beef);
        graph.resolve_offsets();
        let mut buf = Vec::new();
        assert!(matches!(
            graph.write(&mut buf),
            Err(ImageError::BadPointer { .. })
        ));
    }
}
