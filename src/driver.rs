//! Top-level head/tail probing driver (C10): the single `read_all` entry point that
//! combines every format decoder per spec §4.8.
use crate::ape;
use crate::flac;
use crate::id3v1;
use crate::id3v2;
use crate::metadata::{AllMetadata, TypedMetadata};
use crate::ogg;

/// Scans `src` for every recognisable tag and returns them in discovery order
/// (head first, then tail), per spec §4.8 / §5.
pub fn read_all(src: &[u8]) -> AllMetadata {
    let mut tags = Vec::new();
    let mut head = 0usize;

    // Steps 2-3: one or more prepended ID3v2 tags.
    loop {
        match id3v2::probe_prefix(src, head) {
            Ok(Some(decoded)) => {
                head = decoded.meta.end_offset as usize;
                tags.push(TypedMetadata::Id3v2 {
                    header: decoded.header,
                    meta: decoded.meta,
                    comments: decoded.comments,
                    unsynchronized_lyrics: decoded.unsynchronized_lyrics,
                });
            }
            Ok(None) => break,
            Err(_) => break,
        }
    }

    // Step 4: format detection at the head cursor.
    if let Some(rest) = src.get(head..) {
        if rest.starts_with(b"fLaC") {
            if let Some(meta) = flac::probe(rest) {
                tags.push(TypedMetadata::Flac {
                    meta: offset_meta(meta, head),
                });
            }
        } else if rest.starts_with(b"OggS") {
            if let Some(meta) = ogg::probe(rest) {
                tags.push(TypedMetadata::Vorbis {
                    meta: offset_meta(meta, head),
                });
            }
        }
    }

    // Step 5: ID3v1 at the tail, which (if present) moves the effective tail boundary in.
    let mut tail = src.len();
    if let Some(result) = id3v1::probe_tail(src) {
        tail = result.meta.start_offset as usize;
        tags.push(TypedMetadata::Id3v1 { meta: result.meta });
    }

    // Step 6: APE footer at the (possibly moved-in) tail boundary.
    if let Some((header, meta)) = ape::probe_footer(src, tail) {
        tail = meta.start_offset as usize;
        tags.push(TypedMetadata::Ape {
            header_or_footer: header,
            meta,
        });
    }

    // Step 7: ID3v2 footer ("3DI") at the tail boundary.
    if let Ok(Some(decoded)) = id3v2::probe_footer(src, tail) {
        tags.push(TypedMetadata::Id3v2 {
            header: decoded.header,
            meta: decoded.meta,
            comments: decoded.comments,
            unsynchronized_lyrics: decoded.unsynchronized_lyrics,
        });
    }

    // Step 8: order by start_offset; drop any tag that overlaps an earlier-sorted one
    // (the earlier-validated tag wins, per spec §4.8 step 8 / §8 non-overlap invariant).
    tags.sort_by_key(|t| t.metadata().start_offset);
    let mut result: Vec<TypedMetadata> = Vec::with_capacity(tags.len());
    let mut cursor = 0u64;
    for tag in tags {
        if tag.metadata().start_offset < cursor {
            continue;
        }
        cursor = tag.metadata().end_offset;
        result.push(tag);
    }

    AllMetadata { tags: result }
}

/// Head-cursor decoders run on a sub-slice starting at `head`; their returned offsets
/// are relative to that sub-slice and must be shifted back into absolute file offsets.
fn offset_meta(mut meta: crate::metadata::Metadata, head: usize) -> crate::metadata::Metadata {
    meta.start_offset += head as u64;
    meta.end_offset += head as u64;
    meta
}
