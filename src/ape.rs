//! APEv1/v2 decoder (C6): header-or-footer tags most commonly appended at end-of-file.
use crate::io::Reader;
use crate::metadata::{ApeHeader, Metadata, MetadataMap};

const PREAMBLE: &[u8; 8] = b"APETAGEX";
const STRUCT_SIZE: u64 = 32;
const MAX_KEY_LEN: usize = 255;

struct Probe {
    header: ApeHeader,
    meta: Metadata,
}

fn parse_struct(reader: &mut Reader) -> Option<ApeHeader> {
    if reader.read_array::<8>().ok()? != *PREAMBLE {
        return None;
    }
    let version = reader.read_u32_le().ok()?;
    if version != 1000 && version != 2000 {
        return None;
    }
    let tag_size = reader.read_u32_le().ok()?;
    let item_count = reader.read_u32_le().ok()?;
    let flags = reader.read_u32_le().ok()?;
    reader.skip(8).ok()?; // reserved

    Some(ApeHeader {
        version,
        item_count,
        tag_size,
        flags,
        is_header: flags & (1 << 29) != 0,
    })
}

/// Decodes the item list that follows a header, or precedes a footer, of `tag_size` bytes
/// (footer included; a preceding header is not, per spec §4.4).
fn decode_items(reader: &mut Reader, header: &ApeHeader) -> MetadataMap {
    let mut map = MetadataMap::new();
    let body_len = header.tag_size as usize;
    let trailing_footer_bytes = if header.is_header {
        if header.has_footer() { STRUCT_SIZE as usize } else { 0 }
    } else {
        STRUCT_SIZE as usize
    };
    let item_area = body_len.saturating_sub(trailing_footer_bytes);

    if reader.push_window(item_area, false).is_err() {
        return map;
    }

    for _ in 0..header.item_count {
        if reader.is_empty() {
            break;
        }
        if decode_one_item(reader, &mut map).is_none() {
            break;
        }
    }

    let _ = reader.read_rest();
    reader.pop_window();
    map
}

fn decode_one_item(reader: &mut Reader, map: &mut MetadataMap) -> Option<()> {
    let value_size = reader.read_u32_le().ok()? as usize;
    let flags = reader.read_u32_le().ok()?;
    let key_bytes = reader.read_until(&[0x00]).ok()?;
    let key = &key_bytes[..key_bytes.len() - 1];

    if key.len() > MAX_KEY_LEN || !key.iter().all(u8::is_ascii) {
        reader.skip(value_size).ok()?;
        return Some(());
    }
    let key = String::from_utf8_lossy(key).into_owned();

    let item_type = (flags >> 1) & 0x3;
    let value = reader.slice(value_size).ok()?;

    if item_type == 0 {
        // Plain UTF-8 text; multi-value items are NUL-separated (spec §4.4).
        for part in value.split(|&b| b == 0x00) {
            if !part.is_empty() {
                map.push(&key, String::from_utf8_lossy(part).into_owned());
            }
        }
    }
    // Binary (1) and locator/external (2, 3) items are skipped per spec §4.4.

    Some(())
}

fn finish(start: usize, end: usize, header: ApeHeader, map: MetadataMap) -> Probe {
    Probe {
        header,
        meta: Metadata {
            start_offset: start as u64,
            end_offset: end as u64,
            map,
        },
    }
}

/// Probes for an APE header at offset 0.
pub fn probe_header(src: &[u8]) -> Option<(ApeHeader, Metadata)> {
    let mut reader = Reader::new(src);
    let header = parse_struct(&mut reader)?;
    if !header.is_header {
        return None;
    }
    let map = decode_items(&mut reader, &header);
    let end = (STRUCT_SIZE as usize) + header.tag_size as usize;
    let probe = finish(0, end.min(src.len()), header, map);
    Some((probe.header, probe.meta))
}

/// Probes for an APE footer ending at `end` (the effective tail boundary, which may
/// already have been moved in by a preceding ID3v1 tag per spec §4.8 step 6).
pub fn probe_footer(src: &[u8], end: usize) -> Option<(ApeHeader, Metadata)> {
    if end < STRUCT_SIZE as usize {
        return None;
    }
    let footer_start = end - STRUCT_SIZE as usize;
    let mut reader = Reader::new(src);
    reader.seek_to(footer_start).ok()?;
    let header = parse_struct(&mut reader)?;
    if header.is_header {
        return None;
    }

    let items_start = end.checked_sub(header.tag_size as usize)?;

    let mut item_reader = Reader::new(src);
    item_reader.seek_to(items_start).ok()?;
    let map = decode_items(&mut item_reader, &header);

    // `tag_size` excludes a preceding 32-byte header (spec §4.4); if the footer's flags
    // say a header is present, extend the reported range back over it too (Symphonia's
    // `real_size = size + 32` adjustment, symphonia-metadata/src/ape.rs:212).
    let extra_header_bytes = if header.has_header() { STRUCT_SIZE as usize } else { 0 };
    let tag_start = items_start.checked_sub(extra_header_bytes)?;

    let probe = finish(tag_start, end, header, map);
    Some((probe.header, probe.meta))
}
