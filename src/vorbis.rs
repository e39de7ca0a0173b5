//! Vorbis comment decoder (C8): shared by the FLAC `fLaC` comment block and the
//! standalone Ogg Vorbis comment packet (spec §4.6).
use crate::io::Reader;
use crate::metadata::MetadataMap;

/// Decodes a Vorbis comment packet body with no surrounding framing: vendor
/// string (length-prefixed, discarded per the resolved Open Question in spec §9),
/// comment count, then that many length-prefixed `KEY=value` entries. A malformed
/// entry (no `=`, or a non-UTF-8/empty key) is skipped rather than aborting the
/// whole packet (spec §4.6 edge cases).
pub fn decode_no_framing(reader: &mut Reader) -> MetadataMap {
    let mut map = MetadataMap::new();

    let vendor_len = match reader.read_u32_le() {
        Ok(n) => n as usize,
        Err(_) => return map,
    };
    if reader.skip(vendor_len).is_err() {
        return map;
    }

    let count = match reader.read_u32_le() {
        Ok(n) => n,
        Err(_) => return map,
    };

    for _ in 0..count {
        let len = match reader.read_u32_le() {
            Ok(n) => n as usize,
            Err(_) => break,
        };
        let bytes = match reader.slice(len) {
            Ok(b) => b,
            Err(_) => break,
        };
        decode_entry(bytes, &mut map);
    }

    map
}

fn decode_entry(bytes: &[u8], map: &mut MetadataMap) {
    let text = match std::str::from_utf8(bytes) {
        Ok(s) => s,
        Err(_) => return,
    };
    let mut parts = text.splitn(2, '=');
    let key = match parts.next() {
        Some(k) if !k.is_empty() => k,
        _ => return,
    };
    let value = parts.next().unwrap_or("");
    map.push(key, value);
}
