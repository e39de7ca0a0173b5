//! FLAC metadata-block-chain decoder (C7).
use crate::io::Reader;
use crate::metadata::Metadata;
use crate::vorbis;

const MAGIC: &[u8; 4] = b"fLaC";
const VORBIS_COMMENT_BLOCK_TYPE: u8 = 4;

/// Walks the metadata-block chain starting right after the `"fLaC"` magic, decoding the
/// first Vorbis comment block found (spec §4.5). Returns `None` if the file doesn't
/// start with the magic, or no Vorbis comment block is present.
pub fn probe(src: &[u8]) -> Option<Metadata> {
    let mut reader = Reader::new(src);
    if reader.read_array::<4>().ok()? != *MAGIC {
        return None;
    }

    loop {
        let header = reader.read_u8().ok()?;
        let is_last = header & 0x80 != 0;
        let block_type = header & 0x7F;
        let len = reader.read_u24_be().ok()? as usize;

        if block_type == VORBIS_COMMENT_BLOCK_TYPE {
            let start = reader.pos();
            let map = reader
                .in_window(len, false, vorbis::decode_no_framing)
                .ok()?;
            return Some(Metadata {
                start_offset: start as u64,
                end_offset: (start + len) as u64,
                map,
            });
        }

        if reader.skip(len).is_err() {
            return None;
        }
        if is_last {
            return None;
        }
    }
}
