//! ID3v2 decoder (C5): the most complex of the five format decoders. Parses the tag
//! header, the optional extended header, and the frame loop, dispatching each frame to
//! its text-encoding-aware decoder.
pub mod frame;
pub mod header;

use crate::error::{ParseError, ParseResult};
use crate::io::Reader;
use crate::metadata::{FullTextMap, Id3v2Header, Metadata, MetadataMap};
use log::{info, warn};

pub struct DecodedId3v2 {
    pub header: Id3v2Header,
    pub meta: Metadata,
    pub comments: FullTextMap,
    pub unsynchronized_lyrics: FullTextMap,
}

/// Attempts to decode an ID3v2 prefix tag starting at `start`. Returns `None` (not an
/// error) when there is no tag there, per spec §4.8 step 2.
pub fn probe_prefix(src: &[u8], start: usize) -> ParseResult<Option<DecodedId3v2>> {
    if start + header::HEADER_SIZE > src.len() {
        return Ok(None);
    }

    let mut reader = Reader::new(src);
    reader.seek_to(start)?;

    let tag_header = match header::parse_header(&mut reader)? {
        Some(h) => h,
        None => return Ok(None),
    };

    let body_start = reader.pos();
    let declared_len = tag_header.size as usize;
    let available_len = src.len().saturating_sub(body_start);
    let truncated = declared_len > available_len;
    if truncated {
        info!(
            "id3v2 tag at {:#x} declares size {} bytes but only {} remain; truncating",
            start, declared_len, available_len
        );
    }
    let body_len = declared_len.min(available_len);

    let global_unsync = tag_header.major_version == 3 && tag_header.unsynchronisation();

    let mut map = MetadataMap::new();
    let mut comments = FullTextMap::new();
    let mut unsynchronized_lyrics = FullTextMap::new();

    reader.push_window(body_len, global_unsync)?;

    if tag_header.has_extended_header() {
        if let Err(e) = header::skip_extended_header(&mut reader, &tag_header) {
            info!("id3v2 extended header malformed, ignoring: {}", e);
        }
    }

    decode_frames(
        &mut reader,
        &tag_header,
        &mut map,
        &mut comments,
        &mut unsynchronized_lyrics,
    );

    // Drain whatever is left (padding, or bytes skipped past a terminated loop) so the
    // window pop leaves the cursor exactly at the tag's declared end.
    let _ = reader.read_rest();
    reader.pop_window();

    let end_offset = (body_start + body_len) as u64;

    Ok(Some(DecodedId3v2 {
        header: tag_header,
        meta: Metadata {
            start_offset: start as u64,
            end_offset,
            map,
        },
        comments,
        unsynchronized_lyrics,
    }))
}

fn decode_frames(
    reader: &mut Reader,
    tag_header: &Id3v2Header,
    map: &mut MetadataMap,
    comments: &mut FullTextMap,
    unsynchronized_lyrics: &mut FullTextMap,
) {
    loop {
        if reader.is_empty() {
            break;
        }

        let peek = match reader.peek(1) {
            Ok(b) => b,
            Err(_) => break,
        };
        if peek[0] == 0x00 {
            break; // padding: spec §4.3.3 step 1
        }

        let frame_header = match frame::read_header(reader, tag_header.major_version) {
            Ok(Some(h)) => h,
            Ok(None) => break, // invalid ID: tolerate truncation, stop the loop
            Err(e) => {
                warn!("error reading id3v2 frame header: {}", e);
                break;
            }
        };

        let per_frame_unsync = tag_header.major_version == 4
            && frame::decode_flags(tag_header.major_version, frame_header.flags).unsync;

        if reader
            .push_window(frame_header.size as usize, per_frame_unsync)
            .is_err()
        {
            // Declared size exceeds the remaining tag body: spec §4.3.3 step 4.
            warn!(
                "id3v2 frame {} declares size past tag end; stopping frame loop",
                frame_header.id.as_str()
            );
            break;
        }

        decode_one_frame(reader, tag_header.major_version, &frame_header, map, comments, unsynchronized_lyrics);

        let _ = reader.read_rest();
        reader.pop_window();
    }
}

fn decode_one_frame(
    reader: &mut Reader,
    major: u8,
    frame_header: &frame::FrameHeader,
    map: &mut MetadataMap,
    comments: &mut FullTextMap,
    unsynchronized_lyrics: &mut FullTextMap,
) {
    let flags = frame::decode_flags(major, frame_header.flags);

    if flags.grouping && reader.skip(1).is_err() {
        return;
    }

    if flags.compression || flags.encryption {
        // Not a supported transform here (spec §4.3.3): skip the opaque body.
        let _ = reader.read_rest();
        return;
    }

    if flags.data_length_indicator && reader.read_synchsafe_u32().is_err() {
        return;
    }

    match frame::decode_body(&frame_header.id, reader) {
        Ok(body) => frame::apply_body(&frame_header.id, body, map, comments, unsynchronized_lyrics),
        Err(e) => warn!(
            "skipping malformed id3v2 frame {}: {}",
            frame_header.id.as_str(),
            e
        ),
    }
}

/// Looks for a trailing `"3DI"` footer ending at `end` and, if present, re-decodes the
/// tag by seeking back `size` bytes from there (spec §4.3.1, §4.8 step 7).
pub fn probe_footer(src: &[u8], end: usize) -> ParseResult<Option<DecodedId3v2>> {
    if end < header::HEADER_SIZE {
        return Ok(None);
    }
    let footer_start = end - header::HEADER_SIZE;
    let mut reader = Reader::new(src);
    reader.seek_to(footer_start)?;

    if reader.peek(3)? != *b"3DI" {
        return Ok(None);
    }
    reader.skip(3)?;
    let major_version = reader.read_u8()?;
    let _minor = reader.read_u8()?;
    let _flags = reader.read_u8()?;
    let size = reader.read_synchsafe_u32()?;

    if !(2..=4).contains(&major_version) {
        return Ok(None);
    }

    let tag_start = footer_start
        .checked_sub(size as usize)
        .and_then(|p| p.checked_sub(header::HEADER_SIZE));
    let tag_start = match tag_start {
        Some(p) => p,
        None => return Err(ParseError::MalformedTag("id3v2 footer size underflows".into())),
    };

    probe_prefix(src, tag_start)
}
