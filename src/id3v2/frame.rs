//! ID3v2 frame header parsing, the v2.4 non-synchsafe frame-size fallback, and frame
//! body dispatch (spec §4.3.3, §4.3.4).
use crate::error::ParseResult;
use crate::io::Reader;
use crate::metadata::{FullTextEntry, MetadataMap};
use crate::string::Encoding;

/// A decoded frame identifier: 3 bytes for ID3v2.2, 4 bytes otherwise.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameId(pub String);

impl FrameId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

fn is_id_char(b: u8) -> bool {
    b.is_ascii_uppercase() || b.is_ascii_digit()
}

fn valid_id(bytes: &[u8]) -> bool {
    !bytes.is_empty() && bytes.iter().all(|&b| is_id_char(b))
}

pub struct FrameHeader {
    pub id: FrameId,
    pub size: u32,
    pub flags: u16,
}

pub struct Flags {
    pub tag_alter_discard: bool,
    pub compression: bool,
    pub encryption: bool,
    pub grouping: bool,
    pub unsync: bool,
    pub data_length_indicator: bool,
}

pub fn decode_flags(major: u8, raw: u16) -> Flags {
    match major {
        4 => Flags {
            tag_alter_discard: raw & 0x4000 != 0,
            grouping: raw & 0x0040 != 0,
            compression: raw & 0x0008 != 0,
            encryption: raw & 0x0004 != 0,
            unsync: raw & 0x0002 != 0,
            data_length_indicator: raw & 0x0001 != 0,
        },
        _ => Flags {
            tag_alter_discard: raw & 0x8000 != 0,
            compression: raw & 0x0080 != 0,
            encryption: raw & 0x0040 != 0,
            grouping: raw & 0x0020 != 0,
            unsync: false,
            data_length_indicator: false,
        },
    }
}

/// Reads one frame header, honoring each version's width/endianness rules.
///
/// Returns `None` (not an error) when the ID bytes don't validate, so the frame loop
/// can terminate and tolerate trailing padding or truncation.
pub fn read_header(reader: &mut Reader, major: u8) -> ParseResult<Option<FrameHeader>> {
    if major == 2 {
        let id = reader.read_array::<3>()?;
        if !valid_id(&id) {
            return Ok(None);
        }
        let size = reader.read_u24_be()?;
        return Ok(Some(FrameHeader {
            id: FrameId(String::from_utf8_lossy(&id).into_owned()),
            size,
            flags: 0,
        }));
    }

    let id = reader.read_array::<4>()?;
    let frame_id = if valid_id(&id) {
        FrameId(String::from_utf8_lossy(&id).into_owned())
    } else if id[3] == 0 && valid_id(&id[..3]) {
        // A 3-character ID3v2.2-style ID embedded in a v2.3/v2.4 tag (spec §4.3.4):
        // preserved verbatim, never translated to its v2.3/v2.4 equivalent.
        FrameId(String::from_utf8_lossy(&id[..3]).into_owned())
    } else {
        return Ok(None);
    };

    let size = if major == 4 {
        read_v4_frame_size(reader)?
    } else {
        reader.read_u32_be()?
    };
    let flags = reader.read_u16_be()?;

    Ok(Some(FrameHeader {
        id: frame_id,
        size,
        flags,
    }))
}

/// Implements the v2.4 non-synchsafe frame-size fallback (spec §4.3.3, §9 open question):
/// try the synchsafe reading first; if the position it implies doesn't land on a valid
/// next frame, the tag end, or padding, retry as a raw big-endian u32 and use that
/// reading instead if *it* lands validly. Ties (both plausible) keep the synchsafe value.
fn read_v4_frame_size(reader: &mut Reader) -> ParseResult<u32> {
    let raw_bytes = reader.peek(4)?;
    let raw_be = u32::from_be_bytes([raw_bytes[0], raw_bytes[1], raw_bytes[2], raw_bytes[3]]);

    let synchsafe = reader.read_synchsafe_u32().ok();
    let chosen = match synchsafe {
        Some(size) => {
            if lands_plausibly(reader, size) || raw_be == size {
                size
            } else if lands_plausibly(reader, raw_be) {
                raw_be
            } else {
                size
            }
        }
        None => raw_be,
    };

    Ok(chosen)
}

/// Checks whether a candidate frame size lands at the window end, on a padding byte, or
/// on the start of another syntactically valid frame ID.
///
/// Called from [`read_v4_frame_size`], which runs *before* the 2 frame-flag bytes that
/// follow the size field have been consumed: `reader.pos()` still sits right after the
/// size, not at the start of the frame body. Every offset below is shifted by
/// `FLAG_BYTES` to land on the real body boundary instead of 2 bytes inside it.
fn lands_plausibly(reader: &Reader, size: u32) -> bool {
    const FLAG_BYTES: usize = 2;
    let size = size as usize;
    let candidate_end = reader.pos() + FLAG_BYTES + size;
    let window_end = reader.window_end();

    if candidate_end == window_end {
        return true; // lands exactly at tag end
    }
    if candidate_end > window_end {
        return false;
    }
    match reader.peek_at(FLAG_BYTES + size, 1) {
        Ok(b) if b[0] == 0x00 => true, // padding
        Ok(_) => reader
            .peek_at(FLAG_BYTES + size, 4)
            .map(|next| valid_id(&next[..3]) || valid_id(next))
            .unwrap_or(false),
        Err(_) => false,
    }
}

/// The decoded payload of a single frame, already dispatched by ID (spec §4.3.4).
pub enum FrameBody {
    /// A `T...` (not `TXXX`) text frame: zero or more NUL-terminated values.
    Text { values: Vec<String> },
    /// `TXXX`: a single user-defined (description, value) pair.
    UserText { description: String, value: String },
    /// A `W...` (not `WXXX`) URL frame: a single Latin-1 URL.
    Url { value: String },
    /// `WXXX`: a single user-defined (description, url) pair.
    UserUrl { description: String, value: String },
    /// `COMM` or `USLT`: language + description + value.
    FullText { entry: FullTextEntry },
    /// Anything this crate does not decode further; its bytes are simply skipped.
    Unknown,
}

/// Dispatches on frame ID and decodes the frame body from `reader`, which is already
/// windowed to exactly this frame's (post data-length-indicator) body bytes.
pub fn decode_body(id: &FrameId, reader: &mut Reader) -> ParseResult<FrameBody> {
    let name = id.as_str();

    if name == "TXXX" {
        let encoding = Encoding::parse(reader)?;
        let description = crate::string::read_terminated(encoding, reader)?;
        let value = crate::string::read(encoding, reader)?;
        return Ok(FrameBody::UserText { description, value });
    }

    if name == "WXXX" {
        let encoding = Encoding::parse(reader)?;
        let description = crate::string::read_terminated(encoding, reader)?;
        let value = crate::string::read(Encoding::Latin1, reader)?;
        return Ok(FrameBody::UserUrl { description, value });
    }

    if name == "COMM" || name == "USLT" {
        let encoding = Encoding::parse(reader)?;
        let language = reader.read_array::<3>()?;
        let description = crate::string::read_terminated(encoding, reader)?;
        let value = crate::string::read(encoding, reader)?;
        return Ok(FrameBody::FullText {
            entry: FullTextEntry {
                language,
                description,
                value,
            },
        });
    }

    if name.starts_with('T') && name.len() >= 3 {
        let encoding = Encoding::parse(reader)?;
        let mut values = Vec::new();
        while !reader.is_empty() {
            values.push(crate::string::read_terminated_or_rest(encoding, reader)?);
        }
        // Drop a trailing empty value produced by a final terminator with no content.
        if values.last().map_or(false, String::is_empty) {
            values.pop();
        }
        return Ok(FrameBody::Text { values });
    }

    if name.starts_with('W') && name.len() >= 3 {
        let value = crate::string::read(Encoding::Latin1, reader)?;
        return Ok(FrameBody::Url { value });
    }

    Ok(FrameBody::Unknown)
}

/// Applies a decoded [`FrameBody`] into the tag's map and full-text lists.
pub fn apply_body(
    id: &FrameId,
    body: FrameBody,
    map: &mut MetadataMap,
    comments: &mut crate::metadata::FullTextMap,
    unsynchronized_lyrics: &mut crate::metadata::FullTextMap,
) {
    match body {
        FrameBody::Text { values } => {
            for value in values {
                map.push(id.as_str(), value);
            }
        }
        FrameBody::UserText { description, value } => {
            map.push(description, value);
        }
        FrameBody::Url { value } => {
            map.push(id.as_str(), value);
        }
        FrameBody::UserUrl { description, value } => {
            map.push(description, value);
        }
        FrameBody::FullText { entry } => {
            if id.as_str() == "COMM" {
                comments.push(entry);
            } else {
                unsynchronized_lyrics.push(entry);
            }
        }
        FrameBody::Unknown => {}
    }
}
