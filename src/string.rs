//! Text-encoding decoding (spec §4.3.5).
use crate::error::{ParseError, ParseResult};
use crate::io::Reader;

/// The four ID3v2 text encodings, selected by the first byte of most text frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Encoding {
    Latin1,
    Utf16,
    Utf16Be,
    Utf8,
}

impl Encoding {
    /// The width in bytes of this encoding's NUL terminator.
    pub fn nul_size(self) -> usize {
        match self {
            Encoding::Latin1 | Encoding::Utf8 => 1,
            Encoding::Utf16 | Encoding::Utf16Be => 2,
        }
    }

    /// Parses the one-byte encoding selector used at the start of text frames.
    pub fn parse(reader: &mut Reader) -> ParseResult<Self> {
        let byte = reader.read_u8()?;
        match byte {
            0 => Ok(Encoding::Latin1),
            1 => Ok(Encoding::Utf16),
            2 => Ok(Encoding::Utf16Be),
            3 => Ok(Encoding::Utf8),
            other => Err(ParseError::UnsupportedEncoding(other)),
        }
    }
}

/// Reads a NUL-terminated string (terminator consumed, not included in the result).
pub fn read_terminated(encoding: Encoding, reader: &mut Reader) -> ParseResult<String> {
    let needle = match encoding.nul_size() {
        1 => &[0x00][..],
        _ => &[0x00, 0x00][..],
    };
    let raw = reader.read_until(needle)?;
    Ok(decode(encoding, &raw[..raw.len() - needle.len()]))
}

/// Reads the remainder of the active window as a string (no terminator expected).
pub fn read(encoding: Encoding, reader: &mut Reader) -> ParseResult<String> {
    let raw = reader.read_rest()?;
    Ok(decode(encoding, trim_trailing_nul(encoding, &raw)))
}

/// Reads one value from a multi-value text frame body (spec §4.3.4): a NUL terminator
/// ends the value if one is found before the window is exhausted, otherwise the rest of
/// the window is the (unterminated) final value.
pub fn read_terminated_or_rest(encoding: Encoding, reader: &mut Reader) -> ParseResult<String> {
    let needle: &[u8] = if encoding.nul_size() == 1 {
        &[0x00]
    } else {
        &[0x00, 0x00]
    };
    match reader.find_ahead(needle) {
        Some(_) => read_terminated(encoding, reader),
        None => read(encoding, reader),
    }
}

fn trim_trailing_nul(encoding: Encoding, data: &[u8]) -> &[u8] {
    match encoding.nul_size() {
        1 => {
            if data.last() == Some(&0x00) {
                &data[..data.len() - 1]
            } else {
                data
            }
        }
        _ => {
            if data.len() >= 2 && data[data.len() - 2..] == [0x00, 0x00] {
                &data[..data.len() - 2]
            } else {
                data
            }
        }
    }
}

fn decode(encoding: Encoding, data: &[u8]) -> String {
    match encoding {
        Encoding::Latin1 => decode_latin1(data),
        Encoding::Utf8 => String::from_utf8_lossy(data).into_owned(),
        Encoding::Utf16 => decode_utf16_bom(data),
        Encoding::Utf16Be => decode_utf16(data, true),
    }
}

fn decode_latin1(data: &[u8]) -> String {
    data.iter().map(|&b| b as char).collect()
}

/// Per spec §4.3.5: absence of a BOM defaults to Little-Endian (not Big-Endian).
fn decode_utf16_bom(data: &[u8]) -> String {
    match data {
        [0xFF, 0xFE, rest @ ..] => decode_utf16(rest, false),
        [0xFE, 0xFF, rest @ ..] => decode_utf16(rest, true),
        _ => decode_utf16(data, false),
    }
}

fn decode_utf16(data: &[u8], big_endian: bool) -> String {
    let units: Vec<u16> = data
        .chunks_exact(2)
        .map(|pair| {
            if big_endian {
                u16::from_be_bytes([pair[0], pair[1]])
            } else {
                u16::from_le_bytes([pair[0], pair[1]])
            }
        })
        .collect();
    String::from_utf16_lossy(&units)
}
