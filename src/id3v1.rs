//! ID3v1 decoder (C4): the fixed 128-byte trailer.
use crate::io::Reader;
use crate::metadata::{Metadata, MetadataMap};

const TAG_SIZE: u64 = 128;

/// Standard ID3v1 genre table (indices 0-79) plus the Winamp extensions (80-147).
const GENRES: &[&str] = &[
    "Blues",
    "Classic Rock",
    "Country",
    "Dance",
    "Disco",
    "Funk",
    "Grunge",
    "Hip-Hop",
    "Jazz",
    "Metal",
    "New Age",
    "Oldies",
    "Other",
    "Pop",
    "R&B",
    "Rap",
    "Reggae",
    "Rock",
    "Techno",
    "Industrial",
    "Alternative",
    "Ska",
    "Death Metal",
    "Pranks",
    "Soundtrack",
    "Euro-Techno",
    "Ambient",
    "Trip-Hop",
    "Vocal",
    "Jazz+Funk",
    "Fusion",
    "Trance",
    "Classical",
    "Instrumental",
    "Acid",
    "House",
    "Game",
    "Sound Clip",
    "Gospel",
    "Noise",
    "Alternative Rock",
    "Bass",
    "Soul",
    "Punk",
    "Space",
    "Meditative",
    "Instrumental Pop",
    "Instrumental Rock",
    "Ethnic",
    "Gothic",
    "Darkwave",
    "Techno-Industrial",
    "Electronic",
    "Pop-Folk",
    "Eurodance",
    "Dream",
    "Southern Rock",
    "Comedy",
    "Cult",
    "Gangsta",
    "Top 40",
    "Christian Rap",
    "Pop/Funk",
    "Jungle",
    "Native US",
    "Cabaret",
    "New Wave",
    "Psychadelic",
    "Rave",
    "Showtunes",
    "Trailer",
    "Lo-Fi",
    "Tribal",
    "Acid Punk",
    "Acid Jazz",
    "Polka",
    "Retro",
    "Musical",
    "Rock & Roll",
    "Hard Rock",
    "Folk",
    "Folk-Rock",
    "National Folk",
    "Swing",
    "Fast Fusion",
    "Bebob",
    "Latin",
    "Revival",
    "Celtic",
    "Bluegrass",
    "Avantgarde",
    "Gothic Rock",
    "Progressive Rock",
    "Psychedelic Rock",
    "Symphonic Rock",
    "Slow Rock",
    "Big Band",
    "Chorus",
    "Easy Listening",
    "Acoustic",
    "Humour",
    "Speech",
    "Chanson",
    "Opera",
    "Chamber Music",
    "Sonata",
    "Symphony",
    "Booty Bass",
    "Primus",
    "Porn Groove",
    "Satire",
    "Slow Jam",
    "Club",
    "Tango",
    "Samba",
    "Folklore",
    "Ballad",
    "Power Ballad",
    "Rhytmic Soul",
    "Freestyle",
    "Duet",
    "Punk Rock",
    "Drum Solo",
    "Acapella",
    "Euro-House",
    "Dance Hall",
    "Goa",
    "Drum & Bass",
    "Club-House",
    "Hardcore",
    "Terror",
    "Indie",
    "BritPop",
    "Negerpunk",
    "Polsk Punk",
    "Beat",
    "Christian Gangsta",
    "Heavy Metal",
    "Black Metal",
    "Crossover",
    "Contemporary C",
    "Christian Rock",
    "Merengue",
    "Salsa",
    "Thrash Metal",
    "Anime",
    "JPop",
    "SynthPop",
];

fn genre_name(id: u8) -> Option<String> {
    if id == 0xFF {
        return None;
    }
    match GENRES.get(id as usize) {
        Some(name) => Some((*name).to_string()),
        None => Some(id.to_string()),
    }
}

fn decode_latin1_trimmed(bytes: &[u8]) -> String {
    let trimmed = match bytes.iter().rposition(|&b| b != 0x00 && b != 0x20) {
        Some(i) => &bytes[..=i],
        None => &[],
    };
    trimmed.iter().map(|&b| b as char).collect()
}

fn push_if_nonempty(map: &mut MetadataMap, key: &str, bytes: &[u8]) {
    let value = decode_latin1_trimmed(bytes);
    if !value.is_empty() {
        map.push(key, value);
    }
}

/// Attempts to decode a `"TAG"`-prefixed 128-byte trailer ending at `stream_len`.
///
/// Returns `None` if the file is shorter than 128 bytes or the marker does not match.
pub fn probe_tail(src: &[u8]) -> Option<TypedResult> {
    let len = src.len() as u64;
    if len < TAG_SIZE {
        return None;
    }
    let start = len - TAG_SIZE;
    let mut reader = Reader::new(&src[start as usize..]);

    if reader.read_array::<3>().ok()? != *b"TAG" {
        return None;
    }

    let title = reader.slice(30).ok()?;
    let artist = reader.slice(30).ok()?;
    let album = reader.slice(30).ok()?;
    let year = reader.slice(4).ok()?;
    let comment = reader.slice(30).ok()?;
    let genre_byte = reader.read_u8().ok()?;

    let mut map = MetadataMap::new();
    push_if_nonempty(&mut map, "TITLE", title);
    push_if_nonempty(&mut map, "ARTIST", artist);
    push_if_nonempty(&mut map, "ALBUM", album);

    if year.iter().any(|&b| b != 0x00 && b != b'0') {
        push_if_nonempty(&mut map, "YEAR", year);
    }

    // Track detection (spec §4.2): `comment[28] == 0x00 && comment[29] != 0x00` means the
    // last two comment bytes are an ID3v1.1 track marker, not comment text.
    if comment[28] == 0x00 && comment[29] != 0x00 {
        map.push("TRACKNUMBER", comment[29].to_string());
        push_if_nonempty(&mut map, "COMMENT", &comment[..28]);
    } else {
        push_if_nonempty(&mut map, "COMMENT", comment);
    }

    if let Some(genre) = genre_name(genre_byte) {
        map.push("GENRE", genre);
    }

    Some(TypedResult {
        meta: Metadata {
            start_offset: start,
            end_offset: len,
            map,
        },
    })
}

pub struct TypedResult {
    pub meta: Metadata,
}
