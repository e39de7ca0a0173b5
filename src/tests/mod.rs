//! End-to-end scenarios driving `read_all` over whole synthetic files, one per format
//! combination the head/tail probing driver has to handle (spec §4.8).
use crate::read_all;
use crate::TypedMetadata;

fn synchsafe(mut v: u32) -> [u8; 4] {
    let mut out = [0u8; 4];
    for i in (0..4).rev() {
        out[i] = (v & 0x7F) as u8;
        v >>= 7;
    }
    out
}

fn v3_text_frame(id: &[u8; 4], encoding: u8, text: &[u8]) -> Vec<u8> {
    let mut body = vec![encoding];
    body.extend_from_slice(text);
    let mut frame = Vec::new();
    frame.extend_from_slice(id);
    frame.extend_from_slice(&(body.len() as u32).to_be_bytes());
    frame.extend_from_slice(&[0, 0]);
    frame.extend(body);
    frame
}

fn wrap_v2_tag(major: u8, flags: u8, frames: &[u8], padding: usize) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend_from_slice(b"ID3");
    out.push(major);
    out.push(0);
    out.push(flags);
    let size = frames.len() + padding;
    out.extend_from_slice(&synchsafe(size as u32));
    out.extend_from_slice(frames);
    out.extend(std::iter::repeat(0u8).take(padding));
    out
}

fn id3v1_tag(title: &str, artist: &str, album: &str, track: u8, genre: u8) -> Vec<u8> {
    let mut buf = Vec::new();
    buf.extend_from_slice(b"TAG");
    let mut field = |buf: &mut Vec<u8>, s: &str, width: usize| {
        let mut bytes = s.as_bytes().to_vec();
        bytes.resize(width, 0);
        buf.extend_from_slice(&bytes);
    };
    field(&mut buf, title, 30);
    field(&mut buf, artist, 30);
    field(&mut buf, album, 30);
    field(&mut buf, "", 4); // year
    let mut comment = vec![0u8; 28];
    comment.push(0);
    comment.push(track);
    buf.extend_from_slice(&comment);
    buf.push(genre);
    buf
}

fn ape_item(key: &str, value: &str) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend_from_slice(&(value.len() as u32).to_le_bytes());
    out.extend_from_slice(&0u32.to_le_bytes());
    out.extend_from_slice(key.as_bytes());
    out.push(0);
    out.extend_from_slice(value.as_bytes());
    out
}

fn ape_footer(tag_size: u32, item_count: u32) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend_from_slice(b"APETAGEX");
    out.extend_from_slice(&2000u32.to_le_bytes());
    out.extend_from_slice(&tag_size.to_le_bytes());
    out.extend_from_slice(&item_count.to_le_bytes());
    out.extend_from_slice(&(1u32 << 30).to_le_bytes()); // has_footer only
    out.extend_from_slice(&[0u8; 8]);
    out
}

fn vorbis_comment_block(entries: &[(&str, &str)]) -> Vec<u8> {
    let mut body = Vec::new();
    let vendor = b"reference";
    body.extend_from_slice(&(vendor.len() as u32).to_le_bytes());
    body.extend_from_slice(vendor);
    body.extend_from_slice(&(entries.len() as u32).to_le_bytes());
    for (k, v) in entries {
        let entry = format!("{}={}", k, v);
        body.extend_from_slice(&(entry.len() as u32).to_le_bytes());
        body.extend_from_slice(entry.as_bytes());
    }
    body
}

fn crc32_table() -> [u32; 256] {
    const POLY: u32 = 0x04C1_1DB7;
    let mut table = [0u32; 256];
    let mut i = 0;
    while i < 256 {
        let mut crc = (i as u32) << 24;
        let mut bit = 0;
        while bit < 8 {
            crc = if crc & 0x8000_0000 != 0 { (crc << 1) ^ POLY } else { crc << 1 };
            bit += 1;
        }
        table[i] = crc;
        i += 1;
    }
    table
}

fn crc32(table: &[u32; 256], data: &[u8]) -> u32 {
    let mut crc: u32 = 0;
    for &byte in data {
        let idx = ((crc >> 24) ^ u32::from(byte)) & 0xFF;
        crc = (crc << 8) ^ table[idx as usize];
    }
    crc
}

const PAGE_HEADER_SIZE: usize = 27;

fn ogg_page(serial: u32, sequence: u32, flags: u8, segments: &[u8], body: &[u8], table: &[u32; 256]) -> Vec<u8> {
    let mut header = Vec::new();
    header.extend_from_slice(b"OggS");
    header.push(0); // version
    header.push(flags);
    header.extend_from_slice(&0u64.to_le_bytes()); // absgp
    header.extend_from_slice(&serial.to_le_bytes());
    header.extend_from_slice(&sequence.to_le_bytes());
    header.extend_from_slice(&[0u8; 4]); // crc placeholder
    header.push(segments.len() as u8);
    header.extend_from_slice(segments);

    let mut full = header.clone();
    full.extend_from_slice(body);
    let crc = crc32(table, &full);
    full[22..26].copy_from_slice(&crc.to_le_bytes());
    full
}

mod id3v1_only {
    use super::*;

    #[test]
    fn single_tag_with_every_field_at_the_last_128_bytes() {
        let tag = id3v1_tag("Blind", "Acme", "Reduce the choir", 1, 0);
        let result = read_all(&tag);
        assert_eq!(result.len(), 1);
        match &result.tags[0] {
            TypedMetadata::Id3v1 { meta } => {
                assert_eq!(meta.start_offset, 0);
                assert_eq!(meta.end_offset, 0x80);
                assert_eq!(meta.map.get_first("TITLE"), Some("Blind"));
                assert_eq!(meta.map.get_first("ARTIST"), Some("Acme"));
                assert_eq!(meta.map.get_first("ALBUM"), Some("Reduce the choir"));
                assert_eq!(meta.map.get_first("TRACKNUMBER"), Some("1"));
                assert_eq!(meta.map.get_first("GENRE"), Some("Blues"));
            }
            other => panic!("expected Id3v1, got {:?}", other),
        }
    }
}

mod id3v2_with_utf16_title_and_trailing_id3v1 {
    use super::*;

    #[test]
    fn utf16_title_survives_and_id3v1_tail_follows_contiguously() {
        let title_utf16 = {
            let mut out = vec![0xFFu8, 0xFE]; // LE BOM
            for unit in "死前解放".encode_utf16() {
                out.extend_from_slice(&unit.to_le_bytes());
            }
            out.extend_from_slice(&[0x00, 0x00]);
            out
        };
        let tit2 = v3_text_frame(b"TIT2", 1, &title_utf16);
        let tpe1 = v3_text_frame(b"TPE1", 0, b"Artist\x00");
        let talb = v3_text_frame(b"TALB", 0, b"Album\x00");
        let trck = v3_text_frame(b"TRCK", 0, b"1\x00");
        let tyer = v3_text_frame(b"TYER", 0, b"2001\x00");
        let tcon = v3_text_frame(b"TCON", 0, b"Rock\x00");

        let mut comm_body = vec![0x03]; // utf-8
        comm_body.extend_from_slice(b"eng\x00");
        comm_body.extend_from_slice(b"Nice track");
        let mut comm = Vec::new();
        comm.extend_from_slice(b"COMM");
        comm.extend_from_slice(&(comm_body.len() as u32).to_be_bytes());
        comm.extend_from_slice(&[0, 0]);
        comm.extend(comm_body);

        let mut frames = Vec::new();
        for f in [tit2, tpe1, talb, trck, tyer, tcon, comm] {
            frames.extend(f);
        }
        let tag = wrap_v2_tag(3, 0x00, &frames, 0);
        let id3v1 = id3v1_tag("Blind", "Acme", "Album", 0, 0xFF);

        let mut file = tag.clone();
        file.extend_from_slice(&id3v1);

        let result = read_all(&file);
        assert_eq!(result.len(), 2);

        match &result.tags[0] {
            TypedMetadata::Id3v2 { meta, comments, .. } => {
                assert_eq!(meta.start_offset, 0);
                assert_eq!(meta.end_offset, tag.len() as u64);
                assert_eq!(meta.map.get_first("TIT2"), Some("死前解放"));
                assert_eq!(meta.map.get_first("TPE1"), Some("Artist"));
                assert_eq!(comments.len(), 1);
                assert_eq!(comments.iter().next().unwrap().value, "Nice track");
            }
            other => panic!("expected Id3v2, got {:?}", other),
        }
        match &result.tags[1] {
            TypedMetadata::Id3v1 { meta } => {
                assert_eq!(meta.start_offset, tag.len() as u64);
                assert_eq!(meta.end_offset, file.len() as u64);
            }
            other => panic!("expected Id3v1, got {:?}", other),
        }
    }
}

mod id3v2_global_unsynch_with_comm {
    use super::*;

    #[test]
    fn embedded_ff_00_survives_unsync_and_comm_is_separated() {
        // TPE1 body, already unsynchronised: encoding(latin1) + 'A' + 0xFF + a stuffing
        // 0x00 with no logical byte following it, so decoding yields "A" + U+00FF.
        let tpe1_body = [0x00u8, 0x41, 0xFF, 0x00];
        let mut tpe1 = Vec::new();
        tpe1.extend_from_slice(b"TPE1");
        tpe1.extend_from_slice(&(tpe1_body.len() as u32).to_be_bytes());
        tpe1.extend_from_slice(&[0, 0]);
        tpe1.extend_from_slice(&tpe1_body);

        let mut comm_body = vec![0x03]; // utf-8
        comm_body.extend_from_slice(b"eng\x00");
        comm_body.extend_from_slice(b"Track 1");
        let mut comm = Vec::new();
        comm.extend_from_slice(b"COMM");
        comm.extend_from_slice(&(comm_body.len() as u32).to_be_bytes());
        comm.extend_from_slice(&[0, 0]);
        comm.extend(comm_body);

        let mut frames = tpe1;
        frames.extend(comm);
        let tag = wrap_v2_tag(3, 0x80, &frames, 0);

        let result = read_all(&tag);
        assert_eq!(result.len(), 1);
        match &result.tags[0] {
            TypedMetadata::Id3v2 { meta, comments, .. } => {
                assert_eq!(meta.map.get_first("TPE1"), Some("A\u{FF}"));
                assert_eq!(comments.len(), 1);
                let entry = comments.iter().next().unwrap();
                assert_eq!(&entry.language, b"eng");
                assert_eq!(entry.value, "Track 1");
            }
            other => panic!("expected Id3v2, got {:?}", other),
        }
    }
}

mod id3v2_v4_raw_u32_frame_size_fallback {
    use super::*;

    #[test]
    fn uslt_written_with_a_non_synchsafe_size_still_decodes_whole() {
        // 300 as synchsafe groups (7 bits/byte) misreads as 172; as a plain big-endian
        // u32 it is 300 and lands exactly at the tag end, so the fallback must win.
        let lyrics: String = "Lorem ipsum dolor sit amet consectetur adipiscing elit. "
            .chars()
            .cycle()
            .take(295)
            .collect();

        let mut body = vec![0x00u8]; // latin1
        body.extend_from_slice(b"eng");
        body.push(0x00); // empty description, terminated
        body.extend_from_slice(lyrics.as_bytes());
        assert_eq!(body.len(), 300);

        let mut frame = Vec::new();
        frame.extend_from_slice(b"USLT");
        frame.extend_from_slice(&(body.len() as u32).to_be_bytes());
        frame.extend_from_slice(&[0, 0]);
        frame.extend_from_slice(&body);

        let tag_size = frame.len() as u32;
        let mut tag = Vec::new();
        tag.extend_from_slice(b"ID3");
        tag.push(4);
        tag.push(0);
        tag.push(0x00);
        tag.extend_from_slice(&synchsafe(tag_size));
        tag.extend_from_slice(&frame);

        let result = read_all(&tag);
        assert_eq!(result.len(), 1);
        match &result.tags[0] {
            TypedMetadata::Id3v2 { unsynchronized_lyrics, .. } => {
                assert_eq!(unsynchronized_lyrics.len(), 1);
                let entry = unsynchronized_lyrics.iter().next().unwrap();
                assert_eq!(entry.value, lyrics);
            }
            other => panic!("expected Id3v2, got {:?}", other),
        }
    }
}

mod flac_with_duplicate_date_entries {
    use super::*;

    #[test]
    fn twelve_entries_including_a_duplicate_key_are_all_kept() {
        let entries: &[(&str, &str)] = &[
            ("TITLE", "Song"),
            ("ARTIST", "Band"),
            ("ALBUM", "Record"),
            ("DATE", "2018"),
            ("DATE", "2018-04-20"),
            ("TRACKNUMBER", "3"),
            ("GENRE", "Rock"),
            ("COMMENT", "ripped"),
            ("ALBUMARTIST", "Band"),
            ("DISCNUMBER", "1"),
            ("ORGANIZATION", "Label"),
            ("ENCODER", "reference libFLAC 1.3.2"),
        ];
        let body = vorbis_comment_block(entries);

        let mut file = Vec::new();
        file.extend_from_slice(b"fLaC");
        file.push(0x80 | 4); // last block, type 4 (vorbis comment)
        file.extend_from_slice(&(body.len() as u32).to_be_bytes()[1..]);
        let start = file.len();
        file.extend_from_slice(&body);

        let result = read_all(&file);
        assert_eq!(result.len(), 1);
        match &result.tags[0] {
            TypedMetadata::Flac { meta } => {
                assert_eq!(meta.start_offset, start as u64);
                assert_eq!(meta.end_offset, (start + body.len()) as u64);
                assert_eq!(meta.map.len(), 12);
                assert_eq!(meta.map.get_all("DATE"), &["2018".to_string(), "2018-04-20".to_string()]);
            }
            other => panic!("expected Flac, got {:?}", other),
        }
    }
}

mod vorbis_comment_spanning_ogg_pages {
    use super::*;

    #[test]
    fn comment_packet_carried_across_two_pages_is_reassembled() {
        let table = crc32_table();
        let ident = vec![1u8; 10];

        let mut comment = Vec::new();
        comment.extend_from_slice(&4u32.to_le_bytes());
        comment.extend_from_slice(b"xiph");
        comment.extend_from_slice(&1u32.to_le_bytes());
        let entry = format!("ARTIST={}", "A".repeat(300));
        let entry = entry.as_bytes();
        comment.extend_from_slice(&(entry.len() as u32).to_le_bytes());
        comment.extend_from_slice(entry);

        let whole_segments = comment.len() / 255;
        let carried = whole_segments * 255;
        let remainder = comment.len() - carried;

        let mut body_a = ident.clone();
        body_a.extend_from_slice(&comment[..carried]);
        let mut segments_a = vec![10u8];
        segments_a.extend(std::iter::repeat(255u8).take(whole_segments));
        let page_a = ogg_page(7, 0, 0x02, &segments_a, &body_a, &table);

        let body_b = &comment[carried..];
        let segments_b = vec![remainder as u8];
        let page_b = ogg_page(7, 1, 0x01, &segments_b, body_b, &table);

        let mut file = page_a.clone();
        file.extend_from_slice(&page_b);

        let result = read_all(&file);
        assert_eq!(result.len(), 1);
        match &result.tags[0] {
            TypedMetadata::Vorbis { meta } => {
                let expected_start = (PAGE_HEADER_SIZE + segments_a.len() + ident.len()) as u64;
                assert_eq!(meta.start_offset, expected_start);
                assert_eq!(meta.end_offset, expected_start + comment.len() as u64);
                assert_eq!(meta.map.get_first("ARTIST").map(str::len), Some(300));
            }
            other => panic!("expected Vorbis, got {:?}", other),
        }
    }
}

mod ape_and_id3_ordering {
    use super::*;

    #[test]
    fn id3v2_ape_and_id3v1_are_reported_in_file_order() {
        let tit2 = v3_text_frame(b"TIT2", 0, b"Title\x00");
        let id3v2_tag = wrap_v2_tag(3, 0x00, &tit2, 0);

        let items = ape_item("ARTIST", "Band");
        let ftr = ape_footer((items.len() + 32) as u32, 1);
        let mut ape_tag = items;
        ape_tag.extend_from_slice(&ftr);

        let id3v1 = id3v1_tag("Title", "Band", "Record", 0, 0);

        let mut file = id3v2_tag.clone();
        file.extend_from_slice(&ape_tag);
        file.extend_from_slice(&id3v1);

        let result = read_all(&file);
        assert_eq!(result.len(), 3);

        let id3v2_end = id3v2_tag.len() as u64;
        let ape_end = id3v2_end + ape_tag.len() as u64;

        match &result.tags[0] {
            TypedMetadata::Id3v2 { meta, .. } => {
                assert_eq!(meta.start_offset, 0);
                assert_eq!(meta.end_offset, id3v2_end);
            }
            other => panic!("expected Id3v2 first, got {:?}", other),
        }
        match &result.tags[1] {
            TypedMetadata::Ape { meta, .. } => {
                assert_eq!(meta.start_offset, id3v2_end);
                assert_eq!(meta.end_offset, ape_end);
                assert_eq!(meta.map.get_first("ARTIST"), Some("Band"));
            }
            other => panic!("expected Ape second, got {:?}", other),
        }
        match &result.tags[2] {
            TypedMetadata::Id3v1 { meta } => {
                assert_eq!(meta.start_offset, ape_end);
                assert_eq!(meta.end_offset, file.len() as u64);
            }
            other => panic!("expected Id3v1 last, got {:?}", other),
        }
    }
}
