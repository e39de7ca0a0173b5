//! The data model shared by every decoder (spec §3): `MetadataMap`, `FullTextMap`,
//! `Metadata`, and the top-level `AllMetadata`/`TypedMetadata` product.
use indexmap::IndexMap;

/// A case-preserving, insertion-ordered, duplicate-key-tolerant multi-map (C2).
///
/// Keys are stored exactly as written; `IndexMap` gives us insertion order and O(1)
/// lookup without reaching for a bespoke linked structure, matching how the rest of
/// this codebase leans on `indexmap` for ordered frame storage.
#[derive(Debug, Clone, Default)]
pub struct MetadataMap {
    entries: IndexMap<String, Vec<String>>,
}

impl MetadataMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a value under `key`, preserving any existing values for that key.
    pub fn push(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.entries.entry(key.into()).or_default().push(value.into());
    }

    /// Replaces the first value stored under `key`, or appends a new entry if absent.
    pub fn put_or_replace_first(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        match self.entries.get_mut(&key) {
            Some(values) if !values.is_empty() => values[0] = value.into(),
            Some(values) => values.push(value.into()),
            None => {
                self.entries.insert(key, vec![value.into()]);
            }
        }
    }

    pub fn get_first(&self, key: &str) -> Option<&str> {
        self.entries.get(key).and_then(|v| v.first()).map(String::as_str)
    }

    pub fn get_all(&self, key: &str) -> &[String] {
        self.entries.get(key).map_or(&[], Vec::as_slice)
    }

    pub fn value_count(&self, key: &str) -> usize {
        self.entries.get(key).map_or(0, Vec::len)
    }

    /// Iterates `(key, value)` pairs in insertion order, with duplicate keys yielding
    /// one pair per stored value.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries
            .iter()
            .flat_map(|(k, vs)| vs.iter().map(move |v| (k.as_str(), v.as_str())))
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.values().map(Vec::len).sum()
    }
}

/// A single (language, description, value) entry, as used by COMM/USLT-style frames (C3).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FullTextEntry {
    pub language: [u8; 3],
    pub description: String,
    pub value: String,
}

/// An ordered list of [`FullTextEntry`] values (C3).
#[derive(Debug, Clone, Default)]
pub struct FullTextMap {
    entries: Vec<FullTextEntry>,
}

impl FullTextMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, entry: FullTextEntry) {
        self.entries.push(entry);
    }

    pub fn iter(&self) -> impl Iterator<Item = &FullTextEntry> {
        self.entries.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
}

/// The byte range and key/value contents of a single decoded tag.
#[derive(Debug, Clone)]
pub struct Metadata {
    pub start_offset: u64,
    pub end_offset: u64,
    pub map: MetadataMap,
}

/// The ID3v2 tag header, retained verbatim alongside its decoded frames.
#[derive(Debug, Clone, Copy)]
pub struct Id3v2Header {
    pub major_version: u8,
    pub minor_version: u8,
    pub flags: u8,
    pub size: u32,
}

impl Id3v2Header {
    pub fn unsynchronisation(&self) -> bool {
        self.flags & 0x80 != 0
    }
    pub fn has_extended_header(&self) -> bool {
        self.flags & 0x40 != 0
    }
    pub fn experimental(&self) -> bool {
        self.flags & 0x20 != 0
    }
    pub fn has_footer(&self) -> bool {
        self.major_version == 4 && self.flags & 0x10 != 0
    }
}

/// The APEv1/v2 header-or-footer structure (C6).
#[derive(Debug, Clone, Copy)]
pub struct ApeHeader {
    pub version: u32,
    pub item_count: u32,
    pub tag_size: u32,
    pub flags: u32,
    pub is_header: bool,
}

impl ApeHeader {
    pub fn has_header(&self) -> bool {
        self.flags & (1 << 31) != 0
    }
    pub fn has_footer(&self) -> bool {
        self.flags & (1 << 30) != 0
    }
}

/// One tag, tagged by format, as produced by a single decoder run (spec §3).
#[derive(Debug, Clone)]
pub enum TypedMetadata {
    Id3v1 {
        meta: Metadata,
    },
    Id3v2 {
        header: Id3v2Header,
        meta: Metadata,
        comments: FullTextMap,
        unsynchronized_lyrics: FullTextMap,
    },
    Ape {
        header_or_footer: ApeHeader,
        meta: Metadata,
    },
    Flac {
        meta: Metadata,
    },
    Vorbis {
        meta: Metadata,
    },
}

impl TypedMetadata {
    /// A reference to the embedded [`Metadata`], regardless of which variant this is.
    pub fn metadata(&self) -> &Metadata {
        match self {
            TypedMetadata::Id3v1 { meta }
            | TypedMetadata::Id3v2 { meta, .. }
            | TypedMetadata::Ape { meta, .. }
            | TypedMetadata::Flac { meta }
            | TypedMetadata::Vorbis { meta } => meta,
        }
    }
}

/// The full result of a `read_all` call: every tag discovered, in discovery order.
#[derive(Debug, Clone, Default)]
pub struct AllMetadata {
    pub tags: Vec<TypedMetadata>,
}

impl AllMetadata {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }

    pub fn len(&self) -> usize {
        self.tags.len()
    }
}
