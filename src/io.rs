//! Bounded stream reader (C1).
//!
//! Wraps a borrowed byte slice with a stack of read windows, so that a malformed
//! length field can never cause a read past a tag's declared end. A window may be
//! marked "unsynchronised": while active, any `0x00` byte immediately following a
//! `0xFF` byte is transparently dropped from the decoded stream, while `pos()` still
//! advances over both bytes so offsets remain true to the source.
use crate::error::StreamError;

struct Window {
    end: usize,
    unsync: bool,
}

/// A cursor over a borrowed byte slice with nested bounded/unsynchronised windows.
pub struct Reader<'a> {
    src: &'a [u8],
    pos: usize,
    windows: Vec<Window>,
}

type Result<T> = std::result::Result<T, StreamError>;

impl<'a> Reader<'a> {
    pub fn new(src: &'a [u8]) -> Self {
        Self {
            src,
            pos: 0,
            windows: Vec::new(),
        }
    }

    /// The length of the entire source, ignoring any active window.
    pub fn source_len(&self) -> usize {
        self.src.len()
    }

    /// The current absolute position in the source.
    pub fn pos(&self) -> usize {
        self.pos
    }

    fn limit(&self) -> usize {
        self.windows.last().map_or(self.src.len(), |w| w.end)
    }

    fn is_unsync(&self) -> bool {
        self.windows.last().map_or(false, |w| w.unsync)
    }

    /// Bytes left to read in the active window (or the whole source if none is active).
    pub fn remaining(&self) -> usize {
        self.limit().saturating_sub(self.pos)
    }

    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    /// Seeks to an absolute source position, outside of any window's bounds check.
    /// Used only by the driver to jump between head and tail probes.
    pub fn seek_to(&mut self, pos: usize) -> Result<()> {
        if pos > self.src.len() {
            return Err(StreamError::EndOfStream);
        }
        self.pos = pos;
        Ok(())
    }

    /// Pushes a new bounded window of `len` bytes starting at the current position.
    ///
    /// # Errors
    /// If the window would extend past the current (enclosing) window, `EndOfStream`.
    pub fn push_window(&mut self, len: usize, unsync: bool) -> Result<()> {
        let end = self.pos.checked_add(len).ok_or(StreamError::EndOfStream)?;
        if end > self.limit() {
            return Err(StreamError::EndOfStream);
        }
        // A nested window must stay unsynchronised if an enclosing one already is: the
        // global tag-body window carries the flag, but per-frame windows below it are
        // pushed with their own (usually false) flag and must not clear it.
        let unsync = unsync || self.is_unsync();
        self.windows.push(Window { end, unsync });
        Ok(())
    }

    /// Pops the innermost window. Does not move the cursor.
    pub fn pop_window(&mut self) {
        self.windows.pop();
    }

    /// Runs `f` inside a window of `len` bytes, popping the window on every exit path.
    pub fn in_window<T>(
        &mut self,
        len: usize,
        unsync: bool,
        f: impl FnOnce(&mut Self) -> T,
    ) -> Result<T> {
        self.push_window(len, unsync)?;
        let result = f(self);
        self.pop_window();
        Ok(result)
    }

    /// One raw source byte, respecting the active window but not the unsync filter.
    fn raw_byte(&mut self) -> Result<u8> {
        if self.pos >= self.limit() {
            return Err(StreamError::EndOfStream);
        }
        let byte = self.src[self.pos];
        self.pos += 1;
        Ok(byte)
    }

    /// One logical byte: applies the unsynchronisation filter if the active window
    /// requests it. `pos()` always reflects true source bytes consumed.
    fn next_byte(&mut self) -> Result<u8> {
        let byte = self.raw_byte()?;
        if byte == 0xFF && self.is_unsync() {
            if self.pos < self.limit() && self.src[self.pos] == 0x00 {
                self.pos += 1;
            }
        }
        Ok(byte)
    }

    pub fn read_exact(&mut self, buf: &mut [u8]) -> Result<()> {
        for slot in buf.iter_mut() {
            *slot = self.next_byte()?;
        }
        Ok(())
    }

    pub fn read_array<const N: usize>(&mut self) -> Result<[u8; N]> {
        let mut arr = [0u8; N];
        self.read_exact(&mut arr)?;
        Ok(arr)
    }

    pub fn read_u8(&mut self) -> Result<u8> {
        self.next_byte()
    }

    pub fn read_u16_be(&mut self) -> Result<u16> {
        Ok(u16::from_be_bytes(self.read_array()?))
    }

    pub fn read_u32_be(&mut self) -> Result<u32> {
        Ok(u32::from_be_bytes(self.read_array()?))
    }

    pub fn read_u64_be(&mut self) -> Result<u64> {
        Ok(u64::from_be_bytes(self.read_array()?))
    }

    pub fn read_u16_le(&mut self) -> Result<u16> {
        Ok(u16::from_le_bytes(self.read_array()?))
    }

    pub fn read_u32_le(&mut self) -> Result<u32> {
        Ok(u32::from_le_bytes(self.read_array()?))
    }

    pub fn read_u64_le(&mut self) -> Result<u64> {
        Ok(u64::from_le_bytes(self.read_array()?))
    }

    /// Reads a 24-bit big-endian integer (used by FLAC block headers).
    pub fn read_u24_be(&mut self) -> Result<u32> {
        let b = self.read_array::<3>()?;
        Ok(u32::from_be_bytes([0, b[0], b[1], b[2]]))
    }

    /// Reads a 4-byte synchsafe (7-bit-per-byte) big-endian integer.
    ///
    /// # Errors
    /// `InvalidSynchsafe` if any byte has its high bit set. The v2.4 raw-u32 fallback for
    /// frame sizes lives one layer up, in the ID3v2 frame loop, never here.
    pub fn read_synchsafe_u32(&mut self) -> Result<u32> {
        let bytes = self.read_array::<4>()?;
        let mut out: u32 = 0;
        for b in bytes {
            if b & 0x80 != 0 {
                return Err(StreamError::InvalidSynchsafe);
            }
            out = (out << 7) | u32::from(b);
        }
        Ok(out)
    }

    pub fn skip(&mut self, n: usize) -> Result<()> {
        for _ in 0..n {
            self.next_byte()?;
        }
        Ok(())
    }

    /// Peeks `n` bytes ahead of the current position without consuming them or applying
    /// the unsynchronisation filter. Used by the v2.4 non-synchsafe frame-size heuristic,
    /// which must inspect raw bytes at a hypothetical offset before committing to it.
    pub fn peek(&self, n: usize) -> Result<&'a [u8]> {
        self.peek_at(0, n)
    }

    /// Like [`peek`](Reader::peek), but starting `skip` bytes ahead of the current position.
    pub fn peek_at(&self, skip: usize, n: usize) -> Result<&'a [u8]> {
        let start = self.pos.checked_add(skip).ok_or(StreamError::EndOfStream)?;
        let end = start.checked_add(n).ok_or(StreamError::EndOfStream)?;
        if end > self.limit() {
            return Err(StreamError::EndOfStream);
        }
        Ok(&self.src[start..end])
    }

    /// The absolute end of the active window (or source length if no window is active).
    pub fn window_end(&self) -> usize {
        self.limit()
    }

    /// Raw access to an absolute byte range of the underlying source, ignoring both the
    /// active window and the unsynchronisation filter. Used by the Ogg page reader to
    /// re-inspect an already-consumed page's bytes for CRC verification.
    pub fn source_slice(&self, start: usize, end: usize) -> Option<&'a [u8]> {
        self.src.get(start..end)
    }

    /// Reads `n` raw bytes as a slice without applying the unsynchronisation filter.
    /// Used for opaque/compressed/encrypted frame bodies that must be skipped verbatim.
    pub fn slice(&mut self, n: usize) -> Result<&'a [u8]> {
        let out = self.peek(n)?;
        self.pos += n;
        Ok(out)
    }

    /// Searches forward (applying the unsync filter) until `needle` is found, returning the
    /// bytes consumed including the needle. Used for NUL-terminated string reads.
    pub fn read_until(&mut self, needle: &[u8]) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        loop {
            if out.len() >= needle.len() && &out[out.len() - needle.len()..] == needle {
                return Ok(out);
            }
            out.push(self.next_byte()?);
        }
    }

    /// Scans forward from the current position (without consuming) for `needle`, stepping
    /// by `needle.len()` so that a 2-byte UTF-16 NUL search stays code-unit aligned and
    /// can't be fooled by a lone zero byte at an odd offset. Returns the offset if found.
    ///
    /// Walks the *logical* (post-unsynchronisation) byte stream, not the raw source: a
    /// stuffing `0x00` inserted right after an `0xFF` is not a real byte and must not be
    /// mistaken for part of a terminator.
    pub fn find_ahead(&self, needle: &[u8]) -> Option<usize> {
        let step = needle.len();
        let mut raw_pos = self.pos;
        loop {
            let chunk_start = raw_pos;
            let mut chunk = Vec::with_capacity(step);
            for _ in 0..step {
                if raw_pos >= self.limit() {
                    return None;
                }
                let byte = self.src[raw_pos];
                raw_pos += 1;
                if byte == 0xFF
                    && self.is_unsync()
                    && raw_pos < self.limit()
                    && self.src[raw_pos] == 0x00
                {
                    raw_pos += 1;
                }
                chunk.push(byte);
            }
            if chunk == needle {
                return Some(chunk_start - self.pos);
            }
        }
    }

    /// Consumes and returns whatever remains in the active window, applying the unsync filter.
    pub fn read_rest(&mut self) -> Result<Vec<u8>> {
        let mut out = Vec::with_capacity(self.remaining());
        while !self.is_empty() {
            out.push(self.next_byte()?);
        }
        Ok(out)
    }
}
