//! Buffered byte source for the splitter.
//!
//! One `ChunkReader` wraps one input stream with a 16 KiB refillable buffer.
//! Besides single-byte reads it offers a non-consuming 16-byte fast path:
//! `clean_chunk` succeeds only when the next 16 buffered bytes contain none
//! of the splitter's significant characters, handing back the bytes and
//! their newline count in one step. When it fails (short buffer or a
//! significant character in range) nothing is consumed and the caller falls
//! back to single-byte stepping.

use std::io::{self, Read};

use crate::scan::{self, CHUNK_WIDTH};

pub const READ_BUFFER_SIZE: usize = 16 * 1024;

/// One named input stream, in the order given on the command line.
pub struct InputSource {
    pub name: String,
    pub stream: Box<dyn Read + Send>,
}

impl InputSource {
    pub fn new(name: impl Into<String>, stream: Box<dyn Read + Send>) -> Self {
        InputSource {
            name: name.into(),
            stream,
        }
    }
}

pub struct ChunkReader {
    buf: Box<[u8; READ_BUFFER_SIZE]>,
    pos: usize,
    end: usize,
    stream: Box<dyn Read + Send>,
}

impl ChunkReader {
    pub fn new(stream: Box<dyn Read + Send>) -> Self {
        ChunkReader {
            buf: Box::new([0u8; READ_BUFFER_SIZE]),
            pos: 0,
            end: 0,
            stream,
        }
    }

    /// Next byte, refilling transparently. `None` is end of stream.
    pub fn get_byte(&mut self) -> io::Result<Option<u8>> {
        if self.pos == self.end {
            self.refill()?;
            if self.end == 0 {
                return Ok(None);
            }
        }
        let byte = self.buf[self.pos];
        self.pos += 1;
        Ok(Some(byte))
    }

    /// The 16-byte fast path. Succeeds only when 16 bytes are already
    /// buffered and none of them is `<`, `>` or `/`; never refills, never
    /// consumes on failure.
    pub fn clean_chunk(&mut self) -> Option<([u8; CHUNK_WIDTH], u32)> {
        if self.end - self.pos < CHUNK_WIDTH {
            return None;
        }
        let mut chunk = [0u8; CHUNK_WIDTH];
        chunk.copy_from_slice(&self.buf[self.pos..self.pos + CHUNK_WIDTH]);
        let newlines = scan::classify(&chunk)?;
        self.pos += CHUNK_WIDTH;
        Some((chunk, newlines))
    }

    fn refill(&mut self) -> io::Result<()> {
        self.pos = 0;
        loop {
            match self.stream.read(&mut self.buf[..]) {
                Ok(n) => {
                    self.end = n;
                    return Ok(());
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    self.end = 0;
                    return Err(e);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn reader(data: &str) -> ChunkReader {
        ChunkReader::new(Box::new(Cursor::new(data.as_bytes().to_vec())))
    }

    /// A stream that hands out one byte per read call, to exercise refills
    /// and to starve the chunk fast path.
    pub struct TrickleReader(pub Cursor<Vec<u8>>);

    impl Read for TrickleReader {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            let len = buf.len().min(1);
            self.0.read(&mut buf[..len])
        }
    }

    #[test]
    fn yields_bytes_then_eof() {
        let mut r = reader("ab");
        assert_eq!(r.get_byte().unwrap(), Some(b'a'));
        assert_eq!(r.get_byte().unwrap(), Some(b'b'));
        assert_eq!(r.get_byte().unwrap(), None);
        assert_eq!(r.get_byte().unwrap(), None);
    }

    #[test]
    fn clean_chunk_consumes_sixteen_clean_bytes() {
        let mut r = reader("aaaaaaaa\nbbbbbbbXtail");
        r.get_byte().unwrap();
        let (chunk, newlines) = r.clean_chunk().expect("chunk should be clean");
        assert_eq!(&chunk, b"aaaaaaa\nbbbbbbbX");
        assert_eq!(newlines, 1);
        assert_eq!(r.get_byte().unwrap(), Some(b't'));
    }

    #[test]
    fn clean_chunk_refuses_significant_characters_without_consuming() {
        let mut r = reader("aaaaaaaaaaaaaaa>rest");
        assert!(r.clean_chunk().is_none());
        assert_eq!(r.get_byte().unwrap(), Some(b'a'));
    }

    #[test]
    fn clean_chunk_refuses_short_buffers() {
        let mut r = reader("only-a-few");
        r.get_byte().unwrap();
        assert!(r.clean_chunk().is_none());
        assert_eq!(r.get_byte().unwrap(), Some(b'n'));
    }

    #[test]
    fn trickle_reads_never_satisfy_the_fast_path() {
        let data = "abcdefghijklmnopqrstuvwxyz".as_bytes().to_vec();
        let mut r = ChunkReader::new(Box::new(TrickleReader(Cursor::new(data.clone()))));
        let mut seen = Vec::new();
        loop {
            assert!(r.clean_chunk().is_none());
            match r.get_byte().unwrap() {
                Some(b) => seen.push(b),
                None => break,
            }
        }
        assert_eq!(seen, data);
    }
}
