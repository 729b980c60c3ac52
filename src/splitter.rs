//! Lexical splitter.
//!
//! Carves the concatenated input into self-contained top-level XML fragments
//! without parsing them. The state machine reacts to exactly four patterns
//! (`<`, `</`, `>`, `/>`) and tracks nesting depth; a fragment is complete
//! when the machine returns to `AngleClosed` at depth zero. Grammar
//! validation is deliberately absent: a corrupted fragment is handed
//! downstream where the real parser rejects it with source coordinates.
//!
//! While inside an opening tag the splitter switches to 16-byte chunked
//! copies (see `scan`), which is where long attribute-heavy tags are
//! consumed. The fragments produced are identical whether or not the fast
//! path engages.

use crate::error::{Result, SieveError};
use crate::input::{ChunkReader, InputSource};

/// The unit of work handed to the extractor pool.
#[derive(Debug, Clone, PartialEq)]
pub struct Fragment {
    /// Contiguous, starts at 0. Downstream ordering is rebuilt from this.
    pub seq: u64,
    /// Raw bytes from the opening `<` through the matching closing `>`.
    pub text: String,
    pub file_name: String,
    /// Inclusive line span within `file_name`; lines restart at 1 per file.
    pub start_line: u64,
    pub end_line: u64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum MachineState {
    /// Between tags. `<` opens a new one.
    AngleClosed,
    /// Just saw `<`; the next character decides opening vs closing.
    AngleOpen,
    /// Inside `<tag ...`. `>` completes it (depth +1), `/` may start `/>`.
    CreatingSubtree,
    /// Saw `/` inside an opening tag; only a guess until the next character.
    CreatingField,
    /// Inside `</...`. `>` completes it (depth -1).
    ClosingSubtree,
}

pub struct Splitter {
    pending: std::vec::IntoIter<InputSource>,
    current: Option<(String, ChunkReader)>,
    next_seq: u64,
    current_line: u64,
    start_line: u64,
}

impl Splitter {
    pub fn new(sources: Vec<InputSource>) -> Self {
        Splitter {
            pending: sources.into_iter(),
            current: None,
            next_seq: 0,
            current_line: 1,
            start_line: 0,
        }
    }

    /// Next fragment, or `None` once every input stream is exhausted.
    pub fn next_fragment(&mut self) -> Result<Option<Fragment>> {
        loop {
            if self.current.is_none() {
                match self.pending.next() {
                    Some(source) => {
                        self.current_line = 1;
                        self.current = Some((source.name, ChunkReader::new(source.stream)));
                    }
                    None => return Ok(None),
                }
            }

            // Skip bytes until the opening `<`, counting discarded newlines.
            let mut saw_open = false;
            if let Some((_, reader)) = self.current.as_mut() {
                while let Some(byte) = reader.get_byte()? {
                    if byte == b'<' {
                        saw_open = true;
                        break;
                    }
                    if byte == b'\n' {
                        self.current_line += 1;
                    }
                }
            }

            if saw_open {
                return self.run_machine().map(Some);
            }
            // This stream is exhausted between fragments; move to the next.
            self.current = None;
        }
    }

    /// Run the state machine starting from an already-consumed `<`.
    fn run_machine(&mut self) -> Result<Fragment> {
        self.start_line = self.current_line;

        let mut bytes: Vec<u8> = Vec::with_capacity(256);
        let mut state = MachineState::AngleClosed;
        let mut depth: i64 = 0;
        let mut fast_path = false;
        let mut byte = b'<';

        let (name, reader) = match self.current.as_mut() {
            Some(current) => current,
            None => return Err(SieveError::bug("splitter ran with no current input")),
        };

        loop {
            bytes.push(byte);

            match state {
                MachineState::AngleClosed => {
                    if byte == b'<' {
                        state = MachineState::AngleOpen;
                    }
                }
                MachineState::AngleOpen => {
                    if byte == b'/' {
                        state = MachineState::ClosingSubtree;
                    } else {
                        state = MachineState::CreatingSubtree;
                        fast_path = true;
                    }
                }
                MachineState::CreatingSubtree => match byte {
                    b'>' => {
                        state = MachineState::AngleClosed;
                        depth += 1;
                    }
                    b'/' => state = MachineState::CreatingField,
                    _ => {}
                },
                MachineState::CreatingField => {
                    if byte == b'>' {
                        state = MachineState::AngleClosed;
                    } else {
                        state = MachineState::CreatingSubtree;
                    }
                }
                MachineState::ClosingSubtree => {
                    if byte == b'>' {
                        state = MachineState::AngleClosed;
                        depth -= 1;
                    }
                }
            }

            if depth == 0 && state == MachineState::AngleClosed {
                break;
            }

            // Chunked copies while the opening tag lasts. One failed attempt
            // disarms until the machine enters the next opening tag.
            if fast_path {
                while let Some((chunk, newlines)) = reader.clean_chunk() {
                    bytes.extend_from_slice(&chunk);
                    self.current_line += u64::from(newlines);
                }
                fast_path = false;
            }

            match reader.get_byte()? {
                Some(next) => {
                    if next == b'\n' {
                        self.current_line += 1;
                    }
                    byte = next;
                }
                // EOF mid-fragment: hand back the partial fragment and let
                // the parser report it.
                None => break,
            }
        }

        let text = String::from_utf8(bytes).map_err(|_| {
            SieveError::input(format!(
                "input is not valid UTF-8\nInput file \"{}\" at line {}-{}",
                name, self.start_line, self.current_line
            ))
        })?;

        let fragment = Fragment {
            seq: self.next_seq,
            text,
            file_name: name.clone(),
            start_line: self.start_line,
            end_line: self.current_line,
        };
        self.next_seq += 1;
        Ok(fragment)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Cursor, Read};

    fn sources(inputs: &[(&str, &str)]) -> Vec<InputSource> {
        inputs
            .iter()
            .map(|(name, data)| {
                InputSource::new(*name, Box::new(Cursor::new(data.as_bytes().to_vec())) as _)
            })
            .collect()
    }

    fn collect(mut splitter: Splitter) -> Vec<Fragment> {
        let mut out = Vec::new();
        while let Some(f) = splitter.next_fragment().unwrap() {
            out.push(f);
        }
        out
    }

    #[test]
    fn two_documents_on_one_line() {
        let frags = collect(Splitter::new(sources(&[("in", "<a><b/></a><c></c>")])));
        assert_eq!(frags.len(), 2);
        assert_eq!(frags[0].seq, 0);
        assert_eq!(frags[0].text, "<a><b/></a>");
        assert_eq!((frags[0].start_line, frags[0].end_line), (1, 1));
        assert_eq!(frags[1].seq, 1);
        assert_eq!(frags[1].text, "<c></c>");
        assert_eq!((frags[1].start_line, frags[1].end_line), (1, 1));
    }

    #[test]
    fn line_tracking_across_fragments() {
        let frags = collect(Splitter::new(sources(&[("in", "<a>\n</a>\n<b></b>\n")])));
        assert_eq!(frags.len(), 2);
        assert_eq!(frags[0].text, "<a>\n</a>");
        assert_eq!((frags[0].start_line, frags[0].end_line), (1, 2));
        assert_eq!(frags[1].text, "<b></b>");
        assert_eq!((frags[1].start_line, frags[1].end_line), (3, 3));
    }

    #[test]
    fn self_closing_top_level_tag_is_one_fragment() {
        let frags = collect(Splitter::new(sources(&[("in", "  <x/>  ")])));
        assert_eq!(frags.len(), 1);
        assert_eq!(frags[0].text, "<x/>");
    }

    #[test]
    fn fragments_start_and_end_with_angle_brackets() {
        let input = "<a attr=\"v\">text</a>\n<b><c x=\"1\"/></b>";
        for frag in collect(Splitter::new(sources(&[("in", input)]))) {
            assert!(frag.text.starts_with('<'));
            assert!(frag.text.ends_with('>'));
            assert!(frag.start_line <= frag.end_line);
        }
    }

    #[test]
    fn seq_is_contiguous_from_zero() {
        let input = "<a/><b/><c/><d/>";
        let frags = collect(Splitter::new(sources(&[("in", input)])));
        let seqs: Vec<u64> = frags.iter().map(|f| f.seq).collect();
        assert_eq!(seqs, [0, 1, 2, 3]);
    }

    #[test]
    fn files_never_share_a_fragment_and_lines_restart() {
        let frags = collect(Splitter::new(sources(&[
            ("one", "<a>\n</a>\n"),
            ("two", "\n<b></b>"),
        ])));
        assert_eq!(frags.len(), 2);
        assert_eq!(frags[0].file_name, "one");
        assert_eq!(frags[1].file_name, "two");
        assert_eq!((frags[1].start_line, frags[1].end_line), (2, 2));
        assert_eq!(frags[1].seq, 1);
    }

    #[test]
    fn eof_mid_fragment_yields_the_partial_text() {
        let frags = collect(Splitter::new(sources(&[("in", "<a><b>unfinished")])));
        assert_eq!(frags.len(), 1);
        assert_eq!(frags[0].text, "<a><b>unfinished");
    }

    #[test]
    fn long_attribute_tags_split_identically_without_the_fast_path() {
        // Trickle the bytes in one at a time so `clean_chunk` can never see
        // 16 buffered bytes; the fragments must not change.
        struct Trickle(Cursor<Vec<u8>>);
        impl Read for Trickle {
            fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
                let len = buf.len().min(1);
                self.0.read(&mut buf[..len])
            }
        }

        let attrs: String = (0..40).map(|i| format!(" attr{i}=\"value{i}\"")).collect();
        let input = format!("<packet{attrs}>\npayload\n</packet>\n<next/>");

        let fast = collect(Splitter::new(sources(&[("in", &input)])));
        let slow = collect(Splitter::new(vec![InputSource::new(
            "in",
            Box::new(Trickle(Cursor::new(input.as_bytes().to_vec()))),
        )]));
        assert_eq!(fast, slow);
        assert_eq!(fast.len(), 2);
        assert_eq!(fast[0].end_line, 3);
    }

    #[test]
    fn empty_input_produces_nothing() {
        assert!(collect(Splitter::new(sources(&[("in", "")]))).is_empty());
        assert!(collect(Splitter::new(Vec::new())).is_empty());
    }
}
