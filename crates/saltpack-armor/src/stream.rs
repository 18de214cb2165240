//! Streaming armor and dearmor
//!
//! Both streams produce exactly what [`armor`](crate::armor) and
//! [`dearmor`](crate::dearmor) produce, however the input is split across calls.

use saltpack_core::{SaltpackResult, StreamGuard, Transform};

use crate::armor::{
    check_footer, is_separator, missing_footer, missing_framing, parse_header,
    validate_for_decode, ArmorHeaderInfo, ArmorOptions, RAW_GROUP_LENGTH, WORDS_PER_LINE,
    WORD_LENGTH,
};
use crate::basex::{decode_block_bytes, encode_block};

/// Incremental armor encoder.
///
/// Input is held back until more than one block is buffered, and encoded text until
/// more than one word is buffered, so separators are only written when more text is
/// certain to follow.
#[derive(Debug)]
pub struct ArmorStream {
    options: ArmorOptions,
    in_buffer: Vec<u8>,
    out_buffer: String,
    words: usize,
    header_sent: bool,
    guard: StreamGuard,
}

impl ArmorStream {
    pub fn new(options: ArmorOptions) -> SaltpackResult<Self> {
        options.validate()?;
        Ok(Self {
            options,
            in_buffer: Vec::new(),
            out_buffer: String::new(),
            words: 0,
            header_sent: false,
            guard: StreamGuard::default(),
        })
    }

    pub fn options(&self) -> &ArmorOptions {
        &self.options
    }

    fn start(&mut self) -> String {
        if self.header_sent || self.options.raw {
            return String::new();
        }
        self.header_sent = true;
        self.options.header()
    }

    fn encode_blocks(&mut self, final_block: bool) {
        let block_size = self.options.block_size;
        let ready = if final_block {
            self.in_buffer.len()
        } else {
            self.in_buffer.len().saturating_sub(1) / block_size * block_size
        };

        for block in self.in_buffer[..ready].chunks(block_size) {
            self.out_buffer
                .push_str(&encode_block(block, self.options.alphabet, self.options.shift));
        }
        self.in_buffer.drain(..ready);
    }

    /// Move every complete group that has text after it into `out`.
    fn release_groups(&mut self, out: &mut String) {
        let group = if self.options.raw {
            RAW_GROUP_LENGTH
        } else {
            WORD_LENGTH
        };
        let count = self.out_buffer.len().saturating_sub(1) / group;

        for word in self.out_buffer.as_bytes()[..count * group].chunks(group) {
            out.extend(word.iter().map(|&b| char::from(b)));
            if self.options.raw {
                out.push(' ');
                continue;
            }
            self.words += 1;
            if self.words >= WORDS_PER_LINE {
                out.push('\n');
                self.words = 0;
            } else {
                out.push(' ');
            }
        }
        self.out_buffer.drain(..count * group);
    }
}

impl Transform for ArmorStream {
    fn update(&mut self, input: &[u8]) -> SaltpackResult<Vec<u8>> {
        self.guard.check()?;

        let mut out = self.start();
        self.in_buffer.extend_from_slice(input);
        self.encode_blocks(false);
        self.release_groups(&mut out);
        Ok(out.into_bytes())
    }

    fn finish(&mut self) -> SaltpackResult<Vec<u8>> {
        self.guard.check()?;

        let mut out = self.start();
        self.encode_blocks(true);
        self.release_groups(&mut out);
        out.push_str(&self.out_buffer);
        self.out_buffer.clear();
        if !self.options.raw {
            out.push_str(&self.options.footer());
        }

        self.guard.mark_finished();
        Ok(out.into_bytes())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
    Header,
    Body,
    Footer,
    Trailer,
}

/// Incremental armor decoder.
///
/// The header is parsed as soon as its `.` arrives. Body characters are decoded one
/// block at a time, keeping the last block until finish since a shorter final block
/// may follow. The footer is checked against the header at finish, before the final
/// block is released.
#[derive(Debug)]
pub struct DearmorStream {
    options: ArmorOptions,
    section: Section,
    header: Vec<u8>,
    body: Vec<u8>,
    footer: Vec<u8>,
    remaining: Vec<u8>,
    header_info: Option<ArmorHeaderInfo>,
    guard: StreamGuard,
}

impl DearmorStream {
    pub fn new(options: ArmorOptions) -> SaltpackResult<Self> {
        validate_for_decode(&options)?;
        let section = if options.raw {
            Section::Body
        } else {
            Section::Header
        };
        Ok(Self {
            options,
            section,
            header: Vec::new(),
            body: Vec::new(),
            footer: Vec::new(),
            remaining: Vec::new(),
            header_info: None,
            guard: StreamGuard::default(),
        })
    }

    /// Message type and app name, once the header has been read
    pub fn header_info(&self) -> Option<&ArmorHeaderInfo> {
        self.header_info.as_ref()
    }

    /// Bytes seen after the footer; `None` for raw armor
    pub fn remaining(&self) -> Option<&[u8]> {
        (!self.options.raw).then_some(self.remaining.as_slice())
    }

    fn consume(&mut self, mut input: &[u8]) -> SaltpackResult<Vec<u8>> {
        while !input.is_empty() {
            match self.section {
                Section::Header => {
                    let (part, rest) = split_at_dot(input);
                    self.header.extend_from_slice(part);
                    input = match rest {
                        Some(rest) => {
                            let info = parse_header(&self.header)?;
                            tracing::debug!(message_type = %info.message_type, "read armor header");
                            self.header_info = Some(info);
                            self.section = Section::Body;
                            rest
                        }
                        None => &[],
                    };
                }
                Section::Body if self.options.raw => {
                    self.push_body(input);
                    input = &[];
                }
                Section::Body => {
                    let (part, rest) = split_at_dot(input);
                    self.push_body(part);
                    input = match rest {
                        Some(rest) => {
                            self.section = Section::Footer;
                            rest
                        }
                        None => &[],
                    };
                }
                Section::Footer => {
                    let (part, rest) = split_at_dot(input);
                    self.footer.extend_from_slice(part);
                    input = match rest {
                        Some(rest) => {
                            self.section = Section::Trailer;
                            rest
                        }
                        None => &[],
                    };
                }
                Section::Trailer => {
                    self.remaining.extend_from_slice(input);
                    input = &[];
                }
            }
        }

        self.decode_blocks(false)
    }

    fn push_body(&mut self, part: &[u8]) {
        let alphabet = self.options.alphabet;
        self.body
            .extend(part.iter().copied().filter(|&b| !is_separator(b, alphabet)));
    }

    fn decode_blocks(&mut self, final_block: bool) -> SaltpackResult<Vec<u8>> {
        let char_block_size = self.options.char_block_size();
        let ready = if final_block {
            self.body.len()
        } else {
            self.body.len().saturating_sub(1) / char_block_size * char_block_size
        };

        let mut out = Vec::with_capacity(ready / char_block_size * self.options.block_size + 1);
        for block in self.body[..ready].chunks(char_block_size) {
            out.extend(decode_block_bytes(
                block,
                self.options.alphabet,
                self.options.shift,
            )?);
        }
        self.body.drain(..ready);
        Ok(out)
    }

    fn close(&mut self) -> SaltpackResult<Vec<u8>> {
        if !self.options.raw {
            match self.section {
                Section::Header => return Err(missing_framing()),
                Section::Body => return Err(missing_footer()),
                Section::Footer | Section::Trailer => {
                    let header_info = self.header_info.as_ref().ok_or_else(missing_framing)?;
                    check_footer(header_info, &self.footer)?;
                }
            }
        }
        self.decode_blocks(true)
    }
}

impl Transform for DearmorStream {
    fn update(&mut self, input: &[u8]) -> SaltpackResult<Vec<u8>> {
        self.guard.check()?;
        let result = self.consume(input);
        self.guard.record(result)
    }

    fn finish(&mut self) -> SaltpackResult<Vec<u8>> {
        self.guard.check()?;
        let result = self.close();
        let out = self.guard.record(result)?;
        self.guard.mark_finished();
        Ok(out)
    }
}

fn split_at_dot(input: &[u8]) -> (&[u8], Option<&[u8]>) {
    match input.iter().position(|&b| b == b'.') {
        Some(i) => (&input[..i], Some(&input[i + 1..])),
        None => (input, None),
    }
}
