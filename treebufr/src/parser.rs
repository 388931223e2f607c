use crate::errors::{Error, Result, Warning};
use crate::message::Message;
use flate2::read::GzDecoder;
use memmap2::Mmap;
use std::{fs::File, io::Read, path::Path};

const BUFR_PATTERN: &[u8] = b"BUFR";
const END_PATTERN: &[u8] = b"7777";
const GZIP_MAGIC: [u8; 2] = [0x1F, 0x8B];
/// Indicator section plus End section.
const MIN_MESSAGE_LEN: usize = 12;

/// Bytes of a BUFR file, memory mapped or inflated from gzip.
pub enum BufrSource {
    Mapped(Mmap),
    Owned(Vec<u8>),
}

impl BufrSource {
    pub fn bytes(&self) -> &[u8] {
        match self {
            BufrSource::Mapped(mmap) => mmap,
            BufrSource::Owned(bytes) => bytes,
        }
    }

    pub fn scan(&self) -> MessageScanner<'_> {
        MessageScanner::new(self.bytes())
    }
}

pub fn open<P: AsRef<Path>>(path: P) -> Result<BufrSource> {
    let file = File::open(path)?;
    if file.metadata()?.len() == 0 {
        return Ok(BufrSource::Owned(vec![]));
    }
    // SAFETY: the mapping is read only and lives as long as the source.
    let mmap = unsafe { Mmap::map(&file)? };

    if mmap.len() >= 2 && mmap[..2] == GZIP_MAGIC {
        let mut gz_decoder = GzDecoder::new(&mmap[..]);
        let mut bytes = vec![];
        gz_decoder.read_to_end(&mut bytes)?;
        Ok(BufrSource::Owned(bytes))
    } else {
        Ok(BufrSource::Mapped(mmap))
    }
}

pub fn scan_bytes(bytes: &[u8]) -> MessageScanner<'_> {
    MessageScanner::new(bytes)
}

/// A message that could not be framed or parsed.
#[derive(Debug)]
pub struct SkippedMessage {
    pub offset: usize,
    pub error: Error,
}

#[derive(Debug)]
pub enum Scanned {
    Message(Message),
    Skipped(SkippedMessage),
}

/// Pull-based iterator over the messages of a byte stream.
///
/// Malformed candidates are reported as [`Scanned::Skipped`] and scanning
/// resumes just past their start marker.
pub struct MessageScanner<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> MessageScanner<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        MessageScanner { data, pos: 0 }
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    fn find_marker(&self) -> Option<usize> {
        self.data
            .get(self.pos..)?
            .windows(BUFR_PATTERN.len())
            .position(|w| w == BUFR_PATTERN)
            .map(|i| self.pos + i)
    }

    fn has_end_at(&self, end: usize) -> bool {
        end >= END_PATTERN.len()
            && self
                .data
                .get(end - END_PATTERN.len()..end)
                .is_some_and(|w| w == END_PATTERN)
    }

    /// Effective length of the message at `start`, plus a warning when the
    /// terminator sits one byte before the declared end.
    fn frame(&self, start: usize) -> Result<(usize, usize, Option<Warning>)> {
        let available = self.data.len() - start;
        if available < 8 {
            return Err(Error::Truncated {
                offset: start,
                declared: MIN_MESSAGE_LEN,
                available,
            });
        }

        let header = &self.data[start + 4..start + 7];
        let declared = u32::from_be_bytes([0, header[0], header[1], header[2]]) as usize;
        if declared < MIN_MESSAGE_LEN {
            return Err(Error::ParseError(format!(
                "Message at offset {} declares only {} bytes",
                start, declared
            )));
        }
        if declared > available + 1 {
            return Err(Error::Truncated {
                offset: start,
                declared,
                available,
            });
        }

        if declared <= available && self.has_end_at(start + declared) {
            return Ok((declared, declared, None));
        }
        if self.has_end_at(start + declared - 1) {
            eprintln!(
                "Warning: BUFR message at offset {} ends one byte before its declared length",
                start
            );
            return Ok((
                declared,
                declared - 1,
                Some(Warning::ShortTerminator { offset: start }),
            ));
        }
        Err(Error::BadTerminator { offset: start })
    }

    fn read_at(&self, start: usize) -> Result<Message> {
        let (declared, effective, warning) = self.frame(start)?;
        let end = (start + declared).min(self.data.len());
        let mut message = Message::parse(&self.data[start..end], start, effective)?;
        if let Some(warning) = warning {
            message.push_warning(warning);
        }
        Ok(message)
    }
}

impl Iterator for MessageScanner<'_> {
    type Item = Scanned;

    fn next(&mut self) -> Option<Self::Item> {
        let start = self.find_marker()?;
        match self.read_at(start) {
            Ok(message) => {
                self.pos = start + message.length();
                Some(Scanned::Message(message))
            }
            Err(error) => {
                self.pos = start + BUFR_PATTERN.len();
                Some(Scanned::Skipped(SkippedMessage {
                    offset: start,
                    error,
                }))
            }
        }
    }
}
