//! Re-readable line sources
//!
//! The processor reads every input twice: once to count lines, once to
//! parse them. A [`LineSource`] hands out a fresh reader positioned at the
//! start of the data on every [`LineSource::open`] call.

use async_trait::async_trait;
use futures::Stream;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio_util::bytes::{Buf, BytesMut};
use tokio_util::codec::{Decoder, FramedRead};

/// Read buffer size for both passes
pub const READ_BUFFER_SIZE: usize = 64 * 1024;

/// Boxed reader returned by a source
pub type SourceReader = Box<dyn AsyncRead + Send + Unpin>;

/// A byte stream that can be read from the beginning any number of times
#[async_trait]
pub trait LineSource: Send + Sync {
    /// Open a new reader positioned at the first byte
    async fn open(&self) -> io::Result<SourceReader>;

    /// Name used in logs
    fn display_name(&self) -> String;
}

/// File on local disk
#[derive(Debug, Clone)]
pub struct FileSource {
    path: PathBuf,
}

impl FileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl LineSource for FileSource {
    async fn open(&self) -> io::Result<SourceReader> {
        let file = tokio::fs::File::open(&self.path).await?;
        Ok(Box::new(file))
    }

    fn display_name(&self) -> String {
        self.path.display().to_string()
    }
}

/// In-memory buffer, shared between readers
#[derive(Debug, Clone)]
pub struct MemorySource {
    name: String,
    data: Arc<[u8]>,
}

impl MemorySource {
    pub fn new(name: impl Into<String>, data: impl Into<Vec<u8>>) -> Self {
        Self {
            name: name.into(),
            data: Arc::from(data.into()),
        }
    }

    /// Build a source from lines, each terminated with `\n`
    pub fn from_lines<I, S>(name: impl Into<String>, lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut data = String::new();
        for line in lines {
            data.push_str(line.as_ref());
            data.push('\n');
        }
        Self::new(name, data)
    }
}

#[async_trait]
impl LineSource for MemorySource {
    async fn open(&self) -> io::Result<SourceReader> {
        Ok(Box::new(io::Cursor::new(Arc::clone(&self.data))))
    }

    fn display_name(&self) -> String {
        self.name.clone()
    }
}

/// One framed line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Line {
    Text(String),
    /// Longer than the codec limit; its bytes were dropped unread
    Overlong { length: usize },
}

/// Splits a byte stream into lines
///
/// Lines end at `\n`; a trailing `\r` is dropped. Bytes are decoded lossily,
/// so invalid UTF-8 yields replacement characters instead of an error. A
/// final line without a newline is still emitted.
///
/// A line longer than `max_length` bytes is skipped up to its newline and
/// reported as [`Line::Overlong`], so memory stays bounded on input without
/// line breaks.
#[derive(Debug, Clone)]
pub struct LossyLineCodec {
    next_index: usize,
    max_length: usize,
    discarding: bool,
    discarded: usize,
}

impl Default for LossyLineCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl LossyLineCodec {
    /// Codec without a line length limit
    pub fn new() -> Self {
        Self::new_with_max_length(usize::MAX)
    }

    pub fn new_with_max_length(max_length: usize) -> Self {
        Self {
            next_index: 0,
            max_length,
            discarding: false,
            discarded: 0,
        }
    }

    pub fn max_length(&self) -> usize {
        self.max_length
    }

    fn finish_discard(&mut self) -> Line {
        self.discarding = false;
        Line::Overlong {
            length: std::mem::take(&mut self.discarded),
        }
    }
}

fn decode_line(raw: &[u8]) -> String {
    let raw = raw.strip_suffix(b"\r").unwrap_or(raw);
    String::from_utf8_lossy(raw).into_owned()
}

impl Decoder for LossyLineCodec {
    type Item = Line;
    type Error = io::Error;

    fn decode(&mut self, buf: &mut BytesMut) -> Result<Option<Line>, io::Error> {
        loop {
            let read_to = self.max_length.saturating_add(1).min(buf.len());
            let newline = buf[self.next_index..read_to]
                .iter()
                .position(|b| *b == b'\n')
                .map(|offset| self.next_index + offset);

            match (self.discarding, newline) {
                (true, Some(newline)) => {
                    self.discarded += newline;
                    buf.advance(newline + 1);
                    self.next_index = 0;
                    return Ok(Some(self.finish_discard()));
                },
                (true, None) => {
                    self.discarded += read_to;
                    buf.advance(read_to);
                    self.next_index = 0;
                    if buf.is_empty() {
                        return Ok(None);
                    }
                },
                (false, Some(newline)) => {
                    self.next_index = 0;
                    let line = buf.split_to(newline + 1);
                    return Ok(Some(Line::Text(decode_line(&line[..newline]))));
                },
                (false, None) if buf.len() > self.max_length => {
                    self.discarding = true;
                },
                (false, None) => {
                    self.next_index = read_to;
                    return Ok(None);
                },
            }
        }
    }

    fn decode_eof(&mut self, buf: &mut BytesMut) -> Result<Option<Line>, io::Error> {
        if let Some(line) = self.decode(buf)? {
            return Ok(Some(line));
        }

        self.next_index = 0;
        if self.discarding {
            self.discarded += buf.len();
            buf.clear();
            return Ok(Some(self.finish_discard()));
        }

        if buf.is_empty() {
            Ok(None)
        } else {
            let line = buf.split_to(buf.len());
            Ok(Some(Line::Text(decode_line(&line))))
        }
    }
}

/// Stream the lines of a freshly opened reader
///
/// Lines longer than `max_line_bytes` come back as [`Line::Overlong`].
pub async fn lines<S>(
    source: &S,
    max_line_bytes: usize,
) -> io::Result<impl Stream<Item = io::Result<Line>> + Send + Unpin>
where
    S: LineSource + ?Sized,
{
    let reader = source.open().await?;
    Ok(FramedRead::with_capacity(
        reader,
        LossyLineCodec::new_with_max_length(max_line_bytes),
        READ_BUFFER_SIZE,
    ))
}

/// First pass: count lines without decoding them
///
/// Uses the same line rules as [`LossyLineCodec`]; an overlong line still
/// counts as one line.
pub async fn count_lines<S>(source: &S) -> io::Result<u64>
where
    S: LineSource + ?Sized,
{
    let mut reader = source.open().await?;
    let mut buffer = vec![0u8; READ_BUFFER_SIZE];
    let mut newlines = 0u64;
    let mut last_byte = None;

    loop {
        let read = reader.read(&mut buffer).await?;
        if read == 0 {
            break;
        }
        let chunk = &buffer[..read];
        newlines += chunk.iter().filter(|b| **b == b'\n').count() as u64;
        last_byte = chunk.last().copied();
    }

    Ok(match last_byte {
        Some(b'\n') | None => newlines,
        Some(_) => newlines + 1,
    })
}
