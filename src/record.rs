//! Meta file record tokenizer
//!
//! A meta file starts with a free-form header written by make (command line,
//! `CWD`, `TARGET`) followed by the filemon capture. Before the version record
//! only the `CWD` header line is meaningful; after it, every line whose first
//! token is a known record letter becomes a [`TraceRecord`].
//!
//! ```text
//! CWD /src/bin/cat
//! # filemon version 5
//! V 5
//! C 4242 /src/bin/cat
//! E 4242 /usr/bin/cc
//! R 4242 /src/bin/cat/cat.c
//! X 4242 0 0
//! # Bye bye
//! ```

use std::io::BufRead;
use std::path::PathBuf;

use tracing::warn;

use crate::error::{MetaError, Result};

/// Process id as written by filemon
pub type Pid = i32;

/// Phrase inside a `#` comment that confirms the capture was not truncated
pub const TERMINATION_MARKER: &str = "Bye";

/// One record of a meta file
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TraceRecord {
    /// `V <n>`: filemon protocol version
    Version(u32),
    /// `CWD <dir>`: header line naming the initial working directory
    Cwd(String),
    /// `C <pid> <dir>`
    Chdir { pid: Pid, dir: String },
    /// `E <pid> <path>`
    Exec { pid: Pid, path: String },
    /// `R <pid> <path>`
    Read { pid: Pid, path: String },
    /// `W <pid> <path>`
    Write { pid: Pid, path: String },
    /// `L <pid> <src> <dst>` and `M <pid> <src> <dst>`
    Link { pid: Pid, src: String, dst: String },
    /// `F <pid> <child>`
    Fork { pid: Pid, child: Pid },
    /// `X <pid> ...`
    Exit { pid: Pid },
    /// `# ...`
    Comment(String),
}

impl TraceRecord {
    /// True for a comment carrying the termination marker
    pub fn is_termination(&self) -> bool {
        matches!(self, TraceRecord::Comment(text) if text.contains(TERMINATION_MARKER))
    }

    /// Parse a header line; only `CWD` and `V` mean anything here
    pub fn parse_header(line: &str) -> Option<Self> {
        let mut words = line.split_whitespace();
        match words.next()? {
            "CWD" => words.next().map(|dir| TraceRecord::Cwd(dir.to_string())),
            "V" => words
                .next()
                .and_then(|v| v.parse::<u32>().ok())
                .filter(|v| *v > 0)
                .map(TraceRecord::Version),
            _ => None,
        }
    }

    /// Parse a capture line
    ///
    /// Returns `Ok(None)` for lines that are not interesting and `Err` with a
    /// short reason for interesting lines that cannot be decoded.
    pub fn parse_capture(line: &str) -> std::result::Result<Option<Self>, &'static str> {
        if line.starts_with('#') {
            return Ok(Some(TraceRecord::Comment(line.trim_end().to_string())));
        }
        let mut words = line.split_whitespace();
        let Some(kind) = words.next() else {
            return Ok(None);
        };
        if !matches!(kind, "V" | "C" | "E" | "R" | "W" | "L" | "M" | "F" | "X") {
            return Ok(None);
        }
        if kind == "V" {
            let version = words
                .next()
                .and_then(|v| v.parse::<u32>().ok())
                .ok_or("bad version number")?;
            return Ok(Some(TraceRecord::Version(version)));
        }

        let pid = words
            .next()
            .and_then(|p| p.parse::<Pid>().ok())
            .ok_or("bad pid")?;
        let mut arg = || words.next().map(str::to_string).ok_or("missing argument");

        let record = match kind {
            "C" => TraceRecord::Chdir { pid, dir: arg()? },
            "E" => TraceRecord::Exec { pid, path: arg()? },
            "R" => TraceRecord::Read { pid, path: arg()? },
            "W" => TraceRecord::Write { pid, path: arg()? },
            "L" | "M" => {
                let src = unquote(&arg()?).to_string();
                let dst = unquote(&arg()?).to_string();
                TraceRecord::Link { pid, src, dst }
            }
            "F" => {
                let child = arg()?.parse::<Pid>().map_err(|_| "bad child pid")?;
                TraceRecord::Fork { pid, child }
            }
            "X" => TraceRecord::Exit { pid },
            _ => return Ok(None),
        };
        Ok(Some(record))
    }
}

fn unquote(s: &str) -> &str {
    s.trim_matches('\'')
}

/// Which part of the meta file the reader is in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CapturePhase {
    /// Make's header, before the version record
    Header,
    /// Inside the filemon capture
    Active,
}

/// Line-by-line reader yielding `(line_number, record)` pairs
///
/// Lines are decoded lossily: make copies command lines into the header
/// verbatim, and a stray non-UTF-8 byte there must not reject the capture.
pub struct TraceReader<R> {
    name: PathBuf,
    reader: R,
    buf: Vec<u8>,
    line: usize,
    phase: CapturePhase,
}

impl<R: BufRead> TraceReader<R> {
    pub fn new(name: impl Into<PathBuf>, reader: R) -> Self {
        Self {
            name: name.into(),
            reader,
            buf: Vec::new(),
            line: 0,
            phase: CapturePhase::Header,
        }
    }

    /// Number of the last line consumed
    pub fn line(&self) -> usize {
        self.line
    }

    pub fn phase(&self) -> CapturePhase {
        self.phase
    }
}

impl<R: BufRead> Iterator for TraceReader<R> {
    type Item = Result<(usize, TraceRecord)>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            self.buf.clear();
            match self.reader.read_until(b'\n', &mut self.buf) {
                Ok(0) => return None,
                Ok(_) => {}
                Err(source) => {
                    return Some(Err(MetaError::Io {
                        file: self.name.clone(),
                        source,
                    }))
                }
            }
            self.line += 1;
            let raw = self.buf.strip_suffix(b"\n").unwrap_or(&self.buf);
            let raw = raw.strip_suffix(b"\r").unwrap_or(raw);
            let text = String::from_utf8_lossy(raw).into_owned();

            match self.phase {
                CapturePhase::Header => {
                    if let Some(record) = TraceRecord::parse_header(&text) {
                        if matches!(record, TraceRecord::Version(_)) {
                            self.phase = CapturePhase::Active;
                        }
                        return Some(Ok((self.line, record)));
                    }
                }
                CapturePhase::Active => match TraceRecord::parse_capture(&text) {
                    Ok(Some(record)) => return Some(Ok((self.line, record))),
                    Ok(None) => {}
                    Err(reason) => {
                        warn!(
                            file = %self.name.display(),
                            line = self.line,
                            "skipping malformed record ({reason}): {text}"
                        );
                    }
                },
            }
        }
    }
}
