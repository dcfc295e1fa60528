//! Line transport between the daemon and its parent process.
//!
//! Every outbound record is one tagged line (`READY`, `EXPECT <field>`, ...).
//! Writes are flushed immediately because the parent reads line by line and
//! only answers after it has seen an `EXPECT`.

use std::borrow::Cow;
use std::io::{BufRead, Write};

use anyhow::{Context, Result};
use tracing::trace;

use crate::error::FatalError;

/// One outbound protocol record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
    Ready,
    Expect(&'static str),
    Debug(Vec<String>),
    Ok(String),
    Error {
        kind: &'static str,
        message: String,
    },
    /// `trace` lines are written raw after the tagged line.
    Fatal {
        kind: &'static str,
        message: String,
        trace: Option<String>,
    },
    Shutdown,
}

impl Response {
    /// Encode the record as newline-terminated text.
    pub fn encode(&self) -> String {
        let mut out = match self {
            Self::Ready => "READY".to_string(),
            Self::Expect(field) => format!("EXPECT {field}"),
            Self::Debug(fields) => format!("DEBUG {}", single_line(&fields.join(" "))),
            Self::Ok(result) => format!("OK {}", single_line(result)),
            Self::Error { kind, message } => format!("ERROR {kind} {}", single_line(message)),
            Self::Fatal { kind, message, .. } => format!("FATAL {kind} {}", single_line(message)),
            Self::Shutdown => "SHUTDOWN".to_string(),
        };
        out.push('\n');

        if let Self::Fatal {
            trace: Some(trace), ..
        } = self
        {
            out.push_str(trace);
            if !trace.ends_with('\n') {
                out.push('\n');
            }
        }
        out
    }
}

/// Escape line breaks so a payload cannot split into several records.
fn single_line(text: &str) -> Cow<'_, str> {
    if !text.contains(['\n', '\r']) {
        return Cow::Borrowed(text);
    }
    Cow::Owned(text.replace('\r', "\\r").replace('\n', "\\n"))
}

/// Blocking request/response channel over an input and an output stream.
pub struct Transport<R, W> {
    reader: R,
    writer: W,
}

impl<R: BufRead, W: Write> Transport<R, W> {
    pub fn new(reader: R, writer: W) -> Self {
        Self { reader, writer }
    }

    /// Read one line without its terminator.
    ///
    /// End of stream, I/O failures, and invalid UTF-8 are all
    /// [`FatalError::UnreadableInput`].
    pub fn read_line(&mut self) -> Result<String> {
        let mut buf = Vec::new();
        let read = self
            .reader
            .read_until(b'\n', &mut buf)
            .map_err(|err| FatalError::UnreadableInput {
                reason: err.to_string(),
            })?;
        if read == 0 {
            return Err(FatalError::UnreadableInput {
                reason: "input stream closed".to_string(),
            }
            .into());
        }

        if buf.last() == Some(&b'\n') {
            buf.pop();
            if buf.last() == Some(&b'\r') {
                buf.pop();
            }
        }
        let line = String::from_utf8(buf).map_err(|_| FatalError::UnreadableInput {
            reason: "input is not valid UTF-8".to_string(),
        })?;
        trace!(line = %line, "received line");
        Ok(line)
    }

    /// Write one record and flush it.
    pub fn send(&mut self, response: &Response) -> Result<()> {
        let encoded = response.encode();
        self.writer
            .write_all(encoded.as_bytes())
            .context("write response")?;
        self.writer.flush().context("flush response")?;
        Ok(())
    }

    pub fn writer(&self) -> &W {
        &self.writer
    }

    pub fn into_inner(self) -> (R, W) {
        (self.reader, self.writer)
    }
}
