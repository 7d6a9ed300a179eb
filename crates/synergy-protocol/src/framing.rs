//! Newline-delimited framing.
//!
//! Each envelope travels as one line of compact JSON terminated by `\n`:
//!
//! ```text
//! {"version":"V1_0","type":"JOIN_SESSION_REQUEST","id":1,"payload":{...}}\n
//! ```
//!
//! Compact JSON never contains a raw newline, so the terminator is
//! unambiguous. Reads are arbitrary chunks; [`LineFramer`] reassembles them.

use crate::MAX_LINE_LENGTH;
use crate::envelope::Envelope;
use crate::error::{ProtocolError, ProtocolResult};

/// Renders an envelope as one terminated line, ready for transmission.
pub fn encode_line(envelope: &Envelope) -> ProtocolResult<Vec<u8>> {
    let mut line = envelope.to_bytes()?;
    if line.len() > MAX_LINE_LENGTH {
        return Err(ProtocolError::MessageTooLarge {
            size: line.len(),
            max: MAX_LINE_LENGTH,
        });
    }
    line.push(b'\n');
    Ok(line)
}

/// Splits a byte stream into lines.
///
/// Feed it whatever the transport returned with [`extend`](Self::extend),
/// then drain complete lines with [`next_frame`](Self::next_frame). A partial
/// line stays buffered until its terminator arrives.
///
/// Lines longer than the limit are dropped up to their terminator and
/// reported once as [`ProtocolError::MessageTooLarge`]; the following line is
/// read normally.
#[derive(Debug)]
pub struct LineFramer {
    buffer: Vec<u8>,
    max_line_length: usize,
    /// Set while skipping the rest of an oversized line.
    discarding: bool,
    discarded: usize,
    /// Bytes at the front of `buffer` already known to hold no terminator.
    scanned: usize,
}

impl Default for LineFramer {
    fn default() -> Self {
        Self::new()
    }
}

impl LineFramer {
    /// Creates a framer with the default line limit.
    pub fn new() -> Self {
        Self::with_max_line_length(MAX_LINE_LENGTH)
    }

    /// Creates a framer with a custom line limit (in bytes, terminator excluded).
    pub fn with_max_line_length(max_line_length: usize) -> Self {
        Self {
            buffer: Vec::new(),
            max_line_length,
            discarding: false,
            discarded: 0,
            scanned: 0,
        }
    }

    /// Appends bytes read from the transport.
    pub fn extend(&mut self, bytes: &[u8]) {
        self.buffer.extend_from_slice(bytes);
    }

    /// Bytes held for an incomplete line.
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// Returns the next complete, non-empty line without its terminator.
    ///
    /// `None` means more input is needed. A trailing `\r` is stripped.
    pub fn next_frame(&mut self) -> Option<ProtocolResult<Vec<u8>>> {
        loop {
            let newline = self.buffer[self.scanned..]
                .iter()
                .position(|&b| b == b'\n')
                .map(|offset| self.scanned + offset);

            let Some(end) = newline else {
                self.scanned = self.buffer.len();
                // A trailing `\r` may still turn out to be part of the terminator.
                let pending = self.buffer.len() - usize::from(self.buffer.last() == Some(&b'\r'));
                if pending > self.max_line_length {
                    // No terminator in sight: drop what we have and keep skipping.
                    self.discarded += self.buffer.len();
                    self.discarding = true;
                    self.buffer.clear();
                    self.scanned = 0;
                }
                return None;
            };

            let mut line: Vec<u8> = self.buffer.drain(..=end).collect();
            self.scanned = 0;
            line.pop();
            if line.last() == Some(&b'\r') {
                line.pop();
            }

            if self.discarding {
                let size = self.discarded + line.len();
                self.discarding = false;
                self.discarded = 0;
                return Some(Err(self.too_large(size)));
            }

            if line.is_empty() {
                continue;
            }
            if line.len() > self.max_line_length {
                return Some(Err(self.too_large(line.len())));
            }
            return Some(Ok(line));
        }
    }

    fn too_large(&self, size: usize) -> ProtocolError {
        ProtocolError::MessageTooLarge {
            size,
            max: self.max_line_length,
        }
    }
}
