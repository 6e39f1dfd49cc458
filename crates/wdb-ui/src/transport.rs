//! Message channel between the engine and the front-end.

use std::collections::VecDeque;
use std::io::{self, Read, Write};
use std::net::TcpStream;
use std::sync::Arc;

use parking_lot::Mutex;

/// Largest message body accepted from the front-end.
pub const MAX_MESSAGE_BYTES: usize = 64 * 1024 * 1024;

/// Length header announcing that a 64-bit length follows.
const WIDE_LENGTH_MARKER: i32 = -1;

pub trait Transport {
    fn send(&mut self, message: &str) -> io::Result<()>;

    /// Blocks until the next message arrives. `ErrorKind::Interrupted` means
    /// the user interrupted the wait.
    fn receive(&mut self) -> io::Result<String>;
}

/// Writes one length-prefixed frame: a big-endian `i32` byte count, or `-1`
/// followed by a big-endian `u64` when the body does not fit in an `i32`.
pub fn write_frame<W: Write>(writer: &mut W, body: &[u8]) -> io::Result<()> {
    match i32::try_from(body.len()) {
        Ok(len) => writer.write_all(&len.to_be_bytes())?,
        Err(_) => {
            writer.write_all(&WIDE_LENGTH_MARKER.to_be_bytes())?;
            writer.write_all(&(body.len() as u64).to_be_bytes())?;
        }
    }
    writer.write_all(body)?;
    writer.flush()
}

/// Reads one length-prefixed frame. `Ok(None)` is a clean end of stream,
/// i.e. EOF before the first header byte.
pub fn read_frame<R: Read>(reader: &mut R) -> io::Result<Option<Vec<u8>>> {
    let mut header = [0u8; 4];
    let mut filled = 0;
    while filled < header.len() {
        match reader.read(&mut header[filled..]) {
            Ok(0) if filled == 0 => return Ok(None),
            Ok(0) => {
                return Err(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    "EOF inside a frame header",
                ))
            }
            Ok(n) => filled += n,
            Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
            Err(err) => return Err(err),
        }
    }

    let len = match i32::from_be_bytes(header) {
        WIDE_LENGTH_MARKER => {
            let mut wide = [0u8; 8];
            reader.read_exact(&mut wide)?;
            u64::from_be_bytes(wide)
        }
        len => u64::try_from(len).map_err(|_| {
            io::Error::new(io::ErrorKind::InvalidData, format!("negative frame length {len}"))
        })?,
    };
    let len = usize::try_from(len)
        .ok()
        .filter(|len| *len <= MAX_MESSAGE_BYTES)
        .ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::InvalidData,
                format!("frame of {len} bytes exceeds the {MAX_MESSAGE_BYTES} byte limit"),
            )
        })?;

    let mut body = vec![0u8; len];
    reader.read_exact(&mut body)?;
    Ok(Some(body))
}

/// Length-prefixed transport over a reader/writer pair, typically the two
/// halves of the socket connected to the wdb server.
pub struct FramedTransport<R, W> {
    reader: R,
    writer: W,
}

impl<R: Read, W: Write> FramedTransport<R, W> {
    pub fn new(reader: R, writer: W) -> Self {
        Self { reader, writer }
    }

    pub fn into_inner(self) -> (R, W) {
        (self.reader, self.writer)
    }
}

impl FramedTransport<TcpStream, TcpStream> {
    /// Frames a connected socket, reading and writing through cloned handles.
    pub fn from_stream(stream: TcpStream) -> io::Result<Self> {
        let reader = stream.try_clone()?;
        Ok(Self::new(reader, stream))
    }
}

impl<R: Read, W: Write> Transport for FramedTransport<R, W> {
    fn send(&mut self, message: &str) -> io::Result<()> {
        tracing::trace!(target: "wdb.ui", len = message.len(), "sending frame");
        write_frame(&mut self.writer, message.as_bytes())
    }

    fn receive(&mut self) -> io::Result<String> {
        let Some(body) = read_frame(&mut self.reader)? else {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "front-end closed the connection",
            ));
        };
        String::from_utf8(body)
            .map_err(|_| io::Error::new(io::ErrorKind::InvalidData, "frame is not UTF-8"))
    }
}

#[derive(Default)]
struct MockTransportState {
    incoming: VecDeque<io::Result<String>>,
    sent: Vec<String>,
    sends_before_failure: usize,
    failing_sends: usize,
}

/// In-memory transport. Clones share the same queues, so a test can keep a
/// handle while the engine owns another.
#[derive(Clone, Default)]
pub struct MockTransport {
    state: Arc<Mutex<MockTransportState>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_incoming<I, S>(messages: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let transport = Self::new();
        for message in messages {
            transport.push_incoming(message);
        }
        transport
    }

    pub fn push_incoming(&self, message: impl Into<String>) {
        self.state.lock().incoming.push_back(Ok(message.into()));
    }

    pub fn push_error(&self, kind: io::ErrorKind) {
        self.state
            .lock()
            .incoming
            .push_back(Err(io::Error::new(kind, "scripted transport error")));
    }

    /// Makes the next `count` sends fail.
    pub fn fail_sends(&self, count: usize) {
        self.fail_sends_after(0, count);
    }

    /// Lets `delay` sends through, then fails the following `count`.
    pub fn fail_sends_after(&self, delay: usize, count: usize) {
        let mut state = self.state.lock();
        state.sends_before_failure = delay;
        state.failing_sends = count;
    }

    pub fn sent(&self) -> Vec<String> {
        self.state.lock().sent.clone()
    }

    pub fn take_sent(&self) -> Vec<String> {
        std::mem::take(&mut self.state.lock().sent)
    }
}

impl Transport for MockTransport {
    fn send(&mut self, message: &str) -> io::Result<()> {
        let mut state = self.state.lock();
        if state.sends_before_failure > 0 {
            state.sends_before_failure -= 1;
        } else if state.failing_sends > 0 {
            state.failing_sends -= 1;
            return Err(io::Error::new(io::ErrorKind::BrokenPipe, "scripted send failure"));
        }
        state.sent.push(message.to_string());
        Ok(())
    }

    fn receive(&mut self) -> io::Result<String> {
        self.state.lock().incoming.pop_front().unwrap_or_else(|| {
            Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "no more scripted messages",
            ))
        })
    }
}
