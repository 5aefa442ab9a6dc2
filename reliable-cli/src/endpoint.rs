//! Process-level session collaborators
//!
//! Adapters that connect a [`Session`](reliable_protocol::Session) to the
//! real world: a UDP transport, a stdin source fed by a reader thread, a
//! bounded stdout sink and the in-process echo pipe used by the server.

use bytes::{Bytes, BytesMut};
use crossbeam::channel::{self, Receiver, TryRecvError};
use reliable_io::DatagramSocket;
use reliable_protocol::{AppInput, AppOutput, InputChunk, Transport};
use std::cell::RefCell;
use std::io::{self, Read, Write};
use std::net::SocketAddr;
use std::rc::Rc;
use std::thread;

/// Datagram transport to one peer over a shared socket
#[derive(Debug, Clone)]
pub struct UdpTransport {
    socket: Rc<DatagramSocket>,
    peer: SocketAddr,
}

impl UdpTransport {
    pub fn new(socket: Rc<DatagramSocket>, peer: SocketAddr) -> Self {
        UdpTransport { socket, peer }
    }

    pub fn peer(&self) -> SocketAddr {
        self.peer
    }
}

impl Transport for UdpTransport {
    fn send(&mut self, datagram: &[u8]) {
        // Lost sends are recovered by retransmission.
        if let Err(e) = self.socket.send_to(datagram, self.peer) {
            tracing::warn!(peer = %self.peer, error = %e, "datagram send failed");
        }
    }
}

/// Application input fed by a background reader thread
///
/// The channel is bounded so the reader stops pulling from its source while
/// the session is window-limited. A disconnected channel is end of input.
#[derive(Debug)]
pub struct ChannelInput {
    rx: Receiver<Bytes>,
    pending: Bytes,
}

/// Size of each read the reader thread performs
pub const READ_CHUNK: usize = 4096;

impl ChannelInput {
    /// Wrap an existing channel
    pub fn new(rx: Receiver<Bytes>) -> Self {
        ChannelInput {
            rx,
            pending: Bytes::new(),
        }
    }

    /// Start a thread reading `source` into a channel of `depth` chunks
    pub fn spawn<R>(mut source: R, depth: usize) -> io::Result<Self>
    where
        R: Read + Send + 'static,
    {
        let (tx, rx) = channel::bounded::<Bytes>(depth.max(1));
        thread::Builder::new()
            .name("input-reader".into())
            .spawn(move || {
                let mut buf = vec![0u8; READ_CHUNK];
                loop {
                    match source.read(&mut buf) {
                        Ok(0) => break,
                        Ok(n) => {
                            if tx.send(Bytes::copy_from_slice(&buf[..n])).is_err() {
                                break;
                            }
                        }
                        Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                        Err(e) => {
                            tracing::error!(error = %e, "input read failed");
                            break;
                        }
                    }
                }
                tracing::debug!("input reader finished");
            })?;
        Ok(Self::new(rx))
    }

    /// Read standard input on a background thread
    pub fn stdin(depth: usize) -> io::Result<Self> {
        Self::spawn(io::stdin(), depth)
    }
}

impl AppInput for ChannelInput {
    fn read(&mut self, max: usize) -> InputChunk {
        if max == 0 {
            return InputChunk::Empty;
        }
        if self.pending.is_empty() {
            match self.rx.try_recv() {
                Ok(chunk) => self.pending = chunk,
                Err(TryRecvError::Empty) => return InputChunk::Empty,
                Err(TryRecvError::Disconnected) => return InputChunk::Eof,
            }
        }
        let n = max.min(self.pending.len());
        InputChunk::Data(self.pending.split_to(n))
    }
}

/// Input that holds back end of input until the reply has caught up
///
/// A client talking to an echo peer must keep its session open until every
/// byte it sent has come back. The poll loop reports how many reply bytes
/// were delivered with [`set_returned`](Self::set_returned); until that
/// reaches the number of bytes handed to the session, the inner input's end
/// is reported as [`InputChunk::Empty`].
#[derive(Debug)]
pub struct AwaitReply<I> {
    inner: I,
    handed_out: u64,
    returned: u64,
    inner_done: bool,
    wait: bool,
}

impl<I: AppInput> AwaitReply<I> {
    pub fn new(inner: I) -> Self {
        AwaitReply {
            inner,
            handed_out: 0,
            returned: 0,
            inner_done: false,
            wait: true,
        }
    }

    /// Report the inner input's end as soon as it happens
    pub fn passthrough(inner: I) -> Self {
        AwaitReply {
            wait: false,
            ..Self::new(inner)
        }
    }

    /// Record the total reply bytes delivered so far
    pub fn set_returned(&mut self, returned: u64) {
        self.returned = returned;
    }

    /// Bytes sent whose reply has not arrived yet
    pub fn outstanding(&self) -> u64 {
        self.handed_out.saturating_sub(self.returned)
    }

    pub fn inner_mut(&mut self) -> &mut I {
        &mut self.inner
    }
}

impl<I: AppInput> AppInput for AwaitReply<I> {
    fn read(&mut self, max: usize) -> InputChunk {
        if !self.inner_done {
            match self.inner.read(max) {
                InputChunk::Data(chunk) => {
                    self.handed_out += chunk.len() as u64;
                    return InputChunk::Data(chunk);
                }
                InputChunk::Empty => return InputChunk::Empty,
                InputChunk::Eof => self.inner_done = true,
            }
        }
        if !self.wait || self.outstanding() == 0 {
            InputChunk::Eof
        } else {
            InputChunk::Empty
        }
    }
}

/// Bounded buffer in front of a blocking writer
///
/// The session writes into the buffer; the poll loop moves it to the writer
/// with [`flush_pending`](Self::flush_pending) and then tells the session
/// that space was freed.
#[derive(Debug)]
pub struct BufferedOutput<W: Write> {
    buffer: BytesMut,
    limit: usize,
    writer: W,
}

impl<W: Write> BufferedOutput<W> {
    pub fn new(writer: W, limit: usize) -> Self {
        BufferedOutput {
            buffer: BytesMut::with_capacity(limit.min(1 << 20)),
            limit,
            writer,
        }
    }

    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// Write everything buffered to the writer, returning the bytes freed
    pub fn flush_pending(&mut self) -> io::Result<usize> {
        if self.buffer.is_empty() {
            return Ok(0);
        }
        let n = self.buffer.len();
        self.writer.write_all(&self.buffer)?;
        self.writer.flush()?;
        self.buffer.clear();
        Ok(n)
    }

    pub fn writer(&self) -> &W {
        &self.writer
    }
}

impl BufferedOutput<io::Stdout> {
    pub fn stdout(limit: usize) -> Self {
        Self::new(io::stdout(), limit)
    }
}

impl<W: Write> AppOutput for BufferedOutput<W> {
    fn capacity(&self) -> usize {
        self.limit.saturating_sub(self.buffer.len())
    }

    fn write(&mut self, bytes: &[u8]) -> io::Result<()> {
        if bytes.len() > self.capacity() {
            return Err(io::Error::new(
                io::ErrorKind::WouldBlock,
                "output buffer is full",
            ));
        }
        self.buffer.extend_from_slice(bytes);
        Ok(())
    }
}

#[derive(Debug)]
struct PipeBuffer {
    bytes: BytesMut,
    limit: usize,
}

/// Write half of an echo pipe; the session's output
#[derive(Debug, Clone)]
pub struct EchoOutput {
    pipe: Rc<RefCell<PipeBuffer>>,
}

/// Read half of an echo pipe; the session's input
///
/// An echo never ends on its own, so this input never reports end of input.
#[derive(Debug, Clone)]
pub struct EchoInput {
    pipe: Rc<RefCell<PipeBuffer>>,
}

/// Create a pipe that loops delivered bytes back into the send path
pub fn echo_pipe(limit: usize) -> (EchoInput, EchoOutput) {
    let pipe = Rc::new(RefCell::new(PipeBuffer {
        bytes: BytesMut::new(),
        limit,
    }));
    (
        EchoInput {
            pipe: Rc::clone(&pipe),
        },
        EchoOutput { pipe },
    )
}

impl EchoInput {
    pub fn buffered(&self) -> usize {
        self.pipe.borrow().bytes.len()
    }
}

impl AppInput for EchoInput {
    fn read(&mut self, max: usize) -> InputChunk {
        let mut pipe = self.pipe.borrow_mut();
        if pipe.bytes.is_empty() || max == 0 {
            return InputChunk::Empty;
        }
        let n = max.min(pipe.bytes.len());
        let chunk = pipe.bytes.split_to(n).freeze();
        InputChunk::Data(chunk)
    }
}

impl AppOutput for EchoOutput {
    fn capacity(&self) -> usize {
        let pipe = self.pipe.borrow();
        pipe.limit.saturating_sub(pipe.bytes.len())
    }

    fn write(&mut self, bytes: &[u8]) -> io::Result<()> {
        if bytes.len() > self.capacity() {
            return Err(io::Error::new(
                io::ErrorKind::WouldBlock,
                "echo pipe is full",
            ));
        }
        self.pipe.borrow_mut().bytes.extend_from_slice(bytes);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use std::time::{Duration, Instant};

    fn read_until_eof(input: &mut ChannelInput, max: usize) -> Vec<u8> {
        let deadline = Instant::now() + Duration::from_secs(5);
        let mut out = Vec::new();
        loop {
            match input.read(max) {
                InputChunk::Data(chunk) => {
                    assert!(chunk.len() <= max);
                    out.extend_from_slice(&chunk);
                }
                InputChunk::Empty => {
                    assert!(Instant::now() < deadline, "reader thread stalled");
                    thread::sleep(Duration::from_millis(1));
                }
                InputChunk::Eof => return out,
            }
        }
    }

    #[test]
    fn test_channel_input_reads_source_then_eof() {
        let data: Vec<u8> = (0..10_000u32).map(|i| (i % 251) as u8).collect();
        let mut input = ChannelInput::spawn(Cursor::new(data.clone()), 2).unwrap();

        let out = read_until_eof(&mut input, 500);
        assert_eq!(out, data);
        // Stays at end of input.
        assert_eq!(input.read(500), InputChunk::Eof);
    }

    #[test]
    fn test_channel_input_empty_while_sender_alive() {
        let (tx, rx) = channel::bounded(4);
        let mut input = ChannelInput::new(rx);

        assert_eq!(input.read(10), InputChunk::Empty);
        tx.send(Bytes::from_static(b"hello world")).unwrap();
        assert_eq!(input.read(5), InputChunk::Data(Bytes::from_static(b"hello")));
        drop(tx);
        // Pending bytes are handed out before end of input.
        assert_eq!(input.read(100), InputChunk::Data(Bytes::from_static(b" world")));
        assert_eq!(input.read(100), InputChunk::Eof);
    }

    #[test]
    fn test_await_reply_holds_eof_until_reply_arrives() {
        use reliable_protocol::MemoryInput;

        let mut input = AwaitReply::new(MemoryInput::with_contents(b"hello world"));
        assert_eq!(input.read(5), InputChunk::Data(Bytes::from_static(b"hello")));
        assert_eq!(input.read(100), InputChunk::Data(Bytes::from_static(b" world")));
        assert_eq!(input.outstanding(), 11);

        // Inner input is exhausted but nothing came back yet.
        assert_eq!(input.read(100), InputChunk::Empty);
        input.set_returned(6);
        assert_eq!(input.read(100), InputChunk::Empty);
        assert_eq!(input.outstanding(), 5);

        input.set_returned(11);
        assert_eq!(input.read(100), InputChunk::Eof);
        assert_eq!(input.read(100), InputChunk::Eof);
    }

    #[test]
    fn test_await_reply_passes_empty_input_through() {
        use reliable_protocol::MemoryInput;

        let mut input = AwaitReply::new(MemoryInput::new());
        assert_eq!(input.read(10), InputChunk::Empty);
        input.inner_mut().close();
        assert_eq!(input.read(10), InputChunk::Eof);
    }

    #[test]
    fn test_passthrough_ends_with_inner_input() {
        use reliable_protocol::MemoryInput;

        let mut input = AwaitReply::passthrough(MemoryInput::with_contents(b"abc"));
        assert_eq!(input.read(10), InputChunk::Data(Bytes::from_static(b"abc")));
        assert_eq!(input.outstanding(), 3);
        assert_eq!(input.read(10), InputChunk::Eof);
    }

    #[test]
    fn test_buffered_output_capacity_and_flush() {
        let mut output = BufferedOutput::new(Vec::new(), 10);
        assert_eq!(output.capacity(), 10);

        output.write(b"abcdef").unwrap();
        assert_eq!(output.capacity(), 4);
        assert!(output.write(b"ghijk").is_err());

        assert_eq!(output.flush_pending().unwrap(), 6);
        assert_eq!(output.capacity(), 10);
        assert_eq!(output.writer().as_slice(), b"abcdef");
        assert_eq!(output.flush_pending().unwrap(), 0);
    }

    #[test]
    fn test_echo_pipe_loops_bytes() {
        let (mut input, mut output) = echo_pipe(8);
        assert_eq!(input.read(4), InputChunk::Empty);

        output.write(b"12345").unwrap();
        assert_eq!(output.capacity(), 3);
        assert!(output.write(b"6789").is_err());

        assert_eq!(input.read(3), InputChunk::Data(Bytes::from_static(b"123")));
        assert_eq!(output.capacity(), 6);
        assert_eq!(input.buffered(), 2);
    }
}
