mod sink;

pub use sink::{MemorySink, OutputSink, StdStreams};

use parking_lot::Mutex;
use regex::bytes::Regex;
use std::fmt;
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, LazyLock};
use thiserror::Error;

const FRAME_MARKER: &[u8] = b"\x00__TASKLINE_FRAME__";

/// Cursor movement, screen/line clearing and bare line breaks.
static CONTROL_ONLY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:\x1b\[[0-9;]*[ABCDHJK]|[\r\n])+$").expect("static pattern compiles")
});

static STD_STREAMS_INSTALLED: AtomicBool = AtomicBool::new(false);

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CaptureError {
    #[error("output capture is already installed for this process")]
    AlreadyInstalled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stream {
    Out,
    Err,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Buffers {
    pub stdout: Vec<Vec<u8>>,
    pub stderr: Vec<Vec<u8>>,
}

impl Buffers {
    pub fn stdout_text(&self) -> String {
        decode(&self.stdout.concat())
    }

    pub fn stderr_text(&self) -> String {
        decode(&self.stderr.concat())
    }
}

struct State {
    sink: Box<dyn OutputSink + Send>,
    buffers: Buffers,
    capturing: bool,
    paused: bool,
}

impl State {
    fn write_out(&mut self, buf: &[u8]) -> io::Result<()> {
        if self.capturing && !self.paused {
            self.buffers.stdout.push(buf.to_vec());
        }
        self.sink.write_out(buf)
    }

    fn write_err(&mut self, buf: &[u8]) -> io::Result<()> {
        if let Some(frame) = buf.strip_prefix(FRAME_MARKER) {
            return self.sink.write_err(frame);
        }
        if self.capturing && !self.paused && !is_control_only(buf) {
            self.buffers.stderr.push(buf.to_vec());
        }
        self.sink.write_err(buf)
    }
}

struct InstallToken;

impl Drop for InstallToken {
    fn drop(&mut self) {
        STD_STREAMS_INSTALLED.store(false, Ordering::Release);
    }
}

pub struct Interceptor {
    state: Arc<Mutex<State>>,
    token: Option<InstallToken>,
}

impl Interceptor {
    pub fn install() -> Result<Self, CaptureError> {
        if STD_STREAMS_INSTALLED
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(CaptureError::AlreadyInstalled);
        }
        let mut interceptor = Self::with_sink(StdStreams);
        interceptor.token = Some(InstallToken);
        Ok(interceptor)
    }

    pub fn with_sink(sink: impl OutputSink + Send + 'static) -> Self {
        Self {
            state: Arc::new(Mutex::new(State {
                sink: Box::new(sink),
                buffers: Buffers::default(),
                capturing: true,
                paused: false,
            })),
            token: None,
        }
    }

    pub fn stdout(&self) -> OutputHandle {
        self.handle(Stream::Out)
    }

    pub fn stderr(&self) -> OutputHandle {
        self.handle(Stream::Err)
    }

    fn handle(&self, stream: Stream) -> OutputHandle {
        OutputHandle {
            state: Arc::clone(&self.state),
            stream,
        }
    }

    pub fn write_out(&self, buf: &[u8]) -> io::Result<()> {
        self.state.lock().write_out(buf)
    }

    pub fn write_err(&self, buf: &[u8]) -> io::Result<()> {
        self.state.lock().write_err(buf)
    }

    pub fn write_frame(&self, text: &str) -> io::Result<()> {
        let mut buf = Vec::with_capacity(FRAME_MARKER.len() + text.len());
        buf.extend_from_slice(FRAME_MARKER);
        buf.extend_from_slice(text.as_bytes());
        self.write_err(&buf)
    }

    pub fn set_paused(&self, paused: bool) {
        self.state.lock().paused = paused;
    }

    pub fn is_capturing(&self) -> bool {
        self.state.lock().capturing
    }

    pub fn buffers(&self) -> Buffers {
        self.state.lock().buffers.clone()
    }

    pub fn captured(&self, stream: Stream) -> Vec<u8> {
        let state = self.state.lock();
        match stream {
            Stream::Out => state.buffers.stdout.concat(),
            Stream::Err => state.buffers.stderr.concat(),
        }
    }

    pub fn restore(&mut self) {
        self.state.lock().capturing = false;
        self.token.take();
    }
}

impl Drop for Interceptor {
    fn drop(&mut self) {
        self.restore();
    }
}

#[derive(Clone)]
pub struct OutputHandle {
    state: Arc<Mutex<State>>,
    stream: Stream,
}

impl OutputHandle {
    pub fn stream(&self) -> Stream {
        self.stream
    }
}

impl OutputHandle {
    fn send(&self, buf: &[u8]) -> io::Result<()> {
        let mut state = self.state.lock();
        match self.stream {
            Stream::Out => state.write_out(buf),
            Stream::Err => state.write_err(buf),
        }
    }
}

impl io::Write for OutputHandle {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.send(buf)?;
        Ok(buf.len())
    }

    // One `write!` is one chunk; the default impl splits it at every argument.
    fn write_fmt(&mut self, args: fmt::Arguments<'_>) -> io::Result<()> {
        match args.as_str() {
            Some(literal) => self.send(literal.as_bytes()),
            None => self.send(args.to_string().as_bytes()),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

pub fn is_control_only(buf: &[u8]) -> bool {
    CONTROL_ONLY.is_match(buf)
}

// Chunks may split a character, so decode only once joined.
pub fn decode(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn stdout_is_recorded_and_forwarded() {
        let sink = MemorySink::new();
        let capture = Interceptor::with_sink(sink.clone());
        capture.write_out(b"hello\n").unwrap();
        assert_eq!(capture.buffers().stdout, vec![b"hello\n".to_vec()]);
        assert_eq!(sink.out_string(), "hello\n");
    }

    #[test]
    fn frames_bypass_the_stderr_buffer() {
        let sink = MemorySink::new();
        let capture = Interceptor::with_sink(sink.clone());
        capture.write_frame("frame").unwrap();
        capture.write_err(b"oops\n").unwrap();
        assert_eq!(capture.buffers().stderr_text(), "oops\n");
        assert_eq!(sink.err_string(), "frameoops\n");
    }

    #[test]
    fn control_sequences_are_forwarded_but_not_recorded() {
        let sink = MemorySink::new();
        let capture = Interceptor::with_sink(sink.clone());
        capture.write_err(b"\x1b[1;1H\x1b[J").unwrap();
        capture.write_err(b"\r\n").unwrap();
        assert!(capture.buffers().stderr.is_empty());
        assert_eq!(sink.err_string(), "\x1b[1;1H\x1b[J\r\n");
    }

    #[test]
    fn control_filter_is_structural() {
        assert!(is_control_only(b"\x1b[2A\x1b[K"));
        assert!(is_control_only(b"\n"));
        assert!(!is_control_only(b"\x1b[31mred\x1b[0m"));
        assert!(!is_control_only(b"text\n"));
        assert!(!is_control_only(b""));
    }

    #[test]
    fn paused_capture_still_forwards() {
        let sink = MemorySink::new();
        let capture = Interceptor::with_sink(sink.clone());
        capture.set_paused(true);
        capture.write_out(b"a").unwrap();
        capture.write_err(b"b").unwrap();
        assert_eq!(capture.buffers(), Buffers::default());
        assert_eq!(sink.out_string(), "a");
        assert_eq!(sink.err_string(), "b");
    }

    #[test]
    fn handles_pass_through_after_restore() {
        let sink = MemorySink::new();
        let mut capture = Interceptor::with_sink(sink.clone());
        let mut out = capture.stdout();
        writeln!(out, "before").unwrap();
        capture.restore();
        capture.restore();
        writeln!(out, "after").unwrap();
        assert_eq!(capture.buffers().stdout_text(), "before\n");
        assert_eq!(sink.out_string(), "before\nafter\n");
        assert!(!capture.is_capturing());
    }

    #[test]
    fn formatted_line_is_recorded_as_one_chunk() {
        let sink = MemorySink::new();
        let capture = Interceptor::with_sink(sink.clone());
        let mut err = capture.stderr();
        let n = 1;
        writeln!(err, "first error {n}").unwrap();
        writeln!(err, "second error {}", 2).unwrap();

        let buffers = capture.buffers();
        assert_eq!(buffers.stderr.len(), 2);
        assert_eq!(buffers.stderr_text(), "first error 1\nsecond error 2\n");
        assert_eq!(sink.err_string(), "first error 1\nsecond error 2\n");
    }

    #[test]
    fn character_split_across_writes_survives() {
        let capture = Interceptor::with_sink(MemorySink::new());
        let mut out = capture.stdout();
        out.write_all(b"ab\xe2").unwrap();
        out.write_all(b"\x86\x92\n").unwrap();
        assert_eq!(capture.buffers().stdout_text(), "ab\u{2192}\n");
        assert_eq!(decode(&capture.captured(Stream::Out)), "ab\u{2192}\n");
        assert!(capture.captured(Stream::Err).is_empty());
    }
}
