use parking_lot::Mutex;
use std::io::{self, Write};
use std::sync::Arc;

pub trait OutputSink {
    fn write_out(&mut self, buf: &[u8]) -> io::Result<()>;
    fn write_err(&mut self, buf: &[u8]) -> io::Result<()>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct StdStreams;

impl OutputSink for StdStreams {
    fn write_out(&mut self, buf: &[u8]) -> io::Result<()> {
        let mut out = io::stdout().lock();
        out.write_all(buf)?;
        out.flush()
    }

    fn write_err(&mut self, buf: &[u8]) -> io::Result<()> {
        let mut err = io::stderr().lock();
        err.write_all(buf)?;
        err.flush()
    }
}

#[derive(Debug, Default, Clone)]
pub struct MemorySink {
    out: Arc<Mutex<Vec<u8>>>,
    err: Arc<Mutex<Vec<u8>>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn out_string(&self) -> String {
        String::from_utf8_lossy(&self.out.lock()).into_owned()
    }

    pub fn err_string(&self) -> String {
        String::from_utf8_lossy(&self.err.lock()).into_owned()
    }

    pub fn clear(&self) {
        self.out.lock().clear();
        self.err.lock().clear();
    }
}

impl OutputSink for MemorySink {
    fn write_out(&mut self, buf: &[u8]) -> io::Result<()> {
        self.out.lock().extend_from_slice(buf);
        Ok(())
    }

    fn write_err(&mut self, buf: &[u8]) -> io::Result<()> {
        self.err.lock().extend_from_slice(buf);
        Ok(())
    }
}
