//! Non-blocking TCP client connection to the controller.
//!
//! One receive attempt per call; a dropped or reset connection is logged and
//! retried on the next call. Requests are newline-framed and the receive
//! buffer persists across calls, so a burst of batches drains one per call.

use std::io::{self, Read, Write};
use std::net::TcpStream;

use tracing::{debug, info, warn};

const RECV_CHUNK_SIZE: usize = 2048;

pub struct CtlConnection {
    addr: String,
    stream: Option<TcpStream>,
    buf: Vec<u8>,
}

impl CtlConnection {
    pub fn new(addr: impl Into<String>) -> Self {
        Self {
            addr: addr.into(),
            stream: None,
            buf: Vec::new(),
        }
    }

    pub fn is_connected(&self) -> bool {
        self.stream.is_some()
    }

    fn ensure_connected(&mut self) -> bool {
        if self.stream.is_some() {
            return true;
        }
        match TcpStream::connect(&self.addr) {
            Ok(stream) => {
                if let Err(err) = stream.set_nonblocking(true) {
                    warn!("Failed to set controller socket non-blocking: {err}");
                    return false;
                }
                info!("Connected to controller at {}", self.addr);
                self.stream = Some(stream);
                true
            }
            Err(err) => {
                debug!("Controller {} not reachable: {err}", self.addr);
                false
            }
        }
    }

    /// One non-blocking receive attempt. `None` means nothing to do; the
    /// connection may or may not exist afterwards.
    pub fn poll_request(&mut self) -> Option<String> {
        if let Some(frame) = self.take_frame() {
            return Some(frame);
        }
        if !self.ensure_connected() {
            return None;
        }

        let stream = self.stream.as_mut()?;
        let mut chunk = [0u8; RECV_CHUNK_SIZE];
        match stream.read(&mut chunk) {
            Ok(0) => {
                info!("Controller closed the connection");
                self.stream = None;
                None
            }
            Ok(n) => {
                self.buf.extend_from_slice(&chunk[..n]);
                self.take_frame()
            }
            Err(err) if err.kind() == io::ErrorKind::WouldBlock => None,
            Err(err) => {
                warn!("Receive from controller failed: {err}");
                self.stream = None;
                None
            }
        }
    }

    /// Drain one complete request line from the front of the buffer.
    fn take_frame(&mut self) -> Option<String> {
        while let Some(pos) = self.buf.iter().position(|&byte| byte == b'\n') {
            let frame: Vec<u8> = self.buf.drain(..=pos).collect();
            let text = String::from_utf8_lossy(&frame[..pos]).trim().to_string();
            if !text.is_empty() {
                return Some(text);
            }
        }
        None
    }

    /// Send one newline-terminated response.
    pub fn send(&mut self, msg: &str) -> io::Result<()> {
        let stream = self
            .stream
            .as_mut()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotConnected, "no controller"))?;
        // Responses are small; a short blocking write keeps framing simple.
        stream.set_nonblocking(false)?;
        let result = stream
            .write_all(msg.as_bytes())
            .and_then(|_| stream.write_all(b"\n"))
            .and_then(|_| stream.flush());
        match result {
            Ok(()) => {
                stream.set_nonblocking(true)?;
                Ok(())
            }
            Err(err) => {
                self.stream = None;
                Err(err)
            }
        }
    }
}
