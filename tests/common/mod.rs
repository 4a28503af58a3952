//! Shared helpers: a blocking fake master and a recording handler

#![allow(dead_code)]

use std::io::{self, Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use dlogger::dispatch::{DispatchStatus, EventHandler, Received};
use dlogger::protocol::{encode_frame, Frame};
use dlogger::{Event, TransportError};

/// Bind a listener on an ephemeral localhost port
pub fn listener() -> (TcpListener, u16) {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    (listener, port)
}

/// Accept one agent and return its stream and the identity it registered with
pub fn accept_agent(listener: &TcpListener) -> (TcpStream, String) {
    let (mut stream, _) = listener.accept().unwrap();
    stream.set_read_timeout(Some(Duration::from_secs(5))).unwrap();
    match read_frame(&mut stream).unwrap() {
        Frame::Register { identity } => (stream, identity),
        other => panic!("expected registration, got {:?}", other),
    }
}

pub fn read_frame(stream: &mut TcpStream) -> io::Result<Frame> {
    let mut len = [0u8; 4];
    stream.read_exact(&mut len)?;
    let mut body = vec![0u8; u32::from_be_bytes(len) as usize];
    stream.read_exact(&mut body)?;
    rmp_serde::from_slice(&body).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
}

pub fn send_event(stream: &mut TcpStream, event: Event) {
    stream.write_all(&encode_frame(&Frame::Event(event)).unwrap()).unwrap();
}

/// One call into a handler
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Event(Event),
    Error(TransportError),
}

pub type Calls = Arc<Mutex<Vec<Call>>>;

/// Handler that records every call
#[derive(Default)]
pub struct RecordingHandler {
    pub calls: Calls,
}

impl EventHandler for RecordingHandler {
    fn handle(&mut self, received: Received<'_>, _response: &mut Option<Event>) -> DispatchStatus {
        let call = match received {
            Ok(event) => Call::Event(event.clone()),
            Err(err) => Call::Error(err.clone()),
        };
        self.calls.lock().unwrap().push(call);
        DispatchStatus::Handled
    }
}

/// Poll `cond` until it holds or `timeout` passes
pub fn wait_until(timeout: Duration, mut cond: impl FnMut() -> bool) -> bool {
    let deadline = std::time::Instant::now() + timeout;
    while std::time::Instant::now() < deadline {
        if cond() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(10));
    }
    cond()
}
