//! TCP transport
//!
//! Each connection gets a dedicated `event-rx` thread running a
//! current-thread tokio runtime. Connecting and registering happen on that
//! thread; the outcome is reported back before `connect` returns.

use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tokio::net::TcpStream;
use tokio::sync::{oneshot, Notify};

use super::{Connection, InitError, Transport};
use crate::config::{AgentConfig, MasterEndpoint};
use crate::dispatch::EventHandler;
use crate::events::{Event, TransportError};
use crate::protocol::{self, Frame, ProtocolError};

/// Transport speaking the length-prefixed frame protocol over TCP
#[derive(Debug, Clone)]
pub struct TcpTransport {
    endpoint: MasterEndpoint,
    identity: String,
    connect_timeout: Duration,
}

impl TcpTransport {
    pub fn new(endpoint: MasterEndpoint, identity: impl Into<String>, connect_timeout: Duration) -> Self {
        Self {
            endpoint,
            identity: identity.into(),
            connect_timeout,
        }
    }

    pub fn from_config(config: &AgentConfig) -> Self {
        Self::new(
            config.master.clone(),
            config.identity.clone(),
            config.connect_timeout,
        )
    }

    /// Connect to the master and send the registration frame
    async fn open(&self) -> Result<TcpStream, InitError> {
        let addr = self.endpoint.to_string();
        let connect = TcpStream::connect((self.endpoint.host.as_str(), self.endpoint.port));

        let mut stream = match tokio::time::timeout(self.connect_timeout, connect).await {
            Ok(Ok(stream)) => stream,
            Ok(Err(source)) => return Err(InitError::Connect { addr, source }),
            Err(_) => {
                return Err(InitError::Timeout {
                    addr,
                    timeout: self.connect_timeout,
                })
            }
        };

        if let Err(e) = stream.set_nodelay(true) {
            log::debug!("{}: failed to set TCP_NODELAY: {}", addr, e);
        }

        let register = Frame::Register {
            identity: self.identity.clone(),
        };
        match tokio::time::timeout(self.connect_timeout, protocol::write_frame(&mut stream, &register)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => return Err(InitError::Register(e)),
            Err(_) => {
                return Err(InitError::Timeout {
                    addr,
                    timeout: self.connect_timeout,
                })
            }
        }

        log::info!("registered with master at {} as {}", addr, self.identity);
        Ok(stream)
    }
}

impl Transport for TcpTransport {
    fn connect(&self, handler: Box<dyn EventHandler>) -> Result<Box<dyn Connection>, InitError> {
        let (ready_tx, ready_rx) = oneshot::channel();
        let stop = Arc::new(Notify::new());
        let stop_rx = Arc::clone(&stop);
        let transport = self.clone();

        let thread = thread::Builder::new()
            .name("event-rx".into())
            .spawn(move || {
                let runtime = match tokio::runtime::Builder::new_current_thread()
                    .enable_all()
                    .build()
                {
                    Ok(rt) => rt,
                    Err(e) => {
                        let _ = ready_tx.send(Err(InitError::Runtime(e)));
                        return;
                    }
                };

                runtime.block_on(async move {
                    let stream = match transport.open().await {
                        Ok(stream) => stream,
                        Err(e) => {
                            let _ = ready_tx.send(Err(e));
                            return;
                        }
                    };
                    if ready_tx.send(Ok(())).is_err() {
                        return;
                    }
                    receive_loop(stream, handler, stop_rx).await;
                });
            })
            .map_err(InitError::Thread)?;

        let ready = ready_rx.blocking_recv();
        match ready {
            Ok(Ok(())) => Ok(Box::new(TcpConnection {
                stop,
                thread: Some(thread),
            })),
            Ok(Err(e)) => {
                let _ = thread.join();
                Err(e)
            }
            Err(_) => {
                let _ = thread.join();
                Err(InitError::ThreadExited)
            }
        }
    }
}

/// Handle to a running TCP connection
pub struct TcpConnection {
    stop: Arc<Notify>,
    thread: Option<JoinHandle<()>>,
}

impl Connection for TcpConnection {
    fn shutdown(&mut self) {
        let Some(thread) = self.thread.take() else {
            return;
        };

        // Stored as a permit if the loop is busy dispatching
        self.stop.notify_one();

        if thread.join().is_err() {
            log::error!("event receive thread panicked");
        } else {
            log::debug!("event receive thread stopped");
        }
    }
}

impl Drop for TcpConnection {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn read_error(err: &ProtocolError) -> TransportError {
    match err {
        ProtocolError::Io(e) => TransportError::io(e),
        ProtocolError::Decode(e) => TransportError::decode(e),
        ProtocolError::Encode(e) => TransportError::decode(e),
        ProtocolError::TooLarge(len) => TransportError::frame_too_large(*len),
    }
}

/// Receive frames until stopped or the connection ends
///
/// Dispatch runs between await points, so a stop request only takes effect
/// once the current dispatch call has returned. Reads and answer writes are
/// both raced against the stop request.
async fn receive_loop(stream: TcpStream, mut handler: Box<dyn EventHandler>, stop: Arc<Notify>) {
    let (mut reader, mut writer) = stream.into_split();

    loop {
        let frame = tokio::select! {
            _ = stop.notified() => {
                log::debug!("receive loop stopping");
                return;
            }
            frame = protocol::read_frame(&mut reader) => frame,
        };

        match frame {
            Ok(Some(Frame::Event(event))) => {
                let mut response: Option<Event> = None;
                let status = handler.handle(Ok(&event), &mut response);
                log::trace!("event {} dispatched with status {}", event.kind, status.code());

                if let Some(answer) = response {
                    let answer = Frame::Event(answer);
                    // A master that stops reading must not block shutdown
                    tokio::select! {
                        _ = stop.notified() => {
                            log::debug!("receive loop stopping with an unsent answer for event {}", event.kind);
                            return;
                        }
                        sent = protocol::write_frame(&mut writer, &answer) => {
                            if let Err(e) = sent {
                                log::warn!("failed to send answer for event {}: {}", event.kind, e);
                            }
                        }
                    }
                }
            }
            Ok(Some(other)) => {
                log::warn!("unexpected {} frame from master, ignoring", other.name());
            }
            Ok(None) => {
                handler.handle(Err(&TransportError::closed_by_peer()), &mut None);
                break;
            }
            Err(e) => {
                let err = read_error(&e);
                handler.handle(Err(&err), &mut None);
                if err.is_terminal() {
                    break;
                }
            }
        }
    }

    // No reconnection: hold the thread until shutdown is requested
    stop.notified().await;
    log::debug!("receive loop stopping after connection loss");
}
