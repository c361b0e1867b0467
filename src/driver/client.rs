//! Driver client
//!
//! Owns the bridge subprocess. Requests can be issued concurrently from any
//! session of the browser: a background reader task matches responses to
//! waiting requests by sequence number and forwards route events to the page
//! that registered the route.

use std::collections::HashMap;
use std::path::Path;
use std::process::Stdio;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::io::{AsyncRead, AsyncWrite, BufReader, BufWriter};
use tokio::process::{Child, Command};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::common::{Error, Result};

use super::codec;
use super::types::*;

type Pending = Arc<Mutex<HashMap<i64, oneshot::Sender<ResponseMessage>>>>;
type RouteSubscribers = Arc<Mutex<HashMap<String, mpsc::UnboundedSender<RouteEvent>>>>;
type DriverWriter = BufWriter<Box<dyn AsyncWrite + Send + Unpin>>;

/// Client for one driver process
pub struct DriverClient {
    /// Bridge subprocess, absent when connected to plain streams
    child: Mutex<Option<Child>>,
    /// Buffered writer for the bridge's input
    writer: tokio::sync::Mutex<DriverWriter>,
    /// Sequence number for requests
    seq: AtomicI64,
    /// Requests waiting for their response
    pending: Pending,
    /// Route event channels by page id
    routes: RouteSubscribers,
    /// Set once the reader has seen the stream end
    closed: Arc<AtomicBool>,
    /// Upper bound on any single request
    request_timeout: Duration,
    reader: JoinHandle<()>,
}

impl DriverClient {
    /// Spawn the bridge and start reading its output
    pub fn spawn(command: &Path, args: &[String], request_timeout: Duration) -> Result<Self> {
        let mut cmd = Command::new(command);
        cmd.args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true);

        let mut child = cmd.spawn().map_err(|e| {
            Error::DriverStartFailed(format!("Failed to start {}: {}", command.display(), e))
        })?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| Error::DriverStartFailed("Failed to get driver stdin".to_string()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| Error::DriverStartFailed("Failed to get driver stdout".to_string()))?;

        tracing::debug!(command = %command.display(), pid = ?child.id(), "Driver started");
        Ok(Self::connect(stdout, stdin, Some(child), request_timeout))
    }

    /// Speak the protocol over an already open pair of streams
    pub fn connect<R, W>(
        reader: R,
        writer: W,
        child: Option<Child>,
        request_timeout: Duration,
    ) -> Self
    where
        R: AsyncRead + Send + Unpin + 'static,
        W: AsyncWrite + Send + Unpin + 'static,
    {
        let pending: Pending = Arc::default();
        let routes: RouteSubscribers = Arc::default();
        let closed = Arc::new(AtomicBool::new(false));
        let reader = tokio::spawn(read_loop(
            BufReader::new(reader),
            pending.clone(),
            routes.clone(),
            closed.clone(),
        ));
        let writer: Box<dyn AsyncWrite + Send + Unpin> = Box::new(writer);

        Self {
            child: Mutex::new(child),
            writer: tokio::sync::Mutex::new(BufWriter::new(writer)),
            seq: AtomicI64::new(1),
            pending,
            routes,
            closed,
            request_timeout,
            reader,
        }
    }

    fn next_seq(&self) -> i64 {
        self.seq.fetch_add(1, Ordering::SeqCst)
    }

    fn lock_pending(&self) -> std::sync::MutexGuard<'_, HashMap<i64, oneshot::Sender<ResponseMessage>>> {
        self.pending.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Send a request and wait for its response body
    pub async fn request(&self, command: &str, arguments: Value) -> Result<Value> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(Error::DriverCrashed);
        }

        let seq = self.next_seq();
        let (tx, rx) = oneshot::channel();
        self.lock_pending().insert(seq, tx);

        let json = serde_json::to_string(&RequestMessage::new(seq, command, arguments))?;
        tracing::debug!("Driver >>> {}", json);
        {
            let mut writer = self.writer.lock().await;
            if let Err(e) = codec::write_message(&mut *writer, &json).await {
                self.lock_pending().remove(&seq);
                return Err(e);
            }
        }

        let response = match tokio::time::timeout(self.request_timeout, rx).await {
            Ok(Ok(response)) => response,
            Ok(Err(_)) => return Err(Error::DriverCrashed),
            Err(_) => {
                self.lock_pending().remove(&seq);
                return Err(Error::Timeout(self.request_timeout.as_millis() as u64));
            }
        };

        if response.success {
            Ok(response.body.unwrap_or(Value::Null))
        } else {
            Err(Error::driver_request_failed(
                command,
                response.message.as_deref().unwrap_or("Unknown error"),
            ))
        }
    }

    /// Send a request and deserialize its response body
    pub async fn request_as<T: DeserializeOwned>(&self, command: &str, arguments: Value) -> Result<T> {
        let body = self.request(command, arguments).await?;
        serde_json::from_value(body).map_err(|e| {
            Error::DriverProtocol(format!("Failed to parse {} response: {}", command, e))
        })
    }

    /// Start receiving route events for a page
    pub fn subscribe_routes(&self, page_id: &str) -> mpsc::UnboundedReceiver<RouteEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.routes
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(page_id.to_string(), tx);
        rx
    }

    /// Stop receiving route events for a page
    pub fn unsubscribe_routes(&self, page_id: &str) {
        self.routes
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(page_id);
    }

    /// Check if the driver is still running
    pub fn is_running(&self) -> bool {
        !self.closed.load(Ordering::SeqCst)
    }

    /// Kill the driver process
    pub async fn terminate(&self) {
        // Give a clean shutdown a moment before killing
        tokio::time::sleep(Duration::from_millis(100)).await;
        if let Some(child) = self.child.lock().unwrap_or_else(|e| e.into_inner()).as_mut() {
            let _ = child.start_kill();
        }
    }
}

impl Drop for DriverClient {
    fn drop(&mut self) {
        self.reader.abort();
        if let Ok(mut child) = self.child.lock() {
            if let Some(child) = child.as_mut() {
                let _ = child.start_kill();
            }
        }
    }
}

/// Route driver output until the stream ends
async fn read_loop<R: AsyncRead + Unpin>(
    mut reader: BufReader<R>,
    pending: Pending,
    routes: RouteSubscribers,
    closed: Arc<AtomicBool>,
) {
    loop {
        let json = match codec::read_message(&mut reader).await {
            Ok(json) => json,
            Err(e) => {
                tracing::debug!(error = %e, "Driver output closed");
                break;
            }
        };
        tracing::debug!("Driver <<< {}", json);

        let message: DriverMessage = match serde_json::from_str(&json) {
            Ok(m) => m,
            Err(e) => {
                tracing::warn!(error = %e, "Ignoring malformed driver message");
                continue;
            }
        };

        match message {
            DriverMessage::Response(response) => {
                let waiter = pending
                    .lock()
                    .unwrap_or_else(|e| e.into_inner())
                    .remove(&response.request_seq);
                match waiter {
                    Some(tx) => {
                        let _ = tx.send(response);
                    }
                    None => tracing::debug!(seq = response.request_seq, "Response without waiter"),
                }
            }
            DriverMessage::Event(event) => match Event::from_message(event) {
                Event::Route(route) => {
                    let subscribers = routes.lock().unwrap_or_else(|e| e.into_inner());
                    match subscribers.get(&route.page_id) {
                        Some(tx) => {
                            let _ = tx.send(route);
                        }
                        None => tracing::warn!(page = %route.page_id, "Route event for unknown page"),
                    }
                }
                Event::Closed { page_id } => {
                    tracing::debug!(page = ?page_id, "Driver closed a page");
                }
                Event::Unknown { event, .. } => {
                    tracing::debug!(event = %event, "Unhandled driver event");
                }
            },
        }
    }

    closed.store(true, Ordering::SeqCst);
    // Dropping the senders wakes every waiter with an error.
    pending.lock().unwrap_or_else(|e| e.into_inner()).clear();
    routes.lock().unwrap_or_else(|e| e.into_inner()).clear();
}
