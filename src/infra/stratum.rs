//! Line-delimited JSON-RPC (Stratum) client.
//!
//! Electrum servers speak newline-separated JSON over TCP: requests carry a
//! numeric id the server echoes back, and subscription pushes arrive as
//! messages without an id. A `StratumSocket` owns a reader and a writer task;
//! `call` correlates responses by id, pushes fan out on a broadcast channel.

use std::collections::HashMap;
use std::sync::{
    Arc, Mutex,
    atomic::{AtomicBool, AtomicU64, Ordering},
};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tokio::{
    io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader},
    net::TcpStream,
    sync::{broadcast, mpsc, oneshot},
    task::JoinHandle,
    time,
};
use tracing::{debug, info, warn};

/// Keep-alive period for idle connections.
const KEEP_ALIVE: Duration = Duration::from_secs(60);

/// Notification backlog before slow receivers start missing messages.
const NOTIFICATION_BUFFER: usize = 64;

#[derive(Debug, Error)]
pub enum StratumError {
    #[error("transport error: {0}")]
    Io(#[from] std::io::Error),
    #[error("malformed response: {0}")]
    Json(#[from] serde_json::Error),
    #[error("connection closed")]
    Closed,
}

/// A server push without a request id.
#[derive(Debug, Clone)]
pub struct Notification {
    pub method: String,
    pub params: Value,
}

#[derive(Serialize)]
struct Request<'a> {
    id: u64,
    method: &'a str,
    params: &'a [Value],
}

#[derive(Deserialize)]
struct Incoming {
    id: Option<u64>,
    method: Option<String>,
    params: Option<Value>,
    result: Option<Value>,
}

type Pending = Arc<Mutex<HashMap<u64, oneshot::Sender<Value>>>>;

pub struct StratumSocket {
    out_tx: mpsc::UnboundedSender<String>,
    pending: Pending,
    notifications: broadcast::Sender<Notification>,
    next_id: Arc<AtomicU64>,
    closed: Arc<AtomicBool>,
    tasks: Vec<JoinHandle<()>>,
}

impl StratumSocket {
    /// Connect to a Stratum server over TCP.
    pub async fn open(host: &str, port: u16) -> Result<Self, StratumError> {
        let stream = TcpStream::connect((host, port)).await?;
        info!("Connected to electrum server {}:{}", host, port);
        let (reader, writer) = stream.into_split();
        Ok(Self::new(reader, writer))
    }

    /// Build a socket over any transport delivering newline-separated JSON.
    pub fn new<R, W>(reader: R, writer: W) -> Self
    where
        R: AsyncRead + Unpin + Send + 'static,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let pending: Pending = Arc::new(Mutex::new(HashMap::new()));
        let closed = Arc::new(AtomicBool::new(false));
        let next_id = Arc::new(AtomicU64::new(0));
        let (notify_tx, _) = broadcast::channel(NOTIFICATION_BUFFER);
        let (out_tx, out_rx) = mpsc::unbounded_channel::<String>();

        let read_task = tokio::spawn(read_loop(
            reader,
            Arc::clone(&pending),
            Arc::clone(&closed),
            notify_tx.clone(),
        ));
        let write_task = tokio::spawn(write_loop(
            writer,
            out_rx,
            Arc::clone(&pending),
            Arc::clone(&closed),
        ));
        let keep_alive_task = tokio::spawn(keep_alive_loop(out_tx.clone(), Arc::clone(&next_id)));

        Self {
            out_tx,
            pending,
            notifications: notify_tx,
            next_id,
            closed,
            tasks: vec![read_task, write_task, keep_alive_task],
        }
    }

    /// Send a request and await its response.
    pub async fn call(&self, method: &str, params: &[Value]) -> Result<Value, StratumError> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let line = serde_json::to_string(&Request { id, method, params })?;

        let (tx, rx) = oneshot::channel();
        self.pending
            .lock()
            .expect("pending registry lock")
            .insert(id, tx);

        // Re-check after registering so a concurrent shutdown cannot strand
        // the waiter
        if self.closed.load(Ordering::SeqCst) {
            self.pending
                .lock()
                .expect("pending registry lock")
                .remove(&id);
            return Err(StratumError::Closed);
        }

        debug!("-> {}", line);
        if self.out_tx.send(line).is_err() {
            self.pending
                .lock()
                .expect("pending registry lock")
                .remove(&id);
            return Err(StratumError::Closed);
        }

        rx.await.map_err(|_| StratumError::Closed)
    }

    /// Subscribe to server pushes. Only messages arriving after this call
    /// are delivered.
    pub fn notifications(&self) -> broadcast::Receiver<Notification> {
        self.notifications.subscribe()
    }

    /// Whether the underlying transport has shut down.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

impl Drop for StratumSocket {
    fn drop(&mut self) {
        for task in &self.tasks {
            task.abort();
        }
    }
}

/// Mark the connection dead and fail every in-flight call.
fn shut_down(pending: &Pending, closed: &AtomicBool) {
    closed.store(true, Ordering::SeqCst);
    pending.lock().expect("pending registry lock").clear();
}

async fn read_loop<R>(
    reader: R,
    pending: Pending,
    closed: Arc<AtomicBool>,
    notifications: broadcast::Sender<Notification>,
) where
    R: AsyncRead + Unpin + Send + 'static,
{
    let mut lines = BufReader::new(reader).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => dispatch(&line, &pending, &notifications),
            Ok(None) => break,
            Err(e) => {
                warn!("Electrum connection read failed: {}", e);
                break;
            }
        }
    }
    debug!("Electrum connection closed");
    shut_down(&pending, &closed);
}

fn dispatch(line: &str, pending: &Pending, notifications: &broadcast::Sender<Notification>) {
    let incoming: Incoming = match serde_json::from_str(line) {
        Ok(incoming) => incoming,
        Err(e) => {
            warn!("Unparseable server message: {} ({})", line, e);
            return;
        }
    };

    match incoming.id {
        Some(id) => {
            let waiter = pending.lock().expect("pending registry lock").remove(&id);
            match waiter {
                Some(tx) => {
                    let _ = tx.send(incoming.result.unwrap_or(Value::Null));
                }
                // Keep-alive responses land here; nothing is waiting for them
                None => debug!("Dropping response with unknown id {}", id),
            }
        }
        None => {
            let Some(method) = incoming.method else {
                return;
            };
            debug!("<- notification {}", method);
            let _ = notifications.send(Notification {
                method,
                params: incoming.params.unwrap_or(Value::Null),
            });
        }
    }
}

async fn write_loop<W>(
    mut writer: W,
    mut out_rx: mpsc::UnboundedReceiver<String>,
    pending: Pending,
    closed: Arc<AtomicBool>,
) where
    W: AsyncWrite + Unpin + Send + 'static,
{
    while let Some(mut line) = out_rx.recv().await {
        line.push('\n');
        if let Err(e) = writer.write_all(line.as_bytes()).await {
            warn!("Electrum connection write failed: {}", e);
            break;
        }
    }
    shut_down(&pending, &closed);
}

async fn keep_alive_loop(out_tx: mpsc::UnboundedSender<String>, next_id: Arc<AtomicU64>) {
    let mut ticker = time::interval(KEEP_ALIVE);
    ticker.tick().await; // the first tick completes immediately
    loop {
        ticker.tick().await;
        let id = next_id.fetch_add(1, Ordering::SeqCst);
        let request = Request {
            id,
            method: "server.version",
            params: &[Value::from("2.9.2"), Value::from("0.10")],
        };
        let Ok(line) = serde_json::to_string(&request) else {
            continue;
        };
        debug!("-> keep-alive {}", line);
        if out_tx.send(line).is_err() {
            break;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, duplex, split};

    async fn respond(writer: &mut (impl AsyncWriteExt + Unpin), id: u64, result: &str) {
        let line = format!("{{\"id\":{},\"result\":{}}}\n", id, result);
        writer.write_all(line.as_bytes()).await.unwrap();
    }

    #[tokio::test]
    async fn call_resolves_with_matching_response() {
        let (client_io, server_io) = duplex(4096);
        let (r, w) = split(client_io);
        let socket = StratumSocket::new(r, w);
        let (sr, mut sw) = split(server_io);
        let mut server = BufReader::new(sr).lines();

        let params = [Value::from("2.9.2"), Value::from("0.10")];
        let (_, result) = tokio::join!(
            async {
                let line = server.next_line().await.unwrap().unwrap();
                let request: Value = serde_json::from_str(&line).unwrap();
                assert_eq!(request["method"], "server.version");
                assert_eq!(request["params"][0], "2.9.2");
                respond(&mut sw, request["id"].as_u64().unwrap(), "\"ElectrumX 1.4\"").await;
            },
            socket.call(
                "server.version",
                &params,
            )
        );

        assert_eq!(result.unwrap(), Value::from("ElectrumX 1.4"));
    }

    #[tokio::test]
    async fn out_of_order_responses_route_by_id() {
        let (client_io, server_io) = duplex(4096);
        let (r, w) = split(client_io);
        let socket = StratumSocket::new(r, w);
        let (sr, mut sw) = split(server_io);
        let mut server = BufReader::new(sr).lines();

        let (_, first, second) = tokio::join!(
            async {
                let line1 = server.next_line().await.unwrap().unwrap();
                let line2 = server.next_line().await.unwrap().unwrap();
                let request1: Value = serde_json::from_str(&line1).unwrap();
                let request2: Value = serde_json::from_str(&line2).unwrap();
                // Answer the second request before the first
                respond(&mut sw, request2["id"].as_u64().unwrap(), "2").await;
                respond(&mut sw, request1["id"].as_u64().unwrap(), "1").await;
            },
            socket.call("blockchain.numblocks.subscribe", &[]),
            socket.call("blockchain.numblocks.subscribe", &[])
        );

        assert_eq!(first.unwrap(), Value::from(1));
        assert_eq!(second.unwrap(), Value::from(2));
    }

    #[tokio::test]
    async fn notifications_fan_out() {
        let (client_io, server_io) = duplex(4096);
        let (r, w) = split(client_io);
        let socket = StratumSocket::new(r, w);
        let (_sr, mut sw) = split(server_io);

        let mut notifications = socket.notifications();
        // An unknown response id is dropped without disturbing anything
        sw.write_all(b"{\"id\":999,\"result\":\"stale\"}\n")
            .await
            .unwrap();
        sw.write_all(
            b"{\"id\":null,\"method\":\"blockchain.numblocks.subscribe\",\"params\":[123]}\n",
        )
        .await
        .unwrap();

        let notification = notifications.recv().await.unwrap();
        assert_eq!(notification.method, "blockchain.numblocks.subscribe");
        assert_eq!(notification.params, serde_json::json!([123]));
    }

    #[tokio::test]
    async fn closed_connection_fails_pending_calls() {
        let (client_io, server_io) = duplex(4096);
        let (r, w) = split(client_io);
        let socket = StratumSocket::new(r, w);
        drop(server_io);

        let err = socket.call("server.version", &[]).await.unwrap_err();
        assert!(matches!(err, StratumError::Closed));
        assert!(socket.is_closed());
    }

    #[tokio::test(start_paused = true)]
    async fn keep_alive_pings_periodically() {
        let (client_io, server_io) = duplex(4096);
        let (r, w) = split(client_io);
        let _socket = StratumSocket::new(r, w);
        let (sr, _sw) = split(server_io);
        let mut server = BufReader::new(sr).lines();

        time::advance(KEEP_ALIVE + Duration::from_secs(1)).await;

        let line = server.next_line().await.unwrap().unwrap();
        let request: Value = serde_json::from_str(&line).unwrap();
        assert_eq!(request["method"], "server.version");
    }
}
