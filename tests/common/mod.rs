//! In-process fake Postgres backend
//!
//! Speaks just enough of protocol v3 for startup and simple query, with a
//! scripted behavior per test, and counts accepted and finished sockets so
//! tests can check that nothing leaks.

#![allow(dead_code)]

use bytes::{BufMut, BytesMut};
use pg_provider::ConnectionConfig;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;

pub const VERSION: &str =
    "PostgreSQL 16.2 (Debian 16.2-1.pgdg120+2) on x86_64-pc-linux-gnu, compiled by gcc 12.2.0, 64-bit";

/// What the backend does once a client connects
#[derive(Debug, Clone)]
pub enum Script {
    /// Authenticate and answer every query with one row holding `VERSION`
    Healthy,
    /// Authenticate and answer every query with these rows
    Rows(Vec<Vec<Option<&'static str>>>),
    /// Authenticate and answer every query with an error
    QueryError {
        code: &'static str,
        message: &'static str,
    },
    /// Reject the session right after the startup message
    RejectStartup {
        code: &'static str,
        message: &'static str,
    },
    /// Read the startup message and never answer
    Silent,
    /// Authenticate, then never answer a query
    StallQuery,
    /// Answer the startup message with a frame no Postgres server sends
    Garbage,
    /// Close the socket right after the startup message
    Hangup,
}

pub struct FakeBackend {
    addr: SocketAddr,
    accepted: Arc<AtomicUsize>,
    finished: Arc<AtomicUsize>,
    startups: Arc<Mutex<Vec<HashMap<String, String>>>>,
    queries: Arc<Mutex<Vec<String>>>,
    task: JoinHandle<()>,
}

impl FakeBackend {
    pub async fn start(script: Script) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let addr = listener.local_addr().expect("local addr");
        let accepted = Arc::new(AtomicUsize::new(0));
        let finished = Arc::new(AtomicUsize::new(0));
        let startups = Arc::new(Mutex::new(Vec::new()));
        let queries = Arc::new(Mutex::new(Vec::new()));

        let task = {
            let accepted = Arc::clone(&accepted);
            let finished = Arc::clone(&finished);
            let startups = Arc::clone(&startups);
            let queries = Arc::clone(&queries);
            tokio::spawn(async move {
                loop {
                    let Ok((socket, _)) = listener.accept().await else {
                        return;
                    };
                    accepted.fetch_add(1, Ordering::SeqCst);
                    let finished = Arc::clone(&finished);
                    let startups = Arc::clone(&startups);
                    let queries = Arc::clone(&queries);
                    let script = script.clone();
                    tokio::spawn(async move {
                        serve(socket, script, startups, queries).await;
                        finished.fetch_add(1, Ordering::SeqCst);
                    });
                }
            })
        };

        Self {
            addr,
            accepted,
            finished,
            startups,
            queries,
            task,
        }
    }

    pub fn port(&self) -> u16 {
        self.addr.port()
    }

    /// alice / secret against this backend, database `app`
    pub fn config(&self) -> ConnectionConfig {
        ConnectionConfig::new("alice", "secret", "127.0.0.1", self.port(), "app").expect("config")
    }

    pub fn accepted(&self) -> usize {
        self.accepted.load(Ordering::SeqCst)
    }

    /// Sockets whose session has ended on the backend side
    pub fn finished(&self) -> usize {
        self.finished.load(Ordering::SeqCst)
    }

    /// Startup parameters of every session so far
    pub fn startups(&self) -> Vec<HashMap<String, String>> {
        self.startups.lock().expect("startups lock").clone()
    }

    /// Text of every simple query received so far, in arrival order
    pub fn queries(&self) -> Vec<String> {
        self.queries.lock().expect("queries lock").clone()
    }

    /// Wait until `n` sessions have ended on the backend side
    pub async fn wait_finished(&self, n: usize, within: Duration) -> bool {
        wait_until(within, || self.finished() >= n).await
    }
}

impl Drop for FakeBackend {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// A loopback port with nothing listening on it
pub async fn refused_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let port = listener.local_addr().expect("local addr").port();
    drop(listener);
    port
}

/// Poll `condition` until it holds or `within` elapses
pub async fn wait_until(within: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + within;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    condition()
}

async fn serve(
    mut socket: TcpStream,
    script: Script,
    startups: Arc<Mutex<Vec<HashMap<String, String>>>>,
    queries: Arc<Mutex<Vec<String>>>,
) {
    let Some(params) = read_startup(&mut socket).await else {
        return;
    };
    startups.lock().expect("startups lock").push(params);

    match &script {
        Script::Silent => {
            drain(&mut socket).await;
            return;
        }
        Script::Hangup => return,
        Script::Garbage => {
            let _ = socket.write_all(&frame(b'!', b"not postgres")).await;
            drain(&mut socket).await;
            return;
        }
        Script::RejectStartup { code, message } => {
            let _ = socket
                .write_all(&error_response("FATAL", code, message))
                .await;
            return;
        }
        _ => {}
    }

    let mut out = BytesMut::new();
    out.extend_from_slice(&authentication_ok());
    out.extend_from_slice(&parameter_status("server_version", "16.2"));
    out.extend_from_slice(&parameter_status("client_encoding", "UTF8"));
    out.extend_from_slice(&backend_key_data(4242, 1717));
    out.extend_from_slice(&ready_for_query());
    if socket.write_all(&out).await.is_err() {
        return;
    }

    while let Some((tag, body)) = read_message(&mut socket).await {
        match tag {
            b'Q' => {
                // Query text is NUL-terminated
                let text = body.strip_suffix(&[0]).unwrap_or(&body[..]);
                queries
                    .lock()
                    .expect("queries lock")
                    .push(String::from_utf8_lossy(text).into_owned());
                let reply = match &script {
                    Script::Healthy => query_reply(&[vec![Some(VERSION)]]),
                    Script::Rows(rows) => query_reply(rows),
                    Script::QueryError { code, message } => {
                        let mut out = error_response("ERROR", code, message);
                        out.extend_from_slice(&ready_for_query());
                        out
                    }
                    Script::StallQuery => continue,
                    _ => unreachable!("handled before startup completes"),
                };
                if socket.write_all(&reply).await.is_err() {
                    return;
                }
            }
            // Terminate: the client closes its side next
            b'X' => {
                drain(&mut socket).await;
                return;
            }
            _ => {}
        }
    }
}

async fn read_startup(socket: &mut TcpStream) -> Option<HashMap<String, String>> {
    let len = socket.read_i32().await.ok()?;
    let mut body = vec![0u8; (len as usize).checked_sub(4)?];
    socket.read_exact(&mut body).await.ok()?;

    // Protocol version, then key\0value\0 pairs, then \0
    let mut fields = body[4..]
        .split(|b| *b == 0)
        .map(|s| String::from_utf8_lossy(s).into_owned());
    let mut params = HashMap::new();
    while let (Some(key), Some(value)) = (fields.next(), fields.next()) {
        if key.is_empty() {
            break;
        }
        params.insert(key, value);
    }
    Some(params)
}

async fn read_message(socket: &mut TcpStream) -> Option<(u8, Vec<u8>)> {
    let tag = socket.read_u8().await.ok()?;
    let len = socket.read_i32().await.ok()?;
    let mut body = vec![0u8; (len as usize).checked_sub(4)?];
    socket.read_exact(&mut body).await.ok()?;
    Some((tag, body))
}

/// Read until the client closes its side
async fn drain(socket: &mut TcpStream) {
    let mut buf = [0u8; 1024];
    loop {
        match socket.read(&mut buf).await {
            Ok(0) | Err(_) => return,
            Ok(_) => {}
        }
    }
}

fn frame(tag: u8, body: &[u8]) -> BytesMut {
    let mut buf = BytesMut::with_capacity(body.len() + 5);
    buf.put_u8(tag);
    buf.put_i32(body.len() as i32 + 4);
    buf.put_slice(body);
    buf
}

fn put_cstr(buf: &mut BytesMut, s: &str) {
    buf.put_slice(s.as_bytes());
    buf.put_u8(0);
}

fn authentication_ok() -> BytesMut {
    frame(b'R', &0i32.to_be_bytes())
}

fn parameter_status(name: &str, value: &str) -> BytesMut {
    let mut body = BytesMut::new();
    put_cstr(&mut body, name);
    put_cstr(&mut body, value);
    frame(b'S', &body)
}

fn backend_key_data(process_id: i32, secret_key: i32) -> BytesMut {
    let mut body = BytesMut::new();
    body.put_i32(process_id);
    body.put_i32(secret_key);
    frame(b'K', &body)
}

fn ready_for_query() -> BytesMut {
    frame(b'Z', b"I")
}

fn error_response(severity: &str, code: &str, message: &str) -> BytesMut {
    let mut body = BytesMut::new();
    body.put_u8(b'S');
    put_cstr(&mut body, severity);
    body.put_u8(b'V');
    put_cstr(&mut body, severity);
    body.put_u8(b'C');
    put_cstr(&mut body, code);
    body.put_u8(b'M');
    put_cstr(&mut body, message);
    body.put_u8(0);
    frame(b'E', &body)
}

/// RowDescription, DataRows, CommandComplete, ReadyForQuery
fn query_reply(rows: &[Vec<Option<&str>>]) -> BytesMut {
    let columns = rows.first().map_or(1, Vec::len);

    let mut desc = BytesMut::new();
    desc.put_i16(columns as i16);
    for i in 0..columns {
        put_cstr(&mut desc, if i == 0 { "version" } else { "extra" });
        desc.put_i32(0); // table oid
        desc.put_i16(0); // column attribute number
        desc.put_i32(25); // text
        desc.put_i16(-1); // variable length
        desc.put_i32(-1); // no type modifier
        desc.put_i16(0); // text format
    }

    let mut out = frame(b'T', &desc);
    for row in rows {
        let mut data = BytesMut::new();
        data.put_i16(row.len() as i16);
        for value in row {
            match value {
                Some(v) => {
                    data.put_i32(v.len() as i32);
                    data.put_slice(v.as_bytes());
                }
                None => data.put_i32(-1),
            }
        }
        out.extend_from_slice(&frame(b'D', &data));
    }

    let mut complete = BytesMut::new();
    put_cstr(&mut complete, &format!("SELECT {}", rows.len()));
    out.extend_from_slice(&frame(b'C', &complete));
    out.extend_from_slice(&ready_for_query());
    out
}
