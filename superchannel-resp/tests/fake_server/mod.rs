//! Minimal in-process Redis stand-in for integration tests.
//!
//! Speaks just enough RESP for the relay: PING, MULTI/EXEC, RPUSH, BLPOP,
//! DEL, SET, GET. Runs on its own thread with its own compio runtime, so tests and
//! relay workers can block freely.
//!
//! Fault injection happens at EXEC, after the whole transaction has been
//! received: `drop_next_execs` closes the connection without applying it,
//! `stall_next_execs` holds the reply long enough to trip client timeouts
//! and then hangs up, also without applying it. `slow_next_exec_replies`
//! applies the transaction and only then holds the reply, so the client
//! cannot tell the commit happened.

#![allow(dead_code)]

use bytes::{Bytes, BytesMut};
use compio::buf::BufResult;
use compio::io::{AsyncRead, AsyncWriteExt};
use compio::net::{TcpListener, TcpStream};
use futures_timer::Delay;
use hashbrown::HashMap;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::net::SocketAddr;
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use superchannel_resp::{encode_command, RespDecoder, RespValue};

#[derive(Default)]
struct State {
    lists: HashMap<String, VecDeque<Bytes>>,
    strings: HashMap<String, Bytes>,
    /// Command names in arrival order, uppercased
    commands: Vec<String>,
    drop_execs: usize,
    stall_execs: usize,
    slow_replies: usize,
    slow_reply_delay: Duration,
    execs_applied: usize,
    connections: usize,
}

pub struct FakeRedis {
    addr: SocketAddr,
    state: Arc<Mutex<State>>,
}

impl FakeRedis {
    pub fn start() -> Self {
        let state = Arc::new(Mutex::new(State::default()));
        let shared = Arc::clone(&state);
        let (addr_tx, addr_rx) = flume::bounded(1);

        thread::spawn(move || {
            compio::runtime::Runtime::new().unwrap().block_on(async move {
                let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
                addr_tx.send(listener.local_addr().unwrap()).unwrap();
                loop {
                    if let Ok((stream, _)) = listener.accept().await {
                        shared.lock().connections += 1;
                        compio::runtime::spawn(serve(stream, Arc::clone(&shared))).detach();
                    }
                }
            });
        });

        let addr = addr_rx.recv().unwrap();
        Self { addr, state }
    }

    pub fn address(&self) -> String {
        self.addr.to_string()
    }

    pub fn list(&self, key: &str) -> Vec<Bytes> {
        self.state
            .lock()
            .lists
            .get(key)
            .map(|l| l.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn seed(&self, key: &str, values: &[&'static str]) {
        self.state
            .lock()
            .lists
            .entry(key.to_string())
            .or_default()
            .extend(values.iter().map(|v| Bytes::from_static(v.as_bytes())));
    }

    pub fn commands(&self) -> Vec<String> {
        self.state.lock().commands.clone()
    }

    pub fn drop_next_execs(&self, n: usize) {
        self.state.lock().drop_execs = n;
    }

    pub fn stall_next_execs(&self, n: usize) {
        self.state.lock().stall_execs = n;
    }

    /// Apply the next `n` transactions, then wait `delay` before replying.
    pub fn slow_next_exec_replies(&self, n: usize, delay: Duration) {
        let mut s = self.state.lock();
        s.slow_replies = n;
        s.slow_reply_delay = delay;
    }

    pub fn string(&self, key: &str) -> Option<Bytes> {
        self.state.lock().strings.get(key).cloned()
    }

    pub fn execs_applied(&self) -> usize {
        self.state.lock().execs_applied
    }

    pub fn connections(&self) -> usize {
        self.state.lock().connections
    }
}

/// A server that answers every request with something that is not RESP.
pub fn start_garbage_server() -> String {
    let (addr_tx, addr_rx) = flume::bounded(1);
    thread::spawn(move || {
        compio::runtime::Runtime::new().unwrap().block_on(async move {
            let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
            addr_tx.send(listener.local_addr().unwrap()).unwrap();
            loop {
                if let Ok((mut stream, _)) = listener.accept().await {
                    let BufResult(_, _) = stream.read(Vec::with_capacity(1024)).await;
                    let _ = stream.write_all(b"HTTP/1.1 400 Bad Request\r\n\r\n".to_vec()).await;
                }
            }
        });
    });
    addr_rx.recv().unwrap().to_string()
}

enum Outcome {
    Reply(Vec<u8>),
    Hangup,
}

async fn serve(mut stream: TcpStream, state: Arc<Mutex<State>>) {
    let decoder = RespDecoder::new();
    let mut recv = BytesMut::new();
    let mut queued: Option<Vec<Vec<Bytes>>> = None;

    loop {
        let mut out = Vec::new();
        loop {
            let args = match decoder.decode(&mut recv) {
                Ok(Some(RespValue::Array(Some(items)))) => items
                    .into_iter()
                    .filter_map(|item| match item {
                        RespValue::Bulk(Some(b)) => Some(b),
                        _ => None,
                    })
                    .collect::<Vec<_>>(),
                Ok(None) => break,
                _ => return,
            };
            match handle(args, &mut queued, &state).await {
                Outcome::Reply(reply) => out.extend_from_slice(&reply),
                Outcome::Hangup => return,
            }
        }

        if !out.is_empty() {
            let BufResult(written, _) = stream.write_all(out).await;
            if written.is_err() {
                return;
            }
        }

        let BufResult(read, buf) = stream.read(Vec::with_capacity(4096)).await;
        match read {
            Ok(n) if n > 0 => recv.extend_from_slice(&buf),
            _ => return,
        }
    }
}

async fn handle(
    args: Vec<Bytes>,
    queued: &mut Option<Vec<Vec<Bytes>>>,
    state: &Mutex<State>,
) -> Outcome {
    let Some(name) = args.first().map(|n| String::from_utf8_lossy(n).to_uppercase()) else {
        return Outcome::Reply(b"-ERR empty command\r\n".to_vec());
    };
    state.lock().commands.push(name.clone());

    if let Some(tx) = queued.as_mut() {
        if name != "EXEC" && name != "MULTI" {
            tx.push(args);
            return Outcome::Reply(b"+QUEUED\r\n".to_vec());
        }
    }

    match name.as_str() {
        "PING" => Outcome::Reply(b"+PONG\r\n".to_vec()),
        "MULTI" => {
            *queued = Some(Vec::new());
            Outcome::Reply(b"+OK\r\n".to_vec())
        }
        "EXEC" => {
            let Some(tx) = queued.take() else {
                return Outcome::Reply(b"-ERR EXEC without MULTI\r\n".to_vec());
            };

            let stall = {
                let mut s = state.lock();
                if s.drop_execs > 0 {
                    s.drop_execs -= 1;
                    return Outcome::Hangup;
                }
                if s.stall_execs > 0 {
                    s.stall_execs -= 1;
                    true
                } else {
                    false
                }
            };
            if stall {
                Delay::new(Duration::from_secs(2)).await;
                return Outcome::Hangup;
            }

            let (reply, hold) = {
                let mut s = state.lock();
                let mut reply = format!("*{}\r\n", tx.len()).into_bytes();
                for cmd in &tx {
                    reply.extend_from_slice(&apply(&mut s, cmd));
                }
                s.execs_applied += 1;
                let hold = (s.slow_replies > 0).then_some(s.slow_reply_delay);
                s.slow_replies = s.slow_replies.saturating_sub(1);
                (reply, hold)
            };
            if let Some(delay) = hold {
                Delay::new(delay).await;
            }
            Outcome::Reply(reply)
        }
        "BLPOP" => {
            let Some(key) = args.get(1) else {
                return Outcome::Reply(b"-ERR wrong number of arguments\r\n".to_vec());
            };
            let key_str = String::from_utf8_lossy(key).into_owned();
            loop {
                let popped = state
                    .lock()
                    .lists
                    .get_mut(&key_str)
                    .and_then(VecDeque::pop_front);
                if let Some(value) = popped {
                    let mut reply = Vec::new();
                    encode_command(&[&key[..], &value[..]], &mut reply);
                    return Outcome::Reply(reply);
                }
                Delay::new(Duration::from_millis(5)).await;
            }
        }
        _ => {
            let mut s = state.lock();
            Outcome::Reply(apply(&mut s, &args))
        }
    }
}

fn apply(state: &mut State, args: &[Bytes]) -> Vec<u8> {
    let name = args
        .first()
        .map(|n| String::from_utf8_lossy(n).to_uppercase())
        .unwrap_or_default();
    match (name.as_str(), args.get(1)) {
        ("RPUSH", Some(key)) if args.len() > 2 => {
            let list = state
                .lists
                .entry(String::from_utf8_lossy(key).into_owned())
                .or_default();
            list.extend(args[2..].iter().cloned());
            format!(":{}\r\n", list.len()).into_bytes()
        }
        ("DEL", Some(key)) => {
            let key = String::from_utf8_lossy(key);
            let removed = state.lists.remove(&*key).is_some() | state.strings.remove(&*key).is_some();
            format!(":{}\r\n", usize::from(removed)).into_bytes()
        }
        ("SET", Some(key)) if args.len() == 3 => {
            state
                .strings
                .insert(String::from_utf8_lossy(key).into_owned(), args[2].clone());
            b"+OK\r\n".to_vec()
        }
        ("GET", Some(key)) => match state.strings.get(&*String::from_utf8_lossy(key)) {
            Some(value) => {
                let mut reply = format!("${}\r\n", value.len()).into_bytes();
                reply.extend_from_slice(value);
                reply.extend_from_slice(b"\r\n");
                reply
            }
            None => b"$-1\r\n".to_vec(),
        },
        _ => format!("-ERR unknown command '{name}'\r\n").into_bytes(),
    }
}
