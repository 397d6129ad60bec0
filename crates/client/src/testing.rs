//! Scripted transport shared by the supervisor and client tests.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::sync::atomic::{AtomicU32, Ordering};

use serde_json::Value;

use guildgate_rpc::{Method, RpcError};

use crate::transport::{Transport, TransportError};

#[derive(Debug, Clone)]
pub enum Probe {
    Ok,
    Closed,
    Hang,
    Fail,
}

/// Dials and probes follow their scripts, then succeed once a script runs dry.
#[derive(Default)]
pub struct FakeTransport {
    dials: Mutex<VecDeque<bool>>,
    probes: Mutex<VecDeque<Probe>>,
    replies: Mutex<HashMap<Method, Result<Value, TransportError>>>,
    dial_count: AtomicU32,
    close_count: AtomicU32,
}

impl FakeTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_dials(self, outcomes: impl IntoIterator<Item = bool>) -> Self {
        self.dials.lock().unwrap().extend(outcomes);
        self
    }

    pub fn with_probes(self, outcomes: impl IntoIterator<Item = Probe>) -> Self {
        self.probes.lock().unwrap().extend(outcomes);
        self
    }

    pub fn reply(&self, method: Method, reply: Result<Value, TransportError>) {
        self.replies.lock().unwrap().insert(method, reply);
    }

    pub fn dials(&self) -> u32 {
        self.dial_count.load(Ordering::SeqCst)
    }

    pub fn closes(&self) -> u32 {
        self.close_count.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl Transport for FakeTransport {
    /// Sequence number of the dial that produced the connection.
    type Conn = u32;

    async fn dial(&self) -> Result<u32, TransportError> {
        let n = self.dial_count.fetch_add(1, Ordering::SeqCst) + 1;
        let ok = self.dials.lock().unwrap().pop_front().unwrap_or(true);
        if ok {
            Ok(n)
        } else {
            Err(TransportError::Closed("connection refused".into()))
        }
    }

    async fn close(&self, _conn: &u32) -> Result<(), TransportError> {
        self.close_count.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn call(&self, _conn: &u32, method: Method, body: Value) -> Result<Value, TransportError> {
        if method != Method::Ping {
            return self
                .replies
                .lock()
                .unwrap()
                .get(&method)
                .cloned()
                .unwrap_or(Err(TransportError::Rpc(RpcError::Unimplemented(method))));
        }

        let next = self.probes.lock().unwrap().pop_front().unwrap_or(Probe::Ok);
        match next {
            Probe::Ok => Ok(body),
            Probe::Closed => Err(TransportError::Closed("peer went away".into())),
            Probe::Fail => Err(TransportError::Other("garbled reply".into())),
            Probe::Hang => std::future::pending().await,
        }
    }
}
