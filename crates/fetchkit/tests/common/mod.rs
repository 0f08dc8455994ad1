//! Scripted transport shared by the integration tests.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::Mutex;

use fetchkit::{
    Headers, Method, ResolvedTimeouts, Transport, TransportError, TransportRequest,
    TransportResponse,
};

/// What a scripted transport saw for one attempt.
#[derive(Debug, Clone)]
pub struct Seen {
    pub method: Method,
    pub url: String,
    pub headers: Headers,
    pub body: Option<Vec<u8>>,
    pub timeouts: ResolvedTimeouts,
}

/// Replays a fixed sequence of results, one per attempt.
#[derive(Debug, Default)]
pub struct ScriptedTransport {
    replies: Mutex<VecDeque<Result<TransportResponse, TransportError>>>,
    seen: Mutex<Vec<Seen>>,
}

impl ScriptedTransport {
    pub fn new(replies: impl IntoIterator<Item = Result<TransportResponse, TransportError>>) -> Self {
        Self {
            replies: Mutex::new(replies.into_iter().collect()),
            seen: Mutex::new(Vec::new()),
        }
    }

    pub fn push(&self, reply: Result<TransportResponse, TransportError>) {
        self.replies.lock().unwrap().push_back(reply);
    }

    pub fn seen(&self) -> Vec<Seen> {
        self.seen.lock().unwrap().clone()
    }

    pub fn attempts(&self) -> usize {
        self.seen.lock().unwrap().len()
    }
}

impl Transport for ScriptedTransport {
    fn execute(&self, request: TransportRequest<'_>) -> Result<TransportResponse, TransportError> {
        self.seen.lock().unwrap().push(Seen {
            method: request.method,
            url: request.url.to_string(),
            headers: request.headers.clone(),
            body: request.body.map(|b| b.bytes.to_vec()),
            timeouts: request.timeouts,
        });
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(TransportError::Other("script exhausted".into())))
    }
}

pub fn headers(pairs: &[(&str, &str)]) -> Headers {
    pairs.iter().copied().collect()
}

pub fn reply(status: u16, pairs: &[(&str, &str)], body: &str) -> Result<TransportResponse, TransportError> {
    Ok(TransportResponse::new(status, headers(pairs), body.to_owned()))
}

pub fn timeout() -> Result<TransportResponse, TransportError> {
    Err(TransportError::Timeout)
}
