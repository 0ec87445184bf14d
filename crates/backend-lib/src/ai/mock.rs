// ============================
// backend-lib/src/ai/mock.rs
// ============================
//! Pre-programmed completion backend for deterministic tests without API
//! calls.
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use super::backend::CompletionBackend;
use crate::error::AppError;

/// One scripted reply.
pub enum MockReply {
    /// Return this text.
    Text(String),
    /// Return an error from the complete() call itself.
    Error(AppError),
    /// Wait a duration, then yield the inner reply.
    Delay(Duration, Box<MockReply>),
}

impl MockReply {
    /// Convenience: a plain text reply.
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text(text.into())
    }

    /// Convenience: wrap any reply with a delay.
    pub fn delayed(delay: Duration, inner: MockReply) -> Self {
        Self::Delay(delay, Box::new(inner))
    }
}

/// Backend that replays scripted replies in sequence.
pub struct MockBackend {
    replies: Mutex<VecDeque<MockReply>>,
    call_count: AtomicUsize,
}

impl MockBackend {
    pub fn new(replies: Vec<MockReply>) -> Self {
        Self {
            replies: Mutex::new(replies.into()),
            call_count: AtomicUsize::new(0),
        }
    }

    /// Single-reply shorthand.
    pub fn single(reply: MockReply) -> Self {
        Self::new(vec![reply])
    }

    pub fn call_count(&self) -> usize {
        self.call_count.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl CompletionBackend for MockBackend {
    fn name(&self) -> &'static str {
        "mock"
    }

    async fn complete(&self, _prompt: &str) -> Result<String, AppError> {
        let call = self.call_count.fetch_add(1, Ordering::Relaxed);
        let reply = { self.replies.lock().pop_front() };

        let Some(reply) = reply else {
            return Err(AppError::Backend(format!(
                "no reply configured for call {call}"
            )));
        };

        // unroll nested delays iteratively
        let mut current = reply;
        loop {
            match current {
                MockReply::Text(text) => return Ok(text),
                MockReply::Error(error) => return Err(error),
                MockReply::Delay(duration, inner) => {
                    tokio::time::sleep(duration).await;
                    current = *inner;
                }
            }
        }
    }
}
