pub mod gemini;
pub mod prompt;

use crate::error::Result;
use crate::types::summary::RawAnalysis;
use async_trait::async_trait;
use std::fmt;

/// Text-in, text-out analysis service. No output schema is assumed.
#[async_trait]
pub trait Oracle: Send + Sync {
    async fn analyze(&self, corpus_text: &str) -> Result<RawAnalysis>;
}

/// Credential wrapper that never prints its value.
#[derive(Clone, PartialEq, Eq)]
pub struct Secret(String);

impl Secret {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Secret(***)")
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use crate::error::CheckerError;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    pub enum Reply {
        Text(&'static str),
        Fail,
        Hang,
    }

    /// Canned oracle that records every corpus it receives.
    pub struct StubOracle {
        reply: Reply,
        pub seen: Mutex<Vec<String>>,
        pub calls: AtomicUsize,
    }

    impl StubOracle {
        pub fn new(reply: Reply) -> Arc<Self> {
            Arc::new(Self {
                reply,
                seen: Mutex::new(Vec::new()),
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl Oracle for StubOracle {
        async fn analyze(&self, corpus_text: &str) -> Result<RawAnalysis> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.seen
                .lock()
                .expect("lock should not be poisoned")
                .push(corpus_text.to_string());
            match self.reply {
                Reply::Text(text) => Ok(RawAnalysis {
                    text: text.to_string(),
                }),
                Reply::Fail => Err(CheckerError::Oracle("service unavailable".to_string())),
                Reply::Hang => std::future::pending::<Result<RawAnalysis>>().await,
            }
        }
    }
}
