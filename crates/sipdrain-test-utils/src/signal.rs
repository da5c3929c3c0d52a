use std::sync::Mutex;
use std::sync::atomic::{AtomicU32, Ordering};

use async_trait::async_trait;

use sipdrain_signal::{
    DeregistrationMessage, DrainStartRequest, MediaChannel, RoutingChannel, SignalError,
    SignalResult,
};

/// How many leading attempts fail before the channel starts succeeding.
#[derive(Debug, Clone, Copy)]
enum Script {
    FailFirst(u32),
    FailAlways,
}

impl Script {
    fn fails(&self, attempt: u32) -> bool {
        match self {
            Script::FailFirst(n) => attempt <= *n,
            Script::FailAlways => true,
        }
    }
}

/// Routing channel that records every attempt.
pub struct ScriptedRouting {
    script: Script,
    attempts: AtomicU32,
    sent: Mutex<Vec<DeregistrationMessage>>,
}

impl ScriptedRouting {
    pub fn accepting() -> Self {
        Self::failing_first(0)
    }

    pub fn failing_first(n: u32) -> Self {
        Self {
            script: Script::FailFirst(n),
            attempts: AtomicU32::new(0),
            sent: Mutex::new(Vec::new()),
        }
    }

    pub fn failing() -> Self {
        Self {
            script: Script::FailAlways,
            ..Self::accepting()
        }
    }

    pub fn attempts(&self) -> u32 {
        self.attempts.load(Ordering::SeqCst)
    }

    /// Messages from every attempt, including failed ones.
    pub fn sent(&self) -> Vec<DeregistrationMessage> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl RoutingChannel for ScriptedRouting {
    async fn send(&self, message: &DeregistrationMessage) -> SignalResult<()> {
        let attempt = self.attempts.fetch_add(1, Ordering::SeqCst) + 1;
        self.sent.lock().unwrap().push(message.clone());
        if self.script.fails(attempt) {
            Err(SignalError::Status(503))
        } else {
            Ok(())
        }
    }
}

/// Media channel that records every attempt with its target address.
pub struct ScriptedMedia {
    script: Script,
    attempts: AtomicU32,
    requests: Mutex<Vec<(String, DrainStartRequest)>>,
}

impl ScriptedMedia {
    pub fn accepting() -> Self {
        Self::failing_first(0)
    }

    pub fn failing_first(n: u32) -> Self {
        Self {
            script: Script::FailFirst(n),
            attempts: AtomicU32::new(0),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn failing() -> Self {
        Self {
            script: Script::FailAlways,
            ..Self::accepting()
        }
    }

    pub fn attempts(&self) -> u32 {
        self.attempts.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> Vec<(String, DrainStartRequest)> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl MediaChannel for ScriptedMedia {
    async fn start_drain(&self, address: &str, request: &DrainStartRequest) -> SignalResult<()> {
        let attempt = self.attempts.fetch_add(1, Ordering::SeqCst) + 1;
        self.requests
            .lock()
            .unwrap()
            .push((address.to_string(), request.clone()));
        if self.script.fails(attempt) {
            Err(SignalError::Status(500))
        } else {
            Ok(())
        }
    }
}
