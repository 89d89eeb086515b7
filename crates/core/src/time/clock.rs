use chrono::{DateTime, Utc};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Clock that only moves when told to. Used to drive the rollover loop deterministically.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    pub fn set(&self, now: DateTime<Utc>) {
        *self.now.lock().unwrap_or_else(|e| e.into_inner()) = now;
    }

    pub fn advance(&self, by: chrono::Duration) {
        let mut guard = self.now.lock().unwrap_or_else(|e| e.into_inner());
        *guard += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Source of delays between rollover checks.
#[async_trait::async_trait]
pub trait Ticker: Send + Sync {
    async fn sleep(&self, delay: Duration);
}

#[derive(Debug, Clone, Copy, Default)]
pub struct TokioTicker;

#[async_trait::async_trait]
impl Ticker for TokioTicker {
    async fn sleep(&self, delay: Duration) {
        tokio::time::sleep(delay).await;
    }
}

/// Sleeping advances the paired [`ManualClock`] instead of waiting.
#[derive(Debug, Clone)]
pub struct ManualTicker {
    clock: Arc<ManualClock>,
}

impl ManualTicker {
    pub fn new(clock: Arc<ManualClock>) -> Self {
        Self { clock }
    }
}

#[async_trait::async_trait]
impl Ticker for ManualTicker {
    async fn sleep(&self, delay: Duration) {
        let by = chrono::Duration::from_std(delay).unwrap_or_else(|_| chrono::Duration::zero());
        self.clock.advance(by);
        tokio::task::yield_now().await;
    }
}
