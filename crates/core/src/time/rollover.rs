use crate::time::clock::{Clock, Ticker};
use crate::time::reference::ReferenceTimezone;
use anyhow::Context;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RolloverEvent {
    pub previous_date: NaiveDate,
    pub new_date: NaiveDate,
    pub timezone: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct RolloverConfig {
    /// Poll interval while the reference time is within `midnight_window` of midnight.
    pub near_midnight_interval: Duration,
    /// Poll interval for the rest of the day.
    pub idle_interval: Duration,
    pub midnight_window: Duration,
}

impl Default for RolloverConfig {
    fn default() -> Self {
        Self {
            near_midnight_interval: Duration::from_secs(30),
            idle_interval: Duration::from_secs(5 * 60),
            midnight_window: Duration::from_secs(10 * 60),
        }
    }
}

impl RolloverConfig {
    pub fn from_env() -> Self {
        let mut out = Self::default();

        if let Some(n) = env_secs("ROLLOVER_NEAR_MIDNIGHT_INTERVAL_SECS") {
            out.near_midnight_interval = n;
        }
        if let Some(n) = env_secs("ROLLOVER_IDLE_INTERVAL_SECS") {
            out.idle_interval = n;
        }
        if let Some(n) = env_secs("ROLLOVER_MIDNIGHT_WINDOW_SECS") {
            out.midnight_window = n;
        }

        out
    }
}

fn env_secs(key: &str) -> Option<Duration> {
    std::env::var(key)
        .ok()
        .and_then(|s| s.trim().parse::<u64>().ok())
        .filter(|n| *n > 0)
        .map(Duration::from_secs)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetectorState {
    Idle,
    Checking,
}

/// Tracks the last-known reference date and reports when it changes.
#[derive(Debug, Clone)]
pub struct RolloverDetector {
    tz: ReferenceTimezone,
    config: RolloverConfig,
    last_known: Option<NaiveDate>,
    state: DetectorState,
}

impl RolloverDetector {
    pub fn new(tz: ReferenceTimezone, config: RolloverConfig) -> Self {
        Self {
            tz,
            config,
            last_known: None,
            state: DetectorState::Idle,
        }
    }

    pub fn last_known_date(&self) -> Option<NaiveDate> {
        self.last_known
    }

    pub fn state(&self) -> DetectorState {
        self.state
    }

    pub fn timezone(&self) -> &ReferenceTimezone {
        &self.tz
    }

    /// One detection pass. The first pass without a last-known date only primes it.
    pub fn check(&mut self, now: DateTime<Utc>) -> Option<RolloverEvent> {
        self.state = DetectorState::Checking;
        let today = self.tz.today(now);

        let event = match self.last_known {
            Some(previous) if previous != today => Some(RolloverEvent {
                previous_date: previous,
                new_date: today,
                timezone: self.tz.label().to_string(),
                timestamp: now,
            }),
            _ => None,
        };

        self.last_known = Some(today);
        self.state = DetectorState::Idle;
        event
    }

    pub fn next_interval(&self, now: DateTime<Utc>) -> Duration {
        let window = chrono::Duration::from_std(self.config.midnight_window)
            .unwrap_or_else(|_| chrono::Duration::zero());
        if self.tz.distance_to_midnight(now) <= window {
            self.config.near_midnight_interval
        } else {
            self.config.idle_interval
        }
    }
}

/// Receives day-change notifications. Subscribers are awaited in registration order before
/// the loop schedules its next check.
#[async_trait::async_trait]
pub trait RolloverSubscriber: Send + Sync {
    async fn on_rollover(&self, event: &RolloverEvent) -> anyhow::Result<()>;

    async fn on_tick(&self, _now: DateTime<Utc>) -> anyhow::Result<()> {
        Ok(())
    }
}

pub struct RolloverLoop {
    detector: RolloverDetector,
    clock: Arc<dyn Clock>,
    ticker: Arc<dyn Ticker>,
    subscribers: Vec<Arc<dyn RolloverSubscriber>>,
}

impl RolloverLoop {
    pub fn new(detector: RolloverDetector, clock: Arc<dyn Clock>, ticker: Arc<dyn Ticker>) -> Self {
        Self {
            detector,
            clock,
            ticker,
            subscribers: Vec::new(),
        }
    }

    pub fn subscribe(&mut self, subscriber: Arc<dyn RolloverSubscriber>) {
        self.subscribers.push(subscriber);
    }

    pub fn detector(&self) -> &RolloverDetector {
        &self.detector
    }

    /// Run one check, dispatch to subscribers, and return the delay until the next check.
    pub async fn step(&mut self) -> Duration {
        let now = self.clock.now();

        if let Some(event) = self.detector.check(now) {
            tracing::info!(
                previous_date = %event.previous_date,
                new_date = %event.new_date,
                timezone = %event.timezone,
                "reference date rolled over"
            );
            for subscriber in &self.subscribers {
                if let Err(err) = subscriber.on_rollover(&event).await {
                    tracing::error!(
                        new_date = %event.new_date,
                        error = %format!("{err:#}"),
                        "rollover subscriber failed"
                    );
                }
            }
        }

        for subscriber in &self.subscribers {
            if let Err(err) = subscriber.on_tick(now).await {
                tracing::warn!(error = %format!("{err:#}"), "rollover tick subscriber failed");
            }
        }

        let delay = self.detector.next_interval(now);
        tracing::trace!(delay_secs = delay.as_secs(), "next rollover check scheduled");
        delay
    }

    /// Run on a single task until the returned handle is cancelled or dropped.
    pub fn spawn(self) -> RolloverHandle {
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let join = tokio::spawn(self.run(shutdown_rx));
        RolloverHandle {
            shutdown: Some(shutdown_tx),
            join: Some(join),
        }
    }

    async fn run(mut self, mut shutdown: oneshot::Receiver<()>) {
        loop {
            let delay = self.step().await;
            let ticker = self.ticker.clone();
            tokio::select! {
                _ = &mut shutdown => break,
                _ = ticker.sleep(delay) => {}
            }
        }
        tracing::debug!("rollover loop stopped");
    }
}

pub struct RolloverHandle {
    shutdown: Option<oneshot::Sender<()>>,
    join: Option<JoinHandle<()>>,
}

impl RolloverHandle {
    pub fn is_finished(&self) -> bool {
        self.join.as_ref().map_or(true, |j| j.is_finished())
    }

    /// Stop the loop after the in-flight check (if any) and wait for it to exit.
    pub async fn cancel(mut self) -> anyhow::Result<()> {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        if let Some(join) = self.join.take() {
            join.await.context("rollover loop task failed")?;
        }
        Ok(())
    }
}

impl Drop for RolloverHandle {
    fn drop(&mut self) {
        if let Some(join) = self.join.take() {
            join.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::clock::{ManualClock, ManualTicker};
    use chrono::TimeZone;
    use tokio::sync::Mutex;

    fn detector() -> RolloverDetector {
        RolloverDetector::new(ReferenceTimezone::default(), RolloverConfig::default())
    }

    #[derive(Default)]
    struct Recorder {
        events: Mutex<Vec<RolloverEvent>>,
        ticks: Mutex<usize>,
    }

    #[async_trait::async_trait]
    impl RolloverSubscriber for Recorder {
        async fn on_rollover(&self, event: &RolloverEvent) -> anyhow::Result<()> {
            self.events.lock().await.push(event.clone());
            Ok(())
        }

        async fn on_tick(&self, _now: DateTime<Utc>) -> anyhow::Result<()> {
            *self.ticks.lock().await += 1;
            Ok(())
        }
    }

    #[test]
    fn first_check_primes_without_event() {
        let mut d = detector();
        let now = Utc.with_ymd_and_hms(2026, 4, 1, 15, 0, 0).unwrap();
        assert!(d.check(now).is_none());
        assert_eq!(
            d.last_known_date(),
            Some(NaiveDate::from_ymd_opt(2026, 4, 1).unwrap())
        );
        assert_eq!(d.state(), DetectorState::Idle);
    }

    #[test]
    fn utc_midnight_is_not_a_rollover() {
        let mut d = detector();
        d.check(Utc.with_ymd_and_hms(2026, 4, 1, 23, 50, 0).unwrap());
        // 00:10 UTC is still 21:10 on April 1st in UTC-3.
        assert!(d.check(Utc.with_ymd_and_hms(2026, 4, 2, 0, 10, 0).unwrap()).is_none());
    }

    #[test]
    fn one_transition_emits_exactly_one_event() {
        let mut d = detector();
        let start = Utc.with_ymd_and_hms(2026, 4, 2, 2, 50, 0).unwrap();
        let mut events = Vec::new();
        for i in 0..60 {
            let now = start + chrono::Duration::seconds(30 * i);
            events.extend(d.check(now));
        }
        assert_eq!(events.len(), 1);
        let e = &events[0];
        assert_eq!(e.previous_date, NaiveDate::from_ymd_opt(2026, 4, 1).unwrap());
        assert_eq!(e.new_date, NaiveDate::from_ymd_opt(2026, 4, 2).unwrap());
        assert_eq!(e.timezone, "America/Sao_Paulo");
    }

    #[test]
    fn interval_shrinks_near_reference_midnight() {
        let d = detector();
        let cfg = RolloverConfig::default();
        // 02:55 UTC = 23:55 local.
        let near = Utc.with_ymd_and_hms(2026, 4, 2, 2, 55, 0).unwrap();
        let after = Utc.with_ymd_and_hms(2026, 4, 2, 3, 4, 0).unwrap();
        let midday = Utc.with_ymd_and_hms(2026, 4, 2, 15, 0, 0).unwrap();
        assert_eq!(d.next_interval(near), cfg.near_midnight_interval);
        assert_eq!(d.next_interval(after), cfg.near_midnight_interval);
        assert_eq!(d.next_interval(midday), cfg.idle_interval);
    }

    #[tokio::test]
    async fn loop_driven_by_manual_clock_dispatches_once() {
        // 22:00 local on April 1st.
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2026, 4, 2, 1, 0, 0).unwrap(),
        ));
        let ticker = Arc::new(ManualTicker::new(clock.clone()));
        let recorder = Arc::new(Recorder::default());

        let mut rollover = RolloverLoop::new(detector(), clock.clone(), ticker.clone());
        rollover.subscribe(recorder.clone());

        // Run ~4 hours of simulated checks across local midnight.
        let mut steps = 0;
        while clock.now() < Utc.with_ymd_and_hms(2026, 4, 2, 5, 0, 0).unwrap() {
            let delay = rollover.step().await;
            ticker.sleep(delay).await;
            steps += 1;
        }

        let events = recorder.events.lock().await;
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].new_date, NaiveDate::from_ymd_opt(2026, 4, 2).unwrap());
        assert_eq!(*recorder.ticks.lock().await, steps);
        // The fast interval kicked in around midnight, so there were more steps than the
        // 48 a fixed 5 minute cadence would need.
        assert!(steps > 48);
    }

    #[tokio::test]
    async fn spawned_loop_stops_on_cancel() {
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2026, 4, 1, 12, 0, 0).unwrap(),
        ));
        let rollover = RolloverLoop::new(
            detector(),
            clock.clone(),
            Arc::new(ManualTicker::new(clock.clone())),
        );

        let handle = rollover.spawn();
        tokio::task::yield_now().await;
        handle.cancel().await.unwrap();
    }
}
