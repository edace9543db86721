// src/scheduler.rs
//! Timer + on-demand triggers. Every run executes on its own tokio task, so a
//! caller (command handler, HTTP request, timer tick) only pays for a spawn.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};

use crate::engine::{Orchestrator, RunReport, Trigger};
use crate::history::RunHistory;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SchedulerState {
    Idle,
    Running,
}

/// Decrements the in-flight counter when the run task ends (panics included).
struct InFlight(Arc<AtomicUsize>);

impl Drop for InFlight {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[derive(Clone)]
pub struct Scheduler {
    orchestrator: Arc<Orchestrator>,
    history: Arc<RunHistory>,
    in_flight: Arc<AtomicUsize>,
}

impl Scheduler {
    pub fn new(orchestrator: Arc<Orchestrator>, history: Arc<RunHistory>) -> Self {
        Self {
            orchestrator,
            history,
            in_flight: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn history(&self) -> &Arc<RunHistory> {
        &self.history
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    pub fn state(&self) -> SchedulerState {
        if self.in_flight() > 0 {
            SchedulerState::Running
        } else {
            SchedulerState::Idle
        }
    }

    /// Start a manual run and return immediately; await the handle for the report.
    pub fn run_now(&self, target: impl Into<String>) -> JoinHandle<RunReport> {
        self.spawn_run(target.into(), Trigger::Manual)
    }

    /// Fire-and-forget variant: a panicking run is logged, never propagated.
    pub fn trigger(&self, target: impl Into<String>, trigger: Trigger) {
        let handle = self.spawn_run(target.into(), trigger);
        tokio::spawn(async move {
            if let Err(e) = handle.await {
                tracing::error!(%trigger, error = %e, "run task aborted");
            }
        });
    }

    fn spawn_run(&self, target: String, trigger: Trigger) -> JoinHandle<RunReport> {
        self.in_flight.fetch_add(1, Ordering::SeqCst);
        let guard = InFlight(self.in_flight.clone());
        let orchestrator = self.orchestrator.clone();
        let history = self.history.clone();
        tokio::spawn(async move {
            let _guard = guard;
            let report = orchestrator.run_with(&target, trigger).await;
            history.push(&report);
            report
        })
    }

    /// Fire a run for `target` every `period`, first tick one period after start.
    /// Ticks never wait for earlier runs to finish. The timer stops when the
    /// returned guard is dropped.
    pub fn spawn_timer(&self, period: Duration, target: String) -> TimerGuard {
        let this = self.clone();
        TimerGuard(tokio::spawn(async move {
            let mut ticker = time::interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            tracing::info!(period_secs = period.as_secs(), chat = %target, "timer started");
            loop {
                ticker.tick().await;
                tracing::info!(in_flight = this.in_flight(), "timer tick");
                this.trigger(target.clone(), Trigger::Timer);
            }
        }))
    }
}

/// Owns the timer task and aborts it on drop, so an early return from the
/// service loop cannot leave a detached timer behind.
#[derive(Debug)]
pub struct TimerGuard(JoinHandle<()>);

impl Drop for TimerGuard {
    fn drop(&mut self) {
        self.0.abort();
    }
}
