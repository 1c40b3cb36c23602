//! Debounced refinement checks
//!
//! Every input event bumps a per-field generation and schedules a check that
//! waits out the debounce window. A check whose generation was superseded while
//! it slept never runs its predicate, and the controller drops any verdict whose
//! generation is no longer current, so results can't be applied out of order.

use async_trait::async_trait;
use log::{trace, warn};
use std::{
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
    time::Duration,
};
use tokio_util::sync::CancellationToken;

use crate::form::Field;

/// Asynchronous predicate layered on top of the presence schema
#[async_trait]
pub trait Refinement: Send + Sync {
    async fn check(&self, value: &str) -> bool;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Verdict {
    pub field: Field,
    pub generation: u64,
    /// `None` when a newer input arrived before the window elapsed
    pub passed: Option<bool>,
}

pub struct Debouncer {
    field: Field,
    window: Duration,
    generation: Arc<AtomicU64>,
    refinement: Arc<dyn Refinement>,
}

impl Debouncer {
    pub fn new(field: Field, window: Duration, refinement: Arc<dyn Refinement>) -> Self {
        Self {
            field,
            window,
            generation: Arc::new(AtomicU64::new(0)),
            refinement,
        }
    }

    pub fn current(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    pub fn is_current(&self, generation: u64) -> bool {
        self.current() == generation
    }

    /// Supersede anything scheduled so far without starting a new check.
    pub fn invalidate(&self) -> u64 {
        self.generation.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Supersede earlier checks and schedule one for `value`. `report` is called
    /// exactly once with the verdict unless `cancel` fires first. A check that
    /// panics is reported as failed.
    pub fn schedule<F>(&self, value: String, cancel: CancellationToken, report: F) -> u64
    where
        F: FnOnce(Verdict) + Send + 'static,
    {
        let generation = self.invalidate();
        let latest = self.generation.clone();
        let refinement = self.refinement.clone();
        let window = self.window;
        let reporter = Reporter {
            field: self.field,
            generation,
            report: Some(report),
        };

        tokio::spawn(async move {
            tokio::select! {
                _ = cancel.cancelled() => {
                    reporter.disarm();
                    return;
                }
                _ = tokio::time::sleep(window) => {}
            }

            let passed = if latest.load(Ordering::SeqCst) == generation {
                Some(refinement.check(&value).await)
            } else {
                trace!(
                    "{} check {} superseded before it ran",
                    reporter.field,
                    generation
                );
                None
            };

            reporter.send(passed);
        });

        generation
    }
}

/// Delivers the verdict of one scheduled check. Dropped without sending (the
/// check panicked) it reports a failure so the owner is never left waiting.
struct Reporter<F: FnOnce(Verdict)> {
    field: Field,
    generation: u64,
    report: Option<F>,
}

impl<F: FnOnce(Verdict)> Reporter<F> {
    fn send(mut self, passed: Option<bool>) {
        if let Some(report) = self.report.take() {
            report(self.verdict(passed));
        }
    }

    fn disarm(mut self) {
        self.report = None;
    }

    fn verdict(&self, passed: Option<bool>) -> Verdict {
        Verdict {
            field: self.field,
            generation: self.generation,
            passed,
        }
    }
}

impl<F: FnOnce(Verdict)> Drop for Reporter<F> {
    fn drop(&mut self) {
        if let Some(report) = self.report.take() {
            warn!(
                "{} check {} ended without a verdict",
                self.field, self.generation
            );
            report(self.verdict(Some(false)));
        }
    }
}
