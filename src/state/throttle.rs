//! Layered admission control: request-rate windows first, then resource-budget windows.

use std::time::{Duration, Instant};

use thiserror::Error;

use crate::{config::ThrottleConfig, state::limiter::Limiter};

/// Which family of windows rejected a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThrottleKind {
    /// Request-count window.
    Rate,
    /// Resource-budget window.
    Budget,
}

/// A request was refused by one of the admission windows; the caller may retry later.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("{kind:?} limit reached for the {window:?} window")]
pub struct Throttled {
    /// Family of the rejecting window.
    pub kind: ThrottleKind,
    /// Length of the rejecting window.
    pub window: Duration,
}

/// Process-wide gate composed of ordered rate and budget limiters.
#[derive(Debug)]
pub struct ThrottleGate {
    rate: Vec<Limiter>,
    budget: Vec<Limiter>,
}

impl ThrottleGate {
    /// Assemble a gate from explicit limiter lists.
    pub fn new(rate: Vec<Limiter>, budget: Vec<Limiter>) -> Self {
        Self { rate, budget }
    }

    /// Build the gate described by the configuration.
    pub fn from_config(config: &ThrottleConfig) -> Self {
        let rate = config
            .rate
            .iter()
            .map(|window| Limiter::from_config(window, 1.0))
            .collect();
        let budget = config
            .budget
            .iter()
            .map(|window| Limiter::from_config(window, config.budget_cost_per_request))
            .collect();
        Self::new(rate, budget)
    }

    /// Admit one mutating request against every rate window, then every budget window.
    ///
    /// Windows evaluated before a rejecting window keep the usage they admitted.
    pub fn check(&self) -> Result<(), Throttled> {
        self.check_at(Instant::now())
    }

    /// [`ThrottleGate::check`] evaluated at an explicit instant.
    pub fn check_at(&self, now: Instant) -> Result<(), Throttled> {
        admit_all(&self.rate, ThrottleKind::Rate, now)?;
        admit_all(&self.budget, ThrottleKind::Budget, now)
    }

    /// Charge only the budget windows, used for relayed state messages.
    pub fn charge_budget(&self) -> Result<(), Throttled> {
        admit_all(&self.budget, ThrottleKind::Budget, Instant::now())
    }
}

fn admit_all(limiters: &[Limiter], kind: ThrottleKind, now: Instant) -> Result<(), Throttled> {
    match limiters.iter().find(|limiter| !limiter.admit_at(now)) {
        Some(limiter) => Err(Throttled {
            kind,
            window: limiter.window(),
        }),
        None => Ok(()),
    }
}
