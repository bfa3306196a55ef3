//! Fixed-window usage counter shared by the request-rate and resource-budget gates.

use std::{
    sync::{Mutex, PoisonError},
    time::{Duration, Instant},
};

use crate::config::WindowConfig;

/// Fixed-window limiter admitting up to `allowed` units of usage per window.
///
/// Rate limiters charge one unit per request; budget limiters charge a fractional cost.
#[derive(Debug)]
pub struct Limiter {
    window: Duration,
    allowed: f64,
    cost: f64,
    state: Mutex<WindowState>,
}

#[derive(Debug, Default)]
struct WindowState {
    started_at: Option<Instant>,
    used: f64,
}

impl Limiter {
    /// Counter admitting `allowed` requests per `window`.
    pub fn rate(window: Duration, allowed: f64) -> Self {
        Self::with_cost(window, allowed, 1.0)
    }

    /// Budget admitting requests that each consume `cost` out of `allowed` per `window`.
    pub fn with_cost(window: Duration, allowed: f64, cost: f64) -> Self {
        Self {
            window,
            allowed,
            cost,
            state: Mutex::new(WindowState::default()),
        }
    }

    /// Build a limiter from its configuration entry.
    pub fn from_config(config: &WindowConfig, cost: f64) -> Self {
        Self::with_cost(config.window(), config.allowed, cost)
    }

    /// Length of the window.
    pub fn window(&self) -> Duration {
        self.window
    }

    /// Try to consume one request's worth of usage now.
    pub fn admit(&self) -> bool {
        self.admit_at(Instant::now())
    }

    /// Try to consume one request's worth of usage at `now`.
    pub fn admit_at(&self, now: Instant) -> bool {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);

        let expired = state
            .started_at
            .is_none_or(|start| now.saturating_duration_since(start) >= self.window);

        if expired {
            state.started_at = Some(now);
            state.used = self.cost;
            true
        } else if state.used + self.cost <= self.allowed {
            state.used += self.cost;
            true
        } else {
            false
        }
    }
}
