//! No-op sources for instrumentation that is compiled in but switched off.

use super::{Counter, Gauge, HistogramSource, Timer, TimerToken};
use crate::error::Result;
use crate::event::Tags;

#[derive(Debug, Clone, Copy, Default)]
pub struct NullCounter;

impl Counter for NullCounter {
    fn incr(&self, _n: f64) {}
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NullTimer;

impl Timer for NullTimer {
    fn start(&self, _tags: Option<Tags>) -> TimerToken {
        TimerToken::Unset
    }

    fn stop(&self, _token: TimerToken, _tags: Option<Tags>) -> Result<()> {
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NullGauge;

impl Gauge for NullGauge {
    fn update(&self, _value: f64) {}
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NullHistogram;

impl HistogramSource for NullHistogram {
    fn add(&self, _value: f64) {}
}
