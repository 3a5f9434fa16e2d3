use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, SystemTime};

use crate::clock::{Clock, SystemClock};

/// Invalid counter geometry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    #[error("counter resolution must be greater than zero")]
    ZeroResolution,
    #[error("counter span must be greater than zero")]
    ZeroSpan,
    #[error("counter span {span:?} is not a multiple of resolution {resolution:?}")]
    SpanNotMultiple { span: Duration, resolution: Duration },
    #[error(
        "counter span {span:?} at resolution {resolution:?} needs more than {} buckets",
        MAX_BUCKETS
    )]
    TooManyBuckets { span: Duration, resolution: Duration },
}

/// Upper bound on `span / resolution`, keeping a counter at or below 8 MiB of buckets.
pub const MAX_BUCKETS: usize = 1 << 20;

/// Number of buckets a counter with this geometry would hold.
///
/// Performs the same checks as [`Counter::new`] without allocating anything.
pub fn bucket_count(span: Duration, resolution: Duration) -> Result<usize, Error> {
    if resolution.is_zero() {
        return Err(Error::ZeroResolution);
    }
    if span.is_zero() {
        return Err(Error::ZeroSpan);
    }
    if span.as_nanos() % resolution.as_nanos() != 0 {
        return Err(Error::SpanNotMultiple { span, resolution });
    }
    usize::try_from(span.as_nanos() / resolution.as_nanos())
        .ok()
        .filter(|len| *len <= MAX_BUCKETS)
        .ok_or(Error::TooManyBuckets { span, resolution })
}

#[derive(Debug)]
struct State {
    buckets: Vec<u64>,
    // nanoseconds since the unix epoch
    start: Option<u128>,
    last: Option<u128>,
}

/// Counts events over a sliding window of wall-clock time.
///
/// The window is `span` long and is divided into `span / resolution` buckets.
/// Events older than the window fall out one bucket at a time, so a counter with
/// a span of one minute and a resolution of one second forgets a second's worth
/// of events every second.
#[derive(Debug)]
pub struct Counter<C = SystemClock> {
    clock: C,
    span: Duration,
    resolution: Duration,
    state: Mutex<State>,
}

fn unix_nanos(time: SystemTime) -> u128 {
    // times before the epoch collapse onto it
    time.duration_since(SystemTime::UNIX_EPOCH)
        .map_or(0, |since| since.as_nanos())
}

impl Counter<SystemClock> {
    /// Creates a counter that reads the system clock.
    pub fn new(span: Duration, resolution: Duration) -> Result<Self, Error> {
        Self::with_clock(span, resolution, SystemClock)
    }
}

impl<C: Clock> Counter<C> {
    /// Creates a counter that reads time from `clock`.
    ///
    /// `resolution` must evenly divide `span`, giving at most [`MAX_BUCKETS`] buckets.
    pub fn with_clock(span: Duration, resolution: Duration, clock: C) -> Result<Self, Error> {
        let len = bucket_count(span, resolution)?;
        Ok(Self {
            clock,
            span,
            resolution,
            state: Mutex::new(State {
                buckets: vec![0; len],
                start: None,
                last: None,
            }),
        })
    }

    /// Width of a single bucket.
    pub fn resolution(&self) -> Duration {
        self.resolution
    }

    /// Full length of the window once it has filled up.
    pub fn window(&self) -> Duration {
        self.span
    }

    /// Records `n` events at the current time.
    pub fn add(&self, n: u64) {
        self.add_at(unix_nanos(self.clock.now()), n);
    }

    /// Number of events recorded within the window.
    pub fn get(&self) -> u64 {
        self.get_at(unix_nanos(self.clock.now()))
    }

    /// Average number of events per `interval` given the data in the window.
    ///
    /// Before the window has filled up the rate is extrapolated from the time
    /// elapsed since the first [`add`](Self::add). Returns `0.0` if nothing has
    /// been added yet.
    pub fn per(&self, interval: Duration) -> f64 {
        self.per_at(unix_nanos(self.clock.now()), interval)
    }

    /// Amount of time the window currently covers: the time since the first
    /// [`add`](Self::add), capped at the full window.
    pub fn span(&self) -> Duration {
        let now = unix_nanos(self.clock.now());
        let state = self.lock();
        let nanos = self.effective_span(&state, now);
        Duration::from_nanos(u64::try_from(nanos).unwrap_or(u64::MAX))
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        // every critical section leaves the buckets consistent
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn quantum(&self, nanos: u128) -> u128 {
        nanos / self.resolution.as_nanos()
    }

    /// Zeroes every bucket that belongs to a quantum after the last add up to
    /// and including the quantum of `now`. Those buckets can only hold data
    /// from a previous turn of the ring.
    fn sweep(&self, state: &mut State, now: u128) {
        let Some(last) = state.last else {
            return;
        };
        let (last_q, now_q) = (self.quantum(last), self.quantum(now));
        if now_q <= last_q {
            return;
        }
        let len = state.buckets.len() as u128;
        if now_q - last_q >= len {
            tracing::trace!("window expired, clearing all {} buckets", len);
            state.buckets.fill(0);
            return;
        }
        for q in last_q + 1..=now_q {
            let slot = (q % len) as usize;
            state.buckets[slot] = 0;
        }
    }

    fn effective_span(&self, state: &State, now: u128) -> u128 {
        state.start.map_or(0, |start| {
            now.saturating_sub(start).min(self.span.as_nanos())
        })
    }

    fn sum(&self, state: &mut State, now: u128) -> u64 {
        self.sweep(state, now);
        state
            .buckets
            .iter()
            .fold(0u64, |total, bucket| total.saturating_add(*bucket))
    }

    fn add_at(&self, now: u128, n: u64) {
        let mut state = self.lock();
        state.start.get_or_insert(now);
        self.sweep(&mut state, now);
        let slot = (self.quantum(now) % state.buckets.len() as u128) as usize;
        state.buckets[slot] = state.buckets[slot].saturating_add(n);
        // a clock stepping backwards never rewinds the sweep position
        state.last = Some(state.last.map_or(now, |last| last.max(now)));
    }

    fn get_at(&self, now: u128) -> u64 {
        let mut state = self.lock();
        self.sum(&mut state, now)
    }

    fn per_at(&self, now: u128, interval: Duration) -> f64 {
        let mut state = self.lock();
        let count = self.sum(&mut state, now);
        let span = self.effective_span(&state, now);
        if span == 0 {
            return 0.0;
        }
        count as f64 * interval.as_nanos() as f64 / span as f64
    }
}
