//! Sliding-window event counter for throughput metering
//!
//! This crate provides a fixed-memory counter that answers "how many events happened in the
//! last N seconds" and "what is the current rate". The cpipe tools use it to measure bytes
//! transferred per second while a copy is in progress.
//!
//! # Overview
//!
//! A [`Counter`] keeps a ring of buckets covering the most recent `span` of wall-clock time.
//! Each bucket is `resolution` wide, so the ring has `span / resolution` buckets. A timestamp
//! `t` lands in bucket `floor(t / resolution) mod buckets`.
//!
//! Buckets are never cleared by a background task. Instead, every [`Counter::add`] and every
//! read sweeps the buckets that the clock has moved past since the last add, zeroing data left
//! over from a previous turn of the ring. If the clock has moved past the whole ring, all
//! buckets are cleared in one pass.
//!
//! # Usage
//!
//! ```rust
//! use counter::Counter;
//! use std::time::Duration;
//!
//! # fn main() -> Result<(), counter::Error> {
//! // keep ten seconds of history at one second granularity
//! let bytes = Counter::new(Duration::from_secs(10), Duration::from_secs(1))?;
//!
//! bytes.add(64 * 1024);
//! bytes.add(64 * 1024);
//!
//! assert_eq!(bytes.get(), 128 * 1024);
//! let per_second = bytes.per(Duration::from_secs(1));
//! # let _ = per_second;
//! # Ok(())
//! # }
//! ```
//!
//! # Rate Calculation
//!
//! [`Counter::per`] scales the windowed total to the requested interval:
//!
//! ```text
//! rate = total * interval / min(now - first_add, span)
//! ```
//!
//! Dividing by the time elapsed since the first add, rather than the full span, keeps young
//! counters from under-reporting while the window is still filling up. Before the first add
//! the rate is zero.
//!
//! # Deterministic Clocks
//!
//! The clock is a construction parameter. Tests drive the sweep with a [`ManualClock`]:
//!
//! ```rust
//! use counter::{Counter, ManualClock};
//! use std::time::{Duration, SystemTime};
//!
//! # fn main() -> Result<(), counter::Error> {
//! let clock = ManualClock::new(SystemTime::UNIX_EPOCH);
//! let events = Counter::with_clock(Duration::from_secs(4), Duration::from_secs(1), clock.clone())?;
//!
//! events.add(5);
//! clock.advance(Duration::from_secs(5));
//! assert_eq!(events.get(), 0);
//! # Ok(())
//! # }
//! ```
//!
//! # Thread Safety
//!
//! `add`, `get` and `per` all take the same lock for their entire critical section, which
//! only covers clock arithmetic and the bucket array. A counter can be shared by reference or
//! through an `Arc` between a writer task and a progress printer.

mod clock;
mod window;

pub use clock::{Clock, ManualClock, SystemClock};
pub use window::{bucket_count, Counter, Error, MAX_BUCKETS};
