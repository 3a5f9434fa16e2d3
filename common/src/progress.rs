use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, SystemTime};

use counter::{Clock, Counter, SystemClock};
use tracing::instrument;

/// Throughput tracking for a single transfer.
///
/// Holds its own windowed byte counter so concurrent transfers never share rate state.
#[derive(Debug)]
pub struct Progress<C = SystemClock> {
    bytes: Counter<C>,
    total: AtomicU64,
    clock: C,
    start_time: SystemTime,
}

impl Progress<SystemClock> {
    pub fn new(
        rate_window: Duration,
        rate_resolution: Duration,
    ) -> Result<Self, counter::Error> {
        Self::with_clock(rate_window, rate_resolution, SystemClock)
    }
}

impl<C: Clock + Clone> Progress<C> {
    pub fn with_clock(
        rate_window: Duration,
        rate_resolution: Duration,
        clock: C,
    ) -> Result<Self, counter::Error> {
        let bytes = Counter::with_clock(rate_window, rate_resolution, clock.clone())?;
        let start_time = clock.now();
        Ok(Self {
            bytes,
            total: AtomicU64::new(0),
            clock,
            start_time,
        })
    }
}

impl<C: Clock> Progress<C> {
    pub fn add_bytes(&self, n: u64) {
        self.bytes.add(n);
        self.total.fetch_add(n, Ordering::Relaxed);
    }

    pub fn total_bytes(&self) -> u64 {
        self.total.load(Ordering::Relaxed)
    }

    /// Bytes per second over the recent rate window.
    pub fn current_rate(&self) -> f64 {
        self.bytes.per(Duration::from_secs(1))
    }

    /// Bytes per second since the transfer started.
    pub fn average_rate(&self) -> f64 {
        let secs = self.get_duration().as_secs_f64();
        if secs <= 0.0 {
            return 0.0;
        }
        self.total_bytes() as f64 / secs
    }

    pub fn get_duration(&self) -> Duration {
        self.clock
            .now()
            .duration_since(self.start_time)
            .unwrap_or_default()
    }
}

pub struct ProgressPrinter<'a, C = SystemClock> {
    progress: &'a Progress<C>,
}

impl<'a, C: Clock> ProgressPrinter<'a, C> {
    pub fn new(progress: &'a Progress<C>) -> Self {
        Self { progress }
    }

    /// Single line suited for a spinner message.
    pub fn status_line(&self) -> String {
        format!(
            "{} transferred, {}/s current, {}/s average, {} elapsed",
            bytesize::ByteSize(self.progress.total_bytes()),
            bytesize::ByteSize(self.progress.current_rate() as u64),
            bytesize::ByteSize(self.progress.average_rate() as u64),
            humantime::format_duration(whole_seconds(self.progress.get_duration())),
        )
    }

    /// Multi-line block suited for periodic text updates.
    #[instrument(skip(self))]
    pub fn print(&self) -> String {
        format!(
            "-----------------------\n\
            TRANSFERRED:\n\
            current: {:>10}/s\n\
            average: {:>10}/s\n\
            total:   {:>10}\n\
            elapsed: {:>10}",
            bytesize::ByteSize(self.progress.current_rate() as u64),
            bytesize::ByteSize(self.progress.average_rate() as u64),
            bytesize::ByteSize(self.progress.total_bytes()),
            humantime::format_duration(whole_seconds(self.progress.get_duration())).to_string(),
        )
    }
}

fn whole_seconds(duration: Duration) -> Duration {
    Duration::from_secs(duration.as_secs())
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use counter::ManualClock;

    fn progress(clock: &ManualClock) -> Result<Progress<ManualClock>> {
        Ok(Progress::with_clock(
            Duration::from_secs(4),
            Duration::from_secs(1),
            clock.clone(),
        )?)
    }

    #[test]
    fn tracks_total_and_rates() -> Result<()> {
        let clock = ManualClock::new(SystemTime::UNIX_EPOCH + Duration::from_secs(50));
        let progress = progress(&clock)?;
        progress.add_bytes(400);
        clock.advance(Duration::from_secs(2));
        progress.add_bytes(400);
        assert_eq!(progress.total_bytes(), 800);
        assert_eq!(progress.current_rate(), 400.0);
        assert_eq!(progress.average_rate(), 400.0);
        Ok(())
    }

    #[test]
    fn current_rate_decays_while_average_stays() -> Result<()> {
        let clock = ManualClock::new(SystemTime::UNIX_EPOCH + Duration::from_secs(50));
        let progress = progress(&clock)?;
        progress.add_bytes(1000);
        clock.advance(Duration::from_secs(10));
        assert_eq!(progress.current_rate(), 0.0);
        assert_eq!(progress.average_rate(), 100.0);
        assert_eq!(progress.get_duration(), Duration::from_secs(10));
        Ok(())
    }

    #[test]
    fn rates_are_zero_before_any_data() -> Result<()> {
        let clock = ManualClock::default();
        let progress = progress(&clock)?;
        assert_eq!(progress.current_rate(), 0.0);
        assert_eq!(progress.average_rate(), 0.0);
        Ok(())
    }

    #[test]
    fn invalid_window_is_rejected() {
        assert!(Progress::new(Duration::from_millis(150), Duration::from_millis(100)).is_err());
    }

    #[test]
    fn printer_renders_sections() -> Result<()> {
        let clock = ManualClock::new(SystemTime::UNIX_EPOCH + Duration::from_secs(50));
        let progress = progress(&clock)?;
        progress.add_bytes(3 * 1024 * 1024);
        clock.advance(Duration::from_secs(3));
        let printer = ProgressPrinter::new(&progress);
        let text = printer.print();
        assert!(text.contains("TRANSFERRED:"));
        assert!(text.contains("current:"));
        assert!(text.contains("average:"));
        assert!(text.contains("3s"));
        let line = printer.status_line();
        assert!(line.contains("transferred"));
        assert!(line.contains("3s elapsed"));
        Ok(())
    }

    #[test]
    fn threaded_adds() -> Result<()> {
        let clock = ManualClock::new(SystemTime::UNIX_EPOCH + Duration::from_secs(50));
        let progress = progress(&clock)?;
        std::thread::scope(|scope| {
            for _ in 0..10 {
                scope.spawn(|| {
                    for _ in 0..100 {
                        progress.add_bytes(1);
                    }
                });
            }
        });
        assert_eq!(progress.total_bytes(), 1000);
        clock.advance(Duration::from_secs(1));
        assert_eq!(progress.current_rate(), 1000.0);
        Ok(())
    }
}
