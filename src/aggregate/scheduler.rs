use std::future::Future;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::Instant;

use super::interval::IntervalError;

/// Work performed once per scheduler tick.
pub trait Tick {
    fn tick(&mut self) -> impl Future<Output = ()> + Send;
}

/// Counters reported when the scheduler stops.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SchedulerStats {
    /// Cycles that ran to completion.
    pub cycles: u64,
    /// Ticks skipped because a cycle was still running at their deadline.
    pub dropped_ticks: u64,
}

/// Monotonic tick deadlines at a fixed period.
///
/// Deadlines stay on the `start + k * period` grid. When a cycle overruns,
/// every deadline that passed while it ran is dropped at once; missed ticks
/// are never queued up and replayed back to back.
#[derive(Debug, Clone)]
pub struct TickSchedule {
    period: Duration,
    next: Instant,
}

impl TickSchedule {
    /// The first deadline is `start` itself.
    pub fn new(period: Duration, start: Instant) -> Self {
        Self {
            period,
            next: start,
        }
    }

    pub fn deadline(&self) -> Instant {
        self.next
    }

    /// Step past the tick that just ran, given the time it finished.
    ///
    /// Returns how many deadlines were dropped because they fell strictly
    /// before `now`.
    pub fn advance(&mut self, now: Instant) -> u64 {
        let next = self.next + self.period;
        if now <= next {
            self.next = next;
            return 0;
        }

        let behind = (now - next).as_nanos();
        let period = self.period.as_nanos().max(1);
        let dropped = behind.div_ceil(period);
        let skip = u64::try_from(dropped * period).unwrap_or(u64::MAX);
        self.next = next + Duration::from_nanos(skip);
        u64::try_from(dropped).unwrap_or(u64::MAX)
    }
}

/// Drives one [`Tick`] per period until shut down.
pub struct Scheduler {
    period: Duration,
}

impl Scheduler {
    pub fn new(period: Duration) -> Result<Self, IntervalError> {
        if period.is_zero() {
            return Err(IntervalError::NonPositive(format!("{period:?}")));
        }
        Ok(Self { period })
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    /// Tick `target` immediately, then once per period, until `shutdown`
    /// becomes `true` or its sender is dropped.
    ///
    /// Ticks run strictly one at a time. Shutdown is observed both while
    /// waiting for the next deadline and while a tick is running; an
    /// in-flight tick is dropped at its next suspension point.
    pub async fn run<T: Tick>(
        &self,
        target: &mut T,
        mut shutdown: watch::Receiver<bool>,
    ) -> SchedulerStats {
        let mut stats = SchedulerStats::default();
        let mut schedule = TickSchedule::new(self.period, Instant::now());

        loop {
            if *shutdown.borrow_and_update() {
                break;
            }

            tokio::select! {
                biased;
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    continue;
                }
                _ = tokio::time::sleep_until(schedule.deadline()) => {}
            }

            let completed = {
                let cycle = target.tick();
                tokio::pin!(cycle);
                loop {
                    tokio::select! {
                        biased;
                        () = &mut cycle => break true,
                        changed = shutdown.changed() => {
                            if changed.is_err() || *shutdown.borrow_and_update() {
                                break false;
                            }
                        }
                    }
                }
            };
            if !completed {
                tracing::info!("Shutdown requested, abandoning in-flight cycle");
                break;
            }
            stats.cycles += 1;

            let dropped = schedule.advance(Instant::now());
            if dropped > 0 {
                tracing::debug!(dropped, "Cycle overran the interval, skipping missed ticks");
                stats.dropped_ticks += dropped;
            }
        }

        tracing::info!(
            cycles = stats.cycles,
            dropped_ticks = stats.dropped_ticks,
            "Scheduler stopped"
        );
        stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    /// Records when each tick started and sleeps for `work` to simulate a cycle.
    struct Recorder {
        origin: Instant,
        work: Duration,
        started: Vec<Duration>,
        finished: usize,
        busy: Arc<AtomicBool>,
    }

    impl Recorder {
        fn new(work: Duration) -> Self {
            Self {
                origin: Instant::now(),
                work,
                started: Vec::new(),
                finished: 0,
                busy: Arc::new(AtomicBool::new(false)),
            }
        }
    }

    impl Tick for Recorder {
        async fn tick(&mut self) {
            assert!(!self.busy.swap(true, Ordering::SeqCst), "cycles overlapped");
            self.started.push(self.origin.elapsed());
            tokio::time::sleep(self.work).await;
            self.finished += 1;
            self.busy.store(false, Ordering::SeqCst);
        }
    }

    async fn run_for(
        period: Duration,
        target: &mut Recorder,
        stop_after: Duration,
    ) -> SchedulerStats {
        let scheduler = Scheduler::new(period).unwrap();
        let (tx, rx) = watch::channel(false);
        let stop = async move {
            tokio::time::sleep(stop_after).await;
            tx.send(true).unwrap();
        };
        let (stats, ()) = tokio::join!(scheduler.run(target, rx), stop);
        stats
    }

    #[test]
    fn test_zero_period_rejected() {
        assert!(matches!(
            Scheduler::new(Duration::ZERO),
            Err(IntervalError::NonPositive(_))
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_tick_is_immediate_then_periodic() {
        let mut target = Recorder::new(Duration::ZERO);
        let stats = run_for(Duration::from_secs(10), &mut target, Duration::from_secs(35)).await;

        assert_eq!(
            target.started,
            vec![
                Duration::ZERO,
                Duration::from_secs(10),
                Duration::from_secs(20),
                Duration::from_secs(30),
            ]
        );
        assert_eq!(
            stats,
            SchedulerStats {
                cycles: 4,
                dropped_ticks: 0
            }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_overrunning_cycle_drops_ticks() {
        let mut target = Recorder::new(Duration::from_secs(25));
        let stats = run_for(Duration::from_secs(10), &mut target, Duration::from_secs(58)).await;

        // Deadlines 10, 20 pass during the first cycle and 40, 50 during the second.
        assert_eq!(
            target.started,
            vec![Duration::ZERO, Duration::from_secs(30)]
        );
        assert_eq!(
            stats,
            SchedulerStats {
                cycles: 2,
                dropped_ticks: 4
            }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_mid_cycle_abandons_it() {
        let mut target = Recorder::new(Duration::from_secs(100));
        let stats = run_for(Duration::from_secs(10), &mut target, Duration::from_secs(5)).await;

        assert_eq!(target.started.len(), 1);
        assert_eq!(target.finished, 0);
        assert_eq!(stats.cycles, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropped_sender_stops_scheduler() {
        let scheduler = Scheduler::new(Duration::from_secs(10)).unwrap();
        let mut target = Recorder::new(Duration::ZERO);
        let (tx, rx) = watch::channel(false);

        let stop = async move {
            tokio::time::sleep(Duration::from_secs(15)).await;
            drop(tx);
        };
        let (stats, ()) = tokio::join!(scheduler.run(&mut target, rx), stop);

        assert_eq!(stats.cycles, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_schedule_advance_counts_missed_deadlines() {
        let start = Instant::now();
        let period = Duration::from_secs(10);
        let mut schedule = TickSchedule::new(period, start);
        assert_eq!(schedule.deadline(), start);

        assert_eq!(schedule.advance(start + Duration::from_secs(3)), 0);
        assert_eq!(schedule.deadline(), start + period);

        // Finished exactly on the next deadline: it is due, not missed.
        assert_eq!(schedule.advance(start + Duration::from_secs(20)), 0);
        assert_eq!(schedule.deadline(), start + Duration::from_secs(20));

        // 30, 40 and 50 all passed before 51.
        assert_eq!(schedule.advance(start + Duration::from_secs(51)), 3);
        assert_eq!(schedule.deadline(), start + Duration::from_secs(60));
    }
}
