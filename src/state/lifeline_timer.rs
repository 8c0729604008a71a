//! Phone-a-friend countdown.
//!
//! [`LifelineTimer`] is a small synchronous state machine driven by wall-clock readings; the
//! async driver in [`spawn`] feeds it one tick per second. Expiry and manual cancel race through
//! the same lock, so only the first of them resolves the timer.

use std::{future::Future, sync::Arc, time::Duration};

use serde::Serialize;
use thiserror::Error;
use tokio::{
    sync::Mutex,
    task::AbortHandle,
    time::{Instant, MissedTickBehavior, interval},
};
use tracing::debug;
use utoipa::ToSchema;

const TICK_PERIOD: Duration = Duration::from_secs(1);

/// Lifecycle of one countdown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerState {
    /// Created, not started.
    Idle,
    /// Counting down since `started_at_ms`.
    Running {
        /// Wall-clock start in milliseconds.
        started_at_ms: i64,
    },
    /// Ran out; the expiry owns the resume.
    Expired,
    /// Stopped by a manual resume.
    Cancelled,
}

/// How a running countdown ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Resolution {
    /// The countdown reached zero.
    Expired,
    /// The host resumed before zero.
    Cancelled,
}

/// Misuse of [`LifelineTimer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum TimerError {
    /// `start` called on a timer that already left `Idle`.
    #[error("timer already started")]
    NotIdle,
}

/// What the displays render on each tick.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TimerView {
    /// Whole seconds left, rounded up.
    pub remaining_secs: u64,
    /// `mm:ss`
    pub display: String,
    /// 0 to 100.
    pub percent_elapsed: f64,
}

/// Result of feeding a clock reading to the timer.
#[derive(Debug, Clone, PartialEq)]
pub enum Tick {
    /// Still counting down.
    Running(TimerView),
    /// This tick resolved the timer; the caller owns the resume.
    Resolved(Resolution),
    /// Already resolved (or never started); nothing to do.
    Settled,
}

/// Countdown state plus its configured duration.
#[derive(Debug, Clone)]
pub struct LifelineTimer {
    state: TimerState,
    duration: Duration,
}

impl LifelineTimer {
    /// Idle timer of `duration`.
    pub fn new(duration: Duration) -> Self {
        Self {
            state: TimerState::Idle,
            duration,
        }
    }

    /// Current lifecycle state.
    pub fn state(&self) -> TimerState {
        self.state
    }

    /// Configured length of the countdown.
    pub fn duration(&self) -> Duration {
        self.duration
    }

    /// Start counting from `now_ms`. Only an idle timer can start.
    pub fn start(&mut self, now_ms: i64) -> Result<(), TimerError> {
        if self.state != TimerState::Idle {
            return Err(TimerError::NotIdle);
        }
        self.state = TimerState::Running {
            started_at_ms: now_ms,
        };
        Ok(())
    }

    /// Current countdown values, `None` unless running.
    pub fn view(&self, now_ms: i64) -> Option<TimerView> {
        let TimerState::Running { started_at_ms } = self.state else {
            return None;
        };
        let duration_ms = i64::try_from(self.duration.as_millis()).unwrap_or(i64::MAX);
        let elapsed_ms = (now_ms - started_at_ms).clamp(0, duration_ms);
        let remaining_ms = duration_ms - elapsed_ms;
        let remaining_secs = u64::try_from((remaining_ms + 999) / 1_000).unwrap_or(0);
        let percent_elapsed = if duration_ms == 0 {
            100.0
        } else {
            elapsed_ms as f64 * 100.0 / duration_ms as f64
        };

        Some(TimerView {
            remaining_secs,
            display: format!("{:02}:{:02}", remaining_secs / 60, remaining_secs % 60),
            percent_elapsed,
        })
    }

    /// Recompute from `now_ms`; moves to `Expired` once nothing remains.
    pub fn tick(&mut self, now_ms: i64) -> Tick {
        match self.view(now_ms) {
            None => Tick::Settled,
            Some(view) if view.remaining_secs == 0 => {
                self.state = TimerState::Expired;
                Tick::Resolved(Resolution::Expired)
            }
            Some(view) => Tick::Running(view),
        }
    }

    /// Manual resume. Only resolves a running timer.
    pub fn cancel(&mut self) -> Option<Resolution> {
        match self.state {
            TimerState::Running { .. } => {
                self.state = TimerState::Cancelled;
                Some(Resolution::Cancelled)
            }
            _ => None,
        }
    }
}

/// Handle on a driven countdown.
pub struct TimerHandle {
    timer: Arc<Mutex<LifelineTimer>>,
    task: AbortHandle,
}

impl TimerHandle {
    /// Cancel the countdown. Returns `Some` only when this call resolved it, in which case the
    /// caller must run the resume itself.
    pub async fn cancel(&self) -> Option<Resolution> {
        let resolution = self.timer.lock().await.cancel();
        if resolution.is_some() {
            self.task.abort();
        }
        resolution
    }

    /// State of the driven timer.
    pub async fn state(&self) -> TimerState {
        self.timer.lock().await.state()
    }

    /// Whether the driver task has exited.
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

/// Start a countdown of `duration` and drive it on the runtime.
///
/// `on_tick` runs once per second while running. `on_expired` runs at most once, and only when
/// expiry wins over [`TimerHandle::cancel`].
pub fn spawn<T, E, Fut>(
    duration: Duration,
    started_at_ms: i64,
    on_tick: T,
    on_expired: E,
) -> TimerHandle
where
    T: Fn(TimerView) + Send + 'static,
    E: FnOnce() -> Fut + Send + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    let mut timer = LifelineTimer::new(duration);
    // Fresh timers are idle.
    let _ = timer.start(started_at_ms);
    let timer = Arc::new(Mutex::new(timer));

    let shared = timer.clone();
    let task = tokio::spawn(async move {
        let base = Instant::now();
        let mut ticks = interval(TICK_PERIOD);
        ticks.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticks.tick().await;
            let elapsed_ms = i64::try_from(base.elapsed().as_millis()).unwrap_or(i64::MAX);
            let tick = shared.lock().await.tick(started_at_ms + elapsed_ms);
            match tick {
                Tick::Running(view) => on_tick(view),
                Tick::Resolved(_) => {
                    debug!("lifeline timer expired");
                    on_expired().await;
                    break;
                }
                Tick::Settled => break,
            }
        }
    });

    TimerHandle {
        timer,
        task: task.abort_handle(),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    const SECOND: i64 = 1_000;

    #[test]
    fn countdown_is_recomputed_from_the_clock() {
        let mut timer = LifelineTimer::new(Duration::from_secs(180));
        timer.start(0).unwrap();

        let view = timer.view(30 * SECOND).unwrap();
        assert_eq!(view.remaining_secs, 150);
        assert_eq!(view.display, "02:30");
        assert!((view.percent_elapsed - 16.666).abs() < 0.01);

        // Skipped ticks do not matter, only the delta does.
        let view = timer.view(179 * SECOND + 1).unwrap();
        assert_eq!(view.display, "00:01");
    }

    #[test]
    fn start_only_from_idle() {
        let mut timer = LifelineTimer::new(Duration::from_secs(10));
        timer.start(0).unwrap();
        assert_eq!(timer.start(5), Err(TimerError::NotIdle));
        timer.cancel();
        assert_eq!(timer.start(5), Err(TimerError::NotIdle));
    }

    #[test]
    fn expiry_and_racing_cancel_resume_exactly_once() {
        let mut timer = LifelineTimer::new(Duration::from_secs(180));
        timer.start(0).unwrap();
        let mut resumes = 0;

        for second in 0..=181 {
            if let Tick::Resolved(_) = timer.tick(second * SECOND) {
                resumes += 1;
            }
            if second == 181 && timer.cancel().is_some() {
                resumes += 1;
            }
        }

        assert_eq!(timer.state(), TimerState::Expired);
        assert_eq!(resumes, 1);
        assert_eq!(timer.tick(200 * SECOND), Tick::Settled);
    }

    #[test]
    fn cancel_wins_when_first() {
        let mut timer = LifelineTimer::new(Duration::from_secs(180));
        timer.start(0).unwrap();
        assert_eq!(timer.cancel(), Some(Resolution::Cancelled));
        assert_eq!(timer.tick(181 * SECOND), Tick::Settled);
        assert_eq!(timer.cancel(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn driver_ticks_then_expires_once() {
        let ticks = Arc::new(AtomicUsize::new(0));
        let resumes = Arc::new(AtomicUsize::new(0));

        let tick_count = ticks.clone();
        let resume_count = resumes.clone();
        let handle = spawn(
            Duration::from_secs(3),
            0,
            move |_| {
                tick_count.fetch_add(1, Ordering::SeqCst);
            },
            move || async move {
                resume_count.fetch_add(1, Ordering::SeqCst);
            },
        );

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(resumes.load(Ordering::SeqCst), 1);
        assert!(ticks.load(Ordering::SeqCst) >= 3);
        assert_eq!(handle.state().await, TimerState::Expired);
        assert_eq!(handle.cancel().await, None);
    }

    #[tokio::test(start_paused = true)]
    async fn cancelled_driver_never_expires() {
        let resumes = Arc::new(AtomicUsize::new(0));
        let resume_count = resumes.clone();
        let handle = spawn(
            Duration::from_secs(3),
            0,
            |_| {},
            move || async move {
                resume_count.fetch_add(1, Ordering::SeqCst);
            },
        );

        tokio::time::sleep(Duration::from_millis(1_500)).await;
        assert_eq!(handle.cancel().await, Some(Resolution::Cancelled));
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(resumes.load(Ordering::SeqCst), 0);
        assert!(handle.is_finished());
    }
}
