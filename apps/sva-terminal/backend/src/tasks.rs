//! Timers that belong to the current screen.
//!
//! Timer tasks only ever send an [`Event`] back to the terminal loop; they
//! never touch the state themselves. Their handles are kept here so that the
//! loop can abort them the moment the screen they were started for is left.

use std::collections::HashMap;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, sleep, Instant, MissedTickBehavior};

use crate::machine::{Event, Generation};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) enum TimerKind {
    Progress,
    AutoReset,
}

#[derive(Debug, Default)]
pub(crate) struct ScreenTimers {
    handles: HashMap<TimerKind, JoinHandle<()>>,
}

impl ScreenTimers {
    /// Registers a running timer, aborting any previous one of the same kind.
    pub(crate) fn start(&mut self, kind: TimerKind, handle: JoinHandle<()>) {
        if let Some(previous) = self.handles.insert(kind, handle) {
            previous.abort();
        }
    }

    pub(crate) fn cancel(&mut self, kind: TimerKind) {
        if let Some(handle) = self.handles.remove(&kind) {
            tracing::trace!("cancelling {kind:?} timer");
            handle.abort();
        }
    }

    pub(crate) fn cancel_all(&mut self) {
        for (kind, handle) in self.handles.drain() {
            tracing::trace!("cancelling {kind:?} timer");
            handle.abort();
        }
    }

    #[cfg(test)]
    pub(crate) fn is_running(&self, kind: TimerKind) -> bool {
        self.handles
            .get(&kind)
            .is_some_and(|handle| !handle.is_finished())
    }
}

impl Drop for ScreenTimers {
    fn drop(&mut self) {
        self.cancel_all();
    }
}

/// Sends a [`Event::ProgressTick`] every `period`, first one `period` from
/// now, until aborted or the loop goes away.
pub(crate) fn tick_progress(
    generation: Generation,
    period: Duration,
    events: mpsc::UnboundedSender<Event>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = interval_at(Instant::now() + period, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            interval.tick().await;
            if events.send(Event::ProgressTick { generation }).is_err() {
                break;
            }
        }
    })
}

/// Sends a single [`Event::AutoResetElapsed`] after `after`.
pub(crate) fn auto_reset(
    generation: Generation,
    after: Duration,
    events: mpsc::UnboundedSender<Event>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        sleep(after).await;
        tracing::debug!("auto-reset elapsed for generation {generation}");
        let _ = events.send(Event::AutoResetElapsed { generation });
    })
}

#[cfg(test)]
mod test {
    use super::*;
    use pretty_assertions::assert_eq;

    fn drain(events: &mut mpsc::UnboundedReceiver<Event>) -> usize {
        let mut count = 0;
        while events.try_recv().is_ok() {
            count += 1;
        }
        count
    }

    #[tokio::test(start_paused = true)]
    async fn progress_ticks_every_period_until_cancelled() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut timers = ScreenTimers::default();
        timers.start(
            TimerKind::Progress,
            tick_progress(Generation::default(), Duration::from_millis(100), tx),
        );

        sleep(Duration::from_millis(550)).await;
        assert_eq!(drain(&mut rx), 5);
        assert!(timers.is_running(TimerKind::Progress));

        timers.cancel(TimerKind::Progress);
        sleep(Duration::from_secs(2)).await;
        assert_eq!(drain(&mut rx), 0);
        assert!(!timers.is_running(TimerKind::Progress));
    }

    #[tokio::test(start_paused = true)]
    async fn auto_reset_fires_once() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let _handle = auto_reset(Generation::default(), Duration::from_secs(5), tx);

        sleep(Duration::from_millis(4990)).await;
        assert_eq!(drain(&mut rx), 0);

        sleep(Duration::from_millis(20)).await;
        assert!(matches!(
            rx.try_recv(),
            Ok(Event::AutoResetElapsed { .. })
        ));
        sleep(Duration::from_secs(10)).await;
        assert_eq!(drain(&mut rx), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_all_stops_every_timer() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut timers = ScreenTimers::default();
        timers.start(
            TimerKind::Progress,
            tick_progress(Generation::default(), Duration::from_millis(100), tx.clone()),
        );
        timers.start(
            TimerKind::AutoReset,
            auto_reset(Generation::default(), Duration::from_millis(50), tx),
        );

        timers.cancel_all();
        sleep(Duration::from_secs(1)).await;
        assert_eq!(drain(&mut rx), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn restarting_a_timer_replaces_the_old_one() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut timers = ScreenTimers::default();
        timers.start(
            TimerKind::AutoReset,
            auto_reset(Generation::default(), Duration::from_millis(100), tx.clone()),
        );
        timers.start(
            TimerKind::AutoReset,
            auto_reset(Generation::default(), Duration::from_millis(300), tx),
        );

        sleep(Duration::from_millis(200)).await;
        assert_eq!(drain(&mut rx), 0);
        sleep(Duration::from_millis(200)).await;
        assert_eq!(drain(&mut rx), 1);
    }
}
