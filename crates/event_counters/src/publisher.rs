// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::options::MAX_REFRESH_INTERVAL;
use crate::source::EventSource;

/// Publishes a set of event sources periodically on the tokio runtime.
///
/// The first publish happens one full interval after spawning. Dropping the publisher stops
/// it.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
///
/// use event_counters::{EventSource, Publisher};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let source = EventSource::new("a");
/// let publisher = Publisher::spawn([source], Duration::from_secs(1));
/// publisher.stop();
/// # }
/// ```
#[derive(Debug)]
pub struct Publisher {
    task: JoinHandle<()>,
}

impl Publisher {
    /// Spawns the publishing task.
    ///
    /// Intervals longer than [`MAX_REFRESH_INTERVAL`] are shortened to it.
    ///
    /// # Panics
    ///
    /// Panics if called outside of a tokio runtime, or if `interval` is zero.
    #[must_use]
    pub fn spawn(sources: impl IntoIterator<Item = EventSource>, interval: Duration) -> Self {
        let sources: Vec<EventSource> = sources.into_iter().collect();
        let interval = interval.min(MAX_REFRESH_INTERVAL);
        let start = tokio::time::Instant::now() + interval;
        let mut ticker = tokio::time::interval_at(start, interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        tracing::event!(
            name: "event_counters.publisher_started",
            tracing::Level::DEBUG,
            sources = sources.len(),
            interval = interval.as_secs_f32(),
        );

        let task = tokio::spawn(async move {
            loop {
                ticker.tick().await;
                for source in &sources {
                    source.publish();
                }
            }
        });

        Self { task }
    }

    /// Returns `true` once the publishing task has stopped.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Stops publishing.
    pub fn stop(self) {
        drop(self);
    }
}

impl Drop for Publisher {
    fn drop(&mut self) {
        self.task.abort();
    }
}
