use rand::Rng;

pub const BACKGROUND_EVENT_MIN_ELAPSED_MS: i64 = 10_000;

/// Lifecycle transitions of the app
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum BackgroundAction {
    Paused = 2,
    Resumed = 3,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackgroundEvent {
    pub action: BackgroundAction,
    /// Absolute time of the transition, milliseconds since the epoch
    pub timestamp_ms: i64,
}

#[derive(Debug, Clone, Default)]
pub struct BackgroundEventList {
    pub events: Vec<BackgroundEvent>,
}

impl BackgroundEventList {
    /// Regenerate the list. With probability `1 / odds`, and only once at least
    /// [`BACKGROUND_EVENT_MIN_ELAPSED_MS`] have passed, emits 2-4 pause/resume
    /// pairs with increasing timestamps after `start_ms`.
    pub fn randomize<R: Rng + ?Sized>(&mut self, rng: &mut R, start_ms: i64, elapsed_ms: i64, odds: u32) {
        self.events.clear();

        if rng.gen_range(0..odds.max(1)) > 0 {
            return;
        }
        if elapsed_ms < BACKGROUND_EVENT_MIN_ELAPSED_MS {
            return;
        }

        let pairs = rng.gen_range(2..5);
        let mut timestamp = start_ms + rng.gen_range(1_000..3_000);
        for _ in 0..pairs {
            self.events.push(BackgroundEvent {
                action: BackgroundAction::Paused,
                timestamp_ms: timestamp,
            });
            timestamp += rng.gen_range(2_000..20_000);
            self.events.push(BackgroundEvent {
                action: BackgroundAction::Resumed,
                timestamp_ms: timestamp,
            });
            timestamp += rng.gen_range(1_000..10_000);
        }
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

impl std::fmt::Display for BackgroundEventList {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for event in &self.events {
            write!(f, "{},{};", event.action as u8, event.timestamp_ms)?;
        }
        Ok(())
    }
}
