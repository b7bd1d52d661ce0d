use std::collections::HashSet;

/// A chunk admitted to the playback timeline.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScheduledChunk {
    pub id: u64,
    /// Absolute start time on the playback clock, in seconds.
    pub start: f64,
    pub duration: f64,
}

/// Orders decoded audio chunks back-to-back so streamed speech plays without
/// gaps or overlap.
///
/// The scheduler only does arithmetic on a caller-supplied clock; actually
/// rendering samples at `start` is the audio backend's job.
#[derive(Debug, Default)]
pub struct PlaybackScheduler {
    next_start: f64,
    next_id: u64,
    active: HashSet<u64>,
}

impl PlaybackScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Places a chunk at the later of the queued horizon and `now`, then
    /// advances the horizon by its duration.
    pub fn schedule(&mut self, duration: f64, now: f64) -> ScheduledChunk {
        let start = if self.next_start > now { self.next_start } else { now };
        let chunk = ScheduledChunk {
            id: self.next_id,
            start,
            duration,
        };
        self.next_id += 1;
        self.next_start = start + duration;
        self.active.insert(chunk.id);
        chunk
    }

    /// Marks a chunk as finished playing. Returns false for ids already
    /// cleared by an interruption.
    pub fn on_ended(&mut self, id: u64) -> bool {
        self.active.remove(&id)
    }

    /// Drops every queued chunk and rewinds the horizon, so the next chunk
    /// plays immediately. Returns the number of chunks discarded.
    pub fn interrupt(&mut self) -> usize {
        let discarded = self.active.len();
        self.active.clear();
        self.next_start = 0.0;
        discarded
    }

    pub fn active_count(&self) -> usize {
        self.active.len()
    }

    pub fn next_start(&self) -> f64 {
        self.next_start
    }
}
