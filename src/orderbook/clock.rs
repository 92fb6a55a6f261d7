//! Session clock

use super::EventTime;

/// Maps a Time base plus per-record nanosecond offsets to absolute event times
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionClock {
    base_secs: u32,
}

impl SessionClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// New base from a Time message; later offsets are relative to it
    pub fn reset(&mut self, seconds: u32) {
        self.base_secs = seconds;
    }

    pub fn base_secs(&self) -> u32 {
        self.base_secs
    }

    pub fn at(&self, offset_nanos: u32) -> EventTime {
        EventTime::from_nanos(u64::from(self.base_secs) * 1_000_000_000 + u64::from(offset_nanos))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_offsets_relative_to_latest_base() {
        let mut clock = SessionClock::new();
        assert_eq!(clock.at(500), EventTime::from_nanos(500));

        clock.reset(34_200);
        assert_eq!(clock.base_secs(), 34_200);
        assert_eq!(clock.at(250_000_000).as_secs_f64(), 34_200.25);

        clock.reset(34_201);
        assert_eq!(clock.at(0), EventTime::from_secs(34_201));
    }
}
