//! Time utilities for game simulation

use std::time::Instant;

/// Server start time for uptime tracking
static SERVER_START: std::sync::OnceLock<Instant> = std::sync::OnceLock::new();

/// Initialize server start time (call once at startup)
pub fn init_server_time() {
    SERVER_START.get_or_init(Instant::now);
}

/// Get server uptime in seconds
pub fn uptime_secs() -> u64 {
    SERVER_START
        .get()
        .map(|start| start.elapsed().as_secs())
        .unwrap_or(0)
}

/// Tick rate configuration
pub const SIMULATION_TPS: u32 = 60; // 60 ticks per second
pub const SNAPSHOT_TPS: u32 = 20; // 20 snapshots per second
pub const TICK_DURATION_MICROS: u64 = 1_000_000 / SIMULATION_TPS as u64;

/// Rooms with no clients for this many ticks are disposed
pub const EMPTY_ROOM_GRACE_TICKS: u64 = SIMULATION_TPS as u64 * 30;

/// Monotonic stopwatch used to measure tick deltas
#[derive(Debug, Clone)]
pub struct Timer {
    start: Instant,
}

impl Timer {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    /// Milliseconds since the last lap (or creation), then restart
    pub fn lap_ms(&mut self) -> f32 {
        let now = Instant::now();
        let elapsed = now.duration_since(self.start).as_secs_f32() * 1000.0;
        self.start = now;
        elapsed
    }
}

impl Default for Timer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn lap_measures_and_restarts() {
        let mut timer = Timer::new();
        std::thread::sleep(Duration::from_millis(20));
        let first = timer.lap_ms();
        assert!(first >= 20.0, "first lap {first}");

        let second = timer.lap_ms();
        assert!(second < first);
    }

    #[test]
    fn snapshot_rate_divides_tick_rate() {
        assert_eq!(SIMULATION_TPS % SNAPSHOT_TPS, 0);
    }
}
