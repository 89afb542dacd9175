//! Input-bit encoding: send pacing and edge gating.

use std::time::{Duration, Instant};

use glam::Vec2;

use starlance::net::protocol::{INPUT_DOWN, INPUT_LEFT, INPUT_RIGHT, INPUT_UP};

/// Input datagram cadence (~30 Hz).
pub const SEND_INTERVAL: Duration = Duration::from_nanos(33_333_333);

/// On-screen ship rectangle used for gating.
pub const DRAW_W: f32 = 24.0;
pub const DRAW_H: f32 = 16.0;

/// The band the local ship may occupy: HUD rows are reserved above
/// `min_y` and below `max_y`, the sides clamp to `[0, width - DRAW_W]`.
#[derive(Debug, Clone, Copy)]
pub struct PlayableBand {
    pub min_y: f32,
    pub max_y: f32,
    pub width: f32,
}

impl Default for PlayableBand {
    fn default() -> Self {
        Self {
            min_y: 16.0,
            max_y: 540.0,
            width: 960.0,
        }
    }
}

/// Suppresses direction bits that would push the ship's draw rectangle
/// across the band boundary. With no known self position the bits pass
/// through untouched.
pub fn gate_bits(bits: u8, self_pos: Option<Vec2>, band: &PlayableBand) -> u8 {
    let Some(pos) = self_pos else {
        return bits;
    };
    let mut gated = bits & !(INPUT_LEFT | INPUT_RIGHT | INPUT_UP | INPUT_DOWN);
    if bits & INPUT_LEFT != 0 && pos.x > 0.0 {
        gated |= INPUT_LEFT;
    }
    if bits & INPUT_RIGHT != 0 && pos.x + DRAW_W < band.width {
        gated |= INPUT_RIGHT;
    }
    if bits & INPUT_UP != 0 && pos.y > band.min_y {
        gated |= INPUT_UP;
    }
    if bits & INPUT_DOWN != 0 && pos.y + DRAW_H < band.max_y {
        gated |= INPUT_DOWN;
    }
    gated
}

/// Rate limiter plus sequence counter for input datagrams.
#[derive(Debug)]
pub struct InputPacer {
    last_send: Instant,
    sequence: u32,
}

impl InputPacer {
    pub fn new(now: Instant) -> Self {
        Self {
            // Primed so the first sample goes straight out.
            last_send: now - 2 * SEND_INTERVAL,
            sequence: 0,
        }
    }

    /// Returns the sequence number to use when a send is due, `None`
    /// while the interval has not elapsed yet.
    pub fn try_send(&mut self, now: Instant) -> Option<u32> {
        if now.saturating_duration_since(self.last_send) <= SEND_INTERVAL {
            return None;
        }
        self.last_send = now;
        self.sequence = self.sequence.wrapping_add(1);
        Some(self.sequence)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use starlance::net::protocol::{INPUT_CHARGE, INPUT_SHOOT};

    #[test]
    fn ungated_without_self_position() {
        let band = PlayableBand::default();
        let bits = INPUT_LEFT | INPUT_UP | INPUT_SHOOT;
        assert_eq!(gate_bits(bits, None, &band), bits);
    }

    #[test]
    fn interior_position_passes_all_directions() {
        let band = PlayableBand::default();
        let bits = INPUT_LEFT | INPUT_RIGHT | INPUT_UP | INPUT_DOWN;
        let pos = Some(Vec2::new(400.0, 300.0));
        assert_eq!(gate_bits(bits, pos, &band), bits);
    }

    #[test]
    fn edges_suppress_exactly_the_crossing_direction() {
        let band = PlayableBand::default();
        let all = INPUT_LEFT | INPUT_RIGHT | INPUT_UP | INPUT_DOWN;

        // Flush against the left wall.
        let at_left = Some(Vec2::new(0.0, 300.0));
        assert_eq!(gate_bits(all, at_left, &band), all & !INPUT_LEFT);

        // Draw rectangle touching the right wall.
        let at_right = Some(Vec2::new(band.width - DRAW_W, 300.0));
        assert_eq!(gate_bits(all, at_right, &band), all & !INPUT_RIGHT);

        // On the HUD line above.
        let at_top = Some(Vec2::new(400.0, band.min_y));
        assert_eq!(gate_bits(all, at_top, &band), all & !INPUT_UP);

        // Bottom of the band.
        let at_bottom = Some(Vec2::new(400.0, band.max_y - DRAW_H));
        assert_eq!(gate_bits(all, at_bottom, &band), all & !INPUT_DOWN);
    }

    #[test]
    fn corner_suppresses_both_axes() {
        let band = PlayableBand::default();
        let all = INPUT_LEFT | INPUT_RIGHT | INPUT_UP | INPUT_DOWN | INPUT_SHOOT | INPUT_CHARGE;
        let corner = Some(Vec2::new(0.0, band.min_y));
        assert_eq!(
            gate_bits(all, corner, &band),
            INPUT_RIGHT | INPUT_DOWN | INPUT_SHOOT | INPUT_CHARGE
        );
    }

    #[test]
    fn pacer_holds_thirty_hertz() {
        let t0 = Instant::now();
        let mut pacer = InputPacer::new(t0);

        assert_eq!(pacer.try_send(t0), Some(1));
        assert_eq!(pacer.try_send(t0 + Duration::from_millis(10)), None);
        assert_eq!(pacer.try_send(t0 + Duration::from_millis(20)), None);
        assert_eq!(pacer.try_send(t0 + Duration::from_millis(40)), Some(2));
    }

    #[test]
    fn sequences_increase_monotonically() {
        let t0 = Instant::now();
        let mut pacer = InputPacer::new(t0);
        let mut last = 0;
        for i in 1..=10u64 {
            if let Some(seq) = pacer.try_send(t0 + Duration::from_millis(40 * i)) {
                assert!(seq > last);
                last = seq;
            }
        }
        assert!(last >= 10);
    }
}
