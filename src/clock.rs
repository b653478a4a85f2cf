/// One-way clock offset estimator for a single remote sender.
///
/// Stores the offset such that `remote.wrapping_sub(offset)` lands on the
/// local microsecond clock. Each received timestamp pulls the estimate an
/// eighth of the way toward the new sample, which rides out per-packet
/// jitter and reordering without any round-trip exchange or buffering.
/// All arithmetic wraps; timestamps are free-running u32 microseconds.
#[derive(Debug, Clone, Copy, Default)]
pub struct PeerClock {
    offset_from_local: u32,
}

impl PeerClock {
    pub fn from_first_sample(remote: u32, local: u32) -> Self {
        Self {
            offset_from_local: remote.wrapping_sub(local),
        }
    }

    pub fn sample(&mut self, remote: u32, local: u32) {
        let predicted = self.offset_from_local.wrapping_add(local);
        let err = remote.wrapping_sub(predicted) as i32;
        self.offset_from_local = self.offset_from_local.wrapping_add((err >> 3) as u32);
    }

    pub fn remote_to_local(&self, remote: u32) -> u32 {
        remote.wrapping_sub(self.offset_from_local)
    }

    pub fn offset(&self) -> u32 {
        self.offset_from_local
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_sample_is_exact() {
        let clock = PeerClock::from_first_sample(1_500_000, 1_000_000);
        assert_eq!(clock.remote_to_local(1_500_000), 1_000_000);
        assert_eq!(clock.remote_to_local(1_600_000), 1_100_000);
    }

    #[test]
    fn converges_under_jitter() {
        // True offset 400ms; first sample lands 20ms off, later samples
        // jitter within +/-8ms of truth.
        let true_offset: u32 = 400_000;
        let jitter = [
            20_000i32, -6_000, 4_000, -8_000, 2_000, 7_000, -3_000, 1_000, -5_000, 6_000, -2_000,
            3_000,
        ];
        let mut local: u32 = 1_000_000;
        let mut clock =
            PeerClock::from_first_sample(local.wrapping_add(true_offset).wrapping_add(jitter[0] as u32), local);

        let start_err = (clock.offset().wrapping_sub(true_offset) as i32).unsigned_abs();
        let mut max_err_late = 0u32;
        for (i, j) in jitter.iter().enumerate().skip(1) {
            local = local.wrapping_add(100_000);
            let remote = local.wrapping_add(true_offset).wrapping_add(*j as u32);
            clock.sample(remote, local);
            let err = (clock.offset().wrapping_sub(true_offset) as i32).unsigned_abs();
            if i >= jitter.len() - 4 {
                max_err_late = max_err_late.max(err);
            }
        }
        let final_err = (clock.offset().wrapping_sub(true_offset) as i32).unsigned_abs();
        // Estimate settles well inside the initial 20ms error and stays
        // bounded by the jitter amplitude.
        assert_eq!(start_err, 20_000);
        assert!(final_err < 10_000, "final error {final_err}");
        assert!(max_err_late < 12_000, "late error {max_err_late}");
    }

    #[test]
    fn handles_clock_wrap() {
        // Remote clock sits just before wraparound; local just after zero.
        let local: u32 = 5_000;
        let remote: u32 = u32::MAX - 1_000;
        let mut clock = PeerClock::from_first_sample(remote, local);
        assert_eq!(clock.remote_to_local(remote), local);
        clock.sample(remote.wrapping_add(100_000), local.wrapping_add(100_000));
        assert_eq!(clock.remote_to_local(remote.wrapping_add(50_000)), local.wrapping_add(50_000));
    }
}
