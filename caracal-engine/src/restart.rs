//! Restart scheduling for the CAR engines.

use crate::settings::Settings;

/// The Luby series, memoized: 1 1 2 1 1 2 4 1 1 2 1 1 2 4 8 ...
#[derive(Default)]
pub struct Luby {
    series: Vec<u64>,
    index: usize,
}

impl Luby {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next(&mut self) -> u64 {
        while self.series.len() <= self.index {
            self.push_one();
        }
        let v = self.series[self.index];
        self.index += 1;
        v
    }

    fn push_one(&mut self) {
        let size = self.series.len();
        // series[n] = 2^(k-1) when n + 2 = 2^k, else series[n - 2^k + 1].
        let k = usize::BITS - (size + 2).leading_zeros() - 1;
        if size + 2 == 1 << k {
            self.series.push(1 << (k - 1));
        } else {
            self.series.push(self.series[size - ((1 << k) - 1)]);
        }
    }
}

/// Counts recorded unsat cores against a threshold that grows either
/// geometrically or along the Luby series.
pub struct RestartSchedule {
    luby: Option<Luby>,
    base_threshold: u64,
    threshold: u64,
    growth_rate: f64,
    uc_count: u64,
}

impl RestartSchedule {
    pub fn new(settings: &Settings) -> Self {
        RestartSchedule {
            luby: settings.luby.then(Luby::new),
            base_threshold: settings.restart_threshold as u64,
            threshold: settings.restart_threshold as u64,
            growth_rate: settings.restart_growth_rate,
            uc_count: 0,
        }
    }

    pub fn record_uc(&mut self) {
        self.uc_count += 1;
    }

    pub fn should_restart(&self) -> bool {
        self.uc_count > self.threshold
    }

    /// Called after a restart fires: reset the count, grow the threshold.
    pub fn advance(&mut self) {
        self.uc_count = 0;
        self.threshold = match &mut self.luby {
            Some(luby) => luby.next() * self.base_threshold,
            None => (self.threshold as f64 * self.growth_rate) as u64,
        };
        log::debug!("restart threshold now {}", self.threshold);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn luby_prefix() {
        let mut luby = Luby::new();
        let prefix: Vec<u64> = (0..15).map(|_| luby.next()).collect();
        assert_eq!(prefix, vec![1, 1, 2, 1, 1, 2, 4, 1, 1, 2, 1, 1, 2, 4, 8]);
    }

    #[test]
    fn geometric_growth() {
        let settings = Settings {
            restart: true,
            restart_threshold: 100,
            restart_growth_rate: 1.5,
            ..Default::default()
        };
        let mut r = RestartSchedule::new(&settings);
        for _ in 0..=100 {
            r.record_uc();
        }
        assert!(r.should_restart());
        r.advance();
        assert!(!r.should_restart());
        for _ in 0..=150 {
            r.record_uc();
        }
        assert!(r.should_restart());
    }
}
