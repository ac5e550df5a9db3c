//! Per-run counters and phase timers.

use std::fmt;
use std::time::{Duration, Instant};

/// Collected by each engine and reported once at the end of a run (and on
/// soft timeout). Passed around explicitly; there is no global logger.
pub struct Statistics {
    begin: Instant,
    tick: Instant,
    timelimit: Option<Duration>,

    pub main_solver_calls: u64,
    pub main_solver_time: Duration,
    pub inv_solver_time: Duration,
    pub get_new_level_time: Duration,
    pub update_uc_time: Duration,
    pub lift_time: Duration,
    pub propagation_time: Duration,
    pub start_solver_time: Duration,
    pub restarts: u64,
}

impl Statistics {
    pub fn new(timelimit_secs: Option<u64>) -> Self {
        let now = Instant::now();
        Statistics {
            begin: now,
            tick: now,
            timelimit: timelimit_secs.map(Duration::from_secs),
            main_solver_calls: 0,
            main_solver_time: Duration::ZERO,
            inv_solver_time: Duration::ZERO,
            get_new_level_time: Duration::ZERO,
            update_uc_time: Duration::ZERO,
            lift_time: Duration::ZERO,
            propagation_time: Duration::ZERO,
            start_solver_time: Duration::ZERO,
            restarts: 0,
        }
    }

    /// Start timing a phase; pair with one of the `stat_*` calls.
    pub fn tick(&mut self) {
        self.tick = Instant::now();
    }

    pub fn stat_main_solver(&mut self) {
        self.main_solver_time += self.tick.elapsed();
        self.main_solver_calls += 1;
    }

    pub fn stat_inv_solver(&mut self) {
        self.inv_solver_time += self.tick.elapsed();
    }

    pub fn stat_get_new_level(&mut self) {
        self.get_new_level_time += self.tick.elapsed();
    }

    pub fn stat_update_uc(&mut self) {
        self.update_uc_time += self.tick.elapsed();
    }

    pub fn stat_lift(&mut self) {
        self.lift_time += self.tick.elapsed();
    }

    pub fn stat_propagation(&mut self) {
        self.propagation_time += self.tick.elapsed();
    }

    pub fn stat_start_solver(&mut self) {
        self.start_solver_time += self.tick.elapsed();
    }

    pub fn count_restart(&mut self) {
        self.restarts += 1;
    }

    pub fn is_timeout(&self) -> bool {
        match self.timelimit {
            Some(limit) => self.begin.elapsed() > limit,
            None => false,
        }
    }

    pub fn report(&self) {
        log::info!("{self}");
    }
}

impl fmt::Display for Statistics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "main solver calls:   {}", self.main_solver_calls)?;
        writeln!(f, "main solver time:    {:.3}s", self.main_solver_time.as_secs_f64())?;
        writeln!(f, "inv solver time:     {:.3}s", self.inv_solver_time.as_secs_f64())?;
        writeln!(f, "relocation time:     {:.3}s", self.get_new_level_time.as_secs_f64())?;
        writeln!(f, "core handling time:  {:.3}s", self.update_uc_time.as_secs_f64())?;
        writeln!(f, "lifting time:        {:.3}s", self.lift_time.as_secs_f64())?;
        writeln!(f, "propagation time:    {:.3}s", self.propagation_time.as_secs_f64())?;
        writeln!(f, "start solver time:   {:.3}s", self.start_solver_time.as_secs_f64())?;
        writeln!(f, "restarts:            {}", self.restarts)?;
        write!(f, "total time:          {:.3}s", self.begin.elapsed().as_secs_f64())
    }
}
