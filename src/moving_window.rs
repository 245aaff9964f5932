//! A window following a relativistic driver along +z. It only decides when
//! and by how many cells to shift; `Sim::shift_window` moves the data.
use crate::boost::BoostConverter;
use crate::config::MovingWindowParams;
use crate::{Float, E_TOL};
use tracing::debug;

pub struct MovingWindow {
    /// Window velocity in the simulation frame.
    v: Float,
    period: u32,
    /// Distance travelled and not yet applied as a shift.
    offset: Float,
    /// Total number of cells shifted so far.
    n_shifted: usize,
}

impl MovingWindow {
    pub fn new(params: &MovingWindowParams, boost: Option<&BoostConverter>) -> MovingWindow {
        let v = match boost {
            Some(b) => b.velocity_to_boosted(params.v),
            None => params.v,
        };
        debug!(v, period = params.period, "moving window enabled");
        MovingWindow {
            v,
            period: params.period,
            offset: 0.0,
            n_shifted: 0,
        }
    }

    pub fn velocity(&self) -> Float {
        self.v
    }

    pub fn n_shifted(&self) -> usize {
        self.n_shifted
    }

    /// Record one step of motion and return the number of whole cells to
    /// shift now. Shifts only happen on steps that are multiples of the
    /// period and never go backwards.
    pub fn advance(&mut self, step: u64, dt: Float, dz: Float) -> usize {
        self.offset += self.v * dt;
        if step % self.period as u64 != 0 || self.offset <= 0.0 {
            return 0;
        }
        let n = (self.offset / dz + E_TOL).floor() as usize;
        if n > 0 {
            self.offset -= n as Float * dz;
            self.n_shifted += n;
        }
        n
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consts::C;

    fn params(v: Float, period: u32) -> MovingWindowParams {
        MovingWindowParams { v, period }
    }

    #[test]
    fn light_speed_window_shifts_every_step() {
        let dz = 1e-6;
        let mut w = MovingWindow::new(&params(C, 1), None);
        let shifts: Vec<usize> = (1..=100).map(|s| w.advance(s, dz / C, dz)).collect();
        assert!(shifts.iter().all(|&n| n == 1));
        assert_eq!(w.n_shifted(), 100);
    }

    #[test]
    fn period_groups_shifts() {
        let dz = 1e-6;
        let mut w = MovingWindow::new(&params(C, 4), None);
        let shifts: Vec<usize> = (1..=8).map(|s| w.advance(s, dz / C, dz)).collect();
        assert_eq!(shifts, vec![0, 0, 0, 4, 0, 0, 0, 4]);
    }

    #[test]
    fn slow_window_accumulates() {
        let dz = 1e-6;
        let mut w = MovingWindow::new(&params(0.5 * C, 1), None);
        let total: usize = (1..=10).map(|s| w.advance(s, dz / C, dz)).sum();
        assert_eq!(total, 5);
        let mut back = MovingWindow::new(&params(-C, 1), None);
        assert_eq!(back.advance(1, dz / C, dz), 0);
    }

    #[test]
    fn boosted_window_keeps_light_speed() {
        let boost = BoostConverter::new(10.0);
        let w = MovingWindow::new(&params(C, 1), Some(&boost));
        assert!((w.velocity() - C).abs() < 1E-12 * C);
    }
}
