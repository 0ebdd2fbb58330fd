use std::f32::consts::TAU;

use glam::{vec3, Mat4};

pub const FLOAT_PERIOD: u32 = 1000;
pub const SPIN_PERIOD: u32 = 500;

const FLOAT_AMPLITUDE: f32 = 0.1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Spin {
    pub period: u32,
    pub counter: u32,
}

impl Spin {
    pub fn new(period: u32) -> Self {
        Self { period, counter: 0 }
    }

    fn angle(&self) -> f32 {
        -(self.counter as f32 / self.period as f32) * TAU
    }
}

/// Bobbing up and down, optionally spinning clockwise about +Y.
///
/// Stepping is the only mutation, so the transform is a pure function of the counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Animation {
    pub float_period: u32,
    pub float_counter: u32,
    pub spin: Option<Spin>,
}

impl Default for Animation {
    fn default() -> Self {
        Self::floating(FLOAT_PERIOD)
    }
}

impl Animation {
    pub fn floating(float_period: u32) -> Self {
        assert!(float_period > 0, "Animation period must be positive");
        Self {
            float_period,
            float_counter: 0,
            spin: None,
        }
    }

    pub fn with_phase(mut self, counter: u32) -> Self {
        self.set_float_phase(counter);
        self
    }

    pub fn set_float_phase(&mut self, counter: u32) {
        self.float_counter = counter % self.float_period;
    }

    pub fn set_spin_enabled(&mut self, enabled: bool) {
        self.spin = enabled.then(|| Spin::new(SPIN_PERIOD));
    }

    pub fn is_spinning(&self) -> bool {
        self.spin.is_some()
    }

    pub fn step(&mut self) {
        self.float_counter = (self.float_counter + 1) % self.float_period;
        if let Some(spin) = self.spin.as_mut() {
            spin.counter = (spin.counter + 1) % spin.period;
        }
    }

    /// Lift first, then spin about the local origin.
    pub fn transform(&self) -> Mat4 {
        let angle = self.float_counter as f32 / self.float_period as f32 * TAU;
        let height = (angle.sin() + 1.0) * FLOAT_AMPLITUDE;
        let lift = Mat4::from_translation(vec3(0.0, height, 0.0));

        match self.spin {
            Some(spin) => Mat4::from_rotation_y(spin.angle()) * lift,
            None => lift,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn float_returns_after_one_period() {
        for period in [1, 7, FLOAT_PERIOD] {
            let mut animation = Animation::floating(period).with_phase(3);
            let start = animation.transform();
            (0..period).for_each(|_| animation.step());
            assert_eq!(animation.transform(), start);
        }
    }

    #[test]
    fn spin_and_float_share_a_period() {
        let mut animation = Animation::default();
        animation.set_spin_enabled(true);
        let start = animation.transform();
        (0..FLOAT_PERIOD).for_each(|_| animation.step());
        assert_eq!(animation.transform(), start);
    }

    #[test]
    fn height_stays_within_amplitude() {
        let mut animation = Animation::default();
        for _ in 0..FLOAT_PERIOD {
            animation.step();
            let y = animation.transform().w_axis.y;
            assert!((0.0..=2.0 * FLOAT_AMPLITUDE + f32::EPSILON).contains(&y));
        }
    }

    #[test]
    fn toggling_spin_restarts_it() {
        let mut animation = Animation::default();
        animation.set_spin_enabled(true);
        (0..10).for_each(|_| animation.step());
        animation.set_spin_enabled(true);
        assert_eq!(animation.spin, Some(Spin::new(SPIN_PERIOD)));
        animation.set_spin_enabled(false);
        assert!(!animation.is_spinning());
    }

    #[test]
    fn phase_wraps() {
        let animation = Animation::floating(100).with_phase(250);
        assert_eq!(animation.float_counter, 50);
    }
}
