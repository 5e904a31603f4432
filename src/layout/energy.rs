//! Rolling energy history and the stabilization score derived from it.

use std::collections::VecDeque;

/// Total energy of the last `window` ticks.
#[derive(Debug, Clone)]
pub struct EnergyHistory {
    window: usize,
    values: VecDeque<f64>,
    current: f64,
}

impl EnergyHistory {
    pub fn new(window: usize) -> Self {
        let window = window.max(2);
        Self {
            window,
            values: VecDeque::with_capacity(window),
            current: 0.0,
        }
    }

    /// Add one contribution to the tick in progress.
    #[inline]
    pub fn accumulate(&mut self, energy: f64) {
        self.current += energy;
    }

    /// Close the tick in progress.
    pub fn store(&mut self) {
        if self.values.len() == self.window {
            self.values.pop_front();
        }
        self.values.push_back(self.current);
        self.current = 0.0;
    }

    /// Forget every stored tick.
    pub fn clear(&mut self) {
        self.values.clear();
        self.current = 0.0;
    }

    pub fn window(&self) -> usize {
        self.window
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.values.len() == self.window
    }

    /// Energy of the last closed tick.
    pub fn last(&self) -> Option<f64> {
        self.values.back().copied()
    }

    pub fn mean(&self) -> f64 {
        if self.values.is_empty() {
            return 0.0;
        }
        self.values.iter().sum::<f64>() / self.values.len() as f64
    }

    pub fn variance(&self) -> f64 {
        if self.values.is_empty() {
            return 0.0;
        }
        let mean = self.mean();
        self.values.iter().map(|e| (e - mean) * (e - mean)).sum::<f64>() / self.values.len() as f64
    }

    /// `1 - stddev / mean` over a full window, clamped to `[0, 1]`.
    ///
    /// Zero until the window is full. A window of zero energy is stable.
    pub fn stabilization(&self) -> f64 {
        if !self.is_full() {
            return 0.0;
        }
        let mean = self.mean();
        if mean <= f64::EPSILON {
            return 1.0;
        }
        (1.0 - self.variance().sqrt() / mean).clamp(0.0, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fill(history: &mut EnergyHistory, values: impl IntoIterator<Item = f64>) {
        for v in values {
            history.accumulate(v);
            history.store();
        }
    }

    #[test]
    fn test_zero_until_full() {
        let mut history = EnergyHistory::new(4);
        fill(&mut history, [5.0, 5.0, 5.0]);
        assert_eq!(history.stabilization(), 0.0);
        fill(&mut history, [5.0]);
        assert_eq!(history.stabilization(), 1.0);
    }

    #[test]
    fn test_window_slides() {
        let mut history = EnergyHistory::new(3);
        fill(&mut history, [100.0, 1.0, 1.0, 1.0]);
        assert_eq!(history.len(), 3);
        assert_eq!(history.mean(), 1.0);
        assert_eq!(history.variance(), 0.0);
    }

    #[test]
    fn test_noisy_energy_is_unstable() {
        let mut history = EnergyHistory::new(4);
        fill(&mut history, [0.0, 10.0, 0.0, 10.0]);
        assert_eq!(history.stabilization(), 0.0);

        fill(&mut history, [9.0, 11.0, 9.0, 11.0]);
        assert!((history.stabilization() - 0.9).abs() < 1e-12);
    }

    #[test]
    fn test_clear() {
        let mut history = EnergyHistory::new(2);
        fill(&mut history, [1.0, 1.0]);
        history.accumulate(3.0);
        history.clear();
        assert!(history.is_empty());
        history.store();
        assert_eq!(history.last(), Some(0.0));
    }
}
