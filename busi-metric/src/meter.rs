/// Running average of a scalar, weighted by sample count.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct AverageMeter {
    /// Last value passed to [`update`](Self::update).
    pub val: f64,
    pub sum: f64,
    pub count: usize,
    pub avg: f64,
}

impl AverageMeter {
    pub const fn new() -> Self {
        Self {
            val: 0.0,
            sum: 0.0,
            count: 0,
            avg: 0.0,
        }
    }

    /// Records `val` as the mean over `n` samples.
    pub fn update(&mut self, val: f64, n: usize) {
        self.val = val;
        self.sum += val * n as f64;
        self.count += n;
        if self.count > 0 {
            self.avg = self.sum / self.count as f64;
        }
    }

    pub fn reset(&mut self) {
        *self = Self::new();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn average_is_weighted_by_count() {
        let mut meter = AverageMeter::new();
        meter.update(0.5, 16);
        meter.update(0.8, 4);
        meter.update(0.1, 3);

        let expected = (0.5 * 16.0 + 0.8 * 4.0 + 0.1 * 3.0) / 23.0;
        assert!((meter.avg - expected).abs() < 1e-12);
        assert_eq!(meter.count, 23);
        assert_eq!(meter.val, 0.1);
    }

    #[test]
    fn empty_updates_keep_the_average() {
        let mut meter = AverageMeter::new();
        meter.update(0.25, 0);
        assert_eq!(meter.avg, 0.0);

        meter.update(0.75, 2);
        meter.update(0.0, 0);
        assert_eq!(meter.avg, 0.75);
    }

    #[test]
    fn reset_clears_state() {
        let mut meter = AverageMeter::new();
        meter.update(1.0, 5);
        meter.reset();

        assert_eq!(meter, AverageMeter::default());
    }
}
