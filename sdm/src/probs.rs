//! Utilities for working with probabilities.

pub trait SliceExt {
    fn sum(&self) -> f64;
    fn normalise(&mut self, target: f64) -> f64;
    fn scale(&mut self, factor: f64);
}
impl SliceExt for [f64] {
    fn sum(&self) -> f64 {
        self.iter().sum()
    }

    /// Rescales the slice so that it sums to `target`, returning the sum prior to rescaling.
    fn normalise(&mut self, target: f64) -> f64 {
        let sum = self.sum();
        self.scale(target / sum);
        sum
    }

    fn scale(&mut self, factor: f64) {
        for element in self {
            *element *= factor;
        }
    }
}

#[inline]
pub fn clamp_probability(prob: f64, epsilon: f64) -> f64 {
    prob.clamp(epsilon, 1.0 - epsilon)
}

/// Log-odds of `prob`, with the argument clamped to `[1e-12, 1 - 1e-12]`.
#[inline]
pub fn logit(prob: f64) -> f64 {
    let prob = clamp_probability(prob, 1e-12);
    f64::ln(prob / (1.0 - prob))
}

/// Logistic function, evaluated on whichever branch avoids overflowing `exp`.
#[inline]
pub fn sigmoid(x: f64) -> f64 {
    if x >= 0.0 {
        1.0 / (1.0 + f64::exp(-x))
    } else {
        let z = f64::exp(x);
        z / (1.0 + z)
    }
}
