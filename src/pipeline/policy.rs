//! Values assigned to a catalog row when an app is first published.

use rand::Rng;

use crate::config::PolicyConfig;

pub trait InitialValuePolicy: Send + Sync {
    /// Starting rating, within `0.0..=5.0`.
    fn rating(&self) -> f64;
    fn featured(&self) -> bool;
}

/// Uniform rating in a configured range, rounded to one decimal, and a
/// featured flag drawn with a fixed probability.
#[derive(Debug, Clone)]
pub struct RandomPolicy {
    rating_min: f64,
    rating_max: f64,
    featured_probability: f64,
}

impl RandomPolicy {
    pub fn new(rating_min: f64, rating_max: f64, featured_probability: f64) -> Self {
        let lo = rating_min.clamp(0.0, 5.0);
        let hi = rating_max.clamp(0.0, 5.0);
        Self {
            rating_min: lo.min(hi),
            rating_max: lo.max(hi),
            featured_probability: if featured_probability.is_nan() {
                0.0
            } else {
                featured_probability.clamp(0.0, 1.0)
            },
        }
    }

    pub fn from_config(config: &PolicyConfig) -> Self {
        Self::new(config.rating_min, config.rating_max, config.featured_probability)
    }
}

impl Default for RandomPolicy {
    fn default() -> Self {
        Self::from_config(&PolicyConfig::default())
    }
}

impl InitialValuePolicy for RandomPolicy {
    fn rating(&self) -> f64 {
        let raw = rand::rng().random_range(self.rating_min..=self.rating_max);
        // Rounding can step just past either bound.
        ((raw * 10.0).round() / 10.0).clamp(self.rating_min, self.rating_max)
    }

    fn featured(&self) -> bool {
        rand::rng().random_bool(self.featured_probability)
    }
}

/// Constant values, for tests and reproducible runs.
#[derive(Debug, Clone, Copy)]
pub struct FixedPolicy {
    pub rating: f64,
    pub featured: bool,
}

impl InitialValuePolicy for FixedPolicy {
    fn rating(&self) -> f64 {
        self.rating
    }

    fn featured(&self) -> bool {
        self.featured
    }
}
