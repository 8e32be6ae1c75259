//! Tunable trade-offs between delta size and full-content resends.

use crate::error::PolicyError;
use num_traits::AsPrimitive;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Decides when a container's children are re-rendered wholesale instead of being diffed.
///
/// Both ratios trade the size of a fine-grained delta against resending the container's full content.
/// The defaults match what server-rendered pages with mostly small updates benefit from,
/// but there is nothing canonical about them.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize), serde(default))]
pub struct RenderPolicy {
	/// A growing container is re-rendered fully if `previous / current` child count falls below this.
	pub minimum_retained_ratio: f64,
	/// After diffing, a container is re-rendered fully if `(deletes + adds) / current` child count exceeds this.
	pub maximum_change_ratio: f64,
	/// Maximum container nesting the reconciler descends into before giving up.
	pub depth_limit: usize,
}
impl Default for RenderPolicy {
	fn default() -> Self {
		Self {
			minimum_retained_ratio: 0.10,
			maximum_change_ratio: 0.9,
			depth_limit: 512,
		}
	}
}
impl RenderPolicy {
	#[must_use]
	pub fn with_minimum_retained_ratio(self, minimum_retained_ratio: f64) -> Self {
		Self { minimum_retained_ratio, ..self }
	}

	#[must_use]
	pub fn with_maximum_change_ratio(self, maximum_change_ratio: f64) -> Self {
		Self { maximum_change_ratio, ..self }
	}

	#[must_use]
	pub fn with_depth_limit(self, depth_limit: usize) -> Self {
		Self { depth_limit, ..self }
	}

	/// # Errors
	///
	/// Iff a ratio is not finite or outside `0.0..=1.0`, or the depth limit is zero.
	pub fn validate(&self) -> Result<(), PolicyError> {
		for &(name, value) in &[("minimum_retained_ratio", self.minimum_retained_ratio), ("maximum_change_ratio", self.maximum_change_ratio)] {
			if !value.is_finite() || !(0.0..=1.0).contains(&value) {
				return Err(PolicyError::RatioOutOfRange { name, value });
			}
		}
		if self.depth_limit == 0 {
			return Err(PolicyError::ZeroDepthLimit);
		}
		Ok(())
	}

	/// Whether a container that grew from `previous` to `current` children should skip diffing.
	#[must_use]
	pub fn prefers_full_render(&self, previous: usize, current: usize) -> bool {
		previous < current && ratio(previous, current) < self.minimum_retained_ratio
	}

	/// Whether `changes` (deletes plus adds) are too many for `current` children to be worth a delta.
	///
	/// Always `false` for an emptied container, which is cheapest to clear through plain deletes.
	#[must_use]
	pub fn rejects_delta(&self, changes: usize, current: usize) -> bool {
		current > 0 && ratio(changes, current) > self.maximum_change_ratio
	}
}

fn ratio(numerator: usize, denominator: usize) -> f64 {
	let numerator: f64 = numerator.as_();
	let denominator: f64 = denominator.as_();
	numerator / denominator
}
