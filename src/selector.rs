//! Weighted selection over an ordered list.
//!
//! Each entry owns the half-open slice `[start, start + weight)` of the range
//! `[0, total)`, laid out in insertion order. A draw `r` selects the first entry
//! whose running sum is strictly greater than `r`, so with weights
//! `[85, 10, 5]` the draw `85.0` belongs to the second entry and `95.0` to the
//! third. The probability of selecting entry `i` is `weight_i / total`.
//!
//! The total is recomputed on every call.

use rand::Rng;

use crate::error::{Error, Result};

/// Anything carrying a selection weight.
pub trait Weighted {
    fn weight(&self) -> f64;
}

impl Weighted for f64 {
    fn weight(&self) -> f64 {
        *self
    }
}

impl<T> Weighted for (f64, T) {
    fn weight(&self) -> f64 {
        self.0
    }
}

/// Sum of all weights in `items`.
pub fn total_weight<T: Weighted>(items: &[T]) -> f64 {
    items.iter().map(Weighted::weight).sum()
}

/// A total the draw range can be built from. Finite individual weights can
/// still sum to infinity.
fn usable_total<T>(items: &[T], total: f64) -> bool {
    !items.is_empty() && total.is_finite() && total > 0.0
}

/// Selects the entry owning `draw`, where `draw` must lie in `[0, total)`.
///
/// Pure function: given the same list and the same draw it always returns the
/// same entry, which keeps runs reproducible under a seeded random source.
pub fn select_weighted<T: Weighted>(items: &[T], draw: f64) -> Result<&T> {
    let total = total_weight(items);
    if !usable_total(items, total) {
        return Err(Error::EmptyOrInvalidCaseSet);
    }
    if !(0.0..total).contains(&draw) {
        return Err(Error::DrawOutOfRange { draw, total });
    }

    let mut running = 0.0;
    for item in items {
        running += item.weight();
        if draw < running {
            return Ok(item);
        }
    }

    // Only reachable through floating point drift between the two sums.
    items
        .iter()
        .rev()
        .find(|item| item.weight() > 0.0)
        .ok_or(Error::EmptyOrInvalidCaseSet)
}

/// Draws uniformly from `[0, total)` and selects the matching entry.
pub fn pick_weighted<'a, T: Weighted, R: Rng + ?Sized>(items: &'a [T], rng: &mut R) -> Result<&'a T> {
    let total = total_weight(items);
    if !usable_total(items, total) {
        return Err(Error::EmptyOrInvalidCaseSet);
    }
    select_weighted(items, rng.gen_range(0.0..total))
}
