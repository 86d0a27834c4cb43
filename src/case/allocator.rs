//! Amount allocation per cycle
//!
//! Given the known total of a case and its fan-out, produce the amount each
//! delivery cycle carries so the aggregate lands under, over, or exactly on
//! the total as the case demands.
//!
//! Random slack is drawn in whole units and added to the (possibly
//! fractional) total, so exact-equality partitions stay exact. Every value
//! produced is at least 1.

use rand::Rng;
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;

use super::label::{CaseDescriptor, Direction};

/// Upper slack for single over-delivery values: `[total+1, total+1000]`
pub const OVER_DELIVERY_SLACK: i64 = 1000;
/// Headroom added to the even share for non-final over-delivery cycles
pub const ONE_TO_MANY_HEADROOM: i64 = 100;
/// Upper slack for the final over-delivery cycle: `[remaining+1, remaining+500]`
pub const FINAL_CYCLE_SLACK: i64 = 500;

#[derive(Debug, Clone, Copy)]
pub struct AmountAllocator {
    exact_equality: bool,
}

impl AmountAllocator {
    pub fn new(exact_equality: bool) -> Self {
        Self { exact_equality }
    }

    pub fn exact_equality(&self) -> bool {
        self.exact_equality
    }

    /// Amounts for each cycle of a case, in submission order.
    ///
    /// OneToMany yields `max(cycles, 1)` values; every other shape is a
    /// single delivery and yields exactly one.
    pub fn allocate<R: Rng + ?Sized>(
        &self,
        rng: &mut R,
        descriptor: &CaseDescriptor,
        total: Decimal,
        cycles: usize,
    ) -> Vec<Decimal> {
        match descriptor {
            CaseDescriptor::OneToOne(scenario) => match scenario.direction {
                Direction::UnderDelivery if self.exact_equality => vec![at_least_one(total)],
                Direction::UnderDelivery => {
                    vec![Decimal::from(draw(rng, 1, largest_below(total)))]
                }
                Direction::OverDelivery => vec![exceed(rng, total, OVER_DELIVERY_SLACK)],
            },
            CaseDescriptor::OneToMany(scenario) => {
                let cycles = cycles.max(1);
                match scenario.direction {
                    Direction::OverDelivery => over_deliver_split(rng, total, cycles),
                    Direction::UnderDelivery if self.exact_equality => {
                        partition(rng, total, cycles)
                    }
                    Direction::UnderDelivery => {
                        let hi = largest_below(total);
                        let lo = (cycles as i64).min(hi);
                        let target = Decimal::from(draw(rng, lo, hi));
                        partition(rng, target, cycles)
                    }
                }
            }
            // Equality is forced for ManyToOne under-delivery regardless of policy
            CaseDescriptor::ManyToOne(scenario) => match scenario.direction {
                Direction::UnderDelivery => vec![at_least_one(total)],
                Direction::OverDelivery => vec![exceed(rng, total, OVER_DELIVERY_SLACK)],
            },
            CaseDescriptor::Unrecognized => vec![at_least_one(total)],
        }
    }
}

/// `cycles - 1` loose values, then a final value that pushes the sum past
/// `total` by `[1, FINAL_CYCLE_SLACK]`.
fn over_deliver_split<R: Rng + ?Sized>(rng: &mut R, total: Decimal, cycles: usize) -> Vec<Decimal> {
    let share_cap = whole(total / Decimal::from(cycles as u64)).saturating_add(ONE_TO_MANY_HEADROOM);
    let mut values = Vec::with_capacity(cycles);
    let mut sum = Decimal::ZERO;

    for _ in 0..cycles - 1 {
        let value = Decimal::from(draw(rng, 1, share_cap));
        sum += value;
        values.push(value);
    }

    // If the loose values already overshoot, remaining is negative and the
    // clamp to 1 still keeps the sum above total.
    values.push(exceed(rng, total - sum, FINAL_CYCLE_SLACK));
    values
}

/// Greedy split of `target` over `cycles` values: each value is drawn from
/// `[1, floor(remaining / slots_left)]`, the last takes the exact remainder.
/// Sums to `target` whenever `target >= cycles`.
fn partition<R: Rng + ?Sized>(rng: &mut R, target: Decimal, cycles: usize) -> Vec<Decimal> {
    let mut values = Vec::with_capacity(cycles);
    let mut sum = Decimal::ZERO;

    for i in 0..cycles - 1 {
        let slots_left = Decimal::from((cycles - i) as u64);
        let cap = whole((target - sum) / slots_left);
        let value = Decimal::from(draw(rng, 1, cap));
        sum += value;
        values.push(value);
    }

    values.push(at_least_one(target - sum));
    values
}

/// `base + k` with `k` uniform in `[1, slack]`, clamped to at least 1
fn exceed<R: Rng + ?Sized>(rng: &mut R, base: Decimal, slack: i64) -> Decimal {
    at_least_one(base + Decimal::from(rng.gen_range(1..=slack)))
}

/// Uniform in `[lo, max(lo, hi)]`, with `lo` clamped to 1
fn draw<R: Rng + ?Sized>(rng: &mut R, lo: i64, hi: i64) -> i64 {
    let lo = lo.max(1);
    rng.gen_range(lo..=hi.max(lo))
}

fn whole(value: Decimal) -> i64 {
    value.floor().to_i64().unwrap_or(if value.is_sign_negative() {
        i64::MIN
    } else {
        i64::MAX
    })
}

/// Largest whole number strictly below `value`, never below 1
fn largest_below(value: Decimal) -> i64 {
    whole(value.ceil()).saturating_sub(1).max(1)
}

fn at_least_one(value: Decimal) -> Decimal {
    value.max(Decimal::ONE)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::case::label::{Scenario, SubScenario};
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn one_to_one(direction: Direction) -> CaseDescriptor {
        CaseDescriptor::OneToOne(Scenario::new(SubScenario::Happy, direction))
    }

    fn one_to_many(direction: Direction) -> CaseDescriptor {
        CaseDescriptor::OneToMany(Scenario::new(SubScenario::Happy, direction))
    }

    fn many_to_one(direction: Direction) -> CaseDescriptor {
        CaseDescriptor::ManyToOne(Scenario::new(SubScenario::Happy, direction))
    }

    fn sum(values: &[Decimal]) -> Decimal {
        values.iter().copied().sum()
    }

    fn d(v: i64) -> Decimal {
        Decimal::from(v)
    }

    #[test]
    fn test_one_to_one_under_exact() {
        let mut rng = StdRng::seed_from_u64(1);
        let allocator = AmountAllocator::new(true);
        for total in [1, 2, 150, 9999] {
            let values = allocator.allocate(&mut rng, &one_to_one(Direction::UnderDelivery), d(total), 1);
            assert_eq!(values, vec![d(total)]);
        }
    }

    #[test]
    fn test_one_to_one_under_loose_stays_below() {
        let mut rng = StdRng::seed_from_u64(2);
        let allocator = AmountAllocator::new(false);
        for total in 2..400 {
            let values = allocator.allocate(&mut rng, &one_to_one(Direction::UnderDelivery), d(total), 1);
            assert_eq!(values.len(), 1);
            assert!(values[0] >= Decimal::ONE && values[0] < d(total), "total={total} got={values:?}");
        }
    }

    #[test]
    fn test_one_to_one_over_exceeds_with_bounded_slack() {
        let mut rng = StdRng::seed_from_u64(3);
        for exact in [true, false] {
            let allocator = AmountAllocator::new(exact);
            for total in [0, 1, 500, 12345] {
                let values = allocator.allocate(&mut rng, &one_to_one(Direction::OverDelivery), d(total), 1);
                assert_eq!(values.len(), 1);
                assert!(values[0] > d(total));
                assert!(values[0] <= d(total + OVER_DELIVERY_SLACK));
            }
        }
    }

    #[test]
    fn test_one_to_many_over_sum_exceeds_total() {
        let mut rng = StdRng::seed_from_u64(4);
        let allocator = AmountAllocator::new(false);
        for total in [1, 10, 150, 5000] {
            for cycles in 1..=5 {
                let values =
                    allocator.allocate(&mut rng, &one_to_many(Direction::OverDelivery), d(total), cycles);
                assert_eq!(values.len(), cycles);
                assert!(sum(&values) > d(total), "total={total} cycles={cycles} got={values:?}");
                assert!(values.iter().all(|v| *v >= Decimal::ONE));
            }
        }
    }

    #[test]
    fn test_one_to_many_under_exact_sums_to_total() {
        let mut rng = StdRng::seed_from_u64(5);
        let allocator = AmountAllocator::new(true);
        for total in [3, 7, 150, 4321] {
            for cycles in 1..=3 {
                let values =
                    allocator.allocate(&mut rng, &one_to_many(Direction::UnderDelivery), d(total), cycles);
                assert_eq!(values.len(), cycles);
                assert_eq!(sum(&values), d(total));
                assert!(values.iter().all(|v| *v >= Decimal::ONE));
            }
        }
    }

    #[test]
    fn test_one_to_many_under_exact_keeps_fractional_total() {
        let mut rng = StdRng::seed_from_u64(6);
        let allocator = AmountAllocator::new(true);
        let total = Decimal::new(15075, 2); // 150.75
        let values = allocator.allocate(&mut rng, &one_to_many(Direction::UnderDelivery), total, 3);
        assert_eq!(sum(&values), total);
    }

    #[test]
    fn test_one_to_many_under_loose_stays_below() {
        let mut rng = StdRng::seed_from_u64(7);
        let allocator = AmountAllocator::new(false);
        for total in [4, 20, 150, 8000] {
            for cycles in 2..=3 {
                for _ in 0..50 {
                    let values = allocator.allocate(
                        &mut rng,
                        &one_to_many(Direction::UnderDelivery),
                        d(total),
                        cycles,
                    );
                    assert_eq!(values.len(), cycles);
                    let s = sum(&values);
                    assert!(s > Decimal::ZERO && s < d(total), "total={total} got={values:?}");
                }
            }
        }
    }

    #[test]
    fn test_many_to_one_under_ignores_policy() {
        let mut rng = StdRng::seed_from_u64(8);
        for exact in [true, false] {
            let values = AmountAllocator::new(exact).allocate(
                &mut rng,
                &many_to_one(Direction::UnderDelivery),
                d(300),
                1,
            );
            assert_eq!(values, vec![d(300)]);
        }
    }

    #[test]
    fn test_many_to_one_over() {
        let mut rng = StdRng::seed_from_u64(9);
        let values = AmountAllocator::new(true).allocate(
            &mut rng,
            &many_to_one(Direction::OverDelivery),
            d(300),
            1,
        );
        assert_eq!(values.len(), 1);
        assert!(values[0] > d(300) && values[0] <= d(1300));
    }

    #[test]
    fn test_unrecognized_preserves_total() {
        let mut rng = StdRng::seed_from_u64(10);
        let values =
            AmountAllocator::new(false).allocate(&mut rng, &CaseDescriptor::Unrecognized, d(42), 3);
        assert_eq!(values, vec![d(42)]);
    }

    #[test]
    fn test_non_positive_totals_clamp_to_one() {
        let mut rng = StdRng::seed_from_u64(11);
        let loose = AmountAllocator::new(false);
        let exact = AmountAllocator::new(true);

        assert_eq!(
            exact.allocate(&mut rng, &one_to_one(Direction::UnderDelivery), d(0), 1),
            vec![Decimal::ONE]
        );
        assert_eq!(
            loose.allocate(&mut rng, &one_to_one(Direction::UnderDelivery), d(-5), 1),
            vec![Decimal::ONE]
        );
        assert_eq!(
            loose.allocate(&mut rng, &CaseDescriptor::Unrecognized, d(-5), 1),
            vec![Decimal::ONE]
        );
        let values = loose.allocate(&mut rng, &one_to_many(Direction::UnderDelivery), d(0), 2);
        assert!(values.iter().all(|v| *v >= Decimal::ONE));
    }

    #[test]
    fn test_largest_below() {
        assert_eq!(largest_below(d(10)), 9);
        assert_eq!(largest_below(Decimal::new(105, 1)), 10);
        assert_eq!(largest_below(d(1)), 1);
        assert_eq!(largest_below(d(-3)), 1);
    }
}
