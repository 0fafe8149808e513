//! Read plans: what to inventory, where, and how.
//!
//! The active plan lives in the parameter registry under
//! `/reader/read/plan` and is consulted by every synchronous and
//! background read. A [`SimpleReadPlan`] names the antennas, protocol, an
//! optional singulation filter, and an optional embedded operation. A
//! [`MultiReadPlan`] sequences several simple plans within one read
//! interval, splitting the duration proportionally to each child's weight.
//!
//! Multi plans are one level deep: children are simple plans by
//! construction, so the nesting invariant cannot be violated at runtime.

use crate::tagop::{TagFilter, TagOp};
use crate::types::TagProtocol;

/// Default weight assigned to a simple plan.
pub const DEFAULT_WEIGHT: u32 = 1000;

/// A single-protocol inventory description.
#[derive(Debug, Clone, PartialEq)]
pub struct SimpleReadPlan {
    /// Antenna ports to cycle through, in order.
    pub antennas: Vec<u8>,
    /// Air protocol to inventory.
    pub protocol: TagProtocol,
    /// Optional singulation filter.
    pub filter: Option<TagFilter>,
    /// Optional operation executed against every singulated tag; its
    /// result bytes are attached to each [`TagReadData`](crate::types::TagReadData).
    pub op: Option<TagOp>,
    /// Relative share of the read interval when part of a multi plan.
    pub weight: u32,
}

impl SimpleReadPlan {
    /// A plan for one antenna and one protocol, no filter, no embedded op.
    pub fn new(antennas: Vec<u8>, protocol: TagProtocol) -> Self {
        SimpleReadPlan {
            antennas,
            protocol,
            filter: None,
            op: None,
            weight: DEFAULT_WEIGHT,
        }
    }
}

impl Default for SimpleReadPlan {
    fn default() -> Self {
        SimpleReadPlan::new(vec![1], TagProtocol::Gen2)
    }
}

/// A weighted sequence of simple plans executed within one read interval.
#[derive(Debug, Clone, PartialEq)]
pub struct MultiReadPlan {
    /// The child plans. Children are simple by construction; multi plans
    /// do not nest.
    pub plans: Vec<SimpleReadPlan>,
}

/// The active read plan.
#[derive(Debug, Clone, PartialEq)]
pub enum ReadPlan {
    /// One protocol, one filter, one optional embedded op.
    Simple(SimpleReadPlan),
    /// Several simple plans sharing the read interval by weight.
    Multi(MultiReadPlan),
}

impl ReadPlan {
    /// Flatten into `(plan, duration_ms)` slices of the given read
    /// duration, proportional to each child's weight.
    ///
    /// A simple plan receives the whole duration. Children whose share
    /// rounds to zero are skipped; a zero total weight splits evenly.
    pub fn schedule(&self, duration_ms: u32) -> Vec<(&SimpleReadPlan, u32)> {
        match self {
            ReadPlan::Simple(p) => vec![(p, duration_ms)],
            ReadPlan::Multi(m) => {
                if m.plans.is_empty() {
                    return Vec::new();
                }
                let total: u64 = m.plans.iter().map(|p| u64::from(p.weight)).sum();
                m.plans
                    .iter()
                    .map(|p| {
                        let share = if total == 0 {
                            u64::from(duration_ms) / m.plans.len() as u64
                        } else {
                            u64::from(duration_ms) * u64::from(p.weight) / total
                        };
                        (p, share as u32)
                    })
                    .filter(|(_, share)| *share > 0)
                    .collect()
            }
        }
    }
}

impl Default for ReadPlan {
    fn default() -> Self {
        ReadPlan::Simple(SimpleReadPlan::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_plan_is_simple_gen2_antenna_one() {
        match ReadPlan::default() {
            ReadPlan::Simple(p) => {
                assert_eq!(p.antennas, vec![1]);
                assert_eq!(p.protocol, TagProtocol::Gen2);
                assert!(p.filter.is_none());
                assert!(p.op.is_none());
            }
            ReadPlan::Multi(_) => panic!("default plan should be simple"),
        }
    }

    #[test]
    fn simple_schedule_takes_whole_duration() {
        let plan = ReadPlan::default();
        let sched = plan.schedule(500);
        assert_eq!(sched.len(), 1);
        assert_eq!(sched[0].1, 500);
    }

    #[test]
    fn multi_schedule_splits_by_weight() {
        let mut a = SimpleReadPlan::new(vec![1], TagProtocol::Gen2);
        a.weight = 300;
        let mut b = SimpleReadPlan::new(vec![2], TagProtocol::Iso180006b);
        b.weight = 100;

        let plan = ReadPlan::Multi(MultiReadPlan { plans: vec![a, b] });
        let sched = plan.schedule(400);
        assert_eq!(sched.len(), 2);
        assert_eq!(sched[0].1, 300);
        assert_eq!(sched[1].1, 100);
    }

    #[test]
    fn multi_schedule_zero_total_weight_splits_evenly() {
        let mut a = SimpleReadPlan::default();
        a.weight = 0;
        let mut b = SimpleReadPlan::default();
        b.weight = 0;

        let plan = ReadPlan::Multi(MultiReadPlan { plans: vec![a, b] });
        let sched = plan.schedule(500);
        assert_eq!(sched.len(), 2);
        assert_eq!(sched[0].1, 250);
        assert_eq!(sched[1].1, 250);
    }

    #[test]
    fn multi_schedule_drops_zero_shares() {
        let mut a = SimpleReadPlan::default();
        a.weight = 10_000;
        let mut b = SimpleReadPlan::default();
        b.weight = 1;

        let plan = ReadPlan::Multi(MultiReadPlan { plans: vec![a, b] });
        let sched = plan.schedule(100);
        assert_eq!(sched.len(), 1);
        assert_eq!(sched[0].1, 99);
    }

    #[test]
    fn empty_multi_schedule_is_empty() {
        let plan = ReadPlan::Multi(MultiReadPlan { plans: vec![] });
        assert!(plan.schedule(500).is_empty());
    }
}
