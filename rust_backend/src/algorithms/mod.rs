//! Wait time and berth allocation models.
//!
//! # Components
//!
//! - [`wait_time`]: Threshold-band wait time estimates and sampled averages
//! - [`berth_allocation`]: Greedy list scheduling of ready vessels onto berths
//!
//! # Example
//!
//! ```
//! use portwatch::algorithms::WaitTimeCalculator;
//! use portwatch::core::scenario::{Scenario, ScenarioTable};
//! use rand::rngs::StdRng;
//! use rand::SeedableRng;
//!
//! let calc = WaitTimeCalculator::new(ScenarioTable::builtin());
//! let mut rng = StdRng::seed_from_u64(42);
//! let avg = calc.average_wait_time(Scenario::PeakSeason, None, 200, &mut rng);
//! assert!(avg.hours > 8.0 && avg.hours < 20.0);
//! ```

pub mod berth_allocation;
pub mod wait_time;

pub use berth_allocation::{BerthAllocator, BerthAssignment, BerthPlan, ReadyVessel};
pub use wait_time::{QueueSnapshot, WaitBand, WaitTimeCalculator, WaitTimeEstimate};
