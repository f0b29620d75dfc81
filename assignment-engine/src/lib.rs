// Copyright (C) 2026 StarHuntingGames
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// along with this program.  If not, see <https://www.gnu.org/licenses/>.

//! Judge workload distribution.
//!
//! [`distribute_judges`] filters each challenge down to submissions from top
//! participants, bounds every judge's load from the ideal share plus a margin,
//! packs challenges onto judges (splitting the ones no judge can absorb), and
//! then writes one assignment record per (challenge, judge) pair along with the
//! judge's cross-competition index.

pub mod distribution;
pub mod error;
pub mod packer;
pub mod planner;
pub mod reader;
pub mod status;
pub mod store;
pub mod writer;

pub use distribution::{distribute_judges, plan_distribution, reset_assignments};
pub use error::{DistributionError, StatusUpdateError};
pub use packer::{
    DistributionPlan, IdentityShuffler, JudgeLoad, RandomShuffler, SeededShuffler, Shuffler,
};
pub use planner::{CapacityPlan, ChallengeWithSubmissions};
pub use reader::get_judge_assignments;
pub use status::update_submissions_status;
pub use store::{AssignmentStore, InMemoryAssignmentStore};
