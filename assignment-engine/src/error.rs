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

use judging_common::{ChallengeId, CompetitionId, JudgeId, SubmissionId};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DistributionError {
    #[error("no judges available for assignment")]
    NoJudges,
    #[error("no challenges found")]
    NoChallenges,
    #[error("no challenges with submissions from top participants found")]
    NoQualifyingSubmissions,
    #[error("failed to record submissions of competition {competition_id}")]
    SubmissionCatalog {
        competition_id: CompetitionId,
        #[source]
        source: anyhow::Error,
    },
    #[error(
        "failed to persist assignment for judge {judge_id} on challenge {challenge_id} \
         ({committed} assignments already committed)"
    )]
    Persistence {
        judge_id: JudgeId,
        challenge_id: ChallengeId,
        committed: usize,
        #[source]
        source: anyhow::Error,
    },
}

impl DistributionError {
    /// True for failures raised before any store access.
    pub fn is_precondition(&self) -> bool {
        !matches!(
            self,
            DistributionError::SubmissionCatalog { .. } | DistributionError::Persistence { .. }
        )
    }
}

#[derive(Debug, Error)]
#[error(
    "failed to update submission status in competition {competition_id}: \
     {failed_batches} of {total_batches} batches failed ({} submissions not updated)",
    .failed_submission_ids.len()
)]
pub struct StatusUpdateError {
    pub competition_id: CompetitionId,
    pub total_batches: usize,
    pub failed_batches: usize,
    pub updated: usize,
    pub failed_submission_ids: Vec<SubmissionId>,
    #[source]
    pub source: anyhow::Error,
}
