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

use std::collections::HashSet;

use anyhow::Context;
use judging_common::{
    ChallengeId, DEFAULT_MARGIN_PERCENTAGE, DistributeRequest, DistributionResult, Judge,
    Submission,
};
use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    error::DistributionError,
    packer::{DistributionPlan, Shuffler, pack},
    planner::{collect_challenges_with_submissions, plan_capacity},
    store::AssignmentStore,
    writer::commit_plan,
};

/// Validates the request and computes the full assignment plan without any I/O.
pub fn plan_distribution(
    request: &DistributeRequest,
    shuffler: &mut dyn Shuffler,
) -> Result<DistributionPlan, DistributionError> {
    if request.judges.is_empty() {
        return Err(DistributionError::NoJudges);
    }
    if request.challenges.is_empty() {
        return Err(DistributionError::NoChallenges);
    }

    let challenges = collect_challenges_with_submissions(
        &request.challenges,
        &request.submissions_by_challenge,
        &request.top_participants,
    );
    if challenges.is_empty() {
        return Err(DistributionError::NoQualifyingSubmissions);
    }

    let judges = unique_judges(&request.judges);
    let total_submissions = challenges.iter().map(|c| c.submission_count).sum();
    let capacity = plan_capacity(
        total_submissions,
        judges.len(),
        request
            .margin_percentage
            .unwrap_or(DEFAULT_MARGIN_PERCENTAGE),
    )?;

    Ok(pack(challenges, &judges, capacity, shuffler))
}

/// Plans the distribution, then commits one record per (challenge, judge) pair.
///
/// Precondition failures happen before the store is touched. A store failure
/// stops the run; assignments committed before it remain.
pub async fn distribute_judges(
    store: &dyn AssignmentStore,
    competition_id: &str,
    request: &DistributeRequest,
    shuffler: &mut dyn Shuffler,
) -> Result<DistributionResult, DistributionError> {
    let run_id = Uuid::new_v4().to_string();
    info!(
        run_id = %run_id,
        competition_id = %competition_id,
        challenges = request.challenges.len(),
        judges = request.judges.len(),
        top_participants = request.top_participants.len(),
        "starting judge distribution"
    );

    let plan = plan_distribution(request, shuffler)?;
    record_request_submissions(store, competition_id, request).await?;
    commit_plan(store, competition_id, &plan).await?;

    let result = DistributionResult {
        run_id,
        total_challenges: request.challenges.len(),
        total_judges: plan.judge_loads.len(),
        total_submissions_assigned: plan.total_submissions_assigned(),
        ideal_load_per_judge: plan.capacity.ideal_load_per_judge,
        max_load_per_judge: plan.capacity.max_load_per_judge,
        assignments: plan.assignments,
        unassigned_challenges: plan.unassigned_challenges,
        unassigned_submissions: plan.unassigned_submissions,
    };

    if !result.unassigned_challenges.is_empty() {
        warn!(
            run_id = %result.run_id,
            competition_id = %competition_id,
            unassigned_challenges = ?result.unassigned_challenges,
            "some challenges could not be assigned"
        );
    }
    info!(
        run_id = %result.run_id,
        competition_id = %competition_id,
        assignments = result.assignments.len(),
        submissions_assigned = result.total_submissions_assigned,
        submissions_unassigned = result.unassigned_submission_count(),
        "judge distribution complete"
    );
    Ok(result)
}

/// Deletes the judge assignment records of the given challenges and removes
/// the matching entries from each affected judge's index.
pub async fn reset_assignments(
    store: &dyn AssignmentStore,
    competition_id: &str,
    challenge_ids: &[ChallengeId],
) -> anyhow::Result<usize> {
    let mut deleted = 0;
    for challenge_id in challenge_ids {
        let judge_ids = store
            .list_assignment_judges(competition_id, challenge_id)
            .await
            .with_context(|| format!("failed to list judges for challenge {challenge_id}"))?;

        for judge_id in judge_ids {
            if store
                .delete_assignment(competition_id, challenge_id, &judge_id)
                .await
                .with_context(|| {
                    format!("failed to delete assignment of judge {judge_id} on {challenge_id}")
                })?
            {
                deleted += 1;
            }

            if let Some(mut index) = store.get_user_index(&judge_id).await?
                && index.remove(competition_id, challenge_id)
            {
                store
                    .put_user_index(&index)
                    .await
                    .with_context(|| format!("failed to write user index for judge {judge_id}"))?;
            }
        }
    }

    info!(
        competition_id = %competition_id,
        challenges = challenge_ids.len(),
        deleted,
        "judge assignments reset"
    );
    Ok(deleted)
}

/// Registers every submitted document, in challenge order, so the reader and
/// the status updater can resolve them later.
async fn record_request_submissions(
    store: &dyn AssignmentStore,
    competition_id: &str,
    request: &DistributeRequest,
) -> Result<(), DistributionError> {
    let submissions: Vec<Submission> = request
        .challenges
        .iter()
        .filter_map(|challenge| request.submissions_by_challenge.get(&challenge.id))
        .flatten()
        .cloned()
        .collect();

    store
        .record_submissions(competition_id, &submissions)
        .await
        .map_err(|source| DistributionError::SubmissionCatalog {
            competition_id: competition_id.to_string(),
            source,
        })
}

fn unique_judges(judges: &[Judge]) -> Vec<Judge> {
    let mut seen = HashSet::new();
    judges
        .iter()
        .filter(|judge| {
            let fresh = seen.insert(judge.id.as_str());
            if !fresh {
                warn!(judge_id = %judge.id, "ignoring duplicate judge");
            }
            fresh
        })
        .cloned()
        .collect()
}
