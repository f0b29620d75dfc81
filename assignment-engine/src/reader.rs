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

use anyhow::Context;
use judging_common::Assignment;
use tracing::{debug, warn};

use crate::store::AssignmentStore;

/// Rebuilds a judge's assignments across every challenge of a competition.
///
/// A judge without any assignment record gets an empty list. Submissions that
/// cannot be fetched, or whose stored challenge differs from the record's, are
/// left out.
pub async fn get_judge_assignments(
    store: &dyn AssignmentStore,
    judge_id: &str,
    competition_id: &str,
) -> anyhow::Result<Vec<Assignment>> {
    let challenge_ids = store
        .list_challenge_ids(competition_id)
        .await
        .with_context(|| format!("failed to list challenges of competition {competition_id}"))?;

    let mut assignments = Vec::new();
    for challenge_id in challenge_ids {
        let Some(record) = store
            .get_assignment(competition_id, &challenge_id, judge_id)
            .await
            .with_context(|| {
                format!("failed to read assignment of judge {judge_id} on {challenge_id}")
            })?
        else {
            continue;
        };

        let mut submissions = Vec::with_capacity(record.assigned_submissions.len());
        for submission_id in &record.assigned_submissions {
            match store.get_submission(competition_id, submission_id).await {
                Ok(Some(submission)) if submission.challenge_id == challenge_id => {
                    submissions.push(submission);
                }
                Ok(Some(submission)) => {
                    debug!(
                        submission_id = %submission_id,
                        challenge_id = %challenge_id,
                        submission_challenge_id = %submission.challenge_id,
                        "skipping submission from another challenge"
                    );
                }
                Ok(None) => {
                    debug!(submission_id = %submission_id, "assigned submission not found");
                }
                Err(error) => {
                    warn!(
                        competition_id = %competition_id,
                        submission_id = %submission_id,
                        error = %error,
                        "failed to fetch assigned submission; treating as not found"
                    );
                }
            }
        }

        assignments.push(Assignment {
            judge_id: record.id,
            judge_name: record.full_name,
            challenge_id,
            submission_count: submissions.len(),
            submissions,
        });
    }

    Ok(assignments)
}
