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

use std::collections::HashMap;

use anyhow::Context;
use chrono::Utc;
use judging_common::{Assignment, Judge, JudgeAssignmentRecord, Submission, UserIndex};
use tracing::{info, warn};

use crate::{error::DistributionError, packer::DistributionPlan, store::AssignmentStore};

pub async fn write_assignment_record(
    store: &dyn AssignmentStore,
    competition_id: &str,
    challenge_id: &str,
    judge: &Judge,
    submissions: &[Submission],
) -> anyhow::Result<JudgeAssignmentRecord> {
    let submission_ids = submissions.iter().map(|s| s.id.clone()).collect();
    let record = JudgeAssignmentRecord::new(judge, submission_ids, Utc::now());
    store
        .put_assignment(competition_id, challenge_id, &record)
        .await
        .with_context(|| {
            format!(
                "failed to write assignment competitions/{competition_id}/challenges/{challenge_id}/judges/{}",
                judge.id
            )
        })?;
    Ok(record)
}

/// Read-modify-write of `userIndex/{judge_id}`; other competitions and
/// challenges already recorded for the judge are preserved.
pub async fn merge_user_index(
    store: &dyn AssignmentStore,
    judge_id: &str,
    competition_id: &str,
    challenge_id: &str,
    assigned_count: usize,
) -> anyhow::Result<UserIndex> {
    let mut index = store
        .get_user_index(judge_id)
        .await
        .with_context(|| format!("failed to read user index for judge {judge_id}"))?
        .unwrap_or_else(|| UserIndex::new(judge_id));
    index.merge(competition_id, challenge_id, assigned_count);
    store
        .put_user_index(&index)
        .await
        .with_context(|| format!("failed to write user index for judge {judge_id}"))?;
    Ok(index)
}

async fn commit_assignment(
    store: &dyn AssignmentStore,
    competition_id: &str,
    judge: &Judge,
    assignment: &Assignment,
) -> anyhow::Result<()> {
    write_assignment_record(
        store,
        competition_id,
        &assignment.challenge_id,
        judge,
        &assignment.submissions,
    )
    .await?;
    merge_user_index(
        store,
        &judge.id,
        competition_id,
        &assignment.challenge_id,
        assignment.submission_count,
    )
    .await?;
    Ok(())
}

/// Writes every planned assignment in order, stopping at the first failure.
///
/// Returns the number of committed assignments. Assignments committed before a
/// failure stay in the store; the error carries that count.
pub async fn commit_plan(
    store: &dyn AssignmentStore,
    competition_id: &str,
    plan: &DistributionPlan,
) -> Result<usize, DistributionError> {
    let judges: HashMap<&str, &Judge> = plan
        .judge_loads
        .iter()
        .map(|load| (load.judge.id.as_str(), &load.judge))
        .collect();

    let mut committed = 0;
    for assignment in &plan.assignments {
        let fail = |source: anyhow::Error| DistributionError::Persistence {
            judge_id: assignment.judge_id.clone(),
            challenge_id: assignment.challenge_id.clone(),
            committed,
            source,
        };

        let judge = judges
            .get(assignment.judge_id.as_str())
            .ok_or_else(|| fail(anyhow::anyhow!("judge missing from plan")))?;

        let result = commit_assignment(store, competition_id, judge, assignment).await;

        if let Err(error) = result {
            warn!(
                competition_id = %competition_id,
                judge_id = %assignment.judge_id,
                challenge_id = %assignment.challenge_id,
                committed,
                remaining = plan.assignments.len() - committed,
                error = %error,
                "assignment commit failed; distribution partially applied"
            );
            return Err(fail(error));
        }
        committed += 1;
    }

    info!(
        competition_id = %competition_id,
        committed,
        "judge assignments committed"
    );
    Ok(committed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryAssignmentStore;

    fn judge(id: &str) -> Judge {
        Judge {
            id: id.to_string(),
            full_name: format!("Judge {id}"),
            email: format!("{id}@example.com"),
        }
    }

    fn submission(participant_id: &str, challenge_id: &str) -> Submission {
        Submission {
            id: format!("{participant_id}_{challenge_id}"),
            participant_id: participant_id.to_string(),
            challenge_id: challenge_id.to_string(),
            status: Default::default(),
            judge_score: None,
        }
    }

    #[tokio::test]
    async fn rewriting_same_key_replaces_record() {
        let store = InMemoryAssignmentStore::new();
        let judge = judge("j1");

        write_assignment_record(&store, "comp", "c1", &judge, &[submission("p1", "c1")])
            .await
            .unwrap();
        write_assignment_record(
            &store,
            "comp",
            "c1",
            &judge,
            &[submission("p2", "c1"), submission("p3", "c1")],
        )
        .await
        .unwrap();

        assert_eq!(store.assignment_count("comp").await, 1);
        let record = store.get_assignment("comp", "c1", "j1").await.unwrap().unwrap();
        assert_eq!(record.assigned_submissions, vec!["p2_c1", "p3_c1"]);
        assert_eq!(record.assigned_count, 2);
        assert_eq!(record.email, "j1@example.com");
    }

    #[tokio::test]
    async fn merge_user_index_creates_then_merges() {
        let store = InMemoryAssignmentStore::new();

        merge_user_index(&store, "j1", "comp-b", "y", 5).await.unwrap();
        merge_user_index(&store, "j1", "comp-a", "x", 3).await.unwrap();
        let index = merge_user_index(&store, "j1", "comp-a", "z", 1).await.unwrap();

        assert_eq!(index.assigned_count("comp-b", "y"), Some(5));
        assert_eq!(index.assigned_count("comp-a", "x"), Some(3));
        assert_eq!(index.assigned_count("comp-a", "z"), Some(1));
        assert_eq!(store.get_user_index("j1").await.unwrap(), Some(index));
    }
}
