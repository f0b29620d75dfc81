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

//! Input aggregation and per-judge capacity bounds.

use std::collections::{HashMap, HashSet};

use judging_common::{Challenge, ChallengeId, ParticipantId, Submission};
use tracing::{debug, warn};

use crate::error::DistributionError;

/// A challenge paired with the submissions from top participants that need judging.
#[derive(Debug, Clone)]
pub struct ChallengeWithSubmissions {
    pub challenge: Challenge,
    pub submissions: Vec<Submission>,
    pub submission_count: usize,
}

impl ChallengeWithSubmissions {
    pub fn id(&self) -> &str {
        &self.challenge.id
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CapacityPlan {
    pub total_submissions: usize,
    pub judge_count: usize,
    pub margin_percentage: u32,
    pub ideal_load_per_judge: usize,
    pub max_load_per_judge: usize,
}

/// Keeps, per challenge, only submissions owned by a top participant.
///
/// Challenges left with no qualifying submissions are dropped. A submission
/// filed under the wrong challenge key is ignored, and a repeated submission
/// id within one challenge keeps only its first occurrence.
pub fn collect_challenges_with_submissions(
    challenges: &[Challenge],
    submissions_by_challenge: &HashMap<ChallengeId, Vec<Submission>>,
    top_participants: &HashSet<ParticipantId>,
) -> Vec<ChallengeWithSubmissions> {
    let mut collected = Vec::new();

    for challenge in challenges {
        let Some(submissions) = submissions_by_challenge.get(&challenge.id) else {
            debug!(challenge_id = %challenge.id, "challenge has no submissions");
            continue;
        };

        let mut seen: HashSet<&str> = HashSet::new();
        let mut qualifying = Vec::new();
        for submission in submissions {
            if submission.challenge_id != challenge.id {
                warn!(
                    challenge_id = %challenge.id,
                    submission_id = %submission.id,
                    submission_challenge_id = %submission.challenge_id,
                    "ignoring submission filed under a different challenge"
                );
                continue;
            }
            if !top_participants.contains(&submission.participant_id) {
                continue;
            }
            if !seen.insert(submission.id.as_str()) {
                warn!(
                    challenge_id = %challenge.id,
                    submission_id = %submission.id,
                    "ignoring duplicate submission id"
                );
                continue;
            }
            qualifying.push(submission.clone());
        }

        if qualifying.is_empty() {
            debug!(
                challenge_id = %challenge.id,
                "challenge has no submissions from top participants"
            );
            continue;
        }

        collected.push(ChallengeWithSubmissions {
            challenge: challenge.clone(),
            submission_count: qualifying.len(),
            submissions: qualifying,
        });
    }

    collected
}

/// `ideal = ceil(total / judges)` and `max = ceil(ideal * (100 + margin) / 100)`.
pub fn plan_capacity(
    total_submissions: usize,
    judge_count: usize,
    margin_percentage: u32,
) -> Result<CapacityPlan, DistributionError> {
    if judge_count == 0 {
        return Err(DistributionError::NoJudges);
    }

    let ideal_load_per_judge = total_submissions.div_ceil(judge_count);
    let max_load_per_judge =
        (ideal_load_per_judge * (100 + margin_percentage as usize)).div_ceil(100);

    Ok(CapacityPlan {
        total_submissions,
        judge_count,
        margin_percentage,
        ideal_load_per_judge,
        max_load_per_judge,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn challenge(id: &str) -> Challenge {
        Challenge {
            id: id.to_string(),
            title: format!("Challenge {id}"),
            rubric: vec![],
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

    #[test]
    fn capacity_with_default_margin_rounds_up() {
        let plan = plan_capacity(10, 2, 20).unwrap();
        assert_eq!(plan.ideal_load_per_judge, 5);
        assert_eq!(plan.max_load_per_judge, 6);
    }

    #[test]
    fn capacity_without_margin_matches_ideal() {
        let plan = plan_capacity(13, 2, 0).unwrap();
        assert_eq!(plan.ideal_load_per_judge, 7);
        assert_eq!(plan.max_load_per_judge, 7);
    }

    #[test]
    fn capacity_margin_rounds_fractional_load_up() {
        // 3 * 1.1 = 3.3
        let plan = plan_capacity(7, 3, 10).unwrap();
        assert_eq!(plan.ideal_load_per_judge, 3);
        assert_eq!(plan.max_load_per_judge, 4);
    }

    #[test]
    fn capacity_rejects_zero_judges() {
        let err = plan_capacity(10, 0, 20).unwrap_err();
        assert!(matches!(err, DistributionError::NoJudges));
    }

    #[test]
    fn collect_keeps_only_top_participant_submissions() {
        let challenges = vec![challenge("c1"), challenge("c2"), challenge("c3")];
        let submissions_by_challenge = HashMap::from([
            (
                "c1".to_string(),
                vec![submission("p1", "c1"), submission("p2", "c1"), submission("p9", "c1")],
            ),
            ("c2".to_string(), vec![submission("p9", "c2")]),
        ]);
        let top: HashSet<String> = ["p1", "p2"].iter().map(|id| id.to_string()).collect();

        let collected =
            collect_challenges_with_submissions(&challenges, &submissions_by_challenge, &top);

        assert_eq!(collected.len(), 1);
        assert_eq!(collected[0].id(), "c1");
        assert_eq!(collected[0].submission_count, 2);
        assert!(
            collected[0]
                .submissions
                .iter()
                .all(|submission| submission.participant_id != "p9")
        );
    }

    #[test]
    fn collect_skips_misfiled_and_duplicate_submissions() {
        let challenges = vec![challenge("c1")];
        let submissions_by_challenge = HashMap::from([(
            "c1".to_string(),
            vec![
                submission("p1", "c1"),
                submission("p1", "c1"),
                submission("p2", "c2"),
            ],
        )]);
        let top: HashSet<String> = ["p1", "p2"].iter().map(|id| id.to_string()).collect();

        let collected =
            collect_challenges_with_submissions(&challenges, &submissions_by_challenge, &top);

        assert_eq!(collected.len(), 1);
        assert_eq!(collected[0].submission_count, 1);
        assert_eq!(collected[0].submissions[0].id, "p1_c1");
    }
}
