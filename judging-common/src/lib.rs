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

use std::{
    collections::{BTreeMap, HashMap, HashSet},
    sync::LazyLock,
};

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};

pub const DEFAULT_MARGIN_PERCENTAGE: u32 = 20;
/// Upper bound on operations in one atomic status batch.
pub const DEFAULT_STATUS_BATCH_SIZE: usize = 500;

pub type CompetitionId = String;
pub type ChallengeId = String;
pub type JudgeId = String;
pub type ParticipantId = String;
pub type SubmissionId = String;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "snake_case")]
pub enum SubmissionStatus {
    #[default]
    Pending,
    SelectedForManualReview,
    Evaluated,
}

impl SubmissionStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            SubmissionStatus::Pending => "pending",
            SubmissionStatus::SelectedForManualReview => "selected_for_manual_review",
            SubmissionStatus::Evaluated => "evaluated",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim() {
            "pending" => Some(SubmissionStatus::Pending),
            "selected_for_manual_review" => Some(SubmissionStatus::SelectedForManualReview),
            "evaluated" => Some(SubmissionStatus::Evaluated),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum AssignmentStatus {
    #[default]
    #[serde(rename = "Not Started")]
    NotStarted,
    #[serde(rename = "In Progress")]
    InProgress,
    #[serde(rename = "Completed")]
    Completed,
}

impl AssignmentStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            AssignmentStatus::NotStarted => "Not Started",
            AssignmentStatus::InProgress => "In Progress",
            AssignmentStatus::Completed => "Completed",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim() {
            "Not Started" => Some(AssignmentStatus::NotStarted),
            "In Progress" => Some(AssignmentStatus::InProgress),
            "Completed" => Some(AssignmentStatus::Completed),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RubricCriterion {
    pub name: String,
    pub weight: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Challenge {
    pub id: ChallengeId,
    pub title: String,
    #[serde(default)]
    pub rubric: Vec<RubricCriterion>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct JudgeScore {
    pub judge_id: JudgeId,
    pub score: f64,
    #[serde(default)]
    pub comment: Option<String>,
    pub scored_at: DateTime<Utc>,
}

/// One participant's response to one challenge.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Submission {
    pub id: SubmissionId,
    pub participant_id: ParticipantId,
    pub challenge_id: ChallengeId,
    #[serde(default)]
    pub status: SubmissionStatus,
    #[serde(default)]
    pub judge_score: Option<JudgeScore>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Judge {
    pub id: JudgeId,
    pub full_name: String,
    pub email: String,
}

/// A judge reviewing a specific subset of one challenge's submissions.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Assignment {
    pub judge_id: JudgeId,
    pub judge_name: String,
    pub challenge_id: ChallengeId,
    pub submissions: Vec<Submission>,
    pub submission_count: usize,
}

impl Assignment {
    pub fn new(judge: &Judge, challenge_id: &str, submissions: Vec<Submission>) -> Self {
        Self {
            judge_id: judge.id.clone(),
            judge_name: judge.full_name.clone(),
            challenge_id: challenge_id.to_string(),
            submission_count: submissions.len(),
            submissions,
        }
    }

    pub fn submission_ids(&self) -> Vec<SubmissionId> {
        self.submissions
            .iter()
            .map(|submission| submission.id.clone())
            .collect()
    }
}

/// Persisted at `competitions/{competitionId}/challenges/{challengeId}/judges/{judgeId}`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct JudgeAssignmentRecord {
    pub id: JudgeId,
    pub full_name: String,
    pub email: String,
    pub assigned_submissions: Vec<SubmissionId>,
    pub assigned_count: usize,
    pub reviewed_count: usize,
    pub status: AssignmentStatus,
    pub assigned_at: DateTime<Utc>,
}

impl JudgeAssignmentRecord {
    pub fn new(
        judge: &Judge,
        assigned_submissions: Vec<SubmissionId>,
        assigned_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: judge.id.clone(),
            full_name: judge.full_name.clone(),
            email: judge.email.clone(),
            assigned_count: assigned_submissions.len(),
            assigned_submissions,
            reviewed_count: 0,
            status: AssignmentStatus::NotStarted,
            assigned_at,
        }
    }
}

/// Per-judge workload summary persisted at `userIndex/{judgeId}`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct UserIndex {
    pub judge_id: JudgeId,
    #[serde(default)]
    pub competition_ids: BTreeMap<CompetitionId, BTreeMap<ChallengeId, usize>>,
}

impl UserIndex {
    pub fn new(judge_id: &str) -> Self {
        Self {
            judge_id: judge_id.to_string(),
            competition_ids: BTreeMap::new(),
        }
    }

    /// Sets the count for one competition/challenge pair and leaves every other entry alone.
    pub fn merge(&mut self, competition_id: &str, challenge_id: &str, assigned_count: usize) {
        self.competition_ids
            .entry(competition_id.to_string())
            .or_default()
            .insert(challenge_id.to_string(), assigned_count);
    }

    /// Drops one entry, and the competition key too once it has no challenges left.
    pub fn remove(&mut self, competition_id: &str, challenge_id: &str) -> bool {
        let Some(challenges) = self.competition_ids.get_mut(competition_id) else {
            return false;
        };
        let removed = challenges.remove(challenge_id).is_some();
        if challenges.is_empty() {
            self.competition_ids.remove(competition_id);
        }
        removed
    }

    pub fn assigned_count(&self, competition_id: &str, challenge_id: &str) -> Option<usize> {
        self.competition_ids
            .get(competition_id)
            .and_then(|challenges| challenges.get(challenge_id))
            .copied()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct UnassignedSubmissions {
    pub challenge_id: ChallengeId,
    pub submission_ids: Vec<SubmissionId>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DistributionResult {
    pub run_id: String,
    pub assignments: Vec<Assignment>,
    pub total_challenges: usize,
    pub total_judges: usize,
    pub total_submissions_assigned: usize,
    pub unassigned_challenges: Vec<ChallengeId>,
    #[serde(default)]
    pub unassigned_submissions: Vec<UnassignedSubmissions>,
    pub ideal_load_per_judge: usize,
    pub max_load_per_judge: usize,
}

impl DistributionResult {
    pub fn unassigned_submission_count(&self) -> usize {
        self.unassigned_submissions
            .iter()
            .map(|entry| entry.submission_ids.len())
            .sum()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DistributeRequest {
    pub challenges: Vec<Challenge>,
    pub submissions_by_challenge: HashMap<ChallengeId, Vec<Submission>>,
    pub judges: Vec<Judge>,
    pub top_participants: HashSet<ParticipantId>,
    #[serde(default)]
    pub margin_percentage: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResetAssignmentsRequest {
    pub challenge_ids: Vec<ChallengeId>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResetAssignmentsResponse {
    pub competition_id: CompetitionId,
    pub deleted: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateStatusRequest {
    pub submissions: Vec<Submission>,
    #[serde(default)]
    pub status: Option<SubmissionStatus>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateStatusResponse {
    pub competition_id: CompetitionId,
    pub status: SubmissionStatus,
    pub updated: usize,
}

static ENV_VAR_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)\}").expect("env var pattern is valid")
});

/// Replace `${VAR_NAME}` patterns in a string with values from environment variables.
/// Unknown or unset variables are replaced with an empty string.
pub fn expand_env_vars(input: &str) -> String {
    ENV_VAR_PATTERN
        .replace_all(input, |caps: &regex::Captures| {
            let var_name = &caps[1];
            std::env::var(var_name).unwrap_or_default()
        })
        .into_owned()
}
