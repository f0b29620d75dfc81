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

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use judging_common::{
    ChallengeId, CompetitionId, DEFAULT_STATUS_BATCH_SIZE, JudgeAssignmentRecord, JudgeId,
    Submission, SubmissionId, SubmissionStatus, UserIndex,
};
use tokio::sync::RwLock;

/// Document storage for judge assignments, the per-judge index, and the
/// challenge/submission documents the reader resolves against.
#[async_trait]
pub trait AssignmentStore: Send + Sync {
    /// Overwrites the record keyed by `(competition_id, challenge_id, record.id)`.
    async fn put_assignment(
        &self,
        competition_id: &str,
        challenge_id: &str,
        record: &JudgeAssignmentRecord,
    ) -> anyhow::Result<()>;

    async fn get_assignment(
        &self,
        competition_id: &str,
        challenge_id: &str,
        judge_id: &str,
    ) -> anyhow::Result<Option<JudgeAssignmentRecord>>;

    async fn list_assignment_judges(
        &self,
        competition_id: &str,
        challenge_id: &str,
    ) -> anyhow::Result<Vec<JudgeId>>;

    async fn delete_assignment(
        &self,
        competition_id: &str,
        challenge_id: &str,
        judge_id: &str,
    ) -> anyhow::Result<bool>;

    async fn get_user_index(&self, judge_id: &str) -> anyhow::Result<Option<UserIndex>>;

    async fn put_user_index(&self, index: &UserIndex) -> anyhow::Result<()>;

    async fn list_challenge_ids(&self, competition_id: &str) -> anyhow::Result<Vec<ChallengeId>>;

    async fn get_submission(
        &self,
        competition_id: &str,
        submission_id: &str,
    ) -> anyhow::Result<Option<Submission>>;

    /// Registers the challenge and submission documents a distribution ran
    /// over. Submissions already stored keep their current state. Stores whose
    /// documents are owned by another writer keep the default no-op.
    async fn record_submissions(
        &self,
        _competition_id: &str,
        _submissions: &[Submission],
    ) -> anyhow::Result<()> {
        Ok(())
    }

    /// Applies every status change or none of them.
    async fn update_submission_statuses(
        &self,
        competition_id: &str,
        submission_ids: &[SubmissionId],
        status: SubmissionStatus,
    ) -> anyhow::Result<()>;

    fn max_batch_size(&self) -> usize {
        DEFAULT_STATUS_BATCH_SIZE
    }
}

#[derive(Default)]
struct InMemoryState {
    assignments: HashMap<(CompetitionId, ChallengeId), BTreeMap<JudgeId, JudgeAssignmentRecord>>,
    user_index: HashMap<JudgeId, UserIndex>,
    challenges: HashMap<CompetitionId, Vec<ChallengeId>>,
    submissions: HashMap<CompetitionId, HashMap<SubmissionId, Submission>>,
}

impl InMemoryState {
    fn register_challenge(&mut self, competition_id: &str, challenge_id: &str) {
        let challenges = self
            .challenges
            .entry(competition_id.to_string())
            .or_default();
        if !challenges.iter().any(|id| id == challenge_id) {
            challenges.push(challenge_id.to_string());
        }
    }
}

pub struct InMemoryAssignmentStore {
    state: RwLock<InMemoryState>,
    batch_size: usize,
}

impl Default for InMemoryAssignmentStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryAssignmentStore {
    pub fn new() -> Self {
        Self::with_batch_size(DEFAULT_STATUS_BATCH_SIZE)
    }

    pub fn with_batch_size(batch_size: usize) -> Self {
        Self {
            state: RwLock::new(InMemoryState::default()),
            batch_size: batch_size.max(1),
        }
    }

    pub async fn insert_challenge(&self, competition_id: &str, challenge_id: &str) {
        let mut state = self.state.write().await;
        state.register_challenge(competition_id, challenge_id);
    }

    /// Stores the submission and registers its challenge.
    pub async fn insert_submission(&self, competition_id: &str, submission: Submission) {
        let mut state = self.state.write().await;
        state.register_challenge(competition_id, &submission.challenge_id);
        state
            .submissions
            .entry(competition_id.to_string())
            .or_default()
            .insert(submission.id.clone(), submission);
    }

    pub async fn assignment_count(&self, competition_id: &str) -> usize {
        let state = self.state.read().await;
        state
            .assignments
            .iter()
            .filter(|((competition, _), _)| competition == competition_id)
            .map(|(_, records)| records.len())
            .sum()
    }
}

#[async_trait]
impl AssignmentStore for InMemoryAssignmentStore {
    async fn put_assignment(
        &self,
        competition_id: &str,
        challenge_id: &str,
        record: &JudgeAssignmentRecord,
    ) -> anyhow::Result<()> {
        let mut state = self.state.write().await;
        state.register_challenge(competition_id, challenge_id);
        state
            .assignments
            .entry((competition_id.to_string(), challenge_id.to_string()))
            .or_default()
            .insert(record.id.clone(), record.clone());
        Ok(())
    }

    async fn get_assignment(
        &self,
        competition_id: &str,
        challenge_id: &str,
        judge_id: &str,
    ) -> anyhow::Result<Option<JudgeAssignmentRecord>> {
        let state = self.state.read().await;
        Ok(state
            .assignments
            .get(&(competition_id.to_string(), challenge_id.to_string()))
            .and_then(|records| records.get(judge_id))
            .cloned())
    }

    async fn list_assignment_judges(
        &self,
        competition_id: &str,
        challenge_id: &str,
    ) -> anyhow::Result<Vec<JudgeId>> {
        let state = self.state.read().await;
        Ok(state
            .assignments
            .get(&(competition_id.to_string(), challenge_id.to_string()))
            .map(|records| records.keys().cloned().collect())
            .unwrap_or_default())
    }

    async fn delete_assignment(
        &self,
        competition_id: &str,
        challenge_id: &str,
        judge_id: &str,
    ) -> anyhow::Result<bool> {
        let mut state = self.state.write().await;
        Ok(state
            .assignments
            .get_mut(&(competition_id.to_string(), challenge_id.to_string()))
            .and_then(|records| records.remove(judge_id))
            .is_some())
    }

    async fn get_user_index(&self, judge_id: &str) -> anyhow::Result<Option<UserIndex>> {
        let state = self.state.read().await;
        Ok(state.user_index.get(judge_id).cloned())
    }

    async fn put_user_index(&self, index: &UserIndex) -> anyhow::Result<()> {
        let mut state = self.state.write().await;
        state
            .user_index
            .insert(index.judge_id.clone(), index.clone());
        Ok(())
    }

    async fn list_challenge_ids(&self, competition_id: &str) -> anyhow::Result<Vec<ChallengeId>> {
        let state = self.state.read().await;
        Ok(state
            .challenges
            .get(competition_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn get_submission(
        &self,
        competition_id: &str,
        submission_id: &str,
    ) -> anyhow::Result<Option<Submission>> {
        let state = self.state.read().await;
        Ok(state
            .submissions
            .get(competition_id)
            .and_then(|submissions| submissions.get(submission_id))
            .cloned())
    }

    async fn record_submissions(
        &self,
        competition_id: &str,
        submissions: &[Submission],
    ) -> anyhow::Result<()> {
        let mut state = self.state.write().await;
        for submission in submissions {
            state.register_challenge(competition_id, &submission.challenge_id);
            state
                .submissions
                .entry(competition_id.to_string())
                .or_default()
                .entry(submission.id.clone())
                .or_insert_with(|| submission.clone());
        }
        Ok(())
    }

    async fn update_submission_statuses(
        &self,
        competition_id: &str,
        submission_ids: &[SubmissionId],
        status: SubmissionStatus,
    ) -> anyhow::Result<()> {
        let mut state = self.state.write().await;
        let submissions = state
            .submissions
            .get_mut(competition_id)
            .ok_or_else(|| anyhow::anyhow!("competition {competition_id} has no submissions"))?;

        if let Some(missing) = submission_ids
            .iter()
            .find(|id| !submissions.contains_key(id.as_str()))
        {
            anyhow::bail!("submission {missing} not found in competition {competition_id}");
        }

        for id in submission_ids {
            if let Some(submission) = submissions.get_mut(id) {
                submission.status = status;
            }
        }
        Ok(())
    }

    fn max_batch_size(&self) -> usize {
        self.batch_size
    }
}
