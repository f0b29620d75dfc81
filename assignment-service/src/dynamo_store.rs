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

use anyhow::Context;
use assignment_engine::AssignmentStore;
use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_dynamodb::{
    Client as DynamoClient,
    types::{AttributeValue, ReturnValue, TransactWriteItem, Update},
};
use chrono::{DateTime, Utc};
use judging_common::{
    AssignmentStatus, ChallengeId, JudgeAssignmentRecord, JudgeId, JudgeScore, Submission,
    SubmissionId, SubmissionStatus, UserIndex,
};
use tracing::info;

/// DynamoDB caps a transaction at 100 operations.
pub const DYNAMO_TRANSACTION_LIMIT: usize = 100;

type Item = HashMap<String, AttributeValue>;

#[derive(Debug, Clone)]
pub struct DynamoTables {
    pub judge_assignments: String,
    pub user_index: String,
    pub challenges: String,
    pub submissions: String,
}

impl DynamoTables {
    pub fn from_env() -> Self {
        Self {
            judge_assignments: std::env::var("JUDGE_ASSIGNMENTS_TABLE")
                .ok()
                .unwrap_or_else(|| "judge_assignments".to_string()),
            user_index: std::env::var("USER_INDEX_TABLE")
                .ok()
                .unwrap_or_else(|| "user_index".to_string()),
            challenges: std::env::var("CHALLENGES_TABLE")
                .ok()
                .unwrap_or_else(|| "challenges".to_string()),
            submissions: std::env::var("SUBMISSIONS_TABLE")
                .ok()
                .unwrap_or_else(|| "submissions".to_string()),
        }
    }
}

#[derive(Clone)]
pub struct DynamoAssignmentStore {
    client: DynamoClient,
    tables: DynamoTables,
    batch_size: usize,
}

impl DynamoAssignmentStore {
    /// Enabled when `DYNAMODB_ENDPOINT` or `AWS_REGION` is set.
    pub async fn from_env(batch_size: usize) -> Option<Self> {
        if std::env::var("DYNAMODB_ENDPOINT").is_err() && std::env::var("AWS_REGION").is_err() {
            return None;
        }

        let mut loader = aws_config::defaults(BehaviorVersion::latest());
        if let Ok(endpoint) = std::env::var("DYNAMODB_ENDPOINT") {
            loader = loader.endpoint_url(endpoint);
        }
        let config = loader.load().await;
        let tables = DynamoTables::from_env();
        let batch_size = batch_size.clamp(1, DYNAMO_TRANSACTION_LIMIT);

        info!(
            judge_assignments_table = %tables.judge_assignments,
            user_index_table = %tables.user_index,
            challenges_table = %tables.challenges,
            submissions_table = %tables.submissions,
            batch_size,
            "assignment DynamoDB store enabled"
        );
        Some(Self {
            client: DynamoClient::new(&config),
            tables,
            batch_size,
        })
    }

    async fn query_all(
        &self,
        table_name: &str,
        key_name: &str,
        key_value: &str,
    ) -> anyhow::Result<Vec<Item>> {
        let mut items = Vec::new();
        let mut start_key: Option<Item> = None;
        loop {
            let output = self
                .client
                .query()
                .table_name(table_name)
                .key_condition_expression("#pk = :pk")
                .expression_attribute_names("#pk", key_name)
                .expression_attribute_values(":pk", AttributeValue::S(key_value.to_string()))
                .set_exclusive_start_key(start_key)
                .send()
                .await
                .with_context(|| format!("failed to query {table_name}"))?;

            items.extend(output.items().iter().cloned());
            match output.last_evaluated_key() {
                Some(key) if !key.is_empty() => start_key = Some(key.clone()),
                _ => break,
            }
        }
        Ok(items)
    }
}

fn assignment_key(competition_id: &str, challenge_id: &str) -> String {
    format!("{competition_id}#{challenge_id}")
}

fn string_attr(item: &Item, name: &str) -> anyhow::Result<String> {
    item.get(name)
        .and_then(|value| value.as_s().ok())
        .cloned()
        .with_context(|| format!("missing string attribute {name}"))
}

fn number_attr(item: &Item, name: &str) -> anyhow::Result<usize> {
    item.get(name)
        .and_then(|value| value.as_n().ok())
        .with_context(|| format!("missing number attribute {name}"))?
        .parse::<usize>()
        .with_context(|| format!("invalid number attribute {name}"))
}

fn record_to_item(
    competition_id: &str,
    challenge_id: &str,
    record: &JudgeAssignmentRecord,
) -> Item {
    let mut item = HashMap::new();
    item.insert(
        "assignment_key".to_string(),
        AttributeValue::S(assignment_key(competition_id, challenge_id)),
    );
    item.insert("judge_id".to_string(), AttributeValue::S(record.id.clone()));
    item.insert(
        "competition_id".to_string(),
        AttributeValue::S(competition_id.to_string()),
    );
    item.insert(
        "challenge_id".to_string(),
        AttributeValue::S(challenge_id.to_string()),
    );
    item.insert(
        "full_name".to_string(),
        AttributeValue::S(record.full_name.clone()),
    );
    item.insert("email".to_string(), AttributeValue::S(record.email.clone()));
    item.insert(
        "assigned_submissions".to_string(),
        AttributeValue::L(
            record
                .assigned_submissions
                .iter()
                .cloned()
                .map(AttributeValue::S)
                .collect(),
        ),
    );
    item.insert(
        "assigned_count".to_string(),
        AttributeValue::N(record.assigned_count.to_string()),
    );
    item.insert(
        "reviewed_count".to_string(),
        AttributeValue::N(record.reviewed_count.to_string()),
    );
    item.insert(
        "status".to_string(),
        AttributeValue::S(record.status.as_str().to_string()),
    );
    item.insert(
        "assigned_at".to_string(),
        AttributeValue::S(record.assigned_at.to_rfc3339()),
    );
    item
}

fn record_from_item(item: &Item) -> anyhow::Result<JudgeAssignmentRecord> {
    let assigned_submissions = item
        .get("assigned_submissions")
        .and_then(|value| value.as_l().ok())
        .map(|values| {
            values
                .iter()
                .filter_map(|value| value.as_s().ok().cloned())
                .collect()
        })
        .unwrap_or_default();
    let status = string_attr(item, "status")?;
    let assigned_at = string_attr(item, "assigned_at")?;

    Ok(JudgeAssignmentRecord {
        id: string_attr(item, "judge_id")?,
        full_name: string_attr(item, "full_name")?,
        email: string_attr(item, "email")?,
        assigned_submissions,
        assigned_count: number_attr(item, "assigned_count")?,
        reviewed_count: number_attr(item, "reviewed_count")?,
        status: AssignmentStatus::parse(&status)
            .with_context(|| format!("unknown assignment status {status}"))?,
        assigned_at: DateTime::parse_from_rfc3339(&assigned_at)
            .context("invalid assigned_at timestamp")?
            .with_timezone(&Utc),
    })
}

fn index_to_item(index: &UserIndex) -> Item {
    let competitions = index
        .competition_ids
        .iter()
        .map(|(competition_id, challenges)| {
            let counts = challenges
                .iter()
                .map(|(challenge_id, count)| {
                    (challenge_id.clone(), AttributeValue::N(count.to_string()))
                })
                .collect();
            (competition_id.clone(), AttributeValue::M(counts))
        })
        .collect();

    HashMap::from([
        (
            "judge_id".to_string(),
            AttributeValue::S(index.judge_id.clone()),
        ),
        ("competition_ids".to_string(), AttributeValue::M(competitions)),
    ])
}

fn index_from_item(item: &Item) -> anyhow::Result<UserIndex> {
    let mut competition_ids = BTreeMap::new();
    if let Some(competitions) = item
        .get("competition_ids")
        .and_then(|value| value.as_m().ok())
    {
        for (competition_id, challenges) in competitions {
            let challenges = challenges
                .as_m()
                .map_err(|_| anyhow::anyhow!("competition {competition_id} is not a map"))?;
            let counts = challenges
                .iter()
                .map(|(challenge_id, count)| {
                    let count = count
                        .as_n()
                        .map_err(|_| anyhow::anyhow!("count for {challenge_id} is not a number"))?
                        .parse::<usize>()
                        .with_context(|| format!("invalid count for {challenge_id}"))?;
                    Ok((challenge_id.clone(), count))
                })
                .collect::<anyhow::Result<BTreeMap<ChallengeId, usize>>>()?;
            competition_ids.insert(competition_id.clone(), counts);
        }
    }

    Ok(UserIndex {
        judge_id: string_attr(item, "judge_id")?,
        competition_ids,
    })
}

fn submission_from_item(item: &Item) -> anyhow::Result<Submission> {
    let status = match item.get("status").and_then(|value| value.as_s().ok()) {
        Some(value) => SubmissionStatus::parse(value)
            .with_context(|| format!("unknown submission status {value}"))?,
        None => SubmissionStatus::Pending,
    };
    let judge_score = item
        .get("judge_score")
        .and_then(|value| value.as_s().ok())
        .map(|raw| serde_json::from_str::<JudgeScore>(raw))
        .transpose()
        .context("invalid judge_score payload")?;

    Ok(Submission {
        id: string_attr(item, "submission_id")?,
        participant_id: string_attr(item, "participant_id")?,
        challenge_id: string_attr(item, "challenge_id")?,
        status,
        judge_score,
    })
}

#[async_trait]
impl AssignmentStore for DynamoAssignmentStore {
    async fn put_assignment(
        &self,
        competition_id: &str,
        challenge_id: &str,
        record: &JudgeAssignmentRecord,
    ) -> anyhow::Result<()> {
        self.client
            .put_item()
            .table_name(&self.tables.judge_assignments)
            .set_item(Some(record_to_item(competition_id, challenge_id, record)))
            .send()
            .await
            .context("failed to put item into judge_assignments table")?;
        Ok(())
    }

    async fn get_assignment(
        &self,
        competition_id: &str,
        challenge_id: &str,
        judge_id: &str,
    ) -> anyhow::Result<Option<JudgeAssignmentRecord>> {
        let output = self
            .client
            .get_item()
            .table_name(&self.tables.judge_assignments)
            .key(
                "assignment_key",
                AttributeValue::S(assignment_key(competition_id, challenge_id)),
            )
            .key("judge_id", AttributeValue::S(judge_id.to_string()))
            .send()
            .await
            .context("failed to get item from judge_assignments table")?;
        output.item().map(record_from_item).transpose()
    }

    async fn list_assignment_judges(
        &self,
        competition_id: &str,
        challenge_id: &str,
    ) -> anyhow::Result<Vec<JudgeId>> {
        let items = self
            .query_all(
                &self.tables.judge_assignments,
                "assignment_key",
                &assignment_key(competition_id, challenge_id),
            )
            .await?;
        items
            .iter()
            .map(|item| string_attr(item, "judge_id"))
            .collect()
    }

    async fn delete_assignment(
        &self,
        competition_id: &str,
        challenge_id: &str,
        judge_id: &str,
    ) -> anyhow::Result<bool> {
        let output = self
            .client
            .delete_item()
            .table_name(&self.tables.judge_assignments)
            .key(
                "assignment_key",
                AttributeValue::S(assignment_key(competition_id, challenge_id)),
            )
            .key("judge_id", AttributeValue::S(judge_id.to_string()))
            .return_values(ReturnValue::AllOld)
            .send()
            .await
            .context("failed to delete item from judge_assignments table")?;
        Ok(output.attributes().is_some_and(|item| !item.is_empty()))
    }

    async fn get_user_index(&self, judge_id: &str) -> anyhow::Result<Option<UserIndex>> {
        let output = self
            .client
            .get_item()
            .table_name(&self.tables.user_index)
            .key("judge_id", AttributeValue::S(judge_id.to_string()))
            .consistent_read(true)
            .send()
            .await
            .context("failed to get item from user_index table")?;
        output.item().map(index_from_item).transpose()
    }

    async fn put_user_index(&self, index: &UserIndex) -> anyhow::Result<()> {
        self.client
            .put_item()
            .table_name(&self.tables.user_index)
            .set_item(Some(index_to_item(index)))
            .send()
            .await
            .context("failed to put item into user_index table")?;
        Ok(())
    }

    async fn list_challenge_ids(&self, competition_id: &str) -> anyhow::Result<Vec<ChallengeId>> {
        let items = self
            .query_all(&self.tables.challenges, "competition_id", competition_id)
            .await?;
        items
            .iter()
            .map(|item| string_attr(item, "challenge_id"))
            .collect()
    }

    async fn get_submission(
        &self,
        competition_id: &str,
        submission_id: &str,
    ) -> anyhow::Result<Option<Submission>> {
        let output = self
            .client
            .get_item()
            .table_name(&self.tables.submissions)
            .key(
                "competition_id",
                AttributeValue::S(competition_id.to_string()),
            )
            .key("submission_id", AttributeValue::S(submission_id.to_string()))
            .send()
            .await
            .context("failed to get item from submissions table")?;
        output.item().map(submission_from_item).transpose()
    }

    async fn update_submission_statuses(
        &self,
        competition_id: &str,
        submission_ids: &[SubmissionId],
        status: SubmissionStatus,
    ) -> anyhow::Result<()> {
        let mut transact_items = Vec::with_capacity(submission_ids.len());
        for submission_id in submission_ids {
            let update = Update::builder()
                .table_name(&self.tables.submissions)
                .key(
                    "competition_id",
                    AttributeValue::S(competition_id.to_string()),
                )
                .key("submission_id", AttributeValue::S(submission_id.clone()))
                .update_expression("SET #status = :status")
                .condition_expression("attribute_exists(submission_id)")
                .expression_attribute_names("#status", "status")
                .expression_attribute_values(
                    ":status",
                    AttributeValue::S(status.as_str().to_string()),
                )
                .build()
                .context("failed to build submission status update")?;
            transact_items.push(TransactWriteItem::builder().update(update).build());
        }

        self.client
            .transact_write_items()
            .set_transact_items(Some(transact_items))
            .send()
            .await
            .context("failed to update submission statuses")?;
        Ok(())
    }

    fn max_batch_size(&self) -> usize {
        self.batch_size
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use judging_common::Judge;

    #[test]
    fn assignment_record_survives_item_conversion() {
        let judge = Judge {
            id: "j1".to_string(),
            full_name: "Ada Lovelace".to_string(),
            email: "ada@example.com".to_string(),
        };
        let record = JudgeAssignmentRecord::new(
            &judge,
            vec!["p1_c1".to_string(), "p2_c1".to_string()],
            Utc::now(),
        );

        let item = record_to_item("comp", "c1", &record);
        assert_eq!(
            item.get("assignment_key").and_then(|v| v.as_s().ok()),
            Some(&"comp#c1".to_string())
        );
        assert_eq!(
            item.get("status").and_then(|v| v.as_s().ok()),
            Some(&"Not Started".to_string())
        );

        let parsed = record_from_item(&item).unwrap();
        assert_eq!(parsed.id, "j1");
        assert_eq!(parsed.assigned_submissions, record.assigned_submissions);
        assert_eq!(parsed.assigned_count, 2);
        assert_eq!(parsed.reviewed_count, 0);
        assert_eq!(parsed.status, AssignmentStatus::NotStarted);
        assert_eq!(parsed.assigned_at.timestamp(), record.assigned_at.timestamp());
    }

    #[test]
    fn user_index_nested_maps_survive_item_conversion() {
        let mut index = UserIndex::new("j1");
        index.merge("comp-a", "x", 3);
        index.merge("comp-b", "y", 1);

        let parsed = index_from_item(&index_to_item(&index)).unwrap();

        assert_eq!(parsed, index);
    }

    #[test]
    fn submission_item_without_status_defaults_to_pending() {
        let item: Item = HashMap::from([
            (
                "submission_id".to_string(),
                AttributeValue::S("p1_c1".to_string()),
            ),
            (
                "participant_id".to_string(),
                AttributeValue::S("p1".to_string()),
            ),
            (
                "challenge_id".to_string(),
                AttributeValue::S("c1".to_string()),
            ),
        ]);

        let submission = submission_from_item(&item).unwrap();

        assert_eq!(submission.status, SubmissionStatus::Pending);
        assert_eq!(submission.challenge_id, "c1");
        assert!(submission.judge_score.is_none());
    }

    #[test]
    fn record_item_missing_fields_is_rejected() {
        let item: Item = HashMap::from([(
            "judge_id".to_string(),
            AttributeValue::S("j1".to_string()),
        )]);
        assert!(record_from_item(&item).is_err());
    }
}
