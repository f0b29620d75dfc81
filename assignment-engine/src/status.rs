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

use judging_common::{Submission, SubmissionId, SubmissionStatus};
use tracing::{info, warn};

use crate::{error::StatusUpdateError, store::AssignmentStore};

/// Sets `status` (default [`SubmissionStatus::SelectedForManualReview`]) on
/// every submission, one atomic store batch per `max_batch_size()` chunk.
/// A submission listed more than once is updated once.
///
/// All chunks are attempted. If any fail, the error lists the submissions
/// whose batch did not apply; the others stay updated. Returns how many
/// submissions were updated.
pub async fn update_submissions_status(
    store: &dyn AssignmentStore,
    competition_id: &str,
    submissions: &[Submission],
    status: Option<SubmissionStatus>,
) -> Result<usize, StatusUpdateError> {
    if submissions.is_empty() {
        return Ok(0);
    }

    let status = status.unwrap_or(SubmissionStatus::SelectedForManualReview);
    let mut seen = HashSet::new();
    let ids: Vec<SubmissionId> = submissions
        .iter()
        .filter(|submission| seen.insert(submission.id.as_str()))
        .map(|submission| submission.id.clone())
        .collect();
    let chunks: Vec<&[SubmissionId]> = ids.chunks(store.max_batch_size().max(1)).collect();
    let total_batches = chunks.len();

    let mut updated = 0;
    let mut failed_batches = 0;
    let mut failed_submission_ids = Vec::new();
    let mut first_error = None;

    for (batch_no, chunk) in chunks.into_iter().enumerate() {
        match store
            .update_submission_statuses(competition_id, chunk, status)
            .await
        {
            Ok(()) => updated += chunk.len(),
            Err(error) => {
                warn!(
                    competition_id = %competition_id,
                    batch_no,
                    batch_size = chunk.len(),
                    status = status.as_str(),
                    error = %error,
                    "submission status batch failed"
                );
                failed_batches += 1;
                failed_submission_ids.extend_from_slice(chunk);
                if first_error.is_none() {
                    first_error = Some(error);
                }
            }
        }
    }

    if let Some(source) = first_error {
        return Err(StatusUpdateError {
            competition_id: competition_id.to_string(),
            total_batches,
            failed_batches,
            updated,
            failed_submission_ids,
            source,
        });
    }

    info!(
        competition_id = %competition_id,
        updated,
        batches = total_batches,
        status = status.as_str(),
        "submission statuses updated"
    );
    Ok(updated)
}
