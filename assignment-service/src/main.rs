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

mod dynamo_store;

use std::{net::SocketAddr, sync::Arc};

use anyhow::Context;
use assignment_engine::{
    AssignmentStore, DistributionError, InMemoryAssignmentStore, RandomShuffler,
    StatusUpdateError, distribute_judges, get_judge_assignments, reset_assignments,
    update_submissions_status,
};
use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use judging_common::{
    Assignment, DEFAULT_MARGIN_PERCENTAGE, DEFAULT_STATUS_BATCH_SIZE, DistributeRequest,
    DistributionResult, ResetAssignmentsRequest, ResetAssignmentsResponse, SubmissionStatus,
    UpdateStatusRequest, UpdateStatusResponse, expand_env_vars,
};
use lambda_http::run as lambda_run;
use serde::Deserialize;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};

use crate::dynamo_store::DynamoAssignmentStore;

#[derive(Clone)]
struct AppState {
    store: Arc<dyn AssignmentStore>,
    default_margin_percentage: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct ServiceConfig {
    default_margin_percentage: u32,
    status_batch_size: usize,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            default_margin_percentage: DEFAULT_MARGIN_PERCENTAGE,
            status_batch_size: DEFAULT_STATUS_BATCH_SIZE,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
struct ServiceConfigFile {
    #[serde(default)]
    default_margin_percentage: Option<u32>,
    #[serde(default)]
    status_batch_size: Option<usize>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(std::env::var("RUST_LOG").unwrap_or_else(|_| {
            "assignment_service=debug,assignment_engine=debug,tower_http=info".to_string()
        }))
        .init();

    let config = load_service_config();
    let store: Arc<dyn AssignmentStore> =
        match DynamoAssignmentStore::from_env(config.status_batch_size).await {
            Some(store) => Arc::new(store),
            None => {
                warn!("no DynamoDB configuration found; using in-memory assignment store");
                Arc::new(InMemoryAssignmentStore::with_batch_size(
                    config.status_batch_size,
                ))
            }
        };
    info!(
        default_margin_percentage = config.default_margin_percentage,
        status_batch_size = store.max_batch_size(),
        "assignment-service loaded config"
    );

    let state = AppState {
        store,
        default_margin_percentage: config.default_margin_percentage,
    };
    let app = build_router(state);

    if std::env::var("AWS_LAMBDA_RUNTIME_API").is_ok() {
        info!("AWS Lambda runtime detected; running assignment-service in lambda mode");
        lambda_run(app)
            .await
            .map_err(|e| anyhow::Error::msg(format!("lambda runtime error: {e}")))?;
        return Ok(());
    }

    let bind_addr = parse_bind_addr("ASSIGNMENT_SERVICE_BIND", "0.0.0.0:8095")?;
    info!(%bind_addr, "assignment-service listening");
    let listener = tokio::net::TcpListener::bind(bind_addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route(
            "/v1/competitions/{competition_id}/distributions",
            post(distribute_handler).delete(reset_handler),
        )
        .route(
            "/v1/competitions/{competition_id}/judges/{judge_id}/assignments",
            get(judge_assignments_handler),
        )
        .route(
            "/v1/competitions/{competition_id}/submissions/status",
            post(update_status_handler),
        )
        .with_state(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

fn parse_bind_addr(var_name: &str, default: &str) -> anyhow::Result<SocketAddr> {
    let value = std::env::var(var_name)
        .ok()
        .unwrap_or_else(|| default.to_string());
    value.parse().context(format!("invalid {var_name}"))
}

fn load_service_config() -> ServiceConfig {
    let Some(path) = std::env::var("ASSIGNMENT_CONFIG_PATH")
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
    else {
        return ServiceConfig::default();
    };

    let raw = match std::fs::read_to_string(&path) {
        Ok(raw) => raw,
        Err(error) => {
            warn!(path = %path, error = %error, "failed to read assignment config path");
            return ServiceConfig::default();
        }
    };

    match parse_service_config(&raw) {
        Ok(config) => {
            info!(path = %path, ?config, "loaded assignment config");
            config
        }
        Err(error) => {
            warn!(path = %path, error = %error, "failed to parse assignment config yaml");
            ServiceConfig::default()
        }
    }
}

fn parse_service_config(raw: &str) -> anyhow::Result<ServiceConfig> {
    let expanded = expand_env_vars(raw);
    let parsed = if expanded.trim().is_empty() {
        ServiceConfigFile::default()
    } else {
        serde_yaml::from_str::<ServiceConfigFile>(&expanded)?
    };

    let defaults = ServiceConfig::default();
    Ok(ServiceConfig {
        default_margin_percentage: parsed
            .default_margin_percentage
            .unwrap_or(defaults.default_margin_percentage),
        status_batch_size: parsed
            .status_batch_size
            .filter(|size| *size > 0)
            .unwrap_or(defaults.status_batch_size),
    })
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({"status": "ok"}))
}

async fn distribute_handler(
    State(state): State<AppState>,
    Path(competition_id): Path<String>,
    Json(mut request): Json<DistributeRequest>,
) -> Result<Json<DistributionResult>, ApiError> {
    request
        .margin_percentage
        .get_or_insert(state.default_margin_percentage);

    let mut shuffler = RandomShuffler;
    let result = distribute_judges(
        state.store.as_ref(),
        &competition_id,
        &request,
        &mut shuffler,
    )
    .await?;
    Ok(Json(result))
}

async fn reset_handler(
    State(state): State<AppState>,
    Path(competition_id): Path<String>,
    Json(request): Json<ResetAssignmentsRequest>,
) -> Result<Json<ResetAssignmentsResponse>, ApiError> {
    if request.challenge_ids.is_empty() {
        return Err(ApiError::bad_request("challengeIds must not be empty"));
    }

    let deleted = reset_assignments(state.store.as_ref(), &competition_id, &request.challenge_ids)
        .await
        .map_err(|error| ApiError::bad_gateway(format!("failed to reset assignments: {error:#}")))?;
    info!(
        competition_id = %competition_id,
        challenges = request.challenge_ids.len(),
        deleted,
        "reset judge assignments"
    );
    Ok(Json(ResetAssignmentsResponse {
        competition_id,
        deleted,
    }))
}

async fn judge_assignments_handler(
    State(state): State<AppState>,
    Path((competition_id, judge_id)): Path<(String, String)>,
) -> Result<Json<Vec<Assignment>>, ApiError> {
    let assignments = get_judge_assignments(state.store.as_ref(), &judge_id, &competition_id)
        .await
        .map_err(|error| {
            ApiError::bad_gateway(format!("failed to load judge assignments: {error:#}"))
        })?;
    Ok(Json(assignments))
}

async fn update_status_handler(
    State(state): State<AppState>,
    Path(competition_id): Path<String>,
    Json(request): Json<UpdateStatusRequest>,
) -> Result<Json<UpdateStatusResponse>, ApiError> {
    let status = request
        .status
        .unwrap_or(SubmissionStatus::SelectedForManualReview);
    let updated = update_submissions_status(
        state.store.as_ref(),
        &competition_id,
        &request.submissions,
        Some(status),
    )
    .await?;
    Ok(Json(UpdateStatusResponse {
        competition_id,
        status,
        updated,
    }))
}

#[derive(Debug)]
struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }

    fn bad_gateway(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_GATEWAY,
            message: message.into(),
        }
    }
}

impl From<DistributionError> for ApiError {
    fn from(error: DistributionError) -> Self {
        if error.is_precondition() {
            Self::bad_request(error.to_string())
        } else {
            Self::bad_gateway(format!("{:#}", anyhow::Error::new(error)))
        }
    }
}

impl From<StatusUpdateError> for ApiError {
    fn from(error: StatusUpdateError) -> Self {
        Self::bad_gateway(format!("{:#}", anyhow::Error::new(error)))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        warn!(status = %self.status, message = %self.message, "assignment-service request failed");
        (
            self.status,
            Json(serde_json::json!({"error": self.message})),
        )
            .into_response()
    }
}
