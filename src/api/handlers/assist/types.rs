//! Request/response types for the assist endpoints.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct AskRequest {
    pub student_rollno: String,
    pub question: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct AskData {
    pub question: String,
    pub answer: String,
    pub remaining_today: i64,
    pub daily_limit: i64,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct AskResponse {
    pub success: bool,
    pub data: AskData,
}

/// Deny payload for rate-limited requests.
#[derive(ToSchema, Serialize, Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct DeniedResponse {
    pub success: bool,
    pub message: String,
    pub reason: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wait_seconds: Option<i64>,
    pub remaining_today: i64,
}

/// Generic failure envelope with an optional machine-readable code.
#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct ErrorResponse {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct QaEntry {
    pub question: String,
    pub response: String,
    pub created_at: DateTime<Utc>,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct StatsData {
    pub today_usage: i64,
    pub total_usage: i64,
    pub daily_limit: i64,
    pub remaining_today: i64,
    pub can_ask_now: bool,
    pub wait_seconds: i64,
    pub recent_questions: Vec<QaEntry>,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct StatsResponse {
    pub success: bool,
    pub data: StatsData,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct HistoryItem {
    pub id: uuid::Uuid,
    pub question: String,
    pub response: String,
    pub created_at: DateTime<Utc>,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct HistoryData {
    pub history: Vec<HistoryItem>,
    pub total: i64,
    pub limit: i64,
    pub offset: i64,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct HistoryResponse {
    pub success: bool,
    pub data: HistoryData,
}

#[derive(Deserialize, IntoParams, Debug)]
pub struct StatsParams {
    pub student_rollno: String,
}

#[derive(Deserialize, IntoParams, Debug)]
pub struct HistoryParams {
    pub student_rollno: String,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}
