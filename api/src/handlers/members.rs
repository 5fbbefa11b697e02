//! Member handlers
//!
//! Roster queries, direct member management and the expire/revert toggle.

use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::Response,
    Json,
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::negotiate;
use crate::domain::entities::{Member, MemberFilter, MemberId, MemberPatch, MemberStatus};
use crate::domain::ledger::{LedgerAction, LedgerChange, ToggleOutcome};
use crate::domain::ports::MemberRepository;
use crate::error::AppError;
use crate::roster::{render_bulk, render_member, render_roster, render_toggle};
use crate::AppState;

/// Member as returned by the API
#[derive(Debug, Serialize)]
pub struct MemberResponse {
    pub id: MemberId,
    pub name: String,
    pub email: String,
    pub balance: Decimal,
    pub status: MemberStatus,
    pub expired_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&Member> for MemberResponse {
    fn from(m: &Member) -> Self {
        Self {
            id: m.id,
            name: m.name.clone(),
            email: m.email.clone(),
            balance: m.balance,
            status: m.status(),
            expired_at: m.expired_at,
            created_at: m.created_at,
            updated_at: m.updated_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct RosterResponse {
    pub members: Vec<MemberResponse>,
    pub count: usize,
}

/// Query parameters for GET /members
#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    /// `active`, `expired` or `all` (default)
    pub status: Option<String>,
    pub search: Option<String>,
}

impl ListQuery {
    fn into_filter(self) -> Result<MemberFilter, AppError> {
        let status = match self.status.as_deref().map(str::trim) {
            None | Some("") | Some("all") => None,
            Some(s) => Some(s.parse::<MemberStatus>().map_err(AppError::BadRequest)?),
        };
        Ok(MemberFilter {
            status,
            search: self.search,
        })
    }
}

/// Request body for POST /members
#[derive(Debug, Deserialize)]
pub struct CreateMemberRequest {
    pub name: String,
    pub email: String,
    pub balance: Decimal,
}

/// Request body for the bulk actions
#[derive(Debug, Deserialize)]
pub struct BulkRequest {
    pub ids: Vec<Uuid>,
}

/// Response body for expire/revert
#[derive(Debug, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum ToggleResponse {
    Applied {
        member: MemberResponse,
        affected: Vec<MemberResponse>,
        amount: Decimal,
        at: DateTime<Utc>,
    },
    Unchanged {
        member: MemberResponse,
    },
}

impl From<&LedgerChange> for ToggleResponse {
    fn from(change: &LedgerChange) -> Self {
        ToggleResponse::Applied {
            member: (&change.member).into(),
            affected: change.affected.iter().map(MemberResponse::from).collect(),
            amount: change.amount,
            at: change.at,
        }
    }
}

/// GET /members
pub async fn list_members<MR: MemberRepository + 'static>(
    State(state): State<AppState<MR>>,
    headers: HeaderMap,
    Query(query): Query<ListQuery>,
) -> Result<Response, AppError> {
    let members = state
        .ledger_service
        .list_members(&query.into_filter()?)
        .await?;

    let body = RosterResponse {
        count: members.len(),
        members: members.iter().map(MemberResponse::from).collect(),
    };
    Ok(negotiate(&headers, StatusCode::OK, &body, || {
        render_roster(&members)
    }))
}

/// POST /members
pub async fn create_member<MR: MemberRepository + 'static>(
    State(state): State<AppState<MR>>,
    headers: HeaderMap,
    Json(request): Json<CreateMemberRequest>,
) -> Result<Response, AppError> {
    let member = state
        .ledger_service
        .create_member(&request.name, &request.email, request.balance)
        .await?;

    Ok(negotiate(
        &headers,
        StatusCode::CREATED,
        &MemberResponse::from(&member),
        || render_member(&member),
    ))
}

/// GET /members/:id
pub async fn get_member<MR: MemberRepository + 'static>(
    State(state): State<AppState<MR>>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> Result<Response, AppError> {
    let member = state
        .ledger_service
        .get_member(&MemberId(id))
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Member {} not found", id)))?;

    Ok(negotiate(
        &headers,
        StatusCode::OK,
        &MemberResponse::from(&member),
        || render_member(&member),
    ))
}

/// PATCH /members/:id
///
/// Edits name, email or balance. Status changes go through expire/revert.
pub async fn update_member<MR: MemberRepository + 'static>(
    State(state): State<AppState<MR>>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
    Json(patch): Json<MemberPatch>,
) -> Result<Response, AppError> {
    let member = state
        .ledger_service
        .update_member(&MemberId(id), patch)
        .await?;

    Ok(negotiate(
        &headers,
        StatusCode::OK,
        &MemberResponse::from(&member),
        || render_member(&member),
    ))
}

/// POST /members/:id/expire
pub async fn expire_member<MR: MemberRepository + 'static>(
    State(state): State<AppState<MR>>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> Result<Response, AppError> {
    let id = MemberId(id);
    let outcome = state.ledger_service.mark_expired(&id).await?;
    toggle_response(&headers, LedgerAction::Expire, &id, outcome)
}

/// POST /members/:id/revert
pub async fn revert_member<MR: MemberRepository + 'static>(
    State(state): State<AppState<MR>>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> Result<Response, AppError> {
    let id = MemberId(id);
    let outcome = state.ledger_service.revert_expired(&id).await?;
    toggle_response(&headers, LedgerAction::Revert, &id, outcome)
}

fn toggle_response(
    headers: &HeaderMap,
    action: LedgerAction,
    id: &MemberId,
    outcome: ToggleOutcome,
) -> Result<Response, AppError> {
    let body = match &outcome {
        ToggleOutcome::Applied(change) => ToggleResponse::from(change),
        ToggleOutcome::Unchanged(member) => ToggleResponse::Unchanged {
            member: member.into(),
        },
        ToggleOutcome::NotFound => {
            return Err(AppError::NotFound(format!("Member {} not found", id)));
        }
    };

    Ok(negotiate(headers, StatusCode::OK, &body, || {
        render_toggle(action, id, &outcome)
    }))
}

/// POST /members/actions/expire
pub async fn expire_members<MR: MemberRepository + 'static>(
    State(state): State<AppState<MR>>,
    headers: HeaderMap,
    Json(request): Json<BulkRequest>,
) -> Result<Response, AppError> {
    let ids = bulk_ids(request)?;
    let report = state.ledger_service.expire_many(&ids).await;
    Ok(negotiate(&headers, StatusCode::OK, &report, || {
        render_bulk(&report)
    }))
}

/// POST /members/actions/revert
pub async fn revert_members<MR: MemberRepository + 'static>(
    State(state): State<AppState<MR>>,
    headers: HeaderMap,
    Json(request): Json<BulkRequest>,
) -> Result<Response, AppError> {
    let ids = bulk_ids(request)?;
    let report = state.ledger_service.revert_many(&ids).await;
    Ok(negotiate(&headers, StatusCode::OK, &report, || {
        render_bulk(&report)
    }))
}

fn bulk_ids(request: BulkRequest) -> Result<Vec<MemberId>, AppError> {
    if request.ids.is_empty() {
        return Err(AppError::BadRequest("ids must not be empty".to_string()));
    }
    Ok(request.ids.into_iter().map(MemberId).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{dec, test_expired_member};

    #[test]
    fn parse_create_request_accepts_number_or_string_balance() {
        let json = r#"{"name": "Asha", "email": "asha@example.com", "balance": 12.5}"#;
        let request: CreateMemberRequest = serde_json::from_str(json).unwrap();
        assert_eq!(request.balance, dec("12.5"));

        let json = r#"{"name": "Asha", "email": "asha@example.com", "balance": "7.25"}"#;
        let request: CreateMemberRequest = serde_json::from_str(json).unwrap();
        assert_eq!(request.balance, dec("7.25"));
    }

    #[test]
    fn parse_create_request_missing_balance() {
        let json = r#"{"name": "Asha", "email": "asha@example.com"}"#;
        let result: Result<CreateMemberRequest, _> = serde_json::from_str(json);
        assert!(result.is_err());
    }

    #[test]
    fn parse_patch_ignores_status_fields() {
        let json = r#"{"balance": "3.00", "active": false}"#;
        let patch: MemberPatch = serde_json::from_str(json).unwrap();
        assert_eq!(patch.balance, Some(dec("3.00")));
        assert!(patch.name.is_none());
    }

    #[test]
    fn list_query_status_parsing() {
        let all = ListQuery {
            status: Some("all".to_string()),
            search: None,
        };
        assert!(all.into_filter().unwrap().status.is_none());

        let alive = ListQuery {
            status: Some("alive".to_string()),
            search: Some("asha".to_string()),
        };
        let filter = alive.into_filter().unwrap();
        assert_eq!(filter.status, Some(MemberStatus::Active));
        assert_eq!(filter.search.as_deref(), Some("asha"));

        let bad = ListQuery {
            status: Some("zombie".to_string()),
            search: None,
        };
        assert!(bad.into_filter().is_err());
    }

    #[test]
    fn serialize_member_response() {
        let member = test_expired_member("Ravi");
        let json = serde_json::to_value(MemberResponse::from(&member)).unwrap();

        assert_eq!(json["status"], "expired");
        assert_eq!(json["balance"], "10.00");
        assert_eq!(json["id"], member.id.to_string());
        assert!(json["expired_at"].is_string());
    }

    #[test]
    fn serialize_unchanged_toggle() {
        let member = test_expired_member("Ravi");
        let json = serde_json::to_value(ToggleResponse::Unchanged {
            member: (&member).into(),
        })
        .unwrap();
        assert_eq!(json["result"], "unchanged");
        assert_eq!(json["member"]["name"], "Ravi");
    }

    #[test]
    fn empty_bulk_request_rejected() {
        assert!(bulk_ids(BulkRequest { ids: vec![] }).is_err());
        let id = Uuid::new_v4();
        assert_eq!(
            bulk_ids(BulkRequest { ids: vec![id] }).unwrap(),
            vec![MemberId(id)]
        );
    }
}
