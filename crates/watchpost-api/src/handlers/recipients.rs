//! Notification recipient handlers.

use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};
use tracing::info;

use super::blocking;
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

#[derive(Debug, Serialize, Deserialize)]
pub struct RecipientsBody {
    pub phones: Vec<String>,
}

pub async fn get_recipients(State(state): State<AppState>) -> Json<RecipientsBody> {
    Json(RecipientsBody {
        phones: state.store.snapshot().await.phones,
    })
}

/// Replace the recipient list, persist it and push it to every pipeline.
pub async fn set_recipients(
    State(state): State<AppState>,
    Json(body): Json<RecipientsBody>,
) -> ApiResult<Json<RecipientsBody>> {
    let phones = normalize_phones(&body.phones)?;
    state.store.set_phones(phones.clone()).await?;

    let supervisor = state.supervisor.clone();
    let pushed = phones.clone();
    blocking(move || supervisor.set_recipients(&pushed)).await?;

    info!(count = phones.len(), "Recipients updated");
    Ok(Json(RecipientsBody { phones }))
}

/// Strip spaces, dashes and a leading `+`; reject anything but digits.
/// Empty entries and duplicates are dropped.
fn normalize_phones(raw: &[String]) -> ApiResult<Vec<String>> {
    let mut phones: Vec<String> = Vec::with_capacity(raw.len());
    for entry in raw {
        let phone: String = entry
            .trim()
            .trim_start_matches('+')
            .chars()
            .filter(|c| !matches!(c, ' ' | '-'))
            .collect();
        if phone.is_empty() {
            continue;
        }
        if !phone.chars().all(|c| c.is_ascii_digit()) {
            return Err(ApiError::bad_request(format!("invalid phone number: {}", entry)));
        }
        if !phones.contains(&phone) {
            phones.push(phone);
        }
    }
    Ok(phones)
}
