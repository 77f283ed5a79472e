//! Server-sent balance events.

use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Path, State};
use axum::response::sse::{Event, KeepAlive, Sse};
use futures::stream::{Stream, StreamExt};
use serde::Serialize;

use credit_ledger_core::UserId;

use crate::auth::ServiceAuth;
use crate::error::ApiError;
use crate::events::BalanceChange;
use crate::state::AppState;

/// Wire form of a balance event.
#[derive(Debug, Serialize)]
struct EventPayload {
    user_id: String,
    credits: i64,
    change: BalanceChange,
}

/// Stream balance changes for one user as server-sent events.
///
/// The first event is a snapshot of the current balance so subscribers
/// never start blind; subsequent events follow each grant, welcome, or
/// confirmed spend.
pub async fn balance_events(
    State(state): State<Arc<AppState>>,
    auth: ServiceAuth,
    Path(user_id): Path<String>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, ApiError> {
    let user_id: UserId = user_id
        .parse()
        .map_err(|_| ApiError::BadRequest("Invalid user ID".into()))?;

    tracing::debug!(
        service = %auth.service_name,
        user_id = %user_id,
        "balance event subscription opened"
    );

    // Subscribe before reading the snapshot so a change landing in
    // between reaches the stream instead of being missed.
    let subscription = state.ledger.events().subscribe(user_id);
    let snapshot = state.ledger.balance(&user_id)?;

    let initial = EventPayload {
        user_id: user_id.to_string(),
        credits: snapshot,
        change: BalanceChange::Snapshot,
    };

    let stream = futures::stream::once(async move { sse_event(&initial) }).chain(
        futures::stream::unfold(subscription, |mut sub| async move {
            let event = sub.next().await?;
            let payload = EventPayload {
                user_id: event.user_id.to_string(),
                credits: event.balance,
                change: event.change,
            };
            Some((sse_event(&payload), sub))
        }),
    );

    Ok(Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("keep-alive"),
    ))
}

fn sse_event(payload: &EventPayload) -> Result<Event, Infallible> {
    match Event::default().json_data(payload) {
        Ok(event) => Ok(event.event("balance")),
        Err(err) => {
            tracing::error!(error = %err, "failed to encode balance event");
            Ok(Event::default().event("error").data("encoding failure"))
        }
    }
}
