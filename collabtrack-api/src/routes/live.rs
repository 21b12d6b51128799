/// Server-sent snapshot streams
///
/// A live query is a stream of full snapshots: one right after connecting and
/// one after every relevant change published on the [`LiveHub`]. Each snapshot
/// is an SSE event carrying the JSON document:
///
/// ```text
/// event: board
/// data: {"todo":[...],"in-progress":[...],"done":[...]}
/// ```
///
/// A failed query produces an `error` event with the usual error body. Losing
/// access to the watched resource (403/404) sends that error and ends the
/// stream.
///
/// [`LiveHub`]: collabtrack_shared::live::LiveHub

use crate::error::{ApiError, ApiResult, ErrorResponse};
use axum::response::sse::{Event, KeepAlive, Sse};
use collabtrack_shared::live::Refresh;
use futures::{future, Stream, StreamExt};
use serde::Serialize;
use std::{convert::Infallible, future::Future, time::Duration};

/// Interval between keep-alive comments
pub const KEEP_ALIVE_INTERVAL: Duration = Duration::from_secs(25);

/// Errors after which a stream stops
fn is_terminal(err: &ApiError) -> bool {
    matches!(
        err,
        ApiError::Forbidden(_) | ApiError::NotFound(_) | ApiError::Unauthorized(_)
    )
}

fn error_event(err: ApiError) -> Event {
    if let ApiError::InternalError(msg) = &err {
        tracing::error!(error = %msg, "Live query failed");
    }

    let body = ErrorResponse {
        error: err.code().to_string(),
        message: match &err {
            ApiError::InternalError(_) => "An internal error occurred".to_string(),
            ApiError::BadRequest(msg)
            | ApiError::Unauthorized(msg)
            | ApiError::Forbidden(msg)
            | ApiError::NotFound(msg)
            | ApiError::Conflict(msg)
            | ApiError::ServiceUnavailable(msg) => msg.clone(),
            ApiError::ValidationError(_) => "Request validation failed".to_string(),
        },
        details: None,
    };

    Event::default()
        .event("error")
        .json_data(&body)
        .unwrap_or_else(|_| Event::default().event("error").data(body.message))
}

/// Renders one snapshot, or an `error` event
pub fn snapshot_event<T: Serialize>(name: &'static str, snapshot: ApiResult<T>) -> Event {
    match snapshot {
        Ok(value) => match Event::default().event(name).json_data(&value) {
            Ok(event) => event,
            Err(e) => error_event(ApiError::InternalError(format!(
                "Failed to encode {} snapshot: {}",
                name, e
            ))),
        },
        Err(err) => error_event(err),
    }
}

/// Turns refresh triggers into an SSE response
///
/// `load` runs once per trigger and produces the snapshot.
pub fn snapshot_stream<R, T, F, Fut>(
    name: &'static str,
    refreshes: R,
    load: F,
) -> Sse<impl Stream<Item = Result<Event, Infallible>> + Send + 'static>
where
    R: Stream<Item = Refresh> + Send + 'static,
    T: Serialize + Send + 'static,
    F: Fn() -> Fut + Send + 'static,
    Fut: Future<Output = ApiResult<T>> + Send + 'static,
{
    let events = refreshes
        .then(move |refresh| {
            tracing::trace!(stream = name, ?refresh, "Refreshing live query");
            load()
        })
        .scan(false, |finished, snapshot| {
            if *finished {
                return future::ready(None);
            }
            *finished = matches!(&snapshot, Err(err) if is_terminal(err));
            future::ready(Some(snapshot))
        })
        .map(move |snapshot| Ok(snapshot_event(name, snapshot)));

    Sse::new(events).keep_alive(KeepAlive::new().interval(KEEP_ALIVE_INTERVAL))
}

#[cfg(test)]
mod tests {
    use super::*;
    use collabtrack_shared::live::{ChangeEvent, LiveHub};
    use std::sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    };
    use uuid::Uuid;

    #[test]
    fn test_terminal_errors() {
        assert!(is_terminal(&ApiError::Forbidden(String::new())));
        assert!(is_terminal(&ApiError::NotFound(String::new())));
        assert!(!is_terminal(&ApiError::InternalError(String::new())));
    }

    #[tokio::test]
    async fn test_stream_reloads_on_each_change() {
        let hub = LiveHub::new(8);
        let project_id = Uuid::new_v4();
        let loads = Arc::new(AtomicUsize::new(0));

        let counter = loads.clone();
        let refreshes = hub.refreshes(move |e| e.concerns_project(project_id));
        let events = refreshes.then(move |_| {
            let counter = counter.clone();
            async move { counter.fetch_add(1, Ordering::SeqCst) + 1 }
        });
        let mut events = Box::pin(events);

        assert_eq!(events.next().await, Some(1));

        hub.publish(ChangeEvent::TasksChanged { project_id });
        assert_eq!(events.next().await, Some(2));
        assert_eq!(loads.load(Ordering::SeqCst), 2);
    }
}
