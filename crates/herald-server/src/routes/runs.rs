use crate::routes::agents::not_found;
use crate::state::AppState;
use axum::{
    extract::State,
    http::header,
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use bytes::Bytes;
use chrono::Utc;
use futures::{stream::StreamExt, Stream};
use herald::models::agent_message::AgentMessage;
use herald::run::{Run, RunContext, RunMode, RunRequest, RunStatus};
use herald::units::AgentUnit;
use serde::Serialize;
use std::{
    convert::Infallible,
    pin::Pin,
    sync::Arc,
    task::{Context, Poll},
    time::Duration,
};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{info, warn};
use uuid::Uuid;

// Server-sent events, one frame per yielded message and a final frame with the run
pub struct SseResponse {
    rx: ReceiverStream<String>,
}

impl SseResponse {
    fn new(rx: ReceiverStream<String>) -> Self {
        Self { rx }
    }
}

impl Stream for SseResponse {
    type Item = Result<Bytes, Infallible>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.rx)
            .poll_next(cx)
            .map(|opt| opt.map(|s| Ok(Bytes::from(s))))
    }
}

impl IntoResponse for SseResponse {
    fn into_response(self) -> Response {
        (
            [
                (header::CONTENT_TYPE, "text/event-stream"),
                (header::CACHE_CONTROL, "no-cache"),
                (header::CONNECTION, "keep-alive"),
            ],
            axum::body::Body::from_stream(self),
        )
            .into_response()
    }
}

fn format_event<T: Serialize>(event: &str, data: &T) -> String {
    let data = serde_json::to_string(data).unwrap_or_else(|_| "null".to_string());
    format!("event: {}\ndata: {}\n\n", event, data)
}

fn finished_run(
    ctx: &RunContext,
    agent_name: &str,
    status: RunStatus,
    output: Vec<AgentMessage>,
    created_at: chrono::DateTime<Utc>,
) -> Run {
    Run {
        run_id: ctx.run_id,
        agent_name: agent_name.to_string(),
        status,
        output,
        error: match status {
            RunStatus::Cancelled => Some("run was cancelled".to_string()),
            _ => None,
        },
        created_at,
        finished_at: Some(Utc::now()),
    }
}

async fn run_sync(unit: Arc<dyn AgentUnit>, input: Vec<AgentMessage>, ctx: RunContext) -> Run {
    let created_at = Utc::now();
    let output: Vec<AgentMessage> = unit.invoke(input, ctx.clone()).collect().await;
    finished_run(
        &ctx,
        &unit.manifest().name,
        final_status(&ctx),
        output,
        created_at,
    )
}

/// Units never fail a run; only cancellation changes the outcome
fn final_status(ctx: &RunContext) -> RunStatus {
    if ctx.is_cancelled() {
        RunStatus::Cancelled
    } else {
        RunStatus::Completed
    }
}

fn run_stream(unit: Arc<dyn AgentUnit>, input: Vec<AgentMessage>, ctx: RunContext) -> SseResponse {
    let (tx, rx) = mpsc::channel(100);

    tokio::spawn(async move {
        let created_at = Utc::now();
        let agent_name = unit.manifest().name.clone();
        let mut stream = unit.invoke(input, ctx.clone());
        let mut output = Vec::new();

        loop {
            tokio::select! {
                // A client that went away takes the run with it
                _ = tx.closed() => {
                    warn!(agent = %agent_name, run_id = %ctx.run_id, "client disconnected, cancelling run");
                    ctx.cancel();
                    return;
                }
                next = stream.next() => match next {
                    Some(message) => {
                        if tx.send(format_event("message", &message)).await.is_err() {
                            ctx.cancel();
                            return;
                        }
                        output.push(message);
                    }
                    None => break,
                },
            }
        }

        let run = finished_run(&ctx, &agent_name, final_status(&ctx), output, created_at);
        let _ = tx.send(format_event("run", &run)).await;
    });

    SseResponse::new(ReceiverStream::new(rx))
}

async fn handler(State(state): State<AppState>, Json(request): Json<RunRequest>) -> Response {
    let Some(unit) = state.registry.get(&request.agent_name) else {
        return not_found(&request.agent_name);
    };

    let ctx = RunContext::new()
        .with_run_id(request.run_id.unwrap_or_else(Uuid::new_v4))
        .with_deadline(
            request
                .deadline_ms
                .map(Duration::from_millis)
                .or(state.default_deadline),
        );
    info!(agent = %request.agent_name, run_id = %ctx.run_id, mode = ?request.mode, "starting run");

    match request.mode {
        RunMode::Sync => Json(run_sync(unit, request.input, ctx).await).into_response(),
        RunMode::Stream => run_stream(unit, request.input, ctx).into_response(),
    }
}

pub fn routes(state: AppState) -> Router {
    Router::new()
        .route("/runs", post(handler))
        .with_state(state)
}
