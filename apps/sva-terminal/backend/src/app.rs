//! Application definition, including all HTTP route handlers.
//!
//! Route handlers are bundled via [`setup`] into an [`axum::Router`], which can
//! then be run using [`run`] at the configured port (see
//! [`config`][`super::config`]).

use std::convert::Infallible;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::Path;

use async_stream::stream;
use axum::extract::rejection::PathRejection;
use axum::extract::{Path as UrlPath, State};
use axum::http::StatusCode;
use axum::response::sse::{Event, KeepAlive};
use axum::response::{IntoResponse, Response, Sse};
use axum::routing::{get, post};
use axum::{Json, Router};
use futures_core::Stream;
use serde_json::json;
use tower_http::services::{ServeDir, ServeFile};
use tower_http::trace::TraceLayer;
use tracing::Level;
use types_rs::roster::ExaminationSession;
use types_rs::terminal::{Action, TerminalSnapshot};

use crate::config::Config;
use crate::terminal::{Terminal, TerminalError};

type AppState = Terminal;

/// Prepares the application with all the routes. Run the application with
/// `app::run(…)` once you have it.
pub fn setup(terminal: Terminal, public_dir: Option<&Path>) -> Router {
    let _entered = tracing::span!(Level::DEBUG, "Setting up application").entered();

    let router = match public_dir {
        Some(public_dir) => Router::new().fallback_service(
            ServeDir::new(public_dir)
                .append_index_html_on_directories(true)
                .fallback(ServeFile::new(public_dir.join("index.html"))),
        ),
        None => {
            tracing::info!("No PUBLIC_DIR configured, serving no files");
            Router::new()
        }
    };

    router
        .route("/api/status", get(get_status))
        .route("/api/exam", get(get_exam))
        .route("/api/terminal", get(get_terminal))
        .route("/api/terminal-stream", get(get_terminal_stream))
        .route("/api/actions/:action", post(perform_action))
        .layer(TraceLayer::new_for_http())
        .with_state(terminal)
}

/// Runs an application built by `app::setup(…)`.
pub async fn run(app: Router, config: &Config) -> color_eyre::Result<()> {
    let addr = SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), config.port);
    tracing::info!("Server listening at http://{addr}/");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

/// Always responds with a successful status. Used to check whether the server
/// is running.
async fn get_status() -> impl IntoResponse {
    StatusCode::OK
}

async fn get_exam(State(terminal): State<AppState>) -> Json<ExaminationSession> {
    Json(terminal.exam().clone())
}

async fn get_terminal(State(terminal): State<AppState>) -> Json<TerminalSnapshot> {
    Json(terminal.snapshot())
}

/// Streams the current snapshot, then one event per change.
async fn get_terminal_stream(
    State(terminal): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let mut snapshots = terminal.subscribe();

    Sse::new(stream! {
        loop {
            let snapshot = snapshots.borrow_and_update().clone();
            match Event::default().json_data(&snapshot) {
                Ok(event) => yield Ok::<_, Infallible>(event),
                Err(e) => tracing::error!("error encoding snapshot: {e}"),
            }

            if snapshots.changed().await.is_err() {
                tracing::debug!("terminal stopped, closing snapshot stream");
                break;
            }
        }
    })
    .keep_alive(KeepAlive::default())
}

async fn perform_action(
    State(terminal): State<AppState>,
    action: Result<UrlPath<Action>, PathRejection>,
) -> Result<Json<TerminalSnapshot>, Response> {
    let UrlPath(action) = action.map_err(|rejection| {
        tracing::warn!("unknown action: {}", rejection.body_text());
        failure(StatusCode::BAD_REQUEST, rejection.body_text())
    })?;

    terminal.perform(action).await.map(Json).map_err(|e| {
        let status = match e {
            TerminalError::Rejected(_) => StatusCode::CONFLICT,
            TerminalError::Closed => {
                tracing::error!("action {action} sent to a stopped terminal");
                StatusCode::SERVICE_UNAVAILABLE
            }
        };
        failure(status, e.to_string())
    })
}

fn failure(status: StatusCode, error: String) -> Response {
    (
        status,
        Json(json!({
            "success": false,
            "error": error,
        })),
    )
        .into_response()
}

#[cfg(test)]
mod test {
    use std::sync::Arc;
    use std::time::Duration;

    use axum::body::{Body, BodyDataStream};
    use axum::http::{header, Request};
    use biometrics_rs::ScriptedProvider;
    use futures::StreamExt;
    use pretty_assertions::assert_eq;
    use tower::ServiceExt;
    use types_rs::roster::Roster;
    use types_rs::terminal::Screen;

    use super::*;
    use crate::terminal::Timings;

    fn app(provider: ScriptedProvider) -> (Router, Terminal) {
        let terminal = Terminal::new(
            Arc::new(ExaminationSession::sample()),
            Arc::new(provider),
            Timings::default(),
        );
        (setup(terminal.clone(), None), terminal)
    }

    async fn send(app: &Router, method: &str, uri: &str) -> (StatusCode, serde_json::Value) {
        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .method(method)
                    .uri(uri)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        let status = response.status();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json = if body.is_empty() {
            serde_json::Value::Null
        } else {
            serde_json::from_slice(&body).unwrap()
        };
        (status, json)
    }

    #[tokio::test]
    async fn status_and_exam() {
        let (app, _) = app(ScriptedProvider::new());

        assert_eq!(send(&app, "GET", "/api/status").await.0, StatusCode::OK);

        let (status, exam) = send(&app, "GET", "/api/exam").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(exam["courseCode"], "CSC401");
        assert_eq!(exam["courseName"], "Advanced Database Systems");
    }

    #[tokio::test]
    async fn actions_move_the_terminal_along() {
        let john = Roster::sample().students()[0].clone();
        let (app, terminal) = app(ScriptedProvider::new().identify(Some(john)));
        let mut snapshots = terminal.subscribe();

        let (status, snapshot) = send(&app, "POST", "/api/actions/begin-face-scan").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(snapshot["screen"], "faceScanning");
        assert_eq!(snapshot["progress"], 0);

        tokio::time::timeout(
            Duration::from_secs(5),
            snapshots.wait_for(|snapshot| snapshot.screen == Screen::StudentInfo),
        )
        .await
        .unwrap()
        .unwrap();

        let (status, snapshot) = send(&app, "GET", "/api/terminal").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(snapshot["screen"], "studentInfo");
        assert_eq!(snapshot["candidate"]["id"], "STU001");

        let (status, snapshot) = send(&app, "POST", "/api/actions/confirm-registration").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(snapshot["screen"], "fingerprintPrompt");
    }

    #[tokio::test]
    async fn invalid_actions_conflict() {
        let (app, terminal) = app(ScriptedProvider::new());

        let (status, body) = send(&app, "POST", "/api/actions/verify-next").await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["success"], false);
        assert_eq!(
            body["error"],
            "verify-next is not available on the welcome screen"
        );
        assert_eq!(terminal.snapshot().screen, Screen::Welcome);
    }

    #[tokio::test]
    async fn unknown_actions_are_bad_requests() {
        let (app, terminal) = app(ScriptedProvider::new());

        let (status, body) = send(&app, "POST", "/api/actions/approve-everyone").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["success"], false);
        let error = body["error"].as_str().unwrap();
        assert!(error.contains("approve-everyone"), "{error}");
        assert_eq!(terminal.snapshot().screen, Screen::Welcome);
    }

    #[tokio::test]
    async fn actions_on_a_stopped_terminal_are_unavailable() {
        // Start the terminal task on a runtime that is shut down right away.
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        let terminal = {
            let _entered = runtime.enter();
            Terminal::new(
                Arc::new(ExaminationSession::sample()),
                Arc::new(ScriptedProvider::new()),
                Timings::default(),
            )
        };
        runtime.shutdown_background();
        let app = setup(terminal, None);

        let (status, body) = send(&app, "POST", "/api/actions/begin-face-scan").await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["success"], false);
        assert_eq!(body["error"], "terminal is not running");

        let (status, snapshot) = send(&app, "GET", "/api/terminal").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(snapshot["screen"], "welcome");
    }

    async fn next_event(stream: &mut BodyDataStream) -> serde_json::Value {
        let chunk = tokio::time::timeout(Duration::from_secs(5), stream.next())
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        let text = std::str::from_utf8(&chunk).unwrap();
        let data = text
            .lines()
            .find_map(|line| line.strip_prefix("data:"))
            .unwrap();
        serde_json::from_str(data.trim_start()).unwrap()
    }

    #[tokio::test]
    async fn snapshot_stream_sends_the_current_snapshot_then_every_change() {
        let (app, terminal) = app(ScriptedProvider::new().identify_hang());

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/api/terminal-stream")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()[header::CONTENT_TYPE],
            "text/event-stream"
        );

        let mut events = response.into_body().into_data_stream();
        let first = next_event(&mut events).await;
        assert_eq!(first["screen"], "welcome");
        assert_eq!(first["generation"], 0);

        terminal.perform(Action::BeginFaceScan).await.unwrap();
        let next = next_event(&mut events).await;
        assert_eq!(next["screen"], "faceScanning");
        assert_eq!(next["generation"], 1);
    }
}
