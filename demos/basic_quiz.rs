//! # Basic Quiz Example
//!
//! Demonstrates a complete Quizwire client lifecycle:
//!
//! 1. Load (or set) the player's display name
//! 2. Connect to a Quizwire server via WebSocket
//! 3. Refresh the lobby directory and create a lobby
//! 4. Wait for the `gameStarted` broadcast
//! 5. Play rounds, auto-answering each question, until game over
//! 6. Shut down gracefully on Ctrl+C or disconnect
//!
//! The game loop shows the intended driver shape: one `tokio::select!` over
//! pushed events, the per-second countdown tick, and the in-flight answer
//! acknowledgment — no branch ever blocks another.
//!
//! ## Running
//!
//! ```sh
//! # Start a Quizwire server on localhost:5001, then:
//! cargo run --example basic_quiz
//!
//! # Override the server URL or display name:
//! QUIZWIRE_URL=ws://my-server:5001/ws QUIZWIRE_NAME=Ann cargo run --example basic_quiz
//! ```

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use quizwire_client::connection::{QuizwireConfig, QuizwireConnection};
use quizwire_client::directory::LobbyDirectory;
use quizwire_client::game::{GamePhase, GameSession, SubmissionOutcome};
use quizwire_client::lobby::{LobbyPhase, LobbySession};
use quizwire_client::{IdentityStore, WebSocketConnector};

/// Default server URL when `QUIZWIRE_URL` is not set.
const DEFAULT_URL: &str = "ws://localhost:5001/ws";

/// The in-flight answer acknowledgment, boxed so the select loop can keep
/// polling it across iterations without losing it on cancellation.
type OutcomeFuture = Pin<Box<dyn Future<Output = SubmissionOutcome> + Send>>;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // ── Logging ─────────────────────────────────────────────────────
    // Initialize tracing. Set `RUST_LOG=debug` for verbose output.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    // ── Identity ────────────────────────────────────────────────────
    // The display name gates everything past the entry screen. It persists
    // across runs; `QUIZWIRE_NAME` overrides it.
    let mut identity = IdentityStore::open_default()?;
    if let Ok(raw) = std::env::var("QUIZWIRE_NAME") {
        identity.set_name(&raw)?;
    } else if !identity.is_authorized() {
        identity.set_name("RustPlayer")?;
    }
    let name = identity.name().cloned().ok_or("no player name set")?;
    tracing::info!("Playing as {name}");

    // ── Connect ─────────────────────────────────────────────────────
    let url = std::env::var("QUIZWIRE_URL").unwrap_or_else(|_| DEFAULT_URL.to_string());
    tracing::info!("Connecting to {url}");

    let connector = WebSocketConnector::new(&url).with_timeout(Duration::from_secs(5));
    let (conn, mut events) = QuizwireConnection::new(connector, QuizwireConfig::new());
    conn.connect().await?;

    // ── Directory ───────────────────────────────────────────────────
    let mut directory = LobbyDirectory::new();
    directory.refresh(&conn).await?;
    tracing::info!("{} lobbies currently open", directory.lobbies().len());

    let lobby_id = directory
        .create(&conn, &name, &format!("{name}'s Game"), "General Knowledge")
        .await?;
    tracing::info!("Created lobby {lobby_id}");

    // ── Lobby ───────────────────────────────────────────────────────
    let mut lobby = LobbySession::join(&conn, lobby_id.clone(), &name).await;
    if let LobbyPhase::Ended(exit) = lobby.phase() {
        return Err(format!("could not enter lobby: {exit:?}").into());
    }

    // We created the lobby, so we are host and may start right away; other
    // clients would sit in Waiting until this broadcast.
    if lobby.is_host(conn.session_id().as_deref()) {
        lobby.start_game(&conn).await?;
        tracing::info!("Start requested; waiting for the broadcast…");
    }

    loop {
        tokio::select! {
            event = events.recv() => {
                let event = event?;
                lobby.apply_event(conn.session_id().as_deref(), &event);
                match lobby.phase() {
                    LobbyPhase::Starting => break,
                    LobbyPhase::Ended(exit) => {
                        return Err(format!("lobby ended: {exit:?}").into());
                    }
                    _ => {}
                }
            }
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Interrupted, disconnecting");
                conn.disconnect().await;
                return Ok(());
            }
        }
    }

    // ── Game ────────────────────────────────────────────────────────
    tracing::info!("Game on!");
    let mut game = GameSession::new(lobby_id);
    let mut ticker = tokio::time::interval(Duration::from_secs(1));
    let mut in_flight: Option<OutcomeFuture> = None;

    while !game.is_over() {
        tokio::select! {
            // Branch 1: pushed event — questions, resolutions, scores.
            event = events.recv() => {
                let event = event?;
                game.apply_event(&event);

                if let GamePhase::Resolved = game.phase() {
                    if let Some(resolution) = game.round().and_then(|r| r.resolution.as_ref()) {
                        match resolution.was_correct {
                            Some(true) => tracing::info!("Correct! (+{} points)",
                                resolution.points_earned.unwrap_or(0)),
                            Some(false) => tracing::info!(
                                "Wrong — the answer was option {}", resolution.correct_index),
                            None => tracing::info!(
                                "Round over — the answer was option {}", resolution.correct_index),
                        }
                    }
                }

                // Auto-answer each fresh question with the first option.
                if matches!(game.phase(), GamePhase::Answering)
                    && in_flight.is_none()
                    && game.round().is_some_and(|r| r.local_answer.is_none())
                {
                    if let Some(round) = game.round() {
                        tracing::info!(
                            "Question {}/{}: {}",
                            round.question_number,
                            round.total_questions,
                            round.question.text
                        );
                    }
                    match game.submit_answer(&conn, 0) {
                        Ok(submission) => in_flight = Some(Box::pin(submission.outcome())),
                        Err(e) => tracing::warn!("could not submit: {e}"),
                    }
                }
            }

            // Branch 2: the in-flight acknowledgment resolves. Kept in its
            // slot across iterations so cancellation never loses it.
            outcome = poll_in_flight(&mut in_flight), if in_flight.is_some() => {
                in_flight = None;
                game.apply_submission(outcome);
                if let Some(message) = game.last_error() {
                    tracing::warn!("submission failed: {message}");
                }
            }

            // Branch 3: the local one-second countdown.
            _ = ticker.tick() => {
                game.tick();
                if let (GamePhase::Answering, Some(round)) = (game.phase(), game.round()) {
                    if round.time_left <= 5 && round.time_left > 0 {
                        tracing::info!("{}s left!", round.time_left);
                    }
                }
            }

            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Interrupted mid-game");
                break;
            }
        }
    }

    match game.phase() {
        GamePhase::GameOver { final_scores } => {
            tracing::info!("Game over! Final scores:");
            for row in final_scores {
                tracing::info!("  {}: {}", row.name, row.score);
            }
        }
        GamePhase::GameError { message } => {
            tracing::error!("Game failed: {message}");
        }
        _ => {}
    }

    conn.disconnect().await;
    Ok(())
}

/// Poll the submission future in place; pending forever when none is
/// outstanding (the select guard keeps this branch disabled then).
async fn poll_in_flight(slot: &mut Option<OutcomeFuture>) -> SubmissionOutcome {
    match slot.as_mut() {
        Some(outcome) => outcome.await,
        None => std::future::pending().await,
    }
}
