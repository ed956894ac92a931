#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::todo,
    clippy::unimplemented,
    clippy::indexing_slicing
)]
//! Integration tests driving the directory, lobby and game sessions over a
//! scripted mock transport, the way a view-layer driver would: one event at
//! a time off the broadcast channel into whichever session is active.

mod common;

use std::time::Duration;

use quizwire_client::connection::{QuizwireConfig, QuizwireConnection};
use quizwire_client::directory::LobbyDirectory;
use quizwire_client::game::{GamePhase, GameSession};
use quizwire_client::lobby::{LobbyExit, LobbyPhase, LobbySession};
use quizwire_client::protocol::{ClientRequest, ServerEvent};
use quizwire_client::{PlayerName, QuizwireError, QuizwireEvent};

use common::{
    connect_client, connect_client_with_config, create_lobby_ack, failed_ack, join_lobby_ack,
    lobbies_ack, lobbies_error_ack, lobby_details, lobby_summary, ok_ack, player, question_payload,
    recv_event, MockConnector, MockTransport,
};

// ════════════════════════════════════════════════════════════════════
// Directory flows
// ════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn ann_creates_a_lobby_and_waits_as_host() {
    let (conn, _events, server) = connect_client("S1").await;
    let name = PlayerName::new("Ann").unwrap();

    // Directory loads an empty listing.
    server.queue_ack(lobbies_ack(&[]));
    let mut directory = LobbyDirectory::new();
    directory.refresh(&conn).await.unwrap();
    assert!(directory.is_loaded());
    assert!(directory.lobbies().is_empty());

    // Create "Ann's Game" in the Music category.
    server.queue_ack(create_lobby_ack("L1"));
    let lobby_id = directory
        .create(&conn, &name, "Ann's Game", "Music")
        .await
        .unwrap();
    assert_eq!(lobby_id, "L1");

    // Join the new lobby and land in Waiting with ourselves as host.
    let ann = player("S1", "Ann");
    server.queue_ack(join_lobby_ack(&lobby_details("L1", &ann, &[ann.clone()])));
    let session = LobbySession::join(&conn, lobby_id, &name).await;

    assert_eq!(session.phase(), &LobbyPhase::Waiting);
    let details = session.details().unwrap();
    assert_eq!(details.id, "L1");
    assert_eq!(details.host.name, "Ann");
    assert!(session.is_host(conn.session_id().as_deref()));

    // The wire saw exactly the three expected requests.
    let requests = server.sent_requests();
    assert_eq!(requests.len(), 3);
    assert_eq!(requests[0].request, ClientRequest::GetLobbies {});
    assert!(matches!(
        requests[1].request,
        ClientRequest::CreateLobby { .. }
    ));
    assert!(matches!(requests[2].request, ClientRequest::JoinLobby { .. }));
}

#[tokio::test]
async fn refresh_failure_empties_the_list_and_surfaces_the_error() {
    let (conn, _events, server) = connect_client("S1").await;
    let mut directory = LobbyDirectory::new();

    server.queue_ack(lobbies_ack(&[lobby_summary("L1", "Ann's Game", "Ann")]));
    directory.refresh(&conn).await.unwrap();
    assert_eq!(directory.lobbies().len(), 1);

    server.queue_ack(lobbies_error_ack("listing unavailable"));
    let err = directory.refresh(&conn).await.unwrap_err();
    assert!(matches!(err, QuizwireError::RequestFailed(_)));
    assert!(directory.lobbies().is_empty());
    assert_eq!(directory.last_error(), Some("listing unavailable"));
}

#[tokio::test]
async fn create_with_empty_inputs_never_reaches_the_wire() {
    let (conn, _events, server) = connect_client("S1").await;
    let name = PlayerName::new("Ann").unwrap();
    let directory = LobbyDirectory::new();

    let err = directory.create(&conn, &name, "   ", "Music").await.unwrap_err();
    assert!(matches!(err, QuizwireError::Validation(_)));
    let err = directory.create(&conn, &name, "Ann's Game", "").await.unwrap_err();
    assert!(matches!(err, QuizwireError::Validation(_)));

    assert!(server.sent_requests().is_empty());
}

#[tokio::test]
async fn push_update_replaces_the_directory_wholesale() {
    let (conn, mut events, server) = connect_client("S1").await;
    let mut directory = LobbyDirectory::new();

    server.queue_ack(lobbies_ack(&[lobby_summary("L1", "Ann's Game", "Ann")]));
    directory.refresh(&conn).await.unwrap();

    // Another client's lobby appears; ours disappears.
    server.push_event(ServerEvent::LobbiesListUpdate(vec![lobby_summary(
        "L2", "Bo's Game", "Bo",
    )]));
    let event = recv_event(&mut events).await;
    let needs_refresh = directory.apply_event(&event);
    assert!(!needs_refresh);
    assert_eq!(directory.lobbies().len(), 1);
    assert_eq!(directory.lobbies()[0].id, "L2");
}

#[tokio::test]
async fn reconnect_marks_the_directory_stale_and_refreshes() {
    // Two scripted transports: the second serves the reconnect.
    let (first, server1) = MockTransport::new();
    let (second, server2) = MockTransport::new();
    let connector = MockConnector::new(vec![first, second]);
    let (conn, mut events) = QuizwireConnection::new(connector, QuizwireConfig::new());

    conn.connect().await.unwrap();
    server1.push_event(ServerEvent::Connected {
        session_id: "S1".into(),
    });
    let event = recv_event(&mut events).await;
    assert!(matches!(event, QuizwireEvent::Connected { .. }));

    let mut directory = LobbyDirectory::new();
    server1.queue_ack(lobbies_ack(&[lobby_summary("L1", "Ann's Game", "Ann")]));
    directory.refresh(&conn).await.unwrap();

    // The server drops the connection; anything we hold is now stale.
    server1.close_connection();
    let event = recv_event(&mut events).await;
    assert!(matches!(event, QuizwireEvent::Disconnected { .. }));
    assert!(!directory.apply_event(&event));

    // Reconnect: fresh identity, and the directory demands a refresh.
    conn.connect().await.unwrap();
    server2.push_event(ServerEvent::Connected {
        session_id: "S9".into(),
    });
    let event = recv_event(&mut events).await;
    assert_eq!(
        event,
        QuizwireEvent::Connected {
            session_id: "S9".into()
        }
    );
    assert!(directory.apply_event(&event));

    server2.queue_ack(lobbies_ack(&[]));
    directory.refresh(&conn).await.unwrap();
    assert!(directory.lobbies().is_empty());
    assert_eq!(conn.session_id().as_deref(), Some("S9"));
}

// ════════════════════════════════════════════════════════════════════
// Lobby flows
// ════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn join_failure_lands_in_failed_with_the_server_message() {
    let (conn, _events, server) = connect_client("S1").await;
    let name = PlayerName::new("Ann").unwrap();

    server.queue_ack(failed_ack("Lobby is full"));
    let session = LobbySession::join(&conn, "L1", &name).await;
    assert_eq!(
        session.phase(),
        &LobbyPhase::Ended(LobbyExit::Failed {
            message: "Lobby is full".into()
        })
    );
}

#[tokio::test]
async fn self_player_left_returns_to_directory_with_a_notice() {
    let (conn, mut events, server) = connect_client("S1").await;
    let name = PlayerName::new("Ann").unwrap();
    let ann = player("S1", "Ann");

    server.queue_ack(join_lobby_ack(&lobby_details("L1", &ann, &[ann.clone()])));
    let mut session = LobbySession::join(&conn, "L1", &name).await;
    assert_eq!(session.phase(), &LobbyPhase::Waiting);

    server.push_event(ServerEvent::PlayerLeft {
        player_id: "S1".into(),
        player_name: Some("Ann".into()),
        lobby_details: lobby_details("L1", &ann, &[]),
    });
    let event = recv_event(&mut events).await;
    session.apply_event(conn.session_id().as_deref(), &event);

    assert!(matches!(
        session.phase(),
        LobbyPhase::Ended(LobbyExit::Left { .. })
    ));
}

#[tokio::test]
async fn start_game_ack_holds_until_the_broadcast_arrives() {
    let (conn, mut events, server) = connect_client("S1").await;
    let name = PlayerName::new("Ann").unwrap();
    let ann = player("S1", "Ann");
    let bo = player("S2", "Bo");

    server.queue_ack(join_lobby_ack(&lobby_details(
        "L1",
        &ann,
        &[ann.clone(), bo],
    )));
    let mut session = LobbySession::join(&conn, "L1", &name).await;

    // The host's start request succeeds, but nobody jumps ahead…
    server.queue_ack(ok_ack());
    session.start_game(&conn).await.unwrap();
    assert_eq!(session.phase(), &LobbyPhase::Waiting);

    // …until the broadcast moves every participant in lockstep.
    server.push_event(ServerEvent::GameStarted {
        lobby_id: Some("L1".into()),
    });
    let event = recv_event(&mut events).await;
    session.apply_event(conn.session_id().as_deref(), &event);
    assert_eq!(session.phase(), &LobbyPhase::Starting);
}

#[tokio::test]
async fn failed_leave_keeps_the_session_unchanged() {
    let (conn, _events, server) = connect_client("S1").await;
    let name = PlayerName::new("Ann").unwrap();
    let ann = player("S1", "Ann");

    server.queue_ack(join_lobby_ack(&lobby_details("L1", &ann, &[ann.clone()])));
    let mut session = LobbySession::join(&conn, "L1", &name).await;

    server.queue_ack(failed_ack("not in this lobby"));
    let err = session.leave(&conn).await.unwrap_err();
    assert!(matches!(err, QuizwireError::RequestFailed(_)));
    // No optimistic removal.
    assert_eq!(session.phase(), &LobbyPhase::Waiting);
    assert!(session.details().is_some());
}

#[tokio::test]
async fn kicked_push_ends_the_lobby_session() {
    let (conn, mut events, server) = connect_client("S1").await;
    let name = PlayerName::new("Ann").unwrap();
    let ann = player("S1", "Ann");

    server.queue_ack(join_lobby_ack(&lobby_details("L1", &ann, &[ann.clone()])));
    let mut session = LobbySession::join(&conn, "L1", &name).await;

    server.push_event(ServerEvent::Kicked {
        message: "Removed by host".into(),
    });
    let event = recv_event(&mut events).await;
    session.apply_event(conn.session_id().as_deref(), &event);
    assert_eq!(
        session.phase(),
        &LobbyPhase::Ended(LobbyExit::Kicked {
            message: "Removed by host".into()
        })
    );
}

// ════════════════════════════════════════════════════════════════════
// Game flows
// ════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn submitted_answer_reaches_the_wire_and_marks_the_round() {
    let (conn, mut events, server) = connect_client("S1").await;
    let mut game = GameSession::new("L1");

    server.push_event(ServerEvent::NewQuestion(Box::new(question_payload(
        "Q1", 1, 20,
    ))));
    let event = recv_event(&mut events).await;
    game.apply_event(&event);
    assert_eq!(game.phase(), &GamePhase::Answering);

    server.queue_ack(ok_ack());
    let submission = game.submit_answer(&conn, 1).unwrap();
    let outcome = submission.outcome().await;
    game.apply_submission(outcome);

    let round = game.round().unwrap();
    assert_eq!(round.local_answer, Some(1));
    assert!(round.submitted);

    let requests = server.sent_requests();
    assert_eq!(
        requests[0].request,
        ClientRequest::SubmitAnswer {
            lobby_id: "L1".into(),
            question_id: "Q1".into(),
            answer_index: 1,
        }
    );
}

#[tokio::test]
async fn ack_timeout_rolls_back_and_the_next_question_starts_clean() {
    let config = QuizwireConfig::new().with_ack_timeout(Duration::from_millis(50));
    let (conn, mut events, server) = connect_client_with_config("S1", config).await;
    let mut game = GameSession::new("L1");

    server.push_event(ServerEvent::NewQuestion(Box::new(question_payload(
        "Q1", 1, 20,
    ))));
    let event = recv_event(&mut events).await;
    game.apply_event(&event);

    // No acknowledgment ever arrives for the submission.
    let submission = game.submit_answer(&conn, 2).unwrap();
    assert_eq!(game.round().unwrap().local_answer, Some(2));

    let outcome = submission.outcome().await;
    game.apply_submission(outcome);
    assert!(game.round().unwrap().local_answer.is_none());
    assert!(game.last_error().is_some());

    // A subsequent question still resets into a clean answering round.
    server.push_event(ServerEvent::NewQuestion(Box::new(question_payload(
        "Q2", 2, 20,
    ))));
    let event = recv_event(&mut events).await;
    game.apply_event(&event);
    assert_eq!(game.phase(), &GamePhase::Answering);
    let round = game.round().unwrap();
    assert_eq!(round.question.id, "Q2");
    assert!(round.local_answer.is_none());
    assert!(game.last_error().is_none());
}

#[tokio::test]
async fn superseding_question_makes_the_late_outcome_a_no_op() {
    let config = QuizwireConfig::new().with_ack_timeout(Duration::from_millis(50));
    let (conn, mut events, server) = connect_client_with_config("S1", config).await;
    let mut game = GameSession::new("L1");

    server.push_event(ServerEvent::NewQuestion(Box::new(question_payload(
        "Q1", 1, 20,
    ))));
    let event = recv_event(&mut events).await;
    game.apply_event(&event);

    let submission = game.submit_answer(&conn, 0).unwrap();

    // The next question lands while the ack is still outstanding.
    server.push_event(ServerEvent::NewQuestion(Box::new(question_payload(
        "Q2", 2, 20,
    ))));
    let event = recv_event(&mut events).await;
    game.apply_event(&event);

    // The stale outcome must not touch the new round.
    let outcome = submission.outcome().await;
    game.apply_submission(outcome);
    let round = game.round().unwrap();
    assert_eq!(round.question.id, "Q2");
    assert!(round.local_answer.is_none());
    assert!(game.last_error().is_none());
}

#[tokio::test]
async fn game_over_mid_round_tears_the_session_down() {
    let (conn, mut events, server) = connect_client("S1").await;
    let mut game = GameSession::new("L1");

    server.push_event(ServerEvent::NewQuestion(Box::new(question_payload(
        "Q1", 1, 20,
    ))));
    let event = recv_event(&mut events).await;
    game.apply_event(&event);

    server.push_event(ServerEvent::GameOver {
        players: vec![common::score("S2", "Bo", 20), common::score("S1", "Ann", 30)],
    });
    let event = recv_event(&mut events).await;
    game.apply_event(&event);

    match game.phase() {
        GamePhase::GameOver { final_scores } => {
            assert_eq!(final_scores[0].name, "Ann");
            assert_eq!(final_scores[0].score, 30);
            assert_eq!(final_scores[1].name, "Bo");
            assert_eq!(final_scores[1].score, 20);
        }
        other => panic!("expected GameOver, got {other:?}"),
    }

    // Pushes for the torn-down lobby are no longer acted upon.
    server.push_event(ServerEvent::NewQuestion(Box::new(question_payload(
        "Q2", 2, 20,
    ))));
    let event = recv_event(&mut events).await;
    game.apply_event(&event);
    assert!(matches!(game.phase(), GamePhase::GameOver { .. }));

    let _ = conn;
}

#[tokio::test]
async fn feedback_and_round_end_resolve_once_across_the_wire() {
    let (conn, mut events, server) = connect_client("S1").await;
    let mut game = GameSession::new("L1");

    server.push_event(ServerEvent::NewQuestion(Box::new(question_payload(
        "Q1", 1, 20,
    ))));
    game.apply_event(&recv_event(&mut events).await);

    server.queue_ack(ok_ack());
    let submission = game.submit_answer(&conn, 1).unwrap();
    game.apply_submission(submission.outcome().await);

    server.push_event(ServerEvent::AnswerFeedback {
        correct: true,
        correct_answer_index: 1,
        score_earned: 10,
    });
    game.apply_event(&recv_event(&mut events).await);
    assert_eq!(game.phase(), &GamePhase::Resolved);

    // The broadcast arrives afterwards with the same reveal; the personal
    // feedback's fields must survive.
    server.push_event(ServerEvent::RoundEnd {
        correct_answer_index: 1,
    });
    game.apply_event(&recv_event(&mut events).await);

    let resolution = game.round().unwrap().resolution.clone().unwrap();
    assert_eq!(resolution.was_correct, Some(true));
    assert_eq!(resolution.points_earned, Some(10));
}

#[tokio::test]
async fn disconnect_mid_game_is_surfaced_as_a_game_error() {
    let (conn, mut events, server) = connect_client("S1").await;
    let mut game = GameSession::new("L1");

    server.push_event(ServerEvent::NewQuestion(Box::new(question_payload(
        "Q1", 1, 20,
    ))));
    game.apply_event(&recv_event(&mut events).await);

    server.close_connection();
    let event = recv_event(&mut events).await;
    assert!(matches!(event, QuizwireEvent::Disconnected { .. }));
    game.apply_event(&event);

    assert!(matches!(game.phase(), GamePhase::GameError { .. }));
    assert!(!conn.is_connected());
}
