#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::todo,
    clippy::unimplemented,
    clippy::indexing_slicing
)]
//! Protocol serialization tests for the Quizwire client.
//!
//! Verifies round-trip serialization of every protocol type, the camelCase
//! event/field naming on the wire, ack-versus-event disambiguation, and JSON
//! fixtures that match real server output.

use quizwire_client::protocol::{
    AckEnvelope, BasicAck, ClientRequest, CreateLobbyAck, JoinLobbyAck, LobbiesAck, LobbyDetails,
    LobbySettings, LobbyStatus, LobbySummary, NewQuestionPayload, PlayerRef, PlayerScore, Question,
    RequestEnvelope, ServerEvent, ServerMessage,
};

// ════════════════════════════════════════════════════════════════════
// Helpers
// ════════════════════════════════════════════════════════════════════

/// Serialize `val` to JSON, then deserialize back to `T` and return it.
fn round_trip<T: serde::Serialize + serde::de::DeserializeOwned>(val: &T) -> T {
    let json = serde_json::to_string(val).expect("serialize");
    serde_json::from_str(&json).expect("deserialize")
}

fn sample_details() -> LobbyDetails {
    LobbyDetails {
        id: "L1".into(),
        name: "Ann's Game".into(),
        settings: LobbySettings {
            category: "Music".into(),
            max_players: 8,
        },
        host: PlayerRef {
            id: "S1".into(),
            name: "Ann".into(),
        },
        players: vec![
            PlayerRef {
                id: "S1".into(),
                name: "Ann".into(),
            },
            PlayerRef {
                id: "S2".into(),
                name: "Bo".into(),
            },
        ],
    }
}

fn sample_question() -> Question {
    Question {
        id: "Q7".into(),
        text: "Which planet is known as the Red Planet?".into(),
        options: vec![
            "Venus".into(),
            "Mars".into(),
            "Jupiter".into(),
            "Saturn".into(),
        ],
    }
}

// ════════════════════════════════════════════════════════════════════
// ClientRequest round-trips and wire names
// ════════════════════════════════════════════════════════════════════

#[test]
fn client_request_create_lobby_round_trip() {
    let request = ClientRequest::CreateLobby {
        player_name: "Ann".into(),
        lobby_name: "Ann's Game".into(),
        category: "Music".into(),
    };
    let deser = round_trip(&request);
    assert_eq!(deser, request);
}

#[test]
fn client_request_create_lobby_wire_format() {
    let request = ClientRequest::CreateLobby {
        player_name: "Ann".into(),
        lobby_name: "Ann's Game".into(),
        category: "Music".into(),
    };
    let json: serde_json::Value = serde_json::to_value(&request).expect("serialize");
    assert_eq!(json["event"], "createLobby");
    assert_eq!(json["data"]["playerName"], "Ann");
    assert_eq!(json["data"]["lobbyName"], "Ann's Game");
    assert_eq!(json["data"]["category"], "Music");
}

#[test]
fn client_request_get_lobbies_carries_empty_payload() {
    let request = ClientRequest::GetLobbies {};
    let json: serde_json::Value = serde_json::to_value(&request).expect("serialize");
    assert_eq!(json["event"], "getLobbies");
    assert_eq!(json["data"], serde_json::json!({}));

    let deser = round_trip(&request);
    assert_eq!(deser, request);
}

#[test]
fn client_request_join_lobby_wire_format() {
    let request = ClientRequest::JoinLobby {
        lobby_id: "L1".into(),
        player_name: "Ann".into(),
    };
    let json: serde_json::Value = serde_json::to_value(&request).expect("serialize");
    assert_eq!(json["event"], "joinLobby");
    assert_eq!(json["data"]["lobbyId"], "L1");
    assert_eq!(json["data"]["playerName"], "Ann");
}

#[test]
fn client_request_leave_and_start_round_trip() {
    let leave = ClientRequest::LeaveLobby {
        lobby_id: "L1".into(),
    };
    assert_eq!(round_trip(&leave), leave);
    let json: serde_json::Value = serde_json::to_value(&leave).expect("serialize");
    assert_eq!(json["event"], "leaveLobby");

    let start = ClientRequest::StartGame {
        lobby_id: "L1".into(),
    };
    assert_eq!(round_trip(&start), start);
    let json: serde_json::Value = serde_json::to_value(&start).expect("serialize");
    assert_eq!(json["event"], "startGame");
}

#[test]
fn client_request_submit_answer_wire_format() {
    let request = ClientRequest::SubmitAnswer {
        lobby_id: "L1".into(),
        question_id: "Q7".into(),
        answer_index: 2,
    };
    let json: serde_json::Value = serde_json::to_value(&request).expect("serialize");
    assert_eq!(json["event"], "submitAnswer");
    assert_eq!(json["data"]["lobbyId"], "L1");
    assert_eq!(json["data"]["questionId"], "Q7");
    assert_eq!(json["data"]["answerIndex"], 2);

    assert_eq!(round_trip(&request), request);
}

#[test]
fn request_envelope_flattens_around_the_request() {
    let envelope = RequestEnvelope {
        ack_id: uuid::Uuid::from_u128(7),
        request: ClientRequest::GetLobbies {},
    };
    let json: serde_json::Value = serde_json::to_value(&envelope).expect("serialize");
    assert_eq!(json["ackId"], uuid::Uuid::from_u128(7).to_string());
    assert_eq!(json["event"], "getLobbies");

    let deser: RequestEnvelope = round_trip(&envelope);
    assert_eq!(deser.ack_id, envelope.ack_id);
    assert_eq!(deser.request, envelope.request);
}

// ════════════════════════════════════════════════════════════════════
// ServerEvent round-trips and wire names
// ════════════════════════════════════════════════════════════════════

#[test]
fn server_event_connected_round_trip() {
    let event = ServerEvent::Connected {
        session_id: "S1".into(),
    };
    let json: serde_json::Value = serde_json::to_value(&event).expect("serialize");
    assert_eq!(json["event"], "connected");
    assert_eq!(json["data"]["sessionId"], "S1");
    assert_eq!(round_trip(&event), event);
}

#[test]
fn server_event_lobbies_list_update_round_trip() {
    let event = ServerEvent::LobbiesListUpdate(vec![LobbySummary {
        id: "L1".into(),
        name: "Ann's Game".into(),
        host_name: "Ann".into(),
        category: "Music".into(),
        player_count: 2,
        max_players: 8,
        status: LobbyStatus::Waiting,
    }]);
    let json: serde_json::Value = serde_json::to_value(&event).expect("serialize");
    assert_eq!(json["event"], "lobbiesListUpdate");
    assert_eq!(json["data"][0]["hostName"], "Ann");
    assert_eq!(json["data"][0]["status"], "waiting");
    assert_eq!(round_trip(&event), event);
}

#[test]
fn server_event_player_joined_round_trip() {
    let event = ServerEvent::PlayerJoined {
        player: PlayerRef {
            id: "S2".into(),
            name: "Bo".into(),
        },
        lobby_details: sample_details(),
    };
    let json: serde_json::Value = serde_json::to_value(&event).expect("serialize");
    assert_eq!(json["event"], "playerJoined");
    assert_eq!(json["data"]["lobbyDetails"]["settings"]["maxPlayers"], 8);
    assert_eq!(round_trip(&event), event);
}

#[test]
fn server_event_player_left_round_trip() {
    let event = ServerEvent::PlayerLeft {
        player_id: "S2".into(),
        player_name: Some("Bo".into()),
        lobby_details: sample_details(),
    };
    let json: serde_json::Value = serde_json::to_value(&event).expect("serialize");
    assert_eq!(json["event"], "playerLeft");
    assert_eq!(json["data"]["playerId"], "S2");
    assert_eq!(round_trip(&event), event);
}

#[test]
fn server_event_player_left_without_name_parses() {
    let raw = serde_json::json!({
        "event": "playerLeft",
        "data": {
            "playerId": "S2",
            "lobbyDetails": serde_json::to_value(sample_details()).unwrap(),
        },
    });
    let event: ServerEvent = serde_json::from_value(raw).expect("deserialize");
    if let ServerEvent::PlayerLeft {
        player_id,
        player_name,
        ..
    } = event
    {
        assert_eq!(player_id, "S2");
        assert!(player_name.is_none());
    } else {
        panic!("expected PlayerLeft variant");
    }
}

#[test]
fn server_event_new_host_round_trip() {
    let event = ServerEvent::NewHost {
        host: PlayerRef {
            id: "S2".into(),
            name: "Bo".into(),
        },
        lobby_details: sample_details(),
    };
    let json: serde_json::Value = serde_json::to_value(&event).expect("serialize");
    assert_eq!(json["event"], "newHost");
    assert_eq!(round_trip(&event), event);
}

#[test]
fn server_event_game_started_with_and_without_payload() {
    let event = ServerEvent::GameStarted {
        lobby_id: Some("L1".into()),
    };
    assert_eq!(round_trip(&event), event);

    // The trigger payload is opaque; an empty one must still parse.
    let raw = serde_json::json!({ "event": "gameStarted", "data": {} });
    let event: ServerEvent = serde_json::from_value(raw).expect("deserialize");
    assert_eq!(event, ServerEvent::GameStarted { lobby_id: None });
}

#[test]
fn server_event_kicked_and_lobby_closed_round_trip() {
    let kicked = ServerEvent::Kicked {
        message: "Removed by host".into(),
    };
    assert_eq!(round_trip(&kicked), kicked);

    let closed = ServerEvent::LobbyClosed;
    let json = serde_json::to_string(&closed).expect("serialize");
    assert_eq!(json, r#"{"event":"lobbyClosed"}"#);
    assert_eq!(round_trip(&closed), closed);
}

#[test]
fn server_event_new_question_round_trip() {
    let event = ServerEvent::NewQuestion(Box::new(NewQuestionPayload {
        question: sample_question(),
        question_number: 2,
        total_questions: 5,
        time_limit: 20,
        players: vec![PlayerScore {
            id: "S1".into(),
            name: "Ann".into(),
            score: 10,
        }],
    }));
    let json: serde_json::Value = serde_json::to_value(&event).expect("serialize");
    assert_eq!(json["event"], "newQuestion");
    assert_eq!(json["data"]["questionNumber"], 2);
    assert_eq!(json["data"]["timeLimit"], 20);
    assert_eq!(round_trip(&event), event);
}

#[test]
fn server_event_new_question_without_players_parses() {
    let raw = serde_json::json!({
        "event": "newQuestion",
        "data": {
            "question": serde_json::to_value(sample_question()).unwrap(),
            "questionNumber": 1,
            "totalQuestions": 5,
            "timeLimit": 15,
        },
    });
    let event: ServerEvent = serde_json::from_value(raw).expect("deserialize");
    if let ServerEvent::NewQuestion(payload) = event {
        assert!(payload.players.is_empty());
    } else {
        panic!("expected NewQuestion variant");
    }
}

#[test]
fn question_wire_format_never_carries_the_answer() {
    // The server withholds the correct index until resolution; the client
    // type must not even have a slot for it before then.
    let json: serde_json::Value = serde_json::to_value(sample_question()).expect("serialize");
    let keys: Vec<&String> = json.as_object().unwrap().keys().collect();
    assert_eq!(keys, ["id", "options", "text"]);
}

#[test]
fn server_event_score_update_round_trip() {
    let event = ServerEvent::ScoreUpdate(vec![
        PlayerScore {
            id: "S1".into(),
            name: "Ann".into(),
            score: 30,
        },
        PlayerScore {
            id: "S2".into(),
            name: "Bo".into(),
            score: 20,
        },
    ]);
    let json: serde_json::Value = serde_json::to_value(&event).expect("serialize");
    assert_eq!(json["event"], "scoreUpdate");
    assert_eq!(json["data"][0]["score"], 30);
    assert_eq!(round_trip(&event), event);
}

#[test]
fn server_event_answer_feedback_round_trip() {
    let event = ServerEvent::AnswerFeedback {
        correct: false,
        correct_answer_index: 1,
        score_earned: 0,
    };
    let json: serde_json::Value = serde_json::to_value(&event).expect("serialize");
    assert_eq!(json["event"], "answerFeedback");
    assert_eq!(json["data"]["correctAnswerIndex"], 1);
    assert_eq!(json["data"]["scoreEarned"], 0);
    assert_eq!(round_trip(&event), event);
}

#[test]
fn server_event_round_end_round_trip() {
    let event = ServerEvent::RoundEnd {
        correct_answer_index: 3,
    };
    let json: serde_json::Value = serde_json::to_value(&event).expect("serialize");
    assert_eq!(json["event"], "roundEnd");
    assert_eq!(round_trip(&event), event);
}

#[test]
fn server_event_game_over_round_trip() {
    let event = ServerEvent::GameOver {
        players: vec![PlayerScore {
            id: "S1".into(),
            name: "Ann".into(),
            score: 30,
        }],
    };
    let json: serde_json::Value = serde_json::to_value(&event).expect("serialize");
    assert_eq!(json["event"], "gameOver");
    assert_eq!(round_trip(&event), event);
}

#[test]
fn server_event_errors_round_trip() {
    let game_error = ServerEvent::GameError {
        message: "question bank exhausted".into(),
    };
    let json: serde_json::Value = serde_json::to_value(&game_error).expect("serialize");
    assert_eq!(json["event"], "gameError");
    assert_eq!(round_trip(&game_error), game_error);

    let generic = ServerEvent::Error {
        message: "something went wrong".into(),
    };
    let json: serde_json::Value = serde_json::to_value(&generic).expect("serialize");
    assert_eq!(json["event"], "error");
    assert_eq!(round_trip(&generic), generic);
}

// ════════════════════════════════════════════════════════════════════
// ServerMessage disambiguation
// ════════════════════════════════════════════════════════════════════

#[test]
fn server_message_with_ack_id_parses_as_ack() {
    let ack_id = uuid::Uuid::from_u128(42);
    let raw = serde_json::json!({
        "ackId": ack_id.to_string(),
        "data": { "success": true },
    });
    let message: ServerMessage = serde_json::from_value(raw).expect("deserialize");
    match message {
        ServerMessage::Ack(AckEnvelope { ack_id: id, data }) => {
            assert_eq!(id, ack_id);
            assert_eq!(data["success"], true);
        }
        ServerMessage::Event(event) => panic!("expected ack, got event {event:?}"),
    }
}

#[test]
fn server_message_with_event_name_parses_as_event() {
    let raw = serde_json::json!({
        "event": "kicked",
        "data": { "message": "Removed by host" },
    });
    let message: ServerMessage = serde_json::from_value(raw).expect("deserialize");
    match message {
        ServerMessage::Event(ServerEvent::Kicked { message }) => {
            assert_eq!(message, "Removed by host");
        }
        other => panic!("expected kicked event, got {other:?}"),
    }
}

#[test]
fn server_message_round_trips_both_shapes() {
    let ack = ServerMessage::Ack(AckEnvelope {
        ack_id: uuid::Uuid::from_u128(1),
        data: serde_json::json!({ "success": false, "message": "nope" }),
    });
    let deser = round_trip(&ack);
    assert!(matches!(deser, ServerMessage::Ack(_)));

    let event = ServerMessage::Event(ServerEvent::LobbyClosed);
    let deser = round_trip(&event);
    assert!(matches!(
        deser,
        ServerMessage::Event(ServerEvent::LobbyClosed)
    ));
}

// ════════════════════════════════════════════════════════════════════
// Ack payloads
// ════════════════════════════════════════════════════════════════════

#[test]
fn create_lobby_ack_success_fixture() {
    let raw = r#"{"success":true,"lobbyId":"L1"}"#;
    let ack: CreateLobbyAck = serde_json::from_str(raw).expect("deserialize");
    assert!(ack.success);
    assert_eq!(ack.lobby_id.as_deref(), Some("L1"));
    assert!(ack.message.is_none());
}

#[test]
fn create_lobby_ack_failure_fixture() {
    let raw = r#"{"success":false,"message":"lobby name taken"}"#;
    let ack: CreateLobbyAck = serde_json::from_str(raw).expect("deserialize");
    assert!(!ack.success);
    assert!(ack.lobby_id.is_none());
    assert_eq!(ack.message.as_deref(), Some("lobby name taken"));
}

#[test]
fn join_lobby_ack_success_fixture() {
    let details = sample_details();
    let raw = serde_json::json!({
        "success": true,
        "lobbyDetails": serde_json::to_value(&details).unwrap(),
    });
    let ack: JoinLobbyAck = serde_json::from_value(raw).expect("deserialize");
    assert!(ack.success);
    assert_eq!(ack.lobby_details, Some(details));
}

#[test]
fn basic_ack_fixtures() {
    let ok: BasicAck = serde_json::from_str(r#"{"success":true}"#).expect("deserialize");
    assert!(ok.success);

    let failed: BasicAck =
        serde_json::from_str(r#"{"success":false,"message":"not the host"}"#).expect("deserialize");
    assert!(!failed.success);
    assert_eq!(failed.message.as_deref(), Some("not the host"));
}

#[test]
fn lobbies_ack_parses_list_or_error() {
    let list: LobbiesAck = serde_json::from_str(
        r#"[{"id":"L1","name":"Ann's Game","hostName":"Ann","category":"Music","playerCount":1,"maxPlayers":8,"status":"waiting"}]"#,
    )
    .expect("deserialize");
    match list {
        LobbiesAck::Lobbies(lobbies) => {
            assert_eq!(lobbies.len(), 1);
            assert_eq!(lobbies[0].id, "L1");
        }
        LobbiesAck::Failed { error } => panic!("expected listing, got error {error}"),
    }

    let failed: LobbiesAck =
        serde_json::from_str(r#"{"error":"listing unavailable"}"#).expect("deserialize");
    assert!(matches!(failed, LobbiesAck::Failed { .. }));
}

#[test]
fn lobby_status_serializes_lowercase() {
    assert_eq!(
        serde_json::to_string(&LobbyStatus::Waiting).expect("serialize"),
        r#""waiting""#
    );
    assert_eq!(
        serde_json::to_string(&LobbyStatus::Playing).expect("serialize"),
        r#""playing""#
    );
}

#[test]
fn unknown_event_name_fails_to_parse() {
    let raw = serde_json::json!({ "event": "totallyUnknown", "data": {} });
    assert!(serde_json::from_value::<ServerMessage>(raw).is_err());
}
