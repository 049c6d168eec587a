//! Integration tests for the lobby registry and its broadcasts.

use std::sync::Arc;

use degrees_lobby::{Fanout, GamePhase, LobbyConfig, LobbyError, LobbyRegistry};
use degrees_protocol::{LobbyCode, PlayerId, ServerMessage};
use serde_json::{Map, Value, json};
use tokio::sync::mpsc;

type Inbox = mpsc::UnboundedReceiver<ServerMessage>;

fn registry() -> LobbyRegistry {
    LobbyRegistry::new(LobbyConfig::default(), Arc::new(Fanout::new()))
}

/// Registers a connection for `id` and returns its inbox.
async fn connect(registry: &LobbyRegistry, id: u64) -> (PlayerId, Inbox) {
    let (tx, rx) = mpsc::unbounded_channel();
    let player_id = PlayerId(id);
    registry.fanout().register(player_id, tx).await;
    (player_id, rx)
}

fn drain(inbox: &mut Inbox) -> Vec<ServerMessage> {
    let mut out = Vec::new();
    while let Ok(msg) = inbox.try_recv() {
        out.push(msg);
    }
    out
}

fn kinds(msgs: &[ServerMessage]) -> Vec<&'static str> {
    msgs.iter().map(ServerMessage::kind).collect()
}

async fn host_count(registry: &LobbyRegistry, code: &LobbyCode) -> usize {
    let handle = registry.get(code).await.expect("lobby should exist");
    let lobby = handle.lock().await;
    lobby.participants().iter().filter(|p| p.is_host).count()
}

fn settings_patch(value: Value) -> Map<String, Value> {
    value.as_object().cloned().expect("patch must be an object")
}

// =========================================================================
// Create / join
// =========================================================================

#[tokio::test]
async fn test_create_lobby_sends_lobby_created_to_creator() {
    let registry = registry();
    let (host, mut inbox) = connect(&registry, 1).await;

    let code = registry.create_lobby(host, "Ada").await.unwrap();

    assert_eq!(code.as_str().len(), 6);
    match drain(&mut inbox).as_slice() {
        [ServerMessage::LobbyCreated {
            lobby_code,
            player_id,
            is_host,
            settings,
        }] => {
            assert_eq!(lobby_code, &code);
            assert_eq!(*player_id, host);
            assert!(*is_host);
            assert_eq!(settings.get("difficulty"), Some(&json!("medium")));
        }
        other => panic!("unexpected messages: {other:?}"),
    }
}

#[tokio::test]
async fn test_create_lobby_blank_name_rejected() {
    let registry = registry();
    let err = registry.create_lobby(PlayerId(1), "   ").await.unwrap_err();
    assert_eq!(err, LobbyError::NameRequired);
    assert!(registry.is_empty().await);
}

#[tokio::test]
async fn test_create_lobby_codes_are_unique() {
    let registry = registry();
    let mut codes = std::collections::HashSet::new();
    for id in 1..=50 {
        let code = registry.create_lobby(PlayerId(id), "p").await.unwrap();
        assert!(codes.insert(code));
    }
    assert_eq!(registry.len().await, 50);
}

#[tokio::test]
async fn test_join_lobby_notifies_joiner_and_others() {
    let registry = registry();
    let (host, mut host_inbox) = connect(&registry, 1).await;
    let (guest, mut guest_inbox) = connect(&registry, 2).await;
    let code = registry.create_lobby(host, "Ada").await.unwrap();
    drain(&mut host_inbox);

    registry
        .join_lobby(&code.as_str().to_lowercase(), guest, " Bob ")
        .await
        .expect("lower-case code should be accepted");

    match drain(&mut guest_inbox).as_slice() {
        [ServerMessage::LobbyJoined {
            players, is_host, ..
        }] => {
            assert!(!is_host);
            assert_eq!(players.len(), 2);
            assert_eq!(players[1].name, "Bob");
            assert!(!players[1].is_ready);
        }
        other => panic!("unexpected messages: {other:?}"),
    }
    assert_eq!(kinds(&drain(&mut host_inbox)), ["player_joined"]);
}

#[tokio::test]
async fn test_join_lobby_rejections() {
    let registry = registry();
    let code = registry.create_lobby(PlayerId(1), "Ada").await.unwrap();

    assert_eq!(
        registry.join_lobby(code.as_str(), PlayerId(2), "").await,
        Err(LobbyError::NameRequired)
    );
    assert_eq!(
        registry.join_lobby("ABC", PlayerId(2), "Bob").await,
        Err(LobbyError::InvalidCode)
    );
    assert_eq!(
        registry.join_lobby("ZZZZZZ", PlayerId(2), "Bob").await,
        Err(LobbyError::NotFound)
    );
}

#[tokio::test]
async fn test_join_lobby_full_at_capacity() {
    let registry = registry();
    let code = registry.create_lobby(PlayerId(1), "host").await.unwrap();
    for id in 2..=8 {
        registry.join_lobby(code.as_str(), PlayerId(id), "p").await.unwrap();
    }

    let err = registry.join_lobby(code.as_str(), PlayerId(9), "late").await.unwrap_err();

    assert_eq!(err, LobbyError::Full);
    assert_eq!(err.to_string(), "Lobby is full");
}

#[tokio::test]
async fn test_check_joinable_matches_join_rejections_without_joining() {
    let registry = LobbyRegistry::new(
        LobbyConfig {
            max_players: 2,
            ..LobbyConfig::default()
        },
        Arc::new(Fanout::new()),
    );
    let code = registry.create_lobby(PlayerId(1), "host").await.unwrap();

    assert_eq!(registry.check_joinable(code.as_str(), "  ").await, Err(LobbyError::NameRequired));
    assert_eq!(registry.check_joinable("nope", "p").await, Err(LobbyError::InvalidCode));
    assert_eq!(registry.check_joinable("ZZZZZZ", "p").await, Err(LobbyError::NotFound));
    let lower = code.as_str().to_ascii_lowercase();
    assert_eq!(registry.check_joinable(&lower, "p").await, Ok(code.clone()));
    assert_eq!(registry.get(&code).await.unwrap().lock().await.len(), 1);

    registry.join_lobby(code.as_str(), PlayerId(2), "p").await.unwrap();
    assert_eq!(registry.check_joinable(code.as_str(), "p").await, Err(LobbyError::Full));
}

#[tokio::test]
async fn test_join_lobby_custom_capacity() {
    let config = LobbyConfig {
        max_players: 2,
        ..LobbyConfig::default()
    };
    let registry = LobbyRegistry::new(config, Arc::new(Fanout::new()));
    let code = registry.create_lobby(PlayerId(1), "host").await.unwrap();
    registry.join_lobby(code.as_str(), PlayerId(2), "p").await.unwrap();

    assert_eq!(
        registry.join_lobby(code.as_str(), PlayerId(3), "p").await,
        Err(LobbyError::Full)
    );
}

#[tokio::test]
async fn test_join_allowed_after_game_started() {
    let registry = registry();
    let code = registry.create_lobby(PlayerId(1), "host").await.unwrap();
    {
        let handle = registry.get(&code).await.unwrap();
        handle.lock().await.set_phase(GamePhase::Started);
    }

    registry.join_lobby(code.as_str(), PlayerId(2), "late").await.unwrap();
}

// =========================================================================
// Ready / settings
// =========================================================================

#[tokio::test]
async fn test_set_ready_broadcasts_to_everyone() {
    let registry = registry();
    let (host, mut host_inbox) = connect(&registry, 1).await;
    let (guest, mut guest_inbox) = connect(&registry, 2).await;
    let code = registry.create_lobby(host, "Ada").await.unwrap();
    registry.join_lobby(code.as_str(), guest, "Bob").await.unwrap();
    drain(&mut host_inbox);
    drain(&mut guest_inbox);

    registry.set_ready(&code, guest, true).await.unwrap();

    for inbox in [&mut host_inbox, &mut guest_inbox] {
        assert_eq!(
            drain(inbox),
            [ServerMessage::PlayerReadyChanged {
                player_id: guest,
                is_ready: true
            }]
        );
    }
}

#[tokio::test]
async fn test_set_ready_unknown_participant_is_silent() {
    let registry = registry();
    let (host, mut inbox) = connect(&registry, 1).await;
    let code = registry.create_lobby(host, "Ada").await.unwrap();
    drain(&mut inbox);

    registry.set_ready(&code, PlayerId(77), true).await.unwrap();

    assert!(drain(&mut inbox).is_empty());
}

#[tokio::test]
async fn test_update_settings_requires_host() {
    let registry = registry();
    let (host, mut host_inbox) = connect(&registry, 1).await;
    let (guest, _guest_inbox) = connect(&registry, 2).await;
    let code = registry.create_lobby(host, "Ada").await.unwrap();
    registry.join_lobby(code.as_str(), guest, "Bob").await.unwrap();
    drain(&mut host_inbox);

    let err = registry
        .update_settings(&code, guest, settings_patch(json!({"difficulty": "hard"})))
        .await
        .unwrap_err();

    assert_eq!(err.to_string(), "Only host can update settings");
    assert!(drain(&mut host_inbox).is_empty());
}

#[tokio::test]
async fn test_update_settings_merges_per_field() {
    let registry = registry();
    let (host, mut inbox) = connect(&registry, 1).await;
    let code = registry.create_lobby(host, "Ada").await.unwrap();
    drain(&mut inbox);

    registry
        .update_settings(&code, host, settings_patch(json!({"difficulty": "hard"})))
        .await
        .unwrap();
    registry
        .update_settings(&code, host, settings_patch(json!({"timeLimit": "5"})))
        .await
        .unwrap();

    let last = drain(&mut inbox).pop().expect("should broadcast");
    let ServerMessage::SettingsUpdated { settings } = last else {
        panic!("expected settings_updated, got {last:?}");
    };
    assert_eq!(settings.get("difficulty"), Some(&json!("hard")));
    assert_eq!(settings.get("timeLimit"), Some(&json!("5")));
}

// =========================================================================
// Leave / host election
// =========================================================================

#[tokio::test]
async fn test_host_leaving_promotes_next_and_notifies_them_alone() {
    let registry = registry();
    let (host, _host_inbox) = connect(&registry, 1).await;
    let (second, mut second_inbox) = connect(&registry, 2).await;
    let (third, mut third_inbox) = connect(&registry, 3).await;
    let code = registry.create_lobby(host, "Ada").await.unwrap();
    registry.join_lobby(code.as_str(), second, "Bob").await.unwrap();
    registry.join_lobby(code.as_str(), third, "Cy").await.unwrap();
    drain(&mut second_inbox);
    drain(&mut third_inbox);

    let departure = registry.remove_participant(&code, host).await.unwrap();

    assert!(!departure.lobby_closed);
    assert_eq!(kinds(&drain(&mut second_inbox)), ["host_transferred", "player_left"]);
    assert_eq!(kinds(&drain(&mut third_inbox)), ["player_left"]);
    assert_eq!(host_count(&registry, &code).await, 1);
}

#[tokio::test]
async fn test_last_participant_leaving_closes_lobby() {
    let registry = registry();
    let code = registry.create_lobby(PlayerId(1), "Ada").await.unwrap();

    let departure = registry.remove_participant(&code, PlayerId(1)).await.unwrap();

    assert!(departure.lobby_closed);
    assert!(registry.get(&code).await.is_none());
    assert_eq!(
        registry.join_lobby(code.as_str(), PlayerId(2), "Bob").await,
        Err(LobbyError::NotFound)
    );
}

#[tokio::test]
async fn test_remove_twice_is_not_in_lobby() {
    let registry = registry();
    let code = registry.create_lobby(PlayerId(1), "Ada").await.unwrap();
    registry.join_lobby(code.as_str(), PlayerId(2), "Bob").await.unwrap();

    registry.remove_participant(&code, PlayerId(2)).await.unwrap();

    assert_eq!(
        registry.remove_participant(&code, PlayerId(2)).await,
        Err(LobbyError::NotInLobby)
    );
}

#[tokio::test]
async fn test_single_host_across_join_leave_sequence() {
    let registry = registry();
    let code = registry.create_lobby(PlayerId(1), "p1").await.unwrap();
    for id in 2..=6 {
        registry.join_lobby(code.as_str(), PlayerId(id), "p").await.unwrap();
    }

    for leaving in [1, 4, 2] {
        registry.remove_participant(&code, PlayerId(leaving)).await.unwrap();
        assert_eq!(host_count(&registry, &code).await, 1, "after {leaving} left");
        registry
            .join_lobby(code.as_str(), PlayerId(100 + leaving), "again")
            .await
            .unwrap();
        assert_eq!(host_count(&registry, &code).await, 1, "after rejoin");
    }

    let handle = registry.get(&code).await.unwrap();
    assert_eq!(handle.lock().await.host_id(), Some(PlayerId(3)));
}

#[tokio::test]
async fn test_concurrent_joins_respect_capacity() {
    let registry = Arc::new(registry());
    let code = registry.create_lobby(PlayerId(1), "host").await.unwrap();

    let mut tasks = Vec::new();
    for id in 2..=20 {
        let registry = Arc::clone(&registry);
        let raw = code.as_str().to_owned();
        tasks.push(tokio::spawn(async move {
            registry.join_lobby(&raw, PlayerId(id), "p").await
        }));
    }

    let mut joined = 0;
    for task in tasks {
        if task.await.unwrap().is_ok() {
            joined += 1;
        }
    }
    assert_eq!(joined, 7);
    let handle = registry.get(&code).await.unwrap();
    assert_eq!(handle.lock().await.len(), 8);
}
