//! End-to-end flows through the broadcast router with in-process
//! connections.

use assert_matches::assert_matches;
use sketchroom_core::shapes::{Dimensions, Point, ShapeStyle, StylePatch};
use sketchroom_core::{
    Actor, BroadcastRouter, ClientEvent, CoreError, CreateRoomOptions, EngineConfig, MemoryStore,
    MessageDraft, ReactionAction, RoomRegistry, ServerEvent, ShapeDraft,
    ShapeGeometry, ShapePatch,
};
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedReceiver;

struct Client {
    id: String,
    rx: UnboundedReceiver<ServerEvent>,
}

impl Client {
    fn connect(router: &BroadcastRouter) -> Self {
        let (id, rx) = router.connect();
        Self { id, rx }
    }

    fn drain(&mut self) -> Vec<ServerEvent> {
        let mut events = Vec::new();
        while let Ok(event) = self.rx.try_recv() {
            events.push(event);
        }
        events
    }
}

fn router() -> BroadcastRouter {
    let registry = RoomRegistry::new(Arc::new(MemoryStore::new()), EngineConfig::default());
    BroadcastRouter::new(Arc::new(registry))
}

async fn create_room(router: &BroadcastRouter, opts: CreateRoomOptions) -> String {
    router
        .registry()
        .create_room("Design Review", &Actor::new("alice", "Alice"), opts)
        .await
        .unwrap()
        .room_id
}

fn join(room_id: &str, user_id: &str, username: &str) -> ClientEvent {
    ClientEvent::JoinRoom {
        room_id: room_id.to_string(),
        user_id: Some(user_id.to_string()),
        username: username.to_string(),
        password: None,
    }
}

fn rectangle() -> ShapeDraft {
    ShapeDraft::new(
        ShapeGeometry::Rectangle {
            dimensions: Dimensions::default(),
        },
        Point::new(10.0, 10.0),
    )
}

fn add_rectangle(room_id: &str) -> ClientEvent {
    ClientEvent::AddShape {
        room_id: room_id.to_string(),
        shape: rectangle(),
    }
}

fn error_code(events: &[ServerEvent]) -> Option<&str> {
    events.iter().find_map(|e| match e {
        ServerEvent::Error { code, .. } => Some(code.as_str()),
        _ => None,
    })
}

#[tokio::test]
async fn design_review_session() {
    let router = router();
    let room_id = create_room(&router, CreateRoomOptions::default()).await;
    assert_eq!(room_id.len(), 8);
    assert!(room_id
        .chars()
        .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit()));

    let mut alice = Client::connect(&router);
    let mut bob = Client::connect(&router);

    router.handle(&alice.id, join(&room_id, "alice", "Alice")).await;
    let room = router.registry().get_room(&room_id).await.unwrap();
    assert_eq!(room.current_participants, 1);

    router.handle(&bob.id, join(&room_id, "bob", "Bob")).await;
    let room = router.registry().get_room(&room_id).await.unwrap();
    assert_eq!(room.current_participants, 2);

    alice.drain();
    bob.drain();

    router.handle(&alice.id, add_rectangle(&room_id)).await;

    let bob_events = bob.drain();
    assert_eq!(bob_events.len(), 1);
    assert_matches!(
        &bob_events[0],
        ServerEvent::ShapeAdded { canvas_version: 2, added_by, shape }
            if added_by == "Alice" && shape.created_by == "alice"
    );
    assert!(alice.drain().is_empty());
}

#[tokio::test]
async fn joiner_receives_current_canvas() {
    let router = router();
    let room_id = create_room(&router, CreateRoomOptions::default()).await;
    let mut alice = Client::connect(&router);
    router.handle(&alice.id, join(&room_id, "alice", "Alice")).await;
    router.handle(&alice.id, add_rectangle(&room_id)).await;
    router.handle(&alice.id, add_rectangle(&room_id)).await;
    alice.drain();

    let mut bob = Client::connect(&router);
    router.handle(&bob.id, join(&room_id, "bob", "Bob")).await;

    let events = bob.drain();
    assert_matches!(
        &events[0],
        ServerEvent::CanvasState(snapshot) if snapshot.version == 3 && snapshot.shapes.len() == 2
    );
    assert_matches!(
        &alice.drain()[..],
        [ServerEvent::UserJoined { username, .. }] if username == "Bob"
    );
}

#[tokio::test]
async fn versions_are_gapless() {
    let router = router();
    let room_id = create_room(&router, CreateRoomOptions::default()).await;
    let mut alice = Client::connect(&router);
    router.handle(&alice.id, join(&room_id, "alice", "Alice")).await;

    let (shape, v2) = router.add_shape(&alice.id, &room_id, rectangle()).await.unwrap();
    assert_eq!(v2, 2);

    let patch = ShapePatch {
        style: Some(StylePatch {
            fill_color: Some("#ff0000".to_string()),
            ..Default::default()
        }),
        ..Default::default()
    };
    let (updated, v3) = router
        .update_shape(&alice.id, &room_id, &shape.id, patch)
        .await
        .unwrap();
    assert_eq!(v3, 3);
    assert_eq!(updated.style.fill_color, "#ff0000");
    assert_eq!(updated.style.stroke_color, ShapeStyle::default().stroke_color);

    router.handle(&alice.id, ClientEvent::DeleteShape {
        room_id: room_id.clone(),
        shape_id: shape.id.clone(),
    })
    .await;

    let canvas = router.canvas(&room_id).await.unwrap();
    assert_eq!(canvas.version, 4);
    assert!(canvas.is_empty());
    let versions: Vec<u64> = canvas.history.iter().map(|h| h.version).collect();
    assert_eq!(versions, vec![2, 3, 4]);
    assert!(alice.drain().iter().all(|e| e.name() != "error"));
}

#[tokio::test]
async fn missing_shape_reports_error_to_sender_only() {
    let router = router();
    let room_id = create_room(&router, CreateRoomOptions::default()).await;
    let mut alice = Client::connect(&router);
    let mut bob = Client::connect(&router);
    router.handle(&alice.id, join(&room_id, "alice", "Alice")).await;
    router.handle(&bob.id, join(&room_id, "bob", "Bob")).await;
    alice.drain();
    bob.drain();

    router
        .handle(&alice.id, ClientEvent::DeleteShape {
            room_id: room_id.clone(),
            shape_id: "shape_missing".to_string(),
        })
        .await;

    assert_eq!(error_code(&alice.drain()), Some("SHAPE_NOT_FOUND"));
    assert!(bob.drain().is_empty());
    assert_eq!(router.canvas(&room_id).await.unwrap().version, 1);
}

#[tokio::test]
async fn mutation_for_other_room_is_rejected() {
    let router = router();
    let room_a = create_room(&router, CreateRoomOptions::default()).await;
    let room_b = create_room(&router, CreateRoomOptions::default()).await;
    let mut alice = Client::connect(&router);
    let mut bob = Client::connect(&router);
    router.handle(&alice.id, join(&room_a, "alice", "Alice")).await;
    router.handle(&bob.id, join(&room_b, "bob", "Bob")).await;
    alice.drain();
    bob.drain();

    let err = router
        .add_shape(&alice.id, &room_b, rectangle())
        .await
        .unwrap_err();
    assert_matches!(err, CoreError::UnauthorizedRoomAccess(_));

    router.handle(&alice.id, add_rectangle(&room_b)).await;
    assert_eq!(error_code(&alice.drain()), Some("UNAUTHORIZED_ROOM_ACCESS"));
    assert!(bob.drain().is_empty());
    assert_eq!(router.canvas(&room_b).await.unwrap().version, 1);
}

#[tokio::test]
async fn full_room_rejects_second_join() {
    let router = router();
    let opts = CreateRoomOptions {
        max_participants: Some(1),
        ..Default::default()
    };
    let room_id = create_room(&router, opts).await;

    let mut alice = Client::connect(&router);
    router.handle(&alice.id, join(&room_id, "alice", "Alice")).await;
    assert_eq!(alice.drain()[0].name(), "canvas-state");

    let mut bob = Client::connect(&router);
    router.handle(&bob.id, join(&room_id, "bob", "Bob")).await;
    assert_eq!(error_code(&bob.drain()), Some("ROOM_FULL"));
    assert!(router.presence().binding(&bob.id).is_none());

    let room = router.registry().get_room(&room_id).await.unwrap();
    assert_eq!(room.current_participants, 1);
}

#[tokio::test]
async fn drawing_disabled_blocks_mutations() {
    let router = router();
    let opts = CreateRoomOptions {
        settings: Some(sketchroom_core::room::RoomSettingsPatch {
            allow_drawing: Some(false),
            ..Default::default()
        }),
        ..Default::default()
    };
    let room_id = create_room(&router, opts).await;
    let mut alice = Client::connect(&router);
    router.handle(&alice.id, join(&room_id, "alice", "Alice")).await;
    alice.drain();

    router.handle(&alice.id, add_rectangle(&room_id)).await;
    assert_eq!(error_code(&alice.drain()), Some("DRAWING_DISABLED"));
}

#[tokio::test]
async fn cursor_moves_are_relayed_without_versioning() {
    let router = router();
    let room_id = create_room(&router, CreateRoomOptions::default()).await;
    let mut alice = Client::connect(&router);
    let mut bob = Client::connect(&router);
    router.handle(&alice.id, join(&room_id, "alice", "Alice")).await;
    router.handle(&bob.id, join(&room_id, "bob", "Bob")).await;
    alice.drain();
    bob.drain();

    router
        .handle(&alice.id, ClientEvent::CursorMove { x: 4.0, y: 2.0 })
        .await;

    assert_matches!(
        &bob.drain()[..],
        [ServerEvent::CursorMoved { username, x, y, .. }] if username == "Alice" && *x == 4.0 && *y == 2.0
    );
    assert!(alice.drain().is_empty());
    assert_eq!(router.canvas(&room_id).await.unwrap().version, 1);
}

#[tokio::test]
async fn disconnect_announces_departure() {
    let router = router();
    let room_id = create_room(&router, CreateRoomOptions::default()).await;
    let mut alice = Client::connect(&router);
    let bob = Client::connect(&router);
    router.handle(&alice.id, join(&room_id, "alice", "Alice")).await;
    router.handle(&bob.id, join(&room_id, "bob", "Bob")).await;
    alice.drain();

    router.disconnect(&bob.id).await;

    assert_matches!(
        &alice.drain()[..],
        [ServerEvent::UserLeft { user_id: Some(user_id), .. }] if user_id == "bob"
    );
    let room = router.registry().get_room(&room_id).await.unwrap();
    assert!(!room.is_active_participant("bob"));
    assert_eq!(room.current_participants, 1);
}

#[tokio::test]
async fn concurrent_adds_get_distinct_versions() {
    let router = Arc::new(router());
    let room_id = create_room(&router, CreateRoomOptions::default()).await;
    let alice = Client::connect(&router);
    router.handle(&alice.id, join(&room_id, "alice", "Alice")).await;

    let mut tasks = Vec::new();
    for _ in 0..20 {
        let router = router.clone();
        let room_id = room_id.clone();
        let connection = alice.id.clone();
        tasks.push(tokio::spawn(async move {
            router
                .add_shape(&connection, &room_id, rectangle())
                .await
                .unwrap()
                .1
        }));
    }

    let mut versions = Vec::new();
    for task in tasks {
        versions.push(task.await.unwrap());
    }
    versions.sort_unstable();
    assert_eq!(versions, (2..=21).collect::<Vec<u64>>());
}

#[tokio::test]
async fn chat_reactions_round_trip() {
    let router = router();
    let room_id = create_room(&router, CreateRoomOptions::default()).await;
    let mut alice = Client::connect(&router);
    let mut bob = Client::connect(&router);
    router.handle(&alice.id, join(&room_id, "alice", "Alice")).await;
    router.handle(&bob.id, join(&room_id, "bob", "Bob")).await;

    router
        .handle(&alice.id, ClientEvent::JoinChat {
            room_id: room_id.clone(),
            user_id: Some("alice".to_string()),
            username: "Alice".to_string(),
        })
        .await;
    router
        .handle(&bob.id, ClientEvent::JoinChat {
            room_id: room_id.clone(),
            user_id: Some("bob".to_string()),
            username: "Bob".to_string(),
        })
        .await;
    alice.drain();
    bob.drain();

    let draft = MessageDraft {
        message: "  ship it  ".to_string(),
        ..Default::default()
    };
    router.handle(&alice.id, ClientEvent::SendMessage(draft)).await;
    let received = alice.drain();
    let message = match &received[..] {
        [ServerEvent::MessageReceived(message)] => message.clone(),
        other => panic!("unexpected events {:?}", other),
    };
    assert_eq!(message.content, "ship it");
    assert_eq!(bob.drain().len(), 1);

    let react = |action| ClientEvent::MessageReaction {
        message_id: message.id.clone(),
        emoji: "👍".to_string(),
        action,
    };
    router.handle(&bob.id, react(ReactionAction::Add)).await;
    router.handle(&bob.id, react(ReactionAction::Add)).await;

    let stored = router
        .registry()
        .store()
        .get_message(&message.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.reactions["👍"].len(), 1);
    assert!(stored.reactions["👍"].contains("bob"));

    router.handle(&bob.id, react(ReactionAction::Remove)).await;
    let last = alice.drain().pop();
    assert_matches!(
        last,
        Some(ServerEvent::MessageReactionUpdated { reactions, .. }) if reactions.is_empty()
    );
}

#[tokio::test]
async fn chat_history_and_typing() {
    let router = router();
    let room_id = create_room(&router, CreateRoomOptions::default()).await;
    let mut alice = Client::connect(&router);
    router.handle(&alice.id, join(&room_id, "alice", "Alice")).await;
    router
        .handle(&alice.id, ClientEvent::JoinChat {
            room_id: room_id.clone(),
            user_id: Some("alice".to_string()),
            username: "Alice".to_string(),
        })
        .await;
    for text in ["one", "two"] {
        let draft = MessageDraft {
            message: text.to_string(),
            ..Default::default()
        };
        router.chat().send_message(&alice.id, draft).await.unwrap();
    }
    alice.drain();

    let mut bob = Client::connect(&router);
    let history = router
        .chat()
        .join(&bob.id, &room_id, Some("bob".to_string()), "Bob")
        .await
        .unwrap();
    let contents: Vec<&str> = history.iter().map(|m| m.content.as_str()).collect();
    assert_eq!(contents, vec!["one", "two"]);
    assert_eq!(bob.drain()[0].name(), "chat_history");
    assert_eq!(alice.drain()[0].name(), "user_joined_chat");

    router
        .handle(&bob.id, ClientEvent::Typing { is_typing: true })
        .await;
    assert_matches!(
        &alice.drain()[..],
        [ServerEvent::UserTyping { username, is_typing: true, .. }] if username == "Bob"
    );
    assert!(bob.drain().is_empty());
}

#[tokio::test]
async fn chat_of_locked_room_needs_admission() {
    let router = router();
    let room_id = create_room(&router, CreateRoomOptions {
        password: Some("secret".to_string()),
        ..Default::default()
    })
    .await;

    let alice = Client::connect(&router);
    router
        .handle(&alice.id, ClientEvent::JoinRoom {
            room_id: room_id.clone(),
            user_id: Some("alice".to_string()),
            username: "Alice".to_string(),
            password: Some("secret".to_string()),
        })
        .await;
    router
        .handle(&alice.id, ClientEvent::JoinChat {
            room_id: room_id.clone(),
            user_id: Some("alice".to_string()),
            username: "Alice".to_string(),
        })
        .await;
    router
        .chat()
        .send_message(&alice.id, MessageDraft {
            message: "private plan".to_string(),
            ..Default::default()
        })
        .await
        .unwrap();

    let mut mallory = Client::connect(&router);
    router.handle(&mallory.id, join(&room_id, "mallory", "Mallory")).await;
    assert_eq!(error_code(&mallory.drain()), Some("PASSWORD_REQUIRED"));

    let err = router
        .dispatch(&mallory.id, ClientEvent::JoinChat {
            room_id: room_id.clone(),
            user_id: Some("mallory".to_string()),
            username: "Mallory".to_string(),
        })
        .await
        .unwrap_err();
    assert_matches!(err, CoreError::UnauthorizedRoomAccess(_));

    let events = mallory.drain();
    assert!(events.iter().all(|e| !matches!(e, ServerEvent::ChatHistory { .. })));
    assert!(router.chat().member(&mallory.id).is_none());
}

#[tokio::test]
async fn chat_join_uses_bound_identity() {
    let router = router();
    let room_id = create_room(&router, CreateRoomOptions::default()).await;
    let bob = Client::connect(&router);
    router.handle(&bob.id, join(&room_id, "bob", "Bob")).await;

    router
        .handle(&bob.id, ClientEvent::JoinChat {
            room_id: room_id.clone(),
            user_id: Some("alice".to_string()),
            username: "Bob".to_string(),
        })
        .await;
    assert_eq!(router.chat().member(&bob.id).unwrap().user_id, "bob");
}

#[tokio::test]
async fn chat_requires_membership_and_content() {
    let router = router();
    let room_id = create_room(&router, CreateRoomOptions::default()).await;
    let alice = Client::connect(&router);

    let err = router
        .chat()
        .send_message(&alice.id, MessageDraft {
            message: "hi".to_string(),
            ..Default::default()
        })
        .await
        .unwrap_err();
    assert_matches!(err, CoreError::NotBound);

    router
        .chat()
        .join(&alice.id, &room_id, Some("alice".to_string()), "Alice")
        .await
        .unwrap();
    let err = router
        .chat()
        .send_message(&alice.id, MessageDraft {
            message: "   ".to_string(),
            ..Default::default()
        })
        .await
        .unwrap_err();
    assert_matches!(err, CoreError::Validation(_));

    let err = router
        .react_as("alice", "no-such-message", "👍", ReactionAction::Add)
        .await
        .unwrap_err();
    assert_matches!(err, CoreError::MessageNotFound(_));
}

#[tokio::test]
async fn rest_shape_add_reaches_every_connection() {
    let router = router();
    let room_id = create_room(&router, CreateRoomOptions::default()).await;
    let mut bob = Client::connect(&router);
    router.handle(&bob.id, join(&room_id, "bob", "Bob")).await;
    bob.drain();

    let (shape, version) = router
        .add_shape_as(&Actor::new("alice", "Alice"), &room_id, rectangle())
        .await
        .unwrap();
    assert_eq!(version, 2);
    assert_matches!(
        &bob.drain()[..],
        [ServerEvent::ShapeAdded { shape: s, .. }] if s.id == shape.id
    );
}
