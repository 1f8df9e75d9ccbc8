//! End-to-end navigation over a recorded byte stream.

use std::sync::Arc;
use std::time::Duration;

use route_pilot::client::{EventKind, LifecycleEvent, SessionBuilder, SessionConfig};
use route_pilot::codec::encode_frame;
use route_pilot::protocol::{RecordingCommandSink, StreamSource};
use route_pilot::state::{MemorySegmentStore, Segment, TrackPoint, Turn, TurnDirection, WorldId};
use route_pilot::{GameMessage, OutboundCommand, PlannedRoute};

const LON: f64 = 166.95;

fn road(id: &str, lat0: f64, lon: f64, next_at_end: Vec<Turn>) -> Arc<Segment> {
    let points = (0..10)
        .map(|i| TrackPoint::new(lat0 - i as f64 * 0.0001, lon, 0.0, WorldId::Watopia))
        .collect();
    Arc::new(Segment::new(id, points).with_world(WorldId::Watopia).with_next_at_end(next_at_end))
}

fn segments() -> Vec<Arc<Segment>> {
    vec![
        road(
            "seg-1",
            -11.6400,
            LON,
            vec![Turn::new(TurnDirection::Left, "seg-x"), Turn::new(TurnDirection::GoStraight, "seg-2")],
        ),
        road("seg-2", -11.6410, LON, vec![Turn::new(TurnDirection::Right, "seg-3")]),
        road("seg-3", -11.6420, LON, vec![Turn::new(TurnDirection::GoStraight, "seg-4")]),
        road("seg-4", -11.6430, LON, vec![]),
        road("seg-x", -11.6400, LON + 0.0003, vec![]),
        road("seg-far", -11.6600, LON, vec![]),
    ]
}

fn route() -> PlannedRoute {
    serde_json::from_str(
        r#"{
            "name": "Beach loop",
            "world": "watopia",
            "sport": "cycling",
            "routeSequence": [
                {"segmentId": "seg-1", "direction": "AtoB", "nextSegmentId": "seg-2", "turnToNextSegment": "GoStraight"},
                {"segmentId": "seg-2", "direction": "AtoB", "nextSegmentId": "seg-3", "turnToNextSegment": "Right"},
                {"segmentId": "seg-3", "direction": "AtoB", "nextSegmentId": "seg-4"}
            ]
        }"#,
    )
    .unwrap()
}

fn position(lat: f64) -> GameMessage {
    GameMessage::RiderPosition { latitude: lat, longitude: LON, altitude: 0.0 }
}

fn command(command_type: &str, sequence_number: u32) -> GameMessage {
    GameMessage::CommandAvailable { command_type: command_type.into(), sequence_number }
}

fn stream(messages: &[GameMessage]) -> Vec<u8> {
    messages
        .iter()
        .flat_map(|m| encode_frame(&m.encode().unwrap()).unwrap().to_vec())
        .collect()
}

async fn run(messages: &[GameMessage]) -> (String, Vec<OutboundCommand>, bool) {
    let sink = Arc::new(RecordingCommandSink::new());
    let config = SessionConfig { world: WorldId::Watopia, ..SessionConfig::default() };
    let session = SessionBuilder::new(config)
        .store(Arc::new(MemorySegmentStore::new(segments())))
        .sink(sink.clone())
        .route(route())
        .start()
        .await
        .unwrap();

    for event in [
        LifecycleEvent::LoggedIn,
        LifecycleEvent::WaitingForConnection,
        LifecycleEvent::Connected,
    ] {
        session.lifecycle(event).await.unwrap();
    }

    let mut completed = session.subscribe(&[EventKind::RouteCompleted]);
    let receiver = session.spawn_receiver(StreamSource::new(std::io::Cursor::new(stream(messages))));
    receiver.await.unwrap().unwrap();
    session.drain().await.unwrap();

    // Let the navigator catch up with the last events
    tokio::time::sleep(Duration::from_millis(50)).await;

    let finished = completed.try_recv().is_some();
    let state = session.state().name().to_string();
    session.shutdown().await;
    (state, sink.commands(), finished)
}

#[tokio::test]
async fn test_rides_route_to_completion() {
    let messages = [
        GameMessage::Ping { rider_id: 42 },
        GameMessage::ActivityDetails { rider_id: 42, activity_id: 1001 },
        position(-11.6401),
        command("turnleft", 5),
        command("gostraight", 6),
        GameMessage::Ping { rider_id: 42 },
        position(-11.6405),
        position(-11.6412),
        position(-11.6422),
        position(-11.6432),
    ];

    let (state, commands, finished) = run(&messages).await;

    assert_eq!(state, "CompletedRoute");
    assert!(finished);
    assert_eq!(
        commands,
        vec![
            OutboundCommand::InitialPairing { rider_id: 42, sequence_number: 0 },
            OutboundCommand::Turn { direction: TurnDirection::GoStraight, sequence_number: 6 },
        ]
    );
}

#[tokio::test]
async fn test_rejoining_after_leaving_game_turns_again() {
    let messages = [
        GameMessage::ActivityDetails { rider_id: 42, activity_id: 1001 },
        position(-11.6401),
        command("turnleft", 5),
        command("gostraight", 6),
        GameMessage::ActivityDetails { rider_id: 42, activity_id: 0 },
        GameMessage::ActivityDetails { rider_id: 42, activity_id: 2002 },
        position(-11.6401),
        command("turnleft", 7),
        command("gostraight", 8),
    ];

    let (state, commands, _) = run(&messages).await;

    assert_eq!(state, "UpcomingTurn");
    assert_eq!(
        commands,
        vec![
            OutboundCommand::Turn { direction: TurnDirection::GoStraight, sequence_number: 6 },
            OutboundCommand::Turn { direction: TurnDirection::GoStraight, sequence_number: 8 },
        ]
    );
}

#[tokio::test]
async fn test_authoring_mismatch_sends_no_turn() {
    let messages = [
        GameMessage::ActivityDetails { rider_id: 42, activity_id: 1001 },
        position(-11.6401),
        // The route goes straight on but the junction only offers left and right
        command("turnleft", 9),
        command("turnright", 10),
    ];

    let (state, commands, _) = run(&messages).await;

    assert_eq!(state, "UpcomingTurn");
    assert!(commands.is_empty());
}

#[tokio::test]
async fn test_single_exit_never_resolves() {
    let messages = [
        GameMessage::ActivityDetails { rider_id: 42, activity_id: 1001 },
        position(-11.6401),
        position(-11.6412),
        command("turnleft", 9),
        command("gostraight", 10),
    ];

    let (state, commands, _) = run(&messages).await;

    assert_eq!(state, "OnRoute");
    assert!(commands.is_empty());
}

#[tokio::test]
async fn test_leaving_route_loses_lock() {
    let messages = [
        GameMessage::ActivityDetails { rider_id: 42, activity_id: 1001 },
        position(-11.6401),
        position(-11.6605),
    ];

    let (state, commands, finished) = run(&messages).await;

    assert_eq!(state, "LostRouteLock");
    assert!(!finished);
    assert!(commands.is_empty());
}
