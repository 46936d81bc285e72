//! End-to-end tests for the relay: door clients over real WebSockets, the
//! tournament authority behind the bus.

use bbs_relay::api::{AppState, create_router};
use bbs_tourney::{
    Bus, LocalBus, PlayerId, TournamentConfig, TournamentId, TournamentManager, WireMessage,
    db::InMemoryTournamentRepository, net::utils,
};
use futures_util::{SinkExt, StreamExt};
use std::{net::SocketAddr, sync::Arc, time::Duration};
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::{TcpListener, TcpStream},
    time::timeout,
};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async, tungstenite::Message};

type Ws = WebSocketStream<MaybeTlsStream<TcpStream>>;

const WAIT: Duration = Duration::from_secs(10);

fn quick_config() -> TournamentConfig {
    TournamentConfig {
        join_period_secs: 1,
        round_secs: 1,
        ..TournamentConfig::default()
    }
}

async fn spawn_relay(defaults: TournamentConfig) -> SocketAddr {
    let bus = Arc::new(LocalBus::new(256));
    let shared: Arc<dyn Bus> = bus.clone();
    let manager = Arc::new(TournamentManager::new(
        shared,
        Arc::new(InMemoryTournamentRepository::new()),
        defaults,
    ));
    manager.spawn_dispatcher();

    let app = create_router(AppState::new(manager, bus));
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

async fn connect(addr: SocketAddr) -> Ws {
    let (ws, _) = connect_async(format!("ws://{addr}/ws")).await.unwrap();
    ws
}

async fn send(ws: &mut Ws, message: &WireMessage) {
    let frame = utils::encode(message).unwrap();
    ws.send(Message::text(frame)).await.unwrap();
}

async fn send_raw(ws: &mut Ws, frame: &str) {
    ws.send(Message::text(frame.to_string())).await.unwrap();
}

async fn next_message(ws: &mut Ws) -> WireMessage {
    loop {
        let msg = timeout(WAIT, ws.next())
            .await
            .expect("timed out waiting for a frame")
            .expect("socket closed")
            .unwrap();
        if let Message::Text(text) = msg {
            return utils::decode(text.as_str()).unwrap();
        }
    }
}

async fn wait_for(ws: &mut Ws, matches: impl Fn(&WireMessage) -> bool) -> WireMessage {
    loop {
        let message = next_message(ws).await;
        if matches(&message) {
            return message;
        }
    }
}

/// Round-trip a harmless request so the relay has certainly subscribed
/// this connection to the bus.
async fn settle(ws: &mut Ws, who: &str) {
    let ping = WireMessage::TournamentSyncRequest {
        tournament_id: TournamentId::from("settle"),
        requester: PlayerId::new(who),
    };
    send(ws, &ping).await;
    wait_for(ws, |m| m == &ping).await;
}

async fn http_get(addr: SocketAddr, path: &str) -> String {
    let mut stream = TcpStream::connect(addr).await.unwrap();
    let request = format!("GET {path} HTTP/1.1\r\nHost: {addr}\r\nConnection: close\r\n\r\n");
    stream.write_all(request.as_bytes()).await.unwrap();
    let mut response = String::new();
    timeout(WAIT, stream.read_to_string(&mut response))
        .await
        .unwrap()
        .unwrap();
    response
}

#[tokio::test]
async fn test_bracket_played_over_websockets() {
    let addr = spawn_relay(quick_config()).await;
    let mut ann = connect(addr).await;
    let mut bob = connect(addr).await;
    settle(&mut bob, "bob").await;

    send(
        &mut ann,
        &WireMessage::TournamentCreate {
            host: PlayerId::new("ann"),
            user_id: 1,
            kind: None,
        },
    )
    .await;

    let start = wait_for(&mut bob, |m| matches!(m, WireMessage::TournamentStart { .. })).await;
    let tournament_id = start.tournament_id().unwrap().clone();

    send(
        &mut bob,
        &WireMessage::TournamentJoin {
            tournament_id: tournament_id.clone(),
            player: PlayerId::new("bob"),
            user_id: 2,
            seat: None,
        },
    )
    .await;

    wait_for(&mut ann, |m| matches!(m, WireMessage::TournamentRound { .. })).await;
    wait_for(&mut bob, |m| matches!(m, WireMessage::TournamentRound { .. })).await;

    for (ws, player, points) in [(&mut ann, "ann", 5), (&mut bob, "bob", 3)] {
        send(
            ws,
            &WireMessage::TournamentScore {
                tournament_id: tournament_id.clone(),
                player: PlayerId::new(player),
                points,
            },
        )
        .await;
    }

    let end = wait_for(&mut ann, |m| matches!(m, WireMessage::TournamentEnd { .. })).await;
    let WireMessage::TournamentEnd { results, .. } = end else {
        unreachable!();
    };
    assert_eq!(results.len(), 2);
    assert_eq!(results[0].player, PlayerId::new("ann"));
    assert_eq!(results[1].player, PlayerId::new("bob"));
}

#[tokio::test]
async fn test_client_cannot_publish_authoritative_frames() {
    let addr = spawn_relay(quick_config()).await;
    let mut mallory = connect(addr).await;
    let mut bob = connect(addr).await;
    settle(&mut bob, "bob").await;

    send(
        &mut mallory,
        &WireMessage::TournamentEnd {
            tournament_id: TournamentId::from("t-fake"),
            results: vec![],
        },
    )
    .await;
    send_raw(&mut mallory, "{not json").await;
    let marker = WireMessage::TournamentSyncRequest {
        tournament_id: TournamentId::from("t-fake"),
        requester: PlayerId::new("mallory"),
    };
    send(&mut mallory, &marker).await;

    // Frames from one connection are relayed in order, so the marker
    // arriving first means the forged end was dropped.
    assert_eq!(next_message(&mut bob).await, marker);
}

#[tokio::test]
async fn test_health_and_lobby_listing() {
    let addr = spawn_relay(TournamentConfig::default()).await;

    let health = http_get(addr, "/health").await;
    assert!(health.starts_with("HTTP/1.1 200"));
    assert!(health.contains(r#""status":"healthy""#));

    let mut ann = connect(addr).await;
    settle(&mut ann, "ann").await;
    send(
        &mut ann,
        &WireMessage::TournamentCreate {
            host: PlayerId::new("ann"),
            user_id: 1,
            kind: None,
        },
    )
    .await;
    let start = wait_for(&mut ann, |m| matches!(m, WireMessage::TournamentStart { .. })).await;
    let tournament_id = start.tournament_id().unwrap().to_string();

    let listing = http_get(addr, "/api/v1/tournaments").await;
    assert!(listing.starts_with("HTTP/1.1 200"));
    assert!(listing.contains(&tournament_id));

    let one = http_get(addr, &format!("/api/v1/tournaments/{tournament_id}")).await;
    assert!(one.starts_with("HTTP/1.1 200"));
    assert!(one.contains(r#""phase""#));

    let missing = http_get(addr, "/api/v1/tournaments/nope").await;
    assert!(missing.starts_with("HTTP/1.1 404"));

    let stats = http_get(addr, "/api/v1/players/ann/stats").await;
    assert!(stats.starts_with("HTTP/1.1 200"));
    assert!(stats.contains(r#""tournaments_played":0"#));
}
