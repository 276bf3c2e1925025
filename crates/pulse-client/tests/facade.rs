//! Facade flow: sign in over REST, open the realtime connection with the
//! stored token, chat, sign out.

use std::sync::Arc;

use assert_matches::assert_matches;
use pulse_auth::LoginPayload;
use pulse_client::{ClientError, PulseClient};
use pulse_core::{ChatMessage, RoomId};
use pulse_realtime::ConnectionState;
use pulse_realtime::stomp::{Command, Frame};
use pulse_realtime::transport::memory::{self, MemoryListener, MemoryPeer};
use pulse_session::Persistence;
use pulse_settings::PulseSettings;
use serde_json::json;
use tempfile::TempDir;
use tokio::sync::mpsc;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn settings(server: &MockServer, dir: &TempDir) -> PulseSettings {
    let mut s = PulseSettings::default();
    s.api.base_url = server.uri();
    s.realtime.url = "memory://broker/ws".into();
    s.realtime.heartbeat_incoming_ms = 0;
    s.realtime.heartbeat_outgoing_ms = 0;
    s.session.data_dir = Some(dir.path().to_path_buf());
    s.session.watch_file = false;
    s
}

fn client(server: &MockServer, dir: &TempDir) -> (PulseClient, MemoryListener) {
    let (connector, listener) = memory::pair();
    let client = PulseClient::with_connector(settings(server, dir), Arc::new(connector)).unwrap();
    (client, listener)
}

async fn mount_login(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/auth/login"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "message": "ok",
            "data": {
                "id": 3,
                "username": "carol",
                "role": "USER",
                "token": { "accessToken": "tok1", "expiresIn": 900 }
            },
            "status": 200
        })))
        .mount(server)
        .await;
}

fn carol() -> LoginPayload {
    LoginPayload {
        username: "carol".into(),
        password: "pw".into(),
    }
}

async fn handshake(listener: &mut MemoryListener) -> (MemoryPeer, Frame) {
    let mut peer = listener.accept().await.unwrap();
    let connect = peer.recv_frame().await.unwrap();
    assert!(
        peer.send_frame(
            &Frame::new(Command::Connected)
                .header("version", "1.2")
                .header("heart-beat", "0,0"),
        )
        .await
    );
    (peer, connect)
}

#[tokio::test]
async fn login_connect_chat_logout() {
    let server = MockServer::start().await;
    mount_login(&server).await;
    let dir = TempDir::new().unwrap();
    let (client, mut listener) = client(&server, &dir);

    let user = client.login(&carol(), true).await.unwrap();
    assert_eq!(user.username, "carol");
    assert_eq!(client.session().persistence(), Some(Persistence::Durable));
    assert!(client.session().file_path().exists());

    let (ready_tx, mut ready_rx) = mpsc::unbounded_channel();
    client.connect_realtime(
        Some(Arc::new(move || {
            let _ = ready_tx.send(());
        })),
        None,
    );
    let (mut peer, connect) = handshake(&mut listener).await;
    assert_eq!(connect.get("Authorization"), Some("Bearer tok1"));
    ready_rx.recv().await.unwrap();

    let (tx, mut rx) = mpsc::unbounded_channel::<ChatMessage>();
    client
        .realtime()
        .subscribe_to_room(RoomId::new(5), move |m| {
            let _ = tx.send(m);
        })
        .unwrap();
    let sub = peer.recv_frame().await.unwrap();
    assert_eq!(sub.get("destination"), Some("/topic/rooms/5"));

    client
        .realtime()
        .send_message(RoomId::new(5), user.id, "hello")
        .unwrap();
    let send = peer.recv_frame().await.unwrap();
    assert_eq!(send.command, Command::Send);
    assert!(
        peer.send_frame(
            &Frame::new(Command::Message)
                .header("subscription", sub.get("id").unwrap())
                .header("destination", "/topic/rooms/5")
                .body(send.body.clone()),
        )
        .await
    );
    let echoed = rx.recv().await.unwrap();
    assert_eq!(echoed.message, "hello");
    assert_eq!(echoed.sender_id, user.id);

    client.logout().unwrap();
    assert_eq!(client.realtime().state(), ConnectionState::Disconnected);
    assert!(client.realtime().subscribed_rooms().is_empty());
    assert!(client.current_user().is_none());
    assert!(!client.session().file_path().exists());
}

#[tokio::test]
async fn session_only_login_is_not_written_to_disk() {
    let server = MockServer::start().await;
    mount_login(&server).await;
    let dir = TempDir::new().unwrap();
    let (client, _listener) = client(&server, &dir);

    let _ = client.login(&carol(), false).await.unwrap();
    assert_eq!(client.session().persistence(), Some(Persistence::Ephemeral));
    assert!(!client.session().file_path().exists());
    assert_eq!(client.current_user().map(|u| u.username), Some("carol".into()));
}

#[tokio::test]
async fn rejected_login_leaves_session_empty() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/auth/login"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": false,
            "message": "Account not verified",
            "data": null,
            "status": 403
        })))
        .mount(&server)
        .await;
    let dir = TempDir::new().unwrap();
    let (client, _listener) = client(&server, &dir);

    let err = client.login(&carol(), true).await.unwrap_err();
    assert_matches!(err, ClientError::Rejected(ref m) if m == "Account not verified");
    assert!(client.current_user().is_none());
}

#[tokio::test]
async fn durable_session_survives_restart() {
    let server = MockServer::start().await;
    mount_login(&server).await;
    let dir = TempDir::new().unwrap();
    {
        let (client, _listener) = client(&server, &dir);
        let _ = client.login(&carol(), true).await.unwrap();
    }
    let (restarted, _listener) = client(&server, &dir);
    let user = restarted.current_user().unwrap();
    assert_eq!(user.username, "carol");
    assert_eq!(user.tokens.access_token, "tok1");
}
