//! Gateway end to end: real sockets against a served router and a temp SQLite file.

use std::time::Duration;

use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    Router,
};
use campus_config::{AppConfig, DatabaseConfig};
use campus_gateway::{create_router, GatewayState};
use campus_messaging::{PresenceStatus, ServerFrame, Session};
use futures_util::{SinkExt, StreamExt};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tempfile::TempDir;
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::{
    connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream,
};
use tower::ServiceExt;
use uuid::Uuid;

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

const WAIT: Duration = Duration::from_secs(3);

struct TestApp {
    address: std::net::SocketAddr,
    router: Router,
    state: GatewayState,
    company_id: Uuid,
    _dir: TempDir,
}

impl TestApp {
    async fn spawn() -> Self {
        let dir = TempDir::new().unwrap();
        let mut config = AppConfig::default();
        config.database = DatabaseConfig {
            url: format!("sqlite://{}", dir.path().join("gateway.db").display()),
            max_connections: 4,
        };
        config.auth.jwt_secret = "e2e-secret".to_string();

        let pool = campus_database::initialize_database(&config.database)
            .await
            .unwrap();
        let state = GatewayState::from_config(&config, pool);

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap();
        let served = create_router(state.clone());
        tokio::spawn(async move {
            axum::serve(listener, served).await.unwrap();
        });

        Self {
            address,
            router: create_router(state.clone()),
            state,
            company_id: Uuid::new_v4(),
            _dir: dir,
        }
    }

    fn token_for(&self, user_id: Uuid) -> String {
        let session = Session {
            user_id,
            company_id: self.company_id,
        };
        self.state
            .tokens
            .issue(&session, Duration::from_secs(300))
            .unwrap()
    }

    async fn connect(&self, user_id: Uuid) -> Socket {
        let url = format!("ws://{}/ws?token={}", self.address, self.token_for(user_id));
        let (mut socket, _) = connect_async(url).await.unwrap();

        // a typing notice to ourselves proves the session is fully up
        let probe = json!({ "type": "typing", "to": user_id });
        socket.send(Message::Text(probe.to_string())).await.unwrap();
        assert_eq!(next_frame(&mut socket).await, ServerFrame::Typing { from: user_id });
        socket
    }

    async fn request(
        &self,
        method: Method,
        uri: &str,
        user_id: Uuid,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder()
            .method(method)
            .uri(uri)
            .header(header::AUTHORIZATION, format!("Bearer {}", self.token_for(user_id)));

        let body = match body {
            Some(value) => {
                builder = builder.header(header::CONTENT_TYPE, "application/json");
                Body::from(value.to_string())
            }
            None => Body::empty(),
        };

        let response = self
            .router
            .clone()
            .oneshot(builder.body(body).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, value)
    }
}

async fn next_frame(socket: &mut Socket) -> ServerFrame {
    loop {
        let message = tokio::time::timeout(WAIT, socket.next())
            .await
            .expect("timed out waiting for a frame")
            .expect("socket ended")
            .expect("socket error");
        match message {
            Message::Text(text) => return serde_json::from_str(&text).unwrap(),
            Message::Ping(_) | Message::Pong(_) => continue,
            other => panic!("unexpected message {other:?}"),
        }
    }
}

#[tokio::test]
async fn upgrade_without_a_valid_token_is_rejected() {
    let app = TestApp::spawn().await;

    let missing = connect_async(format!("ws://{}/ws", app.address)).await;
    match missing {
        Err(tokio_tungstenite::tungstenite::Error::Http(response)) => {
            assert_eq!(response.status().as_u16(), StatusCode::UNAUTHORIZED.as_u16());
        }
        other => panic!("expected 401, got {other:?}"),
    }

    let forged = connect_async(format!("ws://{}/ws?token=not-a-jwt", app.address)).await;
    assert!(forged.is_err());
    assert!(app.state.broker.registry().is_empty().await);
}

#[tokio::test]
async fn chat_over_sockets_is_stored_and_delivered() {
    let app = TestApp::spawn().await;
    let alice = Uuid::new_v4();
    let bob = Uuid::new_v4();

    let mut alice_socket = app.connect(alice).await;
    let mut bob_socket = app.connect(bob).await;
    assert_eq!(
        next_frame(&mut alice_socket).await,
        ServerFrame::Presence {
            user_id: bob,
            status: PresenceStatus::Online
        }
    );

    let frame = json!({ "type": "message", "to": bob, "content": "hello bob" });
    alice_socket
        .send(Message::Text(frame.to_string()))
        .await
        .unwrap();

    let delivery = match next_frame(&mut bob_socket).await {
        ServerFrame::Message(delivery) => delivery,
        other => panic!("expected a delivery, got {other:?}"),
    };
    assert_eq!(delivery.sender_id, alice);
    assert_eq!(delivery.company_id, app.company_id);
    assert_eq!(delivery.content, "hello bob");

    let (status, history) = app
        .request(Method::GET, &format!("/messages/user/{alice}"), bob, None)
        .await;
    assert_eq!(status, StatusCode::OK);
    let history = history.as_array().unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0]["id"], json!(delivery.id));
    assert_eq!(history[0]["read"], json!(false));

    let (_, unread) = app
        .request(Method::GET, "/messages/unread-count", bob, None)
        .await;
    assert_eq!(unread, json!({ "unread_count": 1 }));

    let (status, _) = app
        .request(Method::POST, &format!("/messages/{}/read", delivery.id), bob, None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        next_frame(&mut alice_socket).await,
        ServerFrame::ReadReceipt {
            message_id: delivery.id,
            reader_id: bob
        }
    );
}

#[tokio::test]
async fn rest_send_reaches_an_open_socket() {
    let app = TestApp::spawn().await;
    let alice = Uuid::new_v4();
    let bob = Uuid::new_v4();
    let mut bob_socket = app.connect(bob).await;

    let (status, body) = app
        .request(
            Method::POST,
            "/messages/send",
            alice,
            Some(json!({ "receiver_id": bob, "content": "over http" })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["content"], json!("over http"));

    match next_frame(&mut bob_socket).await {
        ServerFrame::Message(delivery) => assert_eq!(delivery.content, "over http"),
        other => panic!("expected a delivery, got {other:?}"),
    }

    let (status, partners) = app
        .request(Method::GET, "/messages/partners", alice, None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(partners, json!([bob]));
}

#[tokio::test]
async fn search_and_inbox_cover_the_callers_messages() {
    let app = TestApp::spawn().await;
    let admin = Uuid::new_v4();
    let alice = Uuid::new_v4();
    let bob = Uuid::new_v4();

    for (from, to, content) in [
        (alice, admin, "Invoice for March"),
        (bob, admin, "lunch?"),
        (alice, admin, "second invoice"),
        (alice, bob, "invoice between others"),
    ] {
        let (status, _) = app
            .request(
                Method::POST,
                "/messages/send",
                from,
                Some(json!({ "receiver_id": to, "content": content })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);
    }

    let (status, found) = app
        .request(Method::GET, "/messages/search?q=invoice", admin, None)
        .await;
    assert_eq!(status, StatusCode::OK);
    let contents: Vec<_> = found
        .as_array()
        .unwrap()
        .iter()
        .map(|m| m["content"].as_str().unwrap())
        .collect();
    assert_eq!(contents, vec!["second invoice", "Invoice for March"]);

    let (status, body) = app
        .request(Method::GET, "/messages/search?q=", admin, None)
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], json!("400"));

    let (status, inbox) = app
        .request(Method::GET, "/messages/inbox", admin, None)
        .await;
    assert_eq!(status, StatusCode::OK);
    let inbox = inbox.as_object().unwrap();
    assert_eq!(inbox.len(), 2);
    let from_alice: Vec<_> = inbox[&alice.to_string()]
        .as_array()
        .unwrap()
        .iter()
        .map(|m| m["content"].as_str().unwrap())
        .collect();
    assert_eq!(from_alice, vec!["Invoice for March", "second invoice"]);
    assert_eq!(inbox[&bob.to_string()].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn rest_rejects_bad_requests() {
    let app = TestApp::spawn().await;
    let alice = Uuid::new_v4();

    let (status, body) = app
        .request(
            Method::POST,
            "/messages/send",
            alice,
            Some(json!({ "receiver_id": Uuid::new_v4(), "content": "" })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], json!("400"));

    let (status, _) = app
        .request(Method::POST, &format!("/messages/{}/read", Uuid::new_v4()), alice, None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = app
        .request(Method::DELETE, &format!("/messages/{}", Uuid::new_v4()), alice, None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let response = app
        .router
        .clone()
        .oneshot(
            Request::builder()
                .uri("/messages/partners")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn closing_a_socket_announces_offline() {
    let app = TestApp::spawn().await;
    let alice = Uuid::new_v4();
    let bob = Uuid::new_v4();

    let mut alice_socket = app.connect(alice).await;
    let mut bob_socket = app.connect(bob).await;
    next_frame(&mut alice_socket).await;

    bob_socket.close(None).await.unwrap();

    assert_eq!(
        next_frame(&mut alice_socket).await,
        ServerFrame::Presence {
            user_id: bob,
            status: PresenceStatus::Offline
        }
    );
    assert!(!app.state.broker.registry().is_registered(bob).await);
}

#[tokio::test]
async fn health_reports_ok() {
    let app = TestApp::spawn().await;

    let response = app
        .router
        .clone()
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}
