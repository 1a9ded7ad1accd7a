//! Integration tests for nsp-socket.
//!
//! Each test drives a socket through `MemoryManager`, playing the remote
//! side by injecting packets and reading what the socket sent.

use std::io::Cursor;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use bytes::Bytes;
use nsp_socket::codec::TextCodec;
use nsp_socket::event::{BoxFuture, ListenerResult};
use nsp_socket::handler::{Body, PipelineResult};
use nsp_socket::protocol::{Data, Headers, Packet, PacketType, Payload};
use nsp_socket::transport::MemoryManager;
use nsp_socket::{
    Context, Event, EventError, HttpCall, HttpError, NamespaceSocket, Next, Notification,
    PipelineError, Query, SocketBuilder,
};
use serde_json::json;
use tokio::sync::{mpsc, oneshot};

const NSP: &str = "/chat";

struct Harness {
    socket: NamespaceSocket,
    manager: Arc<MemoryManager>,
    sent: mpsc::UnboundedReceiver<Packet>,
}

fn build(configure: impl FnOnce(SocketBuilder) -> SocketBuilder) -> Harness {
    let (manager, sent) = MemoryManager::new();
    let socket = configure(SocketBuilder::new(NSP))
        .build(manager.clone())
        .unwrap();
    Harness {
        socket,
        manager,
        sent,
    }
}

async fn connected(configure: impl FnOnce(SocketBuilder) -> SocketBuilder) -> Harness {
    let mut h = build(configure);
    h.manager.transport_open();
    assert_eq!(next(&mut h.sent).await.packet_type, PacketType::Connect);
    h.manager.receive(Packet::connect(None).with_nsp(NSP));
    let socket = h.socket.clone();
    wait_until(move || socket.is_connected()).await;
    h
}

async fn next(sent: &mut mpsc::UnboundedReceiver<Packet>) -> Packet {
    tokio::time::timeout(Duration::from_secs(1), sent.recv())
        .await
        .expect("timed out waiting for a packet")
        .expect("manager dropped")
}

async fn wait_until(mut cond: impl FnMut() -> bool) {
    tokio::time::timeout(Duration::from_secs(1), async {
        while !cond() {
            tokio::task::yield_now().await;
        }
    })
    .await
    .expect("condition not reached");
}

async fn settle() {
    for _ in 0..20 {
        tokio::task::yield_now().await;
    }
}

fn event(args: Vec<Data>) -> Packet {
    Packet::event(args).with_nsp(NSP)
}

/// Emits issued before CONNECT go out in order once connected.
#[tokio::test]
async fn test_send_buffer_flushed_in_order() {
    let mut h = build(|b| b);
    for name in ["a", "b", "c"] {
        h.socket.emit(name, vec![]).unwrap();
    }
    assert_eq!(h.socket.send_buffer_len(), 3);

    h.manager.transport_open();
    assert_eq!(next(&mut h.sent).await.packet_type, PacketType::Connect);
    h.manager.receive(Packet::connect(None).with_nsp(NSP));

    for name in ["a", "b", "c"] {
        let packet = next(&mut h.sent).await;
        assert_eq!(packet.nsp, NSP);
        assert_eq!(packet.event_name(), Some(name));
    }
    assert_eq!(h.socket.send_buffer_len(), 0);
}

/// Buffered inbound events are dispatched before buffered outbound packets flush.
#[tokio::test]
async fn test_receive_buffer_drained_before_send_buffer() {
    let mut h = build(|b| b);
    let seen = Arc::new(Mutex::new(Vec::new()));

    let s = seen.clone();
    let echo = h.socket.clone();
    h.socket
        .on("news", move |e: Event| -> ListenerResult {
            s.lock().unwrap().push(e.data()[0].clone());
            echo.emit("echo", vec![]).map_err(EventError::from_error)
        })
        .unwrap();

    h.socket.emit("queued", vec![]).unwrap();
    h.manager.transport_open();
    assert_eq!(next(&mut h.sent).await.packet_type, PacketType::Connect);

    h.manager.receive(event(vec![Data::from("news"), Data::from("one")]));
    h.manager.receive(event(vec![Data::from("news"), Data::from("two")]));
    let socket = h.socket.clone();
    wait_until(move || socket.receive_buffer_len() == 2).await;
    assert!(seen.lock().unwrap().is_empty());

    h.manager.receive(Packet::connect(None).with_nsp(NSP));

    assert_eq!(next(&mut h.sent).await.event_name(), Some("echo"));
    assert_eq!(next(&mut h.sent).await.event_name(), Some("echo"));
    assert_eq!(next(&mut h.sent).await.event_name(), Some("queued"));
    assert_eq!(
        *seen.lock().unwrap(),
        vec![Data::from("one"), Data::from("two")]
    );
}

#[tokio::test]
async fn test_connect_query_is_encoded() {
    let mut h = build(|b| b.query(Query::pairs([("token", "a b"), ("v", "2")])));
    h.manager.transport_open();

    let packet = next(&mut h.sent).await;
    assert_eq!(packet.packet_type, PacketType::Connect);
    assert_eq!(packet.query.as_deref(), Some("token=a%20b&v=2"));
}

#[tokio::test]
async fn test_root_namespace_connects_with_transport() {
    let (manager, mut sent) = MemoryManager::new();
    manager.transport_open();
    let socket = SocketBuilder::new("/").build(manager).unwrap();

    assert!(socket.is_connected());
    assert_eq!(socket.id().as_deref(), Some("mem-0"));
    settle().await;
    assert!(sent.try_recv().is_err(), "root namespace sends no CONNECT");
}

/// Ack ids keep growing across a transport reconnect.
#[tokio::test]
async fn test_ack_ids_survive_reconnect() {
    let mut h = connected(|b| b).await;

    let a = h.socket.emit_with_ack("q", vec![], |_| {}).unwrap();
    let b = h.socket.emit_with_ack("q", vec![], |_| {}).unwrap();
    assert_eq!(next(&mut h.sent).await.id, Some(a));
    assert_eq!(next(&mut h.sent).await.id, Some(b));

    h.manager.transport_close("transport close");
    let socket = h.socket.clone();
    wait_until(move || !socket.is_connected()).await;

    let c = h.socket.emit_with_ack("q", vec![], |_| {}).unwrap();
    h.manager.transport_open();
    assert_eq!(next(&mut h.sent).await.packet_type, PacketType::Connect);
    h.manager.receive(Packet::connect(None).with_nsp(NSP));

    assert_eq!(next(&mut h.sent).await.id, Some(c));
    assert!(a < b && b < c);
    assert_eq!(h.socket.pending_acks(), 3);
}

#[tokio::test]
async fn test_emit_ack_resolves() {
    let mut h = connected(|b| b).await;

    let socket = h.socket.clone();
    let pending = tokio::spawn(async move {
        socket
            .emit_ack("sum", vec![Data::from(json!([1, 2]))])
            .await
    });

    let packet = next(&mut h.sent).await;
    let id = packet.id.unwrap();
    h.manager
        .receive(Packet::ack(id, vec![Data::from(json!(3))]).with_nsp(NSP));

    let reply = pending.await.unwrap().unwrap();
    assert_eq!(reply, vec![Data::from(json!(3))]);
    assert_eq!(h.socket.pending_acks(), 0);
}

/// A second call on the same reply handle sends nothing.
#[tokio::test]
async fn test_reply_sent_once() {
    let mut h = connected(|b| b).await;
    h.socket
        .on("ask", |e: Event| -> ListenerResult {
            let reply = e.reply.expect("event carried an id");
            assert!(reply.send(vec![Data::from("first")]));
            assert!(!reply.send(vec![Data::from("second")]));
            Ok(())
        })
        .unwrap();

    h.manager.receive(event(vec![Data::from("ask")]).with_id(9));

    let ack = next(&mut h.sent).await;
    assert_eq!(ack.packet_type, PacketType::Ack);
    assert_eq!(ack.id, Some(9));
    assert_eq!(ack.data, vec![Data::from("first")]);
    settle().await;
    assert!(h.sent.try_recv().is_err());
}

type Seen = (String, String, Headers, Payload);

fn recording(
    tx: mpsc::UnboundedSender<Seen>,
) -> impl Fn(Context, Next) -> BoxFuture<'static, PipelineResult> + Send + Sync + 'static {
    move |mut ctx: Context, _next: Next| {
        let _ = tx.send((
            ctx.method().to_string(),
            ctx.url().to_string(),
            ctx.headers().clone(),
            ctx.request_body().clone(),
        ));
        ctx.set_body("ok");
        Box::pin(async move { Ok(ctx) })
    }
}

#[tokio::test]
async fn test_http_get_request_and_reply() {
    let (tx, mut seen) = mpsc::unbounded_channel();
    let mut h = connected(|b| b.middleware(recording(tx))).await;

    h.manager
        .receive(event(vec![Data::from("httpGET"), Data::from("/foo")]).with_id(1));

    let (method, url, headers, body) = seen.recv().await.unwrap();
    assert_eq!(method, "GET");
    assert_eq!(url, "/foo");
    assert!(headers.is_empty());
    assert_eq!(body, Payload::Null);

    let ack = next(&mut h.sent).await;
    assert_eq!(ack.id, Some(1));
    assert_eq!(ack.data, vec![Data::from(200u16), Data::from("ok")]);
}

#[tokio::test]
async fn test_http_post_with_headers_and_body() {
    let (tx, mut seen) = mpsc::unbounded_channel();
    let mut h = connected(|b| b.middleware(recording(tx))).await;

    h.manager.receive(
        event(vec![
            Data::from("httpPOST"),
            Data::from(json!({"x": "1"})),
            Data::from("/foo"),
            Data::from(json!({"a": 1})),
        ])
        .with_id(2),
    );

    let (method, url, headers, body) = seen.recv().await.unwrap();
    assert_eq!(method, "POST");
    assert_eq!(url, "/foo");
    assert_eq!(headers.get("x"), Some(&json!("1")));
    assert_eq!(body, Payload::Single(Data::from(json!({"a": 1}))));
    assert_eq!(next(&mut h.sent).await.id, Some(2));
}

/// A custom token verb sent through the sugar reads back as a request.
#[tokio::test]
async fn test_custom_verb_round_trip() {
    let (tx, mut seen) = mpsc::unbounded_channel();
    let mut h = connected(|b| b.middleware(recording(tx))).await;

    h.socket.http("m-search", HttpCall::new("/x")).unwrap();
    let outbound = next(&mut h.sent).await;
    assert_eq!(outbound.event_name(), Some("httpM-SEARCH"));

    h.manager.receive(event(outbound.data).with_id(1));

    let (method, url, _, _) = seen.recv().await.unwrap();
    assert_eq!(method, "M-SEARCH");
    assert_eq!(url, "/x");
    let ack = next(&mut h.sent).await;
    assert_eq!(ack.packet_type, PacketType::Ack);
    assert_eq!(ack.data, vec![Data::from(200u16), Data::from("ok")]);

    assert!(h.socket.http("GET /", HttpCall::new("/x")).is_err());
}

#[tokio::test]
async fn test_middleware_runs_as_onion() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let (a, b) = (log.clone(), log.clone());

    let mut h = connected(move |builder| {
        builder
            .middleware(move |ctx: Context, next: Next| {
                let log = a.clone();
                async move {
                    log.lock().unwrap().push("a-in");
                    let ctx = next.run(ctx).await?;
                    log.lock().unwrap().push("a-out");
                    Ok::<_, PipelineError>(ctx)
                }
            })
            .middleware(move |mut ctx: Context, next: Next| {
                let log = b.clone();
                async move {
                    log.lock().unwrap().push("b-in");
                    ctx.set_body(json!({"done": true}));
                    let ctx = next.run(ctx).await?;
                    log.lock().unwrap().push("b-out");
                    Ok::<_, PipelineError>(ctx)
                }
            })
    })
    .await;

    h.manager
        .receive(event(vec![Data::from("httpGET"), Data::from("/")]).with_id(3));

    let ack = next(&mut h.sent).await;
    assert_eq!(ack.data, vec![Data::from(200u16), Data::from(json!({"done": true}))]);
    assert_eq!(*log.lock().unwrap(), vec!["a-in", "b-in", "b-out", "a-out"]);
}

#[tokio::test]
async fn test_unhandled_request_is_not_found() {
    let mut h = connected(|b| b).await;
    h.manager
        .receive(event(vec![Data::from("httpGET"), Data::from("/missing")]).with_id(4));

    let ack = next(&mut h.sent).await;
    assert_eq!(ack.data, vec![Data::from(404u16), Data::from("Not Found")]);
}

#[tokio::test]
async fn test_response_headers_slot_and_head() {
    let mut h = connected(|b| {
        b.middleware(|mut ctx: Context, next: Next| async move {
            ctx.response.set_header("etag", "abc");
            if ctx.path() == "/slot" {
                ctx.set_slot("fallback");
            } else {
                ctx.set_body("payload");
            }
            next.run(ctx).await
        })
    })
    .await;

    h.manager
        .receive(event(vec![Data::from("httpGET"), Data::from("/slot")]).with_id(5));
    let ack = next(&mut h.sent).await;
    assert_eq!(
        ack.data,
        vec![
            Data::from(json!({"etag": "abc"})),
            Data::from(200u16),
            Data::from("fallback"),
        ]
    );

    h.manager
        .receive(event(vec![Data::from("httpHEAD"), Data::from("/x")]).with_id(6));
    let ack = next(&mut h.sent).await;
    assert_eq!(
        ack.data,
        vec![Data::from(json!({"etag": "abc"})), Data::from(200u16)]
    );
}

#[tokio::test]
async fn test_empty_status_drops_body() {
    let mut h = connected(|b| {
        b.middleware(|mut ctx: Context, _next: Next| async move {
            ctx.set_body("ignored");
            ctx.set_status(204);
            Ok::<_, PipelineError>(ctx)
        })
    })
    .await;

    h.manager
        .receive(event(vec![Data::from("httpDELETE"), Data::from("/a")]).with_id(7));
    assert_eq!(next(&mut h.sent).await.data, vec![Data::from(204u16)]);
}

#[tokio::test]
async fn test_stream_body_is_buffered() {
    let mut h = connected(|b| {
        b.middleware(|mut ctx: Context, _next: Next| async move {
            ctx.set_body(Body::stream(Cursor::new(b"streamed".to_vec())));
            Ok::<_, PipelineError>(ctx)
        })
    })
    .await;

    h.manager
        .receive(event(vec![Data::from("httpGET"), Data::from("/file")]).with_id(8));
    let ack = next(&mut h.sent).await;
    assert_eq!(ack.packet_type, PacketType::BinaryAck);
    assert_eq!(
        ack.data,
        vec![
            Data::from(200u16),
            Data::Binary(Bytes::from_static(b"streamed"))
        ]
    );
}

#[tokio::test]
async fn test_extensions_apply_to_each_context() {
    let mut h = connected(|b| {
        b.extend(|ctx: &mut Context| {
            ctx.state_mut().insert("tenant".into(), json!("acme"));
        })
        .middleware(|mut ctx: Context, _next: Next| async move {
            let tenant = ctx.state()["tenant"].clone();
            ctx.set_body(tenant);
            Ok::<_, PipelineError>(ctx)
        })
    })
    .await;

    h.manager
        .receive(event(vec![Data::from("httpGET"), Data::from("/")]).with_id(1));
    assert_eq!(
        next(&mut h.sent).await.data,
        vec![Data::from(200u16), Data::from("acme")]
    );
}

/// A failing pipeline sends no reply and raises `execute_error` locally.
#[tokio::test]
async fn test_pipeline_error_not_sent_to_peer() {
    let (tx, mut errors) = mpsc::unbounded_channel();
    let mut h = connected(move |b| {
        b.silent(true)
            .on_notification(move |n| {
                if let Notification::ExecuteError { status, message } = n {
                    let _ = tx.send((*status, message.clone()));
                }
            })
            .middleware(|ctx: Context, _next: Next| async move {
                Err::<Context, _>(PipelineError::from(ctx.error(422, "bad input")))
            })
    })
    .await;

    h.manager
        .receive(event(vec![Data::from("httpPUT"), Data::from("/a")]).with_id(2));

    assert_eq!(errors.recv().await, Some((422, "bad input".to_string())));
    settle().await;
    assert!(h.sent.try_recv().is_err());
}

/// A reply finished after the transport closed waits for the next CONNECT.
#[tokio::test]
async fn test_reply_buffered_across_mid_pipeline_disconnect() {
    let (started_tx, mut started) = mpsc::unbounded_channel();
    let (release_tx, release_rx) = oneshot::channel::<()>();
    let release = Arc::new(Mutex::new(Some(release_rx)));

    let mut h = connected(move |b| {
        b.middleware(move |mut ctx: Context, _next: Next| {
            let gate = release.lock().unwrap().take();
            let _ = started_tx.send(());
            async move {
                if let Some(gate) = gate {
                    let _ = gate.await;
                }
                ctx.set_body("late");
                Ok::<_, PipelineError>(ctx)
            }
        })
    })
    .await;

    h.manager
        .receive(event(vec![Data::from("httpGET"), Data::from("/slow")]).with_id(4));
    started.recv().await.unwrap();

    h.manager.transport_close("transport close");
    let socket = h.socket.clone();
    wait_until(move || !socket.is_connected()).await;

    release_tx.send(()).unwrap();
    let socket = h.socket.clone();
    wait_until(move || socket.send_buffer_len() == 1).await;
    settle().await;
    assert!(h.sent.try_recv().is_err(), "reply sent while disconnected");

    h.manager.transport_open();
    assert_eq!(next(&mut h.sent).await.packet_type, PacketType::Connect);
    h.manager.receive(Packet::connect(None).with_nsp(NSP));

    let ack = next(&mut h.sent).await;
    assert_eq!(ack.packet_type, PacketType::Ack);
    assert_eq!(ack.id, Some(4));
    assert_eq!(ack.data, vec![Data::from(200u16), Data::from("late")]);
    assert_eq!(h.socket.send_buffer_len(), 0);
}

#[tokio::test]
async fn test_plain_event_reaches_listeners() {
    let (tx, mut got) = mpsc::unbounded_channel();
    let mut h = connected(|b| {
        b.on("chat", move |e: Event| -> ListenerResult {
            let _ = tx.send(e.data().to_vec());
            Ok(())
        })
    })
    .await;

    h.manager
        .receive(event(vec![Data::from("chat"), Data::from("hi"), Data::from(json!(2))]));
    assert_eq!(
        got.recv().await,
        Some(vec![Data::from("hi"), Data::from(json!(2))])
    );
    settle().await;
    assert!(h.sent.try_recv().is_err());
}

/// `httpGET` with a non-string URL is delivered as a plain event.
#[tokio::test]
async fn test_malformed_http_event_degrades() {
    let (tx, mut got) = mpsc::unbounded_channel();
    let mut h = connected(|b| {
        b.on("httpGET", move |e: Event| -> ListenerResult {
            let _ = tx.send(e.data().to_vec());
            Ok(())
        })
    })
    .await;

    h.manager
        .receive(event(vec![Data::from("httpGET"), Data::from(json!(42))]));
    assert_eq!(got.recv().await, Some(vec![Data::from(json!(42))]));
    settle().await;
    assert!(h.sent.try_recv().is_err());
}

#[tokio::test]
async fn test_listener_error_becomes_error_packet() {
    let mut h = connected(|b| {
        b.on("boom", |_e: Event| -> ListenerResult {
            Err(EventError::new("listener failed"))
        })
    })
    .await;

    h.manager.receive(event(vec![Data::from("boom")]));
    let packet = next(&mut h.sent).await;
    assert_eq!(packet.packet_type, PacketType::Error);
    assert_eq!(packet.data[0].as_json().unwrap()["message"], "listener failed");
    assert!(h.socket.is_connected());
}

#[tokio::test]
async fn test_server_error_packet_notifies() {
    let (tx, mut got) = mpsc::unbounded_channel();
    let h = connected(|b| {
        b.on_notification(move |n| {
            if let Notification::Error(data) = n {
                let _ = tx.send(data.clone());
            }
        })
    })
    .await;

    h.manager
        .receive(Packet::error(vec![Data::from("unauthorized")]).with_nsp(NSP));
    assert_eq!(got.recv().await, Some(vec![Data::from("unauthorized")]));
}

#[tokio::test]
async fn test_client_disconnect_sends_disconnect_first() {
    let (tx, mut reasons) = mpsc::unbounded_channel();
    let mut h = connected(move |b| {
        b.on_notification(move |n| {
            if let Notification::Disconnect(reason) = n {
                let _ = tx.send(reason.clone());
            }
        })
    })
    .await;

    h.socket.disconnect();

    assert_eq!(next(&mut h.sent).await.packet_type, PacketType::Disconnect);
    assert_eq!(reasons.recv().await.as_deref(), Some("io client disconnect"));
    assert_eq!(h.manager.destroyed(), vec![NSP.to_string()]);
    assert!(!h.socket.is_connected());
    assert_eq!(h.socket.id(), None);

    // already torn down: nothing more is sent
    h.socket.disconnect();
    settle().await;
    assert!(h.sent.try_recv().is_err());
}

#[tokio::test]
async fn test_server_disconnect_is_not_echoed() {
    let (tx, mut reasons) = mpsc::unbounded_channel();
    let mut h = connected(move |b| {
        b.on_notification(move |n| {
            if let Notification::Disconnect(reason) = n {
                let _ = tx.send(reason.clone());
            }
        })
    })
    .await;

    h.manager.receive(Packet::disconnect().with_nsp(NSP));

    assert_eq!(reasons.recv().await.as_deref(), Some("io server disconnect"));
    assert_eq!(h.manager.destroyed(), vec![NSP.to_string()]);
    settle().await;
    assert!(h.sent.try_recv().is_err());
    assert_eq!(h.manager.subscriber_count(), 0);
}

#[tokio::test]
async fn test_fetch_parses_reply() {
    let mut h = connected(|b| b).await;

    let socket = h.socket.clone();
    let pending = tokio::spawn(async move {
        socket
            .post(HttpCall::new("/items").header("x-id", "7").body(json!({"name": "n"})))
            .await
    });

    let packet = next(&mut h.sent).await;
    assert_eq!(
        packet.data,
        vec![
            Data::from("httpPOST"),
            Data::from(json!({"x-id": "7"})),
            Data::from("/items"),
            Data::from(json!({"name": "n"})),
        ]
    );
    let wire = TextCodec::encode(&packet).unwrap();
    assert!(wire.starts_with("2/chat,0[\"httpPOST\""));

    h.manager.receive(
        Packet::ack(
            packet.id.unwrap(),
            vec![
                Data::from(json!({"location": "/items/1"})),
                Data::from(201u16),
                Data::from(json!({"id": 1})),
            ],
        )
        .with_nsp(NSP),
    );

    let reply = pending.await.unwrap().unwrap();
    assert_eq!(reply.status, 201);
    assert_eq!(reply.headers.get("location"), Some(&json!("/items/1")));
    assert_eq!(reply.body, Payload::Single(Data::from(json!({"id": 1}))));
}

#[test]
fn test_http_error_helper_sets_expose() {
    let err = HttpError::new(400, "nope");
    assert!(err.expose());
    assert!(!HttpError::new(502, "upstream").expose());
}
