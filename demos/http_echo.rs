//! HTTP Echo - a namespace socket answering `http<METHOD>` events.
//!
//! This example demonstrates:
//! - Building a socket with the builder pattern
//! - Registering middleware that reads the request and sets the response
//! - Playing the remote peer through the in-memory manager
//!
//! The peer sends `["httpPOST", {"x-trace": "t1"}, "/echo", {"msg": "hi"}]`
//! with ack id 0 and receives `[200, {"method": "POST", ...}]` back.

use nsp_socket::protocol::{Data, Packet};
use nsp_socket::transport::MemoryManager;
use nsp_socket::{Context, Next, PipelineError, SocketBuilder};
use serde_json::json;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let (manager, mut sent) = MemoryManager::new();

    let _socket = SocketBuilder::new("/api")
        // Timing wrapper: runs around everything below it
        .middleware(|ctx: Context, next: Next| async move {
            let ctx = next.run(ctx).await?;
            println!("{} {} -> {}", ctx.method(), ctx.url(), ctx.status());
            Ok::<_, PipelineError>(ctx)
        })
        // Echo the request back as JSON
        .middleware(|mut ctx: Context, _next: Next| async move {
            let echoed = json!({
                "method": ctx.method(),
                "path": ctx.path(),
                "trace": ctx.header("x-trace"),
                "body": ctx.request_body().as_json(),
            });
            ctx.set_body(echoed);
            Ok::<_, PipelineError>(ctx)
        })
        .build(manager.clone())?;

    // Remote side: open the transport and accept the namespace
    manager.transport_open();
    let connect = sent.recv().await.ok_or("manager closed")?;
    println!("socket sent {:?} for {}", connect.packet_type, connect.nsp);
    manager.receive(Packet::connect(None).with_nsp("/api"));

    // Remote side: issue a request expecting an ack
    manager.receive(
        Packet::event(vec![
            Data::from("httpPOST"),
            Data::from(json!({"x-trace": "t1"})),
            Data::from("/echo?verbose=1"),
            Data::from(json!({"msg": "hi"})),
        ])
        .with_nsp("/api")
        .with_id(0),
    );

    let reply = sent.recv().await.ok_or("manager closed")?;
    println!("ack {:?}: {:?}", reply.id, reply.data);

    Ok(())
}
