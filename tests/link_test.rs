use std::time::Duration;

use bytes::Bytes;
use framelink::{AcceptOptions, ClientHandle, LinkEvent, LinkOptions, QueuePolicy, Reactor};
use tokio::time::{sleep, timeout};

const WAIT: Duration = Duration::from_secs(5);

async fn next_event(events: &async_channel::Receiver<LinkEvent>) -> LinkEvent {
    timeout(WAIT, events.recv())
        .await
        .expect("timed out waiting for an event")
        .expect("inbound queue closed unexpectedly")
}

/// Waits for `Connected`, skipping the `Disconnected` repeats a client may
/// emit while its peer is unreachable.
async fn wait_connected(events: &async_channel::Receiver<LinkEvent>) {
    loop {
        match next_event(events).await {
            LinkEvent::Connected => return,
            LinkEvent::Disconnected => continue,
            other => panic!("expected Connected, got {:?}", other),
        }
    }
}

async fn next_payload(events: &async_channel::Receiver<LinkEvent>) -> Bytes {
    match next_event(events).await {
        LinkEvent::Payload(payload) => payload,
        other => panic!("expected a payload, got {:?}", other),
    }
}

async fn accept_one(server: &framelink::ServerHandle) -> ClientHandle {
    timeout(WAIT, server.accepted.recv())
        .await
        .expect("timed out waiting for an accepted endpoint")
        .expect("accept queue closed unexpectedly")
}

fn fast_client() -> LinkOptions {
    LinkOptions::default().with_reconnect_period(Duration::from_millis(50))
}

/// E1: the sender's payloads arrive in order, bracketed by `Connected` and
/// `Closed`, on the accepting side.
#[tokio::test]
async fn push_delivers_payloads_then_closes() {
    let reactor = Reactor::start().unwrap();
    let server = reactor
        .accept("127.0.0.1:0", AcceptOptions::default())
        .await
        .unwrap();

    let client = reactor.connect(server.local_addr.to_string(), LinkOptions::default());
    let peer = accept_one(&server).await;

    assert_eq!(next_event(&client.events).await, LinkEvent::Connected);
    assert_eq!(next_event(&peer.events).await, LinkEvent::Connected);

    for payload in [b"abc".as_ref(), b"def", b"xyz"] {
        client.sender.send(Bytes::copy_from_slice(payload)).await.unwrap();
    }
    client.sender.close();

    assert_eq!(next_payload(&peer.events).await, Bytes::from_static(b"abc"));
    assert_eq!(next_payload(&peer.events).await, Bytes::from_static(b"def"));
    assert_eq!(next_payload(&peer.events).await, Bytes::from_static(b"xyz"));
    assert_eq!(next_event(&peer.events).await, LinkEvent::Closed);
    assert!(peer.events.recv().await.is_err());

    // the closing side also ends with Closed
    assert_eq!(next_event(&client.events).await, LinkEvent::Closed);
    assert!(client.events.recv().await.is_err());

    reactor.shutdown();
}

/// E2: the accepting side writes, the client reads.
#[tokio::test]
async fn poll_delivers_payloads_to_the_client() {
    let reactor = Reactor::start().unwrap();
    let server = reactor
        .accept("127.0.0.1:0", AcceptOptions::default())
        .await
        .unwrap();

    let client = reactor.connect(server.local_addr.to_string(), LinkOptions::default());
    let peer = accept_one(&server).await;
    wait_connected(&peer.events).await;

    for payload in [b"abc".as_ref(), b"def", b"xyz"] {
        peer.sender.send(Bytes::copy_from_slice(payload)).await.unwrap();
    }

    assert_eq!(next_event(&client.events).await, LinkEvent::Connected);
    assert_eq!(next_payload(&client.events).await, Bytes::from_static(b"abc"));
    assert_eq!(next_payload(&client.events).await, Bytes::from_static(b"def"));
    assert_eq!(next_payload(&client.events).await, Bytes::from_static(b"xyz"));

    reactor.shutdown();
}

/// E3: request/reply in both directions over one connection.
#[tokio::test]
async fn request_reply_round_trip() {
    let reactor = Reactor::start().unwrap();
    let server = reactor
        .accept("127.0.0.1:0", AcceptOptions::default())
        .await
        .unwrap();

    let client = reactor.connect(server.local_addr.to_string(), LinkOptions::default());
    let peer = accept_one(&server).await;
    wait_connected(&client.events).await;
    wait_connected(&peer.events).await;

    client.sender.send(Bytes::from_static(b"req")).await.unwrap();
    assert_eq!(next_payload(&peer.events).await, Bytes::from_static(b"req"));

    peer.sender.send(Bytes::from_static(b"rep")).await.unwrap();
    assert_eq!(next_payload(&client.events).await, Bytes::from_static(b"rep"));

    reactor.shutdown();
}

/// E4: two independent clients against one listener.
#[tokio::test]
async fn two_clients_are_kept_apart() {
    let reactor = Reactor::start().unwrap();
    let server = reactor
        .accept("127.0.0.1:0", AcceptOptions::default())
        .await
        .unwrap();
    let addr = server.local_addr.to_string();

    let client1 = reactor.connect(addr.clone(), LinkOptions::default());
    wait_connected(&client1.events).await;
    let peer1 = accept_one(&server).await;

    let client2 = reactor.connect(addr, LinkOptions::default());
    wait_connected(&client2.events).await;
    let peer2 = accept_one(&server).await;

    client1.sender.send(Bytes::from_static(b"req1")).await.unwrap();
    client2.sender.send(Bytes::from_static(b"req2")).await.unwrap();
    assert_eq!(next_payload(&peer1.events).await, Bytes::from_static(b"req1"));
    assert_eq!(next_payload(&peer2.events).await, Bytes::from_static(b"req2"));

    peer1.sender.send(Bytes::from_static(b"rep1")).await.unwrap();
    peer2.sender.send(Bytes::from_static(b"rep2")).await.unwrap();
    assert_eq!(next_payload(&client1.events).await, Bytes::from_static(b"rep1"));
    assert_eq!(next_payload(&client2.events).await, Bytes::from_static(b"rep2"));

    reactor.shutdown();
}

/// E5: the listener goes away and returns on the same port; the client
/// reports the outage in-band and resumes.
#[tokio::test]
async fn client_reconnects_after_listener_restart() {
    let client_reactor = Reactor::start().unwrap();
    let server_reactor = Reactor::start().unwrap();

    let server = server_reactor
        .accept("127.0.0.1:0", AcceptOptions::default())
        .await
        .unwrap();
    let addr = server.local_addr.to_string();

    let client = client_reactor.connect(addr.clone(), fast_client());
    wait_connected(&client.events).await;
    let _peer = accept_one(&server).await;

    server_reactor.shutdown();
    assert_eq!(next_event(&client.events).await, LinkEvent::Disconnected);

    let server_reactor = Reactor::start().unwrap();
    let server = server_reactor
        .accept(&addr, AcceptOptions::default())
        .await
        .unwrap();

    wait_connected(&client.events).await;
    let peer = accept_one(&server).await;
    wait_connected(&peer.events).await;

    client.sender.send(Bytes::from_static(b"again")).await.unwrap();
    assert_eq!(next_payload(&peer.events).await, Bytes::from_static(b"again"));

    client_reactor.shutdown();
    server_reactor.shutdown();
}

/// E6: closing the outbound queue while disconnected closes the endpoint.
#[tokio::test]
async fn close_while_disconnected_closes_endpoint() {
    // grab a port with nothing listening on it
    let probe = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = probe.local_addr().unwrap().to_string();
    drop(probe);

    let reactor = Reactor::start().unwrap();
    let client = reactor.connect(addr, fast_client());

    assert_eq!(next_event(&client.events).await, LinkEvent::Disconnected);
    client.sender.close();

    loop {
        match next_event(&client.events).await {
            LinkEvent::Disconnected => continue,
            LinkEvent::Closed => break,
            other => panic!("expected Closed, got {:?}", other),
        }
    }
    assert!(client.events.recv().await.is_err());

    reactor.shutdown();
}

/// Property 1: payload bytes survive the round trip, including large ones.
#[tokio::test]
async fn framing_round_trip_large_payload() {
    let reactor = Reactor::start().unwrap();
    let server = reactor
        .accept("127.0.0.1:0", AcceptOptions::default())
        .await
        .unwrap();
    let client = reactor.connect(server.local_addr.to_string(), LinkOptions::default());
    let peer = accept_one(&server).await;
    wait_connected(&peer.events).await;

    let payload: Vec<u8> = (0..1024 * 1024).map(|i| (i % 251) as u8).collect();
    client.sender.send(Bytes::from(payload.clone())).await.unwrap();
    assert_eq!(next_payload(&peer.events).await, Bytes::from(payload));

    reactor.shutdown();
}

/// Property 2: order is preserved per direction.
#[tokio::test]
async fn order_is_preserved() {
    let reactor = Reactor::start().unwrap();
    let server = reactor
        .accept("127.0.0.1:0", AcceptOptions::default())
        .await
        .unwrap();
    let client = reactor.connect(server.local_addr.to_string(), LinkOptions::default());
    let peer = accept_one(&server).await;
    wait_connected(&peer.events).await;

    for i in 0..100u32 {
        let payload = format!("msg-{}", i);
        client.sender.send(Bytes::from(payload.into_bytes())).await.unwrap();
    }
    for i in 0..100u32 {
        let expected = format!("msg-{}", i);
        assert_eq!(next_payload(&peer.events).await, Bytes::from(expected.into_bytes()));
    }

    reactor.shutdown();
}

/// Property 4: heartbeats keep idle links alive without surfacing.
#[tokio::test]
async fn heartbeats_are_not_surfaced() {
    let reactor = Reactor::start().unwrap();
    let server_opts = AcceptOptions::default().with_heartbeat_period(Duration::from_millis(50));
    let server = reactor.accept("127.0.0.1:0", server_opts).await.unwrap();
    let client_opts = LinkOptions::default().with_heartbeat_period(Duration::from_millis(50));
    let client = reactor.connect(server.local_addr.to_string(), client_opts);
    let peer = accept_one(&server).await;
    wait_connected(&client.events).await;
    wait_connected(&peer.events).await;

    // idle for several heartbeat periods (and past the stall window)
    sleep(Duration::from_millis(400)).await;
    assert!(
        timeout(Duration::from_millis(100), client.events.recv()).await.is_err(),
        "client surfaced an event while idle"
    );
    assert!(
        timeout(Duration::from_millis(100), peer.events.recv()).await.is_err(),
        "peer surfaced an event while idle"
    );

    // the link is still usable
    client.sender.send(Bytes::from_static(b"ping")).await.unwrap();
    assert_eq!(next_payload(&peer.events).await, Bytes::from_static(b"ping"));

    reactor.shutdown();
}

/// Property 5, client side: a peer that stops reading and writing is
/// declared dead and reported as `Disconnected`.
#[tokio::test]
async fn stalled_peer_disconnects_client() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap().to_string();

    let reactor = Reactor::start().unwrap();
    let opts = fast_client().with_heartbeat_period(Duration::from_millis(100));
    let client = reactor.connect(addr, opts);

    // hold the accepted socket without ever reading or writing
    let (_stalled, _) = listener.accept().await.unwrap();

    assert_eq!(next_event(&client.events).await, LinkEvent::Connected);
    assert_eq!(next_event(&client.events).await, LinkEvent::Disconnected);

    reactor.shutdown();
}

/// Property 5, accepted side: a silent client closes the accepted endpoint.
#[tokio::test]
async fn stalled_peer_closes_accepted_endpoint() {
    let reactor = Reactor::start().unwrap();
    let opts = AcceptOptions::default().with_heartbeat_period(Duration::from_millis(100));
    let server = reactor.accept("127.0.0.1:0", opts).await.unwrap();

    let _silent = tokio::net::TcpStream::connect(server.local_addr).await.unwrap();
    let peer = accept_one(&server).await;

    assert_eq!(next_event(&peer.events).await, LinkEvent::Connected);
    assert_eq!(next_event(&peer.events).await, LinkEvent::Closed);

    reactor.shutdown();
}

/// Property 7: shutting a reactor down releases its listening ports.
#[tokio::test]
async fn listener_port_is_released_on_shutdown() {
    let reactor = Reactor::start().unwrap();
    let server = reactor
        .accept("127.0.0.1:0", AcceptOptions::default())
        .await
        .unwrap();
    let addr = server.local_addr.to_string();
    reactor.shutdown();

    let reactor = Reactor::start().unwrap();
    reactor
        .accept(&addr, AcceptOptions::default())
        .await
        .expect("rebinding the released port failed");
    reactor.shutdown();
}

/// Property 8: shutdown posts `Closed` on every endpoint and closes the
/// queues, exactly once and as the final item.
#[tokio::test]
async fn shutdown_closes_every_endpoint() {
    let reactor = Reactor::start().unwrap();
    let server = reactor
        .accept("127.0.0.1:0", AcceptOptions::default())
        .await
        .unwrap();
    let addr = server.local_addr.to_string();

    let client1 = reactor.connect(addr.clone(), LinkOptions::default());
    wait_connected(&client1.events).await;
    let peer1 = accept_one(&server).await;
    let client2 = reactor.connect(addr, LinkOptions::default());
    wait_connected(&client2.events).await;
    let peer2 = accept_one(&server).await;

    reactor.shutdown();

    for handle in [&client1, &peer1, &client2, &peer2] {
        let mut closed = 0;
        let mut last = None;
        while let Ok(event) = handle.events.recv().await {
            if event == LinkEvent::Closed {
                closed += 1;
            }
            last = Some(event);
        }
        assert_eq!(closed, 1, "expected exactly one Closed event");
        assert_eq!(last, Some(LinkEvent::Closed), "Closed was not the final item");
    }
    assert!(server.accepted.recv().await.is_err(), "accept queue left open");
}

/// Bounded user queues are honored without breaking delivery.
#[tokio::test]
async fn bounded_queues_deliver_everything() {
    let reactor = Reactor::start().unwrap();
    let opts = AcceptOptions::default()
        .with_inbound_queue(QueuePolicy::Bounded(2))
        .with_outbound_queue(QueuePolicy::Bounded(2));
    let server = reactor.accept("127.0.0.1:0", opts).await.unwrap();
    let client = reactor.connect(
        server.local_addr.to_string(),
        LinkOptions::default().with_outbound_queue(QueuePolicy::Bounded(2)),
    );
    let peer = accept_one(&server).await;
    wait_connected(&peer.events).await;

    for i in 0..20u32 {
        let payload = format!("bounded-{}", i);
        client.sender.send(Bytes::from(payload.into_bytes())).await.unwrap();
    }
    for i in 0..20u32 {
        let expected = format!("bounded-{}", i);
        assert_eq!(next_payload(&peer.events).await, Bytes::from(expected.into_bytes()));
    }

    reactor.shutdown();
}
