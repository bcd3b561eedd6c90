//! Drives a gossip exchange across a real [`Platform`] loopback, proving the
//! wire codec is the actual serialization boundary between
//! [`Membership::handle`] and `Platform::send`/`recv`, not just a codec
//! exercised by its own unit tests.

use aipnet_gossip::wire::Envelope;
use aipnet_gossip::{Config, Membership};
use aipnet_platform::{MockPlatform, Platform};

fn node(n: u8) -> aipnet_frame::NodeId {
    let mut bytes = [0u8; 16];
    bytes[15] = n;
    aipnet_frame::NodeId(bytes)
}

#[test]
fn join_travels_over_platform_send_recv_and_updates_membership() {
    let (server_link, client_link) = MockPlatform::pair_default();

    let mut server = Membership::new(node(1), Config::default());
    let outcome = Membership::new(node(2), Config::default()).join(node(1));
    assert_eq!(outcome.sends.len(), 1);
    let (_to, join_msg) = &outcome.sends[0];

    let wire_bytes = Envelope::unsigned(join_msg).encode();
    client_link.send(&wire_bytes).unwrap();

    let mut buf = [0u8; 256];
    let n = server_link.recv(&mut buf).unwrap();
    let received = Envelope::decode(&buf[..n]).unwrap();
    let msg = received.to_message().unwrap();

    let result = server.handle(node(2), msg);
    assert!(server.active_view().contains(&node(2)));
    assert!(result.sends.is_empty());
}
