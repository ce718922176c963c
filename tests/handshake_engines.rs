//! Drives the handshake engines by hand through their public API, without a
//! channel around them.

mod common;

use common::{client_config, client_key, config, server_config};
use vts::Role;
use vts::application::handshake::{HandshakeFsm, HandshakeState};
use vts::{AbortKind, ChannelSettings};

#[test]
fn states_advance_message_by_message() {
    let mut client = HandshakeFsm::new(Role::Client, client_config()).unwrap();
    let mut server = HandshakeFsm::new(Role::Server, server_config()).unwrap();
    assert_eq!(client.state(), HandshakeState::Init);

    let hello = client.start().unwrap();
    assert!(!hello.is_empty());
    assert_eq!(client.state(), HandshakeState::SentHello);
    assert!(server.start().unwrap().is_empty());
    assert_eq!(server.state(), HandshakeState::AwaitClientHello);

    let params = server.receive(&hello).unwrap();
    assert_eq!(server.state(), HandshakeState::SentServerParams);
    assert!(server.negotiated().is_some());

    let client_key = client.receive(&params).unwrap();
    assert!(client.is_done());
    assert!(server.receive(&client_key).unwrap().is_empty());
    assert!(server.is_done());

    let c = client.take_outcome().unwrap();
    let s = server.take_outcome().unwrap();
    assert_eq!(c.keys, s.keys);
    assert_eq!(c.negotiated, s.negotiated);
    assert!(client.take_outcome().is_none());
}

#[test]
fn client_keypair_adds_the_server_secret_round() {
    let cfg = config(Some(client_key()), None, None, ChannelSettings::default());
    let mut client = HandshakeFsm::new(Role::Client, cfg).unwrap();
    let mut server = HandshakeFsm::new(Role::Server, server_config()).unwrap();
    server.start().unwrap();

    let params = server.receive(&client.start().unwrap()).unwrap();
    let client_key = client.receive(&params).unwrap();
    assert_eq!(client.state(), HandshakeState::SentClientKey);
    let secret = server.receive(&client_key).unwrap();
    assert!(!secret.is_empty());
    assert!(server.is_done());
    assert!(client.receive(&secret).unwrap().is_empty());
    assert!(client.is_done());
    assert_eq!(
        client.take_outcome().unwrap().keys,
        server.take_outcome().unwrap().keys
    );
}

#[test]
fn trailing_record_bytes_are_left_for_the_pump() {
    let mut client = HandshakeFsm::new(Role::Client, client_config()).unwrap();
    let mut server = HandshakeFsm::new(Role::Server, server_config()).unwrap();
    server.start().unwrap();
    let params = server.receive(&client.start().unwrap()).unwrap();
    let mut key_and_more = client.receive(&params).unwrap();
    key_and_more.extend_from_slice(b"record bytes");

    server.receive(&key_and_more).unwrap();
    assert!(server.is_done());
    assert_eq!(&server.take_remaining()[..], b"record bytes");
}

#[test]
fn replayed_hello_is_a_protocol_error() {
    let mut client = HandshakeFsm::new(Role::Client, client_config()).unwrap();
    let mut server = HandshakeFsm::new(Role::Server, server_config()).unwrap();
    server.start().unwrap();
    let hello = client.start().unwrap();
    server.receive(&hello).unwrap();

    let err = server.receive(&hello).unwrap_err();
    assert_eq!(err.abort_kind(), AbortKind::Protocol);
}
