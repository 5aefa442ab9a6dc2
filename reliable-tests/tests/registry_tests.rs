//! Multi-peer demultiplexing through the session registry

mod common;

use common::{is_closed, pattern, session, MemSession};
use reliable::protocol::{MemoryInput, MemoryOutput, MemoryTransport};
use reliable::{SessionConfig, SessionRegistry, SessionState};
use std::net::SocketAddr;

type Server = SessionRegistry<SocketAddr, MemoryTransport, MemoryInput, MemoryOutput>;

fn config() -> SessionConfig {
    SessionConfig::new(4, 2).unwrap()
}

fn addr(port: u16) -> SocketAddr {
    SocketAddr::from(([10, 0, 0, 1], port))
}

fn new_endpoint(_: &SocketAddr) -> (MemoryTransport, MemoryInput, MemoryOutput) {
    (MemoryTransport::new(), MemoryInput::new(), MemoryOutput::unbounded())
}

/// Run clients against the server until every client closes
fn run(server: &mut Server, clients: &mut [(SocketAddr, MemSession)], max_steps: usize) {
    for _ in 0..max_steps {
        if clients.iter().all(|(_, c)| is_closed(c)) {
            return;
        }

        for (peer, client) in clients.iter_mut() {
            client.on_input_available();
            for datagram in client.transport_mut().drain() {
                server.on_datagram(*peer, &datagram, new_endpoint);
            }
        }

        for (peer, client) in clients.iter_mut() {
            if let Some(session) = server.get_mut(peer) {
                for datagram in session.transport_mut().drain() {
                    client.on_packet_received(&datagram);
                }
                session.on_timer_tick();
            }
            client.on_timer_tick();
        }
    }
    panic!("clients did not finish within {} steps", max_steps);
}

#[test]
fn test_streams_from_two_peers_stay_separate() {
    let mut server = Server::new(config()).unwrap();
    let first = pattern(3_000);
    let second: Vec<u8> = pattern(1_700).into_iter().map(|b| b ^ 0xFF).collect();

    let mut clients = vec![
        (addr(5000), session(config(), MemoryInput::with_contents(&first))),
        (addr(5001), session(config(), MemoryInput::with_contents(&second))),
    ];
    run(&mut server, &mut clients, 500);

    assert_eq!(server.len(), 2);
    let s1 = server.get(&addr(5000)).unwrap();
    let s2 = server.get(&addr(5001)).unwrap();
    assert_eq!(s1.output().contents(), &first[..]);
    assert_eq!(s2.output().contents(), &second[..]);
    assert_eq!(s1.state(), SessionState::Active);
}

#[test]
fn test_garbage_from_stranger_is_ignored() {
    let mut server = Server::new(config()).unwrap();

    let handled = server.on_datagram(addr(6000), &[0xAB; 40], new_endpoint);
    assert!(handled.is_none());
    assert!(server.is_empty());

    let handled = server.on_datagram(addr(6000), &[1, 2, 3], new_endpoint);
    assert!(handled.is_none());
    assert!(!server.contains(&addr(6000)));
}

#[test]
fn test_known_peer_survives_garbage() {
    let mut server = Server::new(config()).unwrap();
    let mut clients = vec![(addr(7000), session(config(), MemoryInput::with_contents(b"hi")))];
    run(&mut server, &mut clients, 100);

    let known = server.on_datagram(addr(7000), &[0u8; 20], new_endpoint).unwrap();
    assert_eq!(known.output().contents(), b"hi");
    assert_eq!(known.stats().corrupt_dropped + known.stats().malformed_dropped, 1);
}

#[test]
fn test_remove_then_reconnect_starts_fresh() {
    let mut server = Server::new(config()).unwrap();
    let mut clients = vec![(addr(8000), session(config(), MemoryInput::with_contents(b"first")))];
    run(&mut server, &mut clients, 100);

    let old = server.remove(&addr(8000)).unwrap();
    assert_eq!(old.output().contents(), b"first");
    assert!(server.is_empty());

    // A new client from the same address begins again at sequence 1.
    let mut clients = vec![(addr(8000), session(config(), MemoryInput::with_contents(b"second")))];
    run(&mut server, &mut clients, 100);
    assert_eq!(server.get(&addr(8000)).unwrap().output().contents(), b"second");
}

#[test]
fn test_invalid_config_creates_no_registry() {
    let bad = SessionConfig {
        window_size: 0,
        retransmission_timeout: 2,
    };
    assert!(Server::new(bad).is_err());
}
