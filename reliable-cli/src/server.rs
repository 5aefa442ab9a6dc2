//! Echo server state
//!
//! Wraps a [`SessionRegistry`] of echo sessions and owns their teardown:
//! closed sessions are reaped, and a peer that has sent nothing for
//! `idle_limit` ticks is removed along with its unacknowledged data.

use crate::endpoint::{echo_pipe, EchoInput, EchoOutput};
use reliable_protocol::{ConfigError, Session, SessionConfig, SessionRegistry, Tick, Transport};
use std::collections::HashMap;
use std::net::SocketAddr;

/// Why a peer's session was torn down
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Teardown {
    Closed,
    Idle,
}

pub struct EchoServer<T> {
    registry: SessionRegistry<SocketAddr, T, EchoInput, EchoOutput>,
    last_heard: HashMap<SocketAddr, Tick>,
    now: Tick,
    idle_limit: Tick,
    echo_buffer: usize,
}

impl<T: Transport> EchoServer<T> {
    /// `idle_limit` of 0 keeps silent peers forever
    pub fn new(config: SessionConfig, echo_buffer: usize, idle_limit: Tick) -> Result<Self, ConfigError> {
        Ok(EchoServer {
            registry: SessionRegistry::new(config)?,
            last_heard: HashMap::new(),
            now: 0,
            idle_limit,
            echo_buffer,
        })
    }

    /// Route a datagram to `peer`'s session, creating it if the datagram
    /// decodes. Returns whether a session handled it.
    pub fn on_datagram<F>(&mut self, peer: SocketAddr, datagram: &[u8], make_transport: F) -> bool
    where
        F: FnOnce(&SocketAddr) -> T,
    {
        let echo_buffer = self.echo_buffer;
        let handled = self
            .registry
            .on_datagram(peer, datagram, |peer| {
                let (input, output) = echo_pipe(echo_buffer);
                (make_transport(peer), input, output)
            })
            .is_some();
        if handled {
            self.last_heard.insert(peer, self.now);
        }
        handled
    }

    /// Echo delivered bytes back; reading them frees output space
    pub fn pump(&mut self) {
        for (_, session) in self.registry.iter_mut() {
            session.on_input_available();
            session.on_output_space_freed();
        }
    }

    /// Advance every session by `ticks`, then tear down closed and idle
    /// sessions
    pub fn on_ticks(&mut self, ticks: u64) -> Vec<(SocketAddr, Teardown)> {
        for _ in 0..ticks {
            for (_, session) in self.registry.iter_mut() {
                session.on_timer_tick();
            }
        }
        self.now += ticks;

        let mut removed: Vec<_> = self
            .registry
            .reap_closed()
            .into_iter()
            .map(|peer| (peer, Teardown::Closed))
            .collect();

        if self.idle_limit > 0 {
            let now = self.now;
            let limit = self.idle_limit;
            let idle: Vec<SocketAddr> = self
                .last_heard
                .iter()
                .filter(|&(_, &heard)| now - heard >= limit)
                .map(|(peer, _)| *peer)
                .collect();
            for peer in idle {
                if let Some(session) = self.registry.remove(&peer) {
                    tracing::info!(
                        %peer,
                        idle_ticks = now - self.last_heard[&peer],
                        in_flight = session.send_window().in_flight(),
                        "dropping idle peer"
                    );
                    removed.push((peer, Teardown::Idle));
                }
            }
        }

        for (peer, _) in &removed {
            self.last_heard.remove(peer);
        }
        removed
    }

    pub fn session(&self, peer: &SocketAddr) -> Option<&Session<T, EchoInput, EchoOutput>> {
        self.registry.get(peer)
    }

    pub fn sessions(&self) -> impl Iterator<Item = (&SocketAddr, &Session<T, EchoInput, EchoOutput>)> {
        self.registry.iter()
    }

    pub fn config(&self) -> &SessionConfig {
        self.registry.config()
    }

    pub fn len(&self) -> usize {
        self.registry.len()
    }

    pub fn is_empty(&self) -> bool {
        self.registry.is_empty()
    }
}
