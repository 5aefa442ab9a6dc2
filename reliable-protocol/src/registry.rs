//! Peer-address session registry
//!
//! A server receives datagrams from many peers on one socket. The registry
//! maps each peer to its own [`Session`], creating one the first time a
//! valid packet arrives from an unknown peer. Sessions share nothing; the
//! registry only routes.

use crate::config::{ConfigError, SessionConfig};
use crate::endpoint::{AppInput, AppOutput, Transport};
use crate::packet::Packet;
use crate::session::Session;
use std::collections::hash_map::{self, HashMap};
use std::fmt::Debug;
use std::hash::Hash;

/// Sessions keyed by peer address
pub struct SessionRegistry<K, T, I, O> {
    config: SessionConfig,
    sessions: HashMap<K, Session<T, I, O>>,
}

impl<K, T, I, O> SessionRegistry<K, T, I, O>
where
    K: Eq + Hash + Clone + Debug,
    T: Transport,
    I: AppInput,
    O: AppOutput,
{
    /// Create an empty registry whose sessions all use `config`
    pub fn new(config: SessionConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(SessionRegistry {
            config,
            sessions: HashMap::new(),
        })
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Get the session for `peer`, creating it with collaborators from
    /// `make` if none exists
    pub fn get_or_create<F>(&mut self, peer: K, make: F) -> &mut Session<T, I, O>
    where
        F: FnOnce(&K) -> (T, I, O),
    {
        let config = self.config;
        match self.sessions.entry(peer) {
            hash_map::Entry::Occupied(entry) => entry.into_mut(),
            hash_map::Entry::Vacant(entry) => {
                let (transport, input, output) = make(entry.key());
                tracing::info!(peer = ?entry.key(), window = config.window_size, "new session");
                entry.insert(Session::with_valid_config(config, transport, input, output))
            }
        }
    }

    /// Route one datagram from `peer` to its session
    ///
    /// An unknown peer gets a session only if the datagram decodes; noise
    /// from strangers is dropped without allocating anything. Returns the
    /// session that handled the datagram, if any.
    pub fn on_datagram<F>(&mut self, peer: K, datagram: &[u8], make: F) -> Option<&mut Session<T, I, O>>
    where
        F: FnOnce(&K) -> (T, I, O),
    {
        if !self.sessions.contains_key(&peer) {
            if let Err(e) = Packet::decode(datagram) {
                tracing::debug!(peer = ?peer, error = %e, "dropping bad first datagram");
                return None;
            }
        }

        let session = self.get_or_create(peer, make);
        session.on_packet_received(datagram);
        Some(session)
    }

    pub fn get(&self, peer: &K) -> Option<&Session<T, I, O>> {
        self.sessions.get(peer)
    }

    pub fn get_mut(&mut self, peer: &K) -> Option<&mut Session<T, I, O>> {
        self.sessions.get_mut(peer)
    }

    pub fn contains(&self, peer: &K) -> bool {
        self.sessions.contains_key(peer)
    }

    /// Tear down the session for `peer`, discarding all of its state
    pub fn remove(&mut self, peer: &K) -> Option<Session<T, I, O>> {
        let removed = self.sessions.remove(peer);
        if removed.is_some() {
            tracing::info!(peer = ?peer, "session removed");
        }
        removed
    }

    /// Remove every closed session, returning their peers
    pub fn reap_closed(&mut self) -> Vec<K> {
        let closed: Vec<K> = self
            .sessions
            .iter()
            .filter(|(_, session)| session.is_closed())
            .map(|(peer, _)| peer.clone())
            .collect();

        for peer in &closed {
            self.remove(peer);
        }
        closed
    }

    pub fn iter(&self) -> hash_map::Iter<'_, K, Session<T, I, O>> {
        self.sessions.iter()
    }

    pub fn iter_mut(&mut self) -> hash_map::IterMut<'_, K, Session<T, I, O>> {
        self.sessions.iter_mut()
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}
