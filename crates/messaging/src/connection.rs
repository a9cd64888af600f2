//! Connection lifecycle state machine.
//!
//! `Unbound -> Bound -> Joined -> Closed`. The bound identity is set exactly
//! once; `Closed` is terminal and a reconnecting client starts over with a
//! fresh connection.

use std::fmt;

use uuid::Uuid;

use crate::types::{MessagingError, MessagingResult};

/// Unique id for one physical connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(Uuid);

impl ConnectionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionState {
    Unbound,
    Bound { identity: String },
    Joined { identity: String },
    Closed,
}

/// Lifetime state of one live transport session.
#[derive(Debug)]
pub struct Connection {
    id: ConnectionId,
    state: ConnectionState,
}

impl Connection {
    pub fn new() -> Self {
        Self {
            id: ConnectionId::new(),
            state: ConnectionState::Unbound,
        }
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn state(&self) -> &ConnectionState {
        &self.state
    }

    /// The bound identity, if any.
    pub fn identity(&self) -> Option<&str> {
        match &self.state {
            ConnectionState::Bound { identity } | ConnectionState::Joined { identity } => {
                Some(identity)
            }
            _ => None,
        }
    }

    pub fn is_joined(&self) -> bool {
        matches!(self.state, ConnectionState::Joined { .. })
    }

    pub fn is_closed(&self) -> bool {
        matches!(self.state, ConnectionState::Closed)
    }

    /// Attach an identity. Only valid while unbound; a second bind is a
    /// protocol violation.
    pub fn bind(&mut self, identity: String) -> MessagingResult<()> {
        match &self.state {
            ConnectionState::Unbound => {
                self.state = ConnectionState::Bound { identity };
                Ok(())
            }
            ConnectionState::Bound { .. } | ConnectionState::Joined { .. } => Err(
                MessagingError::ProtocolViolation("connection is already bound".to_string()),
            ),
            ConnectionState::Closed => Err(MessagingError::ProtocolViolation(
                "connection is closed".to_string(),
            )),
        }
    }

    /// Move from `Bound` to `Joined`, returning the bound identity.
    pub fn join(&mut self) -> MessagingResult<String> {
        match &self.state {
            ConnectionState::Bound { identity } => {
                let identity = identity.clone();
                self.state = ConnectionState::Joined {
                    identity: identity.clone(),
                };
                Ok(identity)
            }
            ConnectionState::Unbound => Err(MessagingError::ProtocolViolation(
                "join requires a bound identity".to_string(),
            )),
            ConnectionState::Joined { .. } => Err(MessagingError::ProtocolViolation(
                "connection already joined".to_string(),
            )),
            ConnectionState::Closed => Err(MessagingError::ProtocolViolation(
                "connection is closed".to_string(),
            )),
        }
    }

    /// The identity if the connection is joined; send and typing require it.
    pub fn joined_identity(&self) -> MessagingResult<&str> {
        match &self.state {
            ConnectionState::Joined { identity } => Ok(identity),
            _ => Err(MessagingError::ProtocolViolation(
                "connection has not joined".to_string(),
            )),
        }
    }

    /// Terminal transition, reachable from any state.
    pub fn close(&mut self) {
        self.state = ConnectionState::Closed;
    }
}

impl Default for Connection {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_connection_is_unbound() {
        let conn = Connection::new();
        assert_eq!(*conn.state(), ConnectionState::Unbound);
        assert!(conn.identity().is_none());
        assert!(!conn.is_joined());
    }

    #[test]
    fn bind_then_join_reaches_joined() {
        let mut conn = Connection::new();
        conn.bind("u1".to_string()).unwrap();
        assert_eq!(conn.identity(), Some("u1"));
        assert!(!conn.is_joined());

        let identity = conn.join().unwrap();
        assert_eq!(identity, "u1");
        assert!(conn.is_joined());
        assert_eq!(conn.joined_identity().unwrap(), "u1");
    }

    #[test]
    fn rebind_is_a_protocol_violation() {
        let mut conn = Connection::new();
        conn.bind("u1".to_string()).unwrap();

        let err = conn.bind("u2".to_string()).unwrap_err();
        assert!(err.is_fatal());
        // The original binding survives the failed attempt.
        assert_eq!(conn.identity(), Some("u1"));
    }

    #[test]
    fn join_requires_binding_first() {
        let mut conn = Connection::new();
        let err = conn.join().unwrap_err();
        assert!(matches!(err, MessagingError::ProtocolViolation(_)));
    }

    #[test]
    fn double_join_is_rejected() {
        let mut conn = Connection::new();
        conn.bind("u1".to_string()).unwrap();
        conn.join().unwrap();
        assert!(conn.join().is_err());
    }

    #[test]
    fn joined_identity_requires_joined_state() {
        let mut conn = Connection::new();
        assert!(conn.joined_identity().is_err());
        conn.bind("u1".to_string()).unwrap();
        assert!(conn.joined_identity().is_err());
    }

    #[test]
    fn closed_is_terminal() {
        let mut conn = Connection::new();
        conn.bind("u1".to_string()).unwrap();
        conn.join().unwrap();
        conn.close();

        assert!(conn.is_closed());
        assert!(conn.identity().is_none());
        assert!(conn.bind("u1".to_string()).is_err());
        assert!(conn.join().is_err());
    }

    #[test]
    fn connection_ids_are_unique() {
        assert_ne!(Connection::new().id(), Connection::new().id());
    }
}
