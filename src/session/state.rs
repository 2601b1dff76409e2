//! Session state machine
//!
//! `SessionPhase` tracks protocol progress; `Role` owns the media bus handle
//! and makes "publisher and subscriber at once" unrepresentable.

use crate::registry::{PublisherSink, Subscription};

/// Session lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    /// Transport accepted, no `connect` yet
    Idle,
    /// `connect` answered
    Connected,
    /// `createStream` answered
    StreamCreated,
    /// Publisher sink registered
    Publishing,
    /// Subscription forwarding packets
    Playing,
    /// Subscription attached, forwarding suspended
    Paused,
    /// Session closed
    Closed,
}

impl SessionPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionPhase::Idle => "idle",
            SessionPhase::Connected => "connected",
            SessionPhase::StreamCreated => "stream-created",
            SessionPhase::Publishing => "publishing",
            SessionPhase::Playing => "playing",
            SessionPhase::Paused => "paused",
            SessionPhase::Closed => "closed",
        }
    }
}

/// What the connection does on the media bus
#[derive(Debug, Default)]
pub enum Role {
    /// Neither publishing nor playing
    #[default]
    None,
    /// Owns the write side of a published stream
    Publisher(PublisherSink),
    /// Attached to a stream's distribution ring
    Subscriber(Subscription),
}

impl Role {
    pub fn is_none(&self) -> bool {
        matches!(self, Role::None)
    }

    pub fn is_publisher(&self) -> bool {
        matches!(self, Role::Publisher(_))
    }

    pub fn is_subscriber(&self) -> bool {
        matches!(self, Role::Subscriber(_))
    }

    pub fn publisher(&self) -> Option<&PublisherSink> {
        match self {
            Role::Publisher(sink) => Some(sink),
            _ => None,
        }
    }

    pub fn subscription(&self) -> Option<&Subscription> {
        match self {
            Role::Subscriber(sub) => Some(sub),
            _ => None,
        }
    }

    pub fn subscription_mut(&mut self) -> Option<&mut Subscription> {
        match self {
            Role::Subscriber(sub) => Some(sub),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::None => "none",
            Role::Publisher(_) => "publisher",
            Role::Subscriber(_) => "subscriber",
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::protocol::constants::DEFAULT_VHOST;
    use crate::registry::{MediaDescriptor, MediaRegistry};

    #[test]
    fn test_role_accessors() {
        let registry = Arc::new(MediaRegistry::new());
        let descriptor = MediaDescriptor::parse("rtmp://127.0.0.1/live/a", DEFAULT_VHOST);

        let role = Role::default();
        assert!(role.is_none());
        assert_eq!(role.as_str(), "none");

        let sink = registry.register_publisher(&descriptor).unwrap();
        let sub = sink.source().attach_ring();

        let publisher = Role::Publisher(sink);
        assert!(publisher.is_publisher());
        assert!(publisher.subscription().is_none());

        let mut subscriber = Role::Subscriber(sub);
        assert!(subscriber.is_subscriber());
        assert!(subscriber.publisher().is_none());
        assert!(subscriber.subscription_mut().is_some());
    }

    #[test]
    fn test_phase_names() {
        assert_eq!(SessionPhase::Idle.as_str(), "idle");
        assert_eq!(SessionPhase::Paused.as_str(), "paused");
    }
}
