//! Mesh network notification boundary
//!
//! The mesh stack owns its own instance and reports changes through a
//! state-change callback carrying a bitset of what changed. This module
//! defines that notification and a logging observer. The sleep configuration
//! does not depend on it.

use bitflags::bitflags;
use std::fmt;

/// Role of this node in the mesh
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MeshRole {
    #[default]
    Disabled,
    Detached,
    Child,
    Router,
    Leader,
}

impl MeshRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            MeshRole::Disabled => "disabled",
            MeshRole::Detached => "detached",
            MeshRole::Child => "child",
            MeshRole::Router => "router",
            MeshRole::Leader => "leader",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CommissionerState {
    #[default]
    Disabled,
    Petition,
    Active,
}

impl CommissionerState {
    pub fn as_str(&self) -> &'static str {
        match self {
            CommissionerState::Disabled => "disabled",
            CommissionerState::Petition => "petition",
            CommissionerState::Active => "active",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum JoinerState {
    #[default]
    Idle,
    Discover,
    Connect,
    Connected,
    Entrust,
    Joined,
}

impl JoinerState {
    pub fn as_str(&self) -> &'static str {
        match self {
            JoinerState::Idle => "idle",
            JoinerState::Discover => "discover",
            JoinerState::Connect => "connect",
            JoinerState::Connected => "connected",
            JoinerState::Entrust => "entrust",
            JoinerState::Joined => "joined",
        }
    }
}

macro_rules! fmt_as_str {
    ($($ty:ty),*) => {
        $(impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        })*
    };
}

fmt_as_str!(MeshRole, CommissionerState, JoinerState);

bitflags! {
    /// What changed, as reported by the mesh stack
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct MeshStateChange: u32 {
        const IP6_ADDRESS_ADDED = 1 << 0;
        const IP6_ADDRESS_REMOVED = 1 << 1;
        const ROLE = 1 << 2;
        const LINK_LOCAL_ADDR = 1 << 3;
        const MESH_LOCAL_ADDR = 1 << 4;
        const RLOC_ADDED = 1 << 5;
        const RLOC_REMOVED = 1 << 6;
        const PARTITION_ID = 1 << 7;
        const KEY_SEQUENCE_COUNTER = 1 << 8;
        const NETWORK_DATA = 1 << 9;
        const CHILD_ADDED = 1 << 10;
        const CHILD_REMOVED = 1 << 11;
        const IP6_MULTICAST_SUBSCRIBED = 1 << 12;
        const IP6_MULTICAST_UNSUBSCRIBED = 1 << 13;
        const CHANNEL = 1 << 14;
        const PAN_ID = 1 << 15;
        const NETWORK_NAME = 1 << 16;
        const EXT_PAN_ID = 1 << 17;
        const MASTER_KEY = 1 << 18;
        const PSKC = 1 << 19;
        const SECURITY_POLICY = 1 << 20;
        const COMMISSIONER_STATE = 1 << 23;
        const JOINER_STATE = 1 << 24;
    }
}

const DESCRIPTIONS: &[(MeshStateChange, &str)] = &[
    (MeshStateChange::IP6_ADDRESS_ADDED, "IPv6 address was added"),
    (MeshStateChange::IP6_ADDRESS_REMOVED, "IPv6 address was removed"),
    (MeshStateChange::LINK_LOCAL_ADDR, "Link-local address changed"),
    (MeshStateChange::MESH_LOCAL_ADDR, "Mesh-local address changed"),
    (MeshStateChange::RLOC_ADDED, "RLOC was added"),
    (MeshStateChange::RLOC_REMOVED, "RLOC was removed"),
    (MeshStateChange::PARTITION_ID, "Partition ID changed"),
    (MeshStateChange::KEY_SEQUENCE_COUNTER, "Key sequence changed"),
    (MeshStateChange::NETWORK_DATA, "Network data changed"),
    (MeshStateChange::CHILD_ADDED, "Child was added"),
    (MeshStateChange::CHILD_REMOVED, "Child was removed"),
    (MeshStateChange::IP6_MULTICAST_SUBSCRIBED, "Subscribed to IPv6 multicast address"),
    (MeshStateChange::IP6_MULTICAST_UNSUBSCRIBED, "Unsubscribed from IPv6 multicast address"),
    (MeshStateChange::CHANNEL, "Network channel changed"),
    (MeshStateChange::PAN_ID, "PAN ID changed"),
    (MeshStateChange::NETWORK_NAME, "Network name changed"),
    (MeshStateChange::EXT_PAN_ID, "Extended PAN ID changed"),
    (MeshStateChange::MASTER_KEY, "Master key changed"),
    (MeshStateChange::PSKC, "PSKc changed"),
    (MeshStateChange::SECURITY_POLICY, "Security policy changed"),
];

impl MeshStateChange {
    /// Human readable descriptions of the changes other than role,
    /// commissioner and joiner state
    pub fn describe(self) -> impl Iterator<Item = &'static str> {
        DESCRIPTIONS
            .iter()
            .filter(move |(flag, _)| self.contains(*flag))
            .map(|(_, message)| *message)
    }
}

/// Mesh state at the time of a notification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MeshSnapshot {
    pub role: MeshRole,
    pub commissioner: CommissionerState,
    pub joiner: JoinerState,
}

/// Receives state-change notifications from the mesh stack
pub trait MeshStateObserver {
    fn state_changed(&mut self, changes: MeshStateChange, snapshot: &MeshSnapshot);
}

/// Observer that logs every notification
#[derive(Debug, Default)]
pub struct LoggingObserver;

impl MeshStateObserver for LoggingObserver {
    fn state_changed(&mut self, changes: MeshStateChange, snapshot: &MeshSnapshot) {
        log_state_change(changes, snapshot);
    }
}

/// Messages for the role, commissioner and joiner state changes
fn state_messages(changes: MeshStateChange, snapshot: &MeshSnapshot) -> Vec<String> {
    let mut messages = Vec::new();
    if changes.contains(MeshStateChange::ROLE) {
        messages.push(format!("Role changed: {}", snapshot.role));
    }
    if changes.contains(MeshStateChange::COMMISSIONER_STATE) {
        messages.push(format!(
            "Commissioner state changed: {}",
            snapshot.commissioner
        ));
    }
    if changes.contains(MeshStateChange::JOINER_STATE) {
        messages.push(format!("Joiner state changed: {}", snapshot.joiner));
    }
    messages
}

/// Log a state-change notification
pub fn log_state_change(changes: MeshStateChange, snapshot: &MeshSnapshot) {
    for message in changes.describe() {
        tracing::trace!(target: "dormant::mesh", "{}", message);
    }
    for message in state_messages(changes, snapshot) {
        tracing::info!(target: "dormant::mesh", "{}", message);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_names() {
        assert_eq!(MeshRole::Leader.as_str(), "leader");
        assert_eq!(CommissionerState::Petition.to_string(), "petition");
        assert_eq!(JoinerState::Entrust.as_str(), "entrust");
    }

    #[test]
    fn test_describe_skips_stateful_changes() {
        let changes = MeshStateChange::ROLE
            | MeshStateChange::CHILD_ADDED
            | MeshStateChange::PAN_ID
            | MeshStateChange::JOINER_STATE;
        let messages: Vec<_> = changes.describe().collect();
        assert_eq!(messages, vec!["Child was added", "PAN ID changed"]);
    }

    #[test]
    fn test_unknown_bits_are_ignored() {
        let changes = MeshStateChange::from_bits_retain(1 << 30);
        assert_eq!(changes.describe().count(), 0);
    }

    #[test]
    fn test_state_messages_use_snapshot() {
        let snapshot = MeshSnapshot {
            role: MeshRole::Leader,
            commissioner: CommissionerState::Petition,
            joiner: JoinerState::Joined,
        };
        let changes = MeshStateChange::ROLE
            | MeshStateChange::COMMISSIONER_STATE
            | MeshStateChange::JOINER_STATE
            | MeshStateChange::CHANNEL;

        assert_eq!(
            state_messages(changes, &snapshot),
            vec![
                "Role changed: leader",
                "Commissioner state changed: petition",
                "Joiner state changed: joined",
            ]
        );
        assert_eq!(changes.describe().collect::<Vec<_>>(), vec!["Network channel changed"]);
    }

    #[test]
    fn test_state_messages_only_for_stateful_bits() {
        let snapshot = MeshSnapshot::default();
        assert!(state_messages(MeshStateChange::PAN_ID, &snapshot).is_empty());

        let stateful = MeshStateChange::ROLE
            | MeshStateChange::COMMISSIONER_STATE
            | MeshStateChange::JOINER_STATE;
        assert_eq!(state_messages(MeshStateChange::all(), &snapshot).len(), 3);
        assert_eq!(
            MeshStateChange::all().describe().count(),
            (MeshStateChange::all() - stateful).iter().count()
        );

        let mut observer = LoggingObserver;
        observer.state_changed(MeshStateChange::all(), &snapshot);
    }
}
