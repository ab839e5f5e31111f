use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::RwLock;

use serde::{Deserialize, Serialize};
use sidetree_types::Endpoint;

/// Capability a peer is configured with.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Role {
    BatchWriter,
    Observer,
    ObserverStandby,
    Resolver,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::BatchWriter => "batch-writer",
            Self::Observer => "observer",
            Self::ObserverStandby => "observer-standby",
            Self::Resolver => "resolver",
        })
    }
}

/// A peer as seen by discovery.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Member {
    pub endpoint: Endpoint,
    pub msp_id: String,
    pub roles: BTreeSet<Role>,
}

impl Member {
    pub fn new(endpoint: impl Into<String>, msp_id: impl Into<String>, roles: &[Role]) -> Self {
        Self {
            endpoint: Endpoint::new(endpoint),
            msp_id: msp_id.into(),
            roles: roles.iter().copied().collect(),
        }
    }

    pub fn has_role(&self, role: Role) -> bool {
        self.roles.contains(&role)
    }
}

/// Membership and liveness of peers on a channel.
pub trait Discovery: Send + Sync {
    /// The local peer.
    fn local(&self) -> Member;

    /// Alive peers holding `role`, including the local peer.
    fn peers_for_role(&self, role: Role) -> Vec<Member>;

    fn is_alive(&self, endpoint: &Endpoint) -> bool;

    fn member(&self, endpoint: &Endpoint) -> Option<Member>;
}

/// Fixed membership with settable liveness. The local peer is always alive.
pub struct StaticDiscovery {
    local: Member,
    members: RwLock<BTreeMap<Endpoint, (Member, bool)>>,
}

impl StaticDiscovery {
    pub fn new(local: Member) -> Self {
        let mut members = BTreeMap::new();
        members.insert(local.endpoint.clone(), (local.clone(), true));
        Self {
            local,
            members: RwLock::new(members),
        }
    }

    /// Add (or replace) a remote peer, initially alive.
    pub fn with_peer(self, member: Member) -> Self {
        self.add_peer(member);
        self
    }

    pub fn add_peer(&self, member: Member) {
        self.members
            .write()
            .expect("lock poisoned")
            .insert(member.endpoint.clone(), (member, true));
    }

    pub fn set_alive(&self, endpoint: &Endpoint, alive: bool) {
        if endpoint == &self.local.endpoint {
            return;
        }
        if let Some(entry) = self
            .members
            .write()
            .expect("lock poisoned")
            .get_mut(endpoint)
        {
            entry.1 = alive;
        }
    }
}

impl Discovery for StaticDiscovery {
    fn local(&self) -> Member {
        self.local.clone()
    }

    fn peers_for_role(&self, role: Role) -> Vec<Member> {
        self.members
            .read()
            .expect("lock poisoned")
            .values()
            .filter(|(m, alive)| *alive && m.has_role(role))
            .map(|(m, _)| m.clone())
            .collect()
    }

    fn is_alive(&self, endpoint: &Endpoint) -> bool {
        self.members
            .read()
            .expect("lock poisoned")
            .get(endpoint)
            .is_some_and(|(_, alive)| *alive)
    }

    fn member(&self, endpoint: &Endpoint) -> Option<Member> {
        self.members
            .read()
            .expect("lock poisoned")
            .get(endpoint)
            .map(|(m, _)| m.clone())
    }
}
