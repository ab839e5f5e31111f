use std::sync::Arc;

use sidetree_types::Endpoint;
use tracing::warn;

use crate::discovery::{Discovery, Member, Role};

/// Elects the peer that processes each block.
///
/// Clustered mode picks `sorted(observers)[block % len]`, where observers
/// are the alive active observers of the local MSP, or its alive standby
/// observers when no active observer is alive. The set is recomputed from
/// discovery on every call.
#[derive(Clone)]
pub struct LeaseProvider {
    discovery: Arc<dyn Discovery>,
    clustered: bool,
}

impl LeaseProvider {
    pub fn new(discovery: Arc<dyn Discovery>, clustered: bool) -> Self {
        Self {
            discovery,
            clustered,
        }
    }

    pub fn is_clustered(&self) -> bool {
        self.clustered
    }

    pub fn local_endpoint(&self) -> Endpoint {
        self.discovery.local().endpoint
    }

    pub fn create_lease(&self, block_number: u64) -> Lease {
        let local = self.discovery.local();
        if !self.clustered {
            return self.lease(local.endpoint.clone(), local.endpoint);
        }
        let mut observers = candidates(self.discovery.as_ref(), &local);
        if observers.is_empty() {
            warn!(block = block_number, "no alive observers; local peer takes the lease");
            return self.lease(local.endpoint.clone(), local.endpoint);
        }
        observers.sort();
        let owner = observers[(block_number % observers.len() as u64) as usize].clone();
        self.lease(local.endpoint, owner)
    }

    /// Lease held by a known owner, e.g. one recorded in metadata.
    pub fn get_lease(&self, owner: Endpoint) -> Lease {
        self.lease(self.discovery.local().endpoint, owner)
    }

    fn lease(&self, local: Endpoint, owner: Endpoint) -> Lease {
        Lease {
            local,
            owner,
            discovery: Arc::clone(&self.discovery),
            clustered: self.clustered,
        }
    }
}

fn observers_with(discovery: &dyn Discovery, local: &Member, role: Role) -> Vec<Endpoint> {
    discovery
        .peers_for_role(role)
        .into_iter()
        .filter(|m| m.msp_id == local.msp_id)
        .map(|m| m.endpoint)
        .collect()
}

fn candidates(discovery: &dyn Discovery, local: &Member) -> Vec<Endpoint> {
    let active = observers_with(discovery, local, Role::Observer);
    if active.is_empty() {
        observers_with(discovery, local, Role::ObserverStandby)
    } else {
        active
    }
}

/// The right to process one block.
#[derive(Clone)]
pub struct Lease {
    local: Endpoint,
    owner: Endpoint,
    discovery: Arc<dyn Discovery>,
    clustered: bool,
}

impl Lease {
    pub fn owner(&self) -> &Endpoint {
        &self.owner
    }

    pub fn is_local_owner(&self) -> bool {
        self.owner == self.local
    }

    /// Owner alive and either an active observer or, if standby, no active
    /// observer of its MSP is alive. Evaluated against discovery now.
    pub fn valid(&self) -> bool {
        if !self.clustered {
            return self.is_local_owner();
        }
        if !self.discovery.is_alive(&self.owner) {
            return false;
        }
        let Some(owner) = self.discovery.member(&self.owner) else {
            return false;
        };
        if owner.has_role(Role::Observer) {
            return true;
        }
        if owner.has_role(Role::ObserverStandby) {
            return observers_with(self.discovery.as_ref(), &owner, Role::Observer).is_empty();
        }
        // Fallback lease of a peer without observer roles.
        candidates(self.discovery.as_ref(), &owner).is_empty()
    }
}

impl std::fmt::Debug for Lease {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Lease")
            .field("local", &self.local)
            .field("owner", &self.owner)
            .field("clustered", &self.clustered)
            .finish()
    }
}
