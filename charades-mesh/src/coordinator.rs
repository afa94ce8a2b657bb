use charades_types::PlayerId;
use serde_json::Value;
use std::collections::{BTreeSet, HashMap};
use std::time::{Duration, Instant};
use tracing::{debug, info};

use crate::election::{Role, role_for};

#[derive(Debug, Clone)]
pub struct MeshSettings {
    /// Delay before re-initiating a connection that failed.
    pub reconnect_delay: Duration,
    pub sweep_interval: Duration,
    /// Negotiations older than this are treated as lost.
    pub negotiation_timeout: Duration,
}

impl Default for MeshSettings {
    fn default() -> Self {
        Self {
            reconnect_delay: Duration::from_secs(2),
            sweep_interval: Duration::from_secs(10),
            negotiation_timeout: Duration::from_secs(15),
        }
    }
}

/// Transport state as reported by the media layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportState {
    Connecting,
    Connected,
    Disconnected,
    Failed,
    Closed,
}

impl TransportState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            TransportState::Disconnected | TransportState::Failed | TransportState::Closed
        )
    }
}

/// Local view of one link. Terminal links are torn down and dropped, so every
/// stored link is alive or still negotiating.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    /// Offer sent, waiting for the answer.
    Offering { since: Instant },
    /// Offer answered, waiting for the transport.
    Answering { since: Instant },
    /// Answer applied, waiting for the transport.
    Connecting { since: Instant },
    Connected,
}

impl LinkState {
    fn negotiating_since(self) -> Option<Instant> {
        match self {
            LinkState::Offering { since }
            | LinkState::Answering { since }
            | LinkState::Connecting { since } => Some(since),
            LinkState::Connected => None,
        }
    }
}

/// Work for the media layer and the signaling channel.
#[derive(Debug, Clone, PartialEq)]
pub enum MeshAction {
    CreateOffer { peer: PlayerId },
    AcceptOffer { peer: PlayerId, offer: Value },
    ApplyAnswer { peer: PlayerId, answer: Value },
    AddCandidate { peer: PlayerId, candidate: Value },
    Close { peer: PlayerId },
    ScheduleReconnect { peer: PlayerId, after: Duration },
}

/// Decides, for every present peer, whether to offer, answer, wait or repair.
/// Pure state; the driver feeds it events and executes the returned actions.
#[derive(Debug)]
pub struct MeshCoordinator {
    local_id: PlayerId,
    settings: MeshSettings,
    present: BTreeSet<PlayerId>,
    links: HashMap<PlayerId, LinkState>,
}

impl MeshCoordinator {
    pub fn new(local_id: impl Into<PlayerId>, settings: MeshSettings) -> Self {
        Self {
            local_id: local_id.into(),
            settings,
            present: BTreeSet::new(),
            links: HashMap::new(),
        }
    }

    pub fn local_id(&self) -> &str {
        &self.local_id
    }

    pub fn settings(&self) -> &MeshSettings {
        &self.settings
    }

    pub fn link_state(&self, peer: &str) -> Option<LinkState> {
        self.links.get(peer).copied()
    }

    pub fn peers(&self) -> impl Iterator<Item = &str> {
        self.present.iter().map(String::as_str)
    }

    fn role(&self, peer: &str) -> Option<Role> {
        role_for(&self.local_id, peer)
    }

    fn offer_to(&mut self, peer: &str, now: Instant) -> MeshAction {
        self.links
            .insert(peer.to_string(), LinkState::Offering { since: now });
        MeshAction::CreateOffer {
            peer: peer.to_string(),
        }
    }

    fn tear_down(&mut self, peer: &str) -> Option<MeshAction> {
        self.links.remove(peer).map(|_| MeshAction::Close {
            peer: peer.to_string(),
        })
    }

    /// Replace the present set with the room's current membership.
    pub fn sync_peers<'a, I>(&mut self, members: I, now: Instant) -> Vec<MeshAction>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let members: BTreeSet<PlayerId> = members
            .into_iter()
            .filter(|id| *id != self.local_id)
            .map(str::to_string)
            .collect();

        let departed: Vec<PlayerId> = self.present.difference(&members).cloned().collect();
        let mut actions = Vec::new();
        for peer in departed {
            actions.extend(self.peer_left(&peer));
        }
        for peer in &members {
            actions.extend(self.peer_joined(peer, now));
        }
        actions
    }

    pub fn peer_joined(&mut self, peer: &str, now: Instant) -> Vec<MeshAction> {
        let Some(role) = self.role(peer) else {
            return Vec::new();
        };
        let newly_present = self.present.insert(peer.to_string());
        if role == Role::Initiator && !self.links.contains_key(peer) {
            if newly_present {
                info!("Offering connection to new peer {}", peer);
            }
            return vec![self.offer_to(peer, now)];
        }
        Vec::new()
    }

    pub fn peer_left(&mut self, peer: &str) -> Vec<MeshAction> {
        self.present.remove(peer);
        self.tear_down(peer).into_iter().collect()
    }

    pub fn offer_received(&mut self, from: &str, offer: Value, now: Instant) -> Vec<MeshAction> {
        if self.role(from) != Some(Role::Responder) {
            // We initiate for this pair; a competing offer loses.
            debug!("Ignoring offer from {} (local side initiates)", from);
            return Vec::new();
        }
        self.present.insert(from.to_string());

        // A fresh offer from the initiator replaces whatever we had.
        let mut actions: Vec<MeshAction> = self.tear_down(from).into_iter().collect();
        self.links
            .insert(from.to_string(), LinkState::Answering { since: now });
        actions.push(MeshAction::AcceptOffer {
            peer: from.to_string(),
            offer,
        });
        actions
    }

    pub fn answer_received(&mut self, from: &str, answer: Value, now: Instant) -> Vec<MeshAction> {
        match self.links.get_mut(from) {
            Some(state) if matches!(state, LinkState::Offering { .. }) => {
                *state = LinkState::Connecting { since: now };
                vec![MeshAction::ApplyAnswer {
                    peer: from.to_string(),
                    answer,
                }]
            }
            _ => {
                debug!("Ignoring answer from {} with no pending offer", from);
                Vec::new()
            }
        }
    }

    pub fn candidate_received(&mut self, from: &str, candidate: Value) -> Vec<MeshAction> {
        if !self.links.contains_key(from) {
            debug!("Dropping candidate from {} with no link", from);
            return Vec::new();
        }
        vec![MeshAction::AddCandidate {
            peer: from.to_string(),
            candidate,
        }]
    }

    /// Transport state change for `peer`. Terminal states tear the link down;
    /// the initiator schedules a new attempt, the responder waits for it.
    pub fn transport_changed(&mut self, peer: &str, state: TransportState) -> Vec<MeshAction> {
        if !self.links.contains_key(peer) {
            return Vec::new();
        }
        if state == TransportState::Connected {
            self.links.insert(peer.to_string(), LinkState::Connected);
            info!("Connected to peer {}", peer);
            return Vec::new();
        }
        if !state.is_terminal() {
            return Vec::new();
        }

        info!("Connection to peer {} is {:?}, tearing down", peer, state);
        let mut actions: Vec<MeshAction> = self.tear_down(peer).into_iter().collect();
        if self.present.contains(peer) && self.role(peer) == Some(Role::Initiator) {
            actions.push(MeshAction::ScheduleReconnect {
                peer: peer.to_string(),
                after: self.settings.reconnect_delay,
            });
        }
        actions
    }

    /// A scheduled reconnect fired. Does nothing if the peer left or a link was
    /// already re-established in the meantime.
    pub fn reconnect_due(&mut self, peer: &str, now: Instant) -> Vec<MeshAction> {
        if !self.present.contains(peer)
            || self.links.contains_key(peer)
            || self.role(peer) != Some(Role::Initiator)
        {
            return Vec::new();
        }
        info!("Re-initiating connection to peer {}", peer);
        vec![self.offer_to(peer, now)]
    }

    /// Periodic check over every present peer: re-offer missing or stuck
    /// links we initiate, drop stuck links we answer, close links to peers
    /// that are gone.
    pub fn health_sweep(&mut self, now: Instant) -> Vec<MeshAction> {
        let mut actions = Vec::new();

        let orphaned: Vec<PlayerId> = self
            .links
            .keys()
            .filter(|peer| !self.present.contains(*peer))
            .cloned()
            .collect();
        for peer in orphaned {
            actions.extend(self.tear_down(&peer));
        }

        let peers: Vec<PlayerId> = self.present.iter().cloned().collect();
        for peer in peers {
            let stuck = self
                .links
                .get(&peer)
                .and_then(|state| state.negotiating_since())
                .is_some_and(|since| {
                    now.saturating_duration_since(since) >= self.settings.negotiation_timeout
                });
            let missing = !self.links.contains_key(&peer);

            match self.role(&peer) {
                Some(Role::Initiator) if missing || stuck => {
                    debug!("Health sweep repairing link to {}", peer);
                    actions.extend(self.tear_down(&peer));
                    actions.push(self.offer_to(&peer, now));
                }
                Some(Role::Responder) if stuck => {
                    debug!("Health sweep dropping stalled link to {}", peer);
                    actions.extend(self.tear_down(&peer));
                }
                _ => {}
            }
        }
        actions
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn coordinator(id: &str) -> MeshCoordinator {
        MeshCoordinator::new(id, MeshSettings::default())
    }

    fn offers(actions: &[MeshAction]) -> Vec<&str> {
        actions
            .iter()
            .filter_map(|a| match a {
                MeshAction::CreateOffer { peer } => Some(peer.as_str()),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_only_smaller_id_offers() {
        let now = Instant::now();
        let mut a = coordinator("user_a");
        let mut b = coordinator("user_b");

        let from_a = a.sync_peers(["user_a", "user_b"], now);
        let from_b = b.sync_peers(["user_b", "user_a"], now);

        assert_eq!(offers(&from_a), vec!["user_b"]);
        assert!(from_b.is_empty());

        // Seeing the peer again never produces a second offer.
        assert!(a.peer_joined("user_b", now).is_empty());
        assert!(b.peer_joined("user_a", now).is_empty());
    }

    #[test]
    fn test_offer_answer_handshake() {
        let now = Instant::now();
        let mut a = coordinator("user_a");
        let mut b = coordinator("user_b");
        a.peer_joined("user_b", now);

        let answered = b.offer_received("user_a", json!({"sdp": "offer"}), now);
        assert_eq!(
            answered,
            vec![MeshAction::AcceptOffer {
                peer: "user_a".into(),
                offer: json!({"sdp": "offer"})
            }]
        );
        assert!(b.peers().any(|p| p == "user_a"));

        let applied = a.answer_received("user_b", json!({"sdp": "answer"}), now);
        assert_eq!(applied.len(), 1);
        assert!(matches!(
            a.link_state("user_b"),
            Some(LinkState::Connecting { .. })
        ));

        a.transport_changed("user_b", TransportState::Connected);
        b.transport_changed("user_a", TransportState::Connected);
        assert_eq!(a.link_state("user_b"), Some(LinkState::Connected));
        assert_eq!(b.link_state("user_a"), Some(LinkState::Connected));
    }

    #[test]
    fn test_competing_offer_is_ignored() {
        let now = Instant::now();
        let mut a = coordinator("user_a");
        a.peer_joined("user_b", now);

        assert!(a.offer_received("user_b", json!({}), now).is_empty());
        assert!(matches!(a.link_state("user_b"), Some(LinkState::Offering { .. })));
    }

    #[test]
    fn test_stray_answer_and_candidate_are_dropped() {
        let now = Instant::now();
        let mut a = coordinator("user_a");
        assert!(a.answer_received("user_z", json!({}), now).is_empty());
        assert!(a.candidate_received("user_z", json!({})).is_empty());
    }

    #[test]
    fn test_failure_schedules_reconnect_on_initiator_only() {
        let now = Instant::now();
        let mut a = coordinator("user_a");
        let mut b = coordinator("user_b");
        a.peer_joined("user_b", now);
        b.offer_received("user_a", json!({}), now);

        let a_actions = a.transport_changed("user_b", TransportState::Failed);
        assert_eq!(
            a_actions,
            vec![
                MeshAction::Close { peer: "user_b".into() },
                MeshAction::ScheduleReconnect {
                    peer: "user_b".into(),
                    after: Duration::from_secs(2)
                },
            ]
        );
        let b_actions = b.transport_changed("user_a", TransportState::Disconnected);
        assert_eq!(b_actions, vec![MeshAction::Close { peer: "user_a".into() }]);

        assert_eq!(offers(&a.reconnect_due("user_b", now)), vec!["user_b"]);
        assert!(b.reconnect_due("user_a", now).is_empty());
    }

    #[test]
    fn test_reconnect_skipped_after_peer_left() {
        let now = Instant::now();
        let mut a = coordinator("user_a");
        a.peer_joined("user_b", now);
        a.transport_changed("user_b", TransportState::Failed);
        a.peer_left("user_b");

        assert!(a.reconnect_due("user_b", now).is_empty());
    }

    #[test]
    fn test_sweep_repairs_missing_and_stuck_links() {
        let now = Instant::now();
        let mut a = coordinator("user_a");
        a.sync_peers(["user_b", "user_c"], now);
        a.transport_changed("user_c", TransportState::Connected);
        // Lost failure notification: link silently vanished.
        a.links.remove("user_c");

        let early = a.health_sweep(now + Duration::from_secs(10));
        assert_eq!(offers(&early), vec!["user_c"]);

        let late = a.health_sweep(now + Duration::from_secs(16));
        assert_eq!(offers(&late), vec!["user_b"]);
        assert!(late.contains(&MeshAction::Close { peer: "user_b".into() }));
    }

    #[test]
    fn test_sweep_drops_stalled_answer_and_orphans() {
        let now = Instant::now();
        let mut b = coordinator("user_b");
        b.offer_received("user_a", json!({}), now);
        b.offer_received("user_0", json!({}), now);
        b.peer_left("user_0");

        let actions = b.health_sweep(now + Duration::from_secs(20));
        assert_eq!(actions, vec![MeshAction::Close { peer: "user_a".into() }]);
        assert!(b.link_state("user_a").is_none());
    }

    #[test]
    fn test_sync_closes_departed_peers() {
        let now = Instant::now();
        let mut a = coordinator("user_a");
        a.sync_peers(["user_b", "user_c"], now);

        let actions = a.sync_peers(["user_c"], now);
        assert_eq!(actions, vec![MeshAction::Close { peer: "user_b".into() }]);
        assert_eq!(a.peers().collect::<Vec<_>>(), vec!["user_c"]);
    }
}
