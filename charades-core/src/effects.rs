use charades_types::{PlayerId, ServerMessage};
use std::time::Duration;

/// Who a message goes to. Resolved against room membership by the server.
#[derive(Debug, Clone, PartialEq)]
pub enum Audience {
    Everyone,
    EveryoneExcept(PlayerId),
    Player(PlayerId),
    Players(Vec<PlayerId>),
}

impl Audience {
    pub fn includes(&self, player_id: &str) -> bool {
        match self {
            Audience::Everyone => true,
            Audience::EveryoneExcept(excluded) => excluded != player_id,
            Audience::Player(target) => target == player_id,
            Audience::Players(targets) => targets.iter().any(|t| t == player_id),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Dispatch {
    pub audience: Audience,
    pub message: ServerMessage,
}

/// Timer work requested by a transition. Every firing re-enters the room and is
/// checked against the round number it was scheduled for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerRequest {
    RoundClock { round: u32, after: Duration },
    CancelRoundClock,
    NextRound { round: u32, after: Duration },
    CancelNextRound,
}

/// Output of one transition: messages in the order they must be delivered,
/// plus timer requests.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Effects {
    pub dispatches: Vec<Dispatch>,
    pub timers: Vec<TimerRequest>,
}

impl Effects {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn send(&mut self, audience: Audience, message: ServerMessage) {
        self.dispatches.push(Dispatch { audience, message });
    }

    pub fn broadcast(&mut self, message: ServerMessage) {
        self.send(Audience::Everyone, message);
    }

    pub fn to_player(&mut self, player_id: &str, message: ServerMessage) {
        self.send(Audience::Player(player_id.to_string()), message);
    }

    pub fn schedule(&mut self, timer: TimerRequest) {
        self.timers.push(timer);
    }

    pub fn extend(&mut self, other: Effects) {
        self.dispatches.extend(other.dispatches);
        self.timers.extend(other.timers);
    }

    pub fn is_empty(&self) -> bool {
        self.dispatches.is_empty() && self.timers.is_empty()
    }

    /// Messages `player_id` would receive, in delivery order.
    pub fn messages_for<'a>(
        &'a self,
        player_id: &'a str,
    ) -> impl Iterator<Item = &'a ServerMessage> + 'a {
        self.dispatches
            .iter()
            .filter(move |d| d.audience.includes(player_id))
            .map(|d| &d.message)
    }
}
