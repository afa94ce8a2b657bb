use std::cmp::Ordering;

/// Which side of a peer pair sends the first offer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// Sends the offer and owns every re-initiation for the pair.
    Initiator,
    /// Waits for the initiator's offer and answers it.
    Responder,
}

/// Total order over peer ids: the lexicographically smaller id initiates.
///
/// Both sides evaluate this independently and always agree, so a pair never
/// produces two competing offers. Returns `None` for our own id.
pub fn role_for(local_id: &str, remote_id: &str) -> Option<Role> {
    match local_id.cmp(remote_id) {
        Ordering::Less => Some(Role::Initiator),
        Ordering::Greater => Some(Role::Responder),
        Ordering::Equal => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_smaller_id_initiates() {
        assert_eq!(role_for("user_a", "user_b"), Some(Role::Initiator));
        assert_eq!(role_for("user_b", "user_a"), Some(Role::Responder));
        assert_eq!(role_for("user_a", "user_a"), None);
    }

    #[test]
    fn test_exactly_one_initiator_per_pair() {
        let ids = ["user_10", "user_9", "User_a", "user_a", "a", "ab"];
        for a in ids {
            for b in ids {
                if a == b {
                    continue;
                }
                let pair = (role_for(a, b), role_for(b, a));
                assert!(
                    matches!(
                        pair,
                        (Some(Role::Initiator), Some(Role::Responder))
                            | (Some(Role::Responder), Some(Role::Initiator))
                    ),
                    "{a} / {b}"
                );
            }
        }
    }
}
