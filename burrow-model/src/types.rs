//! Strong id types
//!
//! Semantic newtypes over `Uuid`, replacing raw uuids in signatures so a peer
//! handle, a subscription handle, and a write ticket cannot be mixed up.

use std::fmt;
use uuid::Uuid;

macro_rules! define_id {
    ($name:ident, $doc:expr) => {
        #[doc = $doc]
        #[derive(
            Clone, Copy, PartialEq, Eq, Hash, Debug, serde::Serialize, serde::Deserialize,
        )]
        #[repr(transparent)]
        pub struct $name(Uuid);

        impl $name {
            /// Mint a fresh random id.
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            /// Returns the inner uuid.
            pub fn as_uuid(&self) -> Uuid {
                self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl From<Uuid> for $name {
            fn from(id: Uuid) -> Self {
                Self(id)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

define_id!(PeerId, "Identifies one peer entry in an endpoint's registry.");
define_id!(HandlerId, "Identifies one local subscription handler.");
define_id!(WriteTicket, "Identifies one forwarded replica write awaiting its echo.");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_distinct() {
        let a = PeerId::new();
        let b = PeerId::new();
        assert_ne!(a, b);
    }

    #[test]
    fn display_matches_uuid() {
        let id = HandlerId::new();
        assert_eq!(id.to_string(), id.as_uuid().to_string());
    }
}
