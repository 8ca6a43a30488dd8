//! Strongly typed entity identifiers.
//!
//! Every addressable entity gets its own uuid newtype so a device id can
//! never be passed where an alarm id is expected.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

macro_rules! entity_id {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            /// Generate a fresh random id.
            pub fn random() -> Self {
                Self(Uuid::new_v4())
            }

            pub fn from_uuid(uuid: Uuid) -> Self {
                Self(uuid)
            }

            pub fn as_uuid(&self) -> &Uuid {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                self.0.fmt(f)
            }
        }
    };
}

entity_id!(
    /// Identifier of a device (the originator of telemetry messages).
    DeviceId
);

entity_id!(
    /// Identifier of a device profile shared by many devices.
    ProfileId
);

entity_id!(
    /// Identifier of an alarm instance.
    AlarmId
);

entity_id!(
    /// Identifier of a rule chain.
    RuleChainId
);
