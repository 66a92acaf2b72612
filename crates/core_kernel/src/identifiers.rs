//! Strongly-typed identifiers for domain entities
//!
//! Newtype wrappers around UUIDs keep a payment id from being passed where a
//! stage id or a ledger line id is expected.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

macro_rules! define_id {
    ($name:ident, $prefix:literal) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            /// Creates a new random identifier
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            /// Creates a new time-ordered identifier (v7)
            ///
            /// Ids created later compare greater, which the replacement engine
            /// relies on for its deterministic tie-break.
            pub fn new_v7() -> Self {
                Self(Uuid::now_v7())
            }

            pub fn from_uuid(uuid: Uuid) -> Self {
                Self(uuid)
            }

            pub fn as_uuid(&self) -> &Uuid {
                &self.0
            }

            pub fn prefix() -> &'static str {
                $prefix
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new_v7()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}-{}", $prefix, self.0)
            }
        }

        impl FromStr for $name {
            type Err = uuid::Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                // Strip prefix if present
                let uuid_str = s.strip_prefix(concat!($prefix, "-")).unwrap_or(s);
                Ok(Self(Uuid::parse_str(uuid_str)?))
            }
        }

        impl From<Uuid> for $name {
            fn from(uuid: Uuid) -> Self {
                Self(uuid)
            }
        }

        impl From<$name> for Uuid {
            fn from(id: $name) -> Uuid {
                id.0
            }
        }
    };
}

// Ledger identifiers
define_id!(AccountId, "ACC");
define_id!(JournalId, "JRN");
define_id!(JournalEntryId, "MOVE");
define_id!(JournalLineId, "LINE");
define_id!(ReconciliationId, "REC");
define_id!(MatchingId, "MATCH");
define_id!(StatementLineId, "STL");

// Organisation identifiers
define_id!(PartyId, "PTY");
define_id!(CompanyId, "CMP");
define_id!(UserId, "USR");

// Payment identifiers
define_id!(PaymentId, "PAY");
define_id!(PaymentMethodId, "PMT");
define_id!(StageId, "STG");
define_id!(BatchId, "BATCH");
define_id!(ReplacementLinkId, "RPL");

define_id!(AuditEventId, "AUD");
