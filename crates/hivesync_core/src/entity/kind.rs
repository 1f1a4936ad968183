//! Entity kinds.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Timestamp fields every kind carries.
const COMMON_DATE_FIELDS: &[&str] = &["createdAt", "updatedAt", "deletedAt"];

/// The domain type of an entity.
///
/// The serialized form is the name the remote uses on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum EntityKind {
    /// An apiary site.
    #[serde(rename = "standort")]
    Location,
    /// A bee colony housed at a location.
    #[serde(rename = "volk")]
    Colony,
    /// A hive inspection record.
    #[serde(rename = "durchsicht")]
    Inspection,
    /// A medication or treatment with a withdrawal period.
    #[serde(rename = "behandlung")]
    Treatment,
    /// A scheduled calendar entry.
    #[serde(rename = "kalenderEvent")]
    CalendarEvent,
    /// Reference to an uploaded file.
    #[serde(rename = "fileRef")]
    FileRef,
    /// An application user.
    #[serde(rename = "user")]
    User,
    /// A shared workspace.
    #[serde(rename = "workspace")]
    Workspace,
    /// A user's membership in a workspace.
    #[serde(rename = "membership")]
    Membership,
    /// A queen bee.
    #[serde(rename = "queen")]
    Queen,
}

impl EntityKind {
    /// All kinds, in a stable order.
    pub const ALL: [EntityKind; 10] = [
        EntityKind::User,
        EntityKind::Workspace,
        EntityKind::Membership,
        EntityKind::Location,
        EntityKind::Queen,
        EntityKind::Colony,
        EntityKind::Inspection,
        EntityKind::Treatment,
        EntityKind::CalendarEvent,
        EntityKind::FileRef,
    ];

    /// Returns the wire name used by the remote.
    #[must_use]
    pub const fn wire_name(self) -> &'static str {
        match self {
            EntityKind::Location => "standort",
            EntityKind::Colony => "volk",
            EntityKind::Inspection => "durchsicht",
            EntityKind::Treatment => "behandlung",
            EntityKind::CalendarEvent => "kalenderEvent",
            EntityKind::FileRef => "fileRef",
            EntityKind::User => "user",
            EntityKind::Workspace => "workspace",
            EntityKind::Membership => "membership",
            EntityKind::Queen => "queen",
        }
    }

    /// Kind-specific payload fields that hold timestamps.
    #[must_use]
    pub const fn extra_date_fields(self) -> &'static [&'static str] {
        match self {
            EntityKind::Inspection => &["datum"],
            EntityKind::Treatment => &["datum", "sperrBis"],
            EntityKind::CalendarEvent => &["start", "ende"],
            EntityKind::Queen => &["von", "bis"],
            _ => &[],
        }
    }

    /// Returns true if `field` is a timestamp for this kind.
    #[must_use]
    pub fn is_date_field(self, field: &str) -> bool {
        COMMON_DATE_FIELDS.contains(&field) || self.extra_date_fields().contains(&field)
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.wire_name())
    }
}

impl FromStr for EntityKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        EntityKind::ALL
            .into_iter()
            .find(|kind| kind.wire_name() == s)
            .ok_or_else(|| format!("unknown entity type: {s}"))
    }
}
