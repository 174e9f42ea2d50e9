//! Attendee name resolution against a requester's roster

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// A known contact in the requester's group
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RosterMember {
    pub display_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contact_address: Option<String>,
    pub phone_identity: String,
}

impl RosterMember {
    pub fn new(
        display_name: impl Into<String>,
        contact_address: Option<&str>,
        phone_identity: impl Into<String>,
    ) -> Self {
        Self {
            display_name: display_name.into(),
            contact_address: contact_address.map(str::to_string),
            phone_identity: phone_identity.into(),
        }
    }
}

/// Source of rosters, keyed by requester identity
#[async_trait]
pub trait RosterProvider: Send + Sync {
    async fn roster_for(&self, identity: &str) -> Result<Vec<RosterMember>>;
}

/// One fixed roster shared by every identity
#[derive(Debug, Clone, Default)]
pub struct StaticRoster {
    members: Vec<RosterMember>,
}

impl StaticRoster {
    pub fn new(members: Vec<RosterMember>) -> Self {
        Self { members }
    }
}

#[async_trait]
impl RosterProvider for StaticRoster {
    async fn roster_for(&self, _identity: &str) -> Result<Vec<RosterMember>> {
        Ok(self.members.clone())
    }
}

/// Outcome of resolving a list of requested names
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttendeeResolution {
    pub resolved: Vec<String>,
    pub unresolved: Vec<String>,
}

impl AttendeeResolution {
    pub fn is_complete(&self) -> bool {
        self.unresolved.is_empty()
    }
}

fn find_member<'a>(name: &str, candidates: &[&'a RosterMember]) -> Option<&'a RosterMember> {
    let wanted = name.trim().to_lowercase();
    if wanted.is_empty() {
        return None;
    }

    candidates
        .iter()
        .find(|m| m.display_name.to_lowercase() == wanted)
        .or_else(|| {
            candidates.iter().find(|m| {
                let display = m.display_name.to_lowercase();
                !display.is_empty() && (display.contains(&wanted) || wanted.contains(&display))
            })
        })
        .copied()
}

/// Resolve requested names to contact addresses.
///
/// Strings that already look like addresses pass through. Only the requester's
/// own display name is dropped; partial names are matched against the other
/// members. A match without an address stays unresolved.
pub fn resolve_attendees(requested: &[String], roster: &[RosterMember], self_identity: &str) -> AttendeeResolution {
    let (own, others): (Vec<&RosterMember>, Vec<&RosterMember>) =
        roster.iter().partition(|m| m.phone_identity == self_identity);
    let mut resolution = AttendeeResolution::default();

    for name in requested {
        let name = name.trim();
        if name.is_empty() {
            continue;
        }

        if name.contains('@') {
            push_unique(&mut resolution.resolved, name.to_string());
            continue;
        }

        if own.iter().any(|m| m.display_name.trim().eq_ignore_ascii_case(name)) {
            tracing::debug!(name = %name, "skipping requester in attendee list");
            continue;
        }

        match find_member(name, &others) {
            Some(RosterMember {
                contact_address: Some(address),
                ..
            }) => push_unique(&mut resolution.resolved, address.clone()),
            _ => push_unique(&mut resolution.unresolved, name.to_string()),
        }
    }

    resolution
}

fn push_unique(list: &mut Vec<String>, value: String) {
    if !list.iter().any(|v| v.eq_ignore_ascii_case(&value)) {
        list.push(value);
    }
}

/// One-line roster summary for prompts
pub fn roster_summary(roster: &[RosterMember], self_identity: &str) -> String {
    let names: Vec<String> = roster
        .iter()
        .filter(|m| m.phone_identity != self_identity)
        .map(|m| match &m.contact_address {
            Some(address) => format!("{} <{}>", m.display_name, address),
            None => format!("{} (no email on file)", m.display_name),
        })
        .collect();

    if names.is_empty() {
        "(no known contacts)".to_string()
    } else {
        names.join(", ")
    }
}
