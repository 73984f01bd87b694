//! The fixed set of workers taking part in a job.
//!
//! A roster is built once, before the job starts, and never changes: its
//! size is the partition modulus, so every worker must see the same one.

use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use thiserror::Error;
use url::Url;

use crate::rpc;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RosterError {
    #[error("roster is empty")]
    Empty,

    #[error("duplicate worker id `{0}`")]
    DuplicateId(String),

    #[error("worker id must not be empty")]
    EmptyId,

    #[error("invalid address `{address}` for worker `{id}`: {reason}")]
    InvalidAddress {
        id: String,
        address: String,
        reason: String,
    },

    #[error("worker `{id}` carries index {index}, expected {expected}")]
    IndexMismatch {
        id: String,
        index: u32,
        expected: u32,
    },

    #[error("expected `<id>=<address>`, got `{0}`")]
    Malformed(String),
}

/// One worker as named on the command line: `id=http://host:port`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerSpec {
    pub id: String,
    pub address: String,
}

impl FromStr for WorkerSpec {
    type Err = RosterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (id, address) = s
            .split_once('=')
            .ok_or_else(|| RosterError::Malformed(s.to_string()))?;

        Ok(Self {
            id: id.trim().to_string(),
            address: address.trim().to_string(),
        })
    }
}

/// A roster entry. `index` is the entry's position and the partition index
/// the worker owns.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Member {
    pub id: String,
    pub address: String,
    pub index: u32,
}

impl fmt::Display for Member {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{} ({})", self.id, self.index, self.address)
    }
}

/// Immutable, cheaply cloneable list of workers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Roster {
    members: Arc<[Member]>,
}

impl Roster {
    /// Build a roster; indices are assigned by position.
    pub fn new(specs: impl IntoIterator<Item = WorkerSpec>) -> Result<Self, RosterError> {
        let members = specs
            .into_iter()
            .enumerate()
            .map(|(index, spec)| Member {
                id: spec.id,
                address: spec.address,
                index: index as u32,
            })
            .collect::<Vec<_>>();

        Self::validated(members)
    }

    /// Rebuild a roster received over the wire, checking that the sender
    /// assigned indices by position.
    pub fn from_wire(entries: &[rpc::RosterEntry]) -> Result<Self, RosterError> {
        let members = entries
            .iter()
            .enumerate()
            .map(|(position, entry)| {
                if entry.index != position as u32 {
                    return Err(RosterError::IndexMismatch {
                        id: entry.id.clone(),
                        index: entry.index,
                        expected: position as u32,
                    });
                }
                Ok(Member {
                    id: entry.id.clone(),
                    address: entry.address.clone(),
                    index: entry.index,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Self::validated(members)
    }

    fn validated(members: Vec<Member>) -> Result<Self, RosterError> {
        if members.is_empty() {
            return Err(RosterError::Empty);
        }

        let mut seen = HashSet::new();
        for member in &members {
            if member.id.is_empty() {
                return Err(RosterError::EmptyId);
            }
            if !seen.insert(member.id.as_str()) {
                return Err(RosterError::DuplicateId(member.id.clone()));
            }
            check_address(member)?;
        }

        Ok(Self {
            members: members.into(),
        })
    }

    pub fn to_wire(&self) -> Vec<rpc::RosterEntry> {
        self.members
            .iter()
            .map(|m| rpc::RosterEntry {
                id: m.id.clone(),
                address: m.address.clone(),
                index: m.index,
            })
            .collect()
    }

    /// Number of workers, the partition modulus.
    pub fn len(&self) -> u32 {
        self.members.len() as u32
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn get(&self, index: u32) -> Option<&Member> {
        self.members.get(index as usize)
    }

    pub fn index_of(&self, id: &str) -> Option<u32> {
        self.members.iter().find(|m| m.id == id).map(|m| m.index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Member> {
        self.members.iter()
    }
}

fn check_address(member: &Member) -> Result<(), RosterError> {
    let invalid = |reason: String| RosterError::InvalidAddress {
        id: member.id.clone(),
        address: member.address.clone(),
        reason,
    };

    let url = Url::parse(&member.address).map_err(|e| invalid(e.to_string()))?;
    match url.scheme() {
        "http" => {}
        other => return Err(invalid(format!("unsupported scheme `{other}`"))),
    }
    if url.host_str().is_none() {
        return Err(invalid("missing host".to_string()));
    }
    if url.port_or_known_default().is_none() {
        return Err(invalid("missing port".to_string()));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec(s: &str) -> WorkerSpec {
        s.parse().unwrap()
    }

    #[test]
    fn indices_follow_position() {
        let roster = Roster::new([
            spec("a=http://127.0.0.1:7001"),
            spec("b=http://127.0.0.1:7002"),
            spec("c=http://[::1]:7003"),
        ])
        .unwrap();

        assert_eq!(roster.len(), 3);
        assert_eq!(roster.index_of("c"), Some(2));
        assert_eq!(roster.get(1).unwrap().id, "b");
        assert_eq!(roster.index_of("z"), None);
    }

    #[test]
    fn rejects_bad_rosters() {
        assert_eq!(Roster::new([]).unwrap_err(), RosterError::Empty);
        assert_eq!(
            Roster::new([spec("a=http://h:1"), spec("a=http://h:2")]).unwrap_err(),
            RosterError::DuplicateId("a".into())
        );
        assert!(matches!(
            Roster::new([spec("a=ftp://h:1")]),
            Err(RosterError::InvalidAddress { .. })
        ));
        // The transport is plaintext only.
        assert!(matches!(
            Roster::new([spec("a=https://h:443")]),
            Err(RosterError::InvalidAddress { .. })
        ));
        assert!(matches!(
            Roster::new([spec("a=not a url")]),
            Err(RosterError::InvalidAddress { .. })
        ));
        assert!(matches!(
            "no-separator".parse::<WorkerSpec>(),
            Err(RosterError::Malformed(_))
        ));
    }

    #[test]
    fn wire_form_round_trips_and_checks_indices() {
        let roster = Roster::new([spec("a=http://h:1"), spec("b=http://h:2")]).unwrap();
        let mut wire = roster.to_wire();
        assert_eq!(Roster::from_wire(&wire).unwrap(), roster);

        wire.swap(0, 1);
        assert!(matches!(
            Roster::from_wire(&wire),
            Err(RosterError::IndexMismatch { .. })
        ));
    }
}
