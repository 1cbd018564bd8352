//! Auth collaborator seam: capability grants.
//!
//! Tokens carry a capability document mapping channel names to permitted
//! operations, e.g. `{"room": ["publish", "subscribe"]}`. The client
//! consults it to pre-reject publishes and attaches that the server would
//! refuse anyway, without a transport round trip.

use std::collections::{HashMap, HashSet};

use crate::error::ErrorInfo;

/// Operations a capability grant can permit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Publish,
    Subscribe,
    Presence,
}

impl Operation {
    fn parse(s: &str) -> Option<Self> {
        match s {
            "publish" => Some(Operation::Publish),
            "subscribe" => Some(Operation::Subscribe),
            "presence" => Some(Operation::Presence),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
struct Grant {
    ops: HashSet<Operation>,
    all_ops: bool,
}

/// Parsed capability grants.
#[derive(Debug, Clone)]
pub struct Capability {
    grants: HashMap<String, Grant>,
    /// Grant applying to every channel (`"*"` resource).
    wildcard: Option<Grant>,
}

impl Capability {
    /// A capability permitting every operation on every channel.
    pub fn allow_all() -> Self {
        Self {
            grants: HashMap::new(),
            wildcard: Some(Grant {
                ops: HashSet::new(),
                all_ops: true,
            }),
        }
    }

    /// Parse a JSON capability document.
    ///
    /// Unknown operation names are rejected rather than ignored, so a
    /// misspelled grant fails loudly at configuration time.
    pub fn parse(json: &str) -> Result<Self, ErrorInfo> {
        let raw: HashMap<String, Vec<String>> = serde_json::from_str(json)
            .map_err(|e| ErrorInfo::protocol(format!("invalid capability document: {e}")))?;

        let mut grants = HashMap::new();
        let mut wildcard = None;
        for (resource, ops) in raw {
            let mut grant = Grant {
                ops: HashSet::new(),
                all_ops: false,
            };
            for op in &ops {
                if op == "*" {
                    grant.all_ops = true;
                } else {
                    let parsed = Operation::parse(op).ok_or_else(|| {
                        ErrorInfo::protocol(format!("unknown capability operation: {op}"))
                    })?;
                    grant.ops.insert(parsed);
                }
            }
            if resource == "*" {
                wildcard = Some(grant);
            } else {
                grants.insert(resource, grant);
            }
        }

        Ok(Self { grants, wildcard })
    }

    fn grant_for(&self, channel: &str) -> Option<&Grant> {
        self.grants.get(channel).or(self.wildcard.as_ref())
    }

    /// Whether `op` is permitted on `channel`.
    pub fn allows(&self, channel: &str, op: Operation) -> bool {
        match self.grant_for(channel) {
            Some(grant) => grant.all_ops || grant.ops.contains(&op),
            None => false,
        }
    }

    /// Whether any operation at all is granted on `channel`. Attaching
    /// requires at least one grant.
    pub fn any_grant(&self, channel: &str) -> bool {
        self.grant_for(channel)
            .map(|g| g.all_ops || !g.ops.is_empty())
            .unwrap_or(false)
    }
}

impl Default for Capability {
    fn default() -> Self {
        Self::allow_all()
    }
}
