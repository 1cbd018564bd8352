//! Presence member map and sync protocol.
//!
//! Each channel owns one [`PresenceMap`] that converges to the server-side
//! set of present members. Convergence has two inputs: paginated `Sync`
//! messages after an attach that signaled pending presence, and live
//! `Presence` messages at any time. Both are folded in with the same
//! idempotent merge-by-serial rule, so arrival order does not matter.

use std::collections::{HashMap, HashSet};

use tracing::debug;

use crate::protocol::{PresenceAction, PresenceMessage};

/// Member key: `(client_id, member_id)`. One client may hold several
/// members, one per connection.
pub type MemberKey = (String, String);

/// Upper bound on retained leave tombstones. On a long-lived channel with
/// member churn and no resync, the tombstone with the lowest leave serial
/// is evicted once this is exceeded.
const MAX_DEPARTED: usize = 1024;

/// Sync progress for a channel's presence map.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncStatus {
    /// No sync has been requested since the map was created or reset.
    NotSynced,
    /// Sync pages are still expected; membership is partial.
    InProgress,
    /// The sync-end signal has been observed.
    Complete,
}

/// Pure merge rule: does `incoming` supersede `existing` for the same
/// member key? A record wins only with a strictly greater serial; equal or
/// lower serials are ignored, which makes application idempotent and safe
/// under reordering.
pub fn supersedes(existing: &PresenceMessage, incoming: &PresenceMessage) -> bool {
    incoming.serial > existing.serial
}

/// Outcome of applying one presence record.
#[derive(Debug, Clone, PartialEq)]
pub enum PresenceOutcome {
    /// The record was applied; subscribers should be notified with it.
    Applied(PresenceMessage),
    /// The record was stale or duplicate and was ignored.
    Ignored,
}

/// Per-channel presence member map.
pub struct PresenceMap {
    members: HashMap<MemberKey, PresenceMessage>,
    sync_status: SyncStatus,
    /// Sync sequence currently in progress, from the sync serial.
    sync_id: Option<String>,
    /// Members present before the sync started that no sync page (or live
    /// update) has confirmed yet. Removed when the sync ends.
    residual: HashSet<MemberKey>,
    /// Leave serials for departed members, so a reordered stale
    /// Enter/Update/Present cannot resurrect them. Cleared once a sync
    /// completes (the server set is authoritative at that point).
    departed: HashMap<MemberKey, u64>,
}

impl PresenceMap {
    pub fn new() -> Self {
        Self {
            members: HashMap::new(),
            sync_status: SyncStatus::NotSynced,
            sync_id: None,
            residual: HashSet::new(),
            departed: HashMap::new(),
        }
    }

    /// True iff the sync-end signal has been processed. False for the whole
    /// duration of an in-progress sync, even after members have arrived.
    pub fn is_sync_complete(&self) -> bool {
        self.sync_status == SyncStatus::Complete
    }

    pub fn sync_status(&self) -> SyncStatus {
        self.sync_status
    }

    /// Snapshot of the live (non-left) member set.
    pub fn members(&self) -> Vec<PresenceMessage> {
        self.members.values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn get(&self, client_id: &str, member_id: &str) -> Option<&PresenceMessage> {
        self.members
            .get(&(client_id.to_string(), member_id.to_string()))
    }

    /// Begin a sync. Existing members are kept so that serial comparison can
    /// resolve conflicts with incoming pages, but any member not confirmed
    /// by the time the sync ends is removed.
    pub fn begin_sync(&mut self) {
        self.sync_status = SyncStatus::InProgress;
        self.sync_id = None;
        self.residual = self.members.keys().cloned().collect();
    }

    /// The attach confirmed that the server holds no presence members: the
    /// map is authoritatively empty and complete.
    pub fn complete_empty(&mut self) {
        self.members.clear();
        self.residual.clear();
        self.departed.clear();
        self.sync_id = None;
        self.sync_status = SyncStatus::Complete;
    }

    /// Apply one live presence record (Enter/Update/Present upsert, Leave
    /// removes), using the idempotent merge rule.
    pub fn apply(&mut self, incoming: PresenceMessage) -> PresenceOutcome {
        let key = incoming.member_key();

        match incoming.action {
            PresenceAction::Leave => {
                // A stale Leave must not delete a newer record.
                if let Some(existing) = self.members.get(&key) {
                    if incoming.serial < existing.serial {
                        return PresenceOutcome::Ignored;
                    }
                }
                let had_member = self.members.remove(&key).is_some();
                self.residual.remove(&key);
                self.record_departure(key, incoming.serial);
                if had_member {
                    PresenceOutcome::Applied(incoming)
                } else {
                    PresenceOutcome::Ignored
                }
            }
            PresenceAction::Enter | PresenceAction::Update | PresenceAction::Present => {
                if let Some(&left_serial) = self.departed.get(&key) {
                    if incoming.serial <= left_serial {
                        debug!(client_id = %incoming.client_id, serial = incoming.serial,
                               "ignoring presence record older than member's leave");
                        return PresenceOutcome::Ignored;
                    }
                }
                match self.members.get(&key) {
                    Some(existing) if !supersedes(existing, &incoming) => {
                        debug!(client_id = %incoming.client_id, serial = incoming.serial,
                               "ignoring stale presence record");
                        PresenceOutcome::Ignored
                    }
                    _ => {
                        self.departed.remove(&key);
                        self.members.insert(key.clone(), incoming.clone());
                        self.residual.remove(&key);
                        PresenceOutcome::Applied(incoming)
                    }
                }
            }
        }
    }

    fn record_departure(&mut self, key: MemberKey, serial: u64) {
        let entry = self.departed.entry(key).or_insert(0);
        *entry = (*entry).max(serial);
        if self.departed.len() > MAX_DEPARTED {
            let oldest = self
                .departed
                .iter()
                .min_by_key(|(_, &s)| s)
                .map(|(k, _)| k.clone());
            if let Some(key) = oldest {
                self.departed.remove(&key);
            }
        }
    }

    /// Apply one page of a presence sync. `sync_serial` is the pagination
    /// cursor from the protocol message, `<sync id>:<cursor>`; an empty or
    /// absent cursor marks the final page. Returns the presence records
    /// that were actually applied, in page order.
    pub fn apply_sync(
        &mut self,
        members: Vec<PresenceMessage>,
        sync_serial: Option<&str>,
    ) -> Vec<PresenceMessage> {
        // A sync page may arrive without a preceding attach flag (e.g. the
        // server pushes membership after a resume); enter sync mode lazily.
        if self.sync_status != SyncStatus::InProgress {
            self.begin_sync();
        }

        let (sync_id, more_pages) = match sync_serial {
            Some(serial) => match serial.split_once(':') {
                Some((id, cursor)) => (Some(id.to_string()), !cursor.is_empty()),
                None => (Some(serial.to_string()), false),
            },
            None => (None, false),
        };
        self.sync_id = sync_id;

        let mut applied = Vec::new();
        for member in members {
            if let PresenceOutcome::Applied(m) = self.apply(member) {
                applied.push(m);
            }
        }

        if !more_pages {
            self.end_sync();
        }
        applied
    }

    fn end_sync(&mut self) {
        // Members the sync never confirmed are no longer present.
        for key in self.residual.drain() {
            debug!(client_id = %key.0, member_id = %key.1, "removing member absent from sync");
            self.members.remove(&key);
        }
        self.departed.clear();
        self.sync_status = SyncStatus::Complete;
        self.sync_id = None;
    }
}

impl Default for PresenceMap {
    fn default() -> Self {
        Self::new()
    }
}
