//! Fleet leader election over shared sidecar files.
//!
//! Every node persists two small JSON records alongside the index
//! location, named deterministically by machine identity so a restarted
//! node recognizes its own leftovers:
//!
//! - an **announce record** (`<id>.announce.json`), always written,
//!   refreshed periodically — fleet membership is enumerable from these
//!   alone;
//! - a **leader record** (`<id>.leader.json`), written only by the
//!   leader; its existence designates which node may hold the write
//!   handle.
//!
//! The election is a best-effort filesystem race, not linearizable
//! consensus: after creating its leader record a candidate re-checks
//! visibility exactly once, and two nodes can briefly both believe they
//! lead inside that window. The fleet converges because a losing
//! candidate removes its own record, ambiguity is conservatively treated
//! as non-leader, and records past the staleness cutoff are reaped on the
//! next evaluation (which is how a crashed leader is recovered).

use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, SystemTime};

use replisearch_core::error::{ReplicaError, ReplicaResult};
use replisearch_core::traits::Directory;
use serde::{Deserialize, Serialize};
use std::io::{Read, Write};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// File-name suffix of per-node announce records.
pub const ANNOUNCE_SUFFIX: &str = ".announce.json";

/// File-name suffix of leader lock records.
pub const LEADER_SUFFIX: &str = ".leader.json";

// ─── Records ────────────────────────────────────────────────────────────────

/// Per-node announce record: membership and heartbeat.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeRecord {
    /// Stable identity of the node.
    pub machine_id: String,
    /// When the node first announced (Unix millis).
    pub created_at_ms: u64,
    /// Last heartbeat (Unix millis).
    pub updated_at_ms: u64,
    /// Whether the node believed itself leader at the last write.
    pub is_leader: bool,
}

/// Cluster-wide leader record; its existence designates the leader.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeaderRecord {
    /// Identity of the owning node.
    pub machine_id: String,
    /// When the record was created or last renewed (Unix millis).
    pub created_at_ms: u64,
}

/// Outcome of one election evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LeaderState {
    /// This node's leader record is the only one visible.
    Leader,
    /// Another node's leader record is visible, or this node lost the race.
    Follower,
    /// More than one leader record survived stale cleanup; treated as
    /// non-leader until the fleet converges.
    Ambiguous {
        /// Number of leader records observed.
        records: usize,
    },
}

impl LeaderState {
    #[must_use]
    pub const fn is_leader(self) -> bool {
        matches!(self, Self::Leader)
    }
}

// ─── Executive ──────────────────────────────────────────────────────────────

/// Decides whether this node may hold the write handle.
///
/// Consulted before any write handle is requested; `is_leader`
/// re-evaluates the race only when the visible leader-record count is not
/// exactly one, and otherwise answers from whether the single record is
/// this node's own.
pub struct Executive {
    machine_id: String,
    records: Arc<dyn Directory>,
    staleness: Duration,
    /// Widens the window between observing zero leader records and
    /// creating our own, to exercise the race deterministically.
    race_pause: Duration,
    leader: AtomicBool,
    announced_at_ms: u64,
    /// Serializes in-process evaluations; distinct nodes race on purpose.
    evaluation: Mutex<()>,
}

impl std::fmt::Debug for Executive {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Executive")
            .field("machine_id", &self.machine_id)
            .field("records", &self.records.identity())
            .field("leader", &self.leader.load(Ordering::Acquire))
            .finish_non_exhaustive()
    }
}

impl Executive {
    /// Build an executive writing records into `records` (the shared
    /// master-side location) under `machine_id`.
    pub fn new(records: Arc<dyn Directory>, machine_id: impl Into<String>, staleness: Duration) -> Self {
        Self {
            machine_id: sanitize_machine_id(&machine_id.into()),
            records,
            staleness,
            race_pause: Duration::ZERO,
            leader: AtomicBool::new(false),
            announced_at_ms: now_ms(),
            evaluation: Mutex::new(()),
        }
    }

    /// Widen the create/re-check race window. Zero (the default) in
    /// production; tests raise it to force contention.
    #[must_use]
    pub fn with_race_pause(mut self, pause: Duration) -> Self {
        self.race_pause = pause;
        self
    }

    /// This node's sanitized identity.
    #[must_use]
    pub fn machine_id(&self) -> &str {
        &self.machine_id
    }

    /// Announce this node and run the first election evaluation.
    pub fn start(&self) -> ReplicaResult<LeaderState> {
        self.write_announce(false)?;
        let state = self.evaluate()?;
        info!(
            target: "replisearch",
            machine_id = %self.machine_id,
            ?state,
            "node announced and election evaluated"
        );
        Ok(state)
    }

    /// Whether this node currently holds leadership.
    pub fn is_leader(&self) -> ReplicaResult<bool> {
        Ok(self.current_state()?.is_leader())
    }

    /// Leadership check for write paths: `Ok` only when this node is the
    /// unambiguous leader.
    pub fn require_leader(&self) -> ReplicaResult<()> {
        match self.current_state()? {
            LeaderState::Leader => Ok(()),
            LeaderState::Follower => Err(ReplicaError::NotLeader {
                machine_id: self.machine_id.clone(),
            }),
            LeaderState::Ambiguous { records } => Err(ReplicaError::ElectionAmbiguity { records }),
        }
    }

    /// Current leadership state, re-running the race only when the
    /// visible record count is not exactly one.
    pub fn current_state(&self) -> ReplicaResult<LeaderState> {
        let visible = self.visible_leader_records()?;
        if let [only] = visible.as_slice() {
            let mine = only.machine_id == self.machine_id;
            self.leader.store(mine, Ordering::Release);
            return Ok(if mine {
                LeaderState::Leader
            } else {
                LeaderState::Follower
            });
        }
        self.evaluate()
    }

    /// Heartbeat: renew the announce record, and renew the leader record
    /// when this node leads so it never trips the staleness cutoff. Also
    /// reaps announce records of nodes that stopped heartbeating.
    pub fn refresh(&self) -> ReplicaResult<()> {
        let leading = self.leader.load(Ordering::Acquire);
        self.write_announce(leading)?;
        if leading {
            self.write_leader_record()?;
        }
        self.purge_stale_announcements()?;
        debug!(
            target: "replisearch",
            machine_id = %self.machine_id,
            leading,
            "election records refreshed"
        );
        Ok(())
    }

    /// Give up leadership (shutdown path): remove this node's leader
    /// record so the next evaluation elsewhere can win cleanly.
    pub fn resign(&self) -> ReplicaResult<()> {
        self.records.delete(&self.leader_record_name(&self.machine_id))?;
        self.leader.store(false, Ordering::Release);
        self.write_announce(false)?;
        info!(target: "replisearch", machine_id = %self.machine_id, "leadership resigned");
        Ok(())
    }

    /// Fleet membership as announced via sidecar records.
    pub fn fleet(&self) -> ReplicaResult<Vec<NodeRecord>> {
        let mut nodes = Vec::new();
        for entry in self.records.list_all()? {
            if !entry.name.ends_with(ANNOUNCE_SUFFIX) {
                continue;
            }
            match self.read_json::<NodeRecord>(&entry.name) {
                Ok(Some(record)) => nodes.push(record),
                Ok(None) => {}
                Err(e) => warn!(
                    target: "replisearch",
                    record = %entry.name,
                    error = %e,
                    "unreadable announce record skipped"
                ),
            }
        }
        nodes.sort_by(|a, b| a.machine_id.cmp(&b.machine_id));
        Ok(nodes)
    }

    // ─── Race internals ─────────────────────────────────────────────────

    /// One full race evaluation: reap stale leader records, then decide
    /// from what remains. Creating our own record is followed by a single
    /// visibility re-check; a competitor appearing inside that window
    /// makes us stand down and remove the record we just wrote.
    fn evaluate(&self) -> ReplicaResult<LeaderState> {
        let _serialize = self
            .evaluation
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);

        self.purge_stale_leader_records()?;
        let visible = self.visible_leader_records()?;

        let state = match visible.len() {
            0 => {
                if !self.race_pause.is_zero() {
                    std::thread::sleep(self.race_pause);
                }
                self.write_leader_record()?;
                let recheck = self.visible_leader_records()?;
                let competitors = recheck
                    .iter()
                    .filter(|record| record.machine_id != self.machine_id)
                    .count();
                if competitors == 0 {
                    LeaderState::Leader
                } else {
                    warn!(
                        target: "replisearch",
                        machine_id = %self.machine_id,
                        competitors,
                        "competing leader record appeared during the race; standing down"
                    );
                    self.records
                        .delete(&self.leader_record_name(&self.machine_id))?;
                    LeaderState::Follower
                }
            }
            1 => {
                if visible[0].machine_id == self.machine_id {
                    // Our own record from before a restart, still fresh.
                    LeaderState::Leader
                } else {
                    LeaderState::Follower
                }
            }
            records => {
                warn!(
                    target: "replisearch",
                    machine_id = %self.machine_id,
                    records,
                    "multiple leader records after stale cleanup"
                );
                LeaderState::Ambiguous { records }
            }
        };

        let was_leader = self.leader.swap(state.is_leader(), Ordering::AcqRel);
        if was_leader != state.is_leader() {
            info!(
                target: "replisearch",
                machine_id = %self.machine_id,
                ?state,
                "leadership changed"
            );
        }
        self.write_announce(state.is_leader())?;
        Ok(state)
    }

    fn purge_stale_leader_records(&self) -> ReplicaResult<()> {
        for record in self.visible_leader_records()? {
            let age_ms = now_ms().saturating_sub(record.created_at_ms);
            if Duration::from_millis(age_ms) > self.staleness {
                warn!(
                    target: "replisearch",
                    owner = %record.machine_id,
                    age_ms,
                    "reaping stale leader record"
                );
                self.records
                    .delete(&self.leader_record_name(&record.machine_id))?;
            }
        }
        Ok(())
    }

    fn purge_stale_announcements(&self) -> ReplicaResult<()> {
        for node in self.fleet()? {
            if node.machine_id == self.machine_id {
                continue;
            }
            let age_ms = now_ms().saturating_sub(node.updated_at_ms);
            if Duration::from_millis(age_ms) > self.staleness {
                self.records
                    .delete(&format!("{}{ANNOUNCE_SUFFIX}", node.machine_id))?;
            }
        }
        Ok(())
    }

    /// Leader records currently visible in the shared location.
    ///
    /// A record that disappears between listing and reading is skipped (a
    /// concurrent purge got there first). A record that exists but does
    /// not parse is kept as a *foreign* record: deleting or ignoring
    /// something another node may be relying on would be the one
    /// non-conservative move available here.
    fn visible_leader_records(&self) -> ReplicaResult<Vec<LeaderRecord>> {
        let mut records = Vec::new();
        for entry in self.records.list_all()? {
            let Some(owner) = entry.name.strip_suffix(LEADER_SUFFIX) else {
                continue;
            };
            match self.read_json::<LeaderRecord>(&entry.name) {
                Ok(Some(record)) => records.push(record),
                Ok(None) => {}
                Err(e) => {
                    warn!(
                        target: "replisearch",
                        record = %entry.name,
                        error = %e,
                        "unparseable leader record treated as live and foreign"
                    );
                    records.push(LeaderRecord {
                        machine_id: owner.to_owned(),
                        created_at_ms: now_ms(),
                    });
                }
            }
        }
        Ok(records)
    }

    /// Read and parse one record. `Ok(None)` when the file vanished.
    fn read_json<T: serde::de::DeserializeOwned>(&self, name: &str) -> ReplicaResult<Option<T>> {
        let mut stream = match self.records.open_read(name) {
            Ok(stream) => stream,
            Err(ReplicaError::Transient { .. }) => return Ok(None),
            Err(e) => return Err(e),
        };
        let mut raw = String::new();
        stream.read_to_string(&mut raw)?;
        let parsed = serde_json::from_str(&raw).map_err(|e| ReplicaError::Corruption {
            path: name.to_owned(),
            detail: e.to_string(),
        })?;
        Ok(Some(parsed))
    }

    fn write_json<T: Serialize>(&self, name: &str, value: &T) -> ReplicaResult<()> {
        let json = serde_json::to_string_pretty(value)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        let mut stream = self.records.open_write(name)?;
        stream.write_all(json.as_bytes())?;
        stream.close()
    }

    fn write_announce(&self, is_leader: bool) -> ReplicaResult<()> {
        let record = NodeRecord {
            machine_id: self.machine_id.clone(),
            created_at_ms: self.announced_at_ms,
            updated_at_ms: now_ms(),
            is_leader,
        };
        self.write_json(&format!("{}{ANNOUNCE_SUFFIX}", self.machine_id), &record)
    }

    fn write_leader_record(&self) -> ReplicaResult<()> {
        let record = LeaderRecord {
            machine_id: self.machine_id.clone(),
            created_at_ms: now_ms(),
        };
        self.write_json(&self.leader_record_name(&self.machine_id), &record)
    }

    fn leader_record_name(&self, machine_id: &str) -> String {
        format!("{machine_id}{LEADER_SUFFIX}")
    }
}

// ─── Helpers ────────────────────────────────────────────────────────────────

/// Default machine identity: `REPLISEARCH_MACHINE_ID`, falling back to
/// the hostname, falling back to "unknown".
#[must_use]
pub fn default_machine_id() -> String {
    std::env::var("REPLISEARCH_MACHINE_ID")
        .or_else(|_| std::env::var("HOSTNAME"))
        .or_else(|_| std::env::var("HOST"))
        .unwrap_or_else(|_| "unknown".into())
}

/// Machine ids become file-name stems, so anything that is not a bare
/// name character is folded to '-'.
fn sanitize_machine_id(raw: &str) -> String {
    let cleaned: String = raw
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.' {
                c
            } else {
                '-'
            }
        })
        .collect();
    if cleaned.is_empty() {
        "unknown".into()
    } else {
        cleaned
    }
}

#[allow(clippy::cast_possible_truncation)]
fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}
