//! Thread Directory: the live list of chat threads and its recency grouping.

use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, TimeZone, Utc};
use serde::Serialize;

use aviary_core::types::{ChatThread, ThreadId};

/// Recency bucket a thread is listed under.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum RecencyBucket {
    Today,
    PastWeek,
    PastMonth,
    Older,
}

impl RecencyBucket {
    pub const ALL: [RecencyBucket; 4] = [
        RecencyBucket::Today,
        RecencyBucket::PastWeek,
        RecencyBucket::PastMonth,
        RecencyBucket::Older,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            RecencyBucket::Today => "Today",
            RecencyBucket::PastWeek => "Past Week",
            RecencyBucket::PastMonth => "Past Month",
            RecencyBucket::Older => "Older than 30 Days",
        }
    }

    /// Bucket for a creation time, judged by whole calendar days in the
    /// time zone of `now`. Future timestamps count as today.
    pub fn for_timestamp<Tz: TimeZone>(created_at: DateTime<Utc>, now: &DateTime<Tz>) -> Self {
        let created = created_at.with_timezone(&now.timezone()).date_naive();
        let days = (now.date_naive() - created).num_days();
        match days {
            d if d <= 0 => RecencyBucket::Today,
            1..=7 => RecencyBucket::PastWeek,
            8..=30 => RecencyBucket::PastMonth,
            _ => RecencyBucket::Older,
        }
    }
}

/// Threads sharing a recency bucket, in directory order.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ThreadGroup {
    pub bucket: RecencyBucket,
    pub threads: Vec<ChatThread>,
}

/// Partition threads into recency groups.
///
/// Groups come back in bucket order; empty buckets are omitted and the
/// input order is kept within each group.
pub fn group_by_recency<Tz: TimeZone>(threads: &[ChatThread], now: &DateTime<Tz>) -> Vec<ThreadGroup> {
    RecencyBucket::ALL
        .iter()
        .filter_map(|&bucket| {
            let members: Vec<ChatThread> = threads
                .iter()
                .filter(|t| RecencyBucket::for_timestamp(t.created_at, now) == bucket)
                .cloned()
                .collect();
            (!members.is_empty()).then(|| ThreadGroup {
                bucket,
                threads: members,
            })
        })
        .collect()
}

/// The local copy of the thread list, newest first.
#[derive(Debug, Default)]
pub struct ThreadDirectory {
    threads: Mutex<Vec<ChatThread>>,
}

impl ThreadDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<ChatThread>> {
        self.threads.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Replace the list with a snapshot.
    pub fn replace(&self, snapshot: Vec<ChatThread>) {
        *self.lock() = snapshot;
    }

    /// Add a thread created locally ahead of the next snapshot.
    pub fn insert(&self, thread: ChatThread) {
        let mut threads = self.lock();
        if !threads.iter().any(|t| t.id == thread.id) {
            threads.insert(0, thread);
        }
    }

    pub fn remove(&self, thread_id: &ThreadId) -> bool {
        let mut threads = self.lock();
        let before = threads.len();
        threads.retain(|t| &t.id != thread_id);
        threads.len() != before
    }

    pub fn threads(&self) -> Vec<ChatThread> {
        self.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// First thread whose title equals `title`.
    pub fn find_by_title(&self, title: &str) -> Option<ChatThread> {
        self.lock()
            .iter()
            .find(|t| t.title == title)
            .cloned()
    }

    pub fn grouped<Tz: TimeZone>(&self, now: &DateTime<Tz>) -> Vec<ThreadGroup> {
        group_by_recency(&self.threads(), now)
    }
}
