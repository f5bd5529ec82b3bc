//! Queue repository: durable topic storage with per-group leases.
//!
//! Messages are append-only rows in `queue_messages`. Each consumer group
//! tracks its own progress in `queue_deliveries`; a message is visible to a
//! group while it has no delivery row, or while its delivery is unacked and
//! the lease has run out.

use rusqlite::{params, OptionalExtension, Transaction, TransactionBehavior};

use super::{Database, DatabaseError};

/// A message handed to a consumer together with its lease.
#[derive(Debug, Clone, PartialEq)]
pub struct ClaimedMessage {
    pub message_id: i64,
    pub payload: String,
    /// Number of times this group has received the message, including this one.
    pub attempts: u32,
}

/// Appends a message to a topic and returns its id.
pub fn insert_message(
    db: &Database,
    topic: &str,
    payload: &str,
    created_at: &str,
) -> Result<i64, DatabaseError> {
    db.with_conn(|conn| {
        conn.execute(
            "INSERT INTO queue_messages (topic, payload, created_at) VALUES (?1, ?2, ?3)",
            params![topic, payload, created_at],
        )?;
        Ok(conn.last_insert_rowid())
    })
}

/// Claims the oldest visible message of `topic` for `group_id`, leasing it
/// until `lease_until_ms`.
pub fn claim_next(
    db: &Database,
    topic: &str,
    group_id: &str,
    consumer: &str,
    now_ms: i64,
    lease_until_ms: i64,
) -> Result<Option<ClaimedMessage>, DatabaseError> {
    db.with_conn(|conn| {
        // IMMEDIATE takes the write lock up front so two processes cannot
        // claim the same row.
        let tx = Transaction::new_unchecked(conn, TransactionBehavior::Immediate)?;
        let candidate = tx
            .query_row(
                "SELECT m.id, m.payload, COALESCE(d.attempts, 0)
                 FROM queue_messages m
                 LEFT JOIN queue_deliveries d
                   ON d.message_id = m.id AND d.group_id = ?2
                 WHERE m.topic = ?1
                   AND (d.message_id IS NULL
                        OR (d.acked_at IS NULL AND d.lease_until_ms <= ?3))
                 ORDER BY m.id
                 LIMIT 1",
                params![topic, group_id, now_ms],
                |r| Ok((r.get::<_, i64>(0)?, r.get::<_, String>(1)?, r.get::<_, u32>(2)?)),
            )
            .optional()?;

        let Some((message_id, payload, previous_attempts)) = candidate else {
            return Ok(None);
        };

        tx.execute(
            "INSERT INTO queue_deliveries (message_id, group_id, consumer, lease_until_ms, attempts)
             VALUES (?1, ?2, ?3, ?4, 1)
             ON CONFLICT (message_id, group_id) DO UPDATE SET
                consumer = excluded.consumer,
                lease_until_ms = excluded.lease_until_ms,
                attempts = queue_deliveries.attempts + 1",
            params![message_id, group_id, consumer, lease_until_ms],
        )?;
        tx.commit()?;

        Ok(Some(ClaimedMessage {
            message_id,
            payload,
            attempts: previous_attempts + 1,
        }))
    })
}

/// Marks a delivery as done for the group. Returns `false` if no delivery row exists.
pub fn ack(
    db: &Database,
    message_id: i64,
    group_id: &str,
    acked_at: &str,
) -> Result<bool, DatabaseError> {
    db.with_conn(|conn| {
        let changed = conn.execute(
            "UPDATE queue_deliveries SET acked_at = COALESCE(acked_at, ?3)
             WHERE message_id = ?1 AND group_id = ?2",
            params![message_id, group_id, acked_at],
        )?;
        Ok(changed == 1)
    })
}

/// Shortens (or extends) the lease of an unacked delivery so the message
/// becomes visible again at `visible_at_ms`.
pub fn release(
    db: &Database,
    message_id: i64,
    group_id: &str,
    visible_at_ms: i64,
) -> Result<bool, DatabaseError> {
    db.with_conn(|conn| {
        let changed = conn.execute(
            "UPDATE queue_deliveries SET lease_until_ms = ?3
             WHERE message_id = ?1 AND group_id = ?2 AND acked_at IS NULL",
            params![message_id, group_id, visible_at_ms],
        )?;
        Ok(changed == 1)
    })
}

/// Counts messages of `topic` the group has not acknowledged yet.
pub fn unacked_count(db: &Database, topic: &str, group_id: &str) -> Result<u64, DatabaseError> {
    db.with_conn(|conn| {
        let count: u64 = conn.query_row(
            "SELECT COUNT(*) FROM queue_messages m
             LEFT JOIN queue_deliveries d
               ON d.message_id = m.id AND d.group_id = ?2
             WHERE m.topic = ?1 AND d.acked_at IS NULL",
            params![topic, group_id],
            |r| r.get(0),
        )?;
        Ok(count)
    })
}
