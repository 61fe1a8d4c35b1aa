//! Leader election via a Postgres advisory lock (spec.md §4.11, resolved in
//! SPEC_FULL.md §9: chosen over a separate consensus layer since this host
//! already relies on the shared DB for row-level locking).

use sqlx::pool::PoolConnection;
use sqlx::{PgPool, Postgres};
use tokio::sync::Mutex;
use tracing::{info, warn};

/// Fixed advisory lock key for the refresh scheduler. A single `bigint`
/// namespace is enough since one process hosts the whole job queue.
const LEADER_LOCK_KEY: i64 = 0x6361_7461_6c6f_6731; // "catalog1" packed into 8 bytes, arbitrary but stable

/// `pg_try_advisory_lock`/`pg_advisory_unlock` are session-scoped: the lock
/// lives on whichever physical connection ran the acquire query, and only
/// that same connection can release it. Checking out a connection per query
/// from the general pool would acquire and release on different sessions,
/// so the connection that wins the lock is held here for as long as
/// leadership lasts rather than returned to the pool in between.
pub struct LeaderElection {
    pool: PgPool,
    held: Mutex<Option<PoolConnection<Postgres>>>,
}

impl LeaderElection {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            held: Mutex::new(None),
        }
    }

    /// Attempts to (re)acquire leadership, checking out a dedicated
    /// connection and keeping it reserved for the duration of the hold so
    /// `release` can unlock on the same session that acquired it.
    pub async fn try_acquire(&self) -> bool {
        let mut held = self.held.lock().await;
        if held.is_some() {
            return true;
        }

        let mut conn = match self.pool.acquire().await {
            Ok(conn) => conn,
            Err(e) => {
                warn!(error = %e, "failed to acquire dedicated connection for leader election");
                return false;
            }
        };

        match sqlx::query_scalar::<_, bool>("SELECT pg_try_advisory_lock($1)")
            .bind(LEADER_LOCK_KEY)
            .fetch_one(&mut *conn)
            .await
        {
            Ok(true) => {
                info!("acquired refresh scheduler leadership");
                *held = Some(conn);
                true
            }
            Ok(false) => false,
            Err(e) => {
                warn!(error = %e, "leader election query failed; assuming not leader");
                false
            }
        }
    }

    pub async fn release(&self) {
        let mut held = self.held.lock().await;
        let Some(mut conn) = held.take() else {
            return;
        };

        let _ = sqlx::query("SELECT pg_advisory_unlock($1)")
            .bind(LEADER_LOCK_KEY)
            .execute(&mut *conn)
            .await;
        // `conn` drops here, returning the connection to the pool.
    }
}
