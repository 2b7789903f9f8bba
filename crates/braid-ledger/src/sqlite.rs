//! SQLite implementation of the ledger traits.
//!
//! The durable backend. Uses rusqlite with bundled SQLite; every call runs on
//! `tokio::task::spawn_blocking` so readers never stall the async runtime.

use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension};

use braid_core::{
    canonical_bytes, decode_snapshot, NodeId, RoundGraph, RoundNumber, Snapshot,
    SnapshotWithTopologicalOrder, SyncPoint, TopologicalOrder,
};

use crate::error::{LedgerError, Result};
use crate::migration::{self, now_millis};
use crate::traits::{AppendResult, Ledger, LedgerWriter};

/// SQLite-based ledger.
///
/// Thread-safe via an internal Mutex around the single connection.
#[derive(Clone)]
pub struct SqliteLedger {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteLedger {
    /// Open a SQLite database at the given path.
    ///
    /// Creates the file and runs migrations if needed.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let mut conn = Connection::open(path)?;
        migration::migrate(&mut conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Open an in-memory SQLite database.
    pub fn open_memory() -> Result<Self> {
        let mut conn = Connection::open_in_memory()?;
        migration::migrate(&mut conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Run `f` against the connection on the blocking pool.
    async fn with_conn<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = self.conn.clone();
        tokio::task::spawn_blocking(move || {
            let mut conn = conn.lock().map_err(|_| LedgerError::Poisoned)?;
            f(&mut conn)
        })
        .await
        .map_err(|e| LedgerError::Task(e.to_string()))?
    }
}

fn to_sql_int(n: u64, field: &str) -> Result<i64> {
    i64::try_from(n).map_err(|_| LedgerError::InvalidData(format!("{} {} exceeds i64", field, n)))
}

fn from_sql_int(n: i64, field: &str) -> Result<u64> {
    u64::try_from(n).map_err(|_| LedgerError::InvalidData(format!("negative {}: {}", field, n)))
}

fn node_from_blob(blob: Vec<u8>) -> Result<NodeId> {
    NodeId::try_from(blob.as_slice())
        .map_err(|_| LedgerError::InvalidData(format!("node_id of {} bytes", blob.len())))
}

fn decode_rows(rows: Vec<(i64, Vec<u8>)>) -> Result<Vec<SnapshotWithTopologicalOrder>> {
    rows.into_iter()
        .map(|(order, canonical)| {
            let snapshot = decode_snapshot(&canonical)?;
            Ok(SnapshotWithTopologicalOrder::new(
                snapshot,
                from_sql_int(order, "topological_order")?,
            ))
        })
        .collect()
}

fn upsert_member(conn: &Connection, node_id: &NodeId, active: bool) -> Result<()> {
    conn.execute(
        "INSERT INTO nodes (node_id, active, updated_at) VALUES (?1, ?2, ?3)
         ON CONFLICT(node_id) DO UPDATE SET active = excluded.active, updated_at = excluded.updated_at",
        params![node_id.as_bytes().as_slice(), active as i64, now_millis()],
    )?;
    Ok(())
}

#[async_trait]
impl Ledger for SqliteLedger {
    async fn build_graph(&self) -> Result<RoundGraph> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT n.node_id, COALESCE(MAX(s.round_number), 0)
                 FROM nodes n LEFT JOIN snapshots s ON s.node_id = n.node_id
                 WHERE n.active = 1
                 GROUP BY n.node_id",
            )?;
            let rows = stmt
                .query_map([], |row| Ok((row.get::<_, Vec<u8>>(0)?, row.get::<_, i64>(1)?)))?
                .collect::<rusqlite::Result<Vec<_>>>()?;

            let mut points = Vec::with_capacity(rows.len());
            for (node, round) in rows {
                points.push(SyncPoint::new(
                    node_from_blob(node)?,
                    from_sql_int(round, "round_number")?,
                ));
            }
            Ok(RoundGraph::from_points(points))
        })
        .await
    }

    async fn read_all_nodes(&self) -> Result<Vec<NodeId>> {
        self.with_conn(|conn| {
            let mut stmt =
                conn.prepare("SELECT node_id FROM nodes WHERE active = 1 ORDER BY node_id")?;
            let rows = stmt
                .query_map([], |row| row.get::<_, Vec<u8>>(0))?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            rows.into_iter().map(node_from_blob).collect()
        })
        .await
    }

    async fn read_snapshots_for_node_round(
        &self,
        node_id: &NodeId,
        round: RoundNumber,
    ) -> Result<Vec<SnapshotWithTopologicalOrder>> {
        let node_id = *node_id;
        let round = to_sql_int(round, "round_number")?;

        self.with_conn(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT topological_order, canonical FROM snapshots
                 WHERE node_id = ?1 AND round_number = ?2
                 ORDER BY topological_order",
            )?;
            let rows = stmt
                .query_map(params![node_id.as_bytes().as_slice(), round], |row| {
                    Ok((row.get(0)?, row.get(1)?))
                })?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            decode_rows(rows)
        })
        .await
    }

    async fn read_snapshots_since_topology(
        &self,
        offset: TopologicalOrder,
        limit: usize,
    ) -> Result<Vec<SnapshotWithTopologicalOrder>> {
        let offset = to_sql_int(offset, "offset")?;
        let limit = to_sql_int(limit as u64, "limit")?;

        self.with_conn(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT topological_order, canonical FROM snapshots
                 WHERE topological_order > ?1
                 ORDER BY topological_order
                 LIMIT ?2",
            )?;
            let rows = stmt
                .query_map(params![offset, limit], |row| Ok((row.get(0)?, row.get(1)?)))?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            decode_rows(rows)
        })
        .await
    }
}

#[async_trait]
impl LedgerWriter for SqliteLedger {
    async fn append_snapshot(&self, snapshot: &Snapshot) -> Result<AppendResult> {
        let hash = snapshot.compute_hash();
        let canonical = canonical_bytes(snapshot);
        let node_id = snapshot.node_id;
        let round = to_sql_int(snapshot.round_number, "round_number")?;

        self.with_conn(move |conn| {
            let tx = conn.transaction()?;

            let existing: Option<i64> = tx
                .query_row(
                    "SELECT topological_order FROM snapshots WHERE hash = ?1",
                    params![hash.as_bytes().as_slice()],
                    |row| row.get(0),
                )
                .optional()?;

            if let Some(order) = existing {
                return Ok(AppendResult::AlreadyExists(from_sql_int(
                    order,
                    "topological_order",
                )?));
            }

            tx.execute(
                "INSERT INTO snapshots (hash, node_id, round_number, canonical, persisted_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    hash.as_bytes().as_slice(),
                    node_id.as_bytes().as_slice(),
                    round,
                    canonical,
                    now_millis(),
                ],
            )?;
            let order = tx.last_insert_rowid();

            tx.execute(
                "INSERT OR IGNORE INTO nodes (node_id, active, updated_at) VALUES (?1, 1, ?2)",
                params![node_id.as_bytes().as_slice(), now_millis()],
            )?;

            tx.commit()?;
            Ok(AppendResult::Appended(from_sql_int(order, "topological_order")?))
        })
        .await
    }

    async fn add_node(&self, node_id: &NodeId) -> Result<()> {
        let node_id = *node_id;
        self.with_conn(move |conn| upsert_member(conn, &node_id, true))
            .await
    }

    async fn remove_node(&self, node_id: &NodeId) -> Result<()> {
        let node_id = *node_id;
        self.with_conn(move |conn| upsert_member(conn, &node_id, false))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(b: u8) -> NodeId {
        NodeId::from_bytes([b; 32])
    }

    #[tokio::test]
    async fn test_sqlite_append_and_read_back() {
        let ledger = SqliteLedger::open_memory().unwrap();
        let s = Snapshot::new(node(1), 3, b"hello".to_vec()).with_timestamp(42);

        let result = ledger.append_snapshot(&s).await.unwrap();
        assert_eq!(result, AppendResult::Appended(1));

        let round = ledger.read_snapshots_for_node_round(&node(1), 3).await.unwrap();
        assert_eq!(round.len(), 1);
        assert_eq!(round[0].snapshot, s);
        assert_eq!(round[0].topological_order, 1);
    }

    #[tokio::test]
    async fn test_sqlite_idempotent_append() {
        let ledger = SqliteLedger::open_memory().unwrap();
        let s = Snapshot::new(node(1), 3, b"hello".to_vec());
        ledger.append_snapshot(&s).await.unwrap();
        let again = ledger.append_snapshot(&s).await.unwrap();
        assert_eq!(again, AppendResult::AlreadyExists(1));
    }

    #[tokio::test]
    async fn test_sqlite_since_topology() {
        let ledger = SqliteLedger::open_memory().unwrap();
        for round in 0..6 {
            ledger
                .append_snapshot(&Snapshot::new(node(2), round, vec![round as u8]))
                .await
                .unwrap();
        }

        let batch = ledger.read_snapshots_since_topology(2, 3).await.unwrap();
        let orders: Vec<_> = batch.iter().map(|s| s.topological_order).collect();
        assert_eq!(orders, vec![3, 4, 5]);
    }

    #[tokio::test]
    async fn test_sqlite_graph_and_membership() {
        let ledger = SqliteLedger::open_memory().unwrap();
        ledger.append_snapshot(&Snapshot::new(node(1), 2, vec![1])).await.unwrap();
        ledger.append_snapshot(&Snapshot::new(node(1), 9, vec![2])).await.unwrap();
        ledger.add_node(&node(5)).await.unwrap();

        let graph = ledger.build_graph().await.unwrap();
        assert_eq!(graph.round_of(&node(1)), 9);
        assert!(graph.contains(&node(5)));

        ledger.remove_node(&node(1)).await.unwrap();
        assert_eq!(ledger.read_all_nodes().await.unwrap(), vec![node(5)]);
        assert!(!ledger.build_graph().await.unwrap().contains(&node(1)));
    }

    #[tokio::test]
    async fn test_sqlite_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ledger.db");

        {
            let ledger = SqliteLedger::open(&path).unwrap();
            ledger.append_snapshot(&Snapshot::new(node(1), 1, vec![7])).await.unwrap();
        }

        let ledger = SqliteLedger::open(&path).unwrap();
        let all = ledger.read_snapshots_since_topology(0, 10).await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].snapshot.payload.as_ref(), &[7]);
    }
}
