use serde::Serialize;
use utoipa::ToSchema;

use crate::state::sync::SyncedSnapshot;

/// Coarse service state reported by `/healthcheck`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "kebab-case")]
pub enum HealthStatus {
    /// Store attached and every partition delivered.
    Ok,
    /// Store attached, some partitions still loading.
    Syncing,
    /// No store; host actions fail with 503.
    Degraded,
}

/// Body of the `/healthcheck` route.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: HealthStatus,
    /// Result of the last store probe.
    pub store_reachable: bool,
    /// Partitions that have not delivered their first value yet.
    pub pending_partitions: Vec<String>,
    /// Partitions whose last delivery failed.
    pub failing_partitions: Vec<String>,
    pub generation: u64,
}

impl HealthResponse {
    pub fn from_snapshot(snapshot: &SyncedSnapshot, store_reachable: bool) -> Self {
        let pending_partitions: Vec<String> = snapshot
            .pending()
            .map(|partition| partition.path().to_string())
            .collect();
        let status = if pending_partitions.is_empty() {
            HealthStatus::Ok
        } else {
            HealthStatus::Syncing
        };
        Self {
            status,
            store_reachable,
            pending_partitions,
            failing_partitions: snapshot
                .errors
                .keys()
                .map(|partition| partition.path().to_string())
                .collect(),
            generation: snapshot.generation,
        }
    }

    pub fn degraded() -> Self {
        Self {
            status: HealthStatus::Degraded,
            store_reachable: false,
            pending_partitions: Vec::new(),
            failing_partitions: Vec::new(),
            generation: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dao::remote_store::Partition;

    #[test]
    fn syncing_until_every_partition_delivered() {
        let mut snapshot = SyncedSnapshot::default();
        snapshot.loaded.insert(Partition::GameState);
        let health = HealthResponse::from_snapshot(&snapshot, true);
        assert_eq!(health.status, HealthStatus::Syncing);
        assert_eq!(health.pending_partitions.len(), Partition::ALL.len() - 1);

        snapshot.loaded.extend(Partition::ALL);
        let health = HealthResponse::from_snapshot(&snapshot, true);
        assert_eq!(health.status, HealthStatus::Ok);
        assert!(health.pending_partitions.is_empty());
    }
}
