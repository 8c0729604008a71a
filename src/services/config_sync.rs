//! Keeps the `config` partition aligned with the authoritative quiz configuration.

use serde::Serialize;
use serde_json::{Map, Value};
use tracing::{debug, info, warn};
use utoipa::ToSchema;

use crate::{
    config::QuizConfig,
    dao::{
        remote_store::{Partition, RemoteStore},
        storage::{StoreError, StoreResult},
    },
    services::auth::AuthSession,
};

/// One top-level field whose remote value differs from the app value.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ConfigDifference {
    pub field: String,
    /// `None` when the field is missing remotely.
    pub remote: Option<Value>,
    /// `None` when the remote holds a field the app does not know.
    pub app: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ConfigComparison {
    pub is_different: bool,
    pub differences: Vec<ConfigDifference>,
}

/// What [`sync_config`] did.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(tag = "status", rename_all = "kebab-case")]
pub enum SyncOutcome {
    /// Nothing was written; not an error.
    Skipped { reason: String },
    /// The remote mirror was missing and has been written.
    Initialized,
    /// The remote mirror was overwritten.
    Updated { differences: Vec<ConfigDifference> },
    NoChange,
}

/// The authoritative configuration: file defaults plus environment overrides.
pub fn current_app_config() -> QuizConfig {
    QuizConfig::load()
}

/// Compare field by field. Scalars compare by equality, nested objects by deep value equality.
pub fn compare_configs(remote: &Value, app: &QuizConfig) -> ConfigComparison {
    let app = match serde_json::to_value(app) {
        Ok(Value::Object(map)) => map,
        _ => Map::new(),
    };
    let empty = Map::new();
    let remote = remote.as_object().unwrap_or(&empty);

    let mut differences: Vec<ConfigDifference> = app
        .iter()
        .filter(|(field, value)| remote.get(*field) != Some(*value))
        .map(|(field, value)| ConfigDifference {
            field: field.clone(),
            remote: remote.get(field).cloned(),
            app: Some(value.clone()),
        })
        .collect();
    differences.extend(
        remote
            .iter()
            .filter(|(field, _)| !app.contains_key(*field))
            .map(|(field, value)| ConfigDifference {
                field: field.clone(),
                remote: Some(value.clone()),
                app: None,
            }),
    );

    ConfigComparison {
        is_different: !differences.is_empty(),
        differences,
    }
}

/// Reconcile the remote mirror with `app`. Safe to run repeatedly.
pub async fn sync_config(
    store: &dyn RemoteStore,
    auth: &dyn AuthSession,
    app: &QuizConfig,
) -> StoreResult<SyncOutcome> {
    let Some(identity) = auth.current_user() else {
        debug!("no authenticated identity; config sync skipped");
        return Ok(skipped("not authenticated"));
    };

    match reconcile(store, app).await {
        Ok(outcome) => {
            info!(host = %identity.id, outcome = ?outcome, "config sync finished");
            Ok(outcome)
        }
        Err(StoreError::PermissionDenied { path }) => {
            warn!(host = %identity.id, %path, "config sync not permitted; skipped");
            Ok(skipped("permission denied"))
        }
        Err(err) => Err(err),
    }
}

async fn reconcile(store: &dyn RemoteStore, app: &QuizConfig) -> StoreResult<SyncOutcome> {
    let path = Partition::Config.path();
    let app_value = serde_json::to_value(app).map_err(|err| StoreError::Malformed {
        path: path.to_string(),
        message: err.to_string(),
    })?;

    let Some(remote) = store.read(path).await? else {
        store.write(path, app_value).await?;
        return Ok(SyncOutcome::Initialized);
    };

    let comparison = compare_configs(&remote, app);
    if !comparison.is_different {
        return Ok(SyncOutcome::NoChange);
    }

    store.write(path, app_value).await?;
    Ok(SyncOutcome::Updated {
        differences: comparison.differences,
    })
}

fn skipped(reason: &str) -> SyncOutcome {
    SyncOutcome::Skipped {
        reason: reason.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::{dao::remote_store::memory::MemoryStore, services::auth::StaticAuth};

    fn host() -> StaticAuth {
        StaticAuth::new(Some("host-1".into()))
    }

    #[test]
    fn identical_configs_do_not_differ() {
        let config = QuizConfig::default();
        let remote = serde_json::to_value(&config).unwrap();
        assert!(!compare_configs(&remote, &config).is_different);
    }

    #[test]
    fn nested_changes_are_reported_per_top_level_field() {
        let config = QuizConfig::default();
        let mut remote = serde_json::to_value(&config).unwrap();
        remote["lifelines"]["fiftyFifty"] = json!(false);
        remote["legacy"] = json!(1);

        let comparison = compare_configs(&remote, &config);
        let fields: Vec<_> = comparison.differences.iter().map(|d| d.field.as_str()).collect();
        assert_eq!(fields, vec!["lifelines", "legacy"]);
    }

    #[tokio::test]
    async fn sync_initializes_then_settles() {
        let store = MemoryStore::new();
        let config = QuizConfig::default();

        let first = sync_config(&store, &host(), &config).await.unwrap();
        assert_eq!(first, SyncOutcome::Initialized);
        let second = sync_config(&store, &host(), &config).await.unwrap();
        assert_eq!(second, SyncOutcome::NoChange);

        let changed = QuizConfig {
            max_teams: 3,
            ..config
        };
        let third = sync_config(&store, &host(), &changed).await.unwrap();
        assert!(matches!(third, SyncOutcome::Updated { differences } if differences.len() == 1));
        let stored = store.read("config").await.unwrap().unwrap();
        assert_eq!(stored["maxTeams"], 3);
    }

    #[tokio::test]
    async fn anonymous_and_denied_syncs_are_skipped() {
        let store = MemoryStore::new();
        let config = QuizConfig::default();

        let anonymous = sync_config(&store, &StaticAuth::anonymous(), &config)
            .await
            .unwrap();
        assert!(matches!(anonymous, SyncOutcome::Skipped { .. }));

        store.deny("config");
        let denied = sync_config(&store, &host(), &config).await.unwrap();
        assert!(matches!(denied, SyncOutcome::Skipped { reason } if reason == "permission denied"));
        store.allow("config");
        assert!(store.read("config").await.unwrap().is_none());
    }
}
