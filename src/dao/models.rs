use std::collections::BTreeMap;

use indexmap::IndexMap;
use serde::{Deserialize, de::DeserializeOwned};
use serde_json::Value;

use crate::{
    dao::{
        remote_store::Partition,
        storage::{StoreError, StoreResult},
    },
    state::game::{QuestionSetId, QuestionSetMetadata, Team, TeamId},
};

/// Decode the raw value of a partition, keeping `None` for absent paths.
pub fn decode<T>(partition: Partition, value: Option<Value>) -> StoreResult<Option<T>>
where
    T: DeserializeOwned,
{
    value
        .map(|value| {
            serde_json::from_value(value).map_err(|err| StoreError::Malformed {
                path: partition.path().to_string(),
                message: err.to_string(),
            })
        })
        .transpose()
}

/// Raw `teams` partition: team id to team document.
pub type TeamsEntity = BTreeMap<TeamId, Team>;

/// Order teams by creation time (then id) and make each team's id match its key.
pub fn teams_from_entity(entity: TeamsEntity) -> IndexMap<TeamId, Team> {
    let mut teams: Vec<Team> = entity
        .into_iter()
        .map(|(id, mut team)| {
            team.id = id;
            team
        })
        .collect();
    teams.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
    teams.into_iter().map(|team| (team.id.clone(), team)).collect()
}

/// Raw `question-sets` partition: set id to metadata.
pub type QuestionSetsEntity = BTreeMap<QuestionSetId, QuestionSetMetadata>;

pub fn question_sets_from_entity(
    entity: QuestionSetsEntity,
) -> IndexMap<QuestionSetId, QuestionSetMetadata> {
    entity
        .into_iter()
        .map(|(id, mut metadata)| {
            metadata.id = id.clone();
            (id, metadata)
        })
        .collect()
}

/// Raw `allowed-hosts` partition. Stored either as a list of identities or as a map whose
/// values are identities (or `true`, in which case the key is the identity).
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum AllowedHostsEntity {
    List(Vec<Option<String>>),
    Map(BTreeMap<String, Value>),
}

impl AllowedHostsEntity {
    pub fn into_hosts(self) -> Vec<String> {
        let mut hosts: Vec<String> = match self {
            AllowedHostsEntity::List(items) => items.into_iter().flatten().collect(),
            AllowedHostsEntity::Map(entries) => entries
                .into_iter()
                .filter_map(|(key, value)| match value {
                    Value::String(host) => Some(host),
                    Value::Bool(true) => Some(key),
                    _ => None,
                })
                .collect(),
        };
        for host in &mut hosts {
            *host = host.trim().to_lowercase();
        }
        hosts.retain(|host| !host.is_empty());
        hosts.sort();
        hosts.dedup();
        hosts
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn teams_are_ordered_by_creation_and_keyed_by_path() {
        let entity: TeamsEntity = serde_json::from_value(json!({
            "b": {"name": "Bees", "createdAt": 1},
            "a": {"id": "stale", "name": "Ants", "createdAt": 2},
        }))
        .unwrap();
        let teams = teams_from_entity(entity);
        let ids: Vec<_> = teams.keys().cloned().collect();
        assert_eq!(ids, vec!["b".to_string(), "a".to_string()]);
        assert_eq!(teams["a"].id, "a");
    }

    #[test]
    fn allowed_hosts_accept_lists_and_maps() {
        let list: AllowedHostsEntity =
            serde_json::from_value(json!(["Host@Example.com", null])).unwrap();
        assert_eq!(list.into_hosts(), vec!["host@example.com".to_string()]);

        let map: AllowedHostsEntity =
            serde_json::from_value(json!({"k1": "a@b.c", "panel-2": true, "x": false})).unwrap();
        assert_eq!(
            map.into_hosts(),
            vec!["a@b.c".to_string(), "panel-2".to_string()]
        );
    }

    #[test]
    fn malformed_partitions_are_reported_with_their_path() {
        let err = decode::<TeamsEntity>(Partition::Teams, Some(json!(42))).unwrap_err();
        assert!(matches!(err, StoreError::Malformed { path, .. } if path == "teams"));
        assert!(decode::<TeamsEntity>(Partition::Teams, None).unwrap().is_none());
    }
}
