//! Serialization codec for the persistent mirror of the pending store.
//!
//! Each kind is stored as one record:
//!
//! ```text
//! {"version": 1, "entries": {"<dao>": {"<entity id>": { ...entity... }}}}
//! ```
//!
//! Integer fields are `TokenAmount`s and carry the `__@json.bigint__` wrapper.
//! Records without a `version` field predate the envelope and are migrated.

use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

use crate::models::{normalize_address, PendingEntity, PendingMap};

/// Schema version written by this build
pub const SCHEMA_VERSION: u64 = 1;

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("Corrupt cache: {0}")]
    CorruptCache(String),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}

#[derive(Serialize)]
struct Envelope<'a, E: PendingEntity> {
    version: u64,
    entries: &'a PendingMap<E>,
}

/// Encode a pending map into its persisted JSON text
pub fn encode<E: PendingEntity>(map: &PendingMap<E>) -> Result<String, CodecError> {
    let envelope = Envelope {
        version: SCHEMA_VERSION,
        entries: map,
    };
    Ok(serde_json::to_string(&envelope)?)
}

/// Decode persisted JSON text back into a pending map
pub fn decode<E: PendingEntity>(text: &str) -> Result<PendingMap<E>, CodecError> {
    let raw: Value = serde_json::from_str(text)
        .map_err(|e| CodecError::CorruptCache(format!("invalid JSON: {}", e)))?;

    let Value::Object(mut record) = raw else {
        return Err(CodecError::CorruptCache(
            "top-level value is not an object".to_string(),
        ));
    };

    let (version, entries) = match record.remove("version") {
        None => (0, Value::Object(record)),
        Some(v) => {
            let version = v.as_u64().ok_or_else(|| {
                CodecError::CorruptCache(format!("invalid version field: {}", v))
            })?;
            let entries = record
                .remove("entries")
                .ok_or_else(|| CodecError::CorruptCache("missing entries".to_string()))?;
            (version, entries)
        }
    };

    let entries = migrate(version, entries)?;
    let decoded: PendingMap<E> = serde_json::from_value(entries)
        .map_err(|e| CodecError::CorruptCache(format!("{} does not match schema: {}", E::KIND, e)))?;

    Ok(rekey(decoded))
}

/// Bring `entries` written at `version` up to `SCHEMA_VERSION`
pub fn migrate(version: u64, entries: Value) -> Result<Value, CodecError> {
    if version > SCHEMA_VERSION {
        return Err(CodecError::CorruptCache(format!(
            "unsupported schema version {} (this build reads up to {})",
            version, SCHEMA_VERSION
        )));
    }

    let mut current = entries;
    let mut at = version;
    while at < SCHEMA_VERSION {
        current = match at {
            0 => migrate_v0_to_v1(current)?,
            other => {
                return Err(CodecError::CorruptCache(format!(
                    "no migration registered for version {}",
                    other
                )))
            }
        };
        at += 1;
    }
    Ok(current)
}

// v0 stored DAO keys exactly as typed by the user
fn migrate_v0_to_v1(entries: Value) -> Result<Value, CodecError> {
    let Value::Object(daos) = entries else {
        return Err(CodecError::CorruptCache(
            "legacy record is not an object".to_string(),
        ));
    };

    let mut migrated = serde_json::Map::new();
    for (dao, items) in daos {
        let Value::Object(items) = items else {
            return Err(CodecError::CorruptCache(format!(
                "legacy entries for {} are not an object",
                dao
            )));
        };
        let slot = migrated
            .entry(normalize_address(&dao))
            .or_insert_with(|| Value::Object(serde_json::Map::new()));
        if let Value::Object(slot) = slot {
            slot.extend(items);
        }
    }
    Ok(Value::Object(migrated))
}

// Stored keys are advisory; the entity itself defines where it lives.
fn rekey<E: PendingEntity>(map: PendingMap<E>) -> PendingMap<E> {
    let mut out = PendingMap::new();
    for entity in map.into_values().flat_map(|entries| entries.into_values()) {
        out.entry(normalize_address(entity.dao_address()))
            .or_insert_with(Default::default)
            .insert(entity.entity_id(), entity);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::*;
    use chrono::{DateTime, Utc};
    use primitive_types::U256;

    fn ts(secs: i64) -> DateTime<Utc> {
        DateTime::from_timestamp(secs, 0).unwrap()
    }

    fn map_of<E: PendingEntity>(items: Vec<E>) -> PendingMap<E> {
        let mut map = PendingMap::new();
        for item in items {
            map.entry(normalize_address(item.dao_address()))
                .or_insert_with(DaoEntries::new)
                .insert(item.entity_id(), item);
        }
        map
    }

    fn huge() -> TokenAmount {
        // 2^255 + 12345
        TokenAmount((U256::one() << 255) + U256::from(12345u64))
    }

    fn sample_proposal() -> IndexedProposal {
        IndexedProposal {
            id: "0xdao_0x1".to_string(),
            dao_address: "0xdao".to_string(),
            creator: "0xcreator".to_string(),
            metadata: ProposalMetadata {
                title: "Fund the grants round".to_string(),
                summary: "Move funds".to_string(),
                description: None,
                resources: vec![],
            },
            settings: VotingSettings {
                support_threshold: 500_000,
                min_participation: 150_000,
                min_duration: 86_400,
            },
            start_date: ts(1_700_000_000),
            end_date: ts(1_700_086_400),
            created_at: ts(1_699_999_000),
            status: ProposalStatus::Pending,
            execution: None,
            voters: vec![],
            tally: Tally::default(),
            actions: vec![ProposalAction {
                to: "0xrecipient".to_string(),
                value: huge(),
                data: "0x".to_string(),
            }],
        }
    }

    #[test]
    fn test_vote_round_trip_with_256_bit_weight() {
        let map = map_of(vec![PendingVote {
            dao_address: "0xdao".to_string(),
            proposal_id: "P1".to_string(),
            voter: "0xA".to_string(),
            choice: VoteChoice::Yes,
            weight: huge(),
            replaced: false,
        }]);

        let text = encode(&map).unwrap();
        assert!(text.contains("__@json.bigint__"));
        assert!(text.starts_with(r#"{"version":1"#));

        let back: PendingMap<PendingVote> = decode(&text).unwrap();
        assert_eq!(back, map);
    }

    #[test]
    fn test_execution_round_trip() {
        let map = map_of(vec![PendingExecution {
            dao_address: "0xdao".to_string(),
            proposal_id: "P1".to_string(),
            tx_hash: "0xabc".to_string(),
            executed_at: ts(1_700_000_500),
        }]);

        let back: PendingMap<PendingExecution> = decode(&encode(&map).unwrap()).unwrap();
        assert_eq!(back, map);
    }

    #[test]
    fn test_proposal_round_trip() {
        let map = map_of(vec![PendingProposal {
            snapshot: sample_proposal(),
            tx_hash: Some("0xcreate".to_string()),
        }]);

        let back: PendingMap<PendingProposal> = decode(&encode(&map).unwrap()).unwrap();
        assert_eq!(back, map);
    }

    #[test]
    fn test_deposit_round_trip() {
        let map = map_of(vec![PendingDeposit {
            dao_address: "0xdao".to_string(),
            tx_id: "t1".to_string(),
            token: TokenInfo {
                address: "0xtoken".to_string(),
                symbol: "TKN".to_string(),
                decimals: 18,
            },
            amount: TokenAmount(U256::MAX),
            sender: "0xsender".to_string(),
            created_at: ts(1_700_000_000),
        }]);

        let back: PendingMap<PendingDeposit> = decode(&encode(&map).unwrap()).unwrap();
        assert_eq!(back, map);
    }

    #[test]
    fn test_malformed_text_is_corrupt() {
        for text in ["", "not json", "[1,2,3]", "42", r#"{"version":"one"}"#] {
            let result = decode::<PendingVote>(text);
            assert!(
                matches!(result, Err(CodecError::CorruptCache(_))),
                "expected CorruptCache for {:?}",
                text
            );
        }
    }

    #[test]
    fn test_schema_mismatch_is_corrupt() {
        let text = r#"{"version":1,"entries":{"0xdao":{"P1_0xa":{"voter":7}}}}"#;
        assert!(matches!(
            decode::<PendingVote>(text),
            Err(CodecError::CorruptCache(_))
        ));
    }

    #[test]
    fn test_newer_version_is_corrupt() {
        let text = r#"{"version":99,"entries":{}}"#;
        assert!(matches!(
            decode::<PendingVote>(text),
            Err(CodecError::CorruptCache(_))
        ));
    }

    #[test]
    fn test_legacy_record_is_migrated() {
        // No envelope, mixed-case DAO key, bare decimal weight
        let text = r#"{
            "0xDAO": {
                "P1_0xa": {
                    "dao_address": "0xDAO",
                    "proposal_id": "P1",
                    "voter": "0xA",
                    "choice": "yes",
                    "weight": "100"
                }
            }
        }"#;

        let map: PendingMap<PendingVote> = decode(text).unwrap();
        let vote = &map["0xdao"]["P1_0xa"];
        assert_eq!(vote.weight, TokenAmount::from(100u64));
        assert!(!vote.replaced);
    }

    #[test]
    fn test_decode_rekeys_entries_by_identity() {
        let text = r#"{"version":1,"entries":{"0xother":{"wrong":{
            "dao_address":"0xDao","proposal_id":"P9","tx_hash":"0x1",
            "executed_at":"2023-11-14T22:13:20Z"}}}}"#;

        let map: PendingMap<PendingExecution> = decode(text).unwrap();
        assert!(map.get("0xother").is_none());
        assert!(map["0xdao"].contains_key("P9"));
    }
}
