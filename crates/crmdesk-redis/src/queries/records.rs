//! Record collections — Redis implementation.
//!
//! Each record is a hash `crmdesk:<resource>:record:<id>` whose `data` field
//! holds the flat JSON form; `stage` is mirrored for inspection. Collection
//! order is the sorted set `crmdesk:<resource>:all`, scored by creation time.

use crmdesk_core::{EntityKind, Record, RecordPatch};
use redis::{AsyncCommands, Script};
use tracing::{debug, warn};

use crate::client::{RedisError, RedisPool, RedisResult};

pub fn record_key(kind: EntityKind, id: &str) -> String {
    format!("crmdesk:{}:record:{}", kind.resource(), id)
}

pub fn index_key(kind: EntityKind) -> String {
    format!("crmdesk:{}:all", kind.resource())
}

/// Sort score for a record: creation time in milliseconds, 0 when unknown.
pub fn score_for(record: &Record) -> i64 {
    record.created_at.map_or(0, |ts| ts.timestamp_millis())
}

/// Attempts before an update under contention gives up.
pub const MAX_UPDATE_ATTEMPTS: usize = 5;

/// KEYS[1] record hash, KEYS[2] index. ARGV: data, stage, id, score.
/// Returns 0 when the record already exists.
const INSERT_SCRIPT: &str = r#"
if redis.call('EXISTS', KEYS[1]) == 1 then
  return 0
end
redis.call('HSET', KEYS[1], 'data', ARGV[1], 'stage', ARGV[2])
redis.call('ZADD', KEYS[2], ARGV[4], ARGV[3])
return 1
"#;

/// KEYS[1] record hash. ARGV: expected data, new data, new stage.
/// Returns -1 when the record is gone and 0 when `data` changed underneath.
const COMPARE_AND_SET_SCRIPT: &str = r#"
local current = redis.call('HGET', KEYS[1], 'data')
if not current then
  return -1
end
if current ~= ARGV[1] then
  return 0
end
redis.call('HSET', KEYS[1], 'data', ARGV[2], 'stage', ARGV[3])
return 1
"#;

/// Store a new record. Fails with [`RedisError::Conflict`] if the id is taken.
pub async fn insert_record(pool: &RedisPool, record: &Record) -> RedisResult<()> {
    let mut conn = pool.clone();
    let json = serde_json::to_string(&record.to_json())?;
    let inserted: i64 = Script::new(INSERT_SCRIPT)
        .key(record_key(record.kind, &record.id))
        .key(index_key(record.kind))
        .arg(&json)
        .arg(&record.stage)
        .arg(&record.id)
        .arg(score_for(record))
        .invoke_async(&mut conn)
        .await?;
    if inserted == 0 {
        return Err(RedisError::Conflict(format!("{} {} already exists", record.kind, record.id)));
    }
    Ok(())
}

/// Apply `patch` to a stored record with compare-and-set on its `data`
/// field, retrying when another writer got in between.
pub async fn update_record(pool: &RedisPool, kind: EntityKind, id: &str, patch: &RecordPatch) -> RedisResult<Record> {
    let key = record_key(kind, id);
    for attempt in 1..=MAX_UPDATE_ATTEMPTS {
        let mut conn = pool.clone();
        let current: Option<String> = conn.hget(&key, "data").await?;
        let Some(current) = current else {
            return Err(RedisError::NotFound(format!("{} {}", kind, id)));
        };

        let mut record = parse_record(kind, &current)?;
        patch.apply_to(&mut record);
        let json = serde_json::to_string(&record.to_json())?;

        let swapped: i64 = Script::new(COMPARE_AND_SET_SCRIPT)
            .key(&key)
            .arg(&current)
            .arg(&json)
            .arg(&record.stage)
            .invoke_async(&mut conn)
            .await?;
        match swapped {
            1 => return Ok(record),
            -1 => return Err(RedisError::NotFound(format!("{} {}", kind, id))),
            _ => debug!(kind = %kind, id = %id, attempt, "Record changed during update, retrying"),
        }
    }
    Err(RedisError::Conflict(format!(
        "{} {} kept changing after {} attempts",
        kind, id, MAX_UPDATE_ATTEMPTS
    )))
}

pub async fn list_records(pool: &RedisPool, kind: EntityKind) -> RedisResult<Vec<Record>> {
    let mut conn = pool.clone();
    let ids: Vec<String> = conn.zrange(index_key(kind), 0, -1).await?;
    let mut records = Vec::with_capacity(ids.len());
    for id in ids {
        let mut c = pool.clone();
        let json: Option<String> = c.hget(record_key(kind, &id), "data").await?;
        let Some(j) = json else {
            warn!(kind = %kind, id = %id, "Index entry without record");
            continue;
        };
        match parse_record(kind, &j) {
            Ok(record) => records.push(record),
            Err(e) => warn!(kind = %kind, id = %id, error = %e, "Skipping unreadable record"),
        }
    }
    Ok(records)
}

fn parse_record(kind: EntityKind, json: &str) -> RedisResult<Record> {
    let value: serde_json::Value = serde_json::from_str(json)?;
    Record::from_json(kind, &value).map_err(|e| RedisError::Corrupt(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use crmdesk_core::store::record_from_new;
    use crmdesk_core::NewRecord;

    #[test]
    fn test_keys() {
        assert_eq!(record_key(EntityKind::Deal, "d1"), "crmdesk:deals:record:d1");
        assert_eq!(index_key(EntityKind::Contact), "crmdesk:contacts:all");
    }

    #[test]
    fn test_score_uses_creation_time() {
        let mut record = record_from_new(&NewRecord::new(EntityKind::Lead), "l1".into());
        record.created_at = Some(Utc.timestamp_millis_opt(1_700_000_000_123).unwrap());
        assert_eq!(score_for(&record), 1_700_000_000_123);
        record.created_at = None;
        assert_eq!(score_for(&record), 0);
    }

    #[test]
    fn test_insert_script_refuses_existing_key() {
        assert!(INSERT_SCRIPT.contains("redis.call('EXISTS', KEYS[1]) == 1"));
        assert!(INSERT_SCRIPT.find("EXISTS") < INSERT_SCRIPT.find("HSET"));
        assert!(INSERT_SCRIPT.contains("'ZADD', KEYS[2], ARGV[4], ARGV[3]"));
    }

    #[test]
    fn test_compare_and_set_writes_only_on_match() {
        let compare = COMPARE_AND_SET_SCRIPT.find("current ~= ARGV[1]").unwrap();
        let write = COMPARE_AND_SET_SCRIPT.find("'HSET'").unwrap();
        assert!(compare < write);
        assert!(COMPARE_AND_SET_SCRIPT.contains("'data', ARGV[2], 'stage', ARGV[3]"));
    }

    #[test]
    fn test_parse_rejects_idless_payload() {
        assert!(matches!(
            parse_record(EntityKind::Lead, r#"{"name":"x"}"#),
            Err(RedisError::Corrupt(_))
        ));
    }
}
