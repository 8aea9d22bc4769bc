//! Wizard draft slots — Redis implementation.

use redis::AsyncCommands;

use crate::client::{RedisPool, RedisResult};

pub fn draft_key(key: &str) -> String {
    format!("crmdesk:draft:{}", key)
}

pub async fn get_draft(pool: &RedisPool, key: &str) -> RedisResult<Option<String>> {
    let mut conn = pool.clone();
    let value: Option<String> = conn.get(draft_key(key)).await?;
    Ok(value)
}

pub async fn set_draft(pool: &RedisPool, key: &str, value: &str) -> RedisResult<()> {
    let mut conn = pool.clone();
    conn.set::<_, _, ()>(draft_key(key), value).await?;
    Ok(())
}

pub async fn delete_draft(pool: &RedisPool, key: &str) -> RedisResult<()> {
    let mut conn = pool.clone();
    conn.del::<_, ()>(draft_key(key)).await?;
    Ok(())
}
