use std::collections::HashMap;

use anyhow::{Context, Result};
use async_trait::async_trait;
use redis::{AsyncCommands, Client, aio::ConnectionManager};
use tracing::debug;

use crate::domain::{
    repositories::status_cache::{
        CHECK_IN_SNAPSHOT_TTL_SECS, RECHARGE_SESSION_TTL_SECS, StatusCache,
        TRACKING_SESSION_TTL_SECS,
    },
    value_objects::{
        check_in::{CheckInSnapshot, SnapshotClaim, SnapshotRevoke},
        recharge::RechargeSession,
        tracking_sessions::TrackingSession,
    },
};

const SNAPSHOT_FIELD: &str = "snapshot";
const CHECKED_FIELD: &str = "checked";

// 0 = missing, 1 = claimed, 2 = already checked. HSET keeps the key's TTL.
const CLAIM_SNAPSHOT_LUA: &str = r#"
    if redis.call('EXISTS', KEYS[1]) == 0 then
        return 0
    end
    if redis.call('HGET', KEYS[1], 'checked') == '1' then
        return 2
    end
    redis.call('HSET', KEYS[1], 'checked', '1')
    return 1
"#;

// 0 = missing, 1 = revoked, 2 = already checked.
const REVOKE_SNAPSHOT_LUA: &str = r#"
    if redis.call('EXISTS', KEYS[1]) == 0 then
        return 0
    end
    if redis.call('HGET', KEYS[1], 'checked') == '1' then
        return 2
    end
    redis.call('DEL', KEYS[1])
    return 1
"#;

// Only touches an existing key so an expired snapshot is not resurrected.
const RELEASE_SNAPSHOT_LUA: &str = r#"
    if redis.call('EXISTS', KEYS[1]) == 1 then
        redis.call('HSET', KEYS[1], 'checked', '0')
    end
    return 0
"#;

pub fn tracking_key(tracking_id: &str) -> String {
    format!("ticket_status:{tracking_id}")
}

pub fn snapshot_key(qr_code: &str) -> String {
    format!("ticket_valid:{qr_code}")
}

pub fn recharge_key(tran_id: &str) -> String {
    format!("recharge:{tran_id}")
}

/// Redis-backed tracking sessions, check-in snapshots and recharge sessions.
#[derive(Clone)]
pub struct RedisStatusCache {
    conn_manager: ConnectionManager,
}

impl RedisStatusCache {
    pub async fn connect(redis_url: &str) -> Result<Self> {
        let client = Client::open(redis_url).context("failed to create redis client")?;
        let conn_manager = ConnectionManager::new(client)
            .await
            .context("failed to create redis connection manager")?;

        Ok(Self { conn_manager })
    }

    async fn put_json<T: serde::Serialize + Sync>(
        &self,
        key: String,
        value: &T,
        ttl_seconds: u64,
    ) -> Result<()> {
        let mut conn = self.conn_manager.clone();
        let json = serde_json::to_string(value)?;
        let _: () = conn.set_ex(&key, json, ttl_seconds).await?;
        Ok(())
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, key: String) -> Result<Option<T>> {
        let mut conn = self.conn_manager.clone();
        let raw: Option<String> = conn.get(&key).await?;
        parse_json(&key, raw)
    }

    async fn take_json<T: serde::de::DeserializeOwned>(&self, key: String) -> Result<Option<T>> {
        let mut conn = self.conn_manager.clone();
        let raw: Option<String> = redis::cmd("GETDEL")
            .arg(&key)
            .query_async(&mut conn)
            .await?;
        parse_json(&key, raw)
    }
}

fn parse_json<T: serde::de::DeserializeOwned>(key: &str, raw: Option<String>) -> Result<Option<T>> {
    match raw {
        Some(raw) => {
            let value = serde_json::from_str(&raw)
                .with_context(|| format!("corrupt cache entry under {key}"))?;
            Ok(Some(value))
        }
        None => Ok(None),
    }
}

#[async_trait]
impl StatusCache for RedisStatusCache {
    async fn put_tracking_session(
        &self,
        tracking_id: String,
        session: TrackingSession,
    ) -> Result<()> {
        self.put_json(
            tracking_key(&tracking_id),
            &session,
            TRACKING_SESSION_TTL_SECS,
        )
        .await
    }

    async fn get_tracking_session(&self, tracking_id: String) -> Result<Option<TrackingSession>> {
        self.get_json(tracking_key(&tracking_id)).await
    }

    async fn put_check_in_snapshot(
        &self,
        qr_code: String,
        snapshot: CheckInSnapshot,
    ) -> Result<()> {
        let mut conn = self.conn_manager.clone();
        let key = snapshot_key(&qr_code);
        let json = serde_json::to_string(&snapshot)?;
        let checked = if snapshot.checked { "1" } else { "0" };

        let _: () = redis::pipe()
            .atomic()
            .del(&key)
            .ignore()
            .hset_multiple(&key, &[(SNAPSHOT_FIELD, json.as_str()), (CHECKED_FIELD, checked)])
            .ignore()
            .expire(&key, CHECK_IN_SNAPSHOT_TTL_SECS as i64)
            .ignore()
            .query_async(&mut conn)
            .await?;

        debug!(%qr_code, "status_cache: check-in snapshot written");
        Ok(())
    }

    async fn get_check_in_snapshot(&self, qr_code: String) -> Result<Option<CheckInSnapshot>> {
        let mut conn = self.conn_manager.clone();
        let key = snapshot_key(&qr_code);
        let fields: HashMap<String, String> = conn.hgetall(&key).await?;

        let Some(raw) = fields.get(SNAPSHOT_FIELD) else {
            return Ok(None);
        };

        let mut snapshot: CheckInSnapshot = serde_json::from_str(raw)
            .with_context(|| format!("corrupt check-in snapshot under {key}"))?;
        snapshot.checked = fields.get(CHECKED_FIELD).is_some_and(|v| v == "1");

        Ok(Some(snapshot))
    }

    async fn claim_check_in_snapshot(&self, qr_code: String) -> Result<SnapshotClaim> {
        let mut conn = self.conn_manager.clone();
        let result: i32 = redis::Script::new(CLAIM_SNAPSHOT_LUA)
            .key(snapshot_key(&qr_code))
            .invoke_async(&mut conn)
            .await?;

        Ok(match result {
            1 => SnapshotClaim::Claimed,
            2 => SnapshotClaim::AlreadyChecked,
            _ => SnapshotClaim::Missing,
        })
    }

    async fn revoke_check_in_snapshot(&self, qr_code: String) -> Result<SnapshotRevoke> {
        let mut conn = self.conn_manager.clone();
        let result: i32 = redis::Script::new(REVOKE_SNAPSHOT_LUA)
            .key(snapshot_key(&qr_code))
            .invoke_async(&mut conn)
            .await?;

        Ok(match result {
            1 => SnapshotRevoke::Revoked,
            2 => SnapshotRevoke::AlreadyChecked,
            _ => SnapshotRevoke::Missing,
        })
    }

    async fn release_check_in_snapshot(&self, qr_code: String) -> Result<()> {
        let mut conn = self.conn_manager.clone();
        let _: i32 = redis::Script::new(RELEASE_SNAPSHOT_LUA)
            .key(snapshot_key(&qr_code))
            .invoke_async(&mut conn)
            .await?;

        debug!(%qr_code, "status_cache: check-in snapshot released");
        Ok(())
    }

    async fn put_recharge_session(&self, tran_id: String, session: RechargeSession) -> Result<()> {
        self.put_json(recharge_key(&tran_id), &session, RECHARGE_SESSION_TTL_SECS)
            .await
    }

    async fn take_recharge_session(&self, tran_id: String) -> Result<Option<RechargeSession>> {
        self.take_json(recharge_key(&tran_id)).await
    }

    async fn delete_recharge_session(&self, tran_id: String) -> Result<()> {
        let mut conn = self.conn_manager.clone();
        let _: () = conn.del(recharge_key(&tran_id)).await?;
        Ok(())
    }
}
