//! Session hints in redis.
//!
//! These are advisory only: the in-process connection registry is the
//! authority for who is online. The hints let operators and sidecars peek at
//! live sessions without touching the process.

use chrono::{DateTime, Utc};
use redis::aio::MultiplexedConnection;
use redis::AsyncCommands;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionInfo {
    pub user_id: String,
    pub platform: String,
    pub device_info: String,
    pub conn_id: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Clone)]
pub struct SessionStore {
    conn: MultiplexedConnection,
}

impl SessionStore {
    pub fn new(conn: MultiplexedConnection) -> Self {
        Self { conn }
    }

    pub async fn save_session(
        &self,
        session_id: &str,
        info: &SessionInfo,
        ttl_secs: u64,
    ) -> anyhow::Result<()> {
        let mut conn = self.conn.clone();
        let payload = serde_json::to_string(info)?;
        conn.set_ex::<_, _, ()>(format!("session:{}", session_id), payload, ttl_secs)
            .await?;
        Ok(())
    }

    pub async fn get_session(&self, session_id: &str) -> anyhow::Result<Option<SessionInfo>> {
        let mut conn = self.conn.clone();
        let payload: Option<String> = conn.get(format!("session:{}", session_id)).await?;
        match payload {
            Some(payload) => Ok(Some(serde_json::from_str(&payload)?)),
            None => Ok(None),
        }
    }

    pub async fn delete_session(&self, session_id: &str) -> anyhow::Result<()> {
        let mut conn = self.conn.clone();
        conn.del::<_, ()>(format!("session:{}", session_id)).await?;
        Ok(())
    }

    pub async fn save_user_connection(&self, user_id: &str, conn_id: &str) -> anyhow::Result<()> {
        let mut conn = self.conn.clone();
        conn.set::<_, _, ()>(format!("user_conn:{}", user_id), conn_id)
            .await?;
        Ok(())
    }

    pub async fn get_user_connection(&self, user_id: &str) -> anyhow::Result<Option<String>> {
        let mut conn = self.conn.clone();
        let conn_id: Option<String> = conn.get(format!("user_conn:{}", user_id)).await?;
        Ok(conn_id)
    }

    pub async fn delete_user_connection(&self, user_id: &str) -> anyhow::Result<()> {
        let mut conn = self.conn.clone();
        conn.del::<_, ()>(format!("user_conn:{}", user_id)).await?;
        Ok(())
    }
}
