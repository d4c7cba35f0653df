//! Smogon 응답 캐시
//!
//! 요청 URL별로 정규화된 포맷 데이터를 보관합니다. 크기 제한은 없고,
//! 만료된 항목은 읽을 때 제거됩니다.

use chrono::{DateTime, TimeDelta, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use super::client::RemoteRuleset;

/// 캐시 만료 판정에 쓰는 시계
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

#[derive(Debug, Clone)]
struct CachedRuleset {
    data: RemoteRuleset,
    fetched_at: DateTime<Utc>,
}

pub struct ResponseCache {
    ttl: TimeDelta,
    clock: Arc<dyn Clock>,
    entries: RwLock<HashMap<String, CachedRuleset>>,
}

impl ResponseCache {
    pub fn new(ttl: TimeDelta) -> Self {
        Self::with_clock(ttl, Arc::new(SystemClock))
    }

    pub fn with_clock(ttl: TimeDelta, clock: Arc<dyn Clock>) -> Self {
        Self {
            ttl,
            clock,
            entries: RwLock::new(HashMap::new()),
        }
    }

    fn is_expired(&self, entry: &CachedRuleset, now: DateTime<Utc>) -> bool {
        now - entry.fetched_at >= self.ttl
    }

    pub async fn get(&self, url: &str) -> Option<RemoteRuleset> {
        let now = self.clock.now();
        {
            let entries = self.entries.read().await;
            match entries.get(url) {
                Some(entry) if !self.is_expired(entry, now) => return Some(entry.data.clone()),
                Some(_) => {}
                None => return None,
            }
        }

        // 만료된 항목 제거 (그 사이 다른 요청이 새로 채웠으면 유지)
        let mut entries = self.entries.write().await;
        if entries
            .get(url)
            .is_some_and(|entry| self.is_expired(entry, now))
        {
            entries.remove(url);
            tracing::debug!("Smogon cache entry expired: {}", url);
        }
        None
    }

    pub async fn insert(&self, url: &str, data: RemoteRuleset) {
        let entry = CachedRuleset {
            data,
            fetched_at: self.clock.now(),
        };
        self.entries.write().await.insert(url.to_string(), entry);
    }

    pub async fn clear(&self) {
        let mut entries = self.entries.write().await;
        let removed = entries.len();
        entries.clear();
        tracing::info!("Cleared Smogon cache ({} entries)", removed);
    }

    #[cfg(test)]
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }
}
