//! Smogon formats 데이터 클라이언트
//!
//! `{base}/{format_id}.json` 문서를 가져와 `RemoteRuleset`으로 정규화합니다.
//! 성공한 응답만 캐시하며, 실패는 `RemoteFetch::Failed`로 돌려줘서
//! 호출하는 쪽이 대체 정책을 고르도록 합니다.

use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;

use super::cache::ResponseCache;

/// 정규화된 Smogon 포맷
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RemoteRuleset {
    pub name: String,
    pub ruleset: Vec<String>,
    pub banlist: Vec<String>,
    /// `ruleset` 중 "clause"를 포함하는 항목 (대소문자 무시)
    pub clauses: Vec<String>,
}

impl RemoteRuleset {
    pub fn from_json(format_id: &str, raw: &Value) -> Self {
        let ruleset = string_list(raw, "ruleset");
        let clauses = ruleset
            .iter()
            .filter(|rule| rule.to_lowercase().contains("clause"))
            .cloned()
            .collect();

        Self {
            name: raw
                .get("name")
                .and_then(Value::as_str)
                .unwrap_or(format_id)
                .to_string(),
            banlist: string_list(raw, "banlist"),
            ruleset,
            clauses,
        }
    }
}

/// 배열이 아니거나 없으면 빈 목록, 문자열이 아닌 원소는 건너뜀
fn string_list(raw: &Value, key: &str) -> Vec<String> {
    raw.get(key)
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

/// 원격 조회 결과
#[derive(Debug)]
pub enum RemoteFetch {
    Fetched(RemoteRuleset),
    /// 포맷에 Smogon 매핑이 없음
    Unmapped,
    Failed(anyhow::Error),
}

#[cfg(test)]
impl RemoteFetch {
    pub fn ruleset(&self) -> Option<&RemoteRuleset> {
        match self {
            RemoteFetch::Fetched(ruleset) => Some(ruleset),
            RemoteFetch::Unmapped | RemoteFetch::Failed(_) => None,
        }
    }
}

/// JSON 문서를 가져오는 전송 계층
#[async_trait]
pub trait RulesetSource: Send + Sync {
    async fn fetch_json(&self, url: &str) -> anyhow::Result<Value>;
}

pub struct HttpSource {
    http: reqwest::Client,
}

impl HttpSource {
    pub fn new() -> Self {
        Self {
            http: reqwest::Client::new(),
        }
    }
}

impl Default for HttpSource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RulesetSource for HttpSource {
    async fn fetch_json(&self, url: &str) -> anyhow::Result<Value> {
        let response = self.http.get(url).send().await?;

        if !response.status().is_success() {
            let status = response.status();
            anyhow::bail!("Smogon API error: {}", status);
        }

        Ok(response.json().await?)
    }
}

pub struct SmogonClient {
    base_url: String,
    source: Arc<dyn RulesetSource>,
    cache: ResponseCache,
}

impl SmogonClient {
    pub fn new(base_url: impl Into<String>, source: Arc<dyn RulesetSource>, cache: ResponseCache) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            source,
            cache,
        }
    }

    pub fn format_url(&self, format_id: &str) -> String {
        format!("{}/{}.json", self.base_url, format_id)
    }

    /// Smogon 포맷 조회 (캐시 우선)
    ///
    /// `format_id`가 없으면 네트워크 요청 없이 `Unmapped`를 반환합니다.
    pub async fn get_format(&self, format_id: Option<&str>) -> RemoteFetch {
        let Some(format_id) = format_id else {
            return RemoteFetch::Unmapped;
        };

        let url = self.format_url(format_id);
        if let Some(cached) = self.cache.get(&url).await {
            tracing::debug!("Smogon cache hit: {}", url);
            return RemoteFetch::Fetched(cached);
        }

        match self.source.fetch_json(&url).await {
            Ok(raw) => {
                let ruleset = RemoteRuleset::from_json(format_id, &raw);
                tracing::debug!(
                    "Fetched Smogon format {} ({} rules, {} bans)",
                    format_id,
                    ruleset.ruleset.len(),
                    ruleset.banlist.len()
                );
                self.cache.insert(&url, ruleset.clone()).await;
                RemoteFetch::Fetched(ruleset)
            }
            Err(e) => {
                tracing::warn!("Failed to fetch Smogon format {}: {:#}", format_id, e);
                RemoteFetch::Failed(e)
            }
        }
    }

    pub async fn clear_cache(&self) {
        self.cache.clear().await;
    }

    #[cfg(test)]
    pub fn cache(&self) -> &ResponseCache {
        &self.cache
    }
}
