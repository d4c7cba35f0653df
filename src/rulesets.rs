//! 커스텀 룰셋 (Local Override Store)
//!
//! 큐레이터가 작성한 포맷별 밴 리스트와 clause를 JSON 문서에서 읽어옵니다.
//! 포맷 키 → Smogon 포맷 ID 매핑과 포맷별 추가 밴 목록도 같은 문서에 둡니다.

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::Context;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RulesetError {
    #[error("format {0} does not exist in custom rulesets")]
    UnknownFormat(String),
}

/// 포맷 하나에 대한 커스텀 룰셋
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocalOverride {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    /// Smogon 포맷 ID (예: "gen9-1v1"). 없으면 원격 데이터를 사용하지 않음
    #[serde(default)]
    pub upstream: Option<String>,
    /// 이 포맷에만 추가로 적용되는 포켓몬 밴 목록
    #[serde(default)]
    pub extra_pokemon: Vec<String>,
    #[serde(default)]
    pub clauses: Vec<String>,
    #[serde(default)]
    pub banned_pokemon: Vec<String>,
    #[serde(default)]
    pub banned_moves: Vec<String>,
    #[serde(default)]
    pub banned_abilities: Vec<String>,
    #[serde(default)]
    pub banned_items: Vec<String>,
}

pub trait OverrideStore: Send + Sync {
    fn local_override(&self, format: &str) -> Result<LocalOverride, RulesetError>;

    /// 지원하는 포맷 키 (정렬됨)
    fn formats(&self) -> Vec<String>;

    fn supports(&self, format: &str) -> bool {
        self.formats().iter().any(|f| f == format)
    }
}

/// `data/rulesets.json` 형태의 문서
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RulesetDocument {
    pub formats: BTreeMap<String, LocalOverride>,
}

impl RulesetDocument {
    pub fn from_json(json: &str) -> anyhow::Result<Self> {
        serde_json::from_str(json).context("could not parse rulesets document")
    }

    pub async fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let json = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("could not read rulesets file {}", path.display()))?;
        let document = Self::from_json(&json)?;

        tracing::info!(
            "Loaded custom rulesets for {} format(s) from {}",
            document.formats.len(),
            path.display()
        );
        Ok(document)
    }
}

impl OverrideStore for RulesetDocument {
    fn local_override(&self, format: &str) -> Result<LocalOverride, RulesetError> {
        self.formats
            .get(format)
            .cloned()
            .ok_or_else(|| RulesetError::UnknownFormat(format.to_string()))
    }

    fn formats(&self) -> Vec<String> {
        self.formats.keys().cloned().collect()
    }
}
