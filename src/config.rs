use std::net::SocketAddr;
use std::path::PathBuf;

use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct Config {
    pub web: Web,
    #[serde(default)]
    pub smogon: Smogon,
    pub rulesets: Rulesets,
}

#[derive(Debug, Deserialize)]
pub struct Web {
    pub host: SocketAddr,
}

/// Smogon formats 데이터 소스 설정
#[derive(Debug, Clone, Deserialize)]
pub struct Smogon {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// 응답 캐시 유지 시간 (시간 단위)
    #[serde(default = "default_cache_hours")]
    pub cache_hours: i64,
}

impl Default for Smogon {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            cache_hours: default_cache_hours(),
        }
    }
}

fn default_base_url() -> String {
    "https://pkmn.github.io/smogon/formats".to_string()
}

fn default_cache_hours() -> i64 {
    24
}

#[derive(Debug, Deserialize)]
pub struct Rulesets {
    pub path: PathBuf,
}
