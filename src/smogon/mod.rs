//! Smogon 관련 모듈
//!
//! - `client`: Smogon formats 데이터 클라이언트
//! - `cache`: URL별 응답 캐시

pub mod cache;
pub mod client;

pub use cache::ResponseCache;
pub use client::{HttpSource, RemoteFetch, RemoteRuleset, SmogonClient};
