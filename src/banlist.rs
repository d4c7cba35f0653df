//! 밴 리스트 통합
//!
//! 커스텀 룰셋과 Smogon 포맷 데이터를 하나의 밴 리스트로 합칩니다.
//! 각 항목에는 출처(Custom/Upstream)가 붙습니다.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;

use crate::rulesets::{LocalOverride, OverrideStore};
use crate::smogon::{RemoteFetch, RemoteRuleset, SmogonClient};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Source {
    Custom,
    Upstream,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BanlistEntry {
    pub name: String,
    pub source: Source,
}

impl BanlistEntry {
    fn tagged<I>(names: I, source: Source) -> impl Iterator<Item = BanlistEntry>
    where
        I: IntoIterator<Item = String>,
    {
        names.into_iter().map(move |name| BanlistEntry { name, source })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregatedBanlist {
    pub format: String,
    pub ruleset: Vec<String>,
    pub clauses: Vec<String>,
    pub banned_pokemon: Vec<BanlistEntry>,
    pub banned_moves: Vec<BanlistEntry>,
    pub banned_abilities: Vec<BanlistEntry>,
    pub banned_items: Vec<BanlistEntry>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Category {
    Pokemon,
    Move,
    Ability,
    Item,
}

impl Category {
    pub const ALL: [Category; 4] = [
        Category::Pokemon,
        Category::Move,
        Category::Ability,
        Category::Item,
    ];

    /// 쿼리 파라미터/응답 키 이름
    pub fn key(self) -> &'static str {
        match self {
            Category::Pokemon => "pokemon",
            Category::Move => "move",
            Category::Ability => "ability",
            Category::Item => "item",
        }
    }
}

impl AggregatedBanlist {
    /// Smogon 데이터를 합친 밴 리스트
    ///
    /// 포켓몬은 커스텀(bannedPokemon + extraPokemon)이 먼저 오고, 그 뒤에
    /// Smogon에만 있는 이름이 Upstream으로 붙습니다. Smogon 밴 리스트는
    /// 분류가 없으므로 커스텀 기술/특성/도구에 있는 이름은 포켓몬에서 제외합니다.
    pub fn merge(format: &str, local: &LocalOverride, remote: Option<&RemoteRuleset>) -> Self {
        let custom_pokemon = dedup(
            local
                .banned_pokemon
                .iter()
                .chain(local.extra_pokemon.iter()),
        );

        let mut seen: HashSet<&str> = custom_pokemon.iter().map(String::as_str).collect();
        let other_categories: HashSet<&str> = local
            .banned_moves
            .iter()
            .chain(local.banned_abilities.iter())
            .chain(local.banned_items.iter())
            .map(String::as_str)
            .collect();

        let mut upstream_pokemon = Vec::new();
        for name in remote.map(|r| r.banlist.as_slice()).unwrap_or_default() {
            if other_categories.contains(name.as_str()) || !seen.insert(name.as_str()) {
                continue;
            }
            upstream_pokemon.push(name.clone());
        }

        let remote_clauses = remote.map(|r| r.clauses.as_slice()).unwrap_or_default();

        Self {
            format: format.to_string(),
            ruleset: remote.map(|r| r.ruleset.clone()).unwrap_or_default(),
            clauses: dedup(local.clauses.iter().chain(remote_clauses.iter())),
            banned_pokemon: BanlistEntry::tagged(custom_pokemon, Source::Custom)
                .chain(BanlistEntry::tagged(upstream_pokemon, Source::Upstream))
                .collect(),
            banned_moves: BanlistEntry::tagged(local.banned_moves.clone(), Source::Custom).collect(),
            banned_abilities: BanlistEntry::tagged(local.banned_abilities.clone(), Source::Custom)
                .collect(),
            banned_items: BanlistEntry::tagged(local.banned_items.clone(), Source::Custom).collect(),
        }
    }

    /// 커스텀 룰셋만으로 만든 밴 리스트 (통합 실패 시 대체용)
    pub fn local_only(format: &str, local: LocalOverride) -> Self {
        Self {
            format: format.to_string(),
            ruleset: Vec::new(),
            clauses: local.clauses,
            banned_pokemon: BanlistEntry::tagged(local.banned_pokemon, Source::Custom).collect(),
            banned_moves: BanlistEntry::tagged(local.banned_moves, Source::Custom).collect(),
            banned_abilities: BanlistEntry::tagged(local.banned_abilities, Source::Custom).collect(),
            banned_items: BanlistEntry::tagged(local.banned_items, Source::Custom).collect(),
        }
    }

    pub fn entries(&self, category: Category) -> &[BanlistEntry] {
        match category {
            Category::Pokemon => &self.banned_pokemon,
            Category::Move => &self.banned_moves,
            Category::Ability => &self.banned_abilities,
            Category::Item => &self.banned_items,
        }
    }

    /// 정확히 같은 이름만 일치로 봄
    pub fn contains(&self, category: Category, name: &str) -> bool {
        self.entries(category).iter().any(|entry| entry.name == name)
    }
}

fn dedup<'a, I>(names: I) -> Vec<String>
where
    I: IntoIterator<Item = &'a String>,
{
    let mut seen = HashSet::new();
    names
        .into_iter()
        .filter(|&name| seen.insert(name.as_str()))
        .cloned()
        .collect()
}

/// 포맷 목록 응답 항목
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormatSummary {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
}

pub struct BanlistService {
    rulesets: Arc<dyn OverrideStore>,
    smogon: SmogonClient,
}

impl BanlistService {
    pub fn new(rulesets: Arc<dyn OverrideStore>, smogon: SmogonClient) -> Self {
        Self { rulesets, smogon }
    }

    pub fn supports(&self, format: &str) -> bool {
        self.rulesets.supports(format)
    }

    pub fn formats(&self) -> Vec<String> {
        self.rulesets.formats()
    }

    pub fn format_summaries(&self) -> Vec<FormatSummary> {
        self.formats()
            .into_iter()
            .filter_map(|id| {
                let local = self.rulesets.local_override(&id).ok()?;
                Some(FormatSummary {
                    name: local.name.unwrap_or_else(|| id.clone()),
                    description: local.description,
                    id,
                })
            })
            .collect()
    }

    /// 커스텀 룰셋 + Smogon 통합 밴 리스트
    ///
    /// Smogon 조회 실패는 빈 기여로 처리합니다. 그 외 오류가 나면 커스텀
    /// 룰셋만으로 다시 만들고, 그것도 안 되면 원래 오류를 돌려줍니다.
    pub async fn combined_banlist(&self, format: &str) -> anyhow::Result<AggregatedBanlist> {
        match self.try_combine(format).await {
            Ok(banlist) => Ok(banlist),
            Err(e) => {
                tracing::error!("Failed to combine banlist for format {}: {:#}", format, e);

                match self.rulesets.local_override(format) {
                    Ok(local) => {
                        tracing::warn!("Falling back to custom banlist for format {}", format);
                        Ok(AggregatedBanlist::local_only(format, local))
                    }
                    Err(_) => Err(e),
                }
            }
        }
    }

    async fn try_combine(&self, format: &str) -> anyhow::Result<AggregatedBanlist> {
        let local = self.rulesets.local_override(format)?;
        let remote = match self.smogon.get_format(local.upstream.as_deref()).await {
            RemoteFetch::Fetched(ruleset) => Some(ruleset),
            RemoteFetch::Unmapped => {
                tracing::debug!("Format {} has no Smogon mapping", format);
                None
            }
            RemoteFetch::Failed(e) => {
                tracing::info!("Using custom rulesets only for {}: {:#}", format, e);
                None
            }
        };

        Ok(AggregatedBanlist::merge(format, &local, remote.as_ref()))
    }

    /// Smogon 캐시만 비움 (커스텀 룰셋은 그대로)
    pub async fn refresh(&self) {
        self.smogon.clear_cache().await;
    }

    /// 오류가 나면 밴되지 않은 것으로 간주
    pub async fn is_banned(&self, category: Category, name: &str, format: &str) -> bool {
        match self.combined_banlist(format).await {
            Ok(banlist) => banlist.contains(category, name),
            Err(e) => {
                tracing::error!(
                    "Failed to check ban status of {} {} in {}: {:#}",
                    category.key(),
                    name,
                    format,
                    e
                );
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rulesets::RulesetDocument;
    use crate::smogon::ResponseCache;
    use crate::test::{doubles_payload, FakeSource, FlakyStore, BASE_URL, RULESETS_JSON};
    use chrono::TimeDelta;
    use maplit::hashmap;
    use serde_json::json;
    use std::collections::HashMap;

    const DOUBLES_URL: &str = "https://example.test/formats/gen9vgc2024series12.json";
    const SINGLES_URL: &str = "https://example.test/formats/gen9-1v1.json";

    fn service_with(store: Arc<dyn OverrideStore>, source: Arc<FakeSource>) -> BanlistService {
        let cache = ResponseCache::new(TimeDelta::try_hours(24).unwrap());
        BanlistService::new(store, SmogonClient::new(BASE_URL, source, cache))
    }

    fn service(source: Arc<FakeSource>) -> BanlistService {
        let document = RulesetDocument::from_json(RULESETS_JSON).unwrap();
        service_with(Arc::new(document), source)
    }

    fn sources(entries: &[BanlistEntry]) -> HashMap<&str, Source> {
        entries.iter().map(|e| (e.name.as_str(), e.source)).collect()
    }

    #[tokio::test]
    async fn doubles_merges_custom_extra_and_upstream() {
        let source = Arc::new(FakeSource::default());
        source.respond(DOUBLES_URL, doubles_payload(&["Charizard", "Greninja"]));
        let service = service(source);

        let banlist = service.combined_banlist("2v2").await.unwrap();

        assert_eq!(
            sources(&banlist.banned_pokemon),
            hashmap! {
                "Charizard" => Source::Custom,
                "Garchomp" => Source::Custom,
                "Greninja" => Source::Upstream,
            }
        );
        assert_eq!(banlist.banned_pokemon.len(), 3);
        assert_eq!(banlist.banned_pokemon[2].name, "Greninja");
    }

    #[tokio::test]
    async fn remote_failure_keeps_local_data() {
        let source = Arc::new(FakeSource::default());
        source.fail(SINGLES_URL, "connection reset");
        let service = service(source);

        let banlist = service.combined_banlist("1v1").await.unwrap();
        let local = RulesetDocument::from_json(RULESETS_JSON)
            .unwrap()
            .local_override("1v1")
            .unwrap();

        assert!(banlist.ruleset.is_empty());
        assert_eq!(banlist.clauses, local.clauses);
        let names = |entries: &[BanlistEntry]| -> Vec<String> {
            assert!(entries.iter().all(|e| e.source == Source::Custom));
            entries.iter().map(|e| e.name.clone()).collect()
        };
        assert_eq!(names(&banlist.banned_pokemon), local.banned_pokemon);
        assert_eq!(names(&banlist.banned_moves), local.banned_moves);
        assert_eq!(names(&banlist.banned_abilities), local.banned_abilities);
        assert_eq!(names(&banlist.banned_items), local.banned_items);
    }

    #[tokio::test]
    async fn non_success_status_still_aggregates_every_format() {
        // FakeSource answers unknown URLs like a 404
        let source = Arc::new(FakeSource::default());
        let service = service(source);

        for format in service.formats() {
            let banlist = service.combined_banlist(&format).await.unwrap();
            assert!(!banlist.banned_moves.is_empty());
            assert!(!banlist.banned_abilities.is_empty());
            assert!(!banlist.banned_items.is_empty());
        }
    }

    #[tokio::test]
    async fn repeated_calls_are_identical_and_cached() {
        let source = Arc::new(FakeSource::default());
        source.respond(DOUBLES_URL, doubles_payload(&["Greninja", "Koraidon"]));
        let service = service(source.clone());

        let first = service.combined_banlist("2v2").await.unwrap();
        let second = service.combined_banlist("2v2").await.unwrap();

        assert_eq!(
            serde_json::to_vec(&first).unwrap(),
            serde_json::to_vec(&second).unwrap()
        );
        assert_eq!(source.calls(), 1);
    }

    #[tokio::test]
    async fn refresh_picks_up_changed_remote_data() {
        let source = Arc::new(FakeSource::default());
        source.respond(DOUBLES_URL, doubles_payload(&["Greninja"]));
        let service = service(source.clone());

        let before = service.combined_banlist("2v2").await.unwrap();
        source.respond(DOUBLES_URL, doubles_payload(&["Miraidon"]));

        let cached = service.combined_banlist("2v2").await.unwrap();
        assert_eq!(before, cached);

        service.refresh().await;
        let after = service.combined_banlist("2v2").await.unwrap();

        assert!(after.contains(Category::Pokemon, "Miraidon"));
        assert!(!after.contains(Category::Pokemon, "Greninja"));
        assert_eq!(source.calls(), 2);
    }

    #[tokio::test]
    async fn shared_names_are_tagged_custom_once() {
        let source = Arc::new(FakeSource::default());
        source.respond(DOUBLES_URL, doubles_payload(&["Garchomp", "Charizard", "Garchomp"]));
        let service = service(source);

        let banlist = service.combined_banlist("2v2").await.unwrap();

        for name in ["Charizard", "Garchomp"] {
            let matches: Vec<_> = banlist
                .banned_pokemon
                .iter()
                .filter(|e| e.name == name)
                .collect();
            assert_eq!(matches.len(), 1, "{} listed more than once", name);
            assert_eq!(matches[0].source, Source::Custom);
        }
    }

    #[tokio::test]
    async fn remote_moves_abilities_items_stay_out_of_pokemon() {
        let source = Arc::new(FakeSource::default());
        source.respond(
            DOUBLES_URL,
            doubles_payload(&["Swagger", "Moody", "King's Rock", "Flutter Mane"]),
        );
        let service = service(source);

        let banlist = service.combined_banlist("2v2").await.unwrap();

        assert!(!banlist.contains(Category::Pokemon, "Swagger"));
        assert!(!banlist.contains(Category::Pokemon, "Moody"));
        assert!(!banlist.contains(Category::Pokemon, "King's Rock"));
        assert!(banlist.contains(Category::Pokemon, "Flutter Mane"));
        assert!(banlist.contains(Category::Move, "Swagger"));
    }

    #[tokio::test]
    async fn clauses_are_a_deduplicated_union() {
        let source = Arc::new(FakeSource::default());
        source.respond(
            DOUBLES_URL,
            json!({
                "name": "[Gen 9] VGC 2024 Reg G",
                "ruleset": ["Flat Rules", "Species Clause", "Item Clause = 1"],
                "banlist": []
            }),
        );
        let service = service(source);

        let banlist = service.combined_banlist("2v2").await.unwrap();

        assert_eq!(banlist.ruleset, vec!["Flat Rules", "Species Clause", "Item Clause = 1"]);
        assert_eq!(
            banlist.clauses,
            vec!["Species Clause", "Sleep Clause", "Item Clause = 1"]
        );
    }

    #[tokio::test]
    async fn unmapped_format_uses_local_only() {
        let document = RulesetDocument::from_json(
            r#"{ "formats": { "3v3": {
                "clauses": ["Species Clause"],
                "bannedPokemon": ["Mewtwo"],
                "extraPokemon": ["Kyogre"]
            } } }"#,
        )
        .unwrap();
        let source = Arc::new(FakeSource::default());
        let service = service_with(Arc::new(document), source.clone());

        let banlist = service.combined_banlist("3v3").await.unwrap();

        assert_eq!(source.calls(), 0);
        assert!(banlist.ruleset.is_empty());
        assert_eq!(
            sources(&banlist.banned_pokemon),
            hashmap! { "Mewtwo" => Source::Custom, "Kyogre" => Source::Custom }
        );
    }

    #[tokio::test]
    async fn unknown_format_is_an_error() {
        let service = service(Arc::new(FakeSource::default()));

        let err = service.combined_banlist("6v6").await.unwrap_err();
        assert!(err.to_string().contains("6v6"));
    }

    #[tokio::test]
    async fn unexpected_error_falls_back_to_local_only() {
        let document = RulesetDocument::from_json(RULESETS_JSON).unwrap();
        let store = Arc::new(FlakyStore::new(document, 1));
        let source = Arc::new(FakeSource::default());
        source.respond(DOUBLES_URL, doubles_payload(&["Greninja"]));
        let service = service_with(store, source.clone());

        let banlist = service.combined_banlist("2v2").await.unwrap();

        assert_eq!(source.calls(), 0);
        assert!(banlist.ruleset.is_empty());
        assert_eq!(banlist.clauses, vec!["Species Clause", "Sleep Clause"]);
        assert_eq!(
            sources(&banlist.banned_pokemon),
            hashmap! { "Charizard" => Source::Custom }
        );
    }

    #[tokio::test]
    async fn failed_fallback_returns_first_error() {
        let document = RulesetDocument::from_json(RULESETS_JSON).unwrap();
        let store = Arc::new(FlakyStore::new(document, 2));
        let service = service_with(store, Arc::new(FakeSource::default()));

        let err = service.combined_banlist("2v2").await.unwrap_err();
        assert!(err.to_string().contains("2v2"));
    }

    #[tokio::test]
    async fn ban_status_checks() {
        let source = Arc::new(FakeSource::default());
        source.respond(DOUBLES_URL, doubles_payload(&["Greninja"]));
        let service = service(source);

        assert!(service.is_banned(Category::Pokemon, "Greninja", "2v2").await);
        assert!(service.is_banned(Category::Pokemon, "Garchomp", "2v2").await);
        assert!(service.is_banned(Category::Move, "Swagger", "2v2").await);
        assert!(service.is_banned(Category::Ability, "Moody", "2v2").await);
        assert!(service.is_banned(Category::Item, "King's Rock", "2v2").await);

        assert!(!service.is_banned(Category::Pokemon, "Pikachu", "2v2").await);
        assert!(!service.is_banned(Category::Pokemon, "greninja", "2v2").await);
        assert!(!service.is_banned(Category::Move, "Greninja", "2v2").await);
    }

    #[tokio::test]
    async fn ban_status_fails_open() {
        let service = service(Arc::new(FakeSource::default()));

        assert!(!service.is_banned(Category::Pokemon, "Charizard", "6v6").await);
    }

    #[test]
    fn format_summaries_fall_back_to_id() {
        let document = RulesetDocument::from_json(
            r#"{ "formats": {
                "2v2": { "name": "2vs2 Doubles", "description": "Doubles" },
                "1v1": {}
            } }"#,
        )
        .unwrap();
        let service = service_with(Arc::new(document), Arc::new(FakeSource::default()));

        assert_eq!(
            service.format_summaries(),
            vec![
                FormatSummary {
                    id: "1v1".to_string(),
                    name: "1v1".to_string(),
                    description: None,
                },
                FormatSummary {
                    id: "2v2".to_string(),
                    name: "2vs2 Doubles".to_string(),
                    description: Some("Doubles".to_string()),
                },
            ]
        );
    }
}
