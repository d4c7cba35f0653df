use std::{collections::HashMap, convert::Infallible, sync::Arc};
use serde::{Deserialize, Serialize};
use warp::http::StatusCode;
use warp::reply::Response;
use warp::Reply;

use crate::banlist::Category;
use super::State;

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

fn error_reply(status: StatusCode, error: impl Into<String>) -> Response {
    warp::reply::with_status(
        warp::reply::json(&ErrorBody { error: error.into() }),
        status,
    )
    .into_response()
}

fn internal_error() -> Response {
    error_reply(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
}

/// `format` 파라미터 검증. 실패하면 400 응답을 돌려줌
fn validate_format(state: &State, format: Option<&str>) -> Result<String, Response> {
    let format = match format {
        Some(format) if !format.is_empty() => format,
        _ => {
            return Err(error_reply(
                StatusCode::BAD_REQUEST,
                "Format parameter is required",
            ))
        }
    };

    if !state.banlist.supports(format) {
        return Err(error_reply(
            StatusCode::BAD_REQUEST,
            format!(
                "Invalid format. Supported formats: {}",
                state.banlist.formats().join(", ")
            ),
        ));
    }

    Ok(format.to_string())
}

async fn banlist_reply(state: &State, format: &str) -> Response {
    match state.banlist.combined_banlist(format).await {
        Ok(banlist) => warp::reply::json(&banlist).into_response(),
        Err(e) => {
            tracing::error!("Error fetching rules for {}: {:#}", format, e);
            internal_error()
        }
    }
}

pub async fn rules_handler(
    state: Arc<State>,
    query: HashMap<String, String>,
) -> std::result::Result<Response, Infallible> {
    let format = match validate_format(&state, query.get("format").map(String::as_str)) {
        Ok(format) => format,
        Err(reply) => return Ok(reply),
    };

    Ok(banlist_reply(&state, &format).await)
}

/// `POST /rules` 본문
#[derive(Debug, Deserialize)]
pub struct RulesAction {
    #[serde(default)]
    pub action: Option<String>,
    #[serde(default)]
    pub format: Option<String>,
}

pub async fn refresh_handler(
    state: Arc<State>,
    body: RulesAction,
) -> std::result::Result<Response, Infallible> {
    if body.action.as_deref() != Some("refresh") {
        return Ok(error_reply(StatusCode::BAD_REQUEST, "Invalid action"));
    }

    let format = match validate_format(&state, body.format.as_deref()) {
        Ok(format) => format,
        Err(reply) => return Ok(reply),
    };

    state.banlist.refresh().await;
    tracing::info!("Refreshing banlist for {}", format);

    Ok(banlist_reply(&state, &format).await)
}

#[derive(Debug, Default, Serialize)]
pub struct CheckResults {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pokemon: Option<bool>,
    #[serde(rename = "move", skip_serializing_if = "Option::is_none")]
    pub move_: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ability: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub item: Option<bool>,
}

impl CheckResults {
    fn slot(&mut self, category: Category) -> &mut Option<bool> {
        match category {
            Category::Pokemon => &mut self.pokemon,
            Category::Move => &mut self.move_,
            Category::Ability => &mut self.ability,
            Category::Item => &mut self.item,
        }
    }

    fn any_banned(&self) -> bool {
        [self.pokemon, self.move_, self.ability, self.item]
            .into_iter()
            .flatten()
            .any(|banned| banned)
    }
}

#[derive(Debug, Serialize)]
pub struct CheckResponse {
    pub format: String,
    pub results: CheckResults,
    /// 하나라도 밴이면 true
    pub banned: bool,
}

pub async fn check_handler(
    state: Arc<State>,
    query: HashMap<String, String>,
) -> std::result::Result<Response, Infallible> {
    let format = match validate_format(&state, query.get("format").map(String::as_str)) {
        Ok(format) => format,
        Err(reply) => return Ok(reply),
    };

    let mut results = CheckResults::default();
    for category in Category::ALL {
        let name = match query.get(category.key()) {
            Some(name) if !name.is_empty() => name,
            _ => continue,
        };
        *results.slot(category) = Some(state.banlist.is_banned(category, name, &format).await);
    }

    let banned = results.any_banned();
    Ok(warp::reply::json(&CheckResponse {
        format,
        results,
        banned,
    })
    .into_response())
}

pub async fn formats_handler(state: Arc<State>) -> std::result::Result<Response, Infallible> {
    Ok(warp::reply::json(&state.banlist.format_summaries()).into_response())
}
