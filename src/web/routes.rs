use std::collections::HashMap;
use std::sync::Arc;
use warp::{filters::BoxedFilter, Filter, Reply};

use super::handlers::{self, RulesAction};
use super::State;

pub fn router(state: Arc<State>) -> BoxedFilter<(impl Reply,)> {
    rules(Arc::clone(&state))
        .or(refresh_rules(Arc::clone(&state)))
        .or(check_rules(Arc::clone(&state)))
        .or(formats(Arc::clone(&state)))
        .boxed()
}

fn rules(state: Arc<State>) -> BoxedFilter<(impl Reply,)> {
    let route = warp::path("rules")
        .and(warp::path::end())
        .and(warp::query::<HashMap<String, String>>())
        .and_then(move |query: HashMap<String, String>| handlers::rules_handler(Arc::clone(&state), query));

    warp::get().and(route).boxed()
}

fn refresh_rules(state: Arc<State>) -> BoxedFilter<(impl Reply,)> {
    let route = warp::path("rules")
        .and(warp::path::end())
        .and(warp::body::content_length_limit(1024 * 16))
        .and(warp::body::json())
        .and_then(move |action: RulesAction| handlers::refresh_handler(Arc::clone(&state), action));

    warp::post().and(route).boxed()
}

fn check_rules(state: Arc<State>) -> BoxedFilter<(impl Reply,)> {
    let route = warp::path("rules")
        .and(warp::path("check"))
        .and(warp::path::end())
        .and(warp::query::<HashMap<String, String>>())
        .and_then(move |query: HashMap<String, String>| handlers::check_handler(Arc::clone(&state), query));

    warp::get().and(route).boxed()
}

fn formats(state: Arc<State>) -> BoxedFilter<(impl Reply,)> {
    let route = warp::path("formats")
        .and(warp::path::end())
        .and_then(move || handlers::formats_handler(Arc::clone(&state)));

    warp::get().and(route).boxed()
}
