use std::sync::Arc;

use log::{error, Logger};
use warp::http::StatusCode;
use warp::reject;
use warp::reply::{json, with_status, Json, WithStatus};

use crate::errors::BackendError;

pub mod admin;
mod handlers;
mod query;
mod rejection;
mod response;

pub use internal::*;

/// The maximum request body size to accept. This should be enforced
/// by the HTTP gateway, so on the Rust side it’s set to an
/// unreasonably large number.
const MAX_CONTENT_LENGTH: u64 = 2 * 1024 * 1024 * 1024;

pub async fn format_rejection(
    logger: Arc<Logger>,
    rej: reject::Rejection,
) -> Result<WithStatus<Json>, reject::Rejection> {
    if let Some(r) = rej.find::<rejection::Rejection>() {
        let e = &r.error;
        error!(logger, "Backend error"; "context" => ?r.context, "error" => ?r.error, "status" => %status_code_for(e), "message" => %r.error);
        let flattened = r.flatten();

        return Ok(with_status(json(&flattened), status_code_for(e)));
    }

    Err(rej)
}

fn status_code_for(e: &BackendError) -> StatusCode {
    use BackendError::*;

    match e {
        InvalidIsrc { .. } | MissingTrackTitle => StatusCode::BAD_REQUEST,
        RangeExhausted { .. } => StatusCode::CONFLICT,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

mod internal {
    use serde_json::Value;
    use warp::filters::body::{content_length_limit, json as json_body};
    use warp::filters::BoxedFilter;
    use warp::path::end;
    use warp::Filter;
    use warp::Reply;
    use warp::{get as g, path as p, path::param as par, post, query};

    use super::{handlers, query as q, MAX_CONTENT_LENGTH};
    use crate::environment::Environment;

    type Route = BoxedFilter<(Box<dyn Reply>,)>;

    macro_rules! route_filter {
    ($route_variable:ident; $first:expr) => (let $route_variable = $route_variable.and($first););
    ($route_variable:ident; $first:expr, $($rest:expr),+) => (
        let $route_variable = $route_variable.and($first);
        route_filter!($route_variable; $($rest),+);
    )
}

    macro_rules! route {
    ($name:ident($prefix:ident) => $handler:ident, $route_variable:ident; $($filters:expr),+) => (
        pub fn $name(environment: Environment) -> Route {
            let prefix = environment.urls.$prefix.clone();

            let $route_variable = warp::any()
                .map(move || environment.clone())
                .and(p(prefix));

            route_filter!($route_variable; $($filters),+);

            $route_variable.and_then(handlers::$handler)
                .boxed()
        }
    );
}

    route!(make_generate_route(isrc_path) => generate, rt; end(), post(), content_length_limit(MAX_CONTENT_LENGTH), json_body::<q::GenerateRequest>());
    route!(make_retrieve_route(isrc_path) => retrieve, rt; p("code"), par::<String>(), end(), g());
    route!(make_validate_route(isrc_path) => validate, rt; p("valid"), par::<String>(), end(), g());
    // the context body is optional; an absent or unreadable body reads as null
    route!(make_mark_used_route(isrc_path) => mark_used, rt; p("used"), par::<String>(), end(), post(), content_length_limit(MAX_CONTENT_LENGTH).and(json_body::<Value>()).or(warp::any().map(|| Value::Null)).unify());
    route!(make_lookup_route(isrc_path) => lookup, rt; p("lookup"), query::<q::LookupQuery>(), end(), g());
    route!(make_stats_route(isrc_path) => stats, rt; p("stats"), end(), g());
    route!(make_range_route(isrc_path) => range, rt; p("range"), end(), g());
    route!(make_usage_stats_route(usage_path) => usage_stats, rt; end(), g());
    route!(make_usage_check_route(usage_path) => usage_check, rt; p("check"), end(), g());
    route!(make_usage_record_route(usage_path) => usage_record, rt; p("record"), end(), post(), content_length_limit(MAX_CONTENT_LENGTH), json_body::<q::RecordRequest>());
}
