use std::time::{Duration, Instant};

use log::debug;
use serde_json::Value;
use warp::{
    http::StatusCode,
    reject,
    reply::{json, with_header, with_status, Reply},
};

use crate::environment::Environment;
use crate::errors::BackendError;
use crate::isrc;
use crate::limits::upgrade_message;
use crate::routes::{
    query::{GenerateRequest, LookupQuery, RecordRequest},
    rejection::{Context, Rejection},
    response::SuccessResponse,
};

const SERVER_TIMING_HEADER: &str = "server-timing";
type RouteResult = Result<Box<dyn Reply>, reject::Rejection>;

macro_rules! timed {
    ($($expression:stmt);+) => {
        let start = Instant::now();

        // TODO when `try` blocks are stabilized, we can wrap the body
        // and return the headers even on errors
        let result = { $($expression)+ };

        Ok(Box::new(with_header(
            result,
            SERVER_TIMING_HEADER,
            format_server_timing(start.elapsed()),
        )) as Box<dyn Reply>)
    };
}

pub async fn generate(environment: Environment, request: GenerateRequest) -> RouteResult {
    timed! {
        let GenerateRequest { track_title, artist_name } = request;

        let error_handler = |e: BackendError| Rejection::new(Context::generate(track_title.clone()), e);

        debug!(environment.logger, "Generating ISRC..."; "track_title" => &track_title);
        let code = environment
            .isrc
            .generate(&track_title, &artist_name)
            .await
            .map_err(error_handler)?;

        let location = environment.urls.isrc_code(&code);

        Box::new(with_header(
            with_status(json(&SuccessResponse::Generated { code }), StatusCode::CREATED),
            "location",
            location.as_str(),
        )) as Box<dyn Reply>
    }
}

pub async fn retrieve(environment: Environment, code: String) -> RouteResult {
    timed! {
        let error_handler = |e: BackendError| Rejection::new(Context::retrieve(code.clone()), e);

        let code = parse_code(&code).map_err(error_handler)?;
        debug!(environment.logger, "Retrieving ISRC record..."; "code" => &code);

        let option = environment.isrc.retrieve(&code).await;

        match option {
            Some(record) => with_status(json(&record), StatusCode::OK),
            None => with_status(json(&()), StatusCode::NOT_FOUND),
        }
    }
}

pub async fn validate(_environment: Environment, code: String) -> RouteResult {
    timed! {
        let valid = isrc::validate(&code);

        json(&SuccessResponse::Validity { code, valid })
    }
}

pub async fn mark_used(environment: Environment, code: String, context: Value) -> RouteResult {
    timed! {
        let error_handler = |e: BackendError| Rejection::new(Context::mark_used(code.clone()), e);

        let code = parse_code(&code).map_err(error_handler)?;
        debug!(environment.logger, "Marking ISRC used..."; "code" => &code);

        let updated = environment.isrc.mark_used(&code, context).await;

        json(&SuccessResponse::Marked { code, updated })
    }
}

pub async fn lookup(environment: Environment, query: LookupQuery) -> RouteResult {
    timed! {
        let LookupQuery { track_title, artist_name } = query;

        debug!(environment.logger, "Looking up allocated code..."; "track_title" => &track_title);

        let option = environment
            .isrc
            .existing_for_track(&track_title, &artist_name)
            .await;

        match option {
            Some(code) => with_status(json(&SuccessResponse::Lookup { code }), StatusCode::OK),
            None => with_status(json(&()), StatusCode::NOT_FOUND),
        }
    }
}

pub async fn stats(environment: Environment) -> RouteResult {
    timed! {
        let stats = environment.isrc.stats().await;

        json(&SuccessResponse::Stats(stats))
    }
}

pub async fn range(environment: Environment) -> RouteResult {
    timed! {
        let range = environment.isrc.user_range().await;

        json(&SuccessResponse::Range(range))
    }
}

pub async fn usage_stats(environment: Environment) -> RouteResult {
    timed! {
        let stats = environment.usage.usage_stats().await;

        json(&SuccessResponse::Usage(stats))
    }
}

pub async fn usage_check(environment: Environment) -> RouteResult {
    timed! {
        let gate = environment.usage.check().await;
        let upgrade = if gate.allowed { None } else { upgrade_message(gate.tier) };

        json(&SuccessResponse::Gate { gate, upgrade })
    }
}

pub async fn usage_record(environment: Environment, request: RecordRequest) -> RouteResult {
    timed! {
        let RecordRequest { package_type } = request;

        debug!(environment.logger, "Recording package..."; "package_type" => &package_type);

        let stats = environment.usage.record(&package_type).await;

        with_status(json(&SuccessResponse::Usage(stats)), StatusCode::CREATED)
    }
}

/// Strips whitespace and checks the code layout, returning the
/// compact form used as the registry key.
fn parse_code(raw: &str) -> Result<String, BackendError> {
    let code: String = raw.split_whitespace().collect();

    if isrc::validate(&code) {
        Ok(code)
    } else {
        Err(BackendError::InvalidIsrc {
            code: raw.to_owned(),
        })
    }
}

fn format_server_timing(seconds: Duration) -> String {
    format!("handler;dur={}", seconds.as_secs_f64() * 1000.0)
}
