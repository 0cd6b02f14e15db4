use serde::Serialize;
use warp::reject;

use crate::errors::BackendError;

#[derive(Debug)]
pub struct Rejection {
    pub(crate) context: Context,
    pub(crate) error: BackendError,
}

impl Rejection {
    pub fn new(context: Context, error: BackendError) -> Self {
        Rejection { context, error }
    }

    pub fn flatten(&self) -> FlattenedRejection {
        FlattenedRejection {
            context: self.context.clone(),
            message: format!("{}", self.error),
        }
    }
}

impl reject::Reject for Rejection {}

#[derive(Debug, Serialize)]
pub struct FlattenedRejection {
    #[serde(flatten)]
    pub(crate) context: Context,
    pub(crate) message: String,
}

/// What the failed request was trying to do, echoed back in error
/// responses.
#[derive(Clone, Debug, Serialize)]
#[serde(untagged)]
pub enum Context {
    #[serde(rename_all = "camelCase")]
    Generate { track_title: String },
    MarkUsed { code: String },
    Retrieve { code: String },
}

impl Context {
    pub fn generate(track_title: String) -> Context {
        Context::Generate { track_title }
    }

    pub fn mark_used(code: String) -> Context {
        Context::MarkUsed { code }
    }

    pub fn retrieve(code: String) -> Context {
        Context::Retrieve { code }
    }
}
