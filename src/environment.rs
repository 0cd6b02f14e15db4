use std::sync::Arc;

use log::Logger;

use crate::isrc::allocator::IsrcAllocator;
use crate::limits::UsageLimiter;
use crate::urls::Urls;

/// The shared state handed to every request handler.
#[derive(Clone)]
pub struct Environment {
    pub logger: Arc<Logger>,
    pub isrc: Arc<IsrcAllocator>,
    pub usage: Arc<UsageLimiter>,
    pub urls: Arc<Urls>,
}

impl Environment {
    pub fn new(
        logger: Arc<Logger>,
        isrc: Arc<IsrcAllocator>,
        usage: Arc<UsageLimiter>,
        urls: Arc<Urls>,
    ) -> Self {
        Self {
            logger,
            isrc,
            usage,
            urls,
        }
    }
}
