use std::sync::Arc;

use log::{debug, error, warn, Logger};
use serde_json::Value;
use tokio::sync::Mutex;

use crate::clock::{iso_timestamp, two_digit_year, Clock};
use crate::errors::BackendError;
use crate::identity::IdentityProvider;
use crate::normalization::sanitize_field;
use crate::store::{keys, KvStore};

use super::{
    designation_range, format_code, validate, CodeRecord, DesignationRange, Registry,
    RegistryStats, StoredRegistry,
};

/// Allocates ISRC codes out of the caller's designation range and
/// tracks every code it has handed out.
///
/// All operations funnel through one internal lock, so each
/// load-modify-persist cycle is atomic with respect to the others.
pub struct IsrcAllocator {
    logger: Arc<Logger>,
    store: Arc<dyn KvStore>,
    identity: Arc<dyn IdentityProvider>,
    clock: Arc<dyn Clock>,
    registry: Mutex<Option<Registry>>,
}

impl IsrcAllocator {
    pub fn new(
        logger: Arc<Logger>,
        store: Arc<dyn KvStore>,
        identity: Arc<dyn IdentityProvider>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            logger,
            store,
            identity,
            clock,
            registry: Mutex::new(None),
        }
    }

    /// Allocates the next code in the caller's range and records it
    /// under the sanitized track metadata.
    ///
    /// The counter only moves on success: exhaustion and invariant
    /// failures leave the registry untouched. A persistence failure
    /// after allocation still returns the code, since the registry
    /// remains correct in memory.
    pub async fn generate(
        &self,
        track_title: &str,
        artist_name: &str,
    ) -> Result<String, BackendError> {
        let track_title = sanitize_field(track_title);
        if track_title.is_empty() {
            return Err(BackendError::MissingTrackTitle);
        }
        let artist_name = sanitize_field(artist_name);

        let mut guard = self.registry.lock().await;
        let registry = self.ensure_current(&mut *guard).await;

        let next = registry.last_designation + 1;
        if next > registry.user_range.end {
            return Err(BackendError::RangeExhausted {
                capacity: registry.user_range.capacity(),
            });
        }

        let code = format_code(&registry.year, next);
        if !validate(&code) {
            return Err(BackendError::CodeInvariant { code });
        }

        registry.last_designation = next;
        let generated = iso_timestamp(&self.clock.now_utc());
        registry
            .codes
            .insert(code.clone(), CodeRecord::new(track_title, artist_name, generated));

        debug!(self.logger, "Allocated ISRC"; "code" => %code, "designation" => next);
        self.persist(registry).await;

        Ok(code)
    }

    /// Looks up the record for a code.
    pub async fn retrieve(&self, code: &str) -> Option<CodeRecord> {
        let mut guard = self.registry.lock().await;
        let registry = self.ensure_current(&mut *guard).await;

        registry.codes.get(code).cloned()
    }

    /// Flags a code as used and attaches the submission context.
    /// Returns whether anything was updated; unknown codes are a
    /// no-op.
    pub async fn mark_used(&self, code: &str, context: Value) -> bool {
        let mut guard = self.registry.lock().await;
        let registry = self.ensure_current(&mut *guard).await;

        match registry.codes.get_mut(code) {
            Some(record) => {
                record.used = true;
                record.used_at = Some(iso_timestamp(&self.clock.now_utc()));
                record.context = context;
            }
            None => return false,
        }

        self.persist(registry).await;

        true
    }

    /// Finds an unused code already allocated for the given track, to
    /// avoid double-allocating within a session. Earliest allocation
    /// wins.
    pub async fn existing_for_track(&self, track_title: &str, artist_name: &str) -> Option<String> {
        let track_title = sanitize_field(track_title);
        let artist_name = sanitize_field(artist_name);

        let mut guard = self.registry.lock().await;
        let registry = self.ensure_current(&mut *guard).await;

        registry
            .codes
            .iter()
            .find(|(_, record)| {
                !record.used
                    && record.track_title == track_title
                    && record.artist_name == artist_name
            })
            .map(|(code, _)| code.clone())
    }

    /// Summarizes the registry.
    pub async fn stats(&self) -> RegistryStats {
        let mut guard = self.registry.lock().await;
        let registry = self.ensure_current(&mut *guard).await;

        let total = registry.codes.len();
        let used = registry.codes.values().filter(|record| record.used).count();

        RegistryStats {
            total,
            used,
            available: total - used,
            current_year: registry.year.clone(),
            last_designation: registry.last_designation,
        }
    }

    /// The range codes are currently allocated from.
    pub async fn user_range(&self) -> DesignationRange {
        let mut guard = self.registry.lock().await;
        let registry = self.ensure_current(&mut *guard).await;

        registry.user_range.clone()
    }

    /// Returns the cached registry, loading it on first use and
    /// rolling it into the current year if it is stale.
    async fn ensure_current<'a>(&self, slot: &'a mut Option<Registry>) -> &'a mut Registry {
        let loaded = match slot.take() {
            Some(registry) => registry,
            None => self.load_registry().await,
        };
        let registry = slot.get_or_insert(loaded);

        let year = two_digit_year(&self.clock.now_utc());
        if registry.year != year {
            debug!(self.logger, "Rolling ISRC registry into new year"; "from" => %registry.year, "to" => %year);
            let user_range = self.resolve_range().await;
            registry.last_designation = user_range.start;
            registry.year = year;
            registry.user_range = user_range;
            self.persist(registry).await;
        }

        registry
    }

    /// Loads the stored registry, rebuilding whatever pieces are
    /// missing or damaged. Never fails: an unreadable document is
    /// replaced by a fresh registry.
    async fn load_registry(&self) -> Registry {
        let year = two_digit_year(&self.clock.now_utc());

        let stored = match self.store.get(keys::ISRC_REGISTRY).await {
            Ok(stored) => stored,
            Err(e) => {
                warn!(self.logger, "Failed to load ISRC registry; starting fresh"; "error" => %e);
                None
            }
        };

        match stored {
            Some(value) => {
                let parts = StoredRegistry::parse(&value);

                match (parts.year, parts.user_range) {
                    (Some(stored_year), Some(user_range)) => Registry {
                        last_designation: parts
                            .last_designation
                            .filter(|n| *n >= user_range.start)
                            .map(|n| n.min(user_range.end))
                            .unwrap_or(user_range.start),
                        codes: parts.codes,
                        year: stored_year,
                        user_range,
                    },
                    _ => {
                        // no intact range on record; rebuild it but keep the codes
                        let user_range = self.resolve_range().await;
                        let registry = Registry {
                            last_designation: user_range.start,
                            codes: parts.codes,
                            year,
                            user_range,
                        };
                        self.persist(&registry).await;

                        registry
                    }
                }
            }
            None => Registry::fresh(self.resolve_range().await, year),
        }
    }

    async fn resolve_range(&self) -> DesignationRange {
        match self.identity.resolve().await {
            Ok(identity) => designation_range(&identity.user_id),
            Err(e) => {
                warn!(self.logger, "Identity unavailable; using fallback range"; "error" => %e);
                DesignationRange::fallback()
            }
        }
    }

    async fn persist(&self, registry: &Registry) {
        let value = match serde_json::to_value(registry) {
            Ok(value) => value,
            Err(e) => {
                error!(self.logger, "Failed to serialize ISRC registry"; "error" => %e);
                return;
            }
        };

        if let Err(e) = self.store.set(keys::ISRC_REGISTRY, value).await {
            error!(self.logger, "Failed to save ISRC registry"; "error" => %e);
        }
    }
}
