use std::fmt;
use std::str::FromStr;

use futures::future::{BoxFuture, FutureExt};
use serde::{Deserialize, Serialize};

use crate::errors::BackendError;

/// The service level a user is entitled to.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    Anonymous,
    Authenticated,
    Premium,
}

impl Tier {
    /// Returns the package quota for this tier.
    pub const fn quota(self) -> Quota {
        match self {
            Tier::Anonymous => Quota {
                daily: 1,
                monthly: 10,
            },
            Tier::Authenticated => Quota {
                daily: 4,
                monthly: 50,
            },
            Tier::Premium => Quota {
                daily: 20,
                monthly: 200,
            },
        }
    }
}

impl Default for Tier {
    fn default() -> Self {
        Tier::Anonymous
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let name = match self {
            Tier::Anonymous => "anonymous",
            Tier::Authenticated => "authenticated",
            Tier::Premium => "premium",
        };

        write!(f, "{}", name)
    }
}

impl FromStr for Tier {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "anonymous" => Ok(Tier::Anonymous),
            "authenticated" => Ok(Tier::Authenticated),
            "premium" => Ok(Tier::Premium),
            other => Err(format!("unknown tier: {}", other)),
        }
    }
}

/// How many packages a tier may generate per window.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Quota {
    pub daily: u32,
    pub monthly: u32,
}

/// A resolved caller: a stable user ID plus their tier.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Identity {
    pub user_id: String,
    pub tier: Tier,
}

impl Identity {
    /// The identity assumed when resolution fails. Grants the least
    /// privileged tier and the shared fallback allocation range.
    pub(crate) fn fallback() -> Identity {
        Identity {
            user_id: "default".to_owned(),
            tier: Tier::Anonymous,
        }
    }
}

/// An authenticated account as reported by the auth layer.
#[derive(Clone, Debug)]
pub struct UserProfile {
    pub(crate) id: String,
    pub(crate) email: Option<String>,
    pub(crate) premium: bool,
}

impl UserProfile {
    pub fn new(id: impl Into<String>, email: Option<String>, premium: bool) -> Self {
        Self {
            id: id.into(),
            email,
            premium,
        }
    }
}

/// Resolves the calling user. Allocation and quota decisions key off
/// the returned ID, so implementations must be stable across calls.
pub trait IdentityProvider: Send + Sync {
    fn resolve(&self) -> BoxFuture<Result<Identity, BackendError>>;
}

/// An [`IdentityProvider`] for a signed-in user.
pub struct FixedIdentity {
    profile: UserProfile,
}

impl FixedIdentity {
    pub fn new(profile: UserProfile) -> Self {
        Self { profile }
    }
}

impl IdentityProvider for FixedIdentity {
    fn resolve(&self) -> BoxFuture<Result<Identity, BackendError>> {
        let identity = Identity {
            user_id: self.profile.id.clone(),
            tier: if self.profile.premium {
                Tier::Premium
            } else {
                Tier::Authenticated
            },
        };

        async move { Ok(identity) }.boxed()
    }
}

/// An [`IdentityProvider`] for anonymous users, deriving a stable
/// pseudonymous ID from an environment fingerprint.
pub struct FingerprintIdentity {
    fingerprint: String,
}

impl FingerprintIdentity {
    pub fn new(fingerprint: impl Into<String>) -> Self {
        Self {
            fingerprint: fingerprint.into(),
        }
    }

    /// The `anon_`-prefixed ID this fingerprint maps to.
    pub fn anonymous_id(&self) -> String {
        format!(
            "anon_{}",
            base36(fingerprint_hash(&self.fingerprint).unsigned_abs())
        )
    }
}

impl IdentityProvider for FingerprintIdentity {
    fn resolve(&self) -> BoxFuture<Result<Identity, BackendError>> {
        let identity = Identity {
            user_id: self.anonymous_id(),
            tier: Tier::Anonymous,
        };

        async move { Ok(identity) }.boxed()
    }
}

/// An [`IdentityProvider`] that always fails, for exercising the
/// fallback paths.
#[cfg(test)]
pub(crate) struct NoIdentity;

#[cfg(test)]
impl IdentityProvider for NoIdentity {
    fn resolve(&self) -> BoxFuture<Result<Identity, BackendError>> {
        async {
            Err(BackendError::IdentityUnavailable {
                message: "no provider configured".to_owned(),
            })
        }
        .boxed()
    }
}

/// Hashes a fingerprint with the classic 31-multiplier string hash
/// over UTF-16 code units, wrapping in 32 bits.
fn fingerprint_hash(fingerprint: &str) -> i32 {
    let mut hash: i32 = 0;

    for unit in fingerprint.encode_utf16() {
        hash = hash.wrapping_mul(31).wrapping_add(i32::from(unit));
    }

    hash
}

fn base36(mut value: u32) -> String {
    const DIGITS: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";

    if value == 0 {
        return "0".to_owned();
    }

    let mut digits = Vec::new();
    while value > 0 {
        digits.push(char::from(DIGITS[(value % 36) as usize]));
        value /= 36;
    }

    digits.iter().rev().collect()
}
