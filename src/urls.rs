use url::Url;

/// Convenience wrapper for URL generation functions.
#[derive(Clone)]
pub struct Urls {
    /// Top-level URL, including trailing slash.
    base: Url,

    /// Path for all ISRC-related actions.
    pub(crate) isrc_path: String,

    /// Prefix for all ISRC-related actions.
    isrc_prefix: String,

    /// Path for all usage-related actions.
    pub(crate) usage_path: String,
}

impl Urls {
    /// Create a new instance. The path arguments should *not* include a trailing slash.
    pub fn new(
        base: impl AsRef<str>,
        isrc_path: impl Into<String>,
        usage_path: impl Into<String>,
    ) -> Self {
        let base =
            Url::parse(base.as_ref()).unwrap_or_else(|_| panic!("parse {} as URL", base.as_ref()));
        let isrc_path = isrc_path.into();
        let isrc_prefix = format!("{}/", isrc_path);
        let usage_path = usage_path.into();

        Urls {
            base,
            isrc_path,
            isrc_prefix,
            usage_path,
        }
    }

    pub fn isrc_codes(&self) -> Url {
        self.base
            .join(&self.isrc_prefix)
            .expect("get ISRC codes URL")
    }

    pub fn isrc_code(&self, code: &str) -> Url {
        self.isrc_codes()
            .join(&format!("code/{}", code))
            .unwrap_or_else(|_| panic!("get URL for code {}", code))
    }
}
