//! Pagination limits for list endpoints.

use serde::Deserialize;

/// Caps applied to paged list endpoints (notes, flashcards, questions).
#[derive(Debug, Clone, Deserialize)]
pub struct LimitsConfig {
    /// Page size used when the client does not ask for one (default: 50).
    #[serde(default = "default_page_size")]
    pub default_page_size: u32,

    /// Largest page size a client may request (default: 200).
    #[serde(default = "default_max_page_size")]
    pub max_page_size: u32,
}

impl LimitsConfig {
    /// Clamp a client-requested page size to the configured bounds.
    pub fn clamp_page_size(&self, requested: Option<u32>) -> u32 {
        match requested {
            Some(n) if n == 0 => self.default_page_size,
            Some(n) => n.min(self.max_page_size),
            None => self.default_page_size,
        }
    }
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            default_page_size: default_page_size(),
            max_page_size: default_max_page_size(),
        }
    }
}

fn default_page_size() -> u32 {
    50
}

fn default_max_page_size() -> u32 {
    200
}
