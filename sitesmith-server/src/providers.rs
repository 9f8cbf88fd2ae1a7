//! Static catalog of inference providers and their constraints.
//!
//! Resolution never fails: `"auto"` and unknown keys fall back to the
//! default provider, so a stale client preference can't block generation.

/// One inference provider reachable through the routing gateway.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProviderDescriptor {
    /// Key clients send to select this provider.
    pub key: &'static str,
    /// Human-readable name, used in error messages.
    pub name: &'static str,
    /// Path segment on the inference router.
    pub id: &'static str,
    /// Approximate context ceiling, in tokens.
    pub max_tokens: usize,
    /// Whether the backend accepts an explicit `max_tokens` cap.
    pub supports_max_tokens_param: bool,
    /// Whether the backend keeps generating past the closing document
    /// marker, so the stream must be trimmed after it.
    pub quirky_truncation: bool,
}

/// Sentinel key meaning "let the server pick".
pub const AUTO: &str = "auto";

const DEFAULT_KEY: &str = "novita";

static PROVIDERS: &[ProviderDescriptor] = &[
    ProviderDescriptor {
        key: "fireworks-ai",
        name: "Fireworks AI",
        id: "fireworks-ai",
        max_tokens: 131_000,
        supports_max_tokens_param: true,
        quirky_truncation: false,
    },
    ProviderDescriptor {
        key: "nebius",
        name: "Nebius AI Studio",
        id: "nebius",
        max_tokens: 41_000,
        supports_max_tokens_param: true,
        quirky_truncation: false,
    },
    ProviderDescriptor {
        key: "sambanova",
        name: "SambaNova",
        id: "sambanova",
        max_tokens: 8_000,
        supports_max_tokens_param: false,
        quirky_truncation: true,
    },
    ProviderDescriptor {
        key: "novita",
        name: "NovitaAI",
        id: "novita",
        max_tokens: 16_000,
        supports_max_tokens_param: true,
        quirky_truncation: false,
    },
    ProviderDescriptor {
        key: "hyperbolic",
        name: "Hyperbolic",
        id: "hyperbolic",
        max_tokens: 131_000,
        supports_max_tokens_param: true,
        quirky_truncation: false,
    },
];

/// Look up a provider by key. `"auto"` and unknown keys resolve to the
/// default provider.
pub fn resolve(key: &str) -> &'static ProviderDescriptor {
    PROVIDERS
        .iter()
        .find(|p| p.key == key)
        .unwrap_or_else(|| {
            PROVIDERS
                .iter()
                .find(|p| p.key == DEFAULT_KEY)
                .expect("default provider present in catalog")
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_key_resolves() {
        assert_eq!(resolve("sambanova").key, "sambanova");
        assert_eq!(resolve("fireworks-ai").max_tokens, 131_000);
    }

    #[test]
    fn auto_and_unknown_fall_back_to_default() {
        assert_eq!(resolve(AUTO).key, DEFAULT_KEY);
        assert_eq!(resolve("no-such-provider").key, DEFAULT_KEY);
        assert_eq!(resolve("").key, DEFAULT_KEY);
    }

    #[test]
    fn quirky_provider_rejects_token_cap() {
        let p = resolve("sambanova");
        assert!(p.quirky_truncation);
        assert!(!p.supports_max_tokens_param);
    }
}
