//! Server configuration, parsed from flags with environment fallbacks.

use clap::Parser;

#[derive(Debug, Clone, Parser)]
#[command(name = "sitesmith-server", version, about = "AI website builder server")]
pub struct ServerConfig {
    /// Address the HTTP API listens on.
    #[arg(long, env = "SITESMITH_LISTEN", default_value = "127.0.0.1:8080")]
    pub listen_addr: String,

    /// Model requested from the inference router.
    #[arg(
        long,
        env = "SITESMITH_MODEL",
        default_value = "deepseek-ai/DeepSeek-V3-0324"
    )]
    pub model: String,

    /// Base URL of the inference router (OpenAI-compatible streaming).
    #[arg(
        long,
        env = "SITESMITH_INFERENCE_URL",
        default_value = "https://router.huggingface.co"
    )]
    pub inference_base_url: String,

    /// Base URL of the artifact hub (repos, commits, raw files).
    #[arg(
        long,
        env = "SITESMITH_HUB_URL",
        default_value = "https://huggingface.co"
    )]
    pub hub_base_url: String,

    /// Shared API token used when a caller brings none of their own.
    #[arg(long, env = "SITESMITH_DEFAULT_TOKEN")]
    pub default_token: Option<String>,

    /// Anonymous generations allowed per client address.
    #[arg(long, env = "SITESMITH_FREE_GENERATIONS", default_value_t = 2)]
    pub free_generations: u32,

    /// Directory with the built web client, served as static files.
    #[arg(long, env = "SITESMITH_STATIC_DIR")]
    pub web_static_dir: Option<String>,
}

// Matches the clap defaults; tests build configs with `..Default::default()`.
impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: "127.0.0.1:8080".to_string(),
            model: "deepseek-ai/DeepSeek-V3-0324".to_string(),
            inference_base_url: "https://router.huggingface.co".to_string(),
            hub_base_url: "https://huggingface.co".to_string(),
            default_token: None,
            free_generations: 2,
            web_static_dir: None,
        }
    }
}
