//! API configuration.

use std::path::PathBuf;
use std::time::Duration;

/// API server configuration.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// Server host
    pub host: String,
    /// Server port
    pub port: u16,
    /// CORS origins
    pub cors_origins: Vec<String>,
    /// Root for per-request scratch workspaces
    pub scratch_root: PathBuf,
    /// Persistent root for final deliverables
    pub outputs_root: PathBuf,
    /// Renderer binary
    pub manim_binary: String,
    /// Renderer quality preset flag
    pub manim_quality_flag: String,
    /// Render subprocess deadline
    pub render_timeout: Duration,
    /// Render repair attempt cap
    pub repair_max_attempts: u32,
    /// Structured-output parse attempt cap
    pub parse_max_attempts: u32,
    /// Whether any renderer stderr fails an attempt
    pub strict_stderr: bool,
    /// Completion service base URL
    pub llm_base_url: String,
    /// Completion service API key
    pub llm_api_key: String,
    /// Completion model name
    pub llm_model: String,
    /// TTS service base URL
    pub tts_base_url: String,
    /// TTS service API key
    pub tts_api_key: String,
    /// Default TTS voice identifier
    pub tts_voice_id: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            cors_origins: vec!["*".to_string()],
            scratch_root: PathBuf::from("./scratch"),
            outputs_root: PathBuf::from("./outputs"),
            manim_binary: "manim".to_string(),
            manim_quality_flag: "-ql".to_string(),
            render_timeout: Duration::from_millis(120_000),
            repair_max_attempts: 3,
            parse_max_attempts: 3,
            strict_stderr: true,
            llm_base_url: "https://api.openai.com/v1".to_string(),
            llm_api_key: String::new(),
            llm_model: "gpt-4o-mini".to_string(),
            tts_base_url: "https://api.elevenlabs.io".to_string(),
            tts_api_key: String::new(),
            tts_voice_id: "21m00Tcm4TlvDq8ikWAM".to_string(),
        }
    }
}

fn env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

fn env_string(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

impl ApiConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            host: env_string("API_HOST", &defaults.host),
            port: env_or("API_PORT", defaults.port),
            cors_origins: std::env::var("CORS_ORIGINS")
                .map(|s| s.split(',').map(|s| s.trim().to_string()).collect())
                .unwrap_or(defaults.cors_origins),
            scratch_root: env_string("SCRATCH_ROOT", "./scratch").into(),
            outputs_root: env_string("OUTPUTS_ROOT", "./outputs").into(),
            manim_binary: env_string("MANIM_BINARY", &defaults.manim_binary),
            manim_quality_flag: env_string("MANIM_QUALITY_FLAG", &defaults.manim_quality_flag),
            render_timeout: Duration::from_millis(env_or("RENDER_TIMEOUT_MS", 120_000u64)),
            repair_max_attempts: env_or("REPAIR_MAX_ATTEMPTS", defaults.repair_max_attempts),
            parse_max_attempts: env_or("PARSE_MAX_ATTEMPTS", defaults.parse_max_attempts),
            strict_stderr: env_or("STRICT_STDERR", defaults.strict_stderr),
            llm_base_url: env_string("LLM_BASE_URL", &defaults.llm_base_url),
            llm_api_key: env_string("LLM_API_KEY", ""),
            llm_model: env_string("LLM_MODEL", &defaults.llm_model),
            tts_base_url: env_string("TTS_BASE_URL", &defaults.tts_base_url),
            tts_api_key: env_string("TTS_API_KEY", ""),
            tts_voice_id: env_string("TTS_VOICE_ID", &defaults.tts_voice_id),
        }
    }
}
