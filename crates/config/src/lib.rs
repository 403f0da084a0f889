//! Configuration for the omnibrain daemon.
//!
//! Loaded from a TOML file on disk with environment-variable overrides
//! layered on top, matching the `load_from`/`save_to` round-trip shape the
//! rest of the workspace expects.

use std::env;
use std::fs;
use std::path::Path;

use anyhow::Result;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    pub name: String,
    pub user_name: String,
    pub data_dir: String,
    pub log_dir: String,
    pub log_level: String,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            name: "Omnibrain".to_string(),
            user_name: String::new(),
            data_dir: ".omnibrain".to_string(),
            log_dir: ".omnibrain/logs".to_string(),
            log_level: "info".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    pub provider: String,
    pub ollama_model: String,
    pub openrouter_model: String,
    pub ollama_local_first: bool,
    pub ollama_base_url: String,
    pub deepseek_api_key: Option<String>,
    pub openai_api_key: Option<String>,
    pub anthropic_api_key: Option<String>,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: "ollama".to_string(),
            ollama_model: "llama3.1:8b".to_string(),
            openrouter_model: "openai/gpt-4o-mini".to_string(),
            ollama_local_first: true,
            ollama_base_url: "http://localhost:11434".to_string(),
            deepseek_api_key: None,
            openai_api_key: None,
            anthropic_api_key: None,
        }
    }
}

/// Memory/store tuning knobs referenced by `omnibrain-memory`,
/// `omnibrain-patterns`, and `omnibrain-proactive`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MemoryConfig {
    pub backend: String,
    pub kv_tier_limit: usize,
    pub timezone: String,
    pub forget_episodic_after_days: i64,
    pub forget_min_confidence: f32,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            backend: "sqlite".to_string(),
            kv_tier_limit: 5_000,
            timezone: "UTC".to_string(),
            forget_episodic_after_days: 180,
            forget_min_confidence: 0.3,
        }
    }
}

/// Proactive-engine scheduling and quiet-hours knobs.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProactiveConfig {
    pub check_interval_minutes: u64,
    pub briefing_time: String,
    pub evening_time: String,
    pub proactive_interval_minutes: u64,
    pub proactive_dnd_start_hour: u8,
    pub proactive_dnd_end_hour: u8,
    pub proactive_cooldown_minutes: u64,
    pub max_critical_per_hour: usize,
}

impl Default for ProactiveConfig {
    fn default() -> Self {
        Self {
            check_interval_minutes: 15,
            briefing_time: "08:00".to_string(),
            evening_time: "18:00".to_string(),
            proactive_interval_minutes: 30,
            proactive_dnd_start_hour: 22,
            proactive_dnd_end_hour: 7,
            proactive_cooldown_minutes: 20,
            max_critical_per_hour: 3,
        }
    }
}

/// Tool/skill execution policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolsConfig {
    pub brave_api_key: Option<String>,
    pub approval_mode: String,
    pub git_auto_commit: bool,
    pub sandbox_enabled: bool,
    pub skill_timeout_seconds: u64,
    pub skill_rate_cap: u32,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            brave_api_key: None,
            approval_mode: "balanced".to_string(),
            git_auto_commit: false,
            sandbox_enabled: true,
            skill_timeout_seconds: 60,
            skill_rate_cap: 100,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SafetyConfig {
    pub approval_required: bool,
    pub tool_allowlist: Vec<String>,
    pub tool_denylist: Vec<String>,
    pub approval_exempt_tools: Vec<String>,
}

impl Default for SafetyConfig {
    fn default() -> Self {
        Self {
            approval_required: true,
            tool_allowlist: Vec::new(),
            tool_denylist: Vec::new(),
            approval_exempt_tools: vec!["log".to_string()],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TelemetryConfig {
    pub log_level: String,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct OnboardingConfig {
    pub completed: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IntegrationsConfig {
    pub telegram_enabled: bool,
    pub telegram_bot_token: Option<String>,
    pub telegram_chat_id: Option<String>,
}

impl Default for IntegrationsConfig {
    fn default() -> Self {
        Self {
            telegram_enabled: false,
            telegram_bot_token: None,
            telegram_chat_id: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DaemonConfig {
    pub api_host: String,
    pub api_port: u16,
    pub api_key: Option<String>,
    pub encryption_key: Option<String>,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            api_host: "127.0.0.1".to_string(),
            api_port: 8765,
            api_key: None,
            encryption_key: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub agent: AgentConfig,
    pub llm: LlmConfig,
    pub memory: MemoryConfig,
    pub proactive: ProactiveConfig,
    pub tools: ToolsConfig,
    pub safety: SafetyConfig,
    pub telemetry: TelemetryConfig,
    pub onboarding: OnboardingConfig,
    pub integrations: IntegrationsConfig,
    pub daemon: DaemonConfig,
}

impl AppConfig {
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let mut config = Self::default();
        if let Ok(raw) = fs::read_to_string(path) {
            config = toml::from_str(&raw)?;
        }
        config.apply_env_overrides();
        Ok(config)
    }

    /// Layer recognized environment variables over whatever the TOML file
    /// specified (spec §6.5). Env wins because it is how operators override
    /// a checked-in config without editing it.
    fn apply_env_overrides(&mut self) {
        if let Ok(v) = env::var("OMNIBRAIN_ENCRYPTION_KEY") {
            if !v.is_empty() {
                self.daemon.encryption_key = Some(v);
            }
        }
        if let Ok(v) = env::var("DEEPSEEK_API_KEY") {
            if !v.is_empty() {
                self.llm.deepseek_api_key = Some(v);
            }
        }
        if let Ok(v) = env::var("OPENAI_API_KEY") {
            if !v.is_empty() {
                self.llm.openai_api_key = Some(v);
            }
        }
        if let Ok(v) = env::var("ANTHROPIC_API_KEY") {
            if !v.is_empty() {
                self.llm.anthropic_api_key = Some(v);
            }
        }
        if let Ok(v) = env::var("data_dir") {
            if !v.is_empty() {
                self.agent.data_dir = v;
            }
        }
        if let Ok(v) = env::var("log_dir") {
            if !v.is_empty() {
                self.agent.log_dir = v;
            }
        }
        if let Ok(v) = env::var("log_level") {
            if !v.is_empty() {
                self.agent.log_level = v.clone();
                self.telemetry.log_level = v;
            }
        }
        if let Ok(v) = env::var("api_host") {
            if !v.is_empty() {
                self.daemon.api_host = v;
            }
        }
        if let Ok(v) = env::var("api_port") {
            if let Ok(port) = v.parse() {
                self.daemon.api_port = port;
            }
        }
        if let Ok(v) = env::var("check_interval_minutes") {
            if let Ok(m) = v.parse() {
                self.proactive.check_interval_minutes = m;
            }
        }
        if let Ok(v) = env::var("briefing_time") {
            if !v.is_empty() {
                self.proactive.briefing_time = v;
            }
        }
        if let Ok(v) = env::var("evening_time") {
            if !v.is_empty() {
                self.proactive.evening_time = v;
            }
        }
        if let Ok(v) = env::var("telegram_bot_token") {
            if !v.is_empty() {
                self.integrations.telegram_bot_token = Some(v);
                self.integrations.telegram_enabled = true;
            }
        }
        if let Ok(v) = env::var("telegram_chat_id") {
            if !v.is_empty() {
                self.integrations.telegram_chat_id = Some(v);
            }
        }
        if let Ok(value) = env::var("OLLAMA_BASE_URL") {
            if !value.is_empty() {
                self.llm.ollama_base_url = value;
                self.llm.provider = "ollama".to_string();
            }
        }
    }

    pub fn save_to(&self, path: impl AsRef<Path>) -> Result<()> {
        if let Some(parent) = path.as_ref().parent() {
            fs::create_dir_all(parent)?;
        }

        let rendered = toml::to_string_pretty(self)?;
        fs::write(path, rendered)?;
        Ok(())
    }

    pub fn active_model(&self) -> &str {
        if self.llm.provider.eq_ignore_ascii_case("openrouter") {
            &self.llm.openrouter_model
        } else {
            &self.llm.ollama_model
        }
    }

    pub fn needs_onboarding(&self) -> bool {
        !self.onboarding.completed
    }

    /// Store/memory database paths under the configured data directory,
    /// matching the on-disk layout in spec §6.2.
    pub fn store_path(&self) -> std::path::PathBuf {
        Path::new(&self.agent.data_dir).join("omnibrain.db")
    }

    pub fn memory_path(&self) -> std::path::PathBuf {
        Path::new(&self.agent.data_dir).join("memory.db")
    }

    pub fn skills_dir(&self) -> std::path::PathBuf {
        Path::new(&self.agent.data_dir).join("skills")
    }

    pub fn log_file_path(&self) -> std::path::PathBuf {
        Path::new(&self.agent.log_dir).join("omnibrain.log")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_round_trips_through_toml() {
        let config = AppConfig::default();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        config.save_to(&path).unwrap();
        let loaded = AppConfig::load_from(&path).unwrap();
        assert_eq!(loaded.agent.name, config.agent.name);
        assert_eq!(loaded.proactive.briefing_time, "08:00");
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let config = AppConfig::load_from("/nonexistent/path/config.toml").unwrap();
        assert_eq!(config.llm.provider, "ollama");
    }

    #[test]
    fn needs_onboarding_reflects_completed_flag() {
        let mut config = AppConfig::default();
        assert!(config.needs_onboarding());
        config.onboarding.completed = true;
        assert!(!config.needs_onboarding());
    }

    #[test]
    fn active_model_switches_on_provider() {
        let mut config = AppConfig::default();
        assert_eq!(config.active_model(), "llama3.1:8b");
        config.llm.provider = "openrouter".to_string();
        assert_eq!(config.active_model(), "openai/gpt-4o-mini");
    }
}
