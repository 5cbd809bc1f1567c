//! Configuração do roomify carregada a partir de `roomify.toml`.
//!
//! A struct [`AppConfig`] contém todos os parâmetros configuráveis.
//! Valores não presentes no arquivo usam defaults sensíveis.
//! Variáveis de ambiente (também lidas de um `.env`) têm precedência sobre o arquivo.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

use crate::orchestrator::{DEFAULT_INTERVAL, DEFAULT_MAX_ATTEMPTS};
use crate::rate_limit::{DEFAULT_LIMIT, DEFAULT_WINDOW};
use crate::replicate::API_URL;

const DEFAULT_CONFIG_FILE: &str = "roomify.toml";

/// Configuração de nível superior carregada de `roomify.toml`.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Token da API Replicate.
    #[serde(default)]
    pub api_token: String,

    /// Endpoint de criação de predições.
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,

    /// Porta HTTP do servidor.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Parâmetros de consulta de status.
    #[serde(default)]
    pub polling: PollingConfig,

    /// Parâmetros do limitador de requisições.
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
}

/// Intervalo fixo e número máximo de consultas de status por job.
#[derive(Debug, Clone, Deserialize)]
pub struct PollingConfig {
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,

    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
}

/// Janela fixa do limitador e credenciais opcionais do backend Redis (Upstash).
///
/// Sem credenciais e com `in_memory = false`, o limitador fica desligado.
#[derive(Debug, Clone, Deserialize)]
pub struct RateLimitConfig {
    /// Gerações permitidas por identidade dentro da janela.
    #[serde(default = "default_limit")]
    pub limit: u32,

    /// Duração da janela em segundos.
    #[serde(default = "default_window_secs")]
    pub window_secs: u64,

    /// URL REST do Upstash.
    #[serde(default)]
    pub redis_rest_url: Option<String>,

    /// Token REST do Upstash.
    #[serde(default)]
    pub redis_rest_token: Option<String>,

    /// Usa um contador em memória quando não há Redis configurado.
    #[serde(default)]
    pub in_memory: bool,
}

// Endpoint padrão da Replicate.
fn default_api_base_url() -> String {
    API_URL.to_string()
}

// Porta padrão: 3000.
fn default_port() -> u16 {
    3000
}

// Intervalo padrão entre consultas: 1000ms.
fn default_interval_ms() -> u64 {
    DEFAULT_INTERVAL.as_millis() as u64
}

// Máximo padrão de consultas: 30.
fn default_max_attempts() -> u32 {
    DEFAULT_MAX_ATTEMPTS
}

// Limite padrão: 5 gerações.
fn default_limit() -> u32 {
    DEFAULT_LIMIT
}

// Janela padrão: 24 horas.
fn default_window_secs() -> u64 {
    DEFAULT_WINDOW.as_secs()
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            interval_ms: default_interval_ms(),
            max_attempts: default_max_attempts(),
        }
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            limit: default_limit(),
            window_secs: default_window_secs(),
            redis_rest_url: None,
            redis_rest_token: None,
            in_memory: false,
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_token: String::new(),
            api_base_url: default_api_base_url(),
            port: default_port(),
            polling: PollingConfig::default(),
            rate_limit: RateLimitConfig::default(),
        }
    }
}

impl AppConfig {
    /// Carrega a configuração do caminho informado ou de `roomify.toml` no
    /// diretório atual. Usa valores padrão se o arquivo não existir.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        // `.env` é opcional.
        let _ = dotenvy::dotenv();

        let path = path.unwrap_or_else(|| Path::new(DEFAULT_CONFIG_FILE));
        let mut config = Self::from_file(path)?;
        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Lê um arquivo TOML; arquivo ausente resulta nos defaults.
    pub fn from_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let config = toml::from_str::<AppConfig>(&contents)
            .with_context(|| format!("failed to parse {}", path.display()))?;
        Ok(config)
    }

    /// Aplica variáveis de ambiente não vazias por cima dos valores do arquivo.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let get = |key: &str| lookup(key).filter(|v| !v.is_empty());

        if let Some(token) = get("REPLICATE_API_KEY") {
            self.api_token = token;
        }
        if let Some(port) = get("PORT").and_then(|p| p.parse().ok()) {
            self.port = port;
        }
        if let Some(url) = get("UPSTASH_REDIS_REST_URL") {
            self.rate_limit.redis_rest_url = Some(url);
        }
        if let Some(token) = get("UPSTASH_REDIS_REST_TOKEN") {
            self.rate_limit.redis_rest_token = Some(token);
        }
    }

    /// Falha se o token da Replicate não estiver configurado.
    pub fn require_api_token(&self) -> Result<()> {
        if self.api_token.trim().is_empty() {
            anyhow::bail!(
                "Replicate API token missing: set REPLICATE_API_KEY or api_token in {DEFAULT_CONFIG_FILE}"
            );
        }
        Ok(())
    }
}
