//! Carga y gestión de configuración de la aplicación (API generativa + servidor).

use std::env;
use anyhow::{anyhow, Result};

/// Endpoint `generateContent` usado cuando no se define GEMINI_API_URL.
pub const DEFAULT_GEMINI_API_URL: &str =
    "https://generativelanguage.googleapis.com/v1beta/models/gemini-1.5-flash-latest:generateContent";

const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Configuración completa de la aplicación.
#[derive(Clone, Debug)]
pub struct AppConfig {
    pub gemini_api_key: String,
    pub gemini_api_url: String,
    pub server_addr: String,
    pub request_timeout_secs: u64,
}

impl AppConfig {
    /// Carga la configuración desde variables de entorno (usando .env si existe).
    pub fn from_env() -> Result<Self> {
        let gemini_api_key = env::var("GEMINI_API_KEY")
            .map_err(|_| anyhow!("Falta GEMINI_API_KEY en el entorno"))?;

        let gemini_api_url =
            env::var("GEMINI_API_URL").unwrap_or_else(|_| DEFAULT_GEMINI_API_URL.to_string());

        let server_addr =
            env::var("SERVER_ADDR").unwrap_or_else(|_| "127.0.0.1:3344".to_string());

        let request_timeout_secs = match env::var("GEMINI_TIMEOUT_SECS") {
            Ok(raw) => raw
                .parse::<u64>()
                .map_err(|_| anyhow!("GEMINI_TIMEOUT_SECS debe ser un número entero de segundos"))?,
            Err(_) => DEFAULT_TIMEOUT_SECS,
        };

        Ok(Self {
            gemini_api_key,
            gemini_api_url,
            server_addr,
            request_timeout_secs,
        })
    }
}
