//! Cliente del asesor de productos sobre la API `generateContent` de Gemini.
//! Construye el prompt, llama al modelo y traduce la respuesta a tipos propios.

use std::time::Duration;

use anyhow::{anyhow, Result};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use url::Url;

use crate::config::AppConfig;
use crate::models::{Product, Recommendation, RecommendationResult};

/// Resumen usado cuando el modelo no devuelve uno; el frontend espera
/// este literal exacto, por eso no se traduce.
const NO_SUMMARY_FALLBACK: &str = "No summary provided";

/// Errores de una consulta de recomendación, de cara al manejador HTTP.
#[derive(Debug, Error)]
pub enum AdvisorError {
    #[error("La consulta está vacía; describe qué producto buscas")]
    EmptyQuery,
    #[error("Error de red contra la API generativa: {0}")]
    Network(String),
    #[error("La API generativa no devolvió ningún texto")]
    EmptyResponse,
    #[error("No se pudo interpretar la respuesta de la API: {0}")]
    Parse(String),
    #[error("La API generativa no respondió dentro del plazo")]
    Timeout,
    #[error("Consulta cancelada por una búsqueda más reciente")]
    Cancelled,
}

impl AdvisorError {
    fn from_transport(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout
        } else if err.is_decode() {
            Self::EmptyResponse
        } else {
            Self::Network(err.to_string())
        }
    }
}

// --- Tipos del contrato JSON de generateContent ---

#[derive(Serialize)]
struct GeminiRequest<'a> {
    contents: Vec<GeminiContent<'a>>,
}

#[derive(Serialize)]
struct GeminiContent<'a> {
    parts: Vec<GeminiTextPart<'a>>,
}

#[derive(Serialize)]
struct GeminiTextPart<'a> {
    text: &'a str,
}

#[derive(Deserialize)]
struct GeminiResponse {
    candidates: Option<Vec<GeminiCandidate>>,
}

#[derive(Deserialize)]
struct GeminiCandidate {
    content: Option<GeminiCandidateContent>,
}

#[derive(Deserialize)]
struct GeminiCandidateContent {
    parts: Option<Vec<GeminiResponsePart>>,
}

#[derive(Deserialize)]
struct GeminiResponsePart {
    text: Option<String>,
}

/// Cliente HTTP del asesor. Es barato de clonar y se comparte entre handlers.
#[derive(Clone)]
pub struct AdvisorClient {
    http: Client,
    endpoint: Url,
    api_key: String,
    request_timeout: Duration,
}

impl AdvisorClient {
    /// Construye el cliente validando la URL del endpoint.
    pub fn new(api_url: &str, api_key: &str, request_timeout: Duration) -> Result<Self> {
        let endpoint =
            Url::parse(api_url).map_err(|_| anyhow!("GEMINI_API_URL inválida: {api_url}"))?;
        Ok(Self {
            http: Client::new(),
            endpoint,
            api_key: api_key.to_string(),
            request_timeout,
        })
    }

    /// Construye el cliente a partir de la configuración.
    pub fn from_config(cfg: &AppConfig) -> Result<Self> {
        Self::new(
            &cfg.gemini_api_url,
            &cfg.gemini_api_key,
            Duration::from_secs(cfg.request_timeout_secs),
        )
    }

    /// Pide recomendaciones para una consulta contra el catálogo dado.
    ///
    /// La consulta en blanco falla sin tocar la red. El token permite
    /// abortar la llamada cuando llega una búsqueda más reciente.
    pub async fn recommend(
        &self,
        query: &str,
        catalog: &[Product],
        cancel: CancellationToken,
    ) -> Result<RecommendationResult, AdvisorError> {
        if query.trim().is_empty() {
            return Err(AdvisorError::EmptyQuery);
        }
        if cancel.is_cancelled() {
            return Err(AdvisorError::Cancelled);
        }

        let prompt = build_prompt(query, catalog);

        let raw = tokio::select! {
            _ = cancel.cancelled() => return Err(AdvisorError::Cancelled),
            resultado = self.generate_content(&prompt) => resultado?,
        };

        parse_ai_text(&raw)
    }

    /// Llama a `generateContent` y devuelve el texto del primer candidato.
    async fn generate_content(&self, prompt: &str) -> Result<String, AdvisorError> {
        // La clave viaja como parámetro de query, igual que espera la API.
        let mut url = self.endpoint.clone();
        url.query_pairs_mut().append_pair("key", &self.api_key);

        let body = GeminiRequest {
            contents: vec![GeminiContent {
                parts: vec![GeminiTextPart { text: prompt }],
            }],
        };

        debug!("Enviando prompt de {} caracteres a la API generativa", prompt.len());

        let response = self
            .http
            .post(url)
            .json(&body)
            .timeout(self.request_timeout)
            .send()
            .await
            .map_err(AdvisorError::from_transport)?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(AdvisorError::Network(format!("estado {status}: {detail}")));
        }

        let envelope = response
            .json::<GeminiResponse>()
            .await
            .map_err(AdvisorError::from_transport)?;

        extract_first_text(envelope).ok_or(AdvisorError::EmptyResponse)
    }
}

/// Primer texto de la envolvente, siguiendo la cadena de campos opcionales
/// `candidates[0].content.parts[0].text`. Un texto vacío cuenta como ausente.
fn extract_first_text(response: GeminiResponse) -> Option<String> {
    response
        .candidates?
        .into_iter()
        .next()?
        .content?
        .parts?
        .into_iter()
        .next()?
        .text
        .filter(|text| !text.is_empty())
}

/// Construye el prompt completo: instrucciones fijas, consulta literal
/// del usuario y catálogo serializado producto a producto.
fn build_prompt(query: &str, catalog: &[Product]) -> String {
    let catalog_text = catalog
        .iter()
        .map(|product| {
            format!(
                "\nID: {}\nName: {}\nCategory: {}\nPrice: ${}\nDescription: {}\nSpecifications: {}\nRating: {}/5 ({} reviews)\nTags: {}\n---",
                product.id,
                product.name,
                product.category,
                product.price,
                product.description,
                serde_json::to_string(&product.specifications).unwrap_or_default(),
                product.rating,
                product.reviews,
                product.tags.join(", "),
            )
        })
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        r#"
You are an expert product advisor. Analyze the user's query and recommend the best matching products from the catalog.

User Query: "{query}"

Product Catalog:
{catalog_text}

Instructions:
1. Recommend 1-3 products that best match the user's needs
2. For each recommendation, provide:
   - Product ID
   - Confidence score (0-100)
   - Detailed reasoning explaining why this product matches
   - Specific features that match the user's requirements
3. Provide a brief summary of your recommendations

Respond ONLY in the following JSON format:
{{
  "recommendations": [
    {{
      "productId": "product-id",
      "confidence": 95,
      "reasoning": "Detailed explanation of why this product matches the user's needs",
      "matchedFeatures": ["feature1", "feature2", "feature3"]
    }}
  ],
  "summary": "Brief summary of recommendations and key considerations"
}}

Make sure your response is valid JSON and nothing else.
"#
    )
}

/// Quita las vallas de código que algunos modelos añaden alrededor del JSON.
/// Sólo se tocan los extremos; el interior queda intacto.
fn strip_code_fences(raw: &str) -> &str {
    raw.trim()
        .trim_start_matches("```json")
        .trim_start_matches("```")
        .trim_end_matches("```")
        .trim()
}

/// Interpreta el texto del modelo como resultado tipado.
///
/// Política tolerante: recomendaciones ausentes o nulas degradan a lista
/// vacía y cada entrada rellena sus campos que falten con los valores por
/// defecto. Un JSON ilegible, una raíz que no sea objeto o un campo con
/// tipo incorrecto sí son errores.
fn parse_ai_text(raw: &str) -> Result<RecommendationResult, AdvisorError> {
    let cleaned = strip_code_fences(raw);
    let value: Value =
        serde_json::from_str(cleaned).map_err(|e| AdvisorError::Parse(e.to_string()))?;
    if !value.is_object() {
        return Err(AdvisorError::Parse(
            "la raíz de la respuesta no es un objeto JSON".to_string(),
        ));
    }

    let recommendations: Vec<Recommendation> = match value.get("recommendations") {
        None | Some(Value::Null) => Vec::new(),
        Some(entries) => serde_json::from_value(entries.clone())
            .map_err(|e| AdvisorError::Parse(e.to_string()))?,
    };

    let summary = value
        .get("summary")
        .and_then(|s| s.as_str())
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| NO_SUMMARY_FALLBACK.to_string());

    Ok(RecommendationResult {
        recommendations,
        summary,
    })
}
