//! API HTTP del asesor: el flujo de búsqueda que invoca al pipeline y los
//! endpoints de lectura que consumen la sesión y el catálogo.

use axum::{
    extract::{Json, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{error, info, warn};

use crate::{
    advisor::AdvisorError,
    app_state::{AppState, SessionSnapshot},
    catalog,
    models::{Product, ResolvedRecommendation},
};

// --- Payloads y Respuestas de la API ---

#[derive(Deserialize)]
pub struct SearchPayload {
    query: String,
}

/// Respuesta de una búsqueda: el resultado ya cruzado con el catálogo.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResponse {
    query: String,
    summary: String,
    recommendations: Vec<ResolvedRecommendation>,
}

/// Consultas de ejemplo que el cliente ofrece como chips de búsqueda.
const SEARCH_SUGGESTIONS: [&str; 5] = [
    "Lightweight laptop for travel",
    "Noise-canceling headphones",
    "Professional camera for photography",
    "Gaming laptop under $2000",
    "Wireless earbuds for workouts",
];

// --- Router ---

pub fn create_router(app_state: AppState) -> Router {
    Router::new()
        .route("/api/search", post(search_handler))
        .route("/api/session", get(session_handler))
        .route("/api/recommendations", get(recommendations_handler))
        .route("/api/products", get(products_handler))
        .route("/api/suggestions", get(suggestions_handler))
        .route("/api/health", get(health_handler))
        .route("/api/shutdown", post(shutdown_handler))
        .with_state(app_state)
}

// --- Handlers ---

/// Flujo completo de una búsqueda: registra la búsqueda en la sesión,
/// invoca al pipeline y aplica el resultado sólo si sigue vigente.
/// El candado de la sesión nunca se mantiene a través de un `.await`.
#[axum::debug_handler]
async fn search_handler(
    State(state): State<AppState>,
    Json(payload): Json<SearchPayload>,
) -> Result<Json<SearchResponse>, (StatusCode, Json<serde_json::Value>)> {
    let (seq, cancel) = state.session.lock().unwrap().begin_search(&payload.query);
    let catalog = catalog::product_catalog();

    match state.advisor.recommend(&payload.query, catalog, cancel).await {
        Ok(result) => {
            let applied = state
                .session
                .lock()
                .unwrap()
                .apply_success(seq, result.clone());
            if !applied {
                // Otra búsqueda llegó mientras ésta esperaba; su resultado ya no interesa.
                warn!("Resultado de la búsqueda #{seq} descartado por obsoleto");
                return Err((
                    StatusCode::CONFLICT,
                    Json(json!({"error": "La búsqueda fue sustituida por otra más reciente."})),
                ));
            }

            info!(
                "Búsqueda #{seq} completada con {} recomendaciones",
                result.recommendations.len()
            );
            Ok(Json(SearchResponse {
                query: payload.query,
                summary: result.summary,
                recommendations: catalog::resolve_recommendations(
                    &result.recommendations,
                    catalog,
                ),
            }))
        }
        Err(err) => {
            let message = err.to_string();
            // Si la búsqueda ya fue sustituida, el fallo se descarta igual que un éxito.
            state.session.lock().unwrap().apply_failure(seq, &message);
            error!("Búsqueda #{seq} fallida: {message}");
            Err((status_for(&err), Json(json!({"error": message}))))
        }
    }
}

/// Estado de la sesión tal cual, con el último resultado sin resolver.
#[axum::debug_handler]
async fn session_handler(State(state): State<AppState>) -> Json<SessionSnapshot> {
    Json(state.session.lock().unwrap().snapshot())
}

/// Último resultado cruzado con el catálogo: las recomendaciones cuyo
/// producto no existe se omiten aquí, no antes.
#[axum::debug_handler]
async fn recommendations_handler(State(state): State<AppState>) -> Json<serde_json::Value> {
    let snapshot = state.session.lock().unwrap().snapshot();
    match snapshot.recommendations {
        Some(result) => Json(json!({
            "query": snapshot.search_query,
            "summary": result.summary,
            "recommendations": catalog::resolve_recommendations(
                &result.recommendations,
                catalog::product_catalog(),
            ),
        })),
        None => Json(json!({
            "query": snapshot.search_query,
            "summary": serde_json::Value::Null,
            "recommendations": [],
        })),
    }
}

#[axum::debug_handler]
async fn products_handler() -> Json<&'static [Product]> {
    Json(catalog::product_catalog())
}

#[axum::debug_handler]
async fn suggestions_handler() -> Json<[&'static str; 5]> {
    Json(SEARCH_SUGGESTIONS)
}

#[axum::debug_handler]
async fn health_handler() -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "catalog_size": catalog::product_catalog().len(),
    }))
}

#[axum::debug_handler]
async fn shutdown_handler(State(state): State<AppState>) -> impl IntoResponse {
    info!("Petición de apagado recibida.");
    if let Some(sender) = state.shutdown_sender.lock().unwrap().take() {
        let _ = sender.send(());
    }
    StatusCode::OK
}

/// Traducción del error del pipeline a un estado HTTP.
fn status_for(err: &AdvisorError) -> StatusCode {
    match err {
        AdvisorError::EmptyQuery => StatusCode::BAD_REQUEST,
        AdvisorError::Network(_) | AdvisorError::EmptyResponse | AdvisorError::Parse(_) => {
            StatusCode::BAD_GATEWAY
        }
        AdvisorError::Timeout => StatusCode::GATEWAY_TIMEOUT,
        AdvisorError::Cancelled => StatusCode::CONFLICT,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::advisor::AdvisorClient;
    use crate::app_state::SearchSession;
    use crate::config::AppConfig;
    use serde_json::Value;
    use std::sync::{Arc, Mutex};
    use tokio::sync::oneshot;

    /// Stub local que interpreta el papel de la API generativa.
    async fn spawn_gemini_stub(reply_text: &str) -> String {
        let reply = json!({
            "candidates": [{ "content": { "parts": [{ "text": reply_text }] } }]
        });
        let app = Router::new().route(
            "/generate",
            post(move || {
                let reply = reply.clone();
                async move { Json(reply) }
            }),
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}/generate")
    }

    /// Levanta el router completo contra el stub y devuelve su URL base.
    async fn spawn_app(gemini_url: &str) -> String {
        let config = AppConfig {
            gemini_api_key: "clave-de-prueba".to_string(),
            gemini_api_url: gemini_url.to_string(),
            server_addr: "127.0.0.1:0".to_string(),
            request_timeout_secs: 5,
        };
        let advisor = AdvisorClient::from_config(&config).unwrap();
        let (shutdown_tx, _shutdown_rx) = oneshot::channel();
        let state = AppState {
            config,
            advisor,
            session: Arc::new(Mutex::new(SearchSession::default())),
            shutdown_sender: Arc::new(Mutex::new(Some(shutdown_tx))),
        };

        let app = create_router(state);
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}")
    }

    #[tokio::test]
    async fn el_flujo_de_busqueda_resuelve_contra_el_catalogo() {
        let stub = spawn_gemini_stub(
            r#"{"recommendations": [{"productId": "laptop-001", "confidence": 92, "reasoning": "Pesa 1,24 kg y su batería dura 18 horas", "matchedFeatures": ["lightweight", "travel"]}], "summary": "El MacBook Air es la mejor opción para viajar"}"#,
        )
        .await;
        let base = spawn_app(&stub).await;
        let http = reqwest::Client::new();

        let body: Value = http
            .post(format!("{base}/api/search"))
            .json(&json!({"query": "lightweight laptop for travel"}))
            .send()
            .await
            .unwrap()
            .error_for_status()
            .unwrap()
            .json()
            .await
            .unwrap();

        assert_eq!(body["query"], "lightweight laptop for travel");
        assert_eq!(
            body["summary"],
            "El MacBook Air es la mejor opción para viajar"
        );
        assert_eq!(body["recommendations"][0]["product"]["id"], "laptop-001");
        assert_eq!(
            body["recommendations"][0]["product"]["name"],
            "MacBook Air M3"
        );
        assert_eq!(body["recommendations"][0]["confidence"], 92);

        // La sesión refleja la búsqueda completada.
        let session: Value = http
            .get(format!("{base}/api/session"))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(session["searchQuery"], "lightweight laptop for travel");
        assert_eq!(session["loading"], false);
        assert!(session["error"].is_null());
        assert_eq!(
            session["recommendations"]["recommendations"][0]["productId"],
            "laptop-001"
        );

        // La vista resuelta omite ids desconocidos; aquí no hay ninguno.
        let resolved: Value = http
            .get(format!("{base}/api/recommendations"))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(
            resolved["recommendations"][0]["product"]["id"],
            "laptop-001"
        );
    }

    #[tokio::test]
    async fn una_consulta_vacia_responde_400_y_queda_registrada_en_sesion() {
        let base = spawn_app("http://127.0.0.1:9/generate").await;
        let http = reqwest::Client::new();

        let response = http
            .post(format!("{base}/api/search"))
            .json(&json!({"query": "   "}))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), reqwest::StatusCode::BAD_REQUEST);
        let body: Value = response.json().await.unwrap();
        assert!(body["error"].as_str().unwrap().contains("vacía"));

        let session: Value = http
            .get(format!("{base}/api/session"))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(session["loading"], false);
        assert!(session["error"].as_str().is_some());
    }

    #[tokio::test]
    async fn un_id_desconocido_sobrevive_en_crudo_pero_no_en_la_vista_resuelta() {
        let stub = spawn_gemini_stub(
            r#"{"recommendations": [{"productId": "producto-fantasma", "confidence": 70, "reasoning": "No existe", "matchedFeatures": []}, {"productId": "phone-001", "confidence": 85, "reasoning": "Cámara excelente", "matchedFeatures": ["camera"]}], "summary": "Dos candidatos"}"#,
        )
        .await;
        let base = spawn_app(&stub).await;
        let http = reqwest::Client::new();

        let body: Value = http
            .post(format!("{base}/api/search"))
            .json(&json!({"query": "móvil con buena cámara"}))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        // La resolución descarta el id fantasma y conserva el orden.
        assert_eq!(body["recommendations"].as_array().unwrap().len(), 1);
        assert_eq!(body["recommendations"][0]["product"]["id"], "phone-001");

        // El resultado crudo de la sesión conserva ambas entradas.
        let session: Value = http
            .get(format!("{base}/api/session"))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        let raw = session["recommendations"]["recommendations"]
            .as_array()
            .unwrap();
        assert_eq!(raw.len(), 2);
        assert_eq!(raw[0]["productId"], "producto-fantasma");
    }

    #[tokio::test]
    async fn los_endpoints_de_lectura_responden_sin_busqueda_previa() {
        let base = spawn_app("http://127.0.0.1:9/generate").await;
        let http = reqwest::Client::new();

        let products: Value = http
            .get(format!("{base}/api/products"))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(products.as_array().unwrap().len(), 10);

        let suggestions: Value = http
            .get(format!("{base}/api/suggestions"))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(suggestions[0], "Lightweight laptop for travel");

        let health: Value = http
            .get(format!("{base}/api/health"))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(health["status"], "ok");
        assert_eq!(health["catalog_size"], 10);

        let resolved: Value = http
            .get(format!("{base}/api/recommendations"))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert!(resolved["summary"].is_null());
        assert_eq!(resolved["recommendations"].as_array().unwrap().len(), 0);
    }
}
