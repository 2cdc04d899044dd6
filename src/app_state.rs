use std::sync::{Arc, Mutex};
use chrono::{DateTime, Utc};
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;
use crate::{advisor::AdvisorClient, config::AppConfig, models::RecommendationResult};

#[derive(Clone)]
pub struct AppState {
    pub config: AppConfig,
    pub advisor: AdvisorClient,
    pub session: Arc<Mutex<SearchSession>>,
    pub shutdown_sender: Arc<Mutex<Option<oneshot::Sender<()>>>>,
}

/// Sesión de búsqueda compartida entre handlers.
///
/// Cada búsqueda recibe un número de secuencia creciente y un token de
/// cancelación; sólo el resultado de la secuencia vigente puede escribirse,
/// así una respuesta lenta nunca pisa a una búsqueda posterior. Mientras
/// `loading` es verdadero, `error` es siempre `None`.
#[derive(Debug, Default)]
pub struct SearchSession {
    query: String,
    result: Option<RecommendationResult>,
    loading: bool,
    error: Option<String>,
    searched_at: Option<DateTime<Utc>>,
    latest_seq: u64,
    active_cancel: CancellationToken,
}

/// Copia serializable del estado de la sesión, tal y como viaja al cliente.
#[derive(Debug, Clone, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    pub search_query: String,
    pub recommendations: Option<RecommendationResult>,
    pub loading: bool,
    pub error: Option<String>,
    pub searched_at: Option<DateTime<Utc>>,
}

impl SearchSession {
    /// Registra una nueva búsqueda: cancela la llamada anterior, avanza la
    /// secuencia y deja la sesión en carga. La consulta se guarda literal.
    /// El último resultado bueno se conserva hasta que otro lo sustituya.
    pub fn begin_search(&mut self, query: &str) -> (u64, CancellationToken) {
        self.active_cancel.cancel();
        self.active_cancel = CancellationToken::new();
        self.latest_seq += 1;
        self.query = query.to_string();
        self.loading = true;
        self.error = None;
        self.searched_at = Some(Utc::now());
        (self.latest_seq, self.active_cancel.clone())
    }

    /// Aplica un resultado si su secuencia sigue siendo la vigente.
    /// Devuelve `false` cuando llega obsoleto y se descarta.
    pub fn apply_success(&mut self, seq: u64, result: RecommendationResult) -> bool {
        if self.is_stale(seq) {
            return false;
        }
        self.result = Some(result);
        self.error = None;
        self.loading = false;
        true
    }

    /// Registra un fallo si su secuencia sigue siendo la vigente.
    pub fn apply_failure(&mut self, seq: u64, message: &str) -> bool {
        if self.is_stale(seq) {
            return false;
        }
        self.error = Some(message.to_string());
        self.loading = false;
        true
    }

    fn is_stale(&self, seq: u64) -> bool {
        seq != self.latest_seq
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            search_query: self.query.clone(),
            recommendations: self.result.clone(),
            loading: self.loading,
            error: self.error.clone(),
            searched_at: self.searched_at,
        }
    }
}
