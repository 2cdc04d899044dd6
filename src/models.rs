//! Modelos de dominio (catálogo de productos y recomendaciones de la IA).

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Disponibilidad de un producto en el catálogo.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Availability {
    InStock,
    Limited,
    OutOfStock,
}

/// Representa un producto del catálogo en memoria.
/// Las especificaciones conservan el orden de inserción del JSON
/// para que el prompt generado sea determinista.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Product {
    pub id: String,
    pub name: String,
    pub category: String,
    pub price: f64,
    pub description: String,
    pub specifications: IndexMap<String, String>,
    pub rating: f64,
    pub reviews: u32,
    pub image: String,
    pub availability: Availability,
    pub tags: Vec<String>,
}

/// Una recomendación tal y como la devuelve la API generativa.
/// Todos los campos llevan valor por defecto: el modelo a veces
/// omite alguno y preferimos degradar antes que rechazar la respuesta.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Recommendation {
    pub product_id: String,
    pub confidence: i64,
    pub reasoning: String,
    pub matched_features: Vec<String>,
}

/// Resultado completo de una consulta: recomendaciones más un resumen.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecommendationResult {
    pub recommendations: Vec<Recommendation>,
    pub summary: String,
}

/// Recomendación con el producto del catálogo ya resuelto.
/// Es la forma que viaja hacia el cliente HTTP.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedRecommendation {
    pub product: Product,
    pub confidence: i64,
    pub reasoning: String,
    pub matched_features: Vec<String>,
}
