//! Catálogo de productos en memoria, embebido en el binario.

use once_cell::sync::Lazy;

use crate::models::{Product, Recommendation, ResolvedRecommendation};

/// JSON del catálogo, incrustado en tiempo de compilación.
const CATALOG_JSON: &str = include_str!("../data/product_catalog.json");

/// Catálogo deserializado una sola vez en el primer acceso.
static PRODUCT_CATALOG: Lazy<Vec<Product>> = Lazy::new(|| {
    serde_json::from_str(CATALOG_JSON).expect("data/product_catalog.json inválido")
});

/// Devuelve el catálogo completo en el orden del fichero embebido.
pub fn product_catalog() -> &'static [Product] {
    &PRODUCT_CATALOG
}

/// Busca un producto por su identificador.
pub fn find_product<'a>(catalog: &'a [Product], product_id: &str) -> Option<&'a Product> {
    catalog.iter().find(|product| product.id == product_id)
}

/// Cruza las recomendaciones de la IA con el catálogo.
/// Las que apuntan a un producto inexistente se descartan en silencio;
/// el resto conserva el orden en que la IA las devolvió.
pub fn resolve_recommendations(
    recommendations: &[Recommendation],
    catalog: &[Product],
) -> Vec<ResolvedRecommendation> {
    recommendations
        .iter()
        .filter_map(|rec| {
            find_product(catalog, &rec.product_id).map(|product| ResolvedRecommendation {
                product: product.clone(),
                confidence: rec.confidence,
                reasoning: rec.reasoning.clone(),
                matched_features: rec.matched_features.clone(),
            })
        })
        .collect()
}
