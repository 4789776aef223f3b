use axum::Json;
use nodes::CatalogEntry;

/// Every node type the editor offers, in palette order.
pub async fn list() -> Json<&'static [CatalogEntry]> {
    Json(nodes::catalog::entries())
}
