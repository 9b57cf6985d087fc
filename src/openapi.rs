use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};
use utoipa_swagger_ui::SwaggerUi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "CellarStock API",
        version = env!("CARGO_PKG_VERSION"),
        description = r#"
# CellarStock Inventory API

Stock tracking for a beverage-packaging operation. Each product carries three
quantities: unpackaged boxes, packaged boxes, and remaining bulk liquid
(in barrels). Every mutation is recorded in an immutable audit log holding
the before/after/change triple, queryable by action, product name, and date
range.

## Authentication

All `/wine` and `/history` endpoints require a JWT bearer token obtained from
`POST /auth/login`:

```
Authorization: Bearer <token>
```

## Error Handling

Failures return a consistent payload with an appropriate status code:

```json
{
  "error": "Unprocessable Entity",
  "message": "Insufficient stock: requested quantities exceed current stock",
  "timestamp": "2024-01-01T00:00:00Z"
}
```
        "#
    ),
    servers(
        (url = "http://localhost:8080", description = "Local development")
    ),
    tags(
        (name = "wine", description = "Product stock operations"),
        (name = "history", description = "Stock movement audit log"),
        (name = "health", description = "Health check endpoints")
    ),
    paths(
        crate::handlers::wine::list_wines,
        crate::handlers::wine::get_wine,
        crate::handlers::wine::create_wine,
        crate::handlers::wine::stock_in,
        crate::handlers::wine::stock_out,
        crate::handlers::wine::update_stock,
        crate::handlers::wine::package,
        crate::handlers::wine::delete_wine,

        crate::handlers::history::list_history,
        crate::handlers::history::get_history,
        crate::handlers::history::summary,
        crate::handlers::history::clear_all,
    ),
    components(
        schemas(
            crate::entities::wine::Model,
            crate::entities::wine::WineStatus,
            crate::entities::history::Model,
            crate::entities::history::StockAction,
            crate::models::StockSnapshot,
            crate::models::MovementDetails,
            crate::services::history::HistoryPage,
            crate::services::history::Pagination,
            crate::services::history::ActionSummary,
            crate::services::wine::CreateWineRequest,
            crate::services::wine::StockMovementRequest,
            crate::services::wine::UpdateStockRequest,
            crate::services::wine::PackageRequest,
            crate::handlers::history::ClearAllRequest,
            crate::errors::ErrorResponse
        )
    ),
    modifiers(&SecurityAddon)
)]
pub struct ApiDoc;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

pub fn swagger_ui() -> SwaggerUi {
    SwaggerUi::new("/swagger-ui")
        .url("/api-docs/openapi.json", ApiDoc::openapi())
        .config(utoipa_swagger_ui::Config::from("/api-docs/openapi.json").try_it_out_enabled(true))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn openapi_document_includes_core_paths() {
        let doc = ApiDoc::openapi();
        let json = serde_json::to_string(&doc).expect("openapi serializes");
        assert!(json.contains("/api/v1/wine"));
        assert!(json.contains("/api/v1/history/stats/summary"));
        assert!(json.contains("bearer_auth"));
    }
}
