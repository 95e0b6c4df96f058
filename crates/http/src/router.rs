//! Router builder for the bookshelf HTTP server

use axum::{routing::get, Router};
use serde_json::json;
use std::time::Duration;
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::{PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer},
};

use bookshelf_kernel::ModuleRegistry;

use crate::MakeRequestUuidV7;

/// Builder for constructing the main HTTP router
pub struct RouterBuilder {
    router: Router,
}

impl RouterBuilder {
    pub fn new() -> Self {
        Self {
            router: Router::new(),
        }
    }

    pub fn route(mut self, path: &str, route: axum::routing::MethodRouter) -> Self {
        self.router = self.router.route(path, route);
        self
    }

    /// Mount a module's router under `/api/{module_name}`
    pub fn mount_module(mut self, module_name: &str, module_router: Router) -> Self {
        let api_path = format!("/api/{}", module_name);
        self.router = self.router.nest(&api_path, module_router);
        self
    }

    pub fn with_tracing(mut self) -> Self {
        self.router = self.router.layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().include_headers(true))
                .on_request(DefaultOnRequest::new().level(tracing::Level::INFO))
                .on_response(DefaultOnResponse::new().level(tracing::Level::INFO)),
        );
        self
    }

    pub fn with_cors(mut self) -> Self {
        self.router = self.router.layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        );
        self
    }

    /// Assign an `x-request-id` to each request and echo it on the response.
    /// The layer added last runs first, so the id exists before propagation reads it.
    pub fn with_request_id(mut self) -> Self {
        self.router = self
            .router
            .layer(PropagateRequestIdLayer::x_request_id())
            .layer(SetRequestIdLayer::x_request_id(MakeRequestUuidV7));
        self
    }

    pub fn with_timeout(mut self, timeout_ms: u64) -> Self {
        self.router = self
            .router
            .layer(TimeoutLayer::new(Duration::from_millis(timeout_ms)));
        self
    }

    /// Serve the merged OpenAPI document of all modules plus Swagger UI
    pub fn with_openapi(mut self, registry: &ModuleRegistry) -> Self {
        let openapi_doc = merged_openapi(registry);

        // Round-trip through utoipa so Swagger UI gets a typed document.
        let openapi_obj: utoipa::openapi::OpenApi = serde_json::from_value(openapi_doc.clone())
            .unwrap_or_else(|err| {
                tracing::warn!(error = %err, "merged OpenAPI document is not valid, serving a stub");
                utoipa::openapi::OpenApiBuilder::new()
                    .info(
                        utoipa::openapi::InfoBuilder::new()
                            .title("Bookshelf API")
                            .version("1.0.0")
                            .build(),
                    )
                    .build()
            });

        self.router = self.router.merge(
            utoipa_swagger_ui::SwaggerUi::new("/swagger-ui")
                .url("/api-docs/openapi.json", openapi_obj),
        );

        self.router = self.router.route(
            "/docs/openapi.json",
            get(move || async move { axum::Json(openapi_doc.clone()) }),
        );

        self
    }

    pub fn build(self) -> Router {
        self.router
    }
}

impl Default for RouterBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Base document with the shared error schema, plus every module's
/// `paths` (prefixed with `/api/{module}`) and `components.schemas`.
pub fn merged_openapi(registry: &ModuleRegistry) -> serde_json::Value {
    let mut openapi_doc = json!({
        "openapi": "3.1.0",
        "info": {
            "title": "Bookshelf API",
            "version": "1.0.0",
            "description": "Book catalog record-keeping service"
        },
        "paths": {
            "/healthz": {
                "get": {
                    "summary": "Health check",
                    "responses": {
                        "200": {
                            "description": "OK",
                            "content": { "text/plain": { "schema": { "type": "string" } } }
                        }
                    }
                }
            }
        },
        "components": {
            "schemas": {
                "ErrorResponse": {
                    "type": "object",
                    "properties": {
                        "message": { "type": "string" },
                        "hasError": { "type": "boolean" },
                        "type": {
                            "type": "string",
                            "enum": [
                                "ValidationError",
                                "BadRequestError",
                                "ConflictError",
                                "NotFoundError",
                                "InternalError"
                            ]
                        },
                        "payload": {}
                    },
                    "required": ["message", "hasError", "type"]
                }
            }
        }
    });

    for module in registry.modules() {
        let Some(module_doc) = module.openapi() else {
            continue;
        };

        if let Some(paths) = module_doc.get("paths").and_then(|p| p.as_object()) {
            for (path, path_item) in paths {
                let prefixed_path = format!("/api/{}{}", module.name(), path.trim_end_matches('/'));
                openapi_doc["paths"][prefixed_path] = path_item.clone();
            }
        }

        if let Some(schemas) = module_doc
            .get("components")
            .and_then(|c| c.get("schemas"))
            .and_then(|s| s.as_object())
        {
            for (schema_name, schema_def) in schemas {
                openapi_doc["components"]["schemas"][schema_name] = schema_def.clone();
            }
        }
    }

    openapi_doc
}
