pub mod cover;
pub mod error;
pub mod manager;
pub mod models;
pub mod routes;
pub mod store;
pub mod validation;

use anyhow::anyhow;
use async_trait::async_trait;
use axum::Router;
use bookshelf_kernel::{InitCtx, Migration, Module};
use once_cell::sync::OnceCell;
use serde_json::json;

use manager::BookManager;

/// Book catalog: validated records with soft delete and cover enrichment.
pub struct BooksModule {
    manager: OnceCell<BookManager>,
}

impl BooksModule {
    pub const fn new() -> Self {
        Self {
            manager: OnceCell::new(),
        }
    }
}

impl Default for BooksModule {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Module for BooksModule {
    fn name(&self) -> &'static str {
        "books"
    }

    async fn init(&self, ctx: &InitCtx<'_>) -> anyhow::Result<()> {
        if self.manager.get().is_none() {
            let covers = cover::from_settings(&ctx.settings.covers)?;
            self.manager
                .set(BookManager::new(ctx.db.clone(), covers))
                .map_err(|_| anyhow!("books module initialized concurrently"))?;
        }

        tracing::info!(
            module = self.name(),
            environment = ?ctx.settings.environment,
            "books module initialized"
        );
        Ok(())
    }

    fn routes(&self) -> Router {
        match self.manager.get() {
            Some(manager) => routes::router(manager.clone()),
            None => {
                tracing::warn!(module = self.name(), "routes requested before init; serving none");
                Router::new()
            }
        }
    }

    fn openapi(&self) -> Option<serde_json::Value> {
        Some(openapi_fragment())
    }

    fn migrations(&self) -> Vec<Migration> {
        vec![store::CREATE_BOOKS]
    }

    async fn start(&self, _ctx: &InitCtx<'_>) -> anyhow::Result<()> {
        tracing::info!(module = self.name(), "books module started");
        Ok(())
    }

    async fn stop(&self) -> anyhow::Result<()> {
        tracing::info!(module = self.name(), "books module stopped");
        Ok(())
    }
}

fn error_response(description: &str) -> serde_json::Value {
    json!({
        "description": description,
        "content": {
            "application/json": {
                "schema": { "$ref": "#/components/schemas/ErrorResponse" }
            }
        }
    })
}

fn book_response(description: &str) -> serde_json::Value {
    json!({
        "description": description,
        "content": {
            "application/json": {
                "schema": { "$ref": "#/components/schemas/Book" }
            }
        }
    })
}

fn openapi_fragment() -> serde_json::Value {
    let id_parameter = json!({
        "name": "id",
        "in": "path",
        "required": true,
        "schema": { "type": "integer", "format": "int64", "minimum": 0 }
    });
    let payload_body = json!({
        "required": true,
        "content": {
            "application/json": {
                "schema": { "$ref": "#/components/schemas/BookPayload" }
            }
        }
    });

    json!({
        "paths": {
            "/": {
                "get": {
                    "summary": "List active books",
                    "tags": ["Books"],
                    "responses": {
                        "200": {
                            "description": "Active books ordered by id",
                            "content": {
                                "application/json": {
                                    "schema": {
                                        "type": "array",
                                        "items": { "$ref": "#/components/schemas/Book" }
                                    }
                                }
                            }
                        }
                    }
                },
                "post": {
                    "summary": "Create a book",
                    "tags": ["Books"],
                    "requestBody": payload_body,
                    "responses": {
                        "201": book_response("Created book"),
                        "400": error_response("Validation error"),
                        "409": error_response("Guid or ISBN already used by an active book")
                    }
                }
            },
            "/{id}": {
                "get": {
                    "summary": "Get an active book",
                    "tags": ["Books"],
                    "parameters": [id_parameter],
                    "responses": {
                        "200": book_response("The book"),
                        "404": error_response("Missing or deleted")
                    }
                },
                "put": {
                    "summary": "Update a book",
                    "tags": ["Books"],
                    "parameters": [id_parameter],
                    "requestBody": payload_body,
                    "responses": {
                        "200": book_response("Updated book"),
                        "400": error_response("Validation error"),
                        "404": error_response("No book with this id"),
                        "409": error_response("ISBN already used by another active book")
                    }
                },
                "delete": {
                    "summary": "Soft-delete a book",
                    "tags": ["Books"],
                    "parameters": [id_parameter],
                    "responses": {
                        "204": { "description": "Deleted" },
                        "404": error_response("No book with this id")
                    }
                }
            },
            "/health": {
                "get": {
                    "summary": "Books health check",
                    "tags": ["Books"],
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
                "Book": {
                    "type": "object",
                    "properties": {
                        "id": { "type": "integer", "format": "int64" },
                        "guid": { "type": "string", "format": "uuid" },
                        "title": { "type": "string", "maxLength": 200 },
                        "author": { "type": "string", "maxLength": 100 },
                        "isbn": { "type": "string" },
                        "description": { "type": "string", "nullable": true, "maxLength": 2000 },
                        "publicationYear": { "type": "integer", "nullable": true },
                        "genre": { "type": "string", "nullable": true, "maxLength": 50 },
                        "coverImageUrl": { "type": "string", "nullable": true, "maxLength": 500 },
                        "createdOn": { "type": "string", "format": "date-time" },
                        "updatedOn": { "type": "string", "format": "date-time" },
                        "isActive": { "type": "boolean" }
                    },
                    "required": ["id", "guid", "title", "author", "isbn", "createdOn", "updatedOn", "isActive"]
                },
                "BookPayload": {
                    "type": "object",
                    "properties": {
                        "guid": { "type": "string", "format": "uuid" },
                        "title": { "type": "string", "maxLength": 200 },
                        "author": { "type": "string", "maxLength": 100 },
                        "isbn": { "type": "string", "pattern": "^[0-9-]+$" },
                        "description": { "type": "string", "nullable": true, "maxLength": 2000 },
                        "publicationYear": { "type": "integer", "nullable": true, "minimum": 1000 },
                        "genre": { "type": "string", "nullable": true, "maxLength": 50 },
                        "coverImageUrl": { "type": "string", "nullable": true, "maxLength": 500 }
                    },
                    "required": ["guid", "title", "author", "isbn"]
                }
            }
        }
    })
}

/// Create a new instance of the books module
pub fn create_module() -> std::sync::Arc<dyn Module> {
    std::sync::Arc::new(BooksModule::new())
}
