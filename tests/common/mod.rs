#![allow(dead_code)]

pub mod temp_files {
    use std::io::Write;
    use tempfile::{NamedTempFile, TempDir};

    /// Write `content` to a temp file with the given extension. The file is
    /// removed when the handle drops.
    pub fn create_temp_spec(content: &str, ext: &str) -> NamedTempFile {
        let mut file = tempfile::Builder::new()
            .prefix("oapi_test_")
            .suffix(&format!(".{ext}"))
            .tempfile()
            .unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file.flush().unwrap();
        file
    }

    pub fn create_temp_yaml(content: &str) -> NamedTempFile {
        create_temp_spec(content, "yaml")
    }

    pub fn create_temp_json(value: &serde_json::Value) -> NamedTempFile {
        create_temp_spec(&value.to_string(), "json")
    }

    /// A directory of named files, for documents that `$ref` each other.
    pub fn create_temp_dir(files: &[(&str, &str)]) -> TempDir {
        let dir = tempfile::tempdir().unwrap();
        for (name, content) in files {
            std::fs::write(dir.path().join(name), content).unwrap();
        }
        dir
    }
}

pub mod fixtures {
    use serde_json::{json, Value};

    /// Small API exercising every part of the pipeline.
    ///
    /// - `GET /item?id=<integer>` public
    /// - `GET /users/{userId}` needs `apiKey`, or `bearer` together with `session`
    /// - `POST /users` needs a body; responds 201 with a `User`
    /// - `GET /users/me` literal that must beat `/users/{userId}`
    pub fn user_api() -> Value {
        json!({
            "openapi": "3.0.3",
            "info": { "title": "Users", "version": "1.0.0" },
            "security": [{ "apiKey": [] }, { "bearer": ["read"], "session": [] }],
            "paths": {
                "/item": {
                    "get": {
                        "operationId": "getItem",
                        "security": [],
                        "parameters": [
                            { "name": "id", "in": "query", "required": true, "schema": { "type": "integer" } }
                        ],
                        "responses": {
                            "200": {
                                "description": "item",
                                "content": {
                                    "application/json": {
                                        "schema": {
                                            "type": "object",
                                            "required": ["id"],
                                            "properties": { "id": { "type": "integer" } }
                                        }
                                    }
                                }
                            }
                        }
                    }
                },
                "/users/{userId}": {
                    "parameters": [
                        { "name": "userId", "in": "path", "required": true, "schema": { "type": "integer", "minimum": 1 } }
                    ],
                    "get": {
                        "operationId": "getUser",
                        "parameters": [
                            { "name": "X-Trace", "in": "header", "schema": { "type": "string", "minLength": 3 } }
                        ],
                        "responses": {
                            "200": {
                                "description": "user",
                                "content": { "application/json": { "schema": { "$ref": "#/components/schemas/User" } } }
                            },
                            "4XX": {
                                "description": "client error",
                                "content": { "application/json": { "schema": { "$ref": "#/components/schemas/Error" } } }
                            }
                        }
                    }
                },
                "/users/me": {
                    "get": {
                        "operationId": "getMe",
                        "responses": {
                            "200": {
                                "description": "me",
                                "content": { "application/json": { "schema": { "$ref": "#/components/schemas/User" } } }
                            }
                        }
                    }
                },
                "/users": {
                    "post": {
                        "operationId": "createUser",
                        "requestBody": {
                            "required": true,
                            "content": { "application/json": { "schema": { "$ref": "#/components/schemas/NewUser" } } }
                        },
                        "responses": {
                            "201": {
                                "description": "created",
                                "content": { "application/json": { "schema": { "$ref": "#/components/schemas/User" } } }
                            },
                            "default": { "description": "anything else" }
                        }
                    }
                }
            },
            "components": {
                "securitySchemes": {
                    "apiKey": { "type": "apiKey", "in": "header", "name": "x-api-key" },
                    "bearer": { "type": "http", "scheme": "bearer" },
                    "session": { "type": "apiKey", "in": "cookie", "name": "session" }
                },
                "schemas": {
                    "NewUser": {
                        "type": "object",
                        "required": ["name"],
                        "properties": {
                            "name": { "type": "string", "minLength": 1 },
                            "email": { "type": "string", "format": "email" }
                        }
                    },
                    "User": {
                        "allOf": [
                            { "$ref": "#/components/schemas/NewUser" },
                            { "type": "object", "required": ["id"], "properties": { "id": { "type": "integer" } } }
                        ]
                    },
                    "Error": {
                        "type": "object",
                        "required": ["message"],
                        "properties": { "message": { "type": "string" } }
                    }
                }
            }
        })
    }

    /// Recursive tree schema used by validator and compiler tests.
    pub fn tree_schema() -> Value {
        json!({
            "$id": "http://example.com/tree.json",
            "type": "object",
            "required": ["value"],
            "properties": {
                "value": { "type": "number" },
                "children": { "type": "array", "items": { "$ref": "#" } }
            }
        })
    }
}
