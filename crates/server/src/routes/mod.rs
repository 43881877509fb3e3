//! HTTP surface: `/api` routes plus local `/uploads`.

use axum::{
    Router,
    extract::DefaultBodyLimit,
    http::{
        Method,
        header::{AUTHORIZATION, CONTENT_TYPE},
    },
};
use deployment::Deployment;
use services::services::config::StorageBackend;
use tower_http::{
    cors::{Any, CorsLayer},
    services::ServeDir,
    trace::TraceLayer,
};

use crate::DeploymentImpl;

pub mod chat;
pub mod comments;
pub mod drafts;
pub mod health;
pub mod profile;
pub mod recipes;

/// Floor for the request body limit; raised when image uploads may exceed it.
pub const MAX_BODY_BYTES: usize = 12 * 1024 * 1024;

pub fn router(deployment: DeploymentImpl) -> Router {
    let api_routes = Router::new()
        .merge(health::router())
        .merge(recipes::router(&deployment))
        .merge(comments::router(&deployment))
        .merge(drafts::router(&deployment))
        .merge(profile::router(&deployment))
        .merge(chat::router(&deployment));

    let body_limit = MAX_BODY_BYTES.max(deployment.config().max_upload_bytes * 2);
    let mut app = Router::new().nest("/api", api_routes);
    if let StorageBackend::Local { root } = &deployment.config().storage {
        app = app.nest_service("/uploads", ServeDir::new(root));
    }

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([CONTENT_TYPE, AUTHORIZATION]);

    app.layer(DefaultBodyLimit::max(body_limit))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(deployment)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::{
        body::Body,
        http::{Request, StatusCode},
    };
    use chrono::Utc;
    use db::DBService;
    use http_body_util::BodyExt;
    use jsonwebtoken::{EncodingKey, Header, encode};
    use local_deployment::LocalDeployment;
    use serde_json::{Value, json};
    use services::services::{
        config::Config, identity::IdentityVerifier, object_store::LocalObjectStore,
        recipe_generator::TemplateRecipeGenerator,
    };
    use tower::ServiceExt;

    use super::*;

    const SECRET: &str = "router-test-secret";
    const BOUNDARY: &str = "recipe-test-boundary";

    async fn app() -> (tempfile::TempDir, Router) {
        let dir = tempfile::tempdir().unwrap();
        let uploads = dir.path().to_path_buf();
        let config = Config::from_lookup(|key| match key {
            "AUTH_JWT_SECRET" => Some(SECRET.to_string()),
            "LOCAL_STORAGE_DIR" => Some(uploads.display().to_string()),
            _ => None,
        })
        .unwrap();
        let storage = Arc::new(LocalObjectStore::new(&uploads, config.public_base_url.clone()));
        let deployment = LocalDeployment::from_parts(
            config,
            DBService::new_in_memory().await.unwrap(),
            storage,
            IdentityVerifier::hs256(SECRET),
            Arc::new(TemplateRecipeGenerator),
            None,
        );
        (dir, router(deployment))
    }

    fn token(uid: &str) -> String {
        let claims = json!({
            "sub": uid,
            "name": format!("Chef {uid}"),
            "exp": Utc::now().timestamp() + 600,
        });
        let jwt = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(SECRET.as_bytes()),
        )
        .unwrap();
        format!("Bearer {jwt}")
    }

    enum Part<'a> {
        Text(&'a str, &'a str),
        File(&'a str, &'a str, &'a str, &'a [u8]),
    }

    fn multipart(parts: &[Part<'_>]) -> Body {
        let mut body = Vec::new();
        for part in parts {
            body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
            match part {
                Part::Text(name, value) => {
                    body.extend_from_slice(
                        format!("Content-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n")
                            .as_bytes(),
                    );
                }
                Part::File(name, file_name, content_type, bytes) => {
                    body.extend_from_slice(
                        format!(
                            "Content-Disposition: form-data; name=\"{name}\"; filename=\"{file_name}\"\r\nContent-Type: {content_type}\r\n\r\n"
                        )
                        .as_bytes(),
                    );
                    body.extend_from_slice(bytes);
                    body.extend_from_slice(b"\r\n");
                }
            }
        }
        body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
        Body::from(body)
    }

    fn multipart_request(uri: &str, auth: Option<&str>, parts: &[Part<'_>]) -> Request<Body> {
        let mut builder = Request::post(uri).header(
            CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        );
        if let Some(auth) = auth {
            builder = builder.header(AUTHORIZATION, auth);
        }
        builder.body(multipart(parts)).unwrap()
    }

    fn recipe_parts<'a>(name: &'a str) -> Vec<Part<'a>> {
        vec![
            Part::Text("recipeName", name),
            Part::Text("briefIngredients", "rice, saffron, stock"),
            Part::Text("fullRecipe", "Toast the rice, add stock slowly, stir in saffron."),
            Part::Text("ingredients", r#"[{"name":"rice","quantity":"300 g"}]"#),
            Part::File("recipeImage", "risotto.jpg", "image/jpeg", b"jpeg-bytes"),
        ]
    }

    async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, body)
    }

    #[tokio::test]
    async fn health_reports_ok() {
        let (_dir, app) = app().await;
        let (status, body) = send(&app, Request::get("/api/health").body(Body::empty()).unwrap()).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);
        assert_eq!(body["data"]["status"], "ok");
        assert_eq!(body["data"]["aiAvailable"], false);
    }

    #[tokio::test]
    async fn upload_requires_a_token() {
        let (_dir, app) = app().await;
        let (status, body) = send(&app, multipart_request("/api/recipes", None, &recipe_parts("Risotto"))).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["success"], false);
        assert_eq!(body["error"], "UNAUTHORIZED");
    }

    #[tokio::test]
    async fn upload_then_fetch_and_serve_image() {
        let (_dir, app) = app().await;
        let auth = token("u1");
        let (status, body) = send(
            &app,
            multipart_request("/api/recipes", Some(&auth), &recipe_parts("Saffron Risotto")),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        let id = body["data"]["id"].as_str().unwrap().to_string();
        assert_eq!(body["data"]["userName"], "Chef u1");
        assert_eq!(body["data"]["likes"], 0);
        let image_key = body["data"]["imageKey"].as_str().unwrap().to_string();

        let (status, body) = send(
            &app,
            Request::get(format!("/api/recipes/{id}")).body(Body::empty()).unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["recipeName"], "Saffron Risotto");

        let response = app
            .clone()
            .oneshot(
                Request::get(format!("/uploads/{image_key}"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(&bytes[..], b"jpeg-bytes");

        let (_, body) = send(
            &app,
            Request::get("/api/recipes?limit=5&search=saffron").body(Body::empty()).unwrap(),
        )
        .await;
        assert_eq!(body["data"]["pagination"]["total"], 1);
        assert_eq!(body["data"]["pagination"]["hasMore"], false);
    }

    #[tokio::test]
    async fn invalid_upload_lists_every_field() {
        let (_dir, app) = app().await;
        let auth = token("u1");
        let parts = vec![
            Part::Text("recipeName", "ab"),
            Part::Text("briefIngredients", "rice"),
            Part::Text("fullRecipe", "Cook rice until done and serve."),
            Part::Text("ingredients", "[]"),
        ];
        let (status, body) = send(&app, multipart_request("/api/recipes", Some(&auth), &parts)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "VALIDATION_FAILED");
        let codes: Vec<_> = body["details"]
            .as_array()
            .unwrap()
            .iter()
            .map(|d| d["code"].as_str().unwrap().to_string())
            .collect();
        assert_eq!(
            codes,
            [
                "RECIPE_NAME_TOO_SHORT",
                "BRIEF_INGREDIENTS_TOO_SHORT",
                "TOO_FEW_INGREDIENTS",
                "INVALID_RECIPE_IMAGE"
            ]
        );
    }

    #[tokio::test]
    async fn likes_and_ownership() {
        let (_dir, app) = app().await;
        let owner = token("owner");
        let fan = token("fan");
        let (_, body) = send(
            &app,
            multipart_request("/api/recipes", Some(&owner), &recipe_parts("Paella")),
        )
        .await;
        let id = body["data"]["id"].as_str().unwrap().to_string();

        for _ in 0..2 {
            let (status, body) = send(
                &app,
                Request::post(format!("/api/recipes/{id}/like"))
                    .header(AUTHORIZATION, &fan)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await;
            assert_eq!(status, StatusCode::OK);
            assert_eq!(body["data"]["likes"], 1);
        }

        let (status, body) = send(
            &app,
            Request::delete(format!("/api/recipes/{id}"))
                .header(AUTHORIZATION, &fan)
                .body(Body::empty())
                .unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["error"], "FORBIDDEN");

        let (status, _) = send(
            &app,
            Request::delete(format!("/api/recipes/{id}"))
                .header(AUTHORIZATION, &owner)
                .body(Body::empty())
                .unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let (status, body) = send(
            &app,
            Request::get(format!("/api/recipes/{id}")).body(Body::empty()).unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "NOT_FOUND");
    }

    #[tokio::test]
    async fn draft_flow_over_http() {
        let (_dir, app) = app().await;
        let auth = token("u1");
        let (status, body) = send(
            &app,
            multipart_request(
                "/api/drafts",
                Some(&auth),
                &[
                    Part::Text("name", "Tomato Salad"),
                    Part::Text("briefDescription", "tomatoes, basil, olive oil"),
                    Part::File("recipeImage", "salad.png", "image/png", b"png-bytes"),
                ],
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let draft_id = body["data"]["draftId"].as_str().unwrap().to_string();
        assert_eq!(body["data"]["extractedIngredients"].as_array().unwrap().len(), 3);

        let submit = |auth: String| {
            Request::post(format!("/api/drafts/{draft_id}/submit"))
                .header(AUTHORIZATION, auth)
                .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
                .body(Body::from(
                    "recipeName=Tomato+Salad&briefIngredients=tomatoes%2C+basil%2C+olive+oil\
                     &fullRecipe=Slice+tomatoes%2C+tear+basil%2C+dress+with+oil.\
                     &ingredients=%5B%7B%22name%22%3A%22tomato%22%2C%22quantity%22%3A%223%22%7D%5D",
                ))
                .unwrap()
        };

        let (status, body) = send(&app, submit(token("someone-else"))).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["error"], "UNAUTHORIZED_DRAFT");

        let (status, body) = send(&app, submit(auth.clone())).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["data"]["originalDraftId"], draft_id.as_str());

        let (status, body) = send(&app, submit(auth)).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "DRAFT_NOT_FOUND");
    }

    #[tokio::test]
    async fn submit_without_fields_is_rejected() {
        let (_dir, app) = app().await;
        let (status, body) = send(
            &app,
            multipart_request(
                &format!("/api/drafts/{}/submit", uuid::Uuid::new_v4()),
                Some(&token("u1")),
                &[Part::Text("recipeName", "Soup")],
            ),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "MISSING_FIELDS");
    }

    #[tokio::test]
    async fn comments_and_profile() {
        let (_dir, app) = app().await;
        let auth = token("u1");
        let (_, body) = send(
            &app,
            multipart_request("/api/recipes", Some(&auth), &recipe_parts("Congee")),
        )
        .await;
        let id = body["data"]["id"].as_str().unwrap().to_string();

        let (status, _) = send(
            &app,
            multipart_request(
                &format!("/api/recipes/{id}/comments"),
                Some(&token("u2")),
                &[Part::Text("text", "So comforting")],
            ),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);

        let (_, body) = send(
            &app,
            Request::get(format!("/api/recipes/{id}/comments")).body(Body::empty()).unwrap(),
        )
        .await;
        assert_eq!(body["data"][0]["text"], "So comforting");

        let (status, body) = send(
            &app,
            Request::patch("/api/profile")
                .header(AUTHORIZATION, &auth)
                .header(CONTENT_TYPE, "application/json")
                .body(Body::from(r#"{"firstName":"Mei","lastName":"Lin"}"#))
                .unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["firstName"], "Mei");

        let (_, body) = send(
            &app,
            Request::get("/api/profile/stats")
                .header(AUTHORIZATION, &auth)
                .body(Body::empty())
                .unwrap(),
        )
        .await;
        assert_eq!(body["data"]["recipesUploaded"], 1);
        assert_eq!(body["data"]["pcoPoints"], 100);

        let (status, body) = send(
            &app,
            multipart_request(
                "/api/profile/picture",
                Some(&auth),
                &[Part::File("profilePicture", "me.gif", "image/gif", b"gif")],
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert!(body["data"]["photoUrl"].as_str().unwrap().contains("/uploads/profilePictures/"));
    }

    #[tokio::test]
    async fn malformed_requests_use_the_error_envelope() {
        let (_dir, app) = app().await;

        let (status, body) = send(
            &app,
            Request::get("/api/recipes/not-a-uuid").body(Body::empty()).unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["success"], false);
        assert_eq!(body["error"], "INVALID_REQUEST");

        let (status, body) = send(
            &app,
            Request::get("/api/recipes?limit=abc").body(Body::empty()).unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "INVALID_REQUEST");

        let (status, body) = send(
            &app,
            Request::post("/api/chat")
                .header(CONTENT_TYPE, "application/json")
                .body(Body::from(r#"{"messages": ["#))
                .unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "INVALID_REQUEST");
        assert!(body["message"].as_str().is_some());
    }

    #[tokio::test]
    async fn profile_picture_upload_without_a_file() {
        let (_dir, app) = app().await;
        let (status, body) = send(
            &app,
            multipart_request(
                "/api/profile/picture",
                Some(&token("u1")),
                &[Part::Text("note", "no file attached")],
            ),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "MISSING_DATA");
    }

    #[tokio::test]
    async fn chat_without_key_is_unavailable() {
        let (_dir, app) = app().await;
        let (status, body) = send(
            &app,
            Request::post("/api/chat")
                .header(CONTENT_TYPE, "application/json")
                .body(Body::from(r#"{"messages":[{"role":"user","content":"Hi chef"}]}"#))
                .unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["error"], "AI_UNAVAILABLE");
    }
}
