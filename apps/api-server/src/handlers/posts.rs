//! Post handlers.

use actix_multipart::Multipart;
use actix_web::{HttpResponse, http::header, web};
use uuid::Uuid;

use quill_core::domain::{Post, PostWithAuthor, User};
use quill_shared::ApiResponse;
use quill_shared::dto::{AuthorResponse, PageQuery, PostListResponse, PostResponse};

use super::form::PostForm;
use crate::middleware::auth::Identity;
use crate::middleware::error::{AppError, AppResult};
use crate::state::AppState;

fn post_response(post: Post, author: Option<AuthorResponse>) -> PostResponse {
    PostResponse {
        id: post.id.to_string(),
        user_id: post.user_id.to_string(),
        image_path: post.image_path(),
        title: post.title,
        body: post.body,
        image: post.image,
        author,
        created_at: post.created_at.to_rfc3339(),
        updated_at: post.updated_at.to_rfc3339(),
    }
}

fn author_response(user: User) -> AuthorResponse {
    AuthorResponse {
        id: user.id.to_string(),
        name: user.name,
    }
}

fn identity_author(identity: &Identity) -> AuthorResponse {
    AuthorResponse {
        id: identity.user_id.to_string(),
        name: identity.name.clone(),
    }
}

fn row_response(row: PostWithAuthor) -> PostResponse {
    post_response(row.post, row.author.map(author_response))
}

/// GET /api/posts
pub async fn index(
    state: web::Data<AppState>,
    query: web::Query<PageQuery>,
) -> AppResult<HttpResponse> {
    let page = query.page.unwrap_or(1).max(1);
    let listing = state.posts.list_recent(page, state.posts_per_page).await?;

    Ok(HttpResponse::Ok().json(ApiResponse::ok(PostListResponse {
        posts: listing.items.into_iter().map(row_response).collect(),
        page: listing.page,
        per_page: listing.per_page,
        has_more: listing.has_more,
    })))
}

/// GET /api/posts/{id}
pub async fn show(state: web::Data<AppState>, path: web::Path<Uuid>) -> AppResult<HttpResponse> {
    let id = path.into_inner();
    let row = state
        .posts
        .find_with_author(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Post with id {} not found", id)))?;

    Ok(HttpResponse::Ok().json(ApiResponse::ok(row_response(row))))
}

/// POST /api/posts
pub async fn store(
    state: web::Data<AppState>,
    identity: Identity,
    payload: Multipart,
) -> AppResult<HttpResponse> {
    let form = PostForm::read(payload, state.max_upload_bytes).await?;
    let fields = form.fields();

    let Some(image) = form.image else {
        return Err(
            AppError::Validation(vec!["The image field is required.".to_string()])
                .with_input(&form.input),
        );
    };

    let post = state
        .writer
        .create(identity.user_id, fields, image)
        .await
        .map_err(|e| AppError::from(e).with_input(&form.input))?;

    tracing::info!(post_id = %post.id, author = %identity.name, "Post stored");

    let location = format!("/api/posts/{}", post.id);
    Ok(HttpResponse::Created()
        .insert_header((header::LOCATION, location))
        .json(ApiResponse::ok_with_message(
            post_response(post, Some(identity_author(&identity))),
            "Post created",
        )))
}

/// PUT /api/posts/{id}
pub async fn update(
    state: web::Data<AppState>,
    identity: Identity,
    path: web::Path<Uuid>,
    payload: Multipart,
) -> AppResult<HttpResponse> {
    let id = path.into_inner();
    let form = PostForm::read(payload, state.max_upload_bytes).await?;
    let fields = form.fields();

    let post = state
        .writer
        .update(identity.user_id, id, fields, form.image)
        .await
        .map_err(|e| AppError::from(e).with_input(&form.input))?;

    Ok(HttpResponse::Ok().json(ApiResponse::ok_with_message(
        post_response(post, Some(identity_author(&identity))),
        "Post updated",
    )))
}

/// DELETE /api/posts/{id}
pub async fn destroy(
    state: web::Data<AppState>,
    identity: Identity,
    path: web::Path<Uuid>,
) -> AppResult<HttpResponse> {
    let id = path.into_inner();
    state.writer.delete(identity.user_id, id).await?;

    tracing::info!(post_id = %id, author = %identity.name, "Post destroyed");

    Ok(HttpResponse::Ok().json(ApiResponse::ok_with_message(
        serde_json::json!({ "id": id }),
        "Post deleted",
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use actix_web::http::StatusCode;
    use actix_web::{App, test};
    use chrono::{DateTime, TimeZone, Utc};
    use serde_json::Value;

    use quill_core::ports::{BlobStore, Clock, TokenService};
    use quill_infra::{InMemoryBlobStore, InMemoryPostRepository, JwtConfig, JwtTokenService};

    use crate::handlers::configure_routes;

    const BOUNDARY: &str = "----quill-test-boundary";

    struct FixedClock;

    impl Clock for FixedClock {
        fn now(&self) -> DateTime<Utc> {
            Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap()
        }
    }

    struct TestEnv {
        state: AppState,
        blobs: Arc<InMemoryBlobStore>,
        tokens: Arc<JwtTokenService>,
    }

    impl TestEnv {
        fn new() -> Self {
            let blobs = Arc::new(InMemoryBlobStore::new());
            let tokens = Arc::new(JwtTokenService::new(JwtConfig::default()));
            let state = AppState::from_parts(
                Arc::new(InMemoryPostRepository::new()),
                blobs.clone(),
                Arc::new(FixedClock),
                tokens.clone(),
                4,
                1024,
            );
            Self {
                state,
                blobs,
                tokens,
            }
        }

        fn bearer(&self, user_id: Uuid) -> (header::HeaderName, String) {
            let token = self.tokens.generate_token(user_id, "Hanako").unwrap();
            (header::AUTHORIZATION, format!("Bearer {token}"))
        }
    }

    fn multipart(fields: &[(&str, &str)], image: Option<(&str, &[u8])>) -> Vec<u8> {
        let mut body = Vec::new();
        for (name, value) in fields {
            body.extend_from_slice(
                format!(
                    "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
                )
                .as_bytes(),
            );
        }
        if let Some((filename, contents)) = image {
            body.extend_from_slice(
                format!(
                    "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"image\"; filename=\"{filename}\"\r\n\
                     Content-Type: application/octet-stream\r\n\r\n"
                )
                .as_bytes(),
            );
            body.extend_from_slice(contents);
            body.extend_from_slice(b"\r\n");
        }
        body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
        body
    }

    fn content_type() -> (header::HeaderName, String) {
        (
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
    }

    fn post_form(image: Option<(&str, &[u8])>) -> Vec<u8> {
        multipart(&[("title", "First post"), ("body", "Hello")], image)
    }

    #[actix_web::test]
    async fn test_store_then_show_post() {
        let env = TestEnv::new();
        let owner = Uuid::new_v4();
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(env.state.clone()))
                .configure(configure_routes),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/api/posts")
            .insert_header(env.bearer(owner))
            .insert_header(content_type())
            .set_payload(post_form(Some(("cat.png", b"png-bytes".as_slice()))))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::CREATED);
        assert!(resp.headers().contains_key(header::LOCATION));

        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["message"], "Post created");
        assert_eq!(body["data"]["image"], "20240102030405_cat.png");
        assert_eq!(body["data"]["user_id"], owner.to_string());
        assert!(
            env.blobs
                .exists("images/posts/20240102030405_cat.png")
                .await
                .unwrap()
        );

        let id = body["data"]["id"].as_str().unwrap().to_string();
        let req = test::TestRequest::get()
            .uri(&format!("/api/posts/{id}"))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["data"]["title"], "First post");
        assert_eq!(
            body["data"]["image_path"],
            "images/posts/20240102030405_cat.png"
        );
    }

    #[actix_web::test]
    async fn test_store_requires_token() {
        let env = TestEnv::new();
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(env.state.clone()))
                .configure(configure_routes),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/api/posts")
            .insert_header(content_type())
            .set_payload(post_form(Some(("cat.png", b"png-bytes".as_slice()))))
            .to_request();
        let resp = test::call_service(&app, req).await;

        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
        assert!(env.blobs.paths().await.is_empty());
    }

    #[actix_web::test]
    async fn test_store_without_image_echoes_input() {
        let env = TestEnv::new();
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(env.state.clone()))
                .configure(configure_routes),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/api/posts")
            .insert_header(env.bearer(Uuid::new_v4()))
            .insert_header(content_type())
            .set_payload(post_form(None))
            .to_request();
        let resp = test::call_service(&app, req).await;

        assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["input"]["title"], "First post");
        assert_eq!(body["input"]["body"], "Hello");
    }

    #[actix_web::test]
    async fn test_oversized_upload_is_rejected() {
        let env = TestEnv::new();
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(env.state.clone()))
                .configure(configure_routes),
        )
        .await;

        let big = vec![0u8; 2048];
        let req = test::TestRequest::post()
            .uri("/api/posts")
            .insert_header(env.bearer(Uuid::new_v4()))
            .insert_header(content_type())
            .set_payload(post_form(Some(("big.png", big.as_slice()))))
            .to_request();
        let resp = test::call_service(&app, req).await;

        assert_eq!(resp.status(), StatusCode::PAYLOAD_TOO_LARGE);
        assert!(env.blobs.paths().await.is_empty());
    }

    #[actix_web::test]
    async fn test_update_and_destroy_by_owner_only() {
        let env = TestEnv::new();
        let owner = Uuid::new_v4();
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(env.state.clone()))
                .configure(configure_routes),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/api/posts")
            .insert_header(env.bearer(owner))
            .insert_header(content_type())
            .set_payload(post_form(Some(("cat.png", b"png-bytes".as_slice()))))
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        let id = body["data"]["id"].as_str().unwrap().to_string();

        let req = test::TestRequest::put()
            .uri(&format!("/api/posts/{id}"))
            .insert_header(env.bearer(Uuid::new_v4()))
            .insert_header(content_type())
            .set_payload(multipart(&[("title", "Hijacked"), ("body", "x")], None))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::FORBIDDEN);

        let req = test::TestRequest::put()
            .uri(&format!("/api/posts/{id}"))
            .insert_header(env.bearer(owner))
            .insert_header(content_type())
            .set_payload(multipart(&[("title", "Edited"), ("body", "New")], None))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["message"], "Post updated");
        assert_eq!(body["data"]["title"], "Edited");
        assert_eq!(body["data"]["image"], "20240102030405_cat.png");

        let req = test::TestRequest::delete()
            .uri(&format!("/api/posts/{id}"))
            .insert_header(env.bearer(owner))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert!(env.blobs.paths().await.is_empty());

        let req = test::TestRequest::get()
            .uri(&format!("/api/posts/{id}"))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[actix_web::test]
    async fn test_index_pages_posts() {
        let env = TestEnv::new();
        let owner = Uuid::new_v4();
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(env.state.clone()))
                .configure(configure_routes),
        )
        .await;

        for name in ["a.png", "b.png", "c.png", "d.png", "e.png"] {
            let req = test::TestRequest::post()
                .uri("/api/posts")
                .insert_header(env.bearer(owner))
                .insert_header(content_type())
                .set_payload(post_form(Some((name, b"bytes".as_slice()))))
                .to_request();
            let resp = test::call_service(&app, req).await;
            assert_eq!(resp.status(), StatusCode::CREATED);
        }

        let req = test::TestRequest::get().uri("/api/posts").to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["data"]["posts"].as_array().unwrap().len(), 4);
        assert_eq!(body["data"]["has_more"], true);

        let req = test::TestRequest::get().uri("/api/posts?page=2").to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["data"]["posts"].as_array().unwrap().len(), 1);
        assert_eq!(body["data"]["has_more"], false);
    }

    #[actix_web::test]
    async fn test_index_far_page_is_empty() {
        let env = TestEnv::new();
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(env.state.clone()))
                .configure(configure_routes),
        )
        .await;

        let req = test::TestRequest::get()
            .uri(&format!("/api/posts?page={}", u64::MAX))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);

        let body: Value = test::read_body_json(resp).await;
        assert!(body["data"]["posts"].as_array().unwrap().is_empty());
        assert_eq!(body["data"]["has_more"], false);
    }
}
