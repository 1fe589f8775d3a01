use crate::{
    AppState,
    auth::AuthUser,
    credentials,
    error::{AppError, Result},
    extract::{ApiJson, ApiPath, LoginCredentials},
    forms::{StoredUploads, UploadForm},
    models::{
        Article, ArticleUpload, CreateUserRequest, Exhibit, ExhibitUpload, GalleryUpload,
        LoginForm, MessageResponse, NewArticle, NewExhibit, Role, TokenResponse,
        UpdateArticleRequest, UpdateExhibitRequest, UserOut,
    },
    storage::UploadKind,
};
use axum::{
    Json,
    extract::{Multipart, State},
    http::StatusCode,
};
use uuid::Uuid;

// --- Auth & Accounts ---

/// login
///
/// [Public Route] Exchanges a login and password (OAuth2 password-flow field names,
/// form-urlencoded or multipart) for a bearer token. A wrong password and an unknown
/// login are indistinguishable: both answer 400.
#[utoipa::path(
    post,
    path = "/auth/login",
    request_body(content = LoginForm, content_type = "application/x-www-form-urlencoded", description = "Also accepted as multipart/form-data"),
    responses(
        (status = 200, description = "Token issued", body = TokenResponse),
        (status = 400, description = "Incorrect login or password")
    )
)]
pub async fn login(
    State(state): State<AppState>,
    LoginCredentials(form): LoginCredentials,
) -> Result<Json<TokenResponse>> {
    let user = credentials::verify(&state.repo, &form.username, &form.password)
        .await?
        .ok_or(AppError::BadCredentials)?;

    let access_token = state.tokens.issue(&user.login, user.role)?;
    tracing::info!(login = %user.login, role = %user.role, "Issued access token");

    Ok(Json(TokenResponse {
        access_token,
        token_type: "bearer".to_string(),
        role: user.role,
    }))
}

/// init_admin
///
/// [Public Route] One-time bootstrap. Creates the configured admin account unless an
/// admin already exists; repeated calls are no-ops.
#[utoipa::path(
    get,
    path = "/init-admin",
    responses((status = 200, description = "Bootstrap result", body = MessageResponse))
)]
pub async fn init_admin(State(state): State<AppState>) -> Result<Json<MessageResponse>> {
    if state.repo.admin_exists().await? {
        return Ok(Json(MessageResponse {
            message: "Admin already exists".to_string(),
        }));
    }

    let login = &state.config.bootstrap_admin_login;
    match credentials::register(
        &state.repo,
        login,
        &state.config.bootstrap_admin_password,
        Role::Admin,
    )
    .await
    {
        Ok(user) => {
            tracing::info!(login = %user.login, "Bootstrap admin created");
            Ok(Json(MessageResponse {
                message: format!("Admin user created: login={}", user.login),
            }))
        }
        // A concurrent bootstrap call won the insert.
        Err(AppError::DuplicateLogin(_)) => Ok(Json(MessageResponse {
            message: "Admin already exists".to_string(),
        })),
        Err(e) => Err(e),
    }
}

/// create_user
///
/// [Admin Route] Provisions a new account with any role.
///
/// *RBAC*: 403 for moderators and users, checked before the payload is looked at.
#[utoipa::path(
    post,
    path = "/users/",
    request_body = CreateUserRequest,
    responses(
        (status = 200, description = "Created", body = UserOut),
        (status = 400, description = "Login already registered"),
        (status = 403, description = "Caller is not an admin")
    ),
    security(("bearer" = []))
)]
pub async fn create_user(
    caller: AuthUser,
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<CreateUserRequest>,
) -> Result<Json<UserOut>> {
    caller.require_admin()?;

    let user =
        credentials::register(&state.repo, &payload.login, &payload.password, payload.role).await?;
    tracing::info!(created_by = %caller.login, login = %user.login, role = %user.role, "User created");

    Ok(Json(user.into()))
}

// --- Exhibits ---

/// list_exhibits
///
/// [Public Route] Every exhibit with its gallery, in storage order.
#[utoipa::path(
    get,
    path = "/exhibits",
    responses((status = 200, description = "All exhibits", body = [Exhibit]))
)]
pub async fn list_exhibits(State(state): State<AppState>) -> Result<Json<Vec<Exhibit>>> {
    Ok(Json(state.repo.list_exhibits().await?))
}

/// get_exhibit
///
/// [Public Route] One exhibit including its gallery in upload order.
#[utoipa::path(
    get,
    path = "/exhibits/{id}",
    params(("id" = Uuid, Path, description = "Exhibit ID")),
    responses(
        (status = 200, description = "Found", body = Exhibit),
        (status = 404, description = "Not Found")
    )
)]
pub async fn get_exhibit(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Uuid>,
) -> Result<Json<Exhibit>> {
    state
        .repo
        .get_exhibit(id)
        .await?
        .map(Json)
        .ok_or(AppError::NotFound("Exhibit"))
}

async fn stage_exhibit(form: &UploadForm, uploads: &mut StoredUploads) -> Result<NewExhibit> {
    let title = form.text("title")?;
    let description = form.text("description")?;
    let article_id = form.optional_uuid("article_id")?;
    let photo = form.file("photo")?;
    let model = form.file("model")?;
    let gallery = form.files("images");

    Ok(NewExhibit {
        title,
        description,
        article_id,
        photo_url: uploads.store(photo, UploadKind::Image).await?,
        model_url: uploads.store(model, UploadKind::Model).await?,
        images: uploads.store_all(gallery, UploadKind::Image).await?,
    })
}

/// create_exhibit
///
/// [Authenticated Route] Multipart upload of a new exhibit. Files are written first,
/// then the exhibit and its gallery are inserted in one transaction. If the insert
/// fails the written files are removed again.
#[utoipa::path(
    post,
    path = "/exhibits/",
    request_body(content = ExhibitUpload, content_type = "multipart/form-data"),
    responses(
        (status = 200, description = "Created", body = Exhibit),
        (status = 400, description = "Missing field or file"),
        (status = 401, description = "Not authenticated")
    ),
    security(("bearer" = []))
)]
pub async fn create_exhibit(
    AuthUser { id: author_id, login, .. }: AuthUser,
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Json<Exhibit>> {
    let form = UploadForm::from_multipart(multipart).await?;

    let mut uploads = StoredUploads::new(state.storage.clone());
    let new = match stage_exhibit(&form, &mut uploads).await {
        Ok(new) => new,
        Err(e) => {
            uploads.discard().await;
            return Err(e);
        }
    };

    let exhibit = uploads
        .commit_with(state.repo.create_exhibit(new, author_id))
        .await?;
    tracing::info!(id = %exhibit.id, author = %login, images = exhibit.images.len(), "Exhibit created");

    Ok(Json(exhibit))
}

/// update_exhibit
///
/// [Authenticated Route] Title and/or description only. Any authenticated role may
/// edit any exhibit.
#[utoipa::path(
    put,
    path = "/exhibits/{id}",
    params(("id" = Uuid, Path, description = "Exhibit ID")),
    request_body = UpdateExhibitRequest,
    responses(
        (status = 200, description = "Updated", body = Exhibit),
        (status = 404, description = "Not Found")
    ),
    security(("bearer" = []))
)]
pub async fn update_exhibit(
    _user: AuthUser,
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(payload): ApiJson<UpdateExhibitRequest>,
) -> Result<Json<Exhibit>> {
    state
        .repo
        .update_exhibit(id, payload)
        .await?
        .map(Json)
        .ok_or(AppError::NotFound("Exhibit"))
}

/// delete_exhibit
///
/// [Authenticated Route] Deletes the exhibit and, by cascade, its gallery rows.
#[utoipa::path(
    delete,
    path = "/exhibits/{id}",
    params(("id" = Uuid, Path, description = "Exhibit ID")),
    responses(
        (status = 204, description = "Deleted"),
        (status = 404, description = "Not Found")
    ),
    security(("bearer" = []))
)]
pub async fn delete_exhibit(
    AuthUser { login, .. }: AuthUser,
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Uuid>,
) -> Result<StatusCode> {
    if !state.repo.delete_exhibit(id).await? {
        return Err(AppError::NotFound("Exhibit"));
    }
    tracing::info!(id = %id, by = %login, "Exhibit deleted");
    Ok(StatusCode::NO_CONTENT)
}

/// add_exhibit_images
///
/// [Authenticated Route] Appends gallery images to an existing exhibit.
#[utoipa::path(
    post,
    path = "/exhibits/{id}/images",
    params(("id" = Uuid, Path, description = "Exhibit ID")),
    request_body(content = GalleryUpload, content_type = "multipart/form-data"),
    responses(
        (status = 200, description = "Gallery extended", body = Exhibit),
        (status = 404, description = "Not Found")
    ),
    security(("bearer" = []))
)]
pub async fn add_exhibit_images(
    _user: AuthUser,
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Uuid>,
    multipart: Multipart,
) -> Result<Json<Exhibit>> {
    let form = UploadForm::from_multipart(multipart).await?;
    let files = form.files("images");
    if files.is_empty() {
        return Err(AppError::Validation("file 'images' is required".to_string()));
    }
    // Checked up front so a bad id does not leave files behind.
    if state.repo.get_exhibit(id).await?.is_none() {
        return Err(AppError::NotFound("Exhibit"));
    }

    let mut uploads = StoredUploads::new(state.storage.clone());
    let urls = match uploads.store_all(files, UploadKind::Image).await {
        Ok(urls) => urls,
        Err(e) => {
            uploads.discard().await;
            return Err(e);
        }
    };

    uploads
        .commit_with(async {
            state
                .repo
                .add_exhibit_images(id, urls)
                .await?
                .ok_or(AppError::NotFound("Exhibit"))
        })
        .await
        .map(Json)
}

// --- Articles ---

/// list_articles
///
/// [Public Route] Every article with its gallery, in storage order.
#[utoipa::path(
    get,
    path = "/articles",
    responses((status = 200, description = "All articles", body = [Article]))
)]
pub async fn list_articles(State(state): State<AppState>) -> Result<Json<Vec<Article>>> {
    Ok(Json(state.repo.list_articles().await?))
}

/// get_article
#[utoipa::path(
    get,
    path = "/articles/{id}",
    params(("id" = Uuid, Path, description = "Article ID")),
    responses(
        (status = 200, description = "Found", body = Article),
        (status = 404, description = "Not Found")
    )
)]
pub async fn get_article(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Uuid>,
) -> Result<Json<Article>> {
    state
        .repo
        .get_article(id)
        .await?
        .map(Json)
        .ok_or(AppError::NotFound("Article"))
}

async fn stage_article(form: &UploadForm, uploads: &mut StoredUploads) -> Result<NewArticle> {
    let title = form.text("title")?;
    let content = form.text("content")?;
    let preview = form.file("preview")?;
    let main_image = form.file("main_image")?;
    let gallery = form.files("images");

    Ok(NewArticle {
        title,
        content,
        preview_url: uploads.store(preview, UploadKind::Image).await?,
        main_image_url: uploads.store(main_image, UploadKind::Image).await?,
        images: uploads.store_all(gallery, UploadKind::Image).await?,
    })
}

/// create_article
///
/// [Authenticated Route] Multipart upload of a new article: preview and main image
/// plus an optional gallery.
#[utoipa::path(
    post,
    path = "/articles/",
    request_body(content = ArticleUpload, content_type = "multipart/form-data"),
    responses(
        (status = 200, description = "Created", body = Article),
        (status = 400, description = "Missing field or file"),
        (status = 401, description = "Not authenticated")
    ),
    security(("bearer" = []))
)]
pub async fn create_article(
    AuthUser { id: author_id, login, .. }: AuthUser,
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Json<Article>> {
    let form = UploadForm::from_multipart(multipart).await?;

    let mut uploads = StoredUploads::new(state.storage.clone());
    let new = match stage_article(&form, &mut uploads).await {
        Ok(new) => new,
        Err(e) => {
            uploads.discard().await;
            return Err(e);
        }
    };

    let article = uploads
        .commit_with(state.repo.create_article(new, author_id))
        .await?;
    tracing::info!(id = %article.id, author = %login, images = article.images.len(), "Article created");

    Ok(Json(article))
}

/// update_article
///
/// [Authenticated Route] Title and/or content only.
#[utoipa::path(
    put,
    path = "/articles/{id}",
    params(("id" = Uuid, Path, description = "Article ID")),
    request_body = UpdateArticleRequest,
    responses(
        (status = 200, description = "Updated", body = Article),
        (status = 404, description = "Not Found")
    ),
    security(("bearer" = []))
)]
pub async fn update_article(
    _user: AuthUser,
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(payload): ApiJson<UpdateArticleRequest>,
) -> Result<Json<Article>> {
    state
        .repo
        .update_article(id, payload)
        .await?
        .map(Json)
        .ok_or(AppError::NotFound("Article"))
}

/// delete_article
///
/// [Authenticated Route] Deletes the article and its gallery. Exhibits that pointed
/// at it keep existing without the reference.
#[utoipa::path(
    delete,
    path = "/articles/{id}",
    params(("id" = Uuid, Path, description = "Article ID")),
    responses(
        (status = 204, description = "Deleted"),
        (status = 404, description = "Not Found")
    ),
    security(("bearer" = []))
)]
pub async fn delete_article(
    AuthUser { login, .. }: AuthUser,
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Uuid>,
) -> Result<StatusCode> {
    if !state.repo.delete_article(id).await? {
        return Err(AppError::NotFound("Article"));
    }
    tracing::info!(id = %id, by = %login, "Article deleted");
    Ok(StatusCode::NO_CONTENT)
}

/// add_article_images
#[utoipa::path(
    post,
    path = "/articles/{id}/images",
    params(("id" = Uuid, Path, description = "Article ID")),
    request_body(content = GalleryUpload, content_type = "multipart/form-data"),
    responses(
        (status = 200, description = "Gallery extended", body = Article),
        (status = 404, description = "Not Found")
    ),
    security(("bearer" = []))
)]
pub async fn add_article_images(
    _user: AuthUser,
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Uuid>,
    multipart: Multipart,
) -> Result<Json<Article>> {
    let form = UploadForm::from_multipart(multipart).await?;
    let files = form.files("images");
    if files.is_empty() {
        return Err(AppError::Validation("file 'images' is required".to_string()));
    }
    if state.repo.get_article(id).await?.is_none() {
        return Err(AppError::NotFound("Article"));
    }

    let mut uploads = StoredUploads::new(state.storage.clone());
    let urls = match uploads.store_all(files, UploadKind::Image).await {
        Ok(urls) => urls,
        Err(e) => {
            uploads.discard().await;
            return Err(e);
        }
    };

    uploads
        .commit_with(async {
            state
                .repo
                .add_article_images(id, urls)
                .await?
                .ok_or(AppError::NotFound("Article"))
        })
        .await
        .map(Json)
}
