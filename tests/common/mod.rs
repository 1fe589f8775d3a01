#![allow(dead_code)]

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{Request, header},
    response::Response,
};
use chrono::Utc;
use museum_catalog::{
    AppConfig, AppState, create_router,
    credentials::hash_password,
    error::{AppError, Result},
    models::{
        Article, ArticleImage, Exhibit, ExhibitImage, NewArticle, NewExhibit, Role,
        UpdateArticleRequest, UpdateExhibitRequest, User,
    },
    repository::{Repository, RepositoryState},
    storage::{MockStorageService, StorageState},
};
use std::sync::{Arc, Mutex};
use tower::util::ServiceExt;
use uuid::Uuid;

// --- IN-MEMORY REPOSITORY ---

#[derive(Default)]
struct Store {
    users: Vec<User>,
    exhibits: Vec<Exhibit>,
    articles: Vec<Article>,
    next_image_id: i64,
}

/// Behaves like `PostgresRepository` (unique logins, insertion-ordered galleries,
/// cascading deletes) without a database. With `fail_content_writes` set, every
/// exhibit/article insert fails the way a lost connection would.
#[derive(Default)]
pub struct InMemoryRepository {
    store: Mutex<Store>,
    pub fail_content_writes: bool,
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_content_writes() -> Self {
        Self {
            fail_content_writes: true,
            ..Self::default()
        }
    }

    pub fn user_count(&self) -> usize {
        self.store.lock().unwrap().users.len()
    }

    pub fn admin_count(&self) -> usize {
        let store = self.store.lock().unwrap();
        store.users.iter().filter(|u| u.role == Role::Admin).count()
    }

    /// Gallery rows still pointing at `owner`, across both owner types.
    pub fn images_owned_by(&self, owner: Uuid) -> usize {
        let store = self.store.lock().unwrap();
        let exhibit_images = store
            .exhibits
            .iter()
            .flat_map(|e| e.images.iter())
            .filter(|i| i.exhibit_id == owner)
            .count();
        let article_images = store
            .articles
            .iter()
            .flat_map(|a| a.images.iter())
            .filter(|i| i.article_id == owner)
            .count();
        exhibit_images + article_images
    }

    fn fail_if_configured(&self) -> Result<()> {
        if self.fail_content_writes {
            return Err(AppError::Database(sqlx::Error::PoolTimedOut));
        }
        Ok(())
    }
}

fn next_exhibit_images(store: &mut Store, exhibit_id: Uuid, start: i32, urls: &[String]) -> Vec<ExhibitImage> {
    urls.iter()
        .enumerate()
        .map(|(offset, url)| {
            store.next_image_id += 1;
            ExhibitImage {
                id: store.next_image_id,
                exhibit_id,
                url: url.clone(),
                position: start + offset as i32,
            }
        })
        .collect()
}

fn next_article_images(store: &mut Store, article_id: Uuid, start: i32, urls: &[String]) -> Vec<ArticleImage> {
    urls.iter()
        .enumerate()
        .map(|(offset, url)| {
            store.next_image_id += 1;
            ArticleImage {
                id: store.next_image_id,
                article_id,
                url: url.clone(),
                position: start + offset as i32,
            }
        })
        .collect()
}

#[async_trait]
impl Repository for InMemoryRepository {
    async fn find_user_by_login(&self, login: &str) -> Result<Option<User>> {
        let store = self.store.lock().unwrap();
        Ok(store.users.iter().find(|u| u.login == login).cloned())
    }

    async fn create_user(&self, login: &str, password_hash: &str, role: Role) -> Result<User> {
        let mut store = self.store.lock().unwrap();
        if store.users.iter().any(|u| u.login == login) {
            return Err(AppError::DuplicateLogin(login.to_string()));
        }
        let user = User {
            id: Uuid::new_v4(),
            login: login.to_string(),
            password_hash: password_hash.to_string(),
            role,
            created_at: Utc::now(),
        };
        store.users.push(user.clone());
        Ok(user)
    }

    async fn admin_exists(&self) -> Result<bool> {
        let store = self.store.lock().unwrap();
        Ok(store.users.iter().any(|u| u.role == Role::Admin))
    }

    async fn list_exhibits(&self) -> Result<Vec<Exhibit>> {
        Ok(self.store.lock().unwrap().exhibits.clone())
    }

    async fn get_exhibit(&self, id: Uuid) -> Result<Option<Exhibit>> {
        let store = self.store.lock().unwrap();
        Ok(store.exhibits.iter().find(|e| e.id == id).cloned())
    }

    async fn create_exhibit(&self, new: NewExhibit, author_id: Uuid) -> Result<Exhibit> {
        self.fail_if_configured()?;
        let mut store = self.store.lock().unwrap();
        if let Some(article_id) = new.article_id {
            if !store.articles.iter().any(|a| a.id == article_id) {
                return Err(AppError::Validation(
                    "article_id does not reference an existing article".to_string(),
                ));
            }
        }
        let id = Uuid::new_v4();
        let images = next_exhibit_images(&mut store, id, 0, &new.images);
        let exhibit = Exhibit {
            id,
            title: new.title,
            description: new.description,
            photo_url: new.photo_url,
            model_url: new.model_url,
            article_id: new.article_id,
            author_id,
            created_at: Utc::now(),
            images,
        };
        store.exhibits.push(exhibit.clone());
        Ok(exhibit)
    }

    async fn update_exhibit(&self, id: Uuid, req: UpdateExhibitRequest) -> Result<Option<Exhibit>> {
        let mut store = self.store.lock().unwrap();
        let Some(exhibit) = store.exhibits.iter_mut().find(|e| e.id == id) else {
            return Ok(None);
        };
        if let Some(title) = req.title {
            exhibit.title = title;
        }
        if let Some(description) = req.description {
            exhibit.description = description;
        }
        Ok(Some(exhibit.clone()))
    }

    async fn delete_exhibit(&self, id: Uuid) -> Result<bool> {
        let mut store = self.store.lock().unwrap();
        let before = store.exhibits.len();
        store.exhibits.retain(|e| e.id != id);
        Ok(store.exhibits.len() < before)
    }

    async fn add_exhibit_images(&self, id: Uuid, urls: Vec<String>) -> Result<Option<Exhibit>> {
        let mut store = self.store.lock().unwrap();
        let Some(index) = store.exhibits.iter().position(|e| e.id == id) else {
            return Ok(None);
        };
        let start = store.exhibits[index]
            .images
            .iter()
            .map(|i| i.position + 1)
            .max()
            .unwrap_or(0);
        let images = next_exhibit_images(&mut store, id, start, &urls);
        store.exhibits[index].images.extend(images);
        Ok(Some(store.exhibits[index].clone()))
    }

    async fn list_articles(&self) -> Result<Vec<Article>> {
        Ok(self.store.lock().unwrap().articles.clone())
    }

    async fn get_article(&self, id: Uuid) -> Result<Option<Article>> {
        let store = self.store.lock().unwrap();
        Ok(store.articles.iter().find(|a| a.id == id).cloned())
    }

    async fn create_article(&self, new: NewArticle, author_id: Uuid) -> Result<Article> {
        self.fail_if_configured()?;
        let mut store = self.store.lock().unwrap();
        let id = Uuid::new_v4();
        let images = next_article_images(&mut store, id, 0, &new.images);
        let article = Article {
            id,
            title: new.title,
            content: new.content,
            preview_url: new.preview_url,
            main_image_url: new.main_image_url,
            author_id,
            created_at: Utc::now(),
            images,
        };
        store.articles.push(article.clone());
        Ok(article)
    }

    async fn update_article(&self, id: Uuid, req: UpdateArticleRequest) -> Result<Option<Article>> {
        let mut store = self.store.lock().unwrap();
        let Some(article) = store.articles.iter_mut().find(|a| a.id == id) else {
            return Ok(None);
        };
        if let Some(title) = req.title {
            article.title = title;
        }
        if let Some(content) = req.content {
            article.content = content;
        }
        Ok(Some(article.clone()))
    }

    async fn delete_article(&self, id: Uuid) -> Result<bool> {
        let mut store = self.store.lock().unwrap();
        let before = store.articles.len();
        store.articles.retain(|a| a.id != id);
        let deleted = store.articles.len() < before;
        if deleted {
            for exhibit in store.exhibits.iter_mut() {
                if exhibit.article_id == Some(id) {
                    exhibit.article_id = None;
                }
            }
        }
        Ok(deleted)
    }

    async fn add_article_images(&self, id: Uuid, urls: Vec<String>) -> Result<Option<Article>> {
        let mut store = self.store.lock().unwrap();
        let Some(index) = store.articles.iter().position(|a| a.id == id) else {
            return Ok(None);
        };
        let start = store.articles[index]
            .images
            .iter()
            .map(|i| i.position + 1)
            .max()
            .unwrap_or(0);
        let images = next_article_images(&mut store, id, start, &urls);
        store.articles[index].images.extend(images);
        Ok(Some(store.articles[index].clone()))
    }
}

// --- TEST UTILITIES ---

pub const TEST_PASSWORD: &str = "correct-horse-battery";

pub struct TestContext {
    pub repo: Arc<InMemoryRepository>,
    pub storage: MockStorageService,
    pub state: AppState,
}

impl TestContext {
    pub fn new() -> Self {
        Self::with_repo(InMemoryRepository::new())
    }

    pub fn with_repo(repo: InMemoryRepository) -> Self {
        let repo = Arc::new(repo);
        let storage = MockStorageService::new();
        let state = AppState::new(
            repo.clone() as RepositoryState,
            Arc::new(storage.clone()) as StorageState,
            AppConfig::default(),
        );
        Self {
            repo,
            storage,
            state,
        }
    }

    /// Inserts an account with `TEST_PASSWORD` and returns a bearer token for it.
    pub async fn seed_user(&self, login: &str, role: Role) -> (User, String) {
        let hash = hash_password(TEST_PASSWORD).unwrap();
        let user = self.repo.create_user(login, &hash, role).await.unwrap();
        let token = self.state.tokens.issue(login, role).unwrap();
        (user, token)
    }

    pub async fn send(&self, request: Request<Body>) -> Response {
        create_router(self.state.clone()).oneshot(request).await.unwrap()
    }
}

pub async fn body_json<T: serde::de::DeserializeOwned>(response: Response) -> T {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

pub fn json_request(method: &str, uri: &str, token: Option<&str>, body: serde_json::Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

pub fn empty_request(method: &str, uri: &str, token: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    builder.body(Body::empty()).unwrap()
}

pub fn login_request(username: &str, password: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/auth/login")
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(Body::from(format!("username={username}&password={password}")))
        .unwrap()
}

/// Hand-assembled multipart/form-data body.
pub struct MultipartBody {
    boundary: &'static str,
    buf: Vec<u8>,
}

impl MultipartBody {
    pub fn new() -> Self {
        Self {
            boundary: "museum-test-boundary-7MA4YWxkTrZu0gW",
            buf: Vec::new(),
        }
    }

    pub fn text(mut self, name: &str, value: &str) -> Self {
        self.buf.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"{}\"\r\n\r\n{}\r\n",
                self.boundary, name, value
            )
            .as_bytes(),
        );
        self
    }

    pub fn file(mut self, name: &str, filename: &str, bytes: &[u8]) -> Self {
        self.buf.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\nContent-Type: application/octet-stream\r\n\r\n",
                self.boundary, name, filename
            )
            .as_bytes(),
        );
        self.buf.extend_from_slice(bytes);
        self.buf.extend_from_slice(b"\r\n");
        self
    }

    pub fn into_request(mut self, method: &str, uri: &str, token: Option<&str>) -> Request<Body> {
        self.buf
            .extend_from_slice(format!("--{}--\r\n", self.boundary).as_bytes());

        let mut builder = Request::builder().method(method).uri(uri).header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={}", self.boundary),
        );
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        builder.body(Body::from(self.buf)).unwrap()
    }
}

/// A complete exhibit upload with two gallery images.
pub fn exhibit_upload() -> MultipartBody {
    MultipartBody::new()
        .text("title", "Bronze Age Vase")
        .text("description", "Found near the river bank")
        .file("photo", "vase.jpg", b"photo-bytes")
        .file("model", "vase.glb", b"model-bytes")
        .file("images", "side.jpg", b"side-bytes")
        .file("images", "top.jpg", b"top-bytes")
}

pub fn article_upload() -> MultipartBody {
    MultipartBody::new()
        .text("title", "Summer Expedition")
        .text("content", "Three weeks in the valley.")
        .file("preview", "preview.jpg", b"preview-bytes")
        .file("main_image", "main.jpg", b"main-bytes")
        .file("images", "camp.jpg", b"camp-bytes")
}
