use crate::{
    error::{AppError, Result},
    models::{
        Article, ArticleImage, Exhibit, ExhibitImage, NewArticle, NewExhibit, Role,
        UpdateArticleRequest, UpdateExhibitRequest, User,
    },
};
use async_trait::async_trait;
use sqlx::{PgPool, Postgres, Transaction};
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

/// Repository Trait
///
/// The persistence contract for accounts (credential store) and catalog content
/// (content store). Handlers only depend on this trait, which lets the integration
/// tests run the whole router against an in-memory implementation.
///
/// Every method returns `Result`; database failures surface as `AppError::Database`
/// and become a 500 at the API boundary.
#[async_trait]
pub trait Repository: Send + Sync {
    // --- Credential Store ---
    async fn find_user_by_login(&self, login: &str) -> Result<Option<User>>;
    // Fails with `DuplicateLogin` when the login is taken.
    async fn create_user(&self, login: &str, password_hash: &str, role: Role) -> Result<User>;
    async fn admin_exists(&self) -> Result<bool>;

    // --- Exhibits ---
    async fn list_exhibits(&self) -> Result<Vec<Exhibit>>;
    async fn get_exhibit(&self, id: Uuid) -> Result<Option<Exhibit>>;
    // Inserts the exhibit and its gallery in one transaction.
    async fn create_exhibit(&self, new: NewExhibit, author_id: Uuid) -> Result<Exhibit>;
    async fn update_exhibit(
        &self,
        id: Uuid,
        req: UpdateExhibitRequest,
    ) -> Result<Option<Exhibit>>;
    // Gallery rows go with it (ON DELETE CASCADE). `false` when the id is unknown.
    async fn delete_exhibit(&self, id: Uuid) -> Result<bool>;
    // Appends to the gallery after the current last position.
    async fn add_exhibit_images(&self, id: Uuid, urls: Vec<String>) -> Result<Option<Exhibit>>;

    // --- Articles ---
    async fn list_articles(&self) -> Result<Vec<Article>>;
    async fn get_article(&self, id: Uuid) -> Result<Option<Article>>;
    async fn create_article(&self, new: NewArticle, author_id: Uuid) -> Result<Article>;
    async fn update_article(
        &self,
        id: Uuid,
        req: UpdateArticleRequest,
    ) -> Result<Option<Article>>;
    async fn delete_article(&self, id: Uuid) -> Result<bool>;
    async fn add_article_images(&self, id: Uuid, urls: Vec<String>) -> Result<Option<Article>>;
}

/// RepositoryState
///
/// The concrete type used to share the persistence layer across the application state.
pub type RepositoryState = Arc<dyn Repository>;

const USER_COLUMNS: &str = "id, login, password_hash, role, created_at";
const EXHIBIT_COLUMNS: &str =
    "id, title, description, photo_url, model_url, article_id, author_id, created_at";
const ARTICLE_COLUMNS: &str =
    "id, title, content, preview_url, main_image_url, author_id, created_at";

/// PostgresRepository
///
/// The concrete implementation of the `Repository` trait, backed by PostgreSQL.
/// Each call borrows a pooled connection or opens a transaction; a transaction that
/// is dropped on an error path rolls back.
pub struct PostgresRepository {
    pool: PgPool,
}

impl PostgresRepository {
    /// Creates a new repository instance using the initialized connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn exhibit_images_for(&self, ids: &[Uuid]) -> Result<HashMap<Uuid, Vec<ExhibitImage>>> {
        let rows = sqlx::query_as::<_, ExhibitImage>(
            r#"SELECT id, exhibit_id, url, position FROM exhibit_images
               WHERE exhibit_id = ANY($1) ORDER BY position, id"#,
        )
        .bind(ids)
        .fetch_all(&self.pool)
        .await?;

        let mut grouped: HashMap<Uuid, Vec<ExhibitImage>> = HashMap::new();
        for image in rows {
            grouped.entry(image.exhibit_id).or_default().push(image);
        }
        Ok(grouped)
    }

    async fn article_images_for(&self, ids: &[Uuid]) -> Result<HashMap<Uuid, Vec<ArticleImage>>> {
        let rows = sqlx::query_as::<_, ArticleImage>(
            r#"SELECT id, article_id, url, position FROM article_images
               WHERE article_id = ANY($1) ORDER BY position, id"#,
        )
        .bind(ids)
        .fetch_all(&self.pool)
        .await?;

        let mut grouped: HashMap<Uuid, Vec<ArticleImage>> = HashMap::new();
        for image in rows {
            grouped.entry(image.article_id).or_default().push(image);
        }
        Ok(grouped)
    }

    async fn with_exhibit_images(&self, mut exhibit: Exhibit) -> Result<Exhibit> {
        exhibit.images = self
            .exhibit_images_for(&[exhibit.id])
            .await?
            .remove(&exhibit.id)
            .unwrap_or_default();
        Ok(exhibit)
    }

    async fn with_article_images(&self, mut article: Article) -> Result<Article> {
        article.images = self
            .article_images_for(&[article.id])
            .await?
            .remove(&article.id)
            .unwrap_or_default();
        Ok(article)
    }
}

/// Appends gallery rows for `owner_id` inside `tx`, numbering them after the
/// owner's current highest position. `table`/`owner_column` are compile-time
/// constants, never user input.
async fn append_images(
    tx: &mut Transaction<'_, Postgres>,
    table: &'static str,
    owner_column: &'static str,
    owner_id: Uuid,
    urls: &[String],
) -> Result<()> {
    if urls.is_empty() {
        return Ok(());
    }

    let next: i32 = sqlx::query_scalar(&format!(
        "SELECT COALESCE(MAX(position) + 1, 0) FROM {table} WHERE {owner_column} = $1"
    ))
    .bind(owner_id)
    .fetch_one(&mut **tx)
    .await?;

    let insert = format!("INSERT INTO {table} ({owner_column}, url, position) VALUES ($1, $2, $3)");
    for (offset, url) in urls.iter().enumerate() {
        sqlx::query(&insert)
            .bind(owner_id)
            .bind(url)
            .bind(next + offset as i32)
            .execute(&mut **tx)
            .await?;
    }
    Ok(())
}

#[async_trait]
impl Repository for PostgresRepository {
    /// find_user_by_login
    ///
    /// Used by login and by the `AuthUser` extractor to resolve a token subject.
    async fn find_user_by_login(&self, login: &str) -> Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE login = $1"
        ))
        .bind(login)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    /// create_user
    ///
    /// Relies on the UNIQUE constraint on `login`; a violation maps to
    /// `DuplicateLogin`, which also covers two concurrent inserts of the same login.
    async fn create_user(&self, login: &str, password_hash: &str, role: Role) -> Result<User> {
        let result = sqlx::query_as::<_, User>(&format!(
            "INSERT INTO users (id, login, password_hash, role, created_at)
             VALUES ($1, $2, $3, $4, NOW()) RETURNING {USER_COLUMNS}"
        ))
        .bind(Uuid::new_v4())
        .bind(login)
        .bind(password_hash)
        .bind(role)
        .fetch_one(&self.pool)
        .await;

        match result {
            Ok(user) => Ok(user),
            Err(sqlx::Error::Database(db)) if db.is_unique_violation() => {
                Err(AppError::DuplicateLogin(login.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn admin_exists(&self) -> Result<bool> {
        let exists: bool =
            sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM users WHERE role = 'admin')")
                .fetch_one(&self.pool)
                .await?;
        Ok(exists)
    }

    // --- EXHIBITS ---

    /// list_exhibits
    ///
    /// All exhibits in storage order, each with its gallery. Galleries are fetched in a
    /// single `ANY($1)` query rather than one query per exhibit.
    async fn list_exhibits(&self) -> Result<Vec<Exhibit>> {
        let mut exhibits = sqlx::query_as::<_, Exhibit>(&format!(
            "SELECT {EXHIBIT_COLUMNS} FROM exhibits ORDER BY created_at, id"
        ))
        .fetch_all(&self.pool)
        .await?;

        let ids: Vec<Uuid> = exhibits.iter().map(|e| e.id).collect();
        let mut images = self.exhibit_images_for(&ids).await?;
        for exhibit in &mut exhibits {
            exhibit.images = images.remove(&exhibit.id).unwrap_or_default();
        }
        Ok(exhibits)
    }

    async fn get_exhibit(&self, id: Uuid) -> Result<Option<Exhibit>> {
        let exhibit = sqlx::query_as::<_, Exhibit>(&format!(
            "SELECT {EXHIBIT_COLUMNS} FROM exhibits WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        match exhibit {
            Some(exhibit) => Ok(Some(self.with_exhibit_images(exhibit).await?)),
            None => Ok(None),
        }
    }

    /// create_exhibit
    ///
    /// Owner row first (its id is generated here), gallery rows second, one commit.
    /// An unknown `article_id` trips the foreign key and is reported as a validation
    /// error.
    async fn create_exhibit(&self, new: NewExhibit, author_id: Uuid) -> Result<Exhibit> {
        let mut tx = self.pool.begin().await?;

        let inserted = sqlx::query_as::<_, Exhibit>(&format!(
            "INSERT INTO exhibits (id, title, description, photo_url, model_url, article_id, author_id, created_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, NOW()) RETURNING {EXHIBIT_COLUMNS}"
        ))
        .bind(Uuid::new_v4())
        .bind(&new.title)
        .bind(&new.description)
        .bind(&new.photo_url)
        .bind(&new.model_url)
        .bind(new.article_id)
        .bind(author_id)
        .fetch_one(&mut *tx)
        .await;

        let exhibit = match inserted {
            Ok(exhibit) => exhibit,
            Err(sqlx::Error::Database(db)) if db.is_foreign_key_violation() => {
                return Err(AppError::Validation(
                    "article_id does not reference an existing article".to_string(),
                ));
            }
            Err(e) => return Err(e.into()),
        };

        append_images(&mut tx, "exhibit_images", "exhibit_id", exhibit.id, &new.images).await?;
        tx.commit().await?;

        self.with_exhibit_images(exhibit).await
    }

    /// update_exhibit
    ///
    /// COALESCE keeps a column unchanged when the corresponding field is `None`.
    async fn update_exhibit(
        &self,
        id: Uuid,
        req: UpdateExhibitRequest,
    ) -> Result<Option<Exhibit>> {
        let updated = sqlx::query_as::<_, Exhibit>(&format!(
            "UPDATE exhibits
             SET title = COALESCE($2, title),
                 description = COALESCE($3, description)
             WHERE id = $1
             RETURNING {EXHIBIT_COLUMNS}"
        ))
        .bind(id)
        .bind(req.title)
        .bind(req.description)
        .fetch_optional(&self.pool)
        .await?;

        match updated {
            Some(exhibit) => Ok(Some(self.with_exhibit_images(exhibit).await?)),
            None => Ok(None),
        }
    }

    async fn delete_exhibit(&self, id: Uuid) -> Result<bool> {
        let res = sqlx::query("DELETE FROM exhibits WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(res.rows_affected() > 0)
    }

    /// add_exhibit_images
    ///
    /// Locks the owner row so concurrent appends get distinct positions.
    async fn add_exhibit_images(&self, id: Uuid, urls: Vec<String>) -> Result<Option<Exhibit>> {
        let mut tx = self.pool.begin().await?;

        let owner: Option<Uuid> =
            sqlx::query_scalar("SELECT id FROM exhibits WHERE id = $1 FOR UPDATE")
                .bind(id)
                .fetch_optional(&mut *tx)
                .await?;
        if owner.is_none() {
            return Ok(None);
        }

        append_images(&mut tx, "exhibit_images", "exhibit_id", id, &urls).await?;
        tx.commit().await?;

        self.get_exhibit(id).await
    }

    // --- ARTICLES ---

    async fn list_articles(&self) -> Result<Vec<Article>> {
        let mut articles = sqlx::query_as::<_, Article>(&format!(
            "SELECT {ARTICLE_COLUMNS} FROM articles ORDER BY created_at, id"
        ))
        .fetch_all(&self.pool)
        .await?;

        let ids: Vec<Uuid> = articles.iter().map(|a| a.id).collect();
        let mut images = self.article_images_for(&ids).await?;
        for article in &mut articles {
            article.images = images.remove(&article.id).unwrap_or_default();
        }
        Ok(articles)
    }

    async fn get_article(&self, id: Uuid) -> Result<Option<Article>> {
        let article = sqlx::query_as::<_, Article>(&format!(
            "SELECT {ARTICLE_COLUMNS} FROM articles WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        match article {
            Some(article) => Ok(Some(self.with_article_images(article).await?)),
            None => Ok(None),
        }
    }

    async fn create_article(&self, new: NewArticle, author_id: Uuid) -> Result<Article> {
        let mut tx = self.pool.begin().await?;

        let article = sqlx::query_as::<_, Article>(&format!(
            "INSERT INTO articles (id, title, content, preview_url, main_image_url, author_id, created_at)
             VALUES ($1, $2, $3, $4, $5, $6, NOW()) RETURNING {ARTICLE_COLUMNS}"
        ))
        .bind(Uuid::new_v4())
        .bind(&new.title)
        .bind(&new.content)
        .bind(&new.preview_url)
        .bind(&new.main_image_url)
        .bind(author_id)
        .fetch_one(&mut *tx)
        .await?;

        append_images(&mut tx, "article_images", "article_id", article.id, &new.images).await?;
        tx.commit().await?;

        self.with_article_images(article).await
    }

    async fn update_article(
        &self,
        id: Uuid,
        req: UpdateArticleRequest,
    ) -> Result<Option<Article>> {
        let updated = sqlx::query_as::<_, Article>(&format!(
            "UPDATE articles
             SET title = COALESCE($2, title),
                 content = COALESCE($3, content)
             WHERE id = $1
             RETURNING {ARTICLE_COLUMNS}"
        ))
        .bind(id)
        .bind(req.title)
        .bind(req.content)
        .fetch_optional(&self.pool)
        .await?;

        match updated {
            Some(article) => Ok(Some(self.with_article_images(article).await?)),
            None => Ok(None),
        }
    }

    /// delete_article
    ///
    /// Exhibits that referenced the article keep existing with `article_id` cleared
    /// (ON DELETE SET NULL).
    async fn delete_article(&self, id: Uuid) -> Result<bool> {
        let res = sqlx::query("DELETE FROM articles WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(res.rows_affected() > 0)
    }

    async fn add_article_images(&self, id: Uuid, urls: Vec<String>) -> Result<Option<Article>> {
        let mut tx = self.pool.begin().await?;

        let owner: Option<Uuid> =
            sqlx::query_scalar("SELECT id FROM articles WHERE id = $1 FOR UPDATE")
                .bind(id)
                .fetch_optional(&mut *tx)
                .await?;
        if owner.is_none() {
            return Ok(None);
        }

        append_images(&mut tx, "article_images", "article_id", id, &urls).await?;
        tx.commit().await?;

        self.get_article(id).await
    }
}
