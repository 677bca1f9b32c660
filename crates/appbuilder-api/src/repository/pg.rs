//! PostgreSQL 저장소.

use appbuilder_core::{DatabaseConfig, Message, NewMessage, NewUser, User, UserUpdate};
use async_trait::async_trait;
use sqlx::postgres::{PgConnectOptions, PgPoolOptions};
use sqlx::PgPool;
use tracing::info;

use super::{
    map_foreign_key_violation, MessageRepository, Store, StoreError, StoreResult, UserRepository,
};

/// `sqlx::PgPool` 기반 저장소.
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    /// 기존 pool로 생성.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// 설정으로 pool을 만들고 연결합니다.
    ///
    /// `url`이 있으면 그것을, 없으면 개별 필드(`host`, `port`, `user`, `password`, `name`)를 씁니다.
    pub async fn connect(config: &DatabaseConfig) -> Result<Self, sqlx::Error> {
        let pool_options = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(config.acquire_timeout());

        let pool = match &config.url {
            Some(url) => pool_options.connect(url).await?,
            None => pool_options.connect_with(connect_options(config)).await?,
        };

        info!(
            max_connections = config.max_connections,
            "Database pool connected"
        );
        Ok(Self { pool })
    }

    /// 내부 pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// 데이터베이스 마이그레이션을 실행합니다.
    pub async fn migrate(&self) -> Result<(), sqlx::migrate::MigrateError> {
        info!("Running database migrations...");
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        info!("Migrations completed successfully");
        Ok(())
    }
}

/// 개별 필드로 연결 옵션 생성.
fn connect_options(config: &DatabaseConfig) -> PgConnectOptions {
    let mut options = PgConnectOptions::new();
    if let Some(host) = &config.host {
        options = options.host(host);
    }
    if let Some(port) = config.port {
        options = options.port(port);
    }
    if let Some(user) = &config.user {
        options = options.username(user);
    }
    if let Some(password) = &config.password {
        options = options.password(password);
    }
    if let Some(name) = &config.name {
        options = options.database(name);
    }
    options
}

#[async_trait]
impl Store for PgStore {
    async fn get_user(&self, id: i32) -> StoreResult<Option<User>> {
        Ok(UserRepository::find_by_id(&self.pool, id).await?)
    }

    async fn list_users(&self) -> StoreResult<Vec<User>> {
        Ok(UserRepository::list(&self.pool).await?)
    }

    async fn create_user(&self, input: NewUser) -> StoreResult<User> {
        Ok(UserRepository::insert(&self.pool, &input).await?)
    }

    async fn update_user(&self, update: UserUpdate) -> StoreResult<User> {
        UserRepository::update(&self.pool, &update)
            .await?
            .ok_or_else(|| StoreError::NotFound(format!("user {}", update.id)))
    }

    async fn delete_user(&self, id: i32) -> StoreResult<User> {
        UserRepository::delete(&self.pool, id)
            .await?
            .ok_or_else(|| StoreError::NotFound(format!("user {id}")))
    }

    async fn list_messages(&self) -> StoreResult<Vec<Message>> {
        Ok(MessageRepository::list(&self.pool).await?)
    }

    async fn create_message(&self, input: NewMessage) -> StoreResult<Message> {
        MessageRepository::insert(&self.pool, &input)
            .await
            .map_err(|e| map_foreign_key_violation(e, &format!("user {}", input.user_id)))
    }

    async fn update_message(&self, id: i32, message: String) -> StoreResult<Message> {
        MessageRepository::update(&self.pool, id, &message)
            .await?
            .ok_or_else(|| StoreError::NotFound(format!("message {id}")))
    }

    async fn delete_message(&self, id: i32) -> StoreResult<Message> {
        MessageRepository::soft_delete(&self.pool, id)
            .await?
            .ok_or_else(|| StoreError::NotFound(format!("message {id}")))
    }

    async fn ping(&self) -> StoreResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connect_options_from_fields() {
        let config = DatabaseConfig {
            host: Some("db.internal".to_string()),
            port: Some(5433),
            user: Some("app".to_string()),
            name: Some("appbuilder".to_string()),
            ..Default::default()
        };
        let options = connect_options(&config);
        assert_eq!(options.get_host(), "db.internal");
        assert_eq!(options.get_port(), 5433);
        assert_eq!(options.get_username(), "app");
        assert_eq!(options.get_database(), Some("appbuilder"));
    }
}
