//! 集成测试共用的数据库与数据准备

#![allow(dead_code)]

use entity::{api_keys, providers, users};
use key_relay::config::DatabaseConfig;
use key_relay::database::{init_database, run_migrations};
use sea_orm::{ActiveModelTrait, DatabaseConnection, Set};
use tempfile::TempDir;

/// 在临时目录中创建并迁移 SQLite 数据库
pub async fn temp_database() -> (DatabaseConnection, TempDir) {
    let dir = tempfile::tempdir().expect("创建临时目录失败");
    let config = DatabaseConfig {
        url: format!("sqlite://{}?mode=rwc", dir.path().join("relay.db").display()),
        ..DatabaseConfig::default()
    };
    let db = init_database(&config).await.expect("数据库连接失败");
    run_migrations(&db).await.expect("数据库迁移失败");
    (db, dir)
}

pub async fn insert_user(db: &DatabaseConnection, email: &str) -> users::Model {
    users::ActiveModel {
        name: Set(email.to_string()),
        email: Set(email.to_string()),
        is_admin: Set(false),
        ..Default::default()
    }
    .insert(db)
    .await
    .expect("插入用户失败")
}

pub async fn insert_provider(
    db: &DatabaseConnection,
    name: &str,
    base_url: &str,
    is_active: bool,
) -> providers::Model {
    providers::ActiveModel {
        name: Set(name.to_string()),
        api_key: Set(format!("sk-{name}-real")),
        base_url: Set(base_url.to_string()),
        path: Set(None),
        is_active: Set(is_active),
        ..Default::default()
    }
    .insert(db)
    .await
    .expect("插入服务商失败")
}

pub async fn insert_key(
    db: &DatabaseConnection,
    user_id: i32,
    provider_id: i32,
    proxy_key: &str,
    is_active: bool,
) -> api_keys::Model {
    api_keys::ActiveModel {
        user_id: Set(user_id),
        provider_id: Set(provider_id),
        name: Set(format!("{proxy_key} key")),
        api_key: Set(proxy_key.to_string()),
        is_active: Set(is_active),
        ..Default::default()
    }
    .insert(db)
    .await
    .expect("插入代理密钥失败")
}
