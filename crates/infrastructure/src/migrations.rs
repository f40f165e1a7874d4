use sqlx::migrate::Migrator;

/// 线路表、存储函数、遗留队列与变更触发器
pub static MIGRATOR: Migrator = sqlx::migrate!("../../migrations");
