//! Persistence Layer - 数据持久化
//!
//! 基于 sqlx Any 驱动的数据库外壳

pub mod database;

pub use database::{Database, DatabaseError, SyncOptions};
