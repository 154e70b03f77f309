//! Bundled Models
//!
//! `user` 与 `blog_post` 两张表，`BlogPost` 属于 `User`。

use crate::application::{Association, Dialect, Model, Models};

fn primary_key(dialect: Dialect) -> &'static str {
    match dialect {
        Dialect::Sqlite => "INTEGER PRIMARY KEY AUTOINCREMENT",
        Dialect::Postgres => "SERIAL PRIMARY KEY",
        Dialect::Mysql => "INTEGER PRIMARY KEY AUTO_INCREMENT",
    }
}

pub struct UserModel;

impl Model for UserModel {
    fn name(&self) -> &str {
        "user"
    }

    fn table(&self) -> &str {
        "users"
    }

    fn definition(&self, dialect: Dialect) -> String {
        format!(
            "CREATE TABLE IF NOT EXISTS users (\
             id {}, \
             name VARCHAR(255) NOT NULL, \
             email VARCHAR(255) NOT NULL UNIQUE, \
             created_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP)",
            primary_key(dialect)
        )
    }

    fn associate(&self, models: &Models) -> Vec<Association> {
        if models.contains("BlogPost") {
            vec![Association::has_many("User", "BlogPost", "user_id")]
        } else {
            Vec::new()
        }
    }
}

pub struct BlogPostModel;

impl Model for BlogPostModel {
    fn name(&self) -> &str {
        "blog_post"
    }

    fn table(&self) -> &str {
        "blog_posts"
    }

    fn definition(&self, dialect: Dialect) -> String {
        format!(
            "CREATE TABLE IF NOT EXISTS blog_posts (\
             id {}, \
             user_id INTEGER NOT NULL REFERENCES users(id), \
             title VARCHAR(255) NOT NULL, \
             body TEXT, \
             created_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP)",
            primary_key(dialect)
        )
    }

    fn associate(&self, models: &Models) -> Vec<Association> {
        if models.contains("User") {
            vec![Association::belongs_to("BlogPost", "User", "user_id")]
        } else {
            Vec::new()
        }
    }
}
