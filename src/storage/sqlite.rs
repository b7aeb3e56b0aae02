//! SQLite-backed store. One connection behind a mutex is enough here:
//! write-through traffic is low-frequency admin work, and bulk reads only
//! happen during a sync pass.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension};
use unic_langid::LanguageIdentifier;

use crate::cache::Translation;
use crate::error::Result;
use crate::locale;

use super::Storage;

#[derive(Clone)]
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// Open (or create) the database and ensure the schema exists.
    pub fn new(database_path: &str) -> Result<Self> {
        let conn = Connection::open(database_path)?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS translations (
                locale TEXT NOT NULL,
                key TEXT NOT NULL,
                value TEXT NOT NULL,
                PRIMARY KEY (locale, key)
            )",
            [],
        )?;

        // rowid doubles as insertion order, which negotiation tie-breaks on
        conn.execute(
            "CREATE TABLE IF NOT EXISTS locales (
                locale TEXT PRIMARY KEY,
                is_default INTEGER NOT NULL DEFAULT 0
            )",
            [],
        )?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }
}

#[async_trait]
impl Storage for SqliteStore {
    async fn get_all(&self) -> Result<Vec<Translation>> {
        let rows: Vec<(String, String, String)> = {
            let conn = self.conn.lock().unwrap();
            let mut stmt =
                conn.prepare("SELECT locale, key, value FROM translations ORDER BY locale, key")?;
            let rows = stmt
                .query_map([], |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)))?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            rows
        };

        rows.into_iter()
            .map(|(tag, key, value)| Ok(Translation::new(locale::parse(&tag)?, key, value)))
            .collect()
    }

    async fn store(&self, translation: &Translation) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO translations (locale, key, value) VALUES (?1, ?2, ?3)
             ON CONFLICT(locale, key) DO UPDATE SET value = excluded.value",
            params![
                locale::canonical(&translation.locale),
                translation.key,
                translation.value
            ],
        )?;
        Ok(())
    }

    async fn delete(&self, translation: &Translation) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "DELETE FROM translations WHERE locale = ?1 AND key = ?2",
            params![locale::canonical(&translation.locale), translation.key],
        )?;
        Ok(())
    }

    async fn supported_locales(&self) -> Result<Vec<LanguageIdentifier>> {
        let tags: Vec<String> = {
            let conn = self.conn.lock().unwrap();
            let mut stmt = conn.prepare("SELECT locale FROM locales ORDER BY rowid")?;
            let tags = stmt
                .query_map([], |row| row.get(0))?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            tags
        };

        tags.iter().map(|tag| locale::parse(tag)).collect()
    }

    async fn default_locale(&self) -> Result<LanguageIdentifier> {
        let tag: Option<String> = {
            let conn = self.conn.lock().unwrap();
            let mut stmt = conn.prepare("SELECT locale FROM locales WHERE is_default = 1")?;
            stmt.query_row([], |row| row.get(0)).optional()?
        };

        match tag {
            Some(tag) => locale::parse(&tag),
            None => Ok(LanguageIdentifier::default()),
        }
    }

    async fn set_default_locale(&self, target: &LanguageIdentifier) -> Result<()> {
        let tag = locale::canonical(target);
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO locales (locale, is_default) VALUES (?1, 1)
             ON CONFLICT(locale) DO UPDATE SET is_default = 1",
            params![tag],
        )?;
        conn.execute(
            "UPDATE locales SET is_default = 0 WHERE locale != ?1",
            params![tag],
        )?;
        Ok(())
    }

    async fn add_supported_locale(&self, target: &LanguageIdentifier) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT OR IGNORE INTO locales (locale) VALUES (?1)",
            params![locale::canonical(target)],
        )?;
        Ok(())
    }

    async fn remove_supported_locale(&self, target: &LanguageIdentifier) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "DELETE FROM locales WHERE locale = ?1",
            params![locale::canonical(target)],
        )?;
        Ok(())
    }
}
