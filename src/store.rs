use std::path::Path;

use rusqlite::Connection;

use crate::error::Result;
use crate::models::{Account, Transaction};

// ---------------------------------------------------------------------------
// Link predicates
// ---------------------------------------------------------------------------
//
// Transactions in the wild reference their account through several legacy
// field conventions. The set is data, not call sites: adding or retiring a
// convention is an edit to this table.

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LinkSource {
    Account,
    User,
}

#[derive(Debug, Clone, Copy)]
pub struct LinkPredicate {
    /// Document field the query matches against.
    pub field: &'static str,
    /// Which side of the account/user pair supplies the match value.
    pub source: LinkSource,
}

pub const LINK_PREDICATES: &[LinkPredicate] = &[
    LinkPredicate { field: "accountId", source: LinkSource::Account },
    LinkPredicate { field: "userId", source: LinkSource::User },
    LinkPredicate { field: "fromAccount", source: LinkSource::Account },
    LinkPredicate { field: "toAccount", source: LinkSource::Account },
];

impl LinkPredicate {
    pub fn match_value<'a>(&self, account_id: &'a str, user_id: &'a str) -> &'a str {
        match self.source {
            LinkSource::Account => account_id,
            LinkSource::User => user_id,
        }
    }
}

// ---------------------------------------------------------------------------
// Store contract
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default)]
pub struct AccountFilter {
    pub user_id: Option<String>,
    pub account_id: Option<String>,
}

pub trait LedgerStore {
    /// Accounts matching the filter, ordered by id.
    fn accounts(&self, filter: &AccountFilter) -> Result<Vec<Account>>;

    /// Transactions matching one link predicate, newest first.
    fn transactions_by(
        &self,
        predicate: &LinkPredicate,
        account_id: &str,
        user_id: &str,
    ) -> Result<Vec<Transaction>>;

    fn transaction_exists(&self, id: &str) -> Result<bool>;

    /// Persist a batch atomically. Ids already present are left untouched,
    /// so replaying a batch is harmless. Returns the number actually written.
    fn commit_batch(&mut self, batch: &[Transaction]) -> Result<usize>;
}

// ---------------------------------------------------------------------------
// SQLite-backed store
// ---------------------------------------------------------------------------
//
// The upstream system keeps accounts and transactions as schema-less
// documents, so each row here is one JSON document; the typed columns are
// just the primary key. Queries go through json_extract, with expression
// indexes on the linkage fields.

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS accounts (
    id TEXT PRIMARY KEY,
    doc TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS transactions (
    id TEXT PRIMARY KEY,
    doc TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_accounts_user
    ON accounts (json_extract(doc, '$.userId'));
CREATE INDEX IF NOT EXISTS idx_txns_account
    ON transactions (json_extract(doc, '$.accountId'));
CREATE INDEX IF NOT EXISTS idx_txns_user
    ON transactions (json_extract(doc, '$.userId'));
CREATE INDEX IF NOT EXISTS idx_txns_from
    ON transactions (json_extract(doc, '$.fromAccount'));
CREATE INDEX IF NOT EXISTS idx_txns_to
    ON transactions (json_extract(doc, '$.toAccount'));
";

pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    pub fn open(db_path: &Path) -> Result<Self> {
        let conn = Connection::open(db_path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self { conn })
    }

    /// Upsert an account document. Accounts are owned by the portal, not the
    /// engine; this exists for seeding and tests.
    pub fn put_account(&self, account: &Account) -> Result<()> {
        let doc = serde_json::to_string(account)?;
        self.conn.execute(
            "INSERT INTO accounts (id, doc) VALUES (?1, ?2) \
             ON CONFLICT(id) DO UPDATE SET doc = excluded.doc",
            rusqlite::params![account.id, doc],
        )?;
        Ok(())
    }

    /// Insert a raw transaction document, bypassing the typed model. Lets
    /// tests and seed tooling plant legacy-shaped rows.
    pub fn put_raw_transaction(&self, id: &str, doc: &serde_json::Value) -> Result<()> {
        self.conn.execute(
            "INSERT OR IGNORE INTO transactions (id, doc) VALUES (?1, ?2)",
            rusqlite::params![id, doc.to_string()],
        )?;
        Ok(())
    }

    pub fn transaction_count(&self) -> Result<i64> {
        Ok(self
            .conn
            .query_row("SELECT count(*) FROM transactions", [], |r| r.get(0))?)
    }
}

impl LedgerStore for SqliteStore {
    fn accounts(&self, filter: &AccountFilter) -> Result<Vec<Account>> {
        let mut sql = String::from("SELECT doc FROM accounts");
        let mut clauses: Vec<&str> = Vec::new();
        let mut params: Vec<&str> = Vec::new();
        if let Some(user_id) = &filter.user_id {
            clauses.push("json_extract(doc, '$.userId') = ?");
            params.push(user_id);
        }
        if let Some(account_id) = &filter.account_id {
            clauses.push("id = ?");
            params.push(account_id);
        }
        if !clauses.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&clauses.join(" AND "));
        }
        sql.push_str(" ORDER BY id");

        let mut stmt = self.conn.prepare(&sql)?;
        let docs: Vec<String> = stmt
            .query_map(rusqlite::params_from_iter(params), |row| row.get(0))?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        docs.iter()
            .map(|doc| Ok(serde_json::from_str(doc)?))
            .collect()
    }

    fn transactions_by(
        &self,
        predicate: &LinkPredicate,
        account_id: &str,
        user_id: &str,
    ) -> Result<Vec<Transaction>> {
        // `field` comes from the const predicate table, never from input.
        let sql = format!(
            "SELECT doc FROM transactions \
             WHERE json_extract(doc, '$.{}') = ?1 \
             ORDER BY json_extract(doc, '$.timestamp') DESC",
            predicate.field
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let docs: Vec<String> = stmt
            .query_map([predicate.match_value(account_id, user_id)], |row| row.get(0))?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        // Field-level garbage is already absorbed by the lenient model; a
        // document that still fails to decode (e.g. no id at all) is dropped
        // on its own rather than discarding the whole predicate's rows.
        Ok(docs
            .iter()
            .filter_map(|doc| serde_json::from_str(doc).ok())
            .collect())
    }

    fn transaction_exists(&self, id: &str) -> Result<bool> {
        let mut stmt = self
            .conn
            .prepare_cached("SELECT 1 FROM transactions WHERE id = ?1")?;
        Ok(stmt.exists([id])?)
    }

    fn commit_batch(&mut self, batch: &[Transaction]) -> Result<usize> {
        let tx = self.conn.transaction()?;
        let mut written = 0usize;
        {
            let mut stmt =
                tx.prepare("INSERT OR IGNORE INTO transactions (id, doc) VALUES (?1, ?2)")?;
            for txn in batch {
                let doc = serde_json::to_string(txn)?;
                written += stmt.execute(rusqlite::params![txn.id, doc])?;
            }
        }
        tx.commit()?;
        Ok(written)
    }
}
