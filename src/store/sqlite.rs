use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use anyhow::{Context as _, Result};
use rusqlite::{Connection, OptionalExtension as _, TransactionBehavior, params};

use super::RetainedQuoteStore;
use crate::amount::Amount;
use crate::error::Error;
use crate::types::{QuoteHash, RQState, RetainedQuote};

/// Result of a write that is refused when the balance cannot cover it.
enum Guarded {
    Written,
    Duplicate,
    Short { required: Amount, available: Amount },
}

#[derive(Debug)]
pub struct SqliteStore {
    conn: Mutex<Connection>,
    path: PathBuf,
}

impl SqliteStore {
    pub fn open(path: PathBuf) -> Result<Self> {
        if let Some(dir) = path.parent()
            && !dir.as_os_str().is_empty()
        {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("create store dir {}", dir.display()))?;
        }

        let conn =
            Connection::open(&path).with_context(|| format!("open sqlite {}", path.display()))?;
        conn.busy_timeout(Duration::from_secs(5))
            .context("set sqlite busy_timeout")?;
        conn.execute_batch("PRAGMA journal_mode = WAL; PRAGMA foreign_keys = ON;")
            .context("configure sqlite pragmas")?;

        migrate(&conn).context("migrate sqlite schema")?;

        Ok(Self {
            conn: Mutex::new(conn),
            path,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().expect("store mutex poisoned")
    }

    /// Returns false when the hash already exists; the stored row is left untouched.
    fn insert_retained_quote(&self, record: &RetainedQuote) -> Result<bool> {
        Ok(insert_row(&self.conn(), record)? == 1)
    }

    /// Availability check and insert inside one IMMEDIATE transaction, which holds
    /// the database write lock against every other connection until commit.
    fn reserve_retained_quote(&self, record: &RetainedQuote) -> Result<Guarded> {
        let mut conn = self.conn();
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .context("begin reservation")?;

        let exists = tx
            .query_row(
                "SELECT 1 FROM retained_quotes WHERE quote_hash = ?1",
                params![record.quote_hash.to_hex()],
                |_| Ok(()),
            )
            .optional()
            .with_context(|| format!("look up retained quote {}", record.quote_hash))?
            .is_some();
        if exists {
            return Ok(Guarded::Duplicate);
        }

        let available = read_balance(&tx)? - read_reserved(&tx)?;
        if available < record.req_liq {
            return Ok(Guarded::Short {
                required: record.req_liq.clone(),
                available,
            });
        }

        insert_row(&tx, record)?;
        tx.commit()
            .with_context(|| format!("commit reservation {}", record.quote_hash))?;
        Ok(Guarded::Written)
    }

    fn select_retained_quote(&self, hash: &QuoteHash) -> Result<Option<RetainedQuote>> {
        self.conn()
            .query_row(
                r#"
SELECT
  quote_hash,
  deposit_addr,
  signature_hex,
  req_liq,
  state
FROM retained_quotes
WHERE quote_hash = ?1
"#,
                params![hash.to_hex()],
                retained_quote_from_row,
            )
            .optional()
            .with_context(|| format!("get retained quote {hash}"))
    }

    fn upsert_balance(&self, balance: &Amount) -> Result<Guarded> {
        let mut conn = self.conn();
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .context("begin balance update")?;

        let reserved = read_reserved(&tx)?;
        if *balance < reserved {
            return Ok(Guarded::Short {
                required: reserved,
                available: balance.clone(),
            });
        }

        tx.execute(
            r#"
INSERT INTO provider_liquidity (id, balance) VALUES (1, ?1)
ON CONFLICT(id) DO UPDATE SET balance = excluded.balance
"#,
            params![balance],
        )
        .context("set liquidity balance")?;
        tx.commit().context("commit balance update")?;
        Ok(Guarded::Written)
    }

    fn available_liquidity(&self) -> Result<Amount> {
        let mut conn = self.conn();
        let tx = conn.transaction().context("begin liquidity read")?;
        let available = read_balance(&tx)? - read_reserved(&tx)?;
        tx.commit().context("end liquidity read")?;
        Ok(available)
    }

    fn update_state(&self, hash: &QuoteHash, state: RQState) -> Result<usize> {
        self.conn()
            .execute(
                "UPDATE retained_quotes SET state = ?2 WHERE quote_hash = ?1",
                params![hash.to_hex(), state.as_str()],
            )
            .with_context(|| format!("update retained quote state {hash}"))
    }

    fn select_retained_quotes(&self, state: Option<RQState>) -> Result<Vec<RetainedQuote>> {
        let conn = self.conn();
        let mut stmt = conn
            .prepare(
                r#"
SELECT
  quote_hash,
  deposit_addr,
  signature_hex,
  req_liq,
  state
FROM retained_quotes
WHERE ?1 IS NULL OR state = ?1
ORDER BY quote_hash
"#,
            )
            .context("prepare list retained quotes")?;

        let mut out = Vec::new();
        let rows = stmt
            .query_map(params![state.map(RQState::as_str)], retained_quote_from_row)
            .context("query list retained quotes")?;
        for row in rows {
            out.push(row.context("read retained quote row")?);
        }
        Ok(out)
    }
}

impl RetainedQuoteStore for SqliteStore {
    fn retain_quote(&self, record: &RetainedQuote) -> crate::error::Result<()> {
        let inserted = self
            .insert_retained_quote(record)
            .map_err(Error::PersistenceFailure)?;
        if !inserted {
            return Err(Error::AlreadyRetained(record.quote_hash));
        }
        Ok(())
    }

    fn reserve(&self, record: &RetainedQuote) -> crate::error::Result<()> {
        match self
            .reserve_retained_quote(record)
            .map_err(Error::PersistenceFailure)?
        {
            Guarded::Written => Ok(()),
            Guarded::Duplicate => Err(Error::AlreadyRetained(record.quote_hash)),
            Guarded::Short {
                required,
                available,
            } => Err(Error::InsufficientLiquidity {
                required,
                available,
            }),
        }
    }

    fn get_retained_quote(&self, hash: &QuoteHash) -> crate::error::Result<Option<RetainedQuote>> {
        self.select_retained_quote(hash).map_err(Error::PersistenceFailure)
    }

    fn set_liquidity(&self, balance: &Amount) -> crate::error::Result<()> {
        match self
            .upsert_balance(balance)
            .map_err(Error::PersistenceFailure)?
        {
            Guarded::Written | Guarded::Duplicate => Ok(()),
            Guarded::Short {
                required,
                available,
            } => Err(Error::InsufficientLiquidity {
                required,
                available,
            }),
        }
    }

    fn get_liquidity(&self) -> crate::error::Result<Amount> {
        self.available_liquidity().map_err(Error::PersistenceFailure)
    }

    fn set_retained_quote_state(
        &self,
        hash: &QuoteHash,
        state: RQState,
    ) -> crate::error::Result<()> {
        let rows = self
            .update_state(hash, state)
            .map_err(Error::PersistenceFailure)?;
        if rows == 0 {
            return Err(Error::RecordNotFound(*hash));
        }
        Ok(())
    }

    fn list_retained_quotes(
        &self,
        state: Option<RQState>,
    ) -> crate::error::Result<Vec<RetainedQuote>> {
        self.select_retained_quotes(state).map_err(Error::PersistenceFailure)
    }
}

fn insert_row(conn: &Connection, record: &RetainedQuote) -> Result<usize> {
    conn.execute(
        r#"
INSERT OR IGNORE INTO retained_quotes (
  quote_hash,
  deposit_addr,
  signature_hex,
  req_liq,
  state
) VALUES (
  ?1, ?2, ?3, ?4, ?5
)
"#,
        params![
            record.quote_hash.to_hex(),
            &record.deposit_addr,
            &record.signature_hex,
            &record.req_liq,
            record.state.as_str(),
        ],
    )
    .with_context(|| format!("insert retained quote {}", record.quote_hash))
}

fn read_balance(conn: &Connection) -> Result<Amount> {
    Ok(conn
        .query_row(
            "SELECT balance FROM provider_liquidity WHERE id = 1",
            [],
            |row| row.get(0),
        )
        .optional()
        .context("read liquidity balance")?
        .unwrap_or_default())
}

/// Sum of `req_liq` over reservations still in `WaitingForDeposit`.
fn read_reserved(conn: &Connection) -> Result<Amount> {
    let mut stmt = conn
        .prepare("SELECT req_liq FROM retained_quotes WHERE state = ?1")
        .context("prepare active reservations")?;
    let rows = stmt
        .query_map(params![RQState::WaitingForDeposit.as_str()], |row| {
            row.get::<_, Amount>(0)
        })
        .context("query active reservations")?;

    let mut reserved = Amount::zero();
    for row in rows {
        reserved += &row.context("read reservation row")?;
    }
    Ok(reserved)
}

fn retained_quote_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<RetainedQuote> {
    let hash_str: String = row.get(0)?;
    let state_str: String = row.get(4)?;
    let quote_hash = hash_str.parse::<QuoteHash>().map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(
            0,
            rusqlite::types::Type::Text,
            format!("invalid quote_hash {hash_str}: {e:#}").into(),
        )
    })?;
    let state = state_str.parse::<RQState>().map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(
            4,
            rusqlite::types::Type::Text,
            format!("{e:#}").into(),
        )
    })?;
    Ok(RetainedQuote {
        quote_hash,
        deposit_addr: row.get(1)?,
        signature_hex: row.get(2)?,
        req_liq: row.get(3)?,
        state,
    })
}

fn migrate(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
CREATE TABLE IF NOT EXISTS retained_quotes (
  quote_hash TEXT PRIMARY KEY,
  deposit_addr TEXT NOT NULL,
  signature_hex TEXT NOT NULL,
  req_liq TEXT NOT NULL,
  state TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS retained_quotes_state_idx ON retained_quotes(state);
CREATE TABLE IF NOT EXISTS provider_liquidity (
  id INTEGER PRIMARY KEY CHECK (id = 1),
  balance TEXT NOT NULL
);
"#,
    )
    .context("create tables")?;
    Ok(())
}
