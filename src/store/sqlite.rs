use super::{
    CurrentValuationRepositoryTrait, HistoricalValuationRepositoryTrait,
    ValuationAreaRegistryTrait, ValuationStore,
};
use crate::aggregator::Movement;
use crate::error::{Result, ValuationError};
use crate::model::{
    CurrentValuation, HistoricalValuation, NewCurrentValuation, NewHistoricalValuation,
    RunningBalance,
};
use crate::schema::{
    AccountId, CompanyId, DimensionKey, Period, ProductId, ValuationAreaId,
};
use log::debug;
use parking_lot::Mutex;
use rusqlite::types::Type;
use rusqlite::{ffi, params, params_from_iter, Connection, ErrorCode, OptionalExtension, Row};
use std::collections::BTreeSet;
use std::fmt::Display;
use std::path::Path;
use std::time::Duration;

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS valuation_area (
    id INTEGER PRIMARY KEY,
    name TEXT NOT NULL,
    company_id INTEGER NOT NULL,
    is_default INTEGER NOT NULL DEFAULT 0
);
CREATE UNIQUE INDEX IF NOT EXISTS valuation_area_default_uniq
    ON valuation_area (company_id) WHERE is_default = 1;

CREATE TABLE IF NOT EXISTS product_valuation (
    id INTEGER PRIMARY KEY,
    product_id INTEGER NOT NULL,
    valuation_area_id INTEGER,
    account_id INTEGER NOT NULL,
    company_id INTEGER NOT NULL,
    quantity REAL NOT NULL DEFAULT 0,
    quantity_in REAL NOT NULL DEFAULT 0,
    quantity_out REAL NOT NULL DEFAULT 0,
    debit REAL NOT NULL DEFAULT 0,
    credit REAL NOT NULL DEFAULT 0,
    amount REAL NOT NULL DEFAULT 0
);
CREATE UNIQUE INDEX IF NOT EXISTS product_valuation_uniq
    ON product_valuation (product_id, valuation_area_id, account_id, company_id)
    WHERE valuation_area_id IS NOT NULL;
CREATE UNIQUE INDEX IF NOT EXISTS product_valuation_no_area_uniq
    ON product_valuation (product_id, account_id, company_id)
    WHERE valuation_area_id IS NULL;
CREATE INDEX IF NOT EXISTS product_valuation_account
    ON product_valuation (account_id);

CREATE TABLE IF NOT EXISTS product_valuation_history (
    id INTEGER PRIMARY KEY,
    product_id INTEGER NOT NULL,
    valuation_area_id INTEGER,
    account_id INTEGER NOT NULL,
    company_id INTEGER NOT NULL,
    year INTEGER NOT NULL,
    month INTEGER NOT NULL,
    date TEXT NOT NULL,
    quantity REAL NOT NULL DEFAULT 0,
    quantity_in REAL NOT NULL DEFAULT 0,
    quantity_out REAL NOT NULL DEFAULT 0,
    debit REAL NOT NULL DEFAULT 0,
    credit REAL NOT NULL DEFAULT 0,
    amount REAL NOT NULL DEFAULT 0,
    quantity_initial REAL NOT NULL DEFAULT 0,
    quantity_final REAL NOT NULL DEFAULT 0,
    amount_initial REAL NOT NULL DEFAULT 0,
    amount_final REAL NOT NULL DEFAULT 0
);
CREATE UNIQUE INDEX IF NOT EXISTS product_valuation_history_uniq
    ON product_valuation_history
        (product_id, valuation_area_id, account_id, company_id, year, month)
    WHERE valuation_area_id IS NOT NULL;
CREATE UNIQUE INDEX IF NOT EXISTS product_valuation_history_no_area_uniq
    ON product_valuation_history (product_id, account_id, company_id, year, month)
    WHERE valuation_area_id IS NULL;
CREATE INDEX IF NOT EXISTS product_valuation_history_account
    ON product_valuation_history (account_id);
";

const CURRENT_COLUMNS: &str = "id, product_id, valuation_area_id, account_id, company_id, \
     quantity, quantity_in, quantity_out, debit, credit, amount";

const HISTORY_COLUMNS: &str = "id, product_id, valuation_area_id, account_id, company_id, \
     year, month, date, quantity, quantity_in, quantity_out, debit, credit, amount, \
     quantity_initial, quantity_final, amount_initial, amount_final";

/// SQLite-backed valuation tables and valuation-area registry.
///
/// Each store owns one connection. Several stores may open the same
/// database file; the unique indexes arbitrate between them.
pub struct SqliteValuationStore {
    conn: Mutex<Connection>,
}

impl SqliteValuationStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let conn = Connection::open(path)?;
        Self::from_connection(conn)
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::from_connection(conn)
    }

    pub fn from_connection(conn: Connection) -> Result<Self> {
        conn.busy_timeout(Duration::from_secs(5))?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }
}

fn key_from_row(row: &Row<'_>) -> rusqlite::Result<DimensionKey> {
    Ok(DimensionKey::new(
        ProductId(row.get(1)?),
        row.get::<_, Option<i64>>(2)?.map(ValuationAreaId),
        AccountId(row.get(3)?),
        CompanyId(row.get(4)?),
    ))
}

fn current_from_row(row: &Row<'_>) -> rusqlite::Result<CurrentValuation> {
    Ok(CurrentValuation {
        id: row.get(0)?,
        key: key_from_row(row)?,
        movement: Movement {
            quantity: row.get(5)?,
            quantity_in: row.get(6)?,
            quantity_out: row.get(7)?,
            debit: row.get(8)?,
            credit: row.get(9)?,
            amount: row.get(10)?,
        },
    })
}

fn history_from_row(row: &Row<'_>) -> rusqlite::Result<HistoricalValuation> {
    Ok(HistoricalValuation {
        id: row.get(0)?,
        key: key_from_row(row)?,
        period: Period::new(row.get(5)?, row.get(6)?).map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(6, Type::Integer, Box::new(e))
        })?,
        date: row.get(7)?,
        movement: Movement {
            quantity: row.get(8)?,
            quantity_in: row.get(9)?,
            quantity_out: row.get(10)?,
            debit: row.get(11)?,
            credit: row.get(12)?,
            amount: row.get(13)?,
        },
        balance: RunningBalance {
            quantity_initial: row.get(14)?,
            quantity_final: row.get(15)?,
            amount_initial: row.get(16)?,
            amount_final: row.get(17)?,
        },
    })
}

fn map_insert_error(err: rusqlite::Error, what: impl Display) -> ValuationError {
    match &err {
        rusqlite::Error::SqliteFailure(failure, _)
            if failure.code == ErrorCode::ConstraintViolation
                && failure.extended_code == ffi::SQLITE_CONSTRAINT_UNIQUE =>
        {
            ValuationError::UniqueViolation(what.to_string())
        }
        _ => ValuationError::Database(err),
    }
}

fn delete_for_accounts(
    conn: &Connection,
    table: &str,
    accounts: &BTreeSet<AccountId>,
) -> Result<usize> {
    if accounts.is_empty() {
        return Ok(0);
    }
    let placeholders = vec!["?"; accounts.len()].join(", ");
    let sql = format!("DELETE FROM {} WHERE account_id IN ({})", table, placeholders);
    Ok(conn.execute(&sql, params_from_iter(accounts.iter().map(|a| a.0)))?)
}

fn insert_current_rows(conn: &Connection, rows: &[NewCurrentValuation]) -> Result<usize> {
    let mut stmt = conn.prepare(
        "INSERT INTO product_valuation
            (product_id, valuation_area_id, account_id, company_id,
             quantity, quantity_in, quantity_out, debit, credit, amount)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
    )?;
    for row in rows {
        let m = &row.movement;
        stmt.execute(params![
            row.key.product.0,
            row.key.valuation_area.map(|a| a.0),
            row.key.account.0,
            row.key.company.0,
            m.quantity,
            m.quantity_in,
            m.quantity_out,
            m.debit,
            m.credit,
            m.amount,
        ])
        .map_err(|e| map_insert_error(e, row.key))?;
    }
    Ok(rows.len())
}

fn insert_history_rows(conn: &Connection, rows: &[NewHistoricalValuation]) -> Result<usize> {
    let mut stmt = conn.prepare(
        "INSERT INTO product_valuation_history
            (product_id, valuation_area_id, account_id, company_id, year, month, date,
             quantity, quantity_in, quantity_out, debit, credit, amount,
             quantity_initial, quantity_final, amount_initial, amount_final)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17)",
    )?;
    for row in rows {
        let m = &row.movement;
        let b = &row.balance;
        stmt.execute(params![
            row.key.product.0,
            row.key.valuation_area.map(|a| a.0),
            row.key.account.0,
            row.key.company.0,
            row.period.year(),
            row.period.month(),
            row.date(),
            m.quantity,
            m.quantity_in,
            m.quantity_out,
            m.debit,
            m.credit,
            m.amount,
            b.quantity_initial,
            b.quantity_final,
            b.amount_initial,
            b.amount_final,
        ])
        .map_err(|e| map_insert_error(e, format!("{} {}", row.key, row.period)))?;
    }
    Ok(rows.len())
}

impl CurrentValuationRepositoryTrait for SqliteValuationStore {
    fn find_current(&self, key: &DimensionKey) -> Result<Option<CurrentValuation>> {
        let conn = self.conn.lock();
        let sql = format!(
            "SELECT {} FROM product_valuation
             WHERE product_id = ?1 AND valuation_area_id IS ?2
               AND account_id = ?3 AND company_id = ?4",
            CURRENT_COLUMNS
        );
        let row = conn
            .query_row(
                &sql,
                params![
                    key.product.0,
                    key.valuation_area.map(|a| a.0),
                    key.account.0,
                    key.company.0
                ],
                current_from_row,
            )
            .optional()?;
        Ok(row)
    }

    fn insert_current(&self, key: &DimensionKey) -> Result<CurrentValuation> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO product_valuation (product_id, valuation_area_id, account_id, company_id)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                key.product.0,
                key.valuation_area.map(|a| a.0),
                key.account.0,
                key.company.0
            ],
        )
        .map_err(|e| map_insert_error(e, key))?;

        Ok(CurrentValuation {
            id: conn.last_insert_rowid(),
            key: *key,
            movement: Movement::default(),
        })
    }

    fn list_current(&self) -> Result<Vec<CurrentValuation>> {
        let conn = self.conn.lock();
        let sql = format!(
            "SELECT {} FROM product_valuation
             ORDER BY product_id, valuation_area_id, account_id, company_id",
            CURRENT_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map([], current_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    fn update_current_movements(&self, rows: &[CurrentValuation]) -> Result<()> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        {
            let mut stmt = tx.prepare(
                "UPDATE product_valuation
                 SET quantity = ?1, quantity_in = ?2, quantity_out = ?3,
                     debit = ?4, credit = ?5, amount = ?6
                 WHERE id = ?7",
            )?;
            for row in rows {
                let m = &row.movement;
                stmt.execute(params![
                    m.quantity,
                    m.quantity_in,
                    m.quantity_out,
                    m.debit,
                    m.credit,
                    m.amount,
                    row.id
                ])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    fn replace_current(
        &self,
        accounts: &BTreeSet<AccountId>,
        rows: &[NewCurrentValuation],
    ) -> Result<usize> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        let deleted = delete_for_accounts(&tx, "product_valuation", accounts)?;
        let inserted = insert_current_rows(&tx, rows)?;
        tx.commit()?;

        debug!(
            "Replaced current valuations: {} deleted, {} inserted",
            deleted, inserted
        );
        Ok(inserted)
    }
}

impl HistoricalValuationRepositoryTrait for SqliteValuationStore {
    fn find_history(
        &self,
        key: &DimensionKey,
        period: Period,
    ) -> Result<Option<HistoricalValuation>> {
        let conn = self.conn.lock();
        let sql = format!(
            "SELECT {} FROM product_valuation_history
             WHERE product_id = ?1 AND valuation_area_id IS ?2
               AND account_id = ?3 AND company_id = ?4
               AND year = ?5 AND month = ?6",
            HISTORY_COLUMNS
        );
        let row = conn
            .query_row(
                &sql,
                params![
                    key.product.0,
                    key.valuation_area.map(|a| a.0),
                    key.account.0,
                    key.company.0,
                    period.year(),
                    period.month()
                ],
                history_from_row,
            )
            .optional()?;
        Ok(row)
    }

    fn insert_history(&self, key: &DimensionKey, period: Period) -> Result<HistoricalValuation> {
        let conn = self.conn.lock();
        let date = period.end_date();
        conn.execute(
            "INSERT INTO product_valuation_history
                (product_id, valuation_area_id, account_id, company_id, year, month, date)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                key.product.0,
                key.valuation_area.map(|a| a.0),
                key.account.0,
                key.company.0,
                period.year(),
                period.month(),
                date
            ],
        )
        .map_err(|e| map_insert_error(e, format!("{} {}", key, period)))?;

        Ok(HistoricalValuation {
            id: conn.last_insert_rowid(),
            key: *key,
            period,
            date,
            movement: Movement::default(),
            balance: RunningBalance::default(),
        })
    }

    fn list_history(&self) -> Result<Vec<HistoricalValuation>> {
        let conn = self.conn.lock();
        let sql = format!(
            "SELECT {} FROM product_valuation_history
             ORDER BY product_id, valuation_area_id, account_id, company_id, year, month",
            HISTORY_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map([], history_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    fn update_history_movements(&self, rows: &[HistoricalValuation]) -> Result<()> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        {
            let mut stmt = tx.prepare(
                "UPDATE product_valuation_history
                 SET quantity = ?1, quantity_in = ?2, quantity_out = ?3,
                     debit = ?4, credit = ?5, amount = ?6, date = ?7
                 WHERE id = ?8",
            )?;
            for row in rows {
                let m = &row.movement;
                stmt.execute(params![
                    m.quantity,
                    m.quantity_in,
                    m.quantity_out,
                    m.debit,
                    m.credit,
                    m.amount,
                    row.date,
                    row.id
                ])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    fn replace_history(
        &self,
        accounts: &BTreeSet<AccountId>,
        rows: &[NewHistoricalValuation],
    ) -> Result<usize> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        let deleted = delete_for_accounts(&tx, "product_valuation_history", accounts)?;
        let inserted = insert_history_rows(&tx, rows)?;
        tx.commit()?;

        debug!(
            "Replaced valuation history: {} deleted, {} inserted",
            deleted, inserted
        );
        Ok(inserted)
    }
}

impl ValuationStore for SqliteValuationStore {
    fn replace_all(
        &self,
        accounts: &BTreeSet<AccountId>,
        current: &[NewCurrentValuation],
        history: &[NewHistoricalValuation],
    ) -> Result<(usize, usize)> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        delete_for_accounts(&tx, "product_valuation", accounts)?;
        delete_for_accounts(&tx, "product_valuation_history", accounts)?;
        let current_count = insert_current_rows(&tx, current)?;
        let history_count = insert_history_rows(&tx, history)?;
        tx.commit()?;
        Ok((current_count, history_count))
    }
}

impl ValuationAreaRegistryTrait for SqliteValuationStore {
    fn default_area(&self, company: CompanyId) -> Result<Option<ValuationAreaId>> {
        let conn = self.conn.lock();
        let id = conn
            .query_row(
                "SELECT id FROM valuation_area WHERE company_id = ?1 AND is_default = 1",
                params![company.0],
                |row| row.get::<_, i64>(0),
            )
            .optional()?;
        Ok(id.map(ValuationAreaId))
    }

    fn create_default_area(&self, company: CompanyId, name: &str) -> Result<ValuationAreaId> {
        let inserted = {
            let conn = self.conn.lock();
            conn.execute(
                "INSERT INTO valuation_area (name, company_id, is_default) VALUES (?1, ?2, 1)",
                params![name, company.0],
            )
            .map(|_| conn.last_insert_rowid())
            .map_err(|e| map_insert_error(e, format!("default valuation area of company {}", company)))
        };

        match inserted {
            Ok(id) => Ok(ValuationAreaId(id)),
            Err(ValuationError::UniqueViolation(_)) => {
                self.default_area(company)?.ok_or_else(|| {
                    ValuationError::Storage(format!(
                        "default valuation area of company {} vanished after conflict",
                        company
                    ))
                })
            }
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(area: Option<i64>) -> DimensionKey {
        DimensionKey::new(ProductId(1), area.map(ValuationAreaId), AccountId(371), CompanyId(1))
    }

    fn new_current(product: i64, account: i64, quantity: f64) -> NewCurrentValuation {
        NewCurrentValuation {
            key: DimensionKey::new(ProductId(product), None, AccountId(account), CompanyId(1)),
            movement: Movement {
                quantity,
                ..Movement::default()
            },
        }
    }

    #[test]
    fn test_insert_and_find_current() {
        let store = SqliteValuationStore::open_in_memory().unwrap();
        assert!(store.find_current(&key(None)).unwrap().is_none());

        let created = store.insert_current(&key(None)).unwrap();
        let found = store.find_current(&key(None)).unwrap().unwrap();
        assert_eq!(created, found);
        assert!(store.find_current(&key(Some(2))).unwrap().is_none());
    }

    #[test]
    fn test_duplicate_insert_is_unique_violation_even_without_area() {
        let store = SqliteValuationStore::open_in_memory().unwrap();
        store.insert_current(&key(None)).unwrap();

        let err = store.insert_current(&key(None)).unwrap_err();
        assert!(matches!(err, ValuationError::UniqueViolation(_)));

        store.insert_current(&key(Some(3))).unwrap();
        assert_eq!(store.list_current().unwrap().len(), 2);
    }

    #[test]
    fn test_negative_area_id_is_not_the_missing_area() {
        let store = SqliteValuationStore::open_in_memory().unwrap();
        let none = store.insert_current(&key(None)).unwrap();
        let minus_one = store.insert_current(&key(Some(-1))).unwrap();
        assert_ne!(none.id, minus_one.id);
        assert_eq!(store.find_current(&key(Some(-1))).unwrap(), Some(minus_one));

        let period = Period::new(2023, 1).unwrap();
        store.insert_history(&key(None), period).unwrap();
        store.insert_history(&key(Some(-1)), period).unwrap();
        assert_eq!(store.list_history().unwrap().len(), 2);
        assert!(matches!(
            store.insert_history(&key(Some(-1)), period),
            Err(ValuationError::UniqueViolation(_))
        ));
    }

    #[test]
    fn test_only_unique_constraints_map_to_unique_violation() {
        let store = SqliteValuationStore::open_in_memory().unwrap();
        let err = store
            .conn
            .lock()
            .execute(
                "INSERT INTO product_valuation (product_id, account_id, company_id)
                 VALUES (NULL, 371, 1)",
                [],
            )
            .unwrap_err();

        assert!(matches!(
            map_insert_error(err, key(None)),
            ValuationError::Database(_)
        ));
    }

    #[test]
    fn test_history_unique_per_period() {
        let store = SqliteValuationStore::open_in_memory().unwrap();
        let jan = Period::new(2023, 1).unwrap();
        let feb = Period::new(2023, 2).unwrap();

        let row = store.insert_history(&key(None), jan).unwrap();
        assert_eq!(row.date, jan.end_date());
        store.insert_history(&key(None), feb).unwrap();
        assert!(matches!(
            store.insert_history(&key(None), jan),
            Err(ValuationError::UniqueViolation(_))
        ));

        let found = store.find_history(&key(None), feb).unwrap().unwrap();
        assert_eq!(found.month(), 2);
    }

    #[test]
    fn test_replace_current_only_touches_given_accounts() {
        let store = SqliteValuationStore::open_in_memory().unwrap();
        store
            .replace_current(
                &[AccountId(371), AccountId(607)].into_iter().collect(),
                &[new_current(1, 371, 5.0), new_current(1, 607, 7.0)],
            )
            .unwrap();

        let accounts: BTreeSet<AccountId> = [AccountId(371)].into_iter().collect();
        store
            .replace_current(&accounts, &[new_current(2, 371, 9.0)])
            .unwrap();

        let rows = store.list_current().unwrap();
        assert_eq!(rows.len(), 2);
        assert!(rows.iter().any(|r| r.key.account == AccountId(607)));
        assert!(rows
            .iter()
            .any(|r| r.key.product == ProductId(2) && r.movement.quantity == 9.0));
    }

    #[test]
    fn test_failed_replace_leaves_previous_rows() {
        let store = SqliteValuationStore::open_in_memory().unwrap();
        let accounts: BTreeSet<AccountId> = [AccountId(371)].into_iter().collect();
        store
            .replace_current(&accounts, &[new_current(1, 371, 5.0)])
            .unwrap();

        // Duplicate keys abort the transaction after the delete ran.
        let result = store.replace_current(
            &accounts,
            &[new_current(2, 371, 1.0), new_current(2, 371, 2.0)],
        );
        assert!(matches!(result, Err(ValuationError::UniqueViolation(_))));

        let rows = store.list_current().unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].movement.quantity, 5.0);
    }

    #[test]
    fn test_failed_replace_all_leaves_both_tables() {
        let store = SqliteValuationStore::open_in_memory().unwrap();
        let accounts: BTreeSet<AccountId> = [AccountId(371)].into_iter().collect();
        let period = Period::new(2023, 1).unwrap();
        let history_row = |quantity: f64| NewHistoricalValuation {
            key: key(None),
            period,
            movement: Movement {
                quantity,
                ..Movement::default()
            },
            balance: RunningBalance {
                quantity_final: quantity,
                ..RunningBalance::default()
            },
        };
        store
            .replace_all(&accounts, &[new_current(1, 371, 5.0)], &[history_row(5.0)])
            .unwrap();

        // The current rows insert fine; the duplicated history row fails last.
        let result = store.replace_all(
            &accounts,
            &[new_current(1, 371, 8.0), new_current(2, 371, 1.0)],
            &[history_row(8.0), history_row(8.0)],
        );
        assert!(matches!(result, Err(ValuationError::UniqueViolation(_))));

        let current = store.list_current().unwrap();
        assert_eq!(current.len(), 1);
        assert_eq!(current[0].movement.quantity, 5.0);

        let history = store.list_history().unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].movement.quantity, 5.0);
    }

    #[test]
    fn test_history_movement_update_keeps_balances() {
        let store = SqliteValuationStore::open_in_memory().unwrap();
        let period = Period::new(2023, 5).unwrap();
        store
            .replace_history(
                &[AccountId(371)].into_iter().collect(),
                &[NewHistoricalValuation {
                    key: key(None),
                    period,
                    movement: Movement {
                        quantity: 4.0,
                        ..Movement::default()
                    },
                    balance: RunningBalance {
                        quantity_initial: 1.0,
                        quantity_final: 5.0,
                        amount_initial: 0.0,
                        amount_final: 0.0,
                    },
                }],
            )
            .unwrap();

        let mut row = store.find_history(&key(None), period).unwrap().unwrap();
        row.movement.quantity = 40.0;
        row.balance.quantity_final = 999.0;
        store.update_history_movements(&[row]).unwrap();

        let stored = store.find_history(&key(None), period).unwrap().unwrap();
        assert_eq!(stored.movement.quantity, 40.0);
        assert_eq!(stored.balance.quantity_initial, 1.0);
        assert_eq!(stored.balance.quantity_final, 5.0);
    }

    #[test]
    fn test_default_area_created_once() {
        let store = SqliteValuationStore::open_in_memory().unwrap();
        assert!(store.default_area(CompanyId(1)).unwrap().is_none());

        let area = store.create_default_area(CompanyId(1), "Main").unwrap();
        assert_eq!(store.default_area(CompanyId(1)).unwrap(), Some(area));

        let again = store.create_default_area(CompanyId(1), "Main").unwrap();
        assert_eq!(again, area);
        assert!(store.default_area(CompanyId(2)).unwrap().is_none());
    }
}
