pub mod models;
pub mod values;

use async_trait::async_trait;
use futures::future::BoxFuture;
use futures::TryStreamExt;
use sqlx::mysql::{MySqlConnectOptions, MySqlConnection};
use sqlx::{Column, ConnectOptions, Connection as _, Either, Executor, Row};

use crate::db::models::{ColumnInfo, QueryResult, SchemaSnapshot};
use crate::error::AppError;
use crate::settings::ConnectionProfile;

const ROW_RETURNING_KEYWORDS: &[&str] = &[
    "SELECT", "SHOW", "DESCRIBE", "DESC", "EXPLAIN", "WITH", "VALUES", "TABLE",
];

/// One open MySQL session. Acquired per user action and closed afterwards;
/// nothing holds it across requests.
pub struct Connection {
    inner: Option<MySqlConnection>,
}

impl Connection {
    pub async fn connect(profile: &ConnectionProfile) -> Result<Self, AppError> {
        validate_profile(profile)?;

        let options = MySqlConnectOptions::new()
            .host(&profile.host)
            .port(profile.port)
            .username(&profile.user)
            .password(&profile.password)
            .database(&profile.database);

        tracing::info!(
            "Connecting to mysql://{}@{}:{}/{}",
            profile.user,
            profile.host,
            profile.port,
            profile.database
        );

        let conn = options
            .connect()
            .await
            .map_err(|e| AppError::Connection(e.to_string()))?;

        Ok(Self { inner: Some(conn) })
    }

    fn handle(&mut self) -> Result<&mut MySqlConnection, AppError> {
        self.inner
            .as_mut()
            .ok_or_else(|| AppError::Connection("No active database connection.".to_string()))
    }

    /// Runs one SQL statement verbatim. Row-returning statements yield their
    /// full result set; anything else reports how many rows it touched.
    pub async fn execute(&mut self, sql: &str) -> Result<QueryResult, AppError> {
        let conn = self.handle()?;
        let mut collector = ResultCollector::default();

        {
            let mut stream = (&mut *conn).fetch_many(sqlx::raw_sql(sql));
            while let Some(item) = stream
                .try_next()
                .await
                .map_err(|e| AppError::Query(e.to_string()))?
            {
                match item {
                    Either::Left(done) => collector.push_done(done.rows_affected())?,
                    Either::Right(row) => {
                        let cells = (0..row.len())
                            .map(|i| values::column_value(&row, i))
                            .collect();
                        collector.push_row(|| values::column_names(&row), cells)?;
                    }
                }
            }
        }

        if collector.needs_describe(sql) {
            // Empty result set: the column list has to come from the statement itself.
            let columns: Vec<String> = match (&mut *conn).describe(sql).await {
                Ok(describe) => describe
                    .columns()
                    .iter()
                    .map(|c| c.name().to_string())
                    .collect(),
                Err(e) => {
                    tracing::debug!("Could not describe empty result: {}", e);
                    Vec::new()
                }
            };
            if !columns.is_empty() {
                return QueryResult::rows(columns, Vec::new());
            }
        }

        let result = collector.finish()?;
        if let QueryResult::Rows { .. } = result {
            tracing::debug!("Query returned {} rows", result.row_count());
        }
        Ok(result)
    }

    pub async fn ping(&mut self) -> Result<(), AppError> {
        let conn = self.handle()?;
        sqlx::query("SELECT 1")
            .execute(&mut *conn)
            .await
            .map_err(|e| AppError::Connection(e.to_string()))?;
        Ok(())
    }

    /// Releases the session. Calling it twice, or on a session the server
    /// already dropped, is harmless.
    pub async fn close(&mut self) {
        if let Some(conn) = self.inner.take() {
            match conn.close().await {
                Ok(()) => tracing::info!("MySQL connection closed"),
                Err(e) => tracing::warn!("Error while closing connection: {}", e),
            }
        }
    }
}

const MULTIPLE_STATEMENTS: &str = "Only one SQL statement can be run at a time.";

/// Accumulates the stream of one statement: rows first, then its completion.
/// A second completion or rows after the first one mean the text held more
/// than one statement.
#[derive(Default)]
struct ResultCollector {
    columns: Vec<String>,
    rows: Vec<Vec<serde_json::Value>>,
    rows_affected: u64,
    completed: bool,
}

impl ResultCollector {
    fn push_row(
        &mut self,
        names: impl FnOnce() -> Vec<String>,
        cells: Vec<serde_json::Value>,
    ) -> Result<(), AppError> {
        if self.completed {
            return Err(AppError::Query(MULTIPLE_STATEMENTS.to_string()));
        }
        if self.rows.is_empty() {
            self.columns = names();
        }
        self.rows.push(cells);
        Ok(())
    }

    fn push_done(&mut self, rows_affected: u64) -> Result<(), AppError> {
        if self.completed {
            return Err(AppError::Query(MULTIPLE_STATEMENTS.to_string()));
        }
        self.completed = true;
        self.rows_affected = rows_affected;
        Ok(())
    }

    /// An empty result from a row-returning keyword that changed nothing is
    /// worth a describe round trip to recover its columns.
    fn needs_describe(&self, sql: &str) -> bool {
        self.rows.is_empty() && self.rows_affected == 0 && returns_rows(sql)
    }

    fn finish(self) -> Result<QueryResult, AppError> {
        if self.rows.is_empty() {
            Ok(QueryResult::Affected {
                rows_affected: self.rows_affected,
            })
        } else {
            QueryResult::rows(self.columns, self.rows)
        }
    }
}

/// Opens a connection, hands it to `action`, and always closes it before
/// returning the action's result.
pub async fn with_connection<T, F>(profile: &ConnectionProfile, action: F) -> Result<T, AppError>
where
    F: for<'c> FnOnce(&'c mut Connection) -> BoxFuture<'c, Result<T, AppError>>,
{
    let mut conn = Connection::connect(profile).await?;
    let result = action(&mut conn).await;
    conn.close().await;
    result
}

pub async fn test_connection(profile: &ConnectionProfile) -> Result<(), AppError> {
    with_connection(profile, |conn| Box::pin(conn.ping())).await
}

pub fn validate_profile(profile: &ConnectionProfile) -> Result<(), AppError> {
    let missing = if profile.host.trim().is_empty() {
        Some("host")
    } else if profile.user.trim().is_empty() {
        Some("user")
    } else if profile.database.trim().is_empty() {
        Some("database")
    } else if profile.port == 0 {
        Some("port")
    } else {
        None
    };

    match missing {
        Some(field) => Err(AppError::Connection(format!(
            "Database {} is not configured. Open Settings first.",
            field
        ))),
        None => Ok(()),
    }
}

/// True when the leading keyword of the statement produces a result set.
pub fn returns_rows(sql: &str) -> bool {
    let keyword = leading_keyword(sql).to_ascii_uppercase();
    ROW_RETURNING_KEYWORDS.contains(&keyword.as_str())
}

fn leading_keyword(sql: &str) -> &str {
    let mut rest = sql;
    loop {
        rest = rest.trim_start_matches(|c: char| c.is_whitespace() || c == '(');
        if let Some(after) = rest.strip_prefix("--").or_else(|| rest.strip_prefix('#')) {
            rest = after.split_once('\n').map(|(_, tail)| tail).unwrap_or("");
        } else if let Some(after) = rest.strip_prefix("/*") {
            rest = after.split_once("*/").map(|(_, tail)| tail).unwrap_or("");
        } else {
            break;
        }
    }
    let end = rest
        .find(|c: char| !c.is_ascii_alphabetic())
        .unwrap_or(rest.len());
    &rest[..end]
}

/// Catalog lookups needed to build a schema snapshot.
#[async_trait]
pub trait Catalog: Send {
    async fn current_database(&mut self) -> Result<Option<String>, AppError>;
    async fn list_tables(&mut self, database: &str) -> Result<Vec<String>, AppError>;
    async fn list_columns(&mut self, database: &str, table: &str)
        -> Result<Vec<ColumnInfo>, AppError>;
}

#[derive(sqlx::FromRow)]
struct ColumnRow {
    column_name: String,
    column_type: String,
    is_nullable: String,
    column_default: Option<String>,
    column_key: String,
}

impl From<ColumnRow> for ColumnInfo {
    fn from(row: ColumnRow) -> Self {
        ColumnInfo {
            name: row.column_name,
            data_type: row.column_type,
            nullable: row.is_nullable.eq_ignore_ascii_case("YES"),
            default: row.column_default,
            primary_key: row.column_key == "PRI",
        }
    }
}

#[async_trait]
impl Catalog for Connection {
    async fn current_database(&mut self) -> Result<Option<String>, AppError> {
        let conn = self.handle()?;
        sqlx::query_scalar::<_, Option<String>>("SELECT CAST(DATABASE() AS CHAR)")
            .fetch_one(&mut *conn)
            .await
            .map_err(|e| AppError::Query(e.to_string()))
    }

    async fn list_tables(&mut self, database: &str) -> Result<Vec<String>, AppError> {
        let conn = self.handle()?;
        sqlx::query_scalar::<_, String>(
            r#"
            SELECT CAST(table_name AS CHAR) AS table_name
            FROM information_schema.tables
            WHERE table_schema = ?
            ORDER BY table_name
            "#,
        )
        .bind(database)
        .fetch_all(&mut *conn)
        .await
        .map_err(|e| AppError::Query(e.to_string()))
    }

    async fn list_columns(
        &mut self,
        database: &str,
        table: &str,
    ) -> Result<Vec<ColumnInfo>, AppError> {
        let conn = self.handle()?;
        let rows = sqlx::query_as::<_, ColumnRow>(
            r#"
            SELECT CAST(column_name AS CHAR) AS column_name,
                   CAST(column_type AS CHAR) AS column_type,
                   CAST(is_nullable AS CHAR) AS is_nullable,
                   CAST(column_default AS CHAR) AS column_default,
                   CAST(column_key AS CHAR) AS column_key
            FROM information_schema.columns
            WHERE table_schema = ? AND table_name = ?
            ORDER BY ordinal_position
            "#,
        )
        .bind(database)
        .bind(table)
        .fetch_all(&mut *conn)
        .await
        .map_err(|e| AppError::Query(e.to_string()))?;

        Ok(rows.into_iter().map(ColumnInfo::from).collect())
    }
}

/// One query for the database name, one for the table list, then one per table.
pub async fn fetch_schema<C>(catalog: &mut C) -> Result<SchemaSnapshot, AppError>
where
    C: Catalog + ?Sized,
{
    let database = catalog
        .current_database()
        .await?
        .filter(|name| !name.is_empty())
        .ok_or_else(|| AppError::Query("No database selected.".to_string()))?;

    let tables = catalog.list_tables(&database).await?;
    let mut snapshot = SchemaSnapshot::default();
    for table in tables {
        let columns = catalog.list_columns(&database, &table).await?;
        snapshot.tables.insert(table, columns);
    }

    tracing::info!(
        "Fetched structure of `{}`: {} tables",
        database,
        snapshot.table_count()
    );
    Ok(snapshot)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::HashMap;

    struct FakeCatalog {
        database: Option<String>,
        tables: Vec<(String, Vec<ColumnInfo>)>,
        database_queries: usize,
        table_queries: usize,
        column_queries: usize,
    }

    impl FakeCatalog {
        fn new(database: Option<&str>, tables: Vec<(&str, Vec<ColumnInfo>)>) -> Self {
            Self {
                database: database.map(str::to_string),
                tables: tables
                    .into_iter()
                    .map(|(name, columns)| (name.to_string(), columns))
                    .collect(),
                database_queries: 0,
                table_queries: 0,
                column_queries: 0,
            }
        }
    }

    #[async_trait]
    impl Catalog for FakeCatalog {
        async fn current_database(&mut self) -> Result<Option<String>, AppError> {
            self.database_queries += 1;
            Ok(self.database.clone())
        }

        async fn list_tables(&mut self, database: &str) -> Result<Vec<String>, AppError> {
            assert_eq!(Some(database), self.database.as_deref());
            self.table_queries += 1;
            Ok(self.tables.iter().map(|(name, _)| name.clone()).collect())
        }

        async fn list_columns(
            &mut self,
            _database: &str,
            table: &str,
        ) -> Result<Vec<ColumnInfo>, AppError> {
            self.column_queries += 1;
            let by_name: HashMap<_, _> = self.tables.iter().cloned().collect();
            by_name
                .get(table)
                .cloned()
                .ok_or_else(|| AppError::Query(format!("Unknown table {}", table)))
        }
    }

    fn column(name: &str, data_type: &str, primary_key: bool) -> ColumnInfo {
        ColumnInfo {
            name: name.to_string(),
            data_type: data_type.to_string(),
            nullable: !primary_key,
            default: None,
            primary_key,
        }
    }

    #[tokio::test]
    async fn test_fetch_schema_shop() {
        let mut catalog = FakeCatalog::new(
            Some("shop"),
            vec![
                ("customers", vec![column("id", "int", true), column("name", "varchar(255)", false)]),
                ("orders", vec![column("id", "int", true), column("customer_id", "int", false)]),
            ],
        );

        let snapshot = fetch_schema(&mut catalog).await.unwrap();

        assert_eq!(snapshot.table_count(), 2);
        let names: Vec<_> = snapshot
            .columns("customers")
            .unwrap()
            .iter()
            .map(|c| c.name.as_str())
            .collect();
        assert_eq!(names, vec!["id", "name"]);
        let names: Vec<_> = snapshot
            .columns("orders")
            .unwrap()
            .iter()
            .map(|c| c.name.as_str())
            .collect();
        assert_eq!(names, vec!["id", "customer_id"]);
    }

    #[tokio::test]
    async fn test_fetch_schema_query_count() {
        let tables = (0..5)
            .map(|i| (format!("t{}", i), vec![column("id", "int", true)]))
            .collect::<Vec<_>>();
        let mut catalog = FakeCatalog {
            database: Some("bench".to_string()),
            tables,
            database_queries: 0,
            table_queries: 0,
            column_queries: 0,
        };

        let snapshot = fetch_schema(&mut catalog).await.unwrap();

        assert_eq!(catalog.database_queries, 1);
        assert_eq!(catalog.table_queries, 1);
        assert_eq!(catalog.column_queries, 5);
        assert_eq!(snapshot.table_count(), 5);
    }

    #[tokio::test]
    async fn test_fetch_schema_empty_database() {
        let mut catalog = FakeCatalog::new(Some("empty"), Vec::new());
        let snapshot = fetch_schema(&mut catalog).await.unwrap();
        assert_eq!(snapshot.table_count(), 0);
        assert_eq!(catalog.column_queries, 0);
    }

    #[tokio::test]
    async fn test_fetch_schema_without_database() {
        let mut catalog = FakeCatalog::new(None, Vec::new());
        let err = fetch_schema(&mut catalog).await.unwrap_err();
        assert!(matches!(err, AppError::Query(_)));
        assert_eq!(catalog.table_queries, 0);
    }

    #[test]
    fn test_returns_rows() {
        assert!(returns_rows("SELECT * FROM customers"));
        assert!(returns_rows("  select 1;"));
        assert!(returns_rows("(SELECT 1) UNION (SELECT 2)"));
        assert!(returns_rows("-- latest orders\nSELECT * FROM orders"));
        assert!(returns_rows("/* hint */ show tables"));
        assert!(returns_rows("WITH t AS (SELECT 1) SELECT * FROM t"));
        assert!(returns_rows("desc customers"));
        assert!(!returns_rows("INSERT INTO customers (name) VALUES ('Ann')"));
        assert!(!returns_rows("update orders set customer_id = 1"));
        assert!(!returns_rows("DELETE FROM orders"));
        assert!(!returns_rows(""));
    }

    fn names(list: &[&str]) -> impl FnOnce() -> Vec<String> {
        let list: Vec<String> = list.iter().map(|s| s.to_string()).collect();
        move || list
    }

    #[test]
    fn test_collector_single_result_set() {
        let mut collector = ResultCollector::default();
        collector.push_row(names(&["id", "name"]), vec![json!(1), json!("Ann")]).unwrap();
        collector.push_row(names(&["id", "name"]), vec![json!(2), json!("Bob")]).unwrap();
        collector.push_done(0).unwrap();

        assert!(!collector.needs_describe("SELECT id, name FROM customers"));
        match collector.finish().unwrap() {
            QueryResult::Rows { columns, rows } => {
                assert_eq!(columns, vec!["id", "name"]);
                assert_eq!(rows.len(), 2);
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_collector_rejects_second_result_set() {
        // SELECT 1 AS a; SELECT 2 AS b, 3 AS c
        let mut collector = ResultCollector::default();
        collector.push_row(names(&["a"]), vec![json!(1)]).unwrap();
        collector.push_done(0).unwrap();
        let err = collector
            .push_row(names(&["b", "c"]), vec![json!(2), json!(3)])
            .unwrap_err();
        assert!(matches!(err, AppError::Query(ref msg) if msg.contains("one SQL statement")));

        // UPDATE ...; UPDATE ...
        let mut collector = ResultCollector::default();
        collector.push_done(2).unwrap();
        assert!(matches!(collector.push_done(1), Err(AppError::Query(_))));
    }

    #[test]
    fn test_collector_affected_rows() {
        let mut collector = ResultCollector::default();
        collector.push_done(3).unwrap();
        assert!(!collector.needs_describe("DELETE FROM orders"));
        assert_eq!(
            collector.finish().unwrap(),
            QueryResult::Affected { rows_affected: 3 }
        );
    }

    #[test]
    fn test_collector_cte_mutation_skips_describe() {
        let sql = "WITH old AS (SELECT id FROM orders) DELETE FROM orders WHERE id IN (SELECT id FROM old)";

        let mut collector = ResultCollector::default();
        collector.push_done(4).unwrap();
        assert!(!collector.needs_describe(sql));
        assert_eq!(
            collector.finish().unwrap(),
            QueryResult::Affected { rows_affected: 4 }
        );

        // Zero matches still asks describe, which reports no columns, so the
        // result stays an affected count.
        let mut collector = ResultCollector::default();
        collector.push_done(0).unwrap();
        assert!(collector.needs_describe(sql));
        assert_eq!(
            collector.finish().unwrap(),
            QueryResult::Affected { rows_affected: 0 }
        );
    }

    #[test]
    fn test_validate_profile() {
        let mut profile = ConnectionProfile {
            host: "localhost".to_string(),
            port: 3306,
            user: "root".to_string(),
            password: String::new(),
            database: "shop".to_string(),
        };
        assert!(validate_profile(&profile).is_ok());

        profile.database.clear();
        let err = validate_profile(&profile).unwrap_err();
        assert!(matches!(err, AppError::Connection(ref msg) if msg.contains("database")));

        assert!(validate_profile(&ConnectionProfile::default()).is_err());
    }

    #[tokio::test]
    async fn test_connect_rejects_incomplete_profile() {
        let result = Connection::connect(&ConnectionProfile::default()).await;
        assert!(matches!(result, Err(AppError::Connection(_))));
    }

    #[tokio::test]
    async fn test_close_is_idempotent() {
        let mut conn = Connection { inner: None };
        conn.close().await;
        conn.close().await;
        assert!(matches!(conn.execute("SELECT 1").await, Err(AppError::Connection(_))));
    }

    fn live_profile() -> Option<ConnectionProfile> {
        let host = std::env::var("QUERYCRAFTER_TEST_MYSQL_HOST").ok()?;
        Some(ConnectionProfile {
            host,
            port: std::env::var("QUERYCRAFTER_TEST_MYSQL_PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(3306),
            user: std::env::var("QUERYCRAFTER_TEST_MYSQL_USER").unwrap_or_else(|_| "root".into()),
            password: std::env::var("QUERYCRAFTER_TEST_MYSQL_PASSWORD").unwrap_or_default(),
            database: std::env::var("QUERYCRAFTER_TEST_MYSQL_DATABASE")
                .unwrap_or_else(|_| "test".into()),
        })
    }

    #[tokio::test]
    async fn test_live_execute_and_schema() {
        let Some(profile) = live_profile() else {
            return;
        };

        with_connection(&profile, |conn| Box::pin(async move {
            conn.execute("DROP TABLE IF EXISTS qc_orders").await?;
            conn.execute("CREATE TABLE qc_orders (id INT PRIMARY KEY, customer_id INT)")
                .await?;

            let inserted = conn
                .execute("INSERT INTO qc_orders (id, customer_id) VALUES (1, 7), (2, 8)")
                .await?;
            assert_eq!(inserted, QueryResult::Affected { rows_affected: 2 });

            match conn.execute("SELECT id, customer_id FROM qc_orders ORDER BY id").await? {
                QueryResult::Rows { columns, rows } => {
                    assert_eq!(columns, vec!["id", "customer_id"]);
                    assert_eq!(rows.len(), 2);
                    assert!(rows.iter().all(|r| r.len() == columns.len()));
                    assert_eq!(rows[0][1], json!(7));
                }
                other => panic!("unexpected result: {:?}", other),
            }

            match conn.execute("SELECT id FROM qc_orders WHERE id < 0").await? {
                QueryResult::Rows { columns, rows } => {
                    assert_eq!(columns, vec!["id"]);
                    assert!(rows.is_empty());
                }
                other => panic!("unexpected result: {:?}", other),
            }

            let cells = conn
                .execute(
                    "SELECT CAST(5 AS UNSIGNED) AS u, CAST(1.5 AS DOUBLE) AS f, \
                     CAST(2.5 AS DECIMAL(5,2)) AS d, X'6869' AS b, NULL AS n",
                )
                .await?;
            match cells {
                QueryResult::Rows { rows, .. } => {
                    assert_eq!(
                        rows[0],
                        vec![json!(5), json!(1.5), json!("2.50"), json!("hi"), json!(null)]
                    );
                }
                other => panic!("unexpected result: {:?}", other),
            }

            let err = conn
                .execute("SELECT 1 AS a; SELECT 2 AS b, 3 AS c")
                .await
                .unwrap_err();
            assert!(matches!(err, AppError::Query(_)));

            let deleted = conn
                .execute("WITH gone AS (SELECT -1 AS id) DELETE FROM qc_orders WHERE id IN (SELECT id FROM gone)")
                .await?;
            assert_eq!(deleted, QueryResult::Affected { rows_affected: 0 });

            let snapshot = fetch_schema(&mut *conn).await?;
            let columns = snapshot.columns("qc_orders").unwrap();
            assert_eq!(columns[0].name, "id");
            assert!(columns[0].primary_key);

            conn.execute("DROP TABLE qc_orders").await?;
            Ok(())
        }))
        .await
        .unwrap();
    }
}
