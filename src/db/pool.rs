//! Adapter between bb8 and the sqlx::Postgres driver.
use anyhow::{Context, Result};
use derive_builder::Builder;
use sqlx::ConnectOptions;
use sqlx::postgres::{PgConnectOptions, PgConnection};
use std::str::FromStr;
use url::Url;

use crate::config::{CONNECT_TIMEOUT, PING_TIMEOUT};

pub type Bb8Connection<'a> = bb8::PooledConnection<'a, ConnectionManager>;

/// Discrete credential fields for the target database
#[derive(Debug, Clone, Builder)]
pub struct ConnectionParams {
    #[builder(setter(into))]
    user: String,
    #[builder(setter(into))]
    password: String,
    #[builder(setter(into))]
    host: String,
    port: u16,
    #[builder(setter(into))]
    database: String,
}

impl ConnectionParams {
    /// `postgresql://<user>:<password>@<host>:<port>/<db>`
    ///
    /// Reserved characters in the user and password are percent-encoded.
    pub fn connection_string(&self) -> Result<String> {
        Ok(self.connection_url(Some(&self.password))?.to_string())
    }

    /// Connection string with the password masked, for logs
    pub fn redacted(&self) -> String {
        let mask = (!self.password.is_empty()).then_some("***");
        self.connection_url(mask)
            .map(|url| url.to_string())
            .unwrap_or_else(|_| format!("postgresql://{}@{}", self.user, self.host))
    }

    fn connection_url(&self, password: Option<&str>) -> Result<Url> {
        let mut url = Url::parse(&format!("postgresql://{}:{}", self.host, self.port))
            .with_context(|| format!("Invalid database host: {}", self.host))?;
        url.set_path(&format!("/{}", self.database));
        url.set_username(&self.user)
            .map_err(|_| anyhow::anyhow!("Cannot set user on {}", url))?;
        url.set_password(password.filter(|p| !p.is_empty()))
            .map_err(|_| anyhow::anyhow!("Cannot set password on {}", url))?;
        Ok(url)
    }
}

/// Inner pool variants
#[derive(Debug, Clone)]
enum PoolInner {
    Postgres(bb8::Pool<ConnectionManager>),
    #[cfg(test)]
    Sqlite(sqlx::SqlitePool),
}

/// Connection that can be either Postgres or SQLite
pub enum PoolConnection {
    Postgres(Bb8Connection<'static>),
    #[cfg(test)]
    Sqlite(sqlx::pool::PoolConnection<sqlx::Sqlite>),
}

/// Database handle capped at a single connection
///
/// Connections are acquired per operation and go back to the pool when the
/// returned guard drops.
#[derive(Debug, Clone)]
pub struct Pool {
    inner: PoolInner,
}

pub async fn pool(params: &ConnectionParams) -> Result<Pool> {
    let connection_string = params.connection_string()?;
    let connect_options = PgConnectOptions::from_str(&connection_string)
        .with_context(|| format!("Invalid connection string: {}", params.redacted()))?;

    let bb8_pool = bb8::Builder::new()
        .max_size(1)
        .connection_timeout(CONNECT_TIMEOUT)
        .build(ConnectionManager::new(connect_options))
        .await
        .context("Failed to create connection pool")?;

    Ok(Pool {
        inner: PoolInner::Postgres(bb8_pool),
    })
}

fn map_run_error(e: bb8::RunError<sqlx::Error>) -> sqlx::Error {
    match e {
        bb8::RunError::User(e) => e,
        bb8::RunError::TimedOut => sqlx::Error::PoolTimedOut,
    }
}

impl Pool {
    /// Create an in-memory SQLite pool for testing
    ///
    /// Every SQLite connection to `:memory:` opens a separate database, so the
    /// pool holds exactly one that never expires.
    #[cfg(test)]
    pub async fn sqlite_in_memory() -> Result<Self, sqlx::Error> {
        let sqlite_pool = sqlx::sqlite::SqlitePoolOptions::new()
            .min_connections(1)
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect("sqlite::memory:")
            .await?;

        Ok(Pool {
            inner: PoolInner::Sqlite(sqlite_pool),
        })
    }

    pub async fn acquire(&self) -> Result<PoolConnection, sqlx::Error> {
        match &self.inner {
            PoolInner::Postgres(pool) => {
                let conn = pool.get_owned().await.map_err(map_run_error)?;
                Ok(PoolConnection::Postgres(conn))
            }
            #[cfg(test)]
            PoolInner::Sqlite(pool) => {
                let conn = pool.acquire().await?;
                Ok(PoolConnection::Sqlite(conn))
            }
        }
    }

    /// Execute a query (for DDL like CREATE TABLE) - works for both Postgres and SQLite
    pub async fn execute_query(&self, sql: &str) -> Result<(), sqlx::Error> {
        match &self.inner {
            PoolInner::Postgres(pool) => {
                let mut conn = pool.get().await.map_err(map_run_error)?;
                sqlx::query(sql).execute(&mut *conn).await?;
                Ok(())
            }
            #[cfg(test)]
            PoolInner::Sqlite(pool) => {
                sqlx::query(sql).execute(pool).await?;
                Ok(())
            }
        }
    }

    #[cfg(test)]
    pub fn sqlite(&self) -> &sqlx::SqlitePool {
        match &self.inner {
            PoolInner::Sqlite(pool) => pool,
            PoolInner::Postgres(_) => panic!("Not a SQLite pool"),
        }
    }
}

pub struct ConnectionManager {
    connect_options: PgConnectOptions,
}

impl ConnectionManager {
    /// Create a new `ConnectionManager` with the specified connect options.
    pub fn new(connect_options: PgConnectOptions) -> Self {
        Self { connect_options }
    }
}

impl bb8::ManageConnection for ConnectionManager {
    type Connection = PgConnection;
    type Error = sqlx::Error;

    async fn connect(&self) -> Result<Self::Connection, Self::Error> {
        tokio::time::timeout(CONNECT_TIMEOUT, self.connect_options.connect())
            .await
            .map_err(|_| sqlx::Error::PoolTimedOut)?
    }

    async fn is_valid(&self, conn: &mut Self::Connection) -> Result<(), Self::Error> {
        tokio::time::timeout(PING_TIMEOUT, sqlx::Connection::ping(conn))
            .await
            // Convert tokio timeouts into sqlx pool timeouts
            .map_err(|_| sqlx::Error::PoolTimedOut)
            .and_then(|result| result)?;
        Ok(())
    }

    fn has_broken(&self, _conn: &mut Self::Connection) -> bool {
        // sqlx::PgConnection provides no non-async way to check for closed/broken connections.
        false
    }
}
