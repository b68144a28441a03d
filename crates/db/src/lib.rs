pub mod event;
pub mod rsvp;
/// Database schema
pub mod schema;
pub mod user;

use diesel::connection::{Instrumentation, InstrumentationEvent, SimpleConnection};
use diesel::r2d2::{ConnectionManager, CustomizeConnection, Pool};
use diesel::{Connection, QueryResult, SqliteConnection};
use diesel_migrations::{
    embed_migrations, EmbeddedMigrations, MigrationHarness,
};

pub const MIGRATIONS: EmbeddedMigrations =
    embed_migrations!("../../migrations");

pub type DbPool = Pool<ConnectionManager<SqliteConnection>>;

#[derive(thiserror::Error, Debug)]
pub enum DbError {
    #[error("failed to build the connection pool: {0}")]
    Pool(#[from] diesel::r2d2::PoolError),
    #[error("failed to connect to the database: {0}")]
    Connection(#[from] diesel::ConnectionError),
    #[error("failed to configure the connection: {0}")]
    Configure(#[from] diesel::result::Error),
    #[error("failed to run migrations: {0}")]
    Migration(Box<dyn std::error::Error + Send + Sync>),
}

/// Settings for [`make_pool`].
#[derive(Debug, Clone)]
pub struct PoolConfig {
    pub url: String,
    pub pool_size: u32,
    /// Seconds to wait for a connection to become available.
    pub timeout: u64,
}

struct ConnectionTracer;

impl Instrumentation for ConnectionTracer {
    fn on_connection_event(&mut self, event: InstrumentationEvent<'_>) {
        match event {
            InstrumentationEvent::StartQuery { query, .. } => {
                tracing::trace!("Started running query {query:?}");
            }
            InstrumentationEvent::FinishQuery { query, error, .. } => {
                if let Some(error) = error {
                    tracing::warn!("Encountered an error when running query {query} (error: {error})");
                }
            }
            _ => (),
        }
    }
}

/// Applies the pragmas every connection needs. Write transactions rely on
/// `busy_timeout` to wait for (rather than fail on) another writer.
fn configure(conn: &mut SqliteConnection) -> QueryResult<()> {
    conn.set_instrumentation(ConnectionTracer);

    conn.batch_execute(
        "\
        PRAGMA journal_mode = WAL;\
        PRAGMA busy_timeout = 1000;\
        PRAGMA foreign_keys = ON;\
    ",
    )
}

#[derive(Debug)]
struct Customizer;

impl CustomizeConnection<SqliteConnection, diesel::r2d2::Error> for Customizer {
    fn on_acquire(
        &self,
        conn: &mut SqliteConnection,
    ) -> Result<(), diesel::r2d2::Error> {
        configure(conn).map_err(diesel::r2d2::Error::QueryError)
    }
}

#[tracing::instrument]
pub fn make_pool(config: &PoolConfig) -> Result<DbPool, DbError> {
    let manager = ConnectionManager::<SqliteConnection>::new(&config.url);
    let pool = Pool::builder()
        .connection_customizer(Box::new(Customizer))
        .max_size(config.pool_size)
        .connection_timeout(std::time::Duration::from_secs(config.timeout))
        .build(manager)?;

    Ok(pool)
}

/// Opens a single connection outside of any pool, configured the same way as
/// pooled connections.
pub fn establish(url: &str) -> Result<SqliteConnection, DbError> {
    let mut conn = SqliteConnection::establish(url)?;
    configure(&mut conn)?;
    Ok(conn)
}

#[tracing::instrument(skip(conn))]
pub fn run_migrations(conn: &mut SqliteConnection) -> Result<(), DbError> {
    let applied = conn
        .run_pending_migrations(MIGRATIONS)
        .map_err(DbError::Migration)?;
    tracing::info!("applied {} pending migration(s)", applied.len());
    Ok(())
}
