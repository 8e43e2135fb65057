use std::env::var;
use std::fmt::{self, Debug, Formatter};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

mod parse;
mod pgpass;
mod ssl_mode;

pub use ssl_mode::PgSslMode;

use crate::net::TlsUpgrade;

/// Options for connecting to a PostgreSQL server.
///
/// Construct from a connection string (URI or `key=value` form) via
/// [`parse`][str::parse], or build up with the fluent methods. Unset values
/// fall back to the libpq environment variables (`PGHOST`, `PGPORT`, …) and
/// the `.pgpass` password file.
#[derive(Clone)]
pub struct PgConnectOptions {
    pub(crate) host: String,
    pub(crate) port: u16,
    pub(crate) socket: Option<PathBuf>,
    pub(crate) username: String,
    pub(crate) password: Option<String>,
    pub(crate) database: Option<String>,
    pub(crate) ssl_mode: PgSslMode,
    pub(crate) ssl_root_cert: Option<PathBuf>,
    pub(crate) ssl_client_cert: Option<PathBuf>,
    pub(crate) ssl_client_key: Option<PathBuf>,
    pub(crate) passfile: Option<PathBuf>,
    pub(crate) application_name: Option<String>,
    pub(crate) server_settings: Vec<(String, String)>,
    pub(crate) connect_timeout: Option<Duration>,
    pub(crate) command_timeout: Option<Duration>,
    pub(crate) statement_cache_capacity: usize,
    pub(crate) max_cached_statement_lifetime: Option<Duration>,
    pub(crate) max_inactive_connection_lifetime: Option<Duration>,
    pub(crate) extra_float_digits: Option<String>,
    pub(crate) tls: Option<Arc<dyn TlsUpgrade>>,
}

impl Default for PgConnectOptions {
    fn default() -> Self {
        Self::new()
    }
}

impl PgConnectOptions {
    /// A default set of options populated from the environment.
    pub fn new() -> Self {
        let port = var("PGPORT")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(5432);

        let host = var("PGHOST").ok().unwrap_or_else(|| "localhost".to_owned());

        let username = var("PGUSER").ok().unwrap_or_else(whoami::username);

        let ssl_mode = var("PGSSLMODE")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or_default();

        let connect_timeout = var("PGCONNECT_TIMEOUT")
            .ok()
            .and_then(|v| v.parse().ok())
            .map(Duration::from_secs);

        PgConnectOptions {
            host,
            port,
            socket: None,
            username,
            password: var("PGPASSWORD").ok(),
            database: var("PGDATABASE").ok(),
            ssl_mode,
            ssl_root_cert: var("PGSSLROOTCERT").ok().map(PathBuf::from),
            ssl_client_cert: var("PGSSLCERT").ok().map(PathBuf::from),
            ssl_client_key: var("PGSSLKEY").ok().map(PathBuf::from),
            passfile: var("PGPASSFILE").ok().map(PathBuf::from),
            application_name: var("PGAPPNAME").ok(),
            server_settings: Vec::new(),
            connect_timeout,
            command_timeout: None,
            statement_cache_capacity: 100,
            max_cached_statement_lifetime: None,
            max_inactive_connection_lifetime: None,
            extra_float_digits: None,
            tls: None,
        }
    }

    /// The host name, or socket directory, to connect to.
    pub fn host(&self) -> &str {
        &self.host
    }

    /// The port to connect to.
    pub fn port(&self) -> u16 {
        self.port
    }

    /// The Unix-domain socket path, when one is selected.
    pub fn socket_path(&self) -> Option<&Path> {
        self.socket.as_deref()
    }

    pub fn get_username(&self) -> &str {
        &self.username
    }

    pub fn get_database(&self) -> Option<&str> {
        self.database.as_deref()
    }

    pub fn ssl_mode(&self) -> PgSslMode {
        self.ssl_mode
    }

    pub(crate) fn tls_upgrader(&self) -> Option<&Arc<dyn TlsUpgrade>> {
        self.tls.as_ref()
    }

    /// Set the host to connect to.
    ///
    /// A host beginning with `/` names the directory of a Unix-domain
    /// socket; `@` selects the abstract namespace.
    pub fn set_host(mut self, host: &str) -> Self {
        if host.starts_with('/') || host.starts_with('@') {
            self.socket = Some(PathBuf::from(host));
        } else {
            host.clone_into(&mut self.host);
        }
        self
    }

    pub fn set_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Switch to a Unix-domain socket at the given path.
    pub fn set_socket(mut self, path: impl AsRef<Path>) -> Self {
        self.socket = Some(path.as_ref().to_path_buf());
        self
    }

    pub fn username(mut self, username: &str) -> Self {
        username.clone_into(&mut self.username);
        self
    }

    pub fn password(mut self, password: &str) -> Self {
        self.password = Some(password.to_owned());
        self
    }

    pub fn database(mut self, database: &str) -> Self {
        self.database = Some(database.to_owned());
        self
    }

    pub fn set_ssl_mode(mut self, mode: PgSslMode) -> Self {
        self.ssl_mode = mode;
        self
    }

    pub fn ssl_root_cert(mut self, cert: impl AsRef<Path>) -> Self {
        self.ssl_root_cert = Some(cert.as_ref().to_path_buf());
        self
    }

    pub fn ssl_client_cert(mut self, cert: impl AsRef<Path>) -> Self {
        self.ssl_client_cert = Some(cert.as_ref().to_path_buf());
        self
    }

    pub fn ssl_client_key(mut self, key: impl AsRef<Path>) -> Self {
        self.ssl_client_key = Some(key.as_ref().to_path_buf());
        self
    }

    /// Install the TLS transform used when `sslmode` asks for encryption.
    pub fn tls_upgrade(mut self, tls: Arc<dyn TlsUpgrade>) -> Self {
        self.tls = Some(tls);
        self
    }

    /// `application_name` as reported in `pg_stat_activity`.
    pub fn application_name(mut self, name: &str) -> Self {
        self.application_name = Some(name.to_owned());
        self
    }

    /// Add an arbitrary run-time parameter sent in the startup packet.
    pub fn server_setting(mut self, name: &str, value: &str) -> Self {
        self.server_settings
            .push((name.to_owned(), value.to_owned()));
        self
    }

    /// Deadline for establishing a connection.
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = Some(timeout);
        self
    }

    /// Per-operation deadline; elapsing it cancels the server-side query.
    pub fn command_timeout(mut self, timeout: Duration) -> Self {
        self.command_timeout = Some(timeout);
        self
    }

    /// Maximum number of prepared statements kept per connection;
    /// zero disables caching entirely (only unnamed statements are used).
    pub fn statement_cache_capacity(mut self, capacity: usize) -> Self {
        self.statement_cache_capacity = capacity;
        self
    }

    /// Age after which a cached prepared statement is re-prepared;
    /// `None` (the default) never expires statements.
    pub fn max_cached_statement_lifetime(mut self, lifetime: Option<Duration>) -> Self {
        self.max_cached_statement_lifetime = lifetime;
        self
    }

    /// Pool hint: idle connections older than this are not reused.
    pub fn max_inactive_connection_lifetime(mut self, lifetime: Option<Duration>) -> Self {
        self.max_inactive_connection_lifetime = lifetime;
        self
    }

    pub(crate) fn apply_pgpass(mut self) -> Self {
        if self.password.is_none() {
            self.password = pgpass::load_password(
                self.passfile.as_deref(),
                &self.host,
                self.port,
                &self.username,
                self.database.as_deref(),
            );
        }

        self
    }
}

impl Debug for PgConnectOptions {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("PgConnectOptions")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("socket", &self.socket)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("database", &self.database)
            .field("ssl_mode", &self.ssl_mode)
            .field("application_name", &self.application_name)
            .field("statement_cache_capacity", &self.statement_cache_capacity)
            .finish_non_exhaustive()
    }
}
