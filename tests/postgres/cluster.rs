//! Embedded `PostgreSQL` cluster shared by every test in the binary.
//!
//! The cluster starts once, lazily. Each test gets its own database cloned
//! from a migrated template, dropped again when the test finishes.

use crate::test_helpers::EnvVarGuard;
use camino::{Utf8Path, Utf8PathBuf};
use cap_std::ambient_authority;
use cap_std::fs_utf8::Dir;
use diesel::prelude::*;
use pg_embedded_setup_unpriv::worker_process_test_api::{
    WorkerOperation, WorkerRequest, WorkerRequestArgs, run as run_worker,
};
use pg_embedded_setup_unpriv::{
    ExecutionPrivileges, TestBootstrapSettings, bootstrap_for_tests, detect_execution_privileges,
};
use postgresql_embedded::{PostgreSQL, Settings, Status};
use rstest::fixture;
use std::ffi::OsString;
use std::net::TcpListener;
use std::sync::{Mutex, OnceLock, PoisonError};
use std::time::Duration;
use tokio::runtime::Runtime;

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Shared cluster handle.
pub type PostgresCluster = &'static ManagedCluster;

static SHARED_CLUSTER: OnceLock<ManagedCluster> = OnceLock::new();
static TEMPLATE_LOCK: OnceLock<Mutex<()>> = OnceLock::new();

const WORKER_ENV: &str = "PG_EMBEDDED_WORKER";

fn boxed(err: impl std::error::Error + Send + Sync + 'static) -> BoxError {
    Box::new(err)
}

/// Builds a current-thread runtime for driving async store calls.
///
/// # Errors
///
/// Returns an error when the runtime cannot be built.
pub fn test_runtime() -> Result<Runtime, BoxError> {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(boxed)
}

/// Embedded cluster started in-process, or through `pg_worker` when the
/// tests run as root.
pub struct ManagedCluster {
    bootstrap: TestBootstrapSettings,
    env_vars: Vec<(String, Option<String>)>,
    runtime: Option<Runtime>,
    postgres: Option<PostgreSQL>,
}

impl ManagedCluster {
    fn new() -> Result<Self, BoxError> {
        let worker_guard = EnvVarGuard::set_many(&worker_env_changes()?);
        let mut bootstrap = bootstrap_for_tests().map_err(boxed)?;
        drop(worker_guard);
        sync_password_from_file(&mut bootstrap.settings)?;
        let env_vars = bootstrap.environment.to_env();
        let mut cluster = Self {
            bootstrap,
            env_vars,
            runtime: None,
            postgres: None,
        };
        match cluster.bootstrap.privileges {
            ExecutionPrivileges::Root => cluster.start_via_worker()?,
            ExecutionPrivileges::Unprivileged => cluster.start_in_process()?,
        }
        Ok(cluster)
    }

    /// Returns the connection URL for `database`.
    #[must_use]
    pub fn database_url(&self, database: &str) -> String {
        self.bootstrap.settings.url(database)
    }

    /// Creates `template` and runs `migrate` against it, unless it exists.
    ///
    /// # Errors
    ///
    /// Returns an error when the template cannot be created or migrated; a
    /// half-migrated template is dropped again.
    pub fn ensure_template<F>(&self, template: &str, migrate: F) -> Result<(), BoxError>
    where
        F: FnOnce(&str) -> Result<(), BoxError>,
    {
        let _serialized = TEMPLATE_LOCK
            .get_or_init(|| Mutex::new(()))
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if self.database_exists(template)? {
            return Ok(());
        }
        self.execute_admin_sql(&format!("CREATE DATABASE {}", quote_identifier(template)))?;
        if let Err(err) = migrate(&self.database_url(template)) {
            self.drop_database(template)?;
            return Err(err);
        }
        Ok(())
    }

    /// Clones `template` into a fresh database that is dropped with the guard.
    ///
    /// # Errors
    ///
    /// Returns an error when the database cannot be created.
    pub fn temporary_database(
        &'static self,
        name: &str,
        template: &str,
    ) -> Result<TemporaryDatabase, BoxError> {
        self.execute_admin_sql(&format!(
            "CREATE DATABASE {} TEMPLATE {}",
            quote_identifier(name),
            quote_identifier(template),
        ))?;
        Ok(TemporaryDatabase {
            cluster: self,
            name: name.to_owned(),
        })
    }

    fn start_in_process(&mut self) -> Result<(), BoxError> {
        let runtime = test_runtime()?;
        let env_guard = EnvVarGuard::set_many(&env_vars_to_os(&self.env_vars));
        let mut postgres = PostgreSQL::new(self.bootstrap.settings.clone());
        runtime.block_on(async {
            postgres.setup().await.map_err(boxed)?;
            if !matches!(postgres.status(), Status::Started) {
                postgres.start().await.map_err(boxed)?;
            }
            Ok::<(), BoxError>(())
        })?;
        drop(env_guard);
        self.bootstrap.settings = postgres.settings().clone();
        sync_port_from_pid(&mut self.bootstrap.settings)?;
        self.runtime = Some(runtime);
        self.postgres = Some(postgres);
        Ok(())
    }

    fn start_via_worker(&mut self) -> Result<(), BoxError> {
        self.run_worker_operation(WorkerOperation::Setup, self.bootstrap.setup_timeout)?;
        self.run_worker_operation(WorkerOperation::Start, self.bootstrap.start_timeout)?;
        sync_port_from_pid(&mut self.bootstrap.settings)
    }

    fn stop(&mut self) -> Result<(), BoxError> {
        match (self.postgres.take(), &self.runtime) {
            (Some(postgres), Some(runtime)) => {
                runtime.block_on(async { postgres.stop().await.map_err(boxed) })
            }
            (None, _) if matches!(self.bootstrap.privileges, ExecutionPrivileges::Root) => {
                self.run_worker_operation(WorkerOperation::Stop, self.bootstrap.shutdown_timeout)
            }
            _ => Ok(()),
        }
    }

    fn run_worker_operation(
        &self,
        operation: WorkerOperation,
        timeout: Duration,
    ) -> Result<(), BoxError> {
        let worker = self.bootstrap.worker_binary.as_ref().ok_or_else(|| {
            boxed(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                "PG_EMBEDDED_WORKER is not set for worker operation",
            ))
        })?;
        let args = WorkerRequestArgs {
            worker: worker.as_path(),
            settings: &self.bootstrap.settings,
            env_vars: &self.env_vars,
            operation,
            timeout,
        };
        run_worker(&WorkerRequest::new(args)).map_err(boxed)
    }

    fn drop_database(&self, name: &str) -> Result<(), BoxError> {
        self.execute_admin_sql(&format!(
            "DROP DATABASE IF EXISTS {} WITH (FORCE)",
            quote_identifier(name)
        ))
    }

    fn admin_connection(&self) -> Result<PgConnection, BoxError> {
        PgConnection::establish(&self.database_url("postgres")).map_err(boxed)
    }

    fn execute_admin_sql(&self, sql: &str) -> Result<(), BoxError> {
        let mut connection = self.admin_connection()?;
        diesel::sql_query(sql)
            .execute(&mut connection)
            .map_err(boxed)?;
        Ok(())
    }

    fn database_exists(&self, name: &str) -> Result<bool, BoxError> {
        #[derive(diesel::QueryableByName)]
        struct ExistsRow {
            #[diesel(sql_type = diesel::sql_types::Bool)]
            exists: bool,
        }

        let mut connection = self.admin_connection()?;
        let row = diesel::sql_query(
            "SELECT EXISTS (SELECT 1 FROM pg_database WHERE datname = $1) AS exists",
        )
        .bind::<diesel::sql_types::Text, _>(name)
        .get_result::<ExistsRow>(&mut connection)
        .map_err(boxed)?;
        Ok(row.exists)
    }
}

impl Drop for ManagedCluster {
    fn drop(&mut self) {
        drop(self.stop());
    }
}

/// Per-test database cloned from the template.
pub struct TemporaryDatabase {
    cluster: PostgresCluster,
    name: String,
}

impl TemporaryDatabase {
    /// Returns the connection URL for this database.
    #[must_use]
    pub fn url(&self) -> String {
        self.cluster.database_url(&self.name)
    }
}

impl Drop for TemporaryDatabase {
    fn drop(&mut self) {
        drop(self.cluster.drop_database(&self.name));
    }
}

/// Provides the shared cluster, starting it on first use.
#[fixture]
pub fn postgres_cluster() -> PostgresCluster {
    SHARED_CLUSTER.get_or_init(|| match ManagedCluster::new() {
        Ok(cluster) => cluster,
        Err(err) => panic!("SKIP-TEST-CLUSTER: failed to start PostgreSQL: {err}"),
    })
}

fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

fn env_vars_to_os(env_vars: &[(String, Option<String>)]) -> Vec<(OsString, Option<OsString>)> {
    env_vars
        .iter()
        .map(|(key, value)| (OsString::from(key), value.as_ref().map(OsString::from)))
        .collect()
}

/// Picks a free port and, when running as root, points the bootstrap at a
/// copy of `pg_worker` that the unprivileged user can execute.
fn worker_env_changes() -> Result<Vec<(OsString, Option<OsString>)>, BoxError> {
    let mut changes = Vec::new();
    if std::env::var_os("PG_PORT").is_none() {
        let listener = TcpListener::bind(("127.0.0.1", 0)).map_err(boxed)?;
        let port = listener.local_addr().map_err(boxed)?.port();
        changes.push((OsString::from("PG_PORT"), Some(OsString::from(port.to_string()))));
    }
    if matches!(detect_execution_privileges(), ExecutionPrivileges::Root)
        && std::env::var_os(WORKER_ENV).is_none()
    {
        let worker = prepare_worker(Utf8Path::new(env!("CARGO_BIN_EXE_pg_worker")))?;
        changes.push((OsString::from(WORKER_ENV), Some(OsString::from(worker.as_str()))));
    }
    Ok(changes)
}

/// Copies the worker out of the build tree, which `nobody` usually cannot
/// traverse, and marks it world-executable.
fn prepare_worker(source: &Utf8Path) -> Result<Utf8PathBuf, BoxError> {
    let temp_dir = Utf8PathBuf::try_from(std::env::temp_dir()).map_err(boxed)?;
    let file_name = format!("pg_worker_{}", std::process::id());
    let (source_dir, source_name) = open_parent_dir(source)?;
    let destination_dir = open_ambient_dir(&temp_dir)?;
    match destination_dir.remove_file(&file_name) {
        Ok(()) => {}
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
        Err(err) => return Err(boxed(err)),
    }
    source_dir
        .copy(source_name, &destination_dir, &file_name)
        .map_err(boxed)?;
    #[cfg(unix)]
    {
        use cap_std::fs::{Permissions, PermissionsExt};
        destination_dir
            .set_permissions(&file_name, Permissions::from_mode(0o755))
            .map_err(boxed)?;
    }
    Ok(temp_dir.join(file_name))
}

fn open_ambient_dir(path: &Utf8Path) -> Result<Dir, BoxError> {
    Dir::open_ambient_dir(path, ambient_authority()).map_err(boxed)
}

fn open_parent_dir(path: &Utf8Path) -> Result<(Dir, &str), BoxError> {
    let file_name = path
        .file_name()
        .ok_or_else(|| boxed(std::io::Error::other("path must include a file name")))?;
    let parent = path.parent().unwrap_or_else(|| Utf8Path::new("."));
    Ok((open_ambient_dir(parent)?, file_name))
}

fn sync_password_from_file(settings: &mut Settings) -> Result<(), BoxError> {
    let password_file = Utf8PathBuf::try_from(settings.password_file.clone()).map_err(boxed)?;
    let (dir, file_name) = open_parent_dir(&password_file)?;
    match dir.read_to_string(file_name) {
        Ok(contents) => {
            let password = contents.trim_end();
            if !password.is_empty() {
                password.clone_into(&mut settings.password);
            }
            Ok(())
        }
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(err) => Err(boxed(err)),
    }
}

/// The started server may have moved to another port; `postmaster.pid`
/// records the one actually bound on its fourth line.
fn sync_port_from_pid(settings: &mut Settings) -> Result<(), BoxError> {
    let data_dir = Utf8PathBuf::try_from(settings.data_dir.clone()).map_err(boxed)?;
    let contents = match open_ambient_dir(&data_dir)?.read_to_string("postmaster.pid") {
        Ok(contents) => contents,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(()),
        Err(err) => return Err(boxed(err)),
    };
    if let Some(port) = contents
        .lines()
        .nth(3)
        .and_then(|line| line.trim().parse::<u16>().ok())
    {
        settings.port = port;
    }
    Ok(())
}
