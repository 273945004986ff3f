//! Runs embedded `PostgreSQL` lifecycle steps for the integration test harness.
//!
//! ```text
//! pg_worker <setup|start|stop> <payload.json>
//! ```
//!
//! The payload is a serialized [`WorkerPayload`] carrying the cluster
//! settings and environment overrides. `PostgreSQL` refuses to run as root,
//! so a worker launched as root switches to `nobody` before touching the
//! cluster.

#[cfg(unix)]
use camino::{Utf8Path, Utf8PathBuf};
#[cfg(unix)]
use nix::unistd::{Uid, User, initgroups, setgid, setuid};
#[cfg(unix)]
use pg_embedded_setup_unpriv::ambient_dir_and_path;
#[cfg(unix)]
use pg_embedded_setup_unpriv::worker::{PlainSecret, WorkerPayload};
#[cfg(unix)]
use postgresql_embedded::{PostgreSQL, Status};
#[cfg(unix)]
use std::ffi::CString;
#[cfg(unix)]
use std::io::Read;
#[cfg(unix)]
use std::str::FromStr;
#[cfg(unix)]
use thiserror::Error;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[cfg(unix)]
const UNPRIVILEGED_USER: &str = "nobody";

#[cfg(unix)]
#[derive(Debug, Error)]
enum WorkerError {
    #[error("invalid arguments: {0}")]
    InvalidArgs(String),
    #[error("failed to read worker payload: {0}")]
    PayloadRead(#[source] BoxError),
    #[error("failed to parse worker payload: {0}")]
    PayloadParse(#[source] serde_json::Error),
    #[error("invalid cluster settings: {0}")]
    Settings(String),
    #[error("failed to build runtime: {0}")]
    Runtime(#[source] std::io::Error),
    #[error("failed to drop privileges: {0}")]
    PrivilegeDrop(String),
    #[error("postgres {operation} failed: {message}")]
    Postgres {
        operation: &'static str,
        message: String,
    },
}

#[cfg(unix)]
#[derive(Debug, Clone, Copy)]
enum Operation {
    Setup,
    Start,
    Stop,
}

#[cfg(unix)]
impl Operation {
    const fn as_str(self) -> &'static str {
        match self {
            Self::Setup => "setup",
            Self::Start => "start",
            Self::Stop => "stop",
        }
    }
}

#[cfg(unix)]
impl FromStr for Operation {
    type Err = WorkerError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "setup" => Ok(Self::Setup),
            "start" => Ok(Self::Start),
            "stop" => Ok(Self::Stop),
            other => Err(WorkerError::InvalidArgs(format!(
                "unknown operation '{other}'; expected setup, start, or stop"
            ))),
        }
    }
}

#[cfg(unix)]
fn main() -> Result<(), BoxError> {
    let (operation, payload_path) = parse_args(std::env::args_os().skip(1))?;
    let payload = load_payload(&payload_path)?;
    drop_privileges_if_root()?;
    let settings = payload
        .settings
        .into_settings()
        .map_err(|err| WorkerError::Settings(err.to_string()))?;
    apply_environment(&payload.environment);

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(WorkerError::Runtime)?;
    runtime.block_on(run_operation(operation, PostgreSQL::new(settings)))?;
    Ok(())
}

#[cfg(unix)]
fn parse_args(
    mut args: impl Iterator<Item = std::ffi::OsString>,
) -> Result<(Operation, Utf8PathBuf), WorkerError> {
    let mut next_utf8 = |name: &str| {
        args.next()
            .ok_or_else(|| WorkerError::InvalidArgs(format!("missing {name} argument")))?
            .into_string()
            .map_err(|_| WorkerError::InvalidArgs(format!("{name} is not valid UTF-8")))
    };
    let operation = next_utf8("operation")?.parse()?;
    let payload_path = Utf8PathBuf::from(next_utf8("payload path")?);
    if let Some(extra) = args.next() {
        return Err(WorkerError::InvalidArgs(format!(
            "unexpected extra argument: {}",
            extra.to_string_lossy()
        )));
    }
    Ok((operation, payload_path))
}

#[cfg(unix)]
fn load_payload(path: &Utf8Path) -> Result<WorkerPayload, WorkerError> {
    let read = || -> Result<Vec<u8>, BoxError> {
        let (dir, relative) = ambient_dir_and_path(path)?;
        let mut file = dir.open(relative.as_std_path())?;
        let mut bytes = Vec::new();
        file.read_to_end(&mut bytes)?;
        Ok(bytes)
    };
    let bytes = read().map_err(WorkerError::PayloadRead)?;
    serde_json::from_slice(&bytes).map_err(WorkerError::PayloadParse)
}

#[cfg(unix)]
fn drop_privileges_if_root() -> Result<(), WorkerError> {
    if !Uid::effective().is_root() {
        return Ok(());
    }
    let privilege_error = |err: nix::Error| WorkerError::PrivilegeDrop(err.to_string());
    let user = User::from_name(UNPRIVILEGED_USER)
        .map_err(privilege_error)?
        .ok_or_else(|| {
            WorkerError::PrivilegeDrop(format!("user '{UNPRIVILEGED_USER}' not found"))
        })?;
    let name = CString::new(user.name.clone())
        .map_err(|err| WorkerError::PrivilegeDrop(err.to_string()))?;
    initgroups(&name, user.gid).map_err(privilege_error)?;
    setgid(user.gid).map_err(privilege_error)?;
    setuid(user.uid).map_err(privilege_error)?;

    // SAFETY: no other threads exist yet; the runtime is built afterwards.
    unsafe {
        std::env::set_var("HOME", &user.dir);
        std::env::set_var("USER", &user.name);
        std::env::set_var("LOGNAME", &user.name);
    }
    Ok(())
}

#[cfg(unix)]
fn apply_environment(environment: &[(String, Option<PlainSecret>)]) {
    for (key, value) in environment {
        // SAFETY: no other threads exist yet; the runtime is built afterwards.
        unsafe {
            match value {
                Some(secret) => std::env::set_var(key, secret.expose()),
                None => std::env::remove_var(key),
            }
        }
    }
}

#[cfg(unix)]
async fn run_operation(operation: Operation, mut postgres: PostgreSQL) -> Result<(), WorkerError> {
    let failed = |err: postgresql_embedded::Error| WorkerError::Postgres {
        operation: operation.as_str(),
        message: err.to_string(),
    };
    match operation {
        Operation::Setup => postgres.setup().await.map_err(failed),
        Operation::Start => {
            if !matches!(postgres.status(), Status::Started) {
                postgres.start().await.map_err(failed)?;
            }
            // The server must outlive this process; dropping the handle stops it.
            std::mem::forget(postgres);
            Ok(())
        }
        Operation::Stop => postgres.stop().await.map_err(failed),
    }
}

#[cfg(not(unix))]
fn main() -> Result<(), BoxError> {
    Err("pg_worker is only supported on Unix platforms".into())
}
