// # systemd Service Supervisor
//
// Installs the daemon as a systemd unit so it starts at boot and is
// restarted after crashes.
//
// ## Artifacts
//
// - `<install_dir>/<binary>`: copy of the running executable, mode 0755
// - `<unit_dir>/<name>.service`: the unit file, mode 0600 because its
//   `Environment=` lines carry the DDNS credential
//
// The unit file is the idempotency flag: when it exists, the service counts
// as installed. It is written to a temporary file and renamed into place, so
// a crash mid-write never leaves a partial unit behind.
//
// ## Commands
//
// Registration runs `systemctl daemon-reload`, `enable <name>` and
// `start <name>` through a [`CommandRunner`], which tests replace with a
// recorder.

mod unit;

pub use unit::render_unit;

use async_trait::async_trait;
use reach_core::config::ServiceConfig;
use reach_core::installer::ServiceDescriptor;
use reach_core::traits::ServiceSupervisor;
use reach_core::{Error, Result};
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

/// Mode of the installed executable
const EXECUTABLE_MODE: u32 = 0o755;

/// Mode of the unit file
const UNIT_MODE: u32 = 0o600;

/// Runs an external program to completion
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Run `program` with `args`; non-zero exit is an error
    async fn run(&self, program: &str, args: &[&str]) -> Result<()>;
}

/// [`CommandRunner`] backed by `tokio::process`
#[derive(Debug, Default, Clone, Copy)]
pub struct TokioCommandRunner;

#[async_trait]
impl CommandRunner for TokioCommandRunner {
    async fn run(&self, program: &str, args: &[&str]) -> Result<()> {
        debug!("Running {} {}", program, args.join(" "));

        let output = tokio::process::Command::new(program)
            .args(args)
            .output()
            .await
            .map_err(|e| Error::installation(format!("cannot run {}: {}", program, e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(Error::installation(format!(
                "{} {} exited with {}: {}",
                program,
                args.join(" "),
                output.status,
                stderr.trim()
            )));
        }

        Ok(())
    }
}

/// systemd-backed [`ServiceSupervisor`]
pub struct SystemdSupervisor {
    /// Directory holding unit files
    unit_dir: PathBuf,

    /// Directory the executable is installed into
    install_dir: PathBuf,

    /// Runs `systemctl`
    runner: Box<dyn CommandRunner>,
}

impl std::fmt::Debug for SystemdSupervisor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SystemdSupervisor")
            .field("unit_dir", &self.unit_dir)
            .field("install_dir", &self.install_dir)
            .finish_non_exhaustive()
    }
}

impl SystemdSupervisor {
    /// Create a supervisor that runs the real `systemctl`
    pub fn new(unit_dir: impl Into<PathBuf>, install_dir: impl Into<PathBuf>) -> Self {
        Self::with_runner(unit_dir, install_dir, Box::new(TokioCommandRunner))
    }

    /// Create a supervisor with a custom command runner
    pub fn with_runner(
        unit_dir: impl Into<PathBuf>,
        install_dir: impl Into<PathBuf>,
        runner: Box<dyn CommandRunner>,
    ) -> Self {
        Self {
            unit_dir: unit_dir.into(),
            install_dir: install_dir.into(),
            runner,
        }
    }

    /// Create the supervisor described by the service configuration
    pub fn from_config(config: &ServiceConfig) -> Self {
        Self::new(&config.unit_dir, &config.install_dir)
    }

    /// Path of the unit file for `service_name`
    pub fn unit_path(&self, service_name: &str) -> PathBuf {
        self.unit_dir.join(format!("{}.service", service_name))
    }

    async fn systemctl(&self, args: &[&str]) -> Result<()> {
        self.runner.run("systemctl", args).await
    }
}

#[async_trait]
impl ServiceSupervisor for SystemdSupervisor {
    async fn is_installed(&self, service_name: &str) -> Result<bool> {
        Ok(fs::try_exists(self.unit_path(service_name)).await?)
    }

    async fn prepare_environment(&self, descriptor: &ServiceDescriptor) -> Result<PathBuf> {
        let source = &descriptor.executable;
        let file_name = source.file_name().ok_or_else(|| {
            Error::installation(format!("executable path has no file name: {}", source.display()))
        })?;
        let target = self.install_dir.join(file_name);

        if same_file(source, &target).await {
            debug!("Executable already at {}", target.display());
            return Ok(target);
        }

        fs::create_dir_all(&self.install_dir).await?;
        fs::copy(source, &target).await.map_err(|e| {
            Error::installation(format!(
                "Failed to copy {} to {}: {}",
                source.display(),
                target.display(),
                e
            ))
        })?;
        fs::set_permissions(&target, std::fs::Permissions::from_mode(EXECUTABLE_MODE)).await?;

        info!("Installed executable to {}", target.display());
        Ok(target)
    }

    async fn write_descriptor(&self, descriptor: &ServiceDescriptor) -> Result<PathBuf> {
        let path = self.unit_path(&descriptor.name);
        let temp_path = path.with_extension("service.tmp");
        let contents = render_unit(descriptor);

        fs::create_dir_all(&self.unit_dir).await?;

        {
            let mut file = fs::OpenOptions::new()
                .write(true)
                .create(true)
                .truncate(true)
                .mode(UNIT_MODE)
                .open(&temp_path)
                .await
                .map_err(|e| {
                    Error::installation(format!(
                        "Failed to create {}: {}",
                        temp_path.display(),
                        e
                    ))
                })?;

            file.write_all(contents.as_bytes()).await?;
            file.flush().await?;
        }

        // An existing file keeps its old mode across the open above
        fs::set_permissions(&temp_path, std::fs::Permissions::from_mode(UNIT_MODE)).await?;

        fs::rename(&temp_path, &path).await.map_err(|e| {
            Error::installation(format!(
                "Failed to rename {} to {}: {}",
                temp_path.display(),
                path.display(),
                e
            ))
        })?;

        Ok(path)
    }

    async fn register_and_start(&self, service_name: &str) -> Result<()> {
        self.systemctl(&["daemon-reload"]).await?;
        self.systemctl(&["enable", service_name]).await?;
        self.systemctl(&["start", service_name]).await?;
        info!("Service {} enabled and started", service_name);
        Ok(())
    }

    async fn remove_descriptor(&self, service_name: &str) -> Result<()> {
        let path = self.unit_path(service_name);
        match fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

async fn same_file(a: &Path, b: &Path) -> bool {
    match (fs::canonicalize(a).await, fs::canonicalize(b).await) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}
