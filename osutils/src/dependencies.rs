use std::{
    borrow::Cow,
    ffi::{OsStr, OsString},
    io,
    os::unix::process::ExitStatusExt,
    path::PathBuf,
    process::{Command as StdCommand, Output},
};

use log::trace;
use strum_macros::IntoStaticStr;

use stratum_api::error::{
    ExecutionEnvironmentMisconfigurationError, ServicingError, StratumError, StratumResultExt,
};

#[derive(Debug, thiserror::Error)]
pub enum DependencyError {
    #[error("Failed to find dependency '{dependency}': {source}")]
    NotFound {
        dependency: Dependency,
        #[source]
        source: which::Error,
    },

    #[error("Failed to execute dependency '{dependency}': {inner}")]
    CouldNotExecute {
        dependency: Dependency,
        #[source]
        inner: io::Error,
    },

    #[error("Dependency '{dependency}' ({}) finished unsuccessfully: {explanation}\nCmdline: {rendered_command}\n{output}", path.display())]
    ExecutionFailed {
        dependency: Dependency,
        path: PathBuf,
        rendered_command: String,
        code: Option<i32>,
        signal: Option<i32>,
        stdout: String,
        stderr: String,
        explanation: String,
        output: String,
    },
}

impl From<DependencyError> for StratumError {
    #[track_caller]
    fn from(value: DependencyError) -> Self {
        match value {
            DependencyError::NotFound { dependency, source } => StratumError::with_source(
                ExecutionEnvironmentMisconfigurationError::MissingBinary {
                    binary: dependency.name(),
                },
                source.into(),
            ),
            DependencyError::CouldNotExecute { dependency, inner } => StratumError::with_source(
                ServicingError::CommandCouldNotExecute {
                    binary: dependency.name(),
                },
                inner.into(),
            ),
            DependencyError::ExecutionFailed {
                dependency,
                ref explanation,
                ..
            } => {
                let kind = ServicingError::CommandFailed {
                    binary: dependency.name(),
                    explanation: explanation.clone(),
                };
                // Keep the rendered command and the captured output as the cause.
                StratumError::with_source(kind, value.into())
            }
        }
    }
}

pub trait DependencyResultExt<T> {
    /// Attach a context message to the error.
    fn message(self, context: impl Into<Cow<'static, str>>) -> Result<T, StratumError>;
}

impl<T> DependencyResultExt<T> for Result<T, Box<DependencyError>> {
    #[track_caller]
    fn message(self, context: impl Into<Cow<'static, str>>) -> Result<T, StratumError> {
        let result: Result<T, StratumError> = self.map_err(|e| (*e).into());
        result.message(context)
    }
}

/// Enum of runtime and test dependencies used in the code base.
#[derive(Debug, Clone, Copy, PartialEq, Eq, IntoStaticStr)]
#[strum(serialize_all = "lowercase")]
pub enum Dependency {
    Blkdiscard,
    Blkid,
    Hdparm,
    Kpartx,
    Lsblk,
    Mdadm,
    #[strum(serialize = "mkfs.btrfs")]
    MkfsBtrfs,
    #[strum(serialize = "mkfs.ext2")]
    MkfsExt2,
    #[strum(serialize = "mkfs.ext3")]
    MkfsExt3,
    #[strum(serialize = "mkfs.ext4")]
    MkfsExt4,
    #[strum(serialize = "mkfs.vfat")]
    MkfsVfat,
    #[strum(serialize = "mkfs.xfs")]
    MkfsXfs,
    Mkswap,
    Mvcli,
    Nvme,
    Sgdisk,
    // Test dependencies
    #[cfg(test)]
    DoesNotExist,
    #[cfg(test)]
    Echo,
    #[cfg(test)]
    False,
    #[cfg(test)]
    Sleep,
}

impl std::fmt::Display for Dependency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.into())
    }
}

impl Dependency {
    /// Gets the path for a dependency not in $PATH
    fn path_override(&self) -> Option<PathBuf> {
        Some(PathBuf::from(match self {
            Self::Mvcli => "/opt/marvell/mvcli",
            _ => return None,
        }))
        .filter(|path| path.exists())
    }

    /// Gets the name of the dependency
    ///
    /// For example, Dependency::Mdadm => "mdadm"
    pub fn name(&self) -> &'static str {
        self.into()
    }

    /// Checks if the dependency is present in the system
    pub fn exists(&self) -> bool {
        self.path().is_ok()
    }

    /// Gets the path of the dependency
    pub fn path(&self) -> Result<PathBuf, Box<DependencyError>> {
        which::which(match self.path_override() {
            Some(path) => path,
            None => self.name().into(),
        })
        .map_err(|source| {
            Box::new(DependencyError::NotFound {
                dependency: *self,
                source,
            })
        })
    }

    /// Converts the dependency to a new Command instance
    /// (Note this does not create a std::process::Command instance)
    pub fn cmd(&self) -> Command {
        Command {
            dependency: *self,
            args: vec![],
            envs: vec![],
        }
    }
}

#[derive(Debug, Clone)]
pub struct Command {
    dependency: Dependency,
    args: Vec<OsString>,
    envs: Vec<(OsString, OsString)>,
}

impl Command {
    pub fn arg<S: AsRef<OsStr>>(&mut self, arg: S) -> &mut Self {
        self.args.push(arg.as_ref().to_os_string());
        self
    }

    pub fn with_arg<S: AsRef<OsStr>>(mut self, arg: S) -> Self {
        self.arg(arg);
        self
    }

    pub fn args<I, S>(&mut self, args: I) -> &mut Command
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        for arg in args {
            self.arg(arg.as_ref());
        }
        self
    }

    pub fn env<K, V>(&mut self, key: K, val: V) -> &mut Command
    where
        K: AsRef<OsStr>,
        V: AsRef<OsStr>,
    {
        self.envs
            .push((key.as_ref().to_os_string(), val.as_ref().to_os_string()));
        self
    }

    pub fn dependency(&self) -> Dependency {
        self.dependency
    }

    pub fn run_and_check(&self) -> Result<(), Box<DependencyError>> {
        self.output()?.check()
    }

    pub fn output_and_check(&self) -> Result<String, Box<DependencyError>> {
        self.output()?.check_output()
    }

    pub fn raw_output_and_check(&self) -> Result<Output, Box<DependencyError>> {
        self.output()?.check_raw_output()
    }

    pub async fn run_and_check_async(&self) -> Result<(), Box<DependencyError>> {
        self.output_async().await?.check()
    }

    pub async fn output_and_check_async(&self) -> Result<String, Box<DependencyError>> {
        self.output_async().await?.check_output()
    }

    /// Renders the command line the way it is logged.
    pub fn render_command(&self) -> String {
        if self.args.is_empty() {
            self.dependency.to_string()
        } else {
            format!(
                "{} {}",
                self.dependency,
                self.args
                    .iter()
                    .map(|arg| arg.to_string_lossy())
                    .map(|arg| if arg.contains(' ') {
                        format!("'{arg}'")
                    } else {
                        arg.into()
                    })
                    .collect::<Vec<_>>()
                    .join(" "),
            )
        }
    }

    pub fn output(&self) -> Result<CommandOutput, Box<DependencyError>> {
        let path = self.dependency.path()?;
        let mut cmd = StdCommand::new(&path);
        cmd.args(&self.args);
        cmd.envs(self.envs.clone());
        let rendered_command = self.render_command();
        trace!("Executing '{rendered_command}'");
        let output = cmd
            .output()
            .map_err(|inner| DependencyError::CouldNotExecute {
                dependency: self.dependency,
                inner,
            })?;
        Ok(self.finish(path, rendered_command, output))
    }

    /// Like [`Command::output`], but does not block the executor. The child is
    /// killed if the returned future is dropped before it completes.
    pub async fn output_async(&self) -> Result<CommandOutput, Box<DependencyError>> {
        let path = self.dependency.path()?;
        let mut cmd = tokio::process::Command::new(&path);
        cmd.args(&self.args);
        cmd.envs(self.envs.clone());
        cmd.kill_on_drop(true);
        let rendered_command = self.render_command();
        trace!("Executing '{rendered_command}'");
        let output = cmd
            .output()
            .await
            .map_err(|inner| DependencyError::CouldNotExecute {
                dependency: self.dependency,
                inner,
            })?;
        Ok(self.finish(path, rendered_command, output))
    }

    fn finish(&self, path: PathBuf, rendered_command: String, output: Output) -> CommandOutput {
        let output = CommandOutput {
            rendered_command,
            dependency: self.dependency,
            path,
            inner: output,
        };
        trace!(
            "Executed '{}': {}. Report:\n{}",
            output.rendered_command,
            output.explain_exit(),
            output.output_report(),
        );
        output
    }
}

#[derive(Debug)]
pub struct CommandOutput {
    rendered_command: String,
    dependency: Dependency,
    path: PathBuf,
    inner: Output,
}

impl CommandOutput {
    /// Checks if the process exited successfully
    pub fn success(&self) -> bool {
        self.inner.status.success()
    }

    /// Gets the exit code of the process, if it exited normally
    pub fn code(&self) -> Option<i32> {
        self.inner.status.code()
    }

    /// Gets the signal that terminated the process, if it was terminated by a signal
    fn signal(&self) -> Option<i32> {
        self.inner.status.signal()
    }

    /// Gets stderr
    pub fn error_output(&self) -> String {
        String::from_utf8_lossy(&self.inner.stderr).into()
    }

    /// Gets stdout
    pub fn output(&self) -> String {
        String::from_utf8_lossy(&self.inner.stdout).into()
    }

    /// Gets all available output, useful for reporting or debugging
    pub fn output_report(&self) -> String {
        let stdout = self.output();
        let stderr = self.error_output();

        let mut res = String::with_capacity(stdout.len() + stderr.len() + 20);

        if !stdout.is_empty() {
            res += &format!("stdout:\n{stdout}\n");
        }

        if !stderr.is_empty() {
            if !res.is_empty() {
                res += "\n";
            }
            res += &format!("stderr:\n{stderr}\n");
        }

        res
    }

    /// Checks if the process exited successfully, otherwise produces an error
    pub fn check(&self) -> Result<(), Box<DependencyError>> {
        if self.success() {
            return Ok(());
        }

        Err(self.failure(self.explain_exit()))
    }

    /// Produces an execution error for this process, for commands that exit
    /// successfully but report a failure in their output
    pub fn failure(&self, explanation: impl Into<String>) -> Box<DependencyError> {
        Box::new(DependencyError::ExecutionFailed {
            dependency: self.dependency,
            path: self.path.clone(),
            rendered_command: self.rendered_command.clone(),
            code: self.code(),
            signal: self.signal(),
            stdout: self.output(),
            stderr: self.error_output(),
            explanation: explanation.into(),
            output: match self.output_report() {
                s if !s.is_empty() => s,
                _ => "(no output collected)".into(),
            },
        })
    }

    /// Checks if the process exited successfully and returns the output,
    /// otherwise produces an error with the output
    pub fn check_output(&self) -> Result<String, Box<DependencyError>> {
        self.check()?;
        Ok(self.output())
    }

    pub fn check_raw_output(self) -> Result<Output, Box<DependencyError>> {
        self.check()?;
        Ok(self.inner)
    }

    /// Produces a string explaining the exit status of the process
    fn explain_exit(&self) -> String {
        if let Some(code) = self.code() {
            format!("exited with status: {code}")
        } else if let Some(signal) = self.signal() {
            format!("terminated by signal: {signal}")
        } else {
            "exited with unknown status".into()
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use stratum_api::error::ErrorKind;

    use super::*;

    #[test]
    fn test_command() {
        let run_and_check_res = Dependency::Echo.cmd().arg("Hello, world").run_and_check();
        run_and_check_res.unwrap();
        let output_and_check_res = Dependency::Echo
            .cmd()
            .arg("Hello, world")
            .output_and_check();
        assert_eq!(output_and_check_res.unwrap(), "Hello, world\n");

        let raw_output_and_check_res = Dependency::Echo
            .cmd()
            .arg("Hello, world")
            .raw_output_and_check();
        assert_eq!(raw_output_and_check_res.unwrap().stdout, b"Hello, world\n");

        let render_command_res = Dependency::Echo.cmd().arg("Hello, world").render_command();
        assert_eq!(render_command_res, "echo 'Hello, world'");

        let output_res = Dependency::Echo.cmd().arg("Hello, world").output();
        assert_eq!(output_res.unwrap().output(), "Hello, world\n");
    }

    #[test]
    fn test_arg_and_args() {
        let arg = Dependency::Echo.cmd().arg("Hello, world").output();
        let args = Dependency::Echo.cmd().args(["Hello,", "world"]).output();

        let arg_output = arg.unwrap().output();
        let args_output = args.unwrap().output();
        assert_eq!(arg_output, args_output);
        assert_eq!(arg_output, "Hello, world\n");
    }

    #[test]
    fn test_nonexistent_dep() {
        let output = Dependency::DoesNotExist.cmd().output().unwrap_err();
        assert!(matches!(*output, DependencyError::NotFound { .. }));
        assert_eq!(
            output.to_string(),
            "Failed to find dependency 'doesnotexist': cannot find binary path"
        );

        let error: StratumError = (*output).into();
        assert_eq!(
            error.kind(),
            &ErrorKind::ExecutionEnvironmentMisconfiguration(
                ExecutionEnvironmentMisconfigurationError::MissingBinary {
                    binary: "doesnotexist"
                }
            )
        );
    }

    #[test]
    fn test_commandoutput() {
        // This command should succeed
        let output = Dependency::Echo.cmd().arg("Hello, world").output().unwrap();
        assert!(output.success());
        assert_eq!(output.code(), Some(0));
        assert_eq!(output.signal(), None);
        assert_eq!(output.error_output(), "");
        assert_eq!(output.output(), "Hello, world\n");
        assert_eq!(output.output_report(), "stdout:\nHello, world\n\n");
        assert!(matches!(output.check(), Ok(())));
        assert!(matches!(output.check_output(), Ok(s) if s == "Hello, world\n"));
        assert_eq!(output.explain_exit(), "exited with status: 0");

        // This command should fail
        let output = Dependency::False.cmd().output().unwrap();
        assert!(!output.success());
        assert_eq!(output.code(), Some(1));
        assert_eq!(output.signal(), None);
        assert_eq!(output.error_output(), "");
        assert_eq!(output.output(), "");
        assert_eq!(output.output_report(), "");
        assert!(matches!(
            *output.check().unwrap_err(),
            DependencyError::ExecutionFailed { .. }
        ));
        assert!(matches!(
            *output.check_output().unwrap_err(),
            DependencyError::ExecutionFailed { .. }
        ));
        assert_eq!(output.explain_exit(), "exited with status: 1");
    }

    #[test]
    fn test_failed_command_keeps_output() {
        let error = Dependency::False
            .cmd()
            .arg("--flag")
            .run_and_check()
            .message("Failed to run false")
            .unwrap_err();
        assert_eq!(
            error.kind(),
            &ErrorKind::Servicing(ServicingError::CommandFailed {
                binary: "false",
                explanation: "exited with status: 1".into(),
            })
        );
        let debug = format!("{error:?}");
        assert!(debug.contains("Cmdline: false --flag"), "{debug}");
        assert!(debug.contains("(no output collected)"), "{debug}");
    }

    #[tokio::test]
    async fn test_output_async() {
        let output = Dependency::Echo
            .cmd()
            .arg("Hello, world")
            .output_and_check_async()
            .await
            .unwrap();
        assert_eq!(output, "Hello, world\n");

        assert!(matches!(
            *Dependency::False.cmd().run_and_check_async().await.unwrap_err(),
            DependencyError::ExecutionFailed { .. }
        ));
    }

    #[tokio::test]
    async fn test_output_async_is_cancellable() {
        let started = std::time::Instant::now();
        let mut sleep = Dependency::Sleep.cmd();
        sleep.arg("30");
        let res = tokio::time::timeout(Duration::from_millis(200), sleep.output_async()).await;
        assert!(res.is_err());
        assert!(started.elapsed() < Duration::from_secs(10));
    }
}
