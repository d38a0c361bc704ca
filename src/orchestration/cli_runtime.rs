//! Container runtime driving the podman or docker CLI
//!
//! Implements the ContainerRuntime trait by spawning the engine binary.
//! Only subcommands shared by both engines are used.

use crate::error::{MatrixError, MatrixResult};
use crate::orchestration::container::{ContainerConfig, ContainerExit, ImageBuild};
use crate::orchestration::runtime::{ContainerRuntime, OutputSink};
use async_trait::async_trait;
use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;
use tracing::{debug, info};

/// Supported container engines
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Engine {
    Podman,
    Docker,
}

impl Engine {
    /// Parse the `build.engine` config value
    pub fn parse(name: &str) -> MatrixResult<Self> {
        match name {
            "podman" => Ok(Self::Podman),
            "docker" => Ok(Self::Docker),
            other => Err(MatrixError::UnsupportedEngine(other.to_string())),
        }
    }

    /// Executable name
    pub fn binary(&self) -> &'static str {
        match self {
            Self::Podman => "podman",
            Self::Docker => "docker",
        }
    }
}

/// Container runtime using the engine CLI directly
pub struct CliRuntime {
    engine: Engine,
}

impl CliRuntime {
    pub fn new(engine: Engine) -> Self {
        Self { engine }
    }

    /// Check if the engine binary is installed
    async fn engine_installed(&self) -> bool {
        Command::new(self.engine.binary())
            .arg("--version")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await
            .map(|s| s.success())
            .unwrap_or(false)
    }

    /// Execute an engine command and return the output
    async fn exec(&self, args: &[&str]) -> MatrixResult<std::process::Output> {
        debug!("Executing: {} {:?}", self.engine.binary(), args);

        Command::new(self.engine.binary())
            .args(args)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| {
                MatrixError::command_failed(format!("{} {:?}", self.engine.binary(), args), e)
            })
    }

    /// Spawn an engine command with piped output for streaming
    fn spawn_piped(&self, args: &[String]) -> MatrixResult<tokio::process::Child> {
        debug!("Spawning: {} {:?}", self.engine.binary(), args);

        Command::new(self.engine.binary())
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                MatrixError::command_failed(format!("{} {:?}", self.engine.binary(), args), e)
            })
    }

    /// Arguments for a blocking, self-removing `run`
    fn run_args(config: &ContainerConfig, command: &[String]) -> Vec<String> {
        let mut args = vec![
            "run".to_string(),
            "--rm".to_string(),
            "--name".to_string(),
            config.name.clone(),
            "--platform".to_string(),
            config.platform.clone(),
            "-w".to_string(),
            config.workdir.clone(),
        ];

        for mount in &config.mounts {
            args.push("-v".to_string());
            args.push(mount.volume_arg());
        }

        for (k, v) in &config.env {
            args.push("-e".to_string());
            args.push(format!("{}={}", k, v));
        }

        args.push(config.image.clone());
        args.extend(command.iter().cloned());
        args
    }

    fn build_args(build: &ImageBuild) -> Vec<String> {
        vec![
            "build".to_string(),
            "--platform".to_string(),
            build.platform.clone(),
            "-f".to_string(),
            build.definition.display().to_string(),
            "-t".to_string(),
            build.tag.clone(),
            build.context.display().to_string(),
        ]
    }
}

#[async_trait]
impl ContainerRuntime for CliRuntime {
    async fn is_available(&self) -> MatrixResult<bool> {
        if !self.engine_installed().await {
            return Ok(false);
        }
        let output = self.exec(&["info"]).await?;
        Ok(output.status.success())
    }

    async fn ensure_ready(&self) -> MatrixResult<()> {
        if !self.engine_installed().await {
            return Err(MatrixError::EngineNotFound(self.engine.binary().to_string()));
        }

        let output = self.exec(&["info"]).await?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(MatrixError::command_exec(
                format!("{} info", self.engine.binary()),
                stderr,
            ));
        }

        Ok(())
    }

    async fn image_exists(&self, tag: &str) -> MatrixResult<bool> {
        let output = self.exec(&["image", "inspect", tag]).await?;
        Ok(output.status.success())
    }

    async fn build_image(&self, build: &ImageBuild, on_output: OutputSink<'_>) -> MatrixResult<()> {
        info!("Building image {} for {}", build.tag, build.platform);

        let mut child = self.spawn_piped(&Self::build_args(build))?;
        let all_output = super::stream_child_output(&mut child, on_output).await;

        let status = child
            .wait()
            .await
            .map_err(|e| MatrixError::command_failed(format!("{} build", self.engine.binary()), e))?;

        if !status.success() {
            return Err(MatrixError::ImageBuild {
                image: build.tag.clone(),
                reason: super::build_error_output(&all_output),
            });
        }

        Ok(())
    }

    async fn load_image(&self, archive: &Path) -> MatrixResult<()> {
        let archive_str = archive.display().to_string();
        let output = self.exec(&["load", "-i", &archive_str]).await?;

        if output.status.success() {
            Ok(())
        } else {
            let stderr = String::from_utf8_lossy(&output.stderr);
            Err(MatrixError::command_exec(
                format!("{} load", self.engine.binary()),
                stderr,
            ))
        }
    }

    async fn save_image(&self, tag: &str, archive: &Path) -> MatrixResult<()> {
        let archive_str = archive.display().to_string();
        let output = self.exec(&["save", "-o", &archive_str, tag]).await?;

        if output.status.success() {
            Ok(())
        } else {
            let stderr = String::from_utf8_lossy(&output.stderr);
            Err(MatrixError::command_exec(
                format!("{} save", self.engine.binary()),
                stderr,
            ))
        }
    }

    async fn run_to_completion(
        &self,
        config: &ContainerConfig,
        command: &[String],
        on_output: OutputSink<'_>,
    ) -> MatrixResult<ContainerExit> {
        let mut child = self.spawn_piped(&Self::run_args(config, command))?;
        let output = super::stream_child_output(&mut child, on_output).await;

        let status = child
            .wait()
            .await
            .map_err(|e| MatrixError::command_failed(format!("{} run", self.engine.binary()), e))?;

        let code = status.code().unwrap_or(-1);
        debug!("Container {} exited with {}", config.name, code);

        // 125 is the engine's own failure (bad image, bad mount), not the recipe's
        if code == 125 {
            return Err(MatrixError::ContainerStart(super::build_error_output(&output)));
        }

        Ok(ContainerExit { code, output })
    }

    async fn remove(&self, name: &str) -> MatrixResult<()> {
        debug!("Removing container: {}", name);

        let output = self.exec(&["rm", "-f", name]).await?;

        if output.status.success() {
            Ok(())
        } else {
            let stderr = String::from_utf8_lossy(&output.stderr);
            if stderr.to_lowercase().contains("no such container") {
                Ok(())
            } else {
                Err(MatrixError::command_exec(
                    format!("{} rm", self.engine.binary()),
                    stderr,
                ))
            }
        }
    }

    fn runtime_name(&self) -> &'static str {
        match self.engine {
            Engine::Podman => "Podman",
            Engine::Docker => "Docker",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orchestration::container::Mount;
    use std::collections::BTreeMap;
    use std::path::PathBuf;

    #[test]
    fn engine_parse() {
        assert_eq!(Engine::parse("podman").unwrap(), Engine::Podman);
        assert_eq!(Engine::parse("docker").unwrap(), Engine::Docker);
        assert!(matches!(
            Engine::parse("lxc"),
            Err(MatrixError::UnsupportedEngine(_))
        ));
    }

    #[test]
    fn runtime_name_follows_engine() {
        assert_eq!(CliRuntime::new(Engine::Podman).runtime_name(), "Podman");
        assert_eq!(CliRuntime::new(Engine::Docker).runtime_name(), "Docker");
    }

    #[test]
    fn run_args_layout() {
        let mut env = BTreeMap::new();
        env.insert("RELMATRIX_OUT".to_string(), "/out".to_string());

        let config = ContainerConfig {
            name: "relmatrix-1a2b3c4d-arm64-distroA".to_string(),
            image: "relmatrix/arm64-distroa:0123456789ab".to_string(),
            platform: "linux/arm64".to_string(),
            workdir: "/workspace".to_string(),
            mounts: vec![
                Mount::read_write("/src", "/workspace"),
                Mount::read_only("/src/ci/build.sh", "/recipe/build.sh"),
            ],
            env,
        };
        let command = vec!["/bin/sh".to_string(), "/recipe/build.sh".to_string()];

        let args = CliRuntime::run_args(&config, &command);

        assert_eq!(&args[..2], ["run", "--rm"]);
        assert!(args.windows(2).any(|w| w == ["--platform", "linux/arm64"]));
        assert!(args.windows(2).any(|w| w == ["-v", "/src/ci/build.sh:/recipe/build.sh:ro"]));
        assert!(args.windows(2).any(|w| w == ["-e", "RELMATRIX_OUT=/out"]));

        // Image comes right before the command
        let image_pos = args.iter().position(|a| a == &config.image).unwrap();
        assert_eq!(&args[image_pos + 1..], command.as_slice());
    }

    #[test]
    fn build_args_layout() {
        let build = ImageBuild {
            tag: "relmatrix/x86_64-distroa:0123456789ab".to_string(),
            definition: PathBuf::from("/src/ci/distroA.Dockerfile"),
            context: PathBuf::from("/src/ci"),
            platform: "linux/x86_64".to_string(),
        };

        let args = CliRuntime::build_args(&build);
        assert_eq!(args[0], "build");
        assert!(args.windows(2).any(|w| w == ["-f", "/src/ci/distroA.Dockerfile"]));
        assert_eq!(args.last().unwrap(), "/src/ci");
    }
}
