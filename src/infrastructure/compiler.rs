//! 合约编译与编译产物加载
//!
//! 编译命令（例如 `npx hardhat compile`）在部署前执行；产物按 Hardhat 布局查找：
//! `<artifacts>/<Name>.json` 或 `<artifacts>/contracts/<Name>.sol/<Name>.json`。

use std::path::{Path, PathBuf};

use tokio::sync::Mutex;

use crate::domain::{CompiledArtifact, CustodyError, CustodyResult};

/// stderr 截断长度，避免把整段编译输出塞进错误信息
const MAX_DIAGNOSTIC_CHARS: usize = 2_000;

pub struct ArtifactCompiler {
    artifacts_dir: PathBuf,
    project_dir: PathBuf,
    compile_command: Option<String>,
    // 同一项目目录上的编译器不能并发运行
    compile_lock: Mutex<()>,
}

impl ArtifactCompiler {
    pub fn new(
        artifacts_dir: impl Into<PathBuf>,
        project_dir: impl Into<PathBuf>,
        compile_command: Option<String>,
    ) -> Self {
        Self {
            artifacts_dir: artifacts_dir.into(),
            project_dir: project_dir.into(),
            compile_command: compile_command.filter(|c| !c.trim().is_empty()),
            compile_lock: Mutex::new(()),
        }
    }

    pub fn artifacts_dir(&self) -> &Path {
        &self.artifacts_dir
    }

    /// 执行编译命令；未配置命令时直接使用已有产物
    pub async fn compile(&self) -> CustodyResult<()> {
        let Some(command) = self.compile_command.as_deref() else {
            return Ok(());
        };

        let _guard = self.compile_lock.lock().await;
        tracing::info!(command = command, dir = %self.project_dir.display(), "compiling contracts");

        let output = shell(command)
            .current_dir(&self.project_dir)
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| CustodyError::CompilationFailed(format!("failed to execute {}: {}", command, e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let diagnostic: String = stderr.trim().chars().take(MAX_DIAGNOSTIC_CHARS).collect();
            tracing::error!(status = %output.status, "contract compilation failed");
            return Err(CustodyError::CompilationFailed(format!(
                "{} exited with {}: {}",
                command, output.status, diagnostic
            )));
        }

        Ok(())
    }

    /// 加载指定合约的编译产物
    pub async fn load(&self, contract_name: &str) -> CustodyResult<CompiledArtifact> {
        for path in self.candidate_paths(contract_name) {
            let bytes = match tokio::fs::read(&path).await {
                Ok(bytes) => bytes,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
                Err(e) => return Err(CustodyError::storage(e)),
            };

            return serde_json::from_slice(&bytes).map_err(|e| {
                CustodyError::CompilationFailed(format!(
                    "malformed artifact {}: {}",
                    path.display(),
                    e
                ))
            });
        }

        Err(CustodyError::ArtifactNotFound(contract_name.to_string()))
    }

    fn candidate_paths(&self, contract_name: &str) -> [PathBuf; 2] {
        let file = format!("{}.json", contract_name);
        [
            self.artifacts_dir.join(&file),
            self.artifacts_dir
                .join("contracts")
                .join(format!("{}.sol", contract_name))
                .join(&file),
        ]
    }
}

#[cfg(unix)]
fn shell(command: &str) -> tokio::process::Command {
    let mut cmd = tokio::process::Command::new("sh");
    cmd.arg("-c").arg(command);
    cmd
}

#[cfg(windows)]
fn shell(command: &str) -> tokio::process::Command {
    let mut cmd = tokio::process::Command::new("cmd");
    cmd.arg("/C").arg(command);
    cmd
}
