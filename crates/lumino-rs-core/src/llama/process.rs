//! Process management for the llama-server child.

use super::client::LlamaClient;
use crate::error::BackendError;
use log::{debug, info, warn};
use lumino_rs_config::ModelProfile;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::{Duration, Instant};
use tokio::process::{Child, Command};
use tokio::time::sleep;

const READY_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Locate the llama-server binary on PATH or at an explicit path.
pub(crate) fn locate_binary(binary: &str) -> Result<PathBuf, BackendError> {
    which::which(binary).map_err(|err| BackendError::BinaryNotFound(format!("{binary}: {err}")))
}

/// Command-line arguments that load `profile` on `host:port`.
pub(crate) fn server_args(profile: &ModelProfile, host: &str, port: u16) -> Vec<String> {
    let init = &profile.init;
    let mut args = vec![
        "--model".to_string(),
        profile.path.display().to_string(),
        "--ctx-size".to_string(),
        init.n_ctx.to_string(),
        "--threads".to_string(),
        init.n_threads.to_string(),
        "--n-gpu-layers".to_string(),
        init.n_gpu_layers.to_string(),
        "--batch-size".to_string(),
        init.n_batch.to_string(),
    ];
    if init.use_mlock {
        args.push("--mlock".to_string());
    }
    if !init.use_mmap {
        args.push("--no-mmap".to_string());
    }
    if let Some(rope_freq_base) = init.rope_freq_base {
        args.push("--rope-freq-base".to_string());
        args.push(rope_freq_base.to_string());
    }
    args.extend([
        "--host".to_string(),
        host.to_string(),
        "--port".to_string(),
        port.to_string(),
    ]);
    args
}

/// Start llama-server with its output silenced.
pub(crate) fn spawn(binary: &Path, args: &[String]) -> Result<Child, BackendError> {
    let child = Command::new(binary)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .kill_on_drop(true)
        .spawn()
        .map_err(|err| BackendError::Spawn(format!("{}: {err}", binary.display())))?;
    debug!(
        "llama-server process started (pid={})",
        child.id().map(|id| id.to_string()).unwrap_or_default()
    );
    Ok(child)
}

/// Poll `/health` until the server is ready. The child is killed if it exits
/// early or the timeout elapses.
pub(crate) async fn wait_ready(
    child: &mut Child,
    client: &LlamaClient,
    timeout: Duration,
) -> Result<(), BackendError> {
    let start = Instant::now();
    info!(
        "waiting for llama-server (url={}, timeout_secs={})",
        client.base_url(),
        timeout.as_secs()
    );
    while start.elapsed() < timeout {
        if let Some(status) = child.try_wait()? {
            warn!("llama-server exited before becoming ready (status={status})");
            return Err(BackendError::Exited(status.to_string()));
        }
        match client.check_health().await {
            Ok(()) => {
                info!(
                    "llama-server ready (elapsed_ms={})",
                    start.elapsed().as_millis()
                );
                return Ok(());
            }
            Err(err) => {
                debug!("llama-server not ready yet (err={err})");
                sleep(READY_POLL_INTERVAL).await;
            }
        }
    }
    if let Err(err) = stop(child).await {
        warn!("failed to stop unready llama-server (err={err})");
    }
    Err(BackendError::Timeout(timeout.as_secs()))
}

/// Kill the child and wait for it to exit.
pub(crate) async fn stop(child: &mut Child) -> Result<(), BackendError> {
    if child.try_wait()?.is_some() {
        return Ok(());
    }
    child.kill().await?;
    info!("llama-server stopped");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn args_follow_profile_flags() {
        let profile = ModelProfile::for_file("qwen-coder.gguf", "/models/qwen-coder.gguf");
        let args = server_args(&profile, "127.0.0.1", 8089);
        assert_eq!(
            args,
            vec![
                "--model",
                "/models/qwen-coder.gguf",
                "--ctx-size",
                "16384",
                "--threads",
                "8",
                "--n-gpu-layers",
                "99",
                "--batch-size",
                "512",
                "--mlock",
                "--rope-freq-base",
                "1000000",
                "--host",
                "127.0.0.1",
                "--port",
                "8089",
            ]
        );
    }

    #[test]
    fn generic_profile_skips_optional_flags() {
        let mut profile = ModelProfile::for_file("tiny.gguf", "/models/tiny.gguf");
        profile.init.use_mmap = false;
        let args = server_args(&profile, "127.0.0.1", 9000);
        assert!(!args.contains(&"--mlock".to_string()));
        assert!(!args.contains(&"--rope-freq-base".to_string()));
        assert!(args.contains(&"--no-mmap".to_string()));
    }

    #[test]
    fn missing_binary_is_reported() {
        let err = locate_binary("lumino-definitely-missing-binary").unwrap_err();
        assert!(matches!(err, BackendError::BinaryNotFound(_)));
    }
}
