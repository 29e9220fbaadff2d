use std::ffi::OsStr;
use std::path::Path;

use log::info;
use shared::utils::BoxResult;

#[derive(thiserror::Error, Debug)]
#[error("Command {command} failed with {status}")]
pub struct CommandError {
    command: String,
    status: std::process::ExitStatus,
}

pub async fn exec_command<I, S>(program: &str, args: I, dir: &Path) -> BoxResult<()>
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    let args: Vec<_> = args.into_iter().map(|a| a.as_ref().to_os_string()).collect();
    let command = format!(
        "{} {}",
        program,
        args.iter()
            .map(|a| a.to_string_lossy())
            .collect::<Vec<_>>()
            .join(" ")
    );
    info!("Executing command: {}", command);

    let status = tokio::process::Command::new(program)
        .args(&args)
        .current_dir(dir)
        .status()
        .await?;
    if !status.success() {
        return Err(Box::new(CommandError { command, status }));
    }
    Ok(())
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_exec_command() {
        let dir = tempfile::tempdir().unwrap();
        exec_command("touch", ["created"], dir.path()).await.unwrap();
        assert!(dir.path().join("created").exists());

        assert!(exec_command("false", Vec::<&str>::new(), dir.path())
            .await
            .is_err());
    }
}
