//! Line-based control console

use super::controls::{get_cameras, start_recording, stop_recording, ControlState};
use crate::utils::error::{AppError, AppResult, ErrorResponse};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlCommand {
    Start,
    Stop,
    Status,
    Quit,
}

impl ControlCommand {
    /// Parse one console line. Blank lines yield `Ok(None)`.
    pub fn parse(line: &str) -> AppResult<Option<Self>> {
        let command = match line.trim().to_ascii_lowercase().as_str() {
            "" => return Ok(None),
            "start" => Self::Start,
            "stop" => Self::Stop,
            "status" | "cameras" => Self::Status,
            "quit" | "exit" | "q" => Self::Quit,
            other => return Err(AppError::UnknownCommand(other.to_string())),
        };
        Ok(Some(command))
    }
}

/// Run one command and render the reply as JSON
async fn execute(state: &ControlState, command: ControlCommand) -> AppResult<String> {
    let reply = match command {
        ControlCommand::Start => serde_json::to_string(&start_recording(state).await?)?,
        ControlCommand::Stop => serde_json::to_string(&stop_recording(state).await?)?,
        ControlCommand::Status => serde_json::to_string(&get_cameras(state).await?)?,
        ControlCommand::Quit => String::new(),
    };
    Ok(reply)
}

/// Read commands from `input` until `quit` or end of input.
///
/// Cameras still running when the console exits are stopped.
pub async fn run_console<R, W>(state: &ControlState, input: R, mut output: W) -> AppResult<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut lines = input.lines();
    while let Some(line) = lines.next_line().await? {
        let reply = match ControlCommand::parse(&line) {
            Ok(None) => continue,
            Ok(Some(ControlCommand::Quit)) => break,
            Ok(Some(command)) => {
                tracing::debug!("Console command: {:?}", command);
                execute(state, command).await
            }
            Err(e) => Err(e),
        };

        let text = match reply {
            Ok(json) => json,
            Err(e) => {
                tracing::warn!("Command failed: {}", e);
                serde_json::to_string(&ErrorResponse::from(e))?
            }
        };
        output.write_all(text.as_bytes()).await?;
        output.write_all(b"\n").await?;
        output.flush().await?;
    }

    stop_recording(state).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::SyntheticDevices;
    use crate::detection::SimulatedDetector;
    use crate::registry::{RegistryConfig, SessionRegistry};
    use std::sync::Arc;

    #[test]
    fn test_parse() {
        assert_eq!(ControlCommand::parse(" Start ").unwrap(), Some(ControlCommand::Start));
        assert_eq!(ControlCommand::parse("exit").unwrap(), Some(ControlCommand::Quit));
        assert_eq!(ControlCommand::parse("").unwrap(), None);
        assert!(matches!(
            ControlCommand::parse("record"),
            Err(AppError::UnknownCommand(cmd)) if cmd == "record"
        ));
    }

    #[tokio::test]
    async fn test_console_reports_errors_as_json() {
        let devices = Arc::new(SyntheticDevices::new(1));
        let registry = SessionRegistry::new(
            devices.clone(),
            devices,
            Arc::new(SimulatedDetector::default()),
            RegistryConfig::default(),
        );
        let state = ControlState::new(Arc::new(registry));

        let input: &[u8] = b"start\nbogus\nstatus\nquit\nstart\n";
        let mut output = Vec::new();
        run_console(&state, input, &mut output).await.unwrap();

        let text = String::from_utf8(output).unwrap();
        let replies: Vec<&str> = text.lines().collect();
        assert_eq!(replies.len(), 3);
        assert!(replies[0].contains("NOT_READY"));
        assert!(replies[1].contains("UNKNOWN_COMMAND"));
        assert_eq!(replies[2], "[]");
    }
}
