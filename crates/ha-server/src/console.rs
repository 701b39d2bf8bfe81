//! Operator console
//!
//! Line-oriented commands read from stdin while the daemon runs:
//!
//! ```text
//! fire <entity_id> [message]   inject a synthetic notification
//! status                       show every trigger's debounce state
//! help                         list commands
//! quit                         stop the engine and exit
//! ```

use std::fmt::Write as _;

use ha_core::Notification;
use ha_trigger_engine::{EngineError, TriggerEngine};
use thiserror::Error;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{debug, info, warn};

const HELP: &str = "\
commands:
  fire <entity_id> [message]   inject a synthetic notification
  status                       show trigger states
  help                         show this help
  quit                         stop and exit
";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Fire {
        entity_id: String,
        message: Option<String>,
    },
    Status,
    Help,
    Quit,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("unknown command '{0}', try 'help'")]
    Unknown(String),

    #[error("usage: fire <entity_id> [message]")]
    MissingEntity,

    #[error("'{0}' takes no arguments")]
    UnexpectedArguments(&'static str),
}

/// Parse one console line; blank lines yield `None`
pub fn parse(line: &str) -> Result<Option<Command>, ParseError> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }

    let (word, rest) = match line.split_once(char::is_whitespace) {
        Some((word, rest)) => (word, rest.trim()),
        None => (line, ""),
    };

    let command = match word {
        "fire" => {
            let (entity_id, message) = match rest.split_once(char::is_whitespace) {
                Some((entity_id, message)) => (entity_id, Some(message.trim().to_string())),
                None => (rest, None),
            };
            if entity_id.is_empty() {
                return Err(ParseError::MissingEntity);
            }
            Command::Fire {
                entity_id: entity_id.to_string(),
                message,
            }
        }
        "status" if rest.is_empty() => Command::Status,
        "help" if rest.is_empty() => Command::Help,
        "quit" | "exit" if rest.is_empty() => Command::Quit,
        "status" => return Err(ParseError::UnexpectedArguments("status")),
        "help" => return Err(ParseError::UnexpectedArguments("help")),
        "quit" | "exit" => return Err(ParseError::UnexpectedArguments("quit")),
        other => return Err(ParseError::Unknown(other.to_string())),
    };
    Ok(Some(command))
}

fn render_status(engine: &TriggerEngine) -> String {
    let mut out = String::new();
    for status in engine.statuses() {
        let duration = status
            .min_duration
            .map(|d| format!("{}s", d.as_secs_f64()))
            .unwrap_or_else(|| "-".to_string());
        let _ = writeln!(
            out,
            "{:>3}  {:<32} min={:<8} armed={}",
            status.handle.index(),
            status.name,
            duration,
            status.armed
        );
    }
    if out.is_empty() {
        out.push_str("no triggers registered\n");
    }
    out
}

/// Run one command; returns `false` when the console should stop
async fn execute<W>(engine: &TriggerEngine, command: Command, output: &mut W) -> anyhow::Result<bool>
where
    W: AsyncWrite + Unpin,
{
    match command {
        Command::Fire { entity_id, message } => {
            let mut notification = Notification::synthetic(&entity_id);
            if let Some(message) = message {
                notification = notification.with_message(message);
            }
            match engine.injector().fire_event(notification) {
                Ok(()) => {
                    info!(entity_id = %entity_id, "Injected notification from console");
                    output.write_all(format!("queued {}\n", entity_id).as_bytes()).await?;
                }
                Err(EngineError::InjectorClosed) => {
                    output.write_all(b"engine is shut down\n").await?;
                }
                Err(e) => return Err(e.into()),
            }
        }
        Command::Status => {
            output.write_all(render_status(engine).as_bytes()).await?;
        }
        Command::Help => {
            output.write_all(HELP.as_bytes()).await?;
        }
        Command::Quit => {
            info!("Console quit requested");
            return Ok(false);
        }
    }
    Ok(true)
}

/// Read and execute commands until `quit` or end of input
pub async fn run<R, W>(engine: &TriggerEngine, input: R, mut output: W) -> anyhow::Result<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut lines = input.lines();
    while let Some(line) = lines.next_line().await? {
        debug!(line = %line, "Console input");
        let keep_going = match parse(&line) {
            Ok(Some(command)) => execute(engine, command, &mut output).await?,
            Ok(None) => true,
            Err(e) => {
                warn!(error = %e, "Bad console command");
                output.write_all(format!("{}\n", e).as_bytes()).await?;
                true
            }
        };
        output.flush().await?;
        if !keep_going {
            return Ok(());
        }
    }
    info!("Console input closed");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ha_trigger_engine::{BoxError, Payload};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    #[test]
    fn test_parse_fire() {
        assert_eq!(
            parse("fire hand.bedroom ALL_FINGERS").unwrap(),
            Some(Command::Fire {
                entity_id: "hand.bedroom".into(),
                message: Some("ALL_FINGERS".into()),
            })
        );
        assert_eq!(
            parse("  fire light.kitchen  ").unwrap(),
            Some(Command::Fire {
                entity_id: "light.kitchen".into(),
                message: None,
            })
        );
        assert_eq!(
            parse("fire switch.gate open   now").unwrap(),
            Some(Command::Fire {
                entity_id: "switch.gate".into(),
                message: Some("open   now".into()),
            })
        );
    }

    #[test]
    fn test_parse_other_commands() {
        assert_eq!(parse("").unwrap(), None);
        assert_eq!(parse("status").unwrap(), Some(Command::Status));
        assert_eq!(parse("help").unwrap(), Some(Command::Help));
        assert_eq!(parse("quit").unwrap(), Some(Command::Quit));
        assert_eq!(parse("exit").unwrap(), Some(Command::Quit));
    }

    #[test]
    fn test_parse_errors() {
        assert_eq!(parse("fire"), Err(ParseError::MissingEntity));
        assert_eq!(parse("launch rockets"), Err(ParseError::Unknown("launch".into())));
        assert_eq!(parse("status now"), Err(ParseError::UnexpectedArguments("status")));
    }

    #[tokio::test]
    async fn test_run_fires_through_injection_port() {
        let engine = Arc::new(TriggerEngine::default());
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        engine.register_named(
            "hands",
            |payload: Payload| async move {
                Ok::<_, BoxError>(payload.map(|n| n.is_about("hand.bedroom")))
            },
            move |payload: Payload| {
                let sink = sink.clone();
                async move {
                    let message = payload.as_deref().and_then(|n| n.message()).map(str::to_string);
                    sink.lock().unwrap().push(message);
                    Ok::<_, BoxError>(())
                }
            },
            None,
        );
        let tasks = engine.start_detached().unwrap();

        let input: &[u8] = b"help\nfire hand.bedroom 2\nbogus\nstatus\nquit\nfire hand.bedroom 3\n";
        let mut output = Vec::new();
        run(&engine, input, &mut output).await.unwrap();

        for _ in 0..50 {
            if !seen.lock().unwrap().is_empty() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(*seen.lock().unwrap(), vec![Some("2".to_string())]);

        let text = String::from_utf8(output).unwrap();
        assert!(text.contains("commands:"));
        assert!(text.contains("queued hand.bedroom"));
        assert!(text.contains("unknown command 'bogus'"));
        assert!(text.contains("hands"));

        engine.stop();
        let _ = tasks.injection.await;
    }

    #[test]
    fn test_status_for_empty_engine() {
        let engine = TriggerEngine::default();
        assert_eq!(render_status(&engine), "no triggers registered\n");
    }
}
