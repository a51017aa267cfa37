//! Edit command handler
//!
//! Line-oriented editing session on stdin. Plain lines are appended to the
//! document; lines starting with `:` are commands.

use anyhow::{Context, Result};
use tokio::io::{AsyncBufReadExt, BufReader};

use driftpad_core::{DocumentId, SessionHandle};

use crate::backend::Backend;
use crate::output::Output;

const HELP: &str = "Commands: :save  :clear  :resync  :say <text>  :status  :quit";

/// A parsed input line
#[derive(Debug, PartialEq, Eq)]
enum Input<'a> {
    Append(&'a str),
    Save,
    Clear,
    Resync,
    Say(&'a str),
    Status,
    Help,
    Quit,
    Unknown(&'a str),
}

fn parse_input(line: &str) -> Input<'_> {
    let Some(command) = line.strip_prefix(':') else {
        return Input::Append(line);
    };

    let (name, arg) = match command.split_once(' ') {
        Some((name, arg)) => (name, arg.trim()),
        None => (command.trim(), ""),
    };

    match name {
        "save" | "w" => Input::Save,
        "clear" => Input::Clear,
        "resync" | "sync" => Input::Resync,
        "say" => Input::Say(arg),
        "status" => Input::Status,
        "help" | "h" => Input::Help,
        "quit" | "q" => Input::Quit,
        _ => Input::Unknown(name),
    }
}

/// Run an interactive editing session
pub async fn edit(backend: &Backend, id: DocumentId, output: &Output) -> Result<()> {
    let mut session = backend.engine.open(id);
    let snapshot = super::load(&mut session, output).await?;

    output.print_snapshot(&snapshot);
    output.message(HELP);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line.context("Failed to read stdin")? else {
                    break;
                };
                if !handle_line(&session, &line, output).await? {
                    break;
                }
            }

            Some(event) = session.next_event() => {
                output.print_event(&event);
            }
        }
    }

    super::finish(session, output).await
}

/// Apply one input line; returns false to end the session
async fn handle_line(session: &SessionHandle, line: &str, output: &Output) -> Result<bool> {
    match parse_input(line) {
        Input::Append(text) => {
            let fragment = if session.state().content.is_empty() {
                text.to_string()
            } else {
                format!("\n{}", text)
            };
            session.insert(usize::MAX, fragment).await?;
        }
        Input::Say(text) if !text.is_empty() => session.insert(usize::MAX, text).await?,
        Input::Say(_) => output.message("Usage: :say <text>"),
        Input::Save => session.force_save().await?,
        Input::Clear => session.clear().await?,
        Input::Resync => session.resync().await?,
        Input::Status => output.print_status(&session.state()),
        Input::Help => output.message(HELP),
        Input::Quit => return Ok(false),
        Input::Unknown(name) => output.message(&format!("Unknown command ':{}'. {}", name, HELP)),
    }
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_input() {
        assert_eq!(parse_input("hello"), Input::Append("hello"));
        assert_eq!(parse_input(""), Input::Append(""));
        assert_eq!(parse_input(":save"), Input::Save);
        assert_eq!(parse_input(":w"), Input::Save);
        assert_eq!(parse_input(":clear"), Input::Clear);
        assert_eq!(parse_input(":resync"), Input::Resync);
        assert_eq!(parse_input(":say  hi there "), Input::Say("hi there"));
        assert_eq!(parse_input(":say"), Input::Say(""));
        assert_eq!(parse_input(":status"), Input::Status);
        assert_eq!(parse_input(":q"), Input::Quit);
        assert_eq!(parse_input(":bogus"), Input::Unknown("bogus"));
    }
}
