//! Interactive chat loop.
//!
//! Plain input is asked as a question and the answer is printed as it
//! streams. Lines starting with `/` are session commands.

use std::future::Future;
use std::io::Write;

use futures::StreamExt;
use ragchat::{AnswerStream, ChatSession, RagError};
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use tracing::warn;

const HELP: &str = "\
Commands:
  /clear               forget the conversation
  /truncate <n>        keep only the last n turns
  /temperature <x>     set the sampling temperature, 0 to 1
  /top_k <k>           set the number of retrieved chunks, 1 to 10
  /model <name>        switch the chat model
  /history             show the conversation
  /config              show the current settings
  /help                show this help
  /quit                leave
Press Ctrl-C while an answer is streaming to cancel it.";

/// A parsed line of user input.
#[derive(Debug, Clone, PartialEq)]
pub enum Input {
    Empty,
    Question(String),
    Command(Command),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Clear,
    Truncate(usize),
    Temperature(f32),
    TopK(usize),
    Model(String),
    History,
    Config,
    Help,
    Quit,
}

/// Parse one line. Errors are user-facing messages.
pub fn parse_input(line: &str) -> Result<Input, String> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(Input::Empty);
    }
    let Some(command) = line.strip_prefix('/') else {
        return Ok(Input::Question(line.to_string()));
    };

    let mut parts = command.split_whitespace();
    let name = parts.next().unwrap_or("");
    let arg = parts.next();
    if parts.next().is_some() {
        return Err(format!("/{name} takes at most one argument"));
    }

    let command = match (name, arg) {
        ("clear", None) => Command::Clear,
        ("truncate", Some(n)) => Command::Truncate(parse_arg(name, n)?),
        ("temperature", Some(x)) => Command::Temperature(parse_arg(name, x)?),
        ("top_k", Some(k)) => Command::TopK(parse_arg(name, k)?),
        ("model", Some(model)) => Command::Model(model.to_string()),
        ("history", None) => Command::History,
        ("config", None) => Command::Config,
        ("help", None) => Command::Help,
        ("quit" | "exit", None) => Command::Quit,
        ("truncate" | "temperature" | "top_k" | "model", None) => {
            return Err(format!("/{name} needs a value, see /help"));
        }
        ("clear" | "history" | "config" | "help" | "quit" | "exit", Some(_)) => {
            return Err(format!("/{name} takes no argument"));
        }
        _ => return Err(format!("unknown command /{name}, see /help")),
    };
    Ok(Input::Command(command))
}

fn parse_arg<T: std::str::FromStr>(name: &str, value: &str) -> Result<T, String> {
    value.parse().map_err(|_| format!("invalid value for /{name}: {value}"))
}

/// How an answer stream ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamOutcome {
    Completed,
    Cancelled,
}

/// Print fragments to `out` as they arrive until the answer ends or `cancel`
/// resolves. Cancelling drops the stream, so no turn is recorded.
pub async fn print_answer<W, C>(
    mut answer: AnswerStream<'_>,
    cancel: C,
    out: &mut W,
) -> Result<StreamOutcome, RagError>
where
    W: Write,
    C: Future<Output = ()>,
{
    tokio::pin!(cancel);
    loop {
        tokio::select! {
            biased;
            () = &mut cancel => return Ok(StreamOutcome::Cancelled),
            next = answer.next() => match next {
                Some(Ok(fragment)) => {
                    // A closed stdout should not abort the answer.
                    let _ = write!(out, "{fragment}").and_then(|()| out.flush());
                }
                Some(Err(e)) => return Err(e),
                None => return Ok(StreamOutcome::Completed),
            },
        }
    }
}

/// Apply a command to the session. Returns `false` when the loop should end.
pub fn apply_command<W: Write>(
    session: &mut ChatSession,
    command: Command,
    out: &mut W,
) -> std::io::Result<bool> {
    match command {
        Command::Clear => {
            session.clear_history();
            writeln!(out, "History cleared.")?;
        }
        Command::Truncate(n) => match session.truncate_history(n) {
            Ok(()) => writeln!(out, "Keeping the last {} turn(s).", session.history().len())?,
            Err(e) => writeln!(out, "{e}")?,
        },
        Command::Temperature(x) => match session.set_temperature(x) {
            Ok(()) => writeln!(out, "Temperature set to {x}.")?,
            Err(e) => writeln!(out, "{e}")?,
        },
        Command::TopK(k) => match session.set_top_k(k) {
            Ok(()) => writeln!(out, "top_k set to {k}.")?,
            Err(e) => writeln!(out, "{e}")?,
        },
        Command::Model(model) => match session.set_model(model.as_str()) {
            Ok(()) => writeln!(out, "Model set to {model}.")?,
            Err(e) => writeln!(out, "{e}")?,
        },
        Command::History => {
            if session.history().is_empty() {
                writeln!(out, "(no history)")?;
            }
            for (i, turn) in session.history().iter().enumerate() {
                writeln!(out, "[{}] Q: {}\n    A: {}", i + 1, turn.question(), turn.answer())?;
            }
        }
        Command::Config => {
            let config = session.config();
            writeln!(
                out,
                "model: {}\ntemperature: {}\ntop_k: {}\npersist_directory: {}",
                config.model_name,
                config.temperature,
                config.top_k,
                config.persist_directory.display()
            )?;
        }
        Command::Help => writeln!(out, "{HELP}")?,
        Command::Quit => return Ok(false),
    }
    Ok(true)
}

/// Run the read-eval-print loop until `/quit`, Ctrl-D or Ctrl-C at the prompt.
pub async fn run(session: &mut ChatSession) -> anyhow::Result<()> {
    let mut editor = DefaultEditor::new()?;
    let mut stdout = std::io::stdout();
    writeln!(stdout, "Ask a question about your documents. Type /help for commands.")?;

    loop {
        let line = match editor.readline(">> ") {
            Ok(line) => line,
            Err(ReadlineError::Interrupted | ReadlineError::Eof) => break,
            Err(e) => return Err(e.into()),
        };
        if !line.trim().is_empty() {
            let _ = editor.add_history_entry(line.as_str());
        }

        match parse_input(&line) {
            Ok(Input::Empty) => {}
            Ok(Input::Command(command)) => {
                if !apply_command(session, command, &mut stdout)? {
                    break;
                }
            }
            Ok(Input::Question(question)) => {
                let cancel = async {
                    if tokio::signal::ctrl_c().await.is_err() {
                        std::future::pending::<()>().await;
                    }
                };
                match print_answer(session.ask(&question), cancel, &mut stdout).await {
                    Ok(StreamOutcome::Completed) => writeln!(stdout)?,
                    Ok(StreamOutcome::Cancelled) => writeln!(stdout, "\n(cancelled)")?,
                    Err(e) => {
                        warn!(error = %e, "question failed");
                        writeln!(stdout, "\nError: {e}")?;
                    }
                }
            }
            Err(message) => writeln!(stdout, "{message}")?,
        }
    }
    Ok(())
}
