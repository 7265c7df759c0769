//! Interactive chat loop

use console::style;
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use tokio_util::sync::CancellationToken;

use toolchat_core::session::ChatSession;
use toolchat_core::target::TargetRef;

/// A line typed at the prompt
#[derive(Debug, PartialEq, Eq)]
pub enum ChatInput<'a> {
    Query(&'a str),
    Clear,
    Switch(Option<&'a str>),
    Tools,
    Help,
    Quit,
    Unknown(&'a str),
    Empty,
}

impl<'a> ChatInput<'a> {
    pub fn parse(line: &'a str) -> Self {
        let line = line.trim();
        if line.is_empty() {
            return ChatInput::Empty;
        }
        let Some(command) = line.strip_prefix('/') else {
            return ChatInput::Query(line);
        };

        let (name, rest) = match command.split_once(char::is_whitespace) {
            Some((name, rest)) => (name, Some(rest.trim()).filter(|r| !r.is_empty())),
            None => (command, None),
        };

        match name {
            "clear" => ChatInput::Clear,
            "switch" | "connect" => ChatInput::Switch(rest),
            "tools" => ChatInput::Tools,
            "help" | "?" => ChatInput::Help,
            "quit" | "exit" | "q" => ChatInput::Quit,
            _ => ChatInput::Unknown(name),
        }
    }
}

/// Run the REPL until the user quits or closes stdin
pub async fn run_chat(session: &mut ChatSession, initial_target: Option<TargetRef>) -> anyhow::Result<()> {
    print_banner(session);

    match initial_target {
        Some(target) => println!("{}", notice(&session.switch_target(&target).await)),
        None => println!(
            "{}",
            style("No tool server given. Use /switch <path> to connect to one.").dim()
        ),
    }
    println!();

    let mut editor = DefaultEditor::new()?;

    loop {
        let line = match editor.readline(&format!("{} ", style(">").cyan().bold())) {
            Ok(line) => line,
            Err(ReadlineError::Interrupted) => continue,
            Err(ReadlineError::Eof) => break,
            Err(e) => return Err(e.into()),
        };

        let input = ChatInput::parse(&line);
        if !matches!(input, ChatInput::Empty) {
            let _ = editor.add_history_entry(line.trim());
        }

        match input {
            ChatInput::Empty => {}
            ChatInput::Quit => break,
            ChatInput::Help => print_help(),
            ChatInput::Clear => println!("{}", style(session.clear()).green()),
            ChatInput::Tools => print_session_tools(session),
            ChatInput::Switch(None) => println!("{}", style("Usage: /switch <target>").yellow()),
            ChatInput::Switch(Some(raw)) => match TargetRef::parse(raw) {
                Ok(target) => println!("{}", notice(&session.switch_target(&target).await)),
                Err(e) => println!("{}", style(format!("Error: {}", e)).red()),
            },
            ChatInput::Unknown(name) => {
                println!("{}", style(format!("Unknown command: /{}. Type /help.", name)).yellow())
            }
            ChatInput::Query(text) => {
                let reply = ask(session, text).await;
                println!();
                println!("{}: {}", style("Assistant").bold().green(), reply);
                println!();
            }
        }
    }

    println!("{}", style("Goodbye!").dim());
    Ok(())
}

/// Run one query; Ctrl-C abandons it
async fn ask(session: &mut ChatSession, text: &str) -> String {
    let token = CancellationToken::new();
    let watcher = {
        let token = token.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                token.cancel();
            }
        })
    };

    let reply = session.process_query_cancellable(text, None, &token).await;
    watcher.abort();

    if token.is_cancelled() {
        println!(
            "{}",
            style("Query cancelled and tool server disconnected. Use /switch to reconnect.").yellow()
        );
    }
    reply
}

fn notice(message: &str) -> String {
    if message.starts_with("Connected") {
        style(message).green().to_string()
    } else {
        style(message).red().to_string()
    }
}

fn print_banner(session: &ChatSession) {
    println!("{}", style("toolchat").bold().cyan());
    println!(
        "  {} {}",
        style("Provider:").dim(),
        style(session.provider_name()).green()
    );
    println!("  {}", style("Type /help for commands, /quit to exit.").dim());
    println!();
}

fn print_help() {
    println!("{}", style("Commands:").bold());
    let commands = [
        ("/switch <target>", "Connect to another tool server (clears history)"),
        ("/tools", "List tools on the current server"),
        ("/clear", "Forget the conversation so far"),
        ("/quit", "Exit"),
    ];
    for (name, desc) in commands {
        println!("  {:<20} {}", style(name).cyan(), desc);
    }
}

fn print_session_tools(session: &ChatSession) {
    match session.connection().filter(|_| session.is_connected()) {
        Some(connection) => crate::print_tools(connection.label(), connection.descriptors()),
        None => println!("{}", style("Not connected to a tool server.").yellow()),
    }
}
