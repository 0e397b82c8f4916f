//! services/bot/src/chat/protocol.rs
//!
//! Defines the chat command language: how inbound text is parsed into a
//! `Command`, and the replies the bot sends back.

use std::sync::LazyLock;

use regex::Regex;

/// `/<name>[@botname] [args]`. Args keep their internal whitespace.
static COMMAND_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)^/([A-Za-z_]+)(?:@\w+)?(?:\s+(.*))?$").expect("command pattern is valid")
});

//=========================================================================================
// Commands Sent FROM the Chat TO the Bot
//=========================================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// `/remind <time> <text>`.
    Remind { time: String, content: String },
    /// `/todo`: list the chat's todos.
    ListTodos,
    /// `/set <text>`: append a todo.
    AddTodo { task: String },
    /// `/done <index>`. The index is kept raw so a bad value can be reported.
    CompleteTodo { index: String },
    /// `/start` or `/help`.
    Help,
    /// A known command with missing arguments; carries the usage line to reply with.
    Usage(&'static str),
    /// Anything that is not a recognised command.
    Unknown,
}

impl Command {
    pub fn parse(text: &str) -> Self {
        let Some(caps) = COMMAND_RE.captures(text.trim_start()) else {
            return Command::Unknown;
        };
        let name = caps.get(1).map_or("", |m| m.as_str());
        let args = caps.get(2).map_or("", |m| m.as_str()).trim_end();

        match name {
            "remind" => match args.split_once(char::is_whitespace) {
                Some((time, content)) if !content.trim().is_empty() => Command::Remind {
                    time: time.to_string(),
                    content: content.trim_start().to_string(),
                },
                _ => Command::Usage(REMIND_USAGE),
            },
            "todo" => Command::ListTodos,
            "set" if args.is_empty() => Command::Usage(SET_USAGE),
            "set" => Command::AddTodo {
                task: args.to_string(),
            },
            "done" => Command::CompleteTodo {
                index: args.to_string(),
            },
            "start" | "help" => Command::Help,
            _ => Command::Unknown,
        }
    }
}

//=========================================================================================
// Replies Sent FROM the Bot TO the Chat
//=========================================================================================

pub const REMIND_USAGE: &str = "Usage: /remind <time> <message>";
pub const SET_USAGE: &str = "Usage: /set <task>";
pub const INVALID_TIME: &str = "Invalid time format!";
pub const INVALID_INDEX: &str = "Invalid index.";
pub const EMPTY_LIST: &str = "Your to-do list is empty.";
pub const UNKNOWN_COMMAND: &str = "Unknown command!";
pub const HELP: &str = "Commands:\n\
/set <task> - add a task to your to-do list\n\
/todo - show your to-do list\n\
/done <number> - mark a task as done\n\
/remind <time> <message> - remind you after a delay, e.g. /remind 10m stretch\n\
Time units: s, m (minutes), h, d, w, M (months), y";

/// The text delivered when a reminder fires.
pub fn reminder_text(content: &str) -> String {
    format!("Reminder: {}", content)
}

pub fn reminder_set(time: &str) -> String {
    format!("You set a reminder for {} from now!", time)
}

pub fn todo_added(task: &str) -> String {
    format!("Task '{}' added!", task)
}

pub fn todo_done(task: &str) -> String {
    format!("Done: {}", task)
}

/// Numbers the todos from 1, one per line.
pub fn todo_list(todos: &[String]) -> String {
    if todos.is_empty() {
        return EMPTY_LIST.to_string();
    }
    let lines: Vec<String> = todos
        .iter()
        .enumerate()
        .map(|(i, task)| format!("{}. {}", i + 1, task))
        .collect();
    format!("To-do list:\n{}", lines.join("\n"))
}
