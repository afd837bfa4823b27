use super::command_registry::{
    find_command, CommandAction, NO_ARG_COMMANDS, PATH_COMMANDS, TEXT_ARG_COMMANDS,
};

/// One line of interactive input, resolved to what the session should do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionCommand {
    Noop,
    Open { path: String },
    Reanalyze,
    Clear,
    Status,
    Actions { query: Option<String> },
    Samples,
    Sample { action: String },
    Health,
    Help,
    Quit,
    MissingArgument { command: String },
    Unknown { command: String },
}

fn parse_path_args(arg: &str) -> Vec<String> {
    if arg.trim().is_empty() {
        return Vec::new();
    }
    match shell_words::split(arg) {
        Ok(parts) => parts
            .into_iter()
            .filter(|value| !value.is_empty())
            .collect(),
        Err(_) => arg
            .split_whitespace()
            .map(str::to_string)
            .filter(|value| !value.is_empty())
            .collect(),
    }
}

/// Paths with unquoted spaces are rejoined rather than truncated.
fn parse_single_path_arg(arg: &str) -> String {
    parse_path_args(arg).join(" ")
}

fn non_empty(arg: &str) -> Option<String> {
    Some(arg.trim().to_string()).filter(|value| !value.is_empty())
}

pub fn parse_command(text: &str) -> SessionCommand {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return SessionCommand::Noop;
    }

    let Some(slash_tail) = trimmed.strip_prefix('/') else {
        return SessionCommand::Open {
            path: parse_single_path_arg(trimmed),
        };
    };

    let command_len = slash_tail
        .chars()
        .take_while(|ch| ch.is_ascii_alphanumeric() || *ch == '_')
        .count();
    if command_len == 0 {
        // An absolute path such as `/tmp/photo.jpg`.
        return SessionCommand::Open {
            path: parse_single_path_arg(trimmed),
        };
    }
    let command = slash_tail[..command_len].to_ascii_lowercase();
    let remainder = &slash_tail[command_len..];
    if !remainder.is_empty() && !remainder.starts_with(char::is_whitespace) {
        return SessionCommand::Open {
            path: parse_single_path_arg(trimmed),
        };
    }
    let arg = remainder.trim();

    if let Some(action) = find_command(&command, NO_ARG_COMMANDS) {
        return match action {
            CommandAction::Reanalyze => SessionCommand::Reanalyze,
            CommandAction::Clear => SessionCommand::Clear,
            CommandAction::Status => SessionCommand::Status,
            CommandAction::Samples => SessionCommand::Samples,
            CommandAction::Health => SessionCommand::Health,
            CommandAction::Help => SessionCommand::Help,
            CommandAction::Quit => SessionCommand::Quit,
            CommandAction::Open | CommandAction::Actions | CommandAction::Sample => {
                SessionCommand::Unknown { command }
            }
        };
    }

    if find_command(&command, PATH_COMMANDS).is_some() {
        let path = parse_single_path_arg(arg);
        if path.is_empty() {
            return SessionCommand::MissingArgument { command };
        }
        return SessionCommand::Open { path };
    }

    match find_command(&command, TEXT_ARG_COMMANDS) {
        Some(CommandAction::Actions) => SessionCommand::Actions {
            query: non_empty(arg),
        },
        Some(_) => match non_empty(arg) {
            Some(action) => SessionCommand::Sample { action },
            None => SessionCommand::MissingArgument { command },
        },
        None => SessionCommand::Unknown { command },
    }
}
