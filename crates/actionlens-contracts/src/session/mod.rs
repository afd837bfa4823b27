mod command_parser;
mod command_registry;
mod summary;

pub use command_parser::{parse_command, SessionCommand};
pub use command_registry::SESSION_HELP_COMMANDS;
pub use summary::{write_summary, SessionSummary};
