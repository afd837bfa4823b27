#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum CommandAction {
    Open,
    Reanalyze,
    Clear,
    Status,
    Actions,
    Samples,
    Sample,
    Health,
    Help,
    Quit,
}

#[derive(Clone, Copy, Debug)]
pub(crate) struct CommandSpec {
    pub command: &'static str,
    pub action: CommandAction,
}

pub(crate) const NO_ARG_COMMANDS: &[CommandSpec] = &[
    CommandSpec {
        command: "again",
        action: CommandAction::Reanalyze,
    },
    CommandSpec {
        command: "analyze",
        action: CommandAction::Reanalyze,
    },
    CommandSpec {
        command: "clear",
        action: CommandAction::Clear,
    },
    CommandSpec {
        command: "status",
        action: CommandAction::Status,
    },
    CommandSpec {
        command: "samples",
        action: CommandAction::Samples,
    },
    CommandSpec {
        command: "health",
        action: CommandAction::Health,
    },
    CommandSpec {
        command: "help",
        action: CommandAction::Help,
    },
    CommandSpec {
        command: "quit",
        action: CommandAction::Quit,
    },
    CommandSpec {
        command: "exit",
        action: CommandAction::Quit,
    },
];

pub(crate) const PATH_COMMANDS: &[CommandSpec] = &[
    CommandSpec {
        command: "open",
        action: CommandAction::Open,
    },
    CommandSpec {
        command: "upload",
        action: CommandAction::Open,
    },
];

pub(crate) const TEXT_ARG_COMMANDS: &[CommandSpec] = &[
    CommandSpec {
        command: "actions",
        action: CommandAction::Actions,
    },
    CommandSpec {
        command: "sample",
        action: CommandAction::Sample,
    },
];

pub const SESSION_HELP_COMMANDS: &[&str] = &[
    "/open <path>",
    "/again",
    "/clear",
    "/status",
    "/actions [query]",
    "/samples",
    "/sample <action>",
    "/health",
    "/help",
    "/quit",
];

pub(crate) fn find_command(command: &str, specs: &[CommandSpec]) -> Option<CommandAction> {
    specs
        .iter()
        .find(|spec| spec.command == command)
        .map(|spec| spec.action)
}
