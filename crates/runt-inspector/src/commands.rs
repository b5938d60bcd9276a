//! The named actions a host can bind to menus, palettes, or keys.

use std::fmt;
use std::str::FromStr;

use log::debug;

use crate::manager::InspectorManager;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommandId {
    Open,
    Close,
    Toggle,
    Trigger,
    ToggleStandby,
}

impl CommandId {
    pub const ALL: [CommandId; 5] = [
        CommandId::Open,
        CommandId::Close,
        CommandId::Toggle,
        CommandId::Trigger,
        CommandId::ToggleStandby,
    ];

    pub fn id(self) -> &'static str {
        match self {
            CommandId::Open => "contextual-help:open",
            CommandId::Close => "contextual-help:close",
            CommandId::Toggle => "contextual-help:toggle",
            CommandId::Trigger => "contextual-help:trigger",
            CommandId::ToggleStandby => "contextual-help:toggleStandby",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            CommandId::Open => "Open Contextual Help",
            CommandId::Close => "Hide Contextual Help",
            CommandId::Toggle => "Show Contextual Help",
            CommandId::Trigger => "Trigger Contextual Help",
            CommandId::ToggleStandby => "Auto Update Contextual Help",
        }
    }

    pub fn caption(self) -> Option<&'static str> {
        match self {
            CommandId::Open | CommandId::Toggle => {
                Some("Live updating code documentation from the active kernel")
            }
            CommandId::Trigger => {
                Some("Manually updating code documentation from the active kernel")
            }
            CommandId::Close | CommandId::ToggleStandby => None,
        }
    }
}

impl fmt::Display for CommandId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown command: {0}")]
pub struct UnknownCommand(pub String);

impl FromStr for CommandId {
    type Err = UnknownCommand;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        CommandId::ALL
            .into_iter()
            .find(|command| command.id() == s)
            .ok_or_else(|| UnknownCommand(s.to_string()))
    }
}

/// A command invocation with its arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Open the panel. With `refresh` and an already open panel, re-inspect
    /// `text` on the bound source instead.
    Open { text: Option<String>, refresh: bool },
    Close,
    Toggle { text: Option<String> },
    Trigger,
    ToggleStandby,
}

impl Action {
    pub fn command(&self) -> CommandId {
        match self {
            Action::Open { .. } => CommandId::Open,
            Action::Close => CommandId::Close,
            Action::Toggle { .. } => CommandId::Toggle,
            Action::Trigger => CommandId::Trigger,
            Action::ToggleStandby => CommandId::ToggleStandby,
        }
    }
}

impl InspectorManager {
    pub fn is_enabled(&self, command: CommandId) -> bool {
        match command {
            CommandId::Open => !self
                .panel()
                .is_some_and(|panel| panel.is_attached() && panel.is_visible()),
            CommandId::Close => self.is_open(),
            CommandId::Toggle | CommandId::ToggleStandby => true,
            CommandId::Trigger => self.is_standby(),
        }
    }

    pub fn is_toggled(&self, command: CommandId) -> bool {
        match command {
            CommandId::Toggle => self.is_open(),
            CommandId::ToggleStandby => self.source().is_some_and(|s| !s.standby()),
            CommandId::Open | CommandId::Close | CommandId::Trigger => false,
        }
    }

    pub fn execute(&self, action: Action) {
        debug!("[inspector] Executing {}", action.command());
        match action {
            Action::Open {
                text,
                refresh: true,
            } if self.is_open() => {
                if let Some(source) = self.source() {
                    source.on_editor_change(text.as_deref());
                }
            }
            Action::Open { text, .. } => {
                self.open(text.as_deref());
            }
            Action::Close => self.close(),
            Action::Toggle { text } => self.toggle(text.as_deref()),
            Action::Trigger => self.trigger(),
            Action::ToggleStandby => self.toggle_standby(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::InspectorSettings;
    use crate::shell::HeadlessShell;
    use std::sync::Arc;

    fn manager() -> (Arc<HeadlessShell>, InspectorManager) {
        let shell = Arc::new(HeadlessShell::new());
        let manager = InspectorManager::new(shell.clone(), &InspectorSettings::default());
        (shell, manager)
    }

    #[test]
    fn test_ids_round_trip_through_from_str() {
        for command in CommandId::ALL {
            assert_eq!(command.id().parse::<CommandId>(), Ok(command));
            assert!(command.id().starts_with("contextual-help:"));
        }
        assert_eq!(
            "contextual-help:explode".parse::<CommandId>(),
            Err(UnknownCommand("contextual-help:explode".into()))
        );
    }

    #[test]
    fn test_predicates_without_panel() {
        let (_shell, manager) = manager();
        assert!(manager.is_enabled(CommandId::Open));
        assert!(!manager.is_enabled(CommandId::Close));
        assert!(!manager.is_enabled(CommandId::Trigger));
        assert!(!manager.is_toggled(CommandId::Toggle));
        assert!(!manager.is_toggled(CommandId::ToggleStandby));
    }

    #[test]
    fn test_open_disabled_while_visible_and_enabled_when_detached() {
        let (shell, manager) = manager();
        manager.execute(Action::Open {
            text: None,
            refresh: false,
        });

        assert!(!manager.is_enabled(CommandId::Open));
        assert!(manager.is_enabled(CommandId::Close));
        assert!(manager.is_toggled(CommandId::Toggle));

        shell.detach(crate::manager::PANEL_ID);
        assert!(manager.is_enabled(CommandId::Open));

        manager.execute(Action::Close);
        assert!(manager.is_enabled(CommandId::Open));
        assert!(!manager.is_open());
    }

    #[test]
    fn test_toggle_action_flips_open_state() {
        let (_shell, manager) = manager();
        manager.execute(Action::Toggle { text: None });
        assert!(manager.is_open());
        manager.execute(Action::Toggle { text: None });
        assert!(!manager.is_open());
    }

    #[test]
    fn test_action_maps_to_command() {
        assert_eq!(Action::Trigger.command(), CommandId::Trigger);
        assert_eq!(
            Action::Open {
                text: Some("x".into()),
                refresh: true
            }
            .command(),
            CommandId::Open
        );
        assert_eq!(CommandId::ToggleStandby.to_string(), "contextual-help:toggleStandby");
    }
}
