use super::types::{InputEvent, Key, KeyState};

/// Typed request produced from window input.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum Command {
    RequestClose,
    RequestSnapshot,
}

impl Command {
    /// Escape and the close button close; a fresh `S` press exports a snapshot.
    pub fn from_event(event: &InputEvent) -> Option<Command> {
        match event {
            InputEvent::CloseRequested => Some(Command::RequestClose),
            InputEvent::Key {
                key,
                state: KeyState::Pressed,
                repeat: false,
            } => match key {
                Key::Escape => Some(Command::RequestClose),
                Key::S => Some(Command::RequestSnapshot),
                Key::Unknown(_) => None,
            },
            InputEvent::Key { .. } => None,
        }
    }
}

/// Commands gathered from one frame's events. Repeated requests collapse to
/// one.
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq)]
pub struct FrameCommands {
    pub close: bool,
    pub snapshot: bool,
}

impl FrameCommands {
    pub fn from_events<'a>(events: impl IntoIterator<Item = &'a InputEvent>) -> Self {
        let mut out = FrameCommands::default();
        for command in events.into_iter().filter_map(Command::from_event) {
            out.push(command);
        }
        out
    }

    pub fn push(&mut self, command: Command) {
        match command {
            Command::RequestClose => self.close = true,
            Command::RequestSnapshot => self.snapshot = true,
        }
    }

    pub fn is_empty(&self) -> bool {
        !self.close && !self.snapshot
    }
}
