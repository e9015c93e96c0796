use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

use crate::session::{Intent, Keystroke, State};

/// What a key press means for the current screen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Engine(Intent),
    CursorUp,
    CursorDown,
    /// pick the highlighted row of a selection list
    Choose,
    Quit,
    Nothing,
}

fn keystroke(key: &KeyEvent) -> Option<Keystroke> {
    let chord = key
        .modifiers
        .intersects(KeyModifiers::CONTROL | KeyModifiers::ALT);
    match key.code {
        KeyCode::Char(_) if chord => None,
        KeyCode::Char(c) => Some(Keystroke::Char(c)),
        KeyCode::Backspace => Some(Keystroke::Backspace),
        KeyCode::Enter => Some(Keystroke::Submit),
        KeyCode::Esc => Some(Keystroke::Escape),
        _ => None,
    }
}

pub fn map_key(state: State, key: KeyEvent) -> Command {
    if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
        return Command::Quit;
    }

    match state {
        State::Typing | State::CreateUser => keystroke(&key)
            .map(|k| Command::Engine(Intent::Key(k)))
            .unwrap_or(Command::Nothing),
        State::Menu => match key.code {
            KeyCode::Char('s') | KeyCode::Enter => Command::Engine(Intent::StartSession),
            KeyCode::Char('p') => Command::Engine(Intent::OpenParagraphSelect),
            KeyCode::Char('u') => Command::Engine(Intent::OpenUserSelect),
            KeyCode::Char('q') | KeyCode::Esc => Command::Quit,
            _ => Command::Nothing,
        },
        State::ParagraphSelect | State::UserSelect => match key.code {
            KeyCode::Up | KeyCode::Char('k') => Command::CursorUp,
            KeyCode::Down | KeyCode::Char('j') => Command::CursorDown,
            KeyCode::Enter => Command::Choose,
            KeyCode::Char('n') if state == State::UserSelect => {
                Command::Engine(Intent::OpenCreateUser)
            }
            KeyCode::Esc | KeyCode::Char('b') => Command::Engine(Intent::Back),
            _ => Command::Nothing,
        },
        State::Countdown => Command::Nothing,
        State::Results => match key.code {
            KeyCode::Char('r') => Command::Engine(Intent::Restart),
            KeyCode::Enter | KeyCode::Esc | KeyCode::Char('b') => Command::Engine(Intent::Back),
            KeyCode::Char('q') => Command::Quit,
            _ => Command::Nothing,
        },
    }
}
