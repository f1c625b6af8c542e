use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use dcc_core::{Activation, Snapshot};
use ratatui::widgets::TableState;
use std::path::PathBuf;
use std::sync::Arc;

/// Requests the event loop forwards to the lifecycle controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewSignal {
    TogglePause,
}

pub struct App {
    pub state_dir: PathBuf,
    pub snapshot: Arc<Snapshot>,
    pub table_state: TableState,
    pub polling: bool,
    pub paused: bool,
    pub show_help: bool,
    pub status_note: Option<String>,
    pub should_quit: bool,
}

impl App {
    pub fn new(state_dir: PathBuf) -> Self {
        Self {
            state_dir,
            snapshot: Arc::new(Snapshot::empty()),
            table_state: TableState::default(),
            polling: false,
            paused: false,
            show_help: false,
            status_note: None,
            should_quit: false,
        }
    }

    pub fn apply_snapshot(&mut self, snapshot: Arc<Snapshot>) {
        self.snapshot = snapshot;
        let len = self.snapshot.len();
        match self.table_state.selected() {
            _ if len == 0 => self.table_state.select(None),
            Some(idx) if idx >= len => self.table_state.select(Some(len - 1)),
            None => self.table_state.select(Some(0)),
            Some(_) => {}
        }
    }

    pub fn apply_activation(&mut self, activation: Activation) {
        match activation {
            Activation::Started | Activation::AlreadyRunning => {
                self.polling = true;
                self.paused = false;
                self.status_note = None;
            }
            Activation::DirectoryMissing(path) => {
                self.polling = false;
                self.paused = false;
                self.status_note = Some(format!(
                    "distcc state directory not found: {}",
                    path.display()
                ));
            }
        }
    }

    pub fn mark_paused(&mut self) {
        self.polling = false;
        self.paused = true;
    }

    pub fn handle_key(&mut self, key: KeyEvent) -> Option<ViewSignal> {
        match key.code {
            KeyCode::Char('q') | KeyCode::Esc => self.should_quit = true,
            KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                self.should_quit = true
            }
            KeyCode::Char('j') | KeyCode::Down => self.move_selection(1),
            KeyCode::Char('k') | KeyCode::Up => self.move_selection(-1),
            KeyCode::Char('?') => self.show_help = !self.show_help,
            KeyCode::Char('p') => return Some(ViewSignal::TogglePause),
            _ => {}
        }
        None
    }

    fn move_selection(&mut self, step: i32) {
        let len = self.snapshot.len();
        if len == 0 {
            self.table_state.select(None);
            return;
        }
        let current = self.table_state.selected().unwrap_or(0) as i64;
        let next = (current + i64::from(step)).clamp(0, len as i64 - 1);
        self.table_state.select(Some(next as usize));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dcc_core::{Phase, StatusRecord};

    fn snapshot(hosts: &[&str]) -> Arc<Snapshot> {
        let mut snapshot = Snapshot::empty();
        snapshot.records = hosts
            .iter()
            .enumerate()
            .map(|(slot, host)| StatusRecord {
                source_path: PathBuf::from(format!("/s/{slot}")),
                size_bytes: 1,
                magic: 0,
                process_id: 1,
                filename: "a.c".to_string(),
                host: host.to_string(),
                slot: slot as i32,
                phase: Phase::Compile,
            })
            .collect();
        Arc::new(snapshot)
    }

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    #[test]
    fn selection_follows_snapshot_size() {
        let mut app = App::new(PathBuf::from("/s"));
        app.apply_snapshot(snapshot(&["a", "b", "c"]));
        assert_eq!(app.table_state.selected(), Some(0));

        app.handle_key(key(KeyCode::Down));
        app.handle_key(key(KeyCode::Char('j')));
        app.handle_key(key(KeyCode::Char('j')));
        assert_eq!(app.table_state.selected(), Some(2));

        app.apply_snapshot(snapshot(&["a"]));
        assert_eq!(app.table_state.selected(), Some(0));

        app.apply_snapshot(snapshot(&[]));
        assert_eq!(app.table_state.selected(), None);
        app.handle_key(key(KeyCode::Up));
        assert_eq!(app.table_state.selected(), None);
    }

    #[test]
    fn missing_directory_sets_note() {
        let mut app = App::new(PathBuf::from("/s"));
        app.apply_activation(Activation::DirectoryMissing(PathBuf::from("/s")));
        assert!(!app.polling);
        assert_eq!(
            app.status_note.as_deref(),
            Some("distcc state directory not found: /s")
        );

        app.apply_activation(Activation::Started);
        assert!(app.polling);
        assert!(app.status_note.is_none());
    }

    #[test]
    fn keys_map_to_signals() {
        let mut app = App::new(PathBuf::from("/s"));
        assert_eq!(
            app.handle_key(key(KeyCode::Char('p'))),
            Some(ViewSignal::TogglePause)
        );
        assert_eq!(app.handle_key(key(KeyCode::Char('?'))), None);
        assert!(app.show_help);
        assert!(!app.should_quit);
        app.handle_key(KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL));
        assert!(app.should_quit);
    }
}
