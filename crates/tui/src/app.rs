use std::{cmp, collections::HashMap, fs, io, ops::Range, thread, time::Duration};

use anyhow::{anyhow, Context, Result};
use cardvault_core::{
    deck::DeckSummary,
    export::Backup,
    lookup,
    query::{CollectionFilter, CollectionStats, SortOrder},
    CardRecord, Deck, DeckRules, DeckSection, IncomingCard, SharedStore, StorageManager,
};
use chrono::{Local, TimeZone, Utc};
use crossterm::{
    event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, List, ListItem, ListState, Paragraph, Wrap},
    Frame, Terminal,
};
use tokio::sync::mpsc;
use tracing::{debug, error, info};

use crate::persist::PersistEvent;

const TICK_RATE: Duration = Duration::from_millis(250);
const MAX_PROMPT_LEN: usize = 256;
const EMPTY_COLLECTION_HINT: &str =
    "No cards. Press s to add one from a lookup file or i to import.";
const KEY_HINTS: &str =
    "Tab screens  / filter  o sort  +/- qty  s scan  w artwork  b backup  c csv  i import  q quit";

#[derive(Debug, Clone)]
struct Theme {
    primary_fg: Color,
    accent: Color,
    muted: Color,
    selection_bg: Color,
    success: Color,
    warning: Color,
    danger: Color,
}

impl Default for Theme {
    fn default() -> Self {
        Self {
            primary_fg: Color::White,
            accent: Color::Cyan,
            muted: Color::DarkGray,
            selection_bg: Color::DarkGray,
            success: Color::Green,
            warning: Color::Yellow,
            danger: Color::Red,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Browse,
    Filter,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Screen {
    Collection,
    Decks,
    Editor,
}

impl Screen {
    const ALL: [Screen; 3] = [Screen::Collection, Screen::Decks, Screen::Editor];

    fn title(&self) -> &'static str {
        match self {
            Screen::Collection => "Collection",
            Screen::Decks => "Decks",
            Screen::Editor => "Deck Editor",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PromptKind {
    Scan,
    Artwork,
    Import,
    Rename,
}

impl PromptKind {
    fn title(&self) -> &'static str {
        match self {
            PromptKind::Scan => "Add From Lookup",
            PromptKind::Artwork => "Change Artwork",
            PromptKind::Import => "Import",
            PromptKind::Rename => "Rename Deck",
        }
    }

    fn instruction(&self) -> &'static str {
        match self {
            PromptKind::Scan => "<lookup.json> [SET-CODE] [quantity]",
            PromptKind::Artwork => "<lookup.json> [artwork id]; leave the id out to list them",
            PromptKind::Import => "Backup or legacy collection file",
            PromptKind::Rename => "Deck name",
        }
    }
}

/// Single-line text input. `cursor` counts characters.
#[derive(Debug, Clone)]
struct Prompt {
    kind: PromptKind,
    input: String,
    cursor: usize,
}

impl Prompt {
    fn new(kind: PromptKind, initial: String) -> Self {
        let cursor = initial.chars().count();
        Self {
            kind,
            input: initial,
            cursor,
        }
    }

    fn len(&self) -> usize {
        self.input.chars().count()
    }

    fn byte_index(&self) -> usize {
        self.input
            .char_indices()
            .nth(self.cursor)
            .map(|(index, _)| index)
            .unwrap_or(self.input.len())
    }

    fn move_cursor(&mut self, delta: isize) {
        self.cursor = self.cursor.saturating_add_signed(delta).min(self.len());
    }

    fn move_home(&mut self) {
        self.cursor = 0;
    }

    fn move_end(&mut self) {
        self.cursor = self.len();
    }

    fn insert(&mut self, ch: char) {
        if self.len() >= MAX_PROMPT_LEN || ch.is_control() {
            return;
        }
        let index = self.byte_index();
        self.input.insert(index, ch);
        self.cursor += 1;
    }

    fn backspace(&mut self) {
        if self.cursor > 0 {
            self.cursor -= 1;
            let index = self.byte_index();
            self.input.remove(index);
        }
    }

    fn delete(&mut self) {
        if self.cursor < self.len() {
            let index = self.byte_index();
            self.input.remove(index);
        }
    }

    fn value(&self) -> String {
        self.input.trim().to_string()
    }
}

/// Cursor and scroll offset of a list view.
#[derive(Debug, Clone, Copy, Default)]
struct ListCursor {
    cursor: usize,
    offset: usize,
    height: usize,
}

impl ListCursor {
    fn move_by(&mut self, delta: isize, len: usize) {
        if len == 0 {
            return;
        }
        self.cursor = self.cursor.saturating_add_signed(delta).min(len - 1);
        self.ensure_visible(len);
    }

    fn move_to(&mut self, index: usize, len: usize) {
        if len == 0 {
            return;
        }
        self.cursor = index.min(len - 1);
        self.ensure_visible(len);
    }

    fn page(&mut self, down: bool, len: usize) {
        let delta = self.height.max(1).min(len.max(1)) as isize;
        self.move_by(if down { delta } else { -delta }, len);
    }

    fn clamp(&mut self, len: usize) {
        if len == 0 {
            self.cursor = 0;
            self.offset = 0;
        } else if self.cursor >= len {
            self.cursor = len - 1;
        }
        self.ensure_visible(len);
    }

    fn ensure_visible(&mut self, len: usize) {
        if len == 0 || self.height == 0 {
            self.offset = 0;
            return;
        }
        if self.cursor < self.offset {
            self.offset = self.cursor;
        } else if self.cursor >= self.offset + self.height {
            self.offset = self.cursor + 1 - self.height;
        }
        self.offset = self.offset.min(len.saturating_sub(self.height));
    }

    fn window(&self, len: usize) -> Range<usize> {
        let start = self.offset.min(len);
        start..(start + self.height).min(len)
    }

    fn list_state(&self, len: usize) -> ListState {
        let mut state = ListState::default();
        if len > 0 {
            state.select(Some(self.cursor.saturating_sub(self.offset)));
        }
        state
    }
}

/// Data copied out of the store after every change.
#[derive(Debug, Default)]
struct View {
    rows: Vec<CardRecord>,
    availability: HashMap<String, u32>,
    allocated: HashMap<String, u32>,
    stats: CollectionStats,
    decks: Vec<DeckSummary>,
    draft: Option<Deck>,
    dirty: bool,
    rules: DeckRules,
    warnings: Vec<String>,
    names: HashMap<String, String>,
}

enum AppEvent {
    Input(Event),
    Tick,
}

/// Terminal frontend over the collection store.
pub struct CardVaultApp {
    store: SharedStore,
    storage: StorageManager,
    sort: SortOrder,
    screen: Screen,
    mode: Mode,
    filter: String,
    status: String,
    last_write: Option<String>,
    should_quit: bool,
    prompt: Option<Prompt>,
    collection_list: ListCursor,
    deck_list: ListCursor,
    editor_list: ListCursor,
    editor_section: DeckSection,
    view: View,
    persist_rx: Option<mpsc::Receiver<PersistEvent>>,
    theme: Theme,
}

impl CardVaultApp {
    pub fn new(store: SharedStore, storage: StorageManager, sort: SortOrder) -> Self {
        let mut app = Self {
            store,
            storage,
            sort,
            screen: Screen::Collection,
            mode: Mode::Browse,
            filter: String::new(),
            status: "Ready".to_string(),
            last_write: None,
            should_quit: false,
            prompt: None,
            collection_list: ListCursor::default(),
            deck_list: ListCursor::default(),
            editor_list: ListCursor::default(),
            editor_section: DeckSection::Main,
            view: View::default(),
            persist_rx: None,
            theme: Theme::default(),
        };
        app.refresh();
        app
    }

    pub fn attach_persistence(&mut self, receiver: mpsc::Receiver<PersistEvent>) {
        self.persist_rx = Some(receiver);
    }

    pub async fn run(&mut self) -> Result<()> {
        self.set_status(format!(
            "Loaded {} prints and {} decks",
            self.view.stats.prints,
            self.view.decks.len()
        ));

        let mut stdout = io::stdout();
        enable_raw_mode().context("failed to enter raw mode")?;
        execute!(stdout, EnterAlternateScreen).context("failed to enter alternate screen")?;
        let backend = CrosstermBackend::new(stdout);
        let mut terminal = Terminal::new(backend).context("failed to create terminal")?;
        terminal.hide_cursor()?;
        terminal.clear()?;

        let (event_tx, mut event_rx) = mpsc::channel::<AppEvent>(128);
        spawn_input_thread(event_tx);

        let mut persist_rx = self.persist_rx.take();

        loop {
            terminal.draw(|frame| self.draw(frame))?;
            if self.should_quit {
                break;
            }

            if let Some(rx) = persist_rx.as_mut() {
                let mut persist_closed = false;
                tokio::select! {
                    maybe_event = event_rx.recv() => {
                        if !self.process_app_event(maybe_event) {
                            break;
                        }
                    }
                    maybe_persist = rx.recv() => {
                        match maybe_persist {
                            Some(event) => self.handle_persist_event(event),
                            None => persist_closed = true,
                        }
                    }
                }
                if persist_closed {
                    persist_rx = None;
                }
            } else {
                let maybe_event = event_rx.recv().await;
                if !self.process_app_event(maybe_event) {
                    break;
                }
            }
        }

        restore_terminal(&mut terminal)?;
        Ok(())
    }

    fn refresh(&mut self) {
        let store = self.store.read();
        let filter = CollectionFilter::parse(&self.filter);
        self.view.rows = store
            .visible(&filter, self.sort)
            .into_iter()
            .cloned()
            .collect();
        self.view.availability = store.availability();
        self.view.allocated = store
            .allocations()
            .into_iter()
            .map(|allocation| (allocation.card_id, allocation.allocated))
            .collect();
        self.view.stats = store.stats();
        self.view.decks = store.deck_summaries();
        let rules = *store.editor().rules();
        self.view.rules = rules;
        self.view.draft = store.editor().draft().cloned();
        self.view.dirty = store.editor().is_dirty();
        self.view.warnings = store
            .editor()
            .draft()
            .map(|draft| {
                rules
                    .validate(draft, store.cards())
                    .iter()
                    .map(ToString::to_string)
                    .collect()
            })
            .unwrap_or_default();
        self.view.names = store
            .cards()
            .iter()
            .map(|card| (card.id.clone(), card.name.clone()))
            .collect();
        drop(store);

        if self.view.draft.is_none() && self.screen == Screen::Editor {
            self.screen = Screen::Decks;
        }
        self.collection_list.clamp(self.view.rows.len());
        self.deck_list.clamp(self.view.decks.len());
        let section_len = self.section_slots().len();
        self.editor_list.clamp(section_len);
    }

    fn set_status(&mut self, message: String) {
        self.status = message;
    }

    fn handle_persist_event(&mut self, event: PersistEvent) {
        match event {
            PersistEvent::Saved { path, cards } => {
                debug!(path = %path.display(), cards, "collection saved");
                self.last_write = Some(format!(
                    "Saved {cards} prints at {}",
                    Local::now().format("%H:%M:%S")
                ));
            }
            PersistEvent::Failed(message) => {
                self.last_write = Some("Last save failed".to_string());
                self.set_status(format!("Save failed: {message}"));
            }
        }
    }

    fn process_app_event(&mut self, maybe_event: Option<AppEvent>) -> bool {
        match maybe_event {
            Some(AppEvent::Input(Event::Key(key))) => {
                if key.kind == KeyEventKind::Press {
                    if let Err(err) = self.handle_key(key) {
                        error!(?err, "command failed");
                        self.set_status(format!("Error: {err:#}"));
                    }
                }
                true
            }
            Some(AppEvent::Input(_)) | Some(AppEvent::Tick) => true,
            None => false,
        }
    }

    fn handle_key(&mut self, key: KeyEvent) -> Result<()> {
        if self.prompt.is_some() {
            return self.handle_prompt_key(key);
        }
        if self.mode == Mode::Filter {
            self.handle_filter_key(key);
            return Ok(());
        }
        if self.handle_global_key(&key)? {
            return Ok(());
        }
        match self.screen {
            Screen::Collection => self.handle_collection_key(key),
            Screen::Decks => self.handle_decks_key(key),
            Screen::Editor => self.handle_editor_key(key),
        }
    }

    fn handle_global_key(&mut self, key: &KeyEvent) -> Result<bool> {
        if key.modifiers == KeyModifiers::CONTROL {
            if let KeyCode::Char('c') = key.code {
                self.should_quit = true;
                return Ok(true);
            }
            return Ok(false);
        }
        match key.code {
            KeyCode::Char('q') => {
                if self.view.dirty {
                    info!("quitting with unsaved deck edits");
                }
                self.should_quit = true;
            }
            KeyCode::Tab => self.cycle_screen(1),
            KeyCode::BackTab => self.cycle_screen(-1),
            KeyCode::Char('b') => self.export_backup()?,
            KeyCode::Char('c') => self.export_csv()?,
            KeyCode::Char('i') => self.open_prompt(PromptKind::Import, String::new()),
            _ => return Ok(false),
        }
        Ok(true)
    }

    fn cycle_screen(&mut self, delta: isize) {
        let screens: Vec<Screen> = Screen::ALL
            .into_iter()
            .filter(|screen| *screen != Screen::Editor || self.view.draft.is_some())
            .collect();
        let current = screens
            .iter()
            .position(|screen| *screen == self.screen)
            .unwrap_or(0);
        let next = (current as isize + delta).rem_euclid(screens.len() as isize) as usize;
        self.screen = screens[next];
    }

    fn open_prompt(&mut self, kind: PromptKind, initial: String) {
        self.prompt = Some(Prompt::new(kind, initial));
    }

    fn handle_filter_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Esc => {
                self.mode = Mode::Browse;
                self.filter.clear();
                self.refresh();
                self.set_status("Filter cleared".to_string());
            }
            KeyCode::Enter => {
                self.mode = Mode::Browse;
                self.set_status(format!(
                    "Filter applied: {} ({} prints)",
                    self.filter,
                    self.view.rows.len()
                ));
            }
            KeyCode::Backspace => {
                self.filter.pop();
                self.collection_list.move_to(0, self.view.rows.len());
                self.refresh();
            }
            KeyCode::Char(c) => {
                if key.modifiers.is_empty() || key.modifiers == KeyModifiers::SHIFT {
                    self.filter.push(c);
                    self.collection_list.move_to(0, self.view.rows.len());
                    self.refresh();
                }
            }
            _ => {}
        }
    }

    fn handle_collection_key(&mut self, key: KeyEvent) -> Result<()> {
        let len = self.view.rows.len();
        match key.code {
            KeyCode::Char('j') | KeyCode::Down => self.collection_list.move_by(1, len),
            KeyCode::Char('k') | KeyCode::Up => self.collection_list.move_by(-1, len),
            KeyCode::Char('g') | KeyCode::Home => self.collection_list.move_to(0, len),
            KeyCode::Char('G') | KeyCode::End => self.collection_list.move_to(usize::MAX, len),
            KeyCode::PageDown => self.collection_list.page(true, len),
            KeyCode::PageUp => self.collection_list.page(false, len),
            KeyCode::Char('/') => {
                self.mode = Mode::Filter;
                self.set_status(
                    "Filter words, or type: attr: tag: level: rarity: before:".to_string(),
                );
            }
            KeyCode::Char('o') => {
                self.sort = self.sort.next();
                self.refresh();
                self.set_status(format!("Sorted by {}", self.sort));
            }
            KeyCode::Char('+') | KeyCode::Char('=') => self.adjust_quantity(true)?,
            KeyCode::Char('-') => self.adjust_quantity(false)?,
            KeyCode::Char('s') => self.open_prompt(PromptKind::Scan, String::new()),
            KeyCode::Char('w') => {
                if self.current_card().is_some() {
                    self.open_prompt(PromptKind::Artwork, String::new());
                }
            }
            KeyCode::Char('a') => self.add_to_draft(false),
            KeyCode::Char('A') => self.add_to_draft(true),
            _ => {}
        }
        Ok(())
    }

    fn handle_decks_key(&mut self, key: KeyEvent) -> Result<()> {
        let len = self.view.decks.len();
        match key.code {
            KeyCode::Char('j') | KeyCode::Down => self.deck_list.move_by(1, len),
            KeyCode::Char('k') | KeyCode::Up => self.deck_list.move_by(-1, len),
            KeyCode::Char('n') => {
                let result = self.store.write().create_deck();
                match result {
                    Ok(deck) => {
                        self.editor_section = DeckSection::Main;
                        self.refresh();
                        self.screen = Screen::Editor;
                        self.set_status(format!("Started {}", deck.name));
                    }
                    Err(err) => self.set_status(err.to_string()),
                }
            }
            KeyCode::Char('e') | KeyCode::Enter => {
                let Some(summary) = self.view.decks.get(self.deck_list.cursor) else {
                    return Ok(());
                };
                let (id, name) = (summary.id.clone(), summary.name.clone());
                let result = self.store.write().edit_deck(&id);
                match result {
                    Ok(()) => {
                        self.editor_section = DeckSection::Main;
                        self.refresh();
                        self.screen = Screen::Editor;
                        self.set_status(format!("Editing {name}"));
                    }
                    Err(err) => self.set_status(err.to_string()),
                }
            }
            KeyCode::Char('D') => {
                let Some(summary) = self.view.decks.get(self.deck_list.cursor) else {
                    return Ok(());
                };
                let (id, name) = (summary.id.clone(), summary.name.clone());
                let outcome = self.store.write().delete_deck(&id)?;
                match outcome {
                    Ok(()) => self.set_status(format!("Deleted {name}")),
                    Err(err) => self.set_status(err.to_string()),
                }
                self.refresh();
            }
            _ => {}
        }
        Ok(())
    }

    fn handle_editor_key(&mut self, key: KeyEvent) -> Result<()> {
        let len = self.section_slots().len();
        match key.code {
            KeyCode::Char('j') | KeyCode::Down => self.editor_list.move_by(1, len),
            KeyCode::Char('k') | KeyCode::Up => self.editor_list.move_by(-1, len),
            KeyCode::Char('l') | KeyCode::Char(']') | KeyCode::Right => self.cycle_section(1),
            KeyCode::Char('h') | KeyCode::Char('[') | KeyCode::Left => self.cycle_section(-1),
            KeyCode::Char('a') => {
                self.screen = Screen::Collection;
                self.set_status("Pick cards with a (home section) or A (side)".to_string());
            }
            KeyCode::Char('x') | KeyCode::Delete => {
                let cursor = self.editor_list.cursor;
                let Some(card_id) = self.section_slots().get(cursor).cloned() else {
                    return Ok(());
                };
                let result = self.store.write().editor_remove(&card_id, self.editor_section);
                match result {
                    Ok(()) => self.set_status(format!("Removed {}", self.card_name(&card_id))),
                    Err(err) => self.set_status(err.to_string()),
                }
                self.refresh();
            }
            KeyCode::Char('r') => {
                let name = self
                    .view
                    .draft
                    .as_ref()
                    .map(|draft| draft.name.clone())
                    .unwrap_or_default();
                self.open_prompt(PromptKind::Rename, name);
            }
            KeyCode::Enter => {
                let outcome = self.store.write().save_deck()?;
                match outcome {
                    Ok(deck) => {
                        info!(deck = %deck.id, cards = deck.total_cards(), "deck saved");
                        self.set_status(format!("Saved {}", deck.name));
                        self.screen = Screen::Decks;
                    }
                    Err(err) => self.set_status(err.to_string()),
                }
                self.refresh();
            }
            KeyCode::Esc => {
                let result = self.store.write().cancel_edit();
                match result {
                    Ok(deck) => self.set_status(format!("Discarded changes to {}", deck.name)),
                    Err(err) => self.set_status(err.to_string()),
                }
                self.refresh();
                self.screen = Screen::Decks;
            }
            _ => {}
        }
        Ok(())
    }

    fn handle_prompt_key(&mut self, key: KeyEvent) -> Result<()> {
        let mut submit: Option<(PromptKind, String)> = None;
        let mut cancel = false;
        if let Some(prompt) = self.prompt.as_mut() {
            match key.code {
                KeyCode::Esc => cancel = true,
                KeyCode::Enter => submit = Some((prompt.kind, prompt.value())),
                KeyCode::Left => prompt.move_cursor(-1),
                KeyCode::Right => prompt.move_cursor(1),
                KeyCode::Home => prompt.move_home(),
                KeyCode::End => prompt.move_end(),
                KeyCode::Backspace => prompt.backspace(),
                KeyCode::Delete => prompt.delete(),
                KeyCode::Char(ch) => {
                    if key.modifiers.is_empty() || key.modifiers == KeyModifiers::SHIFT {
                        prompt.insert(ch);
                    }
                }
                _ => {}
            }
        }

        if cancel {
            self.prompt = None;
            self.set_status("Cancelled".to_string());
            return Ok(());
        }

        let Some((kind, value)) = submit else {
            return Ok(());
        };
        self.prompt = None;
        match kind {
            PromptKind::Scan => {
                let message = self.add_from_lookup(&value)?;
                self.set_status(message);
            }
            PromptKind::Artwork => {
                let message = self.change_artwork_from_lookup(&value)?;
                self.set_status(message);
            }
            PromptKind::Import => {
                if value.is_empty() {
                    return Ok(());
                }
                let state = self.storage.import_file(&value)?;
                let (cards, decks) = (state.cards.len(), state.decks.len());
                self.store.write().replace_state(state)?;
                self.set_status(format!("Imported {cards} prints and {decks} decks"));
            }
            PromptKind::Rename => {
                let result = self.store.write().editor_rename(&value);
                if let Err(err) = result {
                    self.set_status(err.to_string());
                }
            }
        }
        self.refresh();
        Ok(())
    }

    fn current_card(&self) -> Option<&CardRecord> {
        self.view.rows.get(self.collection_list.cursor)
    }

    fn card_name(&self, card_id: &str) -> String {
        self.view
            .names
            .get(card_id)
            .cloned()
            .unwrap_or_else(|| card_id.to_string())
    }

    fn section_slots(&self) -> &[String] {
        self.view
            .draft
            .as_ref()
            .map(|draft| draft.section(self.editor_section))
            .unwrap_or(&[])
    }

    fn cycle_section(&mut self, delta: isize) {
        let current = DeckSection::ALL
            .iter()
            .position(|section| *section == self.editor_section)
            .unwrap_or(0);
        let next = (current as isize + delta).rem_euclid(DeckSection::ALL.len() as isize) as usize;
        self.editor_section = DeckSection::ALL[next];
        self.editor_list = ListCursor {
            height: self.editor_list.height,
            ..ListCursor::default()
        };
    }

    fn adjust_quantity(&mut self, increase: bool) -> Result<()> {
        let Some(card) = self.current_card() else {
            return Ok(());
        };
        let (id, name) = (card.id.clone(), card.name.clone());
        let quantity = if increase {
            card.quantity.saturating_add(1)
        } else {
            card.quantity.saturating_sub(1)
        };
        let outcome = self.store.write().set_quantity(&id, quantity)?;
        match outcome {
            Ok(()) if quantity == 0 => {
                self.set_status(format!("Removed {name} from the collection"))
            }
            Ok(()) => self.set_status(format!("{name}: {quantity} owned")),
            Err(err) => self.set_status(err.to_string()),
        }
        self.refresh();
        Ok(())
    }

    fn add_to_draft(&mut self, side: bool) {
        if self.view.draft.is_none() {
            self.set_status("Open a deck first (Tab to Decks, n or e)".to_string());
            return;
        }
        let Some(card) = self.current_card() else {
            return;
        };
        let (id, name) = (card.id.clone(), card.name.clone());
        let result = {
            let mut store = self.store.write();
            if side {
                store.editor_add_to_side(&id).map(|_| DeckSection::Side)
            } else {
                store.editor_add(&id)
            }
        };
        match result {
            Ok(section) => self.set_status(format!("Added {name} to the {section}")),
            Err(err) => self.set_status(err.to_string()),
        }
        self.refresh();
    }

    fn add_from_lookup(&mut self, input: &str) -> Result<String> {
        let request = ScanRequest::parse(input)?;
        let body = fs::read_to_string(&request.path)
            .with_context(|| format!("failed to read {}", request.path))?;
        let cards = lookup::parse_response(&body)?
            .map_err(|message| anyhow!("lookup failed: {message}"))?;
        let (primary, variants) = cards
            .split_first()
            .ok_or_else(|| anyhow!("lookup returned no cards"))?;
        let resolved = lookup::resolve_lookup(primary, None, request.collection_code.as_deref())?
            .with_variants(variants);

        let mut store = self.store.write();
        let artwork = lookup::default_artwork(
            &resolved.artworks,
            store.artwork_prefs(),
            &resolved.draft.collection_code,
        )
        .cloned()
        .ok_or_else(|| anyhow!("{} has no artwork", resolved.draft.name))?;
        let incoming = IncomingCard::from_resolved(&resolved, &artwork, request.quantity);
        let name = incoming.name.clone();
        let id = store.add_card(incoming)?;
        drop(store);

        info!(card = %id, quantity = request.quantity, "added from lookup");
        let note = if resolved.print_was_found {
            String::new()
        } else {
            " (print not listed)".to_string()
        };
        Ok(format!("Added {}x {name} as {id}{note}", request.quantity))
    }

    fn change_artwork_from_lookup(&mut self, input: &str) -> Result<String> {
        let Some(card) = self.current_card() else {
            return Ok("Select a card first".to_string());
        };
        let (card_id, name, collection_code) =
            (card.id.clone(), card.name.clone(), card.collection_code.clone());
        let request = ArtworkRequest::parse(input)?;
        let body = fs::read_to_string(&request.path)
            .with_context(|| format!("failed to read {}", request.path))?;
        let cards = lookup::parse_response(&body)?
            .map_err(|message| anyhow!("lookup failed: {message}"))?;
        let (primary, variants) = cards
            .split_first()
            .ok_or_else(|| anyhow!("lookup returned no cards"))?;
        if primary.name != name {
            return Err(anyhow!("lookup is for {}, not {name}", primary.name));
        }
        let resolved = lookup::resolve_lookup(primary, None, Some(collection_code.as_str()))?
            .with_variants(variants);

        let Some(artwork_id) = request.artwork_id else {
            let ids: Vec<String> = resolved
                .artworks
                .iter()
                .map(|artwork| artwork.id.to_string())
                .collect();
            return Ok(format!("Artworks for {name}: {}", ids.join(", ")));
        };
        let artwork = resolved
            .artworks
            .iter()
            .find(|artwork| artwork.id == artwork_id)
            .ok_or_else(|| anyhow!("{name} has no artwork {artwork_id}"))?;

        let new_id = self.store.write().change_artwork(&card_id, artwork)?;
        if new_id == card_id {
            return Ok(format!("{name} already uses artwork {artwork_id}"));
        }
        info!(from = %card_id, to = %new_id, "changed artwork from lookup");
        Ok(format!("{name} now uses artwork {artwork_id} ({new_id})"))
    }

    fn export_backup(&mut self) -> Result<()> {
        let backup = {
            let store = self.store.read();
            Backup::new(store.cards(), store.decks(), store.artwork_prefs(), Utc::now())
        };
        let entry = self.storage.export_backup(&backup)?;
        let total = self.storage.backups().map(|entries| entries.len()).unwrap_or(0);
        self.set_status(format!(
            "Backup written to {} ({total} on disk)",
            entry.path.display()
        ));
        Ok(())
    }

    fn export_csv(&mut self) -> Result<()> {
        let path = {
            let store = self.store.read();
            self.storage.export_csv(store.cards(), Utc::now())?
        };
        self.set_status(format!("CSV written to {}", path.display()));
        Ok(())
    }

    fn draw(&mut self, frame: &mut Frame) {
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(3),
                Constraint::Min(8),
                Constraint::Length(4),
            ])
            .split(frame.size());

        self.render_header(frame, chunks[0]);
        match self.screen {
            Screen::Collection => self.draw_collection(frame, chunks[1]),
            Screen::Decks => self.draw_decks(frame, chunks[1]),
            Screen::Editor => self.draw_editor(frame, chunks[1]),
        }
        self.render_status(frame, chunks[2]);
        if let Some(prompt) = &self.prompt {
            self.render_prompt(frame, prompt);
        }
    }

    fn render_header(&self, frame: &mut Frame, area: Rect) {
        let mut spans = Vec::new();
        for screen in Screen::ALL {
            if screen == Screen::Editor && self.view.draft.is_none() {
                continue;
            }
            let style = if screen == self.screen {
                Style::default()
                    .fg(self.theme.accent)
                    .add_modifier(Modifier::BOLD)
            } else {
                Style::default().fg(self.theme.muted)
            };
            spans.push(Span::styled(format!(" {} ", screen.title()), style));
        }
        let stats = self.view.stats;
        spans.push(Span::styled(
            format!(
                "  {} copies · {} cards · {} prints · {} decks",
                stats.total_copies,
                stats.unique_names,
                stats.prints,
                self.view.decks.len()
            ),
            Style::default().fg(self.theme.primary_fg),
        ));
        let paragraph = Paragraph::new(Line::from(spans))
            .block(Block::default().borders(Borders::ALL).title("cardvault"));
        frame.render_widget(paragraph, area);
    }

    fn draw_collection(&mut self, frame: &mut Frame, area: Rect) {
        let chunks = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(55), Constraint::Percentage(45)])
            .split(area);
        self.render_card_list(frame, chunks[0]);
        self.render_card_info(frame, chunks[1]);
    }

    fn render_card_list(&mut self, frame: &mut Frame, area: Rect) {
        let len = self.view.rows.len();
        self.collection_list.height = area.height.saturating_sub(2) as usize;
        self.collection_list.clamp(len);

        let window = self.collection_list.window(len);
        let items: Vec<ListItem> = self.view.rows[window.clone()]
            .iter()
            .enumerate()
            .map(|(idx, card)| {
                let is_selected = self.collection_list.cursor == window.start + idx;
                let free = self.view.availability.get(&card.id).copied().unwrap_or(0);
                let free_style = if free == 0 {
                    Style::default().fg(self.theme.warning)
                } else {
                    Style::default().fg(self.theme.success)
                };
                ListItem::new(Line::from(vec![
                    marker(is_selected, &self.theme),
                    Span::styled(
                        card.name.clone(),
                        Style::default()
                            .fg(self.theme.primary_fg)
                            .add_modifier(Modifier::BOLD),
                    ),
                    Span::styled(
                        format!(" · {} {}", card.collection_code, card.rarity),
                        Style::default().fg(self.theme.muted),
                    ),
                    Span::raw(format!("  x{}", card.quantity)),
                    Span::styled(format!(" ({free} free)"), free_style),
                ]))
            })
            .collect();

        let title = if self.filter.is_empty() {
            format!("Cards [{}]", self.sort)
        } else {
            format!("Cards [{}] /{}", self.sort, self.filter)
        };
        let list = List::new(items)
            .block(Block::default().borders(Borders::ALL).title(title))
            .highlight_style(Style::default().bg(self.theme.selection_bg));
        let mut state = self.collection_list.list_state(len);
        frame.render_stateful_widget(list, area, &mut state);
    }

    fn render_card_info(&self, frame: &mut Frame, area: Rect) {
        let block = Block::default().borders(Borders::ALL).title("Details");
        let Some(card) = self.current_card() else {
            let hint = Paragraph::new(EMPTY_COLLECTION_HINT)
                .block(block)
                .wrap(Wrap { trim: true });
            frame.render_widget(hint, area);
            return;
        };

        let label = Style::default().fg(self.theme.muted);
        let mut lines = vec![Line::from(Span::styled(
            card.name.clone(),
            Style::default()
                .fg(self.theme.accent)
                .add_modifier(Modifier::BOLD),
        ))];
        if let Some(name_pt) = &card.name_pt {
            lines.push(Line::from(name_pt.clone()));
        }
        lines.push(Line::from(vec![
            Span::styled("Type: ", label),
            Span::raw(card.display_type.clone()),
        ]));
        if !card.type_tags.is_empty() {
            lines.push(Line::from(vec![
                Span::styled("Tags: ", label),
                Span::raw(card.type_tags.join(", ")),
            ]));
        }
        if card.is_monster() {
            let stat =
                |value: Option<i32>| value.map(|v| v.to_string()).unwrap_or_else(|| "?".into());
            lines.push(Line::from(vec![
                Span::styled("Stats: ", label),
                Span::raw(format!(
                    "{} · Lv {} · ATK {} / DEF {}",
                    card.attribute.as_deref().unwrap_or("-"),
                    card.level.map(|l| l.to_string()).unwrap_or_else(|| "-".into()),
                    stat(card.atk),
                    stat(card.def)
                )),
            ]));
        }
        lines.push(Line::from(vec![
            Span::styled("Print: ", label),
            Span::raw(format!(
                "{} {} · {}",
                card.collection_code,
                card.collection_name.as_deref().unwrap_or(""),
                card.rarity
            )),
        ]));
        let free = self.view.availability.get(&card.id).copied().unwrap_or(0);
        let allocated = self.view.allocated.get(&card.id).copied().unwrap_or(0);
        let owned_style = if allocated > card.quantity {
            Style::default().fg(self.theme.danger)
        } else {
            Style::default()
        };
        lines.push(Line::from(vec![
            Span::styled("Owned: ", label),
            Span::styled(
                format!("{} · in saved decks {allocated} · free {free}", card.quantity),
                owned_style,
            ),
        ]));
        lines.push(Line::from(vec![
            Span::styled("Added: ", label),
            Span::raw(format_millis(card.date_added)),
        ]));
        lines.push(Line::from(Span::styled(card.id.clone(), label)));
        if let Some(description) = &card.description {
            lines.push(Line::from(""));
            lines.push(Line::from(description.clone()));
        }

        let paragraph = Paragraph::new(lines).block(block).wrap(Wrap { trim: true });
        frame.render_widget(paragraph, area);
    }

    fn draw_decks(&mut self, frame: &mut Frame, area: Rect) {
        let chunks = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
            .split(area);

        let len = self.view.decks.len();
        self.deck_list.height = chunks[0].height.saturating_sub(2) as usize;
        self.deck_list.clamp(len);
        let window = self.deck_list.window(len);
        let editing = self.view.draft.as_ref().map(|draft| draft.id.as_str());
        let items: Vec<ListItem> = self.view.decks[window.clone()]
            .iter()
            .enumerate()
            .map(|(idx, deck)| {
                let is_selected = self.deck_list.cursor == window.start + idx;
                let mut spans = vec![
                    marker(is_selected, &self.theme),
                    Span::styled(
                        deck.name.clone(),
                        Style::default()
                            .fg(self.theme.primary_fg)
                            .add_modifier(Modifier::BOLD),
                    ),
                    Span::styled(
                        format!(
                            " · {}/{}/{}",
                            deck.main_count, deck.extra_count, deck.side_count
                        ),
                        Style::default().fg(self.theme.muted),
                    ),
                ];
                if editing == Some(deck.id.as_str()) {
                    spans.push(Span::styled(" (editing)", Style::default().fg(self.theme.warning)));
                }
                ListItem::new(Line::from(spans))
            })
            .collect();
        let list = List::new(items)
            .block(Block::default().borders(Borders::ALL).title("Decks"))
            .highlight_style(Style::default().bg(self.theme.selection_bg));
        let mut state = self.deck_list.list_state(len);
        frame.render_stateful_widget(list, chunks[0], &mut state);

        let block = Block::default().borders(Borders::ALL).title("Preview");
        let lines = match self.view.decks.get(self.deck_list.cursor) {
            Some(deck) => {
                let mut lines = vec![
                    Line::from(format!(
                        "Main {} · Extra {} · Side {}",
                        deck.main_count, deck.extra_count, deck.side_count
                    )),
                    Line::from(format!("Updated {}", format_millis(deck.date_updated))),
                    Line::from(""),
                ];
                lines.extend(deck.preview.iter().map(|card| {
                    Line::from(format!("{} · {}", card.name, card.display_type))
                }));
                lines
            }
            None => vec![Line::from("No decks yet. Press n to start one.")],
        };
        frame.render_widget(
            Paragraph::new(lines).block(block).wrap(Wrap { trim: true }),
            chunks[1],
        );
    }

    fn draw_editor(&mut self, frame: &mut Frame, area: Rect) {
        let chunks = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(60), Constraint::Percentage(40)])
            .split(area);

        let len = self.section_slots().len();
        self.editor_list.height = chunks[0].height.saturating_sub(2) as usize;
        self.editor_list.clamp(len);
        let window = self.editor_list.window(len);
        let items: Vec<ListItem> = self.section_slots()[window.clone()]
            .iter()
            .enumerate()
            .map(|(idx, card_id)| {
                let is_selected = self.editor_list.cursor == window.start + idx;
                ListItem::new(Line::from(vec![
                    marker(is_selected, &self.theme),
                    Span::raw(self.card_name(card_id)),
                    Span::styled(format!(" · {card_id}"), Style::default().fg(self.theme.muted)),
                ]))
            })
            .collect();
        let limit = self.view.rules.limit(self.editor_section);
        let title = format!("{} ({len}/{limit})", self.editor_section);
        let list = List::new(items)
            .block(Block::default().borders(Borders::ALL).title(title))
            .highlight_style(Style::default().bg(self.theme.selection_bg));
        let mut state = self.editor_list.list_state(len);
        frame.render_stateful_widget(list, chunks[0], &mut state);

        let Some(draft) = &self.view.draft else {
            return;
        };
        let rules = self.view.rules;
        let mut lines = vec![
            Line::from(Span::styled(
                draft.name.clone(),
                Style::default()
                    .fg(self.theme.accent)
                    .add_modifier(Modifier::BOLD),
            )),
            Line::from(format!(
                "Main {}/{} (min {})",
                draft.main_deck.len(),
                rules.main_max,
                rules.main_min
            )),
            Line::from(format!("Extra {}/{}", draft.extra_deck.len(), rules.extra_max)),
            Line::from(format!("Side {}/{}", draft.side_deck.len(), rules.side_max)),
        ];
        if self.view.dirty {
            lines.push(Line::from(Span::styled(
                "Unsaved changes",
                Style::default().fg(self.theme.warning),
            )));
        }
        lines.push(Line::from(""));
        for warning in &self.view.warnings {
            lines.push(Line::from(Span::styled(
                warning.clone(),
                Style::default().fg(self.theme.danger),
            )));
        }
        lines.push(Line::from(""));
        lines.push(Line::from(Span::styled(
            "h/l section · x remove · r rename · a pick cards · Enter save · Esc discard",
            Style::default().fg(self.theme.muted),
        )));
        frame.render_widget(
            Paragraph::new(lines)
                .block(Block::default().borders(Borders::ALL).title("Deck"))
                .wrap(Wrap { trim: true }),
            chunks[1],
        );
    }

    fn render_status(&self, frame: &mut Frame, area: Rect) {
        let block = Block::default().borders(Borders::ALL).title("Status");
        let primary = if self.mode == Mode::Filter {
            format!("Filter: {}", self.filter)
        } else {
            self.status.clone()
        };
        let secondary = format!(
            "{}  ·  {KEY_HINTS}",
            self.last_write.as_deref().unwrap_or("No writes yet")
        );
        let paragraph = Paragraph::new(vec![
            Line::from(primary),
            Line::from(Span::styled(secondary, Style::default().fg(self.theme.muted))),
        ])
        .block(block)
        .wrap(Wrap { trim: true });
        frame.render_widget(paragraph, area);
    }

    fn render_prompt(&self, frame: &mut Frame, prompt: &Prompt) {
        let frame_area = frame.size();
        let mut width = cmp::min(72_u16, frame_area.width.saturating_sub(4));
        width = cmp::max(width, 24_u16);
        let height = 6_u16.min(frame_area.height.saturating_sub(2)).max(5_u16);
        let x = frame_area.x + (frame_area.width.saturating_sub(width)) / 2;
        let y = frame_area.y + (frame_area.height.saturating_sub(height)) / 2;
        let area = Rect::new(x, y, width, height);

        frame.render_widget(Clear, area);

        let input_line = Line::from(vec![
            Span::styled("> ", Style::default().fg(self.theme.accent)),
            Span::raw(prompt.input.clone()),
        ]);
        let helper = Line::from(vec![
            Span::styled("Enter", Style::default().add_modifier(Modifier::BOLD)),
            Span::raw(" confirm  "),
            Span::styled("Esc", Style::default().add_modifier(Modifier::BOLD)),
            Span::raw(" cancel"),
        ]);
        let paragraph = Paragraph::new(vec![
            Line::from(prompt.kind.instruction()),
            input_line,
            Line::from(""),
            helper,
        ])
        .block(Block::default().borders(Borders::ALL).title(prompt.kind.title()));
        frame.render_widget(paragraph, area);

        let cursor_x =
            (area.x + 3 + prompt.cursor as u16).min(area.x + area.width.saturating_sub(2));
        frame.set_cursor(cursor_x, area.y + 2);
    }
}

/// Arguments of the add-from-lookup prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
struct ScanRequest {
    path: String,
    collection_code: Option<String>,
    quantity: u32,
}

impl ScanRequest {
    fn parse(input: &str) -> Result<Self> {
        let mut parts = input.split_whitespace();
        let path = parts
            .next()
            .ok_or_else(|| anyhow!("expected <lookup.json> [SET-CODE] [quantity]"))?
            .to_string();
        let collection_code = parts.next().map(str::to_string);
        let quantity = match parts.next() {
            Some(raw) => raw
                .parse::<u32>()
                .with_context(|| format!("invalid quantity {raw}"))?,
            None => 1,
        };
        if quantity == 0 {
            return Err(anyhow!("quantity must be at least 1"));
        }
        Ok(Self {
            path,
            collection_code,
            quantity,
        })
    }
}

/// Arguments of the change-artwork prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
struct ArtworkRequest {
    path: String,
    artwork_id: Option<u64>,
}

impl ArtworkRequest {
    fn parse(input: &str) -> Result<Self> {
        let mut parts = input.split_whitespace();
        let path = parts
            .next()
            .ok_or_else(|| anyhow!("expected <lookup.json> [artwork id]"))?
            .to_string();
        let artwork_id = match parts.next() {
            Some(raw) => {
                let digits = lookup::validate_card_code(raw)?;
                Some(
                    digits
                        .parse::<u64>()
                        .with_context(|| format!("artwork id {raw} is out of range"))?,
                )
            }
            None => None,
        };
        if parts.next().is_some() {
            return Err(anyhow!("expected <lookup.json> [artwork id]"));
        }
        Ok(Self { path, artwork_id })
    }
}

fn marker(selected: bool, theme: &Theme) -> Span<'static> {
    if selected {
        Span::styled(
            "▶ ",
            Style::default()
                .fg(theme.accent)
                .add_modifier(Modifier::BOLD),
        )
    } else {
        Span::raw("  ")
    }
}

fn format_millis(millis: i64) -> String {
    Local
        .timestamp_millis_opt(millis)
        .single()
        .map(|at| at.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| "-".to_string())
}

fn restore_terminal(terminal: &mut Terminal<CrosstermBackend<io::Stdout>>) -> Result<()> {
    disable_raw_mode().context("failed to disable raw mode")?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)
        .context("failed to leave alternate screen")?;
    terminal.show_cursor()?;
    Ok(())
}

fn spawn_input_thread(sender: mpsc::Sender<AppEvent>) {
    thread::spawn(move || loop {
        match event::poll(TICK_RATE) {
            Ok(true) => match event::read() {
                Ok(evt) => {
                    if sender.blocking_send(AppEvent::Input(evt)).is_err() {
                        break;
                    }
                }
                Err(_) => break,
            },
            Ok(false) => {
                if sender.blocking_send(AppEvent::Tick).is_err() {
                    break;
                }
            }
            Err(_) => break,
        }
    });
}
