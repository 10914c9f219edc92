use crate::editor::InputEditor;
use crate::history::{History, HistoryError};
use crate::logging::Logger;
use crate::protocol::{ItemDto, Request, Response};

/// The two prompt modes: regular editing, and walking the accepted-input
/// history.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Insert,
    History,
}

/// Where the orchestrator pushes state changes. The presentation layer is
/// the one genuinely multi-consumer listener; everything else is direct
/// calls.
pub trait Presenter {
    fn filtered(&mut self, seq: u64, filtered: usize, total: usize, items: &[ItemDto]);
    fn completed(&mut self, candidate: &str);
    fn selected(&mut self, index: usize, value: &str);
    /// The orchestrator rewrote the input itself (history recall, undo,
    /// completion); the prompt must be refreshed.
    fn input_changed(&mut self, input: &str);
    fn mode_changed(&mut self, mode: Mode);
    /// An empty selection means the picker was dismissed.
    fn picked(&mut self, selection: &[ItemDto]);
}

/// Outgoing side of the worker channel, kept abstract so the orchestrator
/// never knows which transport is underneath.
pub trait RequestSink {
    fn send(&mut self, request: Request);
}

pub struct MenuOptions {
    pub delimiters: Vec<char>,
    pub big_delimiters: Vec<char>,
    pub completion_sep: Option<String>,
    pub accept_input: bool,
    pub initial_input: String,
}

impl Default for MenuOptions {
    fn default() -> Self {
        Self {
            delimiters: Vec::new(),
            big_delimiters: Vec::new(),
            completion_sep: None,
            accept_input: false,
            initial_input: String::new(),
        }
    }
}

/// Composes editor, history, cache-backed worker, and selection state.
/// Requests carry a monotonically increasing seq; a response is applied only
/// if it answers the newest request, so slow old filters can never clobber
/// fresh results.
pub struct Menu {
    editor: InputEditor,
    history: History,
    history_index: i64,
    history_input: String,
    mode: Mode,
    results: Vec<ItemDto>,
    index: usize,
    seq: u64,
    completion_sep: Option<String>,
    accept_input: bool,
    logger: Logger,
}

impl Menu {
    pub fn new(options: MenuOptions, history: History, logger: Logger) -> Self {
        let mut editor = InputEditor::new(&options.delimiters, &options.big_delimiters);
        editor.overwrite(&options.initial_input);

        Self {
            editor,
            history,
            history_index: -1,
            history_input: options.initial_input.clone(),
            mode: Mode::Insert,
            results: Vec::new(),
            index: 0,
            seq: 0,
            completion_sep: options.completion_sep,
            accept_input: options.accept_input,
            logger,
        }
    }

    pub fn input(&self) -> String {
        self.editor.text()
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn results(&self) -> &[ItemDto] {
        &self.results
    }

    pub fn editor_mut(&mut self) -> &mut InputEditor {
        &mut self.editor
    }

    /// Issues the initial filter for whatever input the menu starts with.
    pub fn prime(&mut self, sink: &mut dyn RequestSink, presenter: &mut dyn Presenter) {
        let input = self.editor.text();
        self.issue_filter(input, sink, presenter);
    }

    /// The presentation layer typed: replace the input and refilter.
    pub fn filter(
        &mut self,
        input: &str,
        sink: &mut dyn RequestSink,
        presenter: &mut dyn Presenter,
    ) {
        if self.editor.text() != input {
            self.editor.overwrite(input);
        }
        self.issue_filter(input.to_string(), sink, presenter);
    }

    /// Requests a completion candidate for the current input.
    pub fn complete(&mut self, sink: &mut dyn RequestSink) {
        self.seq += 1;
        let request = Request::Complete {
            seq: self.seq,
            input: self.editor.text(),
            sep: self.completion_sep.clone(),
        };
        sink.send(request);
    }

    pub fn erase_word(&mut self, sink: &mut dyn RequestSink, presenter: &mut dyn Presenter) {
        let input = self.editor.erase_word();
        self.issue_filter(input, sink, presenter);
    }

    pub fn erase_big_word(&mut self, sink: &mut dyn RequestSink, presenter: &mut dyn Presenter) {
        let input = self.editor.erase_big_word();
        self.issue_filter(input, sink, presenter);
    }

    pub fn erase_all(&mut self, sink: &mut dyn RequestSink, presenter: &mut dyn Presenter) {
        let input = self.editor.erase_all();
        self.issue_filter(input, sink, presenter);
    }

    pub fn alternate_pattern(&mut self, sink: &mut dyn RequestSink, presenter: &mut dyn Presenter) {
        let input = self.editor.alternate_pattern();
        self.issue_filter(input, sink, presenter);
    }

    pub fn undo(&mut self, sink: &mut dyn RequestSink, presenter: &mut dyn Presenter) {
        if let Some(input) = self.editor.undo() {
            presenter.input_changed(&input);
            self.issue_filter(input, sink, presenter);
        }
    }

    pub fn redo(&mut self, sink: &mut dyn RequestSink, presenter: &mut dyn Presenter) {
        if let Some(input) = self.editor.redo() {
            presenter.input_changed(&input);
            self.issue_filter(input, sink, presenter);
        }
    }

    /// Applies a worker response. Responses answering anything but the
    /// newest request are stale and dropped on the floor; that is the whole
    /// ordering contract. Returns whether the response was applied.
    pub fn apply_response(&mut self, response: Response, presenter: &mut dyn Presenter) -> bool {
        if response.seq() != self.seq {
            self.logger.info(&format!(
                "dropping stale response seq={} latest={}",
                response.seq(),
                self.seq
            ));
            return false;
        }

        match response {
            Response::Filter {
                seq,
                total,
                filtered,
                items,
            } => {
                self.results = items;
                self.index = 0;
                if let Some(item) = self.results.first_mut() {
                    item.selected = Some(true);
                }
                presenter.filtered(seq, filtered, total, &self.results);
                self.emit_selection(presenter);
            }
            Response::Complete { candidate, .. } => {
                if candidate != self.editor.text() {
                    self.editor.overwrite(&candidate);
                    presenter.input_changed(&candidate);
                }
                presenter.completed(&candidate);
            }
        }
        true
    }

    pub fn select_next(&mut self, presenter: &mut dyn Presenter) {
        self.set_index(self.index as i64 + 1, presenter);
    }

    pub fn select_prev(&mut self, presenter: &mut dyn Presenter) {
        self.set_index(self.index as i64 - 1, presenter);
    }

    /// Walks toward older history entries matching the input typed before
    /// history mode was entered.
    pub fn history_prev(
        &mut self,
        sink: &mut dyn RequestSink,
        presenter: &mut dyn Presenter,
    ) {
        self.enter_history_mode(presenter);
        if let Some(entry) = self.history.prev(self.history_index, &self.history_input.clone()) {
            self.history_index = entry.index;
            self.recall(entry.value, sink, presenter);
        }
    }

    /// Walks back toward newer entries, ending at the in-progress input.
    pub fn history_next(
        &mut self,
        sink: &mut dyn RequestSink,
        presenter: &mut dyn Presenter,
    ) {
        self.enter_history_mode(presenter);
        if let Some(entry) = self.history.next(self.history_index, &self.history_input.clone()) {
            self.history_index = entry.index;
            self.recall(entry.value, sink, presenter);
        }
    }

    /// Accepts the currently selected item, recording it in history.
    pub fn accept_selected(&mut self, presenter: &mut dyn Presenter) -> Result<(), HistoryError> {
        let Some(item) = self.results.get(self.index).cloned() else {
            return Ok(());
        };
        self.history.add(&item.value)?;
        presenter.picked(&[item]);
        Ok(())
    }

    /// Accepts the raw input instead of a match; only available when the
    /// menu was configured for it.
    pub fn accept_input(&mut self, presenter: &mut dyn Presenter) -> Result<(), HistoryError> {
        if !self.accept_input {
            return Ok(());
        }
        let input = self.editor.text();
        if input.is_empty() {
            return Ok(());
        }
        self.history.add(&input)?;
        let item = ItemDto {
            index: -1,
            value: input,
            data: None,
            partitions: Vec::new(),
            selected: None,
        };
        presenter.picked(&[item]);
        Ok(())
    }

    pub fn dismiss(&mut self, presenter: &mut dyn Presenter) {
        presenter.picked(&[]);
    }

    fn issue_filter(
        &mut self,
        input: String,
        sink: &mut dyn RequestSink,
        presenter: &mut dyn Presenter,
    ) {
        self.leave_history_mode(presenter);
        self.history_index = -1;
        self.history_input = input.clone();
        self.seq += 1;
        self.logger.info(&format!("filtering seq={} input={input:?}", self.seq));
        sink.send(Request::Filter {
            seq: self.seq,
            input,
        });
    }

    fn recall(
        &mut self,
        value: String,
        sink: &mut dyn RequestSink,
        presenter: &mut dyn Presenter,
    ) {
        if value == self.editor.text() {
            return;
        }
        self.editor.overwrite(&value);
        presenter.input_changed(&value);
        self.seq += 1;
        sink.send(Request::Filter {
            seq: self.seq,
            input: value,
        });
    }

    fn enter_history_mode(&mut self, presenter: &mut dyn Presenter) {
        if self.mode != Mode::History {
            self.mode = Mode::History;
            self.history_input = self.editor.text();
            self.history_index = -1;
            presenter.mode_changed(self.mode);
        }
    }

    fn leave_history_mode(&mut self, presenter: &mut dyn Presenter) {
        if self.mode != Mode::Insert {
            self.mode = Mode::Insert;
            presenter.mode_changed(self.mode);
        }
    }

    fn set_index(&mut self, wanted: i64, presenter: &mut dyn Presenter) {
        if self.results.is_empty() {
            return;
        }
        let max = self.results.len() as i64 - 1;
        let clamped = wanted.clamp(0, max) as usize;
        if clamped != self.index {
            if let Some(old) = self.results.get_mut(self.index) {
                old.selected = None;
            }
            self.index = clamped;
            if let Some(new) = self.results.get_mut(self.index) {
                new.selected = Some(true);
            }
        }
        self.emit_selection(presenter);
    }

    fn emit_selection(&self, presenter: &mut dyn Presenter) {
        if let Some(item) = self.results.get(self.index) {
            presenter.selected(self.index, &item.value);
        }
    }
}
