use crate::pattern::PATTERN_PREFIXES;

/// The query text under edit, with a cursor measured in characters. Word
/// erasing scans backward over the configured delimiters; the "big" set is a
/// coarser alternative (typically just path separators and space). Space
/// always belongs to both sets.
pub struct InputEditor {
    chars: Vec<char>,
    cursor: usize,
    delimiters: Vec<char>,
    big_delimiters: Vec<char>,
    stack: UndoStack,
}

/// Explicit (prev, next) snapshots with a cursor. A fresh push after an undo
/// discards the redo tail.
struct UndoStack {
    snapshots: Vec<String>,
    pos: usize,
}

impl UndoStack {
    fn new() -> Self {
        Self {
            snapshots: Vec::new(),
            pos: 0,
        }
    }

    fn push(&mut self, prev: String, next: String) {
        self.snapshots.truncate(self.pos);
        self.snapshots.push(prev);
        self.snapshots.push(next);
        self.pos = self.snapshots.len() - 1;
    }

    fn undo(&mut self) -> Option<String> {
        if self.pos == 0 {
            return None;
        }
        self.pos -= 1;
        Some(self.snapshots[self.pos].clone())
    }

    fn redo(&mut self) -> Option<String> {
        if self.pos + 1 >= self.snapshots.len() {
            return None;
        }
        self.pos += 1;
        Some(self.snapshots[self.pos].clone())
    }
}

impl InputEditor {
    pub fn new(delimiters: &[char], big_delimiters: &[char]) -> Self {
        let mut delimiters = delimiters.to_vec();
        if !delimiters.contains(&' ') {
            delimiters.push(' ');
        }
        let mut big_delimiters = big_delimiters.to_vec();
        if !big_delimiters.contains(&' ') {
            big_delimiters.push(' ');
        }

        Self {
            chars: Vec::new(),
            cursor: 0,
            delimiters,
            big_delimiters,
            stack: UndoStack::new(),
        }
    }

    pub fn text(&self) -> String {
        self.chars.iter().collect()
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn set_cursor(&mut self, cursor: usize) {
        self.cursor = cursor.min(self.chars.len());
    }

    /// Replaces the text without recording an undo snapshot; used for the
    /// initial input and history recall.
    pub fn overwrite(&mut self, value: &str) {
        self.chars = value.chars().collect();
        self.cursor = self.chars.len();
    }

    /// Inserts plain typing at the cursor. Keystrokes do not snapshot; only
    /// explicit editing operations do.
    pub fn insert(&mut self, typed: &str) {
        for c in typed.chars() {
            self.chars.insert(self.cursor, c);
            self.cursor += 1;
        }
    }

    pub fn delete_backward(&mut self) {
        if self.cursor > 0 {
            self.cursor -= 1;
            self.chars.remove(self.cursor);
        }
    }

    /// Deletes the word immediately before the cursor, also breaking on a
    /// camel hump. Undoable.
    pub fn erase_word(&mut self) -> String {
        let delimiters = self.delimiters.clone();
        self.erase_delimited_word(&delimiters, true)
    }

    /// Deletes the coarser "big word" before the cursor; no camel breaking.
    /// Undoable.
    pub fn erase_big_word(&mut self) -> String {
        let delimiters = self.big_delimiters.clone();
        self.erase_delimited_word(&delimiters, false)
    }

    /// Clears the whole input. Undoable.
    pub fn erase_all(&mut self) -> String {
        self.replace("", 0, self.chars.len())
    }

    /// Cycles the explicit type prefix of the word under the cursor:
    /// bare -> `@*` -> `@!` -> bare. Undoable.
    pub fn alternate_pattern(&mut self) -> String {
        let start = self.scan_back(self.cursor, &[' '], false);
        let end = self.scan_forward(start, &[' ']);
        let word: String = self.chars[start..end].iter().collect();

        let current = PATTERN_PREFIXES
            .iter()
            .position(|prefix| word.starts_with(prefix));
        let (peel, next) = match current {
            Some(i) => (
                PATTERN_PREFIXES[i].len(),
                PATTERN_PREFIXES.get(i + 1).copied().unwrap_or(""),
            ),
            None => (0, PATTERN_PREFIXES[0]),
        };

        let replacement = format!("{next}{}", &word[peel..]);
        self.replace(&replacement, start, end)
    }

    pub fn undo(&mut self) -> Option<String> {
        let value = self.stack.undo()?;
        self.overwrite(&value);
        Some(value)
    }

    pub fn redo(&mut self) -> Option<String> {
        let value = self.stack.redo()?;
        self.overwrite(&value);
        Some(value)
    }

    fn erase_delimited_word(&mut self, delimiters: &[char], camel: bool) -> String {
        if self.cursor == 0 {
            return self.text();
        }

        // The scan starts one character before the cursor, so a cursor
        // sitting on a boundary still targets the previous word.
        let start = self.scan_back(self.cursor - 1, delimiters, camel);
        self.replace("", start, self.cursor)
    }

    /// Walks backward from `from` to the start of the word before it. A run
    /// of delimiters collapses down to its first member, so `foo/...baz`
    /// erases back to `foo/`.
    fn scan_back(&self, from: usize, delimiters: &[char], camel: bool) -> usize {
        let mut index = from;
        while index > 0 {
            let prev = self.chars[index - 1];

            if camel
                && index < self.chars.len()
                && self.chars[index].is_uppercase()
                && !prev.is_uppercase()
            {
                break;
            }

            if delimiters.contains(&prev) {
                if index < 2 {
                    break;
                }
                let before_prev = self.chars[index - 2];
                if !delimiters.contains(&before_prev) {
                    break;
                }
            }

            index -= 1;
        }
        index
    }

    /// Walks forward from `from` to just past the end of the current word.
    fn scan_forward(&self, from: usize, delimiters: &[char]) -> usize {
        let mut index = from;
        while index < self.chars.len() && !delimiters.contains(&self.chars[index]) {
            index += 1;
        }
        index
    }

    /// Splices `replacement` over `[start, end)`, records the undo snapshot,
    /// and leaves the cursor after the replacement.
    fn replace(&mut self, replacement: &str, start: usize, end: usize) -> String {
        let prev = self.text();
        let replacement_chars: Vec<char> = replacement.chars().collect();
        let cursor = start + replacement_chars.len();
        self.chars.splice(start..end.min(self.chars.len()), replacement_chars);
        let next = self.text();
        self.stack.push(prev, next.clone());
        self.cursor = cursor;
        next
    }
}

#[cfg(test)]
mod tests {
    use super::InputEditor;

    fn editor_with(text: &str) -> InputEditor {
        let mut editor = InputEditor::new(&[], &[]);
        editor.overwrite(text);
        editor
    }

    #[test]
    fn erase_word_removes_the_word_before_the_cursor() {
        let mut editor = editor_with("foo bar");
        editor.erase_word();

        assert_eq!(editor.text(), "foo ");
        assert_eq!(editor.cursor(), 4);
    }

    #[test]
    fn erase_word_on_a_boundary_targets_the_previous_word() {
        let mut editor = editor_with("foo ");
        editor.erase_word();

        assert_eq!(editor.text(), "");
        assert_eq!(editor.cursor(), 0);
    }

    #[test]
    fn erase_word_collapses_a_delimiter_run() {
        let mut editor = InputEditor::new(&['/', '.'], &[]);
        editor.overwrite("foo/...baz");
        editor.erase_word();
        assert_eq!(editor.text(), "foo/");

        editor.overwrite("foo/bar.baz");
        editor.erase_word();
        assert_eq!(editor.text(), "foo/bar.");
    }

    #[test]
    fn erase_word_breaks_on_camel_humps() {
        let mut editor = editor_with("FooBar");
        editor.erase_word();
        assert_eq!(editor.text(), "Foo");
    }

    #[test]
    fn erase_big_word_ignores_fine_delimiters() {
        let mut editor = InputEditor::new(&['/', '.'], &['/']);
        editor.overwrite("src/cache.rs");
        editor.erase_big_word();
        assert_eq!(editor.text(), "src/");
    }

    #[test]
    fn erase_word_at_start_is_a_no_op() {
        let mut editor = editor_with("foo");
        editor.set_cursor(0);
        editor.erase_word();
        assert_eq!(editor.text(), "foo");
    }

    #[test]
    fn alternate_pattern_cycles_prefixes() {
        let mut editor = editor_with("word");
        editor.alternate_pattern();
        assert_eq!(editor.text(), "@*word");
        editor.alternate_pattern();
        assert_eq!(editor.text(), "@!word");
        editor.alternate_pattern();
        assert_eq!(editor.text(), "word");
    }

    #[test]
    fn alternate_pattern_touches_only_the_word_under_the_cursor() {
        let mut editor = editor_with("first second");
        editor.set_cursor(3);
        editor.alternate_pattern();
        assert_eq!(editor.text(), "@*first second");
    }

    #[test]
    fn undo_restores_each_prior_snapshot() {
        let mut editor = editor_with("one two three");
        editor.erase_word();
        editor.erase_word();
        assert_eq!(editor.text(), "one ");

        assert_eq!(editor.undo().as_deref(), Some("one two "));
        assert_eq!(editor.undo().as_deref(), Some("one two three"));
        assert_eq!(editor.undo(), None);
    }

    #[test]
    fn redo_after_undo_restores_the_edit() {
        let mut editor = editor_with("one two");
        editor.erase_word();
        editor.undo();

        assert_eq!(editor.redo().as_deref(), Some("one "));
        assert_eq!(editor.redo(), None);
    }

    #[test]
    fn a_new_edit_after_undo_discards_the_redo_tail() {
        let mut editor = editor_with("alpha beta");
        editor.erase_word();
        editor.undo();
        editor.erase_all();

        assert_eq!(editor.text(), "");
        assert_eq!(editor.redo(), None);
        assert_eq!(editor.undo().as_deref(), Some("alpha beta"));
    }

    #[test]
    fn typing_does_not_snapshot_but_is_captured_by_the_next_edit() {
        let mut editor = editor_with("base");
        editor.insert("line");
        assert_eq!(editor.text(), "baseline");

        editor.erase_all();
        assert_eq!(editor.undo().as_deref(), Some("baseline"));
    }
}
