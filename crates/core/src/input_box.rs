//! The chat input box.

const NATURAL_ROWS: usize = 1;

/// A key the input box reacts to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Key {
    /// Submits, or inserts a newline together with Shift.
    Enter,
    /// Removes the last character.
    Backspace,
    /// Inserts a character.
    Char(char),
    /// Anything else, only triggers a resize.
    Other,
}

/// Events dispatched to the [`InputBox`].
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum InputEvent {
    /// A key was pressed.
    KeyDown {
        /// The key.
        key: Key,
        /// Whether Shift was held.
        shift: bool,
    },
    /// The whole value was replaced, e.g. by a paste.
    Changed(String),
}

/// A free-text input that grows with its content and submits on Enter.
///
/// The box owns a single text buffer and a visual height measured in
/// rows. It has no side effects besides calling `on_user_input`.
pub struct InputBox<F> {
    buffer: String,
    rows: usize,
    columns: Option<usize>,
    max_rows: Option<usize>,
    on_user_input: F,
}

impl<F: FnMut(String)> InputBox<F> {
    /// Creates an empty input box that hands submitted text to
    /// `on_user_input`.
    #[inline]
    pub fn new(on_user_input: F) -> Self {
        Self {
            buffer: String::new(),
            rows: NATURAL_ROWS,
            columns: None,
            max_rows: None,
            on_user_input,
        }
    }

    /// Soft-wraps lines longer than `columns` characters when measuring.
    #[inline]
    pub fn with_columns(mut self, columns: usize) -> Self {
        self.columns = Some(columns.max(1));
        self
    }

    /// Caps the visual height.
    #[inline]
    pub fn with_max_rows(mut self, max_rows: usize) -> Self {
        self.max_rows = Some(max_rows.max(NATURAL_ROWS));
        self
    }

    /// The current text.
    #[inline]
    pub fn text(&self) -> &str {
        &self.buffer
    }

    /// The current visual height in rows.
    #[inline]
    pub fn rows(&self) -> usize {
        self.rows
    }

    /// Applies an event.
    pub fn dispatch(&mut self, event: InputEvent) {
        match event {
            InputEvent::KeyDown {
                key: Key::Enter,
                shift: false,
            } => {
                self.submit();
                return;
            }
            InputEvent::KeyDown {
                key: Key::Enter,
                shift: true,
            } => self.buffer.push('\n'),
            InputEvent::KeyDown {
                key: Key::Backspace,
                ..
            } => {
                self.buffer.pop();
            }
            InputEvent::KeyDown {
                key: Key::Char(c), ..
            } => self.buffer.push(c),
            InputEvent::KeyDown {
                key: Key::Other, ..
            } => {}
            InputEvent::Changed(value) => self.buffer = value,
        }
        self.resize();
    }

    fn submit(&mut self) {
        let text = std::mem::take(&mut self.buffer);
        self.rows = NATURAL_ROWS;
        if text.trim().is_empty() {
            trace!("dropping blank input");
            return;
        }
        (self.on_user_input)(text);
    }

    fn resize(&mut self) {
        let mut rows = self.rows.max(self.content_rows());
        if let Some(max_rows) = self.max_rows {
            rows = rows.min(max_rows);
        }
        self.rows = rows;
    }

    fn content_rows(&self) -> usize {
        self.buffer
            .split('\n')
            .map(|line| match self.columns {
                Some(columns) => line.chars().count().div_ceil(columns).max(1),
                None => 1,
            })
            .sum()
    }
}
