//! Text console: line wrapping, a bounded history, and command dispatch.
//!
//! The console only lays text out. Whoever owns it decides how the lines end up on
//! screen, using [`Console::visible_lines`] and [`Console::input_line`].

use std::{collections::VecDeque, time::Duration};

use halfling::util::typedefs::FastHashMap;
use thiserror::Error;

/// Shown in front of the line being typed.
pub const PROMPT: &str = "> ";

pub const DEFAULT_MAX_LINES: usize = 50;

const CURSOR_BLINK_PERIOD: Duration = Duration::from_secs(1);

/// Width of a tab, in spaces.
const TAB_WIDTH: f32 = 4.0;

/// Glyph measurements of the font the console is drawn with.
pub trait FontMetrics {
    fn space_width(&self) -> f32;
    fn char_width(&self, character: char) -> f32;
    fn line_height(&self) -> f32;
}

/// Every glyph, space included, has the same advance.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct MonospaceMetrics {
    pub advance: f32,
    pub line_height: f32,
}

impl FontMetrics for MonospaceMetrics {
    fn space_width(&self) -> f32 {
        self.advance
    }

    fn char_width(&self, _character: char) -> f32 {
        self.advance
    }

    fn line_height(&self) -> f32 {
        self.line_height
    }
}

/// Called with the arguments following the command name. Returned text is printed.
pub type CommandCallback = Box<dyn FnMut(&[&str]) -> Option<String>>;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConsoleError {
    #[error("Command name {0:?} can not contain spaces")]
    CommandNameHasSpaces(String),
}

pub struct Console<F> {
    font: F,
    rect_width: f32,
    max_lines: usize,

    lines: VecDeque<String>,
    input: String,

    commands: FastHashMap<String, CommandCallback>,

    cursor_timer: Duration,
    cursor_showing: bool,
}

impl<F: FontMetrics> Console<F> {
    pub fn new(font: F, rect_width: f32, max_lines: usize) -> Self {
        Self {
            font,
            rect_width,
            max_lines,
            lines: VecDeque::new(),
            input: String::new(),
            commands: FastHashMap::default(),
            cursor_timer: Duration::ZERO,
            cursor_showing: true,
        }
    }

    pub fn set_rect_width(&mut self, rect_width: f32) {
        self.rect_width = rect_width;
    }

    pub fn lines(&self) -> &VecDeque<String> {
        &self.lines
    }

    /// The prompt followed by what has been typed so far.
    pub fn input_line(&self) -> String {
        format!("{PROMPT}{}", self.input)
    }

    pub fn cursor_visible(&self) -> bool {
        self.cursor_showing
    }

    /// Advances the cursor blink.
    pub fn update(&mut self, delta: Duration) {
        self.cursor_timer += delta;
        while self.cursor_timer >= CURSOR_BLINK_PERIOD {
            self.cursor_timer -= CURSOR_BLINK_PERIOD;
            self.cursor_showing = !self.cursor_showing;
        }
    }

    /// Newest first, as many lines as fit in `height` once the input line is placed.
    pub fn visible_lines(&self, height: f32) -> impl Iterator<Item = &str> {
        let line_height = self.font.line_height();
        let count = match line_height > 0.0 {
            true => ((height - line_height) / line_height).floor().max(0.0) as usize,
            false => 0,
        };
        self.lines.iter().rev().take(count).map(String::as_str)
    }

    fn advance(&self, character: char) -> f32 {
        match character {
            ' ' => self.font.space_width(),
            '\t' => TAB_WIDTH * self.font.space_width(),
            c => self.font.char_width(c),
        }
    }

    fn measure(&self, text: &str) -> f32 {
        text.chars().map(|c| self.advance(c)).sum()
    }

    /// Wraps one newline free run of text.
    fn wrap_segment(&self, text: &str, out: &mut Vec<String>) {
        let mut line_start = 0;
        let mut width = 0.0;
        // Byte offset of the last space or tab on the current line.
        let mut last_break = None;

        for (i, c) in text.char_indices() {
            let advance = self.advance(c);

            if c == ' ' || c == '\t' {
                if width + advance > self.rect_width {
                    out.push(text[line_start..i].to_owned());
                    line_start = i + c.len_utf8();
                    width = 0.0;
                    last_break = None;
                } else {
                    last_break = Some(i);
                    width += advance;
                }
                continue;
            }

            if width + advance > self.rect_width && i > line_start {
                if let Some(b) = last_break.take() {
                    out.push(text[line_start..b].to_owned());
                    line_start = b + 1;
                    width = self.measure(&text[line_start..i]);
                }
                // The word alone is wider than the rectangle.
                if width + advance > self.rect_width && i > line_start {
                    out.push(text[line_start..i].to_owned());
                    line_start = i;
                    width = 0.0;
                }
            }
            width += advance;
        }

        out.push(text[line_start..].to_owned());
    }

    /// Adds `text` to the history, breaking it on newlines and wherever it would overflow
    /// the rectangle. Overflowing lines break at the last space or tab when there is one.
    ///
    /// Empty lines between newlines are skipped, but printing an empty string adds an
    /// empty line.
    pub fn print_text(&mut self, text: &str) {
        let mut wrapped = Vec::new();
        let segments: Vec<&str> = text.split(['\r', '\n']).collect();
        let only_one = segments.len() == 1;
        for segment in segments {
            if segment.is_empty() && !only_one {
                continue;
            }
            self.wrap_segment(segment, &mut wrapped);
        }

        for line in wrapped {
            log::debug!("console: {}", line);
            self.lines.push_back(line);
        }
        while self.lines.len() > self.max_lines {
            self.lines.pop_front();
        }
    }

    /// Feeds one typed character. Enter runs the typed command, backspace deletes, tabs
    /// and other control characters are ignored.
    pub fn input_character(&mut self, character: char) {
        match character {
            '\n' | '\r' => {
                if !self.input.is_empty() {
                    let command = std::mem::take(&mut self.input);
                    self.print_text(&format!("{PROMPT}{command}"));
                    self.process_command(&command);
                }
            }
            '\u{8}' => {
                self.input.pop();
            }
            '\t' => {}
            c if c.is_control() => {}
            c => self.input.push(c),
        }
    }

    /// Registers `callback` under `name`, replacing any previous command of that name.
    pub fn register_command(&mut self, name: &str, callback: CommandCallback) -> Result<(), ConsoleError> {
        if name.contains(' ') {
            let err = ConsoleError::CommandNameHasSpaces(name.to_owned());
            self.print_text(&format!("\tregister_command: {err}"));
            return Err(err);
        }
        if self.commands.insert(name.to_owned(), callback).is_some() {
            log::debug!("Replaced console command {:?}", name);
        }
        Ok(())
    }

    fn process_command(&mut self, command: &str) {
        let mut args = command.split_whitespace();
        let name = match args.next() {
            Some(name) => name,
            None => return,
        };
        let args: Vec<&str> = args.collect();

        let output = match self.commands.get_mut(name) {
            Some(callback) => callback(&args),
            None => Some(format!("\tCommand '{name}' is not registered")),
        };
        if let Some(output) = output {
            self.print_text(&output);
        }
    }
}
