//! Terminal output: status labels, tables and spinners.
//!
//! Color is decided once, in this order:
//! 1. `--no-color` flag
//! 2. `NO_COLOR` environment variable (any value)
//! 3. `TERM=dumb`
//! 4. `--color` mode, where `auto` means "stdout is a TTY"
//!
//! The resolved [`Ui`] value is passed to every function that prints.

use anstream::{eprintln, println};
use anstyle::{AnsiColor, Color, Style};
use comfy_table::{Cell, ContentArrangement, Table, presets};
use indicatif::{ProgressBar, ProgressStyle};
use std::borrow::Cow;
use std::io::IsTerminal;
use std::time::Duration;

/// Color mode for output
#[derive(Default, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColorMode {
    /// Always emit ANSI colors
    Always,
    /// Colors only on a TTY
    #[default]
    Auto,
    /// Never emit ANSI colors
    Never,
}

impl std::str::FromStr for ColorMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "always" => Ok(Self::Always),
            "auto" => Ok(Self::Auto),
            "never" => Ok(Self::Never),
            _ => Err(format!("invalid color mode: {}", s)),
        }
    }
}

/// Resolved display settings
#[derive(Debug, Clone)]
pub struct Ui {
    /// Whether ANSI styling is emitted
    pub color_enabled: bool,
    /// Spinners need both color and a TTY
    pub spinner_enabled: bool,
}

impl Default for Ui {
    fn default() -> Self {
        Self::new(ColorMode::Auto, false)
    }
}

impl Ui {
    /// Resolve color and spinner support; see the module docs for precedence
    pub fn new(mode: ColorMode, force_no_color: bool) -> Self {
        let color_enabled = Self::resolve_color(mode, force_no_color);
        let spinner_enabled = color_enabled && std::io::stdout().is_terminal();

        if !color_enabled {
            anstream::ColorChoice::write_global(anstream::ColorChoice::Never);
        }

        Self {
            color_enabled,
            spinner_enabled,
        }
    }

    fn resolve_color(mode: ColorMode, force_no_color: bool) -> bool {
        if force_no_color || std::env::var_os("NO_COLOR").is_some() {
            return false;
        }
        if std::env::var("TERM").is_ok_and(|t| t == "dumb") {
            return false;
        }
        match mode {
            ColorMode::Always => true,
            ColorMode::Never => false,
            ColorMode::Auto => std::io::stdout().is_terminal(),
        }
    }

    // -------------------------------------------------------------------------
    // Status labels and inline styling
    // -------------------------------------------------------------------------

    fn label_style(&self, color: AnsiColor) -> Style {
        if self.color_enabled {
            Style::new().fg_color(Some(Color::Ansi(color))).bold()
        } else {
            Style::new()
        }
    }

    /// Print OK label (green) to stdout
    pub fn ok(&self, msg: impl AsRef<str>) {
        let label = self.label_style(AnsiColor::Green);
        println!("{label}OK{label:#} {}", msg.as_ref());
    }

    /// Print WARN label (yellow) to stderr
    pub fn warn(&self, msg: impl AsRef<str>) {
        let label = self.label_style(AnsiColor::Yellow);
        eprintln!("{label}WARN{label:#} {}", msg.as_ref());
    }

    /// Print ERROR label (red) with message to stderr
    pub fn err(&self, msg: impl AsRef<str>) {
        let label = self.label_style(AnsiColor::Red);
        eprintln!("{label}ERROR{label:#} {}", msg.as_ref());
    }

    /// Print INFO label (cyan) to stdout
    pub fn info(&self, msg: impl AsRef<str>) {
        let label = self.label_style(AnsiColor::Cyan);
        println!("{label}INFO{label:#} {}", msg.as_ref());
    }

    /// Gray text for secondary details
    pub fn dim(&self, s: impl AsRef<str>) -> String {
        self.styled(s, Style::new().fg_color(Some(Color::Ansi(AnsiColor::BrightBlack))))
    }

    /// Bold text, used for section titles
    pub fn bold(&self, s: impl AsRef<str>) -> String {
        self.styled(s, Style::new().bold())
    }

    /// Text in one ANSI color
    pub fn colored(&self, s: impl AsRef<str>, color: AnsiColor) -> String {
        self.styled(s, Style::new().fg_color(Some(Color::Ansi(color))))
    }

    fn styled(&self, s: impl AsRef<str>, style: Style) -> String {
        if self.color_enabled {
            format!("{style}{}{style:#}", s.as_ref())
        } else {
            s.as_ref().to_string()
        }
    }

    // -------------------------------------------------------------------------
    // Status icons, with ASCII fallbacks
    // -------------------------------------------------------------------------

    pub fn icon_ok(&self) -> &'static str {
        if self.color_enabled { "✓" } else { "[OK]" }
    }

    pub fn icon_warn(&self) -> &'static str {
        if self.color_enabled { "⚠" } else { "[!]" }
    }

    pub fn icon_err(&self) -> &'static str {
        if self.color_enabled { "✗" } else { "[X]" }
    }

    pub fn icon_info(&self) -> &'static str {
        if self.color_enabled { "•" } else { "-" }
    }

    // -------------------------------------------------------------------------
    // Tables (comfy-table)
    // -------------------------------------------------------------------------

    /// Bordered table for listings
    pub fn table(&self) -> Table {
        let mut table = Table::new();
        table.set_content_arrangement(ContentArrangement::Dynamic);
        if self.color_enabled {
            table.load_preset(presets::UTF8_FULL_CONDENSED);
        } else {
            table.load_preset(presets::ASCII_MARKDOWN);
        }
        table
    }

    /// Borderless two-column table for key/value details
    pub fn simple_table(&self) -> Table {
        let mut table = Table::new();
        table.set_content_arrangement(ContentArrangement::Dynamic);
        table.load_preset(presets::NOTHING);
        table
    }

    /// Plain cell
    pub fn cell(&self, content: impl Into<String>) -> Cell {
        Cell::new(content.into())
    }

    /// Header cell, bold when color is on
    pub fn header_cell(&self, content: impl Into<String>) -> Cell {
        let cell = Cell::new(content.into());
        if self.color_enabled {
            cell.add_attribute(comfy_table::Attribute::Bold)
        } else {
            cell
        }
    }

    /// Colored via comfy-table so column widths stay correct
    pub fn colored_cell(&self, content: impl Into<String>, color: AnsiColor) -> Cell {
        let cell = Cell::new(content.into());
        if self.color_enabled {
            cell.fg(comfy_color(color))
        } else {
            cell
        }
    }

    /// Cell for an optional value, dimmed "(not set)" when absent
    pub fn value_cell(&self, value: Option<&str>) -> Cell {
        match value {
            Some(v) => self.cell(v),
            None => self.colored_cell("(not set)", AnsiColor::BrightBlack),
        }
    }

    // -------------------------------------------------------------------------
    // Spinners (indicatif)
    // -------------------------------------------------------------------------

    /// Spinner for store writes; hidden when spinners are disabled
    pub fn spinner(&self, message: impl Into<Cow<'static, str>>) -> ProgressBar {
        let pb = if self.spinner_enabled {
            let pb = ProgressBar::new_spinner();
            if let Ok(style) = ProgressStyle::default_spinner()
                .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏")
                .template("{spinner:.cyan} {msg}")
            {
                pb.set_style(style);
            }
            pb.enable_steady_tick(Duration::from_millis(80));
            pb
        } else {
            ProgressBar::hidden()
        };
        pb.set_message(message);
        pb
    }

    /// Finish a spinner with a success line
    pub fn spinner_finish_ok(&self, pb: &ProgressBar, msg: impl Into<Cow<'static, str>>) {
        self.spinner_finish(pb, msg.into(), true);
    }

    /// Finish a spinner with a failure line
    pub fn spinner_finish_err(&self, pb: &ProgressBar, msg: impl Into<Cow<'static, str>>) {
        self.spinner_finish(pb, msg.into(), false);
    }

    /// Hidden spinners fall back to an OK/ERROR label
    fn spinner_finish(&self, pb: &ProgressBar, msg: Cow<'static, str>, success: bool) {
        if !self.spinner_enabled {
            pb.finish_and_clear();
            if success { self.ok(msg) } else { self.err(msg) }
            return;
        }
        if let Ok(style) = ProgressStyle::default_spinner().template("{msg}") {
            pb.set_style(style);
        }
        let icon = if success {
            self.colored("✓", AnsiColor::Green)
        } else {
            self.colored("✗", AnsiColor::Red)
        };
        pb.finish_with_message(format!("{} {}", icon, msg));
    }

    // -------------------------------------------------------------------------
    // Plain output
    // -------------------------------------------------------------------------

    /// Print a line to stdout
    pub fn println(&self, msg: impl AsRef<str>) {
        println!("{}", msg.as_ref());
    }

    /// Print an empty line
    pub fn newline(&self) {
        println!();
    }

    /// Print a bold section header
    pub fn section(&self, title: impl AsRef<str>) {
        println!("{}", self.bold(title));
    }
}

/// Map an anstyle color onto comfy-table's palette
fn comfy_color(color: AnsiColor) -> comfy_table::Color {
    use comfy_table::Color as C;
    match color {
        AnsiColor::Black => C::Black,
        AnsiColor::Red | AnsiColor::BrightRed => C::Red,
        AnsiColor::Green | AnsiColor::BrightGreen => C::Green,
        AnsiColor::Yellow | AnsiColor::BrightYellow => C::Yellow,
        AnsiColor::Blue | AnsiColor::BrightBlue => C::Blue,
        AnsiColor::Magenta | AnsiColor::BrightMagenta => C::Magenta,
        AnsiColor::Cyan | AnsiColor::BrightCyan => C::Cyan,
        AnsiColor::White | AnsiColor::BrightWhite => C::White,
        AnsiColor::BrightBlack => C::DarkGrey,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    fn test_color_mode_parse() {
        assert_eq!("always".parse::<ColorMode>().unwrap(), ColorMode::Always);
        assert_eq!("AUTO".parse::<ColorMode>().unwrap(), ColorMode::Auto);
        assert_eq!("never".parse::<ColorMode>().unwrap(), ColorMode::Never);
        assert!("sometimes".parse::<ColorMode>().is_err());
    }

    #[test]
    fn test_force_no_color_wins() {
        let ui = Ui::new(ColorMode::Always, true);
        assert!(!ui.color_enabled);
        assert!(!ui.spinner_enabled);
    }

    #[test]
    #[serial]
    fn test_no_color_env_overrides_always() {
        // SAFETY: serialized with every other test that touches NO_COLOR
        unsafe { std::env::set_var("NO_COLOR", "1") };
        let ui = Ui::new(ColorMode::Always, false);
        unsafe { std::env::remove_var("NO_COLOR") };
        assert!(!ui.color_enabled);
    }

    #[test]
    fn test_plain_output_without_color() {
        let ui = Ui::new(ColorMode::Never, false);
        assert_eq!(ui.icon_ok(), "[OK]");
        assert_eq!(ui.icon_err(), "[X]");
        assert_eq!(ui.dim("x"), "x");
        assert_eq!(ui.bold("x"), "x");
    }

    #[test]
    fn test_hidden_spinner_finishes() {
        let ui = Ui::new(ColorMode::Never, false);
        let pb = ui.spinner("working");
        ui.spinner_finish_ok(&pb, "done");
        assert!(pb.is_finished());
    }
}
