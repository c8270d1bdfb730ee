//! Terminal output for the `twx` command.

use std::time::Duration;

use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use log::{Level, LevelFilter, Metadata, Record};

use twx_compiler::{Diagnostic, DiagnosticKind};

pub mod colors {
    use console::Color;

    pub const CYAN: Color = Color::Color256(38);
    pub const AMBER: Color = Color::Color256(214);
    pub const RED: Color = Color::Color256(196);
    pub const GREEN: Color = Color::Color256(71);
    pub const DIM: Color = Color::Color256(244);
}

pub mod symbols {
    pub const CHECK: &str = "\u{2714}"; // ✔
    pub const CROSS: &str = "\u{2718}"; // ✘
    pub const WARN: &str = "\u{25B2}"; // ▲
    pub const BULLET: &str = "\u{25B8}"; // ▸
    pub const DOT: &str = "\u{00B7}"; // ·
}

const BOX_WIDTH: usize = 56;

pub fn spinner(msg: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    let template = ProgressStyle::default_spinner()
        .tick_chars("\u{280B}\u{2819}\u{2839}\u{2838}\u{283C}\u{2834}\u{2826}\u{2827}\u{2807}\u{280F} ")
        .template("  {spinner:.cyan} {msg}");
    if let Ok(template) = template {
        pb.set_style(template);
    }
    pb.set_message(msg.to_string());
    pb.enable_steady_tick(Duration::from_millis(80));
    pb
}

pub fn success(msg: &str) {
    println!("  {} {}", style(symbols::CHECK).fg(colors::GREEN), msg);
}

pub fn failure(msg: &str) {
    eprintln!("  {} {}", style(symbols::CROSS).fg(colors::RED), style(msg).fg(colors::RED).bold());
}

pub fn dim(msg: &str) {
    println!("  {}", style(msg).fg(colors::DIM));
}

pub fn timing(label: &str, millis: u128) {
    println!(
        "  {} {} in {}",
        style(symbols::BULLET).fg(colors::CYAN),
        label,
        style(format!("{}ms", millis)).bold()
    );
}

pub fn box_header(title: &str) {
    let title = format!(" {} ", title);
    let dashes = BOX_WIDTH.saturating_sub(title.chars().count() + 3);
    println!(
        "  {}{}{}{}",
        style("\u{250C}\u{2500}").fg(colors::CYAN),
        style(title).fg(colors::CYAN).bold(),
        style("\u{2500}".repeat(dashes)).fg(colors::CYAN),
        style("\u{2510}").fg(colors::CYAN)
    );
}

pub fn box_line(content: &str) {
    let padding = (BOX_WIDTH - 3).saturating_sub(content.chars().count());
    println!(
        "  {} {}{}{}",
        style("\u{2502}").fg(colors::CYAN),
        content,
        " ".repeat(padding),
        style("\u{2502}").fg(colors::CYAN)
    );
}

pub fn box_footer() {
    println!(
        "  {}{}{}",
        style("\u{2514}").fg(colors::CYAN),
        style("\u{2500}".repeat(BOX_WIDTH - 2)).fg(colors::CYAN),
        style("\u{2518}").fg(colors::CYAN)
    );
}

/// `file:line:column`, or just the file when the position is unknown.
pub fn location(diagnostic: &Diagnostic) -> String {
    if diagnostic.line == 0 {
        diagnostic.file.display().to_string()
    } else {
        format!("{}:{}:{}", diagnostic.file.display(), diagnostic.line, diagnostic.column)
    }
}

pub fn diagnostic(diagnostic: &Diagnostic) {
    let (symbol, color, label) = match diagnostic.kind {
        DiagnosticKind::Warning => (symbols::WARN, colors::AMBER, "warning"),
        DiagnosticKind::Error => (symbols::CROSS, colors::RED, "error"),
    };
    eprintln!(
        "  {} {} {}",
        style(symbol).fg(color),
        style(format!("{}:", label)).fg(color).bold(),
        diagnostic.message
    );
    eprintln!("      {} {}", style("at").fg(colors::DIM), style(location(diagnostic)).fg(colors::DIM));
}

/// Counts of (warnings, errors).
pub fn tally(diagnostics: &[Diagnostic]) -> (usize, usize) {
    diagnostics.iter().fold((0, 0), |(w, e), d| match d.kind {
        DiagnosticKind::Warning => (w + 1, e),
        DiagnosticKind::Error => (w, e + 1),
    })
}

/// Maps the number of `-v` flags to a log level.
pub fn level_for(verbosity: u8) -> LevelFilter {
    match verbosity {
        0 => LevelFilter::Error,
        1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    }
}

/// Prints library log records to stderr.
///
/// Warnings are left to the diagnostic summary unless verbose output was
/// requested, so they are not reported twice.
struct ConsoleLogger {
    level: LevelFilter,
}

impl log::Log for ConsoleLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.level
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let tag = match record.level() {
            Level::Error => style("error").fg(colors::RED).bold(),
            Level::Warn => style("warn ").fg(colors::AMBER).bold(),
            Level::Info => style("info ").fg(colors::CYAN),
            Level::Debug => style("debug").fg(colors::DIM),
            Level::Trace => style("trace").fg(colors::DIM),
        };
        eprintln!("  {} {}", tag, record.args());
    }

    fn flush(&self) {}
}

pub fn init_logger(verbosity: u8) {
    let level = level_for(verbosity);
    if log::set_boxed_logger(Box::new(ConsoleLogger { level })).is_ok() {
        log::set_max_level(level);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn at(kind: DiagnosticKind, line: usize) -> Diagnostic {
        Diagnostic {
            kind,
            message: "dropped key".to_string(),
            file: PathBuf::from("things/Pump.ts"),
            line,
            column: 3,
        }
    }

    #[test]
    fn test_location() {
        assert_eq!(location(&at(DiagnosticKind::Warning, 4)), "things/Pump.ts:4:3");
        assert_eq!(location(&at(DiagnosticKind::Warning, 0)), "things/Pump.ts");
    }

    #[test]
    fn test_tally() {
        let diagnostics = vec![
            at(DiagnosticKind::Warning, 1),
            at(DiagnosticKind::Error, 2),
            at(DiagnosticKind::Warning, 3),
        ];
        assert_eq!(tally(&diagnostics), (2, 1));
    }

    #[test]
    fn test_verbosity_levels() {
        assert_eq!(level_for(0), LevelFilter::Error);
        assert_eq!(level_for(2), LevelFilter::Debug);
        assert_eq!(level_for(9), LevelFilter::Trace);
    }
}
