/// file: src/ui.rs
/// description: terminal presentation layer rendering the realtime surfaces
use crate::{
    config::DisplayConfig,
    error::Result,
    notifications::{NotificationId, NotificationRecord},
    surface::{BroadcastSink, CounterDisplay, NotificationSink},
    types::{CounterKind, EmailAvailability, PlatformBroadcast, Severity},
    validation::Field,
};
use tracing::debug;

// ANSI color codes
pub struct Colors;

impl Colors {
    pub const RESET: &'static str = "\x1b[0m";
    pub const BOLD: &'static str = "\x1b[1m";
    pub const DIM: &'static str = "\x1b[2m";
    pub const WHITE: &'static str = "\x1b[37m";

    pub const BRIGHT_RED: &'static str = "\x1b[91m";
    pub const BRIGHT_GREEN: &'static str = "\x1b[92m";
    pub const BRIGHT_YELLOW: &'static str = "\x1b[93m";
    pub const BRIGHT_BLUE: &'static str = "\x1b[94m";
    pub const BRIGHT_MAGENTA: &'static str = "\x1b[95m";
    pub const BRIGHT_CYAN: &'static str = "\x1b[96m";
}

fn severity_color(severity: Severity) -> &'static str {
    match severity {
        Severity::Info => Colors::BRIGHT_BLUE,
        Severity::Success => Colors::BRIGHT_GREEN,
        Severity::Warning => Colors::BRIGHT_YELLOW,
        Severity::Danger => Colors::BRIGHT_RED,
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Palette {
    colored: bool,
}

impl Palette {
    pub fn new(colored: bool) -> Self {
        Self { colored }
    }

    pub fn paint(&self, color: &str, text: &str) -> String {
        if self.colored {
            format!("{}{}{}{}", Colors::BOLD, color, text, Colors::RESET)
        } else {
            text.to_string()
        }
    }

    fn tag(&self, color: &str, label: &str) -> String {
        self.paint(color, &format!("[{}]", label))
    }
}

pub struct TerminalNotifications {
    palette: Palette,
}

impl TerminalNotifications {
    pub fn new(display: &DisplayConfig) -> Self {
        Self {
            palette: Palette::new(display.colored),
        }
    }
}

impl NotificationSink for TerminalNotifications {
    fn mount(&mut self, record: &NotificationRecord) -> Result<()> {
        let label = record.severity.as_str().to_uppercase();
        println!(
            "{} {} {}",
            self.palette.tag(severity_color(record.severity), &label),
            record.message,
            self.palette.paint(Colors::DIM, &record.id.to_string())
        );
        Ok(())
    }

    fn unmount(&mut self, id: NotificationId) -> Result<()> {
        debug!("Notification {} dismissed", id);
        Ok(())
    }
}

/// Prints a counter line whenever the shown value changes.
pub struct TerminalCounter {
    kind: CounterKind,
    palette: Palette,
    quiet: bool,
    last: Option<String>,
}

impl TerminalCounter {
    pub fn new(kind: CounterKind, display: &DisplayConfig) -> Self {
        Self {
            kind,
            palette: Palette::new(display.colored),
            quiet: display.quiet,
            last: None,
        }
    }

    fn label(&self) -> &'static str {
        match self.kind {
            CounterKind::Pending => "PENDING REQUESTS",
            CounterKind::Active => "ACTIVE SWAPS",
        }
    }
}

impl CounterDisplay for TerminalCounter {
    fn show(&mut self, text: &str) -> Result<()> {
        if self.last.as_deref() == Some(text) {
            return Ok(());
        }
        self.last = Some(text.to_string());
        if !self.quiet {
            println!(
                "{} {}",
                self.palette.tag(Colors::BRIGHT_CYAN, self.label()),
                self.palette.paint(Colors::WHITE, text)
            );
        }
        Ok(())
    }

    fn hide(&mut self) -> Result<()> {
        if self.last.take().is_some() && !self.quiet {
            println!(
                "{} {}",
                self.palette.tag(Colors::BRIGHT_CYAN, self.label()),
                self.palette.paint(Colors::DIM, "none")
            );
        }
        Ok(())
    }
}

pub struct TerminalBroadcasts {
    palette: Palette,
}

impl TerminalBroadcasts {
    pub fn new(display: &DisplayConfig) -> Self {
        Self {
            palette: Palette::new(display.colored),
        }
    }
}

impl BroadcastSink for TerminalBroadcasts {
    fn prepend(&mut self, broadcast: &PlatformBroadcast) -> Result<()> {
        let color = severity_color(broadcast.severity);
        println!();
        println!(
            "{} {} {}",
            self.palette.tag(color, "PLATFORM"),
            self.palette.paint(color, &broadcast.title),
            self.palette.paint(
                Colors::DIM,
                &broadcast.timestamp.format("%Y-%m-%d %H:%M").to_string()
            )
        );
        println!("  {}", broadcast.message);
        println!();
        Ok(())
    }

    fn evict(&mut self, broadcast: &PlatformBroadcast) -> Result<()> {
        debug!("Platform message '{}' scrolled out", broadcast.title);
        Ok(())
    }
}

pub fn print_startup_banner(display: &DisplayConfig, url: &str) {
    if display.quiet {
        return;
    }
    let palette = Palette::new(display.colored);
    println!();
    println!(
        "{}",
        palette.paint(
            Colors::BRIGHT_CYAN,
            "╔══════════════════════════════════════════════════════════╗"
        )
    );
    println!(
        "{}",
        palette.paint(
            Colors::BRIGHT_CYAN,
            "║                  SKILL SWAP LIVE CLIENT                  ║"
        )
    );
    println!(
        "{}",
        palette.paint(
            Colors::BRIGHT_CYAN,
            "╚══════════════════════════════════════════════════════════╝"
        )
    );
    println!(
        "  Version {} │ {}",
        palette.paint(Colors::BRIGHT_GREEN, env!("CARGO_PKG_VERSION")),
        palette.paint(Colors::BRIGHT_YELLOW, url)
    );
    println!();
}

pub fn print_connection_status(display: &DisplayConfig, status: &str, message: &str) {
    if display.quiet {
        return;
    }

    let (color, symbol) = match status {
        "CONNECTED" => (Colors::BRIGHT_GREEN, "+"),
        "DISCONNECTED" => (Colors::BRIGHT_RED, "X"),
        "STOPPING" => (Colors::BRIGHT_MAGENTA, "!"),
        _ => (Colors::WHITE, "-"),
    };
    let palette = Palette::new(display.colored);
    println!("{} {} {}", palette.tag(color, status), symbol, message);
}

pub fn print_suggestions(display: &DisplayConfig, query: &str, skills: &[String]) {
    let palette = Palette::new(display.colored);
    if skills.is_empty() {
        println!(
            "{} no suggestions for '{}'",
            palette.tag(Colors::DIM, "SKILLS"),
            query
        );
        return;
    }
    println!("{} {} match(es)", palette.tag(Colors::BRIGHT_CYAN, "SKILLS"), skills.len());
    for skill in skills {
        println!("  {}", skill);
    }
}

pub fn print_email_availability(
    display: &DisplayConfig,
    email: &str,
    availability: Option<&EmailAvailability>,
) {
    let palette = Palette::new(display.colored);
    match availability {
        None => println!(
            "{} '{}' is not a valid email address, not checked",
            palette.tag(Colors::BRIGHT_YELLOW, "EMAIL"),
            email
        ),
        Some(result) => {
            let color = if result.available {
                Colors::BRIGHT_GREEN
            } else {
                Colors::BRIGHT_RED
            };
            let status = if result.available { "AVAILABLE" } else { "TAKEN" };
            println!("{} {} {}", palette.tag(color, status), email, result.message);
        }
    }
}

pub fn print_validation(display: &DisplayConfig, field: Field, outcome: &std::result::Result<(), String>) {
    let palette = Palette::new(display.colored);
    match outcome {
        Ok(()) => println!("{} valid {}", palette.tag(Colors::BRIGHT_GREEN, "OK"), field),
        Err(message) => println!("{} {}", palette.tag(Colors::BRIGHT_RED, "INVALID"), message),
    }
}
