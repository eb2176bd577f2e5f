use std::time::Duration;

pub const RESET: &str = "\x1b[0m";
pub const BLUE: &str = "\x1b[34m";
pub const GREEN: &str = "\x1b[32m";
pub const CYAN: &str = "\x1b[36m";
pub const YELLOW: &str = "\x1b[33m";
pub const MAGENTA: &str = "\x1b[35m";

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Event {
    Info,
    TotalElapsed,
    WriteHeader,
    FilterRows,
    Deflate,
    FlushChunks,
}

impl Event {
    const fn color(&self) -> &'static str {
        match self {
            Self::Info => "",
            Self::TotalElapsed => YELLOW,
            Self::WriteHeader => MAGENTA,
            Self::FilterRows => BLUE,
            Self::Deflate => GREEN,
            Self::FlushChunks => CYAN,
        }
    }
}

pub fn format_event(msg: &str, event: Event, duration: Option<Duration>) -> String {
    match duration {
        Some(duration) => format!("{}{:?}\t{:?}\t{}", event.color(), duration, event, msg),
        None => format!("{}{:?}\t{}", event.color(), event, msg),
    }
}

pub fn log_event(msg: &str, event: Event, duration: Option<Duration>) {
    println!("{}", format_event(msg, event, duration));

    if matches!(event, Event::TotalElapsed) {
        println!("{RESET}");
    }
}
