#[cfg(test)]
use std::cell::RefCell;
use std::fs::{File, create_dir_all};
use std::io::{self, Write};
use std::path::Path;
#[cfg(test)]
use std::rc::Rc;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Log event types that determine which receivers should log the message
/// Ordered from the most detailed (Auction) to the least detailed (Validation)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogEvent {
    /// Per-round clearing data (all submitted bids, allocation, prices)
    Auction,
    /// Per-round agent decisions (target slot, solved bid, participation draw)
    Round,
    /// Per-agent summaries at the end of a run (spend, clicks, estimates)
    Agent,
    /// Scenario-level data (validation checks with their numbers)
    Scenario,
    /// Validation results (pass/fail lines)
    Validation,
}

impl LogEvent {
    /// This event and every less detailed event above it
    /// Warnings and errors are delivered to all of them
    fn with_upward(self) -> &'static [LogEvent] {
        match self {
            LogEvent::Auction => &[LogEvent::Auction, LogEvent::Round, LogEvent::Agent, LogEvent::Scenario, LogEvent::Validation],
            LogEvent::Round => &[LogEvent::Round, LogEvent::Agent, LogEvent::Scenario, LogEvent::Validation],
            LogEvent::Agent => &[LogEvent::Agent, LogEvent::Scenario, LogEvent::Validation],
            LogEvent::Scenario => &[LogEvent::Scenario, LogEvent::Validation],
            LogEvent::Validation => &[LogEvent::Validation],
        }
    }
}

/// Trait for log receivers that can receive log messages
pub trait LogReceiver {
    /// Check if this receiver should handle the given log event
    fn should_log(&self, event: LogEvent) -> bool;

    /// Write a string to this receiver
    fn write(&mut self, s: &str) -> io::Result<()>;

    /// Flush this receiver
    fn flush(&mut self) -> io::Result<()>;
}

/// Console log receiver (writes to stdout)
pub struct ConsoleReceiver {
    enabled_events: Vec<LogEvent>,
}

impl ConsoleReceiver {
    /// Create a new console receiver, boxed and ready to be added to a logger
    pub fn new(enabled_events: Vec<LogEvent>) -> Box<dyn LogReceiver> {
        Box::new(Self { enabled_events })
    }
}

impl LogReceiver for ConsoleReceiver {
    fn should_log(&self, event: LogEvent) -> bool {
        self.enabled_events.contains(&event)
    }

    fn write(&mut self, s: &str) -> io::Result<()> {
        print!("{}", s);
        io::stdout().flush()
    }

    fn flush(&mut self) -> io::Result<()> {
        io::stdout().flush()
    }
}

/// File log receiver
pub struct FileReceiver {
    file: File,
    enabled_events: Vec<LogEvent>,
}

impl FileReceiver {
    /// Create a file receiver writing to `path`
    /// The file is truncated if it exists and parent directories are created
    pub fn new(path: &Path, enabled_events: Vec<LogEvent>) -> io::Result<Box<dyn LogReceiver>> {
        if let Some(parent) = path.parent() {
            create_dir_all(parent)?;
        }
        let file = File::create(path)?;
        Ok(Box::new(Self { file, enabled_events }))
    }
}

impl LogReceiver for FileReceiver {
    fn should_log(&self, event: LogEvent) -> bool {
        self.enabled_events.contains(&event)
    }

    fn write(&mut self, s: &str) -> io::Result<()> {
        write!(self.file, "{}", s)?;
        self.file.flush()
    }

    fn flush(&mut self) -> io::Result<()> {
        self.file.flush()
    }
}

/// In-memory receiver; the buffer handle stays readable after the receiver is boxed
#[cfg(test)]
pub struct MemoryReceiver {
    buffer: Rc<RefCell<String>>,
    enabled_events: Vec<LogEvent>,
}

#[cfg(test)]
impl MemoryReceiver {
    pub fn new(enabled_events: Vec<LogEvent>) -> (Box<dyn LogReceiver>, Rc<RefCell<String>>) {
        let buffer = Rc::new(RefCell::new(String::new()));
        let receiver = Box::new(Self { buffer: Rc::clone(&buffer), enabled_events });
        (receiver, buffer)
    }
}

#[cfg(test)]
impl LogReceiver for MemoryReceiver {
    fn should_log(&self, event: LogEvent) -> bool {
        self.enabled_events.contains(&event)
    }

    fn write(&mut self, s: &str) -> io::Result<()> {
        self.buffer.borrow_mut().push_str(s);
        Ok(())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Unique identifier for a receiver
pub type ReceiverId = usize;

static RECEIVER_ID_COUNTER: AtomicUsize = AtomicUsize::new(1);

/// Logger that fans messages out to its receivers by event
pub struct Logger {
    receivers: Vec<(ReceiverId, Box<dyn LogReceiver>)>,
}

impl Logger {
    pub fn new() -> Self {
        Self {
            receivers: Vec::new(),
        }
    }

    /// Add a receiver to the logger and return its unique ID
    pub fn add_receiver(&mut self, receiver: Box<dyn LogReceiver>) -> ReceiverId {
        let id = RECEIVER_ID_COUNTER.fetch_add(1, Ordering::Relaxed);
        self.receivers.push((id, receiver));
        id
    }

    pub fn remove_receiver(&mut self, id: ReceiverId) {
        self.receivers.retain(|(receiver_id, _)| *receiver_id != id);
    }

    /// Write a message to receivers listening to `event`
    pub fn log(&mut self, event: LogEvent, message: &str) -> io::Result<()> {
        for (_, receiver) in &mut self.receivers {
            if receiver.should_log(event) {
                receiver.write(message)?;
            }
        }
        Ok(())
    }

    pub fn logln(&mut self, event: LogEvent, message: &str) -> io::Result<()> {
        self.log(event, &format!("{}\n", message))
    }

    /// Write a prefixed line to every receiver listening to `event` or any event above it
    /// Each receiver gets the line once even if it listens to several of those events
    fn log_upward(&mut self, event: LogEvent, prefix: &str, message: &str) -> io::Result<()> {
        let events = event.with_upward();
        let line = format!("{} {}\n", prefix, message);
        for (_, receiver) in &mut self.receivers {
            if events.iter().any(|&e| receiver.should_log(e)) {
                receiver.write(&line)?;
            }
        }
        Ok(())
    }

    /// Error line, delivered to `event` and all events above it
    pub fn errln(&mut self, event: LogEvent, message: &str) -> io::Result<()> {
        self.log_upward(event, "ERROR", message)
    }

    /// Warning line, delivered to `event` and all events above it
    pub fn warnln(&mut self, event: LogEvent, message: &str) -> io::Result<()> {
        self.log_upward(event, "WARNING", message)
    }

    pub fn flush(&mut self) -> io::Result<()> {
        for (_, receiver) in &mut self.receivers {
            receiver.flush()?;
        }
        Ok(())
    }
}

impl Default for Logger {
    fn default() -> Self {
        Self::new()
    }
}

/// Sanitize a string to be used as a filename
pub fn sanitize_filename(name: &str) -> String {
    name.chars()
        .map(|c| match c {
            ' ' | '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            _ => c,
        })
        .collect()
}

/// Log a formatted line (like println! but for logger)
#[macro_export]
macro_rules! logln {
    ($logger:expr, $event:expr, $($arg:tt)*) => {
        {
            let _ = $logger.logln($event, &format!($($arg)*));
        }
    };
}

/// Log a formatted string without newline (like print! but for logger)
#[macro_export]
macro_rules! log {
    ($logger:expr, $event:expr, $($arg:tt)*) => {
        {
            let _ = $logger.log($event, &format!($($arg)*));
        }
    };
}

/// Log an ERROR line to the event and all events above it
#[macro_export]
macro_rules! errln {
    ($logger:expr, $event:expr, $($arg:tt)*) => {
        {
            let _ = $logger.errln($event, &format!($($arg)*));
        }
    };
}

/// Log a WARNING line to the event and all events above it
#[macro_export]
macro_rules! warnln {
    ($logger:expr, $event:expr, $($arg:tt)*) => {
        {
            let _ = $logger.warnln($event, &format!($($arg)*));
        }
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_filename() {
        assert_eq!(sanitize_filename("test name"), "test_name");
        assert_eq!(sanitize_filename("test/name"), "test_name");
        assert_eq!(sanitize_filename("budget:participation"), "budget_participation");
    }

    #[test]
    fn test_receiver_filters_by_event() {
        let mut logger = Logger::new();
        let (receiver, buffer) = MemoryReceiver::new(vec![LogEvent::Agent]);
        logger.add_receiver(receiver);

        logln!(logger, LogEvent::Round, "round detail");
        logln!(logger, LogEvent::Agent, "agent summary");

        assert_eq!(buffer.borrow().as_str(), "agent summary\n");
    }

    #[test]
    fn test_warnings_reach_upward_receivers_once() {
        let mut logger = Logger::new();
        let (receiver, buffer) = MemoryReceiver::new(vec![LogEvent::Scenario, LogEvent::Validation]);
        logger.add_receiver(receiver);

        warnln!(logger, LogEvent::Round, "zero click differential");
        logln!(logger, LogEvent::Round, "not delivered");

        assert_eq!(buffer.borrow().as_str(), "WARNING zero click differential\n");
    }

    #[test]
    fn test_remove_receiver() {
        let mut logger = Logger::new();
        let (receiver, buffer) = MemoryReceiver::new(vec![LogEvent::Validation]);
        let id = logger.add_receiver(receiver);
        logger.remove_receiver(id);

        logln!(logger, LogEvent::Validation, "dropped");

        assert!(buffer.borrow().is_empty());
    }
}
