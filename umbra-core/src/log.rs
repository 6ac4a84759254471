// Copyright (c) 2019-present Dmitry Stepanov and Fyrox Engine contributors.
//
// Permission is hereby granted, free of charge, to any person obtaining a copy
// of this software and associated documentation files (the "Software"), to deal
// in the Software without restriction, including without limitation the rights
// to use, copy, modify, merge, publish, distribute, sublicense, and/or sell
// copies of the Software, and to permit persons to whom the Software is
// furnished to do so, subject to the following conditions:
//
// The above copyright notice and this permission notice shall be included in all
// copies or substantial portions of the Software.
//
// THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND, EXPRESS OR
// IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY,
// FITNESS FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT. IN NO EVENT SHALL THE
// AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM, DAMAGES OR OTHER
// LIABILITY, WHETHER IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING FROM,
// OUT OF OR IN CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER DEALINGS IN THE
// SOFTWARE.

//! Simple process-wide logger. By default, it writes to the console only. To mirror the log into
//! a file, call [`Log::set_file_name`] somewhere in your `main` function.
//!
//! The renderer is single-threaded, but the log is shared with the windowing code and user
//! callbacks, so it sits behind a mutex.

use crate::parking_lot::Mutex;
use fxhash::FxHashMap;
use std::{
    collections::hash_map::Entry,
    fmt::{Debug, Display},
    io::{self, Write},
    path::Path,
    sync::{mpsc::Sender, LazyLock},
    time::{Duration, Instant},
};

/// A message that could be sent by the logger to all listeners.
#[derive(Debug, Clone)]
pub struct LogMessage {
    /// Kind of the message: information, warning or error.
    pub kind: MessageKind,
    /// The source message without logger prefixes.
    pub content: String,
    /// Time point at which the message was recorded. It is relative to the moment when the
    /// logger was initialized.
    pub time: Duration,
}

static LOG: LazyLock<Mutex<Log>> = LazyLock::new(|| {
    Mutex::new(Log {
        file: None,
        verbosity: MessageKind::Information,
        listeners: Default::default(),
        time_origin: Instant::now(),
        one_shot_sources: Default::default(),
    })
});

/// A kind of message.
#[derive(Debug, Default, Copy, Clone, PartialOrd, PartialEq, Eq, Ord, Hash)]
#[repr(u32)]
pub enum MessageKind {
    /// Some useful information.
    #[default]
    Information = 0,
    /// A warning.
    Warning = 1,
    /// An error of some kind.
    Error = 2,
}

impl MessageKind {
    fn as_str(self) -> &'static str {
        match self {
            MessageKind::Information => "[INFO]: ",
            MessageKind::Warning => "[WARNING]: ",
            MessageKind::Error => "[ERROR]: ",
        }
    }
}

/// See module docs.
pub struct Log {
    file: Option<std::fs::File>,
    verbosity: MessageKind,
    listeners: Vec<Sender<LogMessage>>,
    time_origin: Instant,
    one_shot_sources: FxHashMap<usize, String>,
}

impl Log {
    /// Creates a new log file at the specified path.
    pub fn set_file_name<P: AsRef<Path>>(path: P) {
        LOG.lock().file = std::fs::File::create(path).ok();
    }

    fn write_internal<S>(&mut self, id: Option<usize>, kind: MessageKind, message: S) -> bool
    where
        S: AsRef<str>,
    {
        if (kind as u32) < (self.verbosity as u32) {
            return false;
        }

        let mut msg = message.as_ref().to_owned();

        if let Some(id) = id {
            match self.one_shot_sources.entry(id) {
                Entry::Occupied(mut previous) => {
                    if previous.get() == &msg {
                        return false;
                    }
                    previous.insert(msg.clone());
                }
                Entry::Vacant(entry) => {
                    entry.insert(msg.clone());
                }
            }
        }

        let time = Instant::now() - self.time_origin;

        // Notify listeners about the message and remove all disconnected listeners.
        self.listeners.retain(|listener| {
            listener
                .send(LogMessage {
                    kind,
                    content: msg.clone(),
                    time,
                })
                .is_ok()
        });

        msg.insert_str(0, kind.as_str());
        msg.insert_str(0, &format!("[{:.3}s] ", time.as_secs_f32()));

        if kind == MessageKind::Error {
            let _ = io::stderr().write_all(msg.as_bytes());
        } else {
            let _ = io::stdout().write_all(msg.as_bytes());
        }

        if let Some(log_file) = self.file.as_mut() {
            let _ = log_file.write_all(msg.as_bytes());
            let _ = log_file.flush();
        }

        true
    }

    fn writeln_internal<S>(&mut self, id: Option<usize>, kind: MessageKind, message: S) -> bool
    where
        S: AsRef<str>,
    {
        let mut msg = message.as_ref().to_owned();
        msg.push('\n');
        self.write_internal(id, kind, msg)
    }

    /// Writes a string to the console and optionally into the file (if set).
    pub fn write<S>(kind: MessageKind, msg: S)
    where
        S: AsRef<str>,
    {
        LOG.lock().write_internal(None, kind, msg);
    }

    /// Writes a string to the console and optionally into the file (if set), adds a new line to the
    /// end of the message.
    pub fn writeln<S>(kind: MessageKind, msg: S)
    where
        S: AsRef<str>,
    {
        LOG.lock().writeln_internal(None, kind, msg);
    }

    /// Same as [`Self::writeln`], but prints the message only once per given id while the message
    /// stays the same. Useful for per-frame diagnostics that would flood the log otherwise.
    pub fn writeln_once<S>(id: usize, kind: MessageKind, msg: S) -> bool
    where
        S: AsRef<str>,
    {
        LOG.lock().writeln_internal(Some(id), kind, msg)
    }

    /// Writes an information message.
    pub fn info<S>(msg: S)
    where
        S: AsRef<str>,
    {
        Self::writeln(MessageKind::Information, msg)
    }

    /// Writes a warning message.
    pub fn warn<S>(msg: S)
    where
        S: AsRef<str>,
    {
        Self::writeln(MessageKind::Warning, msg)
    }

    /// Writes error message.
    pub fn err<S>(msg: S)
    where
        S: AsRef<str>,
    {
        Self::writeln(MessageKind::Error, msg)
    }

    /// Writes a warning message once. See [`Self::writeln_once`] for more info.
    pub fn warn_once<S>(id: usize, msg: S) -> bool
    where
        S: AsRef<str>,
    {
        Self::writeln_once(id, MessageKind::Warning, msg)
    }

    /// Sets verbosity level.
    pub fn set_verbosity(kind: MessageKind) {
        LOG.lock().verbosity = kind;
    }

    /// Adds a listener that will receive a copy of every message passed into the log.
    pub fn add_listener(listener: Sender<LogMessage>) {
        LOG.lock().listeners.push(listener)
    }

    /// Allows you to verify that the result of the operation is Ok, or print the error in the log.
    ///
    /// # Use cases
    ///
    /// Typical use case for this method is that when you _can_ ignore errors, but want them to
    /// be in the log.
    pub fn verify<T, E>(result: Result<T, E>)
    where
        E: Debug,
    {
        if let Err(e) = result {
            Self::writeln(
                MessageKind::Error,
                format!("Operation failed! Reason: {e:?}"),
            );
        }
    }

    /// Same as [`Self::verify`], but with a custom message prefix.
    pub fn verify_message<S, T, E>(result: Result<T, E>, msg: S)
    where
        E: Debug,
        S: Display,
    {
        if let Err(e) = result {
            Self::writeln(MessageKind::Error, format!("{msg}. Reason: {e:?}"));
        }
    }
}

#[cfg(test)]
mod test {
    use super::{Log, MessageKind};
    use std::sync::mpsc::channel;

    #[test]
    fn test_one_shot_messages_are_deduplicated() {
        // Id is unique to this test, the log is global.
        let id = 0xDEAD_0001;
        assert!(Log::writeln_once(id, MessageKind::Warning, "light array overflow"));
        assert!(!Log::writeln_once(id, MessageKind::Warning, "light array overflow"));
        assert!(Log::writeln_once(id, MessageKind::Warning, "another overflow"));
    }

    #[test]
    fn test_listener_receives_content_without_prefix() {
        let (tx, rx) = channel();
        Log::add_listener(tx);
        Log::writeln(MessageKind::Error, "listener check");
        let received = rx
            .try_iter()
            .find(|m| m.content.starts_with("listener check"));
        let message = received.expect("listener must get the message");
        assert_eq!(message.kind, MessageKind::Error);
        assert_eq!(message.content, "listener check\n");
    }
}
