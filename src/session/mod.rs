//! Shipping sessions.
//!
//! A [`ShippingSession`] owns one connection, one retry buffer, one reconnect
//! supervisor and one [`LineSource`]. [`ShippingSession::run`] drives the loop
//! on the calling thread; [`ShippingSession::spawn`] moves it onto a dedicated
//! worker thread and returns a [`SessionHandle`]. Independent sessions share
//! nothing, so several may run side by side in one process.

mod stop;
mod worker;

pub use stop::StopToken;

use std::{fmt, io, thread, time::Duration};

use crossbeam_channel::Sender;
use parking_lot::Mutex;

use crate::{
    config::Session,
    source::{FileTailSource, LineSource},
};

use worker::Worker;

/// State transitions published to an optional observer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SessionEvent {
    Connecting { attempt: u32 },
    /// Connected and, when a password is configured, authenticated.
    Connected,
    ConnectFailed { attempt: u32, retry_in: Duration },
    /// An established connection broke; lines are being buffered.
    Disconnected { buffered: usize },
    /// Every buffered line was shipped.
    Replayed,
    GaveUp { attempts: u32 },
    /// The worker finished; `buffered` lines remain for the next run.
    Stopped { buffered: usize },
}

/// How a session ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionOutcome {
    /// A stop was requested.
    Stopped,
    /// The reconnect attempt cap was reached.
    GaveUp { attempts: u32 },
}

/// A configured, not yet running, session.
pub struct ShippingSession {
    session: Session,
    source: Option<Box<dyn LineSource>>,
    events: Option<Sender<SessionEvent>>,
    stop: StopToken,
}

impl ShippingSession {
    /// Ship the files named by `session`.
    pub fn new(session: Session) -> Self {
        Self {
            session,
            source: None,
            events: None,
            stop: StopToken::new(),
        }
    }

    /// Replace the default file tailer with another producer.
    pub fn with_source(mut self, source: Box<dyn LineSource>) -> Self {
        self.source = Some(source);
        self
    }

    /// Publish [`SessionEvent`]s on `events`. Full channels drop events.
    pub fn with_events(mut self, events: Sender<SessionEvent>) -> Self {
        self.events = Some(events);
        self
    }

    /// Share `stop` with the session instead of a private token.
    pub fn with_stop_token(mut self, stop: StopToken) -> Self {
        self.stop = stop;
        self
    }

    pub fn stop_token(&self) -> StopToken {
        self.stop.clone()
    }

    fn into_worker(self) -> io::Result<Worker> {
        let Self {
            session,
            source,
            events,
            stop,
        } = self;
        let source = source.unwrap_or_else(|| Box::new(FileTailSource::for_session(&session)));
        Worker::new(session, source, stop, events)
    }

    /// Run the session on the current thread until stopped or given up.
    ///
    /// Fails only when the overflow file left by a previous run cannot be
    /// read.
    pub fn run(self) -> io::Result<SessionOutcome> {
        Ok(self.into_worker()?.run())
    }

    /// Run the session on a dedicated thread.
    pub fn spawn(self) -> io::Result<SessionHandle> {
        let name = format!("logship-{}", self.session.client_identity);
        let stop = self.stop.clone();
        let worker = self.into_worker()?;
        let handle = thread::Builder::new()
            .name(name)
            .spawn(move || worker.run())?;
        Ok(SessionHandle {
            stop,
            handle: Mutex::new(Some(handle)),
        })
    }
}

impl fmt::Debug for ShippingSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ShippingSession")
            .field("session", &self.session)
            .field("custom_source", &self.source.is_some())
            .finish()
    }
}

/// Handle to a session running on its own thread.
///
/// Dropping the handle stops the session and waits for it to finish.
pub struct SessionHandle {
    stop: StopToken,
    handle: Mutex<Option<thread::JoinHandle<SessionOutcome>>>,
}

impl SessionHandle {
    /// Request a stop without waiting.
    pub fn stop(&self) {
        self.stop.stop();
    }

    pub fn stop_token(&self) -> StopToken {
        self.stop.clone()
    }

    pub fn is_finished(&self) -> bool {
        self.handle
            .lock()
            .as_ref()
            .is_none_or(thread::JoinHandle::is_finished)
    }

    /// Wait for the worker to finish. Returns `None` when it was already
    /// joined or panicked.
    pub fn join(&self) -> Option<SessionOutcome> {
        let handle = self.handle.lock().take()?;
        match handle.join() {
            Ok(outcome) => Some(outcome),
            Err(_) => {
                log::warn!("logship: session worker thread panicked");
                None
            }
        }
    }
}

impl Drop for SessionHandle {
    fn drop(&mut self) {
        self.stop();
        self.join();
    }
}

impl fmt::Debug for SessionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionHandle")
            .field("stopped", &self.stop.is_stopped())
            .finish()
    }
}
