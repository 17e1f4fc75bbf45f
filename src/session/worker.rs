//! The tail/ship loop owned by one session.

use std::{io, time::Instant};

use crossbeam_channel::Sender;
use log::{debug, error, info, warn};

use crate::{
    buffer::{DrainOutcome, RetryBuffer},
    config::Session,
    error::ShipError,
    line::{BufferedLine, SystemMarker},
    reconnect::{BackoffPolicy, ReconnectPhase, ReconnectSupervisor},
    shipper,
    source::LineSource,
    transport::{self, Connection, ConnectionState},
};

use super::{SessionEvent, SessionOutcome, StopToken};

/// Exclusive owner of one session's connection, buffer and sources.
pub(super) struct Worker {
    session: Session,
    source: Box<dyn LineSource>,
    buffer: RetryBuffer,
    supervisor: ReconnectSupervisor,
    connection: Option<Connection>,
    state: ConnectionState,
    stop: StopToken,
    events: Option<Sender<SessionEvent>>,
    last_sent: Instant,
}

impl Worker {
    /// Prepare the worker. Overflow left by a previous run is loaded here,
    /// before the source is consulted.
    pub(super) fn new(
        session: Session,
        source: Box<dyn LineSource>,
        stop: StopToken,
        events: Option<Sender<SessionEvent>>,
    ) -> io::Result<Self> {
        let buffer = RetryBuffer::open(
            session.buffer_capacity,
            session.overflow_path(),
            session.drain_delay,
        )?;
        let supervisor = ReconnectSupervisor::new(BackoffPolicy::new(
            session.reconnect_delay,
            session.max_reconnect_attempts,
        ));
        Ok(Self {
            session,
            source,
            buffer,
            supervisor,
            connection: None,
            state: ConnectionState::Disconnected,
            stop,
            events,
            last_sent: Instant::now(),
        })
    }

    pub(super) fn run(mut self) -> SessionOutcome {
        info!(
            "logship: session {} shipping {} files to {}",
            self.session.client_identity,
            self.session.log_files.len(),
            self.session.peer()
        );
        self.ensure_connected();
        self.dispatch(BufferedLine::system(
            SystemMarker::MonitorStart,
            self.session.client_identity.as_str(),
        ));
        for line in self.source.backlog() {
            self.dispatch(line);
        }

        let outcome = loop {
            if self.stop.is_stopped() {
                break SessionOutcome::Stopped;
            }
            self.ensure_connected();
            if self.supervisor.phase() == ReconnectPhase::GivenUp {
                break SessionOutcome::GaveUp {
                    attempts: self.supervisor.attempts(),
                };
            }
            self.replay();
            for line in self.source.produce() {
                self.dispatch(line);
            }
            self.heartbeat_if_idle();
            if self.stop.wait(self.session.poll_interval) {
                break SessionOutcome::Stopped;
            }
        };
        self.shutdown(outcome)
    }

    fn emit(&self, event: SessionEvent) {
        if let Some(tx) = &self.events {
            let _ = tx.try_send(event);
        }
    }

    fn set_state(&mut self, state: ConnectionState) {
        if self.state != state {
            debug!("logship: connection {:?} -> {:?}", self.state, state);
            self.state = state;
        }
    }

    fn ensure_connected(&mut self) {
        if self.connection.is_some() {
            return;
        }
        let Some(attempt) = self.supervisor.begin_attempt(Instant::now()) else {
            return;
        };
        self.set_state(ConnectionState::Connecting);
        info!(
            "logship: connecting to {} (attempt {attempt}/{}, {} lines buffered)",
            self.session.peer(),
            self.session.max_reconnect_attempts,
            self.buffer.len()
        );
        self.emit(SessionEvent::Connecting { attempt });

        match transport::connect(&self.session) {
            Ok(conn) => {
                self.supervisor.record_success();
                self.connection = Some(conn);
                self.set_state(ConnectionState::Authenticated);
                self.last_sent = Instant::now();
                self.emit(SessionEvent::Connected);
            }
            Err(err) => {
                self.supervisor.record_failure();
                self.set_state(ConnectionState::Failed);
                if self.supervisor.phase() == ReconnectPhase::GivenUp {
                    error!(
                        "logship: giving up on {} after {attempt} attempts: {err}; {} lines buffered",
                        self.session.peer(),
                        self.buffer.len()
                    );
                    self.emit(SessionEvent::GaveUp { attempts: attempt });
                } else {
                    let retry_in = self.supervisor.current_delay();
                    warn!(
                        "logship: connection attempt {attempt} to {} failed: {err}; reconnecting in {retry_in:?} ({} lines buffered)",
                        self.session.peer(),
                        self.buffer.len()
                    );
                    self.emit(SessionEvent::ConnectFailed { attempt, retry_in });
                }
            }
        }
    }

    fn disconnect(&mut self, err: &ShipError) {
        if let Some(conn) = self.connection.take() {
            conn.close();
        }
        self.supervisor.record_disconnect();
        self.set_state(ConnectionState::Disconnected);
        warn!(
            "logship: lost connection to {}: {err}; buffering ({} lines buffered)",
            self.session.peer(),
            self.buffer.len()
        );
        self.emit(SessionEvent::Disconnected {
            buffered: self.buffer.len(),
        });
    }

    /// Ship `line` now if the connection is up and nothing older is waiting;
    /// otherwise buffer it. Nothing is sent once a stop was requested.
    fn dispatch(&mut self, line: BufferedLine) {
        if !self.buffer.is_empty() || self.stop.is_stopped() {
            self.buffer.offer(line);
            return;
        }
        let Some(conn) = self.connection.as_mut() else {
            self.buffer.offer(line);
            return;
        };
        match shipper::send(
            conn,
            &line.source_path,
            &line.text,
            self.session.confirm_timeout,
        ) {
            Ok(()) => self.last_sent = Instant::now(),
            Err(err) => {
                self.buffer.offer(line);
                self.disconnect(&err);
            }
        }
    }

    /// Drain the retry buffer ahead of any newly produced lines.
    fn replay(&mut self) {
        if self.buffer.is_empty() {
            return;
        }
        let Some(conn) = self.connection.as_mut() else {
            return;
        };
        let timeout = self.session.confirm_timeout;
        let stop = &self.stop;
        let outcome = self.buffer.drain(
            || !stop.is_stopped(),
            |line| shipper::send(conn, &line.source_path, &line.text, timeout),
        );
        match outcome {
            DrainOutcome::Flushed => {
                self.last_sent = Instant::now();
                self.emit(SessionEvent::Replayed);
            }
            DrainOutcome::Interrupted => {
                debug!("logship: replay interrupted by stop request");
            }
            DrainOutcome::Failed(err) => self.disconnect(&err),
            // The connection is fine; the file is retried next tick.
            DrainOutcome::OverflowUnreadable(_) => {}
        }
    }

    fn heartbeat_if_idle(&mut self) {
        let Some(interval) = self.session.heartbeat_interval else {
            return;
        };
        if self.connection.is_some() && self.last_sent.elapsed() >= interval {
            debug!("logship: sending heartbeat to {}", self.session.peer());
            self.dispatch(BufferedLine::system(
                SystemMarker::Heartbeat,
                self.session.client_identity.as_str(),
            ));
        }
    }

    fn shutdown(mut self, outcome: SessionOutcome) -> SessionOutcome {
        if let Some(mut conn) = self.connection.take() {
            if self.buffer.is_empty() {
                let stop = BufferedLine::system(
                    SystemMarker::MonitorStop,
                    self.session.client_identity.as_str(),
                );
                if let Err(err) = shipper::send(
                    &mut conn,
                    &stop.source_path,
                    &stop.text,
                    self.session.confirm_timeout,
                ) {
                    debug!("logship: stop marker not delivered: {err}");
                }
            }
            conn.close();
        }
        self.set_state(ConnectionState::Disconnected);
        self.source.close();

        match self.buffer.persist() {
            Ok(0) => {}
            Ok(saved) => info!(
                "logship: saved {saved} buffered lines to {}",
                self.session.overflow_path().display()
            ),
            Err(err) => error!(
                "logship: could not save {} buffered lines: {err}",
                self.buffer.in_memory()
            ),
        }
        let buffered = self.buffer.len();
        match outcome {
            SessionOutcome::Stopped => {
                info!("logship: session stopped ({buffered} lines buffered)");
            }
            SessionOutcome::GaveUp { attempts } => {
                error!("logship: session ended after {attempts} failed connection attempts ({buffered} lines buffered)");
            }
        }
        self.emit(SessionEvent::Stopped { buffered });
        outcome
    }
}
