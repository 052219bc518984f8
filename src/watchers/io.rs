//! # I/O readiness watcher.
//!
//! Fires [`Event::READ`] and/or [`Event::WRITE`] with payload `Some(fd)` when the
//! watched descriptor becomes ready. An error condition on the descriptor fires
//! [`Event::ERROR`] together with the requested direction bits.
//!
//! ## Normalization
//! - `fd < 0` → unassigned (`-1`), disabled
//! - mask without `READ`/`WRITE` bits → disabled
//!
//! ## Registration
//! The loop watches a private duplicate of the descriptor (`F_DUPFD_CLOEXEC`), so the
//! caller keeps ownership of `fd` and several targets may watch the same descriptor.
//! Readiness is sampled at registration time: restarting the watcher after a delivery
//! reports data that is still pending, which gives level-triggered behavior at the
//! dispatcher level.
//!
//! The duplicate lives inside the armed watch future, so stopping or restarting the
//! watcher deregisters and closes it immediately.

use std::io;
use std::os::fd::{FromRawFd, OwnedFd, RawFd};

use tokio::io::unix::AsyncFd;
use tokio::io::{Interest, Ready};
use tracing::{debug, warn};

use crate::core::event_loop::Loop;
use crate::events::Event;

use super::arm::{Arm, Notify, Ticket};

/// Watcher over descriptor readiness.
#[derive(Debug)]
pub struct IoWatcher {
    arm: Arm,
    fd: RawFd,
    mask: Event,
}

impl IoWatcher {
    pub(crate) fn new(event_loop: Loop, notify: Notify) -> Self {
        Self {
            arm: Arm::new(event_loop, notify),
            fd: -1,
            mask: Event::empty(),
        }
    }

    /// Returns the watched descriptor, `-1` when unassigned.
    pub fn fileno(&self) -> RawFd {
        self.fd
    }

    /// Returns the configured interest mask.
    pub fn mask(&self) -> Event {
        self.mask
    }

    /// Returns true while the watcher is armed.
    pub fn is_active(&self) -> bool {
        self.arm.is_active()
    }

    /// (Re)starts watching `fd` for `mask`; returns the resulting active state.
    pub fn start(&mut self, fd: RawFd, mask: Event) -> bool {
        self.arm.disarm();
        self.fd = if fd < 0 { -1 } else { fd };
        self.mask = mask.io_interest();
        if self.fd < 0 || self.mask.is_empty() {
            return false;
        }

        match self.register() {
            Ok(source) => {
                let (fd, mask) = (self.fd, self.mask);
                self.arm
                    .arm_task(move |ticket| watch_readiness(ticket, source, fd, mask));
            }
            Err(err) => {
                warn!(fd = self.fd, error = %err, "cannot watch descriptor");
            }
        }
        self.is_active()
    }

    /// Restarts with the last descriptor and mask.
    pub fn resume(&mut self) -> bool {
        self.start(self.fd, self.mask)
    }

    /// Stops watching; no-op when inactive.
    pub fn stop(&mut self) {
        self.arm.disarm();
    }

    fn register(&self) -> io::Result<AsyncFd<OwnedFd>> {
        let _guard = self.arm.event_loop().enter();
        let source = duplicate(self.fd)?;
        // SAFETY: `source` is a descriptor we own outright; the AsyncFd takes it and
        // nothing else can close or replace it while registered.
        let registered = unsafe { AsyncFd::register_with_interest(source, interest(self.mask)) };
        Ok(registered?)
    }
}

fn duplicate(fd: RawFd) -> io::Result<OwnedFd> {
    // SAFETY: fcntl only inspects the descriptor table; an invalid `fd` yields EBADF.
    let dup = unsafe { libc::fcntl(fd, libc::F_DUPFD_CLOEXEC, 0) };
    if dup < 0 {
        return Err(io::Error::last_os_error());
    }
    // SAFETY: `dup` was just created by fcntl and is owned by nothing else.
    Ok(unsafe { OwnedFd::from_raw_fd(dup) })
}

fn interest(mask: Event) -> Interest {
    let direction = match (mask.contains(Event::READ), mask.contains(Event::WRITE)) {
        (true, true) => Interest::READABLE | Interest::WRITABLE,
        (true, false) => Interest::READABLE,
        _ => Interest::WRITABLE,
    };
    direction | Interest::ERROR
}

fn translate(ready: Ready, mask: Event) -> Event {
    let mut events = Event::empty();
    if mask.contains(Event::READ) && (ready.is_readable() || ready.is_read_closed()) {
        events |= Event::READ;
    }
    if mask.contains(Event::WRITE) && (ready.is_writable() || ready.is_write_closed()) {
        events |= Event::WRITE;
    }
    if ready.is_error() {
        events |= Event::ERROR | mask;
    }
    events
}

async fn watch_readiness(ticket: Ticket, source: AsyncFd<OwnedFd>, fd: RawFd, mask: Event) {
    let interest = interest(mask);
    loop {
        let events = match source.ready(interest).await {
            Ok(mut guard) => {
                let events = translate(guard.ready(), mask);
                guard.clear_ready();
                events
            }
            Err(err) => {
                debug!(fd, error = %err, "readiness polling failed");
                ticket.fire_once(Event::ERROR, Some(fd));
                return;
            }
        };
        if events.is_empty() {
            continue;
        }
        if !ticket.fire(events, Some(fd)) {
            return;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::io::{Read, Write};
    use std::net::UdpSocket;
    use std::os::fd::AsRawFd;
    use std::os::unix::net::UnixStream;
    use std::rc::Rc;

    use crate::watchers::TimerWatcher;

    type Log = Rc<RefCell<Vec<(Event, Option<i32>)>>>;

    fn recording(ev: &Loop) -> (IoWatcher, Log) {
        let log: Log = Rc::new(RefCell::new(Vec::new()));
        let (sink, handle) = (log.clone(), ev.clone());
        let notify: Notify = Rc::new(move |event, payload| {
            sink.borrow_mut().push((event, payload));
            handle.stop();
        });
        (IoWatcher::new(ev.clone(), notify), log)
    }

    #[test]
    fn test_invalid_parameters_disable() {
        let ev = Loop::new().unwrap();
        let (mut io, _) = recording(&ev);
        let (a, _b) = UnixStream::pair().unwrap();

        assert!(!io.start(-3, Event::READ));
        assert_eq!(io.fileno(), -1);
        assert!(!io.start(a.as_raw_fd(), Event::empty()));
        assert!(!io.start(a.as_raw_fd(), Event::TIMER));
        assert!(!io.is_active());
    }

    #[test]
    fn test_unopened_descriptor_is_rejected() {
        let ev = Loop::new().unwrap();
        let (mut io, _) = recording(&ev);

        assert!(!io.start(1 << 30, Event::READ));
        assert_eq!(io.fileno(), 1 << 30);
        assert!(!io.is_active());
    }

    #[test]
    fn test_read_readiness_delivers_fd_payload() {
        let ev = Loop::new().unwrap();
        let (mut io, log) = recording(&ev);
        let (reader, mut writer) = UnixStream::pair().unwrap();

        assert!(io.start(reader.as_raw_fd(), Event::READ));
        writer.write_all(b"ping").unwrap();
        ev.run().unwrap();

        let log = log.borrow();
        assert_eq!(log.len(), 1);
        assert!(log[0].0.contains(Event::READ));
        assert!(!log[0].0.contains(Event::WRITE));
        assert_eq!(log[0].1, Some(reader.as_raw_fd()));
    }

    #[test]
    fn test_restart_reports_pending_data_again() {
        let ev = Loop::new().unwrap();
        let (mut io, log) = recording(&ev);
        let (reader, mut writer) = UnixStream::pair().unwrap();
        writer.write_all(b"unread").unwrap();

        assert!(io.start(reader.as_raw_fd(), Event::READ));
        ev.run().unwrap();
        io.stop();
        assert!(io.resume());
        ev.run().unwrap();

        assert_eq!(log.borrow().len(), 2);
        assert_eq!(io.mask(), Event::READ);
    }

    #[test]
    fn test_interest_always_includes_errors() {
        assert!(interest(Event::READ).is_error());
        assert!(interest(Event::WRITE).is_error());
        assert!(interest(Event::READ | Event::WRITE).is_readable());
    }

    #[test]
    fn test_error_readiness_carries_requested_direction() {
        assert_eq!(translate(Ready::ERROR, Event::READ), Event::ERROR | Event::READ);
        assert_eq!(
            translate(Ready::ERROR, Event::READ | Event::WRITE),
            Event::ERROR | Event::READ | Event::WRITE
        );
        assert_eq!(translate(Ready::WRITABLE, Event::READ), Event::empty());
    }

    #[test]
    fn test_stop_closes_duplicate_without_running_loop() {
        let ev = Loop::new().unwrap();
        let (mut io, _) = recording(&ev);
        let (watched, mut peer) = UnixStream::pair().unwrap();

        assert!(io.start(watched.as_raw_fd(), Event::READ));
        io.stop();
        drop(watched);

        peer.set_nonblocking(true).unwrap();
        let mut buf = [0u8; 4];
        assert_eq!(peer.read(&mut buf).unwrap(), 0);
    }

    #[test]
    fn test_repeated_restarts_keep_no_duplicates_open() {
        let ev = Loop::new().unwrap();
        let (mut io, _) = recording(&ev);
        let (watched, mut peer) = UnixStream::pair().unwrap();

        assert!(io.start(watched.as_raw_fd(), Event::READ | Event::WRITE));
        for _ in 0..64 {
            io.stop();
            assert!(io.resume());
        }
        drop(io);
        drop(watched);

        peer.set_nonblocking(true).unwrap();
        let mut buf = [0u8; 4];
        assert_eq!(peer.read(&mut buf).unwrap(), 0);
    }

    #[test]
    fn test_socket_error_fires_error_with_read() {
        let ev = Loop::new().unwrap();
        let (mut io, log) = recording(&ev);

        let closed = UdpSocket::bind("127.0.0.1:0").unwrap();
        let port = closed.local_addr().unwrap().port();
        drop(closed);
        let socket = UdpSocket::bind("127.0.0.1:0").unwrap();
        socket.connect(("127.0.0.1", port)).unwrap();
        socket.send(b"x").unwrap();

        let handle = ev.clone();
        let mut deadline = TimerWatcher::new(ev.clone(), Rc::new(move |_, _| handle.stop()));
        assert!(deadline.start(2.0, 0.0));
        assert!(io.start(socket.as_raw_fd(), Event::READ));
        ev.run().unwrap();

        let log = log.borrow();
        assert_eq!(log.len(), 1);
        assert!(log[0].0.contains(Event::ERROR | Event::READ));
        assert_eq!(log[0].1, Some(socket.as_raw_fd()));
    }

    #[test]
    fn test_write_readiness() {
        let ev = Loop::new().unwrap();
        let (mut io, log) = recording(&ev);
        let (a, _b) = UnixStream::pair().unwrap();

        assert!(io.start(a.as_raw_fd(), Event::WRITE | Event::SIGNAL));
        assert_eq!(io.mask(), Event::WRITE);
        ev.run().unwrap();

        assert!(log.borrow()[0].0.contains(Event::WRITE));
    }
}
