//! Background keyboard listener
//!
//! One thread polls every keyboard with mio and hands decoded key events
//! to a sink. The thread checks its running flag at every poll timeout, so
//! `stop` returns within one timeout.

use super::device::{discover_keyboards, InputDevice, KeySource};
use super::event::KeyEvent;
use crate::{NvdaError, Result};
use log::{debug, error, info, warn};
use mio::unix::SourceFd;
use mio::{Events, Interest, Poll, Token};
use std::io;
use std::os::unix::io::AsRawFd;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// Receives key events on the listener thread
pub type KeySink = Box<dyn Fn(KeyEvent) + Send + 'static>;

const POLL_TIMEOUT: Duration = Duration::from_millis(100);

pub struct InputListener {
    paths: Vec<PathBuf>,
    running: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl InputListener {
    /// Listener over the given event nodes
    pub fn new(paths: Vec<PathBuf>) -> Self {
        Self {
            paths,
            running: Arc::new(AtomicBool::new(false)),
            handle: None,
        }
    }

    /// Listener over every keyboard found under /dev/input
    pub fn discover() -> Result<Self> {
        let paths = discover_keyboards();
        if paths.is_empty() {
            return Err(NvdaError::Input("No keyboard devices found".to_string()));
        }
        info!("Found {} keyboard(s)", paths.len());
        Ok(Self::new(paths))
    }

    /// Open the devices and start the polling thread
    ///
    /// Devices that cannot be opened are skipped; failing to open all of
    /// them is an error.
    pub fn start(&mut self, sink: KeySink) -> Result<()> {
        if self.is_running() {
            return Ok(());
        }

        let mut devices: Vec<Box<dyn KeySource>> = Vec::new();
        for path in &self.paths {
            match InputDevice::open(path) {
                Ok(dev) => devices.push(Box::new(dev)),
                Err(e) => warn!("{}", e),
            }
        }
        if devices.is_empty() {
            return Err(NvdaError::Input(
                "No keyboard device could be opened".to_string(),
            ));
        }
        self.start_with(devices, sink)
    }

    /// Start the polling thread over already open sources
    pub fn start_with(&mut self, devices: Vec<Box<dyn KeySource>>, sink: KeySink) -> Result<()> {
        if self.is_running() {
            return Ok(());
        }

        let poll = Poll::new()?;
        for (i, dev) in devices.iter().enumerate() {
            let fd = dev.as_raw_fd();
            poll.registry()
                .register(&mut SourceFd(&fd), Token(i), Interest::READABLE)?;
        }

        self.running.store(true, Ordering::SeqCst);
        let running = self.running.clone();
        let handle = thread::Builder::new()
            .name("input-listener".to_string())
            .spawn(move || poll_loop(poll, devices, running, sink))?;
        self.handle = Some(handle);
        debug!("Input listener started");
        Ok(())
    }

    /// Stop the thread and wait for it
    pub fn stop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                error!("Input listener thread panicked");
            }
            debug!("Input listener stopped");
        }
    }

    /// True while the thread is polling
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
            && self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }
}

impl Drop for InputListener {
    fn drop(&mut self) {
        self.stop();
    }
}

fn poll_loop(
    mut poll: Poll,
    devices: Vec<Box<dyn KeySource>>,
    running: Arc<AtomicBool>,
    sink: KeySink,
) {
    let mut devices: Vec<Option<Box<dyn KeySource>>> = devices.into_iter().map(Some).collect();
    let mut events = Events::with_capacity(16);

    while running.load(Ordering::SeqCst) {
        if let Err(e) = poll.poll(&mut events, Some(POLL_TIMEOUT)) {
            if e.kind() == io::ErrorKind::Interrupted {
                continue;
            }
            error!("Input poll failed: {}", e);
            break;
        }

        for event in events.iter() {
            let Token(index) = event.token();
            let Some(slot) = devices.get_mut(index) else {
                continue;
            };
            let Some(dev) = slot.as_mut() else {
                continue;
            };

            match dev.read_keys() {
                Ok(keys) => {
                    for key in keys {
                        sink(key);
                    }
                }
                Err(e) => {
                    warn!("Dropping input device {}: {}", dev.name(), e);
                    let fd = dev.as_raw_fd();
                    let _ = poll.registry().deregister(&mut SourceFd(&fd));
                    *slot = None;
                }
            }
        }

        if devices.iter().all(Option::is_none) {
            warn!("No input devices left");
            break;
        }
    }

    running.store(false, Ordering::SeqCst);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::keys::KeyCode;
    use std::io::{BufRead, BufReader, Write};
    use std::os::unix::net::UnixStream;
    use std::sync::mpsc;
    use std::time::Instant;

    /// Key source fed "code value" lines over a socket
    struct LineSource {
        reader: BufReader<UnixStream>,
    }

    impl AsRawFd for LineSource {
        fn as_raw_fd(&self) -> std::os::unix::io::RawFd {
            self.reader.get_ref().as_raw_fd()
        }
    }

    impl KeySource for LineSource {
        fn name(&self) -> &str {
            "lines"
        }

        fn read_keys(&mut self) -> Result<Vec<KeyEvent>> {
            let mut keys = Vec::new();
            loop {
                let mut line = String::new();
                match self.reader.read_line(&mut line) {
                    Ok(0) => return Err(NvdaError::Input("closed".into())),
                    Ok(_) => {
                        let mut parts = line.split_whitespace().map(|p| p.parse::<i32>().unwrap());
                        let (code, value) = (parts.next().unwrap(), parts.next().unwrap());
                        keys.extend(KeyEvent::from_parts(evdev::EventType::KEY, code as u16, value));
                    }
                    Err(e) if e.kind() == io::ErrorKind::WouldBlock => return Ok(keys),
                    Err(e) => return Err(e.into()),
                }
            }
        }
    }

    fn fake_source() -> (UnixStream, Box<dyn KeySource>) {
        let (tx, rx) = UnixStream::pair().unwrap();
        rx.set_nonblocking(true).unwrap();
        let source = LineSource {
            reader: BufReader::new(rx),
        };
        (tx, Box::new(source))
    }

    #[test]
    fn test_events_reach_sink() {
        let (mut tx, source) = fake_source();
        let (events_tx, events_rx) = mpsc::channel();
        let mut listener = InputListener::new(Vec::new());
        listener
            .start_with(
                vec![source],
                Box::new(move |e| {
                    let _ = events_tx.send(e);
                }),
            )
            .unwrap();
        assert!(listener.is_running());

        writeln!(tx, "{} 1", KeyCode::A.0).unwrap();

        let got = events_rx.recv_timeout(Duration::from_secs(2)).unwrap();
        assert_eq!(got, KeyEvent::pressed(KeyCode::A));

        let started = Instant::now();
        listener.stop();
        assert!(started.elapsed() < Duration::from_secs(1));
        assert!(!listener.is_running());
    }

    #[test]
    fn test_thread_ends_when_devices_vanish() {
        let (tx, source) = fake_source();
        let mut listener = InputListener::new(Vec::new());
        listener.start_with(vec![source], Box::new(|_| {})).unwrap();
        drop(tx);

        let deadline = Instant::now() + Duration::from_secs(2);
        while listener.is_running() && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(20));
        }
        assert!(!listener.is_running());
        listener.stop();
    }

    #[test]
    fn test_start_without_devices_fails() {
        let mut listener = InputListener::new(vec![PathBuf::from("/nonexistent/event0")]);
        assert!(listener.start(Box::new(|_| {})).is_err());
        assert!(!listener.is_running());
    }
}
