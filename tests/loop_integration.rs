//! Integration tests for the server and client loops.
//!
//! The server is driven by injected raw events, the client by a test-owned
//! channel writer, and cues land in a recording sink; no keyboard or sound
//! card is involved. Every wait is bounded so a stuck loop fails the test.

use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use lockbell::audio::AudioError;
use lockbell::shutdown;
use lockbell::{Client, Cue, CueSink, Outcome, Phase, PidLock, Server};
use lockbell_transport::fifo::DEFAULT_MODE;
use lockbell_transport::{
    ev, injected, key, ChannelError, FifoChannel, FifoReader, LockKey, LockKeyChanged, LockState,
    RawEvent,
};
use tokio::sync::watch;

const STEP: Duration = Duration::from_secs(5);

/// Sink that records every cue it is asked to play
#[derive(Clone, Default)]
struct RecordingSink {
    played: Arc<Mutex<Vec<Cue>>>,
}

impl RecordingSink {
    fn played(&self) -> Vec<Cue> {
        self.played.lock().unwrap().clone()
    }

    async fn wait_for(&self, count: usize) {
        let waiting = async {
            while self.played.lock().unwrap().len() < count {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        };
        tokio::time::timeout(STEP, waiting)
            .await
            .expect("cue was never played");
    }
}

#[async_trait]
impl CueSink for RecordingSink {
    async fn play(&mut self, cue: Cue) -> Result<(), AudioError> {
        self.played.lock().unwrap().push(cue);
        Ok(())
    }
}

fn change(key: LockKey, state: LockState) -> LockKeyChanged {
    LockKeyChanged::new(key, state)
}

/// Key press, sync, indicator, sync: what a real toggle looks like
fn toggle(lock: LockKey, on: bool) -> Vec<RawEvent> {
    vec![
        RawEvent::new(ev::KEY, lock.key_code(), 1),
        RawEvent::syn(),
        RawEvent::led(lock, if on { 1 } else { 0 }),
        RawEvent::syn(),
        RawEvent::new(ev::KEY, lock.key_code(), 0),
        RawEvent::syn(),
    ]
}

async fn wait_phase(rx: &mut watch::Receiver<Phase>, phase: Phase) {
    tokio::time::timeout(STEP, rx.wait_for(|p| *p == phase))
        .await
        .unwrap_or_else(|_| panic!("timed out waiting for {phase}"))
        .unwrap();
}

async fn receive(reader: &mut FifoReader) -> LockKeyChanged {
    tokio::time::timeout(STEP, reader.receive())
        .await
        .expect("receive timed out")
        .unwrap()
}

fn exists(path: &Path) -> bool {
    std::fs::symlink_metadata(path).is_ok()
}

// ── Server ──

#[tokio::test]
async fn server_forwards_only_indicator_changes() {
    let dir = tempfile::tempdir().unwrap();
    let fifo = dir.path().join("caps_lock");
    let pid_file = dir.path().join("server.pid");

    let (events, source) = injected();
    let (trigger, stop) = shutdown::channel();
    let channel = FifoChannel::create(&fifo, DEFAULT_MODE).unwrap();
    let lock = PidLock::acquire(&pid_file).unwrap();
    let server = Server::new(source, channel, Some(lock), stop);
    let mut phases = server.phases();
    let running = tokio::spawn(server.run());

    let mut reader = FifoReader::new(&fifo);
    events.send_all(toggle(LockKey::Caps, true));
    // Bogus level and an untracked LED are dropped
    events.send(RawEvent::led(LockKey::Caps, 2));
    events.send(RawEvent::new(ev::LED, 3, 1));
    events.send_all(toggle(LockKey::Num, false));
    events.send_all(toggle(LockKey::Scroll, true));

    assert_eq!(receive(&mut reader).await, change(LockKey::Caps, LockState::On));
    assert_eq!(receive(&mut reader).await, change(LockKey::Num, LockState::Off));
    assert_eq!(receive(&mut reader).await, change(LockKey::Scroll, LockState::On));
    wait_phase(&mut phases, Phase::Running).await;

    trigger.trigger();
    let outcome = tokio::time::timeout(STEP, running).await.unwrap().unwrap();
    assert!(matches!(outcome, Outcome::Requested));
    assert_eq!(outcome.exit_code(), 0);
    assert_eq!(*phases.borrow(), Phase::Terminated);
    assert!(!exists(&fifo), "server unlinks the FIFO on shutdown");
    assert!(!exists(&pid_file), "server removes its lock file");

    // Writer is gone, so the reader sees end of file
    assert!(matches!(
        reader.receive().await,
        Err(ChannelError::ProducerGone)
    ));
}

#[tokio::test]
async fn server_recovers_when_client_leaves() {
    let dir = tempfile::tempdir().unwrap();
    let fifo = dir.path().join("caps_lock");

    let (events, source) = injected();
    let (trigger, stop) = shutdown::channel();
    let channel = FifoChannel::create(&fifo, DEFAULT_MODE).unwrap();
    let server = Server::new(source, channel, None, stop);
    let mut phases = server.phases();
    let running = tokio::spawn(server.run());

    let mut first = FifoReader::new(&fifo);
    events.send_all(toggle(LockKey::Caps, true));
    assert_eq!(receive(&mut first).await, change(LockKey::Caps, LockState::On));
    wait_phase(&mut phases, Phase::Running).await;
    first.close().await;

    // Hits the broken pipe and is lost; the server goes back to waiting
    events.send_all(toggle(LockKey::Caps, false));
    wait_phase(&mut phases, Phase::WaitingForPeer).await;
    assert!(exists(&fifo), "FIFO is recreated for the next client");

    let mut second = FifoReader::new(&fifo);
    events.send_all(toggle(LockKey::Num, true));
    assert_eq!(receive(&mut second).await, change(LockKey::Num, LockState::On));

    trigger.trigger();
    let outcome = tokio::time::timeout(STEP, running).await.unwrap().unwrap();
    assert!(matches!(outcome, Outcome::Requested));
}

#[tokio::test]
async fn server_stops_while_waiting_for_a_client() {
    let dir = tempfile::tempdir().unwrap();
    let fifo = dir.path().join("caps_lock");
    let pid_file = dir.path().join("server.pid");

    let (_events, source) = injected();
    let (trigger, stop) = shutdown::channel();
    let channel = FifoChannel::create(&fifo, DEFAULT_MODE).unwrap();
    let lock = PidLock::acquire(&pid_file).unwrap();
    let server = Server::new(source, channel, Some(lock), stop);
    let mut phases = server.phases();
    let running = tokio::spawn(server.run());

    wait_phase(&mut phases, Phase::WaitingForPeer).await;
    tokio::time::sleep(Duration::from_millis(50)).await;
    trigger.trigger();

    let outcome = tokio::time::timeout(STEP, running)
        .await
        .expect("blocked open must be released on shutdown")
        .unwrap();
    assert!(matches!(outcome, Outcome::Requested));
    assert!(!exists(&fifo));
    assert!(!exists(&pid_file));
}

#[tokio::test]
async fn server_source_failure_is_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let fifo = dir.path().join("caps_lock");

    let (events, source) = injected();
    let (_trigger, stop) = shutdown::channel();
    let channel = FifoChannel::create(&fifo, DEFAULT_MODE).unwrap();
    let server = Server::new(source, channel, None, stop);
    let running = tokio::spawn(server.run());

    let mut reader = FifoReader::new(&fifo);
    events.send_all(toggle(LockKey::Caps, true));
    assert_eq!(receive(&mut reader).await, change(LockKey::Caps, LockState::On));

    // Device gone
    drop(events);
    let outcome = tokio::time::timeout(STEP, running).await.unwrap().unwrap();
    assert!(matches!(outcome, Outcome::Fatal(_)));
    assert_eq!(outcome.exit_code(), 1);
    assert!(!exists(&fifo));
}

// ── Client ──

#[tokio::test]
async fn client_plays_cues_until_server_leaves() {
    let dir = tempfile::tempdir().unwrap();
    let fifo = dir.path().join("caps_lock");
    let pid_file = dir.path().join("client.pid");

    let mut channel = FifoChannel::create(&fifo, DEFAULT_MODE).unwrap();
    let sink = RecordingSink::default();
    let (_trigger, stop) = shutdown::channel();
    let lock = PidLock::acquire(&pid_file).unwrap();
    let client = Client::new(FifoReader::new(&fifo), sink.clone(), Some(lock), stop);
    let running = tokio::spawn(client.run());

    for c in [
        change(LockKey::Caps, LockState::On),
        change(LockKey::Num, LockState::Off),
        change(LockKey::Scroll, LockState::On),
    ] {
        tokio::time::timeout(STEP, channel.send(c))
            .await
            .unwrap()
            .unwrap();
    }
    channel.close().await.unwrap();

    let outcome = tokio::time::timeout(STEP, running).await.unwrap().unwrap();
    assert!(matches!(outcome, Outcome::ProducerGone));
    assert_eq!(outcome.exit_code(), 3);
    assert_eq!(sink.played(), vec![Cue::On, Cue::Off, Cue::On]);
    assert!(!exists(&pid_file), "client removes its lock file");
}

#[tokio::test]
async fn client_skips_malformed_notifications() {
    let dir = tempfile::tempdir().unwrap();
    let fifo = dir.path().join("caps_lock");
    FifoChannel::create(&fifo, DEFAULT_MODE).unwrap();

    let sink = RecordingSink::default();
    let (_trigger, stop) = shutdown::channel();
    let client = Client::new(FifoReader::new(&fifo), sink.clone(), None, stop);
    let running = tokio::spawn(client.run());

    // A foreign writer: one garbage byte, then Caps on
    let writer_path = fifo.clone();
    let writer = tokio::task::spawn_blocking(move || {
        use std::io::Write;
        let mut f = std::fs::OpenOptions::new()
            .write(true)
            .open(writer_path)
            .unwrap();
        f.write_all(&[0x2A, 0x00]).unwrap();
    });
    tokio::time::timeout(STEP, writer).await.unwrap().unwrap();

    let outcome = tokio::time::timeout(STEP, running).await.unwrap().unwrap();
    assert!(matches!(outcome, Outcome::ProducerGone));
    assert_eq!(sink.played(), vec![Cue::On]);
}

#[tokio::test]
async fn client_waits_for_the_channel_to_appear() {
    let dir = tempfile::tempdir().unwrap();
    let fifo = dir.path().join("caps_lock");

    let sink = RecordingSink::default();
    let (trigger, stop) = shutdown::channel();
    let client = Client::new(FifoReader::new(&fifo), sink.clone(), None, stop);
    let mut phases = client.phases();
    let running = tokio::spawn(client.run());

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(*phases.borrow(), Phase::Initializing);

    let mut channel = FifoChannel::create(&fifo, DEFAULT_MODE).unwrap();
    tokio::time::timeout(STEP, channel.send(change(LockKey::Caps, LockState::Off)))
        .await
        .unwrap()
        .unwrap();
    wait_phase(&mut phases, Phase::Running).await;
    sink.wait_for(1).await;

    trigger.trigger();
    let outcome = tokio::time::timeout(STEP, running).await.unwrap().unwrap();
    assert!(matches!(outcome, Outcome::Requested));
    assert_eq!(sink.played(), vec![Cue::Off]);
    channel.close().await.unwrap();
}

#[tokio::test]
async fn client_stops_while_waiting_for_the_server() {
    let dir = tempfile::tempdir().unwrap();
    let fifo = dir.path().join("caps_lock");
    FifoChannel::create(&fifo, DEFAULT_MODE).unwrap();

    let (trigger, stop) = shutdown::channel();
    let client = Client::new(FifoReader::new(&fifo), RecordingSink::default(), None, stop);
    let mut phases = client.phases();
    let running = tokio::spawn(client.run());

    wait_phase(&mut phases, Phase::WaitingForPeer).await;
    tokio::time::sleep(Duration::from_millis(50)).await;
    trigger.trigger();

    let outcome = tokio::time::timeout(STEP, running)
        .await
        .expect("blocked open must be released on shutdown")
        .unwrap();
    assert!(matches!(outcome, Outcome::Requested));
    assert_eq!(*phases.borrow(), Phase::Terminated);
}

// ── Singleton ──

#[test]
fn second_instance_exits_already_running() {
    let dir = tempfile::tempdir().unwrap();
    let pid_file = dir.path().join("client.pid");
    let _first = PidLock::acquire(&pid_file).unwrap();

    let outcome = match PidLock::acquire(&pid_file) {
        Ok(_) => panic!("lock must be exclusive"),
        Err(e) => Outcome::from(e),
    };
    assert!(matches!(
        outcome,
        Outcome::AlreadyRunning { pid: Some(pid) } if pid == std::process::id()
    ));
    assert_eq!(outcome.exit_code(), 2);
    assert!(exists(&pid_file), "first holder keeps its lock file");
}

#[test]
fn toggle_uses_lock_key_codes() {
    let events = toggle(LockKey::Caps, true);
    assert_eq!(events[0].code, key::CAPSLOCK);
}
