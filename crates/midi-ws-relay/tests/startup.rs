//! Startup ordering: the MIDI input is opened before the listener is bound.

use std::sync::{atomic::AtomicBool, mpsc, Arc};

use mockall::mock;
use tokio::net::TcpListener;

use midi_relay_core::RawMidiEvent;
use midi_ws_relay::domain::RelayConfig;
use midi_ws_relay::infrastructure::midi_input::{MidiSource, SourceError};
use midi_ws_relay::infrastructure::{run_relay, StartupError};

mock! {
    pub Source {}

    impl MidiSource for Source {
        fn start(&self) -> Result<mpsc::Receiver<RawMidiEvent>, SourceError>;
        fn stop(&self);
        fn describe(&self) -> String;
    }
}

/// Picks a loopback port that is free right now.
async fn free_port() -> std::net::SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap()
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_source_open_failure_aborts_before_binding() {
    // Arrange
    let addr = free_port().await;
    let config = RelayConfig {
        listen_addr: addr,
        ..RelayConfig::default()
    };
    let mut source = MockSource::new();
    source.expect_start().times(1).returning(|| {
        Err(SourceError::Open {
            device: "/dev/snd/midiC0D0".to_string(),
            reason: "Device or resource busy".to_string(),
        })
    });
    // Never started, so never stopped.
    source.expect_stop().times(0);
    source.expect_describe().return_const("mock".to_string());

    // Act
    let result = run_relay(config, Box::new(source), Arc::new(AtomicBool::new(true))).await;

    // Assert
    match result {
        Err(StartupError::Source(SourceError::Open { device, .. })) => {
            assert_eq!(device, "/dev/snd/midiC0D0");
        }
        other => panic!("expected a source error, got {other:?}"),
    }
    TcpListener::bind(addr)
        .await
        .expect("no listener may have been bound");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_missing_device_is_reported_as_source_error() {
    let mut source = MockSource::new();
    source
        .expect_start()
        .returning(|| Err(SourceError::NoDevice("no input ports".to_string())));
    source.expect_stop().times(0);

    let config = RelayConfig {
        listen_addr: free_port().await,
        ..RelayConfig::default()
    };
    let result = run_relay(config, Box::new(source), Arc::new(AtomicBool::new(true))).await;

    let err = result.unwrap_err();
    assert!(matches!(err, StartupError::Source(SourceError::NoDevice(_))));
    assert!(err.to_string().contains("MIDI input unavailable"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_bind_failure_stops_the_started_source() {
    // Arrange: the port is already taken.
    let taken = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let (_tx, rx) = mpsc::sync_channel::<RawMidiEvent>(1);
    let rx = std::sync::Mutex::new(Some(rx));
    let mut source = MockSource::new();
    source
        .expect_start()
        .times(1)
        .returning(move || Ok(rx.lock().unwrap().take().unwrap()));
    source.expect_describe().return_const("mock".to_string());
    source.expect_stop().times(1).return_const(());

    let config = RelayConfig {
        listen_addr: taken.local_addr().unwrap(),
        ..RelayConfig::default()
    };

    // Act
    let result = run_relay(config, Box::new(source), Arc::new(AtomicBool::new(true))).await;

    // Assert: mock verifies stop() was called once when dropped.
    assert!(matches!(result, Err(StartupError::Bind { .. })));
}
