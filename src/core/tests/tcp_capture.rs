use std::net::Ipv4Addr;
use std::time::Duration;

use port_listener::data_capture::{CaptureEnd, CaptureSession, SessionConfig, SessionState};
use port_listener::error_handling::types::CaptureError;
use port_listener::transport::EndpointDescriptor;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::sync::oneshot;

const TIMEOUT: Duration = Duration::from_secs(5);

async fn local_listener() -> (TcpListener, EndpointDescriptor) {
    let listener = TcpListener::bind((Ipv4Addr::LOCALHOST, 0)).await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let endpoint = EndpointDescriptor::Tcp {
        host: "127.0.0.1".to_string(),
        port,
    };
    (listener, endpoint)
}

#[tokio::test]
async fn hello_round_trip() {
    let _ = env_logger::builder().is_test(true).try_init();
    let (listener, endpoint) = local_listener().await;
    let device = tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        socket.write_all(b"HELLO\r\n").await.unwrap();
        socket.shutdown().await.unwrap();
    });

    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("hello.bin");
    let session = CaptureSession::connect(SessionConfig::new(64, &output, endpoint))
        .await
        .unwrap();

    session.start_listening().await.unwrap();
    tokio::time::timeout(TIMEOUT, session.wait_for_capture_end())
        .await
        .expect("end of stream never observed");
    device.await.unwrap();

    let summary = session.stop_listening().await.unwrap().unwrap();
    assert_eq!(summary.end, CaptureEnd::EndOfStream);
    assert_eq!(summary.bytes_captured, 7);
    assert_eq!(std::fs::read(&output).unwrap(), b"HELLO\r\n");
    assert_eq!(session.state(), SessionState::Stopped);
}

#[tokio::test]
async fn silent_device_does_not_block_stop() {
    let (listener, endpoint) = local_listener().await;
    let (release_tx, release_rx) = oneshot::channel::<()>();
    let device = tokio::spawn(async move {
        let (socket, _) = listener.accept().await.unwrap();
        // Hold the connection open without sending anything.
        let _ = release_rx.await;
        drop(socket);
    });

    let dir = tempfile::tempdir().unwrap();
    let config = SessionConfig::new(64, dir.path().join("quiet.bin"), endpoint);
    let session = CaptureSession::connect(config).await.unwrap();
    session.start_listening().await.unwrap();

    let summary = tokio::time::timeout(TIMEOUT, session.stop_listening())
        .await
        .expect("stop_listening hung on a silent device")
        .unwrap()
        .unwrap();
    assert_eq!(summary.end, CaptureEnd::Stopped);

    let again = tokio::time::timeout(TIMEOUT, session.stop_listening())
        .await
        .unwrap()
        .unwrap();
    assert!(again.is_none());

    let _ = release_tx.send(());
    device.await.unwrap();
}

#[tokio::test]
async fn commands_reach_the_device_and_replies_are_captured() {
    let (listener, endpoint) = local_listener().await;
    let device = tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let mut command = [0u8; 20];
        socket.read_exact(&mut command).await.unwrap();
        assert_eq!(&command, b"LOG TIMEA ONTIME 1\r\n");
        socket.write_all(b"<OK\r\n#TIMEA,COM1;VALID\r\n").await.unwrap();
        socket.shutdown().await.unwrap();
    });

    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("timea.log");
    let session = CaptureSession::connect(SessionConfig::new(8, &output, endpoint))
        .await
        .unwrap();

    session.send_command("LOG TIMEA ONTIME 1\r\n").await.unwrap();
    session.start_listening().await.unwrap();
    tokio::time::timeout(TIMEOUT, session.wait_for_capture_end())
        .await
        .unwrap();
    device.await.unwrap();

    let summary = session.stop_listening().await.unwrap().unwrap();
    // An 8-byte buffer splits the 25-byte reply over several reads.
    assert!(summary.chunks >= 4);
    assert_eq!(
        std::fs::read(&output).unwrap(),
        b"<OK\r\n#TIMEA,COM1;VALID\r\n"
    );
}

#[tokio::test]
async fn empty_command_sends_nothing_over_tcp() {
    let (listener, endpoint) = local_listener().await;
    let device = tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let mut received = Vec::new();
        socket.read_to_end(&mut received).await.unwrap();
        received
    });

    let dir = tempfile::tempdir().unwrap();
    let config = SessionConfig::new(64, dir.path().join("out.bin"), endpoint);
    let session = CaptureSession::connect(config).await.unwrap();
    session.send_command("").await.unwrap();
    drop(session);

    let received = tokio::time::timeout(TIMEOUT, device).await.unwrap().unwrap();
    assert!(received.is_empty());
}

#[tokio::test]
async fn unwritable_output_fails_start_not_connect() {
    let (listener, endpoint) = local_listener().await;
    let _device = tokio::spawn(async move {
        let (socket, _) = listener.accept().await.unwrap();
        tokio::time::sleep(TIMEOUT).await;
        drop(socket);
    });

    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("no").join("such").join("dir.bin");
    let session = CaptureSession::connect(SessionConfig::new(64, &output, endpoint))
        .await
        .unwrap();

    let err = session.start_listening().await.unwrap_err();
    assert!(matches!(err, CaptureError::OutputUnavailable { .. }));
    assert_eq!(session.state(), SessionState::Idle);
    assert!(!session.capture_finished());
    assert!(!output.exists());
}

#[tokio::test]
async fn unreachable_endpoint_fails_construction() {
    let (listener, endpoint) = local_listener().await;
    drop(listener);

    let dir = tempfile::tempdir().unwrap();
    let config = SessionConfig::new(64, dir.path().join("out.bin"), endpoint);
    let result = CaptureSession::connect(config).await;
    assert!(matches!(result, Err(CaptureError::Connection { .. })));
}
