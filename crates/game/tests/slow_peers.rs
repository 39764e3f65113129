mod common;

use std::io::{self, Read, Write};
use std::net::TcpStream;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use common::{RawClient, TIMEOUT, TestServer};
use skirmish::{Keyframe, ServerConfig};

fn largest_gap(keyframes: &[Keyframe]) -> f64 {
    keyframes
        .windows(2)
        .map(|pair| pair[1].time - pair[0].time)
        .fold(0.0, f64::max)
}

/// Writes unterminated junk as fast as the socket accepts it until stopped.
fn spawn_flood(mut stream: TcpStream, stop: Arc<AtomicBool>) -> thread::JoinHandle<u64> {
    stream
        .set_write_timeout(Some(Duration::from_millis(50)))
        .unwrap();
    thread::spawn(move || {
        let junk = vec![b'x'; 64 * 1024];
        let mut sent = 0u64;
        while !stop.load(Ordering::SeqCst) {
            match stream.write(&junk) {
                Ok(n) => sent += n as u64,
                Err(e)
                    if e.kind() == io::ErrorKind::WouldBlock
                        || e.kind() == io::ErrorKind::TimedOut => {}
                Err(_) => break,
            }
        }
        sent
    })
}

#[test]
fn flooding_client_does_not_stall_broadcasts() {
    let server = TestServer::start();
    let mut observer = RawClient::connect(server.addr);
    assert_eq!(observer.expect_welcome(), 1);

    let flooder = TcpStream::connect(server.addr).unwrap();
    observer.wait_for_keyframe(|kf| kf.entity(2).is_some());

    let stop = Arc::new(AtomicBool::new(false));
    let flood = spawn_flood(flooder.try_clone().unwrap(), Arc::clone(&stop));
    thread::sleep(Duration::from_millis(100));

    let keyframes = observer.collect_keyframes(Duration::from_secs(1));
    stop.store(true, Ordering::SeqCst);
    let sent = flood.join().unwrap();

    // Twenty are due at the default 50 ms interval.
    assert!(keyframes.len() >= 12, "only {} keyframes", keyframes.len());
    assert!(largest_gap(&keyframes) < 0.25, "gap {}", largest_gap(&keyframes));
    assert!(sent > 1024 * 1024, "flood only sent {} bytes", sent);
    // Oversized input is discarded; the sender stays connected.
    assert!(keyframes.iter().all(|kf| kf.entity(2).is_some()));
}

#[test]
fn client_that_never_reads_is_dropped() {
    let server = TestServer::with_config(ServerConfig {
        broadcast_interval: Duration::from_millis(10),
        ..Default::default()
    });
    let mut observer = RawClient::connect(server.addr);
    assert_eq!(observer.expect_welcome(), 1);

    // A huge name makes every keyframe large, so the silent peer's socket
    // buffers fill within a second or so.
    let mut silent = TcpStream::connect(server.addr).unwrap();
    let name = "w".repeat(50_000);
    silent
        .write_all(format!("HELLO:{}\n", name).as_bytes())
        .unwrap();

    let mut seen = false;
    observer.wait_for_keyframe_within(Duration::from_secs(30), |kf| {
        if kf.entity(2).is_some() {
            seen = true;
        }
        seen && kf.entity(2).is_none()
    });

    let keyframes = observer.collect_keyframes(Duration::from_millis(500));
    assert!(keyframes.len() >= 20, "only {} keyframes", keyframes.len());
    assert!(
        keyframes
            .iter()
            .all(|kf| kf.entity(1).is_some() && kf.entity(2).is_none())
    );

    // Whatever was buffered drains, then the server's close shows up.
    silent
        .set_read_timeout(Some(Duration::from_millis(100)))
        .unwrap();
    let deadline = Instant::now() + TIMEOUT;
    let mut chunk = vec![0u8; 64 * 1024];
    let closed = loop {
        if Instant::now() >= deadline {
            break false;
        }
        match silent.read(&mut chunk) {
            Ok(0) => break true,
            Ok(_) => {}
            Err(e)
                if e.kind() == io::ErrorKind::WouldBlock
                    || e.kind() == io::ErrorKind::TimedOut => {}
            Err(_) => break true,
        }
    };
    assert!(closed);
}
