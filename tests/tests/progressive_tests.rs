//! Integration tests for the plain progressive source.
//!
//! Blocking reads are issued from `spawn_blocking` threads while the
//! download pump runs on the runtime, mirroring how a decoder worker uses
//! the source in a player.


use std::io::{Read, Seek, SeekFrom};
use std::sync::Arc;
use std::time::Duration;

use striped_stream::{ByteSource, ProgressiveSource, SourceError, SourceReader, SourceSettings};

use fixture::*;

async fn open_fixed(data: Vec<u8>) -> ProgressiveSource {
    let addr = serve(fixed_router(data)).await;
    ProgressiveSource::open(&SourceSettings::new(), stream_url(addr))
        .await
        .unwrap()
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn serves_exact_bytes_with_known_length() {
    let data = plaintext(10_000);
    let source = open_fixed(data.clone()).await;
    assert_eq!(source.length(), Some(10_000));

    let source = Arc::new(source);
    let expected = data.clone();
    tokio::task::spawn_blocking(move || {
        let mut buf = vec![0u8; 10_000];
        assert_eq!(source.read_at(0, &mut buf).unwrap(), 10_000);
        assert_eq!(buf, expected);

        // Overlapping and out-of-order ranges read the same immutable bytes.
        let mut buf = [0u8; 100];
        assert_eq!(source.read_at(9_900, &mut buf).unwrap(), 100);
        assert_eq!(&buf[..], &expected[9_900..]);
        assert_eq!(source.read_at(50, &mut buf).unwrap(), 100);
        assert_eq!(&buf[..], &expected[50..150]);
    })
    .await
    .unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn read_past_end_is_short_then_empty() {
    let data = plaintext(1_000);
    let source = Arc::new(open_fixed(data.clone()).await);

    tokio::task::spawn_blocking(move || {
        let mut buf = [0u8; 64];
        assert_eq!(source.read_at(990, &mut buf).unwrap(), 10);
        assert_eq!(&buf[..10], &data[990..]);
        assert_eq!(source.read_at(1_000, &mut buf).unwrap(), 0);
        assert_eq!(source.read_at(5_000, &mut buf).unwrap(), 0);
    })
    .await
    .unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn seek_then_read_equals_direct_read() {
    let data = plaintext(4_096);
    let source = Arc::new(open_fixed(data.clone()).await);

    let direct = {
        let source = Arc::clone(&source);
        tokio::task::spawn_blocking(move || {
            let mut buf = [0u8; 256];
            source.read_at(1_234, &mut buf).unwrap();
            buf
        })
        .await
        .unwrap()
    };

    tokio::task::spawn_blocking(move || {
        let mut reader = SourceReader::new(source);
        reader.seek(SeekFrom::Start(1_234)).unwrap();
        let mut buf = [0u8; 256];
        reader.read_exact(&mut buf).unwrap();
        assert_eq!(buf, direct);
        assert_eq!(&buf[..], &data[1_234..1_490]);
    })
    .await
    .unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn seek_past_known_length_is_out_of_range() {
    let source = open_fixed(plaintext(100)).await;
    let mut reader = SourceReader::new(source);

    // Seeking to the exact end is valid; one past it is not.
    reader.seek_to(100).unwrap();
    assert!(matches!(
        reader.seek_to(101),
        Err(SourceError::OutOfRange { offset: 101 })
    ));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn blocked_read_resumes_as_download_advances() {
    let data = plaintext(8_192);
    let addr = serve(trickle_router(data.clone(), 1_024, Duration::from_millis(20))).await;
    let source = ProgressiveSource::open(&SourceSettings::new(), stream_url(addr))
        .await
        .unwrap();
    let source = Arc::new(source);

    // The tail is not downloaded yet when the read starts.
    let tail = tokio::task::spawn_blocking(move || {
        let mut buf = vec![0u8; 2_048];
        let n = source.read_at(6_144, &mut buf).unwrap();
        (n, buf)
    });
    let (n, buf) = tokio::time::timeout(Duration::from_secs(10), tail)
        .await
        .expect("blocked read must complete once the range arrives")
        .unwrap();
    assert_eq!(n, 2_048);
    assert_eq!(buf, &data[6_144..]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn length_is_discovered_at_completion_for_chunked_bodies() {
    let data = plaintext(3_000);
    let addr = serve(trickle_router(data.clone(), 500, Duration::from_millis(5))).await;
    let source = ProgressiveSource::open(&SourceSettings::new(), stream_url(addr))
        .await
        .unwrap();
    assert_eq!(source.length(), None);

    let handle = source.handle();
    tokio::time::timeout(Duration::from_secs(10), async {
        while !handle.is_done() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .unwrap();
    assert_eq!(source.length(), Some(3_000));
    assert_eq!(handle.progress(), Some(1.0));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn cancel_wakes_blocked_reader_within_bounded_time() {
    let addr = serve(stall_router(plaintext(512))).await;
    let source = ProgressiveSource::open(&SourceSettings::new(), stream_url(addr))
        .await
        .unwrap();
    let handle = source.handle();
    let source = Arc::new(source);

    let blocked = tokio::task::spawn_blocking(move || {
        let mut buf = [0u8; 256];
        source.read_at(4_096, &mut buf)
    });
    tokio::time::sleep(Duration::from_millis(100)).await;
    handle.cancel();

    let result = tokio::time::timeout(Duration::from_secs(5), blocked)
        .await
        .expect("cancel must unblock the reader promptly")
        .unwrap();
    assert!(matches!(result, Err(SourceError::Cancelled)));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn cancel_is_idempotent_and_fails_future_reads() {
    // A stalling body keeps the session in flight so the cancel is the first
    // terminal transition.
    let addr = serve(stall_router(plaintext(100))).await;
    let source = ProgressiveSource::open(&SourceSettings::new(), stream_url(addr))
        .await
        .unwrap();
    source.cancel_download();
    source.cancel_download();

    let source = Arc::new(source);
    tokio::task::spawn_blocking(move || {
        let mut buf = [0u8; 10];
        assert!(matches!(
            source.read_at(0, &mut buf),
            Err(SourceError::Cancelled)
        ));
    })
    .await
    .unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn transport_failure_reaches_blocked_reader() {
    let addr = serve(failing_router(plaintext(1_024))).await;
    let source = ProgressiveSource::open(&SourceSettings::new(), stream_url(addr))
        .await
        .unwrap();
    let source = Arc::new(source);

    let blocked = tokio::task::spawn_blocking(move || {
        let mut buf = [0u8; 256];
        source.read_at(100_000, &mut buf)
    });
    let result = tokio::time::timeout(Duration::from_secs(10), blocked)
        .await
        .expect("transport failure must unblock the reader")
        .unwrap();
    assert!(matches!(result, Err(SourceError::Transport(_))));
}
