use std::thread;
use std::time::{Duration, Instant, SystemTime};

use http::{Request, Response, StatusCode, Uri};
use rategate::prelude::{
    Admission, AdmissionGate, BlockingAdmissionGate, CancelToken, GateError, GatePolicy,
    RateLimitError, RateLimitInfo,
};

fn uri(text: &str) -> Uri {
    text.parse().expect("uri should parse")
}

fn request(uri_text: &str) -> Request<Vec<u8>> {
    Request::builder()
        .uri(uri_text)
        .body(Vec::new())
        .expect("request should build")
}

#[test]
fn fresh_host_admits_immediately() {
    let gate = BlockingAdmissionGate::new(GatePolicy::standard());
    let started = Instant::now();
    gate.admit(&uri("https://api.example.com/v1"))
        .expect("unknown host should be admitted");
    assert!(started.elapsed() < Duration::from_millis(100));
}

#[test]
fn exhausted_quota_blocks_until_reset() {
    let gate = BlockingAdmissionGate::new(GatePolicy::standard().max_wait(Duration::from_secs(5)));
    let now = SystemTime::now();
    gate.store().update(
        "api.example.com",
        RateLimitInfo::new(100, 0, now + Duration::from_secs(1), Duration::ZERO),
        now,
    );

    let started = Instant::now();
    gate.admit(&uri("https://api.example.com/v1"))
        .expect("bounded wait should end in admission");
    let waited = started.elapsed();

    assert!(waited >= Duration::from_millis(700), "waited {waited:?}");
    assert!(waited <= Duration::from_secs(3), "waited {waited:?}");
}

#[test]
fn wait_beyond_threshold_rejects() {
    let gate =
        BlockingAdmissionGate::new(GatePolicy::standard().max_wait(Duration::from_millis(5000)));
    let now = SystemTime::now();
    gate.store().update(
        "api.example.com",
        RateLimitInfo::new(
            100,
            0,
            now + Duration::from_secs(60),
            Duration::from_secs(10),
        ),
        now,
    );

    let error = gate
        .admit(&uri("https://api.example.com/v1"))
        .expect_err("wait beyond threshold should reject");
    match error {
        RateLimitError::Exceeded {
            wait_millis,
            threshold_millis,
            ..
        } => {
            assert_eq!(wait_millis, 10_000);
            assert_eq!(threshold_millis, 5_000);
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[test]
fn cancellation_wakes_the_blocked_thread() {
    let gate = BlockingAdmissionGate::new(GatePolicy::standard().max_wait(Duration::from_secs(10)));
    let now = SystemTime::now();
    gate.store().update(
        "api.example.com",
        RateLimitInfo::new(100, 0, now + Duration::from_secs(8), Duration::ZERO),
        now,
    );

    let token = CancelToken::new();
    let canceller = token.clone();
    let handle = thread::spawn(move || {
        thread::sleep(Duration::from_millis(100));
        canceller.cancel();
    });

    let started = Instant::now();
    let error = gate
        .admit_with_cancel(&uri("https://api.example.com/v1"), &token)
        .expect_err("cancellation should abort the wait");
    let elapsed = started.elapsed();
    handle.join().expect("canceller thread should finish");

    match error {
        RateLimitError::WaitCancelled {
            host,
            waited_millis,
        } => {
            assert_eq!(host, "api.example.com");
            assert!(waited_millis >= 50, "waited {waited_millis}ms");
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert!(elapsed < Duration::from_secs(3), "elapsed {elapsed:?}");
    assert_eq!(gate.metrics_snapshot().cancelled, 1);
}

#[test]
fn execute_records_headers_from_the_response() {
    let gate = BlockingAdmissionGate::new(GatePolicy::standard());

    let response = gate
        .execute(request("https://api.example.com/v1/users"), |_request| {
            Ok::<_, std::io::Error>(
                Response::builder()
                    .status(StatusCode::OK)
                    .header("x-ratelimit-limit", "100")
                    .header("x-ratelimit-remaining", "50")
                    .body(Vec::<u8>::new())
                    .expect("response should build"),
            )
        })
        .expect("gated call should succeed");

    assert_eq!(response.status(), StatusCode::OK);
    let snapshot = gate.store().get("api.example.com").snapshot();
    assert_eq!(snapshot.info.limit(), 100);
    assert_eq!(snapshot.info.remaining(), 50);
}

#[test]
fn transport_failure_propagates_and_updates_nothing() {
    let gate = BlockingAdmissionGate::new(GatePolicy::standard());

    let error = gate
        .execute(request("https://api.example.com/v1"), |_request| {
            Err::<Response<Vec<u8>>, std::io::Error>(std::io::Error::new(
                std::io::ErrorKind::TimedOut,
                "timed out",
            ))
        })
        .expect_err("transport failure should propagate");

    match error {
        GateError::Transport(inner) => assert_eq!(inner.kind(), std::io::ErrorKind::TimedOut),
        GateError::RateLimit(other) => panic!("unexpected rate limit error: {other:?}"),
    }
    assert!(gate.store().is_empty());
}

#[test]
fn blocking_gate_can_share_state_with_the_async_gate() {
    let async_gate = AdmissionGate::new(GatePolicy::standard().max_wait(Duration::from_secs(5)));
    let blocking_gate = BlockingAdmissionGate::sharing(&async_gate);

    let now = SystemTime::now();
    blocking_gate.store().update(
        "api.example.com",
        RateLimitInfo::new(
            100,
            0,
            now + Duration::from_secs(60),
            Duration::from_secs(30),
        ),
        now,
    );

    let decision = async_gate.check(&uri("https://api.example.com/v1"), now);
    assert!(matches!(decision, Admission::Reject(_)));
}

#[test]
fn concurrent_updates_leave_exactly_one_payload() {
    let gate = BlockingAdmissionGate::new(GatePolicy::standard());
    let now = SystemTime::now();
    let writers = 8_u64;

    let handles: Vec<_> = (0..writers)
        .map(|index| {
            let gate = gate.clone();
            thread::spawn(move || {
                let payload = RateLimitInfo::new(
                    1000 + index,
                    1000 + index,
                    now + Duration::from_secs(3600),
                    Duration::ZERO,
                );
                for _ in 0..200 {
                    gate.store().update("api.example.com", payload, now);
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().expect("writer thread should finish");
    }

    let info = gate.store().get("api.example.com").snapshot().info;
    assert!(
        (1000..1000 + writers).contains(&info.limit()),
        "limit {} is not one of the written payloads",
        info.limit()
    );
    // No interleaved hybrid: remaining always travelled with its limit.
    assert_eq!(info.remaining(), info.limit());
}

#[test]
fn concurrent_readers_always_see_consistent_snapshots() {
    let gate = BlockingAdmissionGate::new(GatePolicy::standard());
    let now = SystemTime::now();
    gate.store().update(
        "api.example.com",
        RateLimitInfo::new(1, 1, now + Duration::from_secs(3600), Duration::ZERO),
        now,
    );

    let writer = {
        let gate = gate.clone();
        thread::spawn(move || {
            for round in 1..=500_u64 {
                gate.store().update(
                    "api.example.com",
                    RateLimitInfo::new(round, round, now + Duration::from_secs(3600), Duration::ZERO),
                    now,
                );
            }
        })
    };

    let readers: Vec<_> = (0..4)
        .map(|_| {
            let gate = gate.clone();
            thread::spawn(move || {
                for _ in 0..500 {
                    let info = gate.store().get("api.example.com").snapshot().info;
                    assert_eq!(
                        info.remaining(),
                        info.limit(),
                        "torn snapshot: remaining {} with limit {}",
                        info.remaining(),
                        info.limit()
                    );
                }
            })
        })
        .collect();

    writer.join().expect("writer thread should finish");
    for reader in readers {
        reader.join().expect("reader thread should finish");
    }
}

#[test]
fn concurrent_eviction_removes_each_entry_once() {
    let gate = BlockingAdmissionGate::new(GatePolicy::standard());
    let now = SystemTime::now();
    for index in 0..16 {
        gate.store().update(
            &format!("stale-{index}.example.com"),
            RateLimitInfo::new(10, 0, now - Duration::from_secs(1), Duration::ZERO),
            now,
        );
    }
    gate.store().update(
        "fresh.example.com",
        RateLimitInfo::new(10, 5, now + Duration::from_secs(3600), Duration::ZERO),
        now,
    );

    let sweepers: Vec<_> = (0..4)
        .map(|_| {
            let gate = gate.clone();
            thread::spawn(move || gate.evict_expired())
        })
        .collect();
    let removed_total: usize = sweepers
        .into_iter()
        .map(|handle| handle.join().expect("sweeper thread should finish"))
        .sum();

    assert_eq!(removed_total, 16);
    assert_eq!(gate.store().len(), 1);
}
