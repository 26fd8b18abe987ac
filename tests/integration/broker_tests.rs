//! Registry concurrency tests.
//!
//! The per-channel exclusion contract: a publish and a snapshot read on
//! the same channel may interleave in any order, but a reader must never
//! observe a mix of two payloads.

use std::sync::Arc;
use std::thread;

use battmon::broker::{Channel, CharacteristicRegistry};

#[test]
fn concurrent_publish_and_read_never_tear() {
    let registry = Arc::new(CharacteristicRegistry::new());
    registry.publish(Channel::Current, &[b'a'; 30]);

    let writer_reg = Arc::clone(&registry);
    let writer = thread::spawn(move || {
        for i in 0..2000u32 {
            let fill = if i % 2 == 0 { b'a' } else { b'b' };
            writer_reg.publish(Channel::Current, &[fill; 30]);
        }
    });

    let reader_reg = Arc::clone(&registry);
    let reader = thread::spawn(move || {
        for _ in 0..2000 {
            let snap = reader_reg.read_snapshot(Channel::Current);
            assert_eq!(snap.len(), 30);
            let first = snap[0];
            assert!(
                snap.iter().all(|b| *b == first),
                "torn snapshot observed: {snap:?}"
            );
        }
    });

    writer.join().unwrap();
    reader.join().unwrap();
}

#[test]
fn publishes_on_other_channels_do_not_interfere() {
    let registry = Arc::new(CharacteristicRegistry::new());
    registry.publish(Channel::Voltage, b"12.00");

    let other = Arc::clone(&registry);
    let t = thread::spawn(move || {
        for _ in 0..1000 {
            other.publish(Channel::Temperature, b"21.00,22.00");
        }
    });

    for _ in 0..1000 {
        assert_eq!(&registry.read_snapshot(Channel::Voltage)[..], b"12.00");
    }
    t.join().unwrap();
}
