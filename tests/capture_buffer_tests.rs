//! Capture buffer tests

use esp_net_logging::CaptureBuffer;

#[test]
fn test_capture_scenario_capacity_16() {
    let buf: CaptureBuffer<16> = CaptureBuffer::new();

    assert_eq!(buf.append(b"HELLOWORLD"), 10);
    assert_eq!(buf.len(), 10);

    assert_eq!(buf.append(b"ABCDEFGH"), 6);
    assert_eq!(buf.len(), 16);

    assert_eq!(buf.append(b"more"), 0);
    assert_eq!(buf.append(b""), 0);
    assert_eq!(buf.len(), 16);

    let mut out = [0u8; 32];
    let n = buf.snapshot(&mut out);
    assert_eq!(&out[..n], b"HELLOWORLDABCDEF");
}

#[test]
fn test_cursor_monotonic_and_bounded() {
    let buf: CaptureBuffer<100> = CaptureBuffer::new();
    let mut last = 0;

    for i in 0..50usize {
        let line = vec![b'x'; i % 7 + 1];
        buf.append(&line);
        let w = buf.len();
        assert!(w >= last);
        assert!(w <= buf.capacity());
        last = w;
    }
    assert_eq!(last, 100);
}

#[test]
fn test_append_places_bytes_at_old_cursor() {
    let buf: CaptureBuffer<64> = CaptureBuffer::new();
    buf.append(b"first|");
    let before = buf.len();

    assert_eq!(buf.append(b"second"), 6);
    assert_eq!(buf.len(), before + 6);

    let mut out = [0u8; 64];
    let n = buf.snapshot(&mut out);
    assert_eq!(&out[before..n], b"second");
}

#[test]
fn test_full_buffer_is_stable() {
    let buf: CaptureBuffer<8> = CaptureBuffer::new();
    buf.append(b"12345678");
    assert!(buf.is_full());

    let mut before = [0u8; 8];
    buf.snapshot(&mut before);

    for _ in 0..10 {
        assert_eq!(buf.append(b"zz"), 0);
    }

    let mut after = [0u8; 8];
    buf.snapshot(&mut after);
    assert_eq!(before, after);
    assert_eq!(buf.dropped(), 20);
}

#[test]
fn test_snapshot_of_empty_buffer() {
    let buf: CaptureBuffer<8> = CaptureBuffer::new();
    let mut out = [0u8; 8];
    assert_eq!(buf.snapshot(&mut out), 0);
    assert!(buf.is_empty());
}
