#![no_main]
use libfuzzer_sys::fuzz_target;
use sketchzone_core::{EvaluationMode, QuorumSafezone};

fuzz_target!(|data: &[u8]| {
    // Layout: [n, k, mode, n reference bytes, n candidate bytes]
    if data.len() < 3 {
        return;
    }
    let n = usize::from(data[0] % 12) + 1;
    let k = usize::from(data[1]) % n + 1;
    let mode = EvaluationMode::from_eikonal_flag(data[2] & 1 == 1);
    let body = &data[3..];
    if body.len() < 2 * n {
        return;
    }
    let scale = |b: u8| (f64::from(b) - 96.0) / 16.0;
    let reference: Vec<f64> = body[..n].iter().copied().map(scale).collect();
    let candidate: Vec<f64> = body[n..2 * n].iter().copied().map(scale).collect();

    let mut zone = QuorumSafezone::with_mode(mode);
    let legal = reference.iter().filter(|&&z| z > 0.0).count();
    match zone.prepare(&reference, k) {
        Ok(()) => {
            assert!(legal >= k);
            let first = zone.evaluate(&candidate);
            assert_eq!(first.to_bits(), zone.evaluate(&candidate).to_bits());
            // The reference always certifies itself.
            assert!(zone.evaluate(&reference) > 0.0);
        }
        Err(_) => assert!(legal < k),
    }
});
