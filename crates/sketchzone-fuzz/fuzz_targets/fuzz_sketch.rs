#![no_main]
use libfuzzer_sys::fuzz_target;
use sketchzone_core::{AgmsSketch, SeedTable};

fuzz_target!(|data: &[u8]| {
    // Six 8-byte seeds, then 9-byte (key, weight) records.
    if data.len() < 48 {
        return;
    }
    let seed = |i: usize| {
        let mut b = [0u8; 8];
        b.copy_from_slice(&data[i * 8..i * 8 + 8]);
        i64::from_le_bytes(b) & i64::MAX
    };
    let seeds = SeedTable::from_rows(std::array::from_fn(|f| vec![seed(f)]));
    let mut sketch = AgmsSketch::with_seeds(17, seeds);

    for rec in data[48..].chunks_exact(9) {
        let mut b = [0u8; 8];
        b.copy_from_slice(&rec[..8]);
        let key = i64::from_le_bytes(b);
        let weight = f64::from(rec[8] as i8);

        // Bucket and sign must be total over all keys.
        assert!(sketch.bucket(0, key) < 17);
        assert!(matches!(sketch.sign(0, key), 1 | -1));
        sketch.update(key, weight);
        sketch.update(key, -weight);
    }
    assert!(sketch.row(0).iter().all(|&v| v == 0.0));
});
