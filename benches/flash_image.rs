use criterion::{criterion_group, criterion_main, Criterion};
use cohrecovery::flash::{FilePartition, PartitionFlasher};
use std::fs;
use std::io::Cursor;

fn bench_flash(c: &mut Criterion) {
    let dir = tempfile::tempdir().unwrap();
    let dev = dir.path().join("mtd2");
    let image: Vec<u8> = (0..256 * 1024).map(|i| (i % 251) as u8).collect();
    let mut stale = image.clone();
    stale[0] ^= 0xFF;
    let flasher = PartitionFlasher::default();

    c.bench_function("flash_256k", |b| {
        b.iter(|| {
            fs::write(&dev, &stale).unwrap();
            let mut part = FilePartition::new("boot", &dev, 128 * 1024);
            flasher.flash(&mut part, &mut Cursor::new(&image)).unwrap();
        });
    });

    c.bench_function("skip_current", |b| {
        fs::write(&dev, &image).unwrap();
        b.iter(|| {
            let mut part = FilePartition::new("boot", &dev, 128 * 1024);
            flasher.flash(&mut part, &mut Cursor::new(&image)).unwrap();
        });
    });
}

criterion_group!(benches, bench_flash);
criterion_main!(benches);
