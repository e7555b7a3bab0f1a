use criterion::{BatchSize, Criterion, black_box, criterion_group, criterion_main};
use image::{ImageFormat, Rgba, RgbaImage};
use rsvp_core::{ImageRef, Sizing, Surface};
use rsvp_render::{CanvasSurface, MemoryLoader};
use std::io::Cursor;

fn png(width: u32, height: u32) -> Vec<u8> {
    let img = RgbaImage::from_fn(width, height, |x, y| {
        Rgba([(x % 256) as u8, (y % 256) as u8, 128, 255])
    });
    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
        .expect("encode png");
    buf
}

fn harness() -> (CanvasSurface<MemoryLoader>, Vec<ImageRef>) {
    let refs: Vec<ImageRef> = (0..10).map(|i| ImageRef::new(format!("img{i}.png"))).collect();
    let mut loader = MemoryLoader::new();
    for r in &refs {
        loader.insert(r.clone(), png(200, 200));
    }
    let sizing = Sizing {
        height: Some(400),
        ..Sizing::default()
    };
    let mut surface = CanvasSurface::new(1280, 720, loader, sizing).expect("canvas");
    surface.preload(&refs, std::time::Duration::from_secs(10));
    (surface, refs)
}

pub fn bench_present(c: &mut Criterion) {
    let mut g = c.benchmark_group("present");
    g.sample_size(40);

    g.bench_function("stream_frame", |b| {
        b.iter_batched(
            harness,
            |(mut s, refs)| {
                for r in &refs {
                    black_box(s.present(r, None));
                    s.clear();
                }
            },
            BatchSize::SmallInput,
        )
    });

    g.finish();
}

criterion_group!(benches, bench_present);
criterion_main!(benches);
