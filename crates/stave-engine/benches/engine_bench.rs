use criterion::{black_box, criterion_group, criterion_main, Criterion};
use stave_engine::{Player, SampleBank};
use std::sync::Arc;
use stave_ir::{Cell, Song};

fn busy_song(tempo: u8) -> Song {
    let mut song = Song::new();
    song.tempo = tempo;
    song.looping = true;
    for beat in 0..song.length() as usize {
        for channel in 0..3 {
            let note = ((beat + channel * 4) % 13 + 1) as u8;
            let instrument = ((beat / 4 + channel) % 15) as u8;
            song.write_cell(beat, channel, Cell::new(note, instrument));
        }
    }
    song
}

fn benchmark_render(c: &mut Criterion) {
    let mut group = c.benchmark_group("render");
    let bank = Arc::new(SampleBank::synthesized());

    for (name, tempo, rate) in [
        ("slow_32k", 0u8, 32000u32),
        ("fast_32k", 0x9F, 32000),
        ("fast_48k", 0x9F, 48000),
    ] {
        let song = busy_song(tempo);
        let mut player = Player::new(bank.clone(), rate);
        player.play(&song, 0);
        let mut buffer = vec![0i16; 1024];

        group.bench_function(name, |b| {
            b.iter(|| {
                player.render(black_box(&song), &mut buffer);
                black_box(buffer[0])
            })
        });
    }

    group.finish();
}

criterion_group!(benches, benchmark_render);
criterion_main!(benches);
