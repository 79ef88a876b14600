//! Allocation-free render path tests.
//!
//! `Player::render` runs on the audio thread under the deck lock, so it
//! must never touch the heap. These tests render busy songs for several
//! seconds with every voice retriggering, through loops and song ends.
//!
//! Just run `cargo test`; no feature flags needed.

use std::sync::Arc;

use assert_no_alloc::{assert_no_alloc, AllocDisabler};
use stave_engine::{Player, SampleBank};
use stave_ir::{Cell, Song, MAX_TEMPO};

#[cfg(debug_assertions)]
#[global_allocator]
static A: AllocDisabler = AllocDisabler;

fn busy_song(length: u16, looping: bool) -> Song {
    let mut song = Song::new();
    song.restore_length(length);
    song.looping = looping;
    song.tempo = MAX_TEMPO;
    for beat in 0..length as usize {
        for channel in 0..3 {
            let note = ((beat + channel * 4) % 13) as u8 + 1;
            song.write_cell(beat, channel, Cell::new(note, ((beat + channel) % 15) as u8));
        }
    }
    song
}

/// Render `seconds` of audio in blocks, aborting on any heap allocation.
fn assert_render_alloc_free(song: &Song, sample_rate: u32, seconds: u32) {
    let mut player = Player::new(Arc::new(SampleBank::synthesized()), sample_rate);
    player.play(song, 0);
    let mut block = [0i16; 512];
    let blocks = (sample_rate * seconds) as usize / block.len();

    assert_no_alloc(|| {
        for i in 0..blocks {
            if i % 50 == 0 {
                player.play_note_immediate((i % 13) as u8 + 1, 4);
            }
            player.render(song, &mut block);
        }
    });
}

#[test]
fn looping_song_alloc_free() {
    assert_render_alloc_free(&busy_song(16, true), 32000, 5);
}

#[test]
fn song_end_alloc_free() {
    assert_render_alloc_free(&busy_song(8, false), 44100, 3);
}

#[test]
fn extended_song_alloc_free() {
    assert_render_alloc_free(&busy_song(300, true), 48000, 5);
}

#[test]
fn tempo_and_rate_changes_alloc_free() {
    let song = busy_song(12, true);
    let mut player = Player::new(Arc::new(SampleBank::synthesized()), 32000);
    player.play(&song, 0);
    let mut block = [0i16; 300];

    assert_no_alloc(|| {
        for i in 0..400u32 {
            player.apply_tempo((i % u32::from(MAX_TEMPO)) as u8);
            if i % 100 == 0 {
                player.set_sample_rate(22050 + i * 10);
            }
            player.render(&song, &mut block);
        }
    });
}
