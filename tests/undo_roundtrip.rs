//! Every document edit must undo back to the exact song it started from.

use stave_ir::{
    Cell, ChannelSelect, Column, Document, Metre, Song, TextField, UndoEntry, UndoLog, UndoOutcome,
    BASE_LIMIT, EMPTY_COLUMN, MAX_LIMIT,
};

fn column(a: u8, b: u8, c: u8) -> Column {
    [Cell::new(c, 1), Cell::new(b, 2), Cell::new(a, 3)]
}

/// A song with something in every field, already saved.
fn busy_document() -> Document {
    let mut song = Song::new();
    song.set_length(40);
    song.tempo = 0x33;
    song.looping = true;
    let _ = song.title.try_push_str("Overworld");
    let _ = song.author.try_push_str("K");
    for beat in 0..40 {
        let n = (beat % 13) as u8 + 1;
        song.write_column(beat, column(n, 14 - n, if beat % 2 == 0 { n } else { 1 }));
    }
    song.write_cell(7, 0, Cell::EMPTY);

    let mut doc = Document::new();
    doc.replace(song, false);
    doc
}

fn assert_round_trip(name: &str, edit: impl FnOnce(&mut Document)) {
    let mut doc = busy_document();
    let before = doc.song.clone();
    edit(&mut doc);
    assert!(doc.song.dirty, "{name}: edit did not mark the song dirty");
    assert_eq!(doc.undo(), UndoOutcome::Reverted, "{name}");
    assert_eq!(doc.song, before, "{name}: undo did not restore the song");
    assert!(!doc.song.dirty, "{name}");
    assert!(!doc.undo.can_undo(), "{name}: extra entries left behind");
}

#[test]
fn every_primitive_round_trips() {
    assert_round_trip("set note", |doc| {
        doc.set_note(7, 9, 4, ChannelSelect::All).unwrap();
    });
    assert_round_trip("set pinned note", |doc| {
        doc.set_note(3, 9, 4, ChannelSelect::B).unwrap();
    });
    assert_round_trip("erase note", |doc| {
        assert!(doc.erase_note(3, 4, ChannelSelect::All));
    });
    assert_round_trip("set column", |doc| {
        assert!(doc.set_column(12, EMPTY_COLUMN));
    });
    assert_round_trip("tempo", |doc| doc.set_tempo(-20));
    assert_round_trip("metre", |doc| doc.set_metre(Metre::Three));
    assert_round_trip("loop", |doc| doc.set_loop(false));
    assert_round_trip("length", |doc| {
        assert!(doc.set_length(5));
    });
    assert_round_trip("type title", |doc| {
        assert!(doc.type_char(TextField::Title, '!'));
    });
    assert_round_trip("backspace author", |doc| {
        assert!(doc.backspace(TextField::Author));
    });
    assert_round_trip("delete column", |doc| {
        assert!(doc.delete_column(0));
    });
    assert_round_trip("insert column", |doc| {
        assert!(doc.insert_column(10, column(1, 2, 3)));
    });
    assert_round_trip("insert at end", |doc| {
        assert!(doc.insert_column(40, column(1, 2, 3)));
    });
}

#[test]
fn grouped_edits_undo_as_one() {
    let mut doc = busy_document();
    let before = doc.song.clone();
    let head = doc.undo.head();

    let clip = doc.copy_range(2, 6);
    assert_eq!(doc.erase_range(2, 6), 5);
    assert_eq!(doc.paste(20, &clip), 5);
    assert_eq!(doc.paste_insert(0, &clip), 5);
    let cut = doc.cut_range(30, 33);
    assert_eq!(cut.len(), 4);

    for _ in 0..4 {
        assert_eq!(doc.undo(), UndoOutcome::Reverted);
    }
    assert_eq!(doc.song, before);
    assert_eq!(doc.undo.head(), head);
    assert_eq!(doc.undo(), UndoOutcome::AtOrigin);
}

#[test]
fn paste_past_the_end_only_counts_what_landed() {
    let mut doc = busy_document();
    let clip = doc.copy_range(0, 4);
    assert_eq!(doc.paste(38, &clip), 2);
    assert_eq!(doc.undo.peek(), UndoEntry::GroupMarker { count: 2 });
}

#[test]
fn empty_group_pushes_nothing() {
    let mut doc = busy_document();
    assert_eq!(doc.erase_range(50, 60), 0);
    assert!(!doc.undo.can_undo());
    assert!(!doc.song.dirty);
}

#[test]
fn savepoint_scenario() {
    let mut doc = Document::new();
    doc.set_tempo(1);
    doc.set_tempo(2);
    doc.mark_saved();
    doc.set_tempo(3);

    doc.undo();
    assert!(!doc.song.dirty);
    assert_eq!(doc.song.tempo, 2);
    doc.undo();
    assert!(doc.song.dirty);
}

#[test]
fn wraparound_keeps_one_origin() {
    let capacity = 16;
    let mut song = Song::new();
    let mut log = UndoLog::with_capacity(capacity);

    for tempo in 0..(capacity as u8 * 3) {
        log.push(UndoEntry::TempoChange { tempo });
        song.tempo = tempo + 1;
    }

    let mut undone = 0;
    while log.undo(&mut song) == UndoOutcome::Reverted {
        undone += 1;
        assert!(undone < capacity, "undo walked past the origin");
    }
    assert_eq!(undone, capacity - 1);
    assert_eq!(song.tempo, capacity as u8 * 3 - (capacity as u8 - 1));
    assert_eq!(log.undo(&mut song), UndoOutcome::AtOrigin);
    assert_eq!(log.peek(), UndoEntry::ClearMarker);
}

#[test]
fn insert_at_capacity_keeps_the_displaced_column() {
    let mut doc = Document::new();
    doc.song.set_length(BASE_LIMIT);
    let last = BASE_LIMIT as usize - 1;
    doc.song.write_column(last, column(13, 12, 11));
    doc.song.write_column(0, column(1, 1, 1));
    let before = doc.song.clone();

    assert!(doc.insert_column(0, column(5, 5, 5)));
    assert_eq!(doc.song.length(), BASE_LIMIT);
    assert_eq!(doc.song.column(0), column(5, 5, 5));
    assert_eq!(doc.song.column(1), column(1, 1, 1));
    assert_eq!(doc.song.column(last), before.column(last - 1));

    doc.undo();
    assert_eq!(doc.song, before);
    assert_eq!(doc.song.column(last), column(13, 12, 11));
}

#[test]
fn extended_limit_round_trip() {
    let mut doc = Document::new();
    doc.toggle_limit();
    assert_eq!(doc.song.limit(), MAX_LIMIT);
    assert!(doc.set_length(500));

    doc.toggle_limit();
    assert_eq!(doc.song.limit(), BASE_LIMIT);
    assert_eq!(doc.song.length(), BASE_LIMIT);

    // Undoing the truncation restores the length and the wide window with it.
    doc.undo();
    assert_eq!(doc.song.length(), 500);
    assert_eq!(doc.song.limit(), MAX_LIMIT);
}

#[test]
fn insert_survives_a_capacity_change_before_undo() {
    let mut doc = Document::new();
    doc.song.write_column(95, column(7, 7, 7));
    let before = doc.song.clone();

    doc.toggle_limit();
    assert!(doc.set_length(50));
    assert!(doc.insert_column(0, column(1, 2, 3)));
    assert_eq!(doc.song.column(96), column(7, 7, 7));
    doc.toggle_limit();
    assert_eq!(doc.song.limit(), BASE_LIMIT);

    while doc.undo() == UndoOutcome::Reverted {}
    assert_eq!(doc.song.length(), BASE_LIMIT);
    assert_eq!(doc.song.column(95), column(7, 7, 7));
    assert_eq!(doc.song.column(96), EMPTY_COLUMN);
    assert_eq!(doc.song, before);
}

#[test]
fn delete_survives_a_capacity_change_before_undo() {
    let mut doc = Document::new();
    doc.toggle_limit();
    assert!(doc.set_length(200));
    doc.song.write_column(150, column(4, 5, 6));
    doc.song.write_column(10, column(9, 9, 9));
    doc.mark_saved();
    let before = doc.song.clone();

    assert!(doc.delete_column(10));
    doc.toggle_limit();
    assert_eq!(doc.song.length(), BASE_LIMIT);

    doc.undo();
    doc.undo();
    assert_eq!(doc.song.length(), 200);
    assert_eq!(doc.song.column(10), column(9, 9, 9));
    assert_eq!(doc.song.column(150), column(4, 5, 6));
    assert_eq!(doc.song, before);
}

#[test]
fn sanitize_is_idempotent() {
    let mut song = busy_document().song;
    song.tempo = 0xFE;
    song.write_cell(3, 1, Cell::new(14, 2));
    song.write_cell(4, 1, Cell::new(3, 15));
    song.set_length(0);

    assert!(song.sanitize());
    let once = song.clone();
    assert!(!song.sanitize());
    assert_eq!(song, once);
}
