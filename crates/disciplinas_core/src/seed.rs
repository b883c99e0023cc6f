//! Demo catalog used to populate an empty store.

use crate::model::discipline::Discipline;
use crate::model::note::{Note, NoteId};

fn note(id: &str, value: &str) -> Note {
    Note::new(NoteId::from_stored(id.to_string()), value)
}

/// Four disciplines covering every shape: teacher and notes, notes only,
/// teacher only, name only.
pub fn demo_catalog() -> Vec<Discipline> {
    vec![
        Discipline::new("Matematica", Some("Angélica".to_string()))
            .with_note(note("9470e1d7-bbbe-4037-9032-4b5e1c0ffddf", "Muito Legal!"))
            .with_note(note("f77fc0df-d9ac-4e70-a7c6-96d4bcf39484", "Gosto Muito"))
            .with_note(note("227ed50c-9cd9-4762-af8f-bc74954bdd9b", "Trabalhar Nisso")),
        Discipline::new("Quimica", None)
            .with_note(note("9d752a00-2185-43c6-b6db-269f11b16029", "Meh")),
        Discipline::new("Portugues", Some("Arnaldo".to_string())),
        Discipline::new("Ingles", None),
    ]
}
