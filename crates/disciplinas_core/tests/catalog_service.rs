use disciplinas_core::db::open_db_in_memory;
use disciplinas_core::{
    demo_catalog, CatalogError, CatalogService, Discipline, DisciplineKey, DisciplinePatch,
    DisciplineRepository, ErrorKind, MemoryDisciplineRepository, Note, NoteId, NoteIdRule,
    SqliteDisciplineRepository, ValidationError,
};
use std::sync::Arc;
use std::thread;

fn note(id: &str, value: &str) -> Note {
    Note::new(NoteId::parse(id, NoteIdRule::Token).unwrap(), value)
}

fn seeded<R: DisciplineRepository>(repo: R) -> CatalogService<R> {
    let service = CatalogService::new(repo);
    service
        .create_discipline(
            Discipline::new("Matematica", Some("Angélica".to_string()))
                .with_note(note("n1", "Muito Legal!"))
                .with_note(note("n2", "Gosto Muito")),
        )
        .unwrap();
    service
        .create_discipline(Discipline::new("Quimica", None).with_note(note("q1", "Meh")))
        .unwrap();
    service
        .create_discipline(Discipline::new("Portugues", Some("Arnaldo".to_string())))
        .unwrap();
    service
}

fn update_without_name_keeps_key_and_notes<R: DisciplineRepository>(repo: R) {
    let service = seeded(repo);

    let updated = service
        .update_discipline("matematica", &DisciplinePatch::default().teacher("Paulo"))
        .unwrap();

    assert_eq!(updated.key(), DisciplineKey::from_name("matematica"));
    assert_eq!(updated.name, "Matematica");
    assert_eq!(updated.teacher.as_deref(), Some("Paulo"));
    assert_eq!(
        updated.notes,
        vec![note("n1", "Muito Legal!"), note("n2", "Gosto Muito")]
    );
}

fn rename_moves_discipline_and_notes<R: DisciplineRepository>(repo: R) {
    let service = seeded(repo);

    let renamed = service
        .update_discipline("matematica", &DisciplinePatch::rename("Matemática"))
        .unwrap();

    assert_eq!(renamed.key().as_str(), "matemática");
    assert_eq!(renamed.name, "Matemática");
    assert_eq!(renamed.teacher.as_deref(), Some("Angélica"));
    assert_eq!(
        renamed.notes,
        vec![note("n1", "Muito Legal!"), note("n2", "Gosto Muito")]
    );

    assert!(service.resolve("matematica").unwrap().is_none());
    assert_eq!(service.resolve("MATEMÁTICA").unwrap(), Some(renamed));
    assert!(!service
        .has_any_notes(&DisciplineKey::from_name("matematica"))
        .unwrap());
    assert_eq!(
        service.list_names().unwrap(),
        ["Quimica", "Portugues", "Matemática"]
    );
}

fn rename_to_own_key_is_not_a_conflict<R: DisciplineRepository>(repo: R) {
    let service = seeded(repo);

    let updated = service
        .update_discipline("matematica", &DisciplinePatch::rename("MATEMATICA"))
        .unwrap();

    assert_eq!(updated.name, "MATEMATICA");
    assert_eq!(updated.notes.len(), 2);
    assert_eq!(service.list_disciplines().unwrap().len(), 3);

    let unchanged = service
        .update_discipline("matematica", &DisciplinePatch::rename("MATEMATICA"))
        .unwrap();
    assert_eq!(unchanged, updated);
}

fn rename_onto_other_discipline_conflicts<R: DisciplineRepository>(repo: R) {
    let service = seeded(repo);
    let before = service.list_disciplines().unwrap();

    let err = service
        .update_discipline("matematica", &DisciplinePatch::rename("quimica"))
        .unwrap_err();

    assert!(matches!(&err, CatalogError::Conflict(key) if key.as_str() == "quimica"));
    assert_eq!(err.kind(), ErrorKind::Conflict);
    assert_eq!(service.list_disciplines().unwrap(), before);
}

fn update_missing_discipline_is_not_found<R: DisciplineRepository>(repo: R) {
    let service = seeded(repo);

    let err = service
        .update_discipline("fisica", &DisciplinePatch::rename("Física"))
        .unwrap_err();

    assert!(matches!(err, CatalogError::DisciplineNotFound(_)));
    assert!(service.resolve("física").unwrap().is_none());
}

fn update_with_invalid_name_changes_nothing<R: DisciplineRepository>(repo: R) {
    let service = seeded(repo);

    let err = service
        .update_discipline("quimica", &DisciplinePatch::rename("q".repeat(41)))
        .unwrap_err();

    assert!(matches!(
        err,
        CatalogError::Validation(ValidationError::NameTooLong { chars: 41 })
    ));
    assert_eq!(service.get_discipline("quimica").unwrap().name, "Quimica");
}

fn create_conflicts_case_insensitively<R: DisciplineRepository>(repo: R) {
    let service = seeded(repo);

    let err = service
        .create_discipline(Discipline::new("PORTUGUES", None))
        .unwrap_err();

    assert!(matches!(err, CatalogError::Conflict(_)));
    assert_eq!(
        service.get_discipline("portugues").unwrap().teacher.as_deref(),
        Some("Arnaldo")
    );
}

fn create_rejects_duplicate_note_ids<R: DisciplineRepository>(repo: R) {
    let service = CatalogService::new(repo);

    let err = service
        .create_discipline(
            Discipline::new("Fisica", None)
                .with_note(note("a", "1"))
                .with_note(note("a", "2")),
        )
        .unwrap_err();

    assert!(matches!(
        err,
        CatalogError::Validation(ValidationError::DuplicateNoteId(_))
    ));
    assert!(service.list_disciplines().unwrap().is_empty());
}

fn replace_note_updates_only_that_note<R: DisciplineRepository>(repo: R) {
    let service = seeded(repo);

    let updated = service
        .replace_note("Matematica", "n1", "Nota modificada")
        .unwrap();

    assert_eq!(
        updated.notes,
        vec![note("n1", "Nota modificada"), note("n2", "Gosto Muito")]
    );
    assert_eq!(updated.teacher.as_deref(), Some("Angélica"));
}

fn note_guards_run_in_order<R: DisciplineRepository>(repo: R) {
    let service = seeded(repo);

    let err = service.replace_note("fisica", "n1", "x").unwrap_err();
    assert!(matches!(err, CatalogError::DisciplineNotFound(_)));

    let err = service.replace_note("portugues", "n1", "x").unwrap_err();
    assert!(matches!(err, CatalogError::NoNotes(_)));

    let err = service.replace_note("matematica", "n9", "x").unwrap_err();
    assert!(matches!(err, CatalogError::NoteNotFound { .. }));
    assert_eq!(err.kind(), ErrorKind::NotFound);

    assert_eq!(
        service.list_notes("matematica").unwrap(),
        vec![note("n1", "Muito Legal!"), note("n2", "Gosto Muito")]
    );
}

fn list_notes_requires_notes<R: DisciplineRepository>(repo: R) {
    let service = seeded(repo);

    assert!(matches!(
        service.list_notes("portugues").unwrap_err(),
        CatalogError::NoNotes(_)
    ));
    assert!(matches!(
        service.list_notes("fisica").unwrap_err(),
        CatalogError::DisciplineNotFound(_)
    ));
    assert_eq!(service.list_notes("QUIMICA").unwrap(), vec![note("q1", "Meh")]);
}

fn add_note_assigns_or_overwrites<R: DisciplineRepository>(repo: R) {
    let service = seeded(repo);

    let first = service.add_note("portugues", None, "Ler Machado").unwrap();
    assert_eq!(first.notes.len(), 1);
    assert!(NoteId::parse(first.notes[0].id.as_str(), NoteIdRule::Uuid).is_ok());

    let overwritten = service
        .add_note("quimica", Some("q1"), "Melhorou")
        .unwrap();
    assert_eq!(overwritten.notes, vec![note("q1", "Melhorou")]);

    let err = service.add_note("fisica", Some("f1"), "x").unwrap_err();
    assert!(matches!(err, CatalogError::DisciplineNotFound(_)));

    let err = service.add_note("quimica", Some("q 1"), "x").unwrap_err();
    assert!(matches!(
        err,
        CatalogError::Validation(ValidationError::InvalidNoteId(_))
    ));

    let err = service.add_note("quimica", Some("q2"), "").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
}

fn delete_note_returns_remaining_state<R: DisciplineRepository>(repo: R) {
    let service = seeded(repo);

    let after = service.delete_note("quimica", "q1").unwrap();
    assert!(after.notes.is_empty());

    let err = service.delete_note("quimica", "q1").unwrap_err();
    assert!(matches!(err, CatalogError::NoNotes(_)));
}

fn delete_discipline_removes_its_notes<R: DisciplineRepository>(repo: R) {
    let service = seeded(repo);
    let key = DisciplineKey::from_name("matematica");

    service.delete_discipline("MATEMATICA").unwrap();

    assert!(service.resolve("matematica").unwrap().is_none());
    assert!(!service.has_any_notes(&key).unwrap());
    assert!(!service
        .note_exists(&key, &NoteId::parse("n1", NoteIdRule::Token).unwrap())
        .unwrap());
    assert!(matches!(
        service.delete_discipline("matematica").unwrap_err(),
        CatalogError::DisciplineNotFound(_)
    ));

    service
        .create_discipline(Discipline::new("Matematica", None))
        .unwrap();
    assert!(matches!(
        service.list_notes("matematica").unwrap_err(),
        CatalogError::NoNotes(_)
    ));
}

fn seed_loads_only_into_empty_catalog<R: DisciplineRepository>(repo: R) {
    let service = CatalogService::new(repo);

    assert_eq!(service.seed_if_empty(demo_catalog()).unwrap(), 4);
    assert_eq!(service.seed_if_empty(demo_catalog()).unwrap(), 0);

    assert_eq!(
        service.list_names().unwrap(),
        ["Matematica", "Quimica", "Portugues", "Ingles"]
    );
    assert_eq!(service.list_notes("matematica").unwrap().len(), 3);
}

fn concurrent_renames_of_one_discipline_leave_one_winner<R: DisciplineRepository + 'static>(
    repo: R,
) {
    let service = Arc::new(seeded(repo));

    let handles: Vec<_> = ["Algebra", "Calculo", "Geometria", "Analise"]
        .into_iter()
        .map(|target| {
            let service = Arc::clone(&service);
            thread::spawn(move || {
                service
                    .update_discipline("matematica", &DisciplinePatch::rename(target))
                    .is_ok()
            })
        })
        .collect();
    let successes = handles
        .into_iter()
        .map(|handle| handle.join().unwrap())
        .filter(|ok| *ok)
        .count();

    assert_eq!(successes, 1);
    let all = service.list_disciplines().unwrap();
    assert_eq!(all.len(), 3);
    let moved = all
        .iter()
        .find(|discipline| !discipline.notes.is_empty() && discipline.teacher.is_some())
        .unwrap();
    assert_eq!(moved.notes.len(), 2);
    assert!(service.resolve("matematica").unwrap().is_none());
}

fn note_guards_run_before_id_and_text_checks<R: DisciplineRepository>(repo: R) {
    let service = seeded(repo);

    let err = service.replace_note("fisica", "a.b", "").unwrap_err();
    assert!(matches!(err, CatalogError::DisciplineNotFound(_)));

    let err = service.delete_note("portugues", "a.b").unwrap_err();
    assert!(matches!(err, CatalogError::NoNotes(_)));

    let err = service.replace_note("matematica", "a.b", "y").unwrap_err();
    assert!(matches!(&err, CatalogError::NoteNotFound { note_id, .. } if note_id.as_str() == "a.b"));
    assert_eq!(err.kind(), ErrorKind::NotFound);

    let err = service.delete_note("matematica", "a/b").unwrap_err();
    assert!(matches!(err, CatalogError::NoteNotFound { .. }));

    let err = service.replace_note("matematica", "n1", "").unwrap_err();
    assert!(matches!(
        err,
        CatalogError::Validation(ValidationError::EmptyNote)
    ));
    assert_eq!(service.list_notes("matematica").unwrap()[0].value, "Muito Legal!");
}

fn uuid_rule_reports_foreign_ids_as_missing_notes<R: DisciplineRepository>(repo: R) {
    let service = CatalogService::with_note_id_rule(repo, NoteIdRule::Uuid);
    let id = "9470e1d7-bbbe-4037-9032-4b5e1c0ffddf";
    service
        .create_discipline(
            Discipline::new("Matematica", None)
                .with_note(Note::new(NoteId::parse(id, NoteIdRule::Uuid).unwrap(), "Muito Legal!")),
        )
        .unwrap();

    let err = service.replace_note("fisica", "n1", "y").unwrap_err();
    assert!(matches!(err, CatalogError::DisciplineNotFound(_)));

    let err = service.replace_note("matematica", "n1", "y").unwrap_err();
    assert!(matches!(err, CatalogError::NoteNotFound { .. }));
    assert_eq!(err.kind(), ErrorKind::NotFound);

    let err = service.delete_note("matematica", "n1").unwrap_err();
    assert!(matches!(err, CatalogError::NoteNotFound { .. }));

    let updated = service
        .replace_note("matematica", &id.to_uppercase(), "Nota modificada")
        .unwrap();
    assert_eq!(updated.notes[0].id.as_str(), id);
    assert_eq!(updated.notes[0].value, "Nota modificada");
}

fn sequential_rule_assigns_next_number<R: DisciplineRepository>(repo: R) {
    let service = CatalogService::with_note_id_rule(repo, NoteIdRule::Sequential);
    service
        .create_discipline(Discipline::new("Fisica", None).with_note(Note::new(
            NoteId::parse("3", NoteIdRule::Sequential).unwrap(),
            "Cinemática",
        )))
        .unwrap();

    let after_first = service.add_note("fisica", None, "Dinâmica").unwrap();
    assert_eq!(after_first.notes[1].id.as_str(), "4");

    service.add_note("fisica", Some("010"), "Óptica").unwrap();
    let after_second = service.add_note("fisica", None, "Ondas").unwrap();
    let ids: Vec<&str> = after_second.notes.iter().map(|note| note.id.as_str()).collect();
    assert_eq!(ids, ["3", "4", "10", "11"]);

    let err = service.add_note("fisica", Some("n1"), "x").unwrap_err();
    assert!(matches!(
        err,
        CatalogError::Validation(ValidationError::InvalidNoteId(_))
    ));
    let err = service.replace_note("fisica", "n1", "x").unwrap_err();
    assert!(matches!(err, CatalogError::NoteNotFound { .. }));
}

fn sequential_rule_renumbers_seed_notes<R: DisciplineRepository>(repo: R) {
    let service = CatalogService::with_note_id_rule(repo, NoteIdRule::Sequential);

    assert_eq!(service.seed_if_empty(demo_catalog()).unwrap(), 4);

    let notes = service.list_notes("matematica").unwrap();
    let ids: Vec<&str> = notes.iter().map(|note| note.id.as_str()).collect();
    assert_eq!(ids, ["1", "2", "3"]);
    assert_eq!(notes[0].value, "Muito Legal!");
}

fn list_notes_during_recreation_never_reports_missing_notes<R: DisciplineRepository + 'static>(
    repo: R,
) {
    let service = Arc::new(seeded(repo));

    let writer = {
        let service = Arc::clone(&service);
        thread::spawn(move || {
            for _ in 0..100 {
                service.delete_discipline("quimica").unwrap();
                service
                    .create_discipline(Discipline::new("Quimica", None).with_note(note("q1", "Meh")))
                    .unwrap();
            }
        })
    };

    for _ in 0..200 {
        match service.list_notes("quimica") {
            Ok(notes) => assert_eq!(notes, vec![note("q1", "Meh")]),
            Err(CatalogError::DisciplineNotFound(_)) => {}
            Err(other) => panic!("unexpected error while listing notes: {other}"),
        }
    }
    writer.join().unwrap();
}

#[test]
fn failed_relocation_leaves_catalog_untouched() {
    let conn = open_db_in_memory().unwrap();
    conn.execute_batch(
        "CREATE TRIGGER block_discipline_delete
         BEFORE DELETE ON disciplines
         BEGIN
             SELECT RAISE(ABORT, 'delete blocked');
         END;",
    )
    .unwrap();
    let service = seeded(SqliteDisciplineRepository::try_new(conn).unwrap());
    let before = service.list_disciplines().unwrap();

    let err = service
        .update_discipline("matematica", &DisciplinePatch::rename("Algebra"))
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Internal);
    assert!(service.resolve("algebra").unwrap().is_none());
    let kept = service.get_discipline("matematica").unwrap();
    assert_eq!(
        kept.notes,
        vec![note("n1", "Muito Legal!"), note("n2", "Gosto Muito")]
    );
    assert_eq!(service.list_disciplines().unwrap(), before);
}

macro_rules! catalog_behavior {
    ($module:ident, $make:expr) => {
        mod $module {
            use super::*;

            #[test]
            fn update_without_name() {
                update_without_name_keeps_key_and_notes($make);
            }

            #[test]
            fn rename() {
                rename_moves_discipline_and_notes($make);
            }

            #[test]
            fn self_rename() {
                rename_to_own_key_is_not_a_conflict($make);
            }

            #[test]
            fn rename_conflict() {
                rename_onto_other_discipline_conflicts($make);
            }

            #[test]
            fn update_missing() {
                update_missing_discipline_is_not_found($make);
            }

            #[test]
            fn update_invalid() {
                update_with_invalid_name_changes_nothing($make);
            }

            #[test]
            fn create_conflict() {
                create_conflicts_case_insensitively($make);
            }

            #[test]
            fn create_duplicate_notes() {
                create_rejects_duplicate_note_ids($make);
            }

            #[test]
            fn replace_note() {
                replace_note_updates_only_that_note($make);
            }

            #[test]
            fn note_guards() {
                note_guards_run_in_order($make);
            }

            #[test]
            fn list_notes() {
                list_notes_requires_notes($make);
            }

            #[test]
            fn add_note() {
                add_note_assigns_or_overwrites($make);
            }

            #[test]
            fn delete_note() {
                delete_note_returns_remaining_state($make);
            }

            #[test]
            fn delete_discipline() {
                delete_discipline_removes_its_notes($make);
            }

            #[test]
            fn seed() {
                seed_loads_only_into_empty_catalog($make);
            }

            #[test]
            fn note_guards_before_input_checks() {
                note_guards_run_before_id_and_text_checks($make);
            }

            #[test]
            fn uuid_rule_foreign_ids() {
                uuid_rule_reports_foreign_ids_as_missing_notes($make);
            }

            #[test]
            fn sequential_ids() {
                sequential_rule_assigns_next_number($make);
            }

            #[test]
            fn sequential_seed() {
                sequential_rule_renumbers_seed_notes($make);
            }

            #[test]
            fn list_notes_snapshot() {
                list_notes_during_recreation_never_reports_missing_notes($make);
            }

            #[test]
            fn concurrent_renames() {
                concurrent_renames_of_one_discipline_leave_one_winner($make);
            }
        }
    };
}

catalog_behavior!(
    sqlite,
    SqliteDisciplineRepository::try_new(open_db_in_memory().unwrap()).unwrap()
);
catalog_behavior!(memory, MemoryDisciplineRepository::new());
