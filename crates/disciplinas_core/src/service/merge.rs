//! Partial-update merge and rename planning.
//!
//! # Responsibility
//! - Merge a `DisciplinePatch` into a stored record.
//! - Decide whether the result is unchanged, an in-place write, or a
//!   relocation to a new key.
//!
//! # Invariants
//! - Absent and empty patch fields leave the stored value untouched.
//! - The planned record's key is always `casefold(record.name)`.
//! - Notes are outside this module; a plan never carries them.

use crate::model::discipline::{DisciplineKey, DisciplinePatch, DisciplineRecord};
use crate::model::validation::{validate_name, validate_teacher, ValidationError};

/// Storage action required to apply a patch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdatePlan {
    /// Patch changes nothing; no write needed.
    Unchanged { key: DisciplineKey },
    /// Same key, new attribute values (including a case-only rename).
    InPlace {
        key: DisciplineKey,
        record: DisciplineRecord,
    },
    /// Key changes; the record and its notes move from `from` to `record.key()`.
    Relocate {
        from: DisciplineKey,
        record: DisciplineRecord,
    },
}

impl UpdatePlan {
    /// Key the discipline is stored under once the plan is applied.
    pub fn target_key(&self) -> DisciplineKey {
        match self {
            Self::Unchanged { key } => key.clone(),
            Self::InPlace { key, .. } => key.clone(),
            Self::Relocate { record, .. } => record.key(),
        }
    }

    pub fn is_rename(&self) -> bool {
        matches!(self, Self::Relocate { .. })
    }
}

/// Key a patch would move `current` to, without loading the stored record.
pub fn target_key(current: &DisciplineKey, update: &DisciplinePatch) -> DisciplineKey {
    match non_empty(update.name.as_deref()) {
        Some(name) => DisciplineKey::from_name(name),
        None => current.clone(),
    }
}

/// Merges `update` into `existing` and plans the storage action.
///
/// Conflict detection needs storage and is left to the caller.
pub fn merge_partial_update(
    existing: &DisciplineRecord,
    update: &DisciplinePatch,
) -> Result<UpdatePlan, ValidationError> {
    let existing_key = existing.key();
    let mut merged = existing.clone();

    if let Some(name) = non_empty(update.name.as_deref()) {
        validate_name(name)?;
        merged.name = name.to_string();
    }
    if let Some(teacher) = non_empty(update.teacher.as_deref()) {
        validate_teacher(teacher)?;
        merged.teacher = Some(teacher.to_string());
    }

    if merged == *existing {
        return Ok(UpdatePlan::Unchanged { key: existing_key });
    }
    if merged.key() == existing_key {
        return Ok(UpdatePlan::InPlace {
            key: existing_key,
            record: merged,
        });
    }
    Ok(UpdatePlan::Relocate {
        from: existing_key,
        record: merged,
    })
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|value| !value.is_empty())
}

#[cfg(test)]
mod tests {
    use super::{merge_partial_update, target_key, UpdatePlan};
    use crate::model::discipline::{DisciplineKey, DisciplinePatch, DisciplineRecord};
    use crate::model::validation::ValidationError;

    fn matematica() -> DisciplineRecord {
        DisciplineRecord::new("Matematica", Some("Angélica".to_string()))
    }

    #[test]
    fn rename_plans_relocation_and_keeps_teacher() {
        let plan =
            merge_partial_update(&matematica(), &DisciplinePatch::rename("Matemática")).unwrap();
        assert_eq!(
            plan,
            UpdatePlan::Relocate {
                from: DisciplineKey::from_name("matematica"),
                record: DisciplineRecord::new("Matemática", Some("Angélica".to_string())),
            }
        );
        assert_eq!(plan.target_key().as_str(), "matemática");
    }

    #[test]
    fn case_only_rename_is_in_place() {
        let plan =
            merge_partial_update(&matematica(), &DisciplinePatch::rename("MATEMATICA")).unwrap();
        assert!(!plan.is_rename());
        assert_eq!(
            plan,
            UpdatePlan::InPlace {
                key: DisciplineKey::from_name("matematica"),
                record: DisciplineRecord::new("MATEMATICA", Some("Angélica".to_string())),
            }
        );
    }

    #[test]
    fn identical_name_is_unchanged() {
        let plan =
            merge_partial_update(&matematica(), &DisciplinePatch::rename("Matematica")).unwrap();
        assert_eq!(
            plan,
            UpdatePlan::Unchanged {
                key: DisciplineKey::from_name("matematica")
            }
        );
    }

    #[test]
    fn empty_fields_leave_values_untouched() {
        let patch = DisciplinePatch {
            name: Some(String::new()),
            teacher: Some(String::new()),
        };
        let plan = merge_partial_update(&matematica(), &patch).unwrap();
        assert!(matches!(plan, UpdatePlan::Unchanged { .. }));
        assert_eq!(
            target_key(&DisciplineKey::from_name("matematica"), &patch).as_str(),
            "matematica"
        );
    }

    #[test]
    fn teacher_only_patch_writes_in_place() {
        let plan = merge_partial_update(
            &DisciplineRecord::new("Ingles", None),
            &DisciplinePatch::default().teacher("Paulo"),
        )
        .unwrap();
        assert_eq!(
            plan,
            UpdatePlan::InPlace {
                key: DisciplineKey::from_name("ingles"),
                record: DisciplineRecord::new("Ingles", Some("Paulo".to_string())),
            }
        );
    }

    #[test]
    fn invalid_values_are_rejected() {
        let err = merge_partial_update(&matematica(), &DisciplinePatch::rename("  ")).unwrap_err();
        assert_eq!(err, ValidationError::BlankName);

        let long_teacher = DisciplinePatch::default().teacher("x".repeat(41));
        assert!(merge_partial_update(&matematica(), &long_teacher).is_err());
    }
}
