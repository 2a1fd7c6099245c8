use tokio_postgres::Row;
use tracing::instrument;

use crate::api::competence::{CompetenceDto, CompetenceFilter, TranslationDto};
use crate::db::util::TimedClientExt;
use crate::db::{PgPool, db_error};

db_error!(CompetenceStorageError {});

fn row_to_translation(row: &Row) -> Result<(i32, TranslationDto), CompetenceStorageError> {
    Ok((
        row.try_get("competence_id")?,
        TranslationDto {
            language: row.try_get("language")?,
            name: row.try_get("name")?,
        },
    ))
}

/// Folds translation rows, ordered by competence id, into one entry per
/// competence.
fn group_translations(rows: impl IntoIterator<Item = (i32, TranslationDto)>) -> Vec<CompetenceDto> {
    let mut competences: Vec<CompetenceDto> = Vec::new();

    for (competence_id, translation) in rows {
        match competences.last_mut() {
            Some(last) if last.competence_id == competence_id => {
                last.translations.push(translation);
            }
            _ => competences.push(CompetenceDto {
                competence_id,
                translations: vec![translation],
            }),
        }
    }

    competences
}

async fn fetch_competences(
    pool: &PgPool,
    filter: &CompetenceFilter,
) -> Result<Vec<CompetenceDto>, CompetenceStorageError> {
    let client = pool.get().await?;
    let stmt = client
        .prepare_cached(
            "SELECT c.competence_id, ct.language, ct.name
             FROM recruit.competence c
             JOIN recruit.competence_translation ct ON ct.competence_id = c.competence_id
             WHERE $1::TEXT IS NULL OR ct.language = $1
             ORDER BY c.competence_id, ct.language",
        )
        .await?;

    let rows = client
        .timed_query(&stmt, &[&filter.language], "list_competences")
        .await?;
    let translations = rows
        .iter()
        .map(row_to_translation)
        .collect::<Result<Vec<_>, _>>()?;

    Ok(group_translations(translations))
}

/// Every competence that has at least one translation, optionally limited to
/// one language.
#[instrument(skip(pool))]
pub async fn list_competences(
    pool: &PgPool,
    filter: &CompetenceFilter,
) -> Result<Vec<CompetenceDto>, CompetenceStorageError> {
    fetch_competences(pool, filter)
        .await
        .map_err(|err| err.during("list_competences"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn translation(language: &str, name: &str) -> TranslationDto {
        TranslationDto {
            language: language.into(),
            name: name.into(),
        }
    }

    #[test]
    fn groups_consecutive_rows_per_competence() {
        let grouped = group_translations(vec![
            (1, translation("en", "ticket sales")),
            (1, translation("sv", "biljettförsäljning")),
            (2, translation("en", "lotteries")),
        ]);

        assert_eq!(grouped.len(), 2);
        assert_eq!(grouped[0].competence_id, 1);
        assert_eq!(grouped[0].translations.len(), 2);
        assert_eq!(grouped[1].translations, vec![translation("en", "lotteries")]);
    }

    #[test]
    fn empty_rows_yield_no_competences() {
        assert!(group_translations(Vec::new()).is_empty());
    }
}
