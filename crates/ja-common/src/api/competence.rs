use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TranslationDto {
    pub language: String,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CompetenceDto {
    pub competence_id: i32,
    pub translations: Vec<TranslationDto>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CompetenceFilter {
    pub language: Option<String>,
}
