pub mod applications;
pub mod competences;
pub mod health;
pub mod persons;
