pub mod evaluation;
pub mod keywords;
pub mod materials;
