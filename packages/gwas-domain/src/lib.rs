pub mod genotype;
pub mod parse;
pub mod quality;
