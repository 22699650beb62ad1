//! Building blocks of sequencing analyses

/// Reads and the samples they belong to
pub mod data;
/// Reference genomes downloaded from Ensembl
pub mod genome;
/// Installable tools and the jobs they run
pub mod software;
