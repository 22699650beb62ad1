//! Studies are described by a JSON manifest and built into a job graph

/// Read and validate study manifests
pub mod manifest;
/// RNA-seq analysis: alignment and read count normalization
pub mod rnaseq;
