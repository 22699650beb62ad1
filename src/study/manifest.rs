use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use jsonschema::JSONSchema;
use log::{info, warn};
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

use crate::bioinformatics::genome::Species;
use crate::transfer::Source;

#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("can't read manifest {path}: {source}")]
    Read { path: PathBuf, source: std::io::Error },
    #[error("manifest is not JSON: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("invalid manifest schema: {0}")]
    Schema(String),
    #[error("manifest fails validation: {}", .0.join("; "))]
    Validation(Vec<String>),
}

#[derive(Clone, Debug, Deserialize)]
pub struct GenomeRequest {
    pub species: Species,
    pub version: String,
    pub release: String,
}

/// Tool versions
#[derive(Clone, Debug, Deserialize)]
pub struct Software {
    pub fastqc: String,
    pub star: String,
    pub samtools: String,
    pub sam2cov: String,
    pub port: String,
}

#[derive(Clone, Debug, Deserialize)]
pub struct ReadRequest {
    /// `s3://`, `file://` or `job://` locator
    pub source: String,
    /// File name inside the analysis `fastq` directory
    pub file: String,
}

#[derive(Clone, Debug, Deserialize)]
pub struct SampleRequest {
    pub id: String,
    pub reads: Vec<ReadRequest>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct NormalizationRequest {
    /// PORT configuration template, relative to the manifest
    pub configuration: PathBuf,
    #[serde(default)]
    pub resume: bool,
    #[serde(default)]
    pub second_part: bool,
    pub cutoff: Option<u32>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct Manifest {
    pub genome: GenomeRequest,
    pub software: Software,
    pub samples: Vec<SampleRequest>,
    pub normalization: NormalizationRequest,
    /// Directory the manifest was read from
    #[serde(skip)]
    pub directory: PathBuf,
}

impl Manifest {
    pub fn read(path: &Path) -> Result<Manifest, ManifestError> {
        info!("Reading manifest at {}", path.display());
        let json_string = fs::read_to_string(path).map_err(|source| ManifestError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let mut manifest = Manifest::parse(&json_string)?;
        manifest.directory = path.parent().map(Path::to_path_buf).unwrap_or_default();
        Ok(manifest)
    }

    /// Validate raw JSON against the bundled schema, then deserialise it
    pub fn parse(json_string: &str) -> Result<Manifest, ManifestError> {
        info!("Parsing JSON into untyped structure");
        let json: Value = serde_json::from_str(json_string)?;
        validate(&json)?;
        info!("Deserialising valid JSON into typed Rust object");
        Ok(serde_json::from_value::<Manifest>(json)?)
    }

    pub fn configuration_path(&self) -> PathBuf {
        self.directory.join(&self.normalization.configuration)
    }

    /// Buckets reads are fetched from
    pub fn buckets(&self) -> BTreeSet<String> {
        self.samples
            .iter()
            .flat_map(|sample| sample.reads.iter())
            .filter_map(|read| match read.source.parse::<Source>() {
                Ok(Source::S3 { bucket, .. }) => Some(bucket),
                _ => None,
            })
            .collect()
    }
}

fn validate(json: &Value) -> Result<(), ManifestError> {
    /// included study manifest schema
    static SCHEMA: &str = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/data/schema/study.json"));
    let schema: Value = serde_json::from_str(SCHEMA)?;
    let compiled = JSONSchema::compile(&schema).map_err(|err| ManifestError::Schema(err.to_string()))?;

    info!("Validating raw manifest against JSON schema");
    compiled.validate(json).map_err(|errors| {
        warn!("Manifest fails validation");
        ManifestError::Validation(errors.map(|err| format!("{} at {}", err, err.instance_path)).collect())
    })
}
