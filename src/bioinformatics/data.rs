use std::path::PathBuf;

use crate::pipeline::Pipeline;
use crate::queue::{JobHandle, JobQueue};
use crate::transfer::{transfer, Source, TransferError};

/// A sequencing read file and the job that puts it in place
#[derive(Clone, Debug)]
pub struct Read {
    pub source: Source,
    pub location: PathBuf,
    pub download: JobHandle,
}

impl Read {
    /// Parse `source` and submit its transfer to `location`
    pub fn fetch<Q: JobQueue>(pipeline: &Pipeline<Q>, source: &str, location: impl Into<PathBuf>) -> Result<Read, TransferError> {
        let source: Source = source.parse()?;
        let location = location.into();
        let download = transfer(pipeline, &source, &location)?;
        Ok(Read { source, location, download })
    }

    /// File name without any extension, `Control1_1.fastq.gz` gives `Control1_1`
    pub fn stem(&self) -> &str {
        let name = self
            .location
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or_default();
        match name.split_once('.') {
            Some((stem, _)) if !stem.is_empty() => stem,
            _ => name,
        }
    }

    pub fn is_compressed(&self) -> bool {
        self.location.extension().map_or(false, |extension| extension == "gz")
    }
}

#[derive(Clone, Debug)]
pub struct Alignment {
    pub path: PathBuf,
    pub handle: JobHandle,
}

#[derive(Clone, Debug)]
pub struct Sample {
    pub id: String,
    pub reads: Vec<Read>,
    /// Set once the sample has been aligned
    pub alignment: Option<Alignment>,
}

impl Sample {
    pub fn new(id: impl Into<String>, reads: Vec<Read>) -> Sample {
        Sample { id: id.into(), reads, alignment: None }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn read(location: &str) -> Read {
        Read {
            source: Source::Job(JobHandle::new("upstream")),
            location: PathBuf::from(location),
            download: JobHandle::new("upstream"),
        }
    }

    #[test]
    fn stems_drop_every_extension() {
        assert_eq!(read("/fastq/Control1_1.fastq.gz").stem(), "Control1_1");
        assert_eq!(read("/fastq/Control1_1").stem(), "Control1_1");
        assert!(read("/fastq/Control1_1.fastq.gz").is_compressed());
        assert!(!read("/fastq/Control1_1.fastq").is_compressed());
    }
}
