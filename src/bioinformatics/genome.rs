use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::pipeline::Pipeline;
use crate::queue::{JobHandle, JobQueue, JobSpec, QueueError};

const ENSEMBL: &str = "http://ftp.ensembl.org/pub";

#[derive(Copy, Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub enum Species {
    #[serde(rename = "Homo_sapiens")]
    HomoSapiens,
    #[serde(rename = "Mus_musculus")]
    MusMusculus,
    #[serde(rename = "Drosophila_melanogaster")]
    DrosophilaMelanogaster,
    #[serde(rename = "Danio_rerio")]
    DanioRerio,
    #[serde(rename = "Caenorhabditis_elegans")]
    CaenorhabditisElegans,
}

impl Species {
    pub fn as_str(&self) -> &'static str {
        match self {
            Species::HomoSapiens => "Homo_sapiens",
            Species::MusMusculus => "Mus_musculus",
            Species::DrosophilaMelanogaster => "Drosophila_melanogaster",
            Species::DanioRerio => "Danio_rerio",
            Species::CaenorhabditisElegans => "Caenorhabditis_elegans",
        }
    }

    /// Name of the mitochondrial sequence in Ensembl assemblies
    pub fn mitochondrial_chromosome(&self) -> &'static str {
        match self {
            Species::DrosophilaMelanogaster => "mitochondrion_genome",
            Species::CaenorhabditisElegans => "MtDNA",
            Species::HomoSapiens | Species::MusMusculus | Species::DanioRerio => "MT",
        }
    }
}

impl fmt::Display for Species {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A reference assembly with its annotation on shared storage
#[derive(Clone, Debug)]
pub struct Genome {
    pub species: Species,
    pub version: String,
    pub release: String,
    pub location: PathBuf,
    pub fasta_file: PathBuf,
    pub gtf_file: PathBuf,
    /// Completes once both files are in place
    pub files: JobHandle,
}

impl Genome {
    /// Submit the download of the FASTA and GTF files, skipped remotely for files already present
    pub fn download<Q: JobQueue>(
        pipeline: &Pipeline<Q>,
        species: Species,
        version: &str,
        release: &str,
        location: impl Into<PathBuf>,
    ) -> Result<Genome, QueueError> {
        let location = location.into();
        let fasta_file = location.join(format!("{species}.{version}.dna.primary_assembly.fa"));
        let gtf_file = location.join(format!("{species}.{version}.{release}.chr.gtf"));

        let command = download_command(species, version, release, &location, &fasta_file, &gtf_file);
        let files = pipeline.execute(JobSpec::new("DOWNLOAD_GENOME_FILES", command))?;

        Ok(Genome {
            species,
            version: version.to_string(),
            release: release.to_string(),
            location,
            fasta_file,
            gtf_file,
            files,
        })
    }

    /// `<species>.<version>.<release>`, the prefix of every file derived from this genome
    pub fn identity(&self) -> String {
        format!("{}.{}.{}", self.species, self.version, self.release)
    }

    pub fn fasta_index_file(&self) -> PathBuf {
        let mut name = self.fasta_file.clone().into_os_string();
        name.push(".fai");
        PathBuf::from(name)
    }
}

fn download_command(species: Species, version: &str, release: &str, location: &Path, fasta: &Path, gtf: &Path) -> String {
    let location = location.display();
    let fasta = fasta.display();
    let gtf = gtf.display();
    let directory = species.as_str().to_lowercase();
    let gtf_name = format!("{species}.{version}.{release}.chr.gtf");

    // the fly assembly has no primary_assembly file, it is stitched together from chromosomes
    let fasta_command = match species {
        Species::DrosophilaMelanogaster => format!(
            r#"
            for chromosome in 2L 2R 3L 3R 4 X Y mitochondrion_genome;
            do
                wget -O {species}.{version}.dna.primary_assembly.${{chromosome}}.fa.gz {ENSEMBL}/release-{release}/fasta/{directory}/dna/{species}.{version}.dna.primary_assembly.${{chromosome}}.fa.gz
            done

            mkdir -p {location}
            zcat {species}.{version}.dna.primary_assembly.*.fa.gz > {fasta};"#
        ),
        _ => format!(
            r#"
            wget -P {location} {ENSEMBL}/release-{release}/fasta/{directory}/dna/{species}.{version}.dna.primary_assembly.fa.gz
            gunzip {fasta}.gz;"#
        ),
    };

    format!(
        r#"
        if [ ! -f '{fasta}' ]; then{fasta_command}
        fi

        if [ ! -f '{gtf}' ]; then
            wget -P {location} {ENSEMBL}/release-{release}/gtf/{directory}/{gtf_name}.gz
            gunzip {gtf}.gz;
        fi
        "#
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queue::memory::MemoryQueue;

    #[test]
    fn files_follow_ensembl_naming() {
        let dir = tempfile::tempdir().unwrap();
        let pipeline = Pipeline::new(MemoryQueue::new(), dir.path().join("logs")).unwrap();
        let genome = Genome::download(&pipeline, Species::MusMusculus, "GRCm39", "108", "/genomes/mouse").unwrap();

        assert_eq!(genome.fasta_file, PathBuf::from("/genomes/mouse/Mus_musculus.GRCm39.dna.primary_assembly.fa"));
        assert_eq!(genome.gtf_file, PathBuf::from("/genomes/mouse/Mus_musculus.GRCm39.108.chr.gtf"));
        assert_eq!(genome.fasta_index_file(), PathBuf::from("/genomes/mouse/Mus_musculus.GRCm39.dna.primary_assembly.fa.fai"));
        assert_eq!(genome.identity(), "Mus_musculus.GRCm39.108");

        let job = pipeline.queue().get(&genome.files).unwrap().spec;
        assert!(job.command.contains("release-108/fasta/mus_musculus/dna/Mus_musculus.GRCm39.dna.primary_assembly.fa.gz"));
        assert!(job.command.contains("if [ ! -f '/genomes/mouse/Mus_musculus.GRCm39.108.chr.gtf' ]"));
    }

    #[test]
    fn fly_assembly_is_stitched_from_chromosomes() {
        let dir = tempfile::tempdir().unwrap();
        let pipeline = Pipeline::new(MemoryQueue::new(), dir.path().join("logs")).unwrap();
        let genome = Genome::download(&pipeline, Species::DrosophilaMelanogaster, "BDGP6.32", "108", "/genomes/fly").unwrap();

        let job = pipeline.queue().get(&genome.files).unwrap().spec;
        assert!(job.command.contains("${chromosome}"));
        assert!(job.command.contains("zcat Drosophila_melanogaster.BDGP6.32.dna.primary_assembly.*.fa.gz"));
        assert_eq!(Species::DrosophilaMelanogaster.mitochondrial_chromosome(), "mitochondrion_genome");
    }

    #[test]
    fn species_use_ensembl_spelling() {
        let species: Species = serde_json::from_str("\"Danio_rerio\"").unwrap();
        assert_eq!(species, Species::DanioRerio);
        assert_eq!(species.to_string(), "Danio_rerio");
    }
}
