use std::fs::{self, File};
use std::io::{self, ErrorKind, Write};
use std::os::unix::fs::symlink;
use std::path::{Path, PathBuf};

use log::{info, warn};

use crate::bioinformatics::data::Sample;
use crate::bioinformatics::genome::{Genome, Species};
use crate::bioinformatics::software::{Program, Sam2Cov, Samtools, SoftwareError, Tool};
use crate::pipeline::Pipeline;
use crate::queue::{JobHandle, JobQueue, JobSpec};

const SAMPLES_LIST: &str = "sample_directories.txt";
const UNALIGNED_FILES_LIST: &str = "unaligned_files.loc";
const CONFIGURATION_FILE: &str = "PORT.cfg";
/// Name PORT expects for each sample's alignment
const ALIGNED_FILE: &str = "Aligned.out.sam";

/// Pipeline Of RNA-seq Transformations, read count normalization
pub struct Port;

/// Where and how to normalize
#[derive(Clone, Debug, Default)]
pub struct Normalization {
    /// Working directory, holds the sample links, lists and configuration
    pub location: PathBuf,
    /// PORT configuration with `{KEY = VALUE}` placeholders
    pub configuration: String,
    pub second_part: bool,
    pub resume: bool,
    pub cutoff: Option<u32>,
}

impl Tool for Port {
    const NAME: &'static str = "PORT";

    fn install_steps(version: &str, location: &Path) -> String {
        let location = location.display();
        format!(
            r#"
            wget https://github.com/itmat/Normalization/archive/v{version}.tar.gz
            tar -xzf v{version}.tar.gz --strip-components 1 --directory {location}
            "#
        )
    }

    fn executable(location: &Path) -> PathBuf {
        location.join("norm_scripts").join("run_normalization")
    }
}

/// Ribosomal RNA sequences shipped with PORT
fn ribosomal_rna_fasta_file(species: Species) -> &'static str {
    match species {
        Species::HomoSapiens | Species::MusMusculus => "rRNA_mm9.fa",
        Species::DrosophilaMelanogaster => "rRNA_dm.fa",
        Species::DanioRerio => "rRNA_danRer.fa",
        Species::CaenorhabditisElegans => "rRNA_c.elegans.fa",
    }
}

impl Program<Port> {
    /// Gene information file PORT derives from the genome annotation
    pub fn gene_info_file(&self, genome: &Genome) -> PathBuf {
        genome.location.join(format!("{}.annotation.txt", genome.identity()))
    }

    pub fn create_gene_info<Q: JobQueue>(&self, pipeline: &Pipeline<Q>, genome: &Genome) -> Result<JobHandle, SoftwareError> {
        let gene_info = self.gene_info_file(genome);
        let command = format!(
            r#"
            if [ -f {gene_info} ]; then exit 0; fi
            perl {port}/norm_scripts/convert_gtf_to_PORT_geneinfo.transcripts.pl {gtf} {gene_info}
            "#,
            gene_info = gene_info.display(),
            port = self.location().display(),
            gtf = genome.gtf_file.display(),
        );
        let job = JobSpec::new("CREATE_GENOME_INFO_FILE", command)
            .depends_on([self.installation().clone(), genome.files.clone()]);

        Ok(pipeline.execute_unless_exists(&gene_info, job)?)
    }

    /// Normalize the read counts of every aligned sample
    ///
    /// Sample directories, read lists and the configuration are written locally to the working
    /// directory before the job is submitted. The job waits on all alignments through a join.
    pub fn normalize<Q: JobQueue>(
        &self,
        pipeline: &Pipeline<Q>,
        samples: &[Sample],
        genome: &Genome,
        samtools: &Program<Samtools>,
        sam2cov: &Program<Sam2Cov>,
        normalization: &Normalization,
    ) -> Result<JobHandle, SoftwareError> {
        let location = &normalization.location;
        info!("Preparing normalization of {} samples in {}", samples.len(), location.display());
        fs::create_dir_all(location)?;

        self.write_sample_directories(samples, location)?;

        let fasta_index = samtools.index_fasta(pipeline, genome)?;
        let gene_info = self.create_gene_info(pipeline, genome)?;

        let configuration = self.render_configuration(&normalization.configuration, genome, samtools, sam2cov);
        fs::write(location.join(CONFIGURATION_FILE), configuration)?;

        let mut command = format!(
            "{port} --sample_dirs {location}/{SAMPLES_LIST} --loc {location}/reads --unaligned {location}/{UNALIGNED_FILES_LIST} --alignedfilename {ALIGNED_FILE} --cfg {location}/{CONFIGURATION_FILE}",
            port = self.executable().display(),
            location = location.display(),
        );
        if normalization.resume {
            command.push_str(" -resume");
        }
        if let Some(cutoff) = normalization.cutoff {
            command.push_str(&format!(" -cutoff_highexp {cutoff}"));
        }
        if normalization.second_part {
            command.push_str(" -part2");
        }

        let alignments = samples
            .iter()
            .map(|sample| match &sample.alignment {
                Some(alignment) => Ok(alignment.handle.clone()),
                None => Err(SoftwareError::Unaligned(sample.id.clone())),
            })
            .collect::<Result<Vec<JobHandle>, SoftwareError>>()?;

        let job = JobSpec::new("NORMALIZE", command)
            .depends_on([
                self.installation().clone(),
                samtools.installation().clone(),
                sam2cov.installation().clone(),
                genome.files.clone(),
                fasta_index,
                gene_info,
            ])
            .depends_on(pipeline.every(alignments)?);

        Ok(pipeline.execute(job)?)
    }

    /// One directory per sample linking its alignment and reads, plus the lists PORT reads
    fn write_sample_directories(&self, samples: &[Sample], location: &Path) -> Result<(), SoftwareError> {
        let mut samples_list = File::create(location.join(SAMPLES_LIST))?;
        let mut unaligned_list = File::create(location.join(UNALIGNED_FILES_LIST))?;

        for sample in samples {
            writeln!(samples_list, "{}", sample.id)?;

            let link_directory = location.join("reads").join(&sample.id);
            fs::create_dir_all(&link_directory)?;

            let alignment = sample
                .alignment
                .as_ref()
                .ok_or_else(|| SoftwareError::Unaligned(sample.id.clone()))?;
            link(&alignment.path, &link_directory.join(ALIGNED_FILE))?;

            for read in &sample.reads {
                let Some(name) = read.location.file_name() else {
                    warn!("Read {} has no file name, skipping", read.location.display());
                    continue;
                };
                let read_link = link_directory.join(name);
                writeln!(unaligned_list, "{}", read_link.display())?;
                link(&read.location, &read_link)?;
            }
        }
        Ok(())
    }

    fn render_configuration(&self, template: &str, genome: &Genome, samtools: &Program<Samtools>, sam2cov: &Program<Sam2Cov>) -> String {
        let values = [
            ("GENOME_FA", genome.fasta_file.display().to_string()),
            ("GENOME_FAI", genome.fasta_index_file().display().to_string()),
            ("GENE_INFO_FILE", self.gene_info_file(genome).display().to_string()),
            (
                "rRNA_FA",
                self.location()
                    .join("norm_scripts")
                    .join(ribosomal_rna_fasta_file(genome.species))
                    .display()
                    .to_string(),
            ),
            ("SAMTOOLS", samtools.executable().display().to_string()),
            ("SAM2COV_LOC", sam2cov.executable().display().to_string()),
            ("CHRM", genome.species.mitochondrial_chromosome().to_string()),
        ];

        values.iter().fold(template.to_string(), |configuration, (key, value)| {
            configuration.replace(&format!("{{{key} = VALUE}}"), &format!("{key} = {value}"))
        })
    }
}

/// Existing links are left alone
fn link(original: &Path, link: &Path) -> io::Result<()> {
    match symlink(original, link) {
        Err(err) if err.kind() == ErrorKind::AlreadyExists => Ok(()),
        result => result,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bioinformatics::data::{Alignment, Read};
    use crate::queue::memory::MemoryQueue;

    fn aligned_samples(dir: &Path, count: usize) -> Vec<Sample> {
        (0..count)
            .map(|i| {
                let id = format!("Sample{i}");
                let read = Read {
                    source: format!("job://read-{i}").parse().unwrap(),
                    location: dir.join(format!("fastq/{id}_1.fastq.gz")),
                    download: JobHandle::new(format!("read-{i}")),
                };
                let mut sample = Sample::new(id.clone(), vec![read]);
                sample.alignment = Some(Alignment {
                    path: dir.join(format!("alignments/{id}.sam")),
                    handle: JobHandle::new(format!("align-{i}")),
                });
                sample
            })
            .collect()
    }

    struct Fixture {
        dir: tempfile::TempDir,
        pipeline: Pipeline<MemoryQueue>,
    }

    fn fixture() -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let pipeline = Pipeline::new(MemoryQueue::new(), dir.path().join("logs")).unwrap();
        Fixture { dir, pipeline }
    }

    #[test]
    fn normalization_waits_on_every_alignment() {
        let Fixture { dir, pipeline } = fixture();
        let root = dir.path();
        let genome = Genome::download(&pipeline, Species::MusMusculus, "GRCm39", "108", root.join("genome")).unwrap();
        let port: Program<Port> = Program::install(&pipeline, "0.8.5e-beta", root.join("software/port")).unwrap();
        let samtools: Program<Samtools> = Program::install(&pipeline, "1.16.1", root.join("software/samtools")).unwrap();
        let sam2cov: Program<Sam2Cov> = Program::install(&pipeline, "0.0.5.2-beta", root.join("software/sam2cov")).unwrap();
        let samples = aligned_samples(root, 45);

        let normalization = Normalization {
            location: root.join("port"),
            configuration: "{GENOME_FA = VALUE}\n{CHRM = VALUE}\n{SAMTOOLS = VALUE}\n".to_string(),
            cutoff: Some(100),
            ..Default::default()
        };
        let handle = port.normalize(&pipeline, &samples, &genome, &samtools, &sam2cov, &normalization).unwrap();

        let job = pipeline.queue().get(&handle).unwrap().spec;
        assert_eq!(job.name, "NORMALIZE");
        assert_eq!(job.dependencies.len(), 7);
        assert!(job.command.ends_with(" -cutoff_highexp 100"));

        let alignments: std::collections::BTreeSet<JobHandle> =
            samples.iter().map(|s| s.alignment.as_ref().unwrap().handle.clone()).collect();
        assert_eq!(pipeline.graph().resolve_joins(&job.dependencies[6..]), alignments);

        let configuration = fs::read_to_string(root.join("port/PORT.cfg")).unwrap();
        assert!(configuration.contains(&format!("GENOME_FA = {}", genome.fasta_file.display())));
        assert!(configuration.contains("CHRM = MT"));
        assert!(configuration.contains(&format!("SAMTOOLS = {}", root.join("software/samtools/bin/samtools").display())));

        let listed = fs::read_to_string(root.join("port/sample_directories.txt")).unwrap();
        assert_eq!(listed.lines().count(), 45);
        let link = root.join("port/reads/Sample3/Aligned.out.sam");
        assert_eq!(fs::read_link(link).unwrap(), root.join("alignments/Sample3.sam"));
        let unaligned = fs::read_to_string(root.join("port/unaligned_files.loc")).unwrap();
        assert!(unaligned.contains(&root.join("port/reads/Sample0/Sample0_1.fastq.gz").display().to_string()));
    }

    #[test]
    fn unaligned_samples_are_refused() {
        let Fixture { dir, pipeline } = fixture();
        let root = dir.path();
        let genome = Genome::download(&pipeline, Species::DanioRerio, "GRCz11", "108", root.join("genome")).unwrap();
        let port: Program<Port> = Program::install(&pipeline, "0.8.5e-beta", root.join("port-software")).unwrap();
        let samtools: Program<Samtools> = Program::install(&pipeline, "1.16.1", root.join("samtools")).unwrap();
        let sam2cov: Program<Sam2Cov> = Program::install(&pipeline, "0.0.5.2-beta", root.join("sam2cov")).unwrap();
        let mut samples = aligned_samples(root, 2);
        samples[1].alignment = None;

        let normalization = Normalization { location: root.join("port"), ..Default::default() };
        let result = port.normalize(&pipeline, &samples, &genome, &samtools, &sam2cov, &normalization);

        assert!(matches!(result, Err(SoftwareError::Unaligned(id)) if id == "Sample1"));
        assert!(pipeline.queue().named("NORMALIZE").is_empty());
    }

    #[test]
    fn existing_gene_info_is_not_rebuilt() {
        let Fixture { dir, pipeline } = fixture();
        let root = dir.path();
        let genome = Genome::download(&pipeline, Species::MusMusculus, "GRCm39", "108", root.join("genome")).unwrap();
        let port: Program<Port> = Program::install(&pipeline, "0.8.5e-beta", root.join("port")).unwrap();
        fs::create_dir_all(root.join("genome")).unwrap();
        fs::write(port.gene_info_file(&genome), "").unwrap();

        let handle = port.create_gene_info(&pipeline, &genome).unwrap();

        assert_eq!(pipeline.queue().get(&handle).unwrap().spec.name, "WAIT");
        assert!(pipeline.queue().named("CREATE_GENOME_INFO_FILE").is_empty());
    }
}
