use std::path::{Path, PathBuf};

use crate::bioinformatics::data::{Alignment, Sample};
use crate::bioinformatics::genome::Genome;
use crate::bioinformatics::software::{bounded, job_name, Program, SoftwareError, Tool};
use crate::pipeline::Pipeline;
use crate::queue::{JobHandle, JobQueue, JobSpec};

/// Spliced RNA-seq aligner
pub struct Star;

/// A genome index and the job that builds it
#[derive(Clone, Debug)]
pub struct StarIndex {
    pub location: PathBuf,
    pub creation: JobHandle,
}

impl Tool for Star {
    const NAME: &'static str = "STAR";

    fn install_steps(version: &str, location: &Path) -> String {
        let location = location.display();
        format!(
            r#"
            wget https://github.com/alexdobin/STAR/archive/{version}.tar.gz
            tar -xzf {version}.tar.gz --strip-components 1 --directory {location}
            cd {location}/source
            make -j STAR
            "#
        )
    }

    fn executable(location: &Path) -> PathBuf {
        location.join("source").join("STAR")
    }
}

impl Program<Star> {
    /// Build the index in `<genome location>/<genome identity>.index`
    pub fn create_index<Q: JobQueue>(&self, pipeline: &Pipeline<Q>, genome: &Genome) -> Result<StarIndex, SoftwareError> {
        let location = genome.location.join(format!("{}.index", genome.identity()));
        let command = format!(
            r#"
            mkdir -p {index}

            {star}                                              \
                --runMode genomeGenerate                        \
                --runThreadN 16                                 \
                --limitGenomeGenerateRAM {ram}                  \
                --genomeDir {index}                             \
                --genomeFastaFiles {fasta}                      \
                --sjdbGTFfile {gtf}                             \
                --sjdbOverhang 99
            "#,
            index = location.display(),
            star = self.executable().display(),
            ram = 90u64 * 1024 * 1024 * 1024,
            fasta = genome.fasta_file.display(),
            gtf = genome.gtf_file.display(),
        );
        let job = JobSpec::new("CREATE_INDEX", command)
            .resources(16, 104448)
            .depends_on([self.installation().clone(), genome.files.clone()]);

        let creation = pipeline.execute_unless_exists(&location, job)?;
        Ok(StarIndex { location, creation })
    }

    /// Align every read of `sample` to `output`, a `.sam` or `.bam` file
    pub fn align<Q: JobQueue>(&self, pipeline: &Pipeline<Q>, index: &StarIndex, sample: &mut Sample, output: &Path) -> Result<JobHandle, SoftwareError> {
        let mut options = Vec::new();
        if sample.reads.iter().any(|read| read.is_compressed()) {
            options.push("--readFilesCommand zcat");
        }
        let (sam_type, extension) = match output.extension().and_then(|e| e.to_str()) {
            Some("bam") => ("BAM Unsorted", "bam"),
            _ => ("SAM", "sam"),
        };

        let reads: Vec<String> = sample.reads.iter().map(|read| read.location.display().to_string()).collect();
        let prefix = output.display();
        let command = format!(
            r#"
            mkdir -p {parent}

            {star}                                              \
                --outFileNamePrefix {prefix}                    \
                --genomeDir {index}                             \
                --runMode alignReads                            \
                --runThreadN 6                                  \
                --outSAMunmapped Within KeepPairs               \
                --runRNGseed 42                                 \
                --outSAMtype {sam_type}                         \
                --readFilesIn {reads}                           \
                {options}

            mv {prefix}Aligned.out.{extension} {prefix}
            "#,
            parent = output.parent().unwrap_or(Path::new("/")).display(),
            star = self.executable().display(),
            index = index.location.display(),
            reads = reads.join(" "),
            options = options.join(" "),
        );

        let downloads = sample.reads.iter().map(|read| read.download.clone()).collect();
        let dependencies = bounded(pipeline, vec![self.installation().clone(), index.creation.clone()], downloads)?;
        let job = JobSpec::new(job_name("ALIGN", &sample.id), command)
            .resources(6, 40960)
            .depends_on(dependencies);

        let handle = pipeline.execute_unless_exists(output, job)?;
        sample.alignment = Some(Alignment { path: output.to_path_buf(), handle: handle.clone() });
        Ok(handle)
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;
    use crate::bioinformatics::data::Read;
    use crate::bioinformatics::genome::Species;
    use crate::graph::NodeKind;
    use crate::queue::memory::MemoryQueue;

    fn sample(dir: &Path, id: &str) -> Sample {
        let reads = (1..=2)
            .map(|n| Read {
                source: format!("job://{id}-{n}").parse().unwrap(),
                location: dir.join(format!("fastq/{id}_{n}.fastq.gz")),
                download: JobHandle::new(format!("{id}-{n}")),
            })
            .collect();
        Sample::new(id, reads)
    }

    #[test]
    fn installation_is_submitted_once_and_shared() {
        let dir = tempfile::tempdir().unwrap();
        let pipeline = Pipeline::new(MemoryQueue::new(), dir.path().join("logs")).unwrap();
        let genome = Genome::download(&pipeline, Species::MusMusculus, "GRCm39", "108", dir.path().join("genome")).unwrap();
        let star: Program<Star> = Program::install(&pipeline, "2.7.10b", dir.path().join("software/star")).unwrap();

        let index = star.create_index(&pipeline, &genome).unwrap();
        let mut control = sample(dir.path(), "Control1");
        let alignment = star.align(&pipeline, &index, &mut control, &dir.path().join("alignments/Control1.sam")).unwrap();

        let queue = pipeline.queue();
        assert_eq!(queue.named("INSTALL_STAR").len(), 1);
        let install = queue.named("INSTALL_STAR")[0].spec.clone();
        assert_eq!((install.resources.vcpu, install.resources.memory), (8, 16000));

        let index_job = queue.get(&index.creation).unwrap().spec;
        let align_job = queue.get(&alignment).unwrap().spec;
        assert!(index_job.dependencies.contains(star.installation()));
        assert!(align_job.dependencies.contains(star.installation()));
        assert_eq!(
            align_job.dependencies,
            vec![
                star.installation().clone(),
                index.creation.clone(),
                JobHandle::new("Control1-1"),
                JobHandle::new("Control1-2"),
            ]
        );
        assert!(align_job.command.contains("--readFilesCommand zcat"));
        assert_eq!(control.alignment.unwrap().handle, alignment);
    }

    #[test]
    fn existing_index_and_alignment_are_not_recomputed() {
        let dir = tempfile::tempdir().unwrap();
        let pipeline = Pipeline::new(MemoryQueue::new(), dir.path().join("logs")).unwrap();
        let genome = Genome::download(&pipeline, Species::HomoSapiens, "GRCh38", "108", dir.path().join("genome")).unwrap();
        let star: Program<Star> = Program::install(&pipeline, "2.7.10b", dir.path().join("software/star")).unwrap();

        fs::create_dir_all(dir.path().join("genome/Homo_sapiens.GRCh38.108.index")).unwrap();
        let output = dir.path().join("Control1.bam");
        fs::write(&output, "").unwrap();

        let index = star.create_index(&pipeline, &genome).unwrap();
        let mut control = sample(dir.path(), "Control1");
        let alignment = star.align(&pipeline, &index, &mut control, &output).unwrap();

        let queue = pipeline.queue();
        assert!(queue.named("CREATE_INDEX").is_empty());
        assert!(queue.named("ALIGN-Control1").is_empty());
        assert_eq!(pipeline.graph().get(&index.creation).unwrap().kind, NodeKind::Wait);
        assert_eq!(
            queue.get(&index.creation).unwrap().spec.dependencies,
            vec![star.installation().clone(), genome.files.clone()]
        );
        assert_eq!(queue.get(&alignment).unwrap().spec.dependencies.len(), 4);
        assert_eq!(control.alignment.unwrap().path, output);
    }

    #[test]
    fn bam_output_is_requested_from_star() {
        let dir = tempfile::tempdir().unwrap();
        let pipeline = Pipeline::new(MemoryQueue::new(), dir.path().join("logs")).unwrap();
        let star: Program<Star> = Program::install(&pipeline, "2.7.10b", dir.path().join("star")).unwrap();
        let index = StarIndex { location: dir.path().join("index"), creation: JobHandle::new("index") };
        let mut treatment = sample(dir.path(), "Treatment1");

        let output = dir.path().join("alignments/Treatment1.bam");
        let handle = star.align(&pipeline, &index, &mut treatment, &output).unwrap();

        let command = pipeline.queue().get(&handle).unwrap().spec.command;
        assert!(command.contains("--outSAMtype BAM Unsorted"));
        assert!(command.contains(&format!("mv {0}Aligned.out.bam {0}", output.display())));
    }
}
