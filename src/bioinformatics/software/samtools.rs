use std::path::{Path, PathBuf};

use crate::bioinformatics::genome::Genome;
use crate::bioinformatics::software::{Program, SoftwareError, Tool};
use crate::pipeline::Pipeline;
use crate::queue::{JobHandle, JobQueue, JobSpec};

pub struct Samtools;

impl Tool for Samtools {
    const NAME: &'static str = "SAMTOOLS";

    fn install_steps(version: &str, location: &Path) -> String {
        let location = location.display();
        format!(
            r#"
            wget https://github.com/samtools/samtools/releases/download/{version}/samtools-{version}.tar.bz2
            tar -xf samtools-{version}.tar.bz2

            cd samtools-{version}
            autoreconf
            ./configure --prefix={location}
            make
            make install
            "#
        )
    }

    fn executable(location: &Path) -> PathBuf {
        location.join("bin").join("samtools")
    }
}

impl Program<Samtools> {
    /// Index the genome FASTA file next to it
    ///
    /// The genome files may still be downloading when this is submitted, so the command
    /// repeats the existence check on the worker.
    pub fn index_fasta<Q: JobQueue>(&self, pipeline: &Pipeline<Q>, genome: &Genome) -> Result<JobHandle, SoftwareError> {
        let index = genome.fasta_index_file();
        let command = format!(
            r#"
            if [ -f {index} ]; then exit 0; fi
            {samtools} faidx -o {index} {fasta};
            "#,
            index = index.display(),
            samtools = self.executable().display(),
            fasta = genome.fasta_file.display(),
        );
        let job = JobSpec::new("CREATE_GENOME_FASTA_FILE_INDEX", command)
            .resources(1, 10000)
            .depends_on([self.installation().clone(), genome.files.clone()]);

        Ok(pipeline.execute_unless_exists(&index, job)?)
    }
}
