use std::path::{Path, PathBuf};

use crate::bioinformatics::data::Read;
use crate::bioinformatics::software::{job_name, Program, SoftwareError, Tool};
use crate::pipeline::Pipeline;
use crate::queue::{JobHandle, JobQueue, JobSpec};

/// Read quality reports
pub struct FastQc;

impl Tool for FastQc {
    const NAME: &'static str = "FASTQC";

    fn install_steps(version: &str, location: &Path) -> String {
        let location = location.display();
        format!(
            r#"
            wget https://www.bioinformatics.babraham.ac.uk/projects/fastqc/fastqc_v{version}.zip
            unzip fastqc_v{version}.zip -d {location}
            mv {location}/FastQC/* {location}; rmdir {location}/FastQC
            chmod a+x {location}/fastqc
            "#
        )
    }

    fn executable(location: &Path) -> PathBuf {
        location.join("fastqc")
    }
}

impl Program<FastQc> {
    /// Quality report of one read, written as `<stem>_fastqc.zip` in `output_directory`
    pub fn analyze<Q: JobQueue>(&self, pipeline: &Pipeline<Q>, read: &Read, output_directory: &Path) -> Result<JobHandle, SoftwareError> {
        let report = output_directory.join(format!("{}_fastqc.zip", read.stem()));
        let command = format!(
            "mkdir -p {output}; {fastqc} -o {output} {read}",
            output = output_directory.display(),
            fastqc = self.executable().display(),
            read = read.location.display(),
        );
        let job = JobSpec::new(job_name("QUALITY_ANALYSIS", read.stem()), command)
            .depends_on([self.installation().clone(), read.download.clone()]);

        Ok(pipeline.execute_unless_exists(&report, job)?)
    }
}
