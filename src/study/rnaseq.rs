use std::fs;

use anyhow::{Context, Result};
use log::info;

use crate::bioinformatics::data::{Read, Sample};
use crate::bioinformatics::genome::Genome;
use crate::bioinformatics::software::{FastQc, Normalization, Port, Program, Sam2Cov, Samtools, Star};
use crate::config::Workspace;
use crate::pipeline::Pipeline;
use crate::queue::{JobHandle, JobQueue};
use crate::study::manifest::Manifest;

/// Handles of the finished definition
pub struct Analysis {
    pub samples: Vec<Sample>,
    pub quality_reports: Vec<JobHandle>,
    pub normalization: JobHandle,
}

/// Define the RNA-seq analysis of every sample in `manifest`
///
/// Reads are fetched into `<analysis>/fastq`, checked with FastQC, aligned with STAR into
/// `<analysis>/alignments` and normalized together with PORT in `<analysis>/port`.
pub fn build<Q: JobQueue>(pipeline: &Pipeline<Q>, manifest: &Manifest, workspace: &Workspace) -> Result<Analysis> {
    let analysis_directory = workspace.analysis_directory();
    let software = workspace.software_directory();
    info!("Defining analysis {} of study {}", workspace.analysis, workspace.study);

    let mut samples = Vec::with_capacity(manifest.samples.len());
    for request in &manifest.samples {
        let reads = request
            .reads
            .iter()
            .map(|read| Read::fetch(pipeline, &read.source, analysis_directory.join("fastq").join(&read.file)))
            .collect::<Result<Vec<Read>, _>>()
            .with_context(|| format!("Fetching reads of sample {}", request.id))?;
        samples.push(Sample::new(request.id.clone(), reads));
    }

    let request = &manifest.genome;
    let genome = Genome::download(
        pipeline,
        request.species,
        &request.version,
        &request.release,
        workspace
            .genomes_directory()
            .join(request.species.as_str())
            .join(&request.version),
    )?;

    let versions = &manifest.software;
    let fastqc: Program<FastQc> = Program::install(pipeline, &versions.fastqc, software.join("fastqc").join(&versions.fastqc))?;
    let star: Program<Star> = Program::install(pipeline, &versions.star, software.join("star").join(&versions.star))?;
    let samtools: Program<Samtools> = Program::install(pipeline, &versions.samtools, software.join("samtools").join(&versions.samtools))?;
    let sam2cov: Program<Sam2Cov> = Program::install(pipeline, &versions.sam2cov, software.join("sam2cov").join(&versions.sam2cov))?;
    let port: Program<Port> = Program::install(pipeline, &versions.port, software.join("port").join(&versions.port))?;

    let quality_reports = samples
        .iter()
        .flat_map(|sample| sample.reads.iter())
        .map(|read| fastqc.analyze(pipeline, read, &analysis_directory.join("quality")))
        .collect::<Result<Vec<JobHandle>, _>>()?;

    let index = star.create_index(pipeline, &genome)?;
    for sample in samples.iter_mut() {
        let output = analysis_directory.join("alignments").join(format!("{}.sam", sample.id));
        star.align(pipeline, &index, sample, &output)?;
    }

    let configuration_path = manifest.configuration_path();
    let configuration = fs::read_to_string(&configuration_path)
        .with_context(|| format!("Can't read PORT configuration {}", configuration_path.display()))?;
    let normalization = Normalization {
        location: analysis_directory.join("port"),
        configuration,
        second_part: manifest.normalization.second_part,
        resume: manifest.normalization.resume,
        cutoff: manifest.normalization.cutoff,
    };
    let normalization = port.normalize(pipeline, &samples, &genome, &samtools, &sam2cov, &normalization)?;

    info!("Defined {} jobs", pipeline.graph().len());
    Ok(Analysis { samples, quality_reports, normalization })
}
