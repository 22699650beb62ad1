use std::fs;
use std::path::Path;

use cooper::config::Workspace;
use cooper::graph::NodeKind;
use cooper::pipeline::Pipeline;
use cooper::queue::memory::MemoryQueue;
use cooper::queue::MAX_DEPENDENCIES;
use cooper::study::manifest::Manifest;
use cooper::study::rnaseq;

fn manifest(dir: &Path, samples: usize) -> Manifest {
    let samples: Vec<String> = (1..=samples)
        .map(|i| {
            format!(
                r#"{{"id": "Sample{i}", "reads": [
                    {{"source": "s3://reads/fastq/S{i}_1.fastq.gz", "file": "Sample{i}_1.fastq.gz"}},
                    {{"source": "s3://reads/fastq/S{i}_2.fastq.gz", "file": "Sample{i}_2.fastq.gz"}}
                ]}}"#
            )
        })
        .collect();
    let json = format!(
        r#"{{
            "genome": {{"species": "Mus_musculus", "version": "GRCm39", "release": "108"}},
            "software": {{"fastqc": "0.11.9", "star": "2.7.10b", "samtools": "1.16.1", "sam2cov": "0.0.5.2-beta", "port": "0.8.5e-beta"}},
            "samples": [{}],
            "normalization": {{"configuration": "port.cfg", "resume": true}}
        }}"#,
        samples.join(",")
    );

    fs::write(dir.join("port.cfg"), "{GENOME_FA = VALUE}\n{GENE_INFO_FILE = VALUE}\n").unwrap();
    fs::write(dir.join("study.json"), json).unwrap();
    Manifest::read(&dir.join("study.json")).unwrap()
}

fn workspace(dir: &Path) -> Workspace {
    Workspace {
        mount_point: dir.join("efs"),
        study: "mouse".to_string(),
        analysis: "knockout".to_string(),
    }
}

#[test]
fn study_builds_a_bounded_graph() {
    let dir = tempfile::tempdir().unwrap();
    let manifest = manifest(dir.path(), 24);
    let workspace = workspace(dir.path());
    let pipeline = Pipeline::new(MemoryQueue::new(), workspace.logs_directory()).unwrap();

    let analysis = rnaseq::build(&pipeline, &manifest, &workspace).unwrap();

    let queue = pipeline.queue();
    for tool in ["FASTQC", "STAR", "SAMTOOLS", "SAM2COV", "PORT"] {
        assert_eq!(queue.named(&format!("INSTALL_{tool}")).len(), 1, "{tool}");
    }
    assert_eq!(queue.named("FILE_TRANSFER").len(), 48);
    assert_eq!(analysis.quality_reports.len(), 48);
    assert_eq!(queue.named("CREATE_INDEX").len(), 1);
    assert_eq!(queue.named("ALIGN-Sample7").len(), 1);
    assert!(queue.jobs().iter().all(|job| job.spec.dependencies.len() <= MAX_DEPENDENCIES));

    let normalization = queue.get(&analysis.normalization).unwrap().spec;
    assert!(normalization.command.contains(" -resume"));
    assert_eq!(pipeline.graph().count(NodeKind::Join), 3);
    assert!(workspace.analysis_directory().join("port/PORT.cfg").exists());
}

#[test]
fn finished_work_is_not_submitted_again() {
    let dir = tempfile::tempdir().unwrap();
    let manifest = manifest(dir.path(), 3);
    let workspace = workspace(dir.path());

    let alignments = workspace.analysis_directory().join("alignments");
    fs::create_dir_all(&alignments).unwrap();
    for i in 1..=3 {
        fs::write(alignments.join(format!("Sample{i}.sam")), "").unwrap();
    }
    let quality = workspace.analysis_directory().join("quality");
    fs::create_dir_all(&quality).unwrap();
    fs::write(quality.join("Sample1_1_fastqc.zip"), "").unwrap();

    let pipeline = Pipeline::new(MemoryQueue::new(), workspace.logs_directory()).unwrap();
    rnaseq::build(&pipeline, &manifest, &workspace).unwrap();

    let queue = pipeline.queue();
    assert!(queue.jobs().iter().all(|job| !job.spec.name.starts_with("ALIGN")));
    assert!(queue.named("QUALITY_ANALYSIS-Sample1_1").is_empty());
    assert_eq!(queue.named("QUALITY_ANALYSIS-Sample1_2").len(), 1);
    // installs are always submitted, their skip happens on the worker
    assert_eq!(queue.named("INSTALL_STAR").len(), 1);
    assert_eq!(pipeline.graph().count(NodeKind::Wait), 4);
}
