//! File-based round trips: parse real input files, run, render reports.

use anyhow::Result;
use pretty_assertions::assert_eq;
use purga::report::{write_kept_list, write_ledger_tsv, write_threshold_report};
use purga::{Config, Purga, PurgaError};
use std::fs;
use std::path::PathBuf;

struct Workspace {
    _dir: tempfile::TempDir,
    paf: PathBuf,
    dist: PathBuf,
    fai: PathBuf,
}

fn workspace(paf: &str, dist: &str, fai: &str) -> Result<Workspace> {
    let dir = tempfile::TempDir::new()?;
    let paf_path = dir.path().join("aln.paf");
    let dist_path = dir.path().join("pairs.dist");
    let fai_path = dir.path().join("asm.fasta.fai");
    fs::write(&paf_path, paf)?;
    fs::write(&dist_path, dist)?;
    fs::write(&fai_path, fai)?;
    Ok(Workspace {
        _dir: dir,
        paf: paf_path,
        dist: dist_path,
        fai: fai_path,
    })
}

const PAF: &str = "\
ctgA\t1000000\t0\t1000000\t+\tchr1\t5000000\t0\t1000000\t950000\t1000000\t60\tAS:i:1\tcg:Z:1000000M
ctgB\t990000\t0\t990000\t-\tchr1\t5000000\t0\t990000\t910800\t990000\t60\tAS:i:1
ctgC\t300000\t0\t300000\t+\tchr1\t5000000\t20000\t320000\t200000\t300000\t60\tAS:i:1
";

const DIST: &str = "\
ctgA\tctgB\t0.01
ctgA\tctgC\t0.02
ctgB\tctgC\t0.02
ctgU\tctgA\t0.01
";

const FAI: &str = "\
ctgA\t1000000\t6\t80\t81
ctgB\t990000\t1012520\t80\t81
ctgC\t300000\t2015170\t80\t81
ctgU\t50000\t2318930\t80\t81
";

fn purger() -> Purga {
    let _ = env_logger::builder().is_test(true).try_init();
    Purga::new(
        Config::builder()
            .distance_threshold(0.05)
            .num_threads(1)
            .build(),
    )
    .unwrap()
}

#[test]
fn run_files_selects_and_reports() -> Result<()> {
    let ws = workspace(PAF, DIST, FAI)?;
    let selection = purger().run_files(&ws.paf, &ws.dist, &ws.fai)?;

    // A wins its locus, B survives through the safeguard, C is a small
    // similar copy and falls, U duplicates A without aligning.
    assert_eq!(selection.kept, vec!["ctgA".to_string(), "ctgB".to_string()]);
    assert_eq!(selection.summary.discarded, 1);
    assert_eq!(selection.summary.unaligned_discarded, 1);
    assert_eq!(selection.stats.alignments_kept, 3);

    let dir = tempfile::TempDir::new()?;
    let kept_path = dir.path().join("kept.txt");
    let ledger_path = dir.path().join("decisions.tsv");
    let threshold_path = dir.path().join("threshold.txt");
    write_kept_list(&selection, &kept_path)?;
    write_ledger_tsv(&selection, &ledger_path)?;
    write_threshold_report(&selection, &threshold_path)?;

    let kept = fs::read_to_string(&kept_path)?;
    assert_eq!(kept, "ctgA\nctgB\n");

    let ledger = fs::read_to_string(&ledger_path)?;
    let mut lines = ledger.lines();
    let header = lines.next().unwrap();
    assert!(header.starts_with("contig\tlength\tgc\t"));
    assert_eq!(lines.clone().count(), 4);
    let ctg_c = lines.find(|l| l.starts_with("ctgC\t")).unwrap();
    assert!(ctg_c.contains("similarity-loser"));
    assert!(ctg_c.contains("\tctgA\t"));

    let threshold = fs::read_to_string(&threshold_path)?;
    assert!(threshold.contains("distance_threshold\t0.050000"));
    assert!(threshold.contains("user_supplied\tyes"));
    assert!(threshold.contains("estimator\tbypassed"));
    Ok(())
}

#[test]
fn missing_score_rows_over_budget_abort_the_parse() -> Result<()> {
    // One bad row in two is far over the 1% budget: the parse aborts.
    let bad_paf = "\
ctgA\t1000000\t0\t1000000\t+\tchr1\t5000000\t0\t1000000\t950000\t1000000\t60\tAS:i:1
ctgB\t990000\t0\t990000\t+\tchr1\t5000000\t0\t990000\t910800\t990000\t60
";
    let ws = workspace(bad_paf, DIST, FAI)?;
    let result = purger().run_files(&ws.paf, &ws.dist, &ws.fai);
    assert!(matches!(
        result,
        Err(PurgaError::TooManyMalformedRows { kind: "PAF", .. })
    ));
    Ok(())
}

#[test]
fn distance_row_with_unknown_contig_is_fatal() -> Result<()> {
    let bad_dist = "ctgA\tnot_in_assembly\t0.01\n";
    let ws = workspace(PAF, bad_dist, FAI)?;
    let result = purger().run_files(&ws.paf, &ws.dist, &ws.fai);
    match result {
        Err(PurgaError::InputConsistency { kind, examples, .. }) => {
            assert_eq!(kind, "distance");
            assert_eq!(examples, vec!["not_in_assembly".to_string()]);
        }
        other => panic!("expected InputConsistency, got {other:?}"),
    }
    Ok(())
}

#[test]
fn busco_table_flows_into_the_ledger_report() -> Result<()> {
    let ws = workspace(PAF, DIST, FAI)?;
    let contigs = purga::ContigIndex::from_reader(std::io::BufReader::new(fs::File::open(
        &ws.fai,
    )?))?;
    let alignments = purga::paf::read_paf(std::io::BufReader::new(fs::File::open(&ws.paf)?))?;
    let distances = purga::distance::read_distances(
        std::io::BufReader::new(fs::File::open(&ws.dist)?),
        &contigs,
    )?;
    let mut inputs = purga::PurgeInputs::new(contigs);
    inputs.alignments = alignments;
    inputs.distances = distances;
    inputs
        .busco
        .insert("ctgA".to_string(), vec!["busco1".to_string(), "busco2".to_string()]);
    inputs.gc_content.insert("ctgA".to_string(), 0.41);

    let selection = purger().run(inputs)?;
    let dir = tempfile::TempDir::new()?;
    let ledger_path = dir.path().join("decisions.tsv");
    write_ledger_tsv(&selection, &ledger_path)?;
    let ledger = fs::read_to_string(&ledger_path)?;
    let ctg_a = ledger.lines().find(|l| l.starts_with("ctgA\t")).unwrap();
    let fields: Vec<&str> = ctg_a.split('\t').collect();
    assert_eq!(fields[2], "0.4100");
    assert_eq!(*fields.last().unwrap(), "2");
    Ok(())
}
