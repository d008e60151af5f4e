//! Report rendering for a finished selection.
//!
//! Three artefacts: the kept-id list, the per-contig ledger table, and the
//! threshold report. All are plain TSV/text written through a `BufWriter`.

use crate::error::Result;
use crate::orchestrator::Selection;
use crate::threshold::EstimatorStatus;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

/// Writes the kept contig ids, one per line, in FASTA-index order.
pub fn write_kept_list<P: AsRef<Path>>(selection: &Selection, path: P) -> Result<()> {
    let file = File::create(path)?;
    let mut writer = BufWriter::new(file);
    for id in &selection.kept {
        writeln!(writer, "{id}")?;
    }
    writer.flush()?;
    Ok(())
}

/// Writes the full decision ledger as TSV, one row per contig.
///
/// Opponents are comma-separated; absent values are rendered as `.` the
/// way alignment tooling does.
pub fn write_ledger_tsv<P: AsRef<Path>>(selection: &Selection, path: P) -> Result<()> {
    let file = File::create(path)?;
    let mut writer = BufWriter::new(file);

    writeln!(
        writer,
        "contig\tlength\tgc\tprimary_target\tlocus_start\tlocus_end\tnorm_score\tverdict\treason\tdisqualified_by\titeration\topponents\tbusco_genes"
    )?;

    for record in selection.ledger.iter() {
        let contig = record.contig;
        let name = selection.contigs.name(contig);
        let summary = &selection.summaries[contig.index()];
        let gc = summary
            .gc_fraction
            .map(|v| format!("{v:.4}"))
            .unwrap_or_else(|| ".".to_string());
        let (target, locus_start, locus_end) = match summary.primary_target {
            Some(t) => (
                selection.targets.name(t).to_string(),
                summary.locus_start.to_string(),
                summary.locus_end.to_string(),
            ),
            None => (".".to_string(), ".".to_string(), ".".to_string()),
        };
        let score = summary
            .normalized_score
            .map(|v| format!("{v:.4}"))
            .unwrap_or_else(|| ".".to_string());
        let disqualifier = record
            .disqualified_by
            .map(|d| selection.contigs.name(d).to_string())
            .unwrap_or_else(|| ".".to_string());
        let opponents = if record.opponents.is_empty() {
            ".".to_string()
        } else {
            record
                .opponents
                .iter()
                .map(|&o| selection.contigs.name(o))
                .collect::<Vec<_>>()
                .join(",")
        };
        let busco = selection
            .busco
            .get(name)
            .map(|genes| genes.len().to_string())
            .unwrap_or_else(|| ".".to_string());

        writeln!(
            writer,
            "{name}\t{length}\t{gc}\t{target}\t{locus_start}\t{locus_end}\t{score}\t{verdict}\t{reason}\t{disqualifier}\t{iteration}\t{opponents}\t{busco}",
            length = summary.length,
            verdict = record.verdict.as_tag(),
            reason = record.reason.as_tag(),
            iteration = record.iteration,
        )?;
    }

    writer.flush()?;
    Ok(())
}

/// Writes the threshold decision: τ, sample size, and estimator status.
pub fn write_threshold_report<P: AsRef<Path>>(selection: &Selection, path: P) -> Result<()> {
    let file = File::create(path)?;
    let mut writer = BufWriter::new(file);
    let report = &selection.threshold;

    writeln!(writer, "distance_threshold\t{:.6}", report.tau)?;
    writeln!(writer, "sample_size\t{}", report.sample_size)?;
    writeln!(
        writer,
        "user_supplied\t{}",
        if report.user_supplied() { "yes" } else { "no" }
    )?;
    match &report.status {
        EstimatorStatus::UserSupplied => writeln!(writer, "estimator\tbypassed")?,
        EstimatorStatus::Estimated { valleys } => {
            writeln!(writer, "estimator\tkde-valley")?;
            let rendered: Vec<String> = valleys.iter().map(|v| format!("{v:.6}")).collect();
            writeln!(writer, "valleys\t{}", rendered.join(","))?;
        }
        EstimatorStatus::MedianFallback => writeln!(writer, "estimator\tmedian-fallback")?,
        EstimatorStatus::DegenerateSingleValue => {
            writeln!(writer, "estimator\tdegenerate-single-value")?
        }
    }

    writer.flush()?;
    Ok(())
}
