use std::io::{IsTerminal, Write};
use std::time::{SystemTime, UNIX_EPOCH};

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use libdaq_device::{AcquisitionStats, SampleBatch};
use serde::Serialize;

#[derive(Clone, Debug, Copy, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Pretty,
    Raw,
}

impl OutputFormat {
    pub fn default_for_stdout() -> Self {
        if std::io::stdout().is_terminal() {
            Self::Pretty
        } else {
            Self::Json
        }
    }
}

#[derive(Serialize)]
struct BatchOutput<'a> {
    session: u64,
    channel: u8,
    sequence: u8,
    samples: usize,
    mean_volts: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    volts: Option<&'a [f64]>,
    timestamp: String,
}

/// Print one batch. With `average` only the batch mean is emitted.
pub fn print_batch(batch: &SampleBatch, format: OutputFormat, average: bool) {
    match format {
        OutputFormat::Json => {
            let out = BatchOutput {
                session: batch.session,
                channel: batch.channel,
                sequence: batch.sequence,
                samples: batch.len(),
                mean_volts: round_volts(batch.mean()),
                volts: (!average).then_some(batch.volts.as_slice()),
                timestamp: now_unix_millis(),
            };
            println!(
                "{}",
                serde_json::to_string(&out).unwrap_or_else(|_| "{}".to_string())
            );
        }
        OutputFormat::Table => {
            let (min, max) = extent(&batch.volts);
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["CHANNEL", "SEQ", "SAMPLES", "MEAN (V)", "MIN (V)", "MAX (V)"])
                .add_row(vec![
                    format!("AIN{}", batch.channel),
                    batch.sequence.to_string(),
                    batch.len().to_string(),
                    format!("{:+.4}", batch.mean()),
                    format!("{min:+.4}"),
                    format!("{max:+.4}"),
                ]);
            println!("{table}");
        }
        OutputFormat::Pretty => {
            println!(
                "AIN{} seq={:<3} n={} mean={:+.4}V",
                batch.channel,
                batch.sequence,
                batch.len(),
                batch.mean()
            );
        }
        OutputFormat::Raw => {
            let mut out = std::io::stdout().lock();
            if average {
                let _ = writeln!(out, "{}", batch.mean());
            } else {
                for volts in &batch.volts {
                    let _ = writeln!(out, "{volts}");
                }
            }
            let _ = out.flush();
        }
    }
}

/// Session counters, for formats that carry a trailer.
pub fn print_stats(stats: &AcquisitionStats, format: OutputFormat) {
    match format {
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec![
                    "BATCHES",
                    "FRAMES",
                    "TIMEOUTS",
                    "RESYNC BYTES",
                    "CORRUPT",
                    "SEQ GAPS",
                ])
                .add_row(vec![
                    stats.batches.to_string(),
                    stats.frames.to_string(),
                    stats.timeouts.to_string(),
                    stats.resync_bytes.to_string(),
                    stats.corrupt_frames.to_string(),
                    stats.sequence_gaps.to_string(),
                ]);
            println!("{table}");
        }
        OutputFormat::Pretty => {
            println!(
                "{} batches, {} timeouts, {} resync bytes, {} corrupt frames, {} sequence gaps",
                stats.batches,
                stats.timeouts,
                stats.resync_bytes,
                stats.corrupt_frames,
                stats.sequence_gaps
            );
        }
        OutputFormat::Json | OutputFormat::Raw => {}
    }
}

fn extent(values: &[f64]) -> (f64, f64) {
    if values.is_empty() {
        return (0.0, 0.0);
    }
    values
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| {
            (lo.min(v), hi.max(v))
        })
}

fn round_volts(volts: f64) -> f64 {
    (volts * 1e6).round() / 1e6
}

fn now_unix_millis() -> String {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis().to_string())
        .unwrap_or_else(|_| "0".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extent_of_samples() {
        assert_eq!(extent(&[0.5, -1.25, 2.0]), (-1.25, 2.0));
        assert_eq!(extent(&[]), (0.0, 0.0));
    }

    #[test]
    fn averaged_json_omits_sample_values() {
        let batch = SampleBatch {
            session: 1,
            channel: 3,
            sequence: 7,
            counts: vec![0, 16384],
            volts: vec![0.0, 5.0],
        };
        let out = BatchOutput {
            session: batch.session,
            channel: batch.channel,
            sequence: batch.sequence,
            samples: batch.len(),
            mean_volts: round_volts(batch.mean()),
            volts: None,
            timestamp: "0".into(),
        };
        let json = serde_json::to_value(&out).expect("batch should serialize");
        assert_eq!(json["mean_volts"], 2.5);
        assert!(json.get("volts").is_none());
    }
}
