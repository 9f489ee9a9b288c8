//! Report generation
//!
//! Renders the output transitions of a replay as a TXT table or as JSON.

use crate::config::OutputFormat;
use anyhow::Result;
use brake_light_core::{NodeStatus, OutputEvent};
use serde::Serialize;
use std::io::Write;

/// Everything a replay produced
#[derive(Debug, Serialize)]
pub struct ReplayReport {
    pub source: String,
    pub frames_seen: usize,
    pub frames_ignored: usize,
    pub transitions: Vec<OutputEvent>,
    pub final_status: NodeStatus,
}

pub fn write_report<W: Write>(
    out: &mut W,
    report: &ReplayReport,
    format: OutputFormat,
    include_summary: bool,
) -> Result<()> {
    match format {
        OutputFormat::Txt => write_txt(out, report, include_summary),
        OutputFormat::Json => write_json(out, report, include_summary),
    }
}

fn write_txt<W: Write>(out: &mut W, report: &ReplayReport, include_summary: bool) -> Result<()> {
    writeln!(out, "Output transitions for {}", report.source)?;
    writeln!(out, "{:-<62}", "")?;
    writeln!(out, "{:<32} {:<12} {:<6}", "Timestamp", "Line", "Level")?;
    writeln!(out, "{:-<62}", "")?;

    for event in &report.transitions {
        writeln!(
            out,
            "{:<32} {:<12} {:<6}",
            event.timestamp.format("%Y-%m-%d %H:%M:%S%.6f").to_string(),
            event.line.to_string(),
            if event.high { "HIGH" } else { "LOW" }
        )?;
    }

    if include_summary {
        let status = &report.final_status;
        writeln!(out)?;
        writeln!(out, "Summary")?;
        writeln!(out, "{:-<62}", "")?;
        writeln!(out, "  Frames:            {}", report.frames_seen)?;
        writeln!(out, "  Ignored frames:    {}", report.frames_ignored)?;
        writeln!(out, "  Transitions:       {}", report.transitions.len())?;
        writeln!(
            out,
            "  Vehicle state:     {} (previous {})",
            status.current_state, status.previous_state
        )?;
        writeln!(out, "  Mechanical brake:  {}", status.mechanical_braking)?;
        writeln!(out, "  Regen brake:       {}", status.regen_braking)?;
        writeln!(out, "  Brake light:       {}", on_off(status.brake_light))?;
        writeln!(out, "  Buzzer:            {:?}", status.buzzer)?;
    }

    Ok(())
}

fn write_json<W: Write>(out: &mut W, report: &ReplayReport, include_summary: bool) -> Result<()> {
    if include_summary {
        serde_json::to_writer_pretty(&mut *out, report)?;
    } else {
        serde_json::to_writer_pretty(&mut *out, &report.transitions)?;
    }
    writeln!(out)?;
    Ok(())
}

fn on_off(high: bool) -> &'static str {
    if high {
        "ON"
    } else {
        "OFF"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use brake_light_core::{CanFrame, NodeConfig, Simulator, VehicleState};

    fn sample_report() -> ReplayReport {
        let mut sim = Simulator::new(&NodeConfig::new()).unwrap();
        let mut transitions = Vec::new();

        let hv = CanFrame::new(0x766, &[0, 0, 0, 0, VehicleState::HvEnabled.as_raw(), 0, 0, 0])
            .with_timestamp_ns(1_000_000_000);
        let drive = CanFrame::new(0x766, &[0, 0, 0, 0, VehicleState::Drive.as_raw(), 1, 0, 0])
            .with_timestamp_ns(2_000_000_000);
        transitions.extend(sim.step(&hv));
        transitions.extend(sim.step(&drive));
        transitions.extend(sim.finish());

        ReplayReport {
            source: "bench.log".to_string(),
            frames_seen: sim.frames_seen(),
            frames_ignored: sim.frames_ignored(),
            transitions,
            final_status: sim.status(),
        }
    }

    #[test]
    fn test_txt_report() {
        let mut out = Vec::new();
        write_report(&mut out, &sample_report(), OutputFormat::Txt, true).unwrap();
        let text = String::from_utf8(out).unwrap();

        assert!(text.contains("bench.log"));
        assert!(text.contains("Buzzer"));
        assert!(text.contains("BrakeLight"));
        assert!(text.contains("Frames:            2"));
        assert!(text.contains("DRIVE (previous HV_ENABLED)"));
    }

    #[test]
    fn test_json_report() {
        let mut out = Vec::new();
        write_report(&mut out, &sample_report(), OutputFormat::Json, true).unwrap();
        let value: serde_json::Value = serde_json::from_slice(&out).unwrap();

        assert_eq!(value["frames_seen"], 2);
        assert_eq!(value["transitions"].as_array().map(|t| t.len()), Some(3));
        assert_eq!(value["transitions"][0]["line"], "brake_light");
        assert_eq!(value["transitions"][2]["line"], "buzzer");
        assert_eq!(value["transitions"][2]["high"], false);
        assert_eq!(value["final_status"]["current_state"], "DRIVE");
        assert_eq!(value["final_status"]["buzzer"], "idle");
    }

    #[test]
    fn test_json_transitions_only() {
        let mut out = Vec::new();
        write_report(&mut out, &sample_report(), OutputFormat::Json, false).unwrap();
        let value: serde_json::Value = serde_json::from_slice(&out).unwrap();
        assert!(value.is_array());
    }
}
