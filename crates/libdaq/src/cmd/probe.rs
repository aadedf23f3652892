use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use libdaq_device::DeviceState;
use serde::Serialize;
use tracing::warn;

use crate::cmd::{endpoint, open_device, ProbeArgs};
use crate::exit::{device_error, CliResult, SUCCESS};
use crate::output::OutputFormat;

#[derive(Serialize)]
struct ProbeOutput {
    endpoint: String,
    model: &'static str,
    channels: u8,
    state: DeviceState,
    sample_rates: Vec<String>,
    voltage_ranges: Vec<String>,
}

pub fn run(args: ProbeArgs, format: OutputFormat) -> CliResult<i32> {
    let device = open_device(&args.device)?;
    device
        .connect()
        .map_err(|err| device_error("connect failed", err))?;
    device
        .initialize()
        .map_err(|err| device_error("initialize failed", err))?;

    let model = device.model();
    let out = ProbeOutput {
        endpoint: endpoint(&args.device),
        model: model.name(),
        channels: model.channel_count(),
        state: device.state(),
        sample_rates: model.supported_rates().iter().map(|r| r.to_string()).collect(),
        voltage_ranges: model
            .supported_voltages()
            .iter()
            .map(|v| v.to_string())
            .collect(),
    };

    if let Err(err) = device.disconnect() {
        warn!(error = %err, "disconnect failed");
    }
    print_probe(&out, format);
    Ok(SUCCESS)
}

fn print_probe(out: &ProbeOutput, format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            println!(
                "{}",
                serde_json::to_string(out).unwrap_or_else(|_| "{}".to_string())
            );
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["FIELD", "VALUE"])
                .add_row(vec!["Endpoint".to_string(), out.endpoint.clone()])
                .add_row(vec!["Model".to_string(), out.model.to_string()])
                .add_row(vec!["Channels".to_string(), out.channels.to_string()])
                .add_row(vec!["State".to_string(), out.state.to_string()])
                .add_row(vec!["Sample rates".to_string(), out.sample_rates.join(", ")])
                .add_row(vec![
                    "Voltage ranges".to_string(),
                    out.voltage_ranges.join(", "),
                ]);
            println!("{table}");
        }
        OutputFormat::Pretty => {
            println!("Device:");
            println!("  Endpoint:       {}", out.endpoint);
            println!("  Model:          {}", out.model);
            println!("  Channels:       {}", out.channels);
            println!("  State:          {}", out.state);
            println!("  Sample rates:   {}", out.sample_rates.join(", "));
            println!("  Voltage ranges: {}", out.voltage_ranges.join(", "));
        }
        OutputFormat::Raw => {
            println!("{}", out.model);
        }
    }
}
