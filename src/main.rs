// traffic-insight/src/main.rs
use chrono::{Local, NaiveDate};
use clap::{value_parser, Arg, ArgAction, Command};
use serde::Serialize;
use std::path::{Path, PathBuf};
use traffic_insight::display::{headline, table_rows};
use traffic_insight::{
    load_records, ClassificationClient, ClassifiedPacketRecord, Config, DatasetSummary, Session, SessionSnapshot,
    StatusFilter,
};

#[derive(Serialize)]
struct JsonReport<'a> {
    source: Option<&'a str>,
    status_filter: StatusFilter,
    search_term: &'a str,
    summary: &'a DatasetSummary,
    records: Vec<&'a ClassifiedPacketRecord>,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let config = Config::from_env();

    let matches = Command::new("traffic-insight")
        .version("0.1")
        .about("Summarize, filter and export classified network traffic")
        .arg(Arg::new("input")
            .help("JSON file of classified records, or a capture file with --analyze")
            .required(true)
            .index(1))
        .arg(Arg::new("analyze")
            .short('a')
            .long("analyze")
            .help("Send the capture file to the classification service")
            .action(ArgAction::SetTrue))
        .arg(Arg::new("status")
            .short('s')
            .long("status")
            .value_name("STATUS")
            .help("Show only normal or anomalous packets")
            .value_parser(["all", "normal", "anomaly"])
            .default_value("all"))
        .arg(Arg::new("search")
            .short('q')
            .long("search")
            .value_name("TERM")
            .help("Case-insensitive search over addresses, protocol and anomaly type")
            .default_value(""))
        .arg(Arg::new("format")
            .short('f')
            .long("format")
            .value_name("FORMAT")
            .help("Output format")
            .value_parser(["summary", "json", "table", "csv"])
            .default_value("summary"))
        .arg(Arg::new("output")
            .short('o')
            .long("output")
            .value_name("FILE")
            .help("Output file (default: stdout)")
            .num_args(1))
        .arg(Arg::new("limit")
            .short('n')
            .long("limit")
            .value_name("N")
            .help("Limit the table to the first N packets")
            .value_parser(value_parser!(usize)))
        .subcommand(Command::new("protocols")
            .about("List protocol shares"))
        .subcommand(Command::new("anomalies")
            .about("List anomaly types by frequency"))
        .subcommand(Command::new("timeline")
            .about("Anomalies per minute in the current view"))
        .subcommand(Command::new("export")
            .about("Export the current view as a spreadsheet-ready CSV")
            .arg(Arg::new("dir")
                .short('d')
                .long("dir")
                .value_name("DIR")
                .help("Target directory (default: EXPORT_DIR or .)")
                .value_parser(value_parser!(PathBuf))))
        .get_matches();

    let input = matches.get_one::<String>("input").ok_or("missing input file")?;

    let mut session = Session::new();
    let source_name = Path::new(input)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or(input)
        .to_string();

    let ticket = session.begin_upload(source_name);
    let loaded = if matches.get_flag("analyze") {
        ClassificationClient::from_config(&config).and_then(|client| client.analyze(input))
    } else {
        load_records(input)
    };
    match loaded {
        Ok(records) => {
            session.complete_upload(ticket, records);
        }
        Err(e) => {
            session.fail_upload(ticket, &e);
            return Err(e.into());
        }
    }

    if let Some(status) = matches.get_one::<String>("status") {
        session.set_status_filter(status.parse()?);
    }
    if let Some(term) = matches.get_one::<String>("search") {
        session.set_search_term(term.as_str());
    }

    let snapshot = session.snapshot();
    let today = Local::now().date_naive();

    let output = match matches.subcommand() {
        Some(("protocols", _)) => render_protocols(snapshot.summary()),
        Some(("anomalies", _)) => render_anomalies(snapshot.summary()),
        Some(("timeline", _)) => render_timeline(&snapshot),
        Some(("export", sub)) => {
            let dir = sub.get_one::<PathBuf>("dir").unwrap_or(&config.export_dir);
            match session.export_to_dir(dir, today) {
                Ok(path) => format!("Exported {} rows to {}\n", snapshot.view().len(), path.display()),
                Err(e) if e.is_notice() => format!("{}\n", e),
                Err(e) => return Err(e.into()),
            }
        }
        _ => {
            let format = matches.get_one::<String>("format").map_or("summary", |f| f.as_str());
            let limit = matches.get_one::<usize>("limit").copied().unwrap_or(config.table_row_limit);

            match format {
                "json" => {
                    let report = JsonReport {
                        source: snapshot.dataset().source_name(),
                        status_filter: snapshot.params().status,
                        search_term: &snapshot.params().search_term,
                        summary: snapshot.summary(),
                        records: snapshot.filtered_records(),
                    };
                    serde_json::to_string_pretty(&report)? + "\n"
                }
                "csv" => render_csv(&snapshot, today)?,
                "table" => render_table(&snapshot, limit),
                _ => render_summary(&snapshot),
            }
        }
    };

    if let Some(output_file) = matches.get_one::<String>("output") {
        std::fs::write(output_file, output)?;
        println!("Output written to {}", output_file);
    } else {
        print!("{}", output);
    }

    Ok(())
}

fn render_summary(snapshot: &SessionSnapshot) -> String {
    let summary = snapshot.summary();
    let mut out = String::new();
    out.push_str(&format!("File: {}\n", snapshot.dataset().source_name().unwrap_or("-")));
    out.push_str(&format!("Packets: {}\n", summary.total_packets));
    out.push_str(&format!("Anomalies: {}\n", summary.anomaly_count));
    out.push_str(&format!("Traffic: {} bytes\n", summary.total_traffic_bytes));
    out.push_str(&format!("Protocols: {}\n", summary.protocol_breakdown.len()));
    out.push_str(&format!(
        "Visible ({} / {:?}): {}\n",
        snapshot.params().status,
        snapshot.params().search_term,
        headline(snapshot.view().len(), summary)
    ));
    out
}

fn render_protocols(summary: &DatasetSummary) -> String {
    let mut out = String::from("Protocols found:\n");
    for share in &summary.protocol_breakdown {
        out.push_str(&format!(
            "  {:12}: {:6} packets ({:>6}%)\n",
            share.protocol, share.count, share.ratio_percent
        ));
    }
    out
}

fn render_anomalies(summary: &DatasetSummary) -> String {
    if summary.anomaly_type_breakdown.is_empty() {
        return "No anomalies detected\n".to_string();
    }
    let mut out = String::from("Anomaly types:\n");
    for (label, count) in summary.anomaly_types_by_count() {
        out.push_str(&format!("  {:20}: {}\n", label, count));
    }
    out
}

fn render_timeline(snapshot: &SessionSnapshot) -> String {
    let timeline = snapshot.timeline();
    if timeline.is_empty() {
        return "No timed anomalies in view\n".to_string();
    }
    let mut out = String::from("Anomaly timeline:\n");
    for point in timeline {
        out.push_str(&format!("  {}  {}\n", point.time, point.count));
    }
    out
}

fn render_table(snapshot: &SessionSnapshot, limit: usize) -> String {
    let mut out = format!("{}\n", headline(snapshot.view().len(), snapshot.summary()));
    for row in table_rows(snapshot.filtered_records(), limit) {
        out.push_str(&format!(
            "{} | {:>15} → {:<15} | {:8} | {:6} bytes | {:7} | {:11} | {:3}%\n",
            row.time,
            row.source,
            row.destination,
            row.protocol,
            row.bytes,
            row.status,
            row.short_anomaly_label(),
            row.confidence_percent
        ));
    }
    out
}

// An empty view prints the notice instead of failing
fn render_csv(snapshot: &SessionSnapshot, today: NaiveDate) -> traffic_insight::Result<String> {
    let batch = match snapshot.export_rows(today) {
        Ok(batch) => batch,
        Err(e) if e.is_notice() => return Ok(format!("{}\n", e)),
        Err(e) => return Err(e),
    };
    let mut buffer = Vec::new();
    batch.write_csv(&mut buffer)?;
    Ok(String::from_utf8_lossy(&buffer).into_owned())
}
