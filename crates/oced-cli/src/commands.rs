use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use colored::Colorize;
use oced_store::{
    dump_to_path, load_from_path, parse_events_json, EventWriter, IntegrityChecker,
    IntegrityReport, LogStatus, OcedStore, Snapshot, StoreConfig, StoreReader, Vocabulary,
    FORMAT_VERSION,
};
use oced_types::{EventId, EventTime};
use serde::Serialize;
use tracing::{info, warn};

use crate::cli::*;

pub fn run_command(cli: Cli) -> anyhow::Result<()> {
    let format = cli.format;
    match cli.command {
        Command::Apply(args) => {
            let report = cmd_apply(&args)?;
            emit(format, &report, print_apply)
        }
        Command::Revert(args) => {
            let report = cmd_revert(&args)?;
            emit(format, &report, print_revert)
        }
        Command::Inspect(args) => {
            let report = cmd_inspect(&args)?;
            emit(format, &report, print_inspect)
        }
        Command::Verify(args) => {
            let report = cmd_verify(&args)?;
            emit(format, &report, print_verify)?;
            if !report.is_ok() {
                bail!("{} failed verification", args.snapshot.display());
            }
            Ok(())
        }
    }
}

fn emit<T: Serialize>(format: OutputFormat, report: &T, text: fn(&T)) -> anyhow::Result<()> {
    match format {
        OutputFormat::Text => text(report),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(report)?),
    }
    Ok(())
}

// ---- apply ----

#[derive(Debug, Serialize)]
struct ApplyReport {
    applied: Vec<AppliedEvent>,
    failed: Vec<FailedEvent>,
    digest: String,
    written_to: Option<PathBuf>,
}

#[derive(Debug, Serialize)]
struct AppliedEvent {
    index: usize,
    event_id: EventId,
    event_type: String,
    time: EventTime,
}

#[derive(Debug, Serialize)]
struct FailedEvent {
    index: usize,
    event_type: String,
    error: String,
}

fn cmd_apply(args: &ApplyArgs) -> anyhow::Result<ApplyReport> {
    let raw = fs::read_to_string(&args.events)
        .with_context(|| format!("reading events from {}", args.events.display()))?;
    let events = parse_events_json(&raw)
        .with_context(|| format!("parsing event batch {}", args.events.display()))?;
    let config = match &args.config {
        Some(path) => Some(
            StoreConfig::load(path)
                .with_context(|| format!("loading configuration {}", path.display()))?,
        ),
        None => None,
    };
    let store = open_store(args.snapshot.as_deref(), config)?;

    let mut applied = Vec::new();
    let mut failed = Vec::new();
    for (index, event) in events.into_iter().enumerate() {
        let event_type = event.event_type.clone();
        let time = event.time;
        match store.insert_event(event) {
            Ok(event_id) => {
                info!(%event_id, index, %event_type, "event applied");
                applied.push(AppliedEvent {
                    index,
                    event_id,
                    event_type,
                    time,
                });
            }
            Err(error) if args.keep_going => {
                warn!(index, %event_type, %error, "event rejected");
                failed.push(FailedEvent {
                    index,
                    event_type,
                    error: error.to_string(),
                });
            }
            Err(error) => {
                return Err(error).with_context(|| {
                    format!("event #{index} ({event_type}) rejected, nothing was written")
                });
            }
        }
    }

    let written_to = args.out.clone().or_else(|| args.snapshot.clone());
    if let Some(path) = &written_to {
        dump_to_path(&store, path)
            .with_context(|| format!("writing snapshot {}", path.display()))?;
    }
    Ok(ApplyReport {
        applied,
        failed,
        digest: store.digest()?,
        written_to,
    })
}

fn open_store(snapshot: Option<&Path>, config: Option<StoreConfig>) -> anyhow::Result<OcedStore> {
    match snapshot {
        Some(path) if path.exists() => {
            let store = load_from_path(path)
                .with_context(|| format!("loading snapshot {}", path.display()))?;
            Ok(match config {
                Some(config) => OcedStore::from_state(config, store.state()?),
                None => store,
            })
        }
        _ => Ok(OcedStore::with_config(config.unwrap_or_default())),
    }
}

fn print_apply(report: &ApplyReport) {
    for event in &report.applied {
        println!(
            "{} event {} {} at {}",
            "✓".green(),
            event.event_id.to_string().yellow().bold(),
            event.event_type.cyan(),
            event.time
        );
    }
    for event in &report.failed {
        println!(
            "{} #{} {}: {}",
            "✗".red(),
            event.index,
            event.event_type.cyan(),
            event.error.red()
        );
    }
    println!(
        "Applied {}, rejected {}",
        report.applied.len().to_string().bold(),
        report.failed.len().to_string().bold()
    );
    match &report.written_to {
        Some(path) => println!("Snapshot: {}", path.display().to_string().bold()),
        None => println!("Snapshot: {}", "not written (no --snapshot or --out)".dimmed()),
    }
    println!("Digest: {}", report.digest.dimmed());
}

// ---- revert ----

#[derive(Debug, Serialize)]
struct RevertReport {
    reverted: Vec<EventId>,
    digest: String,
    written_to: PathBuf,
}

fn cmd_revert(args: &RevertArgs) -> anyhow::Result<RevertReport> {
    let store = load_from_path(&args.snapshot)
        .with_context(|| format!("loading snapshot {}", args.snapshot.display()))?;

    let mut reverted = Vec::with_capacity(args.count);
    for _ in 0..args.count {
        let event_id = store
            .revert_latest()
            .with_context(|| format!("after reverting {} event(s)", reverted.len()))?;
        info!(%event_id, "event reverted");
        reverted.push(event_id);
    }

    let written_to = args.out.clone().unwrap_or_else(|| args.snapshot.clone());
    dump_to_path(&store, &written_to)
        .with_context(|| format!("writing snapshot {}", written_to.display()))?;
    Ok(RevertReport {
        reverted,
        digest: store.digest()?,
        written_to,
    })
}

fn print_revert(report: &RevertReport) {
    for event_id in &report.reverted {
        println!("{} reverted event {}", "↺".yellow(), event_id.to_string().bold());
    }
    println!("Snapshot: {}", report.written_to.display().to_string().bold());
    println!("Digest: {}", report.digest.dimmed());
}

// ---- inspect ----

#[derive(Debug, Serialize)]
struct InspectReport {
    objects: usize,
    relations: usize,
    attribute_values: usize,
    live_events: Vec<EventId>,
    reverted_events: usize,
    max_time: Option<EventTime>,
    next_event_id: EventId,
    vocabulary: Vocabulary,
    config: StoreConfig,
    digest: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    log: Option<Vec<LogLine>>,
}

#[derive(Debug, Serialize)]
struct LogLine {
    event_id: EventId,
    time: EventTime,
    event_type: String,
    status: LogStatus,
    operations: usize,
}

fn cmd_inspect(args: &InspectArgs) -> anyhow::Result<InspectReport> {
    let store = load_from_path(&args.snapshot)
        .with_context(|| format!("loading snapshot {}", args.snapshot.display()))?;
    let log = store.log()?;

    Ok(InspectReport {
        objects: store.objects()?.len(),
        relations: store.relations()?.len(),
        attribute_values: store.attribute_values()?.len(),
        live_events: store.events()?.iter().map(|e| e.event_id).collect(),
        reverted_events: log.iter().filter(|r| !r.is_live()).count(),
        max_time: store.max_time()?,
        next_event_id: store.next_event_id()?,
        vocabulary: store.vocabulary()?,
        config: store.config().clone(),
        digest: store.digest()?,
        log: args.log.then(|| {
            log.iter()
                .map(|record| LogLine {
                    event_id: record.event_id(),
                    time: record.event.time,
                    event_type: record.event.event_type.clone(),
                    status: record.status,
                    operations: record.applied.len(),
                })
                .collect()
        }),
    })
}

fn print_inspect(report: &InspectReport) {
    println!("Objects:           {}", report.objects.to_string().bold());
    println!("Relations:         {}", report.relations.to_string().bold());
    println!("Attribute values:  {}", report.attribute_values.to_string().bold());
    println!(
        "Events:            {} live, {} reverted",
        report.live_events.len().to_string().bold(),
        report.reverted_events
    );
    match &report.max_time {
        Some(time) => println!("Latest event time: {}", time.to_string().cyan()),
        None => println!("Latest event time: {}", "none".dimmed()),
    }
    println!("Next event id:     {}", report.next_event_id.to_string().yellow());
    println!(
        "Delete policy:     {:?}, self-relations {}",
        report.config.delete_policy,
        if report.config.allow_self_relations { "allowed" } else { "forbidden" }
    );

    let labels = [
        ("Object types", &report.vocabulary.object_types),
        ("Relation types", &report.vocabulary.relation_types),
        ("Attribute names", &report.vocabulary.attribute_names),
        ("Event types", &report.vocabulary.event_types),
        ("Event attributes", &report.vocabulary.event_attribute_names),
    ];
    for (title, set) in labels {
        let joined: Vec<&str> = set.iter().map(String::as_str).collect();
        println!("{title:<18} {}", joined.join(", "));
    }

    if let Some(log) = &report.log {
        println!();
        for line in log {
            let status = match line.status {
                LogStatus::Committed => "committed".green(),
                LogStatus::Reverted => "reverted".red(),
            };
            println!(
                "{:>6}  {}  {:<12} {:<9} {} op(s)",
                line.event_id.to_string().yellow(),
                line.time,
                line.event_type,
                status,
                line.operations
            );
        }
    }
    println!("Digest: {}", report.digest.dimmed());
}

// ---- verify ----

#[derive(Debug, Serialize)]
struct VerifyReport {
    format_version: u32,
    format_supported: bool,
    recorded_digest: String,
    computed_digest: String,
    integrity: IntegrityReport,
}

impl VerifyReport {
    fn digest_matches(&self) -> bool {
        self.recorded_digest == self.computed_digest
    }

    fn is_ok(&self) -> bool {
        self.format_supported && self.digest_matches() && self.integrity.is_valid()
    }
}

fn cmd_verify(args: &VerifyArgs) -> anyhow::Result<VerifyReport> {
    let raw = fs::read_to_string(&args.snapshot)
        .with_context(|| format!("reading snapshot {}", args.snapshot.display()))?;
    let snapshot: Snapshot = serde_json::from_str(&raw)
        .with_context(|| format!("{} is not a snapshot document", args.snapshot.display()))?;

    Ok(VerifyReport {
        format_version: snapshot.format_version,
        format_supported: snapshot.format_version == FORMAT_VERSION,
        computed_digest: Snapshot::content_digest(&snapshot.config, &snapshot.state)?,
        recorded_digest: snapshot.digest,
        integrity: IntegrityChecker::check(&snapshot.state),
    })
}

fn print_verify(report: &VerifyReport) {
    let mark = |ok: bool| if ok { "valid".green() } else { "INVALID".red().bold() };
    if report.is_ok() {
        println!("{} Snapshot integrity verified", "✓".green().bold());
    } else {
        println!("{} Snapshot failed verification", "✗".red().bold());
    }
    println!(
        "  Format:    v{} {}",
        report.format_version,
        mark(report.format_supported)
    );
    println!("  Digest:    {}", mark(report.digest_matches()));
    println!(
        "  Integrity: {} ({} objects, {} relations, {} attribute values, {} events)",
        mark(report.integrity.is_valid()),
        report.integrity.object_count,
        report.integrity.relation_count,
        report.integrity.attribute_value_count,
        report.integrity.event_count
    );
    for violation in &report.integrity.violations {
        println!(
            "    {:?} {}: {}",
            violation.kind,
            violation.subject.yellow(),
            violation.description
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BATCH: &str = r#"[
        {
            "time": "2024-01-01T10:00:00Z",
            "event_type": "setup",
            "events_attributes": {"resource": "alice"},
            "sub_events": [
                {"function": "create_object", "parameters": {"object_id": "O1", "object_type": "machine"}},
                {"function": "create_object", "parameters": {"object_id": "O2", "object_type": "order"}}
            ],
            "object_ids_involved": ["O1", "O2"]
        },
        {
            "time": "2024-01-01T11:00:00Z",
            "event_type": "assign",
            "sub_events": [
                {"function": "create_object_relation",
                 "parameters": {"object_relation_id": "R1", "from_object_id": "O1",
                                "to_object_id": "O2", "relation_type": "processes"}}
            ],
            "object_relation_ids_involved": ["R1"]
        }
    ]"#;

    const LATE: &str = r#"[
        {"time": "2023-12-31T00:00:00Z", "event_type": "late"},
        {"time": "2024-01-02T00:00:00Z", "event_type": "next",
         "sub_events": [{"function": "modify_object",
                         "parameters": {"object_id": "O2", "new_object_type": "rush_order"}}]}
    ]"#;

    fn apply_args(events: PathBuf, snapshot: PathBuf) -> ApplyArgs {
        ApplyArgs {
            events,
            snapshot: Some(snapshot),
            out: None,
            config: None,
            keep_going: false,
        }
    }

    fn seeded(dir: &Path) -> PathBuf {
        let events = dir.join("events.json");
        fs::write(&events, BATCH).unwrap();
        let snapshot = dir.join("store.json");
        let report = cmd_apply(&apply_args(events, snapshot.clone())).unwrap();
        assert_eq!(report.applied.len(), 2);
        snapshot
    }

    #[test]
    fn apply_creates_snapshot_and_inspect_reads_it() {
        let dir = tempfile::tempdir().unwrap();
        let snapshot = seeded(dir.path());

        let report = cmd_inspect(&InspectArgs {
            snapshot,
            log: true,
        })
        .unwrap();
        assert_eq!(report.objects, 2);
        assert_eq!(report.relations, 1);
        assert_eq!(report.live_events, vec![EventId::new(1), EventId::new(2)]);
        assert!(report.vocabulary.event_attribute_names.contains("resource"));
        assert_eq!(report.log.unwrap().len(), 2);
    }

    #[test]
    fn failing_batch_writes_nothing_unless_keep_going() {
        let dir = tempfile::tempdir().unwrap();
        let snapshot = seeded(dir.path());
        let before = fs::read_to_string(&snapshot).unwrap();

        let late = dir.path().join("late.json");
        fs::write(&late, LATE).unwrap();
        let error = cmd_apply(&apply_args(late.clone(), snapshot.clone())).unwrap_err();
        assert!(format!("{error:#}").contains("not after"));
        assert_eq!(fs::read_to_string(&snapshot).unwrap(), before);

        let mut args = apply_args(late, snapshot.clone());
        args.keep_going = true;
        let report = cmd_apply(&args).unwrap();
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].index, 0);
        assert_eq!(report.applied[0].event_id, EventId::new(3));
        assert_ne!(fs::read_to_string(&snapshot).unwrap(), before);
    }

    #[test]
    fn revert_writes_to_out_and_leaves_source() {
        let dir = tempfile::tempdir().unwrap();
        let snapshot = seeded(dir.path());
        let out = dir.path().join("reverted.json");

        let report = cmd_revert(&RevertArgs {
            snapshot: snapshot.clone(),
            count: 2,
            out: Some(out.clone()),
        })
        .unwrap();
        assert_eq!(report.reverted, vec![EventId::new(2), EventId::new(1)]);

        let reverted = load_from_path(&out).unwrap();
        assert!(reverted.objects().unwrap().is_empty());
        assert_eq!(load_from_path(&snapshot).unwrap().objects().unwrap().len(), 2);

        let error = cmd_revert(&RevertArgs {
            snapshot: out,
            count: 1,
            out: None,
        })
        .unwrap_err();
        assert!(format!("{error:#}").contains("no live event"));
    }

    #[test]
    fn verify_flags_tampering() {
        let dir = tempfile::tempdir().unwrap();
        let snapshot = seeded(dir.path());
        assert!(cmd_verify(&VerifyArgs { snapshot: snapshot.clone() }).unwrap().is_ok());

        let tampered = fs::read_to_string(&snapshot)
            .unwrap()
            .replacen("\"processes\"", "\"feeds\"", 1);
        fs::write(&snapshot, tampered).unwrap();
        let report = cmd_verify(&VerifyArgs { snapshot }).unwrap();
        assert!(!report.digest_matches());
        assert!(!report.is_ok());
    }

    #[test]
    fn config_file_overrides_snapshot_config() {
        let dir = tempfile::tempdir().unwrap();
        let snapshot = seeded(dir.path());
        let config = dir.path().join("store.toml");
        fs::write(&config, "delete_policy = \"cascade\"\n").unwrap();

        let events = dir.path().join("scrap.json");
        fs::write(
            &events,
            r#"{"time": "2024-01-03T00:00:00Z", "event_type": "scrap",
                "sub_events": [{"function": "delete_object", "parameters": {"object_id": "O1"}}]}"#,
        )
        .unwrap();
        let mut args = apply_args(events, snapshot.clone());
        args.config = Some(config);
        cmd_apply(&args).unwrap();

        let store = load_from_path(&snapshot).unwrap();
        assert_eq!(store.config(), &StoreConfig::cascading());
        assert!(store.relations().unwrap().is_empty());
    }
}
