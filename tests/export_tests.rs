use pretty_assertions::assert_eq;
use seatrace_export::clock::SyncPair;
use seatrace_export::commands::{execute_export, ExportArgs};
use seatrace_export::exporter::{TraceExporter, TraceSink};
use seatrace_export::output::{bundle, read_shard, shard_path};
use seatrace_export::parser::{Event, EventData, EventType, Frame};
use seatrace_export::utils::config::ExportConfig;
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::path::Path;

fn threads() -> BTreeMap<String, String> {
    let mut threads = BTreeMap::new();
    threads.insert("100,1".to_string(), "main".to_string());
    threads
}

fn task(time: i64) -> Event {
    Event::new("d", EventType::Task, 100, Some(1), time).with_name("f")
}

fn events_with_phase<'a>(events: &'a [Value], ph: &str) -> Vec<&'a Value> {
    events.iter().filter(|e| e["ph"] == ph).collect()
}

fn archive_members(path: &Path) -> Vec<String> {
    let archive = zip::ZipArchive::new(File::open(path).unwrap()).unwrap();
    let mut names: Vec<String> = archive.file_names().map(str::to_string).collect();
    names.sort();
    names
}

#[test]
fn test_export_single_task_from_tree() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("tree.json");
    let tree = json!({
        "threads": {"100,1": "main"},
        "records": [
            {"complete": {
                "type": "task",
                "begin": {"domain": "d", "type": "task", "pid": 100, "tid": 1, "time": 1000, "str": "f"},
                "end": {"domain": "d", "type": "task", "pid": 100, "tid": 1, "time": 5000, "str": "f"}
            }}
        ]
    });
    fs::write(&input, serde_json::to_string(&tree).unwrap()).unwrap();

    let output = dir.path().join("trace");
    let summary = execute_export(ExportArgs {
        input,
        output: output.clone(),
        ..ExportArgs::default()
    })
    .unwrap();

    assert_eq!(summary.records, 1);
    assert_eq!(summary.targets, vec![shard_path(&output, 0)]);

    let doc = read_shard(&summary.targets[0]).unwrap();
    assert_eq!(
        doc.trace_events,
        vec![
            json!({"ph": "M", "name": "thread_name", "pid": 100, "tid": 1, "args": {"name": "main(1)"}}),
            json!({"ph": "X", "name": "f", "pid": 100, "tid": 1, "ts": 1, "dur": 4, "cat": "d"}),
        ]
    );
    assert!(doc.stack_frames.is_none());

    let archive = summary.archive.unwrap();
    assert_eq!(archive_members(&archive), vec!["trace-0.json".to_string()]);
}

#[test]
fn test_rotation_produces_contiguous_valid_shards() {
    let dir = tempfile::tempdir().unwrap();
    let base = dir.path().join("t");
    let config = ExportConfig::default().with_max_shard_size(300);

    let mut exporter = TraceExporter::new(config, &base, threads(), &[]).unwrap();
    for i in 0..20 {
        let begin = task(i * 10_000);
        let end = task(i * 10_000 + 5_000);
        exporter.complete_task(EventType::Task, &begin, Some(&end)).unwrap();
    }
    let targets = exporter.finish().unwrap();

    assert!(targets.len() > 1);
    let mut tasks = 0;
    for (index, target) in targets.iter().enumerate() {
        assert_eq!(target, &shard_path(&base, index));

        let doc = read_shard(target).unwrap();
        // Every shard repeats the thread names
        assert_eq!(doc.trace_events[0]["name"], "thread_name");
        tasks += events_with_phase(&doc.trace_events, "X").len();
    }
    assert_eq!(tasks, 20);
}

#[test]
fn test_rotation_bound_includes_stack_trailer() {
    let dir = tempfile::tempdir().unwrap();
    let base = dir.path().join("t");
    let max = 2000;
    let config = ExportConfig::default().with_max_shard_size(max);

    let mut exporter = TraceExporter::new(config, &base, threads(), &[]).unwrap();
    for i in 0..200u64 {
        let stack = vec![Frame {
            ptr: 0x1000 + i,
            module: "/usr/bin/app".to_string(),
            name: format!("fn_{}", i),
        }];
        let time = i as i64 * 10_000;
        let begin = task(time).with_data(EventData::Stack(stack));
        exporter
            .complete_task(EventType::Task, &begin, Some(&task(time + 5_000)))
            .unwrap();
    }
    let targets = exporter.finish().unwrap();

    // One task record plus its sample and frame
    let slack = 512;
    let mut samples = 0;
    for target in &targets {
        let len = fs::metadata(target).unwrap().len();
        assert!(len <= max + slack, "{} is {} bytes", target.display(), len);

        let doc = read_shard(target).unwrap();
        if let (Some(frames), Some(shard_samples)) = (doc.stack_frames, doc.samples) {
            for sample in &shard_samples {
                assert!(frames.contains_key(&sample["sf"].to_string()));
            }
            samples += shard_samples.len();
        }
    }
    assert!(targets.len() > 1);
    assert_eq!(samples, 200);
}

#[test]
fn test_counters_replayed_after_last_value() {
    let dir = tempfile::tempdir().unwrap();
    let config = ExportConfig::default().with_float_time(true);
    let mut exporter = TraceExporter::new(config, dir.path().join("t"), threads(), &[]).unwrap();

    for (time, value) in [(1000, 1.0), (3000, 42.0)] {
        let counter = Event::new("d", EventType::Counter, 100, Some(1), time)
            .with_name("bytes")
            .with_delta(value);
        exporter.complete_task(EventType::Counter, &counter, None).unwrap();
    }
    let targets = exporter.finish().unwrap();

    let doc = read_shard(&targets[0]).unwrap();
    let counters = events_with_phase(&doc.trace_events, "C");
    assert_eq!(counters.len(), 3);

    let last = counters[2];
    assert_eq!(last["name"], "bytes");
    assert_eq!(last["args"]["bytes"], 42);
    assert_eq!(last["ts"], json!(3.001));
}

#[test]
fn test_samples_written_with_shard() {
    let dir = tempfile::tempdir().unwrap();
    let mut exporter =
        TraceExporter::new(ExportConfig::default(), dir.path().join("t"), threads(), &[]).unwrap();

    let stack = vec![
        Frame {
            ptr: 0x20,
            module: "/usr/lib/libfoo.so".to_string(),
            name: "inner".to_string(),
        },
        Frame {
            ptr: 0x10,
            module: "/usr/bin/app".to_string(),
            name: "outer".to_string(),
        },
    ];
    for time in [1000, 9000] {
        let begin = task(time).with_data(EventData::Stack(stack.clone()));
        exporter
            .complete_task(EventType::Task, &begin, Some(&task(time + 4000)))
            .unwrap();
    }
    let targets = exporter.finish().unwrap();

    let doc = read_shard(&targets[0]).unwrap();
    // Identical stacks share their frames
    assert_eq!(doc.stack_frames.unwrap().len(), 2);
    assert_eq!(doc.samples.unwrap().len(), 2);
}

#[test]
fn test_sync_pairs_rescale_timestamps() {
    let dir = tempfile::tempdir().unwrap();
    // One second of source time spans one second of target time
    let sync = [
        SyncPair::new(10.0, 0),
        SyncPair::new(11.0, 1_000_000_000),
    ];
    let mut exporter =
        TraceExporter::new(ExportConfig::default(), dir.path().join("t"), threads(), &sync).unwrap();
    assert_eq!(exporter.mapping().ratio, 1e-3);

    exporter
        .complete_task(EventType::Task, &task(750_000_000), Some(&task(750_002_000)))
        .unwrap();
    let targets = exporter.finish().unwrap();

    let doc = read_shard(&targets[0]).unwrap();
    let tasks = events_with_phase(&doc.trace_events, "X");
    assert_eq!(tasks[0]["ts"], 10_250_000);
    assert_eq!(tasks[0]["dur"], 2);
}

#[test]
fn test_kernel_trace_cut_file_is_bundled() {
    let dir = tempfile::tempdir().unwrap();
    let kernel = dir.path().join("kernel.txt");
    fs::write(
        &kernel,
        "# tracer: nop\n\
         #\n\
         \x20 app-1  [000] ....  1000.500000: tracing_mark_write: IntelSEAPI_Time_Sync: 2000000\n\
         \x20 app-1  [000] ....  1000.550000: sched_switch: prev=app next=idle\n\
         \x20 app-1  [000] ....  1000.600000: tracing_mark_write: IntelSEAPI_Time_Sync: 2100000\n",
    )
    .unwrap();

    let base = dir.path().join("t");
    let mut exporter =
        TraceExporter::from_kernel_trace(ExportConfig::default(), &base, threads(), &kernel).unwrap();
    exporter
        .complete_task(EventType::Task, &task(2_075_000), Some(&task(2_080_000)))
        .unwrap();
    let targets = exporter.finish().unwrap();

    assert_eq!(targets[0], dir.path().join("t.cut.ftrace"));
    let cut = fs::read_to_string(&targets[0]).unwrap();
    assert!(cut.starts_with("# tracer: nop\n"));
    assert!(cut.contains("trace_event_clock_sync: parent_ts=1000.500000"));

    let doc = read_shard(&targets[1]).unwrap();
    let ts = events_with_phase(&doc.trace_events, "X")[0]["ts"].as_f64().unwrap();
    assert!(ts > 1.0e9);

    let archive = bundle(&targets, &base).unwrap();
    assert_eq!(
        archive_members(&archive),
        vec!["t-0.json".to_string(), "t.cut.ftrace".to_string()]
    );
}

#[test]
fn test_bundle_merges_side_files() {
    let dir = tempfile::tempdir().unwrap();
    let base = dir.path().join("t");

    let mut targets = Vec::new();
    for (name, text) in [("c.ftrace", "third\n"), ("a.ftrace", "first\n"), ("b.ftrace", "second\n")] {
        let path = dir.path().join(name);
        fs::write(&path, text).unwrap();
        targets.push(path);
    }
    let exporter = TraceExporter::new(ExportConfig::default(), &base, threads(), &[]).unwrap();
    targets.extend(exporter.finish().unwrap());

    let archive_path = bundle(&targets, &base).unwrap();
    assert_eq!(
        archive_members(&archive_path),
        vec!["merged.ftrace".to_string(), "t-0.json".to_string()]
    );

    let mut archive = zip::ZipArchive::new(File::open(&archive_path).unwrap()).unwrap();
    let mut merged = String::new();
    std::io::Read::read_to_string(&mut archive.by_name("merged.ftrace").unwrap(), &mut merged)
        .unwrap();
    assert_eq!(merged, "first\nsecond\nthird\n");
}
