use clap::Parser;
use netsentry::alert::rule::{Comparator, Condition, Severity};
use netsentry::alert::{spawn_alert_ticker, AlertEngine};
use netsentry::analyzer::PacketAnalyzer;
use netsentry::api;
use netsentry::capture::ring::{FrameRing, DEFAULT_RING_CAPACITY};
use netsentry::capture::PacketCapture;
use netsentry::cli::Cli;
use netsentry::config::Config;
use netsentry::logger::{Event, LogLevel, Logger, SharedLogger};
use netsentry::metrics::{CollectorTask, CpuSampler, MemorySampler, Metric, MetricRegistry};
use netsentry::pool::WorkerPool;
use netsentry::store::{AlertRecord, MemoryStore, MetricPoint, StoreSink};
use netsentry::ShutdownFlag;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

fn main() {
    let cli = Cli::parse();

    // ── Configuration ────────────────────────────────────────────────────────
    // File values overlay the defaults, CLI flags overlay the file. A
    // broken config file is reported once and the defaults stand.
    let mut config = Config::default();
    let mut config_error: Option<String> = None;
    if let Some(ref path) = cli.config {
        if let Err(e) = config.apply_file(path) {
            config_error = Some(e.to_string());
        }
    }
    cli.apply_overrides(&mut config);

    // ── Logger ───────────────────────────────────────────────────────────────
    let level = LogLevel::from_config(&config.get_str("log_level", "info"));
    let log_file = config.get_str("log_file", "netsentry.log");
    let logger: SharedLogger = Arc::new(
        Logger::new(cli.json, Some(&log_file), level)
            .or_else(|_| Logger::new(cli.json, None, level))
            .expect("stdout logger cannot fail"),
    );

    if let Some(error) = config_error {
        logger.log(&Event::Info {
            message: &format!("Config file ignored: {}. Continuing with defaults.", error),
        });
    }
    logger.log(&Event::Info { message: "netsentry starting up" });

    let info = api::system_info();
    logger.log(&Event::Info {
        message: &format!(
            "host {} ({}), {} cpus",
            info["hostname"].as_str().unwrap_or("unknown"),
            info["platform"].as_str().unwrap_or("unknown"),
            info["num_cpus"]
        ),
    });

    // ── Shutdown signal ──────────────────────────────────────────────────────
    let shutdown: ShutdownFlag = Arc::new(AtomicBool::new(false));
    let shutdown_ctrlc = Arc::clone(&shutdown);
    if ctrlc::set_handler(move || {
        shutdown_ctrlc.store(true, Ordering::SeqCst);
    })
    .is_err()
    {
        logger.log(&Event::Error { message: "Could not register signal handler" });
        std::process::exit(1);
    }

    let session_start = Instant::now();

    // ── Core subsystems ──────────────────────────────────────────────────────
    let registry = Arc::new(MetricRegistry::new());
    let store: Arc<MemoryStore> = Arc::new(MemoryStore::new());
    let mut pool = WorkerPool::with_default_threads();
    let analyzer = Arc::new(PacketAnalyzer::new());

    // ── Collectors ───────────────────────────────────────────────────────────
    // Sampler metric registration hitting a registry error at startup is
    // the one fatal failure mode.
    let interval = Duration::from_secs(1);
    let mut collectors = vec![
        CollectorTask::new(interval, Box::new(CpuSampler::new()), Arc::clone(&registry)),
        CollectorTask::new(interval, Box::new(MemorySampler::new()), Arc::clone(&registry)),
    ];

    for task in collectors.iter_mut() {
        let name = task.name().to_string();
        let interval_ms = task.interval().as_millis() as u64;
        if let Err(e) = task.start() {
            logger.log(&Event::Error {
                message: &format!("collector '{}' failed to start: {}", name, e),
            });
            std::process::exit(1);
        }
        logger.log(&Event::CollectorStarted { name: &name, interval_ms });
    }

    // ── Packet capture path ──────────────────────────────────────────────────
    let ring = Arc::new(FrameRing::with_capacity(DEFAULT_RING_CAPACITY));
    let dropped_counter = registry.register(Metric::counter("packets.dropped")).ok();

    let mut capture = PacketCapture::new(
        Arc::clone(&ring),
        Arc::clone(&logger),
        Arc::clone(&shutdown),
        dropped_counter,
    );

    let mut dispatcher: Option<thread::JoinHandle<()>> = None;
    if config.get_bool("enable_packet_capture", false) {
        let interface = config.get_str("capture_interface", "eth0");
        match capture.start_capture(&interface) {
            Ok(()) => {
                dispatcher = Some(spawn_dispatcher(
                    Arc::clone(&ring),
                    Arc::clone(&analyzer),
                    Arc::clone(&store) as Arc<dyn StoreSink>,
                    &pool,
                    Arc::clone(&logger),
                    Arc::clone(&shutdown),
                ));
            }
            Err(e) => {
                // Capture stays down; metrics and alerting keep running.
                logger.log(&Event::CaptureFailed {
                    interface: &interface,
                    error:     &e.to_string(),
                });
            }
        }
    }

    // ── Alert engine ─────────────────────────────────────────────────────────
    let cooldown = Duration::from_secs(u64::from(config.get_u32("alert_cooldown_seconds", 60)));
    let engine = Arc::new(AlertEngine::with_cooldown(Arc::clone(&logger), cooldown));

    let alert_store = Arc::clone(&store);
    engine.register_callback(Box::new(move |rule| {
        let record = AlertRecord {
            name:         rule.name.clone(),
            description:  rule.describe(),
            severity:     rule.severity.as_i32(),
            ts_secs:      chrono::Utc::now().timestamp(),
            acknowledged: false,
        };
        alert_store
            .record_alert(&record)
            .map_err(|e| e.to_string())
    }));

    install_default_rules(&engine, &registry, &config);

    let ticker = spawn_alert_ticker(
        Arc::clone(&engine),
        Duration::from_secs(1),
        Arc::clone(&shutdown),
    );

    if config.get_bool("enable_api", false) {
        logger.log(&Event::Info {
            message: &format!(
                "query surface snapshots enabled for port {}",
                config.get_u16("api_port", 8080)
            ),
        });
    }

    logger.log(&Event::Info { message: "netsentry is running; Ctrl+C to exit" });

    // ── Main loop ────────────────────────────────────────────────────────────
    // Once per second, snapshot every metric into a batch for the
    // write-behind store. The sleep is sliced so shutdown stays prompt.
    let retention_secs = i64::from(config.get_u32("metric_retention_seconds", 3600));
    let mut last_prune = Instant::now();

    while !shutdown.load(Ordering::Relaxed) {
        let points = snapshot_metrics(&registry);
        if !points.is_empty() {
            let store = Arc::clone(&store);
            let logger = Arc::clone(&logger);
            pool.execute(move || {
                if let Err(e) = store.record_metrics(&points) {
                    logger.log(&Event::StoreFailed { kind: "metrics", error: &e.to_string() });
                }
            });
        }

        // Enforce store retention once a minute.
        if last_prune.elapsed() >= Duration::from_secs(60) {
            last_prune = Instant::now();
            let store = Arc::clone(&store);
            let cutoff = chrono::Utc::now().timestamp() - retention_secs;
            pool.execute(move || {
                store.prune_metrics_before(cutoff);
                store.prune_alerts_before(cutoff);
            });
        }

        let slept_from = Instant::now();
        while !shutdown.load(Ordering::Relaxed) && slept_from.elapsed() < Duration::from_secs(1) {
            thread::sleep(Duration::from_millis(100));
        }
    }

    // ── Shutdown ─────────────────────────────────────────────────────────────
    logger.log(&Event::Info { message: "shutting down" });

    capture.stop_capture();
    if let Some(handle) = dispatcher {
        let _ = handle.join();
    }
    for task in collectors.iter_mut() {
        task.stop();
    }
    let _ = ticker.join();
    pool.shutdown();

    logger.log(&Event::SessionSummary {
        duration_secs:    session_start.elapsed().as_secs(),
        packets_captured: capture.packets_captured(),
        packets_dropped:  ring.dropped(),
        flows_tracked:    analyzer.flows_created(),
        alerts_emitted:   engine.fires(),
    });
}

/// Moves frames from the ring onto the worker pool, where each packet is
/// folded into the analyzer and its flow record forwarded to the store.
fn spawn_dispatcher(
    ring: Arc<FrameRing>,
    analyzer: Arc<PacketAnalyzer>,
    store: Arc<dyn StoreSink>,
    pool: &WorkerPool,
    logger: SharedLogger,
    shutdown: ShutdownFlag,
) -> thread::JoinHandle<()> {
    let submit = pool.handle();

    thread::spawn(move || {
        while !shutdown.load(Ordering::Relaxed) {
            let packet = match ring.pop_timeout(Duration::from_millis(100)) {
                Some(packet) => packet,
                None => continue,
            };

            let analyzer = Arc::clone(&analyzer);
            let store = Arc::clone(&store);
            let logger = Arc::clone(&logger);
            submit.execute(move || {
                let result = analyzer.ingest(&packet);

                if let Some(evicted) = result.evicted {
                    if let Err(e) = store.record_flow(&evicted) {
                        logger.log(&Event::StoreFailed { kind: "flow", error: &e.to_string() });
                    }
                }
                if let Err(e) = store.record_flow(&result.flow) {
                    logger.log(&Event::StoreFailed { kind: "flow", error: &e.to_string() });
                }
            });
        }
    })
}

/// CPU and memory warning/critical rules from the configured thresholds.
///
/// Metrics that are not registered yet (e.g. capture-only runs on an
/// unsupported platform) simply get no rule.
fn install_default_rules(engine: &AlertEngine, registry: &MetricRegistry, config: &Config) {
    let thresholds = [
        ("High CPU Usage (Warning)", "cpu.usage", config.get_u32("cpu_threshold_warning", 80), Severity::Warning),
        ("High CPU Usage (Critical)", "cpu.usage", config.get_u32("cpu_threshold_critical", 90), Severity::Critical),
        ("High Memory Usage (Warning)", "memory.usage_percent", config.get_u32("memory_threshold_warning", 75), Severity::Warning),
        ("High Memory Usage (Critical)", "memory.usage_percent", config.get_u32("memory_threshold_critical", 85), Severity::Critical),
    ];

    for (name, metric_name, threshold, severity) in thresholds {
        if let Some(metric) = registry.get(metric_name) {
            let condition = Condition::threshold(metric, Comparator::GreaterThan, f64::from(threshold));
            let _ = engine.create(name, condition, severity);
        }
    }
}

/// One `MetricPoint` per registered metric at the current wall clock.
fn snapshot_metrics(registry: &MetricRegistry) -> Vec<MetricPoint> {
    let now = chrono::Utc::now().timestamp();

    registry
        .list_names()
        .into_iter()
        .filter_map(|name| {
            registry.get(&name).map(|metric| MetricPoint {
                value:   metric.current(),
                ts_secs: now,
                name,
            })
        })
        .collect()
}
