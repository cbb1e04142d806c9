use std::io;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use chrono::Local;
use clap::{Parser, Subcommand};
use crossterm::{
    event::Event,
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Layout},
    Terminal,
};
use tracing::{info, warn};

use qwiic_monitor::app::{App, Mode, View};
use qwiic_monitor::data::duration::parse_duration;
use qwiic_monitor::data::{SensorKind, StatusLevel};
use qwiic_monitor::gps::{analyze_file, GpsFix, GpsReader, GpsSession, PlaybackManager};
use qwiic_monitor::logging::{diagnostics, DataLogger};
use qwiic_monitor::poller::{PollerHandle, SensorPoller};
use qwiic_monitor::sensors::{I2cBusProvider, SensorSuite};
use qwiic_monitor::settings::{Settings, DEFAULT_SETTINGS_FILE};
use qwiic_monitor::source::{Message, MessageSink};
use qwiic_monitor::{events, ui, ChannelSource, DataSource};

const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(2);

#[derive(Parser, Debug)]
#[command(name = "qwiic-monitor")]
#[command(about = "Dashboard and logger for Qwiic I2C sensors and u-blox GPS receivers")]
struct Args {
    /// Settings file (JSON); created on first save
    #[arg(short, long, default_value = DEFAULT_SETTINGS_FILE)]
    settings: PathBuf,

    /// Print readings to stdout instead of running the TUI
    #[arg(long)]
    headless: bool,

    /// Stop after this long in headless mode (e.g., "30s", "10m")
    #[arg(long, requires = "headless")]
    duration: Option<String>,

    /// Use generated data instead of hardware
    #[arg(long)]
    mock: bool,

    /// Seed for generated data
    #[arg(long)]
    seed: Option<u64>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone)]
enum Command {
    /// Qwiic sensor dashboard (default)
    Sensors,
    /// GPS dashboard
    Gps {
        /// Serial port of the receiver
        #[arg(long)]
        port: Option<String>,
        /// Baud rate of the receiver
        #[arg(long)]
        baud: Option<u32>,
        /// Replay a recorded CSV or JSONL track
        #[arg(long)]
        playback: Option<PathBuf>,
    },
    /// Analyze a recorded trip and print the results
    Analyze {
        file: PathBuf,
        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },
    /// Archive the sensor logs now and exit
    Archive,
}

fn main() -> Result<()> {
    let args = Args::parse();
    let command = args.command.clone().unwrap_or(Command::Sensors);

    let (mut settings, load_error) = match Settings::load(&args.settings) {
        Ok(settings) => (settings, None),
        Err(e) => (Settings::default(), Some(e)),
    };

    let console = args.headless || matches!(command, Command::Analyze { .. } | Command::Archive);
    if let Err(e) = diagnostics::init(&settings.diagnostics, console) {
        eprintln!("Diagnostics logging disabled: {:#}", e);
    }
    if let Some(e) = load_error {
        warn!("{:#}; using default settings", e);
    }
    info!("Starting qwiic-monitor ({:?})", command);

    if args.mock {
        settings.sensors.mock_data_enabled = true;
    }
    if args.seed.is_some() {
        settings.sensors.mock_seed = args.seed;
    }

    match command {
        Command::Analyze { file, json } => run_analyze(&file, json, &settings),
        Command::Archive => run_archive(&settings),
        Command::Sensors => run_sensors(&args, settings),
        Command::Gps { port, baud, playback } => {
            if let Some(port) = port {
                settings.gps.port = port;
            }
            if let Some(baud) = baud {
                settings.gps.baud_rate = baud;
            }
            if playback.is_some() {
                settings.gps.playback_file = playback;
            }
            run_gps(&args, settings)
        }
    }
}

fn run_analyze(file: &Path, json: bool, settings: &Settings) -> Result<()> {
    let analysis = analyze_file(file, &settings.gps.thresholds)
        .with_context(|| format!("Failed to analyze {}", file.display()))?;
    if json {
        println!("{}", serde_json::to_string_pretty(&analysis)?);
    } else {
        println!("Trip analysis: {}", file.display());
        for (label, value) in analysis.describe(settings.gps.unit_preference) {
            println!("  {:<24}{}", label, value);
        }
    }
    Ok(())
}

fn run_archive(settings: &Settings) -> Result<()> {
    let (mut logger, _) = DataLogger::new(&settings.sensors, Local::now());
    match logger.archive_now(Local::now())? {
        Some(path) => println!("Logs archived to {}", path.display()),
        None => println!("No sensor logs to archive"),
    }
    Ok(())
}

fn start_poller(settings: &Settings, sink: MessageSink) -> Result<PollerHandle> {
    let config = &settings.sensors;
    let suite = SensorSuite::new(
        Box::new(I2cBusProvider::new(config.i2c_bus.to_string_lossy())),
        config.mock_data_enabled,
        config.mock_seed,
    );
    let (logger, notices) = DataLogger::new(config, Local::now());
    for (level, text) in notices {
        sink.status(level, text);
    }
    let interval = Duration::from_secs(config.read_interval_secs);
    SensorPoller::spawn(suite, logger, interval, sink).context("Failed to start sensor thread")
}

/// Live reader (serial or mock) or playback, per the GPS settings.
fn start_gps(
    settings: &Settings,
    mock: bool,
    sink: MessageSink,
) -> Result<(Option<GpsReader>, Option<PlaybackManager>)> {
    if let Some(file) = &settings.gps.playback_file {
        let mut playback = PlaybackManager::new(sink.clone());
        match playback.load_file(file) {
            Ok(count) => sink.status(
                StatusLevel::Success,
                format!("Loaded {} points from {}", count, file.display()),
            ),
            Err(e) => sink.status(StatusLevel::Danger, format!("Cannot load {}: {}", file.display(), e)),
        }
        return Ok((None, Some(playback)));
    }

    let reader = if mock {
        GpsReader::spawn_mock(settings.sensors.mock_seed, sink)?
    } else {
        GpsReader::spawn_serial(&settings.gps.port, settings.gps.baud_rate, sink)?
    };
    Ok((Some(reader), None))
}

fn run_sensors(args: &Args, settings: Settings) -> Result<()> {
    let description = format!("i2c:{}", settings.sensors.i2c_bus.display());
    let (sink, source) = ChannelSource::create(&description);
    let mut poller = start_poller(&settings, sink)?;

    if args.headless {
        let result = run_headless(source, args.duration.as_deref(), |message| {
            print_message(&message);
        });
        poller.stop(SHUTDOWN_TIMEOUT);
        return result;
    }

    let mut app = App::new(Mode::Sensors, Box::new(source), settings, args.settings.clone());
    app.attach_poller(poller);
    run_tui(&mut app)
}

fn run_gps(args: &Args, settings: Settings) -> Result<()> {
    let description = format!("{} @ {}", settings.gps.port, settings.gps.baud_rate);
    let (sink, source) = ChannelSource::create(&description);
    let (mut reader, mut playback) = start_gps(&settings, settings.sensors.mock_data_enabled, sink)?;

    if args.headless {
        let mut session = GpsSession::new(&settings.gps);
        if let Some(playback) = playback.as_mut() {
            playback.play();
        }
        let result = run_headless(source, args.duration.as_deref(), |message| {
            let notices = match &message {
                Message::Fix(fix) => session.process(fix.clone(), Local::now()),
                Message::ReplayFix(fix) => session.process_replay(fix.clone(), Local::now()),
                Message::Nmea(line) => session.push_nmea(line.clone()).into_iter().collect(),
                _ => Vec::new(),
            };
            print_message(&message);
            for (level, text) in notices {
                println!("[{}] {}", level.label(), text);
            }
        });
        if let Some(reader) = reader.as_mut() {
            reader.stop(SHUTDOWN_TIMEOUT);
        }
        session.close();
        return result;
    }

    let mut app = App::new(Mode::Gps, Box::new(source), settings, args.settings.clone());
    if let Some(reader) = reader {
        app.attach_gps_reader(reader);
    }
    if let Some(playback) = playback {
        app.attach_playback(playback);
    }
    run_tui(&mut app)
}

/// Drain `source` until Ctrl-C or the optional duration elapses.
fn run_headless(
    mut source: ChannelSource,
    duration: Option<&str>,
    mut handle: impl FnMut(Message),
) -> Result<()> {
    let limit = duration.map(parse_duration).transpose()?;
    let started = Instant::now();
    let rt = tokio::runtime::Runtime::new()?;

    rt.block_on(async {
        let ctrl_c = tokio::signal::ctrl_c();
        tokio::pin!(ctrl_c);
        loop {
            while let Some(message) = source.poll() {
                handle(message);
            }
            if let Some(err) = source.error() {
                warn!("Stopping: {}", err);
                break;
            }
            if limit.is_some_and(|limit| started.elapsed() >= limit) {
                break;
            }
            tokio::select! {
                _ = &mut ctrl_c => {
                    info!("Interrupted");
                    break;
                }
                _ = tokio::time::sleep(Duration::from_millis(100)) => {}
            }
        }
    });
    Ok(())
}

fn print_message(message: &Message) {
    match message {
        Message::Reading(reading) => {
            println!("{}", reading.timestamp.format("%Y-%m-%d %H:%M:%S"));
            for kind in SensorKind::ALL {
                let values: Vec<String> = kind
                    .metrics()
                    .iter()
                    .map(|m| format!("{}={}", m.key, m.format(reading.value(kind, m.key))))
                    .collect();
                println!("  {:<10} {}", kind.name(), values.join(" "));
            }
        }
        Message::Status(status) => println!("[{}] {}", status.level.label(), status.text),
        Message::Fix(fix) => println!("fix    {}", describe_fix(fix)),
        Message::ReplayFix(fix) => println!("replay {}", describe_fix(fix)),
        Message::Nmea(_) => {}
    }
}

fn describe_fix(fix: &GpsFix) -> String {
    format!(
        "{:.6},{:.6} {:.1} m/s {} ({} SV)",
        fix.lat,
        fix.lon,
        fix.ground_speed,
        fix.fix_type_label(),
        fix.num_sv
    )
}

/// Run the TUI until the user quits, then shut the workers down.
fn run_tui(app: &mut App) -> Result<()> {
    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    // Setup panic hook to restore terminal
    let original_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |panic| {
        let _ = disable_raw_mode();
        let _ = execute!(io::stdout(), LeaveAlternateScreen);
        original_hook(panic);
    }));

    if let Some(playback) = app.playback.as_mut() {
        playback.play();
    }
    app.reload_data();

    let result = run_app(&mut terminal, app);

    // Restore terminal
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    app.shutdown();
    result
}

fn run_app(terminal: &mut Terminal<CrosstermBackend<io::Stdout>>, app: &mut App) -> Result<()> {
    // Minimum terminal size for usable display
    const MIN_WIDTH: u16 = 60;
    const MIN_HEIGHT: u16 = 12;

    while app.running {
        terminal.draw(|frame| {
            let area = frame.area();

            if area.width < MIN_WIDTH || area.height < MIN_HEIGHT {
                let msg = format!(
                    "Terminal too small: {}x{}\nMinimum: {}x{}\n\nResize to continue",
                    area.width, area.height, MIN_WIDTH, MIN_HEIGHT
                );
                let paragraph = ratatui::widgets::Paragraph::new(msg)
                    .alignment(ratatui::layout::Alignment::Center)
                    .style(ratatui::style::Style::default().fg(ratatui::style::Color::Yellow));
                let centered = ratatui::layout::Rect::new(0, (area.height / 2).saturating_sub(2), area.width, 5.min(area.height));
                frame.render_widget(paragraph, centered);
                return;
            }

            let chunks = Layout::vertical([
                Constraint::Length(1), // Header bar
                Constraint::Length(1), // Tabs
                Constraint::Min(8),    // Content
                Constraint::Length(1), // Status bar
            ])
            .split(area);

            ui::common::render_header(frame, app, chunks[0]);
            ui::common::render_tabs(frame, app, chunks[1]);

            match app.current_view {
                View::Dashboard => ui::dashboard::render(frame, app, chunks[2]),
                View::Trends => ui::trends::render(frame, app, chunks[2]),
                View::Gps => ui::gps::render(frame, app, chunks[2]),
                View::Trips => ui::trips::render(frame, app, chunks[2]),
                View::Events => ui::events::render(frame, app, chunks[2]),
            }

            ui::common::render_status_bar(frame, app, chunks[3]);

            if app.analysis.is_some() {
                ui::trips::render_analysis(frame, app, area);
            }
            if app.show_help {
                ui::common::render_help(frame, app, area);
            }
        })?;

        if let Some(Event::Key(key)) = events::poll_event(Duration::from_millis(100))? {
            events::handle_key_event(app, key);
        }

        app.reload_data();
    }

    Ok(())
}
