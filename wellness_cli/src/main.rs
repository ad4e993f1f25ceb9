use chrono::{Datelike, NaiveDate};
use clap::{Parser, Subcommand};
use std::io::{self, Write};
use std::path::PathBuf;
use std::process::ExitCode;
use wellness_core::calendar::{CalendarView, MonthGrid};
use wellness_core::config::DataConfig;
use wellness_core::*;

#[derive(Parser)]
#[command(name = "wellness")]
#[command(about = "Exercise routine timer and adherence tracker", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Override data directory
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Override config file location
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log debug output to stderr
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// List the routine (default)
    List,

    /// Add an exercise to the end of the routine
    Add {
        #[arg(long, default_value = "")]
        name: String,

        #[arg(long, default_value = "")]
        description: String,

        /// Countdown length in seconds (minimum 5)
        #[arg(long, default_value_t = 60)]
        duration: u32,

        /// Make this a daily checkoff task instead of a timed exercise
        #[arg(long)]
        no_timer: bool,

        /// Timer cycles per pass
        #[arg(long, default_value_t = 1)]
        reps: u32,

        /// Passes per day to be on target
        #[arg(long, default_value_t = 1)]
        sets: u32,
    },

    /// Edit an exercise by its position (1-based)
    Edit {
        position: usize,

        #[arg(long)]
        name: Option<String>,

        #[arg(long)]
        description: Option<String>,

        #[arg(long)]
        duration: Option<u32>,

        /// true for a timed exercise, false for a checkoff task
        #[arg(long)]
        timer: Option<bool>,

        #[arg(long)]
        reps: Option<u32>,

        #[arg(long)]
        sets: Option<u32>,
    },

    /// Remove an exercise by its position (1-based)
    Remove { position: usize },

    /// Move an exercise from one position to another (1-based)
    Move { from: usize, to: usize },

    /// Walk through one pass of the routine
    Run {
        /// Do not wait in real time between ticks
        #[arg(long)]
        fast: bool,

        /// Start every timer and tick every task without prompting
        #[arg(long)]
        auto: bool,
    },

    /// Show the adherence calendar
    Calendar {
        /// Date to select (YYYY-MM-DD), defaults to today
        #[arg(long)]
        date: Option<NaiveDate>,

        /// Month to display (YYYY-MM), defaults to the selected date's month
        #[arg(long, value_parser = parse_month)]
        month: Option<(i32, u32)>,
    },

    /// Mark a checkoff task done (or undone) for a date
    Check {
        /// Exercise id or 1-based position
        exercise: String,

        #[arg(long)]
        date: Option<NaiveDate>,

        #[arg(long)]
        undo: bool,
    },

    /// Export the calendar history as CSV
    Export { path: PathBuf },

    /// Set the lead-in countdown in seconds (0 disables it)
    LeadIn { seconds: u32 },
}

fn parse_month(s: &str) -> std::result::Result<(i32, u32), String> {
    let (year, month) = s
        .split_once('-')
        .ok_or_else(|| format!("expected YYYY-MM, got {}", s))?;
    let year = year.parse().map_err(|_| format!("invalid year in {}", s))?;
    let month = month.parse().map_err(|_| format!("invalid month in {}", s))?;
    if !(1..=12).contains(&month) {
        return Err(format!("month out of range in {}", s));
    }
    Ok((year, month))
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    if cli.verbose {
        wellness_core::logging::init_with_level("debug");
    } else {
        wellness_core::logging::init();
    }

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::debug!("Command failed: {:?}", e);
            eprintln!("{}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    let config_path = cli.config.unwrap_or_else(Config::default_config_path);
    let mut config = if config_path.exists() {
        Config::load_from(&config_path)?
    } else {
        Config::default()
    };
    if let Some(dir) = cli.data_dir {
        config.data.data_dir = dir;
    }
    tracing::debug!("Using data directory {:?}", config.data.data_dir);

    let ticker = VirtualTicker::new();
    let mut engine = open_engine(&config.data, config.timer.lead_in_secs, &ticker);

    match cli.command.unwrap_or(Commands::List) {
        Commands::List => cmd_list(&engine),
        Commands::Add {
            name,
            description,
            duration,
            no_timer,
            reps,
            sets,
        } => {
            let id = engine.add_exercise(NewExercise {
                name,
                description,
                use_timer: !no_timer,
                duration,
                reps,
                sets,
                image: None,
            })?;
            println!("✓ Added exercise {}", id);
            Ok(())
        }
        Commands::Edit {
            position,
            name,
            description,
            duration,
            timer,
            reps,
            sets,
        } => {
            let index = to_index(&engine, position)?;
            engine.update_exercise(
                index,
                ExerciseUpdate {
                    name,
                    description,
                    use_timer: timer,
                    duration,
                    reps,
                    sets,
                    image: None,
                },
            );
            println!("✓ Updated exercise {}", position);
            Ok(())
        }
        Commands::Remove { position } => {
            let index = to_index(&engine, position)?;
            if let Some(removed) = engine.remove_exercise(index) {
                println!("✓ Removed {}", removed.name);
            }
            Ok(())
        }
        Commands::Move { from, to } => {
            let source = to_index(&engine, from)?;
            let target = to_index(&engine, to)?;
            if engine.move_exercise(source, target) {
                println!("✓ Moved exercise {} to position {}", from, to);
            }
            Ok(())
        }
        Commands::Run { fast, auto } => cmd_run(&mut engine, &ticker, fast, auto),
        Commands::Calendar { date, month } => {
            cmd_calendar(&engine, date, month);
            Ok(())
        }
        Commands::Check {
            exercise,
            date,
            undo,
        } => cmd_check(&mut engine, &exercise, date, undo),
        Commands::Export { path } => {
            let today = engine.today();
            let count = export_csv(engine.ledger(), engine.exercises(), today, &path)?;
            println!("✓ Exported {} days to {}", count, path.display());
            Ok(())
        }
        Commands::LeadIn { seconds } => {
            config.timer.lead_in_secs = seconds;
            config.save_to(&config_path)?;
            println!("✓ Lead-in set to {} seconds", seconds);
            Ok(())
        }
    }
}

fn open_engine(data: &DataConfig, lead_in_secs: u32, ticker: &VirtualTicker) -> RoutineEngine {
    let routine = Routine::load(Box::new(JsonFileStore::new(data.exercises_path())));
    let ledger = AdherenceLedger::load(Box::new(JsonFileStore::new(data.calendar_path())));
    RoutineEngine::new(routine, ledger, Box::new(SystemClock), Box::new(ticker.clone()))
        .with_lead_in(lead_in_secs)
}

fn to_index(engine: &RoutineEngine, position: usize) -> Result<usize> {
    if position == 0 || position > engine.exercises().len() {
        return Err(Error::Validation(format!(
            "No exercise at position {} (routine has {})",
            position,
            engine.exercises().len()
        )));
    }
    Ok(position - 1)
}

fn describe(exercise: &Exercise) -> String {
    if exercise.is_timed() {
        let mut text = format_clock(exercise.duration);
        if exercise.reps > 1 {
            text.push_str(&format!(" x{}", exercise.reps));
        }
        if exercise.sets > 1 {
            text.push_str(&format!(", {}/day", exercise.sets));
        }
        text
    } else {
        "No timer".to_string()
    }
}

fn cmd_list(engine: &RoutineEngine) -> Result<()> {
    if engine.exercises().is_empty() {
        println!("No exercises yet. Add one with `wellness add --name <NAME>`.");
        return Ok(());
    }
    for (i, exercise) in engine.exercises().iter().enumerate() {
        println!(
            "{:>2}. {:<45} {:>12}  [{}]",
            i + 1,
            exercise.name,
            describe(exercise),
            exercise.id
        );
    }
    Ok(())
}

enum Prompt {
    Go,
    Quit,
}

fn prompt(message: &str) -> Result<Prompt> {
    print!("{} ", message);
    io::stdout().flush()?;

    let mut input = String::new();
    let read = io::stdin().read_line(&mut input)?;
    if read == 0 || input.trim().eq_ignore_ascii_case("q") {
        return Ok(Prompt::Quit);
    }
    Ok(Prompt::Go)
}

fn cmd_run(engine: &mut RoutineEngine, ticker: &VirtualTicker, fast: bool, auto: bool) -> Result<()> {
    engine.begin_pass();
    let total = engine.exercises().len();
    if total == 0 {
        println!("The routine is empty - nothing to run.");
        return Ok(());
    }

    while let Some(index) = engine.current_index() {
        let Some(exercise) = engine.current_exercise().cloned() else {
            break;
        };
        println!();
        println!("── {:02} · {} ({} of {})", index + 1, exercise.name, index + 1, total);
        if !exercise.description.is_empty() {
            println!("   {}", exercise.description);
        }

        if exercise.is_timed() {
            while !engine.is_current_target_met() {
                if !auto {
                    if let Prompt::Quit = prompt("   Enter to start, 'q' to quit >")? {
                        engine.go_idle();
                        println!("Routine stopped.");
                        return Ok(());
                    }
                }
                engine.start();
                while engine.is_counting() {
                    if !fast {
                        std::thread::sleep(TICK_INTERVAL);
                    }
                    engine.pump(ticker, TICK_INTERVAL);
                    if !fast {
                        print!("\r   {:<8}", engine.timer_display());
                        io::stdout().flush()?;
                    }
                }
                if !fast {
                    println!();
                }
                println!(
                    "   ✓ Rep {} / {}",
                    engine.reps_for(&exercise.id),
                    exercise.target_reps()
                );
            }
        } else if !engine.checkoff_completed() {
            if !auto {
                if let Prompt::Quit = prompt("   Enter to mark done today, 'q' to quit >")? {
                    engine.go_idle();
                    println!("Routine stopped.");
                    return Ok(());
                }
            }
            engine.toggle_checkoff();
            println!("   ✓ {}", engine.timer_display());
        } else {
            println!("   ✓ Already completed today");
        }

        match engine.advance() {
            AdvanceOutcome::Moved(_) => continue,
            AdvanceOutcome::RoutineComplete { session_logged } => {
                println!();
                println!("✓ Routine complete!");
                if session_logged {
                    let today = engine.today();
                    let summary = engine.summarize(today);
                    println!("  Sessions logged today: {}", summary.timed_sessions_logged);
                }
                engine.go_idle();
            }
            AdvanceOutcome::NotReady => {
                engine.go_idle();
                println!("Routine stopped before every target was met.");
            }
        }
    }

    Ok(())
}

fn status_mark(status: DayStatus) -> char {
    match status {
        DayStatus::Green => '+',
        DayStatus::Yellow => '~',
        DayStatus::Red => '!',
        DayStatus::None => ' ',
    }
}

fn print_grid(grid: &MonthGrid) {
    println!(" Su   Mo   Tu   We   Th   Fr   Sa");
    let mut column = grid.leading_blanks;
    print!("{}", "     ".repeat(column as usize));
    for cell in &grid.days {
        let (open, close) = if cell.is_selected {
            ('[', ']')
        } else if cell.is_today {
            ('(', ')')
        } else {
            (' ', ' ')
        };
        print!("{}{:>2}{}{} ", open, cell.date.day(), status_mark(cell.status), close);
        column += 1;
        if column % 7 == 0 {
            println!();
        }
    }
    if column % 7 != 0 {
        println!();
    }
    println!("  + on target   ~ partial   ! missed");
}

fn cmd_calendar(engine: &RoutineEngine, date: Option<NaiveDate>, month: Option<(i32, u32)>) {
    let today = engine.today();
    let mut view = CalendarView::new(today);
    if let Some(date) = date {
        view.select_date(date);
        view.show_month(date.year(), date.month());
    }
    if let Some((year, month)) = month {
        view.show_month(year, month);
    }

    let grid = view.month_grid(engine.ledger(), engine.exercises(), today);
    println!("{}", view.month_label());
    print_grid(&grid);

    let summary = view.selected_summary(engine.ledger(), engine.exercises());
    println!();
    println!("  Date                 {}", view.selected());
    println!(
        "  Exercises On Target  {} / {}",
        summary.exercises_on_target, summary.total_exercises
    );
    println!("  Timed Sessions       {}", summary.timed_sessions_logged);
    println!("  Exercise Sessions    {}", summary.total_exercise_sessions);
    println!("  Status               {}", engine.status(view.selected()));
    println!();

    for row in view.exercise_rows(engine.ledger(), engine.exercises()) {
        let meta = if row.timed {
            format!(
                "Timer exercise · target {} session{}/day",
                row.target,
                if row.target > 1 { "s" } else { "" }
            )
        } else {
            "No timer · complete once per day".to_string()
        };
        println!(
            "  {} {:<45} {:<40} {} / {}",
            if row.done { '✓' } else { '·' },
            row.name,
            meta,
            row.sessions,
            row.target
        );
    }
}

fn cmd_check(
    engine: &mut RoutineEngine,
    exercise: &str,
    date: Option<NaiveDate>,
    undo: bool,
) -> Result<()> {
    let index = match exercise.parse::<usize>() {
        Ok(position) => to_index(engine, position)?,
        Err(_) => engine
            .position(exercise)
            .ok_or_else(|| Error::Validation(format!("Unknown exercise {}", exercise)))?,
    };

    let target = engine.exercises()[index].clone();
    if target.is_timed() {
        return Err(Error::Validation(format!(
            "{} is a timer exercise; complete it with `wellness run`",
            target.name
        )));
    }

    let date = date.unwrap_or_else(|| engine.today());
    engine
        .ledger_mut()
        .set_checkoff_completed(date, &target.id, !undo);
    println!(
        "✓ {} marked {} for {}",
        target.name,
        if undo { "incomplete" } else { "done" },
        date
    );
    Ok(())
}
