//! lessoncache - command-line front-end for the prompt-engineering learning
//! platform.
//!
//! Each invocation opens one session: it loads the saved sign-in, builds a
//! `SessionContext` and runs a single command against it.

use std::io::{self, Write};
use std::sync::Arc;

use anyhow::{anyhow, bail, Context, Result};
use futures::StreamExt;
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use lessoncache_core::auth::SessionData;
use lessoncache_core::cache::keys;
use lessoncache_core::models::{Category, DashboardData};
use lessoncache_core::progress::SectionVisibility;
use lessoncache_core::{
    ApiClient, Config, LessonError, LessonProgressTracker, SessionContext, SessionStore,
};

/// Directory for the optional rolling log file
const LOG_DIR_VAR: &str = "LESSONCACHE_LOG_DIR";

/// Viewport height used when a whole lesson is printed at once
const PRINTED_VIEWPORT: f64 = 2.0;

const USAGE: &str = "\
Usage: lessoncache <command> [args]

Commands:
  login <user-id> <token> [--name NAME] [--email EMAIL]
  logout
  health
  categories
  lessons <category-id>
  lesson <lesson-id>
  dashboard
  playground <prompt...>
  submit <lesson-id> <section-id> <prompt...>
  complete <lesson-id>";

#[derive(Debug, PartialEq)]
enum Command {
    Login {
        user_id: String,
        token: String,
        name: Option<String>,
        email: Option<String>,
    },
    Logout,
    Health,
    Categories,
    Lessons(i64),
    Lesson(i64),
    Dashboard,
    Playground(String),
    Submit {
        lesson_id: i64,
        section_id: i64,
        prompt: String,
    },
    Complete(i64),
}

impl Command {
    fn parse(args: &[String]) -> Result<Self> {
        let Some((name, rest)) = args.split_first() else {
            bail!("{}", USAGE);
        };
        let command = match name.as_str() {
            "login" => parse_login(rest)?,
            "logout" => Command::Logout,
            "health" => Command::Health,
            "categories" => Command::Categories,
            "lessons" => Command::Lessons(parse_id(rest.first(), "category-id")?),
            "lesson" => Command::Lesson(parse_id(rest.first(), "lesson-id")?),
            "dashboard" => Command::Dashboard,
            "playground" => Command::Playground(rest.join(" ")),
            "submit" => Command::Submit {
                lesson_id: parse_id(rest.first(), "lesson-id")?,
                section_id: parse_id(rest.get(1), "section-id")?,
                prompt: rest.get(2..).map(|words| words.join(" ")).unwrap_or_default(),
            },
            "complete" => Command::Complete(parse_id(rest.first(), "lesson-id")?),
            other => bail!("Unknown command '{}'\n\n{}", other, USAGE),
        };
        Ok(command)
    }
}

fn parse_id(arg: Option<&String>, what: &str) -> Result<i64> {
    let arg = arg.ok_or_else(|| anyhow!("Missing <{}>\n\n{}", what, USAGE))?;
    arg.parse()
        .with_context(|| format!("<{}> must be a number, got '{}'", what, arg))
}

fn parse_login(args: &[String]) -> Result<Command> {
    let mut positional = Vec::new();
    let mut name = None;
    let mut email = None;
    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--name" => name = iter.next().cloned(),
            "--email" => email = iter.next().cloned(),
            _ => positional.push(arg.clone()),
        }
    }
    let [user_id, token] = <[String; 2]>::try_from(positional)
        .map_err(|_| anyhow!("login expects <user-id> <token>\n\n{}", USAGE))?;
    Ok(Command::Login {
        user_id,
        token,
        name,
        email,
    })
}

/// Initialize the tracing subscriber for logging.
///
/// Returns the file writer's guard, which must live until exit.
fn init_tracing() -> Option<WorkerGuard> {
    // Use RUST_LOG env var to control log level (e.g., RUST_LOG=debug)
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    let (file_layer, guard) = match std::env::var(LOG_DIR_VAR) {
        Ok(dir) if !dir.is_empty() => {
            let appender = tracing_appender::rolling::daily(dir, "lessoncache.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            (Some(fmt::layer().with_writer(writer).with_ansi(false)), Some(guard))
        }
        _ => (None, None),
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(file_layer)
        .with(filter)
        .init();
    guard
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();
    let _log_guard = init_tracing();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let command = Command::parse(&args)?;

    let mut config = Config::load()?;
    let endpoints = config.endpoints()?;
    info!(api_url = %endpoints.api_url, environment = ?endpoints.environment, "lessoncache starting");

    let store = Arc::new(SessionStore::new(Config::data_dir()?));
    store.load()?;
    let context = SessionContext::new(ApiClient::new(&endpoints.api_url)?, store.clone());

    match command {
        Command::Login {
            user_id,
            token,
            name,
            email,
        } => {
            let mut data = SessionData::new(user_id.clone(), token);
            data.display_name = name;
            data.email = email;
            store.sign_in(data)?;
            config.last_user_id = Some(user_id.clone());
            config.save()?;

            let identity = context.identity().identity().await;
            let outcome = context.profile_sync().sync_if_needed(identity.as_ref()).await;
            info!(?outcome, "Profile sync after login");
            println!("Signed in as {}", user_id);
        }
        Command::Logout => {
            store.sign_out()?;
            config.last_user_id = None;
            config.save()?;
            println!("Signed out");
        }
        Command::Health => {
            let health = context.api().check_health().await?;
            println!("{}", health.status);
        }
        Command::Categories => show_categories(&context).await?,
        Command::Lessons(category_id) => {
            let lessons = context.resources().lessons_by_category(category_id).await?;
            for lesson in lessons.iter() {
                println!(
                    "{:>5}  {:<40} {:>3} min  {}",
                    lesson.id,
                    lesson.title,
                    lesson.estimated_duration,
                    lesson.progress_status.as_deref().unwrap_or("not_started")
                );
            }
        }
        Command::Lesson(lesson_id) => show_lesson(&context, lesson_id).await?,
        Command::Dashboard => show_dashboard(&context).await?,
        Command::Playground(prompt) => {
            if prompt.trim().is_empty() {
                bail!("Nothing to run: the prompt is empty");
            }
            let api = context.resources().api().await;
            let mut stream = Box::pin(api.run_prompt_playground(&prompt).await?);
            let mut stdout = io::stdout();
            while let Some(chunk) = stream.next().await {
                write!(stdout, "{}", chunk?)?;
                stdout.flush()?;
            }
            writeln!(stdout)?;
        }
        Command::Submit {
            lesson_id,
            section_id,
            prompt,
        } => {
            let lesson = context.resources().lesson_with_content(lesson_id).await?;
            let mut tracker = LessonProgressTracker::from_lesson(&lesson);
            let result = context
                .resources()
                .submit_exercise(&mut tracker, section_id, &prompt)
                .await?;
            let verdict = if result.is_passing() { "passed" } else { "not yet" };
            println!("Score {} ({})\n{}", result.score, verdict, result.feedback);
            println!(
                "{} exercise(s) remaining in this lesson",
                tracker.remaining_exercises()
            );
        }
        Command::Complete(lesson_id) => {
            let lesson = context.resources().lesson_with_content(lesson_id).await?;
            let mut tracker = LessonProgressTracker::from_lesson(&lesson);
            mark_printed(&mut tracker, &lesson.content_sections.iter().map(|s| s.id).collect::<Vec<_>>());

            match context.resources().complete_lesson(&tracker).await {
                Ok(category_id) => println!(
                    "Lesson {} complete. Next: lessoncache lessons {}",
                    lesson_id, category_id
                ),
                Err(LessonError::ExercisesIncomplete { remaining }) => {
                    bail!("{} exercise(s) still need a passing score", remaining)
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    Ok(())
}

/// Every section of a printed lesson has been on screen.
fn mark_printed(tracker: &mut LessonProgressTracker, section_ids: &[i64]) {
    let entries: Vec<SectionVisibility> = section_ids
        .iter()
        .map(|&section_id| SectionVisibility {
            section_id,
            top: 0.0,
            bottom: PRINTED_VIEWPORT,
        })
        .collect();
    tracker.on_visibility(&entries, PRINTED_VIEWPORT);
}

async fn show_categories(context: &SessionContext) -> Result<()> {
    let categories = context.resources().categories().await?;
    for category in categories.iter() {
        println!(
            "{:>5}  {:<30} {:>2}/{:<2} lessons  {}",
            category.id,
            category.name,
            category.completed_lessons.unwrap_or(0),
            category.lesson_count.unwrap_or(0),
            category.difficulty_level
        );
    }
    if let Some(entry) = context.queries().get_entry::<Vec<Category>>(&keys::categories()) {
        print_freshness(entry.age_display(), entry.is_stale());
    }
    Ok(())
}

async fn show_lesson(context: &SessionContext, lesson_id: i64) -> Result<()> {
    let lesson = context.resources().lesson_with_content(lesson_id).await?;
    let mut tracker = LessonProgressTracker::from_lesson(&lesson);
    let ids: Vec<i64> = lesson.content_sections.iter().map(|s| s.id).collect();
    mark_printed(&mut tracker, &ids);

    println!("{}\n{}\n", lesson.title, lesson.description);
    for outline in tracker.outline() {
        let mark = if outline.completed { "x" } else { " " };
        println!("[{}] {:>4}  {}", mark, outline.id, outline.title);
        let section = lesson.content_sections.iter().find(|s| s.id == outline.id);
        if let Some(scenario) = section.and_then(|s| s.exercise_scenario()) {
            println!("        Exercise: {}", scenario);
        } else if let Some(text) = section.and_then(|s| s.text()) {
            for line in text.lines() {
                println!("        {}", line);
            }
        }
    }
    println!("\nProgress: {}%", tracker.progress_percentage());
    if !tracker.can_complete_lesson() {
        println!(
            "{} exercise(s) to pass before the lesson can be completed",
            tracker.remaining_exercises()
        );
    }
    Ok(())
}

async fn show_dashboard(context: &SessionContext) -> Result<()> {
    let dashboard = context.resources().dashboard().await?;
    let stats = &dashboard.stats;
    println!(
        "Lessons: {}/{} ({}%)",
        stats.lessons_completed,
        stats.total_lessons,
        stats.completion_percentage()
    );
    println!("Practice sessions: {}", stats.practice_sessions);
    println!("Average practice score: {:.1}", stats.average_practice_score);
    println!("Learning streak: {} day(s)", stats.current_learning_streak);
    for lesson in &dashboard.recommended_lessons {
        println!("  -> {}", lesson.title);
    }
    if let Some(entry) = context.queries().get_entry::<DashboardData>(&keys::dashboard()) {
        print_freshness(entry.age_display(), entry.is_stale());
    }
    Ok(())
}

fn print_freshness(age: String, stale: bool) {
    if stale {
        println!("\nUpdated {} (stale, refreshing on next read)", age);
    } else {
        println!("\nUpdated {}", age);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(line: &str) -> Vec<String> {
        line.split_whitespace().map(String::from).collect()
    }

    #[test]
    fn test_parse_login_with_flags() {
        let command = Command::parse(&args("login u1 tok --name Ada --email ada@example.com"))
            .expect("parse");
        assert_eq!(
            command,
            Command::Login {
                user_id: "u1".into(),
                token: "tok".into(),
                name: Some("Ada".into()),
                email: Some("ada@example.com".into()),
            }
        );
    }

    #[test]
    fn test_parse_submit_joins_prompt() {
        let command = Command::parse(&args("submit 42 7 Summarise the meeting notes")).expect("parse");
        assert_eq!(
            command,
            Command::Submit {
                lesson_id: 42,
                section_id: 7,
                prompt: "Summarise the meeting notes".into(),
            }
        );
    }

    #[test]
    fn test_parse_rejects_bad_input() {
        assert!(Command::parse(&args("lesson abc")).is_err());
        assert!(Command::parse(&args("lessons")).is_err());
        assert!(Command::parse(&args("login only-user")).is_err());
        assert!(Command::parse(&args("frobnicate")).is_err());
        assert!(Command::parse(&[]).is_err());
    }
}
