use anyhow::{Context, Result, anyhow, bail};
use std::env;
use std::fs::OpenOptions;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use storyapp::cache::PLACEHOLDER_ID;
use storyapp::config::Config;
use storyapp::context::{AppContext, SharedContext, StandardContext};
use storyapp::model::{GeoBounds, LocationFilter, Story, UploadRequest};
use storyapp::paging::{FeedSnapshot, PagerState};
use storyapp::{NetworkResult, StoryApp};

#[tokio::main]
async fn main() -> Result<()> {
    let mut args: Vec<String> = env::args().skip(1).collect();

    if args.is_empty() || matches!(args[0].as_str(), "--help" | "-h" | "help") {
        print_help();
        return Ok(());
    }

    let root = take_option(&mut args, &["--root", "-r"]).map(PathBuf::from);
    if args.is_empty() {
        print_help();
        return Ok(());
    }
    let ctx: SharedContext = Arc::new(StandardContext::new(root));
    let config = Config::load_or_default(ctx.as_ref())?;
    init_logging(ctx.as_ref(), &config);

    let app = StoryApp::new(ctx, config)?;
    let command = args.remove(0);
    match command.as_str() {
        "register" => {
            let [name, email, password] = positional::<3>(&args, "register <name> <email> <password>")?;
            let outcome = app.auth().register(&name, &email, &password).await;
            report(outcome, |o| println!("{}", o.message))
        }
        "login" => {
            let [email, password] = positional::<2>(&args, "login <email> <password>")?;
            let outcome = app.auth().login(&email, &password).await;
            report(outcome, |o| println!("{} (logged in as {})", o.message, o.name))
        }
        "logout" => {
            app.auth().logout().await;
            println!("Logged out");
            Ok(())
        }
        "whoami" => {
            let session = app.session().current();
            match (session.is_logged_in(), session.user_name, session.user_id) {
                (true, Some(name), Some(id)) => println!("{} ({})", name, id),
                (true, _, _) => println!("Logged in"),
                (false, _, _) => println!("Not logged in"),
            }
            Ok(())
        }
        "feed" => {
            let pages = parse_option(&mut args, "--pages")?.unwrap_or(1u32).max(1);
            run_feed(&app, pages).await
        }
        "stories" => {
            let location = take_flag(&mut args, "--location");
            let page = parse_option(&mut args, "--page")?.unwrap_or(app.config().initial_page_index);
            let size = parse_option(&mut args, "--size")?.unwrap_or(app.config().page_size);
            let filter = if location {
                LocationFilter::WithLocation
            } else {
                LocationFilter::Any
            };
            let outcome = app.stories().get_stories(page, size, filter).await;
            report(outcome, |p| {
                for story in &p.stories {
                    print_story(story);
                }
                if !p.has_next() {
                    println!("(end of feed)");
                }
            })
        }
        "map" => {
            let limit = parse_option(&mut args, "--limit")?.unwrap_or(app.config().map_story_limit);
            let outcome = app.stories().stories_with_location(limit).await;
            report(outcome, |stories| {
                for story in &stories {
                    print_story(story);
                }
                if let Some(bounds) = GeoBounds::from_stories(&stories) {
                    let (lat, lon) = bounds.center();
                    println!(
                        "Bounds: S {:.4} W {:.4} N {:.4} E {:.4} (center {:.4}, {:.4})",
                        bounds.south, bounds.west, bounds.north, bounds.east, lat, lon
                    );
                }
            })
        }
        "upload" => {
            let lat: Option<f64> = parse_option(&mut args, "--lat")?;
            let lon: Option<f64> = parse_option(&mut args, "--lon")?;
            let [path, description] = positional::<2>(&args, "upload <photo> <description>")?;
            let image = std::fs::read(&path).with_context(|| format!("Failed to read {}", path))?;
            let file_name = PathBuf::from(&path)
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| "photo.jpg".to_string());
            let mut request = UploadRequest::new(image, description).with_file_name(file_name);
            request.lat = lat;
            request.lon = lon;
            let outcome = app.stories().upload_story(request).await;
            report(outcome, |o| println!("{}", o.message))
        }
        "widget" => {
            let widget = app.widget().clone();
            let stories = tokio::task::spawn_blocking(move || widget.load()).await??;
            for story in &stories {
                if story.id == PLACEHOLDER_ID {
                    println!("{}", story.description);
                } else {
                    print_story(story);
                }
            }
            Ok(())
        }
        other => {
            print_help();
            bail!("Unknown command '{}'", other)
        }
    }
}

fn init_logging(ctx: &dyn AppContext, config: &Config) {
    use simplelog::{ColorChoice, CombinedLogger, LevelFilter, SharedLogger, TermLogger, TerminalMode, WriteLogger};

    let level = LevelFilter::from_str(&config.log_level).unwrap_or(LevelFilter::Info);
    let log_config = simplelog::ConfigBuilder::new().build();

    let mut loggers: Vec<Box<dyn SharedLogger>> = vec![TermLogger::new(
        LevelFilter::Warn.min(level),
        log_config.clone(),
        TerminalMode::Stderr,
        ColorChoice::Auto,
    )];
    if let Some(path) = ctx.get_log_path()
        && let Ok(file) = OpenOptions::new().create(true).append(true).open(&path)
    {
        loggers.push(WriteLogger::new(level, log_config, file));
    }
    // Fails only if a logger is already installed.
    let _ = CombinedLogger::init(loggers);
}

fn report<T>(outcome: NetworkResult<T>, on_success: impl FnOnce(T)) -> Result<()> {
    match outcome {
        NetworkResult::Success(value) => {
            on_success(value);
            Ok(())
        }
        NetworkResult::Error(message) => Err(anyhow!(message)),
        NetworkResult::Loading => Err(anyhow!("Request did not complete")),
    }
}

fn settled_page(state: &PagerState) -> Option<u32> {
    match state {
        PagerState::Loaded { page }
        | PagerState::Exhausted { page }
        | PagerState::Error { page, .. } => Some(*page),
        _ => None,
    }
}

async fn run_feed(app: &StoryApp, pages: u32) -> Result<()> {
    let mut feed = app.feed();
    let mut last: Option<u32> = None;
    let mut loaded = 0;

    let snapshot: FeedSnapshot<Story> = loop {
        let previous = last;
        let snap = feed
            .wait_for(|s| settled_page(&s.state) > previous)
            .await
            .ok_or_else(|| anyhow!("Feed stopped unexpectedly"))?;
        last = settled_page(&snap.state);
        loaded += 1;
        let more = match &snap.state {
            PagerState::Error { message, .. } => bail!("{}", message),
            PagerState::Loaded { .. } => loaded < pages,
            _ => false,
        };
        if !more {
            break snap;
        }
        feed.load_more();
    };
    feed.close();

    for story in &snapshot.items {
        print_story(story);
    }
    if !snapshot.has_next {
        println!("(end of feed)");
    }
    Ok(())
}

fn print_story(story: &Story) {
    let when = story
        .created_at_utc()
        .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_default();
    match story.coordinates() {
        Some((lat, lon)) => println!(
            "{}  {}  {}: {} [{:.4}, {:.4}]",
            story.id, when, story.name, story.description, lat, lon
        ),
        None => println!("{}  {}  {}: {}", story.id, when, story.name, story.description),
    }
}

fn take_flag(args: &mut Vec<String>, flag: &str) -> bool {
    if let Some(pos) = args.iter().position(|a| a == flag) {
        args.remove(pos);
        return true;
    }
    false
}

fn take_option(args: &mut Vec<String>, names: &[&str]) -> Option<String> {
    let pos = args.iter().position(|a| names.contains(&a.as_str()))?;
    if pos + 1 >= args.len() {
        args.remove(pos);
        return None;
    }
    let value = args.remove(pos + 1);
    args.remove(pos);
    Some(value)
}

fn parse_option<T: FromStr>(args: &mut Vec<String>, name: &str) -> Result<Option<T>> {
    match take_option(args, &[name]) {
        Some(raw) => raw
            .parse()
            .map(Some)
            .map_err(|_| anyhow!("Invalid value '{}' for {}", raw, name)),
        None => Ok(None),
    }
}

fn positional<const N: usize>(args: &[String], usage: &str) -> Result<[String; N]> {
    <[String; N]>::try_from(args.to_vec()).map_err(|_| anyhow!("Usage: storyapp {}", usage))
}

fn print_help() {
    println!(
        "Story App v{} - browse and share photo stories",
        env!("CARGO_PKG_VERSION")
    );
    println!();
    println!("USAGE:");
    println!("    storyapp [--root <path>] <command> [args]");
    println!();
    println!("COMMANDS:");
    println!("    register <name> <email> <password>   Create an account");
    println!("    login <email> <password>             Log in and remember the session");
    println!("    logout                               Forget the stored session");
    println!("    whoami                               Show the logged-in user");
    println!("    feed [--pages N]                     Page through the story feed");
    println!("    stories [--page N] [--size N] [--location]");
    println!("                                         Fetch a single page of stories");
    println!("    map [--limit N]                      Stories with a location, plus bounds");
    println!("    upload <photo> <description> [--lat X --lon Y]");
    println!("                                         Share a new story");
    println!("    widget                               Show the cached widget stories");
    println!();
    println!("OPTIONS:");
    println!("    -r, --root <path>     Use a different directory for config and data.");
    println!("    -h, --help            Show this help message.");
    println!();
    println!("ENVIRONMENT:");
    println!("    STORYAPP_BASE_URL     Override the API base URL.");
}
