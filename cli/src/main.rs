mod settings;
mod test_runner;

use std::io::Read;
use std::path::{Path, PathBuf};
use std::process;

use clap::{Parser, Subcommand};
use codespan_reporting::files::SimpleFiles;
use codespan_reporting::term;
use codespan_reporting::term::termcolor::{ColorChoice, StandardStream, WriteColor};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use composer::{Composer, CreatePost, Entity, EntityLookup, Session, StaticLookup, parse_keys};
use richdoc::{DecodeError, Document, Renderer};

use crate::settings::Settings;

#[derive(Parser)]
#[command(name = "richdoc", version, about = "Rich post documents: render, check and compose")]
struct Cli {
    /// Disable colored diagnostics
    #[arg(long, global = true)]
    no_color: bool,

    /// Settings file (defaults to ./richdoc.toml when present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Render a stored post body to HTML
    Render(RenderArgs),

    /// Strictly decode a stored post body and report problems
    Check(CheckArgs),

    /// Type a key script into a composer and print the result
    Compose(ComposeArgs),

    /// Run .test.md composer scenarios
    Test(TestArgs),

    /// Talk to the club backend
    #[command(subcommand)]
    Posts(PostsCommand),
}

#[derive(clap::Args)]
struct RenderArgs {
    /// Transport file to render ("-" reads stdin)
    file: String,

    /// Treat the input as Markdown instead of a transport string
    #[arg(long)]
    markdown: bool,

    /// Print the plain-text projection instead of HTML
    #[arg(long)]
    text: bool,
}

#[derive(clap::Args)]
struct CheckArgs {
    /// Transport file to check ("-" reads stdin)
    file: String,
}

#[derive(clap::Args)]
struct ComposeArgs {
    /// Key script file, e.g. `Hello @Che{Enter}` ("-" reads stdin)
    #[arg(required_unless_present = "keys")]
    script: Option<String>,

    /// Key script given inline
    #[arg(short, long, conflicts_with = "script")]
    keys: Option<String>,

    /// JSON array of `{ "id": .., "name": .. }` entities to suggest from
    #[arg(long)]
    entities: Option<PathBuf>,

    /// Suggest clubs from the backend instead
    #[arg(long, conflicts_with = "entities")]
    remote: bool,

    /// Transport file to start from
    #[arg(long)]
    load: Option<PathBuf>,

    /// Print rendered HTML instead of the transport string
    #[arg(long)]
    html: bool,
}

#[derive(clap::Args)]
struct TestArgs {
    /// Path to a .test.md file or a directory containing them
    path: String,

    /// Run only scenarios in these categories (subfolder names). Repeatable.
    #[arg(short, long)]
    category: Vec<String>,

    /// List available categories and exit
    #[arg(long)]
    list_categories: bool,
}

#[derive(Subcommand)]
enum PostsCommand {
    /// List a club's posts, newest first
    List {
        club_id: i64,
        #[arg(long, default_value_t = 0)]
        page: u32,
        #[arg(long, default_value_t = 10)]
        size: u32,
    },

    /// Publish a post as the signed-in club
    Create {
        #[arg(long)]
        title: String,
        /// Body: a transport file, or Markdown with --markdown
        file: String,
        #[arg(long)]
        markdown: bool,
        /// Session cookie of the signed-in club
        #[arg(long)]
        cookie: String,
    },

    /// Delete a post as the signed-in club
    Delete {
        post_id: i64,
        #[arg(long)]
        cookie: String,
    },
}

fn main() {
    init_logging();
    let cli = Cli::parse();

    let settings = match Settings::load(cli.config.as_deref()) {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("error: {}", e);
            process::exit(1);
        }
    };

    match cli.command {
        Command::Render(args) => do_render(args, &settings),
        Command::Check(args) => do_check(args, cli.no_color),
        Command::Compose(args) => do_compose(args, &settings),
        Command::Test(args) => {
            let path = Path::new(&args.path);
            if args.list_categories {
                test_runner::list_categories(path);
                return;
            }
            process::exit(test_runner::run_tests(path, cli.no_color, &args.category, &settings));
        }
        Command::Posts(command) => do_posts(command, &settings),
    }
}

fn init_logging() {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_env("RICHDOC_LOG").unwrap_or_else(|_| EnvFilter::new("warn")))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

/// Read a file argument, with "-" meaning stdin. Exits on failure.
fn read_input(file: &str) -> String {
    let result = if file == "-" {
        let mut text = String::new();
        std::io::stdin().read_to_string(&mut text).map(|_| text)
    } else {
        std::fs::read_to_string(file)
    };
    result.unwrap_or_else(|e| {
        eprintln!("error: cannot read '{}': {}", file, e);
        process::exit(1);
    })
}

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Runtime::new().unwrap_or_else(|e| {
        eprintln!("error: cannot start runtime: {}", e);
        process::exit(1);
    })
}

fn do_render(args: RenderArgs, settings: &Settings) {
    let source = read_input(&args.file);
    let doc = if args.markdown {
        richdoc::from_markdown(&source)
    } else {
        richdoc::deserialize(&source)
    };
    if args.text {
        println!("{}", richdoc::render::plain_text(&doc));
    } else {
        print!("{}", Renderer::new(settings.render_options()).render_document(&doc));
    }
}

fn do_check(args: CheckArgs, no_color: bool) {
    let source = read_input(&args.file);

    match richdoc::try_deserialize(&source) {
        Ok(doc) => {
            eprintln!(
                "ok: {}: {} blocks, {} mentions",
                args.file,
                doc.nodes.len(),
                doc.mentions().len()
            );
        }
        Err(error) => {
            let color_choice = if no_color {
                ColorChoice::Never
            } else {
                ColorChoice::Auto
            };
            let writer = StandardStream::stderr(color_choice);
            if !report_decode_error(&mut writer.lock(), &args.file, &source, &error) {
                eprintln!("error: {}", error);
            }
            process::exit(1);
        }
    }
}

/// Print `error` as a diagnostic over `source`. Returns false when the
/// diagnostic could not be written.
fn report_decode_error<W: WriteColor>(out: &mut W, name: &str, source: &str, error: &DecodeError) -> bool {
    let mut files = SimpleFiles::new();
    let file_id = files.add(name.to_string(), source.to_string());
    let diagnostic = error.to_diagnostic(file_id);
    match term::emit_to_write_style(out, &term::Config::default(), &files, &diagnostic) {
        Ok(()) => true,
        Err(e) => {
            tracing::warn!(error = %e, file = name, "could not print diagnostic");
            false
        }
    }
}

fn do_compose(args: ComposeArgs, settings: &Settings) {
    let script = match (&args.keys, &args.script) {
        (Some(keys), _) => keys.clone(),
        (None, Some(file)) => read_input(file),
        (None, None) => String::new(),
    };
    let keys = parse_keys(&script).unwrap_or_else(|e| {
        eprintln!("error: {}", e);
        process::exit(1);
    });

    let lookup: Box<dyn EntityLookup> = if args.remote {
        Box::new(settings.remote_lookup())
    } else {
        let entities: Vec<Entity> = match &args.entities {
            Some(path) => {
                let text = read_input(&path.to_string_lossy());
                serde_json::from_str(&text).unwrap_or_else(|e| {
                    eprintln!("error: invalid entities in {}: {}", path.display(), e);
                    process::exit(1);
                })
            }
            None => Vec::new(),
        };
        let config = settings.composer_config();
        Box::new(
            StaticLookup::new(entities).with_matching(config.mentions.match_mode, config.mentions.limit),
        )
    };

    let mut composer = Composer::new(settings.composer_config());
    if let Some(path) = &args.load {
        composer.load(&read_input(&path.to_string_lossy()));
    }

    let composer = runtime().block_on(async move {
        for key in keys {
            if let Err(e) = composer.handle_key(key) {
                eprintln!("warning: {} rejected: {}", key, e);
            }
            composer.refresh_suggestions(lookup.as_ref()).await;
        }
        composer
    });

    if args.html {
        print!(
            "{}",
            Renderer::new(settings.render_options()).render_document(composer.document())
        );
    } else {
        println!("{}", composer.serialized());
    }
}

fn do_posts(command: PostsCommand, settings: &Settings) {
    let api = settings.api_client();
    let renderer = Renderer::new(settings.render_options());

    let result = runtime().block_on(async move {
        match command {
            PostsCommand::List { club_id, page, size } => {
                let posts = api.list_club_posts(club_id, page, size).await?;
                for post in &posts.content {
                    let excerpt = richdoc::render::plain_text(&post.document());
                    let first_line = excerpt.lines().next().unwrap_or_default();
                    println!("{:>6}  {}  {}", post.id, post.title, first_line);
                }
                eprintln!(
                    "page {} of {} ({} posts)",
                    posts.page + 1,
                    posts.total_pages.max(1),
                    posts.total_elements
                );
            }
            PostsCommand::Create {
                title,
                file,
                markdown,
                cookie,
            } => {
                let source = read_input(&file);
                let body: Document = if markdown {
                    richdoc::from_markdown(&source)
                } else {
                    richdoc::deserialize(&source)
                };
                let created = api
                    .create_post(&Session::new(cookie), &CreatePost::new(title, &body))
                    .await?;
                eprintln!("created post {}", created.id);
                print!("{}", renderer.render_document(&created.document()));
            }
            PostsCommand::Delete { post_id, cookie } => {
                api.delete_post(&Session::new(cookie), post_id).await?;
                eprintln!("deleted post {}", post_id);
            }
        }
        Ok::<(), composer::ApiError>(())
    });

    if let Err(e) = result {
        eprintln!("error: {}", e);
        process::exit(1);
    }
}
