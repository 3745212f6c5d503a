use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{CommandFactory, Parser, Subcommand};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use switchboard_core::config::{AppConfig, EngineConfig, ModelConfig};
use switchboard_core::traits::{ImageAnalyzer, LlmClient};
use switchboard_core::types::{ChatMessage, SessionId};

use switchboard_flows::{build_support_graph, SupportDeps};
use switchboard_graph::{GraphExecutor, RunState, Session, TurnInput, TurnOutcome};
use switchboard_services::{HttpImageAnalyzer, HttpOrderService, HttpRetriever};

const APOLOGY: &str =
    "Sorry, something went wrong while handling your request. Please try again or contact the call center.";

#[derive(Parser)]
#[command(name = "switchboard", version, about = "Customer-support conversation graph engine")]
struct Cli {
    /// Path to config file
    #[arg(short, long, default_value = "switchboard.toml")]
    config: PathBuf,

    /// Session ID (auto-generated if not provided)
    #[arg(short, long)]
    session: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Chat with the support assistant (default)
    Chat,
    /// Run a single turn and print the outcome as JSON
    Run {
        /// Node to resume at (the token printed by a previous paused turn)
        #[arg(long)]
        resume: Option<String>,
        /// Image to attach to the message
        #[arg(long)]
        image: Option<PathBuf>,
        /// Load and save session data here so turns can be chained
        #[arg(long)]
        session_file: Option<PathBuf>,
        /// The user message
        #[arg(trailing_var_arg = true)]
        message: Vec<String>,
    },
    /// Show the conversation graph
    Graph {
        /// Render as Graphviz DOT
        #[arg(long)]
        dot: bool,
    },
    /// Show current configuration
    Config,
    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_env("SWITCHBOARD_LOG")
                .or_else(|_| EnvFilter::try_from_default_env())
                .unwrap_or_else(|_| EnvFilter::new("switchboard=info,warn")),
        )
        .with_target(false)
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();

    // Handle completions before config loading
    if let Some(Commands::Completions { shell }) = &cli.command {
        let mut cmd = Cli::command();
        clap_complete::generate(*shell, &mut cmd, "switchboard", &mut io::stdout());
        return Ok(());
    }

    let config = load_config(&cli.config)?;

    if let Some(Commands::Config) = &cli.command {
        println!("{}", toml::to_string_pretty(&config)?);
        return Ok(());
    }

    let executor = build_executor(&config)?;
    let session_id = cli
        .session
        .as_deref()
        .map(SessionId::from_str)
        .unwrap_or_default();

    match cli.command {
        None | Some(Commands::Chat) => run_repl(&executor, session_id).await?,
        Some(Commands::Run {
            resume,
            image,
            session_file,
            message,
        }) => {
            let text = if message.is_empty() {
                io::stdin()
                    .lock()
                    .lines()
                    .map_while(|l| l.ok())
                    .collect::<Vec<_>>()
                    .join("\n")
            } else {
                message.join(" ")
            };
            run_once(&executor, session_id, text, resume, image, session_file.as_deref()).await?;
        }
        Some(Commands::Graph { dot }) => {
            let graph = executor.graph();
            if dot {
                print!("{}", graph.to_dot());
            } else {
                for node in graph.nodes() {
                    let marker = if node.is_interactive() { " (interactive)" } else { "" };
                    println!("{} [{:?}]{}", node.name(), node.kind(), marker);
                    for child in graph.children(node.name()) {
                        println!("  -> {}", child);
                    }
                }
            }
        }
        // Handled before the graph is built
        Some(Commands::Config) | Some(Commands::Completions { .. }) => {}
    }

    Ok(())
}

fn load_config(path: &Path) -> anyhow::Result<AppConfig> {
    if path.exists() {
        return Ok(AppConfig::load(path)?);
    }
    eprintln!("Warning: {} not found, using defaults and OPENAI_API_KEY", path.display());
    Ok(create_env_config())
}

fn create_env_config() -> AppConfig {
    let mut model = ModelConfig::new("gpt-4.1");
    model.api_key = std::env::var("OPENAI_API_KEY").ok();
    AppConfig {
        model,
        fallback_models: vec![],
        engine: EngineConfig::default(),
        orders: None,
        retrieval: None,
        vision: None,
    }
}

fn build_executor(config: &AppConfig) -> anyhow::Result<GraphExecutor> {
    let llm: Arc<dyn LlmClient> = Arc::from(switchboard_llm::client_from_config(config)?);
    let retrieval = config.retrieval_or_default();
    let vision = config
        .vision
        .as_ref()
        .map(|v| Arc::new(HttpImageAnalyzer::new(v)) as Arc<dyn ImageAnalyzer>);

    let deps = SupportDeps {
        llm,
        model: config.model.clone(),
        orders: Arc::new(HttpOrderService::new(&config.orders_or_default())),
        policies: Arc::new(HttpRetriever::new(&retrieval, &retrieval.policy_collection)),
        shop: Arc::new(HttpRetriever::new(&retrieval, &retrieval.shop_collection)),
        vision,
    };
    let graph = build_support_graph(&deps)?;
    Ok(GraphExecutor::new(Arc::new(graph), config.engine.clone()))
}

async fn run_once(
    executor: &GraphExecutor,
    session_id: SessionId,
    message: String,
    resume: Option<String>,
    image: Option<PathBuf>,
    session_file: Option<&Path>,
) -> anyhow::Result<()> {
    let mut session = match session_file {
        Some(path) if path.exists() => {
            serde_json::from_str::<Session>(&std::fs::read_to_string(path)?)?
        }
        _ => Session::with_id(session_id),
    };

    let mut input = TurnInput::new(message).resume(resume);
    if let Some(image) = image {
        input = input.with_image(image.display().to_string());
    }

    let outcome = executor.run_from(&mut session, input).await?;
    if outcome.state == RunState::Failed {
        warn!(session = %session.id, "Turn failed");
    }
    println!("{}", serde_json::to_string_pretty(&outcome)?);

    if let Some(path) = session_file {
        std::fs::write(path, serde_json::to_string_pretty(&session)?)?;
    }
    Ok(())
}

async fn run_repl(executor: &GraphExecutor, session_id: SessionId) -> anyhow::Result<()> {
    println!("Switchboard v{}", env!("CARGO_PKG_VERSION"));
    println!("Session: {}", session_id);
    println!("Type /help for commands, /quit to exit.\n");

    let stdin = io::stdin();
    let mut stdout = io::stdout();
    let mut session = Session::with_id(session_id);
    let mut history: Vec<ChatMessage> = Vec::new();
    let mut resume: Option<String> = None;
    let mut image: Option<String> = None;

    loop {
        print!("> ");
        stdout.flush()?;

        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            break; // EOF
        }

        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let (command, rest) = line.split_once(' ').unwrap_or((line, ""));
        match command {
            "/quit" | "/exit" | "/q" => {
                println!("Goodbye!");
                break;
            }
            "/help" => {
                println!("/image <path>  attach an image to the next message");
                println!("/reset         start a new conversation");
                println!("/state         show the resume point and session data");
                println!("/quit          exit");
                continue;
            }
            "/image" => {
                if rest.trim().is_empty() {
                    println!("Usage: /image <path>");
                } else {
                    image = Some(rest.trim().to_string());
                    println!("Image attached to the next message.");
                }
                continue;
            }
            "/reset" => {
                session = Session::new();
                history.clear();
                resume = None;
                image = None;
                println!("Conversation reset. Session: {}", session.id);
                continue;
            }
            "/state" => {
                println!("Resume at: {}", resume.as_deref().unwrap_or("root"));
                println!("Session data: {}", session.data().to_json_string());
                continue;
            }
            _ => {}
        }

        let mut input = TurnInput::new(line)
            .with_history(history.clone())
            .resume(resume.take());
        if let Some(image) = image.take() {
            input = input.with_image(image);
        }

        let reply = match executor.run_from(&mut session, input).await {
            Ok(outcome) => {
                resume = outcome.resume_token.clone();
                reply_for(&outcome)
            }
            Err(e) => {
                error!(error = %e, "Turn aborted");
                APOLOGY.to_string()
            }
        };

        println!("{}\n", reply);
        history.push(ChatMessage::user(line));
        history.push(ChatMessage::assistant(reply));
    }

    info!(session = %session.id, turns = history.len() / 2, "Chat ended");
    Ok(())
}

fn reply_for(outcome: &TurnOutcome) -> String {
    match outcome.state {
        RunState::Failed => APOLOGY.to_string(),
        _ => outcome.reply_text(),
    }
}
