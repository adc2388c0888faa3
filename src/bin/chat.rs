use std::{
    io::{self, BufRead, Write},
    process::exit,
    sync::Arc,
};

use anyhow::Result;
use clap::Parser;
use netquery::{
    assistant::Assistant,
    database::Database,
    explainer::Explainer,
    llm::{OllamaOracle, Oracle},
    semantic_parsing::OracleInterpreter,
    settings::{ChatArgs, Settings},
    surface::{DataSurface, HttpSurface},
};
use tracing::{error, info};

const EXIT_WORDS: [&str; 2] = ["exit", "quit"];

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();
    let args = ChatArgs::parse();

    let assistant = match start(&args).await {
        Ok(assistant) => assistant,
        Err(e) => {
            error!("Problem while starting: {e:#}");
            exit(1);
        }
    };

    if let Err(e) = chat(&assistant).await {
        error!("Problem while reading input: {e}");
        exit(1);
    }
}

async fn start(args: &ChatArgs) -> Result<Assistant> {
    let settings = Settings::from_file(args.config.as_deref())?;
    let surface: Box<dyn DataSurface> = if args.local {
        info!("Querying {} directly", settings.database.path.display());
        Box::new(Database::connect(&settings.database.path)?)
    } else {
        Box::new(HttpSurface::new(
            &settings.client.api_base,
            settings.client.timeout_secs,
        )?)
    };
    let oracle: Arc<dyn Oracle> = Arc::new(OllamaOracle::new(&settings.oracle));
    let interpreter = OracleInterpreter::new(oracle.clone(), settings.alias_table())?;
    Ok(Assistant::start(Box::new(interpreter), surface, Explainer::new(oracle)).await)
}

async fn chat(assistant: &Assistant) -> io::Result<()> {
    println!("Welcome to the equipment & PoP assistant! Type `exit` or `quit` to leave.");
    let stdin = io::stdin();
    let mut lines = stdin.lock().lines();
    loop {
        print!("\nYou: ");
        io::stdout().flush()?;
        let Some(line) = lines.next() else {
            break;
        };
        let line = line?;
        let question = line.trim();
        if question.is_empty() {
            continue;
        }
        if EXIT_WORDS.contains(&question.to_lowercase().as_str()) {
            println!("Goodbye!");
            break;
        }
        match assistant.answer(question).await {
            Ok(reply) => println!("\n{reply}"),
            Err(e) => {
                error!("Turn failed: {e}");
                println!("\nError: {e}");
            }
        }
    }
    Ok(())
}
