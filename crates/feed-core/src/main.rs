//! Emergent Feed Simulation CLI
//!
//! Drives scenario state on disk: seed a scenario, advance it round by
//! round at a chosen propagation depth, inject operator messages, or
//! interview an agent about what it remembers.

use clap::{Parser, Subcommand};
use feed_core::agent::TurnCtx;
use feed_core::oracle::{HashEmbedder, OfflineOracle};
use feed_core::persistence::{advance_simulation, inject_message, scenario_key, ScenarioStore};
use feed_core::SimConfig;
use rand::rngs::SmallRng;
use rand::SeedableRng;
use std::path::PathBuf;
use std::process::ExitCode;

/// Command line interface for the feed simulation
#[derive(Parser, Debug)]
#[command(name = "feed_sim")]
#[command(about = "An agent society simulation around a shared message feed")]
struct Args {
    /// Path to a TOML config file; defaults apply when absent
    #[arg(long)]
    config: Option<PathBuf>,

    /// Random seed for reproducibility
    #[arg(long, default_value_t = 42)]
    seed: u64,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Initialize a fresh scenario for a seed event
    Init {
        /// Seed event text that keys the scenario
        #[arg(long)]
        seed_event: String,
    },
    /// Advance a scenario by one or more propagation rounds
    Run {
        /// Seed event text that keys the scenario
        #[arg(long)]
        seed_event: String,
        /// Propagation depth for the rounds
        #[arg(long, default_value_t = 0)]
        depth: u32,
        /// Number of rounds to run
        #[arg(long, default_value_t = 1)]
        rounds: u32,
    },
    /// Inject an operator message into a scenario
    Inject {
        /// Seed event text that keys the scenario
        #[arg(long)]
        seed_event: String,
        /// Author name to attribute the message to
        #[arg(long)]
        author: String,
        /// Message text
        #[arg(long)]
        content: String,
        /// Depth tag for the queued event
        #[arg(long, default_value_t = 0)]
        depth: u32,
    },
    /// Ask an agent a question from its memories
    Ask {
        /// Seed event text that keys the scenario
        #[arg(long)]
        seed_event: String,
        /// Name of the agent to interview
        #[arg(long)]
        agent: String,
        /// The question to ask
        #[arg(long)]
        question: String,
        /// Optionally name another agent to surface feelings about
        #[arg(long)]
        about: Option<String>,
    },
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    let args = Args::parse();

    let config = match &args.config {
        Some(path) => match SimConfig::from_file(path) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("Error loading config: {e}");
                return ExitCode::FAILURE;
            }
        },
        None => SimConfig::default(),
    };

    let store = ScenarioStore::for_config(&config);
    let mut rng = SmallRng::seed_from_u64(args.seed);
    let text = OfflineOracle::new(args.seed);
    let embed = HashEmbedder::new(config.embedding.dimension);

    match args.command {
        Command::Init { seed_event } => {
            println!("Initializing scenario {}", scenario_key(&seed_event));
            let sim = match store.load(&seed_event, 0) {
                Ok(sim) => sim,
                Err(e) => {
                    eprintln!("Error: {e}");
                    return ExitCode::FAILURE;
                }
            };
            if let Err(e) = store.save(&seed_event, &sim) {
                eprintln!("Error: {e}");
                return ExitCode::FAILURE;
            }
            println!(
                "  {} agents, {} messages, {} queued events",
                sim.agents.len(),
                sim.log.len(),
                sim.queue.len()
            );
        }
        Command::Run { seed_event, depth, rounds } => {
            println!("Scenario {}", scenario_key(&seed_event));
            println!("Depth: {depth}  Rounds: {rounds}  Seed: {}", args.seed);
            println!();
            for round in 1..=rounds {
                match advance_simulation(&store, &seed_event, depth, &config, &mut rng, &text, &embed) {
                    Ok(summary) => println!(
                        "[Round {:>2}] delivered {:>3}, posted {:>3}, pruned {:>3}",
                        round, summary.delivered, summary.posted, summary.pruned
                    ),
                    Err(e) => {
                        eprintln!("Error advancing round {round}: {e}");
                        return ExitCode::FAILURE;
                    }
                }
            }
            match store.load(&seed_event, 0) {
                Ok(sim) => {
                    println!();
                    println!("Feed now holds {} messages.", sim.log.len());
                    for message in sim.log.iter() {
                        let tag = match &message.reply_to_id {
                            Some(_) => "reply",
                            None => "post",
                        };
                        println!(
                            "  [{}] {} ({}, {} likes): {}",
                            message.post_time,
                            message.author,
                            tag,
                            message.likes.len(),
                            message.content
                        );
                    }
                }
                Err(e) => eprintln!("Warning: could not reread scenario: {e}"),
            }
        }
        Command::Inject { seed_event, author, content, depth } => {
            match inject_message(&store, &seed_event, &content, &author, depth, &config, &mut rng) {
                Ok(id) => println!("Injected {id} as {author} at depth {depth}"),
                Err(e) => {
                    eprintln!("Error: {e}");
                    return ExitCode::FAILURE;
                }
            }
        }
        Command::Ask { seed_event, agent, question, about } => {
            let mut sim = match store.load(&seed_event, 0) {
                Ok(sim) => sim,
                Err(e) => {
                    eprintln!("Error: {e}");
                    return ExitCode::FAILURE;
                }
            };
            let mut log = sim.log;
            let mut clock = sim.clock;
            let Some(subject) = sim.agents.get_mut(&agent) else {
                eprintln!("No agent named {agent} in this scenario");
                return ExitCode::FAILURE;
            };
            let mut ctx = TurnCtx {
                log: &mut log,
                clock: &mut clock,
                rng: &mut rng,
                text: &text,
                embed: &embed,
                config: &config,
                depth: 0,
            };
            let answer = subject.ask_question(&question, about.as_deref(), &mut ctx);
            println!("{agent}: {answer}");
        }
    }

    ExitCode::SUCCESS
}
