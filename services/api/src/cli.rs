use crate::demo::{run_cycle, run_demo, CycleRunArgs, DemoArgs};
use crate::server;
use clap::{Args, Parser, Subcommand};
use people_ops::error::AppError;

#[derive(Parser, Debug)]
#[command(
    name = "People Operations Portal",
    about = "Run the performance evaluation workflow engine from the command line",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the HTTP service (default command)
    Serve(ServeArgs),
    /// Operate evaluation cycles against the seeded in-memory portal
    Cycle {
        #[command(subcommand)]
        command: CycleCommand,
    },
    /// Run an end-to-end walkthrough of the evaluation workflow
    Demo(DemoArgs),
}

#[derive(Subcommand, Debug)]
enum CycleCommand {
    /// Generate the evaluations for one cycle period and print the summary
    Run(CycleRunArgs),
}

#[derive(Args, Debug, Default)]
pub(crate) struct ServeArgs {
    /// Override the configured host for the HTTP server
    #[arg(long)]
    pub(crate) host: Option<String>,
    /// Override the configured port for the HTTP server
    #[arg(long)]
    pub(crate) port: Option<u16>,
}

pub(crate) async fn run() -> Result<(), AppError> {
    let cli = Cli::parse();
    let command = cli
        .command
        .unwrap_or_else(|| Command::Serve(ServeArgs::default()));

    match command {
        Command::Serve(args) => server::run(args).await,
        Command::Cycle {
            command: CycleCommand::Run(args),
        } => run_cycle(args),
        Command::Demo(args) => run_demo(args),
    }
}
