use clap::{Parser, Subcommand};
use structured_logger::{Builder, async_json::new_writer, get_env_level};
use vechain_core::{BoxError, CancellationToken};
use vechain_engine::config::Conf;

mod registry;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[clap(long, env = "CONFIG_FILE_PATH", default_value = "./Config.toml")]
    config: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the capability catalog: name, kind, description and argument schema.
    List {
        /// Only these capabilities
        #[arg(short, long)]
        name: Vec<String>,
    },

    /// Invoke a capability and print its result envelope.
    /// Example: `vechain_cli invoke -n vet_transfer -a '{"sender":"0x..","recipient":"0x..","amount":"1"}'`
    Invoke {
        #[arg(short, long)]
        name: String,

        /// Arguments as a JSON object
        #[arg(short, long, default_value = "{}")]
        args: String,
    },
}

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    dotenv::dotenv().ok();
    let cli = Cli::parse();

    // stdout carries results only
    Builder::with_level(&get_env_level().to_string())
        .with_target_writer("*", new_writer(tokio::io::stderr()))
        .init();

    let cfg = Conf::from_file(&cli.config)?;
    let engine = registry::build_engine(&cfg)?;

    match cli.command {
        Commands::List { name } => {
            let names: Vec<&str> = name.iter().map(String::as_str).collect();
            let definitions = if names.is_empty() {
                engine.list_capabilities()
            } else {
                engine.capability_definitions(Some(names.as_slice()))
            };
            println!("{}", serde_json::to_string_pretty(&definitions)?);
        }

        Commands::Invoke { name, args } => {
            let args: serde_json::Value = serde_json::from_str(&args)?;
            let cancel = CancellationToken::new();
            let token = cancel.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    token.cancel();
                }
            });

            let res = engine.invoke_with_cancel(&name, args, cancel).await;
            println!("{}", serde_json::to_string_pretty(&res)?);
            if !res.is_ok() {
                std::process::exit(1);
            }
        }
    }

    Ok(())
}
