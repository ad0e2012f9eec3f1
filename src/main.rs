/*
 pbprod
 Copyright 2024-2025 Peter Pearson.
 Licensed under the Apache License, Version 2.0 (the "License");
 You may not use this file except in compliance with the License.
 You may obtain a copy of the License at
 http://www.apache.org/licenses/LICENSE-2.0
 Unless required by applicable law or agreed to in writing, software
 distributed under the License is distributed on an "AS IS" BASIS,
 WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 See the License for the specific language governing permissions and
 limitations under the License.
 ---------
*/

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod column_list_printer;
mod common;
mod params;
mod provision;

use common::ProvisionError;
use provision::provision_common::ProvisionActionType;
use provision::provision_manager::{created_nodes_table, node_table, ActionOutcome, ListType, ProvisionManager};
use provision::provision_params::ProvisionParams;
use provision::providers::provider_profitbricks::compute_adapter::PROVIDER_NAME;

#[derive(Parser)]
#[command(name = "pbprod", version)]
#[command(about = "Provisions and manages ProfitBricks cloud servers", long_about = None)]
struct Cli {
    /// Provider to use, when a params file doesn't name one
    #[arg(long, global = true, default_value = PROVIDER_NAME)]
    provider: String,

    /// Debug level logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Perform the action described by a params file (.txt or .yaml)
    Provision {
        file: String,
    },
    /// List locations, images, hardware or nodes
    List {
        what: String,
    },
    /// Show nodes, by <dataCenterId>/<serverId>
    Get {
        #[arg(required = true)]
        node_ids: Vec<String>,
    },
    Reboot {
        node_id: String,
    },
    Suspend {
        node_id: String,
    },
    Resume {
        node_id: String,
    },
    Destroy {
        node_id: String,
    },
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    if let Err(err) = run(cli) {
        eprintln!("Error: {}", err);
        std::process::exit(1);
    }
}

fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("pbprod=debug,info")
    }
    else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn run(cli: Cli) -> Result<(), ProvisionError> {
    match cli.command {
        Commands::Provision { file } => {
            let mut params = ProvisionParams::from_file(&file)?;
            if params.provider.is_empty() {
                params.provider = cli.provider;
            }

            let manager = ProvisionManager::with_env_providers()?;
            report(manager.perform_action(&params)?);
        },
        Commands::List { what } => {
            let list_type = what.parse::<ListType>()?;
            let manager = ProvisionManager::with_env_providers()?;
            let table = manager.list_available(&cli.provider, list_type)?;
            if table.is_empty() {
                println!("No {} found.", list_type);
            }
            else {
                print!("{}", table);
            }
        },
        Commands::Get { node_ids } => {
            let manager = ProvisionManager::with_env_providers()?;
            let nodes = manager.get_nodes(&cli.provider, node_ids.as_slice())?;
            if nodes.is_empty() {
                return Err(ProvisionError::NotFound(format!("nodes {}", node_ids.join(", "))));
            }
            if nodes.len() < node_ids.len() {
                tracing::warn!("Only {} of {} nodes were found", nodes.len(), node_ids.len());
            }
            print!("{}", node_table(&nodes));
        },
        Commands::Reboot { node_id } => node_action(&cli.provider, ProvisionActionType::RebootNode, &node_id)?,
        Commands::Suspend { node_id } => node_action(&cli.provider, ProvisionActionType::SuspendNode, &node_id)?,
        Commands::Resume { node_id } => node_action(&cli.provider, ProvisionActionType::ResumeNode, &node_id)?,
        Commands::Destroy { node_id } => node_action(&cli.provider, ProvisionActionType::DestroyNode, &node_id)?,
    }

    Ok(())
}

fn node_action(provider: &str, action: ProvisionActionType, node_id: &str) -> Result<(), ProvisionError> {
    let mut params = ProvisionParams::from_details(provider, action);
    params.set_string("node_id", node_id);

    let manager = ProvisionManager::with_env_providers()?;
    report(manager.perform_action(&params)?);
    Ok(())
}

fn report(outcome: ActionOutcome) {
    match outcome {
        ActionOutcome::Created(nodes) => {
            println!("Created {} node(s):\n", nodes.len());
            print!("{}", created_nodes_table(&nodes));
        },
        ActionOutcome::Completed(action, node_id) => {
            println!("{}: {} done.", node_id, action);
        }
    }
}
