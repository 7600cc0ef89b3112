use std::sync::Arc;

use clap::{Parser, Subcommand};
use miette::Result;
use tracing_subscriber::{fmt, EnvFilter};

use otter::authz::errors::AuthzError;
use otter::authz::loader;
use otter::authz::query::{CanQuery, HowCanQuery, WhatCanQuery, WhoCanQuery};
use otter::authz::types::{parse_specifier_pair, Action, PolicyFilter, SpecifierMap, SubjectKind};
use otter::authz::Otter;
use otter::settings::Settings;
use otter::web;

#[derive(Parser, Debug)]
#[command(
    name = "otter",
    version,
    about = "Hierarchical, attribute-scoped authorization engine"
)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "otter.toml")]
    config: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Load fixtures and serve the HTTP API
    Serve,
    /// Evaluate a query against the loaded fixtures
    #[command(subcommand)]
    Query(QueryCommand),
    /// Inspect stored policies
    #[command(subcommand)]
    Policy(PolicyCommand),
}

#[derive(Subcommand, Debug)]
enum QueryCommand {
    /// Can SUBJECT perform an action on a resource?
    Can {
        subject: String,
        /// Expected kind of SUBJECT (Principal or Group)
        #[arg(long)]
        of_type: Option<SubjectKind>,
        #[arg(long)]
        perform: Action,
        #[arg(long)]
        on: String,
        /// Comma-separated key=value pairs
        #[arg(long, value_delimiter = ',')]
        with: Vec<String>,
    },
    /// Which subjects can perform an action on a resource?
    WhoCan {
        #[arg(long)]
        perform: Action,
        #[arg(long)]
        on: String,
        #[arg(long, value_delimiter = ',')]
        with: Vec<String>,
    },
    /// Which resources can SUBJECT perform an action on?
    WhatCan {
        subject: String,
        #[arg(long)]
        perform: Action,
        /// Only resources below this one
        #[arg(long)]
        under: Option<String>,
        #[arg(long, value_delimiter = ',')]
        with: Vec<String>,
    },
    /// Which specifier values would let SUBJECT perform an action on a resource?
    HowCan {
        subject: String,
        #[arg(long)]
        perform: Action,
        #[arg(long)]
        on: String,
        #[arg(long, value_delimiter = ',')]
        with: Vec<String>,
    },
}

#[derive(Subcommand, Debug)]
enum PolicyCommand {
    /// List policies matching every given filter
    List {
        #[arg(long)]
        subject: Option<String>,
        #[arg(long)]
        resource: Option<String>,
        #[arg(long)]
        perform: Option<Action>,
        #[arg(long, value_delimiter = ',')]
        with: Vec<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // logging
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt().with_env_filter(env_filter).init();

    let cli = Cli::parse();

    let settings = Settings::load(&cli.config)?;
    tracing::info!(?settings, "Loaded configuration");

    let otter = Arc::new(Otter::from_graph(loader::load_fixtures(
        &settings.fixtures.dir,
    )?));

    match cli.command {
        Command::Serve => web::serve(&settings, otter).await?,
        Command::Query(query) => run_query(&otter, query)?,
        Command::Policy(PolicyCommand::List {
            subject,
            resource,
            perform,
            with,
        }) => {
            let filter = PolicyFilter {
                subject,
                resource,
                action: perform,
                specifiers: Some(specifiers(&with)?),
            };
            for policy in otter.get_policies(&filter)? {
                println!(
                    "{}  {} {} {} {}",
                    policy.id,
                    policy.subject,
                    policy.action,
                    policy.resource,
                    format_specifiers(&policy.specifiers)
                );
            }
        }
    }
    Ok(())
}

fn run_query(otter: &Otter, query: QueryCommand) -> Result<(), AuthzError> {
    match query {
        QueryCommand::Can {
            subject,
            of_type,
            perform,
            on,
            with,
        } => {
            let specifiers = specifiers(&with)?;
            let kind_matches = match of_type {
                Some(kind) => otter.subject(&subject).is_some_and(|s| s.kind == kind),
                None => true,
            };
            let allowed = kind_matches
                && otter.can(
                    &CanQuery::new(subject.as_str())
                        .perform(perform)
                        .on(on.as_str())
                        .with(specifiers.clone()),
                )?;
            let verdict = if allowed { "can" } else { "cannot" };
            println!(
                "{subject} {verdict} {perform} on {on} with {}",
                format_specifiers(&specifiers)
            );
        }
        QueryCommand::WhoCan { perform, on, with } => {
            let query = WhoCanQuery::new(perform).on(on).with(specifiers(&with)?);
            for subject in otter.who_can(&query)? {
                println!("{subject}");
            }
        }
        QueryCommand::WhatCan {
            subject,
            perform,
            under,
            with,
        } => {
            let mut query = WhatCanQuery::new(subject)
                .perform(perform)
                .with(specifiers(&with)?);
            if let Some(under) = under {
                query = query.under(under);
            }
            for resource in otter.what_can(&query)? {
                println!("{resource}");
            }
        }
        QueryCommand::HowCan {
            subject,
            perform,
            on,
            with,
        } => {
            let query = HowCanQuery::new(subject)
                .perform(perform)
                .on(on)
                .with(specifiers(&with)?);
            for combination in otter.how_can(&query)? {
                println!("{}", format_specifiers(&combination));
            }
        }
    }
    Ok(())
}

fn specifiers(pairs: &[String]) -> Result<SpecifierMap, AuthzError> {
    pairs
        .iter()
        .filter(|p| !p.trim().is_empty())
        .map(|p| parse_specifier_pair(p))
        .collect()
}

fn format_specifiers(specifiers: &SpecifierMap) -> String {
    let pairs: Vec<String> = specifiers.iter().map(|(k, v)| format!("{k}={v}")).collect();
    format!("{{{}}}", pairs.join(", "))
}
