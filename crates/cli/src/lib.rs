use anyhow::{Context as AnyhowContext, Result};
use clap::{Args, Parser, Subcommand};
use paramlink_association::{
    AssociationStore, ConfigScope, DontAskList, JsonFileScope, JsonFileState, Reconciler,
    ScopeStack, SelectionOutcome, WritableScope,
};
use paramlink_discovery::{CandidateFinder, ContentSniffer, SniffOptions};
use paramlink_protocol::{DocumentEvent, DocumentRef};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use crate::flags::WriteScopeFlag;
use crate::locations::{absolutize, Locations, USER_SCOPE, WORKSPACE_SCOPE};
use crate::report::{
    describe_reconcile, describe_selection, print_json, print_stdout, ChangeReport,
    ResolveReport, ReverseReport, SniffReport,
};
use crate::terminal::{ConsoleNotifier, ConsolePicker};

mod flags;
mod locations;
mod report;
mod terminal;

#[derive(Parser)]
#[command(name = "paramlink")]
#[command(about = "Associate deployment templates with their parameter files", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Quiet mode: log only warnings/errors
    #[arg(long, global = true)]
    quiet: bool,

    /// Emit JSON on stdout (implies --quiet)
    #[arg(long, global = true)]
    json: bool,

    /// Workspace root holding .paramlink/settings.json (default: current directory)
    #[arg(long, global = true)]
    workspace: Option<PathBuf>,

    /// User settings file (default: <config dir>/paramlink/settings.json)
    #[arg(long, global = true)]
    user_settings: Option<PathBuf>,

    /// Global state file (default: <data dir>/paramlink/state.json)
    #[arg(long, global = true)]
    state_file: Option<PathBuf>,

    /// Scope that receives writes (default: the most specific writable scope)
    #[arg(long, global = true, value_enum)]
    write_scope: Option<WriteScopeFlag>,
}

#[derive(Subcommand)]
enum Commands {
    /// List parameter files next to a template
    Candidates(TemplateArgs),

    /// Print the parameter file associated with a template
    Resolve(TemplateArgs),

    /// Associate a template with a parameter file
    Set(SetArgs),

    /// Remove a template's association
    Clear(TemplateArgs),

    /// List every effective association
    List,

    /// Find the template associated with a parameter file
    #[command(name = "template-for")]
    TemplateFor(ParametersArgs),

    /// Run the suggestion workflow once, as if the template was opened
    Check(CheckArgs),

    /// Pick a parameter file for a template interactively
    Select(TemplateArgs),

    /// Forget every "don't ask again" decision
    #[command(name = "reset-dont-ask")]
    ResetDontAsk,

    /// Report whether a file looks like a parameters file
    Sniff(SniffArgs),
}

#[derive(Args)]
struct TemplateArgs {
    /// Template file
    template: PathBuf,
}

#[derive(Args)]
struct SetArgs {
    /// Template file
    template: PathBuf,

    /// Parameter file
    parameters: PathBuf,
}

#[derive(Args)]
struct ParametersArgs {
    /// Parameter file
    parameters: PathBuf,
}

#[derive(Args)]
struct CheckArgs {
    /// Template file
    template: PathBuf,

    /// Treat the event as a save instead of an open
    #[arg(long)]
    saved: bool,
}

#[derive(Args)]
struct SniffArgs {
    /// File to inspect
    file: PathBuf,

    /// Also require a recognized $schema URI
    #[arg(long)]
    strict: bool,
}

struct Engine {
    store: AssociationStore,
    dont_ask: DontAskList,
    finder: CandidateFinder,
}

impl Engine {
    fn open(cli: &Cli) -> Result<Self> {
        let locations = Locations::resolve(
            cli.workspace.as_deref(),
            cli.user_settings.as_deref(),
            cli.state_file.as_deref(),
        )?;
        log::debug!("Using {locations:?}");

        let mut scopes: Vec<Arc<dyn ConfigScope>> = Vec::with_capacity(2);
        if let Some(path) = locations.user_settings {
            scopes.push(Arc::new(JsonFileScope::new(USER_SCOPE, path)));
        }
        scopes.push(Arc::new(JsonFileScope::new(
            WORKSPACE_SCOPE,
            locations.workspace_settings,
        )));
        let writable = cli
            .write_scope
            .map(WriteScopeFlag::as_domain)
            .unwrap_or(WritableScope::MostSpecific);

        Ok(Self {
            store: AssociationStore::new(Arc::new(ScopeStack::new(scopes, writable))),
            dont_ask: DontAskList::new(Arc::new(JsonFileState::new(locations.state_file))),
            finder: CandidateFinder::with_options(SniffOptions::from_env()),
        })
    }

    fn reconciler(self) -> Reconciler {
        Reconciler::new(
            self.store,
            self.dont_ask,
            self.finder,
            Arc::new(ConsoleNotifier::new()),
            Arc::new(ConsolePicker::new()),
        )
    }
}

pub async fn main_entry() -> Result<ExitCode> {
    let mut cli = Cli::parse();

    // Keep stdout clean for JSON parsing
    if cli.json {
        cli.quiet = true;
    }

    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"));
    if cli.quiet {
        builder.filter_level(log::LevelFilter::Warn);
    } else if cli.verbose {
        builder.filter_level(log::LevelFilter::Debug);
    }
    builder.target(env_logger::Target::Stderr).init();

    run(cli).await
}

async fn run(cli: Cli) -> Result<ExitCode> {
    let json = cli.json;
    match &cli.command {
        Commands::Sniff(args) => return run_sniff(args, json).await,
        Commands::Candidates(args) => return run_candidates(args, json).await,
        _ => {}
    }

    let engine = Engine::open(&cli)?;
    match cli.command {
        Commands::Resolve(args) => {
            let template = absolutize(&args.template)?;
            let parameters = engine.store.resolve(&template).await;
            let found = parameters.is_some();
            if json {
                print_json(&ResolveReport {
                    template,
                    parameters,
                })?;
            } else if let Some(parameters) = parameters {
                print_stdout(&parameters.display().to_string())?;
            } else {
                eprintln!("No parameter file associated with {}", template.display());
            }
            Ok(exit_code(found))
        }
        Commands::Set(args) => {
            let template = absolutize(&args.template)?;
            let parameters = absolutize(&args.parameters)?;
            engine
                .store
                .set(&template, Some(&parameters))
                .await
                .context("Failed to save association")?;
            report_change(json, template, Some(parameters))
        }
        Commands::Clear(args) => {
            let template = absolutize(&args.template)?;
            engine
                .store
                .set(&template, None)
                .await
                .context("Failed to clear association")?;
            report_change(json, template, None)
        }
        Commands::List => {
            let entries = engine.store.entries().await;
            if json {
                print_json(&entries)?;
            } else {
                for entry in &entries {
                    print_stdout(&format!(
                        "{} -> {} [{}]",
                        entry.template.display(),
                        entry.parameters.display(),
                        entry.scope
                    ))?;
                }
            }
            Ok(ExitCode::SUCCESS)
        }
        Commands::TemplateFor(args) => {
            let parameters = absolutize(&args.parameters)?;
            let template = engine.store.find_template_for_parameters(&parameters).await;
            let found = template.is_some();
            if json {
                print_json(&ReverseReport {
                    parameters,
                    template,
                })?;
            } else if let Some(template) = template {
                print_stdout(&template.display().to_string())?;
            } else {
                eprintln!("No template is associated with {}", parameters.display());
            }
            Ok(exit_code(found))
        }
        Commands::Check(args) => {
            let template = absolutize(&args.template)?;
            let event = if args.saved {
                DocumentEvent::Saved
            } else {
                DocumentEvent::Opened
            };
            let outcome = engine
                .reconciler()
                .on_document_event(&DocumentRef::file(template), event)
                .await?;
            if json {
                print_json(&outcome)?;
            } else {
                print_stdout(&describe_reconcile(&outcome))?;
            }
            Ok(ExitCode::SUCCESS)
        }
        Commands::Select(args) => {
            let template = absolutize(&args.template)?;
            let outcome = engine.reconciler().select_parameter_file(&template).await;
            if json {
                print_json(&outcome)?;
            } else {
                print_stdout(&describe_selection(&outcome))?;
            }
            Ok(exit_code(outcome != SelectionOutcome::WriteFailed))
        }
        Commands::ResetDontAsk => {
            engine
                .dont_ask
                .reset()
                .await
                .context("Failed to reset the don't-ask list")?;
            if !json {
                print_stdout("Cleared the don't-ask list")?;
            }
            Ok(ExitCode::SUCCESS)
        }
        Commands::Sniff(_) | Commands::Candidates(_) => Ok(ExitCode::SUCCESS),
    }
}

async fn run_sniff(args: &SniffArgs, json: bool) -> Result<ExitCode> {
    let path = absolutize(&args.file)?;
    let options = SniffOptions::from_env();
    let options = options.strict(options.strict_schema || args.strict);
    let outcome = ContentSniffer::new(options).sniff(&path).await;
    if json {
        print_json(&SniffReport {
            path,
            is_parameters: outcome.is_parameters,
            bytes_read: outcome.bytes_read,
            strict_schema: options.strict_schema,
        })?;
    } else {
        let verdict = if outcome.is_parameters {
            "parameters file"
        } else {
            "not a parameters file"
        };
        print_stdout(&format!(
            "{}: {verdict} ({} bytes read)",
            path.display(),
            outcome.bytes_read
        ))?;
    }
    Ok(exit_code(outcome.is_parameters))
}

async fn run_candidates(args: &TemplateArgs, json: bool) -> Result<ExitCode> {
    let template = absolutize(&args.template)?;
    let candidates = CandidateFinder::with_options(SniffOptions::from_env())
        .find_candidates(&template)
        .await;
    if json {
        print_json(&candidates)?;
    } else {
        for candidate in &candidates {
            let marker = if candidate.is_close_name_match { "*" } else { " " };
            print_stdout(&format!("{marker} {}", candidate.path.display()))?;
        }
    }
    Ok(ExitCode::SUCCESS)
}

fn report_change(json: bool, template: PathBuf, parameters: Option<PathBuf>) -> Result<ExitCode> {
    if json {
        print_json(&ChangeReport {
            template,
            parameters,
        })?;
    } else {
        match &parameters {
            Some(parameters) => print_stdout(&format!(
                "Associated {} with {}",
                template.display(),
                parameters.display()
            ))?,
            None => print_stdout(&format!("Cleared association for {}", template.display()))?,
        }
    }
    Ok(ExitCode::SUCCESS)
}

fn exit_code(success: bool) -> ExitCode {
    if success {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}
