//! `pgate` command-line interface
//!
//! Exit codes: 0 pass, 1 gate or run failure, 2 usage or I/O error. The
//! outcome is always the first line on stdout.

use anyhow::{bail, Context, Result};
use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use pgate_core::{
    CommandModel, GitPatchApplier, Orchestrator, PipelineConfig, PipelineError, Task,
};
use pgate_corpus::{Corpus, CorpusCompiler, Retriever};
use pgate_policy::{
    GroundingDocument, GroundingExistenceGate, GroundingSufficiencyGate, PolicyEnforcer,
};
use pgate_sandbox::{ContainerSandbox, SandboxRunner};
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

const EXIT_PASS: i32 = 0;
const EXIT_FAIL: i32 = 1;
const EXIT_ERROR: i32 = 2;

fn cli() -> Command {
    Command::new("pgate")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Gated retry pipeline for untrusted code proposals")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .arg(
            Arg::new("repo")
                .long("repo")
                .global(true)
                .default_value(".")
                .value_parser(value_parser!(PathBuf))
                .help("Repository root all paths are resolved against"),
        )
        .arg(
            Arg::new("config")
                .long("config")
                .global(true)
                .value_parser(value_parser!(PathBuf))
                .help("TOML pipeline configuration"),
        )
        .arg(
            Arg::new("log-json")
                .long("log-json")
                .global(true)
                .action(ArgAction::SetTrue)
                .help("Emit logs as JSON on stderr"),
        )
        .subcommand(
            Command::new("compile")
                .about("Compile the governance corpus")
                .arg(
                    Arg::new("write")
                        .long("write")
                        .action(ArgAction::SetTrue)
                        .help("Write the corpus; without this only inputs are listed"),
                ),
        )
        .subcommand(
            Command::new("retrieve")
                .about("Rank corpus chunks against a query")
                .arg(Arg::new("query").required(true).help("Query text"))
                .arg(
                    Arg::new("top-k")
                        .long("top-k")
                        .value_parser(value_parser!(usize))
                        .help("Maximum hits (default from config)"),
                ),
        )
        .subcommand(
            Command::new("check-policy")
                .about("Scan a patch against the deny-lists")
                .arg(
                    Arg::new("patch")
                        .long("patch")
                        .value_parser(value_parser!(PathBuf))
                        .help("Patch file (default: stdin)"),
                ),
        )
        .subcommand(
            Command::new("check-grounding")
                .about("Check that cited chunk ids exist in the corpus")
                .arg(
                    Arg::new("grounding")
                        .required(true)
                        .value_parser(value_parser!(PathBuf))
                        .help("Grounding JSON document"),
                ),
        )
        .subcommand(
            Command::new("validate-grounding")
                .about("Check citation count, query and mandatory sources")
                .arg(
                    Arg::new("grounding")
                        .required(true)
                        .value_parser(value_parser!(PathBuf))
                        .help("Grounding JSON document"),
                )
                .arg(
                    Arg::new("corpus")
                        .long("corpus")
                        .value_parser(value_parser!(PathBuf))
                        .help("Corpus file (default from config)"),
                ),
        )
        .subcommand(
            Command::new("sandbox")
                .about("Run one module's tests in the sandbox")
                .arg(Arg::new("module").required(true).help("Module name under modules/")),
        )
        .subcommand(
            Command::new("run")
                .about("Run the full gated pipeline for a task")
                .arg(
                    Arg::new("task")
                        .required(true)
                        .value_parser(value_parser!(PathBuf))
                        .help("Task JSON file"),
                )
                .arg(
                    Arg::new("model-cmd")
                        .long("model-cmd")
                        .required(true)
                        .num_args(1..)
                        .allow_hyphen_values(true)
                        .help("Model command and its arguments; prompt on stdin, proposal JSON on stdout"),
                ),
        )
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

struct Workspace {
    repo: PathBuf,
    config: PipelineConfig,
}

impl Workspace {
    fn from_matches(matches: &ArgMatches) -> Result<Self> {
        let repo = matches
            .get_one::<PathBuf>("repo")
            .cloned()
            .unwrap_or_else(|| PathBuf::from("."));
        let config = match matches.get_one::<PathBuf>("config") {
            Some(path) => {
                tracing::debug!(config = %path.display(), "Loading configuration");
                PipelineConfig::load(path)?
            }
            None => PipelineConfig::default(),
        };
        tracing::debug!(repo = %repo.display(), "Workspace resolved");
        Ok(Self { repo, config })
    }

    fn corpus_path(&self) -> PathBuf {
        self.repo.join(&self.config.corpus.output)
    }

    fn load_corpus(&self, path: &Path) -> Result<Corpus> {
        if !path.exists() {
            return Ok(Corpus::default());
        }
        Corpus::load(path).with_context(|| format!("loading corpus {}", path.display()))
    }
}

fn compile(ws: &Workspace, args: &ArgMatches) -> Result<i32> {
    let compiler = CorpusCompiler::new(&ws.repo, ws.config.corpus.clone());
    if args.get_flag("write") {
        let compiled = compiler.build()?;
        println!(
            "Wrote corpus: {} chunks={} sha256={}",
            ws.config.corpus.output.display(),
            compiled.corpus.len(),
            compiled.digest
        );
    } else {
        let inputs = compiler.plan()?;
        println!("DRY RUN inputs={}", inputs.len());
        for input in inputs {
            println!("{input}");
        }
    }
    Ok(EXIT_PASS)
}

fn retrieve(ws: &Workspace, args: &ArgMatches) -> Result<i32> {
    let query = args.get_one::<String>("query").context("query is required")?;
    let top_k = args
        .get_one::<usize>("top-k")
        .copied()
        .unwrap_or(ws.config.retrieval.top_k);

    let retriever = Retriever::new(&ws.load_corpus(&ws.corpus_path())?);
    let hits = retriever.retrieve(query, top_k);
    println!("hits={}", hits.len());
    for hit in hits {
        println!("{:.4} {}", hit.score, hit.id);
    }
    Ok(EXIT_PASS)
}

fn check_policy(ws: &Workspace, args: &ArgMatches) -> Result<i32> {
    let patch = match args.get_one::<PathBuf>("patch") {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("reading patch {}", path.display()))?,
        None => {
            let mut patch = String::new();
            std::io::stdin()
                .read_to_string(&mut patch)
                .context("reading patch from stdin")?;
            patch
        }
    };

    match PolicyEnforcer::new(&ws.config.policy)?.check(&patch) {
        Ok(()) => {
            println!("Policy passed");
            Ok(EXIT_PASS)
        }
        Err(violation) => {
            println!("{violation}");
            Ok(EXIT_FAIL)
        }
    }
}

fn load_grounding(args: &ArgMatches) -> Result<Option<GroundingDocument>> {
    let path = args
        .get_one::<PathBuf>("grounding")
        .context("grounding file is required")?;
    if !path.exists() {
        println!("FAIL: {} missing", path.display());
        return Ok(None);
    }
    Ok(Some(GroundingDocument::load(path)?))
}

fn check_grounding(ws: &Workspace, args: &ArgMatches) -> Result<i32> {
    let Some(doc) = load_grounding(args)? else {
        return Ok(EXIT_FAIL);
    };
    let corpus = ws.load_corpus(&ws.corpus_path())?;

    match GroundingExistenceGate::new(&ws.config.policy).check(&doc.retrieval, &corpus) {
        Ok(()) => {
            println!("PASS: grounding valid");
            Ok(EXIT_PASS)
        }
        Err(reason) => {
            println!("FAIL: {reason}");
            Ok(EXIT_FAIL)
        }
    }
}

fn validate_grounding(ws: &Workspace, args: &ArgMatches) -> Result<i32> {
    let Some(doc) = load_grounding(args)? else {
        return Ok(EXIT_FAIL);
    };
    let corpus_path = args
        .get_one::<PathBuf>("corpus")
        .cloned()
        .unwrap_or_else(|| ws.corpus_path());
    if !corpus_path.exists() {
        bail!("corpus not found: {}", corpus_path.display());
    }
    let corpus = ws.load_corpus(&corpus_path)?;

    match GroundingSufficiencyGate::new(&ws.config.policy).check(&doc.retrieval, &corpus) {
        Ok(()) => {
            println!("PASS: grounding validator ok");
            Ok(EXIT_PASS)
        }
        Err(reason) => {
            println!("FAIL: {reason}");
            Ok(EXIT_FAIL)
        }
    }
}

fn sandbox(ws: &Workspace, args: &ArgMatches) -> Result<i32> {
    let module = args.get_one::<String>("module").context("module is required")?;
    let outcome = ContainerSandbox::new(&ws.repo, ws.config.sandbox.clone()).run(module)?;

    if outcome.passed() {
        println!("PASS: module {module}");
    } else {
        println!("FAIL: module {module} exit={}", outcome.exit_code);
    }
    print!("{}", outcome.stdout);
    eprint!("{}", outcome.stderr);
    Ok(if outcome.passed() { EXIT_PASS } else { EXIT_FAIL })
}

fn run(ws: &Workspace, args: &ArgMatches) -> Result<i32> {
    let task_path = args.get_one::<PathBuf>("task").context("task file is required")?;
    let mut model_cmd = args
        .get_many::<String>("model-cmd")
        .context("model command is required")?
        .cloned();
    let program = model_cmd.next().context("model command is empty")?;

    let task = Task::load(task_path)?;
    tracing::info!(task = %task_path.display(), model = %program, "Starting pipeline");
    let model = CommandModel::new(program, model_cmd);
    let applier = GitPatchApplier::new(&ws.repo);
    let sandbox = ContainerSandbox::new(&ws.repo, ws.config.sandbox.clone());

    match Orchestrator::new(&ws.repo, ws.config.clone(), &model, &applier, &sandbox).run(&task) {
        Ok(report) => {
            println!("SUCCESS: all gates passed");
            println!(
                "run={} attempts={} modules={}",
                report.run_id,
                report.attempts.len(),
                report.modules.join(",")
            );
            Ok(EXIT_PASS)
        }
        Err(err @ (PipelineError::RetrievalInsufficient { .. }
        | PipelineError::AttemptBudgetExhausted { .. })) => {
            println!("FAILURE: {err}");
            Ok(EXIT_FAIL)
        }
        Err(err) => Err(err.into()),
    }
}

fn execute(matches: &ArgMatches) -> Result<i32> {
    let ws = Workspace::from_matches(matches)?;
    match matches.subcommand() {
        Some(("compile", args)) => compile(&ws, args),
        Some(("retrieve", args)) => retrieve(&ws, args),
        Some(("check-policy", args)) => check_policy(&ws, args),
        Some(("check-grounding", args)) => check_grounding(&ws, args),
        Some(("validate-grounding", args)) => validate_grounding(&ws, args),
        Some(("sandbox", args)) => sandbox(&ws, args),
        Some(("run", args)) => run(&ws, args),
        _ => bail!("unknown command"),
    }
}

fn main() {
    let matches = cli().get_matches();
    init_tracing(matches.get_flag("log-json"));

    let code = match execute(&matches) {
        Ok(code) => code,
        Err(err) => {
            tracing::error!(error = %format!("{err:#}"), "Command failed");
            println!("ERROR: {err:#}");
            EXIT_ERROR
        }
    };
    std::process::exit(code);
}
