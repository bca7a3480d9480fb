use std::process::ExitCode;

use camino::Utf8PathBuf;
use clap::{Args, Parser, Subcommand};
use miette::IntoDiagnostic;
use tracing_subscriber::EnvFilter;

use sentinel_fetch::app::{self, App, FailurePolicy, FetchResult};
use sentinel_fetch::client::ObjectStoreHttpClient;
use sentinel_fetch::config::{ConfigLoader, ResolvedConfig};
use sentinel_fetch::domain::ProductId;
use sentinel_fetch::error::FetchError;
use sentinel_fetch::output::{ConsoleProgress, JsonOutput, OutputMode, human_bytes};
use sentinel_fetch::retry::{RetryPolicy, ThreadSleeper};

#[derive(Parser)]
#[command(name = "s2fetch")]
#[command(about = "Download Sentinel-2 tiles band by band from the public Google Cloud bucket")]
#[command(version, author)]
struct Cli {
    #[arg(long, global = true)]
    non_interactive: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Download tiles (ids on the command line or from s2fetch.json)")]
    Fetch(FetchArgs),
    #[command(about = "Print where a product lives in the bucket")]
    Locate(LocateArgs),
}

#[derive(Args, Clone)]
struct FetchArgs {
    products: Vec<String>,

    #[arg(long, short)]
    out: Option<String>,

    #[arg(long)]
    base_url: Option<String>,

    #[arg(long)]
    config: Option<String>,

    #[arg(long)]
    concurrency: Option<usize>,

    #[arg(long)]
    max_attempts: Option<u32>,

    #[arg(long)]
    keep_going: bool,
}

#[derive(Args)]
struct LocateArgs {
    product: String,

    #[arg(long)]
    base_url: Option<String>,
}

fn main() -> ExitCode {
    if let Err(report) = run() {
        eprintln!("{report:?}");
        if let Some(err) = report.downcast_ref::<FetchError>() {
            return ExitCode::from(map_exit_code(err));
        }
        return ExitCode::from(1);
    }
    ExitCode::SUCCESS
}

fn map_exit_code(error: &FetchError) -> u8 {
    match error {
        FetchError::EmptyManifest(_) | FetchError::MissingConfig => 2,
        FetchError::ManifestFetchFailure { .. }
        | FetchError::UnexpectedContentType { .. }
        | FetchError::DownloadRetriesExhausted(_)
        | FetchError::Http(_) => 3,
        _ => 1,
    }
}

fn run() -> miette::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let output_mode = if cli.non_interactive {
        OutputMode::NonInteractive
    } else {
        OutputMode::Interactive
    };

    match cli.command {
        Commands::Fetch(args) => run_fetch(args, output_mode),
        Commands::Locate(args) => run_locate(args, output_mode),
    }
}

fn run_fetch(args: FetchArgs, output_mode: OutputMode) -> miette::Result<()> {
    let products = args
        .products
        .iter()
        .map(|value| value.parse::<ProductId>())
        .collect::<Result<Vec<_>, FetchError>>()?;

    let resolved = if products.is_empty() {
        ConfigLoader::resolve(args.config.as_deref())?
    } else {
        ConfigLoader::resolve_or_default(args.config.as_deref())?
    };
    let resolved = apply_overrides(resolved, products, &args);
    if resolved.products.is_empty() {
        return Err(miette::Report::msg(
            "no product ids given (pass them as arguments or list them in s2fetch.json)",
        ));
    }

    let client = ObjectStoreHttpClient::new()?;
    let app = App::new(&client, &ThreadSleeper, resolved.options.clone());

    let result = match output_mode {
        OutputMode::NonInteractive => {
            let result = app.fetch_batch(
                &resolved.products,
                &resolved.target_dir,
                resolved.base_url.as_deref(),
                &JsonOutput,
            )?;
            JsonOutput::print_fetch(&result).into_diagnostic()?;
            result
        }
        OutputMode::Interactive => {
            let result = app.fetch_batch(
                &resolved.products,
                &resolved.target_dir,
                resolved.base_url.as_deref(),
                &ConsoleProgress,
            )?;
            print_fetch_summary(&result);
            result
        }
    };

    let failed = result
        .items
        .iter()
        .filter(|item| item.status == "failed")
        .count();
    if failed > 0 {
        return Err(miette::Report::msg(format!(
            "{failed} of {} tiles failed",
            result.items.len()
        )));
    }
    Ok(())
}

fn apply_overrides(
    mut resolved: ResolvedConfig,
    products: Vec<ProductId>,
    args: &FetchArgs,
) -> ResolvedConfig {
    if !products.is_empty() {
        resolved.products = products;
    }
    if let Some(out) = &args.out {
        resolved.target_dir = Utf8PathBuf::from(out);
    }
    if let Some(base_url) = &args.base_url {
        resolved.base_url = Some(base_url.clone());
    }
    if let Some(concurrency) = args.concurrency {
        resolved.options.concurrency = concurrency.max(1);
    }
    if let Some(max_attempts) = args.max_attempts {
        resolved.options.retry = RetryPolicy::new(max_attempts);
    }
    if args.keep_going {
        resolved.options.failure_policy = FailurePolicy::CollectAll;
    }
    resolved
}

fn run_locate(args: LocateArgs, output_mode: OutputMode) -> miette::Result<()> {
    let product: ProductId = args.product.parse()?;
    let located = app::locate(&product, args.base_url.as_deref())?;
    match output_mode {
        OutputMode::NonInteractive => JsonOutput::print_locate(&located).into_diagnostic(),
        OutputMode::Interactive => {
            println!("product:   {}", located.product_id);
            println!("level:     {}", located.processing_level);
            println!(
                "tile:      {}/{}/{}",
                located.coordinates.grid_square,
                located.coordinates.latitude_band,
                located.coordinates.path_number
            );
            println!("location:  {}", located.store_location);
            println!("manifest:  {}", located.manifest_url);
            Ok(())
        }
    }
}

fn print_fetch_summary(result: &FetchResult) {
    let green = "\x1b[32m";
    let red = "\x1b[31m";
    let cyan = "\x1b[36m";
    let reset = "\x1b[0m";

    let downloaded = result
        .items
        .iter()
        .filter(|item| item.status == "downloaded")
        .count();
    println!("{cyan}s2fetch summary{reset}");
    println!("{green}downloaded tiles: {downloaded}{reset}");
    if downloaded < result.items.len() {
        println!("{red}failed tiles: {}{reset}", result.items.len() - downloaded);
    }

    for item in &result.items {
        match (&item.scene_dir, &item.error) {
            (Some(dir), _) => println!(
                "{green}  {} ({} files, {}){reset}\n    {dir}",
                item.product_id,
                item.files,
                human_bytes(item.bytes)
            ),
            (None, Some(error)) => println!("{red}  {}: {error}{reset}", item.product_id),
            (None, None) => println!("  {}", item.product_id),
        }
    }
}
