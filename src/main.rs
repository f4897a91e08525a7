use clap::Parser;
use pg_ingest::runner::{INDEX_LABEL, LoadArgs, describe_source, run_load};
use std::path::PathBuf;

/// Ingest CSV data to Postgres
#[derive(Parser, Clone)]
#[command(version)]
struct Args {
    /// user name for postgres
    #[arg(long)]
    user: String,

    /// password for postgres
    #[arg(long)]
    password: String,

    /// host for postgres
    #[arg(long)]
    host: String,

    /// port for postgres
    #[arg(long)]
    port: u16,

    /// database name for postgres
    #[arg(long)]
    db: String,

    /// name of the table where we will write the results to
    #[arg(long = "table_name")]
    table_name: String,

    /// url of the csv or parquet file (http, https, ftp, file:// or a local path)
    #[arg(long)]
    url: String,

    /// Rows per CSV batch
    #[arg(long = "batch_size", default_value = "100000")]
    batch_size: usize,

    /// Comma-separated columns converted to timestamps on the CSV path
    #[arg(
        long = "parse_dates",
        value_delimiter = ',',
        default_value = "tpep_pickup_datetime,tpep_dropoff_datetime"
    )]
    parse_dates: Vec<String>,

    /// Skip timestamp conversion (e.g. for lookup tables)
    #[arg(long = "no_parse_dates", conflicts_with = "parse_dates")]
    no_parse_dates: bool,

    /// Do not write the leading "index" row-ordinal column
    #[arg(long = "no_index")]
    no_index: bool,

    /// Parquet only: create the table if it doesn't exist
    #[arg(long = "if_not_exists")]
    if_not_exists: bool,

    /// Directory for the downloaded file
    #[arg(long = "work_dir", default_value = ".")]
    work_dir: PathBuf,

    /// Print the CREATE TABLE statement for the source and exit without loading
    #[arg(long = "print_schema")]
    print_schema: bool,

    /// Quiet mode - minimal output, only show summary
    #[arg(short, long)]
    quiet: bool,
}

impl Args {
    fn into_load_args(self) -> LoadArgs {
        let timestamp_columns = if self.no_parse_dates {
            Vec::new()
        } else {
            self.parse_dates
                .into_iter()
                .map(|c| c.trim().to_string())
                .filter(|c| !c.is_empty())
                .collect()
        };

        LoadArgs {
            user: self.user,
            password: self.password,
            host: self.host,
            port: self.port,
            database: self.db,
            url: self.url,
            table_name: self.table_name,
            batch_size: self.batch_size,
            timestamp_columns,
            index_label: (!self.no_index).then(|| INDEX_LABEL.to_string()),
            create_table_if_missing: self.if_not_exists,
            work_dir: self.work_dir,
            quiet: self.quiet,
        }
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let quiet = args.quiet;
    let print_schema = args.print_schema;

    // Initialize tracing based on quiet mode
    use tracing_subscriber::{EnvFilter, FmtSubscriber};
    let filter = if quiet {
        EnvFilter::new("pg_ingest=warn,sqlx=off")
    } else {
        EnvFilter::new("pg_ingest=info,sqlx=off")
    };
    let subscriber = FmtSubscriber::builder().with_env_filter(filter).finish();
    let _ = tracing::subscriber::set_global_default(subscriber);

    let load_args = args.into_load_args();

    if print_schema {
        println!("{}", describe_source(&load_args).await?);
        return Ok(());
    }

    if !quiet {
        println!("Postgres Batch Loader");
        println!("=====================");
        println!("Source: {}", load_args.url);
        println!("Table: {}", load_args.table_name);
        println!();
    }

    let result = run_load(load_args).await?;

    let fmt_ms = |v: Option<u64>| v.map_or_else(|| "-".to_string(), |ms| format!("{}ms", ms));
    let (p50, p90, p99) = result.percentiles;

    println!();
    println!("Load Summary");
    println!("============");
    println!("Run ID: {}", result.run_id);
    println!("Format: {}", result.source_kind);
    println!("Local file: {}", result.local_path.display());
    println!("Table replaced: {}", result.tables_replaced > 0);
    println!("Batches written: {}", result.batches_written);
    println!("Rows written: {}", result.rows_written);
    println!("Duration: {:.2}s", result.duration.as_secs_f64());
    println!(
        "Batch write time: p50 {}, p90 {}, p99 {}",
        fmt_ms(p50),
        fmt_ms(p90),
        fmt_ms(p99)
    );
    println!(
        "Throughput: {:.2} rows/sec",
        result.rows_written as f64 / result.duration.as_secs_f64().max(f64::EPSILON)
    );

    Ok(())
}
