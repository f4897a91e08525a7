//! Integration tests for the load pipeline
//!
//! These tests use SQLite in-memory databases and real CSV and Parquet files
//! to test end to end scenarios of the loader.

#[cfg(test)]
mod tests {
    use crate::{
        db::{Pool, pool::PoolConnection},
        formats::parquet::trips_parquet,
        runner::{LoadArgs, LoadResult, SourceKind, run_load, tests::local_args},
    };
    use chrono::NaiveDateTime;
    use flate2::Compression;
    use flate2::write::GzEncoder;
    use std::io::Write;
    use tempfile::TempDir;
    use tokio::fs::File;
    use tokio::io::AsyncWriteExt;

    // ============ Test Helpers ============

    const TRIPS_HEADER: &str = "VendorID,tpep_pickup_datetime,tpep_dropoff_datetime,passenger_count,trip_distance,store_and_fwd_flag,fare_amount\n";

    fn trip_line(i: usize) -> String {
        format!(
            "{},2021-01-01 00:{:02}:{:02},2021-01-01 01:{:02}:{:02},{},{}.{},{},{}\n",
            i % 2 + 1,
            i % 60,
            i % 59,
            i % 60,
            i % 57,
            i % 5,
            i % 20,
            i % 10,
            if i % 7 == 0 { "Y" } else { "N" },
            i % 40 + 3
        )
    }

    /// Helper to create a trip CSV file with the given number of data rows
    async fn create_trips_csv(dir: &TempDir, filename: &str, num_rows: usize) -> String {
        let path = dir.path().join(filename);
        let mut file = File::create(&path).await.unwrap();
        file.write_all(TRIPS_HEADER.as_bytes()).await.unwrap();
        for i in 0..num_rows {
            file.write_all(trip_line(i).as_bytes()).await.unwrap();
        }
        file.flush().await.unwrap();
        path.to_str().unwrap().to_string()
    }

    /// Helper to create a gzipped trip CSV file
    fn create_trips_csv_gz(dir: &TempDir, filename: &str, num_rows: usize) -> String {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(TRIPS_HEADER.as_bytes()).unwrap();
        for i in 0..num_rows {
            encoder.write_all(trip_line(i).as_bytes()).unwrap();
        }
        let path = dir.path().join(filename);
        std::fs::write(&path, encoder.finish().unwrap()).unwrap();
        path.to_str().unwrap().to_string()
    }

    /// Helper to create a test file with custom content
    async fn create_file_with_content(dir: &TempDir, filename: &str, content: &str) -> String {
        let path = dir.path().join(filename);
        let mut file = File::create(&path).await.unwrap();
        file.write_all(content.as_bytes()).await.unwrap();
        file.flush().await.unwrap();
        path.to_str().unwrap().to_string()
    }

    /// Helper to create a SQLite pool and table
    async fn setup_sqlite_table(table_name: &str, columns: &str) -> Pool {
        let pool = Pool::sqlite_in_memory().await.unwrap();
        pool.execute_query(&format!("CREATE TABLE {} ({})", table_name, columns))
            .await
            .unwrap();
        pool
    }

    /// Helper to run a load of `url` into `yellow_taxi_trips` with a fresh work dir
    async fn load(pool: &Pool, url: &str, configure: impl FnOnce(&mut LoadArgs)) -> LoadResult {
        let work_dir = TempDir::new().unwrap();
        let mut args = local_args(url, work_dir.path(), Some(pool.clone()));
        configure(&mut args);
        run_load(args).await.unwrap()
    }

    /// Helper to query table row count
    async fn get_table_count(pool: &Pool, table_name: &str) -> i64 {
        if let Ok(mut conn) = pool.acquire().await
            && let PoolConnection::Sqlite(ref mut sqlite_conn) = conn
        {
            let sql = format!("SELECT COUNT(*) FROM {}", table_name);
            let (count,): (i64,) = sqlx::query_as(&sql)
                .fetch_one(&mut **sqlite_conn)
                .await
                .unwrap();
            return count;
        }
        panic!("Expected a SQLite connection");
    }

    // ============ CSV path ============

    #[tokio::test]
    async fn test_csv_load_replaces_and_appends_in_batches() {
        let dir = TempDir::new().unwrap();
        let csv_path = create_trips_csv(&dir, "yellow_tripdata_2021-01.csv", 7).await;
        let pool = Pool::sqlite_in_memory().await.unwrap();

        let result = load(&pool, &csv_path, |args| args.batch_size = 3).await;

        assert_eq!(result.source_kind, SourceKind::Csv);
        assert_eq!(result.tables_replaced, 1);
        assert_eq!(result.batches_written, 3);
        assert_eq!(result.rows_written, 7);
        assert!(result.local_path.ends_with("output.csv"));
        assert_eq!(get_table_count(&pool, "yellow_taxi_trips").await, 7);

        // The leading index column continues across batches
        let indexes: Vec<(i64,)> =
            sqlx::query_as("SELECT \"index\" FROM yellow_taxi_trips ORDER BY \"index\"")
                .fetch_all(pool.sqlite())
                .await
                .unwrap();
        let indexes: Vec<i64> = indexes.into_iter().map(|(i,)| i).collect();
        assert_eq!(indexes, (0..7).collect::<Vec<i64>>());
    }

    #[tokio::test]
    async fn test_csv_load_replaces_existing_table() {
        let dir = TempDir::new().unwrap();
        let csv_path = create_trips_csv(&dir, "trips.csv", 4).await;
        let pool = setup_sqlite_table("yellow_taxi_trips", "unrelated TEXT").await;
        pool.execute_query("INSERT INTO yellow_taxi_trips VALUES ('stale')")
            .await
            .unwrap();

        load(&pool, &csv_path, |_| {}).await;
        // Loading twice still leaves exactly one copy
        load(&pool, &csv_path, |_| {}).await;

        assert_eq!(get_table_count(&pool, "yellow_taxi_trips").await, 4);
    }

    #[tokio::test]
    async fn test_csv_timestamps_stored_as_timestamps() {
        let dir = TempDir::new().unwrap();
        let csv_path = create_trips_csv(&dir, "trips.csv", 3).await;
        let pool = Pool::sqlite_in_memory().await.unwrap();

        load(&pool, &csv_path, |_| {}).await;

        let rows: Vec<(NaiveDateTime, NaiveDateTime, f64, String)> = sqlx::query_as(
            "SELECT tpep_pickup_datetime, tpep_dropoff_datetime, trip_distance, store_and_fwd_flag \
             FROM yellow_taxi_trips ORDER BY \"index\"",
        )
        .fetch_all(pool.sqlite())
        .await
        .unwrap();

        let expected_pickup =
            NaiveDateTime::parse_from_str("2021-01-01 00:01:01", "%Y-%m-%d %H:%M:%S").unwrap();
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[1].0, expected_pickup);
        assert!(rows[1].1 > rows[1].0);
        assert_eq!(rows[1].2, 1.1);
        assert_eq!(rows[0].3, "Y");
    }

    #[tokio::test]
    async fn test_csv_gz_load() {
        let dir = TempDir::new().unwrap();
        let csv_path = create_trips_csv_gz(&dir, "yellow_tripdata_2021-01.csv.gz", 5);
        let pool = Pool::sqlite_in_memory().await.unwrap();

        let result = load(&pool, &csv_path, |_| {}).await;

        assert_eq!(result.source_kind, SourceKind::CsvGz);
        assert!(result.local_path.ends_with("output.csv.gz"));
        assert_eq!(result.rows_written, 5);
        assert_eq!(get_table_count(&pool, "yellow_taxi_trips").await, 5);
    }

    #[tokio::test]
    async fn test_lookup_table_without_dates_or_index() {
        let dir = TempDir::new().unwrap();
        let csv_path = create_file_with_content(
            &dir,
            "taxi+_zone_lookup.csv",
            "\"LocationID\",\"Borough\",\"Zone\",\"service_zone\"\n\
             1,\"EWR\",\"Newark Airport\",\"EWR\"\n\
             2,\"Queens\",\"Jamaica Bay\",\"Boro Zone\"\n\
             264,\"Unknown\",\"NV\",\"N/A\"\n",
        )
        .await;
        let pool = Pool::sqlite_in_memory().await.unwrap();

        load(&pool, &csv_path, |args| {
            args.table_name = "zones".to_string();
            args.timestamp_columns.clear();
            args.index_label = None;
        })
        .await;

        let rows: Vec<(i64, String, Option<String>)> =
            sqlx::query_as("SELECT \"LocationID\", \"Borough\", service_zone FROM zones ORDER BY 1")
                .fetch_all(pool.sqlite())
                .await
                .unwrap();

        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0], (1, "EWR".to_string(), Some("EWR".to_string())));
        // N/A is read as NULL
        assert_eq!(rows[2].2, None);

        let columns: Vec<(String,)> = sqlx::query_as("SELECT name FROM pragma_table_info('zones')")
            .fetch_all(pool.sqlite())
            .await
            .unwrap();
        assert!(columns.iter().all(|(name,)| name != "index"));
    }

    #[tokio::test]
    async fn test_unknown_suffix_loads_as_csv() {
        let dir = TempDir::new().unwrap();
        let source = create_trips_csv(&dir, "trips.txt", 2).await;
        let pool = Pool::sqlite_in_memory().await.unwrap();

        let result = load(&pool, &source, |_| {}).await;

        assert_eq!(result.source_kind, SourceKind::Csv);
        assert_eq!(get_table_count(&pool, "yellow_taxi_trips").await, 2);
    }

    #[tokio::test]
    async fn test_later_batch_type_conflict_aborts_after_earlier_commits() {
        let dir = TempDir::new().unwrap();
        let mut content = TRIPS_HEADER.to_string();
        for i in 0..4 {
            content.push_str(&trip_line(i));
        }
        content.push_str("two,2021-01-01 02:00:00,2021-01-01 02:10:00,1,1.0,N,5\n");
        let csv_path = create_file_with_content(&dir, "trips.csv", &content).await;
        let pool = Pool::sqlite_in_memory().await.unwrap();

        let work_dir = TempDir::new().unwrap();
        let mut args = local_args(&csv_path, work_dir.path(), Some(pool.clone()));
        args.batch_size = 2;
        let err = run_load(args).await.unwrap_err();

        assert!(format!("{:#}", err).contains("VendorID"));
        assert_eq!(get_table_count(&pool, "yellow_taxi_trips").await, 4);
    }

    #[tokio::test]
    async fn test_later_batch_integer_overflow_aborts_after_earlier_commits() {
        let dir = TempDir::new().unwrap();
        let mut content = TRIPS_HEADER.to_string();
        for i in 0..4 {
            content.push_str(&trip_line(i));
        }
        content.push_str(
            "99999999999999999999,2021-01-01 02:00:00,2021-01-01 02:10:00,1,1.0,N,5\n",
        );
        let csv_path = create_file_with_content(&dir, "trips.csv", &content).await;
        let pool = Pool::sqlite_in_memory().await.unwrap();

        let work_dir = TempDir::new().unwrap();
        let mut args = local_args(&csv_path, work_dir.path(), Some(pool.clone()));
        args.batch_size = 2;
        let err = run_load(args).await.unwrap_err();

        assert!(format!("{:#}", err).contains("VendorID"));
        assert_eq!(get_table_count(&pool, "yellow_taxi_trips").await, 4);

        let max_vendor: (i64,) = sqlx::query_as("SELECT MAX(\"VendorID\") FROM yellow_taxi_trips")
            .fetch_one(pool.sqlite())
            .await
            .unwrap();
        assert!(max_vendor.0 < i64::MAX);
    }

    #[tokio::test]
    async fn test_malformed_timestamp_aborts_run() {
        let dir = TempDir::new().unwrap();
        let content = format!("{}1,not a date,2021-01-01 00:10:00,1,1.0,N,5\n", TRIPS_HEADER);
        let csv_path = create_file_with_content(&dir, "trips.csv", &content).await;
        let pool = Pool::sqlite_in_memory().await.unwrap();

        let work_dir = TempDir::new().unwrap();
        let args = local_args(&csv_path, work_dir.path(), Some(pool.clone()));
        let err = run_load(args).await.unwrap_err();

        assert!(format!("{:#}", err).contains("tpep_pickup_datetime"));
    }

    // ============ Parquet path ============

    #[tokio::test]
    async fn test_parquet_appends_to_existing_table() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("yellow_tripdata_2021-01.parquet");
        std::fs::write(&path, trips_parquet(6)).unwrap();
        let pool = setup_sqlite_table(
            "yellow_taxi_trips",
            "\"index\" BIGINT, \"VendorID\" BIGINT, tpep_pickup_datetime TIMESTAMP, \
             fare_amount DOUBLE PRECISION, store_and_fwd_flag TEXT",
        )
        .await;
        pool.execute_query(
            "INSERT INTO yellow_taxi_trips VALUES (0, 9, '2020-12-31 23:00:00', 1.0, 'N')",
        )
        .await
        .unwrap();

        let result = load(&pool, path.to_str().unwrap(), |_| {}).await;

        assert_eq!(result.source_kind, SourceKind::Parquet);
        assert_eq!(result.tables_replaced, 0);
        assert_eq!(result.batches_written, 1);
        // No replace: the existing row survives
        assert_eq!(get_table_count(&pool, "yellow_taxi_trips").await, 7);

        let (pickup,): (NaiveDateTime,) = sqlx::query_as(
            "SELECT tpep_pickup_datetime FROM yellow_taxi_trips WHERE \"VendorID\" = 2 ORDER BY fare_amount LIMIT 1",
        )
        .fetch_one(pool.sqlite())
        .await
        .unwrap();
        assert_eq!(
            pickup,
            NaiveDateTime::parse_from_str("2021-01-01 00:01:00", "%Y-%m-%d %H:%M:%S").unwrap()
        );
    }

    #[tokio::test]
    async fn test_parquet_gz_load_with_if_not_exists() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("yellow_tripdata_2021-01.parquet.gz");
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(&trips_parquet(4)).unwrap();
        std::fs::write(&path, encoder.finish().unwrap()).unwrap();
        let pool = Pool::sqlite_in_memory().await.unwrap();

        let result = load(&pool, path.to_str().unwrap(), |args| {
            args.create_table_if_missing = true;
        })
        .await;

        assert_eq!(result.source_kind, SourceKind::ParquetGz);
        assert!(result.local_path.ends_with("output.parquet.gz"));
        assert_eq!(get_table_count(&pool, "yellow_taxi_trips").await, 4);
    }

    #[tokio::test]
    async fn test_parquet_missing_table_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("yellow_tripdata_2021-01.parquet");
        std::fs::write(&path, trips_parquet(2)).unwrap();
        let pool = Pool::sqlite_in_memory().await.unwrap();

        let work_dir = TempDir::new().unwrap();
        let args = local_args(path.to_str().unwrap(), work_dir.path(), Some(pool));
        let err = run_load(args).await.unwrap_err();

        assert!(
            format!("{:#}", err).contains("yellow_taxi_trips"),
            "unexpected error: {:#}",
            err
        );
    }

    // ============ Sources ============

    #[tokio::test]
    async fn test_file_url_source() {
        let dir = TempDir::new().unwrap();
        let csv_path = create_trips_csv(&dir, "trips.csv", 3).await;
        let url = url::Url::from_file_path(&csv_path).unwrap();
        let pool = Pool::sqlite_in_memory().await.unwrap();

        let result = load(&pool, url.as_str(), |_| {}).await;

        assert_eq!(result.rows_written, 3);
    }

    #[tokio::test]
    async fn test_missing_source_file_error() {
        let pool = Pool::sqlite_in_memory().await.unwrap();
        let work_dir = TempDir::new().unwrap();
        let args = local_args("/nonexistent/trips.csv", work_dir.path(), Some(pool));

        assert!(run_load(args).await.is_err());
    }
}
