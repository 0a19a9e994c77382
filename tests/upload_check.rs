mod common;

use assert_matches::assert_matches;
use common::FakeBackend;
use keyword_client::{
    config::Config,
    error::{ClientError, ValidationError},
    request::InputSource,
    upload::{check_csv, inspect_csv, parse_header, upload_csv},
};
use std::io::Write;
use tempfile::Builder;

fn csv_file(contents: &str, suffix: &str) -> tempfile::NamedTempFile {
    let mut f = Builder::new().suffix(suffix).tempfile().unwrap();
    f.write_all(contents.as_bytes()).unwrap();
    f
}

#[test]
fn accepts_valid_csv() {
    let f = csv_file(
        "\u{feff}Title,\"views\",views_per_year\nys origin,1200,300.5\n\nys 8,50,10\n",
        ".CSV",
    );
    let check = check_csv(&Config::default(), f.path()).unwrap();
    assert_eq!(check.columns, ["title", "views", "views_per_year"]);
    assert_eq!(check.data_rows, 2);
}

#[test]
fn rejects_wrong_extension() {
    let f = csv_file("title,views,views_per_year\n", ".txt");
    assert_matches!(
        check_csv(&Config::default(), f.path()),
        Err(ClientError::Validation(ValidationError::NotCsv(_)))
    );
}

#[test]
fn rejects_missing_columns() {
    let f = csv_file("title,views\nys,1\n", ".csv");
    let err = check_csv(&Config::default(), f.path()).unwrap_err();
    assert_matches!(
        err,
        ClientError::Validation(ValidationError::MissingColumns(ref cols)) if cols == &["views_per_year".to_string()]
    );
}

#[test]
fn rejects_oversized_file() {
    let mut cfg = Config::default();
    cfg.upload.max_file_bytes = 10;
    let f = csv_file("title,views,views_per_year\nys,1,1\n", ".csv");
    assert_matches!(
        check_csv(&cfg, f.path()),
        Err(ClientError::Validation(ValidationError::FileTooLarge { limit: 10, .. }))
    );
}

#[test]
fn header_parsing_trims_quotes() {
    assert_eq!(parse_header(" \"a\" , B ,,c"), ["a", "b", "c"]);
}

#[tokio::test]
async fn upload_returns_server_path() {
    let f = csv_file("title,views,views_per_year\nys,1,1\nys 2,2,2\n", ".csv");
    let backend = FakeBackend::default();
    let uploaded = upload_csv(&Config::default(), &backend, f.path()).await.unwrap();
    assert_eq!(uploaded.keyword_count, Some(2));
    assert_eq!(
        uploaded.input_source(),
        InputSource::UploadedFile {
            filepath: "../uploads/abc_keywords.csv".into()
        }
    );
    assert_eq!(backend.count("upload"), 1);
}

#[tokio::test]
async fn invalid_csv_is_never_uploaded() {
    let f = csv_file("keyword\nys\n", ".csv");
    let backend = FakeBackend::default();
    assert!(upload_csv(&Config::default(), &backend, f.path()).await.is_err());
    assert!(backend.calls().is_empty());
}

#[tokio::test(flavor = "current_thread")]
async fn inspection_works_on_a_single_thread_runtime() {
    let f = csv_file("title,views,views_per_year\nys,1,1\n", ".csv");
    let check = inspect_csv(&Config::default(), f.path()).await.unwrap();
    assert_eq!(check.data_rows, 1);

    let mut cfg = Config::default();
    cfg.upload.max_file_bytes = 4;
    assert_matches!(
        inspect_csv(&cfg, f.path()).await,
        Err(ClientError::Validation(ValidationError::FileTooLarge { limit: 4, .. }))
    );
}
