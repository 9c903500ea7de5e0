use std::fs;

use cht_core::contract::ProductId;
use cht_core::format::OutputFormat;
use cht_core::pipeline::{detect_product, plan_transform, run_transform, TransformRequest};
use cht_core::product::ProductCatalog;
use cht_core::ConvertError;
use tempfile::tempdir;

fn transform(request: &TransformRequest) -> cht_core::Result<(String, usize)> {
    let plan = plan_transform(request, &ProductCatalog::default())?;
    let mut out = Vec::new();
    let report = run_transform(plan, &mut out)?;
    Ok((String::from_utf8(out).unwrap(), report.records))
}

#[test]
fn single_csv_file_to_json() {
    let tmp = tempdir().unwrap();
    let input = tmp.path().join("prod217.csv");
    fs::write(&input, "CompanyNumber,Name\n001,\"Acme, Ltd\"\n002,Beta\n").unwrap();

    let (out, records) = transform(&TransformRequest {
        input,
        product: None,
        format: OutputFormat::Json,
    })
    .unwrap();
    assert_eq!(records, 2);
    assert_eq!(
        out,
        "[{\"CompanyNumber\":\"001\",\"Name\":\"Acme, Ltd\"},{\"CompanyNumber\":\"002\",\"Name\":\"Beta\"}]\n"
    );
}

#[test]
fn directory_files_are_converted_independently() {
    let tmp = tempdir().unwrap();
    fs::create_dir_all(tmp.path().join("b")).unwrap();
    fs::write(tmp.path().join("part_20230101.csv"), "id,x\n1,a\n").unwrap();
    fs::write(tmp.path().join("b/part_20230102.csv"), "id,y\n2,b\n").unwrap();
    fs::write(tmp.path().join("ignored.txt"), "id\n3\n").unwrap();

    let (out, records) = transform(&TransformRequest {
        input: tmp.path().to_path_buf(),
        product: Some(ProductId::Prod217),
        format: OutputFormat::Csv,
    })
    .unwrap();
    assert_eq!(records, 2);
    assert_eq!(out, "id,x\n1,a\nid,y\n2,b\n");
}

#[test]
fn malformed_row_aborts_with_decode_error() {
    let tmp = tempdir().unwrap();
    let input = tmp.path().join("bad.csv");
    fs::write(&input, "id,name\n1,A\n2,B,extra\n").unwrap();
    let err = transform(&TransformRequest {
        input,
        product: None,
        format: OutputFormat::Csv,
    })
    .unwrap_err();
    assert!(matches!(err, ConvertError::Decode { .. }));
}

#[test]
fn missing_input_is_not_found() {
    let tmp = tempdir().unwrap();
    let err = transform(&TransformRequest {
        input: tmp.path().join("absent.csv"),
        product: None,
        format: OutputFormat::Csv,
    })
    .unwrap_err();
    assert_eq!(
        err.to_string(),
        format!(
            "File or directory \"{}\" does not exist",
            tmp.path().join("absent.csv").display()
        )
    );
}

#[test]
fn update_file_keeps_action_column_and_deletion_rows() {
    let tmp = tempdir().unwrap();
    let input = tmp.path().join("Prod101_20230102.txt");
    fs::write(&input, "id,name,action\n1,A,U\n2,B,D\n").unwrap();
    let request = |format| TransformRequest {
        input: input.clone(),
        product: None,
        format,
    };

    let (csv, records) = transform(&request(OutputFormat::Csv)).unwrap();
    assert_eq!(records, 2);
    assert_eq!(csv, "id,name,action\n1,A,U\n2,B,D\n");

    let (json, _) = transform(&request(OutputFormat::Json)).unwrap();
    assert_eq!(
        json,
        "[{\"id\":\"1\",\"name\":\"A\",\"action\":\"U\"},{\"id\":\"2\",\"name\":\"B\",\"action\":\"D\"}]\n"
    );
}

#[test]
fn snapshot_file_converts_every_column_and_row() {
    let tmp = tempdir().unwrap();
    let input = tmp.path().join("Prod183_20230101.dat");
    fs::write(&input, "company_number,name,status\n07,Acme,active\n07,Acme,dup\n08,,closed\n").unwrap();

    let (out, records) = transform(&TransformRequest {
        input,
        product: None,
        format: OutputFormat::Csv,
    })
    .unwrap();
    assert_eq!(records, 3);
    assert_eq!(
        out,
        "company_number,name,status\n07,Acme,active\n07,Acme,dup\n08,,closed\n"
    );
}

#[test]
fn empty_file_converts_to_empty_output() {
    let tmp = tempdir().unwrap();
    let input = tmp.path().join("empty.csv");
    fs::write(&input, "").unwrap();
    let (out, records) = transform(&TransformRequest {
        input,
        product: None,
        format: OutputFormat::Json,
    })
    .unwrap();
    assert_eq!(records, 0);
    assert_eq!(out, "[]\n");
}

#[test]
fn product_detection_uses_catalog_extensions() {
    let catalog = ProductCatalog::default();
    assert_eq!(detect_product("x.csv".as_ref(), &catalog), ProductId::Prod217);
    assert_eq!(detect_product("x.dat".as_ref(), &catalog), ProductId::Prod183);
    assert_eq!(detect_product("x.txt".as_ref(), &catalog), ProductId::Prod101);
    assert_eq!(detect_product("dir".as_ref(), &catalog), ProductId::Prod217);
}
