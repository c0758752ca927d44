use std::fs::File;
use std::io::Read;
use std::path::Path;

use log::{info, warn};
use sales_common::{RawSale, SaleRecord};
use sales_filter::{SalesStore, StoreBuilder};

use crate::error::{Error, Result};

/// 读取 CSV 数据集并规范化为销售记录
///
/// 文件缺失或任意一行无法解析都会导致加载失败，不会返回部分数据。
pub fn load_csv(path: &Path) -> Result<Vec<SaleRecord>> {
    if !path.is_file() {
        return Err(Error::MissingSource(path.to_path_buf()));
    }

    let records = read_records(File::open(path)?)?;
    info!("从 {} 读取 {} 条记录", path.display(), records.len());
    Ok(records)
}

/// 从任意输入读取带表头的 CSV
pub fn read_records<R: Read>(input: R) -> Result<Vec<SaleRecord>> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::Headers)
        .from_reader(input);

    let mut records = Vec::new();
    for row in reader.deserialize::<RawSale>() {
        records.push(SaleRecord::from_raw(row?));
    }

    let undated = records.iter().filter(|r| r.date_value.is_none()).count();
    if undated > 0 {
        warn!("{} 条记录的日期无法解析，将排在日期排序的最低位", undated);
    }

    Ok(records)
}

/// 加载数据集: `.csv` 文件现场构建，其余视为快照
pub fn load_store(path: &Path) -> Result<SalesStore> {
    let is_csv = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("csv"));

    if !is_csv {
        if !path.is_file() {
            return Err(Error::MissingSource(path.to_path_buf()));
        }
        return Ok(SalesStore::load(path)?);
    }

    let mut builder = StoreBuilder::new();
    for record in load_csv(path)? {
        builder.add_record(record);
    }
    Ok(builder.build()?)
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    const SAMPLE: &str = "\
Transaction ID,Date,Customer Name,Phone Number,Gender,Age,Customer Region,Product Category,Quantity,Tags,Payment Method,Final Amount,Store Location
1,2023-03-23,Neha Yadav,98765 43210,Female,34,North,Electronics,2,gadgets;wireless,UPI,1200.5,Delhi
2,bad date,Rohan Das,+91 90000 11111,Male,,South,Clothing,x,,Cash,,Pune
";

    #[test]
    fn reads_and_normalizes_rows() {
        let records = read_records(SAMPLE.as_bytes()).unwrap();
        assert_eq!(records.len(), 2);

        let first = &records[0];
        assert_eq!(first.customer_name_lower, "neha yadav");
        assert_eq!(first.phone_normalized, "9876543210");
        assert_eq!(first.tags, vec!["gadgets", "wireless"]);
        assert_eq!(first.quantity, Some(2));
        assert_eq!(first.final_amount, Some(1200.5));
        assert!(first.date_value.is_some());

        let second = &records[1];
        assert_eq!(second.age, None);
        assert_eq!(second.quantity, None);
        assert_eq!(second.date_value, None);
        assert!(second.tags.is_empty());
        assert_eq!(second.phone_normalized, "+919000011111");
    }

    #[test]
    fn ragged_rows_abort_loading() {
        let input = "Customer Name,Age\nA,1\nB,2,extra\n";
        assert!(matches!(read_records(input.as_bytes()), Err(Error::Csv(_))));
    }

    #[test]
    fn missing_file_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.csv");
        assert!(matches!(load_csv(&path), Err(Error::MissingSource(_))));
        assert!(matches!(
            load_store(&dir.path().join("absent.bin")),
            Err(Error::MissingSource(_))
        ));
    }

    #[test]
    fn header_only_csv_is_fatal() {
        let mut file = tempfile::Builder::new().suffix(".csv").tempfile().unwrap();
        file.write_all(b"Customer Name,Age\n").unwrap();
        assert!(matches!(
            load_store(file.path()),
            Err(Error::Store(sales_common::Error::EmptyDataset))
        ));
    }

    #[test]
    fn csv_and_snapshot_load_the_same_store() {
        let dir = tempfile::tempdir().unwrap();
        let csv_path = dir.path().join("sales.csv");
        std::fs::write(&csv_path, SAMPLE).unwrap();

        let from_csv = load_store(&csv_path).unwrap();
        let snapshot = dir.path().join("sales_index.bin");
        from_csv.save(&snapshot).unwrap();
        let from_snapshot = load_store(&snapshot).unwrap();

        assert_eq!(from_csv.records(), from_snapshot.records());
        assert_eq!(from_csv.indexes(), from_snapshot.indexes());
    }
}
