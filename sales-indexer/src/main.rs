use std::env;
use std::fs;
use std::path::PathBuf;
use std::time::Instant;

use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use log::info;
use sales_common::models::parse_number;
use sales_common::parse_date;
use sales_filter::{
    AgeRange, DateRange, FilterRequest, PaginationParams, SalesFilter, SortParams, StoreBuilder,
};

mod error;
mod loader;

use error::{Error, Result};

/// 快照文件名
const INDEX_FILE: &str = "sales_index.bin";

fn main() {
    let matches = cli().get_matches();

    // log_init 按 RUST_LOG 过滤，须在初始化前设置
    if let Some(level) = log_level(&matches) {
        if env::var_os("RUST_LOG").is_none() {
            env::set_var("RUST_LOG", level);
        }
    }
    log_init::init();

    let result = match matches.subcommand() {
        Some(("build", sub)) => run_build(sub),
        Some(("query", sub)) => run_query(sub),
        Some(("meta", sub)) => run_meta(sub),
        _ => Ok(()),
    };

    if let Err(e) = result {
        eprintln!("错误: {e}");
        std::process::exit(1);
    }
}

fn cli() -> Command {
    Command::new("销售索引工具")
        .version(env!("CARGO_PKG_VERSION"))
        .about("构建销售数据索引，并对索引执行筛选查询")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .subcommand(
            Command::new("build")
                .about("读取 CSV 数据集并生成索引快照")
                .arg(
                    Arg::new("source")
                        .short('s')
                        .long("source")
                        .value_name("CSV_FILE")
                        .help("销售数据 CSV 文件")
                        .value_parser(value_parser!(PathBuf))
                        .required(true),
                )
                .arg(
                    Arg::new("output")
                        .short('o')
                        .long("output")
                        .value_name("OUTPUT_DIR")
                        .help("索引输出目录路径")
                        .value_parser(value_parser!(PathBuf))
                        .required(true),
                )
                .arg(verbose_arg()),
        )
        .subcommand(
            Command::new("query")
                .about("按条件筛选、排序并分页输出销售记录")
                .arg(input_arg())
                .arg(text_arg("search", "按客户名或电话搜索"))
                .arg(text_arg("regions", "地区，逗号分隔"))
                .arg(text_arg("genders", "性别，逗号分隔"))
                .arg(text_arg("categories", "商品品类，逗号分隔"))
                .arg(text_arg("tags", "标签，逗号分隔，需全部命中"))
                .arg(text_arg("payments", "支付方式，逗号分隔"))
                .arg(text_arg("age-min", "最小年龄 (含)"))
                .arg(text_arg("age-max", "最大年龄 (含)"))
                .arg(text_arg("date-from", "起始日期 (含)，如 2024-01-01"))
                .arg(text_arg("date-to", "结束日期 (含)"))
                .arg(text_arg("sort-by", "排序字段: date, quantity, customerName"))
                .arg(text_arg("sort-order", "排序方向: asc 或 desc"))
                .arg(text_arg("page", "页码，从 1 开始"))
                .arg(text_arg("limit", "每页条数"))
                .arg(verbose_arg()),
        )
        .subcommand(
            Command::new("meta")
                .about("输出全部筛选选项")
                .arg(input_arg())
                .arg(verbose_arg()),
        )
}

fn input_arg() -> Arg {
    Arg::new("input")
        .short('i')
        .long("input")
        .value_name("INDEX_OR_CSV")
        .help("索引快照或 CSV 文件")
        .value_parser(value_parser!(PathBuf))
        .required(true)
}

fn verbose_arg() -> Arg {
    Arg::new("verbose")
        .short('v')
        .long("verbose")
        .help("显示详细信息")
        .action(ArgAction::SetTrue)
}

fn text_arg(name: &'static str, help: &'static str) -> Arg {
    Arg::new(name)
        .long(name)
        .value_name("VALUE")
        .help(help)
        .allow_hyphen_values(true)
}

/// `-v` 时返回的日志级别
fn log_level(matches: &ArgMatches) -> Option<&'static str> {
    let (_, sub) = matches.subcommand()?;
    sub.get_flag("verbose").then_some("debug")
}

fn path_arg<'a>(matches: &'a ArgMatches, id: &'static str) -> Result<&'a PathBuf> {
    matches
        .get_one::<PathBuf>(id)
        .ok_or(Error::MissingArgument(id))
}

fn run_build(matches: &ArgMatches) -> Result<()> {
    let source = path_arg(matches, "source")?;
    let output = path_arg(matches, "output")?;

    let start_time = Instant::now();
    info!("源文件: {}", source.display());
    info!("输出目录: {}", output.display());

    let records = loader::load_csv(source)?;
    if !output.exists() {
        fs::create_dir_all(output)?;
    }

    let mut builder = StoreBuilder::new();
    for record in records {
        builder.add_record(record);
    }
    let store = builder.save_store(output.join(INDEX_FILE))?;

    let meta = SalesFilter::new(&store).meta();
    info!(
        "索引生成完成！记录: {}，地区: {}，品类: {}，标签: {}，耗时: {:.2}秒",
        store.len(),
        meta.regions.len(),
        meta.product_categories.len(),
        meta.tags.len(),
        start_time.elapsed().as_secs_f32()
    );
    Ok(())
}

fn run_query(matches: &ArgMatches) -> Result<()> {
    let store = loader::load_store(path_arg(matches, "input")?)?;
    let request = request_from_matches(matches);

    let start_time = Instant::now();
    let page = SalesFilter::new(&store).query(&request);
    info!(
        "查询完成: 共 {} 条，第 {}/{} 页，耗时 {:?}",
        page.total,
        page.page,
        page.total_pages,
        start_time.elapsed()
    );

    println!("{}", serde_json::to_string_pretty(&page)?);
    Ok(())
}

fn run_meta(matches: &ArgMatches) -> Result<()> {
    let store = loader::load_store(path_arg(matches, "input")?)?;
    let meta = SalesFilter::new(&store).meta();
    println!("{}", serde_json::to_string_pretty(&meta)?);
    Ok(())
}

/// 将命令行参数转换为筛选请求；无效数字或日期视为未设置
fn request_from_matches(matches: &ArgMatches) -> FilterRequest {
    let text = |id: &str| matches.get_one::<String>(id).map(String::as_str);

    FilterRequest {
        search: text("search").map(str::to_string),
        regions: parse_list(text("regions")),
        genders: parse_list(text("genders")),
        product_categories: parse_list(text("categories")),
        tags: parse_list(text("tags")),
        payment_methods: parse_list(text("payments")),
        age: AgeRange {
            min: text("age-min").and_then(age_bound),
            max: text("age-max").and_then(age_bound),
        },
        date_range: DateRange {
            from: text("date-from").and_then(parse_date),
            to: text("date-to").and_then(parse_date),
        },
        sort: SortParams {
            by: text("sort-by").map(str::to_string),
            order: text("sort-order").map(str::to_string),
        },
        pagination: PaginationParams {
            page: text("page").and_then(|v| v.trim().parse().ok()),
            limit: text("limit").and_then(|v| v.trim().parse().ok()),
        },
    }
}

/// 年龄边界可以是小数，负数视为未设置
fn age_bound(value: &str) -> Option<f64> {
    parse_number(value).filter(|n| *n >= 0.0)
}

/// 拆分逗号分隔的列表，去除空白和空项
fn parse_list(value: Option<&str>) -> Vec<String> {
    value
        .map(|v| {
            v.split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn query_matches(args: &[&str]) -> ArgMatches {
        let mut argv = vec!["sales-indexer-cli", "query", "-i", "sales_index.bin"];
        argv.extend_from_slice(args);
        let matches = cli().try_get_matches_from(argv).unwrap();
        matches.subcommand_matches("query").unwrap().clone()
    }

    #[test]
    fn cli_definition_is_consistent() {
        cli().debug_assert();
    }

    #[test]
    fn lists_are_split_and_trimmed() {
        assert_eq!(parse_list(Some(" North, ,South ,")), vec!["North", "South"]);
        assert!(parse_list(None).is_empty());
        assert!(parse_list(Some(" , ")).is_empty());
    }

    #[test]
    fn query_args_become_request() {
        let request = request_from_matches(&query_matches(&[
            "--regions",
            "North,South",
            "--tags",
            "a, b",
            "--age-min",
            "25.5",
            "--age-max",
            "abc",
            "--date-from",
            "2024-01-01",
            "--date-to",
            "garbage",
            "--sort-by",
            "quantity",
            "--sort-order",
            "asc",
            "--page",
            "2",
            "--limit=-3",
        ]));

        assert_eq!(request.regions, vec!["North", "South"]);
        assert_eq!(request.tags, vec!["a", "b"]);
        assert_eq!(request.age, AgeRange { min: Some(25.5), max: None });
        assert_eq!(request.date_range.from, parse_date("2024-01-01"));
        assert_eq!(request.date_range.to, None);
        assert_eq!(request.sort.by.as_deref(), Some("quantity"));
        assert_eq!(request.pagination.page, Some(2));
        assert_eq!(request.pagination.normalize(), (2, 10));
        assert!(request.genders.is_empty());
    }

    #[test]
    fn negative_age_bound_is_dropped() {
        let request = request_from_matches(&query_matches(&["--age-min=-3", "--age-max", "40"]));
        assert_eq!(request.age, AgeRange { min: None, max: Some(40.0) });
    }

    #[test]
    fn verbose_flag_selects_debug_level() {
        let argv = ["sales-indexer-cli", "meta", "-i", "sales_index.bin"];
        let quiet = cli().try_get_matches_from(argv).unwrap();
        assert_eq!(log_level(&quiet), None);

        let verbose = cli()
            .try_get_matches_from(argv.iter().copied().chain(["-v"]))
            .unwrap();
        assert_eq!(log_level(&verbose), Some("debug"));
    }

    #[test]
    fn build_requires_source_and_output() {
        assert!(cli()
            .try_get_matches_from(["sales-indexer-cli", "build", "-s", "data.csv"])
            .is_err());
    }
}
