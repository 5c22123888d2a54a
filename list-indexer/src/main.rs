use std::fs;
use std::path::Path;
use clap::{Arg, ArgAction, ArgMatches, Command};
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;
use walkdir::WalkDir;

use date_facet::submission::{parse_date_input, submission_token, FormSubmission, SubmissionError};
use date_facet::{resolver, year_months_for, DateType, DateWidgetConfig, FilterOperator, ItemIndex, SiteTimezone};

mod builder;

use builder::{parse_items, IndexBuilder};

const INDEX_FILE: &str = "list_index.bin";

fn timezone_arg() -> Arg {
    Arg::new("timezone")
        .short('z')
        .long("timezone")
        .value_name("TIMEZONE")
        .help("时区名称或偏移，例如 Europe/Brussels 或 +08:00")
        .default_value("+00:00")
}

fn cli() -> Command {
    Command::new("列表索引工具")
        .version(env!("CARGO_PKG_VERSION"))
        .about("生成列表索引，处理日期筛选令牌")
        .subcommand_required(true)
        .arg(Arg::new("verbose")
            .short('v')
            .long("verbose")
            .help("显示详细信息")
            .global(true)
            .action(ArgAction::SetTrue))
        .subcommand(Command::new("index")
            .about("扫描JSON条目文件生成索引")
            .arg(Arg::new("source")
                .short('s')
                .long("source")
                .value_name("SOURCE_DIR")
                .help("条目源目录路径")
                .required(true))
            .arg(Arg::new("output")
                .short('o')
                .long("output")
                .value_name("OUTPUT_DIR")
                .help("索引输出目录路径")
                .required(true)))
        .subcommand(Command::new("year-months")
            .about("输出某个日期字段的年月可用性索引")
            .arg(Arg::new("index")
                .short('i')
                .long("index")
                .value_name("INDEX_FILE")
                .help("索引文件路径")
                .required(true))
            .arg(Arg::new("facet_source")
                .short('f')
                .long("facet-source")
                .value_name("SOURCE_ID")
                .help("筛选源ID，例如 list_pages:node:news")
                .required(true))
            .arg(Arg::new("field")
                .long("field")
                .value_name("FIELD")
                .help("日期字段名")
                .required(true))
            .arg(timezone_arg())
            .arg(Arg::new("limit")
                .long("limit")
                .value_name("COUNT")
                .help("最多扫描的条目数")
                .value_parser(clap::value_parser!(usize))))
        .subcommand(Command::new("encode")
            .about("把筛选选择编码为URL令牌")
            .arg(Arg::new("op")
                .long("op")
                .value_name("OPERATOR")
                .help("运算符: gt, lt, bt, ym")
                .required(true)
                .value_parser(["gt", "lt", "bt", "ym"]))
            .arg(Arg::new("first").long("first").value_name("DATE").help("第一个日期 YYYY-MM-DD[THH:MM[:SS]]"))
            .arg(Arg::new("second").long("second").value_name("DATE").help("第二个日期，仅 bt 使用"))
            .arg(Arg::new("year").long("year").value_parser(clap::value_parser!(i32)))
            .arg(Arg::new("month").long("month").value_parser(clap::value_parser!(u32).range(1..=12)))
            .arg(Arg::new("datetime")
                .long("datetime")
                .help("保留时间部分")
                .action(ArgAction::SetTrue))
            .arg(timezone_arg()))
        .subcommand(Command::new("decode")
            .about("解析URL令牌并输出筛选状态")
            .arg(Arg::new("token").required(true)))
}

fn main() {
    let matches = cli().get_matches();
    init_logging(matches.get_flag("verbose"));

    let result = match matches.subcommand() {
        Some(("index", sub)) => run_index(sub),
        Some(("year-months", sub)) => run_year_months(sub),
        Some(("encode", sub)) => run_encode(sub),
        Some(("decode", sub)) => run_decode(sub),
        _ => Err("未知命令".to_string()),
    };

    if let Err(e) = result {
        eprintln!("错误: {}", e);
        std::process::exit(1);
    }
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn required<'a>(matches: &'a ArgMatches, name: &str) -> Result<&'a String, String> {
    matches
        .get_one::<String>(name)
        .ok_or_else(|| format!("缺少参数: {}", name))
}

fn widget_config(matches: &ArgMatches) -> Result<DateWidgetConfig, String> {
    let mut config = DateWidgetConfig {
        timezone: required(matches, "timezone")?
            .parse::<SiteTimezone>()
            .map_err(|e| e.to_string())?,
        ..DateWidgetConfig::default()
    };
    if let Some(limit) = matches.try_get_one::<usize>("limit").ok().flatten() {
        config.scan_limit = *limit;
    }
    if matches.try_get_one::<bool>("datetime").ok().flatten() == Some(&true) {
        config.date_type = DateType::DateTime;
    }
    Ok(config)
}

fn run_index(matches: &ArgMatches) -> Result<(), String> {
    let source_dir = Path::new(required(matches, "source")?);
    let output_dir = Path::new(required(matches, "output")?);

    if !source_dir.is_dir() {
        return Err(format!("源目录不存在或不是有效目录 '{}'", source_dir.display()));
    }
    fs::create_dir_all(output_dir)
        .map_err(|e| format!("无法创建输出目录 '{}': {}", output_dir.display(), e))?;

    let start_time = std::time::Instant::now();
    info!(source = %source_dir.display(), "开始扫描条目文件");

    let mut builder = IndexBuilder::new();
    let mut skipped = 0;
    for entry in WalkDir::new(source_dir) {
        let entry = entry.map_err(|e| format!("遍历目录时出错: {}", e))?;
        if !entry.file_type().is_file() || entry.path().extension().map_or(true, |ext| ext != "json") {
            continue;
        }

        let parsed = fs::read_to_string(entry.path())
            .map_err(|e| e.to_string())
            .and_then(|json| parse_items(&json));
        match parsed {
            Ok(items) => {
                debug!(path = %entry.path().display(), count = items.len(), "读取条目文件");
                for item in items {
                    builder.add_item(item);
                }
            }
            Err(e) => {
                warn!(path = %entry.path().display(), error = %e, "跳过无法解析的文件");
                skipped += 1;
            }
        }
    }

    info!(items = builder.len(), skipped, "扫描完成");
    builder.save(&output_dir.join(INDEX_FILE))?;
    info!(elapsed = %format!("{:.2}s", start_time.elapsed().as_secs_f32()), "索引生成完成");
    Ok(())
}

fn run_year_months(matches: &ArgMatches) -> Result<(), String> {
    let path = required(matches, "index")?;
    let data = fs::read(path).map_err(|e| format!("无法读取索引 {}: {}", path, e))?;
    let index = ItemIndex::from_compressed(&data).map_err(|e| e.to_string())?;

    let config = widget_config(matches)?;
    let availability = year_months_for(
        &index,
        required(matches, "facet_source")?,
        required(matches, "field")?,
        &config,
    )
    .map_err(|e| e.to_string())?;

    println!("{}", availability.to_json().map_err(|e| e.to_string())?);
    Ok(())
}

fn run_encode(matches: &ArgMatches) -> Result<(), String> {
    let config = widget_config(matches)?;
    let date = |name: &str| -> Result<_, String> {
        matches
            .get_one::<String>(name)
            .map(|value| parse_date_input(value).ok_or_else(|| format!("日期格式错误: {}", value)))
            .transpose()
    };

    let submission = FormSubmission {
        operator: FilterOperator::from_code(required(matches, "op")?),
        first_date: date("first")?,
        second_date: date("second")?,
        year: matches.get_one::<i32>("year").copied(),
        month: matches.get_one::<u32>("month").copied(),
    };

    match submission_token("cli", &submission, &config) {
        Ok(Some(token)) => {
            println!("{}", token);
            Ok(())
        }
        Ok(None) => Err("筛选条件不完整，无法生成令牌".to_string()),
        Err(SubmissionError::Validation(errors)) => {
            let messages: Vec<&str> = errors.errors.iter().map(|e| e.message.as_str()).collect();
            Err(messages.join(" "))
        }
        Err(e) => Err(e.to_string()),
    }
}

fn run_decode(matches: &ArgMatches) -> Result<(), String> {
    let state = resolver::resolve(Some(required(matches, "token")?));
    if state.is_empty() {
        warn!("令牌无效，筛选未生效");
    }
    let json = serde_json::to_string_pretty(&state).map_err(|e| e.to_string())?;
    println!("{}", json);
    Ok(())
}
