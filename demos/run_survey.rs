use std::{env, path::PathBuf};

use dhs_warehouse::config::Config;
use dhs_warehouse::warehouse::{default_warehouse_paths, Warehouse};
use dhs_warehouse::pipeline::run_survey;

fn usage_error() -> ! {
    println!("Usage:");
    println!("  cargo run --example run_survey -- [DCF_PATH] [DAT_PATH] [WORK_DIR] [WAREHOUSE_BASE_PATH]");

    std::process::exit(1);
}

pub fn main() -> Result<(), std::io::Error> {
    let args: Vec<String> = env::args().collect();

    if args.len() != 5 {
        usage_error();
    }

    let dcf_path = PathBuf::from(&args[1]);
    let dat_path = PathBuf::from(&args[2]);
    let work_dir = PathBuf::from(&args[3]);
    let warehouse_base = PathBuf::from(&args[4]);

    let config = Config::default();
    let (spec_path, data_path) = default_warehouse_paths(&warehouse_base);
    let mut warehouse = Warehouse::open(&spec_path, &data_path, config.schemas.clone(), config.use_bulk_copy)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e.to_string()))?;

    let summary = run_survey(&mut warehouse, &dcf_path, &dat_path, &work_dir, &config)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e.to_string()))?;

    for line in summary.lines() {
        println!("{line}");
    }

    Ok(())
}
