use std::env;
use std::path::PathBuf;
use std::time::Duration;
use mob_traces_conversion_lib::infection::convert_infection_schedule;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = env::args().collect();
    if args.len() < 3 || args.len() > 4 {
        eprintln!(
            "Usage: {} <input_file> <output_file> <start_offset_secs (optional)>",
            args[0]
        );
        std::process::exit(1);
    }
    let start_offset = if args.len() == 4 {
        Duration::from_secs(args[3].parse::<u64>()?)
    } else {
        Duration::ZERO
    };
    convert_infection_schedule(
        &PathBuf::from(&args[1]),
        &PathBuf::from(&args[2]),
        start_offset,
    )
}
