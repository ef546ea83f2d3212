use std::env;
use std::path::PathBuf;
use mob_traces_conversion_lib::regroup::regroup_mob_traces;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = env::args().collect();
    if args.len() != 3 {
        eprintln!("Usage: {} <input_file> <output_file>", args[0]);
        std::process::exit(1);
    }
    regroup_mob_traces(&PathBuf::from(&args[1]), &PathBuf::from(&args[2]))
}
