use std::env;
use std::path::PathBuf;
use mob_traces_conversion_lib::TraceDocument;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = env::args().collect();
    if args.len() != 3 {
        eprintln!("Usage: {} <input_file> <output_directory>", args[0]);
        std::process::exit(1);
    }
    let document = TraceDocument::read_from_file(&PathBuf::from(&args[1]))?;
    let output_directory = PathBuf::from(&args[2]);
    let files = document.write_trajectory_csvs(&output_directory)?;
    println!(
        "Saved {} trajectory files to {}",
        files.len(),
        output_directory.display()
    );
    Ok(())
}
