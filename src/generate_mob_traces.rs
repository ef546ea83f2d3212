use std::env;
use std::fs;
use std::time::Duration;
use mob_traces_conversion_lib::generate_random_trace;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = env::args().collect();
    if args.len() != 7 {
        eprintln!(
            "Usage: {} <num_nodes> <output_file> <duration_secs> <interval_secs> <world_width> <world_height>",
            args[0]
        );
        std::process::exit(1);
    }
    let num_nodes = args[1].parse::<u64>()?;
    let output_file = &args[2][..];
    let duration = Duration::from_secs(args[3].parse::<u64>()?);
    let interval = Duration::from_secs(args[4].parse::<u64>()?);
    let world_width = args[5].parse::<f64>()?;
    let world_height = args[6].parse::<f64>()?;

    let mut rng = rand::thread_rng();
    let document = generate_random_trace(
        &mut rng,
        num_nodes,
        duration,
        interval,
        world_width,
        world_height,
    )?;
    fs::write(output_file, serde_json::to_string_pretty(&document)?)?;
    println!("Generated mobility data saved to {}.", output_file);
    Ok(())
}
