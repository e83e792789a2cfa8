//! UCN tracking command-line interface.
//!
//! Run storage simulations from TOML configuration files:
//! ```sh
//! ucn-cli run job.toml
//! ucn-cli validate job.toml
//! ucn-cli materials
//! ucn-cli mr-table NiMo --energy 100 --theta 45
//! ucn-cli sample-geometry job.toml --count 20000
//! ```

mod config;
mod diagnostics;
mod runner;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "ucn-cli")]
#[command(about = "UCN storage and trajectory simulation")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a simulation from a TOML configuration file.
    Run {
        /// Path to the job configuration file.
        config: PathBuf,
        /// Output directory (overrides config file setting).
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Validate a configuration file without running the simulation.
    Validate {
        /// Path to the job configuration file.
        config: PathBuf,
    },
    /// Display the built-in material library.
    Materials,
    /// Write microroughness diagnostic tables for one material.
    MrTable {
        /// Material name from the built-in library.
        material: String,
        /// Neutron energy (neV) for the distribution table.
        #[arg(long, default_value_t = 100.0)]
        energy: f64,
        /// Incidence angle from the normal (degrees).
        #[arg(long, default_value_t = 45.0)]
        theta: f64,
        /// Output directory.
        #[arg(short, long, default_value = "./output")]
        output: PathBuf,
    },
    /// Fire random segments through the geometry of a job and dump all
    /// surface hits for plotting.
    SampleGeometry {
        /// Path to the job configuration file.
        config: PathBuf,
        /// Number of random segments.
        #[arg(long, default_value_t = 10_000)]
        count: usize,
        /// Output directory.
        #[arg(short, long, default_value = "./output")]
        output: PathBuf,
    },
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Run { config, output } => {
            println!("UCN trajectory simulation");
            println!("=========================");
            let job = config::load_config(&config)?;
            println!("Configuration: {}", config.display());

            let result = runner::run_simulation(&job)?;

            let out_dir = output.unwrap_or_else(|| PathBuf::from(&job.output.directory));
            if job.output.save_end_log {
                runner::write_end_csv(&result, &out_dir.join("end.csv"), &job)?;
            }
            if job.output.save_json {
                runner::write_end_json(&result, &out_dir.join("end.json"))?;
            }
            runner::print_summary(&result);
            println!("Simulation complete.");
            Ok(())
        }
        Commands::Validate { config } => {
            let job = config::load_config(&config)?;
            runner::build_library(&job)?;
            runner::build_geometry(&job)?;
            println!("Configuration is valid: {}", config.display());
            Ok(())
        }
        Commands::Materials => {
            let library = ucn_materials::MaterialLibrary::standard();
            println!("Built-in materials (Fermi potentials in neV):");
            println!();
            println!(
                "  {:<8} {:>10} {:>12} {:>8} {:>8} {:>4}",
                "name", "Re(V)", "Im(V)", "b_nm", "w_nm", "MR"
            );
            for name in library.names() {
                let m = library.get(name)?;
                println!(
                    "  {:<8} {:>10.2} {:>12.6} {:>8.1} {:>8.1} {:>4}",
                    m.name,
                    m.fermi_real,
                    m.fermi_imag,
                    m.rms_roughness,
                    m.correlation_length,
                    if m.use_mr_model { "yes" } else { "no" }
                );
            }
            Ok(())
        }
        Commands::MrTable {
            material,
            energy,
            theta,
            output,
        } => {
            let library = ucn_materials::MaterialLibrary::standard();
            let m = library.get(&material)?;
            diagnostics::write_mr_distribution(
                m,
                energy,
                theta,
                &output.join(format!("mr_dist_{material}.csv")),
            )?;
            diagnostics::write_mr_probability(
                m,
                &output.join(format!("mr_prob_{material}.csv")),
            )?;
            println!("MR tables written to {}", output.display());
            Ok(())
        }
        Commands::SampleGeometry {
            config,
            count,
            output,
        } => {
            let job = config::load_config(&config)?;
            let model = runner::build_geometry(&job)?;
            diagnostics::sample_geometry(
                &model,
                count,
                job.simulation.seed,
                &output.join("geometry_samples.csv"),
            )?;
            println!("Geometry samples written to {}", output.display());
            Ok(())
        }
    }
}
