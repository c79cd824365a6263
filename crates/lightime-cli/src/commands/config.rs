use clap::Subcommand;
use lightime_core::TimerConfig;

use super::Paths;

#[derive(Subcommand)]
pub enum ConfigAction {
    /// Print the effective configuration as TOML
    Show,
    /// Print the config file path
    Path,
    /// Check the config file and report the first invalid value
    Validate,
    /// Write the default configuration (refuses to overwrite without --force)
    Init {
        #[arg(long)]
        force: bool,
    },
}

pub fn run(action: ConfigAction, paths: &Paths) -> Result<(), Box<dyn std::error::Error>> {
    let path = paths.config_path()?;
    match action {
        ConfigAction::Show => {
            let config = if path.exists() {
                TimerConfig::load(&path)?
            } else {
                TimerConfig::default()
            };
            print!("{}", toml::to_string_pretty(&config)?);
        }
        ConfigAction::Path => {
            println!("{}", path.display());
        }
        ConfigAction::Validate => {
            TimerConfig::load(&path)?;
            println!("ok");
        }
        ConfigAction::Init { force } => {
            if path.exists() && !force {
                return Err(format!(
                    "{} already exists (use --force to overwrite)",
                    path.display()
                )
                .into());
            }
            TimerConfig::default().save(&path)?;
            println!("wrote {}", path.display());
        }
    }
    Ok(())
}
