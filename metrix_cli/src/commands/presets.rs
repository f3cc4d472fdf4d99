use crate::ui;
use anyhow::Result;
use colored::Colorize;
use metrix_config::Preset;

pub async fn execute(show: Option<Preset>) -> Result<()> {
    match show {
        Some(preset) => {
            let config = preset.config();
            config.validate()?;
            ui::print_header(&format!("Preset '{}'", preset));
            println!("{}", preset.description());
            println!("\n{}", serde_yaml::to_string(&config)?);
        }
        None => {
            println!("{}", "=== Available Presets ===".bold().cyan());
            println!("\nTotal presets: {}\n", Preset::ALL.len());

            for preset in Preset::ALL {
                println!("  {} {:<10} {}", "•".green(), preset.name(), preset.description());
            }

            println!(
                "\n{}",
                "Use 'metrix presets --show <name>' to print a preset as YAML".yellow()
            );
        }
    }

    Ok(())
}
