use clap::Parser;
use keycard::{get_settings_with_cli, setup_logger, Application, Cli, Settings};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let settings: Settings = get_settings_with_cli((&cli).into())?;
    setup_logger(
        settings.level.clone(),
        vec![String::from("hyper"), String::from("rustls")],
    )?;
    let application = Application::build(settings).await?;

    application.run(!cli.no_submit).await?;
    Ok(())
}
