use clap::Parser;

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
	color_eyre::install()?;

	let args = gwas_worker::Args::parse();

	gwas_worker::run(args).await
}
